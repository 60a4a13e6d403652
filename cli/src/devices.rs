use std::process::ExitCode;

use clap::{self, Args};

use polex::adb::ExecAdb;
use polex::{Context, DeviceRegistry};

#[derive(Args)]
pub struct Devices {
    /// Exit with status 1 if no device is attached
    #[arg(short = 'r', long)]
    require: bool,
}

impl Devices {
    pub fn run(&self, ctx: &dyn Context) -> anyhow::Result<ExitCode> {
        let adb = ExecAdb::new(ctx)?.unscoped();
        let registry = DeviceRegistry::enumerate(&adb)?;
        if registry.is_empty() {
            eprintln!("no attached devices");
            if self.require {
                return Ok(ExitCode::FAILURE);
            }
            return Ok(ExitCode::SUCCESS);
        }
        for dev in registry.devices() {
            println!("{}", dev);
        }
        Ok(ExitCode::SUCCESS)
    }
}
