use std::process::ExitCode;

use clap::{self, Args};

use polex::{Algorithm, Config, Context, Mode, Session};

use crate::utils::DeviceArgs;

fn session(
    ctx: &dyn Context,
    device: &DeviceArgs,
    subcommand: &'static str,
) -> anyhow::Result<Session> {
    let serial = device.select_required(ctx, subcommand)?;
    let config = Config::new(Mode::Policy, Algorithm::default(), serial);
    Ok(Session::new(ctx, config)?)
}

#[derive(Args)]
pub struct Install {
    #[command(flatten)]
    device: DeviceArgs,
}

impl Install {
    pub fn run(&self, ctx: &dyn Context) -> anyhow::Result<ExitCode> {
        let session = session(ctx, &self.device, "install")?;
        session.install()?;
        println!("harness installed on {}", session.config().device);
        Ok(ExitCode::SUCCESS)
    }
}

#[derive(Args)]
pub struct Uninstall {
    #[command(flatten)]
    device: DeviceArgs,
}

impl Uninstall {
    pub fn run(&self, ctx: &dyn Context) -> anyhow::Result<ExitCode> {
        let session = session(ctx, &self.device, "uninstall")?;
        let report = session.uninstall();
        if report.is_clean() {
            println!("harness removed from {}", session.config().device);
            return Ok(ExitCode::SUCCESS);
        }
        for f in &report.failures {
            eprintln!("{}", f);
        }
        Ok(ExitCode::FAILURE)
    }
}
