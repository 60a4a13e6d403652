use std::fmt;
use std::process::ExitCode;

use clap::{Args, CommandFactory};

use polex::adb::ExecAdb;
use polex::{Context, DeviceRegistry};

#[derive(Args, Clone, Debug)]
pub struct DeviceArgs {
    /// Serial of the device to use
    ///
    /// Defaults to `adb.serial` from polex.toml, then `ANDROID_SERIAL`, then
    /// the first attached device.
    #[arg(short = 'd', long)]
    pub device: Option<String>,
}

impl DeviceArgs {
    /// The device to run against, `None` if nothing is attached
    pub fn select(&self, ctx: &dyn Context) -> anyhow::Result<Option<String>> {
        let adb = ExecAdb::new(ctx)?;
        let requested = self
            .device
            .clone()
            .or_else(|| adb.serial().map(String::from));
        let registry = DeviceRegistry::enumerate(&adb.unscoped())?;
        Ok(registry.select(requested.as_deref()).map(String::from))
    }

    /// Like [DeviceArgs::select] but fails with a [UsageError] for
    /// `subcommand` if no device is attached
    pub fn select_required(
        &self,
        ctx: &dyn Context,
        subcommand: &'static str,
    ) -> anyhow::Result<String> {
        match self.select(ctx)? {
            Some(v) => Ok(v),
            None => Err(UsageError::new(subcommand, "no attached device found").into()),
        }
    }
}

/// The command line was fine syntactically but can't be acted on. `main`
/// reports these with the subcommand's help and exits with 1.
#[derive(Debug)]
pub struct UsageError {
    subcommand: &'static str,
    msg: String,
}

impl UsageError {
    pub fn new<S: Into<String>>(subcommand: &'static str, msg: S) -> Self {
        Self {
            subcommand,
            msg: msg.into(),
        }
    }

    /// Print the message and the help of the subcommand to stderr
    pub fn report(&self) -> ExitCode {
        eprintln!("error: {}\n", self);
        let mut cmd = crate::Cli::command();
        if let Some(sub) = cmd.find_subcommand_mut(self.subcommand) {
            eprintln!("{}", sub.render_help());
        }
        ExitCode::from(1)
    }
}

impl fmt::Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.msg)
    }
}

impl std::error::Error for UsageError {}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::*;

    #[rstest]
    fn test_usage_error_downcasts() {
        let err: anyhow::Error = UsageError::new("run", "no device").into();
        let usage = err.downcast_ref::<UsageError>().expect("usage error");
        assert_eq!(usage.subcommand, "run");
        assert_eq!(usage.to_string(), "no device");
    }
}
