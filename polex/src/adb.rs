use std::io;

use crate::command::{run_cmd, CmdOutput};
use crate::Context;

/// Token marking a line of `adb devices` output as a usable device
pub const DEVICE_READY_TOKEN: &'static str = "device";

/// The Adb trait just abstracts some `adb` commands
pub trait Adb: Send + Sync {
    /// Returns the serials of all attached devices that are ready for use.
    ///
    /// No devices is not an error, callers decide what to do with an empty
    /// list.
    fn get_connected_devices(&self) -> crate::Result<Vec<String>>;

    /// Run an arbitrary adb subcommand, `adb [-s SERIAL] ARGS...`
    fn run(&self, args: &[String]) -> io::Result<CmdOutput>;

    /// Essentially the same as running `adb push $local $device`
    fn push(&self, local: &str, device: &str) -> io::Result<CmdOutput>;

    /// Essentially the same as running `adb shell '...'`
    fn shell(&self, shell_cmd: &str) -> io::Result<CmdOutput>;

    /// Uninstall the given package
    fn uninstall(&self, package: &str) -> crate::Result<()>;

    /// Same as `adb reverse tcp:remote_port tcp:local_port`
    fn reverse_tcp_port(&self, remote_port: u16, local_port: u16) -> io::Result<CmdOutput> {
        let remote = format!("tcp:{}", remote_port);
        let local = format!("tcp:{}", local_port);
        self.reverse_generic(&remote, &local)
    }

    /// Same as `adb reverse REMOTE LOCAL`
    fn reverse_generic(&self, remote: &str, local: &str) -> io::Result<CmdOutput>;

    /// Same as `adb reverse --remove tcp:remote_port`
    fn reverse_remove_tcp_port(&self, remote_port: u16) -> io::Result<CmdOutput> {
        self.reverse_remove(&format!("tcp:{}", remote_port))
    }

    /// Same as `adb reverse --remove REMOTE`
    fn reverse_remove(&self, remote: &str) -> io::Result<CmdOutput>;
}

/// Parse the output of `adb devices`.
///
/// The header line is skipped, only lines containing [DEVICE_READY_TOKEN] are
/// kept and each of those is cut down to the text before the first tab.
pub fn parse_device_list(output: &str) -> Vec<String> {
    output
        .lines()
        .skip(1)
        .filter(|l| l.contains(DEVICE_READY_TOKEN))
        .map(|l| match l.split_once('\t') {
            Some((serial, _)) => serial,
            None => l,
        })
        .map(String::from)
        .collect()
}

#[derive(Clone)]
/// An `Adb` implementation that just invokes the external `adb` command.
pub struct ExecAdb {
    bin: String,
    serial: Option<String>,
}

impl ExecAdb {
    /// Creates a new `ExecAdb` from the given context.
    ///
    /// The `[adb]` table of the settings file takes precedence over the
    /// environment:
    ///
    /// [adb]
    /// executable = "..."
    /// serial = "..."
    pub fn new(ctx: &dyn Context) -> crate::Result<Self> {
        let settings = ctx.get_settings()?;
        let bin = match &settings.adb.executable {
            Some(v) => v.clone(),
            None => ctx.get_bin("adb")?,
        };
        let serial = settings
            .adb
            .serial
            .clone()
            .or_else(|| ctx.maybe_get_env("ANDROID_SERIAL"));
        Ok(Self { bin, serial })
    }

    pub fn serial(&self) -> Option<&str> {
        self.serial.as_deref()
    }

    pub fn with_serial(mut self, serial: String) -> Self {
        self.serial = Some(serial);
        self
    }

    /// Drops the device selection, used for commands like `adb devices`
    /// that aren't scoped to a device
    pub fn unscoped(&self) -> Self {
        Self {
            bin: self.bin.clone(),
            serial: None,
        }
    }

    fn full_args<'a>(&'a self, args: &[&'a str]) -> Vec<&'a str> {
        let mut full = Vec::with_capacity(args.len() + 2);
        if let Some(ref serial) = self.serial {
            full.push("-s");
            full.push(serial.as_str());
        }
        full.extend_from_slice(args);
        full
    }
}

impl Default for ExecAdb {
    fn default() -> Self {
        Self {
            bin: "adb".into(),
            serial: None,
        }
    }
}

macro_rules! adb_cmd {
    ($adb:ident, $cmd:literal, $($args:expr),*) => {
        run_cmd(&$adb.bin, &$adb.full_args(&[$cmd, $($args),*]))
    }
}

impl Adb for ExecAdb {
    fn get_connected_devices(&self) -> crate::Result<Vec<String>> {
        let output = run_cmd(&self.bin, &["devices"])?.err_on_status()?;
        Ok(parse_device_list(&output.stdout_utf8_lossy()))
    }

    fn run(&self, args: &[String]) -> io::Result<CmdOutput> {
        let args = args.iter().map(String::as_str).collect::<Vec<&str>>();
        run_cmd(&self.bin, &self.full_args(&args))
    }

    fn push(&self, local: &str, device: &str) -> io::Result<CmdOutput> {
        adb_cmd!(self, "push", local, device)
    }

    fn shell(&self, shell_cmd: &str) -> io::Result<CmdOutput> {
        adb_cmd!(self, "shell", shell_cmd)
    }

    fn uninstall(&self, package: &str) -> crate::Result<()> {
        adb_cmd!(self, "uninstall", package)?.err_on_status()?;
        Ok(())
    }

    fn reverse_generic(&self, remote: &str, local: &str) -> io::Result<CmdOutput> {
        adb_cmd!(self, "reverse", remote, local)
    }

    fn reverse_remove(&self, remote: &str) -> io::Result<CmdOutput> {
        adb_cmd!(self, "reverse", "--remove", remote)
    }
}
