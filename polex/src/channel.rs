use crate::adb::{Adb, ExecAdb};
use crate::command::CmdOutput;
use crate::config::Config;
use crate::Context;

/// Binds a run [Config] to one device.
///
/// Everything that talks to the device goes through here, and the
/// underlying [Adb] is always scoped to `config.device`.
pub struct DeviceChannel<A: Adb = ExecAdb> {
    config: Config,
    adb: A,
}

impl DeviceChannel<ExecAdb> {
    /// Build a channel using the adb executable from the context, with the
    /// device selection forced to `config.device`
    pub fn new(ctx: &dyn Context, config: Config) -> crate::Result<Self> {
        let adb = ExecAdb::new(ctx)?.with_serial(config.device.clone());
        Ok(Self { config, adb })
    }
}

impl<A: Adb> DeviceChannel<A> {
    /// Wrap an already scoped [Adb] implementation
    pub fn with_adb(config: Config, adb: A) -> Self {
        Self { config, adb }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn device(&self) -> &str {
        &self.config.device
    }

    /// Run `adb -s <device> TOKENS...` returning stdout on success
    pub fn run_on_device<S: AsRef<str>>(&self, tokens: &[S]) -> crate::Result<Vec<u8>> {
        let args = tokens
            .iter()
            .map(|it| String::from(it.as_ref()))
            .collect::<Vec<String>>();
        self.adb.run(&args)?.into_stdout()
    }

    pub fn push(&self, local: &str, remote: &str) -> crate::Result<CmdOutput> {
        self.adb.push(local, remote)?.err_on_status()
    }

    pub fn shell(&self, cmd: &str) -> crate::Result<CmdOutput> {
        self.adb.shell(cmd)?.err_on_status()
    }

    pub fn uninstall(&self, package: &str) -> crate::Result<()> {
        self.adb.uninstall(package)
    }

    /// Make `port` on the device reach `port` on the host
    pub fn reverse_tcp_port(&self, port: u16) -> crate::Result<()> {
        self.adb.reverse_tcp_port(port, port)?.err_on_status()?;
        Ok(())
    }

    /// Undo [DeviceChannel::reverse_tcp_port]
    pub fn remove_reverse_tcp_port(&self, port: u16) -> crate::Result<()> {
        self.adb.reverse_remove_tcp_port(port)?.err_on_status()?;
        Ok(())
    }
}
