use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::adb::{Adb, ExecAdb};
use crate::channel::DeviceChannel;
use crate::collector::{ResultCollector, SessionSummary, Timeouts};
use crate::config::Config;
use crate::extraction;
use crate::output::OutputWriter;
use crate::package::{install_apk, remove_apk, CleanupReport};
use crate::settings::Settings;
use crate::utils::{ensure_dir_exists, path_must_str};
use crate::Context;

/// How long to wait for the launcher after the collector finished
pub const DEFAULT_LAUNCH_WAIT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Push and install the harness before running
    pub install: bool,
    /// Uninstall the harness and remove pushed files afterwards
    pub cleanup: bool,
    pub launch_wait: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            install: true,
            cleanup: true,
            launch_wait: DEFAULT_LAUNCH_WAIT,
        }
    }
}

/// Write the identifiers, one per line
pub fn write_identifier_file<S: AsRef<str>>(path: &Path, identifiers: &[S]) -> crate::Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir_exists(parent)?;
    }
    let mut content = String::new();
    for id in identifiers {
        content.push_str(id.as_ref());
        content.push('\n');
    }
    fs::write(path, content)?;
    log::debug!(
        "wrote {} identifier(s) to {}",
        identifiers.len(),
        path_must_str(path)
    );
    Ok(())
}

/// One extraction run against one device
pub struct Session<A: Adb = ExecAdb> {
    chan: Arc<DeviceChannel<A>>,
    settings: Settings,
}

impl Session<ExecAdb> {
    pub fn new(ctx: &dyn Context, config: Config) -> crate::Result<Self> {
        let chan = DeviceChannel::new(ctx, config)?;
        Self::with_channel(ctx, chan)
    }
}

impl<A: Adb + 'static> Session<A> {
    pub fn with_channel(ctx: &dyn Context, chan: DeviceChannel<A>) -> crate::Result<Self> {
        let mut settings = ctx.get_settings()?;
        settings.collector.port = ctx.get_collector_port()?;
        Ok(Self {
            chan: Arc::new(chan),
            settings,
        })
    }

    /// Write results somewhere other than the configured output directory
    pub fn with_output_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.settings.output_dir = dir.into();
        self
    }

    pub fn config(&self) -> &Config {
        self.chan.config()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn install(&self) -> crate::Result<()> {
        install_apk(&*self.chan, &self.settings.harness)
    }

    /// Remove everything a run leaves on the device, best effort.
    ///
    /// The configured collector port is un-reversed too, unless it is 0 and
    /// so never known up front.
    pub fn uninstall(&self) -> CleanupReport {
        let collector = &self.settings.collector;
        let port = Some(collector.port).filter(|it| collector.reverse && *it != 0);
        self.cleanup(port)
    }

    fn cleanup(&self, reversed_port: Option<u16>) -> CleanupReport {
        let mut extra = Vec::new();
        match self
            .settings
            .harness
            .remote_path_for(&self.settings.identifier_file)
        {
            Ok(v) => extra.push(v),
            Err(e) => log::warn!("not removing the identifier file: {}", e),
        }
        remove_apk(&*self.chan, &self.settings.harness, &extra, reversed_port)
    }

    /// Install, launch the harness on `identifiers` and collect its results.
    ///
    /// Cleanup runs whether or not the install or the extraction succeeded,
    /// unless disabled in `opts`. The port reversal is always dropped.
    pub fn run<S: AsRef<str>>(
        &self,
        identifiers: &[S],
        opts: &RunOptions,
    ) -> crate::Result<SessionSummary> {
        if identifiers.is_empty() {
            return Err(crate::Error::new_generic("no identifiers to process"));
        }

        let mut reversed = None;
        let mut res = if opts.install {
            self.install()
        } else {
            log::info!("skipping harness install");
            Ok(())
        }
        .and_then(|()| self.extract(identifiers, opts, &mut reversed));

        if opts.cleanup {
            let report = self.cleanup(reversed);
            match &mut res {
                Ok(summary) => summary.cleanup = Some(report),
                Err(e) => log::warn!(
                    "cleaned up after a failed run ({} problem(s)): {}",
                    report.failures.len(),
                    e
                ),
            }
        } else if let Some(port) = reversed {
            if let Err(e) = self.chan.remove_reverse_tcp_port(port) {
                log::warn!("removing the reversal of port {} failed: {}", port, e);
            }
        }
        res
    }

    /// `reversed` is set once `adb reverse` succeeded, so it can be undone
    /// even if a later step fails
    fn extract<S: AsRef<str>>(
        &self,
        identifiers: &[S],
        opts: &RunOptions,
        reversed: &mut Option<u16>,
    ) -> crate::Result<SessionSummary> {
        let settings = &self.settings;
        write_identifier_file(&settings.identifier_file, identifiers)?;

        let writer = OutputWriter::new(&settings.output_dir, self.config().mode);
        let collector = ResultCollector::bind(
            settings.collector.bind_addr(),
            writer,
            Timeouts::from(&settings.collector),
        )?
        .expecting(identifiers.iter().map(|it| it.as_ref()));

        if settings.collector.reverse {
            let port = collector.local_addr()?.port();
            match self.chan.reverse_tcp_port(port) {
                Ok(()) => *reversed = Some(port),
                Err(e) => log::warn!("adb reverse for port {} failed: {}", port, e),
            }
        }

        let mut launch = extraction::start(
            Arc::clone(&self.chan),
            &settings.identifier_file,
            &settings.harness,
        )?;

        let mut summary = collector.collect()?;
        summary.launcher = launch.log_outcome(opts.launch_wait);

        log::info!(
            "session ended ({:?}): {} written, {} failed, {} violation(s), {} missing",
            summary.end,
            summary.written.len(),
            summary.failed.len(),
            summary.violations.len(),
            summary.missing.len()
        );
        Ok(summary)
    }
}
