use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::channel::{bounded, Receiver, RecvTimeoutError};
use serde::Serialize;

use crate::adb::Adb;
use crate::channel::DeviceChannel;
use crate::command::{quote, CmdOutput};
use crate::config::Config;
use crate::package::{push_file, HarnessPackages};

/// Markers `am instrument -r` prints when the run failed even though the
/// shell exited cleanly
const INSTRUMENTATION_FAILURE_MARKERS: [&'static str; 3] =
    ["INSTRUMENTATION_FAILED", "FAILURES!!!", "INSTRUMENTATION_ABORTED"];

/// How the background launch ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LaunchOutcome {
    Finished,
    Failed { reason: String },
}

impl LaunchOutcome {
    fn from_result(res: crate::Result<CmdOutput>) -> Self {
        let out = match res {
            Ok(v) => v,
            Err(e) => {
                return Self::Failed {
                    reason: e.to_string(),
                }
            }
        };
        let stdout = out.stdout_utf8_lossy();
        let failed_line = stdout.lines().find(|line| {
            INSTRUMENTATION_FAILURE_MARKERS
                .iter()
                .any(|marker| line.contains(marker))
        });
        match failed_line {
            Some(line) => Self::Failed {
                reason: line.trim().into(),
            },
            None => Self::Finished,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// The `am instrument` invocation that starts an extraction run
pub fn instrument_command(config: &Config, pkgs: &HarnessPackages, device_file: &str) -> String {
    format!(
        "am instrument -w -r -e file {} -e mode {} -e algorithm {} --no-window-animation -e class {} {}",
        quote(device_file),
        config.mode.label(),
        config.algorithm.label(),
        quote(&pkgs.entry_point),
        quote(&pkgs.instrumentation()),
    )
}

/// Push the identifier file and launch the harness in the background.
///
/// Only the push can fail here. The launch itself runs on its own thread and
/// its outcome is available through the returned [LaunchHandle]; it never
/// affects the result collection.
pub fn start<A: Adb + 'static>(
    chan: Arc<DeviceChannel<A>>,
    identifier_file: &Path,
    pkgs: &HarnessPackages,
) -> crate::Result<LaunchHandle> {
    let remote = pkgs.remote_path_for(identifier_file)?;
    push_file(&*chan, identifier_file, &remote)?;

    let cmd = instrument_command(chan.config(), pkgs, &remote);
    let (tx, rx) = bounded(1);

    thread::Builder::new()
        .name(String::from("polex-launcher"))
        .spawn(move || {
            log::info!("launching the harness on {}", chan.device());
            let outcome = LaunchOutcome::from_result(chan.shell(&cmd));
            log::debug!("harness launch finished: {:?}", outcome);
            // The receiver may already be gone
            _ = tx.send(outcome);
        })?;

    Ok(LaunchHandle {
        rx,
        outcome: None,
        remote_identifier_file: remote,
    })
}

/// The result side of a background launch
pub struct LaunchHandle {
    rx: Receiver<LaunchOutcome>,
    outcome: Option<LaunchOutcome>,
    remote_identifier_file: String,
}

impl LaunchHandle {
    /// Where the identifier file was pushed on the device
    pub fn remote_identifier_file(&self) -> &str {
        &self.remote_identifier_file
    }

    /// The outcome if the launch already finished
    pub fn try_outcome(&mut self) -> Option<LaunchOutcome> {
        if self.outcome.is_none() {
            self.outcome = self.rx.try_recv().ok();
        }
        self.outcome.clone()
    }

    /// Wait up to `timeout` for the launch to finish
    pub fn wait(&mut self, timeout: Duration) -> Option<LaunchOutcome> {
        if self.outcome.is_some() {
            return self.outcome.clone();
        }
        match self.rx.recv_timeout(timeout) {
            Ok(v) => self.outcome = Some(v),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                self.outcome = Some(LaunchOutcome::Failed {
                    reason: String::from("launcher thread exited without a result"),
                })
            }
        }
        self.outcome.clone()
    }

    /// Wait up to `timeout` and log whatever the launch did
    pub fn log_outcome(&mut self, timeout: Duration) -> Option<LaunchOutcome> {
        let outcome = self.wait(timeout);
        match &outcome {
            Some(LaunchOutcome::Finished) => log::info!("harness instrumentation finished"),
            Some(LaunchOutcome::Failed { reason }) => {
                log::warn!("harness instrumentation failed: {}", reason)
            }
            None => log::debug!("harness instrumentation still running"),
        }
        outcome
    }
}
