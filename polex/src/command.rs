use std::borrow::Cow;
use std::ffi::OsStr;
use std::io;
use std::process::{Command, ExitStatus, Output, Stdio};

use log::Level::Debug;
use log::{debug, log_enabled};

/// Exit code reported when a process was terminated by a signal
pub const SIGNALED_EXIT_CODE: i32 = -1;

pub struct CmdOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CmdOutput {
    /// Converts to a `Result` object that is `Ok` only if the [ExitStatus] is
    /// success.
    pub fn err_on_status(self) -> crate::Result<Self> {
        if self.status.success() {
            return Ok(self);
        }

        Err(crate::Error::Command {
            code: self.status.code().unwrap_or(SIGNALED_EXIT_CODE),
            stderr: self.stderr_utf8_lossy().trim_end().to_string(),
        })
    }

    /// Same as [CmdOutput::err_on_status] but hands back only stdout
    pub fn into_stdout(self) -> crate::Result<Vec<u8>> {
        self.err_on_status().map(|it| it.stdout)
    }

    #[inline]
    pub fn stdout_contains(&self, needle: &str) -> bool {
        self.stdout_utf8_lossy().contains(needle)
    }

    #[inline]
    pub fn stdout_utf8_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stdout)
    }

    #[inline]
    pub fn stderr_utf8_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stderr)
    }
}

impl From<Output> for CmdOutput {
    fn from(output: Output) -> Self {
        Self {
            status: output.status,
            stdout: output.stdout,
            stderr: output.stderr,
        }
    }
}

/// Quotes a string with single quotes
pub fn quote(s: &str) -> String {
    let mut new = String::with_capacity(s.len() + 2);
    new.push('\'');
    for c in s.chars() {
        if c == '\'' {
            new.push_str("'\"'\"'");
        } else {
            new.push(c);
        }
    }
    new.push('\'');
    new
}

/// Run a command to completion, capturing stdout and stderr
pub fn run_cmd<C, S>(cmd: C, args: &[S]) -> io::Result<CmdOutput>
where
    C: AsRef<OsStr>,
    S: AsRef<OsStr>,
{
    if log_enabled!(Debug) {
        log_cmd(&cmd, args);
    }
    Command::new(cmd)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .map(|output| output.into())
}

/// Run a command and return its stdout only if it exited successfully.
///
/// On a non-zero exit this fails with [crate::Error::Command] carrying the
/// captured stderr; any partial stdout is dropped.
pub fn run_checked<C, S>(cmd: C, args: &[S]) -> crate::Result<Vec<u8>>
where
    C: AsRef<OsStr>,
    S: AsRef<OsStr>,
{
    run_cmd(cmd, args)?.into_stdout()
}

pub fn log_cmd<C, S>(cmd: &C, args: &[S])
where
    C: AsRef<OsStr>,
    S: AsRef<OsStr>,
{
    let nargs = args.len();
    if nargs > 0 {
        let mut args_string = String::new();
        for (i, e) in args.iter().enumerate() {
            args_string.push_str(&e.as_ref().to_string_lossy());
            if i < nargs - 1 {
                args_string.push(' ');
            }
        }
        debug!(
            "Running command: `{} {}`",
            cmd.as_ref().to_string_lossy(),
            args_string
        );
    } else {
        debug!("Running command: `{}`", cmd.as_ref().to_string_lossy());
    }
}
