use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::utils::path_must_str;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("required binary `{0}` not available to context")]
    MissingBin(String),
    #[error("missing required env var: {0}")]
    MissingEnv(String),

    #[error("{0}")]
    IO(io::Error),

    #[error("invalid env var {0} ({1})")]
    InvalidEnv(String, String),

    /// A device or host command exited with a non-zero status. A code of -1
    /// means the process was killed by a signal.
    #[error("command failed with status {code}: {stderr}")]
    Command { code: i32, stderr: String },

    #[error("failed to push {local} to {remote}: {reason}")]
    Transfer {
        local: String,
        remote: String,
        reason: String,
    },

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("identifier `{0}` can't be used as an output file name")]
    BadIdentifier(String),

    /// The collector gave up waiting, see [crate::collector::EndReason::TimedOut]
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("bad path {0:?}")]
    BadPath(PathBuf),

    #[error("generic error: {0}")]
    Generic(String),

    #[error("invalid config {0}: {1}")]
    InvalidConfig(String, String),

    #[error("file {0} doesn't exist")]
    MissingFile(String),
}

impl Error {
    pub fn new_generic<S: ToString + ?Sized>(s: &S) -> Self {
        Self::Generic(s.to_string())
    }

    pub fn new_cfg<S: ToString + ?Sized>(path: &Path, s: &S) -> Self {
        let as_str = path_must_str(path);
        Self::InvalidConfig(as_str.into(), s.to_string())
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for Error {
    fn from(value: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Self::Generic(value.to_string())
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::IO(err)
    }
}
