pub mod context;
pub use context::{Context, DefaultContext};

pub mod config;
pub use config::{Algorithm, Config, Mode};

pub mod errors;
pub use errors::{Error, Result};

pub mod adb;

pub mod command;
pub use command::run_checked;

pub mod settings;

pub mod registry;
pub use registry::DeviceRegistry;

pub mod channel;
pub use channel::DeviceChannel;

pub mod package;

pub mod extraction;

pub mod protocol;

pub mod output;
pub use output::OutputWriter;

pub mod collector;
pub use collector::{ResultCollector, SessionSummary};

pub mod session;
pub use session::{RunOptions, Session};

pub mod utils;

#[cfg(test)]
pub mod testing;
