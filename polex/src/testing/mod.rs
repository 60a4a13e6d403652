mod adb;
pub use adb::*;

mod context;
pub use context::*;

mod logs;
pub use logs::*;
