//! Project settings read from `polex.toml`.
//!
//! Every key is optional, a missing file yields [Settings::default_in] for
//! the project directory.

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::time::Duration;

use toml::{Table, Value};

use crate::package::HarnessPackages;
use crate::utils::{path_must_str, read_file};

pub const SETTINGS_FILE_NAME: &'static str = "polex.toml";

pub const DEFAULT_COLLECTOR_PORT: u16 = 2000;
pub const DEFAULT_COLLECTOR_BIND: &'static str = "0.0.0.0";
pub const DEFAULT_ACCEPT_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 1800;
pub const DEFAULT_OUTPUT_DIR: &'static str = "out";
pub const DEFAULT_IDENTIFIER_FILE: &'static str = "identifiers.txt";

#[derive(Debug)]
pub enum Error {
    InvalidType,
}

pub type Result<T> = std::result::Result<T, Error>;

/// A view into one table of the settings file that knows its own key path
/// for error reporting
pub struct ConfigMap<'c> {
    path: &'c Path,
    name: Option<Cow<'c, str>>,
    table: &'c Table,
}

impl<'c> ConfigMap<'c> {
    pub fn new(path: &'c Path, table: &'c Table) -> Self {
        Self {
            path,
            name: None,
            table,
        }
    }

    fn key_path<'a>(&self, key: &'a str) -> Cow<'a, str> {
        match &self.name {
            None => Cow::Borrowed(key),
            Some(v) => Cow::Owned(format!("{}.{}", v, key)),
        }
    }

    pub fn invalid_key(&self, key: &str, expected: &str) -> crate::Error {
        let path = self.key_path(key);
        crate::Error::InvalidConfig(
            path_must_str(self.path).into(),
            format!(
                "invalid value for key: {} (expected type: {})",
                path, expected
            ),
        )
    }

    fn get(&self, key: &str) -> Option<&'c Value> {
        self.table.get(key)
    }

    pub fn maybe_get_int(&self, key: &str) -> Result<Option<i64>> {
        match self.get(key) {
            Some(v) => v.as_integer().map(Some).ok_or(Error::InvalidType),
            None => Ok(None),
        }
    }

    pub fn maybe_get_int_typecheck(&self, key: &str) -> crate::Result<Option<i64>> {
        self.maybe_get_int(key)
            .map_err(|_| self.invalid_key(key, "int"))
    }

    pub fn maybe_get_str(&self, key: &str) -> Result<Option<&'c str>> {
        match self.get(key) {
            Some(v) => v.as_str().map(Some).ok_or(Error::InvalidType),
            None => Ok(None),
        }
    }

    pub fn maybe_get_str_typecheck(&self, key: &str) -> crate::Result<Option<&'c str>> {
        self.maybe_get_str(key)
            .map_err(|_| self.invalid_key(key, "string"))
    }

    pub fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.table
            .get(key)
            .map(|it| it.as_bool().unwrap_or(default))
            .unwrap_or(default)
    }

    pub fn maybe_get_map(&self, key: &'c str) -> Result<Option<ConfigMap<'c>>> {
        match self.get(key) {
            Some(v) => match v.as_table() {
                Some(table) => {
                    let name = match &self.name {
                        Some(parents) => Cow::Owned(format!("{parents}.{key}")),
                        None => Cow::Borrowed(key),
                    };
                    Ok(Some(Self {
                        name: Some(name),
                        path: self.path,
                        table,
                    }))
                }
                None => Err(Error::InvalidType),
            },
            None => Ok(None),
        }
    }

    pub fn maybe_get_map_typecheck(&self, key: &'c str) -> crate::Result<Option<ConfigMap<'c>>> {
        self.maybe_get_map(key)
            .map_err(|_| self.invalid_key(key, "table"))
    }

    /// Timeouts are given in whole seconds, 0 disables them
    fn maybe_get_timeout(&self, key: &str, default: u64) -> crate::Result<Option<Duration>> {
        let secs = match self.maybe_get_int_typecheck(key)? {
            None => default,
            Some(v) if v < 0 => return Err(self.invalid_key(key, "non-negative int")),
            Some(v) => v as u64,
        };
        Ok(if secs == 0 {
            None
        } else {
            Some(Duration::from_secs(secs))
        })
    }
}

pub fn parse_config<R, F>(file: &Path, f: F) -> crate::Result<R>
where
    F: FnOnce(&ConfigMap) -> crate::Result<R>,
{
    let as_str = read_file(file)?;

    let table: Table = match toml::from_str(&as_str) {
        Ok(v) => v,
        Err(e) => return Err(crate::Error::new_cfg(file, &e)),
    };

    f(&ConfigMap::new(file, &table))
}

/// `[adb]` table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdbSettings {
    pub executable: Option<String>,
    pub serial: Option<String>,
}

/// `[collector]` table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorSettings {
    pub bind: String,
    pub port: u16,
    pub accept_timeout: Option<Duration>,
    pub idle_timeout: Option<Duration>,
    /// Set up `adb reverse` so the harness can reach the collector on the
    /// device's localhost
    pub reverse: bool,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            bind: DEFAULT_COLLECTOR_BIND.into(),
            port: DEFAULT_COLLECTOR_PORT,
            accept_timeout: Some(Duration::from_secs(DEFAULT_ACCEPT_TIMEOUT_SECS)),
            idle_timeout: Some(Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS)),
            reverse: true,
        }
    }
}

impl CollectorSettings {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub adb: AdbSettings,
    pub harness: HarnessPackages,
    pub collector: CollectorSettings,
    pub output_dir: PathBuf,
    pub identifier_file: PathBuf,
}

impl Settings {
    /// Default settings with relative paths resolved against `base`
    pub fn default_in(base: &Path) -> Self {
        Self {
            adb: AdbSettings::default(),
            harness: HarnessPackages::default().rooted_at(base),
            collector: CollectorSettings::default(),
            output_dir: base.join(DEFAULT_OUTPUT_DIR),
            identifier_file: base.join(DEFAULT_IDENTIFIER_FILE),
        }
    }

    /// Parse the given settings file, relative paths inside of it are
    /// resolved against `base`
    pub fn parse(file: &Path, base: &Path) -> crate::Result<Self> {
        parse_config(file, |map| Self::from_map(map, base))
    }

    pub fn from_map(map: &ConfigMap, base: &Path) -> crate::Result<Self> {
        let mut settings = Self::default_in(base);

        if let Some(adb) = map.maybe_get_map_typecheck("adb")? {
            settings.adb.executable = adb.maybe_get_str_typecheck("executable")?.map(String::from);
            settings.adb.serial = adb.maybe_get_str_typecheck("serial")?.map(String::from);
        }

        if let Some(harness) = map.maybe_get_map_typecheck("harness")? {
            let h = &mut settings.harness;
            if let Some(v) = harness.maybe_get_str_typecheck("apk")? {
                h.apk = base.join(v);
            }
            if let Some(v) = harness.maybe_get_str_typecheck("test-apk")? {
                h.test_apk = base.join(v);
            }
            if let Some(v) = harness.maybe_get_str_typecheck("package")? {
                h.package = v.into();
            }
            if let Some(v) = harness.maybe_get_str_typecheck("test-package")? {
                h.test_package = v.into();
            }
            if let Some(v) = harness.maybe_get_str_typecheck("runner")? {
                h.runner = v.into();
            }
            if let Some(v) = harness.maybe_get_str_typecheck("entry-point")? {
                h.entry_point = v.into();
            }
            if let Some(v) = harness.maybe_get_str_typecheck("remote-dir")? {
                h.remote_dir = v.into();
            }
        }

        if let Some(collector) = map.maybe_get_map_typecheck("collector")? {
            let c = &mut settings.collector;
            if let Some(v) = collector.maybe_get_str_typecheck("bind")? {
                c.bind = v.into();
            }
            if let Some(port) = collector.maybe_get_int_typecheck("port")? {
                c.port = u16::try_from(port).map_err(|_| collector.invalid_key("port", "u16"))?;
            }
            c.accept_timeout =
                collector.maybe_get_timeout("accept-timeout", DEFAULT_ACCEPT_TIMEOUT_SECS)?;
            c.idle_timeout = collector.maybe_get_timeout("idle-timeout", DEFAULT_IDLE_TIMEOUT_SECS)?;
            c.reverse = collector.get_bool_or("reverse", c.reverse);
        }

        if let Some(output) = map.maybe_get_map_typecheck("output")? {
            if let Some(v) = output.maybe_get_str_typecheck("dir")? {
                settings.output_dir = base.join(v);
            }
            if let Some(v) = output.maybe_get_str_typecheck("identifier-file")? {
                settings.identifier_file = base.join(v);
            }
        }

        Ok(settings)
    }
}
