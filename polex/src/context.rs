use blanket::blanket;
use once_cell::sync::OnceCell;
use std::env;
use std::path::PathBuf;

use directories::BaseDirs;
use which::{which, which_in};

use crate::settings::{Settings, SETTINGS_FILE_NAME};
use crate::Error;

use std::ops::DerefMut;
use std::sync::Mutex;

#[derive(Clone)]
struct CachedBin {
    name: String,
    path: String,
}

fn wrapped_which(bin: &str) -> Option<PathBuf> {
    if let Ok(search_path) = env::var("POLEX_PATH") {
        let cwd = env::current_dir().ok()?;
        return which_in(bin, Some(&search_path), &cwd).ok();
    }
    which(bin).ok()
}

#[inline(always)]
fn find_program(prog: &str) -> Option<String> {
    wrapped_which(prog).map(|it| it.to_string_lossy().into())
}

/// Context is a trait for an object that can help standardize file locations,
/// find binaries, and lookup env vars.
///
/// Most methods on this trait have a default implementation that is perfectly
/// safe to leave unchanged.
#[blanket(derive(Ref, Box))]
pub trait Context: Send + Sync {
    fn maybe_get_env(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }

    fn maybe_get_bin(&self, bin: &str) -> Option<String> {
        find_program(bin)
    }

    fn get_bin(&self, bin: &str) -> crate::Result<String> {
        self.maybe_get_bin(bin)
            .ok_or_else(|| Error::MissingBin(bin.into()))
    }

    fn get_env(&self, key: &str) -> crate::Result<String> {
        self.maybe_get_env(key)
            .ok_or_else(|| Error::MissingEnv(key.into()))
    }

    /// The directory relative paths are resolved against. This is
    /// `POLEX_PROJECT_HOME` if set, otherwise the working directory.
    fn get_project_dir(&self) -> crate::Result<PathBuf> {
        match self.maybe_get_env("POLEX_PROJECT_HOME") {
            Some(home) => {
                let home = PathBuf::from(home);
                if !home.exists() {
                    return Err(Error::Generic(format!(
                        "POLEX_PROJECT_HOME set to {}, but that directory doesn't exist",
                        home.to_string_lossy()
                    )));
                }
                Ok(home)
            }
            None => Ok(env::current_dir()?),
        }
    }

    fn get_project_dir_child(&self, child: &str) -> crate::Result<PathBuf> {
        self.get_project_dir().map(|x| x.join(child))
    }

    /// Find the settings file, preferring the project directory over the
    /// user's config directory. `None` if neither exists.
    fn find_settings_file(&self) -> crate::Result<Option<PathBuf>> {
        let project = self.get_project_dir_child(SETTINGS_FILE_NAME)?;
        if project.exists() {
            return Ok(Some(project));
        }
        let user = self.get_user_config_dir()?.join(SETTINGS_FILE_NAME);
        Ok(if user.exists() { Some(user) } else { None })
    }

    /// Returns the project settings, see [Settings]
    fn get_settings(&self) -> crate::Result<Settings>;

    fn get_output_dir(&self) -> crate::Result<PathBuf> {
        Ok(self.get_settings()?.output_dir)
    }

    /// Port for the result collector, `POLEX_COLLECTOR_PORT` overrides the
    /// settings file
    fn get_collector_port(&self) -> crate::Result<u16> {
        match self.maybe_get_env("POLEX_COLLECTOR_PORT") {
            Some(v) => v
                .parse()
                .map_err(|_| Error::InvalidEnv("POLEX_COLLECTOR_PORT".into(), v)),
            None => Ok(self.get_settings()?.collector.port),
        }
    }

    fn get_user_config_dir(&self) -> crate::Result<PathBuf> {
        let bd = BaseDirs::new().ok_or_else(|| Error::new_generic("failed to get BaseDirs"))?;
        Ok(bd.config_dir().join("polex"))
    }
}

pub struct DefaultContext {
    bin_cache: Mutex<Vec<CachedBin>>,
    settings: OnceCell<Settings>,
}

impl Clone for DefaultContext {
    fn clone(&self) -> Self {
        let cache = match self.bin_cache.lock() {
            Ok(v) => v.clone(),
            Err(_) => Vec::new(),
        };
        Self {
            bin_cache: Mutex::new(cache),
            settings: self.settings.clone(),
        }
    }
}

impl DefaultContext {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for DefaultContext {
    fn default() -> Self {
        Self {
            bin_cache: Mutex::new(Vec::new()),
            settings: OnceCell::new(),
        }
    }
}

impl Context for DefaultContext {
    fn get_settings(&self) -> crate::Result<Settings> {
        let settings = self
            .settings
            .get_or_try_init(|| -> crate::Result<Settings> {
                let base = self.get_project_dir()?;
                match self.find_settings_file()? {
                    Some(path) => {
                        log::debug!("reading settings from {}", path.to_string_lossy());
                        Settings::parse(&path, &base)
                    }
                    None => Ok(Settings::default_in(&base)),
                }
            })?;
        Ok(settings.clone())
    }

    fn maybe_get_bin(&self, prog: &str) -> Option<String> {
        let mut cache_guard = match self.bin_cache.lock() {
            Ok(v) => v,
            Err(_) => return find_program(prog),
        };
        let cache = cache_guard.deref_mut();
        if let Some(val) = cache.iter().find(|it| it.name == prog) {
            return Some(val.path.clone());
        }

        let found = find_program(prog)?;

        cache.push(CachedBin {
            name: prog.into(),
            path: found.clone(),
        });

        Some(found)
    }
}
