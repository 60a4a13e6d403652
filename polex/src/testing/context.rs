#![allow(unused)]
use std::collections::HashMap;
use std::fs::{self, create_dir_all};
use std::path::{Path, PathBuf};
use std::env;

use anyhow::Context as AnyhowContext;
use mockall::mock;
use rand::Rng;
use rstest::fixture;

use crate::settings::Settings;
use crate::utils::ensure_dir_exists;
use crate::Context;

#[fixture]
pub fn tmp_context() -> TestContext {
    TestContext::default()
}

#[fixture]
pub fn mock_context() -> MockContext {
    MockContext::new()
}

pub struct TestContext {
    base_dir: PathBuf,
    env: HashMap<String, String>,
    bins: HashMap<String, String>,
    settings: Settings,
}

impl TestContext {
    pub fn set_env<K: AsRef<str>, V: AsRef<str>>(&mut self, key: K, value: V) -> &mut Self {
        self.env.insert(key.as_ref().into(), value.as_ref().into());
        self
    }

    pub fn set_bin<K: AsRef<str>, V: AsRef<str>>(&mut self, key: K, bin: V) -> &mut Self {
        self.bins.insert(key.as_ref().into(), bin.as_ref().into());
        self
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn to_abs<P: AsRef<Path> + ?Sized>(&self, path: &P) -> PathBuf {
        self.base_dir.join(path)
    }

    /// Write a file relative to the base directory, creating parents
    pub fn write_file(&self, relative: &str, content: &str) -> anyhow::Result<PathBuf> {
        let file = self.base_dir.join(relative);
        if let Some(parent) = file.parent() {
            create_dir_all(parent)
                .with_context(|| format!("creating parent dirs for {relative}"))?;
        }
        fs::write(&file, content).with_context(|| format!("writing content to {relative}"))?;
        Ok(file)
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        let td = &self.base_dir;
        if td.exists() {
            _ = fs::remove_dir_all(td);
        }
    }
}

impl Default for TestContext {
    fn default() -> Self {
        let mut rng = rand::thread_rng();
        let rand_name: u64 = rng.gen();
        let td = env::temp_dir().join(format!("polex_test_base_{}", rand_name));

        if td.exists() {
            fs::remove_dir_all(&td).expect("failed to clear test dir");
        }

        ensure_dir_exists(&td).expect("failed to create default test dir");

        let mut env = HashMap::new();
        env.insert("POLEX_PROJECT_HOME".into(), td.to_string_lossy().into());
        env.insert("ANDROID_SERIAL".into(), "TESTSERIAL".into());

        let settings = Settings::default_in(&td);

        Self {
            base_dir: td,
            env,
            bins: HashMap::new(),
            settings,
        }
    }
}

impl Context for TestContext {
    fn maybe_get_env(&self, key: &str) -> Option<String> {
        self.env.get(key).map(String::from)
    }

    fn maybe_get_bin(&self, bin: &str) -> Option<String> {
        self.bins.get(bin).map(String::from)
    }

    fn get_user_config_dir(&self) -> crate::Result<PathBuf> {
        Ok(self.base_dir.join("config"))
    }

    fn get_settings(&self) -> crate::Result<Settings> {
        Ok(self.settings.clone())
    }
}

mock! {
    pub Context {

    }

    impl crate::Context for Context {
        fn maybe_get_env(&self, key: &str) -> Option<String>;
        fn maybe_get_bin(&self, bin: &str) -> Option<String>;
        fn get_project_dir(&self) -> crate::Result<PathBuf>;
        fn get_settings(&self) -> crate::Result<Settings>;
    }
}
