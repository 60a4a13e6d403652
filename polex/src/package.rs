use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::adb::Adb;
use crate::channel::DeviceChannel;
use crate::command::quote;
use crate::utils::{device_join, path_must_str};

pub const DEFAULT_HARNESS_APK: &'static str = "app/build/outputs/apk/debug/app-debug.apk";
pub const DEFAULT_TEST_APK: &'static str =
    "app/build/outputs/apk/androidTest/debug/app-debug-androidTest.apk";
pub const DEFAULT_HARNESS_PACKAGE: &'static str = "com.polex.harness";
pub const DEFAULT_TEST_PACKAGE: &'static str = "com.polex.harness.test";
pub const DEFAULT_RUNNER: &'static str = "androidx.test.runner.AndroidJUnitRunner";
pub const DEFAULT_ENTRY_POINT: &'static str = "com.polex.harness.ExtractionTest";
pub const DEFAULT_REMOTE_DIR: &'static str = "/data/local/tmp";

const REMOTE_HARNESS_NAME: &'static str = "polex-harness.apk";
const REMOTE_TEST_NAME: &'static str = "polex-harness-test.apk";

/// Where the harness and its test runner live, on the host and on the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessPackages {
    pub apk: PathBuf,
    pub test_apk: PathBuf,
    pub package: String,
    pub test_package: String,
    pub runner: String,
    /// Fully qualified test class (optionally `#method`) that drives the
    /// extraction
    pub entry_point: String,
    /// Temporary directory on the device for pushed files
    pub remote_dir: String,
}

impl Default for HarnessPackages {
    fn default() -> Self {
        Self {
            apk: PathBuf::from(DEFAULT_HARNESS_APK),
            test_apk: PathBuf::from(DEFAULT_TEST_APK),
            package: DEFAULT_HARNESS_PACKAGE.into(),
            test_package: DEFAULT_TEST_PACKAGE.into(),
            runner: DEFAULT_RUNNER.into(),
            entry_point: DEFAULT_ENTRY_POINT.into(),
            remote_dir: DEFAULT_REMOTE_DIR.into(),
        }
    }
}

impl HarnessPackages {
    /// Resolve relative artifact paths against `base`
    pub fn rooted_at(mut self, base: &Path) -> Self {
        self.apk = base.join(&self.apk);
        self.test_apk = base.join(&self.test_apk);
        self
    }

    pub fn remote_apk(&self) -> String {
        device_join(&self.remote_dir, REMOTE_HARNESS_NAME)
    }

    pub fn remote_test_apk(&self) -> String {
        device_join(&self.remote_dir, REMOTE_TEST_NAME)
    }

    /// Device path a host file is pushed to
    pub fn remote_path_for(&self, local: &Path) -> crate::Result<String> {
        let name = local
            .file_name()
            .ok_or_else(|| crate::Error::BadPath(local.to_path_buf()))?;
        Ok(device_join(&self.remote_dir, &name.to_string_lossy()))
    }

    /// `<test package>/<runner>`, the instrumentation target
    pub fn instrumentation(&self) -> String {
        format!("{}/{}", self.test_package, self.runner)
    }

    /// (local, remote) pairs in install order
    fn artifacts(&self) -> [(&Path, String); 2] {
        [
            (self.apk.as_path(), self.remote_apk()),
            (self.test_apk.as_path(), self.remote_test_apk()),
        ]
    }
}

/// Push a host file to the device, turning any failure into
/// [crate::Error::Transfer]
pub fn push_file<A: Adb>(
    chan: &DeviceChannel<A>,
    local: &Path,
    remote: &str,
) -> crate::Result<()> {
    let local_str = path_must_str(local);
    if !local.exists() {
        return Err(crate::Error::MissingFile(local_str.into()));
    }
    log::debug!("pushing {} to {}:{}", local_str, chan.device(), remote);
    chan.push(&local_str, remote)
        .map(|_| ())
        .map_err(|e| crate::Error::Transfer {
            local: local_str.to_string(),
            remote: remote.into(),
            reason: e.to_string(),
        })
}

/// Push both harness binaries and install them with `pm install -r -t`.
///
/// Installing over an existing install replaces it, so this can be run
/// repeatedly.
pub fn install_apk<A: Adb>(chan: &DeviceChannel<A>, pkgs: &HarnessPackages) -> crate::Result<()> {
    for (local, _) in pkgs.artifacts() {
        if !local.exists() {
            return Err(crate::Error::MissingFile(path_must_str(local).into()));
        }
    }

    for (local, remote) in pkgs.artifacts() {
        push_file(chan, local, &remote)?;
    }

    for (_, remote) in pkgs.artifacts() {
        log::info!("installing {} on {}", remote, chan.device());
        let cmd = format!("pm install -r -t {}", quote(&remote));
        let out = chan.shell(&cmd)?;
        // Older package managers exit 0 and report failures on stdout
        if out.stdout_contains("Failure") {
            return Err(crate::Error::Command {
                code: 0,
                stderr: out.stdout_utf8_lossy().trim().to_string(),
            });
        }
    }
    Ok(())
}

/// Outcome of [remove_apk], cleanup never fails the run
#[derive(Debug, Default, Serialize)]
pub struct CleanupReport {
    pub failures: Vec<String>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, step: &str, res: crate::Result<()>) {
        if let Err(e) = res {
            log::warn!("cleanup step `{}` failed: {}", step, e);
            self.failures.push(format!("{}: {}", step, e));
        }
    }
}

/// Stop and uninstall the harness and its test package, drop the port
/// reversal and remove the pushed temporary files. Best effort, failures are
/// only logged.
pub fn remove_apk<A: Adb>(
    chan: &DeviceChannel<A>,
    pkgs: &HarnessPackages,
    extra_remote_files: &[String],
    reversed_port: Option<u16>,
) -> CleanupReport {
    let mut report = CleanupReport::default();

    if let Some(port) = reversed_port {
        let step = format!("reverse --remove tcp:{}", port);
        report.record(&step, chan.remove_reverse_tcp_port(port));
    }

    let stop = format!("am force-stop {}", quote(&pkgs.package));
    report.record(&stop, chan.shell(&stop).map(|_| ()));

    for pkg in [&pkgs.test_package, &pkgs.package] {
        let step = format!("uninstall {}", pkg);
        report.record(&step, chan.uninstall(pkg));
    }

    let mut remote_files = vec![pkgs.remote_apk(), pkgs.remote_test_apk()];
    remote_files.extend(extra_remote_files.iter().cloned());
    let rm = format!(
        "rm -f {}",
        remote_files
            .iter()
            .map(|it| quote(it))
            .collect::<Vec<String>>()
            .join(" ")
    );
    report.record(&rm, chan.shell(&rm).map(|_| ()));

    report
}

#[cfg(test)]
mod test {
    use std::sync::{Arc, Mutex};

    use crate::config::{Algorithm, Config, Mode};
    use crate::testing::{failed_output, mock_adb, ok_output, tmp_context, MockAdb, TestContext};

    use super::*;
    use rstest::*;

    fn config() -> Config {
        Config::new(Mode::Policy, Algorithm::Os, "emulator-5554")
    }

    fn packages(ctx: &TestContext) -> HarnessPackages {
        ctx.write_file(DEFAULT_HARNESS_APK, "harness")
            .expect("write harness");
        ctx.write_file(DEFAULT_TEST_APK, "test").expect("write test");
        HarnessPackages::default().rooted_at(ctx.get_base_dir())
    }

    #[rstest]
    fn test_remote_paths() {
        let pkgs = HarnessPackages::default();
        assert_eq!(pkgs.remote_apk(), "/data/local/tmp/polex-harness.apk");
        assert_eq!(pkgs.remote_test_apk(), "/data/local/tmp/polex-harness-test.apk");
        assert_eq!(
            pkgs.remote_path_for(Path::new("/home/me/identifiers.txt"))
                .unwrap(),
            "/data/local/tmp/identifiers.txt"
        );
        assert_eq!(
            pkgs.instrumentation(),
            "com.polex.harness.test/androidx.test.runner.AndroidJUnitRunner"
        );
    }

    #[rstest]
    fn test_install_twice_replaces(tmp_context: TestContext, mut mock_adb: MockAdb) {
        let pkgs = packages(&tmp_context);
        let shells = Arc::new(Mutex::new(Vec::new()));

        mock_adb
            .expect_push()
            .times(4)
            .returning(|_, _| Ok(ok_output("1 file pushed")));
        let recorded = Arc::clone(&shells);
        mock_adb.expect_shell().times(4).returning(move |cmd| {
            recorded.lock().unwrap().push(String::from(cmd));
            Ok(ok_output("Success\n"))
        });

        let chan = DeviceChannel::with_adb(config(), mock_adb);
        install_apk(&chan, &pkgs).expect("first install");
        install_apk(&chan, &pkgs).expect("second install");

        let shells = shells.lock().unwrap();
        let expected = [
            "pm install -r -t '/data/local/tmp/polex-harness.apk'",
            "pm install -r -t '/data/local/tmp/polex-harness-test.apk'",
        ];
        assert_eq!(shells.len(), 4);
        assert_eq!(&shells[..2], &expected);
        assert_eq!(&shells[2..], &expected);
    }

    #[rstest]
    fn test_failed_push_is_a_transfer_error(tmp_context: TestContext, mut mock_adb: MockAdb) {
        let pkgs = packages(&tmp_context);
        mock_adb
            .expect_push()
            .returning(|_, _| Ok(failed_output(1, "adb: error: failed to copy")));
        mock_adb.expect_shell().never();

        let chan = DeviceChannel::with_adb(config(), mock_adb);
        match install_apk(&chan, &pkgs) {
            Err(crate::Error::Transfer { remote, reason, .. }) => {
                assert_eq!(remote, "/data/local/tmp/polex-harness.apk");
                assert!(reason.contains("failed to copy"));
            }
            _ => panic!("expected a transfer error"),
        }
    }

    #[rstest]
    fn test_missing_artifact(tmp_context: TestContext, mut mock_adb: MockAdb) {
        let pkgs = HarnessPackages::default().rooted_at(tmp_context.get_base_dir());
        mock_adb.expect_push().never();
        let chan = DeviceChannel::with_adb(config(), mock_adb);
        assert!(matches!(
            install_apk(&chan, &pkgs),
            Err(crate::Error::MissingFile(_))
        ));
    }

    #[rstest]
    fn test_install_failure_on_stdout(tmp_context: TestContext, mut mock_adb: MockAdb) {
        let pkgs = packages(&tmp_context);
        mock_adb
            .expect_push()
            .returning(|_, _| Ok(ok_output("1 file pushed")));
        mock_adb
            .expect_shell()
            .times(1)
            .returning(|_| Ok(ok_output("Failure [INSTALL_FAILED_OLDER_SDK]\n")));
        let chan = DeviceChannel::with_adb(config(), mock_adb);
        assert!(matches!(
            install_apk(&chan, &pkgs),
            Err(crate::Error::Command { .. })
        ));
    }

    #[rstest]
    fn test_remove_is_best_effort(mut mock_adb: MockAdb) {
        let pkgs = HarnessPackages::default();
        mock_adb
            .expect_reverse_remove_tcp_port()
            .withf(|port| *port == 2000)
            .times(1)
            .returning(|_| Ok(ok_output("")));
        mock_adb
            .expect_shell()
            .withf(|cmd| cmd == "am force-stop 'com.polex.harness'")
            .times(1)
            .returning(|_| Ok(failed_output(255, "error: closed")));
        mock_adb
            .expect_uninstall()
            .withf(|pkg| pkg == "com.polex.harness.test")
            .times(1)
            .returning(|_| {
                Err(crate::Error::Command {
                    code: 1,
                    stderr: "Failure [DELETE_FAILED_INTERNAL_ERROR]".into(),
                })
            });
        mock_adb
            .expect_uninstall()
            .withf(|pkg| pkg == "com.polex.harness")
            .times(1)
            .returning(|_| Ok(()));
        mock_adb
            .expect_shell()
            .withf(|cmd| cmd.starts_with("rm -f "))
            .times(1)
            .returning(|cmd| {
                assert!(cmd.contains("'/data/local/tmp/identifiers.txt'"));
                Ok(ok_output(""))
            });

        let chan = DeviceChannel::with_adb(config(), mock_adb);
        let report = remove_apk(
            &chan,
            &pkgs,
            &["/data/local/tmp/identifiers.txt".into()],
            Some(2000),
        );
        assert!(!report.is_clean());
        assert_eq!(report.failures.len(), 2);
    }

    #[rstest]
    fn test_remove_without_reversal(mut mock_adb: MockAdb) {
        let pkgs = HarnessPackages::default();
        mock_adb.expect_reverse_remove_tcp_port().never();
        mock_adb.expect_shell().times(2).returning(|_| Ok(ok_output("")));
        mock_adb.expect_uninstall().times(2).returning(|_| Ok(()));

        let chan = DeviceChannel::with_adb(config(), mock_adb);
        assert!(remove_apk(&chan, &pkgs, &[], None).is_clean());
    }
}
