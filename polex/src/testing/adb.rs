use std::io;
use std::process::ExitStatus;

use mockall::mock;
use rstest::fixture;

use crate::command::CmdOutput;

mock! {
    pub Adb {

    }

    impl crate::adb::Adb for Adb {
        fn get_connected_devices(&self) -> crate::Result<Vec<String>>;
        fn run(&self, args: &[String]) -> io::Result<CmdOutput>;
        fn push(&self, local: &str, device: &str) -> io::Result<CmdOutput>;
        fn shell(&self, shell_cmd: &str) -> io::Result<CmdOutput>;
        fn uninstall(&self, package: &str) -> crate::Result<()>;
        fn reverse_tcp_port(&self, remote_port: u16, local_port: u16) -> io::Result<CmdOutput>;
        fn reverse_generic(&self, remote: &str, local: &str) -> io::Result<CmdOutput>;
        fn reverse_remove_tcp_port(&self, remote_port: u16) -> io::Result<CmdOutput>;
        fn reverse_remove(&self, remote: &str) -> io::Result<CmdOutput>;
    }
}

#[fixture]
pub fn mock_adb() -> MockAdb {
    MockAdb::new()
}

#[cfg(unix)]
fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;
    // Wait status encoding, the exit code lives in the second byte
    ExitStatus::from_raw(code << 8)
}

#[cfg(windows)]
fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;
    ExitStatus::from_raw(code as u32)
}

/// A successful command with the given stdout
pub fn ok_output(stdout: &str) -> CmdOutput {
    CmdOutput {
        status: ExitStatus::default(),
        stdout: stdout.as_bytes().to_vec(),
        stderr: Vec::new(),
    }
}

/// A failed command with the given exit code and stderr
pub fn failed_output(code: i32, stderr: &str) -> CmdOutput {
    CmdOutput {
        status: exit_status(code),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}
