use std::borrow::Cow;
use std::fs::{self, create_dir_all};
use std::io::{self, ErrorKind};
use std::path::Path;

pub const DEVICE_PATH_SEP: &'static str = "/";

pub fn ensure_dir_exists(p: &Path) -> io::Result<()> {
    if p.exists() {
        return Ok(());
    }

    create_dir_all(p)
}

/// Lossy string form of a path, used for handing paths to adb and for
/// error messages
pub fn path_must_str(path: &Path) -> Cow<'_, str> {
    path.to_string_lossy()
}

pub fn read_file(path: &Path) -> crate::Result<String> {
    match fs::read_to_string(path) {
        Ok(v) => Ok(v),
        Err(e) => match e.kind() {
            ErrorKind::NotFound => Err(crate::Error::MissingFile(path_must_str(path).into())),
            _ => Err(e.into()),
        },
    }
}

/// Join a file name onto a directory on the device
pub fn device_join(dir: &str, name: &str) -> String {
    let dir = dir.trim_end_matches(DEVICE_PATH_SEP);
    format!("{}{}{}", dir, DEVICE_PATH_SEP, name)
}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::*;

    #[rstest]
    #[case("/data/local/tmp", "a.apk", "/data/local/tmp/a.apk")]
    #[case("/data/local/tmp/", "a.apk", "/data/local/tmp/a.apk")]
    #[case("/", "a.apk", "/a.apk")]
    fn test_device_join(#[case] dir: &str, #[case] name: &str, #[case] expected: &str) {
        assert_eq!(device_join(dir, name), expected);
    }

    #[rstest]
    fn test_read_missing_file() {
        let res = read_file(Path::new("/this/does/not/exist/polex.toml"));
        assert!(matches!(res, Err(crate::Error::MissingFile(_))));
    }
}
