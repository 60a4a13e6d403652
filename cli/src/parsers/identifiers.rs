use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::Context as AnyhowContext;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref PACKAGE_NAME: Regex =
        Regex::new(r"^[A-Za-z][A-Za-z0-9_]*(\.[A-Za-z][A-Za-z0-9_]*)+$").expect("invalid regex");
}

/// Whether `s` is a syntactically valid Android package name
pub fn is_valid_identifier(s: &str) -> bool {
    PACKAGE_NAME.is_match(s)
}

/// Identifiers after filtering user input
#[derive(Debug, Default, PartialEq, Eq)]
pub struct IdentifierSet {
    /// Valid identifiers in the order they were first seen
    pub valid: Vec<String>,
    pub rejected: Vec<String>,
}

impl IdentifierSet {
    pub fn is_empty(&self) -> bool {
        self.valid.is_empty()
    }

    /// Filter raw entries: blanks and `#` comments are skipped, invalid names
    /// are rejected and duplicates dropped
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::default();
        let mut seen = HashSet::new();

        for entry in entries {
            let trimmed = entry.as_ref().trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            if !is_valid_identifier(trimmed) {
                log::warn!("ignoring invalid package identifier {:?}", trimmed);
                set.rejected.push(trimmed.into());
                continue;
            }
            if seen.insert(trimmed.to_string()) {
                set.valid.push(trimmed.into());
            } else {
                log::debug!("dropping duplicate identifier {}", trimmed);
            }
        }
        set
    }
}

/// Read raw entries from a file, one per line
pub fn read_identifier_lines(path: &Path) -> anyhow::Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading identifiers from {}", path.to_string_lossy()))?;
    Ok(content.lines().map(String::from).collect())
}

#[cfg(test)]
mod test {
    use std::env;

    use rand::Rng;

    use super::*;
    use rstest::*;

    #[rstest]
    #[case("com.example.app", true)]
    #[case("com.Example_2.app3", true)]
    #[case("a.b", true)]
    #[case("singleword", false)]
    #[case("com..app", false)]
    #[case("1com.app", false)]
    #[case("com.1app", false)]
    #[case("com.app.", false)]
    #[case("com.app-name", false)]
    #[case("com/app", false)]
    #[case("", false)]
    fn test_is_valid_identifier(#[case] s: &str, #[case] valid: bool) {
        assert_eq!(is_valid_identifier(s), valid);
    }

    #[rstest]
    fn test_filtering() {
        let set = IdentifierSet::from_entries([
            "  com.a  ",
            "",
            "# a comment",
            "not a package",
            "com.b",
            "com.a",
            "../evil",
        ]);
        assert_eq!(set.valid, vec!["com.a", "com.b"]);
        assert_eq!(set.rejected, vec!["not a package", "../evil"]);
        assert!(!set.is_empty());
    }

    #[rstest]
    fn test_nothing_valid() {
        let set = IdentifierSet::from_entries(["", "#", "bad"]);
        assert!(set.is_empty());
    }

    #[rstest]
    fn test_read_identifier_lines() {
        let n: u64 = rand::thread_rng().gen();
        let path = env::temp_dir().join(format!("polex_cli_ids_{}.txt", n));
        fs::write(&path, "com.a\r\n# skipped\ncom.b\n").expect("write");
        let lines = read_identifier_lines(&path).expect("read");
        _ = fs::remove_file(&path);

        let set = IdentifierSet::from_entries(lines);
        assert_eq!(set.valid, vec!["com.a", "com.b"]);
    }

    #[rstest]
    fn test_read_missing_file() {
        assert!(read_identifier_lines(Path::new("/definitely/not/here.txt")).is_err());
    }
}
