use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Mode;
use crate::utils::{ensure_dir_exists, path_must_str};

/// Writes one file per identifier into the output directory
#[derive(Debug, Clone)]
pub struct OutputWriter {
    dir: PathBuf,
    mode: Mode,
}

fn check_identifier(identifier: &str) -> crate::Result<()> {
    let hostile = identifier.is_empty()
        || identifier == "."
        || identifier == ".."
        || identifier.contains(|c: char| c == '/' || c == '\\' || c == '\0');
    if hostile {
        Err(crate::Error::BadIdentifier(identifier.into()))
    } else {
        Ok(())
    }
}

impl OutputWriter {
    pub fn new<P: Into<PathBuf>>(dir: P, mode: Mode) -> Self {
        Self {
            dir: dir.into(),
            mode,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// `<dir>/<identifier>.<ext>`, fails for identifiers that would escape
    /// the output directory
    pub fn path_for(&self, identifier: &str) -> crate::Result<PathBuf> {
        check_identifier(identifier)?;
        Ok(self
            .dir
            .join(format!("{}.{}", identifier, self.mode.extension())))
    }

    /// Write the body lines joined with `\n`. Existing files are replaced.
    pub fn write<S: AsRef<str>>(&self, identifier: &str, body: &[S]) -> crate::Result<PathBuf> {
        let path = self.path_for(identifier)?;
        if let Some(parent) = path.parent() {
            ensure_dir_exists(parent)?;
        }
        let content = body
            .iter()
            .map(|it| it.as_ref())
            .collect::<Vec<&str>>()
            .join("\n");
        fs::write(&path, content)?;
        log::debug!("wrote {}", path_must_str(&path));
        Ok(path)
    }
}

#[cfg(test)]
mod test {
    use crate::testing::{tmp_context, TestContext};

    use super::*;
    use rstest::*;

    #[rstest]
    fn test_policy_writes_txt(tmp_context: TestContext) {
        let writer = OutputWriter::new(tmp_context.to_abs("out"), Mode::Policy);
        let path = writer
            .write("com.example.app", &["We collect", "", "nothing."])
            .expect("write");
        assert_eq!(path, tmp_context.to_abs("out/com.example.app.txt"));
        assert_eq!(
            fs::read_to_string(&path).expect("read"),
            "We collect\n\nnothing."
        );
    }

    #[rstest]
    fn test_model_writes_xml(tmp_context: TestContext) {
        let writer = OutputWriter::new(tmp_context.to_abs("nested/out"), Mode::Model);
        let path = writer
            .write("com.example.app", &["<model/>"])
            .expect("write");
        assert_eq!(path.extension().and_then(|it| it.to_str()), Some("xml"));
        assert_eq!(fs::read_to_string(&path).expect("read"), "<model/>");
    }

    #[rstest]
    fn test_empty_body_writes_empty_file(tmp_context: TestContext) {
        let writer = OutputWriter::new(tmp_context.to_abs("out"), Mode::Policy);
        let empty: [&str; 0] = [];
        let path = writer.write("com.a", &empty).expect("write");
        assert_eq!(fs::read_to_string(&path).expect("read"), "");
    }

    #[rstest]
    fn test_rewrite_replaces(tmp_context: TestContext) {
        let writer = OutputWriter::new(tmp_context.to_abs("out"), Mode::Policy);
        writer.write("com.a", &["first", "version"]).expect("write");
        let path = writer.write("com.a", &["second"]).expect("write");
        assert_eq!(fs::read_to_string(&path).expect("read"), "second");
    }

    #[rstest]
    #[case("")]
    #[case(".")]
    #[case("..")]
    #[case("../escape")]
    #[case("a/b")]
    #[case("a\\b")]
    #[case("nul\0byte")]
    fn test_hostile_identifiers(tmp_context: TestContext, #[case] identifier: &str) {
        let writer = OutputWriter::new(tmp_context.to_abs("out"), Mode::Policy);
        match writer.write(identifier, &["body"]) {
            Err(crate::Error::BadIdentifier(id)) => assert_eq!(id, identifier),
            other => panic!("expected BadIdentifier, got {:?}", other),
        }
        assert!(!tmp_context.to_abs("out").exists());
    }
}
