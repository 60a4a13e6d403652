use std::borrow::Cow;
use std::{
    env,
    fs::File,
    io::{self, Read, Write},
    path::{Path, PathBuf},
    process::Command,
};

fn main() {
    println!("cargo:rerun-if-env-changed=POLEX_GIT_REVISION");
    match write_version_file() {
        Ok(_) => {}
        Err(e) => panic!("Failed to create a version file: {:?}", e),
    }
}

fn env_path(key: &str) -> io::Result<PathBuf> {
    env::var(key)
        .map(PathBuf::from)
        .map_err(|e| io::Error::new(io::ErrorKind::NotFound, format!("{}: {}", key, e)))
}

fn write_version_file() -> io::Result<()> {
    let version = env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| String::from("0.0.0"));
    let out_dir = env_path("OUT_DIR")?;

    let mut simple_version_file = File::create(out_dir.join("simple_version_string"))?;
    write!(&mut simple_version_file, "\"{}\"", version)?;

    let target = env::var("TARGET").unwrap_or_else(|_| String::from("unknown"));
    let mut version_file = File::create(out_dir.join("version_string"))?;
    let git_rev = match get_git_rev() {
        Ok(v) if !v.trim().is_empty() => Cow::Owned(v),
        _ => Cow::Borrowed("unknown"),
    };
    write!(
        &mut version_file,
        "r#\"polex {} ({})\nrev {}\"#",
        version,
        target,
        git_rev.trim(),
    )?;
    Ok(())
}

fn get_git_rev() -> io::Result<String> {
    if let Ok(rev) = env::var("POLEX_GIT_REVISION") {
        return Ok(rev);
    }
    Command::new("git")
        .arg("rev-parse")
        .arg("HEAD")
        .output()
        .and_then(|out| {
            if !out.status.success() {
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    "git rev-parse HEAD failed",
                ));
            }
            String::from_utf8(out.stdout).map_err(|_| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    "git rev-parse HEAD output was not UTF-8",
                )
            })
        })
        .or_else(|_| git_rev_from_file())
}

fn git_rev_from_file() -> io::Result<String> {
    let manifest_dir = env_path("CARGO_MANIFEST_DIR")?;
    let git_file = Path::new(&manifest_dir).join("../.git/refs/heads/main");
    let mut file = File::open(git_file)?;
    let mut rev = String::new();
    file.read_to_string(&mut rev)?;
    Ok(rev)
}
