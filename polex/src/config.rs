use std::fmt::Display;
use std::str::FromStr;

use serde::Serialize;

/// What the harness extracts from each application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Mode {
    /// Plain privacy policy text
    Policy,
    /// A structural model of the policy screens, serialized as XML
    Model,
}

impl Mode {
    pub fn from_model_flag(model: bool) -> Self {
        if model {
            Self::Model
        } else {
            Self::Policy
        }
    }

    /// Extension of the files written for this mode
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Model => "xml",
            Self::Policy => "txt",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Policy => "POLICY",
            Self::Model => "MODEL",
        }
    }
}

impl Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Search strategy the harness uses inside each application. The host only
/// passes the label through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Algorithm {
    Dfs,
    Bfs,
    /// Random search
    Rs,
    /// Optimized search
    #[default]
    Os,
}

impl Algorithm {
    pub const ALL: [Algorithm; 4] = [Self::Dfs, Self::Bfs, Self::Rs, Self::Os];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Dfs => "DFS",
            Self::Bfs => "BFS",
            Self::Rs => "RS",
            Self::Os => "OS",
        }
    }

    /// Resolve a user supplied label, falling back to the optimized search
    /// with a warning if the label isn't known.
    pub fn resolve(label: Option<&str>) -> Self {
        match label {
            None => Self::default(),
            Some(s) => match s.parse() {
                Ok(v) => v,
                Err(_) => {
                    log::warn!(
                        "unknown algorithm `{}`, falling back to {}",
                        s,
                        Self::default()
                    );
                    Self::default()
                }
            },
        }
    }
}

impl FromStr for Algorithm {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .iter()
            .find(|it| it.label().eq_ignore_ascii_case(trimmed))
            .copied()
            .ok_or_else(|| crate::Error::Generic(format!("invalid algorithm {}", s)))
    }
}

impl Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// The immutable configuration of a single extraction run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Config {
    pub mode: Mode,
    pub algorithm: Algorithm,
    pub device: String,
}

impl Config {
    pub fn new(mode: Mode, algorithm: Algorithm, device: impl Into<String>) -> Self {
        Self {
            mode,
            algorithm,
            device: device.into(),
        }
    }
}

#[cfg(test)]
mod test {
    use crate::testing::capture_logs;

    use super::*;
    use rstest::*;

    #[rstest]
    #[case(Some("dfs"), Algorithm::Dfs)]
    #[case(Some("BFS"), Algorithm::Bfs)]
    #[case(Some(" rs "), Algorithm::Rs)]
    #[case(Some("OS"), Algorithm::Os)]
    #[case(Some("xyz"), Algorithm::Os)]
    #[case(Some(""), Algorithm::Os)]
    #[case(None, Algorithm::Os)]
    fn test_resolve_algorithm(#[case] label: Option<&str>, #[case] expected: Algorithm) {
        assert_eq!(Algorithm::resolve(label), expected);
    }

    #[rstest]
    #[case("xyz", 1)]
    #[case("bfs", 0)]
    fn test_resolve_warns_on_fallback(#[case] label: &str, #[case] warnings: usize) {
        let (algo, logged) = capture_logs(log::Level::Warn, || Algorithm::resolve(Some(label)));
        assert_eq!(logged.len(), warnings);
        if warnings > 0 {
            assert_eq!(algo, Algorithm::Os);
            assert!(logged[0].contains("unknown algorithm `xyz`"));
        }
    }

    #[rstest]
    fn test_unknown_algorithm_is_an_error() {
        assert!("xyz".parse::<Algorithm>().is_err());
    }

    #[rstest]
    fn test_mode_extension() {
        assert_eq!(Mode::Model.extension(), "xml");
        assert_eq!(Mode::Policy.extension(), "txt");
        assert_eq!(Mode::from_model_flag(true), Mode::Model);
        assert_eq!(Mode::from_model_flag(false).to_string(), "POLICY");
    }
}
