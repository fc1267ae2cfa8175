//! Reader configuration, loadable from YAML.

use serde::{Deserialize, Serialize};

use crate::errors::{ErrorKind, SugarError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct ReaderOptions {
    /// Dialect primed onto every new session.
    pub base_dialect: String,
    /// Whether `extends` lists are followed when a dialect is used.
    pub allow_extends: bool,
    /// Starts a comment that never reaches the output prelude.
    pub silent_comment_marker: String,
    pub max_scope_depth: usize,
    pub max_read_depth: usize,
    pub max_macro_depth: usize,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        ReaderOptions {
            base_dialect: "core".into(),
            allow_extends: true,
            silent_comment_marker: ";".into(),
            max_scope_depth: 1024,
            max_read_depth: 128,
            max_macro_depth: 128,
        }
    }
}

impl ReaderOptions {
    pub fn from_yaml_str(text: &str) -> Result<Self, SugarError> {
        serde_yaml::from_str(text).map_err(|e| {
            SugarError::unsourced(ErrorKind::Config { message: e.to_string() }, "config")
        })
    }

    pub fn from_yaml_file(path: &std::path::Path) -> Result<Self, SugarError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            SugarError::unsourced(
                ErrorKind::Io {
                    path: path.display().to_string(),
                    message: e.to_string(),
                },
                "config",
            )
        })?;
        Self::from_yaml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let opts = ReaderOptions::from_yaml_str("base-dialect: plus\nmax-read-depth: 64\n").unwrap();
        assert_eq!(opts.base_dialect, "plus");
        assert_eq!(opts.max_read_depth, 64);
        assert_eq!(opts.silent_comment_marker, ";");
        assert!(opts.allow_extends);
    }

    #[test]
    fn unknown_keys_are_config_errors() {
        let err = ReaderOptions::from_yaml_str("bogus: 1\n").unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Config { .. }));
    }
}
