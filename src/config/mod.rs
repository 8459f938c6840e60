//! JSON configuration file.
//!
//! ```json
//! {
//!   "complete": {
//!     "url": "http://localhost:9090",
//!     "offline": false,
//!     "lookback": 43200,
//!     "cache_max_age": 300
//!   },
//!   "log_level": "debug"
//! }
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::complete::CompleteConfiguration;
use crate::errors::{PromqlError, PromqlResult};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "PROMQL_EDITOR_CONFIG";

/// File looked up in the working directory
pub const CONFIG_FILE: &str = "promql-editor.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub complete: CompleteConfiguration,
    /// `tracing` filter directive; `RUST_LOG` applies when unset
    pub log_level: Option<String>,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> PromqlResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| PromqlError::io_error(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&content).map_err(|e| {
            PromqlError::config(
                format!("{}: {}", path.display(), e),
                "the config file must be a JSON object",
            )
        })
    }

    /// Load from `$PROMQL_EDITOR_CONFIG`, then `./promql-editor.json`, else defaults
    pub fn load() -> PromqlResult<Self> {
        if let Ok(path) = env::var(CONFIG_ENV) {
            return Self::from_file(path);
        }
        let local = PathBuf::from(CONFIG_FILE);
        if local.exists() {
            return Self::from_file(local);
        }
        Ok(Self::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_from_file() {
        let file = write_config(
            r#"{"complete": {"url": "http://prom:9090", "offline": false}, "log_level": "debug"}"#,
        );
        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.complete.url, "http://prom:9090");
        assert!(!config.complete.offline);
        assert_eq!(config.complete.limit, 100);
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_empty_object_is_default() {
        let file = write_config("{}");
        assert_eq!(Config::from_file(file.path()).unwrap(), Config::default());
    }

    #[test]
    fn test_invalid_json() {
        let file = write_config("complete = 1");
        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(err, PromqlError::Config { .. }));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::from_file(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, PromqlError::IoError { .. }));
    }
}
