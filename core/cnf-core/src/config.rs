//! Configuration loading for winget-cnf.
//!
//! The config lives at `~/.winget-cnf/config.toml` unless `WINGET_CNF_CONFIG`
//! points elsewhere. Every field has a default so a missing file is valid.

use crate::error::{CnfError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_ENV: &str = "WINGET_CNF_CONFIG";
const CONFIG_RELATIVE_PATH: &str = ".winget-cnf/config.toml";

pub const DEFAULT_MAX_SUGGESTIONS: usize = 20;
pub const DEFAULT_SOURCE: &str = "winget";
const DEFAULT_POOL_SIZE: usize = 1;
const DEFAULT_QUERY_TIMEOUT_MS: u64 = 3_000;
const DEFAULT_WARMUP_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CnfConfig {
    /// Result count above which the "more results" footer is shown.
    pub max_suggestions: usize,
    /// Trusted package source every query is filtered to.
    pub source: String,
    /// Number of idle sessions the pool retains.
    pub pool_size: usize,
    pub query_timeout_ms: u64,
    pub warmup_timeout_ms: u64,
    /// Explicit package-manager executable; probed on PATH when unset.
    pub winget_path: Option<PathBuf>,
}

impl Default for CnfConfig {
    fn default() -> Self {
        Self {
            max_suggestions: DEFAULT_MAX_SUGGESTIONS,
            source: DEFAULT_SOURCE.to_string(),
            pool_size: DEFAULT_POOL_SIZE,
            query_timeout_ms: DEFAULT_QUERY_TIMEOUT_MS,
            warmup_timeout_ms: DEFAULT_WARMUP_TIMEOUT_MS,
            winget_path: None,
        }
    }
}

impl CnfConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn warmup_timeout(&self) -> Duration {
        Duration::from_millis(self.warmup_timeout_ms)
    }

    /// Pool retention never drops below one session.
    pub fn effective_pool_size(&self) -> usize {
        self.pool_size.max(1)
    }
}

/// Returns the config path, honoring `WINGET_CNF_CONFIG`.
pub fn default_config_path() -> Option<PathBuf> {
    if let Ok(path) = env::var(CONFIG_ENV) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    dirs::home_dir().map(|home| home.join(CONFIG_RELATIVE_PATH))
}

/// Loads config from `path`; a missing file yields defaults.
pub fn load_config_from(path: &Path) -> Result<CnfConfig> {
    if !path.exists() {
        return Ok(CnfConfig::default());
    }

    let content = fs_err::read_to_string(path).map_err(|source| CnfError::Io {
        context: format!("reading config {}", path.display()),
        source,
    })?;
    toml::from_str::<CnfConfig>(&content).map_err(|err| CnfError::ConfigMalformed {
        path: path.to_path_buf(),
        details: err.to_string(),
    })
}

/// Loads the default config, falling back to defaults on any error.
pub fn load_config() -> CnfConfig {
    let Some(path) = default_config_path() else {
        return CnfConfig::default();
    };

    match load_config_from(&path) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(error = %err, "Failed to load config; using defaults");
            CnfConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let config = load_config_from(&temp_dir.path().join("missing.toml")).expect("load");
        assert_eq!(config, CnfConfig::default());
        assert_eq!(config.max_suggestions, 20);
        assert_eq!(config.source, "winget");
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("config.toml");
        fs_err::write(
            &path,
            r#"
max_suggestions = 5
winget_path = 'C:\Tools\winget.exe'
"#,
        )
        .expect("write config");

        let config = load_config_from(&path).expect("load");
        assert_eq!(config.max_suggestions, 5);
        assert_eq!(config.source, DEFAULT_SOURCE);
        assert_eq!(config.query_timeout(), Duration::from_millis(3_000));
        assert_eq!(
            config.winget_path,
            Some(PathBuf::from(r"C:\Tools\winget.exe"))
        );
    }

    #[test]
    fn malformed_file_is_reported() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("config.toml");
        fs_err::write(&path, "max_suggestions = \"lots\"").expect("write config");

        let err = load_config_from(&path).unwrap_err();
        assert!(matches!(err, CnfError::ConfigMalformed { .. }));
    }

    #[test]
    fn pool_size_is_at_least_one() {
        let config = CnfConfig {
            pool_size: 0,
            ..CnfConfig::default()
        };
        assert_eq!(config.effective_pool_size(), 1);
    }
}
