//! Configuration loading.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cdrdao::{DEFAULT_BINARY, MAX_CRC_ERRORS};

/// Error type for configuration loading.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    /// The config file is not valid TOML.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Tool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisctocConfig {
    /// Name or path of the cdrdao binary.
    #[serde(default = "default_binary")]
    pub binary: String,
    /// Use fast-toc mode by default.
    #[serde(default)]
    pub fast_toc: bool,
    /// Cumulative CRC error count past which a read is aborted.
    #[serde(default = "default_max_crc_errors")]
    pub max_crc_errors: u32,
}

fn default_binary() -> String {
    DEFAULT_BINARY.to_string()
}

fn default_max_crc_errors() -> u32 {
    MAX_CRC_ERRORS
}

impl Default for DisctocConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            fast_toc: false,
            max_crc_errors: default_max_crc_errors(),
        }
    }
}

/// Default config file location under the platform config directory.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("disctoc").join("config.toml"))
}

/// Load configuration from `path`, or from the default location, falling
/// back to defaults when no file exists.
///
/// # Errors
///
/// Returns `ConfigError` if an existing file cannot be read or parsed. A
/// missing default-location file is not an error.
pub async fn load(path: Option<&Path>) -> Result<DisctocConfig, ConfigError> {
    let path = match path {
        Some(explicit) => explicit.to_path_buf(),
        None => match default_config_path() {
            Some(default) if default.exists() => default,
            _ => return Ok(DisctocConfig::default()),
        },
    };

    let text = tokio::fs::read_to_string(&path).await?;
    let config = toml::from_str(&text)?;
    tracing::debug!(path = %path.display(), "loaded configuration");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DisctocConfig::default();
        assert_eq!(config.binary, "cdrdao");
        assert!(!config.fast_toc);
        assert_eq!(config.max_crc_errors, 100);
    }

    #[test]
    fn test_parse_partial_toml_fills_defaults() {
        let config: DisctocConfig = toml::from_str("fast_toc = true\n").unwrap();
        assert!(config.fast_toc);
        assert_eq!(config.binary, "cdrdao");
        assert_eq!(config.max_crc_errors, 100);
    }

    #[tokio::test]
    async fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        tokio::fs::write(&path, "binary = \"/opt/cdrdao/bin/cdrdao\"\nmax_crc_errors = 5\n")
            .await
            .unwrap();

        let config = load(Some(&path)).await.unwrap();
        assert_eq!(config.binary, "/opt/cdrdao/bin/cdrdao");
        assert_eq!(config.max_crc_errors, 5);
    }

    #[tokio::test]
    async fn test_load_missing_explicit_file_is_error() {
        let result = load(Some(Path::new("/nonexistent/config.toml"))).await;
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[tokio::test]
    async fn test_load_invalid_toml_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        tokio::fs::write(&path, "fast_toc = {").await.unwrap();

        let result = load(Some(&path)).await;
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
