//! Runtime Configuration
//!
//! Handles parsing and management of sealvm.toml configuration files.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Invalid random seed: {0}")]
    Seed(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Root configuration structure matching sealvm.toml.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VmConfig {
    /// Sandbox and isolation settings
    #[serde(default)]
    pub security: SecurityConfig,

    /// Randomness source settings
    #[serde(default)]
    pub rng: RngConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl VmConfig {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        let config: VmConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from the current directory or parents.
    pub fn load_from_cwd() -> ConfigResult<Self> {
        let cwd = std::env::current_dir().map_err(ConfigError::Io)?;
        Self::find_and_load(&cwd)
    }

    /// Find and load configuration by searching up from the given directory.
    pub fn find_and_load(start_dir: &Path) -> ConfigResult<Self> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let config_path = dir.join("sealvm.toml");
            if config_path.exists() {
                return Self::load(&config_path);
            }
            if !dir.pop() {
                // Reached root without finding config
                return Ok(Self::default());
            }
        }
    }

    /// Decode the configured deterministic seed, if any.
    pub fn seed_bytes(&self) -> ConfigResult<Option<Vec<u8>>> {
        match &self.rng.seed {
            None => Ok(None),
            Some(seed) => {
                let bytes =
                    hex::decode(seed.trim()).map_err(|e| ConfigError::Seed(e.to_string()))?;
                if bytes.is_empty() {
                    return Err(ConfigError::Seed("seed must not be empty".to_string()));
                }
                Ok(Some(bytes))
            }
        }
    }
}

/// Sandbox and isolation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Fork and seal script execution behind the syscall filter
    #[serde(default = "default_true")]
    pub isolation: bool,
}

fn default_true() -> bool {
    true
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self { isolation: true }
    }
}

/// Randomness source settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RngConfig {
    /// Hex-encoded deterministic seed; omit for the system entropy source
    #[serde(default)]
    pub seed: Option<String>,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log filter when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = VmConfig::default();
        assert!(config.security.isolation);
        assert!(config.rng.seed.is_none());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_config() {
        let toml_str = r#"
[security]
isolation = false

[rng]
seed = "deadbeef"

[logging]
level = "debug"
"#;
        let config: VmConfig = toml::from_str(toml_str).unwrap();
        assert!(!config.security.isolation);
        assert_eq!(config.rng.seed.as_deref(), Some("deadbeef"));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_seed_decoding() {
        let mut config = VmConfig::default();
        assert!(config.seed_bytes().unwrap().is_none());

        config.rng.seed = Some("cafe".to_string());
        assert_eq!(config.seed_bytes().unwrap(), Some(vec![0xca, 0xfe]));

        config.rng.seed = Some("not hex".to_string());
        assert!(matches!(config.seed_bytes(), Err(ConfigError::Seed(_))));
    }
}
