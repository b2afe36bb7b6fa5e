/// Configuration management for desvio

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Main desvio configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Instance selection configuration
    pub balancer: BalancerConfig,
    /// Backup/resilience configuration
    pub backup: BackupConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Instance selection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalancerConfig {
    /// Weight assigned to instances that advertise none
    pub default_weight: u32,
    /// Upper clamp for advertised weights
    pub max_weight: u32,
    /// Service name appended to stack paths before lookup
    pub service_name: String,
}

/// Backup/resilience configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Root directory for file-backed stores
    pub base_path: String,
    /// Application name; per-application entities land in this subdirectory
    pub app_name: String,
    /// Applications whose stacks are dropped when restoring a snapshot
    #[serde(default)]
    pub excluded_apps: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Log format (json, text)
    pub format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            balancer: BalancerConfig {
                default_weight: 5,
                max_weight: 100,
                service_name: "xre".to_string(),
            },
            backup: BackupConfig {
                base_path: "/var/lib/desvio/backup".to_string(),
                app_name: "default".to_string(),
                excluded_apps: Vec::new(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "text".to_string(),
            },
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.balancer.default_weight == 0 {
            return Err(ConfigError::ValidationError(
                "default_weight must be greater than 0".to_string(),
            ));
        }

        if self.balancer.max_weight < self.balancer.default_weight {
            return Err(ConfigError::ValidationError(
                "max_weight must not be less than default_weight".to_string(),
            ));
        }

        if self.balancer.service_name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }

        if self.backup.base_path.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "backup base_path cannot be empty".to_string(),
            ));
        }

        if self.backup.app_name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "backup app_name cannot be empty".to_string(),
            ));
        }

        match self.logging.level.as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => {}
            _ => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log level: {}",
                    self.logging.level
                )))
            }
        }

        match self.logging.format.as_str() {
            "json" | "text" => {}
            _ => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log format: {}",
                    self.logging.format
                )))
            }
        }

        Ok(())
    }

    /// Create example configuration file
    pub fn create_example_config<P: AsRef<Path>>(path: P) -> Result<(), ConfigError> {
        let config = Config {
            balancer: BalancerConfig {
                default_weight: 5,
                max_weight: 100,
                service_name: "xre".to_string(),
            },
            backup: BackupConfig {
                base_path: "/var/lib/desvio/backup".to_string(),
                app_name: "xreGuide".to_string(),
                excluded_apps: vec!["xreTest".to_string()],
            },
            ..Default::default()
        };

        config.save_to_file(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        // Test invalid default_weight
        config.balancer.default_weight = 0;
        assert!(config.validate().is_err());

        config.balancer.default_weight = 5;
        assert!(config.validate().is_ok());

        // max_weight below default_weight is rejected
        config.balancer.max_weight = 2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_empty_service_name() {
        let mut config = Config::default();
        config.balancer.service_name = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_log_level() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed_config: Config = toml::from_str(&toml_str).unwrap();
        assert!(parsed_config.validate().is_ok());
    }

    #[test]
    fn test_config_file_operations() {
        let config = Config::default();
        let temp_file = NamedTempFile::new().unwrap();

        // Test save and load
        config.save_to_file(temp_file.path()).unwrap();
        let loaded_config = Config::load_from_file(temp_file.path()).unwrap();
        assert!(loaded_config.validate().is_ok());
    }

    #[test]
    fn test_create_example_config() {
        let temp_file = NamedTempFile::new().unwrap();
        Config::create_example_config(temp_file.path()).unwrap();

        let loaded = Config::load_from_file(temp_file.path()).unwrap();
        assert_eq!(loaded.backup.excluded_apps, vec!["xreTest".to_string()]);
    }
}
