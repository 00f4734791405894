//! Logging configuration
//!
//! Per-component log levels and output destinations for the stitching engine.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const VALID_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Global log level (trace, debug, info, warn, error)
    pub global_level: String,

    /// Enable console output
    pub console_output: bool,

    /// Directory for daily JSON log files (None = no file logging)
    pub log_directory: Option<PathBuf>,

    /// Include file location in logs
    pub include_file_location: bool,

    /// Level for the alignment algorithms
    pub algorithm_level: String,

    /// Level for the session controller and canvas
    pub session_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            global_level: "info".to_string(),
            console_output: true,
            log_directory: None,
            include_file_location: false,
            algorithm_level: "info".to_string(),
            session_level: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Verbose configuration for working on the estimators
    pub fn development() -> Self {
        Self {
            global_level: "debug".to_string(),
            console_output: true,
            log_directory: Some(PathBuf::from("logs")),
            include_file_location: true,
            algorithm_level: "trace".to_string(),
            session_level: "debug".to_string(),
        }
    }

    /// Warnings only, no console
    pub fn quiet() -> Self {
        Self {
            global_level: "warn".to_string(),
            console_output: false,
            log_directory: None,
            include_file_location: false,
            algorithm_level: "warn".to_string(),
            session_level: "warn".to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        for (name, level) in [
            ("global_level", &self.global_level),
            ("algorithm_level", &self.algorithm_level),
            ("session_level", &self.session_level),
        ] {
            if !VALID_LEVELS.contains(&level.as_str()) {
                return Err(format!(
                    "Invalid {}: {}. Must be one of: {:?}",
                    name, level, VALID_LEVELS
                ));
            }
        }

        if let Some(ref log_dir) = self.log_directory {
            if let Some(parent) = log_dir.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    return Err(format!("Log directory parent does not exist: {:?}", parent));
                }
            }
        }

        Ok(())
    }

    /// Get the effective log level for a specific component
    pub fn get_component_level(&self, component: &str) -> &str {
        match component {
            "algorithm" | "algorithms" => &self.algorithm_level,
            "session" | "canvas" => &self.session_level,
            _ => &self.global_level,
        }
    }

    /// `EnvFilter` directives: the crate at the global level, with the
    /// algorithm and session modules overridden.
    pub fn filter_directives(&self) -> String {
        let krate = env!("CARGO_PKG_NAME").replace('-', "_");
        format!(
            "{krate}={global},{krate}::algorithms={algorithm},{krate}::session={session},{krate}::canvas={session}",
            global = self.global_level,
            algorithm = self.algorithm_level,
            session = self.session_level,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.global_level, "info");
        assert!(config.console_output);
        assert!(config.log_directory.is_none());
        assert!(!config.include_file_location);
    }

    #[test]
    fn test_development_config() {
        let config = LoggingConfig::development();
        assert_eq!(config.global_level, "debug");
        assert_eq!(config.algorithm_level, "trace");
        assert!(config.include_file_location);
        assert!(config.log_directory.is_some());
    }

    #[test]
    fn test_config_validation() {
        let mut config = LoggingConfig::default();
        assert!(config.validate().is_ok());

        config.global_level = "invalid".to_string();
        assert!(config.validate().is_err());

        config.global_level = "debug".to_string();
        config.session_level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_component_level_selection() {
        let config = LoggingConfig::development();
        assert_eq!(config.get_component_level("algorithm"), "trace");
        assert_eq!(config.get_component_level("canvas"), "debug");
        assert_eq!(config.get_component_level("unknown"), "debug");
    }

    #[test]
    fn test_filter_directives() {
        let directives = LoggingConfig::quiet().filter_directives();
        assert!(directives.starts_with("longshot_stitch=warn"));
        assert!(directives.contains("longshot_stitch::algorithms=warn"));
    }
}
