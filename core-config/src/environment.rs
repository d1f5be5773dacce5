// =====================================================================================
// File: core-config/src/environment.rs
// Description: Environment-specific configuration management
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

use serde::{Deserialize, Serialize};
use std::env;

/// Environment types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Testing,
    Staging,
    Production,
}

impl Environment {
    /// Get current environment from environment variable
    pub fn current() -> Self {
        match env::var("DLP_ENV")
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
            .as_str()
        {
            "production" | "prod" => Environment::Production,
            "staging" | "stage" => Environment::Staging,
            "testing" | "test" => Environment::Testing,
            _ => Environment::Development,
        }
    }

    /// Check if current environment is production
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    /// Check if current environment is development
    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }

    /// Get configuration file name for this environment
    pub fn config_file_name(&self) -> &str {
        match self {
            Environment::Development => "development.toml",
            Environment::Testing => "testing.toml",
            Environment::Staging => "staging.toml",
            Environment::Production => "production.toml",
        }
    }

    /// Get log level for this environment
    pub fn default_log_level(&self) -> &str {
        match self {
            Environment::Development => "debug",
            Environment::Testing => "info",
            Environment::Staging => "info",
            Environment::Production => "warn",
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Testing => write!(f, "testing"),
            Environment::Staging => write!(f, "staging"),
            Environment::Production => write!(f, "production"),
        }
    }
}
