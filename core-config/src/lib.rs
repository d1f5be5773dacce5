// =====================================================================================
// File: core-config/src/lib.rs
// Description: Centralized configuration management for SentinelDLP platform
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

pub mod environment;

pub use environment::Environment;

use config::{Config, ConfigError, Environment as EnvSource, File};
use core_utils::Validate as FieldCheck;
use serde::{Deserialize, Serialize};
use std::env;
use tracing::{info, warn};
use validator::Validate;

/// Application configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub pipeline: PipelineConfig,
    pub classifier: ClassifierConfig,
    pub policies: PolicyStoreConfig,
    pub siem: SiemSettings,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

/// Event pipeline tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Number of pipeline workers; defaults to the CPU count when absent
    pub workers: Option<usize>,
    /// Capacity of the bounded ingress queue
    pub queue_capacity: usize,
    /// Events with larger content are rejected at validation
    pub max_content_size: usize,
    /// Text fields longer than this are truncated during normalization
    pub max_text_field_chars: usize,
    /// Soft timeouts per stage, in milliseconds
    pub validate_timeout_ms: u64,
    pub normalize_timeout_ms: u64,
    pub enrich_timeout_ms: u64,
    pub classify_timeout_ms: u64,
    pub evaluate_timeout_ms: u64,
    pub act_timeout_ms: u64,
    /// Whole-event deadline, in milliseconds
    pub event_deadline_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: None,
            queue_capacity: 1024,
            max_content_size: 1024 * 1024, // 1 MiB
            max_text_field_chars: 4096,
            validate_timeout_ms: 50,
            normalize_timeout_ms: 50,
            enrich_timeout_ms: 50,
            classify_timeout_ms: 200,
            evaluate_timeout_ms: 100,
            act_timeout_ms: 5_000,
            event_deadline_ms: 10_000,
        }
    }
}

/// Content classification settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Hits below this confidence are discarded before policy evaluation
    pub min_confidence: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
        }
    }
}

/// Policy catalog source settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyStoreConfig {
    /// Directory scanned for policy files (.yml / .yaml)
    pub directory: String,
    /// Enable the filesystem watcher for hot reload
    pub watch: bool,
    /// Watcher poll interval in seconds
    pub watch_interval_seconds: u64,
}

impl Default for PolicyStoreConfig {
    fn default() -> Self {
        Self {
            directory: "policies".to_string(),
            watch: false,
            watch_interval_seconds: 30,
        }
    }
}

/// SIEM integration settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiemSettings {
    pub connectors: Vec<SiemConnectorConfig>,
}

/// Closed configuration record for one SIEM connector.
///
/// Credentials may be absent when the transport supports an unauthenticated
/// test-only mode.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SiemConnectorConfig {
    #[validate(length(min = 1))]
    pub name: String,
    /// One of: elk, splunk, qradar, sentinel, wazuh, custom
    #[validate(length(min = 1))]
    pub siem_type: String,
    #[validate(length(min = 1))]
    pub host: String,
    #[validate(range(min = 1, max = 65535))]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub api_key: Option<String>,
    pub hec_token: Option<String>,
    pub use_ssl: bool,
    pub verify_certs: bool,
    /// ELK daily-index prefix, e.g. `dlp-events`
    pub index_prefix: Option<String>,
    /// Splunk target index
    pub index: Option<String>,
    pub source: Option<String>,
    pub sourcetype: Option<String>,
}

impl Default for SiemConnectorConfig {
    fn default() -> Self {
        Self {
            name: "ELK Stack".to_string(),
            siem_type: "elk".to_string(),
            host: "localhost".to_string(),
            port: 9200,
            username: None,
            password: None,
            api_key: None,
            hec_token: None,
            use_ssl: true,
            verify_certs: true,
            index_prefix: Some("dlp-events".to_string()),
            index: None,
            source: Some("sentinel_dlp".to_string()),
            sourcetype: Some("dlp:event".to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub tracing: TracingConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TracingConfig {
    pub level: String,
    pub service_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                workers: None,
            },
            pipeline: PipelineConfig::default(),
            classifier: ClassifierConfig::default(),
            policies: PolicyStoreConfig::default(),
            siem: SiemSettings::default(),
            observability: ObservabilityConfig {
                tracing: TracingConfig {
                    level: "info".to_string(),
                    service_name: "sentinel-dlp".to_string(),
                },
                metrics: MetricsConfig {
                    enabled: true,
                    endpoint: "/metrics".to_string(),
                    port: 9090,
                },
            },
        }
    }
}

/// Configuration loader with environment override support
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<AppConfig, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        info!("Loading configuration for environment: {}", run_mode);

        let config = Config::builder()
            // Start with default configuration
            .add_source(Config::try_from(&AppConfig::default())?)
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load local config file (for development overrides)
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (with DLP_ prefix)
            .add_source(EnvSource::with_prefix("DLP").separator("__"))
            .build()?;

        let app_config: AppConfig = config.try_deserialize()?;

        Self::validate_config(&app_config)?;

        info!("Configuration loaded successfully");
        Ok(app_config)
    }

    /// Validate critical configuration values
    fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
        FieldCheck::range_f64(
            config.classifier.min_confidence,
            "classifier.min_confidence",
            0.0,
            1.0,
        )
        .map_err(|e| ConfigError::Message(e.to_string()))?;

        FieldCheck::not_empty(&config.policies.directory, "policies.directory")
            .map_err(|e| ConfigError::Message(e.to_string()))?;

        if config.pipeline.queue_capacity == 0 {
            return Err(ConfigError::Message(
                "pipeline.queue_capacity must be greater than zero".to_string(),
            ));
        }

        for connector in &config.siem.connectors {
            connector.validate().map_err(|e| {
                ConfigError::Message(format!("siem connector '{}': {}", connector.name, e))
            })?;
            if connector.siem_type == "splunk" && connector.hec_token.is_none() {
                warn!(
                    connector = %connector.name,
                    "Splunk connector configured without HEC token - ingestion will run unauthenticated"
                );
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.pipeline.max_content_size, 1024 * 1024);
        assert_eq!(config.classifier.min_confidence, 0.5);
        assert_eq!(config.pipeline.act_timeout_ms, 5_000);
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: AppConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config.server.port, deserialized.server.port);
        assert_eq!(
            config.pipeline.queue_capacity,
            deserialized.pipeline.queue_capacity
        );
    }

    #[test]
    fn test_validate_rejects_bad_confidence() {
        let mut config = AppConfig::default();
        config.classifier.min_confidence = 1.5;
        assert!(ConfigLoader::validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_rejects_zero_queue() {
        let mut config = AppConfig::default();
        config.pipeline.queue_capacity = 0;
        assert!(ConfigLoader::validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_rejects_empty_policy_directory() {
        let mut config = AppConfig::default();
        config.policies.directory = "  ".to_string();
        assert!(ConfigLoader::validate_config(&config).is_err());
    }

    #[test]
    fn test_connector_config_validation() {
        let mut connector = SiemConnectorConfig::default();
        assert!(connector.validate().is_ok());

        connector.name = String::new();
        assert!(connector.validate().is_err());
    }
}
