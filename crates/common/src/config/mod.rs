//! Configuration management for RagBridge
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// File Search provider configuration
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Document intake configuration
    #[serde(default)]
    pub intake: IntakeConfig,

    /// Search orchestration configuration
    #[serde(default)]
    pub search: SearchConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    /// Provider backend: gemini, mock
    #[serde(default = "default_provider_kind")]
    pub kind: String,

    /// API key for the File Search provider
    pub api_key: Option<String>,

    /// API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Generation model
    #[serde(default = "default_model")]
    pub model: String,

    /// Request timeout in seconds
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries for transient request failures.
    /// 0 disables retrying entirely; no retry policy is assumed on
    /// behalf of the operator.
    #[serde(default)]
    pub max_retries: u32,

    /// Initial interval between upload-operation polls, in seconds
    #[serde(default = "default_poll_initial")]
    pub poll_initial_interval_secs: u64,

    /// Ceiling for the poll interval as it backs off, in seconds
    #[serde(default = "default_poll_max")]
    pub poll_max_interval_secs: u64,

    /// Overall deadline for an upload operation to complete, in seconds
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IntakeConfig {
    /// Maximum accepted file size in megabytes
    #[serde(default = "default_max_file_size")]
    pub max_file_size_mb: u64,

    /// Tokens per chunk when custom chunking is requested
    #[serde(default = "default_chunk_tokens")]
    pub max_tokens_per_chunk: u32,

    /// Token overlap between adjacent chunks
    #[serde(default = "default_chunk_overlap")]
    pub max_overlap_tokens: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    /// Delay between queries in a batch, in seconds (courtesy throttle
    /// for the provider's rate limits)
    #[serde(default = "default_batch_delay")]
    pub batch_delay_secs: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_rate_limit_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8000 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_provider_kind() -> String { "gemini".to_string() }
fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_model() -> String { crate::DEFAULT_MODEL.to_string() }
fn default_provider_timeout() -> u64 { 120 }
fn default_poll_initial() -> u64 { 2 }
fn default_poll_max() -> u64 { 30 }
fn default_poll_timeout() -> u64 { 600 }
fn default_max_file_size() -> u64 { 50 }
fn default_chunk_tokens() -> u32 { 200 }
fn default_chunk_overlap() -> u32 { 20 }
fn default_batch_delay() -> f64 { 1.0 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { false }
fn default_metrics_port() -> u16 { 9090 }
fn default_rate_limit() -> u32 { 50 }
fn default_burst() -> u32 { 100 }
fn default_rate_limit_enabled() -> bool { false }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables with APP__ prefix
            // e.g., APP__PROVIDER__API_KEY=...
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get the provider request timeout as Duration
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider.timeout_secs)
    }

    /// Get the batch inter-query delay as Duration
    pub fn batch_delay(&self) -> Duration {
        Duration::from_secs_f64(self.search.batch_delay_secs)
    }

    /// Maximum accepted file size in bytes
    pub fn max_file_size_bytes(&self) -> u64 {
        self.intake.max_file_size_mb * 1024 * 1024
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: default_provider_kind(),
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            timeout_secs: default_provider_timeout(),
            max_retries: 0,
            poll_initial_interval_secs: default_poll_initial(),
            poll_max_interval_secs: default_poll_max(),
            poll_timeout_secs: default_poll_timeout(),
        }
    }
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: default_max_file_size(),
            max_tokens_per_chunk: default_chunk_tokens(),
            max_overlap_tokens: default_chunk_overlap(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            batch_delay_secs: default_batch_delay(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: default_rate_limit_enabled(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            provider: ProviderConfig::default(),
            intake: IntakeConfig::default(),
            search: SearchConfig::default(),
            observability: ObservabilityConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.provider.model, crate::DEFAULT_MODEL);
        assert_eq!(config.provider.max_retries, 0);
        assert_eq!(config.intake.max_file_size_mb, 50);
    }

    #[test]
    fn test_size_and_duration_helpers() {
        let config = AppConfig::default();
        assert_eq!(config.max_file_size_bytes(), 50 * 1024 * 1024);
        assert_eq!(config.batch_delay(), Duration::from_secs(1));
    }
}
