//! Configuration loading and constants.
//!
//! Loads application configuration from TOML files and defines constants for
//! the health route, logging defaults and the health stack's resource
//! settings. `AppConfig` is the root configuration struct containing all
//! settings; every table except `[http]` may be omitted.

use std::collections::BTreeMap;
use std::path::Path;

use const_format::formatcp;
use serde::Deserialize;

// =============================================================================
// Health Route
// =============================================================================

/// Path of the liveness route
pub const HEALTH_PATH: &str = "/health";

/// Value of the `health` field in the liveness payload
pub const HEALTH_OK: &str = "OK";

/// Liveness responses must never be served from a cache
pub const CACHE_CONTROL_HEALTH: &str = "no-store";

/// Header carrying the request ID in both directions
pub const REQUEST_ID_HEADER: &str = "x-request-id";

// =============================================================================
// Server Defaults
// =============================================================================

pub const DEFAULT_HTTP_HOST: &str = "0.0.0.0";
pub const DEFAULT_HTTP_PORT: u16 = 8000;

/// Seconds to wait for in-flight requests after a shutdown signal
pub const SHUTDOWN_GRACE_SECS: u64 = 30;

// =============================================================================
// Default Paths and Strings
// =============================================================================

/// Default configuration file path
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

pub const CRATE_NAME: &str = env!("CARGO_CRATE_NAME");

/// Default log filter when RUST_LOG is not set
pub const DEFAULT_LOG_FILTER: &str = formatcp!("{}=debug,tower_http=debug", CRATE_NAME);

// =============================================================================
// Health Stack Defaults
// =============================================================================

pub const DEFAULT_REGION: &str = "us-east-1";

/// Account used when simulating an apply
pub const DEFAULT_ACCOUNT_ID: &str = "123456789012";

pub const DEFAULT_LOG_GROUP_NAME: &str = "health_api";
pub const DEFAULT_LAMBDA_CODE_PATH: &str = "../../dist/lambda.zip";
pub const DEFAULT_LAMBDA_HANDLER: &str = "app.lambda.handler";
pub const DEFAULT_LAMBDA_RUNTIME: &str = "python3.8";
pub const DEFAULT_STAGE_NAME: &str = "test";
pub const DEFAULT_METHOD_LOGGING_LEVEL: &str = "INFO";

/// Logging levels API Gateway accepts for method settings
pub const METHOD_LOGGING_LEVELS: [&str; 3] = ["OFF", "ERROR", "INFO"];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// HTTP server configuration
    #[serde(default)]
    pub http: HttpServerConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Resource settings for the deployment graph
    #[serde(default)]
    pub stack: StackConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
    #[serde(default = "HttpServerConfig::default_host")]
    pub host: String,
    #[serde(default = "HttpServerConfig::default_port")]
    pub port: u16,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
        }
    }
}

impl HttpServerConfig {
    fn default_host() -> String {
        DEFAULT_HTTP_HOST.to_string()
    }

    fn default_port() -> u16 {
        DEFAULT_HTTP_PORT
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable
    #[default]
    Text,
    /// Structured, one JSON object per line
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

/// How the API deployment decides it must be redeployed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeploymentTrigger {
    /// Current time: redeploys on every run
    #[default]
    Timestamp,
    /// SHA-256 of the API resource, method and integration declarations
    ContentHash,
    /// No trigger: redeploys only when the deployment itself changes
    None,
}

/// Settings of the health stack's resources
#[derive(Debug, Clone, Deserialize)]
pub struct StackConfig {
    #[serde(default = "StackConfig::default_region")]
    pub region: String,
    #[serde(default = "StackConfig::default_account_id")]
    pub account_id: String,
    /// CloudWatch log group name
    #[serde(default = "StackConfig::default_log_group_name")]
    pub log_group_name: String,
    /// Path of the packaged Lambda archive
    #[serde(default = "StackConfig::default_lambda_code_path")]
    pub lambda_code_path: String,
    #[serde(default = "StackConfig::default_lambda_handler")]
    pub lambda_handler: String,
    #[serde(default = "StackConfig::default_lambda_runtime")]
    pub lambda_runtime: String,
    #[serde(default = "StackConfig::default_lambda_environment")]
    pub lambda_environment: BTreeMap<String, String>,
    #[serde(default = "StackConfig::default_stage_name")]
    pub stage_name: String,
    #[serde(default = "StackConfig::default_true")]
    pub xray_tracing: bool,
    #[serde(default = "StackConfig::default_true")]
    pub metrics_enabled: bool,
    /// Method logging level: OFF, ERROR or INFO
    #[serde(default = "StackConfig::default_logging_level")]
    pub logging_level: String,
    #[serde(default)]
    pub deployment_trigger: DeploymentTrigger,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            region: Self::default_region(),
            account_id: Self::default_account_id(),
            log_group_name: Self::default_log_group_name(),
            lambda_code_path: Self::default_lambda_code_path(),
            lambda_handler: Self::default_lambda_handler(),
            lambda_runtime: Self::default_lambda_runtime(),
            lambda_environment: Self::default_lambda_environment(),
            stage_name: Self::default_stage_name(),
            xray_tracing: true,
            metrics_enabled: true,
            logging_level: Self::default_logging_level(),
            deployment_trigger: DeploymentTrigger::default(),
        }
    }
}

impl StackConfig {
    fn default_region() -> String {
        DEFAULT_REGION.to_string()
    }
    fn default_account_id() -> String {
        DEFAULT_ACCOUNT_ID.to_string()
    }
    fn default_log_group_name() -> String {
        DEFAULT_LOG_GROUP_NAME.to_string()
    }
    fn default_lambda_code_path() -> String {
        DEFAULT_LAMBDA_CODE_PATH.to_string()
    }
    fn default_lambda_handler() -> String {
        DEFAULT_LAMBDA_HANDLER.to_string()
    }
    fn default_lambda_runtime() -> String {
        DEFAULT_LAMBDA_RUNTIME.to_string()
    }
    fn default_lambda_environment() -> BTreeMap<String, String> {
        BTreeMap::from([("foo".to_string(), "bar".to_string())])
    }
    fn default_stage_name() -> String {
        DEFAULT_STAGE_NAME.to_string()
    }
    fn default_true() -> bool {
        true
    }
    fn default_logging_level() -> String {
        DEFAULT_METHOD_LOGGING_LEVEL.to_string()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.stage_name.is_empty()
            || !self
                .stage_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(ConfigError::Validation(format!(
                "stack.stage_name {:?} must be non-empty and use letters, digits, '_' or '-'",
                self.stage_name
            )));
        }
        if !METHOD_LOGGING_LEVELS.contains(&self.logging_level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "stack.logging_level {:?} must be one of {}",
                self.logging_level,
                METHOD_LOGGING_LEVELS.join(", ")
            )));
        }
        if self.log_group_name.is_empty() {
            return Err(ConfigError::Validation(
                "stack.log_group_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl AppConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(contents)?;

        if config.http.port == 0 {
            return Err(ConfigError::Validation(
                "http.port must be non-zero".to_string(),
            ));
        }
        config.stack.validate()?;

        Ok(config)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Configuration error: {0}")]
    Validation(String),
}
