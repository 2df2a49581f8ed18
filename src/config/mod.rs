//! Configuration management module
//!
//! Handles loading and validating application configuration from environment variables.
//! Uses the `config` crate with `dotenvy` for .env file support.

use config::{ConfigError, Environment as ConfigEnvironment, File};
use serde::Deserialize;
use std::env;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Configuration loading error: {0}")]
    LoadError(#[from] ConfigError),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

/// Environment types
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<String> for Environment {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "production" => Environment::Production,
            "staging" => Environment::Staging,
            _ => Environment::Development,
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_secs: u64,
}

fn default_database_url() -> String {
    "postgresql://localhost:5432/survey_engine".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_connection_timeout() -> u64 {
    30
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connection_timeout_secs: default_connection_timeout(),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Server host
    #[serde(default = "default_host")]
    pub host: String,

    /// Frontend URL for CORS
    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Request timeout in seconds, applied by the global timeout layer
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_port() -> u16 {
    4001
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_frontend_url() -> String {
    "http://localhost:4001".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            frontend_url: default_frontend_url(),
            log_level: default_log_level(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Engine configuration: the survey definition this deployment serves and
/// the bounds the propagation engine enforces to avoid runaway instance growth.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// The survey id served by this deployment. `init` creates respondents against it.
    #[serde(default = "default_survey_id")]
    pub default_survey_id: i64,

    /// Maximum number of instances a REPEAT relationship may create for a single
    /// upstream answer before the engine refuses further growth.
    #[serde(default = "default_max_repeat_instances")]
    pub max_repeat_instances: i64,
}

fn default_survey_id() -> i64 {
    1
}

fn default_max_repeat_instances() -> i64 {
    50
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_survey_id: default_survey_id(),
            max_repeat_instances: default_max_repeat_instances(),
        }
    }
}

/// Main application settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    /// Application environment
    #[serde(default)]
    pub environment: Environment,

    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Survey engine configuration
    #[serde(default)]
    pub engine: EngineConfig,
}

impl Settings {
    /// Load settings from environment variables and optional config files
    pub fn new() -> Result<Self, ConfigurationError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        // Build configuration
        let settings = config::Config::builder()
            // Start with defaults
            .set_default("environment", "development")?
            .set_default("server.port", 4001)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.frontend_url", "http://localhost:4001")?
            .set_default("server.log_level", "info")?
            .set_default("server.request_timeout_secs", 30)?
            .set_default("database.url", "postgresql://localhost:5432/survey_engine")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 1)?
            .set_default("database.connection_timeout_secs", 30)?
            .set_default("engine.default_survey_id", 1)?
            .set_default("engine.max_repeat_instances", 50)?
            // Load from config file if present
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables with prefix mapping
            .add_source(
                ConfigEnvironment::default()
                    .separator("__")
                    // Map flat env vars to nested structure
                    .try_parsing(true),
            )
            // Manual overrides from specific environment variables
            .set_override_option(
                "environment",
                env::var("RUST_ENV").or_else(|_| env::var("NODE_ENV")).ok(),
            )?
            .set_override_option("server.port", env::var("PORT").ok())?
            .set_override_option("server.frontend_url", env::var("FRONTEND_URL").ok())?
            .set_override_option("server.log_level", env::var("LOG_LEVEL").ok())?
            .set_override_option(
                "server.request_timeout_secs",
                env::var("REQUEST_TIMEOUT_SECS").ok(),
            )?
            .set_override_option("database.url", env::var("DATABASE_URL").ok())?
            .set_override_option(
                "engine.default_survey_id",
                env::var("DEFAULT_SURVEY_ID").ok(),
            )?
            .set_override_option(
                "engine.max_repeat_instances",
                env::var("MAX_REPEAT_INSTANCES").ok(),
            )?
            .build()?;

        let settings: Settings = settings.try_deserialize()?;

        // Validate the settings
        settings.validate()?;

        Ok(settings)
    }

    /// Validate the configuration
    fn validate(&self) -> Result<(), ConfigurationError> {
        let mut errors: Vec<String> = Vec::new();

        // Validate port range
        if self.server.port == 0 {
            errors.push("Server port cannot be 0".to_string());
        }

        // Validate database URL format
        if !self.database.url.starts_with("postgresql://")
            && !self.database.url.starts_with("postgres://")
        {
            errors.push("DATABASE_URL must be a valid PostgreSQL connection string".to_string());
        }

        if self.environment == Environment::Production && self.database.url.contains("localhost")
        {
            errors.push("Production environment should not use localhost database".to_string());
        }

        if self.engine.max_repeat_instances <= 0 {
            errors.push("MAX_REPEAT_INSTANCES must be positive".to_string());
        }

        if !errors.is_empty() {
            return Err(ConfigurationError::ValidationError(errors.join("; ")));
        }

        Ok(())
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Check if running in development
    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }

    /// Check if running in staging
    pub fn is_staging(&self) -> bool {
        self.environment == Environment::Staging
    }

    /// Get allowed CORS origins based on environment
    pub fn cors_origins(&self) -> Vec<String> {
        let mut origins = vec![self.server.frontend_url.clone()];

        // In development, also allow localhost variants
        if self.is_development() {
            origins.push("http://localhost:3000".to_string());
            origins.push("http://localhost:3001".to_string());
            origins.push("http://localhost:4001".to_string());
            origins.push("http://127.0.0.1:3000".to_string());
            origins.push("http://127.0.0.1:4001".to_string());
        }

        origins
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_default_is_development() {
        assert_eq!(Environment::default(), Environment::Development);
    }

    #[test]
    fn environment_from_string_is_case_insensitive() {
        assert_eq!(Environment::from("PRODUCTION".to_string()), Environment::Production);
        assert_eq!(Environment::from("staging".to_string()), Environment::Staging);
        assert_eq!(Environment::from("nonsense".to_string()), Environment::Development);
    }

    #[test]
    fn settings_default_has_sane_values() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, 4001);
        assert_eq!(settings.engine.default_survey_id, 1);
    }

    #[test]
    fn cors_origins_include_localhost_in_development() {
        let settings = Settings {
            environment: Environment::Development,
            server: ServerConfig::default(),
            ..Default::default()
        };
        let origins = settings.cors_origins();
        assert!(origins.iter().any(|o| o.contains("localhost:3000")));
    }

    #[test]
    fn cors_origins_exclude_localhost_in_production() {
        let settings = Settings {
            environment: Environment::Production,
            server: ServerConfig {
                frontend_url: "https://survey.example.com".to_string(),
                ..ServerConfig::default()
            },
            ..Default::default()
        };
        let origins = settings.cors_origins();
        assert_eq!(origins, vec!["https://survey.example.com".to_string()]);
    }
}
