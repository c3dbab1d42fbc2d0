//! Configuration management
//!
//! This module handles loading and parsing configuration for Taskboard.
//! Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults.

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin (for cookie-based auth)
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/taskboard.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// MySQL
    Mysql,
}

/// Session and cookie settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// How long a session stays valid after sign-in
    #[serde(default = "default_session_expiration_days")]
    pub session_expiration_days: i64,
    /// Name of the cookie carrying the session token
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// Add the `Secure` attribute to the session cookie
    #[serde(default)]
    pub secure_cookie: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_expiration_days: default_session_expiration_days(),
            cookie_name: default_cookie_name(),
            secure_cookie: false,
        }
    }
}

fn default_session_expiration_days() -> i64 {
    30
}

/// Upper bound for `session_expiration_days` (ten years)
pub const MAX_SESSION_EXPIRATION_DAYS: i64 = 3650;

fn default_cookie_name() -> String {
    "taskboard_session".to_string()
}

impl AuthConfig {
    /// Session lifetime in seconds, as used for the cookie `Max-Age`
    pub fn session_max_age_seconds(&self) -> i64 {
        self.session_expiration_days * 24 * 60 * 60
    }
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError { path: String, message: String },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            })?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern:
    /// - TASKBOARD_SERVER_HOST
    /// - TASKBOARD_SERVER_PORT
    /// - TASKBOARD_SERVER_CORS_ORIGIN
    /// - TASKBOARD_DATABASE_DRIVER
    /// - TASKBOARD_DATABASE_URL
    /// - TASKBOARD_AUTH_SESSION_EXPIRATION_DAYS
    /// - TASKBOARD_AUTH_COOKIE_NAME
    /// - TASKBOARD_AUTH_SECURE_COOKIE
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.session_expiration_days <= 0 {
            return Err(ConfigError::ValidationError(
                "auth.session_expiration_days must be positive".to_string(),
            ));
        }
        if self.auth.session_expiration_days > MAX_SESSION_EXPIRATION_DAYS {
            return Err(ConfigError::ValidationError(format!(
                "auth.session_expiration_days cannot exceed {}",
                MAX_SESSION_EXPIRATION_DAYS
            )));
        }
        if self.auth.cookie_name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "auth.cookie_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("TASKBOARD_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("TASKBOARD_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Ok(cors_origin) = std::env::var("TASKBOARD_SERVER_CORS_ORIGIN") {
            self.server.cors_origin = cors_origin;
        }

        if let Ok(driver) = std::env::var("TASKBOARD_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {} // Ignore invalid values
            }
        }
        if let Ok(url) = std::env::var("TASKBOARD_DATABASE_URL") {
            self.database.url = url;
        }

        if let Ok(days) = std::env::var("TASKBOARD_AUTH_SESSION_EXPIRATION_DAYS") {
            if let Ok(days) = days.parse::<i64>() {
                if days > 0 {
                    self.auth.session_expiration_days = days;
                }
            }
        }
        if let Ok(name) = std::env::var("TASKBOARD_AUTH_COOKIE_NAME") {
            if !name.trim().is_empty() {
                self.auth.cookie_name = name;
            }
        }
        if let Ok(secure) = std::env::var("TASKBOARD_AUTH_SECURE_COOKIE") {
            match secure.to_lowercase().as_str() {
                "1" | "true" | "yes" => self.auth.secure_cookie = true,
                "0" | "false" | "no" => self.auth.secure_cookie = false,
                _ => {}
            }
        }
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared by every test that touches TASKBOARD_* variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
const ENV_VARS: &[&str] = &[
    "TASKBOARD_SERVER_HOST",
    "TASKBOARD_SERVER_PORT",
    "TASKBOARD_SERVER_CORS_ORIGIN",
    "TASKBOARD_DATABASE_DRIVER",
    "TASKBOARD_DATABASE_URL",
    "TASKBOARD_AUTH_SESSION_EXPIRATION_DAYS",
    "TASKBOARD_AUTH_COOKIE_NAME",
    "TASKBOARD_AUTH_SECURE_COOKIE",
];
