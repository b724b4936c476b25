//! Configuration management for the OCR Harness server

use std::env;

use harness_log::{LogConfig, DEFAULT_MAX_LOGS, DEFAULT_RECENT_ERROR_WINDOW};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub environment: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Capacity of the in-memory event log
    pub max_logs: usize,
    /// ERROR entries carried by an error report
    pub recent_error_window: usize,
    /// Forward the server's own `tracing` events into the event log
    pub capture_tracing: bool,
}

impl LoggingConfig {
    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            max_logs: self.max_logs,
            recent_error_window: self.recent_error_window,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
                cors_origins: vec!["http://localhost:3000".to_string()],
                environment: "development".to_string(),
            },
            logging: LoggingConfig {
                max_logs: DEFAULT_MAX_LOGS,
                recent_error_window: DEFAULT_RECENT_ERROR_WINDOW,
                capture_tracing: true,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or(defaults.server.host),
                port: parse_var("SERVER_PORT", defaults.server.port)?,
                cors_origins: env::var("CORS_ORIGINS")
                    .map(|origins| split_origins(&origins))
                    .unwrap_or(defaults.server.cors_origins),
                environment: env::var("ENVIRONMENT").unwrap_or(defaults.server.environment),
            },
            logging: LoggingConfig {
                max_logs: parse_var("LOG_MAX_ENTRIES", defaults.logging.max_logs)?,
                recent_error_window: parse_var(
                    "LOG_REPORT_ERRORS",
                    defaults.logging.recent_error_window,
                )?,
                capture_tracing: parse_var("LOG_CAPTURE_TRACING", defaults.logging.capture_tracing)?,
            },
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        Err(_) => Ok(default),
    }
}

fn split_origins(origins: &str) -> Vec<String> {
    origins
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(String::from)
        .collect()
}
