//! Configuration management for micromongo

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

use crate::error::{Error, Result};

/// Port used when none is configured or the configured one is out of range
pub const DEFAULT_PORT: u16 = 27017;

/// Main configuration structure for micromongo
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML/JSON file
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = tokio::fs::read_to_string(path.as_ref())
            .await
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = if path.as_ref().extension().map_or(false, |ext| ext == "toml") {
            toml::from_str(&content)
                .map_err(|e| Error::Config(format!("Failed to parse TOML config: {}", e)))?
        } else {
            serde_json::from_str(&content)
                .map_err(|e| Error::Config(format!("Failed to parse JSON config: {}", e)))?
        };

        Ok(config)
    }

    /// Check values that cannot be sanitised into something usable
    pub fn validate(&self) -> Result<()> {
        if self.server.host.trim().is_empty() {
            return Err(Error::Config("host must not be empty".to_string()));
        }
        if self.server.read_buffer_size == 0 {
            return Err(Error::Config("read_buffer_size must be positive".to_string()));
        }
        self.logging.filter_directive()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address to bind
    pub host: String,
    /// Port number
    pub port: u16,
    /// Bytes requested per socket read
    pub read_buffer_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            read_buffer_size: 64 * 1024, // 64KB
        }
    }
}

impl ServerConfig {
    /// `host:port` string for the listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Set the port, falling back to the default for ports outside 2..=65535
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = sanitize_port(port);
        self
    }
}

/// Ports 0 and 1 are rejected in favour of the default
pub fn sanitize_port(port: u16) -> u16 {
    if port > 1 {
        port
    } else {
        warn!("Port {} is out of range, using {}", port, DEFAULT_PORT);
        DEFAULT_PORT
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// One of trace, debug, info, warning, error, critical
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Translate the configured level into a tracing filter directive
    pub fn filter_directive(&self) -> Result<&'static str> {
        match self.level.to_ascii_lowercase().as_str() {
            "trace" => Ok("trace"),
            "debug" => Ok("debug"),
            "info" => Ok("info"),
            "warn" | "warning" => Ok("warn"),
            "error" | "critical" => Ok("error"),
            other => Err(Error::Config(format!("Unknown log level: {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 27017);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.bind_address(), "127.0.0.1:27017");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_port_sanitizing() {
        assert_eq!(ServerConfig::default().with_port(1).port, DEFAULT_PORT);
        assert_eq!(ServerConfig::default().with_port(0).port, DEFAULT_PORT);
        assert_eq!(ServerConfig::default().with_port(2).port, 2);
        assert_eq!(ServerConfig::default().with_port(65535).port, 65535);
    }

    #[test]
    fn test_log_levels() {
        let mut logging = LoggingConfig::default();
        assert_eq!(logging.filter_directive().unwrap(), "info");

        logging.level = "WARNING".to_string();
        assert_eq!(logging.filter_directive().unwrap(), "warn");

        logging.level = "critical".to_string();
        assert_eq!(logging.filter_directive().unwrap(), "error");

        logging.level = "verbose".to_string();
        assert!(logging.filter_directive().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_host() {
        let mut config = Config::default();
        config.server.host = "  ".to_string();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_load_toml() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[server]\nhost = \"0.0.0.0\"\nport = 28000\n\n[logging]\nlevel = \"debug\"").unwrap();

        let config = Config::load(file.path()).await.unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 28000);
        assert_eq!(config.server.read_buffer_size, 64 * 1024);
        assert_eq!(config.logging.level, "debug");
    }

    #[tokio::test]
    async fn test_load_json() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"server": {{"port": 27018}}}}"#).unwrap();

        let config = Config::load(file.path()).await.unwrap();
        assert_eq!(config.server.port, 27018);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.logging.level, "info");
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let result = Config::load("/nonexistent/micromongo.toml").await;
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
