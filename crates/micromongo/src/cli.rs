//! Command line arguments

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use micromongo_common::Config;

#[derive(Parser, Debug)]
#[command(name = "micromongo")]
#[command(author, version, about = "micromongo - minimal MongoDB wire protocol server", long_about = None)]
pub struct Cli {
    /// Host address to bind
    #[arg(long, env = "MICROMONGO_HOST")]
    pub host: Option<String>,

    /// Port to listen on (2-65535, anything else falls back to 27017)
    #[arg(short, long, env = "MICROMONGO_PORT")]
    pub port: Option<u16>,

    /// Log level
    #[arg(short, long, value_enum, env = "MICROMONGO_LOGLEVEL")]
    pub loglevel: Option<LogLevel>,

    /// Configuration file (TOML or JSON)
    #[arg(short, long, env = "MICROMONGO_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
            LogLevel::Critical => "critical",
        }
    }
}

impl Cli {
    /// Overlay the flags that were given onto `config`
    pub fn apply(&self, config: &mut Config) {
        if let Some(host) = &self.host {
            config.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(level) = self.loglevel {
            config.logging.level = level.as_str().to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_flags_keeps_defaults() {
        let cli = Cli::try_parse_from(["micromongo"]).unwrap();
        let mut config = Config::default();
        cli.apply(&mut config);
        assert_eq!(config.server.bind_address(), "127.0.0.1:27017");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_flags_override() {
        let cli = Cli::try_parse_from([
            "micromongo",
            "--host",
            "0.0.0.0",
            "--port",
            "27018",
            "--loglevel",
            "critical",
        ])
        .unwrap();
        let mut config = Config::default();
        cli.apply(&mut config);
        assert_eq!(config.server.bind_address(), "0.0.0.0:27018");
        assert_eq!(config.logging.filter_directive().unwrap(), "error");
    }

    #[test]
    fn test_rejects_unknown_level() {
        assert!(Cli::try_parse_from(["micromongo", "--loglevel", "verbose"]).is_err());
    }

    #[test]
    fn test_rejects_non_numeric_port() {
        assert!(Cli::try_parse_from(["micromongo", "--port", "mongo"]).is_err());
        assert!(Cli::try_parse_from(["micromongo", "--port", "70000"]).is_err());
    }
}
