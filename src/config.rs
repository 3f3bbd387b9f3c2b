//! Configuration module for the echo server.
//!
//! The listening port always comes from the `TELEPATHY_SVC_PORT` environment
//! variable. Everything else is read from command-line arguments and an
//! optional TOML file, with CLI arguments taking precedence.

use clap::Parser;
use serde::Deserialize;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

/// Environment variable holding the port the service listens on.
pub const PORT_ENV: &str = "TELEPATHY_SVC_PORT";

/// Command-line arguments for the echo server
#[derive(Parser, Debug, Default)]
#[command(name = "telepathy-echo")]
#[command(version)]
#[command(
    about = "A gRPC echo service",
    long_about = "A gRPC echo service. The listening port is read from the TELEPATHY_SVC_PORT environment variable."
)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Number of runtime worker threads
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Maximum number of Echo calls handled at the same time
    #[arg(long)]
    pub max_concurrent_requests: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Number of runtime worker threads
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Maximum number of Echo calls handled at the same time
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            max_concurrent_requests: default_max_concurrent_requests(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_workers() -> usize {
    10
}

fn default_max_concurrent_requests() -> usize {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub workers: usize,
    pub max_concurrent_requests: usize,
    pub log_level: String,
}

impl Config {
    /// Load configuration from the process: CLI args, the optional TOML
    /// file they point at, and the port environment variable.
    pub fn load() -> Result<Self, ConfigError> {
        let cli = CliArgs::parse();

        let toml_config = match cli.config {
            Some(ref path) => TomlConfig::from_file(path)?,
            None => TomlConfig::default(),
        };

        Self::resolve(cli, toml_config, std::env::var(PORT_ENV).ok())
    }

    /// Merge the configuration sources. CLI arguments take precedence over
    /// TOML values; the port is taken from `port_var` only.
    pub fn resolve(
        cli: CliArgs,
        toml_config: TomlConfig,
        port_var: Option<String>,
    ) -> Result<Self, ConfigError> {
        let port = parse_port(port_var)?;

        let workers = cli.workers.unwrap_or(toml_config.server.workers);
        if workers == 0 {
            return Err(ConfigError::InvalidValue("workers"));
        }

        let max_concurrent_requests = cli
            .max_concurrent_requests
            .unwrap_or(toml_config.server.max_concurrent_requests);
        if max_concurrent_requests == 0 {
            return Err(ConfigError::InvalidValue("max_concurrent_requests"));
        }

        Ok(Config {
            port,
            workers,
            max_concurrent_requests,
            log_level: cli.log_level.unwrap_or(toml_config.logging.level),
        })
    }

    /// Address the listener binds to: all interfaces, no TLS.
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }
}

impl TomlConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::FileRead {
                path: path.to_path_buf(),
                source,
            })?;
        toml::from_str(&contents).map_err(|source| ConfigError::TomlParse {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn parse_port(value: Option<String>) -> Result<u16, ConfigError> {
    let raw = value.ok_or(ConfigError::MissingPort)?;
    match raw.trim().parse::<u16>() {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(ConfigError::InvalidPort(raw)),
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("environment variable TELEPATHY_SVC_PORT is not set")]
    MissingPort,
    #[error("environment variable TELEPATHY_SVC_PORT is not a valid port: '{0}'")]
    InvalidPort(String),
    #[error("'{0}' must be at least 1")]
    InvalidValue(&'static str),
    #[error("Failed to read config file '{}': {source}", .path.display())]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{}': {source}", .path.display())]
    TomlParse {
        path: PathBuf,
        source: toml::de::Error,
    },
}
