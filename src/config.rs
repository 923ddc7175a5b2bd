//! Listener configuration
//!
//! Loaded from YAML. Every field has a default, so an empty document or a
//! missing default config file yields a working listener on `0.0.0.0:8000`.
//!
//! ```yaml
//! listen:
//!   address: 0.0.0.0
//!   port: 8000
//! output:
//!   csv_path: gem.csv
//!   log_readings: true
//! connection:
//!   read_buffer_size: 2048
//! logging:
//!   level: info
//! ```

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::connection::DEFAULT_READ_BUFFER_SIZE;
use crate::server::ServerSettings;
use crate::{GemError, Result};

/// Config file read when none is given explicitly.
pub const DEFAULT_CONFIG_PATH: &str = "gemnet.yaml";

/// Port the device firmware is usually pointed at.
pub const DEFAULT_PORT: u16 = 8000;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub listen: ListenConfig,
    pub output: OutputConfig,
    pub connection: ConnectionConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    pub address: IpAddr,
    /// 0 binds an ephemeral port
    pub port: u16,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self { address: IpAddr::V4(Ipv4Addr::UNSPECIFIED), port: DEFAULT_PORT }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// CSV file, truncated on startup. No CSV output when unset.
    pub csv_path: Option<PathBuf>,
    /// Log every reading at info level
    pub log_readings: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { csv_path: None, log_readings: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub read_buffer_size: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self { read_buffer_size: DEFAULT_READ_BUFFER_SIZE }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. `info` or `gemnet=debug`
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

impl Config {
    /// Read and validate the config at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| GemError::file_error(path, e))?;
        let config = Self::from_yaml(&text)?;
        debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Load `path` if given, otherwise [`DEFAULT_CONFIG_PATH`] when it exists,
    /// otherwise defaults. An explicitly named file must exist.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::load(DEFAULT_CONFIG_PATH),
            None => {
                debug!("No configuration file, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Config = if text.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml_ng::from_str(text)
                .map_err(|e| GemError::config_error_with_source("Invalid YAML", Box::new(e)))?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.connection.read_buffer_size == 0 {
            return Err(GemError::config_error("connection.read_buffer_size must be at least 1"));
        }
        if self.logging.level.trim().is_empty() {
            return Err(GemError::config_error("logging.level must not be empty"));
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.listen.address, self.listen.port)
    }

    pub fn server_settings(&self) -> ServerSettings {
        ServerSettings {
            read_buffer_size: self.connection.read_buffer_size,
            ..ServerSettings::default()
        }
    }
}
