//! Configuration module
//!
//! Handles loading and saving twoping configuration.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::protocol::{EncodeOptions, DEFAULT_PORT};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid HMAC key: {0}")]
    InvalidKey(#[from] hex::FromHexError),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Network settings
    #[serde(default)]
    pub network: NetworkConfig,

    /// Packet layout settings
    #[serde(default)]
    pub packet: PacketConfig,

    /// Packet signing settings
    #[serde(default)]
    pub hmac: HmacConfig,
}

/// Network configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Address to bind to
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// Largest datagram accepted or sent
    #[serde(default = "default_max_packet_size")]
    pub max_packet_size: usize,
    /// How long a receive waits before reporting no data (ms)
    #[serde(default = "default_recv_timeout")]
    pub recv_timeout_ms: u64,
}

fn default_bind_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_max_packet_size() -> usize {
    512
}

fn default_recv_timeout() -> u64 {
    1000
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            max_packet_size: default_max_packet_size(),
            recv_timeout_ms: default_recv_timeout(),
        }
    }
}

impl NetworkConfig {
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    pub fn recv_timeout(&self) -> Duration {
        Duration::from_millis(self.recv_timeout_ms)
    }
}

/// Packet layout configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PacketConfig {
    /// Pad outgoing packets to at least this many bytes
    #[serde(default)]
    pub min_length: usize,
    /// Byte used for padding
    #[serde(default)]
    pub padding_byte: u8,
}

impl PacketConfig {
    pub fn encode_options(&self) -> EncodeOptions {
        EncodeOptions {
            min_length: self.min_length,
            padding_pattern: vec![self.padding_byte],
        }
    }
}

/// Packet signing configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HmacConfig {
    /// Shared key as hex; signing is disabled when unset
    pub key: Option<String>,
}

impl HmacConfig {
    /// Decode the configured key
    pub fn key_bytes(&self) -> ConfigResult<Option<Vec<u8>>> {
        match &self.key {
            Some(key) => Ok(Some(hex::decode(key.trim())?)),
            None => Ok(None),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the default location
    pub fn load_default() -> ConfigResult<Self> {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("twoping/config.toml")),
            Some(PathBuf::from("./twoping.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                tracing::debug!("Loading configuration from {}", path.display());
                return Self::load(path);
            }
        }

        Ok(Self::default())
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let contents = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, contents)?;
        Ok(())
    }
}

/// Generate a sample configuration file
pub fn generate_sample_config() -> ConfigResult<String> {
    let config = Config {
        packet: PacketConfig {
            min_length: 128,
            padding_byte: 0,
        },
        hmac: HmacConfig {
            key: Some("000102030405060708090a0b0c0d0e0f".to_string()),
        },
        ..Default::default()
    };

    Ok(toml::to_string_pretty(&config)?)
}
