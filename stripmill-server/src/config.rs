//! Server configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via STRIPMILL_CONFIG)
//! 3. Environment variables

use crate::cluster::MAX_POOL_SIZE;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use stripmill_core::EncodeFormat;
use stripmill_protocol::OperationField;

/// Looks up one environment variable by name.
type EnvLookup<'a> = dyn Fn(&str) -> Option<String> + 'a;

/// Server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Network configuration.
    pub network: NetworkConfig,
    /// Worker pool configuration.
    pub cluster: ClusterConfig,
    /// Wire protocol configuration.
    pub protocol: ProtocolConfig,
    /// Output encoding configuration.
    pub output: OutputConfig,
}

impl Config {
    /// Loads configuration from file, then applies environment variable overrides.
    ///
    /// The result is validated either way; an invalid override is an error
    /// rather than a silent fall back to defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("STRIPMILL_CONFIG").ok();
        Self::load_with(path.as_deref(), &|key| std::env::var(key).ok())
    }

    fn load_with(path: Option<&str>, env: &EnvLookup<'_>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        config.apply_env_overrides(env);
        config.validate()?;

        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self, env: &EnvLookup<'_>) {
        self.network.apply_env_overrides(env);
        self.cluster.apply_env_overrides(env);
        self.protocol.apply_env_overrides(env);
        self.output.apply_env_overrides(env);
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cluster.pool_size == 0 || self.cluster.pool_size > MAX_POOL_SIZE {
            return Err(ConfigError::ValidationError(format!(
                "cluster.pool_size must be in 1..={}, got {}",
                MAX_POOL_SIZE, self.cluster.pool_size
            )));
        }
        if self.protocol.max_image_size_mb == 0 || self.protocol.max_image_size_mb > 4095 {
            return Err(ConfigError::ValidationError(format!(
                "protocol.max_image_size_mb must be in 1..=4095, got {}",
                self.protocol.max_image_size_mb
            )));
        }
        if !(1..=100).contains(&self.output.jpeg_quality) {
            return Err(ConfigError::ValidationError(format!(
                "output.jpeg_quality must be in 1..=100, got {}",
                self.output.jpeg_quality
            )));
        }
        Ok(())
    }

    /// Saves configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        Ok(())
    }
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address to bind to.
    #[serde(with = "socket_addr_serde")]
    pub bind_addr: SocketAddr,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], stripmill_protocol::DEFAULT_PORT)),
        }
    }
}

impl NetworkConfig {
    fn apply_env_overrides(&mut self, env: &EnvLookup<'_>) {
        if let Some(addr) = env("STRIPMILL_BIND") {
            if let Ok(parsed) = addr.parse() {
                self.bind_addr = parsed;
            }
        }
    }
}

/// Worker pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Number of ranks, coordinator included. 1 means no separate workers.
    pub pool_size: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self { pool_size: 4 }
    }
}

impl ClusterConfig {
    fn apply_env_overrides(&mut self, env: &EnvLookup<'_>) {
        if let Some(size) = env("STRIPMILL_POOL_SIZE") {
            if let Ok(n) = size.parse() {
                self.pool_size = n;
            }
        }
    }
}

/// Wire protocol configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// How the operation identifier is read.
    pub operation_field: OperationField,
    /// Largest accepted image frame, in megabytes.
    pub max_image_size_mb: u32,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            operation_field: OperationField::Fixed,
            max_image_size_mb: 64,
        }
    }
}

impl ProtocolConfig {
    fn apply_env_overrides(&mut self, env: &EnvLookup<'_>) {
        if let Some(mode) = env("STRIPMILL_OPERATION_FIELD") {
            if let Some(parsed) = OperationField::parse(&mode) {
                self.operation_field = parsed;
            }
        }

        if let Some(size) = env("STRIPMILL_MAX_IMAGE_SIZE_MB") {
            if let Ok(mb) = size.parse() {
                self.max_image_size_mb = mb;
            }
        }
    }

    /// Returns the image size limit in bytes.
    pub fn max_image_size(&self) -> u32 {
        self.max_image_size_mb.saturating_mul(1024 * 1024)
    }
}

/// Image format for responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Png,
    Jpeg,
}

impl OutputFormat {
    /// Parses a format name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Some(OutputFormat::Png),
            "jpeg" | "jpg" => Some(OutputFormat::Jpeg),
            _ => None,
        }
    }
}

/// Output encoding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Encoding for processed images.
    pub format: OutputFormat,
    /// JPEG quality, used when `format` is `jpeg`.
    pub jpeg_quality: u8,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Png,
            jpeg_quality: 90,
        }
    }
}

impl OutputConfig {
    fn apply_env_overrides(&mut self, env: &EnvLookup<'_>) {
        if let Some(format) = env("STRIPMILL_OUTPUT_FORMAT") {
            if let Some(parsed) = OutputFormat::parse(&format) {
                self.format = parsed;
            }
        }

        if let Some(quality) = env("STRIPMILL_JPEG_QUALITY") {
            if let Ok(q) = quality.parse() {
                self.jpeg_quality = q;
            }
        }
    }

    /// Returns the encoder settings.
    pub fn encode_format(&self) -> EncodeFormat {
        match self.format {
            OutputFormat::Png => EncodeFormat::Png,
            OutputFormat::Jpeg => EncodeFormat::Jpeg {
                quality: self.jpeg_quality,
            },
        }
    }
}

/// Configuration error.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::ValidationError(msg) => {
                write!(f, "configuration validation failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Custom serde module for SocketAddr (to handle as string in YAML).
mod socket_addr_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::net::SocketAddr;

    pub fn serialize<S>(addr: &SocketAddr, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&addr.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SocketAddr, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
