//! Application configuration.
//!
//! Aggregates configuration from all modules into a single Config struct
//! that can be loaded from YAML files or environment variables. The rest of
//! the crate receives plain values from here; nothing reloads at runtime.

mod broker;
mod storage;

pub use broker::{BrokerConfig, BrokerType, KafkaConfig};
pub use storage::{RedisConfig, StorageConfig, StorageType};

use std::collections::HashSet;
use std::sync::Arc;

use serde::Deserialize;

use crate::broker::FetchWindow;
use crate::codec::{CodecRegistry, JsonCodec};
use crate::ingest::IngestConfig;
use crate::search::SearchConfig;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "logfold.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "LOGFOLD_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "LOGFOLD";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "LOGFOLD_LOG";
/// Environment variable selecting the log output format (`json` or text).
pub const LOG_FORMAT_ENV_VAR: &str = "LOGFOLD_LOG_FORMAT";

/// Errors found while validating a loaded configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Stream '{name}': {reason}")]
    InvalidStream { name: String, reason: String },

    #[error("Stream '{0}' is configured more than once")]
    DuplicateStream(String),

    #[error("Invalid ingest settings: {0}")]
    InvalidIngest(String),
}

/// One consumed stream.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Stream (topic) name.
    pub name: String,
    /// Number of partitions; one ingestion loop runs per partition.
    pub partitions: i32,
    /// Minimum bytes a fetch waits for.
    pub min_bytes: usize,
    /// Maximum bytes a fetch returns.
    pub max_bytes: usize,
    /// Schema name (defaults to the stream name).
    pub schema: Option<String>,
    /// Top-level fields every message must carry.
    pub required_fields: Vec<String>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            partitions: 1,
            min_bytes: 10_000,
            max_bytes: 10_000_000,
            schema: None,
            required_fields: Vec::new(),
        }
    }
}

impl StreamConfig {
    pub fn new(name: impl Into<String>, partitions: i32) -> Self {
        Self {
            name: name.into(),
            partitions,
            ..Self::default()
        }
    }

    pub fn fetch_window(&self) -> FetchWindow {
        FetchWindow::new(self.min_bytes, self.max_bytes)
    }

    pub fn codec(&self) -> JsonCodec {
        let schema = self.schema.clone().unwrap_or_else(|| self.name.clone());
        JsonCodec::new(schema).with_required(self.required_fields.iter().cloned())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidStream {
            name: self.name.clone(),
            reason: reason.to_string(),
        };
        if self.name.is_empty() {
            return Err(invalid("name is empty"));
        }
        if self.partitions <= 0 {
            return Err(invalid("partitions must be at least 1"));
        }
        if self.min_bytes > self.max_bytes {
            return Err(invalid("min_bytes exceeds max_bytes"));
        }
        Ok(())
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Broker configuration.
    pub broker: BrokerConfig,
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Streams to ingest (and search).
    pub streams: Vec<StreamConfig>,
    /// Ingestion loop settings.
    pub ingest: IngestConfig,
    /// Historical search settings.
    pub search: SearchConfig,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `logfold.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the ingestion loop cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for stream in &self.streams {
            stream.validate()?;
            if !seen.insert(stream.name.as_str()) {
                return Err(ConfigError::DuplicateStream(stream.name.clone()));
            }
        }
        if self.ingest.commit_every == 0 {
            return Err(ConfigError::InvalidIngest(
                "commit_every must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn stream(&self, name: &str) -> Option<&StreamConfig> {
        self.streams.iter().find(|s| s.name == name)
    }

    /// One codec per configured stream.
    pub fn codecs(&self) -> CodecRegistry {
        let mut registry = CodecRegistry::new();
        for stream in &self.streams {
            registry.register(stream.name.clone(), Arc::new(stream.codec()));
        }
        registry
    }

    /// Create config for testing.
    pub fn for_test() -> Self {
        Self {
            broker: BrokerConfig {
                broker_type: BrokerType::Memory,
                ..BrokerConfig::default()
            },
            storage: StorageConfig {
                storage_type: StorageType::Memory,
                ..StorageConfig::default()
            },
            ..Self::default()
        }
    }
}
