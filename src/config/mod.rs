//! Configuration management for the stratus harvester
//!
//! This module handles loading and validating configuration from environment
//! variables and TOML files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Harvester (catalog crawl) configuration
    pub harvester: HarvesterConfig,

    /// Index engine configuration
    pub index: IndexConfig,

    /// Federated search configuration
    pub federation: FederationConfig,

    /// Validation rule file locations
    pub validation: ValidationConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Harvester-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvesterConfig {
    /// Rate limit on outbound catalog fetches (requests per second)
    pub rate_limit: f64,

    /// TCP connect timeout in seconds
    pub connect_timeout_secs: u64,

    /// Read timeout in seconds (catalogs can be large)
    pub read_timeout_secs: u64,

    /// Maximum retry attempts for a single catalog fetch
    pub max_retries: u32,

    /// User agent string
    pub user_agent: String,
}

/// Index engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Base URL of the local index engine, e.g. `http://localhost:8983/solr`
    pub url: String,

    /// Record type → index core name
    pub cores: HashMap<String, String>,

    /// Hostname under which this node publishes (used by access control)
    pub publishing_host: String,

    /// Connect timeout in seconds
    pub connect_timeout_secs: u64,

    /// Read timeout in seconds (large result pages take longer)
    pub read_timeout_secs: u64,
}

/// Federated search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FederationConfig {
    /// Cooperating shard addresses (`host:port/path` form)
    pub shards: Vec<String>,

    /// Per-shard probe timeout in seconds
    pub probe_timeout_secs: u64,

    /// Default page size for federated queries
    pub default_rows: usize,
}

/// Validation rule file locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// JSON file with field schema definitions
    pub schema_path: PathBuf,

    /// JSON file with per-project access-control patterns (optional)
    pub access_control_path: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(v) = env_parse::<f64>("STRATUS_RATE_LIMIT") {
            config.harvester.rate_limit = v;
        }
        if let Some(v) = env_parse::<u64>("STRATUS_CONNECT_TIMEOUT") {
            config.harvester.connect_timeout_secs = v;
            config.index.connect_timeout_secs = v;
        }
        if let Some(v) = env_parse::<u64>("STRATUS_READ_TIMEOUT") {
            config.harvester.read_timeout_secs = v;
            config.index.read_timeout_secs = v;
        }
        if let Some(v) = env_parse::<u32>("STRATUS_MAX_RETRIES") {
            config.harvester.max_retries = v;
        }

        if let Ok(v) = std::env::var("STRATUS_INDEX_URL") {
            config.index.url = v;
        }
        if let Ok(v) = std::env::var("STRATUS_PUBLISHING_HOST") {
            config.index.publishing_host = v;
        }

        if let Ok(v) = std::env::var("STRATUS_SHARDS") {
            config.federation.shards = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(v) = env_parse::<u64>("STRATUS_PROBE_TIMEOUT") {
            config.federation.probe_timeout_secs = v;
        }

        if let Ok(v) = std::env::var("STRATUS_SCHEMA_PATH") {
            config.validation.schema_path = v.into();
        }
        if let Ok(v) = std::env::var("STRATUS_ACCESS_CONTROL_PATH") {
            config.validation.access_control_path = Some(v.into());
        }

        if let Ok(v) = std::env::var("STRATUS_LOG_LEVEL") {
            config.logging.level = v;
        }
        if let Ok(v) = std::env::var("STRATUS_LOG_FORMAT") {
            config.logging.format = v;
        }

        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("parsing config file {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.harvester.rate_limit <= 0.0 {
            anyhow::bail!("rate_limit must be positive");
        }

        if self.harvester.read_timeout_secs == 0 || self.index.read_timeout_secs == 0 {
            anyhow::bail!("read timeouts must be greater than 0");
        }

        if self.index.url.is_empty() {
            anyhow::bail!("index url must not be empty");
        }

        if self.federation.probe_timeout_secs == 0 {
            anyhow::bail!("probe_timeout_secs must be greater than 0");
        }

        Ok(())
    }
}

impl FederationConfig {
    /// Per-shard probe timeout
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

impl Default for Config {
    fn default() -> Self {
        let mut cores = HashMap::new();
        cores.insert("Dataset".to_string(), "datasets".to_string());
        cores.insert("File".to_string(), "files".to_string());
        cores.insert("Aggregation".to_string(), "aggregations".to_string());

        Self {
            harvester: HarvesterConfig {
                rate_limit: 5.0,
                connect_timeout_secs: 10,
                read_timeout_secs: 60,
                max_retries: 3,
                user_agent: format!("stratus/{}", env!("CARGO_PKG_VERSION")),
            },
            index: IndexConfig {
                url: String::from("http://localhost:8983/solr"),
                cores,
                publishing_host: String::from("localhost"),
                connect_timeout_secs: 10,
                read_timeout_secs: 120,
            },
            federation: FederationConfig {
                shards: Vec::new(),
                probe_timeout_secs: 10,
                default_rows: 10,
            },
            validation: ValidationConfig {
                schema_path: PathBuf::from("config/schema.json"),
                access_control_path: None,
            },
            logging: LoggingConfig {
                level: String::from("info"),
                format: String::from("text"),
            },
        }
    }
}
