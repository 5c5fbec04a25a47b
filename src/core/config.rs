use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::search::params::{ExpansionParams, StopWords};
use crate::search::stream::{StreamOptions, DEFAULT_SCROLL_WINDOW, MAX_CHUNK_SIZE};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Base URL of the search engine
    pub endpoint: String,
    pub index: Option<String>,
    /// Fields queried when none are given
    pub fields: Vec<String>,
    pub n_seed_docs: Option<u64>,
    pub expansion: ExpansionParams,
    /// Extra stop words on top of the built-in list
    pub stop_words: Vec<String>,
    pub scroll_window: String,
    pub chunk_size: u64,
    pub max_chunk_size: u64,
    /// Documents sampled per shard for keyword discovery
    pub sample_size: u64,
    /// Outbound request timeout in seconds, 0 disables it
    pub timeout_secs: u64,
    pub gateway: GatewayConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:9200".to_string(),
            index: None,
            fields: Vec::new(),
            n_seed_docs: None,
            expansion: ExpansionParams::default(),
            stop_words: Vec::new(),
            scroll_window: DEFAULT_SCROLL_WINDOW.to_string(),
            chunk_size: 1000,
            max_chunk_size: MAX_CHUNK_SIZE,
            sample_size: 5000,
            timeout_secs: 30,
            gateway: GatewayConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn stop_words(&self) -> StopWords {
        StopWords::with_overlay(&self.stop_words)
    }

    pub fn stream_options(&self, chunk_size: Option<u64>) -> StreamOptions {
        StreamOptions {
            chunk_size: chunk_size.unwrap_or(self.chunk_size),
            max_chunk_size: self.max_chunk_size,
            scroll_window: self.scroll_window.clone(),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

/// Settings of the HTTP gateway in front of the engines
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Engine hosts requests may be proxied to
    pub allowed_endpoints: Vec<String>,
    /// Inbound header naming the target engine host
    pub endpoint_header: String,
    pub scheme: String,
    /// Range filter upper bounds at or above this value are dropped
    pub range_upper_limit: Option<i64>,
    pub cors: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3003,
            allowed_endpoints: Vec::new(),
            endpoint_header: "es-endpoint".to_string(),
            scheme: "https".to_string(),
            range_upper_limit: None,
            cors: true,
        }
    }
}

pub fn default_config_path() -> PathBuf {
    let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    config_dir.join("clio").join("config.toml")
}

pub fn load_config() -> Result<AppConfig> {
    load_config_from(&default_config_path())
}

/// Optional TOML file, then `CLIO_*` environment variables,
/// e.g. `CLIO_EXPANSION__MAX_QUERY_TERMS=25` or
/// `CLIO_GATEWAY__ALLOWED_ENDPOINTS="a.example.com;b.example.com"`
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let s = Config::builder()
        .add_source(File::from(path).required(false))
        .add_source(
            Environment::with_prefix("CLIO")
                .prefix_separator("_")
                .separator("__")
                .list_separator(";")
                .with_list_parse_key("gateway.allowed_endpoints")
                .with_list_parse_key("fields")
                .with_list_parse_key("stop_words")
                .try_parsing(true),
        )
        .build()?;

    Ok(s.try_deserialize()?)
}
