use crate::auth::TokenGrant;
use crate::hub::DEFAULT_OUTBOUND_QUEUE_CAPACITY;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// Env var naming the config file
pub const CONFIG_PATH_ENV: &str = "SOS_CONFIG";

/// Env var overriding `server.bind_addr`
pub const BIND_ADDR_ENV: &str = "SOS_BIND_ADDR";

/// Complete hub configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DispatchConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub hub: HubConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Accept requests from any origin (mobile and web clients)
    #[serde(default = "default_cors_allow_any")]
    pub cors_allow_any: bool,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_cors_allow_any() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            cors_allow_any: default_cors_allow_any(),
        }
    }
}

/// Connection hub configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HubConfig {
    /// Messages buffered per connection before it is dropped as stalled
    #[serde(default = "default_outbound_queue_capacity")]
    pub outbound_queue_capacity: usize,
}

fn default_outbound_queue_capacity() -> usize {
    DEFAULT_OUTBOUND_QUEUE_CAPACITY
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            outbound_queue_capacity: default_outbound_queue_capacity(),
        }
    }
}

/// Connection authentication
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    /// Require a token on WebSocket upgrade
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub tokens: Vec<TokenGrant>,
}

impl DispatchConfig {
    /// Apply env var overrides on top of file values
    pub fn apply_env(&mut self) {
        if let Ok(addr) = std::env::var(BIND_ADDR_ENV) {
            if !addr.trim().is_empty() {
                self.server.bind_addr = addr;
            }
        }
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &Path) -> Result<DispatchConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    let config: DispatchConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))?;
    Ok(config)
}

/// Load configuration, falling back to defaults when the file is absent
pub fn load_or_default(path: &Path) -> Result<DispatchConfig> {
    if !path.exists() {
        info!(
            path = %path.display(),
            "Config file not found, using defaults"
        );
        return Ok(DispatchConfig::default());
    }
    load_config(path)
}
