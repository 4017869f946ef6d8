//! Application configuration management.

use serde::Deserialize;

use crate::types::FundsPolicy;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Posting engine configuration.
    #[serde(default)]
    pub ledger: LedgerConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8085
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Posting engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Which accounts the funds check protects.
    #[serde(default)]
    pub funds_policy: FundsPolicy,
    /// Deadline for a single posting, in milliseconds. Zero disables it.
    #[serde(default = "default_posting_timeout_ms")]
    pub posting_timeout_ms: u64,
    /// Routing number given to accounts created without one.
    #[serde(default = "default_routing_number")]
    pub default_routing_number: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            funds_policy: FundsPolicy::default(),
            posting_timeout_ms: default_posting_timeout_ms(),
            default_routing_number: default_routing_number(),
        }
    }
}

impl LedgerConfig {
    /// Returns the posting deadline, if one is configured.
    #[must_use]
    pub fn posting_timeout(&self) -> Option<std::time::Duration> {
        (self.posting_timeout_ms > 0).then(|| std::time::Duration::from_millis(self.posting_timeout_ms))
    }
}

fn default_posting_timeout_ms() -> u64 {
    5_000
}

fn default_routing_number() -> String {
    "121042882".to_string()
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("TALLY").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}
