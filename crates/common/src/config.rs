//! Application configuration.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Redis configuration.
    pub redis: RedisConfig,
    /// Engine tunables.
    #[serde(default)]
    pub engine: EngineConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public URL of this instance.
    pub url: String,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Redis configuration (count cache).
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL.
    pub url: String,
    /// Key prefix for all Redis keys.
    #[serde(default = "default_redis_prefix")]
    pub prefix: String,
}

/// Tunables for feed assembly, search and the mutual-connection calculator.
///
/// Every value has a default matching production behavior; overrides come
/// from config files or `PULSE__ENGINE__*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Maximum posts per author in a diversified for-you page. Zero
    /// disables the cap.
    #[serde(default = "default_per_author_cap")]
    pub per_author_cap: usize,
    /// Candidate window for the for-you feed, in hours.
    #[serde(default = "default_for_you_window_hours")]
    pub for_you_window_hours: i64,
    /// Candidate window for the trending feed, in hours.
    #[serde(default = "default_trending_window_hours")]
    pub trending_window_hours: i64,
    /// Share of a for-you page drawn from strictly-followed authors.
    #[serde(default = "default_following_supplement_ratio")]
    pub following_supplement_ratio: f64,
    /// Following-count ceiling above which mutual-connection computation
    /// is skipped entirely (returns zero mutuals). Performance escape
    /// hatch with a user-visible consequence; kept configurable.
    #[serde(default = "default_mutual_ceiling")]
    pub mutual_ceiling: usize,
    /// Upper bound on search and feed store queries, in seconds.
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
    /// Maximum accepted search query length, in characters.
    #[serde(default = "default_max_query_length")]
    pub max_query_length: usize,
    /// Maximum accepted page size for feeds and search.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            per_author_cap: default_per_author_cap(),
            for_you_window_hours: default_for_you_window_hours(),
            trending_window_hours: default_trending_window_hours(),
            following_supplement_ratio: default_following_supplement_ratio(),
            mutual_ceiling: default_mutual_ceiling(),
            query_timeout_secs: default_query_timeout_secs(),
            max_query_length: default_max_query_length(),
            max_page_size: default_max_page_size(),
        }
    }
}

impl EngineConfig {
    /// Query timeout as a [`Duration`].
    #[must_use]
    pub const fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_max_connections() -> u32 {
    100
}

const fn default_min_connections() -> u32 {
    5
}

fn default_redis_prefix() -> String {
    "pulse".to_string()
}

const fn default_per_author_cap() -> usize {
    2
}

const fn default_for_you_window_hours() -> i64 {
    48
}

const fn default_trending_window_hours() -> i64 {
    24
}

const fn default_following_supplement_ratio() -> f64 {
    0.3
}

const fn default_mutual_ceiling() -> usize {
    2000
}

const fn default_query_timeout_secs() -> u64 {
    5
}

const fn default_max_query_length() -> usize {
    50
}

const fn default_max_page_size() -> u64 {
    50
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `PULSE_ENV`)
    /// 3. Environment variables with `PULSE_` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        // Pick up a .env file if one exists; absence is fine
        dotenvy::dotenv().ok();

        let env = std::env::var("PULSE_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("PULSE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("PULSE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
