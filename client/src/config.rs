//! Configuration management for the sync client.

use std::env;
use std::time::Duration;

/// Default minimum interval between periodic sync runs.
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 30;
/// Default cooldown after a failed cycle. Strictly longer than the
/// periodic interval so a degraded backend is not hammered.
pub const DEFAULT_ERROR_COOLDOWN_SECS: u64 = 60;
/// Default debounce applied to local change triggers.
pub const DEFAULT_DEBOUNCE_MS: u64 = 800;

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the hosted backend (e.g. "https://abc.supabase.co")
    pub api_url: String,
    /// Project API key sent with every request
    pub api_key: String,
    /// Access token of the signed-in user, if any
    pub access_token: Option<String>,
    /// Path of the JSON cache file used by the daemon
    pub cache_path: String,
    /// Minimum interval between periodic sync runs
    pub sync_interval: Duration,
    /// Cooldown after a failed cycle
    pub error_cooldown: Duration,
    /// Debounce applied to local change triggers
    pub debounce: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_url = env::var("TIRESTOCK_API_URL").map_err(|_| ConfigError::MissingApiUrl)?;
        let api_key = env::var("TIRESTOCK_API_KEY").map_err(|_| ConfigError::MissingApiKey)?;
        let access_token = env::var("TIRESTOCK_ACCESS_TOKEN").ok();

        let cache_path =
            env::var("TIRESTOCK_CACHE_PATH").unwrap_or_else(|_| "tirestock-cache.json".to_string());

        let sync_interval = parse_secs("TIRESTOCK_SYNC_INTERVAL_SECS", DEFAULT_SYNC_INTERVAL_SECS)?;
        let error_cooldown =
            parse_secs("TIRESTOCK_ERROR_COOLDOWN_SECS", DEFAULT_ERROR_COOLDOWN_SECS)?;
        let debounce = env::var("TIRESTOCK_DEBOUNCE_MS")
            .ok()
            .map(|v| v.parse().map_err(|_| ConfigError::InvalidDuration("TIRESTOCK_DEBOUNCE_MS")))
            .transpose()?
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_millis(DEFAULT_DEBOUNCE_MS));

        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key,
            access_token,
            cache_path,
            sync_interval,
            error_cooldown,
            debounce,
        })
    }
}

fn parse_secs(name: &'static str, default: u64) -> Result<Duration, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map(Duration::from_secs)
            .map_err(|_| ConfigError::InvalidDuration(name)),
        Err(_) => Ok(Duration::from_secs(default)),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("TIRESTOCK_API_URL environment variable is required")]
    MissingApiUrl,

    #[error("TIRESTOCK_API_KEY environment variable is required")]
    MissingApiKey,

    #[error("invalid duration value in {0}")]
    InvalidDuration(&'static str),
}
