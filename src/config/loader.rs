//! Configuration Loader
//!
//! Loads and validates configuration from TOML files matching
//! config/mintwatch.toml. Durations are written in milliseconds.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::adapters::access::{ProviderEndpoint, RateLimiterConfig, RetryPolicy};
use crate::adapters::cache::{CacheConfig, DEFAULT_FETCH_TIMEOUT, DEFAULT_MAX_ENTRIES};
use crate::adapters::dexscreener::DEXSCREENER_BASE_URL;
use crate::adapters::providers::CacheTtls;
use crate::adapters::pump_fun::{PumpPortalConfig, DEFAULT_WS_URL};
use crate::adapters::sources::DEFAULT_POLL_INTERVAL;
use crate::application::DetectionConfig;
use crate::domain::{UserCriteria, UserId, DEFAULT_PROCESSED_CAPACITY, DEFAULT_TOP_HOLDERS};

/// Prepends an RPC endpoint
pub const ENV_RPC_URL: &str = "MINTWATCH_RPC_URL";
/// Fills RPC endpoints that have no key
pub const ENV_RPC_API_KEY: &str = "MINTWATCH_RPC_API_KEY";
/// Fills DexScreener endpoints that have no key
pub const ENV_DEXSCREENER_API_KEY: &str = "DEXSCREENER_API_KEY";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Main configuration structure matching config/mintwatch.toml
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub rpc: RpcSection,
    #[serde(default)]
    pub dexscreener: DexScreenerSection,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub detection: DetectionSection,
    #[serde(default)]
    pub alerts: AlertsSection,
    #[serde(default)]
    pub logging: LoggingSection,
    #[serde(default)]
    pub users: Vec<UserEntry>,
}

/// Solana RPC section
#[derive(Debug, Clone, Deserialize)]
pub struct RpcSection {
    /// Interchangeable RPC endpoints; one is picked per call
    pub endpoints: Vec<ProviderEndpoint>,
    /// Commitment level: "processed", "confirmed", "finalized"
    #[serde(default = "default_commitment")]
    pub commitment: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub limiter: RateLimiterConfig,
    #[serde(default)]
    pub retry: RetrySection,
}

impl RpcSection {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// DexScreener section
#[derive(Debug, Clone, Deserialize)]
pub struct DexScreenerSection {
    #[serde(default = "default_dexscreener_endpoints")]
    pub endpoints: Vec<ProviderEndpoint>,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_dexscreener_limiter")]
    pub limiter: RateLimiterConfig,
    #[serde(default)]
    pub retry: RetrySection,
}

impl Default for DexScreenerSection {
    fn default() -> Self {
        Self {
            endpoints: default_dexscreener_endpoints(),
            request_timeout_ms: default_request_timeout_ms(),
            limiter: default_dexscreener_limiter(),
            retry: RetrySection::default(),
        }
    }
}

impl DexScreenerSection {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Backoff settings for one provider
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_jitter_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_retries: policy.max_retries,
            base_delay_ms: policy.base_delay.as_millis() as u64,
            max_delay_ms: policy.max_delay.as_millis() as u64,
            max_jitter_ms: policy.max_jitter.as_millis() as u64,
        }
    }
}

impl RetrySection {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            max_jitter: Duration::from_millis(self.max_jitter_ms),
        }
    }
}

/// Cache section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    /// Global deadline for one upstream fetch
    pub fetch_timeout_ms: u64,
    pub max_entries: usize,
    /// Lifetime per data kind
    pub ttl: CacheTtls,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT.as_millis() as u64,
            max_entries: DEFAULT_MAX_ENTRIES,
            ttl: CacheTtls::default(),
        }
    }
}

impl CacheSection {
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            fetch_timeout: Duration::from_millis(self.fetch_timeout_ms),
            max_entries: self.max_entries,
        }
    }
}

/// How candidates reach the detection engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMode {
    /// Poll the boosted tokens feed
    #[default]
    Poll,
    /// Stream pump.fun creations over WebSocket
    Subscribe,
}

/// Detection section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectionSection {
    pub mode: DetectionMode,
    pub poll_interval_ms: u64,
    /// Mints remembered as already evaluated
    pub processed_capacity: usize,
    /// Holder accounts summed for the concentration filter
    pub top_n: usize,
    /// PumpPortal WebSocket URL (subscribe mode)
    pub ws_url: String,
}

impl Default for DetectionSection {
    fn default() -> Self {
        Self {
            mode: DetectionMode::Poll,
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            processed_capacity: DEFAULT_PROCESSED_CAPACITY,
            top_n: DEFAULT_TOP_HOLDERS,
            ws_url: DEFAULT_WS_URL.to_string(),
        }
    }
}

impl DetectionSection {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn engine_config(&self) -> DetectionConfig {
        DetectionConfig {
            processed_capacity: self.processed_capacity,
            top_n: self.top_n,
        }
    }

    pub fn subscription_config(&self) -> PumpPortalConfig {
        PumpPortalConfig {
            ws_url: self.ws_url.clone(),
            ..PumpPortalConfig::default()
        }
    }
}

/// Alerts section (optional)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AlertsSection {
    /// Discord-compatible webhook; notifications only go to the log when unset
    pub webhook_url: Option<String>,
    pub webhook_timeout_ms: u64,
}

impl Default for AlertsSection {
    fn default() -> Self {
        Self {
            webhook_url: None,
            webhook_timeout_ms: 5_000,
        }
    }
}

impl AlertsSection {
    /// Webhook URL, if one is set and non-empty
    pub fn webhook(&self) -> Option<&str> {
        self.webhook_url.as_deref().filter(|url| !url.trim().is_empty())
    }
}

/// Logging section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

/// One `[[users]]` entry
#[derive(Debug, Clone, Deserialize)]
pub struct UserEntry {
    pub id: UserId,
    /// Arm this user when `run` starts
    #[serde(default)]
    pub auto_start: bool,
    #[serde(default)]
    pub criteria: UserCriteria,
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

fn default_commitment() -> String {
    "confirmed".to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_dexscreener_endpoints() -> Vec<ProviderEndpoint> {
    vec![ProviderEndpoint::new(DEXSCREENER_BASE_URL)]
}

// 300 requests per minute on the pair endpoints
fn default_dexscreener_limiter() -> RateLimiterConfig {
    RateLimiterConfig {
        capacity: 5,
        refill_interval: Duration::from_secs(1),
        max_concurrent: 3,
        min_spacing: Duration::from_millis(100),
    }
}

/// Expand `~` and environment variables in a config path
pub fn expand_path<P: AsRef<Path>>(path: P) -> PathBuf {
    let raw = path.as_ref().to_string_lossy();
    match shellexpand::full(&raw) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(shellexpand::tilde(&raw).as_ref()),
    }
}

/// Load configuration from a TOML file, apply environment overrides, validate
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(expand_path(path))?;
    let mut config: Config = toml::from_str(&content)?;
    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Apply `MINTWATCH_RPC_URL`, `MINTWATCH_RPC_API_KEY`, `DEXSCREENER_API_KEY`
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an arbitrary lookup; empty values are ignored
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(url) = get(ENV_RPC_URL) {
            if !self.rpc.endpoints.iter().any(|e| e.url == url) {
                self.rpc.endpoints.insert(0, ProviderEndpoint::new(url));
            }
        }

        if let Some(key) = get(ENV_RPC_API_KEY) {
            fill_missing_keys(&mut self.rpc.endpoints, &key);
        }

        if let Some(key) = get(ENV_DEXSCREENER_API_KEY) {
            fill_missing_keys(&mut self.dexscreener.endpoints, &key);
        }
    }

    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_endpoints("rpc", &self.rpc.endpoints)?;
        validate_endpoints("dexscreener", &self.dexscreener.endpoints)?;
        validate_limiter("rpc", &self.rpc.limiter)?;
        validate_limiter("dexscreener", &self.dexscreener.limiter)?;

        if self.rpc.request_timeout_ms == 0 || self.dexscreener.request_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "request_timeout_ms must be > 0".to_string(),
            ));
        }

        if self.cache.max_entries == 0 {
            return Err(ConfigError::ValidationError(
                "cache.max_entries must be > 0".to_string(),
            ));
        }

        if self.cache.fetch_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "cache.fetch_timeout_ms must be > 0".to_string(),
            ));
        }

        if self.detection.processed_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "detection.processed_capacity must be > 0".to_string(),
            ));
        }

        if self.detection.top_n == 0 {
            return Err(ConfigError::ValidationError(
                "detection.top_n must be > 0".to_string(),
            ));
        }

        match self.detection.mode {
            DetectionMode::Poll if self.detection.poll_interval_ms == 0 => {
                return Err(ConfigError::ValidationError(
                    "detection.poll_interval_ms must be > 0".to_string(),
                ));
            }
            DetectionMode::Subscribe if self.detection.ws_url.trim().is_empty() => {
                return Err(ConfigError::ValidationError(
                    "detection.ws_url cannot be empty in subscribe mode".to_string(),
                ));
            }
            _ => {}
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "logging.level must be one of {:?}, got '{}'",
                LOG_LEVELS, self.logging.level
            )));
        }

        let mut seen = HashSet::new();
        for user in &self.users {
            if !seen.insert(user.id) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate user id {}",
                    user.id
                )));
            }
            user.criteria.validate().map_err(|e| {
                ConfigError::ValidationError(format!("user {}: {}", user.id, e))
            })?;
        }

        Ok(())
    }

    /// `(id, criteria)` pairs for the settings store
    pub fn user_criteria(&self) -> Vec<(UserId, UserCriteria)> {
        self.users
            .iter()
            .map(|user| (user.id, user.criteria.clone()))
            .collect()
    }

    /// Users armed when `run` starts, in file order
    pub fn auto_start_users(&self) -> Vec<UserId> {
        self.users
            .iter()
            .filter(|user| user.auto_start)
            .map(|user| user.id)
            .collect()
    }
}

fn fill_missing_keys(endpoints: &mut [ProviderEndpoint], key: &str) {
    for endpoint in endpoints.iter_mut().filter(|e| e.api_key.is_none()) {
        endpoint.api_key = Some(key.to_string());
    }
}

fn validate_endpoints(section: &str, endpoints: &[ProviderEndpoint]) -> Result<(), ConfigError> {
    if endpoints.is_empty() {
        return Err(ConfigError::ValidationError(format!(
            "{}.endpoints cannot be empty",
            section
        )));
    }
    if endpoints.iter().any(|e| e.url.trim().is_empty()) {
        return Err(ConfigError::ValidationError(format!(
            "{}.endpoints contains an empty url",
            section
        )));
    }
    Ok(())
}

fn validate_limiter(section: &str, limiter: &RateLimiterConfig) -> Result<(), ConfigError> {
    if limiter.capacity == 0 {
        return Err(ConfigError::ValidationError(format!(
            "{}.limiter.capacity must be > 0",
            section
        )));
    }
    if limiter.max_concurrent == 0 {
        return Err(ConfigError::ValidationError(format!(
            "{}.limiter.max_concurrent must be > 0",
            section
        )));
    }
    if limiter.refill_interval.is_zero() {
        return Err(ConfigError::ValidationError(format!(
            "{}.limiter.refill_interval must be > 0",
            section
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AuthorityRequirement;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_valid_config() -> String {
        r#"
[rpc]
commitment = "confirmed"
endpoints = [
    { url = "https://api.mainnet-beta.solana.com" },
    { url = "https://rpc.example.com", api_key = "abc" },
]

[rpc.limiter]
capacity = 10
refill_interval = 1000
max_concurrent = 5
min_spacing = 50

[rpc.retry]
max_retries = 3

[cache]
fetch_timeout_ms = 15000

[cache.ttl]
boosts = 1500

[detection]
mode = "subscribe"
processed_capacity = 500

[logging]
level = "debug"

[[users]]
id = 42
auto_start = true

[users.criteria]
liquidity_threshold = 5000.0
require_mint_authority = "forbidden"
top_holders_threshold = 35.0

[[users]]
id = 7
"#
        .to_string()
    }

    fn write(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn parse(content: &str) -> Config {
        toml::from_str(content).unwrap()
    }

    #[test]
    fn test_load_valid_config() {
        let file = write(&create_valid_config());
        let config = load_config(file.path()).unwrap();

        assert!(config.rpc.endpoints.len() >= 2);
        assert_eq!(config.rpc.retry.policy().max_retries, 3);
        assert_eq!(config.cache.cache_config().fetch_timeout, Duration::from_secs(15));
        assert_eq!(config.cache.ttl.boosts, Duration::from_millis(1500));
        assert_eq!(config.cache.ttl.mint_account, CacheTtls::default().mint_account);
        assert_eq!(config.detection.mode, DetectionMode::Subscribe);
        assert_eq!(config.detection.engine_config().processed_capacity, 500);
        assert_eq!(config.dexscreener.endpoints[0].url, DEXSCREENER_BASE_URL);
        assert_eq!(config.auto_start_users(), vec![42]);

        let criteria = &config.users[0].criteria;
        assert_eq!(criteria.liquidity_threshold, Some(5000.0));
        assert_eq!(criteria.require_mint_authority, Some(AuthorityRequirement::Forbidden));
        assert!(config.users[1].criteria.liquidity_threshold.is_none());
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_config("/nonexistent/path/config.toml");
        assert!(matches!(result.unwrap_err(), ConfigError::IoError(_)));
    }

    #[test]
    fn test_malformed_toml() {
        let file = write("[rpc\nendpoints = ");
        assert!(matches!(load_config(file.path()).unwrap_err(), ConfigError::ParseError(_)));
    }

    #[test]
    fn test_empty_endpoints_rejected() {
        let config = parse("[rpc]\nendpoints = []\n");
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let config = parse(
            r#"
[rpc]
endpoints = [{ url = "https://rpc.example.com" }]

[rpc.limiter]
max_concurrent = 0
"#,
        );
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_concurrent"));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = parse(
            r#"
[rpc]
endpoints = [{ url = "https://rpc.example.com" }]

[detection]
processed_capacity = 0
"#,
        );
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_duplicate_user_rejected() {
        let config = parse(
            r#"
[rpc]
endpoints = [{ url = "https://rpc.example.com" }]

[[users]]
id = 1

[[users]]
id = 1
"#,
        );
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate user id 1"));
    }

    #[test]
    fn test_invalid_criteria_rejected() {
        let config = parse(
            r#"
[rpc]
endpoints = [{ url = "https://rpc.example.com" }]

[[users]]
id = 3
criteria = { top_holders_threshold = 140.0 }
"#,
        );
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("user 3"));
    }

    #[test]
    fn test_unknown_log_level_rejected() {
        let config = parse(
            r#"
[rpc]
endpoints = [{ url = "https://rpc.example.com" }]

[logging]
level = "loud"
"#,
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overrides_prepend_url_and_fill_keys() {
        let mut config = parse(&create_valid_config());
        let env: HashMap<&str, &str> = [
            (ENV_RPC_URL, "https://override.example.com"),
            (ENV_RPC_API_KEY, "rpc-key"),
            (ENV_DEXSCREENER_API_KEY, ""),
        ]
        .into_iter()
        .collect();

        config.apply_overrides(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.rpc.endpoints[0].url, "https://override.example.com");
        assert_eq!(config.rpc.endpoints[0].api_key.as_deref(), Some("rpc-key"));
        // Explicit keys win
        assert_eq!(config.rpc.endpoints[2].api_key.as_deref(), Some("abc"));
        // Empty values are ignored
        assert!(config.dexscreener.endpoints[0].api_key.is_none());
    }

    #[test]
    fn test_alerts_section_optional() {
        let config = parse("[rpc]\nendpoints = [{ url = \"https://rpc.example.com\" }]\n");
        assert!(config.alerts.webhook().is_none());
        assert_eq!(config.detection.mode, DetectionMode::Poll);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_shipped_config_is_valid() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/mintwatch.toml");
        let config = load_config(path).unwrap();
        assert!(!config.users.is_empty());
    }
}
