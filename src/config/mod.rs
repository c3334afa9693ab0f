//! Configuration Module
//!
//! Loads and validates configuration from TOML files.

pub mod loader;

pub use loader::{
    expand_path, load_config, AlertsSection, CacheSection, Config, ConfigError, DetectionMode,
    DetectionSection, DexScreenerSection, LoggingSection, RetrySection, RpcSection, UserEntry,
};
