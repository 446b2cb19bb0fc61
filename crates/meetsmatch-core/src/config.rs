//! Configuration resolution for `MeetsMatch`.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (`$XDG_CONFIG_HOME/meetsmatch/settings.json`)
//! 3. Explicit config file (`--config`)
//! 4. Environment variables (`MEETSMATCH_*`)
//! 5. CLI arguments (highest priority, applied by the binary)

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Complete `MeetsMatch` configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub activity: ActivityConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    /// Overlay files only carry the flags they change.
    #[serde(default)]
    pub feature_flags: HashMap<String, bool>,
    #[serde(default)]
    pub common_responses: HashMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            matching: MatchingConfig::default(),
            cache: CacheConfig::default(),
            rate_limit: RateLimitConfig::default(),
            activity: ActivityConfig::default(),
            timeouts: TimeoutConfig::default(),
            feature_flags: default_feature_flags(),
            common_responses: default_common_responses(),
        }
    }
}

/// gRPC server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
    pub database_path: Option<PathBuf>,
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:50051".to_string(),
            database_path: None,
            log_level: "info".to_string(),
        }
    }
}

/// Candidate discovery tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Page size when the caller passes 0.
    pub default_limit: u32,
    /// How many raw rows to pull per requested candidate before scoring.
    pub overfetch_factor: u32,
    /// Soft max distance for the location score.
    pub default_max_distance_km: f64,
    /// Upper bound on the matched-list length.
    pub match_list_cap: u32,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            overfetch_factor: 5,
            default_max_distance_km: crate::scoring::DEFAULT_MAX_DISTANCE_KM,
            match_list_cap: 50,
        }
    }
}

/// Cache layer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub user_ttl_secs: u64,
    pub match_ttl_secs: u64,
    pub profile_ttl_secs: u64,
    pub response_ttl_secs: u64,
    pub common_response_ttl_secs: u64,
    pub feature_flag_ttl_secs: u64,
    /// Payloads containing any of these substrings are never cached.
    pub skip_patterns: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            user_ttl_secs: 30 * 60,
            match_ttl_secs: 2 * 60 * 60,
            profile_ttl_secs: 60 * 60,
            response_ttl_secs: 15 * 60,
            common_response_ttl_secs: 24 * 60 * 60,
            feature_flag_ttl_secs: 24 * 60 * 60,
            skip_patterns: ["/start", "/help", "admin_", "debug_"]
                .map(String::from)
                .to_vec(),
        }
    }
}

/// Token bucket settings applied per key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub capacity: u32,
    pub refill_interval_ms: u64,
}

impl RateLimitConfig {
    pub const fn refill_interval(&self) -> Duration {
        Duration::from_millis(self.refill_interval_ms)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: 5,
            refill_interval_ms: 1000,
        }
    }
}

/// Background last-active tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityConfig {
    pub queue_capacity: usize,
    pub dedup_window_secs: u64,
    pub dedup_max_entries: usize,
}

impl ActivityConfig {
    pub const fn dedup_window(&self) -> Duration {
        Duration::from_secs(self.dedup_window_secs)
    }
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            dedup_window_secs: 5 * 60,
            dedup_max_entries: 10_000,
        }
    }
}

/// Bounds for storage and cache calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub operation_timeout_ms: u64,
}

impl TimeoutConfig {
    pub const fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            operation_timeout_ms: 5000,
        }
    }
}

fn default_feature_flags() -> HashMap<String, bool> {
    [
        ("enable_new_matching_algorithm", true),
        ("enable_profile_verification", false),
        ("enable_voice_messages", true),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

fn default_common_responses() -> HashMap<String, String> {
    [
        ("welcome_message", "Welcome to MeetsMatch! Let's set up your profile."),
        ("help_message", "Use /match to find people nearby and /profile to edit your profile."),
        ("profile_incomplete", "Please complete your profile before looking for matches."),
        ("no_matches", "No matches right now. Check back later!"),
        ("error_message", "Something went wrong. Please try again."),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Load configuration with hierarchical resolution.
///
/// `explicit` must exist when given; the global file is optional.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let mut config = Config::default();

    if let Some(global_path) = global_config_path() {
        if global_path.exists() {
            let global = load_config_file(&global_path)?;
            merge_config(&mut config, global);
        }
    }

    if let Some(path) = explicit {
        let file = load_config_file(path)?;
        merge_config(&mut config, file);
    }

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    config.validate()?;

    Ok(config)
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("meetsmatch").join("settings.json"))
}

/// Default database location when none is configured.
pub fn default_database_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("meetsmatch").join("meetsmatch.db"))
}

fn load_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

fn merge_config(base: &mut Config, overlay: Config) {
    if overlay.server.database_path.is_some() {
        base.server.database_path = overlay.server.database_path;
    }
    base.server.addr = overlay.server.addr;
    base.server.log_level = overlay.server.log_level;

    base.matching = overlay.matching;
    base.cache = overlay.cache;
    base.rate_limit = overlay.rate_limit;
    base.activity = overlay.activity;
    base.timeouts = overlay.timeouts;

    base.feature_flags.extend(overlay.feature_flags);
    base.common_responses.extend(overlay.common_responses);
}

fn parse_env<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T> {
    raw.parse().map_err(|_| Error::InvalidValue {
        field: key,
        value: raw.to_string(),
    })
}

/// Apply `MEETSMATCH_*` overrides read through `lookup`.
pub fn apply_env_overrides(
    config: &mut Config,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    if let Some(val) = lookup("MEETSMATCH_ADDR") {
        config.server.addr = val;
    }
    if let Some(val) = lookup("MEETSMATCH_DATABASE_PATH") {
        config.server.database_path = Some(PathBuf::from(val));
    }
    if let Some(val) = lookup("MEETSMATCH_LOG_LEVEL") {
        config.server.log_level = val;
    }
    if let Some(val) = lookup("MEETSMATCH_CACHE_ENABLED") {
        config.cache.enabled = parse_env("MEETSMATCH_CACHE_ENABLED", &val)?;
    }
    if let Some(val) = lookup("MEETSMATCH_RATE_LIMIT_CAPACITY") {
        config.rate_limit.capacity = parse_env("MEETSMATCH_RATE_LIMIT_CAPACITY", &val)?;
    }
    if let Some(val) = lookup("MEETSMATCH_RATE_LIMIT_REFILL_MS") {
        config.rate_limit.refill_interval_ms = parse_env("MEETSMATCH_RATE_LIMIT_REFILL_MS", &val)?;
    }
    if let Some(val) = lookup("MEETSMATCH_OPERATION_TIMEOUT_MS") {
        config.timeouts.operation_timeout_ms = parse_env("MEETSMATCH_OPERATION_TIMEOUT_MS", &val)?;
    }
    if let Some(val) = lookup("MEETSMATCH_DEFAULT_LIMIT") {
        config.matching.default_limit = parse_env("MEETSMATCH_DEFAULT_LIMIT", &val)?;
    }
    Ok(())
}

/// Longest TTL any cache class may be configured with (one year).
pub const MAX_CACHE_TTL_SECS: u64 = 365 * 24 * 60 * 60;

impl Config {
    /// Reject values that would make the service misbehave at runtime.
    pub fn validate(&self) -> Result<()> {
        let zero = |field: &'static str| Error::InvalidValue {
            field,
            value: "0".to_string(),
        };
        if self.rate_limit.capacity == 0 {
            return Err(zero("rate_limit.capacity"));
        }
        if self.rate_limit.refill_interval_ms == 0 {
            return Err(zero("rate_limit.refill_interval_ms"));
        }
        if self.timeouts.operation_timeout_ms == 0 {
            return Err(zero("timeouts.operation_timeout_ms"));
        }
        if self.activity.queue_capacity == 0 {
            return Err(zero("activity.queue_capacity"));
        }
        if self.matching.default_limit == 0 {
            return Err(zero("matching.default_limit"));
        }
        if self.matching.overfetch_factor == 0 {
            return Err(zero("matching.overfetch_factor"));
        }
        let cache = &self.cache;
        for (field, secs) in [
            ("cache.user_ttl_secs", cache.user_ttl_secs),
            ("cache.match_ttl_secs", cache.match_ttl_secs),
            ("cache.profile_ttl_secs", cache.profile_ttl_secs),
            ("cache.response_ttl_secs", cache.response_ttl_secs),
            ("cache.common_response_ttl_secs", cache.common_response_ttl_secs),
            ("cache.feature_flag_ttl_secs", cache.feature_flag_ttl_secs),
        ] {
            if secs > MAX_CACHE_TTL_SECS {
                return Err(Error::InvalidValue {
                    field,
                    value: secs.to_string(),
                });
            }
        }
        let max_km = self.matching.default_max_distance_km;
        if max_km.is_nan() || max_km <= 0.0 {
            return Err(Error::InvalidValue {
                field: "matching.default_max_distance_km",
                value: max_km.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.rate_limit.capacity, 5);
        assert_eq!(config.rate_limit.refill_interval(), Duration::from_secs(1));
        assert_eq!(config.cache.match_ttl_secs, 7200);
        assert_eq!(config.activity.dedup_window(), Duration::from_secs(300));
        assert_eq!(config.feature_flags.get("enable_profile_verification"), Some(&false));
        assert!(config.common_responses.contains_key("welcome_message"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"rate_limit":{"capacity":10},"feature_flags":{"enable_voice_messages":false}}"#,
        )
        .unwrap();

        let mut config = Config::default();
        merge_config(&mut config, load_config_file(&path).unwrap());

        assert_eq!(config.rate_limit.capacity, 10);
        assert_eq!(config.rate_limit.refill_interval_ms, 1000);
        assert_eq!(config.feature_flags.get("enable_voice_messages"), Some(&false));
        assert_eq!(config.feature_flags.get("enable_new_matching_algorithm"), Some(&true));
        assert_eq!(config.server.addr, "0.0.0.0:50051");
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config_file(&dir.path().join("nope.json")).is_err());
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = [
            ("MEETSMATCH_ADDR", "127.0.0.1:6000"),
            ("MEETSMATCH_RATE_LIMIT_CAPACITY", "2"),
            ("MEETSMATCH_CACHE_ENABLED", "false"),
        ]
        .into();
        let mut config = Config::default();
        apply_env_overrides(&mut config, |k| env.get(k).map(ToString::to_string)).unwrap();

        assert_eq!(config.server.addr, "127.0.0.1:6000");
        assert_eq!(config.rate_limit.capacity, 2);
        assert!(!config.cache.enabled);
    }

    #[test]
    fn bad_env_value_is_rejected() {
        let mut config = Config::default();
        let err = apply_env_overrides(&mut config, |k| {
            (k == "MEETSMATCH_OPERATION_TIMEOUT_MS").then(|| "soon".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains("MEETSMATCH_OPERATION_TIMEOUT_MS"));
    }

    #[test]
    fn zero_capacity_fails_validation() {
        let mut config = Config::default();
        config.rate_limit.capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn oversized_cache_ttl_fails_validation() {
        let mut config = Config::default();
        config.cache.feature_flag_ttl_secs = u64::MAX;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("cache.feature_flag_ttl_secs"));

        config.cache.feature_flag_ttl_secs = MAX_CACHE_TTL_SECS;
        assert!(config.validate().is_ok());
    }
}
