//! Bounds and expiry settings for named caches

use crate::error::{Result, UidCacheError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a named cache
///
/// Zero bounds are legal: `max_entries == 0` or a zero TTL produce a cache that
/// never stores anything, so every lookup falls through to the producer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum age of an entry before it is treated as a miss.
    /// `None` means entries never expire.
    pub ttl: Option<Duration>,

    /// Maximum number of entries in the cache
    pub max_entries: usize,

    /// Maximum total approximate size of cached data in bytes
    pub max_size_bytes: usize,

    /// Fraction of the TTL (0.0 - 1.0) randomly taken off each entry's lifetime.
    /// Spreads expiry of entries inserted together; off by default
    pub ttl_jitter: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            // 1 hour
            ttl: Some(Duration::from_secs(3600)),
            max_entries: 10_000,
            // 200 MiB
            max_size_bytes: 200 * 1024 * 1024,
            ttl_jitter: 0.0,
        }
    }
}

impl CacheConfig {
    /// Create a new builder for cache configuration
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.ttl_jitter) {
            return Err(UidCacheError::ConfigError(
                "ttl_jitter must be between 0.0 and 1.0".to_string(),
            ));
        }

        Ok(())
    }

    /// Whether this configuration can never hold an entry
    pub fn is_degenerate(&self) -> bool {
        self.max_entries == 0 || self.max_size_bytes == 0 || self.ttl == Some(Duration::ZERO)
    }

    /// Calculate the TTL for a new entry with jitter applied.
    ///
    /// Jitter only ever shortens the TTL: an entry is gone once `ttl` has
    /// passed, whatever the jitter factor.
    pub fn ttl_with_jitter(&self) -> Option<Duration> {
        let ttl = self.ttl?;
        if self.ttl_jitter == 0.0 || ttl.is_zero() {
            return Some(ttl);
        }

        let base_secs = ttl.as_secs_f64();
        let jitter_range = base_secs * self.ttl_jitter;
        let final_secs = (base_secs - rand::random::<f64>() * jitter_range).clamp(0.0, base_secs);

        Some(Duration::from_secs_f64(final_secs).min(ttl))
    }

    /// Load a configuration from environment variables (and a `.env` file if present).
    ///
    /// Reads `<PREFIX>_TTL_SECS` (`none` disables expiry), `<PREFIX>_MAX_ENTRIES`,
    /// `<PREFIX>_MAX_SIZE_BYTES` and `<PREFIX>_TTL_JITTER`. Unset variables keep
    /// their defaults.
    pub fn from_env(prefix: &str) -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(prefix, |key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(prefix: &str, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Self::builder();
        let var = |name: &str| lookup(&format!("{}_{}", prefix, name));

        if let Some(raw) = var("TTL_SECS") {
            let raw = raw.trim();
            if raw.eq_ignore_ascii_case("none") {
                builder = builder.no_expiry();
            } else {
                builder = builder.ttl(Duration::from_secs(parse_env(prefix, "TTL_SECS", raw)?));
            }
        }
        if let Some(raw) = var("MAX_ENTRIES") {
            builder = builder.max_entries(parse_env(prefix, "MAX_ENTRIES", raw.trim())?);
        }
        if let Some(raw) = var("MAX_SIZE_BYTES") {
            builder = builder.max_size_bytes(parse_env(prefix, "MAX_SIZE_BYTES", raw.trim())?);
        }
        if let Some(raw) = var("TTL_JITTER") {
            builder = builder.ttl_jitter(parse_env(prefix, "TTL_JITTER", raw.trim())?);
        }

        let config = builder.build();
        config.validate()?;
        Ok(config)
    }
}

fn parse_env<T: std::str::FromStr>(prefix: &str, name: &str, raw: &str) -> Result<T> {
    raw.parse().map_err(|_| {
        UidCacheError::ConfigError(format!("{}_{} has an invalid value: {:?}", prefix, name, raw))
    })
}

/// Builder for cache configuration
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    ttl: Option<Option<Duration>>,
    max_entries: Option<usize>,
    max_size_bytes: Option<usize>,
    ttl_jitter: Option<f64>,
}

impl CacheConfigBuilder {
    /// Set the TTL for cache entries
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(Some(ttl));
        self
    }

    /// Entries never expire
    pub fn no_expiry(mut self) -> Self {
        self.ttl = Some(None);
        self
    }

    /// Set maximum number of cache entries
    pub fn max_entries(mut self, max: usize) -> Self {
        self.max_entries = Some(max);
        self
    }

    /// Set maximum cache size in bytes
    pub fn max_size_bytes(mut self, size: usize) -> Self {
        self.max_size_bytes = Some(size);
        self
    }

    /// Set TTL jitter factor (0.0 - 1.0)
    pub fn ttl_jitter(mut self, jitter: f64) -> Self {
        self.ttl_jitter = Some(jitter);
        self
    }

    /// Build the cache configuration
    pub fn build(self) -> CacheConfig {
        let defaults = CacheConfig::default();

        CacheConfig {
            ttl: self.ttl.unwrap_or(defaults.ttl),
            max_entries: self.max_entries.unwrap_or(defaults.max_entries),
            max_size_bytes: self.max_size_bytes.unwrap_or(defaults.max_size_bytes),
            ttl_jitter: self.ttl_jitter.unwrap_or(defaults.ttl_jitter),
        }
    }
}

/// Preset configurations for common use cases
impl CacheConfig {
    /// Per-entity-kind caches during interactive editing: resolutions are
    /// cheap to redo, so keep the footprint modest
    pub fn interactive() -> Self {
        Self {
            ttl: Some(Duration::from_secs(300)),
            max_entries: 4_096,
            max_size_bytes: 16 * 1024 * 1024,
            ..Default::default()
        }
    }

    /// Short-lived sessions or many small documents
    pub fn small() -> Self {
        Self {
            ttl: Some(Duration::from_secs(1800)),
            max_entries: 1_000,
            max_size_bytes: 10 * 1024 * 1024,
            ..Default::default()
        }
    }

    /// Entries live until evicted by size or cleared by a lifecycle event
    pub fn no_expiry() -> Self {
        Self {
            ttl: None,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.ttl, Some(Duration::from_secs(3600)));
        assert_eq!(config.max_entries, 10_000);
        assert_eq!(config.max_size_bytes, 200 * 1024 * 1024);
        assert!(!config.is_degenerate());
    }

    #[test]
    fn test_zero_bounds_are_valid_but_degenerate() {
        assert!(CacheConfig::default().validate().is_ok());

        let zero = CacheConfig::builder()
            .max_entries(0)
            .ttl(Duration::ZERO)
            .build();
        assert!(zero.validate().is_ok());
        assert!(zero.is_degenerate());

        let jittery = CacheConfig {
            ttl_jitter: -0.2,
            ..Default::default()
        };
        assert!(jittery.validate().is_err());
    }

    #[test]
    fn test_builder_overrides_defaults() {
        let config = CacheConfig::builder()
            .ttl(Duration::from_secs(600))
            .max_entries(256)
            .max_size_bytes(1 << 20)
            .build();

        assert_eq!(config.ttl, Some(Duration::from_secs(600)));
        assert_eq!(config.max_entries, 256);
        assert_eq!(config.max_size_bytes, 1 << 20);

        let forever = CacheConfig::builder().no_expiry().build();
        assert_eq!(forever.ttl, None);
    }

    #[test]
    fn test_ttl_with_jitter() {
        let config = CacheConfig {
            ttl: Some(Duration::from_secs(3600)),
            ttl_jitter: 0.25,
            ..Default::default()
        };

        for _ in 0..32 {
            let ttl = config.ttl_with_jitter().unwrap();
            assert!(ttl <= Duration::from_secs(3600));
            assert!(ttl.as_secs_f64() >= 2700.0);
        }

        let full = CacheConfig {
            ttl: Some(Duration::from_millis(100)),
            ttl_jitter: 1.0,
            ..Default::default()
        };
        for _ in 0..256 {
            assert!(full.ttl_with_jitter().unwrap() <= Duration::from_millis(100));
        }

        assert_eq!(CacheConfig::no_expiry().ttl_with_jitter(), None);
    }

    #[test]
    fn test_presets() {
        assert_eq!(CacheConfig::interactive().ttl, Some(Duration::from_secs(300)));
        assert_eq!(CacheConfig::small().max_entries, 1_000);
        assert_eq!(CacheConfig::no_expiry().ttl, None);
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("LP_TTL_SECS", "120"),
            ("LP_MAX_ENTRIES", " 64 "),
            ("LP_TTL_JITTER", "0.05"),
        ]
        .into_iter()
        .collect();

        let config =
            CacheConfig::from_lookup("LP", |key| vars.get(key).map(|v| v.to_string())).unwrap();
        assert_eq!(config.ttl, Some(Duration::from_secs(120)));
        assert_eq!(config.max_entries, 64);
        assert_eq!(config.max_size_bytes, CacheConfig::default().max_size_bytes);
        assert_eq!(config.ttl_jitter, 0.05);
    }

    #[test]
    fn test_from_lookup_no_expiry_and_errors() {
        let config = CacheConfig::from_lookup("LP", |key| {
            (key == "LP_TTL_SECS").then(|| "None".to_string())
        })
        .unwrap();
        assert_eq!(config.ttl, None);

        let err = CacheConfig::from_lookup("LP", |key| {
            (key == "LP_MAX_ENTRIES").then(|| "lots".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, UidCacheError::ConfigError(_)));

        let err = CacheConfig::from_lookup("LP", |key| {
            (key == "LP_TTL_JITTER").then(|| "2.0".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, UidCacheError::ConfigError(_)));
    }
}
