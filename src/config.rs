//! Segment configuration.
//!
//! ## SegmentConfig
//!
//! - **max_store_bytes**: store size at which the segment reports itself maxed (default: 1MB)
//! - **max_index_bytes**: preallocated index capacity; bounds entries to `max_index_bytes / 12` (default: 1MB)
//! - **initial_offset**: base offset of the first segment (default: 0)
//!
//! ## Usage
//!
//! ```ignore
//! use segment_log::config::{Config, SegmentConfig};
//!
//! let config = Config {
//!     segment: SegmentConfig {
//!         max_index_bytes: 24, // room for two entries
//!         ..Default::default()
//!     },
//! };
//! config.validate()?;
//! ```

use crate::error::{LogError, Result};
use crate::storage::encoding::ENT_WIDTH;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub segment: SegmentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentConfig {
    #[serde(default = "default_max_store_bytes")]
    pub max_store_bytes: u64,

    #[serde(default = "default_max_index_bytes")]
    pub max_index_bytes: u64,

    #[serde(default)]
    pub initial_offset: u64,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            max_store_bytes: default_max_store_bytes(),
            max_index_bytes: default_max_index_bytes(),
            initial_offset: 0,
        }
    }
}

fn default_max_store_bytes() -> u64 {
    1024 * 1024 // 1MB
}

fn default_max_index_bytes() -> u64 {
    1024 * 1024 // 1MB, 87381 entries
}

impl Config {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json(s: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(s)
            .map_err(|e| LogError::InvalidConfig(format!("malformed config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Build a config from `SEGLOG_*` environment variables over the defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        if let Some(v) = env_u64("SEGLOG_MAX_STORE_BYTES")? {
            config.segment.max_store_bytes = v;
        }
        if let Some(v) = env_u64("SEGLOG_MAX_INDEX_BYTES")? {
            config.segment.max_index_bytes = v;
        }
        if let Some(v) = env_u64("SEGLOG_INITIAL_OFFSET")? {
            config.segment.initial_offset = v;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.segment.max_index_bytes < ENT_WIDTH {
            return Err(LogError::InvalidConfig(format!(
                "max_index_bytes must hold at least one {}-byte entry, got {}",
                ENT_WIDTH, self.segment.max_index_bytes
            )));
        }
        if self.segment.max_store_bytes == 0 {
            return Err(LogError::InvalidConfig(
                "max_store_bytes must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Number of entries the configured index can ever hold.
    pub fn max_index_entries(&self) -> u64 {
        self.segment.max_index_bytes / ENT_WIDTH
    }
}

fn env_u64(key: &str) -> Result<Option<u64>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| LogError::InvalidConfig(format!("{}={:?}: {}", key, raw, e))),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(LogError::InvalidConfig(format!("{}: {}", key, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().expect("default config should validate");
        assert_eq!(config.segment.initial_offset, 0);
        assert_eq!(config.max_index_entries(), 1024 * 1024 / 12);
    }

    #[test]
    fn test_from_json_fills_missing_fields() {
        let config = Config::from_json(r#"{"segment": {"max_index_bytes": 24}}"#)
            .expect("failed to parse config");

        assert_eq!(config.segment.max_index_bytes, 24);
        assert_eq!(config.segment.max_store_bytes, 1024 * 1024);
        assert_eq!(config.max_index_entries(), 2);
    }

    #[test]
    fn test_from_json_empty_object() {
        let config = Config::from_json("{}").expect("failed to parse config");
        assert_eq!(config.segment.max_index_bytes, 1024 * 1024);
    }

    #[test]
    fn test_index_smaller_than_one_entry_rejected() {
        let result = Config::from_json(r#"{"segment": {"max_index_bytes": 11}}"#);
        assert!(matches!(result, Err(LogError::InvalidConfig(_))));
    }

    #[test]
    fn test_zero_store_bytes_rejected() {
        let mut config = Config::default();
        config.segment.max_store_bytes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_json_rejected() {
        let result = Config::from_json("{segment");
        assert!(matches!(result, Err(LogError::InvalidConfig(_))));
    }
}
