//! Static guard configuration fixed at process start.
//!
//! # Invariants
//! - Durations and the owner bound are non-zero.
//! - Configuration is built once; there is no runtime reconfiguration.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 10_000;

/// Freeze guard tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardConfig {
    /// How long a cached frozen-module snapshot stays valid.
    pub cache_ttl: Duration,
    /// Upper bound for one store read on cache miss.
    pub store_timeout: Duration,
    /// Soft cap on owners tracked by the cache at once.
    pub max_entries: usize,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            max_entries: DEFAULT_CACHE_MAX_ENTRIES,
        }
    }
}

impl GuardConfig {
    /// Builds a config, rejecting zero values.
    pub fn new(
        cache_ttl: Duration,
        store_timeout: Duration,
        max_entries: usize,
    ) -> Result<Self, ConfigError> {
        if cache_ttl.is_zero() {
            return Err(ConfigError::Zero("cache_ttl"));
        }
        if store_timeout.is_zero() {
            return Err(ConfigError::Zero("store_timeout"));
        }
        if max_entries == 0 {
            return Err(ConfigError::Zero("max_entries"));
        }
        Ok(Self {
            cache_ttl,
            store_timeout,
            max_entries,
        })
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Zero(&'static str),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Zero(field) => write!(f, "`{field}` must be greater than zero"),
        }
    }
}

impl Error for ConfigError {}
