//! Configuration Module
//!
//! Handles loading and managing cache configuration from environment variables.

use std::env;

use crate::policy::TimeoutPolicy;

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Timeout in seconds applied to entries stored without an explicit policy
    pub default_timeout_secs: u64,
    /// Number of entries the backing map pre-allocates
    pub initial_capacity: usize,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_DEFAULT_TIMEOUT` - Default timeout in seconds (default: 1800)
    /// - `CACHE_INITIAL_CAPACITY` - Pre-allocated entry slots (default: 0)
    pub fn from_env() -> Self {
        Self {
            default_timeout_secs: env::var("CACHE_DEFAULT_TIMEOUT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(TimeoutPolicy::DEFAULT_TIMEOUT_SECONDS),
            initial_capacity: env::var("CACHE_INITIAL_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
        }
    }

    /// Sets the default timeout in seconds.
    pub fn with_default_timeout(mut self, secs: u64) -> Self {
        self.default_timeout_secs = secs;
        self
    }

    /// Sets the initial capacity of the backing map.
    pub fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: TimeoutPolicy::DEFAULT_TIMEOUT_SECONDS,
            initial_capacity: 0,
        }
    }
}
