//! Cache Store Module
//!
//! Main cache engine: a HashMap of type-erased entries, each carrying the
//! expiration policy that is consulted lazily on read.

use std::any::{self, Any};
use std::collections::HashMap;
use std::convert::Infallible;

use tracing::{debug, warn};

use crate::cache::{CacheEntry, CacheStats, CacheValue};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::policy::{ExpirationPolicy, TimeoutPolicy};

/// Outcome of evaluating the entry stored under a key.
enum Lookup {
    Missing,
    Expired,
    Live,
}

// == Cache ==
/// Key-value store with per-entry expiration policies.
///
/// Staleness is only discovered on read: an expired entry is evicted by the
/// lookup that finds it and is never handed out. The store is single-owner;
/// see [`SharedCache`](crate::SharedCache) for concurrent use.
#[derive(Debug)]
pub struct Cache {
    /// Key-value storage
    entries: HashMap<String, CacheEntry>,
    /// Activity counters
    stats: CacheStats,
    /// Timeout in seconds for entries stored without an explicit policy
    default_timeout: u64,
}

impl Cache {
    // == Constructor ==
    /// Creates an empty cache with the default 30 minute timeout.
    pub fn new() -> Self {
        Self::from_config(&CacheConfig::default())
    }

    /// Creates an empty cache from configuration.
    pub fn from_config(config: &CacheConfig) -> Self {
        Self {
            entries: HashMap::with_capacity(config.initial_capacity),
            stats: CacheStats::new(),
            default_timeout: config.default_timeout_secs,
        }
    }

    /// Creates an empty cache whose default policy expires after `secs`.
    pub fn with_default_timeout(secs: u64) -> Self {
        Self::from_config(&CacheConfig::default().with_default_timeout(secs))
    }

    /// Returns the timeout in seconds applied when no policy is given.
    pub fn default_timeout(&self) -> u64 {
        self.default_timeout
    }

    /// Builds the policy used when a caller supplies none.
    pub fn default_policy(&self) -> TimeoutPolicy {
        TimeoutPolicy::new(self.default_timeout)
    }

    // == Put ==
    /// Stores a value under the default timeout policy.
    ///
    /// Any existing entry for the key is replaced wholesale.
    pub fn put<T>(&mut self, key: impl Into<String>, value: T)
    where
        T: Any + Send + Sync,
    {
        let policy = self.default_policy();
        self.put_with_policy(key, value, policy);
    }

    /// Stores a value governed by `policy`.
    pub fn put_with_policy<T, P>(&mut self, key: impl Into<String>, value: T, policy: P)
    where
        T: Any + Send + Sync,
        P: ExpirationPolicy + 'static,
    {
        self.insert_entry(key.into(), CacheEntry::new(value, Box::new(policy)));
    }

    // == Get ==
    /// Retrieves a clone of the value stored under `key`.
    ///
    /// Returns `Ok(None)` if the key is unknown or its entry has expired (the
    /// expired entry is evicted). Fails with `TypeMismatch` if the stored
    /// value is not a `T`.
    pub fn get<T>(&mut self, key: &str) -> Result<Option<T>>
    where
        T: Any + Clone,
    {
        let Some(entry) = self.live_entry(key) else {
            return Ok(None);
        };

        match entry.downcast_ref::<T>() {
            Some(value) => Ok(Some(value.clone())),
            None => Err(CacheError::TypeMismatch {
                key: key.to_string(),
                expected: any::type_name::<T>(),
                found: entry.type_name(),
            }),
        }
    }

    /// Retrieves the type-erased value stored under `key`.
    pub fn get_raw(&mut self, key: &str) -> Option<CacheValue> {
        self.live_entry(key).map(CacheEntry::value)
    }

    /// Returns true if a fresh entry exists for `key`.
    ///
    /// Counts as a lookup and evicts the entry if it has expired.
    pub fn contains_key(&mut self, key: &str) -> bool {
        self.live_entry(key).is_some()
    }

    // == Remove ==
    /// Removes the entry for `key`, returning whether one existed.
    pub fn remove(&mut self, key: &str) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.stats.set_total_entries(self.entries.len());
            debug!(key, "removed entry");
        }
        removed
    }

    // == Get Or Compute ==
    /// Returns the cached value, or runs `producer` and stores its result
    /// under the default timeout policy.
    pub fn get_or_compute<T, F>(&mut self, key: &str, producer: F) -> Result<T>
    where
        T: Any + Send + Sync + Clone,
        F: FnOnce() -> T,
    {
        self.compute_if_absent(key, || Ok::<T, Infallible>(producer()), None)
    }

    /// Returns the cached value, or runs `producer` and stores its result
    /// under `policy`. The policy only governs a newly stored value.
    pub fn get_or_compute_with_policy<T, F, P>(
        &mut self,
        key: &str,
        producer: F,
        policy: P,
    ) -> Result<T>
    where
        T: Any + Send + Sync + Clone,
        F: FnOnce() -> T,
        P: ExpirationPolicy + 'static,
    {
        self.compute_if_absent(
            key,
            || Ok::<T, Infallible>(producer()),
            Some(Box::new(policy)),
        )
    }

    /// Fallible form of [`get_or_compute`](Self::get_or_compute).
    ///
    /// A failing producer stores nothing and surfaces as `ProducerFailed`.
    pub fn try_get_or_compute<T, E, F>(&mut self, key: &str, producer: F) -> Result<T>
    where
        T: Any + Send + Sync + Clone,
        E: Into<anyhow::Error>,
        F: FnOnce() -> std::result::Result<T, E>,
    {
        self.compute_if_absent(key, producer, None)
    }

    /// Fallible form of [`get_or_compute_with_policy`](Self::get_or_compute_with_policy).
    pub fn try_get_or_compute_with_policy<T, E, F, P>(
        &mut self,
        key: &str,
        producer: F,
        policy: P,
    ) -> Result<T>
    where
        T: Any + Send + Sync + Clone,
        E: Into<anyhow::Error>,
        F: FnOnce() -> std::result::Result<T, E>,
        P: ExpirationPolicy + 'static,
    {
        self.compute_if_absent(key, producer, Some(Box::new(policy)))
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    // == Purge Expired ==
    /// Evaluates every entry's policy and evicts the stale ones.
    ///
    /// Returns the number of entries removed. Nothing calls this
    /// automatically.
    pub fn purge_expired(&mut self) -> usize {
        let keys: Vec<String> = self.entries.keys().cloned().collect();

        let removed = keys
            .iter()
            .filter(|key| matches!(self.evaluate(key), Lookup::Expired))
            .count();

        if removed > 0 {
            debug!(removed, "purged expired entries");
        }
        removed
    }

    /// Removes every entry. Counters are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.stats.set_total_entries(0);
    }

    // == Length ==
    /// Returns the current number of entries, including stale ones not yet read.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    // == Is Empty ==
    /// Returns true if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Counts a producer run made on behalf of the store.
    pub(crate) fn record_computation(&mut self) {
        self.stats.record_computation();
    }

    fn insert_entry(&mut self, key: String, entry: CacheEntry) {
        debug!(key = %key, type_name = entry.type_name(), "stored entry");
        self.entries.insert(key, entry);
        self.stats.set_total_entries(self.entries.len());
    }

    fn compute_if_absent<T, E, F>(
        &mut self,
        key: &str,
        producer: F,
        policy: Option<Box<dyn ExpirationPolicy>>,
    ) -> Result<T>
    where
        T: Any + Send + Sync + Clone,
        E: Into<anyhow::Error>,
        F: FnOnce() -> std::result::Result<T, E>,
    {
        if let Some(value) = self.get::<T>(key)? {
            return Ok(value);
        }

        self.record_computation();
        debug!(key, "computing missing value");

        let value = producer().map_err(|err| {
            let source: anyhow::Error = err.into();
            warn!(key, error = %source, "producer failed, nothing stored");
            CacheError::ProducerFailed {
                key: key.to_string(),
                source,
            }
        })?;

        // Built after the producer so the timeout starts at storage time
        let policy: Box<dyn ExpirationPolicy> = match policy {
            Some(policy) => policy,
            None => Box::new(self.default_policy()),
        };
        self.insert_entry(key.to_string(), CacheEntry::new(value.clone(), policy));

        Ok(value)
    }

    /// Looks up a fresh entry, recording a hit or a miss.
    fn live_entry(&mut self, key: &str) -> Option<&CacheEntry> {
        match self.evaluate(key) {
            Lookup::Live => {
                self.stats.record_hit();
                self.entries.get(key)
            }
            Lookup::Missing | Lookup::Expired => {
                self.stats.record_miss();
                debug!(key, "cache miss");
                None
            }
        }
    }

    /// Runs the policy of the entry under `key`, evicting it when stale.
    ///
    /// The entry is detached while its policy runs so the policy can use
    /// the store. A value written to the same key during evaluation wins.
    fn evaluate(&mut self, key: &str) -> Lookup {
        let Some((owned_key, entry)) = self.entries.remove_entry(key) else {
            return Lookup::Missing;
        };

        if entry.policy().is_expired(self) {
            self.stats.record_expiration();
            self.stats.set_total_entries(self.entries.len());
            debug!(key, type_name = entry.type_name(), "evicted expired entry");
            return Lookup::Expired;
        }

        self.entries.entry(owned_key).or_insert(entry);
        Lookup::Live
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self::new()
    }
}
