//! Shared Cache Module
//!
//! Thread-safe handle over a [`Cache`]. The store sits behind an async
//! RwLock; compute-if-absent additionally takes a per-key lock so that at
//! most one producer runs for a key at a time while other keys proceed.

use std::any::Any;
use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;

use once_cell::sync::Lazy;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::cache::{Cache, CacheStats};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::policy::ExpirationPolicy;

type KeyLocks = parking_lot::Mutex<HashMap<String, Arc<Mutex<()>>>>;

static GLOBAL: Lazy<SharedCache> =
    Lazy::new(|| SharedCache::from_config(&CacheConfig::from_env()));

// == Shared Cache ==
/// Cloneable, thread-safe cache handle.
///
/// Clones share the same store.
#[derive(Clone, Default)]
pub struct SharedCache {
    /// The underlying store
    cache: Arc<RwLock<Cache>>,
    /// Per-key locks serialising compute-if-absent calls
    key_locks: Arc<KeyLocks>,
}

impl SharedCache {
    // == Constructor ==
    /// Wraps an existing store.
    pub fn new(cache: Cache) -> Self {
        Self {
            cache: Arc::new(RwLock::new(cache)),
            key_locks: Arc::default(),
        }
    }

    /// Creates a shared store from configuration.
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(Cache::from_config(config))
    }

    /// Returns the process-wide instance, configured from the environment
    /// on first use.
    pub fn global() -> &'static SharedCache {
        &GLOBAL
    }

    // == Put ==
    /// Stores a value under the default timeout policy.
    pub async fn put<T>(&self, key: impl Into<String>, value: T)
    where
        T: Any + Send + Sync,
    {
        self.cache.write().await.put(key, value);
    }

    /// Stores a value governed by `policy`.
    pub async fn put_with_policy<T, P>(&self, key: impl Into<String>, value: T, policy: P)
    where
        T: Any + Send + Sync,
        P: ExpirationPolicy + 'static,
    {
        self.cache.write().await.put_with_policy(key, value, policy);
    }

    /// Retrieves a clone of the value under `key`.
    ///
    /// Takes the write lock since an expired entry is evicted by the read.
    pub async fn get<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: Any + Clone,
    {
        self.cache.write().await.get(key)
    }

    // == Remove ==
    /// Removes the entry for `key`, returning whether one existed.
    pub async fn remove(&self, key: &str) -> bool {
        self.cache.write().await.remove(key)
    }

    /// Returns current cache statistics.
    pub async fn stats(&self) -> CacheStats {
        self.cache.read().await.stats()
    }

    /// Returns the current number of entries.
    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }

    /// Returns true if the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.cache.read().await.is_empty()
    }

    /// Evicts every entry whose policy reports it stale.
    pub async fn purge_expired(&self) -> usize {
        self.cache.write().await.purge_expired()
    }

    /// Runs `f` with exclusive access to the store.
    ///
    /// Use this for multi-step work that must not interleave with other
    /// callers, such as driving a
    /// [`CompareValuePolicy`](crate::CompareValuePolicy).
    pub async fn with<R>(&self, f: impl FnOnce(&mut Cache) -> R) -> R {
        let mut cache = self.cache.write().await;
        f(&mut cache)
    }

    // == Get Or Compute ==
    /// Returns the cached value, or awaits `producer` and stores its result
    /// under the default timeout policy.
    ///
    /// Concurrent calls for the same key wait for the first producer and
    /// then observe its value.
    ///
    /// The per-key lock is not reentrant. A producer must not compute its
    /// own key through this handle, and two producers must not each wait on
    /// the other's key: either deadlocks. Cancelling the returned future is
    /// safe and releases the key.
    pub async fn get_or_compute<T, F, Fut>(&self, key: &str, producer: F) -> Result<T>
    where
        T: Any + Send + Sync + Clone,
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.compute_if_absent(
            key,
            move || async move { Ok::<T, Infallible>(producer().await) },
            None,
        )
        .await
    }

    /// Like [`get_or_compute`](Self::get_or_compute), storing a new value
    /// under `policy`.
    pub async fn get_or_compute_with_policy<T, F, Fut, P>(
        &self,
        key: &str,
        producer: F,
        policy: P,
    ) -> Result<T>
    where
        T: Any + Send + Sync + Clone,
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
        P: ExpirationPolicy + 'static,
    {
        self.compute_if_absent(
            key,
            move || async move { Ok::<T, Infallible>(producer().await) },
            Some(Box::new(policy)),
        )
        .await
    }

    /// Fallible form of [`get_or_compute`](Self::get_or_compute).
    pub async fn try_get_or_compute<T, E, F, Fut>(&self, key: &str, producer: F) -> Result<T>
    where
        T: Any + Send + Sync + Clone,
        E: Into<anyhow::Error>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        self.compute_if_absent(key, producer, None).await
    }

    /// Fallible form of [`get_or_compute_with_policy`](Self::get_or_compute_with_policy).
    pub async fn try_get_or_compute_with_policy<T, E, F, Fut, P>(
        &self,
        key: &str,
        producer: F,
        policy: P,
    ) -> Result<T>
    where
        T: Any + Send + Sync + Clone,
        E: Into<anyhow::Error>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        P: ExpirationPolicy + 'static,
    {
        self.compute_if_absent(key, producer, Some(Box::new(policy)))
            .await
    }

    async fn compute_if_absent<T, E, F, Fut>(
        &self,
        key: &str,
        producer: F,
        policy: Option<Box<dyn ExpirationPolicy>>,
    ) -> Result<T>
    where
        T: Any + Send + Sync + Clone,
        E: Into<anyhow::Error>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let slot = self.key_lock(key);
        let _guard = slot.lock.lock().await;
        self.compute_locked(key, producer, policy).await
    }

    /// Lookup, produce and store while holding the key's lock. The store
    /// lock is released while the producer runs.
    async fn compute_locked<T, E, F, Fut>(
        &self,
        key: &str,
        producer: F,
        policy: Option<Box<dyn ExpirationPolicy>>,
    ) -> Result<T>
    where
        T: Any + Send + Sync + Clone,
        E: Into<anyhow::Error>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        {
            let mut cache = self.cache.write().await;
            if let Some(value) = cache.get::<T>(key)? {
                return Ok(value);
            }
            cache.record_computation();
        }

        debug!(key, "computing missing value");
        let produced = producer().await;

        let mut cache = self.cache.write().await;
        let value = produced.map_err(|err| {
            let source: anyhow::Error = err.into();
            warn!(key, error = %source, "producer failed, nothing stored");
            CacheError::ProducerFailed {
                key: key.to_string(),
                source,
            }
        })?;

        let stored = value.clone();
        match policy {
            Some(policy) => cache.put_with_policy(key, stored, policy),
            None => cache.put(key, stored),
        }

        Ok(value)
    }

    /// Takes (or shares) the lock table slot for `key`.
    fn key_lock<'a>(&'a self, key: &'a str) -> KeyLockSlot<'a> {
        let mut locks = self.key_locks.lock();
        let lock = Arc::clone(locks.entry(key.to_string()).or_default());
        KeyLockSlot {
            table: &self.key_locks,
            key,
            lock,
        }
    }

    #[cfg(test)]
    fn tracked_key_locks(&self) -> usize {
        self.key_locks.lock().len()
    }
}

// == Key Lock Slot ==
/// A caller's share of a per-key lock.
///
/// Dropping it removes the table slot once no other caller holds it, so
/// cancelled and failed calls leave nothing behind.
struct KeyLockSlot<'a> {
    table: &'a KeyLocks,
    key: &'a str,
    lock: Arc<Mutex<()>>,
}

impl Drop for KeyLockSlot<'_> {
    fn drop(&mut self) {
        let mut locks = self.table.lock();
        // Only the table and this slot still hold the lock
        let unused = locks
            .get(self.key)
            .is_some_and(|lock| Arc::ptr_eq(lock, &self.lock) && Arc::strong_count(lock) == 2);
        if unused {
            locks.remove(self.key);
        }
    }
}

impl std::fmt::Debug for SharedCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedCache").finish_non_exhaustive()
    }
}
