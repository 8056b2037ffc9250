//! Compare Value Policy Module
//!
//! Expires an entry when an externally tracked value changes, independent
//! of wall-clock time. The policy keeps its state in the cache it guards:
//! the shared instance and its comparison baseline both live in derived
//! cache slots under the store's default timeout.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::cache::Cache;
use crate::error::Result;
use crate::policy::ExpirationPolicy;

/// Suffix of the slot memoizing the shared policy instance for a key.
pub const POLICY_KEY_SUFFIX: &str = "#CompareValuePolicy";

/// Suffix of the slot holding the comparison baseline for a key.
pub const SOURCE_KEY_SUFFIX: &str = "#CompareValuePolicy.source";

// == Compare Value Policy ==
/// Reports an entry stale when the value set through
/// [`set_new_value`](Self::set_new_value) differs from the recorded baseline.
///
/// Values are compared with `PartialEq`. A detected change rolls the
/// baseline forward, so each change expires the entry exactly once.
///
/// The caller must set the new value before every check. A policy that
/// never received one reports every check as expired.
///
/// Setting the value and checking it are two steps. Share one instance
/// across threads only behind the store lock, or use
/// [`check_and_advance`](Self::check_and_advance).
#[derive(Debug)]
pub struct CompareValuePolicy<V> {
    tracking_key: String,
    source_key: String,
    source_value: Mutex<V>,
    new_value: Mutex<Option<V>>,
}

impl<V> CompareValuePolicy<V>
where
    V: PartialEq + Clone + fmt::Debug + Send + Sync + 'static,
{
    // == Get Policy ==
    /// Returns the shared policy for `key`, creating it on first use.
    ///
    /// A new instance takes its baseline from the comparison slot, seeding
    /// the slot with `compare_value` if it is empty. Once the memoized
    /// instance times out, the next call builds a fresh one.
    pub fn get_policy(cache: &mut Cache, key: &str, compare_value: V) -> Result<Arc<Self>> {
        let policy_key = format!("{key}{POLICY_KEY_SUFFIX}");
        if let Some(policy) = cache.get::<Arc<Self>>(&policy_key)? {
            return Ok(policy);
        }

        let source_key = format!("{key}{SOURCE_KEY_SUFFIX}");
        let source_value = cache.get_or_compute(&source_key, || compare_value)?;
        trace!(key, baseline = ?source_value, "created compare value policy");

        let policy = Arc::new(Self {
            tracking_key: key.to_string(),
            source_key,
            source_value: Mutex::new(source_value),
            new_value: Mutex::new(None),
        });
        cache.put(policy_key, Arc::clone(&policy));

        Ok(policy)
    }

    /// Records the value the next expiry check compares against the baseline.
    pub fn set_new_value(&self, new_value: V) -> &Self {
        *self.new_value.lock() = Some(new_value);
        self
    }

    /// Sets the new value and checks it in one call.
    pub fn check_and_advance(&self, cache: &mut Cache, new_value: V) -> bool {
        self.set_new_value(new_value).is_expired(cache)
    }

    pub fn tracking_key(&self) -> &str {
        &self.tracking_key
    }

    /// Returns the baseline as last seen by this instance.
    pub fn source_value(&self) -> V {
        self.source_value.lock().clone()
    }

    pub fn new_value(&self) -> Option<V> {
        self.new_value.lock().clone()
    }

    /// Reads the baseline from its slot, reseeding the slot from this
    /// instance if it timed out or was overwritten with another type.
    fn baseline(&self, cache: &mut Cache) -> V {
        match cache.get::<V>(&self.source_key) {
            Ok(Some(value)) => {
                *self.source_value.lock() = value.clone();
                return value;
            }
            Ok(None) => {
                trace!(key = %self.tracking_key, "baseline slot empty, reseeding");
            }
            Err(err) => {
                warn!(key = %self.tracking_key, error = %err, "baseline slot unusable, reseeding");
            }
        }

        let value = self.source_value();
        cache.put(self.source_key.clone(), value.clone());
        value
    }
}

impl<V> ExpirationPolicy for CompareValuePolicy<V>
where
    V: PartialEq + Clone + fmt::Debug + Send + Sync + 'static,
{
    fn is_expired(&self, cache: &mut Cache) -> bool {
        let Some(new_value) = self.new_value() else {
            trace!(key = %self.tracking_key, "no new value set");
            return true;
        };

        let baseline = self.baseline(cache);
        if new_value == baseline {
            return false;
        }

        trace!(
            key = %self.tracking_key,
            ?baseline,
            ?new_value,
            "tracked value changed, advancing baseline"
        );
        cache.remove(&self.source_key);
        cache.put(self.source_key.clone(), new_value.clone());
        *self.source_value.lock() = new_value;

        true
    }
}
