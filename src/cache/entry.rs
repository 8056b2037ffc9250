//! Cache Entry Module
//!
//! Defines the structure for individual cache entries: a type-erased value
//! paired with the policy that decides when it goes stale.

use std::any::{self, Any};
use std::fmt;
use std::sync::Arc;

use crate::policy::ExpirationPolicy;

/// Shared, type-erased cached value.
pub type CacheValue = Arc<dyn Any + Send + Sync>;

// == Cache Entry ==
/// Represents a single cache entry with value and expiration policy.
pub(crate) struct CacheEntry {
    /// The stored value
    value: CacheValue,
    /// Type name recorded at insertion, reported on type mismatches
    type_name: &'static str,
    /// Policy deciding when the value goes stale
    policy: Box<dyn ExpirationPolicy>,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry.
    ///
    /// # Arguments
    /// * `value` - The value to store
    /// * `policy` - The expiration policy governing the value
    pub fn new<T>(value: T, policy: Box<dyn ExpirationPolicy>) -> Self
    where
        T: Any + Send + Sync,
    {
        Self {
            value: Arc::new(value),
            type_name: any::type_name::<T>(),
            policy,
        }
    }

    /// Returns a shared handle to the stored value.
    pub fn value(&self) -> CacheValue {
        Arc::clone(&self.value)
    }

    /// Returns the stored value if it is a `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Returns the type name recorded when the value was stored.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns the policy governing this entry.
    pub fn policy(&self) -> &dyn ExpirationPolicy {
        self.policy.as_ref()
    }
}

impl fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntry")
            .field("type_name", &self.type_name)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
