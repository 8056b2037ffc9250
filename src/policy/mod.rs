//! Expiration Policy Module
//!
//! Pluggable rules deciding whether a cache entry is stale. Policies are
//! evaluated lazily, at the moment a read discovers the entry.

mod compare_value;
mod timeout;

use std::fmt;
use std::sync::Arc;

use crate::cache::Cache;

pub use compare_value::{CompareValuePolicy, POLICY_KEY_SUFFIX, SOURCE_KEY_SUFFIX};
pub use timeout::TimeoutPolicy;

// == Expiration Policy ==
/// Decides whether the entry it is attached to has gone stale.
///
/// The store passes itself in so a policy may keep its own state in the
/// cache it guards. The entry under evaluation is detached from the store
/// for the duration of the call.
pub trait ExpirationPolicy: Send + Sync + fmt::Debug {
    /// Returns true when the entry must be treated as absent.
    fn is_expired(&self, cache: &mut Cache) -> bool;
}

impl<P: ExpirationPolicy + ?Sized> ExpirationPolicy for Arc<P> {
    fn is_expired(&self, cache: &mut Cache) -> bool {
        (**self).is_expired(cache)
    }
}

impl<P: ExpirationPolicy + ?Sized> ExpirationPolicy for Box<P> {
    fn is_expired(&self, cache: &mut Cache) -> bool {
        (**self).is_expired(cache)
    }
}
