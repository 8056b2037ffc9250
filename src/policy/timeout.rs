//! Timeout Policy Module
//!
//! Expires an entry a fixed number of seconds after the policy was created.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::cache::Cache;
use crate::policy::ExpirationPolicy;

// == Timeout Policy ==
/// Expires once `timeout_seconds` have elapsed since `created_at`.
///
/// The creation time doubles as the storage time: the store builds the
/// default policy at the moment it inserts the entry.
#[derive(Debug)]
pub struct TimeoutPolicy {
    /// When the policy was created
    created_at: DateTime<Utc>,
    /// Lifetime in seconds, adjustable after construction
    timeout_seconds: AtomicU64,
}

impl TimeoutPolicy {
    /// Timeout applied when none is given (30 minutes).
    pub const DEFAULT_TIMEOUT_SECONDS: u64 = 1800;

    // == Constructor ==
    /// Creates a policy that expires `timeout_seconds` from now.
    pub fn new(timeout_seconds: u64) -> Self {
        Self::with_created_at(Utc::now(), timeout_seconds)
    }

    /// Creates a policy anchored at an explicit creation time.
    pub fn with_created_at(created_at: DateTime<Utc>, timeout_seconds: u64) -> Self {
        Self {
            created_at,
            timeout_seconds: AtomicU64::new(timeout_seconds),
        }
    }

    /// Returns when the policy was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the current lifetime in seconds.
    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds.load(Ordering::Relaxed)
    }

    /// Changes the threshold used by every later expiry check.
    pub fn set_timeout_seconds(&self, timeout_seconds: u64) {
        self.timeout_seconds.store(timeout_seconds, Ordering::Relaxed);
    }

    // == Expires At ==
    /// Returns the instant the policy expires, or None if it lies beyond
    /// the representable range (the policy then never expires).
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let secs = i64::try_from(self.timeout_seconds()).ok()?;
        let delta = TimeDelta::try_seconds(secs)?;
        self.created_at.checked_add_signed(delta)
    }

    // == Remaining ==
    /// Returns the time left before expiry, zero once expired.
    pub fn remaining(&self) -> Option<Duration> {
        self.expires_at().map(|expires| {
            (expires - Utc::now())
                .to_std()
                .unwrap_or(Duration::ZERO)
        })
    }

    /// Boundary condition: expired once the current time reaches the
    /// expiry instant (`now >= created_at + timeout`, not the strict `>`),
    /// so a zero timeout expires immediately even when the clock has not
    /// advanced since creation.
    fn is_expired_now(&self) -> bool {
        match self.expires_at() {
            Some(expires) => Utc::now() >= expires,
            None => false,
        }
    }
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TIMEOUT_SECONDS)
    }
}

impl ExpirationPolicy for TimeoutPolicy {
    fn is_expired(&self, _cache: &mut Cache) -> bool {
        self.is_expired_now()
    }
}
