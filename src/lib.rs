//! Expiry Cache - A process-local key-value cache
//!
//! Stores values of any type under string keys. Each entry carries an
//! expiration policy that is evaluated lazily when the entry is read.

pub mod cache;
pub mod config;
pub mod error;
pub mod policy;
pub mod shared;

pub use cache::{Cache, CacheStats, CacheValue};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use policy::{CompareValuePolicy, ExpirationPolicy, TimeoutPolicy};
pub use shared::SharedCache;
