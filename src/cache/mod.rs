//! Cache Module
//!
//! Provides the in-memory store with lazily evaluated expiration policies.

mod entry;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub(crate) use entry::CacheEntry;
pub use entry::CacheValue;
pub use stats::CacheStats;
pub use store::Cache;
