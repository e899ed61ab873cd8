//! Backing-store interfaces.
//!
//! The gate coordinates concurrent callers exclusively through two external
//! services:
//! - [`CounterStore`]: atomic, monotonic, per-key counters with expiry. Its
//!   `increment` is the single serialization point that prevents
//!   over-allocation.
//! - [`KeyValueStore`]: an eventually consistent, last-write-wins record
//!   store holding per-identity throttle state and small pool metadata.
//!
//! Both traits return [`StoreError`] so callers branch on
//! retryable-vs-fatal rather than on transport detail. In-memory
//! implementations live in the [`memory`] module.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::StoreError;

pub mod memory;

/// A record read back from a [`KeyValueStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Stored value, opaque to the store.
    pub value: String,
    /// Epoch millis at which the record was written.
    pub created_at_millis: u64,
}

/// Atomic, monotonic counters with per-key expiry.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically increment the counter for `key` and return the new value.
    ///
    /// Absent keys start at 0, and `ttl` is applied on creation; after the
    /// ttl elapses the key vanishes and a later increment starts over at 1.
    /// Counters are never decremented. Concurrent callers are serialized by
    /// the store, so the returned value is safe to compare against a limit.
    async fn increment(&self, key: &str, ttl: Duration) -> Result<u64, StoreError>;

    /// Read current values for a batch of keys, 0 for absent keys, same
    /// order as `keys`.
    ///
    /// This is a best-effort snapshot for policy evaluation only. It must
    /// never be used as the admission check: concurrent increments may land
    /// between this read and a later `increment`.
    async fn get_many(&self, keys: &[String]) -> Result<Vec<u64>, StoreError>;
}

/// Eventually consistent key-value records, last-write-wins.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch the record for `key`, or `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<Record>, StoreError>;

    /// Write (or overwrite) the record for `key` with the given lifetime.
    async fn write(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Delete the record for `key`. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}
