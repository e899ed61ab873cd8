//! Store doubles shared across integration tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use turnstile::store::memory::{MemoryCounterStore, MemoryKvStore};
use turnstile::{CounterStore, KeyValueStore, Record, StoreError};

/// Counter store that always fails, for surfacing backing-store errors.
#[derive(Debug, Clone, Default)]
pub struct DownCounterStore;

#[async_trait]
impl CounterStore for DownCounterStore {
    async fn increment(&self, _key: &str, _ttl: Duration) -> Result<u64, StoreError> {
        Err(StoreError::retryable(Duration::from_secs(1), "counter service unavailable"))
    }

    async fn get_many(&self, _keys: &[String]) -> Result<Vec<u64>, StoreError> {
        Err(StoreError::retryable(Duration::from_secs(1), "counter service unavailable"))
    }
}

/// Counter store whose snapshots are always stale zeros while increments
/// proceed normally; simulates concurrent consumers racing past the
/// advisory read.
#[derive(Debug, Clone, Default)]
pub struct StaleSnapshotCounterStore {
    inner: MemoryCounterStore,
}

#[async_trait]
impl CounterStore for StaleSnapshotCounterStore {
    async fn increment(&self, key: &str, ttl: Duration) -> Result<u64, StoreError> {
        self.inner.increment(key, ttl).await
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<u64>, StoreError> {
        Ok(vec![0; keys.len()])
    }
}

/// Key-value store whose writes can be failed on demand while reads keep
/// working; exercises the swallow-and-log path after a decision.
#[derive(Debug, Clone, Default)]
pub struct FlakyKvStore {
    inner: MemoryKvStore,
    fail_writes: Arc<AtomicBool>,
}

impl FlakyKvStore {
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl KeyValueStore for FlakyKvStore {
    async fn get(&self, key: &str) -> Result<Option<Record>, StoreError> {
        self.inner.get(key).await
    }

    async fn write(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::fatal("kv write refused"));
        }
        self.inner.write(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.inner.delete(key).await
    }
}
