//! In-memory store backends.
//!
//! Process-local implementations of [`CounterStore`] and [`KeyValueStore`]
//! backed by a mutex-guarded map. They honor TTLs against an injected
//! [`Clock`], which keeps expiry deterministic in tests, and serve as the
//! reference semantics for distributed backends.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::clock::{Clock, SystemClock};
use crate::error::StoreError;
use crate::store::{CounterStore, KeyValueStore, Record};

fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX)
}

#[derive(Debug, Clone, Copy)]
struct CounterEntry {
    value: u64,
    expires_at_millis: u64,
}

/// In-memory [`CounterStore`].
///
/// The whole map sits behind one mutex, so increments are trivially atomic;
/// this mirrors the serialization a distributed counter service performs on
/// its side.
#[derive(Debug, Clone)]
pub struct MemoryCounterStore {
    clock: Arc<dyn Clock>,
    entries: Arc<Mutex<HashMap<String, CounterEntry>>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Use a caller-supplied clock (tests drive expiry with `ManualClock`).
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { clock, entries: Arc::new(Mutex::new(HashMap::new())) }
    }
}

impl Default for MemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn increment(&self, key: &str, ttl: Duration) -> Result<u64, StoreError> {
        let now = self.clock.now_millis();
        let mut entries = self.entries.lock().unwrap();
        let entry = match entries.get(key).copied().filter(|e| e.expires_at_millis > now) {
            // Live counter: bump the value, keep the creation-time expiry.
            Some(live) => CounterEntry { value: live.value + 1, ..live },
            // Absent or expired: restart at 1 with a fresh ttl.
            None => CounterEntry {
                value: 1,
                expires_at_millis: now.saturating_add(ttl_millis(ttl)),
            },
        };
        entries.insert(key.to_string(), entry);
        Ok(entry.value)
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<u64>, StoreError> {
        let now = self.clock.now_millis();
        let entries = self.entries.lock().unwrap();
        Ok(keys
            .iter()
            .map(|key| {
                entries
                    .get(key)
                    .filter(|e| e.expires_at_millis > now)
                    .map(|e| e.value)
                    .unwrap_or(0)
            })
            .collect())
    }
}

#[derive(Debug, Clone)]
struct KvEntry {
    value: String,
    created_at_millis: u64,
    expires_at_millis: u64,
}

/// In-memory [`KeyValueStore`], last-write-wins.
#[derive(Debug, Clone)]
pub struct MemoryKvStore {
    clock: Arc<dyn Clock>,
    entries: Arc<Mutex<HashMap<String, KvEntry>>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Use a caller-supplied clock (tests drive expiry with `ManualClock`).
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { clock, entries: Arc::new(Mutex::new(HashMap::new())) }
    }
}

impl Default for MemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<Record>, StoreError> {
        let now = self.clock.now_millis();
        let entries = self.entries.lock().unwrap();
        Ok(entries.get(key).filter(|e| e.expires_at_millis > now).map(|e| Record {
            value: e.value.clone(),
            created_at_millis: e.created_at_millis,
        }))
    }

    async fn write(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let now = self.clock.now_millis();
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            key.to_string(),
            KvEntry {
                value: value.to_string(),
                created_at_millis: now,
                expires_at_millis: now.saturating_add(ttl_millis(ttl)),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap();
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn increments_are_monotonic_by_one() {
        let store = MemoryCounterStore::new();
        for expected in 1..=50u64 {
            let value = store.increment("pool_x", TTL).await.unwrap();
            assert_eq!(value, expected);
        }
    }

    #[tokio::test]
    async fn concurrent_increments_never_skip_or_repeat() {
        let store = MemoryCounterStore::new();
        let handles: Vec<_> = (0..100)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.increment("pool_x", TTL).await.unwrap() })
            })
            .collect();

        let mut values: Vec<u64> = futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();
        values.sort_unstable();
        let expected: Vec<u64> = (1..=100).collect();
        assert_eq!(values, expected);
    }

    #[tokio::test]
    async fn counters_are_independent_per_key() {
        let store = MemoryCounterStore::new();
        store.increment("pool_a", TTL).await.unwrap();
        store.increment("pool_a", TTL).await.unwrap();
        assert_eq!(store.increment("pool_b", TTL).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn expired_counter_restarts_at_one() {
        let clock = ManualClock::starting_at(1_000);
        let store = MemoryCounterStore::with_clock(Arc::new(clock.clone()));

        assert_eq!(store.increment("pool_x", TTL).await.unwrap(), 1);
        assert_eq!(store.increment("pool_x", TTL).await.unwrap(), 2);

        clock.advance(TTL + Duration::from_millis(1));
        assert_eq!(store.increment("pool_x", TTL).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn get_many_reports_zero_for_absent_and_expired() {
        let clock = ManualClock::starting_at(1_000);
        let store = MemoryCounterStore::with_clock(Arc::new(clock.clone()));

        store.increment("pool_a", TTL).await.unwrap();
        store.increment("pool_a", TTL).await.unwrap();
        store.increment("pool_b", TTL).await.unwrap();

        let keys: Vec<String> =
            ["pool_a", "pool_b", "pool_c"].iter().map(|s| s.to_string()).collect();
        assert_eq!(store.get_many(&keys).await.unwrap(), vec![2, 1, 0]);

        clock.advance(TTL + Duration::from_millis(1));
        assert_eq!(store.get_many(&keys).await.unwrap(), vec![0, 0, 0]);
    }

    #[tokio::test]
    async fn kv_roundtrip_reports_creation_time() {
        let clock = ManualClock::starting_at(5_000);
        let store = MemoryKvStore::with_clock(Arc::new(clock.clone()));

        store.write("pool_u1", "5000", TTL).await.unwrap();
        let record = store.get("pool_u1").await.unwrap().expect("record");
        assert_eq!(record.value, "5000");
        assert_eq!(record.created_at_millis, 5_000);
    }

    #[tokio::test]
    async fn kv_last_write_wins() {
        let store = MemoryKvStore::new();
        store.write("k", "first", TTL).await.unwrap();
        store.write("k", "second", TTL).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().unwrap().value, "second");
    }

    #[tokio::test]
    async fn kv_records_expire() {
        let clock = ManualClock::starting_at(0);
        let store = MemoryKvStore::with_clock(Arc::new(clock.clone()));

        store.write("k", "v", Duration::from_secs(10)).await.unwrap();
        assert!(store.get("k").await.unwrap().is_some());

        clock.advance(Duration::from_secs(11));
        assert!(store.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn kv_delete_is_idempotent() {
        let store = MemoryKvStore::new();
        store.write("k", "v", TTL).await.unwrap();
        store.delete("k").await.unwrap();
        assert!(store.get("k").await.unwrap().is_none());
        store.delete("k").await.unwrap();
    }
}
