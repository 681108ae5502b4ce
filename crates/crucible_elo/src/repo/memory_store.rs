//! In-memory hash store.
//!
//! # Responsibility
//! - Provide a process-local `HashStore` with the same atomicity and expiry
//!   contract as the SQLite store.
//! - Expose write counting and outage simulation for callers' tests.
//!
//! # Invariants
//! - Every operation runs under one mutex, so `update_pair` is atomic with
//!   respect to every other operation on the same store.
//! - While marked unavailable, every operation fails before touching state.

use crate::clock::{duration_to_ms, Clock, SystemClock};
use crate::repo::hash_store::{
    checked_increment, decode_value, encode_value, ensure_distinct_fields, HashStore,
    PairCompute, PairUpdate, StoreError, StoreResult,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Default)]
struct MemoryHash {
    fields: BTreeMap<String, String>,
    expires_at_ms: Option<i64>,
}

impl MemoryHash {
    fn is_expired(&self, now_ms: i64) -> bool {
        self.expires_at_ms
            .is_some_and(|expires_at_ms| expires_at_ms <= now_ms)
    }
}

#[derive(Debug)]
struct MemoryState {
    hashes: HashMap<String, MemoryHash>,
    available: bool,
    write_calls: u64,
}

impl MemoryState {
    fn live(&self, key: &str, now_ms: i64) -> Option<&MemoryHash> {
        self.hashes.get(key).filter(|hash| !hash.is_expired(now_ms))
    }

    /// Returns the live hash at `key`, creating it (and dropping an expired
    /// predecessor) when needed.
    fn live_mut(&mut self, key: &str, now_ms: i64) -> &mut MemoryHash {
        if self.hashes.get(key).is_some_and(|hash| hash.is_expired(now_ms)) {
            self.hashes.remove(key);
        }
        self.hashes.entry(key.to_string()).or_default()
    }
}

/// `HashStore` held in process memory. Clones share the same state.
#[derive(Clone)]
pub struct MemoryHashStore {
    state: Arc<Mutex<MemoryState>>,
    clock: Arc<dyn Clock>,
}

impl MemoryHashStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                hashes: HashMap::new(),
                available: true,
                write_calls: 0,
            })),
            clock,
        }
    }

    /// Marks the store reachable or unreachable.
    pub fn set_available(&self, available: bool) {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.available = available;
    }

    /// Number of mutating calls that reached the store.
    pub fn write_calls(&self) -> StoreResult<u64> {
        Ok(self.lock()?.write_calls)
    }

    /// Number of keys currently held, expired or not.
    pub fn key_count(&self) -> StoreResult<usize> {
        Ok(self.lock()?.hashes.len())
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, MemoryState>> {
        let state = self
            .state
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))?;
        if !state.available {
            return Err(StoreError::Unavailable(
                "memory store marked unavailable".to_string(),
            ));
        }
        Ok(state)
    }

    fn lock_for_write(&self) -> StoreResult<MutexGuard<'_, MemoryState>> {
        let mut state = self.lock()?;
        state.write_calls += 1;
        Ok(state)
    }
}

impl Default for MemoryHashStore {
    fn default() -> Self {
        Self::new()
    }
}

impl HashStore for MemoryHashStore {
    fn get_field(&self, key: &str, field: &str) -> StoreResult<Option<i64>> {
        let state = self.lock()?;
        state
            .live(key, self.clock.now_ms())
            .and_then(|hash| hash.fields.get(field))
            .map(|raw| decode_value(key, field, raw))
            .transpose()
    }

    fn get_all(&self, key: &str) -> StoreResult<BTreeMap<String, i64>> {
        let state = self.lock()?;
        let Some(hash) = state.live(key, self.clock.now_ms()) else {
            return Ok(BTreeMap::new());
        };

        hash.fields
            .iter()
            .map(|(field, raw)| decode_value(key, field, raw).map(|value| (field.clone(), value)))
            .collect()
    }

    fn field_exists(&self, key: &str, field: &str) -> StoreResult<bool> {
        let state = self.lock()?;
        Ok(state
            .live(key, self.clock.now_ms())
            .is_some_and(|hash| hash.fields.contains_key(field)))
    }

    fn set_fields(&self, key: &str, fields: &[(String, i64)]) -> StoreResult<()> {
        let mut state = self.lock_for_write()?;
        if fields.is_empty() {
            return Ok(());
        }

        let hash = state.live_mut(key, self.clock.now_ms());
        for (field, value) in fields {
            hash.fields.insert(field.clone(), encode_value(*value));
        }
        Ok(())
    }

    fn increment_field(&self, key: &str, field: &str, by: i64) -> StoreResult<i64> {
        let mut state = self.lock_for_write()?;
        let hash = state.live_mut(key, self.clock.now_ms());
        let current = match hash.fields.get(field) {
            Some(raw) => decode_value(key, field, raw)?,
            None => 0,
        };
        let next = checked_increment(key, field, current, by)?;
        hash.fields.insert(field.to_string(), encode_value(next));
        Ok(next)
    }

    fn update_pair(
        &self,
        key: &str,
        fields: [&str; 2],
        compute: &mut PairCompute<'_>,
    ) -> StoreResult<PairUpdate> {
        ensure_distinct_fields(fields)?;

        let mut state = self.lock_for_write()?;
        let now_ms = self.clock.now_ms();
        let old = match state.live(key, now_ms) {
            Some(hash) => [
                read_field(hash, key, fields[0])?,
                read_field(hash, key, fields[1])?,
            ],
            None => [None, None],
        };
        let new = compute(old)?;

        let hash = state.live_mut(key, now_ms);
        hash.fields.insert(fields[0].to_string(), encode_value(new[0]));
        hash.fields.insert(fields[1].to_string(), encode_value(new[1]));
        Ok(PairUpdate { old, new })
    }

    fn delete_keys(&self, keys: &[&str]) -> StoreResult<()> {
        let mut state = self.lock_for_write()?;
        for key in keys {
            state.hashes.remove(*key);
        }
        Ok(())
    }

    fn expire_keys(&self, keys: &[&str], ttl: Duration) -> StoreResult<()> {
        let mut state = self.lock_for_write()?;
        let now_ms = self.clock.now_ms();
        let expires_at_ms = now_ms.saturating_add(duration_to_ms(ttl));
        for key in keys {
            if state.live(key, now_ms).is_none() {
                state.hashes.remove(*key);
                continue;
            }
            if let Some(hash) = state.hashes.get_mut(*key) {
                hash.expires_at_ms = Some(expires_at_ms);
            }
        }
        Ok(())
    }

    fn purge_expired(&self) -> StoreResult<usize> {
        let mut state = self.lock_for_write()?;
        let now_ms = self.clock.now_ms();
        let before = state.hashes.len();
        state.hashes.retain(|_, hash| !hash.is_expired(now_ms));
        Ok(before - state.hashes.len())
    }
}

fn read_field(hash: &MemoryHash, key: &str, field: &str) -> StoreResult<Option<i64>> {
    hash.fields
        .get(field)
        .map(|raw| decode_value(key, field, raw))
        .transpose()
}
