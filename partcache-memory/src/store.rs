// Copyright 2026 foyer Project Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{collections::BTreeMap, hash::BuildHasher, sync::Arc};

use ahash::RandomState;
use hashbrown::HashMap;
use itertools::Itertools;
use parking_lot::{Mutex, RwLock};
use partcache_common::{
    error::{Error, Result},
    event::{Event, EventListener},
    strict_assert,
};
use serde::{Deserialize, Serialize};

use crate::{
    entry::{CacheEntry, Payload},
    metrics::{Metrics, MetricsSnapshot},
    policy::{keep_all::KeepAll, CachePolicy, PolicyCallbacks, PolicyKind, PolicyStats},
};

/// How [`PartitionKeyStore::update`] treats recency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateRecency {
    /// Leave the policy untouched.
    ///
    /// Callers are expected to `get` the partition in the same logical operation before updating it. Nothing
    /// checks that they did: an update without a prior get leaves the recency order stale.
    #[default]
    Preserve,
    /// Record the update as an access, as if the caller had called `get` right after it.
    Touch,
}

/// Config of a [`PartitionKeyStore`].
pub struct StoreConfig<P> {
    /// Count of map shards. Keys are distributed by hash, operations on different shards do not contend.
    pub shards: usize,
    /// Whether the owning table is a unified view, which allows serde format bookkeeping.
    pub unified_view: bool,
    /// Recency behavior of in-place updates.
    pub update_recency: UpdateRecency,
    /// Listener told about every entry that leaves the store.
    pub event_listener: Option<Arc<dyn EventListener<Key = String, Value = P>>>,
}

impl<P> Default for StoreConfig<P> {
    fn default() -> Self {
        Self {
            shards: 8,
            unified_view: false,
            update_recency: UpdateRecency::default(),
            event_listener: None,
        }
    }
}

type Shard<P> = RwLock<HashMap<String, CacheEntry<P>>>;

struct StoreInner<P>
where
    P: Payload,
{
    shards: Vec<Shard<P>>,
    serde_formats: RwLock<HashMap<String, String>>,

    // Lock order: policy, then shard, then serde formats. A policy swap replaces the contents of this one mutex, so
    // every "mutate then notify" sequence is serialized against the swap too.
    policy: Mutex<CachePolicy<String, CacheEntry<P>>>,

    hash_builder: RandomState,
    unified_view: bool,
    update_recency: UpdateRecency,

    metrics: Metrics,
    event_listener: Option<Arc<dyn EventListener<Key = String, Value = P>>>,
}

impl<P> StoreInner<P>
where
    P: Payload,
{
    fn shard(&self, key: &str) -> &Shard<P> {
        let hash = self.hash_builder.hash_one(key);
        &self.shards[hash as usize % self.shards.len()]
    }

    fn lookup(&self, key: &str) -> Option<CacheEntry<P>> {
        self.shard(key).read().get(key).cloned()
    }

    fn notify_leave(&self, event: Event, key: &str, entry: &CacheEntry<P>) {
        if let Some(listener) = self.event_listener.as_ref() {
            listener.on_leave(event, &key.to_string(), &entry.payload());
        }
    }

    /// Drop an entry chosen by the cache policy from both maps.
    ///
    /// Only the entry the policy handed out is dropped. If the key has been re-put with a fresh entry in the
    /// meantime, the fresh entry stays.
    fn purge(&self, key: &str, entry: &CacheEntry<P>) {
        let purged = {
            let mut shard = self.shard(key).write();
            match shard.get(key) {
                Some(current) if current.ptr_eq(entry) => shard.remove(key),
                _ => None,
            }
        };

        match purged {
            Some(purged) => {
                self.serde_formats.write().remove(key);
                self.metrics.record_evict();
                self.notify_leave(Event::Evict, key, &purged);
            }
            None => tracing::debug!(partition = key, "[store]: evicted entry is no longer the live one, skip purge"),
        }
    }
}

/// [`PartitionKeyStore`] maps partition keys to their cached payloads for one table.
///
/// Keys are opaque strings, conventionally `col1=v1/col2=v2`. Each key maps to exactly one [`CacheEntry`], and the
/// active [`CachePolicy`] holds the very same entry, so in-place updates never look like insertions to the policy.
///
/// # Concurrency
///
/// The maps are sharded behind read-write locks. Every operation that consults the policy first takes the policy
/// mutex, then mutates the map, then notifies the policy, so for a single key the sequence "mutate, notify" is
/// atomic. Evictions happen inside `put` (or a `get` that re-registers a key) with the mutex held: the store drops
/// the victim from both maps and then runs the release callback, all before the triggering call returns. A slow
/// release callback therefore blocks the inserting caller and every other policy-consulting operation on the store.
///
/// Callbacks and event listeners must not call back into the store.
pub struct PartitionKeyStore<P>
where
    P: Payload,
{
    inner: Arc<StoreInner<P>>,
}

impl<P> Clone for PartitionKeyStore<P>
where
    P: Payload,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<P> PartitionKeyStore<P>
where
    P: Payload,
{
    /// Create a store with the keep-all policy.
    pub fn new(config: StoreConfig<P>) -> Self {
        assert!(config.shards > 0, "shards must be greater than zero.");

        let shards = (0..config.shards).map(|_| RwLock::new(HashMap::new())).collect_vec();
        let policy = CachePolicy::KeepAll(KeepAll::new());

        let inner = StoreInner {
            shards,
            serde_formats: RwLock::new(HashMap::new()),
            policy: Mutex::new(policy),
            hash_builder: RandomState::default(),
            unified_view: config.unified_view,
            update_recency: config.update_recency,
            metrics: Metrics::default(),
            event_listener: config.event_listener,
        };

        Self { inner: Arc::new(inner) }
    }

    /// Install a new cache policy.
    ///
    /// `on_load` runs when the policy re-registers a partition it does not track yet; `on_evict` runs for every
    /// victim after the store has dropped it from both maps. Errors returned by either are wrapped into
    /// [`ErrorKind::External`](partcache_common::error::ErrorKind::External) errors naming the callback and the
    /// partition, and surface from the operation that triggered them. Nothing is rolled back.
    ///
    /// The previous policy's bookkeeping is discarded without evicting anything. The new policy starts cold and
    /// learns about existing partitions as they are accessed. On error the previous policy stays active.
    ///
    /// The swap takes the policy lock, so it waits for in-flight operations and every later operation sees the new
    /// policy.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "partcache::memory::store::configure_policy"))]
    pub fn configure_policy<L, V>(&self, kind: PolicyKind, on_load: L, on_evict: V) -> Result<()>
    where
        L: Fn(&str, &P) -> Result<()> + Send + Sync + 'static,
        V: Fn(&str, &P) -> Result<()> + Send + Sync + 'static,
    {
        let weak = Arc::downgrade(&self.inner);

        let load = {
            let weak = weak.clone();
            move |key: &String| -> Result<Option<CacheEntry<P>>> {
                let Some(entry) = weak.upgrade().and_then(|inner| inner.lookup(key)) else {
                    return Ok(None);
                };
                on_load(key, &entry.payload()).map_err(|e| {
                    tracing::warn!(partition = key.as_str(), "[store]: load callback failed: {e}");
                    Error::callback("load", key, e)
                })?;
                Ok(Some(entry))
            }
        };

        let evict = move |key: String, entry: CacheEntry<P>| -> Result<()> {
            if let Some(inner) = weak.upgrade() {
                inner.purge(&key, &entry);
            }
            on_evict(&key, &entry.payload()).map_err(|e| {
                tracing::warn!(partition = %key, "[store]: evict callback failed: {e}");
                Error::callback("evict", &key, e)
            })
        };

        let policy = CachePolicy::new(kind, PolicyCallbacks::new(load, evict))?;
        *self.inner.policy.lock() = policy;

        tracing::debug!(policy = %kind, "[store]: cache policy configured");

        Ok(())
    }

    /// Whether the store holds `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.inner.shard(key).read().contains_key(key)
    }

    /// Get the payload of `key` and record the access with the policy.
    ///
    /// A missing key is a normal miss and returns `Ok(None)`. The access is forwarded to the policy either way.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "partcache::memory::store::get"))]
    pub fn get(&self, key: &str) -> Result<Option<P>> {
        let mut policy = self.inner.policy.lock();

        let entry = self.inner.lookup(key);
        match entry {
            Some(_) => self.inner.metrics.record_hit(),
            None => self.inner.metrics.record_miss(),
        }

        policy.notify_get(key)?;

        Ok(entry.map(|entry| entry.payload()))
    }

    /// Put `payload` under `key` in a fresh entry and register it with the policy.
    ///
    /// Any previous entry of the key is replaced, and its payload is returned so the caller can release it. If the
    /// put crosses the policy's capacity, one other partition is evicted before this returns.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "partcache::memory::store::put"))]
    pub fn put(&self, key: impl Into<String>, payload: P) -> Result<Option<P>> {
        let key = key.into();
        let entry = CacheEntry::new(payload);

        let mut policy = self.inner.policy.lock();

        let old = self.inner.shard(&key).write().insert(key.clone(), entry.clone());
        let old = match old {
            Some(old) => {
                self.inner.metrics.record_replace();
                self.inner.notify_leave(Event::Replace, &key, &old);
                Some(old.payload())
            }
            None => {
                self.inner.metrics.record_insert();
                None
            }
        };

        policy.notify_put(key, entry)?;

        Ok(old)
    }

    /// Swap the payload of an existing entry in place and return the previous payload.
    ///
    /// The entry keeps its identity, so the policy does not see a new insertion. Whether the update counts as an
    /// access is decided by [`UpdateRecency`]. A missing key is a no-op returning `Ok(None)`.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "partcache::memory::store::update"))]
    pub fn update(&self, key: &str, payload: P) -> Result<Option<P>> {
        let mut policy = self.inner.policy.lock();

        let Some(entry) = self.inner.lookup(key) else {
            if self.inner.update_recency == UpdateRecency::Touch {
                tracing::warn!(partition = key, "[store]: update on a missing partition is ignored");
            }
            return Ok(None);
        };

        let old = entry.replace(payload);
        self.inner.metrics.record_update();

        if self.inner.update_recency == UpdateRecency::Touch {
            policy.notify_get(key)?;
        }

        Ok(Some(old))
    }

    /// Remove `key` and its serde format, and tell the policy. No release callback runs.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "partcache::memory::store::remove"))]
    pub fn remove(&self, key: &str) -> Option<P> {
        let mut policy = self.inner.policy.lock();

        let entry = self.inner.shard(key).write().remove(key);
        self.inner.serde_formats.write().remove(key);
        let entry = entry?;

        policy.notify_remove(key);
        strict_assert!(!policy.contains(key));

        self.inner.metrics.record_remove();
        self.inner.notify_leave(Event::Remove, key, &entry);

        Some(entry.payload())
    }

    /// Drop every entry and serde format, and reset the policy's bookkeeping.
    ///
    /// No release callback runs. The removed payloads are returned so the caller can release them.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "partcache::memory::store::clear"))]
    pub fn clear(&self) -> Vec<(String, P)> {
        let mut policy = self.inner.policy.lock();

        let mut drained = vec![];
        for shard in self.inner.shards.iter() {
            drained.extend(shard.write().drain());
        }
        self.inner.serde_formats.write().clear();
        policy.clear();

        drained
            .into_iter()
            .map(|(key, entry)| {
                self.inner.notify_leave(Event::Clear, &key, &entry);
                (key, entry.payload())
            })
            .collect()
    }

    /// Record the serialization format of a partition.
    ///
    /// Only unified-view stores keep serde formats; any other store fails with
    /// [`ErrorKind::Precondition`](partcache_common::error::ErrorKind::Precondition). The format may be recorded
    /// before the partition is put, and it is dropped together with the partition.
    pub fn set_serde_format(&self, key: impl Into<String>, format: impl Into<String>) -> Result<()> {
        let key = key.into();
        if !self.inner.unified_view {
            return Err(Error::not_unified_view(&key));
        }
        self.inner.serde_formats.write().insert(key, format.into());
        Ok(())
    }

    /// Get the serialization format of a partition.
    pub fn serde_format(&self, key: &str) -> Option<String> {
        self.inner.serde_formats.read().get(key).cloned()
    }

    /// Point-in-time copy of every key and its payload.
    ///
    /// All shards are read-locked together while copying, so the snapshot is a state the store actually went
    /// through. Later mutations are not reflected.
    pub fn snapshot(&self) -> BTreeMap<String, P> {
        let shards = self.inner.shards.iter().map(|shard| shard.read()).collect_vec();
        shards
            .iter()
            .flat_map(|shard| shard.iter().map(|(key, entry)| (key.clone(), entry.payload())))
            .collect()
    }

    /// Point-in-time copy of every serde format.
    pub fn serde_formats(&self) -> BTreeMap<String, String> {
        self.inner
            .serde_formats
            .read()
            .iter()
            .map(|(key, format)| (key.clone(), format.clone()))
            .collect()
    }

    /// Sorted keys of a point-in-time snapshot.
    pub fn keys(&self) -> Vec<String> {
        let shards = self.inner.shards.iter().map(|shard| shard.read()).collect_vec();
        shards.iter().flat_map(|shard| shard.keys().cloned()).sorted().collect()
    }

    /// Count of entries.
    pub fn len(&self) -> usize {
        self.inner.shards.iter().map(|shard| shard.read().len()).sum()
    }

    /// Whether the store holds no entry.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the store keeps serde formats.
    pub fn is_unified_view(&self) -> bool {
        self.inner.unified_view
    }

    /// Recency behavior of in-place updates.
    pub fn update_recency(&self) -> UpdateRecency {
        self.inner.update_recency
    }

    /// Strategy of the active policy.
    pub fn policy_kind(&self) -> PolicyKind {
        self.inner.policy.lock().kind()
    }

    /// Keys tracked by the active policy, least recently used first.
    pub fn policy_keys(&self) -> Vec<String> {
        self.inner.policy.lock().keys()
    }

    /// Counters of the active policy.
    pub fn policy_stats(&self) -> PolicyStats {
        self.inner.policy.lock().stats()
    }

    /// Store-level counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    /// Count of map shards.
    pub fn shards(&self) -> usize {
        self.inner.shards.len()
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, thread, time::Duration};

    use partcache_common::{error::ErrorKind, event::FnEventListener};
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::*;
    use crate::test_utils::{CallbackRecorder, RecordingListener};

    fn lru_store(max_size: usize, config: StoreConfig<u64>) -> (PartitionKeyStore<u64>, CallbackRecorder) {
        let store = PartitionKeyStore::new(config);
        let recorder = CallbackRecorder::default();
        store
            .configure_policy(PolicyKind::Lru { max_size }, recorder.on_load(), recorder.on_evict())
            .unwrap();
        (store, recorder)
    }

    #[test_log::test]
    fn test_keep_all_by_default() {
        let store = PartitionKeyStore::<u64>::new(StoreConfig::default());
        assert_eq!(store.policy_kind(), PolicyKind::KeepAll);

        for i in 0..100 {
            store.put(format!("p={i}"), i).unwrap();
        }
        assert_eq!(store.len(), 100);
        assert!(store.policy_keys().is_empty());
        assert_eq!(store.get("p=42").unwrap(), Some(42));
        assert_eq!(store.get("p=100").unwrap(), None);

        let metrics = store.metrics();
        assert_eq!(metrics.inserts, 100);
        assert_eq!(metrics.hits, 1);
        assert_eq!(metrics.misses, 1);
        assert_eq!(metrics.evictions, 0);
    }

    #[test_log::test]
    fn test_lru_evicts_least_recently_used() {
        let (store, recorder) = lru_store(2, StoreConfig::default());

        store.put("p1", 1).unwrap();
        store.put("p2", 2).unwrap();
        assert_eq!(store.get("p1").unwrap(), Some(1));
        store.put("p3", 3).unwrap();

        assert_eq!(recorder.evicts(), vec!["p2".to_string()]);
        assert_eq!(store.keys(), vec!["p1".to_string(), "p3".to_string()]);
        assert_eq!(store.policy_keys(), vec!["p1".to_string(), "p3".to_string()]);
        assert_eq!(store.metrics().evictions, 1);
        assert!(recorder.loads().is_empty());
    }

    #[test_log::test]
    fn test_update_preserves_recency() {
        let (store, recorder) = lru_store(2, StoreConfig::default());

        store.put("p1", 1).unwrap();
        store.put("p2", 2).unwrap();
        assert_eq!(store.update("p1", 10).unwrap(), Some(1));
        store.put("p3", 3).unwrap();

        // The update alone does not refresh "p1".
        assert_eq!(recorder.evicts(), vec!["p1".to_string()]);
        assert_eq!(store.get("p1").unwrap(), None);
        assert_eq!(store.get("p2").unwrap(), Some(2));
    }

    #[test_log::test]
    fn test_update_after_get_keeps_entry_resident() {
        let (store, recorder) = lru_store(2, StoreConfig::default());

        store.put("p1", 1).unwrap();
        store.put("p2", 2).unwrap();
        assert_eq!(store.get("p1").unwrap(), Some(1));
        store.update("p1", 11).unwrap();
        store.put("p3", 3).unwrap();

        assert_eq!(recorder.evicts(), vec!["p2".to_string()]);
        assert_eq!(store.get("p1").unwrap(), Some(11));
        // An in-place update is never seen as an insertion.
        assert_eq!(store.metrics().inserts, 3);
        assert_eq!(store.metrics().updates, 1);
    }

    #[test_log::test]
    fn test_update_touch() {
        let config: StoreConfig<u64> = StoreConfig {
            update_recency: UpdateRecency::Touch,
            ..Default::default()
        };
        let (store, recorder) = lru_store(2, config);

        store.put("p1", 1).unwrap();
        store.put("p2", 2).unwrap();
        store.update("p1", 10).unwrap();
        store.put("p3", 3).unwrap();

        assert_eq!(recorder.evicts(), vec!["p2".to_string()]);
        assert_eq!(store.get("p1").unwrap(), Some(10));
    }

    #[test_log::test]
    fn test_update_missing_is_noop() {
        for recency in [UpdateRecency::Preserve, UpdateRecency::Touch] {
            let config: StoreConfig<u64> = StoreConfig {
                update_recency: recency,
                ..Default::default()
            };
            let (store, recorder) = lru_store(2, config);
            assert_eq!(store.update("p1", 1).unwrap(), None);
            assert!(store.is_empty());
            assert!(store.policy_keys().is_empty());
            assert!(recorder.loads().is_empty());
        }
    }

    #[test_log::test]
    fn test_entry_shared_with_policy() {
        let (store, _) = lru_store(2, StoreConfig::default());
        store.put("p1", 1).unwrap();

        // One handle in the map, one in the lru list, one here.
        let entry = store.inner.lookup("p1").unwrap();
        assert_eq!(entry.refs(), 3);

        store.update("p1", 2).unwrap();
        assert_eq!(entry.payload(), 2);

        store.put("p1", 3).unwrap();
        assert_eq!(entry.refs(), 1);
        assert_eq!(entry.payload(), 2);
    }

    #[test_log::test]
    fn test_put_replaces_entry() {
        let listener = Arc::new(RecordingListener::<u64>::default());
        let config: StoreConfig<u64> = StoreConfig {
            event_listener: Some(listener.clone()),
            ..Default::default()
        };
        let (store, recorder) = lru_store(2, config);

        assert_eq!(store.put("p1", 1).unwrap(), None);
        assert_eq!(store.put("p1", 2).unwrap(), Some(1));
        assert_eq!(store.get("p1").unwrap(), Some(2));
        assert_eq!(store.len(), 1);
        assert_eq!(store.policy_keys(), vec!["p1".to_string()]);
        assert!(recorder.evicts().is_empty());
        assert_eq!(listener.events(), vec![(Event::Replace, "p1".to_string(), 1)]);

        let metrics = store.metrics();
        assert_eq!(metrics.inserts, 1);
        assert_eq!(metrics.replaces, 1);
    }

    #[test_log::test]
    fn test_remove() {
        let listener = Arc::new(RecordingListener::<u64>::default());
        let config: StoreConfig<u64> = StoreConfig {
            unified_view: true,
            event_listener: Some(listener.clone()),
            ..Default::default()
        };
        let (store, recorder) = lru_store(4, config);

        assert_eq!(store.remove("p1"), None);

        store.put("p1", 1).unwrap();
        store.set_serde_format("p1", "parquet").unwrap();
        assert_eq!(store.remove("p1"), Some(1));

        assert!(!store.contains("p1"));
        assert_eq!(store.serde_format("p1"), None);
        assert!(store.policy_keys().is_empty());
        assert!(recorder.evicts().is_empty());
        assert_eq!(listener.events(), vec![(Event::Remove, "p1".to_string(), 1)]);
        assert_eq!(store.metrics().removes, 1);
    }

    #[test_log::test]
    fn test_serde_format_requires_unified_view() {
        let store = PartitionKeyStore::<u64>::new(StoreConfig::default());
        let e = store.set_serde_format("p1", "parquet").unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Precondition);
        assert_eq!(store.serde_format("p1"), None);
        assert!(store.serde_formats().is_empty());
    }

    #[test_log::test]
    fn test_serde_format_follows_entry() {
        let config: StoreConfig<u64> = StoreConfig {
            unified_view: true,
            ..Default::default()
        };
        let (store, recorder) = lru_store(1, config);

        // Formats may be recorded ahead of the partition.
        store.set_serde_format("p1", "orc").unwrap();
        assert_eq!(store.serde_format("p1").as_deref(), Some("orc"));

        store.put("p1", 1).unwrap();
        store.set_serde_format("p1", "parquet").unwrap();
        assert_eq!(store.serde_format("p1").as_deref(), Some("parquet"));

        store.put("p2", 2).unwrap();
        assert_eq!(recorder.evicts(), vec!["p1".to_string()]);
        assert_eq!(store.serde_format("p1"), None);
        assert!(store.serde_formats().is_empty());
    }

    #[test_log::test]
    fn test_policy_swap_starts_cold() {
        let store = PartitionKeyStore::<u64>::new(StoreConfig::default());
        for (i, key) in ["p1", "p2", "p3"].into_iter().enumerate() {
            store.put(key, i as u64).unwrap();
        }

        let recorder = CallbackRecorder::default();
        store
            .configure_policy(PolicyKind::Lru { max_size: 2 }, recorder.on_load(), recorder.on_evict())
            .unwrap();

        // Nothing is evicted on install even though the store is over capacity.
        assert_eq!(store.len(), 3);
        assert!(store.policy_keys().is_empty());
        assert!(recorder.evicts().is_empty());

        assert_eq!(store.get("p1").unwrap(), Some(0));
        assert_eq!(store.get("p2").unwrap(), Some(1));
        assert_eq!(store.get("p3").unwrap(), Some(2));

        assert_eq!(recorder.loads(), vec!["p1".to_string(), "p2".to_string(), "p3".to_string()]);
        assert_eq!(recorder.evicts(), vec!["p1".to_string()]);
        assert_eq!(store.keys(), vec!["p2".to_string(), "p3".to_string()]);
        assert_eq!(store.policy_stats().loads, 3);
    }

    #[test_log::test]
    fn test_zero_capacity_keeps_previous_policy() {
        let store = PartitionKeyStore::<u64>::new(StoreConfig::default());
        let recorder = CallbackRecorder::default();
        let e = store
            .configure_policy(PolicyKind::Lru { max_size: 0 }, recorder.on_load(), recorder.on_evict())
            .unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Config);
        assert_eq!(store.policy_kind(), PolicyKind::KeepAll);
    }

    #[test_log::test]
    fn test_failing_load_callback_after_policy_swap() {
        let store = PartitionKeyStore::<u64>::new(StoreConfig::default());
        store.put("p1", 1).unwrap();

        let recorder = CallbackRecorder::default();
        recorder.fail_load_of("p1");
        store
            .configure_policy(PolicyKind::Lru { max_size: 2 }, recorder.on_load(), recorder.on_evict())
            .unwrap();

        let e = store.get("p1").unwrap_err();
        assert_eq!(e.kind(), ErrorKind::External);
        assert_eq!(e.context_value("callback"), Some("load"));
        assert_eq!(e.context_value("partition"), Some("p1"));

        // The partition stays in the store but the policy does not track it.
        assert!(store.contains("p1"));
        assert!(store.policy_keys().is_empty());
        assert_eq!(recorder.loads(), vec!["p1".to_string()]);
        assert!(recorder.evicts().is_empty());
    }

    #[test_log::test]
    fn test_remove_racing_policy_swap() {
        // Replacing "x" parks the put inside the policy lock, so the remove below queues up behind it.
        let config: StoreConfig<u64> = StoreConfig {
            event_listener: Some(Arc::new(FnEventListener::new(|event: Event, _: &String, _: &u64| {
                if event == Event::Replace {
                    thread::sleep(Duration::from_millis(200));
                }
            }))),
            ..Default::default()
        };
        let store = PartitionKeyStore::<u64>::new(config);
        store.put("p1", 1).unwrap();
        store.put("x", 1).unwrap();

        let replacer = {
            let store = store.clone();
            thread::spawn(move || store.put("x", 2).unwrap())
        };
        let remover = {
            let store = store.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                store.remove("p1")
            })
        };

        thread::sleep(Duration::from_millis(100));
        let recorder = CallbackRecorder::default();
        store
            .configure_policy(PolicyKind::Lru { max_size: 1 }, recorder.on_load(), recorder.on_evict())
            .unwrap();
        // Re-registers "p1" with the new policy if the remove has not run yet.
        store.get("p1").unwrap();

        assert_eq!(replacer.join().unwrap(), Some(1));
        let removed = remover.join().unwrap();
        assert_eq!(removed, Some(1));

        // The new policy never tracks a partition the store no longer holds.
        let keys: HashSet<_> = store.keys().into_iter().collect();
        assert!(store.policy_keys().iter().all(|key| keys.contains(key)));
        assert!(!store.contains("p1"));

        // Going over capacity must not release the removed partition.
        store.put("p2", 3).unwrap();
        assert!(!recorder.evicts().contains(&"p1".to_string()));
        assert_eq!(store.get("p2").unwrap(), Some(3));
    }

    #[test_log::test]
    fn test_failing_evict_callback() {
        let (store, recorder) = lru_store(1, StoreConfig::default());
        recorder.fail_evict_of("p1");

        store.put("p1", 1).unwrap();
        let e = store.put("p2", 2).unwrap_err();

        assert_eq!(e.kind(), ErrorKind::External);
        assert_eq!(e.context_value("callback"), Some("evict"));
        assert_eq!(e.context_value("partition"), Some("p1"));

        // The victim is gone regardless, and the triggering put stays applied.
        assert!(!store.contains("p1"));
        assert_eq!(store.get("p2").unwrap(), Some(2));
        assert_eq!(store.policy_keys(), vec!["p2".to_string()]);
    }

    #[test_log::test]
    fn test_clear() {
        let listener = Arc::new(RecordingListener::<u64>::default());
        let config: StoreConfig<u64> = StoreConfig {
            unified_view: true,
            event_listener: Some(listener.clone()),
            ..Default::default()
        };
        let (store, recorder) = lru_store(8, config);

        for i in 0..4 {
            store.put(format!("p{i}"), i).unwrap();
            store.set_serde_format(format!("p{i}"), "parquet").unwrap();
        }

        let mut cleared = store.clear();
        cleared.sort();
        assert_eq!(cleared, (0..4).map(|i| (format!("p{i}"), i)).collect_vec());

        assert!(store.is_empty());
        assert!(store.serde_formats().is_empty());
        assert!(store.policy_keys().is_empty());
        assert!(recorder.evicts().is_empty());
        assert_eq!(listener.events().len(), 4);
        assert!(listener.events().iter().all(|(event, _, _)| *event == Event::Clear));
    }

    #[test_log::test]
    fn test_concurrent_snapshot() {
        const WRITERS: u64 = 4;
        const KEYS: u64 = 256;

        let store = PartitionKeyStore::<u64>::new(StoreConfig::default());

        thread::scope(|s| {
            for w in 0..WRITERS {
                let store = store.clone();
                s.spawn(move || {
                    for k in 0..KEYS {
                        let v = w * KEYS + k;
                        store.put(format!("w={w}/k={k}"), v).unwrap();
                        store.update(&format!("w={w}/k={k}"), v).unwrap();
                    }
                });
            }
            for _ in 0..2 {
                let store = store.clone();
                s.spawn(move || {
                    for _ in 0..64 {
                        let snapshot = store.snapshot();
                        for (key, v) in snapshot {
                            let (w, k) = (v / KEYS, v % KEYS);
                            assert_eq!(key, format!("w={w}/k={k}"));
                        }
                    }
                });
            }
        });

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len() as u64, WRITERS * KEYS);
        assert_eq!(store.len() as u64, WRITERS * KEYS);
    }

    #[test_log::test]
    fn test_lru_bounded_fuzzy() {
        const MAX_SIZE: usize = 8;

        let mut rng = StdRng::seed_from_u64(42);
        let (store, recorder) = lru_store(MAX_SIZE, StoreConfig::default());

        for i in 0..10_000u64 {
            let key = format!("p={}", rng.random_range(0..32));
            match rng.random_range(0..4) {
                0 | 1 => {
                    store.put(key, i).unwrap();
                }
                2 => {
                    store.get(&key).unwrap();
                }
                _ => {
                    store.remove(&key);
                }
            }

            assert!(store.len() <= MAX_SIZE);
            let keys: HashSet<_> = store.keys().into_iter().collect();
            let tracked: HashSet<_> = store.policy_keys().into_iter().collect();
            assert_eq!(keys, tracked);
        }

        assert_eq!(recorder.evicts().len() as u64, store.metrics().evictions);
        assert!(recorder.loads().is_empty());
    }
}
