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

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use partcache_common::{
    error::{Error, ErrorKind, Result},
    event::EventListener,
};
use partcache_memory::{
    MetricsSnapshot, PartitionKeyStore, Payload, PolicyKind, PolicyStats, StoreConfig, UpdateRecency,
};

use crate::{
    config::TableConfig,
    tier::{PersistenceTier, StorageLevel},
};

/// Builder of a [`PartitionedTable`].
pub struct PartitionedTableBuilder<P>
where
    P: Payload,
{
    config: TableConfig,
    event_listener: Option<Arc<dyn EventListener<Key = String, Value = P>>>,
}

impl<P> PartitionedTableBuilder<P>
where
    P: Payload,
{
    /// Create a builder with the default [`TableConfig`] and the given table name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            config: TableConfig {
                name: name.into(),
                ..Default::default()
            },
            event_listener: None,
        }
    }

    /// Replace the whole config, including the table name.
    pub fn with_config(mut self, config: TableConfig) -> Self {
        self.config = config;
        self
    }

    /// Mark the table as a unified view, which allows serde format bookkeeping.
    ///
    /// Default: `false`.
    pub fn with_unified_view(mut self, unified_view: bool) -> Self {
        self.config.unified_view = unified_view;
        self
    }

    /// Set the storage level reloaded partitions are persisted at.
    ///
    /// Default: [`StorageLevel::MemoryAndDisk`].
    pub fn with_storage_level(mut self, storage_level: StorageLevel) -> Self {
        self.config.storage_level = storage_level;
        self
    }

    /// Set the cache policy strategy and the fallback max size of bounded strategies.
    ///
    /// Default: `keep_all`.
    pub fn with_cache_policy(mut self, strategy: impl Into<String>, max_size: usize) -> Self {
        self.config.cache_policy = strategy.into();
        self.config.max_size = max_size;
        self
    }

    /// Set the recency behavior of in-place updates.
    ///
    /// Default: [`UpdateRecency::Preserve`].
    pub fn with_update_recency(mut self, update_recency: UpdateRecency) -> Self {
        self.config.update_recency = update_recency;
        self
    }

    /// Set the partition map sharding count. Partitions are distributed to shards by key hash, operations on
    /// different shards do not contend.
    ///
    /// Default: `8`.
    pub fn with_shards(mut self, shards: usize) -> Self {
        self.config.shards = shards;
        self
    }

    /// Set the listener told about every partition that leaves the table.
    ///
    /// Default: No event listener installed.
    pub fn with_event_listener(mut self, event_listener: Arc<dyn EventListener<Key = String, Value = P>>) -> Self {
        self.event_listener = Some(event_listener);
        self
    }

    /// Build the table on top of `tier`.
    ///
    /// Fails with [`ErrorKind::Config`] on an invalid cache policy or a zero shard count.
    pub fn build<T>(self, tier: T) -> Result<PartitionedTable<P, T>>
    where
        T: PersistenceTier<P>,
    {
        let config = self.config;

        if config.shards == 0 {
            return Err(Error::new(ErrorKind::Config, "shard count must be greater than zero")
                .with_context("table", &config.name));
        }
        let kind = config.policy_kind().map_err(|e| e.with_context("table", &config.name))?;

        let store = PartitionKeyStore::new(StoreConfig {
            shards: config.shards,
            unified_view: config.unified_view,
            update_recency: config.update_recency,
            event_listener: self.event_listener,
        });

        let table = PartitionedTable {
            name: config.name,
            storage_level: config.storage_level,
            store,
            tier: Arc::new(tier),
        };
        table.configure_policy(kind)?;

        Ok(table)
    }
}

/// A cache of table partitions.
///
/// Partitions are addressed by opaque keys, conventionally `col1=v1/col2=v2`. The active cache policy bounds the
/// resident set: every partition it evicts is dropped from the table and released from the [`PersistenceTier`]
/// before the triggering call returns. A freshly installed policy starts cold and re-registers existing partitions at
/// their first access, persisting them again at the table's preferred storage level.
///
/// The table is cheap to clone. Clones share the same partitions and policy.
pub struct PartitionedTable<P, T>
where
    P: Payload,
    T: PersistenceTier<P>,
{
    name: String,
    storage_level: StorageLevel,
    store: PartitionKeyStore<P>,
    tier: Arc<T>,
}

impl<P, T> Clone for PartitionedTable<P, T>
where
    P: Payload,
    T: PersistenceTier<P>,
{
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            storage_level: self.storage_level,
            store: self.store.clone(),
            tier: self.tier.clone(),
        }
    }
}

impl<P, T> PartitionedTable<P, T>
where
    P: Payload,
    T: PersistenceTier<P>,
{
    /// Build a table from table properties, see [`TableConfig::from_properties`].
    pub fn from_properties(name: impl Into<String>, properties: &HashMap<String, String>, tier: T) -> Result<Self> {
        let config = TableConfig::from_properties(name, properties)?;
        PartitionedTableBuilder::new(config.name.clone()).with_config(config).build(tier)
    }

    /// Replace the active cache policy with the one selected by `strategy`.
    ///
    /// See [`PolicyKind::parse`] for the accepted strategies; `max_size` is the capacity of a bounded strategy that
    /// does not carry one. On error the previous policy stays active.
    pub fn configure_cache_policy(&self, strategy: &str, max_size: usize) -> Result<()> {
        let kind = PolicyKind::parse(strategy, max_size).map_err(|e| e.with_context("table", &self.name))?;
        self.configure_policy(kind)
    }

    /// Replace the active cache policy.
    ///
    /// Existing partitions are kept. The new policy learns about them as they are accessed.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "partcache::table::configure_policy"))]
    pub fn configure_policy(&self, kind: PolicyKind) -> Result<()> {
        let load = {
            let tier = self.tier.clone();
            let level = self.storage_level;
            move |key: &str, payload: &P| -> Result<()> {
                tracing::trace!(partition = key, %level, "[table]: persist re-registered partition");
                tier.persist(payload, level)
            }
        };
        let evict = {
            let tier = self.tier.clone();
            move |key: &str, payload: &P| -> Result<()> {
                tracing::trace!(partition = key, "[table]: unpersist evicted partition");
                tier.unpersist(payload)
            }
        };

        self.store
            .configure_policy(kind, load, evict)
            .map_err(|e| e.with_context("table", &self.name))?;

        tracing::debug!(table = %self.name, policy = %kind, "[table]: cache policy replaced");
        Ok(())
    }

    /// Get a partition and record the access with the cache policy.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "partcache::table::get"))]
    pub fn get(&self, key: &str) -> Result<Option<P>> {
        self.store.get(key)
    }

    /// Put a partition, replacing any previous one, and return the previous payload.
    ///
    /// If the put crosses the policy's capacity, one other partition is evicted and unpersisted first. A failing
    /// release surfaces as an [`ErrorKind::External`] error; the new partition stays in the table either way.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "partcache::table::put"))]
    pub fn put(&self, key: impl Into<String>, payload: P) -> Result<Option<P>> {
        self.store.put(key, payload)
    }

    /// Replace the payload of an existing partition in place and return the previous payload.
    ///
    /// Under [`UpdateRecency::Preserve`] the access is not recorded, so the caller should `get` the partition first.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "partcache::table::update"))]
    pub fn update(&self, key: &str, payload: P) -> Result<Option<P>> {
        self.store.update(key, payload)
    }

    /// Remove a partition without releasing it from the tier.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "partcache::table::remove"))]
    pub fn remove(&self, key: &str) -> Option<P> {
        self.store.remove(key)
    }

    /// Whether the table holds the partition.
    pub fn contains(&self, key: &str) -> bool {
        self.store.contains(key)
    }

    /// Record the serialization format of a partition. Only valid on unified views.
    pub fn set_serde_format(&self, key: impl Into<String>, format: impl Into<String>) -> Result<()> {
        self.store
            .set_serde_format(key, format)
            .map_err(|e| e.with_context("table", &self.name))
    }

    /// Get the serialization format of a partition.
    pub fn serde_format(&self, key: &str) -> Option<String> {
        self.store.serde_format(key)
    }

    /// Drop every partition and release each payload from the tier exactly once.
    ///
    /// Every payload is released even if some releases fail; the first failure is returned.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "partcache::table::drop_table"))]
    pub fn drop_table(&self) -> Result<()> {
        let dropped = self.store.clear();
        let count = dropped.len();

        let mut first = None;
        for (key, payload) in dropped {
            if let Err(e) = self.tier.unpersist(&payload) {
                tracing::warn!(table = %self.name, partition = %key, "[table]: failed to unpersist partition: {e}");
                first.get_or_insert_with(|| {
                    Error::new(ErrorKind::External, "failed to unpersist partition")
                        .with_context("table", &self.name)
                        .with_context("partition", &key)
                        .with_source(e)
                });
            }
        }

        tracing::debug!(table = %self.name, partitions = count, "[table]: dropped");

        match first {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Point-in-time copy of every partition.
    pub fn partitions(&self) -> BTreeMap<String, P> {
        self.store.snapshot()
    }

    /// Point-in-time copy of every serde format.
    pub fn serde_formats(&self) -> BTreeMap<String, String> {
        self.store.serde_formats()
    }

    /// Sorted keys of every partition in the table.
    pub fn partition_keys(&self) -> Vec<String> {
        self.store.keys()
    }

    /// Keys tracked by the active cache policy, least recently used first.
    pub fn cached_keys(&self) -> Vec<String> {
        self.store.policy_keys()
    }

    /// Count of partitions.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Whether the table holds no partition.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Strategy of the active cache policy.
    pub fn policy_kind(&self) -> PolicyKind {
        self.store.policy_kind()
    }

    /// Counters of the active cache policy.
    pub fn policy_stats(&self) -> PolicyStats {
        self.store.policy_stats()
    }

    /// Table-level counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.store.metrics()
    }

    /// Table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the table is a unified view.
    pub fn is_unified_view(&self) -> bool {
        self.store.is_unified_view()
    }

    /// Storage level reloaded partitions are persisted at.
    pub fn preferred_storage_level(&self) -> StorageLevel {
        self.storage_level
    }

    /// Recency behavior of in-place updates.
    pub fn update_recency(&self) -> UpdateRecency {
        self.store.update_recency()
    }

    /// The persistence tier.
    pub fn tier(&self) -> &T {
        &self.tier
    }
}
