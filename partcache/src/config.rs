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

use std::collections::HashMap;

use partcache_common::error::{Error, ErrorKind, Result};
use partcache_memory::{PolicyKind, UpdateRecency};
use serde::{Deserialize, Serialize};

use crate::tier::StorageLevel;

/// Table property that selects the cache policy strategy.
pub const CACHE_POLICY_PROPERTY: &str = "partcache.partition.cachePolicy";
/// Table property that sets the fallback max size of a bounded cache policy.
pub const CACHE_POLICY_MAX_SIZE_PROPERTY: &str = "partcache.partition.cachePolicy.maxSize";
/// Table property that sets the preferred storage level of reloaded partitions.
pub const STORAGE_LEVEL_PROPERTY: &str = "partcache.partition.storageLevel";
/// Table property that marks the table as a unified view.
pub const UNIFIED_VIEW_PROPERTY: &str = "partcache.unifiedView";

/// Config of a [`PartitionedTable`](crate::PartitionedTable).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    /// Table name, used in logs and errors.
    ///
    /// Default: `partcache`.
    pub name: String,
    /// Whether the table is a unified view. Only unified views keep serde formats.
    ///
    /// Default: `false`.
    pub unified_view: bool,
    /// Storage level reloaded partitions are persisted at.
    ///
    /// Default: [`StorageLevel::MemoryAndDisk`].
    pub storage_level: StorageLevel,
    /// Cache policy strategy, see [`PolicyKind::parse`] for the accepted forms.
    ///
    /// Default: `keep_all`.
    pub cache_policy: String,
    /// Max size of a bounded policy whose strategy does not carry one.
    ///
    /// Default: `1024`.
    pub max_size: usize,
    /// Recency behavior of in-place updates.
    ///
    /// Default: [`UpdateRecency::Preserve`].
    pub update_recency: UpdateRecency,
    /// Count of partition map shards.
    ///
    /// Default: `8`.
    pub shards: usize,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            name: "partcache".to_string(),
            unified_view: false,
            storage_level: StorageLevel::default(),
            cache_policy: "keep_all".to_string(),
            max_size: 1024,
            update_recency: UpdateRecency::default(),
            shards: 8,
        }
    }
}

impl TableConfig {
    /// Build a config from table properties.
    ///
    /// Unknown properties are ignored, missing ones keep their defaults. A malformed value is an
    /// [`ErrorKind::Config`] error naming the property.
    pub fn from_properties(name: impl Into<String>, properties: &HashMap<String, String>) -> Result<Self> {
        let mut config = Self {
            name: name.into(),
            ..Default::default()
        };

        if let Some(policy) = properties.get(CACHE_POLICY_PROPERTY) {
            config.cache_policy = policy.clone();
        }
        if let Some(max_size) = properties.get(CACHE_POLICY_MAX_SIZE_PROPERTY) {
            config.max_size = max_size
                .trim()
                .parse()
                .map_err(|e| invalid_property(CACHE_POLICY_MAX_SIZE_PROPERTY, max_size).with_source(e))?;
        }
        if let Some(level) = properties.get(STORAGE_LEVEL_PROPERTY) {
            config.storage_level = level
                .parse()
                .map_err(|e| invalid_property(STORAGE_LEVEL_PROPERTY, level).with_source(e))?;
        }
        if let Some(unified_view) = properties.get(UNIFIED_VIEW_PROPERTY) {
            config.unified_view = match unified_view.trim().to_ascii_lowercase().as_str() {
                "true" => true,
                "false" => false,
                _ => return Err(invalid_property(UNIFIED_VIEW_PROPERTY, unified_view)),
            };
        }

        // Fail early on a bad strategy instead of at table build.
        config.policy_kind()?;

        Ok(config)
    }

    /// The cache policy selected by this config.
    pub fn policy_kind(&self) -> Result<PolicyKind> {
        PolicyKind::parse(&self.cache_policy, self.max_size)
    }
}

fn invalid_property(property: &'static str, value: &str) -> Error {
    Error::new(ErrorKind::Config, "invalid table property")
        .with_context("property", property)
        .with_context("value", value)
}
