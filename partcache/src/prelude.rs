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

pub use crate::{
    common::{
        error::{Error, ErrorKind, Result},
        event::{Event, EventListener, FnEventListener},
    },
    config::{
        TableConfig, CACHE_POLICY_MAX_SIZE_PROPERTY, CACHE_POLICY_PROPERTY, STORAGE_LEVEL_PROPERTY,
        UNIFIED_VIEW_PROPERTY,
    },
    memory::{CacheEntry, MetricsSnapshot, Payload, PolicyKind, PolicyStats, UpdateRecency},
    table::{PartitionedTable, PartitionedTableBuilder},
    tier::{NoopTier, PersistenceTier, StorageLevel},
};
