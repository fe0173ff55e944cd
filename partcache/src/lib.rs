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

//! partcache - Partition cache for partitioned tables.
//!
//! A [`PartitionedTable`] maps partition keys to cached payloads and keeps the resident set bounded with a
//! configurable cache policy. Partitions evicted by the policy are released from the table's
//! [`PersistenceTier`], and partitions re-registered by a freshly installed policy are persisted again at the table's
//! preferred [`StorageLevel`].

mod config;
mod table;
mod tier;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

/// Re-exported common components.
pub mod common {
    pub use partcache_common::*;
}

/// Re-exported in-memory components.
pub mod memory {
    pub use partcache_memory::*;
}

pub mod prelude;
pub use prelude::*;
