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

//! In-memory partition store for partcache.
//!
//! [`PartitionKeyStore`] maps partition keys to identity-stable [`CacheEntry`] handles and keeps a
//! [`CachePolicy`] informed of every access. The policy decides which partitions stay resident and runs the
//! load and evict callbacks synchronously on the calling thread.

mod entry;
mod metrics;
mod policy;
mod store;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

pub mod prelude;
pub use prelude::*;
