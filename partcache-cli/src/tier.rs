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

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use partcache::{PersistenceTier, Result, StorageLevel};
use serde::Serialize;

/// Calls seen by a [`CountingTier`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TierStats {
    pub persisted: u64,
    pub unpersisted: u64,
}

#[derive(Debug, Default)]
struct Counters {
    persisted: AtomicU64,
    unpersisted: AtomicU64,
}

/// A persistence tier that only counts calls.
#[derive(Debug, Clone, Default)]
pub struct CountingTier {
    counters: Arc<Counters>,
}

impl CountingTier {
    pub fn stats(&self) -> TierStats {
        TierStats {
            persisted: self.counters.persisted.load(Ordering::Relaxed),
            unpersisted: self.counters.unpersisted.load(Ordering::Relaxed),
        }
    }
}

impl<P> PersistenceTier<P> for CountingTier {
    fn persist(&self, _: &P, level: StorageLevel) -> Result<()> {
        if level != StorageLevel::None {
            self.counters.persisted.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    fn unpersist(&self, _: &P) -> Result<()> {
        self.counters.unpersisted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
