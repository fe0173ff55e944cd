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

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Store-level counters, updated with relaxed ordering on every operation.
#[derive(Debug, Default)]
pub struct Metrics {
    /// gets that found an entry
    hit: AtomicU64,
    /// gets that found nothing
    miss: AtomicU64,
    /// puts for a new key
    insert: AtomicU64,
    /// puts that replaced an existing entry
    replace: AtomicU64,
    /// in-place payload updates
    update: AtomicU64,
    /// caller-initiated removes that found an entry
    remove: AtomicU64,
    /// entries evicted by the cache policy
    evict: AtomicU64,
}

/// A point-in-time copy of [`Metrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// gets that found an entry
    pub hits: u64,
    /// gets that found nothing
    pub misses: u64,
    /// puts for a new key
    pub inserts: u64,
    /// puts that replaced an existing entry
    pub replaces: u64,
    /// in-place payload updates
    pub updates: u64,
    /// caller-initiated removes that found an entry
    pub removes: u64,
    /// entries evicted by the cache policy
    pub evictions: u64,
}

impl MetricsSnapshot {
    /// `hits / (hits + misses)`, or `0.0` before any get.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl Metrics {
    pub(crate) fn record_hit(&self) {
        self.hit.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.miss.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_insert(&self) {
        self.insert.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_replace(&self) {
        self.replace.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_update(&self) {
        self.update.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_remove(&self) {
        self.remove.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_evict(&self) {
        self.evict.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time copy of the counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            hits: self.hit.load(Ordering::Relaxed),
            misses: self.miss.load(Ordering::Relaxed),
            inserts: self.insert.load(Ordering::Relaxed),
            replaces: self.replace.load(Ordering::Relaxed),
            updates: self.update.load(Ordering::Relaxed),
            removes: self.remove.load(Ordering::Relaxed),
            evictions: self.evict.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        let metrics = Metrics::default();
        assert_eq!(metrics.snapshot().hit_rate(), 0.0);

        metrics.record_hit();
        metrics.record_hit();
        metrics.record_hit();
        metrics.record_miss();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.hits, 3);
        assert_eq!(snapshot.misses, 1);
        assert_eq!(snapshot.hit_rate(), 0.75);
    }
}
