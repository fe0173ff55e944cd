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

use std::marker::PhantomData;

use partcache_common::error::Result;

use super::PolicyStats;

/// The unbounded policy used when no cache policy is configured.
///
/// Every notification is a no-op and nothing is ever evicted or loaded, so it takes no callbacks.
pub struct KeepAll<K, E> {
    _marker: PhantomData<(K, E)>,
}

impl<K, E> Default for KeepAll<K, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, E> KeepAll<K, E> {
    /// Create the policy.
    pub fn new() -> Self {
        Self { _marker: PhantomData }
    }

    /// No-op.
    pub fn notify_get<Q: ?Sized>(&mut self, _: &Q) -> Result<()> {
        Ok(())
    }

    /// No-op.
    pub fn notify_put(&mut self, _: K, _: E) -> Result<()> {
        Ok(())
    }

    /// No-op.
    pub fn notify_remove<Q: ?Sized>(&mut self, _: &Q) {}

    /// No-op.
    pub fn clear(&mut self) {}

    /// Always false, nothing is tracked.
    pub fn contains<Q: ?Sized>(&self, _: &Q) -> bool {
        false
    }

    /// Always empty.
    pub fn keys(&self) -> Vec<K> {
        vec![]
    }

    /// Always zero.
    pub fn len(&self) -> usize {
        0
    }

    /// Always true.
    pub fn is_empty(&self) -> bool {
        true
    }

    /// Always zero counters.
    pub fn stats(&self) -> PolicyStats {
        PolicyStats::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn test_keep_all_tracks_nothing() {
        let mut policy = KeepAll::<String, u64>::new();
        policy.notify_put("p1".to_string(), 1).unwrap();
        policy.notify_get("p1").unwrap();

        assert!(!policy.contains("p1"));
        assert!(policy.is_empty());
        assert_eq!(policy.stats(), PolicyStats::default());
    }
}
