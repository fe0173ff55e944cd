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

//! Cache policies decide which partitions stay resident.
//!
//! A policy only sees opaque keys and entries. It learns about accesses through `notify_get`, `notify_put` and
//! `notify_remove`, and reacts through the two callbacks it was built with:
//!
//! - the load callback re-registers an entry the policy does not track yet (a policy installed on a populated store
//!   starts cold);
//! - the evict callback is handed every victim exactly once, after the victim has left the policy's bookkeeping.
//!
//! Both callbacks run synchronously on the notifying thread, so their latency adds to the triggering operation.

use std::{borrow::Borrow, fmt::Display, hash::Hash, sync::Arc};

use partcache_common::error::{Error, ErrorKind, Result};
use serde::{Deserialize, Serialize};

pub mod keep_all;
pub mod lru;

use keep_all::KeepAll;
use lru::Lru;

/// The load callback of a cache policy.
///
/// Returns the entry to track for the key, or `None` if there is nothing to track.
pub trait Loader<K, E>: Fn(&K) -> Result<Option<E>> + Send + Sync + 'static {}
impl<K, E, T> Loader<K, E> for T where T: Fn(&K) -> Result<Option<E>> + Send + Sync + 'static {}

/// The evict callback of a cache policy.
///
/// Takes ownership of the victim's key and entry.
pub trait Evictor<K, E>: Fn(K, E) -> Result<()> + Send + Sync + 'static {}
impl<K, E, T> Evictor<K, E> for T where T: Fn(K, E) -> Result<()> + Send + Sync + 'static {}

/// Load and evict callbacks shared by a policy.
pub struct PolicyCallbacks<K, E> {
    /// Called to re-register an untracked key on access.
    pub load: Arc<dyn Loader<K, E>>,
    /// Called once per evicted entry.
    pub evict: Arc<dyn Evictor<K, E>>,
}

impl<K, E> Clone for PolicyCallbacks<K, E> {
    fn clone(&self) -> Self {
        Self {
            load: self.load.clone(),
            evict: self.evict.clone(),
        }
    }
}

impl<K, E> PolicyCallbacks<K, E> {
    /// Bundle the callbacks.
    pub fn new(load: impl Loader<K, E>, evict: impl Evictor<K, E>) -> Self {
        Self {
            load: Arc::new(load),
            evict: Arc::new(evict),
        }
    }

    /// Callbacks that load nothing and release nothing.
    pub fn noop() -> Self
    where
        K: 'static,
        E: 'static,
    {
        Self::new(|_: &K| -> Result<Option<E>> { Ok(None) }, |_: K, _: E| -> Result<()> { Ok(()) })
    }
}

/// Cache policy strategy selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    /// Keep every entry resident. Nothing is ever evicted.
    #[default]
    KeepAll,
    /// Evict the least recently used entry once more than `max_size` entries are tracked.
    Lru {
        /// Maximum count of resident entries.
        max_size: usize,
    },
}

impl Display for PolicyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PolicyKind::KeepAll => write!(f, "keep_all"),
            PolicyKind::Lru { max_size } => write!(f, "lru({max_size})"),
        }
    }
}

impl PolicyKind {
    /// Parse a strategy name.
    ///
    /// Accepted forms (case-insensitive):
    ///
    /// - `keep_all`, `keepall`, `none`, `unbounded`
    /// - `lru`, which takes `fallback_max_size` as its capacity
    /// - `lru(<n>)`, which overrides the capacity with `<n>`
    ///
    /// Anything else is an [`ErrorKind::Config`] error. There is no silent fallback.
    pub fn parse(strategy: &str, fallback_max_size: usize) -> Result<Self> {
        let normalized = strategy.trim().to_ascii_lowercase();

        match normalized.as_str() {
            "keep_all" | "keepall" | "none" | "unbounded" => return Ok(Self::KeepAll),
            "lru" => {
                return Ok(Self::Lru {
                    max_size: fallback_max_size,
                })
            }
            _ => {}
        }

        if let Some(arg) = normalized.strip_prefix("lru(").and_then(|rest| rest.strip_suffix(')')) {
            let max_size = arg.trim().parse::<usize>().map_err(|e| {
                Error::new(ErrorKind::Config, "invalid cache policy max size")
                    .with_context("policy", strategy)
                    .with_source(e)
            })?;
            return Ok(Self::Lru { max_size });
        }

        Err(Error::unknown_policy(strategy))
    }

    /// Maximum count of resident entries, `None` if unbounded.
    pub fn max_size(&self) -> Option<usize> {
        match self {
            PolicyKind::KeepAll => None,
            PolicyKind::Lru { max_size } => Some(*max_size),
        }
    }
}

/// Counters kept by a cache policy.
///
/// A hit is an access to a tracked key, a miss an access to an untracked one. Loads count misses that the load
/// callback turned into tracked entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyStats {
    /// accesses to tracked keys
    pub hits: u64,
    /// accesses to untracked keys
    pub misses: u64,
    /// entries re-registered through the load callback
    pub loads: u64,
    /// entries handed to the evict callback
    pub evictions: u64,
}

impl PolicyStats {
    /// `hits / (hits + misses)`, `1.0` before any access.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            1.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// The closed set of cache policies.
pub enum CachePolicy<K, E> {
    /// See [`KeepAll`].
    KeepAll(KeepAll<K, E>),
    /// See [`Lru`].
    Lru(Lru<K, E>),
}

impl<K, E> CachePolicy<K, E>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Build the policy selected by `kind`.
    ///
    /// An LRU with a zero capacity is an [`ErrorKind::Config`] error.
    pub fn new(kind: PolicyKind, callbacks: PolicyCallbacks<K, E>) -> Result<Self> {
        match kind {
            PolicyKind::KeepAll => Ok(Self::KeepAll(KeepAll::new())),
            PolicyKind::Lru { max_size: 0 } => Err(Error::new(
                ErrorKind::Config,
                "lru cache policy requires a positive max size",
            )
            .with_context("policy", kind)),
            PolicyKind::Lru { max_size } => Ok(Self::Lru(Lru::new(max_size, callbacks))),
        }
    }

    /// Parse `strategy` with [`PolicyKind::parse`] and build the policy.
    pub fn from_strategy(strategy: &str, fallback_max_size: usize, callbacks: PolicyCallbacks<K, E>) -> Result<Self> {
        let kind = PolicyKind::parse(strategy, fallback_max_size)?;
        Self::new(kind, callbacks)
    }

    /// Record an access to `key`.
    pub fn notify_get<Q>(&mut self, key: &Q) -> Result<()>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        match self {
            CachePolicy::KeepAll(policy) => policy.notify_get(key),
            CachePolicy::Lru(policy) => policy.notify_get(key),
        }
    }

    /// Record `key` as freshly inserted with `entry`, evicting if the capacity is crossed.
    pub fn notify_put(&mut self, key: K, entry: E) -> Result<()> {
        match self {
            CachePolicy::KeepAll(policy) => policy.notify_put(key, entry),
            CachePolicy::Lru(policy) => policy.notify_put(key, entry),
        }
    }

    /// Forget `key`. Idempotent, never calls back.
    pub fn notify_remove<Q>(&mut self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match self {
            CachePolicy::KeepAll(policy) => policy.notify_remove(key),
            CachePolicy::Lru(policy) => policy.notify_remove(key),
        }
    }

    /// Forget every key without calling back.
    pub fn clear(&mut self) {
        match self {
            CachePolicy::KeepAll(policy) => policy.clear(),
            CachePolicy::Lru(policy) => policy.clear(),
        }
    }

    /// Whether `key` is tracked.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match self {
            CachePolicy::KeepAll(policy) => policy.contains(key),
            CachePolicy::Lru(policy) => policy.contains(key),
        }
    }

    /// Tracked keys, least recently used first.
    pub fn keys(&self) -> Vec<K> {
        match self {
            CachePolicy::KeepAll(policy) => policy.keys(),
            CachePolicy::Lru(policy) => policy.keys(),
        }
    }

    /// Count of tracked keys.
    pub fn len(&self) -> usize {
        match self {
            CachePolicy::KeepAll(policy) => policy.len(),
            CachePolicy::Lru(policy) => policy.len(),
        }
    }

    /// Whether no key is tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The strategy of this policy.
    pub fn kind(&self) -> PolicyKind {
        match self {
            CachePolicy::KeepAll(_) => PolicyKind::KeepAll,
            CachePolicy::Lru(policy) => PolicyKind::Lru {
                max_size: policy.max_size(),
            },
        }
    }

    /// Maximum count of resident entries, `None` if unbounded.
    pub fn max_size(&self) -> Option<usize> {
        self.kind().max_size()
    }

    /// Counters of this policy.
    pub fn stats(&self) -> PolicyStats {
        match self {
            CachePolicy::KeepAll(policy) => policy.stats(),
            CachePolicy::Lru(policy) => policy.stats(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[test]
    fn test_parse_policy_kind() {
        assert_eq!(PolicyKind::parse("keep_all", 10).unwrap(), PolicyKind::KeepAll);
        assert_eq!(PolicyKind::parse(" None ", 10).unwrap(), PolicyKind::KeepAll);
        assert_eq!(PolicyKind::parse("LRU", 10).unwrap(), PolicyKind::Lru { max_size: 10 });
        assert_eq!(PolicyKind::parse("lru( 3 )", 10).unwrap(), PolicyKind::Lru { max_size: 3 });
    }

    #[test]
    fn test_parse_policy_kind_rejects_unknown() {
        for strategy in ["mru", "", "lru(", "lru(x)", "lru(-1)", "fifo(3)"] {
            let err = PolicyKind::parse(strategy, 10).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Config, "strategy: {strategy:?}");
            assert_eq!(err.context_value("policy"), Some(strategy));
        }
    }

    #[test]
    fn test_policy_kind_display_roundtrip() {
        for kind in [PolicyKind::KeepAll, PolicyKind::Lru { max_size: 7 }] {
            assert_eq!(PolicyKind::parse(&kind.to_string(), 1).unwrap(), kind);
        }
    }

    #[test]
    fn test_zero_capacity_lru_is_config_error() {
        let res = CachePolicy::<u64, u64>::new(PolicyKind::Lru { max_size: 0 }, PolicyCallbacks::noop());
        assert_eq!(res.err().map(|e| e.kind()), Some(ErrorKind::Config));
    }

    #[test]
    fn test_dispatch() {
        let evicted = Arc::new(Mutex::new(vec![]));
        let callbacks = {
            let evicted = evicted.clone();
            PolicyCallbacks::new(
                |_: &u64| -> Result<Option<u64>> { Ok(None) },
                move |k: u64, v: u64| -> Result<()> {
                    evicted.lock().unwrap().push((k, v));
                    Ok(())
                },
            )
        };

        let mut policy = CachePolicy::from_strategy("lru", 2, callbacks.clone()).unwrap();
        assert_eq!(policy.kind(), PolicyKind::Lru { max_size: 2 });
        policy.notify_put(1, 10).unwrap();
        policy.notify_put(2, 20).unwrap();
        policy.notify_put(3, 30).unwrap();
        assert_eq!(policy.keys(), vec![2, 3]);
        assert_eq!(*evicted.lock().unwrap(), vec![(1, 10)]);

        let mut policy = CachePolicy::from_strategy("keep_all", 2, callbacks).unwrap();
        assert_eq!(policy.max_size(), None);
        for i in 0..10 {
            policy.notify_put(i, i).unwrap();
        }
        assert!(policy.is_empty());
        assert_eq!(evicted.lock().unwrap().len(), 1);
    }
}
