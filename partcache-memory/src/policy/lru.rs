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

use std::{borrow::Borrow, hash::Hash};

use hashbrown::HashMap;
use partcache_common::{
    error::Result,
    slab::{Slab, Token},
    strict_assert, strict_assert_eq,
};

use super::{PolicyCallbacks, PolicyStats};

struct Node<K, E> {
    key: K,
    entry: E,
    prev: Option<Token>,
    next: Option<Token>,
}

/// Lru cache policy.
///
/// Tracked entries live in a slab and are threaded into a doubly-linked list, least recently used at the head. A
/// key-to-token map gives O(1) access to the node of a key.
///
/// The entries are the caller's shared handles, so the policy never copies a payload.
pub struct Lru<K, E> {
    nodes: Slab<Node<K, E>>,
    tokens: HashMap<K, Token>,

    head: Option<Token>,
    tail: Option<Token>,

    max_size: usize,
    callbacks: PolicyCallbacks<K, E>,
    stats: PolicyStats,
}

impl<K, E> Lru<K, E>
where
    K: Hash + Eq + Clone,
    E: Clone,
{
    /// Create an lru policy tracking at most `max_size` entries.
    ///
    /// # Panics
    ///
    /// Panics if `max_size` is zero.
    pub fn new(max_size: usize, callbacks: PolicyCallbacks<K, E>) -> Self {
        assert!(max_size > 0, "lru max size must be positive");
        Self {
            nodes: Slab::with_capacity(max_size.min(1024) + 1),
            tokens: HashMap::with_capacity(max_size.min(1024) + 1),
            head: None,
            tail: None,
            max_size,
            callbacks,
            stats: PolicyStats::default(),
        }
    }

    /// Mark `key` as most recently used.
    ///
    /// An untracked key is handed to the load callback. If it returns an entry, the entry is tracked as if it had
    /// just been put, which may evict another key.
    pub fn notify_get<Q>(&mut self, key: &Q) -> Result<()>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        if let Some(&token) = self.tokens.get(key) {
            self.stats.hits += 1;
            self.move_to_tail(token);
            return Ok(());
        }

        self.stats.misses += 1;
        let key = key.to_owned();
        match (self.callbacks.load)(&key)? {
            Some(entry) => {
                self.stats.loads += 1;
                tracing::trace!("[lru]: re-registered an untracked key through the load callback");
                self.insert(key, entry)
            }
            None => Ok(()),
        }
    }

    /// Track `key` with `entry` as most recently used.
    ///
    /// A tracked key has its entry swapped and is moved to the tail without eviction. A new key that pushes the count
    /// over the max size evicts exactly one entry: the least recently used, which is never the key just put.
    pub fn notify_put(&mut self, key: K, entry: E) -> Result<()> {
        if let Some(&token) = self.tokens.get(&key) {
            if let Some(node) = self.nodes.get_mut(token) {
                node.entry = entry;
            }
            self.move_to_tail(token);
            return Ok(());
        }
        self.insert(key, entry)
    }

    /// Forget `key` if tracked. No callback runs.
    pub fn notify_remove<Q>(&mut self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if let Some(token) = self.tokens.remove(key) {
            self.unlink(token);
            self.nodes.remove(token);
        }
        strict_assert_eq!(self.tokens.len(), self.nodes.len());
    }

    /// Forget every key. No callback runs.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.tokens.clear();
        self.head = None;
        self.tail = None;
    }

    /// Whether `key` is tracked.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.tokens.contains_key(key)
    }

    /// Tracked keys, least recently used first.
    pub fn keys(&self) -> Vec<K> {
        let mut keys = Vec::with_capacity(self.nodes.len());
        let mut cursor = self.head;
        while let Some(token) = cursor {
            let Some(node) = self.nodes.get(token) else { break };
            keys.push(node.key.clone());
            cursor = node.next;
        }
        keys
    }

    /// Count of tracked keys.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether no key is tracked.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Maximum count of tracked keys.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Counters of this policy.
    pub fn stats(&self) -> PolicyStats {
        self.stats
    }

    fn insert(&mut self, key: K, entry: E) -> Result<()> {
        let token = self.nodes.insert(Node {
            key: key.clone(),
            entry,
            prev: None,
            next: None,
        });
        self.tokens.insert(key, token);
        self.push_tail(token);

        let res = if self.nodes.len() > self.max_size {
            self.evict()
        } else {
            Ok(())
        };

        strict_assert!(self.nodes.len() <= self.max_size);
        strict_assert_eq!(self.tokens.len(), self.nodes.len());

        res
    }

    /// Pop the head and hand it to the evict callback.
    ///
    /// The victim leaves the bookkeeping before the callback runs, so a failing callback cannot leave it tracked.
    fn evict(&mut self) -> Result<()> {
        let Some(token) = self.head else { return Ok(()) };
        strict_assert!(Some(token) != self.tail, "lru must not evict the entry just put");

        self.unlink(token);
        let Some(node) = self.nodes.remove(token) else { return Ok(()) };
        self.tokens.remove(&node.key);
        self.stats.evictions += 1;

        tracing::trace!(tracked = self.nodes.len(), "[lru]: evict least recently used entry");

        (self.callbacks.evict)(node.key, node.entry)
    }

    fn move_to_tail(&mut self, token: Token) {
        if self.tail == Some(token) {
            return;
        }
        self.unlink(token);
        self.push_tail(token);
    }

    fn push_tail(&mut self, token: Token) {
        let prev = self.tail;
        if let Some(node) = self.nodes.get_mut(token) {
            node.prev = prev;
            node.next = None;
        }
        match prev {
            Some(prev) => {
                if let Some(node) = self.nodes.get_mut(prev) {
                    node.next = Some(token);
                }
            }
            None => self.head = Some(token),
        }
        self.tail = Some(token);
    }

    fn unlink(&mut self, token: Token) {
        let Some(node) = self.nodes.get_mut(token) else { return };
        let (prev, next) = (node.prev.take(), node.next.take());

        match prev {
            Some(prev) => {
                if let Some(node) = self.nodes.get_mut(prev) {
                    node.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(next) => {
                if let Some(node) = self.nodes.get_mut(next) {
                    node.prev = prev;
                }
            }
            None => self.tail = prev,
        }
    }
}
