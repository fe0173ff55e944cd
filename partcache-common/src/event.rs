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

/// Why an entry left a partition store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    /// Chosen as the victim by the active cache policy.
    Evict,
    /// Replaced by a fresh entry for the same key.
    Replace,
    /// Removed by the caller.
    Remove,
    /// Dropped by a store-wide clear.
    Clear,
}

/// Trait for the customized event listener.
///
/// The listener runs on the thread that caused the entry to leave. For [`Event::Evict`] that is the thread inside
/// the triggering insertion, with the policy lock held, so the listener must not call back into the store.
pub trait EventListener: Send + Sync + 'static {
    /// Associated key type.
    type Key;
    /// Associated value type.
    type Value;

    /// Called when an entry leaves the store with the reason.
    #[expect(unused_variables)]
    fn on_leave(&self, reason: Event, key: &Self::Key, value: &Self::Value) {}
}

/// An [`EventListener`] backed by a closure.
pub struct FnEventListener<K, V, F> {
    f: F,
    _marker: PhantomData<fn(&K, &V)>,
}

impl<K, V, F> FnEventListener<K, V, F>
where
    F: Fn(Event, &K, &V) + Send + Sync + 'static,
{
    /// Wrap the closure.
    pub fn new(f: F) -> Self {
        Self { f, _marker: PhantomData }
    }
}

impl<K, V, F> EventListener for FnEventListener<K, V, F>
where
    K: 'static,
    V: 'static,
    F: Fn(Event, &K, &V) + Send + Sync + 'static,
{
    type Key = K;
    type Value = V;

    fn on_leave(&self, reason: Event, key: &K, value: &V) {
        (self.f)(reason, key, value)
    }
}
