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

use std::{fmt::Debug, sync::Arc};

use parking_lot::RwLock;

/// Handle of an in-memory partition payload, e.g. a reference to a computed dataset.
///
/// Payloads are cloned out of the store on every read, so they are expected to be cheap handles rather than the
/// data itself.
pub trait Payload: Clone + Send + Sync + 'static {}
impl<T> Payload for T where T: Clone + Send + Sync + 'static {}

/// [`CacheEntry`] wraps the payload of one cached partition.
///
/// Clones share the same slot. The store and the cache policy both hold a clone of the same entry, so replacing the
/// payload through one handle is visible through the other without touching the policy's recency order.
pub struct CacheEntry<P> {
    slot: Arc<RwLock<P>>,
}

impl<P> Clone for CacheEntry<P> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
        }
    }
}

impl<P> Debug for CacheEntry<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEntry")
            .field("slot", &Arc::as_ptr(&self.slot))
            .finish()
    }
}

impl<P> CacheEntry<P>
where
    P: Payload,
{
    /// Wrap a payload in a fresh entry.
    pub fn new(payload: P) -> Self {
        Self {
            slot: Arc::new(RwLock::new(payload)),
        }
    }

    /// Clone the current payload out of the entry.
    pub fn payload(&self) -> P {
        self.slot.read().clone()
    }

    /// Swap the payload in place and return the previous one.
    pub fn replace(&self, payload: P) -> P {
        std::mem::replace(&mut *self.slot.write(), payload)
    }

    /// Whether both handles refer to the same entry.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }

    /// Count of live handles to this entry.
    pub fn refs(&self) -> usize {
        Arc::strong_count(&self.slot)
    }
}
