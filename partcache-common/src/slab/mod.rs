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

use std::num::NonZeroUsize;

/// Stable handle of a value stored in a [`Slab`].
///
/// A token stays valid until its value is removed. Slots are reused afterwards, so a stale token may address a newer
/// value; holders must drop their tokens on removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token(NonZeroUsize);

impl Token {
    const MASK: usize = 1 << (usize::BITS - 1);

    fn new(index: usize) -> Self {
        debug_assert!(index & Self::MASK == 0, "slab index overflow: {index}");
        match NonZeroUsize::new(index | Self::MASK) {
            Some(v) => Self(v),
            None => unreachable!(),
        }
    }

    /// Index of the slot the token addresses.
    pub fn index(&self) -> usize {
        self.0.get() & !Self::MASK
    }
}

/// A vector-backed arena. Free slots form a linked list through their indices, headed by `free`.
#[derive(Debug, Clone)]
pub struct Slab<T> {
    slots: Vec<Slot<T>>,
    len: usize,
    free: usize,
}

#[derive(Debug, Clone)]
enum Slot<T> {
    Free(usize),
    Used(T),
}

impl<T> Default for Slab<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Slab<T> {
    /// Create an empty slab.
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: 0,
            len: 0,
        }
    }

    /// Create an empty slab with room for `capacity` values.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: 0,
            len: 0,
        }
    }

    /// Store a value and return its token.
    pub fn insert(&mut self, value: T) -> Token {
        let index = self.free;
        self.len += 1;

        if index == self.slots.len() {
            self.slots.push(Slot::Used(value));
            self.free = index + 1;
        } else {
            self.free = match self.slots[index] {
                Slot::Free(free) => free,
                Slot::Used(_) => unreachable!("free list points at an occupied slot"),
            };
            self.slots[index] = Slot::Used(value);
        }

        Token::new(index)
    }

    /// Remove the value addressed by the token.
    pub fn remove(&mut self, token: Token) -> Option<T> {
        let index = token.index();
        let slot = self.slots.get_mut(index)?;

        if matches!(slot, Slot::Free(_)) {
            return None;
        }

        match std::mem::replace(slot, Slot::Free(self.free)) {
            Slot::Used(value) => {
                self.len -= 1;
                self.free = index;
                Some(value)
            }
            Slot::Free(_) => unreachable!(),
        }
    }

    /// Get the value addressed by the token.
    pub fn get(&self, token: Token) -> Option<&T> {
        match self.slots.get(token.index()) {
            Some(Slot::Used(value)) => Some(value),
            _ => None,
        }
    }

    /// Get the mutable value addressed by the token.
    pub fn get_mut(&mut self, token: Token) -> Option<&mut T> {
        match self.slots.get_mut(token.index()) {
            Some(Slot::Used(value)) => Some(value),
            _ => None,
        }
    }

    /// Drop every value and release the backing storage.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.len = 0;
        self.free = 0;
    }

    /// Count of stored values.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no value is stored.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests;
