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

//! Helpers to observe a [`PartitionKeyStore`](crate::PartitionKeyStore) in tests.

use std::sync::Arc;

use parking_lot::Mutex;
use partcache_common::{
    error::{Error, ErrorKind, Result},
    event::{Event, EventListener},
};

/// Records the keys passed to the load and evict callbacks of a store policy.
#[derive(Debug, Clone, Default)]
pub struct CallbackRecorder {
    loads: Arc<Mutex<Vec<String>>>,
    evicts: Arc<Mutex<Vec<String>>>,
    fail_load: Arc<Mutex<Option<String>>>,
    fail_evict: Arc<Mutex<Option<String>>>,
}

impl CallbackRecorder {
    /// A load callback that records the key, failing for the key set by [`CallbackRecorder::fail_load_of`].
    pub fn on_load<P: 'static>(&self) -> impl Fn(&str, &P) -> Result<()> + Send + Sync + 'static {
        let loads = self.loads.clone();
        let fail = self.fail_load.clone();
        move |key: &str, _: &P| -> Result<()> {
            loads.lock().push(key.to_string());
            if fail.lock().as_deref() == Some(key) {
                return Err(Error::new(ErrorKind::External, "persist refused"));
            }
            Ok(())
        }
    }

    /// An evict callback that records the key, failing for the key set by [`CallbackRecorder::fail_evict_of`].
    pub fn on_evict<P: 'static>(&self) -> impl Fn(&str, &P) -> Result<()> + Send + Sync + 'static {
        let evicts = self.evicts.clone();
        let fail = self.fail_evict.clone();
        move |key: &str, _: &P| -> Result<()> {
            evicts.lock().push(key.to_string());
            if fail.lock().as_deref() == Some(key) {
                return Err(Error::new(ErrorKind::External, "release refused"));
            }
            Ok(())
        }
    }

    /// Make the load callback fail for `key`.
    pub fn fail_load_of(&self, key: impl Into<String>) {
        *self.fail_load.lock() = Some(key.into());
    }

    /// Make the evict callback fail for `key`.
    pub fn fail_evict_of(&self, key: impl Into<String>) {
        *self.fail_evict.lock() = Some(key.into());
    }

    /// Keys loaded so far, in call order.
    pub fn loads(&self) -> Vec<String> {
        self.loads.lock().clone()
    }

    /// Keys evicted so far, in call order.
    pub fn evicts(&self) -> Vec<String> {
        self.evicts.lock().clone()
    }
}

/// An [`EventListener`] that records every leave event.
pub struct RecordingListener<P> {
    events: Mutex<Vec<(Event, String, P)>>,
}

impl<P> Default for RecordingListener<P> {
    fn default() -> Self {
        Self {
            events: Mutex::new(vec![]),
        }
    }
}

impl<P> RecordingListener<P>
where
    P: Clone,
{
    /// Events recorded so far, in call order.
    pub fn events(&self) -> Vec<(Event, String, P)> {
        self.events.lock().clone()
    }
}

impl<P> EventListener for RecordingListener<P>
where
    P: Clone + Send + Sync + 'static,
{
    type Key = String;
    type Value = P;

    fn on_leave(&self, reason: Event, key: &String, value: &P) {
        self.events.lock().push((reason, key.clone(), value.clone()));
    }
}
