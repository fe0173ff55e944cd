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

//! Helpers to observe a [`PartitionedTable`](crate::PartitionedTable) in tests.

use std::sync::Arc;

use parking_lot::Mutex;
use partcache_common::error::{Error, ErrorKind, Result};

use crate::tier::{PersistenceTier, StorageLevel};

struct RecordingTierInner<P> {
    persisted: Vec<(P, StorageLevel)>,
    unpersisted: Vec<P>,
    fail_persist: Option<P>,
    fail_unpersist: Option<P>,
}

/// A [`PersistenceTier`] that records every call.
pub struct RecordingTier<P> {
    inner: Arc<Mutex<RecordingTierInner<P>>>,
}

impl<P> Clone for RecordingTier<P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<P> Default for RecordingTier<P> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(RecordingTierInner {
                persisted: vec![],
                unpersisted: vec![],
                fail_persist: None,
                fail_unpersist: None,
            })),
        }
    }
}

impl<P> RecordingTier<P>
where
    P: Clone,
{
    /// Make `persist` fail for `payload`. The call is still recorded.
    pub fn fail_persist_of(&self, payload: P) {
        self.inner.lock().fail_persist = Some(payload);
    }

    /// Make `unpersist` fail for `payload`. The call is still recorded.
    pub fn fail_unpersist_of(&self, payload: P) {
        self.inner.lock().fail_unpersist = Some(payload);
    }

    /// Persisted payloads with their levels, in call order.
    pub fn persisted(&self) -> Vec<(P, StorageLevel)> {
        self.inner.lock().persisted.clone()
    }

    /// Unpersisted payloads, in call order.
    pub fn unpersisted(&self) -> Vec<P> {
        self.inner.lock().unpersisted.clone()
    }
}

impl<P> PersistenceTier<P> for RecordingTier<P>
where
    P: Clone + PartialEq + Send + Sync + 'static,
{
    fn persist(&self, payload: &P, level: StorageLevel) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.persisted.push((payload.clone(), level));
        if inner.fail_persist.as_ref() == Some(payload) {
            return Err(Error::new(ErrorKind::External, "tier refused to persist payload"));
        }
        Ok(())
    }

    fn unpersist(&self, payload: &P) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.unpersisted.push(payload.clone());
        if inner.fail_unpersist.as_ref() == Some(payload) {
            return Err(Error::new(ErrorKind::External, "tier refused to release payload"));
        }
        Ok(())
    }
}
