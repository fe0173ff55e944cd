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

use std::{fmt::Display, str::FromStr};

use partcache_common::error::{Error, ErrorKind, Result};
use serde::{Deserialize, Serialize};

/// Residency tier of a persisted partition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StorageLevel {
    /// Not persisted.
    None,
    /// Persisted on disk only.
    DiskOnly,
    /// Kept in memory as deserialized objects.
    MemoryOnly,
    /// Kept in memory in serialized form.
    MemoryOnlySer,
    /// Kept in memory, spilled to disk when memory is short.
    #[default]
    MemoryAndDisk,
    /// Kept in memory in serialized form, spilled to disk when memory is short.
    MemoryAndDiskSer,
}

impl StorageLevel {
    const ALL: [StorageLevel; 6] = [
        StorageLevel::None,
        StorageLevel::DiskOnly,
        StorageLevel::MemoryOnly,
        StorageLevel::MemoryOnlySer,
        StorageLevel::MemoryAndDisk,
        StorageLevel::MemoryAndDiskSer,
    ];

    /// Canonical name, e.g. `MEMORY_AND_DISK`.
    pub fn as_str(self) -> &'static str {
        match self {
            StorageLevel::None => "NONE",
            StorageLevel::DiskOnly => "DISK_ONLY",
            StorageLevel::MemoryOnly => "MEMORY_ONLY",
            StorageLevel::MemoryOnlySer => "MEMORY_ONLY_SER",
            StorageLevel::MemoryAndDisk => "MEMORY_AND_DISK",
            StorageLevel::MemoryAndDiskSer => "MEMORY_AND_DISK_SER",
        }
    }

    /// Whether the level keeps data in memory.
    pub fn use_memory(&self) -> bool {
        matches!(
            self,
            StorageLevel::MemoryOnly
                | StorageLevel::MemoryOnlySer
                | StorageLevel::MemoryAndDisk
                | StorageLevel::MemoryAndDiskSer
        )
    }

    /// Whether the level keeps data on disk.
    pub fn use_disk(&self) -> bool {
        matches!(
            self,
            StorageLevel::DiskOnly | StorageLevel::MemoryAndDisk | StorageLevel::MemoryAndDiskSer
        )
    }

    /// Whether in-memory data is kept deserialized.
    pub fn deserialized(&self) -> bool {
        matches!(self, StorageLevel::MemoryOnly | StorageLevel::MemoryAndDisk)
    }
}

impl Display for StorageLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for StorageLevel {
    type Err = Error;

    /// Parse a level name, ignoring case and `_`/`-` separators.
    fn from_str(s: &str) -> Result<Self> {
        let normalize = |s: &str| {
            s.chars()
                .filter(|c| *c != '_' && *c != '-')
                .map(|c| c.to_ascii_lowercase())
                .collect::<String>()
        };
        let name = normalize(s.trim());

        Self::ALL
            .into_iter()
            .find(|level| normalize(level.as_str()) == name)
            .ok_or_else(|| Error::new(ErrorKind::Parse, "unknown storage level").with_context("storage_level", s))
    }
}

impl TryFrom<String> for StorageLevel {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<StorageLevel> for String {
    fn from(level: StorageLevel) -> Self {
        level.as_str().to_string()
    }
}

/// External tier that holds the persisted form of partition payloads.
///
/// A partition table calls [`PersistenceTier::persist`] when a cache policy re-registers a partition and
/// [`PersistenceTier::unpersist`] when a partition is evicted or the table is dropped. Both run synchronously on the
/// thread of the triggering table operation, with the table's policy lock held.
pub trait PersistenceTier<P>: Send + Sync + 'static {
    /// Persist `payload` at `level`.
    fn persist(&self, payload: &P, level: StorageLevel) -> Result<()>;

    /// Release the persisted form of `payload`.
    ///
    /// Releasing a payload that is not persisted must be a no-op.
    fn unpersist(&self, payload: &P) -> Result<()>;
}

/// A [`PersistenceTier`] that persists nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTier;

impl<P> PersistenceTier<P> for NoopTier {
    fn persist(&self, _: &P, _: StorageLevel) -> Result<()> {
        Ok(())
    }

    fn unpersist(&self, _: &P) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_storage_level() {
        assert_eq!("MEMORY_AND_DISK".parse::<StorageLevel>().unwrap(), StorageLevel::MemoryAndDisk);
        assert_eq!("memory_only_ser".parse::<StorageLevel>().unwrap(), StorageLevel::MemoryOnlySer);
        assert_eq!(" DiskOnly ".parse::<StorageLevel>().unwrap(), StorageLevel::DiskOnly);
        assert_eq!("none".parse::<StorageLevel>().unwrap(), StorageLevel::None);

        let e = "MEMORY_AND_TAPE".parse::<StorageLevel>().unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Parse);
        assert_eq!(e.context_value("storage_level"), Some("MEMORY_AND_TAPE"));
    }

    #[test]
    fn test_storage_level_display_roundtrip() {
        for level in StorageLevel::ALL {
            assert_eq!(level.to_string().parse::<StorageLevel>().unwrap(), level);
        }
        assert_eq!(StorageLevel::default(), StorageLevel::MemoryAndDisk);
    }

    #[test]
    fn test_storage_level_flags() {
        assert!(!StorageLevel::None.use_memory());
        assert!(!StorageLevel::None.use_disk());
        assert!(StorageLevel::DiskOnly.use_disk());
        assert!(!StorageLevel::DiskOnly.use_memory());
        assert!(StorageLevel::MemoryAndDiskSer.use_memory());
        assert!(StorageLevel::MemoryAndDiskSer.use_disk());
        assert!(!StorageLevel::MemoryAndDiskSer.deserialized());
        assert!(StorageLevel::MemoryOnly.deserialized());
    }

    #[test]
    fn test_noop_tier() {
        let tier = NoopTier;
        PersistenceTier::<u64>::persist(&tier, &1, StorageLevel::MemoryOnly).unwrap();
        PersistenceTier::<u64>::unpersist(&tier, &1).unwrap();
    }
}
