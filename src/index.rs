// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{handle::IndexEntry, id::RecordId};
use std::collections::BTreeMap;

/// In-memory mapping record id -> [`IndexEntry`].
///
/// Mutated only by the coordinator when it applies a writer commit event or
/// during recovery, so the type itself carries no locking; readers copy
/// entries out under the coordinator's read lock before issuing I/O.
#[derive(Debug, Default)]
pub struct Index(BTreeMap<RecordId, IndexEntry>);

impl Index {
    /// Looks up a record.
    #[must_use]
    pub fn get(&self, id: RecordId) -> Option<&IndexEntry> {
        self.0.get(&id)
    }

    /// Inserts a record.
    pub fn insert(&mut self, id: RecordId, entry: IndexEntry) {
        self.0.insert(id, entry);
    }

    /// Returns the smallest and largest live record id, or `None`
    /// if the index is empty.
    #[must_use]
    pub fn range(&self) -> Option<(RecordId, RecordId)> {
        let (&min, _) = self.0.first_key_value()?;
        let (&max, _) = self.0.last_key_value()?;
        Some((min, max))
    }

    /// Iterates entries in ascending id order, starting at `start`.
    pub fn range_from(
        &self,
        start: RecordId,
    ) -> impl Iterator<Item = (RecordId, &IndexEntry)> + '_ {
        self.0.range(start..).map(|(&id, entry)| (id, entry))
    }

    /// Number of live records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no record is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
