// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{id::RecordId, log_crate::LogCrateId, Slice};
use quick_cache::{sync::Cache, Weighter};

#[derive(Eq, std::hash::Hash, PartialEq)]
pub struct CacheKey(LogCrateId, RecordId);

impl From<(LogCrateId, RecordId)> for CacheKey {
    fn from((crate_id, record_id): (LogCrateId, RecordId)) -> Self {
        Self(crate_id, record_id)
    }
}

#[derive(Clone)]
struct RecordWeighter;

impl Weighter<CacheKey, Slice> for RecordWeighter {
    #[allow(clippy::cast_possible_truncation)]
    fn weight(&self, _: &CacheKey, payload: &Slice) -> u64 {
        payload.len() as u64
    }
}

/// Record cache, in which payloads are cached in-memory
/// after being retrieved from disk
///
/// This speeds up consecutive accesses to the same records, improving
/// read performance for hot data.
pub struct RecordCache {
    /// Concurrent cache implementation
    data: Cache<CacheKey, Slice, RecordWeighter>,

    /// Capacity in bytes
    capacity: u64,
}

impl std::fmt::Debug for RecordCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RecordCache<cap: {} bytes>", self.capacity)
    }
}

impl RecordCache {
    /// Creates a new record cache with roughly `n` bytes of capacity.
    #[must_use]
    pub fn with_capacity_bytes(bytes: u64) -> Self {
        use quick_cache::sync::DefaultLifecycle;

        #[allow(clippy::default_trait_access)]
        let quick_cache = Cache::with(
            10_000,
            bytes,
            RecordWeighter,
            Default::default(),
            DefaultLifecycle::default(),
        );

        Self {
            data: quick_cache,
            capacity: bytes,
        }
    }

    pub(crate) fn insert(&self, key: CacheKey, payload: Slice) {
        self.data.insert(key, payload);
    }

    pub(crate) fn get(&self, crate_id: LogCrateId, record_id: RecordId) -> Option<Slice> {
        self.data.get(&CacheKey(crate_id, record_id))
    }

    /// Returns the cache capacity in bytes.
    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Returns the size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.data.weight()
    }

    /// Returns the number of cached payloads.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if there are no cached payloads.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
