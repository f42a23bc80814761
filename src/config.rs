// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::record_cache::RecordCache;
use std::sync::Arc;

/// Log crate configuration
#[derive(Clone)]
pub struct Config {
    /// Soft cap on segment file size
    pub(crate) segment_max_size: u64,

    /// Record cache to use
    pub(crate) record_cache: Arc<RecordCache>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            segment_max_size: /* 512 MiB */ 512 * 1_024 * 1_024,
            record_cache: Arc::new(RecordCache::with_capacity_bytes(
                /* 16 MiB */ 16 * 1_024 * 1_024,
            )),
        }
    }
}

impl Config {
    /// Sets the maximum size of segment files.
    ///
    /// The cap is soft: it is checked against the incoming batch before
    /// writing, and a batch that alone exceeds it is still written whole
    /// into a fresh segment. Segments are never split mid-batch.
    ///
    /// Default = 512 MiB
    #[must_use]
    pub fn segment_max_size(mut self, bytes: u64) -> Self {
        self.segment_max_size = bytes;
        self
    }

    /// Sets the record cache.
    ///
    /// You can create a global [`RecordCache`] and share it between multiple
    /// crates to cap global cache memory usage.
    ///
    /// Default = 16 MiB of capacity
    #[must_use]
    pub fn record_cache(mut self, record_cache: Arc<RecordCache>) -> Self {
        self.record_cache = record_cache;
        self
    }
}
