// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{
    id::SegmentId,
    record::{Digest, RECORD_HEADER_SIZE},
};

/// An index entry points at one record inside a segment file
#[allow(clippy::module_name_repetitions)]
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct IndexEntry {
    /// Segment ID
    pub segment_id: SegmentId,

    /// Byte offset of the record header in the segment file
    pub offset: u64,

    /// Record size in bytes, header included
    pub total_size: u32,

    /// Content digest of the payload
    pub digest: Digest,
}

impl IndexEntry {
    /// Byte length of the payload alone.
    #[must_use]
    pub fn payload_size(&self) -> u32 {
        self.total_size - RECORD_HEADER_SIZE as u32
    }
}
