// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

/// A record id, assigned at append time.
///
/// Record ids increase strictly monotonically over the lifetime
/// of a crate and are dense (no gaps) unless whole segments have
/// been pruned from the front.
pub type RecordId = u64;

/// A segment id.
///
/// Equal to the record id of the first record in the segment,
/// and also the file name stem of the segment file.
pub type SegmentId = u64;
