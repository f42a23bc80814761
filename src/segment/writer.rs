// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::header::{SegmentHeader, SEGMENT_HEADER_SIZE};
use crate::id::SegmentId;
use std::{
    fs::{File, OpenOptions},
    io::{Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

/// Owns the active segment file and its write cursor.
///
/// Exactly one of these exists at a time; all other segments are read-only.
pub struct Writer {
    pub(crate) segment_id: SegmentId,
    pub(crate) path: PathBuf,

    file: File,

    offset: u64,
    pub(crate) item_count: u64,
}

impl Writer {
    /// Creates a fresh segment file and writes its 20-byte header.
    pub fn create<P: AsRef<Path>>(path: P, segment_id: SegmentId) -> crate::Result<Self> {
        let path = path.as_ref();

        let mut file = File::create(path)?;

        let mut header = Vec::with_capacity(SEGMENT_HEADER_SIZE);
        SegmentHeader { segment_id }.write_into(&mut header)?;
        file.write_all(&header)?;

        Ok(Self {
            segment_id,
            path: path.into(),
            file,
            offset: SEGMENT_HEADER_SIZE as u64,
            item_count: 0,
        })
    }

    /// Reopens an existing segment in append-to-tail mode, with the
    /// write cursor at the end of its last valid record.
    pub fn open_at<P: AsRef<Path>>(
        path: P,
        segment_id: SegmentId,
        offset: u64,
        item_count: u64,
    ) -> crate::Result<Self> {
        let path = path.as_ref();

        let file = OpenOptions::new().write(true).open(path)?;

        Ok(Self {
            segment_id,
            path: path.into(),
            file,
            offset,
            item_count,
        })
    }

    /// Returns the current write cursor.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Returns the segment ID
    #[must_use]
    pub fn segment_id(&self) -> SegmentId {
        self.segment_id
    }

    /// Writes a pre-encoded batch of `n` records as one contiguous write.
    ///
    /// The cursor only advances when the whole batch has been handed to the
    /// operating system; on failure the partial tail is left in place and the
    /// explicit seek realigns the next attempt.
    pub fn write_batch(&mut self, buf: &[u8], n: u64) -> std::io::Result<()> {
        self.file.seek(SeekFrom::Start(self.offset))?;
        self.file.write_all(buf)?;

        self.offset += buf.len() as u64;
        self.item_count += n;

        Ok(())
    }

    /// Durably flushes the segment file.
    pub(crate) fn flush(&mut self) -> std::io::Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}
