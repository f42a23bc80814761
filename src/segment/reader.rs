// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::header::{SegmentHeader, SEGMENT_HEADER_SIZE};
use crate::{
    handle::IndexEntry,
    id::RecordId,
    record::{Digest, RecordHeader, RECORD_HEADER_SIZE},
    Slice,
};
use std::{
    fs::File,
    io::{BufReader, Read, Seek, SeekFrom},
    path::Path,
};

macro_rules! fail_iter {
    ($e:expr) => {
        match $e {
            Ok(v) => v,
            Err(e) => return Some(Err(e.into())),
        }
    };
}

/// Stateless positional reader over one segment file.
///
/// Readers are independent of the writer and of each other; every read
/// request opens its own handle, so positional reads never conflict
/// with an in-flight append.
pub struct Reader {
    file: File,
}

impl Reader {
    /// Opens a segment file read-only.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    pub fn new<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let file = File::open(path)?;

        Ok(Self { file })
    }

    /// Reads one record at the position the index entry points at.
    ///
    /// Enforces that the stored payload size and digest equal the
    /// indexed ones; a mismatch surfaces as [`crate::Error::CorruptRecord`]
    /// and is never silently healed.
    pub fn read_record(&mut self, id: RecordId, entry: &IndexEntry) -> crate::Result<(Digest, Slice)> {
        self.file.seek(SeekFrom::Start(entry.offset))?;

        let mut buf = [0; RECORD_HEADER_SIZE];
        self.file.read_exact(&mut buf)?;
        let header = RecordHeader::from_slice(&buf)?;

        if header.payload_size != entry.payload_size() || header.digest != entry.digest {
            return Err(crate::Error::CorruptRecord(id));
        }

        let payload = Slice::from_reader(&mut self.file, header.payload_size as usize)?;

        Ok((header.digest, payload))
    }
}

/// Walks a segment file front to back, yielding record positions.
///
/// Used by recovery: validates the segment header on construction, then
/// iterates record headers while skipping over payloads. Every step is
/// bounded by the file length, so a partially written tail terminates the
/// scan cleanly instead of erroring; `valid_end` then marks the end of the
/// last well-formed record.
pub struct Scanner {
    header: SegmentHeader,
    inner: BufReader<File>,

    file_size: u64,
    offset: u64,

    is_truncated: bool,
    is_terminated: bool,
}

impl Scanner {
    /// Opens a segment file and validates its header.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the segment header is corrupt or the version
    /// does not match, or if an IO error occurs.
    pub fn new<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let file = File::open(path)?;
        let file_size = file.metadata()?.len();

        if file_size < SEGMENT_HEADER_SIZE as u64 {
            return Err(crate::Error::CorruptHeader("truncated segment header"));
        }

        let mut inner = BufReader::new(file);
        let header = SegmentHeader::read_from(&mut inner)?;

        Ok(Self {
            header,
            inner,
            file_size,
            offset: SEGMENT_HEADER_SIZE as u64,
            is_truncated: false,
            is_terminated: false,
        })
    }

    /// The validated segment header.
    #[must_use]
    pub fn header(&self) -> &SegmentHeader {
        &self.header
    }

    /// Byte offset one past the last well-formed record seen so far.
    #[must_use]
    pub fn valid_end(&self) -> u64 {
        self.offset
    }

    /// Returns `true` if the scan ended at a partially written record.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.is_truncated
    }
}

impl Iterator for Scanner {
    type Item = crate::Result<(u64, RecordHeader)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_terminated {
            return None;
        }

        if self.offset == self.file_size {
            self.is_terminated = true;
            return None;
        }

        if self.offset + RECORD_HEADER_SIZE as u64 > self.file_size {
            self.is_truncated = true;
            self.is_terminated = true;
            return None;
        }

        let mut buf = [0; RECORD_HEADER_SIZE];
        fail_iter!(self.inner.read_exact(&mut buf));
        let header = fail_iter!(RecordHeader::from_slice(&buf));

        let total_size = u64::from(header.total_size());

        if self.offset + total_size > self.file_size {
            self.is_truncated = true;
            self.is_terminated = true;
            return None;
        }

        fail_iter!(self.inner.seek_relative(i64::from(header.payload_size)));

        let offset = self.offset;
        self.offset += total_size;

        Some(Ok((offset, header)))
    }
}
