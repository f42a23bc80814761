// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Embeddable, append-only, log-structured record store.
//!
//! A [`LogCrate`] manages a directory of fixed-format segment files. Clients
//! append opaque byte payloads, each stamped with a 20-byte content digest,
//! and read them back by the monotonically increasing record id assigned at
//! append time:
//!
//! [r0][r1][r2][r3][r4] ...
//!
//! Appends are serialized through a single writer task that owns the active
//! segment file; when the active segment would exceed the configured size,
//! a fresh segment is rolled. Reads are concurrent with each other and with
//! in-flight appends, and never touch the write path; multi-record reads
//! spanning several segments fan out to one reader per segment.
//!
//! The in-memory index (record id to file position) is rebuilt on open by
//! scanning the segment files in order; a partially written tail left by a
//! crash is trimmed. The crate never computes digests - a higher layer
//! typically supplies the SHA-1 of the payload, enabling content addressing
//! and end-to-end corruption detection.
//!
//! # Example usage
//!
//! ```
//! use logcrate::{Config, LogCrate};
//!
//! # fn main() -> logcrate::Result<()> {
//! # let folder = tempfile::tempdir()?;
//! # let path = folder.path().join("db");
//! let log = LogCrate::create(&path, Config::default())?;
//!
//! // Typically the SHA-1 of the payload; the crate only round-trips it
//! let digest = [171; 20];
//!
//! let id = log.append(digest, "hello")?;
//! assert_eq!(0, id);
//!
//! let (stored_digest, payload) = log.read(id)?.expect("record should exist");
//! assert_eq!(digest, stored_digest);
//! assert_eq!(b"hello", &*payload);
//!
//! log.close()?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(clippy::all, missing_docs, clippy::cargo)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::indexing_slicing)]
#![warn(clippy::pedantic, clippy::nursery)]
#![warn(clippy::expect_used)]
#![allow(clippy::missing_const_for_fn)]
#![warn(clippy::multiple_crate_versions)]

mod coding;
mod config;
mod error;
mod handle;
mod id;
mod index;
mod log_crate;
mod path;
mod record;
mod record_cache;
mod slice;
mod writer;

mod segment;

pub use {
    config::Config,
    error::{Error, Result},
    handle::IndexEntry,
    id::{RecordId, SegmentId},
    log_crate::{LogCrate, LogCrateId},
    record::{Digest, DIGEST_SIZE},
    record_cache::RecordCache,
    slice::Slice,
};

#[doc(hidden)]
pub use segment::reader::{Reader as SegmentReader, Scanner as SegmentScanner};

#[doc(hidden)]
pub use segment::header::{SegmentHeader, SEGMENT_HEADER_SIZE};

#[doc(hidden)]
pub use record::{RecordHeader, RECORD_HEADER_SIZE};
