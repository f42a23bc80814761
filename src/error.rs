// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{
    coding::{DecodeError, EncodeError},
    id::RecordId,
};

/// Represents errors that can occur in the log crate
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// I/O error
    Io(std::io::Error),

    /// `create` refused to clobber an existing directory
    DirectoryExists,

    /// `open` did not find a previously created crate
    DirectoryMissing,

    /// Segment file header has a bad magic, is truncated, or
    /// disagrees with the file name
    CorruptHeader(&'static str),

    /// Invalid data format version
    InvalidVersion(Option<u32>),

    /// Stored record size or digest disagrees with the index
    CorruptRecord(RecordId),

    /// Payload length exceeds the u32 record size field
    PayloadTooLarge,

    /// Serialization failed
    Encode(EncodeError),

    /// Deserialization failed
    Decode(DecodeError),

    /// The coordinator observed a writer event it has no waiter for;
    /// the crate is terminated
    InvariantViolation(&'static str),

    /// The crate has been closed
    Closed,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LogCrateError: {self:?}")
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<EncodeError> for Error {
    fn from(value: EncodeError) -> Self {
        Self::Encode(value)
    }
}

impl From<DecodeError> for Error {
    fn from(value: DecodeError) -> Self {
        Self::Decode(value)
    }
}

/// Log crate result
pub type Result<T> = std::result::Result<T, Error>;
