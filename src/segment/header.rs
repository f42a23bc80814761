// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::id::SegmentId;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

pub const MAGIC_BYTES: [u8; 8] = *b"logcrate";

pub const FORMAT_VERSION: u32 = 1;

/// Number of bytes in an encoded segment file header
pub const SEGMENT_HEADER_SIZE: usize =
    MAGIC_BYTES.len() + std::mem::size_of::<u32>() + std::mem::size_of::<u64>();

/// The fixed-layout header at the start of every segment file:
/// magic, format version, segment id.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SegmentHeader {
    /// Segment ID, equal to the id of the first record in the file
    pub segment_id: SegmentId,
}

/// A short read while parsing the fixed header means the file is not
/// a well-formed segment, not a generic I/O failure.
fn map_eof(e: std::io::Error) -> crate::Error {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        crate::Error::CorruptHeader("truncated segment header")
    } else {
        crate::Error::Io(e)
    }
}

impl SegmentHeader {
    /// Serializes the header into a writer.
    pub fn write_into<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(&MAGIC_BYTES)?;
        writer.write_u32::<BigEndian>(FORMAT_VERSION)?;
        writer.write_u64::<BigEndian>(self.segment_id)?;
        Ok(())
    }

    /// Parses and validates a segment header.
    pub fn read_from<R: Read>(reader: &mut R) -> crate::Result<Self> {
        let mut magic = [0; MAGIC_BYTES.len()];
        reader.read_exact(&mut magic).map_err(map_eof)?;

        if magic != MAGIC_BYTES {
            return Err(crate::Error::CorruptHeader("bad magic"));
        }

        let version = reader.read_u32::<BigEndian>().map_err(map_eof)?;

        if version != FORMAT_VERSION {
            return Err(crate::Error::InvalidVersion(Some(version)));
        }

        let segment_id = reader.read_u64::<BigEndian>().map_err(map_eof)?;

        Ok(Self { segment_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn segment_header_round_trip() -> crate::Result<()> {
        let header = SegmentHeader { segment_id: 42 };

        let mut bytes = vec![];
        header.write_into(&mut bytes)?;
        assert_eq!(SEGMENT_HEADER_SIZE, bytes.len());

        let parsed = SegmentHeader::read_from(&mut bytes.as_slice())?;
        assert_eq!(header, parsed);

        Ok(())
    }

    #[test]
    fn segment_header_layout() -> crate::Result<()> {
        let mut bytes = vec![];
        SegmentHeader { segment_id: 1 }.write_into(&mut bytes)?;

        assert_eq!(bytes.get(..8), Some(b"logcrate".as_slice()));
        assert_eq!(bytes.get(8..12), Some(&[0, 0, 0, 1][..]));
        assert_eq!(bytes.get(12..20), Some(&[0, 0, 0, 0, 0, 0, 0, 1][..]));

        Ok(())
    }

    #[test]
    fn segment_header_bad_magic() {
        let mut bytes = vec![];
        SegmentHeader { segment_id: 0 }
            .write_into(&mut bytes)
            .expect("can't fail");
        bytes.swap(0, 1);

        assert!(matches!(
            SegmentHeader::read_from(&mut bytes.as_slice()),
            Err(crate::Error::CorruptHeader("bad magic"))
        ));
    }

    #[test]
    fn segment_header_bad_version() {
        let mut bytes = vec![];
        bytes.extend_from_slice(&MAGIC_BYTES);
        bytes.extend_from_slice(&2u32.to_be_bytes());
        bytes.extend_from_slice(&0u64.to_be_bytes());

        assert!(matches!(
            SegmentHeader::read_from(&mut bytes.as_slice()),
            Err(crate::Error::InvalidVersion(Some(2)))
        ));
    }

    #[test]
    fn segment_header_truncated() {
        let bytes = b"logcr";

        assert!(matches!(
            SegmentHeader::read_from(&mut bytes.as_slice()),
            Err(crate::Error::CorruptHeader("truncated segment header"))
        ));
    }
}
