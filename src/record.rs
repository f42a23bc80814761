// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::coding::{Decode, DecodeError, Encode, EncodeError};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// Number of bytes in a content digest
pub const DIGEST_SIZE: usize = 20;

/// A 20-byte content fingerprint, supplied by the caller at append time.
///
/// The crate never computes or inspects digests; it round-trips them and
/// compares them on read to detect corruption. A higher layer typically
/// supplies the SHA-1 of the payload, enabling content addressing.
pub type Digest = [u8; DIGEST_SIZE];

/// Number of bytes in an encoded record header
pub const RECORD_HEADER_SIZE: usize = std::mem::size_of::<u32>() + DIGEST_SIZE;

/// The fixed-layout header preceding every payload on disk:
/// big-endian payload size followed by the content digest.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RecordHeader {
    /// Byte length of the payload, excluding this header
    pub payload_size: u32,

    /// Content digest of the payload
    pub digest: Digest,
}

impl RecordHeader {
    /// Total on-disk size of the record this header describes.
    #[must_use]
    pub fn total_size(&self) -> u32 {
        RECORD_HEADER_SIZE as u32 + self.payload_size
    }

    /// Decodes a record header from the start of a byte buffer.
    pub fn from_slice(buf: &[u8]) -> Result<Self, DecodeError> {
        let Some(mut prefix) = buf.get(..RECORD_HEADER_SIZE) else {
            return Err(DecodeError::Malformed("RecordHeader"));
        };
        Self::decode_from(&mut prefix)
    }
}

impl Encode for RecordHeader {
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<(), EncodeError> {
        writer.write_u32::<BigEndian>(self.payload_size)?;
        writer.write_all(&self.digest)?;
        Ok(())
    }
}

impl Decode for RecordHeader {
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        let payload_size = reader.read_u32::<BigEndian>()?;

        let mut digest = [0; DIGEST_SIZE];
        reader.read_exact(&mut digest)?;

        Ok(Self {
            payload_size,
            digest,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn record_header_round_trip() -> crate::Result<()> {
        let header = RecordHeader {
            payload_size: 5,
            digest: [7; DIGEST_SIZE],
        };

        let bytes = header.encode_into_vec()?;
        assert_eq!(RECORD_HEADER_SIZE, bytes.len());

        assert_eq!(header, RecordHeader::from_slice(&bytes)?);

        Ok(())
    }

    #[test]
    fn record_header_layout() -> crate::Result<()> {
        let header = RecordHeader {
            payload_size: 0x0102_0304,
            digest: [0xAB; DIGEST_SIZE],
        };

        let bytes = header.encode_into_vec()?;
        assert_eq!(bytes.get(..4), Some(&[1, 2, 3, 4][..]));
        assert_eq!(bytes.get(4..), Some(&[0xAB; DIGEST_SIZE][..]));

        Ok(())
    }

    #[test]
    fn record_header_short_buffer() {
        assert!(matches!(
            RecordHeader::from_slice(&[0; RECORD_HEADER_SIZE - 1]),
            Err(DecodeError::Malformed("RecordHeader"))
        ));
    }
}
