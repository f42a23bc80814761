// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

pub mod header;
pub mod reader;
pub mod writer;

use crate::id::SegmentId;

pub const SEGMENT_FILE_SUFFIX: &str = ".dat";

/// Formats a segment file name: the id as 16 lowercase hex digits
/// plus the `.dat` suffix, so lexicographic file name order equals
/// ascending segment order.
#[must_use]
pub fn file_name(id: SegmentId) -> String {
    format!("{id:016x}{SEGMENT_FILE_SUFFIX}")
}

/// Parses a segment file name back into its id.
#[must_use]
pub fn parse_file_name(name: &str) -> Option<SegmentId> {
    let stem = name.strip_suffix(SEGMENT_FILE_SUFFIX)?;

    if stem.len() != 16 || !stem.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
        return None;
    }

    SegmentId::from_str_radix(stem, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn segment_file_name_round_trip() {
        assert_eq!("0000000000000000.dat", file_name(0));
        assert_eq!("00000000000000ff.dat", file_name(255));

        assert_eq!(Some(255), parse_file_name("00000000000000ff.dat"));
        assert_eq!(Some(0), parse_file_name(&file_name(0)));
    }

    #[test]
    fn segment_file_name_rejects_foreign_files() {
        assert_eq!(None, parse_file_name("manifest"));
        assert_eq!(None, parse_file_name("ff.dat"));
        assert_eq!(None, parse_file_name("00000000000000FF.dat"));
        assert_eq!(None, parse_file_name("0000000000000000.tmp"));
    }

    #[test]
    fn segment_file_name_order_is_id_order() {
        let mut names = vec![file_name(10), file_name(2), file_name(255)];
        names.sort();

        assert_eq!(
            vec![file_name(2), file_name(10), file_name(255)],
            names
        );
    }
}
