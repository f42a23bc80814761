// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

mod common;

use common::{digest, record};
use logcrate::{Config, Error, LogCrate};
use rand::{Rng, RngCore};
use std::{
    fs::OpenOptions,
    io::{Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};
use test_log::test;

fn segment_files(path: &Path) -> Vec<PathBuf> {
    let mut files = std::fs::read_dir(path)
        .expect("crate directory should exist")
        .map(|dirent| dirent.expect("dirent should be readable").path())
        .collect::<Vec<_>>();
    files.sort();
    files
}

#[test]
fn recovery_across_segments() -> logcrate::Result<()> {
    let folder = tempfile::tempdir()?;
    let path = folder.path().join("db");

    {
        let log = LogCrate::create(&path, Config::default().segment_max_size(90))?;

        let (d, p) = record("0123456");
        assert_eq!(0, log.append(d, p)?);

        let (d, p) = record("789abcd");
        assert_eq!(1, log.append(d, p)?);
        assert_eq!(1, log.segment_count()?);

        let (d, p) = record("something much larger");
        assert_eq!(2, log.append(d, p)?);
        assert_eq!(2, log.segment_count()?);

        log.close()?;
    }

    {
        let log = LogCrate::open(&path, Config::default().segment_max_size(90))?;

        assert_eq!(Some((0, 2)), log.range());

        for (id, expected) in [(0, "0123456"), (1, "789abcd"), (2, "something much larger")] {
            let (stored_digest, payload) = log.read(id)?.expect("record should exist");
            assert_eq!(digest(expected.as_bytes()), stored_digest);
            assert_eq!(expected.as_bytes(), &*payload);
        }

        let (d, p) = record("next");
        assert_eq!(3, log.append(d, p)?);

        log.close()?;
    }

    Ok(())
}

#[test]
fn reopen_equivalence() -> logcrate::Result<()> {
    let folder = tempfile::tempdir()?;
    let path = folder.path().join("db");

    let mut rng = rand::thread_rng();
    let mut expected = Vec::new();

    {
        let log = LogCrate::create(&path, Config::default().segment_max_size(256))?;

        for _ in 0..50 {
            let len = rng.gen_range(1..100);
            let mut payload = vec![0u8; len];
            rng.fill_bytes(&mut payload);

            log.append(digest(&payload), payload.clone())?;
            expected.push(payload);
        }

        log.close()?;
    }

    {
        let log = LogCrate::open(&path, Config::default().segment_max_size(256))?;

        assert_eq!(expected.len(), log.len());

        for (id, payload) in expected.iter().enumerate() {
            let (stored_digest, stored) = log.read(id as u64)?.expect("record should exist");
            assert_eq!(digest(payload), stored_digest);
            assert_eq!(&payload[..], &*stored);
        }

        let (d, p) = record("tail");
        assert_eq!(expected.len() as u64, log.append(d, p)?);

        log.close()?;
    }

    Ok(())
}

#[test]
fn recovery_trims_partial_tail() -> logcrate::Result<()> {
    let folder = tempfile::tempdir()?;
    let path = folder.path().join("db");

    {
        let log = LogCrate::create(&path, Config::default())?;

        for payload in ["0123456", "789abcd"] {
            let (d, p) = record(payload);
            log.append(d, p)?;
        }

        log.close()?;
    }

    let segment = segment_files(&path).remove(0);
    assert_eq!(82, std::fs::metadata(&segment)?.len());

    // Fake a crash mid-append: garbage after the last valid record
    {
        let mut file = OpenOptions::new().append(true).open(&segment)?;
        file.write_all(&[0xFF; 10])?;
    }
    assert_eq!(92, std::fs::metadata(&segment)?.len());

    {
        let log = LogCrate::open(&path, Config::default())?;

        // The partial tail is gone and appends continue cleanly
        assert_eq!(82, std::fs::metadata(&segment)?.len());
        assert_eq!(Some((0, 1)), log.range());

        let (d, p) = record("after crash");
        assert_eq!(2, log.append(d, p)?);

        let (_, payload) = log.read(2)?.expect("record should exist");
        assert_eq!(b"after crash", &*payload);

        log.close()?;
    }

    {
        let log = LogCrate::open(&path, Config::default())?;
        assert_eq!(Some((0, 2)), log.range());
        log.close()?;
    }

    Ok(())
}

#[test]
fn recovery_trims_tail_cut_mid_record() -> logcrate::Result<()> {
    let folder = tempfile::tempdir()?;
    let path = folder.path().join("db");

    {
        let log = LogCrate::create(&path, Config::default())?;

        for payload in ["0123456", "789abcd"] {
            let (d, p) = record(payload);
            log.append(d, p)?;
        }

        log.close()?;
    }

    let segment = segment_files(&path).remove(0);

    // Cut into the second record
    {
        let file = OpenOptions::new().write(true).open(&segment)?;
        file.set_len(60)?;
    }

    {
        let log = LogCrate::open(&path, Config::default())?;

        assert_eq!(51, std::fs::metadata(&segment)?.len());
        assert_eq!(Some((0, 0)), log.range());
        assert_eq!(None, log.read(1)?);

        // The cut record's id is reassigned
        let (d, p) = record("reborn");
        assert_eq!(1, log.append(d, p)?);

        log.close()?;
    }

    Ok(())
}

#[test]
fn recovery_rejects_bad_magic() -> logcrate::Result<()> {
    let folder = tempfile::tempdir()?;
    let path = folder.path().join("db");

    {
        let log = LogCrate::create(&path, Config::default())?;
        let (d, p) = record("hello");
        log.append(d, p)?;
        log.close()?;
    }

    let segment = segment_files(&path).remove(0);

    {
        let mut file = OpenOptions::new().write(true).open(&segment)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(b"notalog!")?;
    }

    assert!(matches!(
        LogCrate::open(&path, Config::default()),
        Err(Error::CorruptHeader(_))
    ));

    Ok(())
}

#[test]
fn recovery_rejects_version_mismatch() -> logcrate::Result<()> {
    let folder = tempfile::tempdir()?;
    let path = folder.path().join("db");

    {
        let log = LogCrate::create(&path, Config::default())?;
        let (d, p) = record("hello");
        log.append(d, p)?;
        log.close()?;
    }

    let segment = segment_files(&path).remove(0);

    {
        let mut file = OpenOptions::new().write(true).open(&segment)?;
        file.seek(SeekFrom::Start(8))?;
        file.write_all(&2u32.to_be_bytes())?;
    }

    assert!(matches!(
        LogCrate::open(&path, Config::default()),
        Err(Error::InvalidVersion(Some(2)))
    ));

    Ok(())
}

#[test]
fn recovery_rejects_foreign_files() -> logcrate::Result<()> {
    let folder = tempfile::tempdir()?;
    let path = folder.path().join("db");

    {
        let log = LogCrate::create(&path, Config::default())?;
        let (d, p) = record("hello");
        log.append(d, p)?;
        log.close()?;
    }

    std::fs::write(path.join("notes.txt"), b"not a segment")?;

    assert!(matches!(
        LogCrate::open(&path, Config::default()),
        Err(Error::CorruptHeader(_))
    ));

    Ok(())
}

#[test]
fn recovery_rejects_renamed_segment() -> logcrate::Result<()> {
    let folder = tempfile::tempdir()?;
    let path = folder.path().join("db");

    {
        let log = LogCrate::create(&path, Config::default())?;
        let (d, p) = record("hello");
        log.append(d, p)?;
        log.close()?;
    }

    std::fs::rename(
        path.join("0000000000000000.dat"),
        path.join("0000000000000007.dat"),
    )?;

    assert!(matches!(
        LogCrate::open(&path, Config::default()),
        Err(Error::CorruptHeader(_))
    ));

    Ok(())
}

#[test]
fn corrupt_digest_surfaces_on_read() -> logcrate::Result<()> {
    let folder = tempfile::tempdir()?;
    let path = folder.path().join("db");

    let log = LogCrate::create(&path, Config::default())?;

    let (d, p) = record("hello");
    log.append(d, p)?;

    // Flip one digest byte on disk; the index still holds the original
    let segment = segment_files(&path).remove(0);
    {
        let mut file = OpenOptions::new().write(true).open(&segment)?;

        // Record header starts at 20: size at 20..24, digest at 24..44
        file.seek(SeekFrom::Start(30))?;
        file.write_all(&[!d[6]])?;
    }

    assert!(matches!(log.read(0), Err(Error::CorruptRecord(0))));

    log.close()?;

    Ok(())
}

#[test]
fn corrupt_size_surfaces_on_read() -> logcrate::Result<()> {
    let folder = tempfile::tempdir()?;
    let path = folder.path().join("db");

    let log = LogCrate::create(&path, Config::default())?;

    let (d, p) = record("some payload that is long enough");
    log.append(d, p)?;

    let segment = segment_files(&path).remove(0);
    {
        let mut file = OpenOptions::new().write(true).open(&segment)?;

        // Shrink the stored payload size below what the index expects
        file.seek(SeekFrom::Start(20))?;
        file.write_all(&5u32.to_be_bytes())?;
    }

    assert!(matches!(log.read(0), Err(Error::CorruptRecord(0))));

    log.close()?;

    Ok(())
}
