// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use logcrate::Slice;
use sha1::{Digest as _, Sha1};

/// Content digest the way a typical higher layer supplies it
#[allow(unused)]
pub fn digest(payload: &[u8]) -> logcrate::Digest {
    Sha1::digest(payload).into()
}

/// Builds an append-ready record from a string payload
#[allow(unused)]
pub fn record(payload: &str) -> (logcrate::Digest, Slice) {
    (digest(payload.as_bytes()), Slice::from(payload))
}

/// Extracts the raw payload bytes from read results
#[allow(unused)]
pub fn payloads(records: &[(logcrate::Digest, Slice)]) -> Vec<&[u8]> {
    records.iter().map(|(_, payload)| &**payload).collect()
}
