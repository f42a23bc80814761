// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{
    coding::Encode,
    id::{RecordId, SegmentId},
    log_crate::Message,
    record::{Digest, RecordHeader, RECORD_HEADER_SIZE},
    segment,
    Slice,
};
use std::{
    path::PathBuf,
    sync::mpsc::{Receiver, Sender},
};

/// Work fed to the writer task, in submission order.
pub(crate) enum Request {
    /// Append a batch of records
    Append { batch: Vec<(Digest, Slice)> },

    /// Durably flush the active segment
    Sync,

    /// Flush and stop
    Shutdown,
}

/// What the writer tells the coordinator.
///
/// Exactly one `Appended` or `AppendFailed` event is emitted per `Append`
/// request, in request order, so a plain FIFO of waiters correlates them.
pub(crate) enum Event {
    /// A new active segment was created
    Rolled {
        /// Id of the new segment
        segment_id: SegmentId,
    },

    /// A batch was handed to the operating system
    Appended {
        segment_id: SegmentId,
        first_id: RecordId,
        offsets: Vec<u64>,
        total_sizes: Vec<u32>,
        digests: Vec<Digest>,
    },

    /// A batch was not written; the cursor did not advance
    AppendFailed {
        first_id: RecordId,
        error: crate::Error,
    },

    /// Reply to a `Sync` request
    Synced(crate::Result<()>),

    /// Reply to a `Shutdown` request; the task exits afterwards
    ShutdownComplete(crate::Result<()>),
}

struct EncodedBatch {
    buf: Vec<u8>,
    relative_offsets: Vec<u64>,
    total_sizes: Vec<u32>,
    digests: Vec<Digest>,
}

fn encode_batch(batch: &[(Digest, Slice)]) -> crate::Result<EncodedBatch> {
    let payload_bytes = batch.iter().map(|(_, payload)| payload.len()).sum::<usize>();

    let mut buf = Vec::with_capacity(payload_bytes + batch.len() * RECORD_HEADER_SIZE);
    let mut relative_offsets = Vec::with_capacity(batch.len());
    let mut total_sizes = Vec::with_capacity(batch.len());
    let mut digests = Vec::with_capacity(batch.len());

    for (digest, payload) in batch {
        let payload_size = u32::try_from(payload.len())
            .ok()
            .filter(|&size| size <= u32::MAX - RECORD_HEADER_SIZE as u32)
            .ok_or(crate::Error::PayloadTooLarge)?;

        let header = RecordHeader {
            payload_size,
            digest: *digest,
        };

        relative_offsets.push(buf.len() as u64);
        total_sizes.push(header.total_size());
        digests.push(*digest);

        header.encode_into(&mut buf)?;
        buf.extend_from_slice(payload);
    }

    Ok(EncodedBatch {
        buf,
        relative_offsets,
        total_sizes,
        digests,
    })
}

/// The append pipeline: exclusive owner of the active segment file.
///
/// Runs on its own thread, draining requests strictly in FIFO order, so no
/// append commits out of order. Record ids are reserved here; they only
/// become visible once the coordinator has applied the matching `Appended`
/// event to the index.
pub(crate) struct Writer {
    folder: PathBuf,
    segment_max_size: u64,

    active: Option<segment::writer::Writer>,
    next_id: RecordId,
}

impl Writer {
    pub(crate) fn new(
        folder: PathBuf,
        segment_max_size: u64,
        active: Option<segment::writer::Writer>,
        next_id: RecordId,
    ) -> Self {
        Self {
            folder,
            segment_max_size,
            active,
            next_id,
        }
    }

    /// Closes the previous segment durably and starts a fresh one whose id
    /// is the first record id of the incoming batch.
    fn roll(&mut self, segment_id: SegmentId) -> crate::Result<()> {
        if let Some(mut old) = self.active.take() {
            old.flush()?;
            log::debug!(
                "Closed segment {:?} ({} records)",
                old.path,
                old.item_count
            );
        }

        let path = self.folder.join(segment::file_name(segment_id));
        self.active = Some(segment::writer::Writer::create(path, segment_id)?);

        Ok(())
    }

    fn handle_append(&mut self, batch: &[(Digest, Slice)], events: &Sender<Message>) {
        let first_id = self.next_id;

        let encoded = match encode_batch(batch) {
            Ok(encoded) => encoded,
            Err(error) => {
                let _ = events.send(Event::AppendFailed { first_id, error }.into());
                return;
            }
        };

        let batch_bytes = encoded.buf.len() as u64;

        // The size cap is soft: it is checked against the incoming batch
        // before writing, and a batch that alone exceeds it still goes whole
        // into the fresh segment. Segments are never split mid-batch.
        let needs_roll = match &self.active {
            None => true,
            Some(writer) => writer.offset() + batch_bytes > self.segment_max_size,
        };

        if needs_roll {
            if let Err(error) = self.roll(first_id) {
                let _ = events.send(Event::AppendFailed { first_id, error }.into());
                return;
            }
            let _ = events.send(
                Event::Rolled {
                    segment_id: first_id,
                }
                .into(),
            );
        }

        let writer = self.active.as_mut().expect("should have an active segment");
        let base_offset = writer.offset();

        match writer.write_batch(&encoded.buf, batch.len() as u64) {
            Ok(()) => {
                let offsets = encoded
                    .relative_offsets
                    .iter()
                    .map(|relative| base_offset + relative)
                    .collect();

                self.next_id += batch.len() as u64;

                let _ = events.send(
                    Event::Appended {
                        segment_id: writer.segment_id(),
                        first_id,
                        offsets,
                        total_sizes: encoded.total_sizes,
                        digests: encoded.digests,
                    }
                    .into(),
                );
            }
            Err(e) => {
                let _ = events.send(
                    Event::AppendFailed {
                        first_id,
                        error: e.into(),
                    }
                    .into(),
                );
            }
        }
    }

    fn sync_active(&mut self) -> crate::Result<()> {
        if let Some(writer) = &mut self.active {
            writer.flush()?;
        }
        Ok(())
    }

    pub(crate) fn run(mut self, requests: Receiver<Request>, events: Sender<Message>) {
        while let Ok(request) = requests.recv() {
            match request {
                Request::Append { batch } => self.handle_append(&batch, &events),
                Request::Sync => {
                    let _ = events.send(Event::Synced(self.sync_active()).into());
                }
                Request::Shutdown => {
                    let _ = events.send(Event::ShutdownComplete(self.sync_active()).into());
                    return;
                }
            }
        }

        // Coordinator went away without a shutdown request
        if let Err(e) = self.sync_active() {
            log::warn!("Could not flush active segment on writer exit: {e:?}");
        }
    }
}
