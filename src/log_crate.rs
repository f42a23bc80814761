// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{
    handle::IndexEntry,
    id::{RecordId, SegmentId},
    index::Index,
    path::absolute_path,
    record::Digest,
    segment,
    segment::reader::{Reader, Scanner},
    writer::{Event, Request, Writer},
    Config, Slice,
};
use std::{
    collections::VecDeque,
    fs::OpenOptions,
    path::{Path, PathBuf},
    sync::{
        atomic::AtomicU64,
        mpsc::{self, Receiver, Sender, SyncSender},
        Arc, Mutex, RwLock,
    },
    thread::JoinHandle,
};

/// Unique log crate ID
#[allow(clippy::module_name_repetitions)]
pub type LogCrateId = u64;

/// Hands out a unique (monotonically increasing) log crate ID.
pub(crate) fn get_next_crate_id() -> LogCrateId {
    static CRATE_ID_COUNTER: AtomicU64 = AtomicU64::new(0);
    CRATE_ID_COUNTER.fetch_add(1, std::sync::atomic::Ordering::Relaxed)
}

type AppendReply = SyncSender<crate::Result<Vec<RecordId>>>;
type Ack = SyncSender<crate::Result<()>>;

/// The coordinator mailbox: client calls and writer events, multiplexed.
pub(crate) enum Message {
    Append {
        batch: Vec<(Digest, Slice)>,
        reply: AppendReply,
    },
    Sync {
        ack: Ack,
    },
    Close {
        ack: Ack,
    },
    Writer(Event),
}

impl From<Event> for Message {
    fn from(value: Event) -> Self {
        Self::Writer(value)
    }
}

/// The coordinator task: owns the in-flight FIFOs and is the only
/// mutator of the index.
///
/// Appends are forwarded to the writer in order and the writer answers in
/// order, so a plain queue of repliers (no correlation ids) pairs every
/// commit event with its caller. An event without a waiter means that
/// pairing broke; the crate is terminated.
struct Coordinator {
    writer_tx: Sender<Request>,
    index: Arc<RwLock<Index>>,

    pending_appends: VecDeque<AppendReply>,
    pending_syncs: VecDeque<Ack>,
    close_ack: Option<Ack>,
}

impl Coordinator {
    fn run(mut self, mailbox: Receiver<Message>) {
        while let Ok(msg) = mailbox.recv() {
            match self.handle(msg) {
                Ok(false) => {}
                Ok(true) => break,
                Err(e) => {
                    log::error!("Terminating log crate: {e:?}");
                    break;
                }
            }
        }

        self.fail_pending();
    }

    /// Returns `Ok(true)` when the crate has shut down cleanly.
    fn handle(&mut self, msg: Message) -> crate::Result<bool> {
        match msg {
            Message::Append { batch, reply } => {
                if self.close_ack.is_some()
                    || self.writer_tx.send(Request::Append { batch }).is_err()
                {
                    let _ = reply.send(Err(crate::Error::Closed));
                } else {
                    self.pending_appends.push_back(reply);
                }
            }

            Message::Sync { ack } => {
                if self.close_ack.is_some() || self.writer_tx.send(Request::Sync).is_err() {
                    let _ = ack.send(Err(crate::Error::Closed));
                } else {
                    self.pending_syncs.push_back(ack);
                }
            }

            Message::Close { ack } => {
                if self.close_ack.is_some() || self.writer_tx.send(Request::Shutdown).is_err() {
                    let _ = ack.send(Err(crate::Error::Closed));
                } else {
                    self.close_ack = Some(ack);
                }
            }

            Message::Writer(event) => return self.handle_event(event),
        }

        Ok(false)
    }

    fn handle_event(&mut self, event: Event) -> crate::Result<bool> {
        match event {
            Event::Rolled { segment_id } => {
                log::debug!("Rolled active segment, now writing segment {segment_id}");
            }

            Event::Appended {
                segment_id,
                first_id,
                offsets,
                total_sizes,
                digests,
            } => {
                let reply = self
                    .pending_appends
                    .pop_front()
                    .ok_or(crate::Error::InvariantViolation("commit event without a waiter"))?;

                let ids = (first_id..first_id + offsets.len() as u64).collect::<Vec<_>>();

                // All entries of a batch become visible atomically
                {
                    let mut index = self.index.write().expect("lock is poisoned");

                    let entries = ids.iter().zip(offsets).zip(total_sizes).zip(digests);

                    for (((&id, offset), total_size), digest) in entries {
                        index.insert(
                            id,
                            IndexEntry {
                                segment_id,
                                offset,
                                total_size,
                                digest,
                            },
                        );
                    }
                }

                let _ = reply.send(Ok(ids));
            }

            Event::AppendFailed { first_id, error } => {
                let reply = self
                    .pending_appends
                    .pop_front()
                    .ok_or(crate::Error::InvariantViolation("error event without a waiter"))?;

                log::error!("Append starting at record {first_id} failed: {error:?}");
                let _ = reply.send(Err(error));
            }

            Event::Synced(result) => {
                let ack = self
                    .pending_syncs
                    .pop_front()
                    .ok_or(crate::Error::InvariantViolation("sync event without a waiter"))?;

                let _ = ack.send(result);
            }

            Event::ShutdownComplete(result) => {
                let ack = self
                    .close_ack
                    .take()
                    .ok_or(crate::Error::InvariantViolation("unsolicited shutdown event"))?;

                let _ = ack.send(result);
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn fail_pending(&mut self) {
        for reply in self.pending_appends.drain(..) {
            let _ = reply.send(Err(crate::Error::InvariantViolation("crate terminated")));
        }
        for ack in self.pending_syncs.drain(..) {
            let _ = ack.send(Err(crate::Error::InvariantViolation("crate terminated")));
        }
        if let Some(ack) = self.close_ack.take() {
            let _ = ack.send(Err(crate::Error::InvariantViolation("crate terminated")));
        }
    }
}

fn spawn_tasks(
    index: Arc<RwLock<Index>>,
    writer: Writer,
) -> std::io::Result<(Sender<Message>, Vec<JoinHandle<()>>)> {
    let (mailbox_tx, mailbox_rx) = mpsc::channel::<Message>();
    let (writer_tx, writer_rx) = mpsc::channel::<Request>();

    let events = mailbox_tx.clone();
    let writer_handle = std::thread::Builder::new()
        .name("logcrate-writer".into())
        .spawn(move || writer.run(writer_rx, events))?;

    let coordinator = Coordinator {
        writer_tx,
        index,
        pending_appends: VecDeque::new(),
        pending_syncs: VecDeque::new(),
        close_ack: None,
    };
    let coordinator_handle = std::thread::Builder::new()
        .name("logcrate-coordinator".into())
        .spawn(move || coordinator.run(mailbox_rx))?;

    Ok((mailbox_tx, vec![writer_handle, coordinator_handle]))
}

/// Rebuilds the index by scanning every segment file in ascending order.
///
/// Returns the index together with the writer reopened at the tail of the
/// final segment and the next record id to assign.
fn recover(folder: &Path) -> crate::Result<(Index, segment::writer::Writer, RecordId)> {
    let mut names = Vec::new();

    for dirent in std::fs::read_dir(folder)? {
        let dirent = dirent?;

        // IMPORTANT: Skip .DS_Store files when using MacOS
        if dirent.file_name() == ".DS_Store" {
            continue;
        }

        let Some(name) = dirent.file_name().to_str().map(String::from) else {
            return Err(crate::Error::CorruptHeader("unexpected file in crate directory"));
        };
        names.push(name);
    }

    if names.is_empty() {
        return Err(crate::Error::DirectoryMissing);
    }

    // Fixed-width hex file names: lexicographic order is segment id order
    names.sort();

    let mut index = Index::default();
    let mut tail: Option<(Scanner, SegmentId, RecordId, PathBuf)> = None;

    for name in &names {
        let Some(segment_id) = segment::parse_file_name(name) else {
            return Err(crate::Error::CorruptHeader("unexpected file in crate directory"));
        };

        log::trace!("Recovering segment {segment_id}");

        let path = folder.join(name);
        let mut scanner = Scanner::new(&path)?;

        if scanner.header().segment_id != segment_id {
            return Err(crate::Error::CorruptHeader("segment id disagrees with file name"));
        }

        // The segment id doubles as the id of its first record
        let mut next_in_segment = segment_id;

        for item in scanner.by_ref() {
            let (offset, header) = item?;

            index.insert(
                next_in_segment,
                IndexEntry {
                    segment_id,
                    offset,
                    total_size: header.total_size(),
                    digest: header.digest,
                },
            );
            next_in_segment += 1;
        }

        tail = Some((scanner, segment_id, next_in_segment, path));
    }

    let (scanner, segment_id, next_id, path) = tail.expect("should have scanned at least one segment");

    if scanner.is_truncated() {
        log::warn!(
            "Trimming partially written tail of segment {segment_id} at byte {}",
            scanner.valid_end()
        );

        let file = OpenOptions::new().write(true).open(&path)?;
        file.set_len(scanner.valid_end())?;
        file.sync_all()?;
    }

    log::debug!(
        "Recovered {} records across {} segments",
        index.len(),
        names.len()
    );

    let writer = segment::writer::Writer::open_at(
        &path,
        segment_id,
        scanner.valid_end(),
        next_id - segment_id,
    )?;

    Ok((index, writer, next_id))
}

/// An embeddable append-only log of digest-stamped records
///
/// Cheaply cloneable handle; all clones drive the same coordinator.
#[derive(Clone)]
pub struct LogCrate(Arc<LogCrateInner>);

impl std::ops::Deref for LogCrate {
    type Target = LogCrateInner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[allow(clippy::module_name_repetitions)]
#[doc(hidden)]
pub struct LogCrateInner {
    /// Unique log crate ID
    id: LogCrateId,

    /// Base folder
    pub path: PathBuf,

    /// Crate configuration
    config: Config,

    /// Record id -> position mapping; written by the coordinator,
    /// read by everyone
    index: Arc<RwLock<Index>>,

    /// Coordinator mailbox
    mailbox: Sender<Message>,

    /// Writer and coordinator tasks, joined on close
    threads: Mutex<Vec<JoinHandle<()>>>,
}

fn close_tasks(mailbox: &Sender<Message>, threads: &Mutex<Vec<JoinHandle<()>>>) -> crate::Result<()> {
    let mut threads = threads.lock().expect("lock is poisoned");

    if threads.is_empty() {
        return Ok(());
    }

    let (ack_tx, ack_rx) = mpsc::sync_channel(1);

    let result = match mailbox.send(Message::Close { ack: ack_tx }) {
        Ok(()) => ack_rx.recv().unwrap_or(Err(crate::Error::Closed)),
        Err(_) => Err(crate::Error::Closed),
    };

    for handle in threads.drain(..) {
        let _ = handle.join();
    }

    result
}

impl Drop for LogCrateInner {
    fn drop(&mut self) {
        if let Err(e) = close_tasks(&self.mailbox, &self.threads) {
            log::warn!("Error while closing log crate at {:?}: {e:?}", self.path);
        }
    }
}

impl LogCrate {
    /// Creates a new, empty crate directory.
    ///
    /// # Errors
    ///
    /// Will return `Err(DirectoryExists)` if the target path already exists,
    /// or `Err` if an IO error occurs.
    pub fn create<P: AsRef<Path>>(path: P, config: Config) -> crate::Result<Self> {
        let path = absolute_path(path.as_ref());
        log::trace!("Creating log crate at {}", path.display());

        if path.try_exists()? {
            return Err(crate::Error::DirectoryExists);
        }

        std::fs::create_dir_all(&path)?;

        #[cfg(not(target_os = "windows"))]
        {
            // fsync folders on Unix

            let folder = std::fs::File::open(&path)?;
            folder.sync_all()?;

            if let Some(parent) = path.parent() {
                let folder = std::fs::File::open(parent)?;
                folder.sync_all()?;
            }
        }

        let index = Arc::new(RwLock::new(Index::default()));

        // The first append rolls the first segment into existence
        let writer = Writer::new(path.clone(), config.segment_max_size, None, 0);
        let (mailbox, threads) = spawn_tasks(index.clone(), writer)?;

        Ok(Self(Arc::new(LogCrateInner {
            id: get_next_crate_id(),
            path,
            config,
            index,
            mailbox,
            threads: Mutex::new(threads),
        })))
    }

    /// Opens a previously created crate, rebuilding the index from its
    /// segment files.
    ///
    /// A partially written record at the tail of the final segment is
    /// trimmed; the next append continues at the id after the last fully
    /// written record.
    ///
    /// # Errors
    ///
    /// Will return `Err(DirectoryMissing)` if the path is not a previously
    /// created crate, `Err(CorruptHeader)` / `Err(InvalidVersion)` if a
    /// segment header does not validate, or `Err` if an IO error occurs.
    pub fn open<P: AsRef<Path>>(path: P, config: Config) -> crate::Result<Self> {
        let path = absolute_path(path.as_ref());
        log::info!("Recovering log crate at {}", path.display());

        if !path.try_exists()? {
            return Err(crate::Error::DirectoryMissing);
        }

        let (index, active, next_id) = recover(&path)?;

        let index = Arc::new(RwLock::new(index));
        let writer = Writer::new(path.clone(), config.segment_max_size, Some(active), next_id);
        let (mailbox, threads) = spawn_tasks(index.clone(), writer)?;

        Ok(Self(Arc::new(LogCrateInner {
            id: get_next_crate_id(),
            path,
            config,
            index,
            mailbox,
            threads: Mutex::new(threads),
        })))
    }

    /// Flushes the active segment durably and stops the writer and
    /// coordinator tasks.
    ///
    /// Appends enqueued before the close complete first; appends and syncs
    /// issued afterwards fail with [`crate::Error::Closed`]. Reads keep
    /// working on a closed handle, as the index outlives the tasks.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    pub fn close(&self) -> crate::Result<()> {
        close_tasks(&self.mailbox, &self.threads)
    }

    /// Durably flushes the active segment.
    ///
    /// Appends are committed once handed to the operating system; between
    /// syncs and segment rolls, the crash window is the OS page cache.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    pub fn sync(&self) -> crate::Result<()> {
        let (ack_tx, ack_rx) = mpsc::sync_channel(1);

        self.mailbox
            .send(Message::Sync { ack: ack_tx })
            .map_err(|_| crate::Error::Closed)?;

        ack_rx.recv().map_err(|_| crate::Error::Closed)?
    }

    /// Appends one record, returning its assigned id.
    ///
    /// The digest is an opaque 20-byte content fingerprint; the crate
    /// round-trips it and verifies it on read, but never computes it.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    pub fn append<P: Into<Slice>>(&self, digest: Digest, payload: P) -> crate::Result<RecordId> {
        let ids = self.append_batch(vec![(digest, payload.into())])?;

        ids.first()
            .copied()
            .ok_or(crate::Error::InvariantViolation("single append committed no id"))
    }

    /// Appends a batch of records atomically, returning their assigned ids
    /// in input order.
    ///
    /// The whole batch lands in one segment with one contiguous write; a
    /// batch larger than the configured segment size still goes whole into
    /// a fresh segment.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    pub fn append_batch(&self, batch: Vec<(Digest, Slice)>) -> crate::Result<Vec<RecordId>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let (reply_tx, reply_rx) = mpsc::sync_channel(1);

        self.mailbox
            .send(Message::Append {
                batch,
                reply: reply_tx,
            })
            .map_err(|_| crate::Error::Closed)?;

        reply_rx.recv().map_err(|_| crate::Error::Closed)?
    }

    /// Reads one record.
    ///
    /// Returns `Ok(None)` if the id is not (or no longer) live; that is a
    /// normal result, not an error.
    ///
    /// # Errors
    ///
    /// Will return `Err(CorruptRecord)` if the stored record disagrees with
    /// the index, or `Err` if an IO error occurs.
    pub fn read(&self, id: RecordId) -> crate::Result<Option<(Digest, Slice)>> {
        let Some(entry) = self
            .index
            .read()
            .expect("lock is poisoned")
            .get(id)
            .cloned()
        else {
            return Ok(None);
        };

        if let Some(payload) = self.config.record_cache.get(self.id, id) {
            return Ok(Some((entry.digest, payload)));
        }

        let path = self.path.join(segment::file_name(entry.segment_id));
        let mut reader = Reader::new(path)?;
        let (digest, payload) = reader.read_record(id, &entry)?;

        self.config
            .record_cache
            .insert((self.id, id).into(), payload.clone());

        Ok(Some((digest, payload)))
    }

    /// Reads a run of consecutive records starting at `start_id`, greedily
    /// admitting whole records while their payload bytes fit into
    /// `max_bytes`.
    ///
    /// The walk stops at the first record that would overflow the budget
    /// (later, smaller records are not considered). Returns `Ok(None)` if
    /// `start_id` itself is not live, and `Ok(Some(vec![]))` if the first
    /// record alone is over budget.
    ///
    /// Records spanning multiple segments are fetched by one reader per
    /// segment, running in parallel; the returned list is in ascending id
    /// order regardless of which reader finishes first.
    ///
    /// # Errors
    ///
    /// Will return `Err(CorruptRecord)` if a stored record disagrees with
    /// the index, or `Err` if an IO error occurs.
    pub fn read_batch(
        &self,
        start_id: RecordId,
        max_bytes: u64,
    ) -> crate::Result<Option<Vec<(Digest, Slice)>>> {
        let plans = {
            let index = self.index.read().expect("lock is poisoned");

            if index.get(start_id).is_none() {
                return Ok(None);
            }

            let mut remaining = max_bytes;
            let mut plans: Vec<(SegmentId, Vec<(RecordId, IndexEntry)>)> = Vec::new();

            for (id, entry) in index.range_from(start_id) {
                let payload_size = u64::from(entry.payload_size());

                if payload_size > remaining {
                    break;
                }
                remaining -= payload_size;

                match plans.last_mut() {
                    Some((segment_id, entries)) if *segment_id == entry.segment_id => {
                        entries.push((id, entry.clone()));
                    }
                    _ => plans.push((entry.segment_id, vec![(id, entry.clone())])),
                }
            }

            plans
        };

        if plans.is_empty() {
            return Ok(Some(Vec::new()));
        }

        // One reader per segment; plans are in ascending segment order and
        // entries in ascending offset order, so concatenating the joined
        // results preserves record order.
        let per_segment = std::thread::scope(|scope| {
            let handles = plans
                .iter()
                .map(|(segment_id, entries)| {
                    let path = self.path.join(segment::file_name(*segment_id));

                    scope.spawn(move || -> crate::Result<Vec<(Digest, Slice)>> {
                        let mut reader = Reader::new(path)?;
                        let mut records = Vec::with_capacity(entries.len());

                        for (id, entry) in entries {
                            records.push(reader.read_record(*id, entry)?);
                        }

                        Ok(records)
                    })
                })
                .collect::<Vec<_>>();

            handles
                .into_iter()
                .map(|handle| handle.join().expect("reader should not panic"))
                .collect::<crate::Result<Vec<_>>>()
        })?;

        Ok(Some(per_segment.into_iter().flatten().collect()))
    }

    /// Returns the smallest and largest live record id, or `None` if the
    /// crate holds no records.
    #[must_use]
    pub fn range(&self) -> Option<(RecordId, RecordId)> {
        self.index.read().expect("lock is poisoned").range()
    }

    /// Returns the number of live records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.read().expect("lock is poisoned").len()
    }

    /// Returns `true` if the crate holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.read().expect("lock is poisoned").is_empty()
    }

    /// Counts the segment files in the crate directory.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    pub fn segment_count(&self) -> crate::Result<usize> {
        let mut count = 0;

        for dirent in std::fs::read_dir(&self.path)? {
            let dirent = dirent?;
            let name = dirent.file_name();

            if name.to_str().and_then(segment::parse_file_name).is_some() {
                count += 1;
            }
        }

        Ok(count)
    }
}
