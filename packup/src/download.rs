//! Parallel batch HTTP(S) download implementation.
//!
//! Every entry carries an ordered list of source URLs, tried in order until one of
//! them produces a verified file. Bodies are streamed into a sibling `.tmp` file
//! that is atomically renamed over the target only after size and SHA-1
//! verification, so a target file is either untouched or equal to verified
//! content.

use std::collections::HashSet;
use std::io::{self, Seek, SeekFrom, Write};
use std::iter::FusedIterator;
use std::cmp::Ordering;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use std::mem;

use sha1::{Digest, Sha1};

use reqwest::{Client, StatusCode};

use tokio::io::AsyncWriteExt;
use tokio::fs::{self, File};
use tokio::task::JoinSet;
use tokio::sync::mpsc;

use crate::path::tmp_sibling;


/// A cooperative cancellation signal shared between the caller and the workers.
/// When requested, workers stop picking new entries, in-flight transfers abort
/// between two chunks and their temporary files are unlinked.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {

    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn cancel(&self) {
        self.flag.store(true, AtomicOrdering::Relaxed);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(AtomicOrdering::Relaxed)
    }

}

/// Category of a download entry, only used to report meaningful statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    /// An entry point JAR file, such as the game client.
    Jar,
    /// A library archive.
    Library,
    /// A single content-addressed asset object.
    Asset,
    /// The asset index document.
    Index,
    /// Any other metadata document.
    #[default]
    Meta,
}

/// Execution parameters of a batch: worker count, per-worker inter-request delay,
/// cancellation token and the shared set of completed targets that deduplicates
/// identical entries submitted twice.
#[derive(Debug, Clone)]
pub struct Pool {
    concurrency: usize,
    delay: Duration,
    cancel: CancelToken,
    completed: Arc<Mutex<HashSet<Box<Path>>>>,
}

impl Default for Pool {
    fn default() -> Self {
        Self::new(4)
    }
}

impl Pool {

    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
            delay: Duration::ZERO,
            cancel: CancelToken::new(),
            completed: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Delay applied by each worker before issuing a request, not globally.
    #[inline]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    #[inline]
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[inline]
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

}

/// A list of pending download that can be all downloaded at once.
#[derive(Debug)]
pub struct Batch {
    /// All entries to be downloaded.
    entries: Vec<Entry>,
}

impl Batch {

    /// Create a new empty download list.
    #[inline]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Return the total number of entries pushed into this download batch.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Return true if this batch has no entry.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert a new entry to be downloaded in this download batch, its sources are
    /// tried in order until one produces a verified file.
    pub fn push<S, I>(&mut self, sources: I, file: impl Into<Box<Path>>) -> &mut Entry
    where
        I: IntoIterator<Item = S>,
        S: Into<Box<str>>,
    {
        let sources = sources.into_iter().map(S::into).collect::<Box<[_]>>();
        assert!(!sources.is_empty(), "entry requires at least one source");
        self.entries.push(Entry::new(sources, file.into()));
        self.entries.last_mut().unwrap()
    }

    pub fn entry(&self, index: usize) -> &Entry {
        &self.entries[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }

    /// Download this whole batch with the given pool, the batch is cleared if
    /// returning ok. It's left untouched if it returns an error and no file is
    /// downloaded.
    ///
    /// This is internally starting an asynchronous Tokio runtime and block on it, so
    /// this function will just panic if launched inside another runtime!
    pub fn download(&mut self, pool: &Pool, mut handler: impl Handler) -> reqwest::Result<BatchResult> {
        let client = crate::http::client()?;
        let entries = mem::take(&mut self.entries);
        Ok(crate::http::block_on(download_many(client, &mut handler, pool, entries)))
    }

}

/// Represent the core information of an entry, its source URLs and the path where
/// it's downloaded. We put this in its own structure to ensure that these values
/// are always contiguous when the entry is split into its success or error state.
#[derive(Debug, Clone)]
struct EntryCore {
    /// The ordered, non-empty list of URLs to download the file from.
    sources: Box<[Box<str>]>,
    /// The file where the downloaded content is written.
    file: Box<Path>,
}

#[derive(Debug)]
pub struct Entry {
    /// Core information.
    core: EntryCore,
    /// Optional expected size of the file.
    expected_size: Option<u32>,
    /// Optional expected SHA-1 of the file.
    expected_sha1: Option<[u8; 20]>,
    /// Category of the entry.
    role: Role,
}

impl Entry {

    fn new(sources: Box<[Box<str>]>, file: Box<Path>) -> Self {
        Self {
            core: EntryCore {
                sources,
                file,
            },
            expected_size: None,
            expected_sha1: None,
            role: Role::default(),
        }
    }

    #[inline]
    pub fn sources(&self) -> &[Box<str>] {
        &self.core.sources
    }

    #[inline]
    pub fn file(&self) -> &Path {
        &self.core.file
    }

    #[inline]
    pub fn expected_size(&self) -> Option<u32> {
        self.expected_size
    }

    #[inline]
    pub fn set_expected_size(&mut self, size: Option<u32>) -> &mut Self {
        self.expected_size = size;
        self
    }

    #[inline]
    pub fn expected_sha1(&self) -> Option<&[u8; 20]> {
        self.expected_sha1.as_ref()
    }

    #[inline]
    pub fn set_expected_sha1(&mut self, sha1: Option<[u8; 20]>) -> &mut Self {
        self.expected_sha1 = sha1;
        self
    }

    #[inline]
    pub fn role(&self) -> Role {
        self.role
    }

    #[inline]
    pub fn set_role(&mut self, role: Role) -> &mut Self {
        self.role = role;
        self
    }

    /// Progress weight of this entry, proportional to its expected size, or one
    /// when the size is unknown.
    #[inline]
    fn weight(&self) -> u64 {
        self.expected_size.map(u64::from).unwrap_or(1)
    }

}

/// When a download batch has been downloaded, this returned completed batch
/// contains, for each entry, it's success or not.
#[derive(Debug)]
pub struct BatchResult {
    /// Each entry's result.
    entries: Box<[Result<EntrySuccess, EntryError>]>,
    /// The index of each entry that has an error.
    errors: Box<[usize]>,
}

impl BatchResult {

    /// Return the total number of entries pushed into this download batch.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Return true if this batch has no entry.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn entry(&self, index: usize) -> Result<&EntrySuccess, &EntryError> {
        self.entries[index].as_ref()
    }

    #[inline]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    #[inline]
    pub fn successes_count(&self) -> usize {
        self.entries.len() - self.errors.len()
    }

    #[inline]
    pub fn errors_count(&self) -> usize {
        self.errors.len()
    }

    pub fn iter_errors(&self) -> BatchResultErrorsIter<'_> {
        BatchResultErrorsIter {
            errors: self.errors.iter(),
            entries: &self.entries,
        }
    }

    /// Make this batch result into a result which will be an error if at least one
    /// entry has an error.
    pub fn into_result(self) -> Result<Self, Self> {
        if self.has_errors() {
            Err(self)
        } else {
            Ok(self)
        }
    }

    /// Consume this batch result and return its first errored entry, if any.
    pub fn into_first_error(self) -> Option<EntryError> {
        let index = *self.errors.first()?;
        self.entries.into_vec()
            .swap_remove(index)
            .err()
    }

}

/// Iterator over errored entries of a batch result.
#[derive(Debug)]
pub struct BatchResultErrorsIter<'a> {
    errors: std::slice::Iter<'a, usize>,
    entries: &'a [Result<EntrySuccess, EntryError>],
}

impl FusedIterator for BatchResultErrorsIter<'_> { }
impl ExactSizeIterator for BatchResultErrorsIter<'_> { }
impl<'a> Iterator for BatchResultErrorsIter<'a> {

    type Item = &'a EntryError;

    fn next(&mut self) -> Option<Self::Item> {
        let index = *self.errors.next()?;
        Some(self.entries[index].as_ref().unwrap_err())
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.errors.size_hint()
    }

}

/// State of a successfully downloaded entry.
#[derive(Debug)]
pub struct EntrySuccess {
    core: EntryCore,
    inner: EntrySuccessInner,
}

#[derive(Debug)]
struct EntrySuccessInner {
    /// The final size of the downloaded entry.
    size: u32,
    /// The final SHA-1 of the downloaded entry, unknown when the entry has been
    /// deduplicated against an identical one already completed.
    sha1: Option<[u8; 20]>,
    /// True when the entry has been skipped because the target file was already
    /// present and verified, or already completed by an identical entry.
    skipped: bool,
}

impl EntrySuccess {

    #[inline]
    pub fn file(&self) -> &Path {
        &self.core.file
    }

    #[inline]
    pub fn size(&self) -> u32 {
        self.inner.size
    }

    #[inline]
    pub fn sha1(&self) -> Option<&[u8; 20]> {
        self.inner.sha1.as_ref()
    }

    #[inline]
    pub fn skipped(&self) -> bool {
        self.inner.skipped
    }

}

/// State of an entry that failed to download, it also acts as a standard error
/// type carrying the last error observed after exhausting every source.
#[derive(thiserror::Error, Debug)]
#[error("{core:?}: {kind}")]
pub struct EntryError {
    core: EntryCore,
    kind: EntryErrorKind,
}

impl EntryError {

    #[inline]
    pub fn file(&self) -> &Path {
        &self.core.file
    }

    #[inline]
    pub fn kind(&self) -> &EntryErrorKind {
        &self.kind
    }

    /// Split this error into the target file and the error kind.
    #[inline]
    pub fn into_parts(self) -> (Box<Path>, EntryErrorKind) {
        (self.core.file, self.kind)
    }

}

/// An error for a single entry attempt.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum EntryErrorKind {
    /// Invalid size of the fully downloaded entry compared to the expected size.
    #[error("size mismatch")]
    SizeMismatch,
    /// Invalid SHA-1 of the fully downloaded entry compared to the expected SHA-1.
    #[error("hash mismatch")]
    HashMismatch,
    /// Invalid HTTP status code while requesting the entry.
    #[error("invalid status: {0}")]
    InvalidStatus(u16),
    /// The entry has been aborted by a cancellation request.
    #[error("cancelled")]
    Cancelled,
    /// A transport-level error from the HTTP client.
    #[error("network: {0}")]
    Network(#[source] reqwest::Error),
    /// An I/O error related to opening and writing local files.
    #[error("io: {0}")]
    Io(#[source] io::Error),
}

impl EntryErrorKind {

    /// Stable key for the locale collaborator to map this error to a user-facing
    /// message, distinct from the technical cause.
    pub fn locale_key(&self) -> &'static str {
        match self {
            EntryErrorKind::SizeMismatch => "error.download.size_mismatch",
            EntryErrorKind::HashMismatch => "error.download.hash_mismatch",
            EntryErrorKind::InvalidStatus(_) => "error.http.status",
            EntryErrorKind::Cancelled => "error.cancelled",
            EntryErrorKind::Network(_) => "error.http.network",
            EntryErrorKind::Io(_) => "error.io",
        }
    }

}

/// A handle for watching a batch download progress.
pub trait Handler {

    /// Notification of a download progress, the download should be considered done
    /// when 'count' is equal to 'total_count'. This is called anyway at the
    /// beginning and at the end of the download. Sizes are weights: the expected
    /// size of each entry, or one for entries of unknown size.
    fn handle_download_progress(&mut self, count: u32, total_count: u32, size: u64, total_size: u64) {
        let _ = (count, total_count, size, total_size);
    }

    fn as_download_dyn(&mut self) -> &mut dyn Handler
    where Self: Sized {
        self
    }

}

/// Blanket implementation that does nothing.
impl Handler for () { }

impl<H: Handler + ?Sized> Handler for &'_ mut H {
    fn handle_download_progress(&mut self, count: u32, total_count: u32, size: u64, total_size: u64) {
        (*self).handle_download_progress(count, total_count, size, total_size)
    }
}

/// Internal split of the download function without reqwest initialization error.
async fn download_many(
    client: Client,
    handler: &mut dyn Handler,
    pool: &Pool,
    entries: Vec<Entry>,
) -> BatchResult {

    // Make it constant and sharable between all tasks.
    let entries = Arc::new(entries);

    // Collect the index of each pending entry. We do this to avoid loosing the
    // original entries order.
    let mut indices = (0..entries.len()).collect::<Vec<_>>();

    // Sort our entries in order to download big files first, this is allowing
    // better parallelization at start and avoid too much blocking at the end.
    // Because our indices vector will pop the first index from the end, we put big
    // files at the end, and so sort by ascending size.
    indices.sort_by(|&a_index, &b_index| {
        match (entries[a_index].expected_size, entries[b_index].expected_size) {
            (Some(a), Some(b)) => Ord::cmp(&a, &b),
            _ => Ordering::Equal,
        }
    });

    // Current downloaded weight and total weight.
    let mut size = 0u64;
    let total_size = entries.iter()
        .map(|entry| entry.weight())
        .sum::<u64>();

    // Send a progress update for each 1000 parts of the download.
    let progress_size_interval = total_size / 1000;
    let mut last_size = 0u64;

    handler.handle_download_progress(0, entries.len() as u32, size, total_size);

    let mut completed = 0;
    let mut futures = JoinSet::new();

    let (
        progress_tx,
        mut progress_rx,
    ) = mpsc::channel(pool.concurrency * 2);

    let mut results = (0..entries.len()).map(|_| None).collect::<Vec<_>>();

    // If we have theoretically completed all downloads, we still wait for joining
    // all remaining futures in the join set.
    while completed < entries.len() || !futures.is_empty() {

        // On cancellation, entries that have not been issued yet fail immediately,
        // in-flight ones notice the token on their own.
        if pool.cancel.is_cancelled() && !indices.is_empty() {
            for index in indices.drain(..) {
                let prev_res = results[index].replace(Err(EntryErrorKind::Cancelled));
                debug_assert!(prev_res.is_none());
                completed += 1;
            }
        }

        while futures.len() < pool.concurrency && !indices.is_empty() {
            futures.spawn(download_many_entry(
                client.clone(),
                Arc::clone(&entries),
                indices.pop().unwrap(),  // Safe because not empty.
                pool.clone(),
                progress_tx.clone()));
        }

        if completed >= entries.len() && futures.is_empty() {
            break;
        }

        let mut force_progress = false;

        tokio::select! {
            Some(res) = futures.join_next() => {
                let (index, res) = res.expect("task should not be cancelled nor panicking");
                completed += 1;
                force_progress = true;
                let prev_res = results[index].replace(res);
                debug_assert!(prev_res.is_none());
            }
            Some(delta) = progress_rx.recv() => {
                size = size.saturating_add_signed(delta);
            }
            else => {
                // Just ignore, because it's invalid state, in case of join_next we
                // ignore if JoinSet is empty because we rely mostly on 'completed'.
                // For the queue receive, we know that the other end will never be
                // fully closed because we locally own both 'tx' and 'rx'.
                continue;
            }
        };

        if force_progress || size - last_size >= progress_size_interval {
            handler.handle_download_progress(completed as u32, entries.len() as u32, size, total_size);
            last_size = size;
        }

    }

    // Ensure that all tasks are aborted, this allows us to take back ownership of
    // the underlying vector of entries.
    assert!(futures.is_empty());

    // Now that every task has terminated we should be able to take back the entries.
    let entries = Arc::into_inner(entries).unwrap();
    let mut ret_entries = Vec::with_capacity(entries.len());
    let mut ret_errors = Vec::new();

    for (entry, res) in entries.into_iter().zip(results) {
        let res = res.expect("all entries should have a result");
        if res.is_err() {
            ret_errors.push(ret_entries.len());
        }
        ret_entries.push(match res {
            Ok(inner) => Ok(EntrySuccess { core: entry.core, inner }),
            Err(kind) => Err(EntryError { core: entry.core, kind }),
        });
    }

    BatchResult {
        entries: ret_entries.into_boxed_slice(),
        errors: ret_errors.into_boxed_slice(),
    }

}

/// Download entrypoint for a download, this is a wrapper around the core download
/// function in order to easily catch the result and associate it to its index.
async fn download_many_entry(
    client: Client,
    entries: Arc<Vec<Entry>>,
    index: usize,
    pool: Pool,
    progress_tx: mpsc::Sender<i64>,
) -> (usize, Result<EntrySuccessInner, EntryErrorKind>) {

    // Inter-request throttle, applied at issue time per worker, not globally.
    if !pool.delay.is_zero() {
        tokio::time::sleep(pool.delay).await;
    }

    (index, download_entry(client, &entries[index], &pool, progress_tx).await)

}

/// Internal function to download a single entry, trying its sources in order.
async fn download_entry(
    client: Client,
    entry: &Entry,
    pool: &Pool,
    progress_tx: mpsc::Sender<i64>,
) -> Result<EntrySuccessInner, EntryErrorKind> {

    // An identical entry may have been submitted and completed twice, the shared
    // set of completed targets deduplicates it. The guard must not be held across
    // the progress await point.
    let already_completed = pool.completed.lock().unwrap().contains(&entry.core.file);
    if already_completed {
        let _ = progress_tx.send(entry.weight() as i64).await;
        return Ok(EntrySuccessInner {
            size: entry.expected_size.unwrap_or(0),
            sha1: None,
            skipped: true,
        });
    }

    // If the target file already exists with the expected hash, nothing to do.
    if let Some(expected_sha1) = entry.expected_sha1.as_ref() {
        match check_file(&entry.core.file, entry.expected_size, Some(expected_sha1)) {
            Ok(true) => {
                pool.completed.lock().unwrap().insert(entry.core.file.clone());
                let _ = progress_tx.send(entry.weight() as i64).await;
                return Ok(EntrySuccessInner {
                    size: entry.expected_size.unwrap_or(0),
                    sha1: Some(*expected_sha1),
                    skipped: true,
                });
            }
            Ok(false) => (),
            Err(e) => return Err(EntryErrorKind::Io(e)),
        }
    }

    // Create any parent directory so that we can create the temporary file.
    if let Some(parent) = entry.core.file.parent() {
        fs::create_dir_all(parent).await.map_err(EntryErrorKind::Io)?;
    }

    let tmp_file = tmp_sibling(&entry.core.file);
    let mut last_error = None;

    for url in entry.core.sources.iter() {

        if pool.cancel.is_cancelled() {
            return Err(EntryErrorKind::Cancelled);
        }

        match download_entry_attempt(&client, entry, url, &tmp_file, pool, &progress_tx).await {
            Ok(inner) => {

                if let Err(e) = replace_file(&tmp_file, &entry.core.file).await {
                    let _ = fs::remove_file(&tmp_file).await;
                    return Err(EntryErrorKind::Io(e));
                }

                pool.completed.lock().unwrap().insert(entry.core.file.clone());
                return Ok(inner);

            }
            Err(kind) => {

                let _ = fs::remove_file(&tmp_file).await;

                if let EntryErrorKind::Cancelled = kind {
                    return Err(kind);
                }

                last_error = Some(kind);

            }
        }

    }

    // Safe because entries always have at least one source.
    Err(last_error.unwrap())

}

/// A single attempt of downloading an entry from one of its sources, streaming the
/// body into the temporary file and verifying size and SHA-1. Progress sent during
/// a failed attempt is reverted so that the next source starts from a clean state.
async fn download_entry_attempt(
    client: &Client,
    entry: &Entry,
    url: &str,
    tmp_file: &Path,
    pool: &Pool,
    progress_tx: &mpsc::Sender<i64>,
) -> Result<EntrySuccessInner, EntryErrorKind> {

    let mut sent = 0i64;

    let res = async {

        let mut res = client.get(url).send().await
            .map_err(EntryErrorKind::Network)?;

        if res.status() != StatusCode::OK {
            return Err(EntryErrorKind::InvalidStatus(res.status().as_u16()));
        }

        let mut dst = File::create(tmp_file).await
            .map_err(EntryErrorKind::Io)?;

        let mut size = 0usize;
        let mut sha1 = Sha1::new();
        let known_size = entry.expected_size.is_some();

        while let Some(chunk) = res.chunk().await.map_err(EntryErrorKind::Network)? {

            if pool.cancel.is_cancelled() {
                return Err(EntryErrorKind::Cancelled);
            }

            size += chunk.len();

            AsyncWriteExt::write_all(&mut dst, &chunk).await.map_err(EntryErrorKind::Io)?;
            Write::write_all(&mut sha1, &chunk).map_err(EntryErrorKind::Io)?;

            // Entries of unknown size weight one, sent on completion instead.
            if known_size {
                sent += chunk.len() as i64;
                let _ = progress_tx.send(chunk.len() as i64).await;
            }

        }

        // Ensure the file is fully written before hashing checks and rename.
        dst.flush().await.map_err(EntryErrorKind::Io)?;
        drop(dst);

        let size = u32::try_from(size).map_err(|_| EntryErrorKind::SizeMismatch)?;
        let sha1: [u8; 20] = sha1.finalize().into();

        if let Some(expected_size) = entry.expected_size {
            if expected_size != size {
                return Err(EntryErrorKind::SizeMismatch);
            }
        }

        if let Some(expected_sha1) = entry.expected_sha1.as_ref() {
            if expected_sha1 != &sha1 {
                return Err(EntryErrorKind::HashMismatch);
            }
        }

        if !known_size {
            sent += 1;
            let _ = progress_tx.send(1).await;
        }

        Ok(EntrySuccessInner {
            size,
            sha1: Some(sha1),
            skipped: false,
        })

    }.await;

    if res.is_err() && sent != 0 {
        let _ = progress_tx.send(-sent).await;
    }

    res

}

/// Atomically replace the target file by the temporary file. A plain rename
/// replaces on Unix, on other systems the existing target is removed first.
async fn replace_file(tmp_file: &Path, file: &Path) -> io::Result<()> {
    match fs::rename(tmp_file, file).await {
        Ok(()) => Ok(()),
        Err(_) => {
            let _ = fs::remove_file(file).await;
            fs::rename(tmp_file, file).await
        }
    }
}

/// Check if a file at a given path has the corresponding properties (size and/or
/// SHA-1), returning true if it is valid, so false is returned anyway if the file
/// doesn't exists.
pub(crate) fn check_file(
    file: &Path,
    size: Option<u32>,
    sha1: Option<&[u8; 20]>,
) -> io::Result<bool> {

    if let Some(sha1) = sha1 {
        // If we want to check SHA-1 we need to open the file and compute it...
        match std::fs::File::open(file) {
            Ok(mut reader) => {

                // If relevant, start by checking the actual size of the file.
                if let Some(size) = size {
                    let actual_size = reader.seek(SeekFrom::End(0))?;
                    if size as u64 != actual_size {
                        return Ok(false);
                    }
                    reader.seek(SeekFrom::Start(0))?;
                }

                // Only after we compute hash, reading in chunks through io::copy,
                // the whole file is never loaded in memory.
                let mut digest = Sha1::new();
                io::copy(&mut reader, &mut digest)?;
                if digest.finalize().as_slice() != sha1 {
                    return Ok(false);
                }

                Ok(true)

            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    } else {
        match (file.metadata(), size) {
            // File is existing and we want to check size...
            (Ok(metadata), Some(size)) => Ok(metadata.len() == size as u64),
            // File is existing but we don't have size to check, no need to download.
            (Ok(_metadata), None) => Ok(true),
            (Err(e), _) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            (Err(e), _) => Err(e),
        }
    }

}
