//! The enumeration cursor.
//!
//! An [`Enumerator`] owns one batch buffer, the handle of the directory it is
//! currently reading, and a FIFO queue of subdirectories that were opened
//! while their parent was being read. Every entry of a directory is produced
//! before any of its queued subdirectories is visited, and recursion never
//! grows the call stack.

use std::collections::VecDeque;
use std::io;
use std::iter::FusedIterator;
use std::path::{Path, PathBuf};

use super::error::EnumerationError;
use super::native::{BatchStatus, DirectoryQuery};
use super::record::{read_record, EntryView, RecordError};
use super::types::{EnumerationOptions, UNBOUNDED_DEPTH};

/// Turns the borrowed view of an accepted entry into an owned result.
pub type Transform<T> = Box<dyn FnMut(&EntryView<'_>) -> T + Send>;
/// Include / recurse decision for one entry.
pub type Predicate = Box<dyn FnMut(&EntryView<'_>) -> bool + Send>;
/// Called with the full path of every directory once it has been read.
pub type DirectoryHook = Box<dyn FnMut(&Path) + Send>;
/// Returns `true` to skip the failing directory and keep going.
pub type ErrorHook = Box<dyn FnMut(&EnumerationError) -> bool + Send>;

/// Counters kept while an enumeration runs.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EnumerationStats {
    pub directories_opened: usize,
    /// Directories abandoned because an open or query failure was suppressed.
    pub directories_skipped: usize,
    pub batches_read: usize,
    pub records_seen: usize,
    pub entries_yielded: usize,
}

struct OpenDirectory<H> {
    handle: H,
    path: PathBuf,
    remaining_depth: u32,
    is_root: bool,
}

#[derive(Debug, Clone, Copy)]
struct BatchCursor {
    filled: usize,
    offset: usize,
}

/// Lazy, pull-based walk over a directory tree.
///
/// Yields `Ok(T)` for every accepted entry. A fatal failure is yielded once
/// as `Err`, after which every handle is closed and the iterator is done.
/// Dropping the enumerator early closes the current handle and every queued
/// one.
pub struct Enumerator<Q: DirectoryQuery, T> {
    query: Q,
    options: EnumerationOptions,
    root: PathBuf,
    original_root: PathBuf,
    buffer: Vec<u8>,
    current: Option<OpenDirectory<Q::Handle>>,
    pending: VecDeque<OpenDirectory<Q::Handle>>,
    cursor: Option<BatchCursor>,
    transform: Transform<T>,
    should_include: Option<Predicate>,
    should_recurse: Option<Predicate>,
    on_directory_finished: Option<DirectoryHook>,
    continue_on_error: Option<ErrorHook>,
    finished: bool,
    stats: EnumerationStats,
}

impl<Q: DirectoryQuery, T> Enumerator<Q, T> {
    /// Validate `root`, allocate the batch buffer and open the root.
    ///
    /// Nothing is read yet. Any failure here is returned directly: an
    /// enumeration whose root cannot be opened never starts.
    pub fn new(
        query: Q,
        root: impl AsRef<Path>,
        options: EnumerationOptions,
        transform: impl FnMut(&EntryView<'_>) -> T + Send + 'static,
    ) -> Result<Self, EnumerationError> {
        let original_root = root.as_ref().to_path_buf();
        validate_root(&original_root)?;

        let root = std::path::absolute(&original_root)
            .map_err(|e| EnumerationError::from_io(&original_root, e))?;
        let buffer = allocate_buffer(options.effective_buffer_size())?;

        let handle = query
            .open_directory(None, &root)
            .map_err(|e| EnumerationError::from_io(&root, e))?;

        tracing::debug!(
            "Enumerating {} (buffer {} bytes, recurse: {})",
            root.display(),
            buffer.len(),
            options.recurse_subdirectories
        );

        let current = OpenDirectory {
            handle,
            path: root.clone(),
            remaining_depth: options.max_recursion_depth,
            is_root: true,
        };

        Ok(Self {
            query,
            options,
            root,
            original_root,
            buffer,
            current: Some(current),
            pending: VecDeque::new(),
            cursor: None,
            transform: Box::new(transform),
            should_include: None,
            should_recurse: None,
            on_directory_finished: None,
            continue_on_error: None,
            finished: false,
            stats: EnumerationStats {
                directories_opened: 1,
                ..EnumerationStats::default()
            },
        })
    }

    /// Only entries for which `predicate` returns `true` are transformed
    /// and yielded. Without one, everything is.
    pub fn with_include(
        mut self,
        predicate: impl FnMut(&EntryView<'_>) -> bool + Send + 'static,
    ) -> Self {
        self.should_include = Some(Box::new(predicate));
        self
    }

    /// Subdirectories are only descended into when `predicate` returns
    /// `true` (and recursion is enabled and depth remains).
    pub fn with_recurse(
        mut self,
        predicate: impl FnMut(&EntryView<'_>) -> bool + Send + 'static,
    ) -> Self {
        self.should_recurse = Some(Box::new(predicate));
        self
    }

    pub fn on_directory_finished(mut self, hook: impl FnMut(&Path) + Send + 'static) -> Self {
        self.on_directory_finished = Some(Box::new(hook));
        self
    }

    /// Consulted before `ignore_inaccessible` whenever a directory below the
    /// root fails to open or read.
    pub fn continue_on_error(
        mut self,
        hook: impl FnMut(&EnumerationError) -> bool + Send + 'static,
    ) -> Self {
        self.continue_on_error = Some(Box::new(hook));
        self
    }

    /// Absolute path of the root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Root as the caller passed it.
    pub fn original_root(&self) -> &Path {
        &self.original_root
    }

    pub fn options(&self) -> &EnumerationOptions {
        &self.options
    }

    pub fn stats(&self) -> EnumerationStats {
        self.stats
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Handles currently held: the active directory plus everything queued.
    pub fn open_handle_count(&self) -> usize {
        usize::from(self.current.is_some()) + self.pending.len()
    }

    /// Read the next batch of the current directory. `Ok(false)` means the
    /// directory is done, either exhausted or abandoned after a suppressed
    /// failure.
    fn fill_buffer(&mut self) -> Result<bool, EnumerationError> {
        let Some(dir) = self.current.as_mut() else {
            return Ok(false);
        };

        match self.query.query_next_batch(&mut dir.handle, &mut self.buffer) {
            Ok(BatchStatus::Filled { len }) if len > 0 => {
                self.cursor = Some(BatchCursor {
                    filled: len.min(self.buffer.len()),
                    offset: 0,
                });
                self.stats.batches_read += 1;
                Ok(true)
            }
            Ok(_) => Ok(false),
            Err(e) => {
                let err = EnumerationError::from_io(&dir.path, e);
                if !dir.is_root && recover(&mut self.continue_on_error, &self.options, &err) {
                    tracing::warn!("Skipping rest of {}: {}", dir.path.display(), err);
                    self.stats.directories_skipped += 1;
                    Ok(false)
                } else {
                    Err(err)
                }
            }
        }
    }

    /// Process one record of the current batch. `Ok(None)` when the record
    /// was filtered out.
    fn advance_record(&mut self) -> Result<Option<T>, EnumerationError> {
        let (Some(cursor), Some(dir)) = (self.cursor, self.current.as_ref()) else {
            return Ok(None);
        };

        let record = read_record(&self.buffer[..cursor.filled], cursor.offset)
            .map_err(|e| corrupt_batch(&dir.path, e))?;
        self.cursor = record.next.map(|offset| BatchCursor { offset, ..cursor });
        self.stats.records_seen += 1;

        let view = EntryView::new(&record, &dir.path, &self.root, &self.original_root);

        if view.attributes().intersects(self.options.attributes_to_skip) {
            return Ok(None);
        }

        if view.is_directory() {
            if view.is_special_directory() {
                if !self.options.return_special_directories {
                    return Ok(None);
                }
            } else if self.options.recurse_subdirectories && dir.remaining_depth > 0 {
                let recurse = match self.should_recurse.as_mut() {
                    Some(predicate) => predicate(&view),
                    None => true,
                };
                if recurse {
                    let child = view.to_full_path();
                    match self.query.open_directory(Some(&dir.handle), &child) {
                        Ok(handle) => {
                            tracing::trace!("Queued {}", child.display());
                            self.stats.directories_opened += 1;
                            self.pending.push_back(OpenDirectory {
                                handle,
                                path: child,
                                remaining_depth: child_depth(dir.remaining_depth),
                                is_root: false,
                            });
                        }
                        Err(e) => {
                            let err = EnumerationError::from_io(&child, e);
                            if !recover(&mut self.continue_on_error, &self.options, &err) {
                                return Err(err);
                            }
                            tracing::warn!("Skipping {}: {}", child.display(), err);
                            self.stats.directories_skipped += 1;
                        }
                    }
                }
            }
        }

        let include = match self.should_include.as_mut() {
            Some(predicate) => predicate(&view),
            None => true,
        };
        if !include {
            return Ok(None);
        }

        self.stats.entries_yielded += 1;
        Ok(Some((self.transform)(&view)))
    }

    fn finish_directory(&mut self) {
        self.cursor = None;
        let Some(dir) = self.current.take() else {
            return;
        };
        self.query.close_directory(dir.handle);
        tracing::trace!("Finished {}", dir.path.display());
        if let Some(hook) = self.on_directory_finished.as_mut() {
            hook(&dir.path);
        }
    }

    fn close_all(&mut self) {
        self.cursor = None;
        if let Some(dir) = self.current.take() {
            self.query.close_directory(dir.handle);
        }
        while let Some(dir) = self.pending.pop_front() {
            self.query.close_directory(dir.handle);
        }
    }

    fn complete(&mut self) {
        self.finished = true;
        self.buffer = Vec::new();
        tracing::debug!(
            "Enumeration of {} complete: {} directories, {} records, {} entries yielded",
            self.root.display(),
            self.stats.directories_opened,
            self.stats.records_seen,
            self.stats.entries_yielded
        );
    }

    fn abort(&mut self, err: EnumerationError) -> EnumerationError {
        tracing::warn!("Enumeration of {} aborted: {}", self.root.display(), err);
        self.close_all();
        self.finished = true;
        self.buffer = Vec::new();
        err
    }
}

impl<Q: DirectoryQuery, T> Iterator for Enumerator<Q, T> {
    type Item = Result<T, EnumerationError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.finished {
                return None;
            }

            if self.current.is_none() {
                match self.pending.pop_front() {
                    Some(next) => self.current = Some(next),
                    None => {
                        self.complete();
                        return None;
                    }
                }
            }

            if self.cursor.is_none() {
                match self.fill_buffer() {
                    Ok(true) => {}
                    Ok(false) => {
                        self.finish_directory();
                        continue;
                    }
                    Err(err) => return Some(Err(self.abort(err))),
                }
            }

            match self.advance_record() {
                Ok(Some(item)) => return Some(Ok(item)),
                Ok(None) => {}
                Err(err) => return Some(Err(self.abort(err))),
            }
        }
    }
}

impl<Q: DirectoryQuery, T> FusedIterator for Enumerator<Q, T> {}

impl<Q: DirectoryQuery, T> Drop for Enumerator<Q, T> {
    fn drop(&mut self) {
        self.close_all();
    }
}

impl<Q: DirectoryQuery, T> std::fmt::Debug for Enumerator<Q, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Enumerator")
            .field("root", &self.root)
            .field("options", &self.options)
            .field("open_handles", &self.open_handle_count())
            .field("finished", &self.finished)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

/// Hook first; when it declines or is absent, `ignore_inaccessible` covers
/// `NotFound` and `AccessDenied`.
fn recover(
    hook: &mut Option<ErrorHook>,
    options: &EnumerationOptions,
    err: &EnumerationError,
) -> bool {
    if let Some(hook) = hook.as_mut() {
        if hook(err) {
            return true;
        }
    }
    options.ignore_inaccessible && err.is_inaccessible()
}

fn child_depth(remaining: u32) -> u32 {
    if remaining == UNBOUNDED_DEPTH {
        UNBOUNDED_DEPTH
    } else {
        remaining - 1
    }
}

fn validate_root(root: &Path) -> Result<(), EnumerationError> {
    let bytes = root.as_os_str().as_encoded_bytes();
    if bytes.is_empty() {
        return Err(EnumerationError::invalid_argument("root path is empty"));
    }
    if bytes.contains(&0) {
        return Err(EnumerationError::invalid_argument(format!(
            "root path {:?} contains a NUL character",
            root
        )));
    }
    Ok(())
}

fn allocate_buffer(size: usize) -> Result<Vec<u8>, EnumerationError> {
    // Record links are u32 offsets.
    if u32::try_from(size).is_err() {
        return Err(EnumerationError::invalid_argument(format!(
            "buffer size {size} is too large"
        )));
    }
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(size)
        .map_err(|_| EnumerationError::OutOfMemory { size })?;
    buffer.resize(size, 0);
    Ok(buffer)
}

fn corrupt_batch(path: &Path, err: RecordError) -> EnumerationError {
    EnumerationError::Os {
        path: path.to_path_buf(),
        code: None,
        source: io::Error::new(io::ErrorKind::InvalidData, err),
    }
}
