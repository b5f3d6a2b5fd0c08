//! In-memory [`DirectoryQuery`] for exercising enumeration logic without
//! touching a disk: deterministic listings, injected failures, and a live
//! count of open handles.

use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::native::{BatchStatus, DirectoryQuery};
use super::record::{BatchWriter, RawRecord};
use super::types::FileAttributes;

#[derive(Debug, Clone)]
struct MemoryEntry {
    name: String,
    attributes: FileAttributes,
    size: u64,
}

#[derive(Debug, Default)]
struct HandleCounter {
    open: AtomicUsize,
    opened_total: AtomicUsize,
}

/// A synthetic directory tree. Cloning shares the handle counters, so a
/// test can keep a clone to check after the enumerator is gone.
#[derive(Debug, Clone, Default)]
pub struct MemoryTree {
    dirs: BTreeMap<PathBuf, Vec<MemoryEntry>>,
    open_failures: HashMap<PathBuf, io::ErrorKind>,
    query_failures: HashMap<PathBuf, io::ErrorKind>,
    handles: Arc<HandleCounter>,
}

/// Handle issued by [`MemoryTree`].
#[derive(Debug)]
pub struct MemoryHandle {
    path: PathBuf,
    next_index: usize,
    specials_emitted: u8,
}

impl MemoryTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a directory (and any missing ancestors).
    pub fn dir(mut self, path: impl AsRef<Path>) -> Self {
        self.add(path.as_ref(), FileAttributes::DIRECTORY, 0);
        self
    }

    /// Add a file of `size` bytes (and any missing ancestors).
    pub fn file(mut self, path: impl AsRef<Path>, size: u64) -> Self {
        self.add(path.as_ref(), FileAttributes::NORMAL, size);
        self
    }

    /// Add an entry with explicit attributes.
    pub fn entry(mut self, path: impl AsRef<Path>, attributes: FileAttributes, size: u64) -> Self {
        self.add(path.as_ref(), attributes, size);
        self
    }

    /// Make opening `path` fail with `kind`.
    pub fn fail_open(mut self, path: impl AsRef<Path>, kind: io::ErrorKind) -> Self {
        self.open_failures.insert(path.as_ref().to_path_buf(), kind);
        self
    }

    /// Make every batch query on `path` fail with `kind`.
    pub fn fail_query(mut self, path: impl AsRef<Path>, kind: io::ErrorKind) -> Self {
        self.query_failures.insert(path.as_ref().to_path_buf(), kind);
        self
    }

    /// Handles opened and not yet closed.
    pub fn open_handles(&self) -> usize {
        self.handles.open.load(Ordering::SeqCst)
    }

    /// Handles ever opened.
    pub fn opened_total(&self) -> usize {
        self.handles.opened_total.load(Ordering::SeqCst)
    }

    fn add(&mut self, path: &Path, attributes: FileAttributes, size: u64) {
        if attributes.contains(FileAttributes::DIRECTORY) {
            self.dirs.entry(path.to_path_buf()).or_default();
        }

        let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
            return;
        };
        if parent.as_os_str().is_empty() {
            return;
        }
        self.add_parent(parent);

        let entries = self.dirs.entry(parent.to_path_buf()).or_default();
        let name = name.to_string_lossy().into_owned();
        if !entries.iter().any(|e| e.name == name) {
            entries.push(MemoryEntry {
                name,
                attributes,
                size,
            });
        }
    }

    fn add_parent(&mut self, parent: &Path) {
        if !self.dirs.contains_key(parent) {
            self.add(parent, FileAttributes::DIRECTORY, 0);
        }
    }
}

impl DirectoryQuery for MemoryTree {
    type Handle = MemoryHandle;

    fn open_directory(&self, _parent: Option<&MemoryHandle>, path: &Path) -> io::Result<MemoryHandle> {
        if let Some(kind) = self.open_failures.get(path) {
            return Err(io::Error::from(*kind));
        }
        if !self.dirs.contains_key(path) {
            return Err(io::Error::from(io::ErrorKind::NotFound));
        }

        self.handles.open.fetch_add(1, Ordering::SeqCst);
        self.handles.opened_total.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryHandle {
            path: path.to_path_buf(),
            next_index: 0,
            specials_emitted: 0,
        })
    }

    fn query_next_batch(&self, handle: &mut MemoryHandle, buffer: &mut [u8]) -> io::Result<BatchStatus> {
        if let Some(kind) = self.query_failures.get(&handle.path) {
            return Err(io::Error::from(*kind));
        }
        let entries = self
            .dirs
            .get(&handle.path)
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))?;

        let mut writer = BatchWriter::new(buffer);

        while handle.specials_emitted < 2 {
            let name: &[u8] = if handle.specials_emitted == 0 { b"." } else { b".." };
            if !writer.push(&RawRecord::new(name, FileAttributes::DIRECTORY, 0)) {
                if writer.is_empty() {
                    return Err(record_too_large(&handle.path, name));
                }
                return finish_batch(&writer);
            }
            handle.specials_emitted += 1;
        }

        while let Some(entry) = entries.get(handle.next_index) {
            let record = RawRecord::new(entry.name.as_bytes(), entry.attributes, entry.size);
            if !writer.push(&record) {
                if writer.is_empty() {
                    return Err(record_too_large(&handle.path, entry.name.as_bytes()));
                }
                break;
            }
            handle.next_index += 1;
        }

        finish_batch(&writer)
    }

    fn close_directory(&self, handle: MemoryHandle) {
        self.handles.open.fetch_sub(1, Ordering::SeqCst);
        drop(handle);
    }
}

fn record_too_large(dir: &Path, name: &[u8]) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!(
            "batch buffer cannot hold the record for {:?} in {}",
            String::from_utf8_lossy(name),
            dir.display()
        ),
    )
}

fn finish_batch(writer: &BatchWriter<'_>) -> io::Result<BatchStatus> {
    if writer.is_empty() {
        Ok(BatchStatus::NoMoreEntries)
    } else {
        Ok(BatchStatus::Filled { len: writer.len() })
    }
}
