//! The directory-query layer the enumerator drives, and a portable
//! implementation of it on top of `std::fs`.

use std::ffi::OsStr;
use std::fs::{self, Metadata, ReadDir};
use std::io;
use std::path::{Path, PathBuf};

use super::record::{encode_name, BatchWriter, RawRecord};
use super::types::FileAttributes;

/// Outcome of one batch query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    /// `len` bytes of linked records were written at the start of the buffer.
    Filled { len: usize },
    /// The directory has nothing left to report.
    NoMoreEntries,
}

/// Minimal contract the enumerator needs from the platform.
///
/// Handles are moved into [`close_directory`](Self::close_directory), so the
/// type system guarantees each one is closed at most once; the enumerator
/// guarantees it is closed at least once.
pub trait DirectoryQuery {
    type Handle;

    /// Open `path` for enumeration. `parent` is the handle of the directory
    /// `path` was found in (`None` for the root), for implementations that
    /// can open relative to it.
    fn open_directory(&self, parent: Option<&Self::Handle>, path: &Path) -> io::Result<Self::Handle>;

    /// Fill `buffer` with the next batch of records for `handle`.
    ///
    /// On error nothing in `buffer` is meaningful.
    fn query_next_batch(&self, handle: &mut Self::Handle, buffer: &mut [u8]) -> io::Result<BatchStatus>;

    /// Release `handle`. Best-effort; failures are swallowed.
    fn close_directory(&self, handle: Self::Handle);
}

/// [`DirectoryQuery`] over `std::fs::read_dir`.
///
/// Reports `.` and `..` first, like a raw `readdir`. Symbolic links carry
/// `REPARSE_POINT`, plus `DIRECTORY` when their target is a directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdDirectoryQuery;

/// Open directory stream for [`StdDirectoryQuery`].
pub struct StdDirectoryHandle {
    path: PathBuf,
    entries: ReadDir,
    specials_emitted: u8,
    /// Record that did not fit in the previous batch.
    spill: Option<OwnedRecord>,
}

impl std::fmt::Debug for StdDirectoryHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdDirectoryHandle")
            .field("path", &self.path)
            .field("specials_emitted", &self.specials_emitted)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
struct OwnedRecord {
    name: Vec<u8>,
    attributes: FileAttributes,
    size: u64,
    metadata: Option<Metadata>,
}

impl OwnedRecord {
    fn as_raw(&self) -> RawRecord<'_> {
        let (created, accessed, modified) = match &self.metadata {
            Some(md) => (md.created().ok(), md.accessed().ok(), md.modified().ok()),
            None => (None, None, None),
        };
        RawRecord {
            name: &self.name,
            attributes: self.attributes,
            size: self.size,
            created,
            accessed,
            modified,
        }
    }
}

impl DirectoryQuery for StdDirectoryQuery {
    type Handle = StdDirectoryHandle;

    fn open_directory(&self, _parent: Option<&StdDirectoryHandle>, path: &Path) -> io::Result<StdDirectoryHandle> {
        let entries = fs::read_dir(path)?;
        Ok(StdDirectoryHandle {
            path: path.to_path_buf(),
            entries,
            specials_emitted: 0,
            spill: None,
        })
    }

    fn query_next_batch(&self, handle: &mut StdDirectoryHandle, buffer: &mut [u8]) -> io::Result<BatchStatus> {
        let mut writer = BatchWriter::new(buffer);

        if let Some(spilled) = handle.spill.take() {
            if !writer.push(&spilled.as_raw()) {
                return Err(record_too_large(&handle.path, &spilled.name));
            }
        }

        while handle.specials_emitted < 2 {
            let (name, target) = if handle.specials_emitted == 0 {
                (".", handle.path.clone())
            } else {
                ("..", handle.path.join(".."))
            };
            let record = special_record(name, &target);
            handle.specials_emitted += 1;
            if !writer.push(&record.as_raw()) {
                if writer.is_empty() {
                    return Err(record_too_large(&handle.path, &record.name));
                }
                handle.spill = Some(record);
                return Ok(BatchStatus::Filled { len: writer.len() });
            }
        }

        for entry in handle.entries.by_ref() {
            let entry = entry?;
            let Some(record) = entry_record(&entry)? else {
                continue;
            };
            if !writer.push(&record.as_raw()) {
                if writer.is_empty() {
                    return Err(record_too_large(&handle.path, &record.name));
                }
                handle.spill = Some(record);
                break;
            }
        }

        if writer.is_empty() {
            Ok(BatchStatus::NoMoreEntries)
        } else {
            Ok(BatchStatus::Filled { len: writer.len() })
        }
    }

    fn close_directory(&self, handle: StdDirectoryHandle) {
        // ReadDir closes its descriptor on drop and reports nothing.
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

fn special_record(name: &str, target: &Path) -> OwnedRecord {
    let metadata = fs::metadata(target).ok();
    let attributes = match &metadata {
        Some(md) => attributes_for(OsStr::new(name), md, false, true),
        None => FileAttributes::DIRECTORY,
    };
    OwnedRecord {
        name: name.as_bytes().to_vec(),
        attributes,
        size: 0,
        metadata,
    }
}

/// Build the record for one `read_dir` entry. `Ok(None)` when the entry
/// vanished between listing and stat.
fn entry_record(entry: &fs::DirEntry) -> io::Result<Option<OwnedRecord>> {
    let name = entry.file_name();
    let file_type = match entry.file_type() {
        Ok(ft) => ft,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    let is_symlink = file_type.is_symlink();
    let link_metadata = match entry.metadata() {
        Ok(md) => md,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    // A dangling link is reported as a plain file.
    let is_dir = if is_symlink {
        fs::metadata(entry.path()).map(|md| md.is_dir()).unwrap_or(false)
    } else {
        file_type.is_dir()
    };

    let attributes = attributes_for(&name, &link_metadata, is_symlink, is_dir);
    let size = if is_dir { 0 } else { link_metadata.len() };

    Ok(Some(OwnedRecord {
        name: encode_name(&name).into_owned(),
        attributes,
        size,
        metadata: Some(link_metadata),
    }))
}

#[cfg(windows)]
fn attributes_for(_name: &OsStr, metadata: &Metadata, is_symlink: bool, is_dir: bool) -> FileAttributes {
    use std::os::windows::fs::MetadataExt;

    let mut attrs = FileAttributes::from_bits_truncate(metadata.file_attributes());
    if is_symlink {
        attrs |= FileAttributes::REPARSE_POINT;
    }
    if is_dir {
        attrs |= FileAttributes::DIRECTORY;
    }
    attrs
}

#[cfg(not(windows))]
fn attributes_for(name: &OsStr, metadata: &Metadata, is_symlink: bool, is_dir: bool) -> FileAttributes {
    let mut attrs = FileAttributes::empty();
    if is_dir {
        attrs |= FileAttributes::DIRECTORY;
    }
    if is_symlink {
        attrs |= FileAttributes::REPARSE_POINT;
    }
    if metadata.permissions().readonly() {
        attrs |= FileAttributes::READONLY;
    }
    if is_dot_hidden(name) {
        attrs |= FileAttributes::HIDDEN;
    }
    if attrs.is_empty() {
        attrs = FileAttributes::NORMAL;
    }
    attrs
}

/// Dot-files are hidden on Unix; `.` and `..` are not.
#[cfg(not(windows))]
fn is_dot_hidden(name: &OsStr) -> bool {
    name != "." && name != ".." && name.as_encoded_bytes().first() == Some(&b'.')
}
