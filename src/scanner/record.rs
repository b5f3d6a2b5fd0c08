//! Raw batch records and the borrowed view over one of them.
//!
//! A batch is a run of variable-length records packed into the caller's
//! buffer. Each record starts on an 8-byte boundary with a fixed header and
//! is followed by the entry name:
//!
//! ```text
//! 0   next_entry_offset  u32   0 = last record of the batch
//! 4   attributes         u32   FileAttributes bits
//! 8   creation_time      i64   ns since UNIX epoch, i64::MIN = unknown
//! 16  last_access_time   i64
//! 24  last_write_time    i64
//! 32  file_size          u64
//! 40  name_length        u32   bytes
//! 44  reserved           u32
//! 48  name               [u8; name_length]
//! ```
//!
//! Fields are native-endian. Query implementations fill batches through
//! [`BatchWriter`]; the enumerator walks them with [`read_record`], which
//! bounds-checks every header and name before handing out a view.

use std::borrow::Cow;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytemuck::{Pod, Zeroable};
use compact_str::CompactString;
use thiserror::Error;

use super::types::{EntrySnapshot, FileAttributes};

/// Size of [`RecordHeader`] in bytes.
pub const HEADER_SIZE: usize = std::mem::size_of::<RecordHeader>();
const RECORD_ALIGN: usize = 8;
const UNKNOWN_TIME: i64 = i64::MIN;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct RecordHeader {
    pub next_entry_offset: u32,
    pub attributes: u32,
    pub creation_time: i64,
    pub last_access_time: i64,
    pub last_write_time: i64,
    pub file_size: u64,
    pub name_length: u32,
    pub reserved: u32,
}

/// A batch that does not follow the record layout.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("record at offset {offset} runs past the end of the batch ({len} bytes)")]
    Truncated { offset: usize, len: usize },
    #[error("record at offset {offset} links to offset {next}, which does not advance")]
    BadLink { offset: usize, next: usize },
    #[error("record at offset {offset} carries a name that is not valid on this platform")]
    InvalidName { offset: usize },
}

/// Input to [`BatchWriter::push`].
#[derive(Debug, Clone, Copy)]
pub struct RawRecord<'n> {
    pub name: &'n [u8],
    pub attributes: FileAttributes,
    pub size: u64,
    pub created: Option<SystemTime>,
    pub accessed: Option<SystemTime>,
    pub modified: Option<SystemTime>,
}

impl<'n> RawRecord<'n> {
    /// A record with no timestamps.
    pub fn new(name: &'n [u8], attributes: FileAttributes, size: u64) -> Self {
        Self {
            name,
            attributes,
            size,
            created: None,
            accessed: None,
            modified: None,
        }
    }

    /// Bytes this record occupies, excluding alignment padding.
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + self.name.len()
    }
}

/// Packs records into a caller-owned buffer, linking each to the next.
pub struct BatchWriter<'b> {
    buf: &'b mut [u8],
    len: usize,
    last: Option<usize>,
}

impl<'b> BatchWriter<'b> {
    pub fn new(buf: &'b mut [u8]) -> Self {
        Self {
            buf,
            len: 0,
            last: None,
        }
    }

    /// Append a record. Returns `false`, leaving the batch untouched, if it
    /// does not fit in the remaining space.
    pub fn push(&mut self, record: &RawRecord<'_>) -> bool {
        let start = align_up(self.len);
        let Ok(name_length) = u32::try_from(record.name.len()) else {
            return false;
        };
        let end = match start.checked_add(record.encoded_len()) {
            Some(end) if end <= self.buf.len() => end,
            _ => return false,
        };

        let header = RecordHeader {
            next_entry_offset: 0,
            attributes: record.attributes.bits(),
            creation_time: encode_time(record.created),
            last_access_time: encode_time(record.accessed),
            last_write_time: encode_time(record.modified),
            file_size: record.size,
            name_length,
            reserved: 0,
        };

        self.buf[self.len..start].fill(0);
        self.buf[start..start + HEADER_SIZE].copy_from_slice(bytemuck::bytes_of(&header));
        self.buf[start + HEADER_SIZE..end].copy_from_slice(record.name);

        if let Some(last) = self.last {
            let link = (start - last) as u32;
            self.buf[last..last + 4].copy_from_slice(&link.to_ne_bytes());
        }

        self.last = Some(start);
        self.len = end;
        true
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.last.is_none()
    }

    /// Space left for further records, before alignment.
    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(align_up(self.len))
    }
}

/// A record parsed out of a batch. Borrows the name from the batch.
#[derive(Debug, Clone, Copy)]
pub struct ParsedRecord<'a> {
    pub header: RecordHeader,
    pub name: &'a OsStr,
    /// Offset of the following record, `None` at the end of the batch.
    pub next: Option<usize>,
}

/// Parse the record at `offset` in a filled batch.
pub fn read_record(batch: &[u8], offset: usize) -> Result<ParsedRecord<'_>, RecordError> {
    let truncated = RecordError::Truncated {
        offset,
        len: batch.len(),
    };

    let header_end = offset.checked_add(HEADER_SIZE).ok_or(truncated.clone())?;
    let header_bytes = batch.get(offset..header_end).ok_or(truncated.clone())?;
    let header: RecordHeader =
        bytemuck::try_pod_read_unaligned(header_bytes).map_err(|_| truncated.clone())?;

    let name_end = header_end
        .checked_add(header.name_length as usize)
        .ok_or(truncated.clone())?;
    let name_bytes = batch.get(header_end..name_end).ok_or(truncated)?;
    let name = decode_name(name_bytes).ok_or(RecordError::InvalidName { offset })?;

    let next = match header.next_entry_offset as usize {
        0 => None,
        link if link < HEADER_SIZE => {
            return Err(RecordError::BadLink {
                offset,
                next: offset + link,
            })
        }
        link => Some(offset + link),
    };

    Ok(ParsedRecord { header, name, next })
}

#[cfg(unix)]
fn decode_name(bytes: &[u8]) -> Option<&OsStr> {
    use std::os::unix::ffi::OsStrExt;
    Some(OsStr::from_bytes(bytes))
}

#[cfg(not(unix))]
fn decode_name(bytes: &[u8]) -> Option<&OsStr> {
    std::str::from_utf8(bytes).ok().map(OsStr::new)
}

/// Bytes to store for `name` in a record.
#[cfg(unix)]
pub fn encode_name(name: &OsStr) -> Cow<'_, [u8]> {
    use std::os::unix::ffi::OsStrExt;
    Cow::Borrowed(name.as_bytes())
}

#[cfg(not(unix))]
pub fn encode_name(name: &OsStr) -> Cow<'_, [u8]> {
    match name.to_string_lossy() {
        Cow::Borrowed(s) => Cow::Borrowed(s.as_bytes()),
        Cow::Owned(s) => Cow::Owned(s.into_bytes()),
    }
}

fn align_up(n: usize) -> usize {
    (n + RECORD_ALIGN - 1) & !(RECORD_ALIGN - 1)
}

fn encode_time(time: Option<SystemTime>) -> i64 {
    let Some(time) = time else {
        return UNKNOWN_TIME;
    };
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => i64::try_from(after.as_nanos()).unwrap_or(i64::MAX),
        Err(before) => i64::try_from(before.duration().as_nanos())
            .map(|n| -n)
            .unwrap_or(UNKNOWN_TIME + 1),
    }
}

fn decode_time(raw: i64) -> Option<SystemTime> {
    if raw == UNKNOWN_TIME {
        return None;
    }
    if raw >= 0 {
        UNIX_EPOCH.checked_add(Duration::from_nanos(raw as u64))
    } else {
        UNIX_EPOCH.checked_sub(Duration::from_nanos(raw.unsigned_abs()))
    }
}

/// One directory entry, borrowed from the enumerator's batch buffer.
///
/// Only valid for the duration of the callback it is passed to. Anything
/// that must outlive it has to be copied out (see [`to_snapshot`]).
///
/// [`to_snapshot`]: EntryView::to_snapshot
#[derive(Debug, Clone, Copy)]
pub struct EntryView<'a> {
    header: RecordHeader,
    name: &'a OsStr,
    directory: &'a Path,
    root: &'a Path,
    original_root: &'a Path,
}

impl<'a> EntryView<'a> {
    pub(crate) fn new(
        record: &ParsedRecord<'a>,
        directory: &'a Path,
        root: &'a Path,
        original_root: &'a Path,
    ) -> Self {
        Self {
            header: record.header,
            name: record.name,
            directory,
            root,
            original_root,
        }
    }

    /// Entry name (not full path).
    pub fn file_name(&self) -> &'a OsStr {
        self.name
    }

    /// Entry name as text, lossily converted if needed.
    pub fn file_name_lossy(&self) -> Cow<'a, str> {
        self.name.to_string_lossy()
    }

    pub fn attributes(&self) -> FileAttributes {
        FileAttributes::from_bits_retain(self.header.attributes)
    }

    pub fn is_directory(&self) -> bool {
        self.attributes().contains(FileAttributes::DIRECTORY)
    }

    pub fn is_hidden(&self) -> bool {
        self.attributes().contains(FileAttributes::HIDDEN)
    }

    /// `.` or `..`.
    pub fn is_special_directory(&self) -> bool {
        self.is_directory() && (self.name == "." || self.name == "..")
    }

    /// File size in bytes.
    pub fn len(&self) -> u64 {
        self.header.file_size
    }

    pub fn is_empty(&self) -> bool {
        self.header.file_size == 0
    }

    pub fn creation_time(&self) -> Option<SystemTime> {
        decode_time(self.header.creation_time)
    }

    pub fn last_access_time(&self) -> Option<SystemTime> {
        decode_time(self.header.last_access_time)
    }

    pub fn last_write_time(&self) -> Option<SystemTime> {
        decode_time(self.header.last_write_time)
    }

    /// Full path of the directory containing this entry.
    pub fn directory(&self) -> &'a Path {
        self.directory
    }

    /// Full path of the enumeration root.
    pub fn root_directory(&self) -> &'a Path {
        self.root
    }

    /// Enumeration root as the caller spelled it.
    pub fn original_root_directory(&self) -> &'a Path {
        self.original_root
    }

    /// Absolute path of the entry.
    pub fn to_full_path(&self) -> PathBuf {
        self.directory.join(self.name)
    }

    /// Path of the entry built from the caller's spelling of the root, so a
    /// relative root yields relative results.
    pub fn to_specified_full_path(&self) -> PathBuf {
        match self.directory.strip_prefix(self.root) {
            Ok(relative) if relative.as_os_str().is_empty() => self.original_root.join(self.name),
            Ok(relative) => self.original_root.join(relative).join(self.name),
            Err(_) => self.to_full_path(),
        }
    }

    /// Copy everything out of the buffer.
    pub fn to_snapshot(&self) -> EntrySnapshot {
        EntrySnapshot {
            full_path: self.to_full_path(),
            specified_path: self.to_specified_full_path(),
            name: CompactString::new(self.file_name_lossy()),
            attributes: self.attributes(),
            size: self.len(),
            created: self.creation_time(),
            accessed: self.last_access_time(),
            modified: self.last_write_time(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(batch: &[u8]) -> Result<Vec<(String, u32, u64)>, RecordError> {
        let mut out = Vec::new();
        let mut offset = Some(0);
        while let Some(at) = offset {
            let rec = read_record(batch, at)?;
            out.push((
                rec.name.to_string_lossy().into_owned(),
                rec.header.attributes,
                rec.header.file_size,
            ));
            offset = rec.next;
        }
        Ok(out)
    }

    #[test]
    fn header_is_48_bytes() {
        assert_eq!(HEADER_SIZE, 48);
    }

    #[test]
    fn writer_links_records() {
        let mut buf = vec![0u8; 512];
        let mut writer = BatchWriter::new(&mut buf);
        assert!(writer.is_empty());
        assert!(writer.push(&RawRecord::new(b"a.txt", FileAttributes::NORMAL, 3)));
        assert!(writer.push(&RawRecord::new(b"sub", FileAttributes::DIRECTORY, 0)));
        assert!(writer.push(&RawRecord::new(b"z", FileAttributes::ARCHIVE, 9)));
        let len = writer.len();

        let entries = collect(&buf[..len]).unwrap();
        assert_eq!(
            entries,
            vec![
                ("a.txt".to_string(), FileAttributes::NORMAL.bits(), 3),
                ("sub".to_string(), FileAttributes::DIRECTORY.bits(), 0),
                ("z".to_string(), FileAttributes::ARCHIVE.bits(), 9),
            ]
        );
    }

    #[test]
    fn writer_refuses_records_that_do_not_fit() {
        let mut buf = vec![0u8; HEADER_SIZE + 4];
        let mut writer = BatchWriter::new(&mut buf);
        assert!(writer.push(&RawRecord::new(b"abcd", FileAttributes::NORMAL, 0)));
        assert!(!writer.push(&RawRecord::new(b"e", FileAttributes::NORMAL, 0)));
        assert_eq!(writer.len(), HEADER_SIZE + 4);
        assert_eq!(writer.remaining(), 0);
    }

    #[test]
    fn truncated_batch_is_rejected() {
        let mut buf = vec![0u8; 256];
        let len = {
            let mut writer = BatchWriter::new(&mut buf);
            writer.push(&RawRecord::new(b"name", FileAttributes::NORMAL, 0));
            writer.len()
        };
        let err = read_record(&buf[..len - 1], 0).unwrap_err();
        assert!(matches!(err, RecordError::Truncated { .. }));
        assert!(matches!(
            read_record(&buf[..10], 0),
            Err(RecordError::Truncated { .. })
        ));
    }

    #[test]
    fn non_advancing_link_is_rejected() {
        let mut buf = vec![0u8; 256];
        let len = {
            let mut writer = BatchWriter::new(&mut buf);
            writer.push(&RawRecord::new(b"x", FileAttributes::NORMAL, 0));
            writer.len()
        };
        buf[0..4].copy_from_slice(&4u32.to_ne_bytes());
        assert!(matches!(
            read_record(&buf[..len], 0),
            Err(RecordError::BadLink { .. })
        ));
    }

    #[test]
    fn timestamps_survive_the_buffer() {
        let when = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let before_epoch = UNIX_EPOCH - Duration::from_secs(60);
        let mut buf = vec![0u8; 256];
        let mut writer = BatchWriter::new(&mut buf);
        writer.push(&RawRecord {
            created: Some(before_epoch),
            modified: Some(when),
            ..RawRecord::new(b"t", FileAttributes::NORMAL, 1)
        });

        let rec = read_record(&buf, 0).unwrap();
        let view = EntryView::new(&rec, Path::new("/r"), Path::new("/r"), Path::new("r"));
        assert_eq!(view.last_write_time(), Some(when));
        assert_eq!(view.creation_time(), Some(before_epoch));
        assert_eq!(view.last_access_time(), None);
    }

    #[test]
    fn view_paths() {
        let mut buf = vec![0u8; 256];
        let mut writer = BatchWriter::new(&mut buf);
        writer.push(&RawRecord::new(b"f.rs", FileAttributes::NORMAL, 7));
        let rec = read_record(&buf, 0).unwrap();

        let root = Path::new("/abs/root");
        let dir = Path::new("/abs/root/src/bin");
        let view = EntryView::new(&rec, dir, root, Path::new("root"));
        assert_eq!(view.to_full_path(), PathBuf::from("/abs/root/src/bin/f.rs"));
        assert_eq!(view.to_specified_full_path(), PathBuf::from("root/src/bin/f.rs"));

        let top = EntryView::new(&rec, root, root, Path::new("root"));
        assert_eq!(top.to_specified_full_path(), PathBuf::from("root/f.rs"));

        let snap = view.to_snapshot();
        assert_eq!(snap.name, "f.rs");
        assert_eq!(snap.size, 7);
        assert!(!snap.is_dir());
    }

    #[test]
    fn special_directories() {
        let mut buf = vec![0u8; 256];
        let mut writer = BatchWriter::new(&mut buf);
        writer.push(&RawRecord::new(b"..", FileAttributes::DIRECTORY, 0));
        let rec = read_record(&buf, 0).unwrap();
        let view = EntryView::new(&rec, Path::new("/"), Path::new("/"), Path::new("/"));
        assert!(view.is_special_directory());
    }
}
