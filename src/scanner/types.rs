use std::path::PathBuf;
use std::time::SystemTime;

use bitflags::bitflags;
use compact_str::CompactString;

use crate::matching::{MatchCasing, MatchType};

bitflags! {
    /// Entry attribute bits. Values are the Win32 `FILE_ATTRIBUTE_*` constants
    /// so records from a native Windows query need no translation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FileAttributes: u32 {
        const READONLY = 0x0001;
        const HIDDEN = 0x0002;
        const SYSTEM = 0x0004;
        const DIRECTORY = 0x0010;
        const ARCHIVE = 0x0020;
        const DEVICE = 0x0040;
        const NORMAL = 0x0080;
        const TEMPORARY = 0x0100;
        const SPARSE_FILE = 0x0200;
        const REPARSE_POINT = 0x0400;
        const COMPRESSED = 0x0800;
        const OFFLINE = 0x1000;
        const NOT_CONTENT_INDEXED = 0x2000;
        const ENCRYPTED = 0x4000;
    }
}

/// Buffer size used when `buffer_size` is 0.
pub const DEFAULT_BUFFER_SIZE: usize = 4096;
/// Smallest batch buffer an enumerator will allocate.
pub const MINIMUM_BUFFER_SIZE: usize = 1024;
/// `max_recursion_depth` value meaning "no limit".
pub const UNBOUNDED_DEPTH: u32 = u32::MAX;

/// Knobs for a single enumeration. Copied into the enumerator at
/// construction, so later edits never affect a running enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumerationOptions {
    /// Descend into subdirectories.
    pub recurse_subdirectories: bool,
    /// Skip subtrees that fail with `NotFound` / `AccessDenied` instead of
    /// aborting the enumeration.
    pub ignore_inaccessible: bool,
    /// Batch buffer size in bytes (0 = [`DEFAULT_BUFFER_SIZE`]).
    pub buffer_size: usize,
    /// Entries carrying any of these attributes are skipped entirely.
    pub attributes_to_skip: FileAttributes,
    pub match_type: MatchType,
    pub match_casing: MatchCasing,
    /// How many levels below the root may be opened.
    pub max_recursion_depth: u32,
    /// Report `.` and `..`.
    pub return_special_directories: bool,
}

impl Default for EnumerationOptions {
    fn default() -> Self {
        Self {
            recurse_subdirectories: false,
            ignore_inaccessible: true,
            buffer_size: 0,
            attributes_to_skip: FileAttributes::HIDDEN | FileAttributes::SYSTEM,
            match_type: MatchType::Simple,
            match_casing: MatchCasing::PlatformDefault,
            max_recursion_depth: UNBOUNDED_DEPTH,
            return_special_directories: false,
        }
    }
}

impl EnumerationOptions {
    /// Legacy behavior: DOS matching, nothing skipped, errors are fatal.
    pub fn compatible() -> Self {
        Self {
            match_type: MatchType::ExtendedDos,
            attributes_to_skip: FileAttributes::empty(),
            ignore_inaccessible: false,
            ..Self::default()
        }
    }

    /// [`compatible`](Self::compatible) with recursion toggled, the shape of
    /// a classic "top directory only / all directories" switch.
    pub fn from_search_option(all_directories: bool) -> Self {
        Self {
            recurse_subdirectories: all_directories,
            ..Self::compatible()
        }
    }

    pub fn with_recurse_subdirectories(mut self, recurse: bool) -> Self {
        self.recurse_subdirectories = recurse;
        self
    }

    pub fn with_ignore_inaccessible(mut self, ignore: bool) -> Self {
        self.ignore_inaccessible = ignore;
        self
    }

    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    pub fn with_attributes_to_skip(mut self, attributes: FileAttributes) -> Self {
        self.attributes_to_skip = attributes;
        self
    }

    pub fn with_match_type(mut self, match_type: MatchType) -> Self {
        self.match_type = match_type;
        self
    }

    pub fn with_match_casing(mut self, casing: MatchCasing) -> Self {
        self.match_casing = casing;
        self
    }

    pub fn with_max_recursion_depth(mut self, depth: u32) -> Self {
        self.max_recursion_depth = depth;
        self
    }

    pub fn with_return_special_directories(mut self, special: bool) -> Self {
        self.return_special_directories = special;
        self
    }

    /// Buffer size after applying the default and the floor.
    pub fn effective_buffer_size(&self) -> usize {
        if self.buffer_size == 0 {
            DEFAULT_BUFFER_SIZE
        } else {
            self.buffer_size.max(MINIMUM_BUFFER_SIZE)
        }
    }

    /// Case flag handed to the matcher.
    pub fn ignore_case(&self) -> bool {
        self.match_casing.ignore_case()
    }
}

/// Which entry kinds a standard enumeration reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Files,
    Directories,
    Both,
}

impl EntryKind {
    pub fn accepts(self, is_directory: bool) -> bool {
        match self {
            EntryKind::Files => !is_directory,
            EntryKind::Directories => is_directory,
            EntryKind::Both => true,
        }
    }
}

/// Owned copy of one entry, detached from the batch buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySnapshot {
    /// Absolute path of the entry
    pub full_path: PathBuf,
    /// Path built from the root exactly as the caller spelled it
    pub specified_path: PathBuf,
    /// File or directory name (not full path)
    pub name: CompactString,
    pub attributes: FileAttributes,
    /// File size in bytes (0 for directories)
    pub size: u64,
    pub created: Option<SystemTime>,
    pub accessed: Option<SystemTime>,
    pub modified: Option<SystemTime>,
}

impl EntrySnapshot {
    pub fn is_dir(&self) -> bool {
        self.attributes.contains(FileAttributes::DIRECTORY)
    }

    pub fn is_hidden(&self) -> bool {
        self.attributes.contains(FileAttributes::HIDDEN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_size_default_and_floor() {
        let opts = EnumerationOptions::default();
        assert_eq!(opts.effective_buffer_size(), DEFAULT_BUFFER_SIZE);
        assert_eq!(opts.clone().with_buffer_size(10).effective_buffer_size(), MINIMUM_BUFFER_SIZE);
        assert_eq!(opts.with_buffer_size(65536).effective_buffer_size(), 65536);
    }

    #[test]
    fn compatible_defaults() {
        let opts = EnumerationOptions::from_search_option(true);
        assert!(opts.recurse_subdirectories);
        assert!(!opts.ignore_inaccessible);
        assert_eq!(opts.match_type, MatchType::ExtendedDos);
        assert!(opts.attributes_to_skip.is_empty());
        assert_eq!(opts.max_recursion_depth, UNBOUNDED_DEPTH);
    }

    #[test]
    fn entry_kind_filters() {
        assert!(EntryKind::Files.accepts(false));
        assert!(!EntryKind::Files.accepts(true));
        assert!(EntryKind::Directories.accepts(true));
        assert!(EntryKind::Both.accepts(true) && EntryKind::Both.accepts(false));
    }
}
