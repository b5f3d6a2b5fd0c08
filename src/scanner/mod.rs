pub mod enumerable;
pub mod enumerator;
pub mod error;
pub mod memory;
pub mod native;
pub mod record;
pub mod types;

pub use enumerable::{
    create, enumerate_directories, enumerate_entries, enumerate_files, enumerate_snapshots,
    normalize_inputs, NormalizedInputs,
};
pub use enumerator::{EnumerationStats, Enumerator};
pub use error::EnumerationError;
pub use memory::MemoryTree;
pub use native::{BatchStatus, DirectoryQuery, StdDirectoryQuery};
pub use record::EntryView;
pub use types::{EntryKind, EntrySnapshot, EnumerationOptions, FileAttributes};
