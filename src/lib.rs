// Public library interface for fsenum-rs
// The binaries and integration tests go through these modules

pub mod matching;
pub mod scanner;

pub use matching::{CompiledExpression, MatchCasing, MatchType};
pub use scanner::{
    enumerate_directories, enumerate_entries, enumerate_files, enumerate_snapshots,
    EnumerationError, EnumerationOptions, Enumerator,
};
