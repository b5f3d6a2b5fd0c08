use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors surfaced by an enumeration.
#[derive(Debug, Error)]
pub enum EnumerationError {
    #[error("not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("access denied: {}", path.display())]
    AccessDenied { path: PathBuf },

    /// Empty root, embedded NUL, rooted expression, unusable buffer size.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("out of memory allocating a {size} byte enumeration buffer")]
    OutOfMemory { size: usize },

    #[error("os error at {}: {source}", path.display())]
    Os {
        path: PathBuf,
        code: Option<i32>,
        #[source]
        source: io::Error,
    },
}

/// `ENOTDIR` on every Unix we target. Linux, BSDs and macOS all agree.
#[cfg(unix)]
const ENOTDIR: i32 = 20;

/// `ERROR_PATH_NOT_FOUND` / `ERROR_DIRECTORY`.
#[cfg(windows)]
const NOT_FOUND_CODES: &[i32] = &[3, 267];

impl EnumerationError {
    /// Classify an OS error raised while working on `path`.
    pub fn from_io(path: impl AsRef<Path>, err: io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        if is_not_found(&err) {
            return EnumerationError::NotFound { path };
        }
        match err.kind() {
            io::ErrorKind::PermissionDenied => EnumerationError::AccessDenied { path },
            _ => EnumerationError::Os {
                path,
                code: err.raw_os_error(),
                source: err,
            },
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        EnumerationError::InvalidArgument(message.into())
    }

    /// The raw OS error code, when one is known.
    ///
    /// `NotFound` and `AccessDenied` are reported with their canonical
    /// platform codes so a continue-on-error hook can match on numbers.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            EnumerationError::Os { code, .. } => *code,
            EnumerationError::NotFound { .. } => Some(if cfg!(windows) { 3 } else { 2 }),
            EnumerationError::AccessDenied { .. } => Some(if cfg!(windows) { 5 } else { 13 }),
            _ => None,
        }
    }

    /// Path the failure happened at, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            EnumerationError::NotFound { path }
            | EnumerationError::AccessDenied { path }
            | EnumerationError::Os { path, .. } => Some(path),
            _ => None,
        }
    }

    /// `NotFound` and `AccessDenied` are the classes `ignore_inaccessible`
    /// may suppress.
    pub fn is_inaccessible(&self) -> bool {
        matches!(
            self,
            EnumerationError::NotFound { .. } | EnumerationError::AccessDenied { .. }
        )
    }
}

fn is_not_found(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::NotFound {
        return true;
    }
    #[cfg(unix)]
    {
        if err.raw_os_error() == Some(ENOTDIR) {
            return true;
        }
    }
    #[cfg(windows)]
    {
        if let Some(code) = err.raw_os_error() {
            return NOT_FOUND_CODES.contains(&code);
        }
    }
    false
}
