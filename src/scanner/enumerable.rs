//! Ready-made enumerations: name-pattern filtering over files, directories
//! or both, producing paths or owned snapshots.

use std::path::{is_separator, Component, Path, PathBuf};

use super::enumerator::Enumerator;
use super::error::EnumerationError;
use super::native::{DirectoryQuery, StdDirectoryQuery};
use super::record::EntryView;
use super::types::{EntryKind, EntrySnapshot, EnumerationOptions, FileAttributes};
use crate::matching::{CompiledExpression, MatchType};

/// Root and expression after splitting and compiling.
#[derive(Debug, Clone)]
pub struct NormalizedInputs {
    pub root: PathBuf,
    pub expression: CompiledExpression,
}

/// Prepare a (root, expression) pair for enumeration.
///
/// The expression names entries within a single directory. A directory part
/// (`"src/bin/*.rs"`) is moved onto the root, and an expression that ends in
/// a separator matches everything in that directory. Rooted expressions and
/// embedded NULs are rejected.
pub fn normalize_inputs(
    root: &Path,
    expression: &str,
    match_type: MatchType,
) -> Result<NormalizedInputs, EnumerationError> {
    if root.as_os_str().is_empty() {
        return Err(EnumerationError::invalid_argument("root path is empty"));
    }
    if expression.contains('\0') {
        return Err(EnumerationError::invalid_argument(format!(
            "expression {expression:?} contains a NUL character"
        )));
    }
    if matches!(
        Path::new(expression).components().next(),
        Some(Component::Prefix(_) | Component::RootDir)
    ) {
        return Err(EnumerationError::invalid_argument(format!(
            "expression {expression:?} must be relative to the root"
        )));
    }

    let (root, name) = match expression.rfind(is_separator) {
        Some(split) => {
            let directory = &expression[..split];
            let name = &expression[split + 1..];
            let name = if name.is_empty() { "*" } else { name };
            (root.join(directory), name)
        }
        None => (root.to_path_buf(), expression),
    };

    Ok(NormalizedInputs {
        root,
        expression: CompiledExpression::new(name, match_type),
    })
}

/// Build an enumerator with the standard predicates: entries of `kind`
/// whose name matches `expression`, never descending into reparse points.
pub fn create<Q, T>(
    query: Q,
    root: impl AsRef<Path>,
    expression: &str,
    options: EnumerationOptions,
    kind: EntryKind,
    transform: impl FnMut(&EntryView<'_>) -> T + Send + 'static,
) -> Result<Enumerator<Q, T>, EnumerationError>
where
    Q: DirectoryQuery,
{
    let NormalizedInputs { root, expression } =
        normalize_inputs(root.as_ref(), expression, options.match_type)?;
    let ignore_case = options.ignore_case();

    tracing::debug!(
        "Pattern {:?} ({:?}) under {}",
        expression.as_str(),
        expression.match_type(),
        root.display()
    );

    let enumerator = Enumerator::new(query, &root, options, transform)?
        .with_include(move |entry| {
            kind.accepts(entry.is_directory())
                && expression.is_match(&entry.file_name_lossy(), ignore_case)
        })
        .with_recurse(|entry| !entry.attributes().contains(FileAttributes::REPARSE_POINT));

    Ok(enumerator)
}

/// Files under `root` matching `expression`, as paths built from `root`.
pub fn enumerate_files(
    root: impl AsRef<Path>,
    expression: &str,
    options: EnumerationOptions,
) -> Result<Enumerator<StdDirectoryQuery, PathBuf>, EnumerationError> {
    create(StdDirectoryQuery, root, expression, options, EntryKind::Files, specified_path)
}

/// Directories under `root` matching `expression`.
pub fn enumerate_directories(
    root: impl AsRef<Path>,
    expression: &str,
    options: EnumerationOptions,
) -> Result<Enumerator<StdDirectoryQuery, PathBuf>, EnumerationError> {
    create(
        StdDirectoryQuery,
        root,
        expression,
        options,
        EntryKind::Directories,
        specified_path,
    )
}

/// Files and directories under `root` matching `expression`.
pub fn enumerate_entries(
    root: impl AsRef<Path>,
    expression: &str,
    options: EnumerationOptions,
) -> Result<Enumerator<StdDirectoryQuery, PathBuf>, EnumerationError> {
    create(StdDirectoryQuery, root, expression, options, EntryKind::Both, specified_path)
}

/// Like the path variants, but every entry is copied out in full.
pub fn enumerate_snapshots(
    root: impl AsRef<Path>,
    expression: &str,
    options: EnumerationOptions,
    kind: EntryKind,
) -> Result<Enumerator<StdDirectoryQuery, EntrySnapshot>, EnumerationError> {
    create(StdDirectoryQuery, root, expression, options, kind, |entry| entry.to_snapshot())
}

fn specified_path(entry: &EntryView<'_>) -> PathBuf {
    entry.to_specified_full_path()
}
