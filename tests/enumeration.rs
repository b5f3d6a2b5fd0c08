//! Enumeration behavior against the in-memory directory query: traversal
//! order, depth limits, error suppression and handle hygiene.

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use fsenum_rs::matching::{MatchCasing, MatchType};
use fsenum_rs::scanner::{
    self, EntryKind, EntryView, EnumerationError, EnumerationOptions, Enumerator, MemoryTree,
};

fn base() -> PathBuf {
    std::path::absolute("/t").unwrap()
}

fn at(relative: &str) -> PathBuf {
    base().join(relative)
}

/// Path of an entry relative to the root, with `/` separators.
fn relative(entry: &EntryView<'_>) -> String {
    let full = entry.to_full_path();
    let rel = full.strip_prefix(entry.root_directory()).unwrap();
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn collect(
    tree: MemoryTree,
    expression: &str,
    options: EnumerationOptions,
    kind: EntryKind,
) -> Result<Vec<String>, EnumerationError> {
    scanner::create(tree, base(), expression, options, kind, relative)?.collect()
}

fn recursive() -> EnumerationOptions {
    EnumerationOptions::default().with_recurse_subdirectories(true)
}

fn deep_tree() -> MemoryTree {
    let mut tree = MemoryTree::new().file(at("f.txt"), 1);
    let mut dir = String::new();
    for level in 1..=5 {
        if !dir.is_empty() {
            dir.push('/');
        }
        dir.push_str(&format!("d{level}"));
        tree = tree.file(at(&format!("{dir}/f.txt")), 1);
    }
    tree
}

#[test]
fn recursion_depth_is_bounded() {
    let got: BTreeSet<_> = collect(
        deep_tree(),
        "*",
        recursive().with_max_recursion_depth(2),
        EntryKind::Both,
    )
    .unwrap()
    .into_iter()
    .collect();

    let expected: BTreeSet<String> = [
        "f.txt",
        "d1",
        "d1/f.txt",
        "d1/d2",
        "d1/d2/f.txt",
        "d1/d2/d3",
    ]
    .into_iter()
    .map(String::from)
    .collect();
    assert_eq!(got, expected);
}

#[test]
fn unbounded_depth_reaches_the_bottom() {
    let got = collect(deep_tree(), "*", recursive(), EntryKind::Files).unwrap();
    assert_eq!(got.len(), 6);
    assert!(got.contains(&"d1/d2/d3/d4/d5/f.txt".to_string()));
}

#[test]
fn no_recursion_stays_at_top_level() {
    let tree = MemoryTree::new()
        .file(at("one.txt"), 1)
        .file(at("two.txt"), 2)
        .file(at("three.txt"), 3)
        .file(at("left/inner.txt"), 4)
        .file(at("right/inner.txt"), 5)
        .file(at("right/nested/deeper.txt"), 6);

    let files = collect(tree.clone(), "*", EnumerationOptions::default(), EntryKind::Files).unwrap();
    assert_eq!(files.len(), 3);
    assert!(files.iter().all(|f| !f.contains('/')));

    let dirs = collect(tree, "*", EnumerationOptions::default(), EntryKind::Directories).unwrap();
    assert_eq!(dirs, vec!["left", "right"]);
}

fn tree_with_locked_middle() -> MemoryTree {
    MemoryTree::new()
        .file(at("a/a.txt"), 1)
        .file(at("b/b.txt"), 1)
        .file(at("c/c.txt"), 1)
        .fail_open(at("b"), io::ErrorKind::PermissionDenied)
}

#[test]
fn inaccessible_subtree_is_skipped() {
    let got = collect(tree_with_locked_middle(), "*", recursive(), EntryKind::Files).unwrap();
    assert_eq!(got, vec!["a/a.txt", "c/c.txt"]);
}

#[test]
fn inaccessible_subtree_is_fatal_when_not_ignored() {
    let tree = tree_with_locked_middle();
    let counter = tree.clone();
    let mut walk = scanner::create(
        tree,
        base(),
        "*",
        recursive().with_ignore_inaccessible(false),
        EntryKind::Both,
        relative,
    )
    .unwrap();

    assert_eq!(walk.next().unwrap().unwrap(), "a");
    let err = walk.next().unwrap().unwrap_err();
    assert!(matches!(err, EnumerationError::AccessDenied { .. }));
    assert_eq!(err.path(), Some(at("b").as_path()));
    assert!(walk.next().is_none());
    assert!(walk.is_finished());
    assert_eq!(counter.open_handles(), 0);
}

#[test]
fn suppressed_query_failure_skips_the_directory() {
    let tree = MemoryTree::new()
        .file(at("ok/x.txt"), 1)
        .file(at("bad/y.txt"), 1)
        .fail_query(at("bad"), io::ErrorKind::NotFound);
    let mut walk = scanner::create(tree, base(), "*", recursive(), EntryKind::Files, relative).unwrap();

    let got: Vec<_> = walk.by_ref().collect::<Result<_, _>>().unwrap();
    assert_eq!(got, vec!["ok/x.txt"]);
    assert_eq!(walk.stats().directories_skipped, 1);
}

#[test]
fn error_hook_is_consulted_before_ignore_inaccessible() {
    let calls = Arc::new(AtomicUsize::new(0));

    // Os-class failure: fatal unless the hook accepts it.
    let tree = MemoryTree::new()
        .file(at("odd/x.txt"), 1)
        .file(at("fine/y.txt"), 1)
        .fail_open(at("odd"), io::ErrorKind::Other);

    let fatal: Vec<_> = scanner::create(tree.clone(), base(), "*", recursive(), EntryKind::Files, relative)
        .unwrap()
        .collect();
    assert!(fatal.last().unwrap().is_err());

    let seen = calls.clone();
    let accepted: Vec<_> = scanner::create(tree, base(), "*", recursive(), EntryKind::Files, relative)
        .unwrap()
        .continue_on_error(move |err| {
            seen.fetch_add(1, Ordering::SeqCst);
            matches!(err, EnumerationError::Os { .. })
        })
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(accepted, vec!["fine/y.txt"]);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // A declining hook still falls back to ignore_inaccessible.
    let seen = calls.clone();
    let fallback: Vec<_> = scanner::create(
        tree_with_locked_middle(),
        base(),
        "*",
        recursive(),
        EntryKind::Files,
        relative,
    )
    .unwrap()
    .continue_on_error(move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
        false
    })
    .collect::<Result<_, _>>()
    .unwrap();
    assert_eq!(fallback, vec!["a/a.txt", "c/c.txt"]);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn dropping_midway_closes_every_handle() {
    let tree = MemoryTree::new()
        .file(at("a/1"), 1)
        .file(at("b/2"), 1)
        .file(at("c/3"), 1)
        .file(at("d/4"), 1);
    let counter = tree.clone();

    let mut walk = scanner::create(tree, base(), "*", recursive(), EntryKind::Both, relative).unwrap();
    let first: Vec<_> = walk.by_ref().take(3).collect::<Result<_, _>>().unwrap();
    assert_eq!(first, vec!["a", "b", "c"]);

    // Root plus three queued subdirectories.
    assert_eq!(walk.open_handle_count(), 4);
    assert_eq!(counter.open_handles(), 4);

    drop(walk);
    assert_eq!(counter.open_handles(), 0);
}

#[test]
fn repeated_enumeration_is_deterministic() {
    let tree = deep_tree().file(at("d1/extra.bin"), 10).dir(at("empty"));
    let mut first = collect(tree.clone(), "*", recursive(), EntryKind::Both).unwrap();
    let mut second = collect(tree, "*", recursive(), EntryKind::Both).unwrap();
    first.sort();
    second.sort();
    assert_eq!(first, second);
}

#[test]
fn directory_finished_hook_sees_every_directory() {
    let finished = Arc::new(Mutex::new(Vec::new()));
    let sink = finished.clone();

    let count = scanner::create(deep_tree(), base(), "*", recursive(), EntryKind::Files, relative)
        .unwrap()
        .on_directory_finished(move |dir: &Path| sink.lock().unwrap().push(dir.to_path_buf()))
        .count();
    assert_eq!(count, 6);

    let finished = finished.lock().unwrap();
    assert_eq!(finished.len(), 6);
    assert_eq!(finished[0], base());
    assert_eq!(finished[5], at("d1/d2/d3/d4/d5"));
}

#[test]
fn custom_predicates_and_transform() {
    let tree = MemoryTree::new()
        .file(at("keep/big.dat"), 5000)
        .file(at("keep/small.dat"), 10)
        .file(at("skip/big.dat"), 9000);

    let sizes: Vec<u64> = Enumerator::new(tree, base(), recursive(), |e: &EntryView<'_>| e.len())
        .unwrap()
        .with_recurse(|e| e.file_name() != "skip")
        .with_include(|e| !e.is_directory() && e.len() > 100)
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(sizes, vec![5000]);
}

#[test]
fn expression_filters_names() {
    let tree = MemoryTree::new()
        .file(at("notes.txt"), 1)
        .file(at("README"), 1)
        .file(at("data.TXT"), 1)
        .file(at("src/lib.txt"), 1);

    let sensitive = EnumerationOptions::default().with_match_casing(MatchCasing::CaseSensitive);
    let got = collect(tree.clone(), "*.txt", sensitive.clone(), EntryKind::Files).unwrap();
    assert_eq!(got, vec!["notes.txt"]);

    let insensitive = sensitive.with_match_casing(MatchCasing::CaseInsensitive);
    let got = collect(tree.clone(), "*.TXT", insensitive.clone(), EntryKind::Files).unwrap();
    assert_eq!(got, vec!["notes.txt", "data.TXT"]);

    // "*." under the DOS rules means "no extension".
    let dos = insensitive.with_match_type(MatchType::ExtendedDos);
    let got = collect(tree.clone(), "*.", dos, EntryKind::Files).unwrap();
    assert_eq!(got, vec!["README"]);
}

#[test]
fn expression_directory_part_becomes_the_root() {
    let tree = MemoryTree::new()
        .file(at("top.txt"), 1)
        .file(at("src/lib.txt"), 1)
        .file(at("src/main.rs"), 1);

    let got: Vec<String> = scanner::create(
        tree,
        base(),
        "src/*.txt",
        EnumerationOptions::default(),
        EntryKind::Files,
        |e| e.to_specified_full_path().to_string_lossy().into_owned(),
    )
    .unwrap()
    .collect::<Result<_, _>>()
    .unwrap();
    assert_eq!(got, vec![at("src/lib.txt").to_string_lossy().into_owned()]);
}

#[test]
fn special_directories_pass_through_the_pattern() {
    let tree = MemoryTree::new().file(at("f"), 1);
    let options = EnumerationOptions::default().with_return_special_directories(true);
    let got: Vec<String> = scanner::create(tree, base(), "*", options, EntryKind::Directories, |e| {
        e.file_name_lossy().into_owned()
    })
    .unwrap()
    .collect::<Result<_, _>>()
    .unwrap();
    assert_eq!(got, vec![".", ".."]);
}

#[test]
fn rooted_expression_is_rejected_before_opening_anything() {
    let tree = MemoryTree::new().dir(base());
    let counter = tree.clone();
    let rooted = if cfg!(windows) { "C:\\*" } else { "/*" };
    let err = scanner::create(tree, base(), rooted, recursive(), EntryKind::Both, relative)
        .unwrap_err();
    assert!(matches!(err, EnumerationError::InvalidArgument(_)));
    assert_eq!(counter.opened_total(), 0);
}
