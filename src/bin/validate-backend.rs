/// Backend validation tool
/// Enumerates a tree recursively and cross-checks the result set against jwalk
use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use fsenum_rs::scanner::{self, EntryKind, EnumerationOptions, FileAttributes, StdDirectoryQuery};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fsenum_rs=info".parse()?),
        )
        .init();

    let scan_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let scan_path = std::path::absolute(&scan_path)
        .with_context(|| format!("cannot resolve {}", scan_path.display()))?;

    println!("Target: {}", scan_path.display());
    println!();

    // === STAGE 1: ENUMERATOR ===
    println!("-- STAGE 1: ENUMERATOR --");
    let options = EnumerationOptions::default()
        .with_recurse_subdirectories(true)
        .with_attributes_to_skip(FileAttributes::empty());

    let start = std::time::Instant::now();
    let mut skipped = 0usize;
    let enumerator = scanner::create(
        StdDirectoryQuery,
        &scan_path,
        "*",
        options,
        EntryKind::Both,
        |entry| entry.to_full_path(),
    )?;
    let mut ours = BTreeSet::new();
    for entry in enumerator {
        match entry {
            Ok(path) => {
                ours.insert(path);
            }
            Err(e) => {
                tracing::warn!("Enumeration stopped early: {}", e);
                skipped += 1;
            }
        }
    }
    println!("  Entries:  {} in {:.2}s", ours.len(), start.elapsed().as_secs_f64());
    println!();

    // === STAGE 2: JWALK REFERENCE ===
    println!("-- STAGE 2: JWALK REFERENCE --");
    let start = std::time::Instant::now();
    let mut reference = BTreeSet::new();
    for entry in jwalk::WalkDir::new(&scan_path)
        .skip_hidden(false)
        .follow_links(false)
        .min_depth(1)
    {
        match entry {
            Ok(entry) => {
                reference.insert(entry.path());
            }
            Err(e) => {
                tracing::warn!("jwalk: {}", e);
                skipped += 1;
            }
        }
    }
    println!("  Entries:  {} in {:.2}s", reference.len(), start.elapsed().as_secs_f64());
    println!();

    // === STAGE 3: COMPARISON ===
    println!("-- STAGE 3: COMPARISON --");
    let missing: Vec<_> = reference.difference(&ours).take(10).collect();
    let extra: Vec<_> = ours.difference(&reference).take(10).collect();

    for path in &missing {
        println!("  MISSING: {}", path.display());
    }
    for path in &extra {
        println!("  EXTRA:   {}", path.display());
    }

    if missing.is_empty() && extra.is_empty() {
        println!("  OK: result sets are identical");
    } else {
        println!(
            "  MISMATCH: {} missing, {} extra (showing at most 10 each)",
            reference.difference(&ours).count(),
            ours.difference(&reference).count()
        );
    }
    if skipped > 0 {
        println!("  {} errors were reported during the walks", skipped);
    }

    Ok(())
}
