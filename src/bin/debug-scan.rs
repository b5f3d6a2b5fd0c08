/// Debug scanner: enumerates several roots at once, one enumerator per root
/// on the rayon pool, and prints per-root totals
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use rayon::prelude::*;

use fsenum_rs::scanner::{enumerate_snapshots, EntryKind, EnumerationError, EnumerationOptions};

struct RootSummary {
    root: PathBuf,
    files: usize,
    dirs: usize,
    bytes: u64,
    seconds: f64,
}

fn scan_root(root: PathBuf) -> Result<RootSummary, EnumerationError> {
    let start = Instant::now();
    let options = EnumerationOptions::default().with_recurse_subdirectories(true);

    let mut summary = RootSummary {
        root: root.clone(),
        files: 0,
        dirs: 0,
        bytes: 0,
        seconds: 0.0,
    };
    for entry in enumerate_snapshots(&root, "*", options, EntryKind::Both)? {
        let entry = entry?;
        if entry.is_dir() {
            summary.dirs += 1;
        } else {
            summary.files += 1;
            summary.bytes += entry.size;
        }
    }
    summary.seconds = start.elapsed().as_secs_f64();
    Ok(summary)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fsenum_rs=debug".parse()?),
        )
        .init();

    let mut roots: Vec<PathBuf> = std::env::args().skip(1).map(PathBuf::from).collect();
    if roots.is_empty() {
        roots.push(PathBuf::from("."));
    }

    let start = Instant::now();
    let results: Vec<_> = roots
        .into_par_iter()
        .map(|root| (root.clone(), scan_root(root)))
        .collect();

    println!("{:<40} {:>10} {:>10} {:>12} {:>8}", "root", "files", "dirs", "MB", "secs");
    for (root, result) in results {
        match result {
            Ok(s) => println!(
                "{:<40} {:>10} {:>10} {:>12.2} {:>8.2}",
                s.root.display(),
                s.files,
                s.dirs,
                s.bytes as f64 / 1_048_576.0,
                s.seconds
            ),
            Err(e) => {
                tracing::error!("{}: {}", root.display(), e);
            }
        }
    }
    println!("Total wall time: {:.2}s", start.elapsed().as_secs_f64());

    Ok(())
}
