use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context, Result};

use fsenum_rs::matching::{MatchCasing, MatchType};
use fsenum_rs::scanner::{self, EntryKind, EnumerationOptions, FileAttributes};

const USAGE: &str = "usage: fsenum <root> [expression] [--recurse] [--dirs|--all] [--dos] \
[--case-sensitive|--case-insensitive] [--depth N] [--hidden] [--strict] [--buffer N]";

/// Parsed command line.
struct Args {
    root: PathBuf,
    expression: String,
    kind: EntryKind,
    options: EnumerationOptions,
}

fn parse_args() -> Result<Args> {
    let mut positional = Vec::new();
    let mut kind = EntryKind::Files;
    let mut options = EnumerationOptions::default();

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--recurse" | "-r" => options.recurse_subdirectories = true,
            "--dirs" => kind = EntryKind::Directories,
            "--all" => kind = EntryKind::Both,
            "--dos" => options.match_type = MatchType::ExtendedDos,
            "--case-sensitive" => options.match_casing = MatchCasing::CaseSensitive,
            "--case-insensitive" => options.match_casing = MatchCasing::CaseInsensitive,
            "--hidden" => options.attributes_to_skip = FileAttributes::empty(),
            "--strict" => options.ignore_inaccessible = false,
            "--depth" => {
                let value = args.next().context("--depth needs a value")?;
                options.max_recursion_depth =
                    value.parse().with_context(|| format!("bad depth {value:?}"))?;
                options.recurse_subdirectories = true;
            }
            "--buffer" => {
                let value = args.next().context("--buffer needs a value")?;
                options.buffer_size =
                    value.parse().with_context(|| format!("bad buffer size {value:?}"))?;
            }
            "-h" | "--help" => {
                println!("{USAGE}");
                std::process::exit(0);
            }
            flag if flag.starts_with("--") => bail!("unknown flag {flag}\n{USAGE}"),
            _ => positional.push(arg),
        }
    }

    let mut positional = positional.into_iter();
    let root = positional
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let expression = positional.next().unwrap_or_else(|| "*".to_string());
    if let Some(extra) = positional.next() {
        bail!("unexpected argument {extra:?}\n{USAGE}");
    }

    Ok(Args {
        root,
        expression,
        kind,
        options,
    })
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fsenum_rs=info".parse()?),
        )
        .init();

    let args = parse_args()?;
    tracing::info!(
        "fsenum starting, root: {:?}, expression: {:?}",
        args.root,
        args.expression
    );

    let start = Instant::now();
    let entries = scanner::create(
        scanner::StdDirectoryQuery,
        &args.root,
        &args.expression,
        args.options,
        args.kind,
        |entry| (entry.to_specified_full_path(), entry.len()),
    )
    .with_context(|| format!("cannot enumerate {}", args.root.display()))?;

    let mut count = 0usize;
    let mut total_bytes = 0u64;
    for entry in entries {
        let (path, size) = entry.context("enumeration failed")?;
        println!("{}", path.display());
        count += 1;
        total_bytes += size;
    }

    tracing::info!(
        "{} entries, {:.2} MB in {:.2}s",
        count,
        total_bytes as f64 / 1_048_576.0,
        start.elapsed().as_secs_f64()
    );
    Ok(())
}
