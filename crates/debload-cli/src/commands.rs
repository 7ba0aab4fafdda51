use std::path::Path;

use anyhow::Context;
use colored::Colorize;
use debload_hash::{hash_file, hash_symlink};
use debload_loader::{walk_tree, BatchReport, LoaderConfig, Loader, Manifest, PackageStatus};
use debload_store::DirArchiveStore;
use debload_types::MultiHash;
use serde_json::json;

use crate::cli::{Cli, Command, HashArgs, LoadArgs, OutputFormat};

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Load(args) => cmd_load(args, &cli.format),
        Command::Hash(args) => cmd_hash(args, &cli.format),
    }
}

fn cmd_load(args: LoadArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => LoaderConfig::load(path)
            .with_context(|| format!("reading configuration {}", path.display()))?,
        None => LoaderConfig::default(),
    };
    if let Some(work_dir) = args.work_dir {
        config.work_dir = Some(work_dir);
    }
    if args.extract_timeout.is_some() {
        config.extractor.timeout_secs = args.extract_timeout;
    }
    if args.keep_duplicates {
        config.remove_duplicates = false;
    }

    let manifest = Manifest::load(&args.manifest)
        .with_context(|| format!("reading manifest {}", args.manifest.display()))?;
    let store = DirArchiveStore::open(&args.store)
        .with_context(|| format!("opening archive {}", args.store.display()))?;

    let loader = Loader::from_config(store, &config);
    let report = loader
        .load(manifest.into_packages())
        .context("loading batch")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_report(&report),
    }
    Ok(())
}

fn print_report(report: &BatchReport) {
    for package in &report.packages {
        match &package.status {
            PackageStatus::Loaded { revision, .. } => println!(
                "{} {} {}  revision {}",
                "✓".green(),
                package.name.bold(),
                package.version.to_string().yellow(),
                revision.short_hex().dimmed()
            ),
            PackageStatus::Skipped { kind, reason } => println!(
                "{} {} {}  {} ({})",
                "✗".red(),
                package.name.bold(),
                package.version.to_string().yellow(),
                reason,
                kind.dimmed()
            ),
        }
    }
    println!();
    println!(
        "Loaded {} of {} packages",
        report.loaded().to_string().bold(),
        report.packages.len()
    );
    println!(
        "  Contents: {} written, {} already stored",
        report.contents_written, report.contents_skipped
    );
    println!(
        "  Directories: {} written, {} already stored",
        report.directories_written, report.directories_skipped
    );
    println!(
        "  Revisions: {}  Releases: {}  Branches: {}",
        report.revisions, report.releases, report.occurrences
    );
    println!("  Flushes: {}", report.flushes);
}

fn cmd_hash(args: HashArgs, format: &OutputFormat) -> anyhow::Result<()> {
    for path in &args.paths {
        let meta = std::fs::symlink_metadata(path)
            .with_context(|| format!("cannot stat {}", path.display()))?;
        if meta.is_dir() {
            let walked = walk_tree(path).with_context(|| format!("walking {}", path.display()))?;
            let root = walked
                .root()
                .with_context(|| format!("no tree for {}", path.display()))?;
            match format {
                OutputFormat::Json => println!(
                    "{}",
                    json!({ "path": path, "directory": root.id.to_hex(), "objects": walked.len() })
                ),
                OutputFormat::Text => println!(
                    "{}  {}  ({} objects)",
                    root.id.to_hex().yellow(),
                    path.display(),
                    walked.len()
                ),
            }
        } else {
            let (hashes, length) = if meta.file_type().is_symlink() {
                hash_symlink(path)
            } else {
                hash_file(path)
            }
            .with_context(|| format!("hashing {}", path.display()))?;
            print_hashes(path, &hashes, length, format);
        }
    }
    Ok(())
}

fn print_hashes(path: &Path, hashes: &MultiHash, length: u64, format: &OutputFormat) {
    match format {
        OutputFormat::Json => println!(
            "{}",
            json!({
                "path": path,
                "length": length,
                "sha1_git": hashes.sha1_git.to_hex(),
                "sha1": hashes.sha1_hex(),
                "sha256": hashes.sha256_hex(),
                "blake3": hashes.blake3_hex(),
            })
        ),
        OutputFormat::Text => {
            println!("{}", path.display().to_string().bold());
            println!("  sha1_git {}", hashes.sha1_git.to_hex().yellow());
            println!("  sha1     {}", hashes.sha1_hex());
            println!("  sha256   {}", hashes.sha256_hex());
            println!("  blake3   {}", hashes.blake3_hex());
            println!("  length   {length}");
        }
    }
}
