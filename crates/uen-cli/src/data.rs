//! Commands over the open-data API and the local dump directories.

use crate::config::{self, FileConfig};
use anyhow::{Context, Result};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use uen_opendata::{DumpProgress, OpenDataClient};
use uen_records::{load_record_dir, scan_identifiers, DataSource, LoadReport, UenShapeStats};

pub fn cmd_fetch(
    file: &FileConfig,
    out_dir: Option<PathBuf>,
    data_root: Option<&Path>,
    collection: &str,
    delay_ms: Option<u64>,
    page_size: Option<usize>,
) -> Result<()> {
    let out_dir = out_dir.unwrap_or_else(|| {
        DataSource::Full.resolve(&config::data_root(data_root, file))
    });
    let mut od = config::opendata_config(file);
    if let Some(ms) = delay_ms {
        od.delay = Duration::from_millis(ms);
    }
    if let Some(size) = page_size {
        od.page_size = size;
    }

    println!(
        "{} collection {} into {}",
        "Fetching".green().bold(),
        collection.cyan(),
        out_dir.display()
    );
    let client = OpenDataClient::new(od)?;
    let report = client
        .dump_collection(collection, &out_dir, &|p: &DumpProgress| match p {
            DumpProgress::DatasetStarted { dataset } => {
                println!("\nStarting to parse {} child dataset", dataset.yellow());
            }
            DumpProgress::PageFetched {
                dataset, offset, ..
            } => {
                println!("  parsed {offset} records from {dataset}");
            }
            DumpProgress::DatasetWritten { dataset, path, kept } => {
                println!(
                    "{} {} ({} live records) -> {}",
                    "Finished".green(),
                    dataset,
                    kept,
                    path.display()
                );
            }
        })
        .with_context(|| format!("failed to dump collection {collection}"))?;

    println!(
        "\n{} {} datasets, {} live records",
        "Done".green().bold(),
        report.datasets.len(),
        report.kept()
    );
    Ok(())
}

/// Load the configured data source, echoing what was found.
pub fn load_local(root: &Path, use_sample: bool) -> Result<LoadReport> {
    let source = DataSource::from_sample_flag(use_sample);
    let dir = source.resolve(root);
    match source {
        DataSource::Sample => println!("Using sample data."),
        DataSource::Full => println!("Using full data."),
    }

    let report = load_record_dir(&dir)?;
    for skipped in &report.skipped {
        println!(
            "{} {}: {}",
            "Skipping".yellow(),
            skipped.path.display(),
            skipped.reason
        );
    }
    if use_sample {
        for (id, name) in report.records.iter() {
            println!("{id}: {name}");
        }
    }
    println!(
        "\nFound {} UENs in total ({} files).",
        report.records.len().to_string().cyan(),
        report.files_loaded
    );
    Ok(report)
}

pub fn cmd_local(file: &FileConfig, data_root: Option<&Path>, full: bool) -> Result<()> {
    let root = config::data_root(data_root, file);
    let report = load_local(&root, config::use_sample(full, file))?;
    let dupes = report.records_read - report.records.len();
    if dupes > 0 {
        println!("  {dupes} duplicate identifiers merged (last file wins)");
    }
    Ok(())
}

pub fn cmd_analyze(file: &FileConfig, dir: Option<PathBuf>) -> Result<()> {
    let dir = dir.unwrap_or_else(|| DataSource::Full.resolve(&config::data_root(None, file)));
    println!("{} {}", "Analyzing".green().bold(), dir.display());

    let ids = scan_identifiers(&dir)?;
    let stats = UenShapeStats::from_identifiers(&ids);
    println!("{stats}");
    Ok(())
}
