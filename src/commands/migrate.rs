use anyhow::{Context, Result};
use std::time::Duration;

use crate::config::{Config, OutputFormat};
use crate::fs::{FileSystem, RealFileSystem};
use crate::logging;
use crate::migrate::{AbortSignal, MigrationResult, Migrator};
use crate::report;
use crate::store::JsonLabelStore;

pub fn run(config: &Config, dry_run: bool, timeout: Option<u64>) -> Result<MigrationResult> {
    logging::info("=== label-migrate migrate ===\n");
    logging::info("Configuration:");
    logging::info(&format!("  Root: {}", config.root));
    logging::info(&format!("  Directories: {:?}", config.dirs));
    let store = JsonLabelStore::new(RealFileSystem, config.store_path());
    logging::info(&format!("  Label store: {}", store.path().display()));
    logging::info(&format!("  Language: {}", config.language));
    if dry_run {
        logging::info("  Mode: dry run (no files or labels are written)");
    }
    logging::info("");

    let files = super::files_or_fail(config)?;
    let fs = RealFileSystem;
    let signal = match timeout {
        Some(secs) => AbortSignal::with_timeout(Duration::from_secs(secs)),
        None => AbortSignal::new(),
    };

    let result = Migrator::new(config, &fs, &store)
        .with_signal(signal)
        .dry_run(dry_run)
        .run(&files);

    match config.output_format {
        OutputFormat::Json => println!("{}", report::to_json(&result)?),
        OutputFormat::Text => print!("{}", report::render_migration_text(&result)),
    }

    let report_path = config.report_file();
    fs.write_atomic(&report_path, &report::render_migration_markdown(&result))
        .with_context(|| format!("Failed to write report {}", report_path.display()))?;
    logging::info(&format!("\nReport written to {}", report_path.display()));

    Ok(result)
}
