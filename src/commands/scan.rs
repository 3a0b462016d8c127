use anyhow::{Context, Result};
use std::path::Path;

use crate::config::{Config, OutputFormat};
use crate::fs::{FileSystem, RealFileSystem};
use crate::logging;
use crate::migrate::{scan_paths, AbortSignal};
use crate::report::{self, ScanReport};

pub fn run(config: &Config, line_numbers: bool, report_path: Option<&Path>) -> Result<ScanReport> {
    logging::info("=== label-migrate scan ===\n");
    logging::info("Configuration:");
    logging::info(&format!("  Root: {}", config.root));
    logging::info(&format!("  Directories: {:?}", config.dirs));
    logging::info(&format!("  Strategies: {:?}", config.strategies));
    logging::info("");

    let files = super::files_or_fail(config)?;
    let fs = RealFileSystem;
    let report = scan_paths(&fs, &files, config, &AbortSignal::new());

    match config.output_format {
        OutputFormat::Json => println!("{}", report::to_json(&report)?),
        OutputFormat::Text => print!("{}", report::render_scan_text(&report, line_numbers)),
    }

    if let Some(path) = report_path {
        let markdown = report::render_scan_markdown(&report, line_numbers);
        fs.write_atomic(path, &markdown)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
        logging::info(&format!("\nReport written to {}", path.display()));
    }

    Ok(report)
}
