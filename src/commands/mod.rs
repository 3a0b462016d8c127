pub mod migrate;
pub mod scan;
pub mod seed;

use anyhow::{bail, Result};
use std::path::PathBuf;

use crate::config::Config;
use crate::logging;
use crate::migrate::collect_files;

/// Select the files to process; having none at all is fatal.
fn files_or_fail(config: &Config) -> Result<Vec<PathBuf>> {
    let set = collect_files(config)?;
    for warning in &set.warnings {
        logging::warn(warning);
    }
    if set.files.is_empty() {
        let dirs: Vec<String> = config
            .scan_dirs()
            .iter()
            .map(|d| d.display().to_string())
            .collect();
        bail!(
            "No source files with extensions {:?} found in {}",
            config.extensions,
            dirs.join(", ")
        );
    }
    logging::debug(&format!("Selected {} file(s)", set.files.len()));
    Ok(set.files)
}
