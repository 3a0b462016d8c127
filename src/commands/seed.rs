use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;
use std::path::Path;

use crate::config::Config;
use crate::fs::RealFileSystem;
use crate::logging;
use crate::store::{seed_scope, JsonLabelStore};

/// Load `{ "key": "text" }` from `from` into `scope` unless the scope is
/// already initialized.
pub fn run(config: &Config, scope: &str, from: &Path) -> Result<Option<usize>> {
    logging::info("=== label-migrate seed ===\n");

    let content = std::fs::read_to_string(from)
        .with_context(|| format!("Failed to read seed file: {}", from.display()))?;
    let entries: BTreeMap<String, String> = serde_json::from_str(&content)
        .with_context(|| format!("Seed file must be a JSON object of strings: {}", from.display()))?;
    if let Some(empty) = entries.keys().find(|k| k.trim().is_empty()) {
        bail!("Seed file contains an empty key: {:?}", empty);
    }

    let store = JsonLabelStore::new(RealFileSystem, config.store_path());
    let seeded = seed_scope(&store, scope, &config.language, &entries)
        .with_context(|| format!("Failed to seed scope '{}'", scope))?;

    match seeded {
        Some(count) => logging::info(&format!(
            "Seeded {} label(s) into scope '{}' ({}) in {}.",
            count,
            scope,
            config.language,
            store.path().display()
        )),
        None => logging::info(&format!(
            "Scope '{}' already has labels; nothing seeded.",
            scope
        )),
    }
    Ok(seeded)
}
