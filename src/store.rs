//! Label store: the only durable state besides the rewritten sources.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::error::StoreError;
use crate::fs::FileSystem;
use crate::logging;

/// One persisted `(scope, key, language, text)` tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelRecord {
    pub scope: String,
    pub key: String,
    pub language_code: String,
    pub text: String,
}

impl LabelRecord {
    pub fn new(
        scope: impl Into<String>,
        key: impl Into<String>,
        language_code: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            scope: scope.into(),
            key: key.into(),
            language_code: language_code.into(),
            text: text.into(),
        }
    }
}

/// Result of an upsert-or-skip batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Records newly stored
    pub written: usize,
    /// Records that were already present with the same text
    pub existing: Vec<LabelRecord>,
}

impl BatchOutcome {
    pub fn warnings(&self) -> Vec<String> {
        self.existing
            .iter()
            .map(|r| {
                format!(
                    "label {}.{} ({}) already exists; reusing it",
                    r.scope, r.key, r.language_code
                )
            })
            .collect()
    }
}

/// Upsert/lookup API of the external label store.
pub trait LabelStore: Send + Sync {
    fn get(&self, scope: &str, key: &str, language: &str) -> Result<Option<String>, StoreError>;

    /// Store one record. Returns false when it already existed.
    fn put(&self, record: &LabelRecord) -> Result<bool, StoreError> {
        Ok(self.put_batch(std::slice::from_ref(record))?.written == 1)
    }

    /// Store a batch atomically: either every new record is persisted or none is.
    ///
    /// A record whose identity already holds a different text rejects the
    /// whole batch.
    fn put_batch(&self, records: &[LabelRecord]) -> Result<BatchOutcome, StoreError>;

    fn count_by_scope(&self, scope: &str) -> Result<usize, StoreError>;
}

/// scope -> key -> language -> text
pub type LabelMap = BTreeMap<String, BTreeMap<String, BTreeMap<String, String>>>;

fn lookup<'a>(map: &'a LabelMap, scope: &str, key: &str, language: &str) -> Option<&'a String> {
    map.get(scope)?.get(key)?.get(language)
}

/// Merge `records` into `map`, or leave it untouched on conflict.
fn merge_batch(map: &mut LabelMap, records: &[LabelRecord]) -> Result<BatchOutcome, StoreError> {
    let mut staged: BTreeMap<(&str, &str, &str), &str> = BTreeMap::new();
    let mut outcome = BatchOutcome::default();

    for record in records {
        let id = (
            record.scope.as_str(),
            record.key.as_str(),
            record.language_code.as_str(),
        );
        let current = lookup(map, id.0, id.1, id.2)
            .map(String::as_str)
            .or_else(|| staged.get(&id).copied());
        match current {
            Some(text) if text == record.text => {
                if !staged.contains_key(&id) && !outcome.existing.contains(record) {
                    outcome.existing.push(record.clone());
                }
            }
            Some(text) => {
                return Err(StoreError::Rejected(format!(
                    "{}.{} ({}) already holds {:?}, refusing {:?}",
                    record.scope, record.key, record.language_code, text, record.text
                )));
            }
            None => {
                staged.insert(id, record.text.as_str());
            }
        }
    }

    outcome.written = staged.len();
    for ((scope, key, language), text) in staged {
        map.entry(scope.to_string())
            .or_default()
            .entry(key.to_string())
            .or_default()
            .insert(language.to_string(), text.to_string());
    }
    Ok(outcome)
}

fn count_scope(map: &LabelMap, scope: &str) -> usize {
    map.get(scope)
        .map(|keys| keys.values().map(|langs| langs.len()).sum())
        .unwrap_or(0)
}

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panic in another writer leaves the data consistent; keep going
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Label store persisted as a pretty-printed JSON file.
///
/// Writers are serialized by an in-process mutex and an exclusive lock on
/// a sidecar `.lock` file; the file is replaced atomically.
pub struct JsonLabelStore<F: FileSystem> {
    fs: F,
    path: PathBuf,
    gate: Mutex<()>,
}

impl<F: FileSystem> JsonLabelStore<F> {
    pub fn new(fs: F, path: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            path: path.into(),
            gate: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn access_error(&self, err: impl std::fmt::Display) -> StoreError {
        StoreError::Access {
            path: self.path.display().to_string(),
            message: err.to_string(),
        }
    }

    /// Read the whole store; a missing file is an empty store.
    pub fn load(&self) -> Result<LabelMap, StoreError> {
        if !self.fs.exists(&self.path) {
            return Ok(LabelMap::new());
        }
        let content = self
            .fs
            .read_to_string(&self.path)
            .map_err(|e| self.access_error(e))?;
        if content.trim().is_empty() {
            return Ok(LabelMap::new());
        }
        serde_json::from_str(&content).map_err(|e| StoreError::Corrupt {
            path: self.path.display().to_string(),
            message: e.to_string(),
        })
    }

    fn save(&self, map: &LabelMap) -> Result<(), StoreError> {
        let mut json = serde_json::to_string_pretty(map).map_err(|e| self.access_error(e))?;
        json.push('\n');
        self.fs
            .write_atomic(&self.path, &json)
            .map_err(|e| self.access_error(e))
    }

    fn ensure_parent(&self) -> Result<(), StoreError> {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() && !self.fs.exists(parent) => self
                .fs
                .create_dir_all(parent)
                .map_err(|e| self.access_error(e)),
            _ => Ok(()),
        }
    }
}

impl<F: FileSystem> LabelStore for JsonLabelStore<F> {
    fn get(&self, scope: &str, key: &str, language: &str) -> Result<Option<String>, StoreError> {
        let map = self.load()?;
        Ok(lookup(&map, scope, key, language).cloned())
    }

    fn put_batch(&self, records: &[LabelRecord]) -> Result<BatchOutcome, StoreError> {
        if records.is_empty() {
            return Ok(BatchOutcome::default());
        }
        let _gate = guard(&self.gate);
        self.ensure_parent()?;
        let _lock = self.fs.lock(&self.path).map_err(|e| self.access_error(e))?;

        let mut map = self.load()?;
        let outcome = merge_batch(&mut map, records)?;
        if outcome.written > 0 {
            self.save(&map)?;
            logging::debug(&format!(
                "Stored {} label(s) in {}",
                outcome.written,
                self.path.display()
            ));
        }
        Ok(outcome)
    }

    fn count_by_scope(&self, scope: &str) -> Result<usize, StoreError> {
        Ok(count_scope(&self.load()?, scope))
    }
}

/// Store kept in memory; used for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryLabelStore {
    labels: Mutex<LabelMap>,
}

impl MemoryLabelStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a copy of existing labels.
    pub fn len(&self) -> usize {
        guard(&self.labels)
            .values()
            .flat_map(|keys| keys.values())
            .map(|langs| langs.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LabelStore for MemoryLabelStore {
    fn get(&self, scope: &str, key: &str, language: &str) -> Result<Option<String>, StoreError> {
        Ok(lookup(&guard(&self.labels), scope, key, language).cloned())
    }

    fn put_batch(&self, records: &[LabelRecord]) -> Result<BatchOutcome, StoreError> {
        let mut labels = guard(&self.labels);
        merge_batch(&mut labels, records)
    }

    fn count_by_scope(&self, scope: &str) -> Result<usize, StoreError> {
        Ok(count_scope(&guard(&self.labels), scope))
    }
}

/// Write a batch, dropping exact duplicates first and logging reused records.
pub fn write_labels<S: LabelStore + ?Sized>(
    store: &S,
    records: &[LabelRecord],
) -> Result<BatchOutcome, StoreError> {
    let mut unique: Vec<LabelRecord> = Vec::with_capacity(records.len());
    for record in records {
        if !unique.contains(record) {
            unique.push(record.clone());
        }
    }
    let outcome = store.put_batch(&unique)?;
    for warning in outcome.warnings() {
        logging::debug(&warning);
    }
    Ok(outcome)
}

/// Seed `scope` with `entries` (key -> text) unless it already has labels.
///
/// Returns `None` when the scope was already initialized.
pub fn seed_scope<S: LabelStore + ?Sized>(
    store: &S,
    scope: &str,
    language: &str,
    entries: &BTreeMap<String, String>,
) -> Result<Option<usize>, StoreError> {
    if store.count_by_scope(scope)? > 0 {
        return Ok(None);
    }
    let records: Vec<LabelRecord> = entries
        .iter()
        .map(|(key, text)| LabelRecord::new(scope, key.as_str(), language, text.as_str()))
        .collect();
    let outcome = store.put_batch(&records)?;
    Ok(Some(outcome.written))
}
