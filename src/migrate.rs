//! File traversal and the per-file migration pipeline.
//!
//! Each file runs read -> detect -> synthesize -> plan -> store -> rewrite
//! independently, so files are processed in parallel. The label store is
//! the one shared resource; only key resolution and the store write for a
//! file happen under a single gate, so two files never race on the same key.

use anyhow::{Context, Result};
use glob::Pattern;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use walkdir::{DirEntry, WalkDir};

use crate::config::Config;
use crate::detect::ast::check_syntax;
use crate::detect::{detect_source, Occurrence};
use crate::error::MigrateError;
use crate::fs::FileSystem;
use crate::identity::{self, LabelIdentity, MAX_DISAMBIGUATION_ATTEMPTS};
use crate::logging;
use crate::report::ScanReport;
use crate::rewrite::{self, DropReason, PlanError, PlannedEdit};
use crate::source::SourceText;
use crate::store::{self, LabelRecord, LabelStore};

/// Files selected for a run plus problems met while walking.
#[derive(Debug, Clone, Default)]
pub struct FileSet {
    pub files: Vec<PathBuf>,
    pub warnings: Vec<String>,
}

fn is_excluded_dir(entry: &DirEntry, exclude_dirs: &HashSet<&str>) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map(|name| exclude_dirs.contains(name))
            .unwrap_or(false)
}

fn compile_exclude_patterns(patterns: &[String]) -> Result<Vec<Pattern>> {
    patterns
        .iter()
        .map(|pattern| {
            Pattern::new(pattern)
                .with_context(|| format!("Invalid exclude glob pattern: {}", pattern))
        })
        .collect()
}

/// Walk the configured directories and select source files.
///
/// Missing directories and unreadable entries become warnings; the result
/// is sorted and free of duplicates.
pub fn collect_files(config: &Config) -> Result<FileSet> {
    let exclude_dirs: HashSet<&str> = config.exclude_dirs.iter().map(String::as_str).collect();
    let extensions: HashSet<String> = config
        .extensions
        .iter()
        .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
        .collect();
    let patterns = compile_exclude_patterns(&config.exclude_patterns)?;
    let root = config.root_path();

    let mut set = FileSet::default();
    let mut files: BTreeSet<PathBuf> = BTreeSet::new();

    for dir in config.scan_dirs() {
        if !dir.exists() {
            set.warnings
                .push(format!("Scan directory does not exist: {}", dir.display()));
            continue;
        }
        let walker = WalkDir::new(&dir)
            .into_iter()
            .filter_entry(|entry| !is_excluded_dir(entry, &exclude_dirs));
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    set.warnings.push(format!("Failed to read directory entry: {}", err));
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let wanted = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| extensions.contains(&e.to_ascii_lowercase()))
                .unwrap_or(false);
            if !wanted {
                continue;
            }
            let relative = path.strip_prefix(&root).unwrap_or(path);
            if patterns
                .iter()
                .any(|p| p.matches_path(path) || p.matches_path(relative))
            {
                continue;
            }
            files.insert(path.to_path_buf());
        }
    }

    set.files = files.into_iter().collect();
    Ok(set)
}

/// Cooperative cancellation: an explicit flag plus an optional deadline.
///
/// Checked before each file starts; a file already in progress finishes.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            deadline: Some(Instant::now() + timeout),
        }
    }

    pub fn abort(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
            || self
                .deadline
                .map(|deadline| Instant::now() >= deadline)
                .unwrap_or(false)
    }
}

/// Aggregate outcome of one `migrate` invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationResult {
    pub success: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Source references rewritten (or planned, in a dry run)
    pub migrated_labels_count: usize,
    pub migrated_files_count: usize,
    pub files_scanned: usize,
    /// Records newly added to the store
    pub labels_written: usize,
    pub occurrences_found: usize,
    pub dry_run: bool,
}

impl MigrationResult {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Default::default()
        }
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        let message = message.into();
        logging::warn(&message);
        self.warnings.push(message);
    }

    pub fn add_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        logging::error(&message);
        self.errors.push(message);
    }

    pub fn absorb(&mut self, outcome: FileOutcome) {
        if outcome.scanned {
            self.files_scanned += 1;
        }
        self.occurrences_found += outcome.occurrences_found;
        self.migrated_labels_count += outcome.migrated_labels;
        self.labels_written += outcome.labels_written;
        if outcome.migrated_labels > 0 {
            self.migrated_files_count += 1;
        }
        for warning in outcome.warnings {
            self.add_warning(warning);
        }
        for error in outcome.errors {
            self.add_error(error);
        }
    }

    /// Seal the result; it is successful when no file hit a hard error.
    pub fn finish(mut self) -> Self {
        self.success = self.errors.is_empty();
        self
    }
}

/// What happened to a single file.
#[derive(Debug, Clone, Default)]
pub struct FileOutcome {
    pub path: String,
    pub scanned: bool,
    pub occurrences_found: usize,
    pub migrated_labels: usize,
    pub labels_written: usize,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl FileOutcome {
    fn new(path: &Path) -> Self {
        Self {
            path: path.display().to_string(),
            ..Default::default()
        }
    }

    /// A failed store write fails the run; anything else is file-scoped.
    fn record(&mut self, err: MigrateError) {
        if err.is_store_failure() {
            self.errors.push(err.to_string());
        } else {
            self.warnings.push(err.to_string());
        }
    }
}

/// Detection results for one file.
#[derive(Debug, Clone, Default)]
pub struct FileScan {
    pub path: String,
    pub occurrences: Vec<Occurrence>,
    pub warnings: Vec<String>,
    /// Set when the file could not be read at all
    pub error: Option<String>,
}

pub fn scan_file<F: FileSystem>(fs: &F, path: &Path, config: &Config) -> FileScan {
    let mut scan = FileScan {
        path: path.display().to_string(),
        ..Default::default()
    };
    match SourceText::read(fs, path) {
        Ok(source) => {
            let detection = detect_source(&source, config);
            scan.occurrences = detection.occurrences;
            scan.warnings = detection.warnings;
        }
        Err(err) => scan.error = Some(err.to_string()),
    }
    scan
}

/// Detection-only pass over `files`.
pub fn scan_paths<F: FileSystem>(
    fs: &F,
    files: &[PathBuf],
    config: &Config,
    signal: &AbortSignal,
) -> ScanReport {
    let scans: Vec<Option<FileScan>> = files
        .par_iter()
        .map(|path| {
            if signal.is_aborted() {
                None
            } else {
                Some(scan_file(fs, path, config))
            }
        })
        .collect();

    let mut report = ScanReport::new(config.root.clone());
    for (path, scan) in files.iter().zip(scans) {
        let Some(scan) = scan else {
            report
                .warnings
                .push(format!("{}: skipped, run aborted", path.display()));
            continue;
        };
        for warning in &scan.warnings {
            logging::warn(warning);
        }
        report.warnings.extend(scan.warnings.iter().cloned());
        match scan.error {
            // Unreadable files are file-scoped: recorded, not fatal
            Some(error) => {
                logging::warn(&error);
                report.warnings.push(error);
            }
            None => report.add_file(&scan.path, &scan.occurrences, config),
        }
    }
    report
}

/// Runs the migration pipeline against a file system and a label store.
pub struct Migrator<'a, F: FileSystem, S: LabelStore> {
    config: &'a Config,
    fs: &'a F,
    store: &'a S,
    signal: AbortSignal,
    dry_run: bool,
    store_gate: Mutex<()>,
}

/// An occurrence with its final identity.
struct Resolved<'o> {
    index: usize,
    occurrence: &'o Occurrence,
    identity: LabelIdentity,
}

impl<'a, F: FileSystem, S: LabelStore> Migrator<'a, F, S> {
    pub fn new(config: &'a Config, fs: &'a F, store: &'a S) -> Self {
        Self {
            config,
            fs,
            store,
            signal: AbortSignal::new(),
            dry_run: false,
            store_gate: Mutex::new(()),
        }
    }

    pub fn with_signal(mut self, signal: AbortSignal) -> Self {
        self.signal = signal;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Migrate every file and merge the outcomes in input order.
    pub fn run(&self, files: &[PathBuf]) -> MigrationResult {
        let outcomes: Vec<FileOutcome> = files
            .par_iter()
            .map(|path| self.migrate_file(path))
            .collect();

        let mut result = MigrationResult::new(self.dry_run);
        for outcome in outcomes {
            result.absorb(outcome);
        }
        result.finish()
    }

    /// Run the whole pipeline for one file.
    pub fn migrate_file(&self, path: &Path) -> FileOutcome {
        let mut outcome = FileOutcome::new(path);
        if self.signal.is_aborted() {
            outcome
                .warnings
                .push(format!("{}: skipped, run aborted", outcome.path));
            return outcome;
        }

        let source = match SourceText::read(self.fs, path) {
            Ok(source) => source,
            Err(err) => {
                outcome.record(err);
                return outcome;
            }
        };
        outcome.scanned = true;

        let detection = detect_source(&source, self.config);
        outcome.warnings.extend(detection.warnings);
        outcome.occurrences_found = detection.occurrences.len();
        if detection.occurrences.is_empty() {
            return outcome;
        }
        logging::debug(&format!(
            "{}: {} occurrence(s)",
            outcome.path,
            detection.occurrences.len()
        ));

        let mut candidates: Vec<Resolved<'_>> = Vec::new();
        for (index, occ) in detection.occurrences.iter().enumerate() {
            match identity::synthesize(occ, self.config) {
                Ok(identity) => candidates.push(Resolved {
                    index,
                    occurrence: occ,
                    identity,
                }),
                Err(err) => outcome.warnings.push(format!(
                    "{}:{}:{}: dropped, {}",
                    outcome.path, occ.line, occ.column, err
                )),
            }
        }

        // A reference only differs from another by its key, which never
        // changes whether the file parses. The rewrite is planned and
        // checked with the synthesized keys before the store gate is taken.
        let edits = self.plan_edits(&source, &candidates, &mut outcome);
        let trial = rewrite::apply_edits(source.text(), &edits);
        for dropped in &trial.dropped {
            if let Some(occ) = detection.occurrences.get(dropped.index) {
                outcome.warnings.push(drop_message(&source, occ, dropped.reason));
            }
        }
        if trial.applied.is_empty() {
            return outcome;
        }
        let rewritten = SourceText::new(source.path(), trial.text);
        if check_syntax(&rewritten).is_err() && check_syntax(&source).is_ok() {
            outcome.warnings.push(format!(
                "{}: rewrite would not parse, file left unchanged",
                outcome.path
            ));
            return outcome;
        }
        let applied: HashSet<usize> = trial.applied.iter().copied().collect();
        candidates.retain(|c| applied.contains(&c.index));

        let resolved = {
            let _gate = self
                .store_gate
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());

            let resolved = match self.resolve_keys(candidates, &outcome.path) {
                Ok(resolved) => resolved,
                Err(err) => {
                    outcome.record(err);
                    return outcome;
                }
            };
            let records: Vec<LabelRecord> = resolved
                .iter()
                .filter_map(|r| r.as_ref().ok())
                .map(|r| {
                    LabelRecord::new(
                        r.identity.scope.as_str(),
                        r.identity.key.as_str(),
                        self.config.language.as_str(),
                        r.occurrence.value.as_str(),
                    )
                })
                .collect();

            if self.dry_run {
                outcome.labels_written = self.count_new(&records);
            } else {
                match store::write_labels(self.store, &records) {
                    Ok(written) => {
                        outcome.labels_written = written.written;
                        outcome.warnings.extend(written.warnings());
                    }
                    Err(err) => {
                        // No label, no reference: leave the file untouched
                        outcome.record(MigrateError::StoreWrite {
                            path: outcome.path.clone(),
                            message: err.to_string(),
                        });
                        return outcome;
                    }
                }
            }
            resolved
        };

        let mut final_edits = Vec::new();
        for r in resolved {
            match r {
                Ok(r) => {
                    let reference =
                        rewrite::reference_expr(&self.config.label_object, &r.identity.key);
                    if let Ok(edit) =
                        rewrite::plan_edit(source.text(), r.occurrence, r.index, &reference)
                    {
                        final_edits.push(edit);
                    }
                }
                Err(warning) => outcome.warnings.push(warning),
            }
        }
        if final_edits.is_empty() {
            return outcome;
        }
        let rewritten = rewrite::apply_edits(source.text(), &final_edits);
        outcome.migrated_labels = rewritten.applied.len();

        if !self.dry_run {
            if let Err(err) = self.fs.write_atomic(path, &rewritten.text) {
                outcome.migrated_labels = 0;
                outcome.record(MigrateError::io(outcome.path.clone(), format!("{:#}", err)));
                return outcome;
            }
            logging::debug(&format!(
                "{}: rewrote {} reference(s)",
                outcome.path, outcome.migrated_labels
            ));
        }
        outcome
    }

    /// Pick a key per occurrence that does not clash with a different text,
    /// either earlier in this file or already in the store.
    ///
    /// An occurrence that runs out of keys comes back as a warning.
    fn resolve_keys<'o>(
        &self,
        candidates: Vec<Resolved<'o>>,
        path: &str,
    ) -> Result<Vec<Result<Resolved<'o>, String>>, MigrateError> {
        let language = self.config.language.as_str();
        let mut taken: HashMap<(String, String), String> = HashMap::new();
        let mut resolved = Vec::with_capacity(candidates.len());

        for Resolved {
            index,
            occurrence: occ,
            identity: base,
        } in candidates
        {
            let mut chosen = None;
            for attempt in 0..MAX_DISAMBIGUATION_ATTEMPTS {
                let key = identity::disambiguate(&base.key, &occ.value, attempt);
                let slot = (base.scope.clone(), key.clone());
                let existing = match taken.get(&slot) {
                    Some(text) => Some(text.clone()),
                    None => self
                        .store
                        .get(&base.scope, &key, language)
                        .map_err(|e| MigrateError::StoreWrite {
                            path: path.to_string(),
                            message: e.to_string(),
                        })?,
                };
                match existing {
                    Some(text) if text != occ.value => continue,
                    _ => {
                        taken.insert(slot, occ.value.clone());
                        chosen = Some(key);
                        break;
                    }
                }
            }
            resolved.push(match chosen {
                Some(key) => Ok(Resolved {
                    index,
                    occurrence: occ,
                    identity: LabelIdentity {
                        scope: base.scope,
                        key,
                    },
                }),
                None => Err(format!(
                    "{}:{}:{}: no free key for {:?} in scope {}",
                    path, occ.line, occ.column, occ.value, base.scope
                )),
            });
        }
        Ok(resolved)
    }

    fn plan_edits(
        &self,
        source: &SourceText,
        resolved: &[Resolved<'_>],
        outcome: &mut FileOutcome,
    ) -> Vec<PlannedEdit> {
        let mut edits = Vec::with_capacity(resolved.len());
        for r in resolved {
            let reference = rewrite::reference_expr(&self.config.label_object, &r.identity.key);
            match rewrite::plan_edit(source.text(), r.occurrence, r.index, &reference) {
                Ok(edit) => edits.push(edit),
                Err(PlanError::UnsafeSite) => outcome.warnings.push(format!(
                    "{}:{}:{}: {:?} left in place, position cannot be rewritten safely",
                    outcome.path, r.occurrence.line, r.occurrence.column, r.occurrence.raw_text
                )),
                Err(PlanError::StaleSpan) => outcome.warnings.push(format!(
                    "{}:{}:{}: {:?} no longer matches the source, skipped",
                    outcome.path, r.occurrence.line, r.occurrence.column, r.occurrence.raw_text
                )),
            }
        }
        edits
    }

    /// Records a dry run would add to the store.
    fn count_new(&self, records: &[LabelRecord]) -> usize {
        let unique: HashSet<&LabelRecord> = records.iter().collect();
        unique
            .into_iter()
            .filter(|r| {
                matches!(
                    self.store.get(&r.scope, &r.key, &r.language_code),
                    Ok(None)
                )
            })
            .count()
    }
}

fn drop_message(source: &SourceText, occ: &Occurrence, reason: DropReason) -> String {
    match reason {
        DropReason::Overlap => MigrateError::AmbiguousSpan {
            path: source.path().to_string(),
            line: occ.line,
            column: occ.column,
            text: occ.raw_text.clone(),
        }
        .to_string(),
        DropReason::StaleSpan => format!(
            "{}:{}:{}: {:?} changed before rewrite, skipped",
            source.path(),
            occ.line,
            occ.column,
            occ.raw_text
        ),
    }
}
