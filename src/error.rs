use thiserror::Error;

/// Failures raised by the detection and migration engine.
///
/// Everything except `Config` is scoped to a single file (or a single
/// occurrence, for `AmbiguousSpan`); the traversal records them and keeps
/// going with the remaining files.
#[derive(Debug, Error)]
pub enum MigrateError {
    /// File could not be read or written (missing, permissions, binary content).
    #[error("I/O error on {path}: {message}")]
    Io { path: String, message: String },

    /// The AST detector could not parse the file.
    #[error("parse error in {path}:{line}:{column}: {message}")]
    Parse {
        path: String,
        line: usize,
        column: usize,
        message: String,
    },

    /// Two planned edits overlap; the left one is dropped.
    #[error("overlapping edit at {path}:{line}:{column} for {text:?} dropped")]
    AmbiguousSpan {
        path: String,
        line: usize,
        column: usize,
        text: String,
    },

    /// The label store refused a batch; the file is left untouched.
    #[error("label store write failed for {path}: {message}")]
    StoreWrite { path: String, message: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl MigrateError {
    pub fn io(path: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// True for the variant that must block a file's rewrite.
    pub fn is_store_failure(&self) -> bool {
        matches!(self, Self::StoreWrite { .. })
    }
}

/// Errors surfaced by a `LabelStore` implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access label store {path}: {message}")]
    Access { path: String, message: String },

    #[error("label store {path} is corrupt: {message}")]
    Corrupt { path: String, message: String },

    #[error("label store rejected the write: {0}")]
    Rejected(String),
}
