use picdeck_core::DiagnosticKind;
use picdeck_storage::StoreError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ValidationError>;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("no result store at {path}: {reason}")]
    ResultStoreNotFound { path: PathBuf, reason: String },

    #[error("result store {0} is incomplete (engine still running or crashed)")]
    ResultStoreIncomplete(PathBuf),

    #[error("series not found: {0}")]
    SeriesNotFound(String),

    #[error("{count} {kind} diagnostics in the store; the selector must give an index")]
    AmbiguousSelector { kind: DiagnosticKind, count: usize },

    #[error("invalid selector: {0}")]
    InvalidSelector(String),

    #[error("shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("tolerance must be finite and non-negative, got {0}")]
    InvalidTolerance(f64),

    #[error("baseline slot '{0}' is used by more than one case")]
    DuplicateLabel(String),

    #[error("cannot read case file {path}: {message}")]
    CaseFile { path: PathBuf, message: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}
