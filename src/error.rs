//! Error types for the store and the validators.

use std::collections::BTreeMap;
use thiserror::Error;

/// Reasons a form payload is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("title required")]
    MissingTitle,

    #[error("fields required")]
    NoFields,

    #[error("field must have id, label, and type")]
    IncompleteField,

    #[error("duplicate field id: {0}")]
    DuplicateFieldId(String),

    #[error("unknown field type: {0}")]
    UnknownType(String),

    #[error("{kind} requires options")]
    MissingOptions { kind: String },

    /// A numeric bound is negative, inverted, or out of its allowed range.
    #[error("{0}")]
    InvalidBound(&'static str),
}

/// Errors raised by the form store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Referenced form does not exist
    #[error("form not found: {0}")]
    FormNotFound(String),

    #[error("invalid form: {0}")]
    InvalidForm(#[from] FormError),

    /// Submission failed validation, keyed by field id
    #[error("invalid answers for {} field(s)", .0.len())]
    InvalidAnswers(BTreeMap<String, String>),

    #[error("failed to persist store to {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("store data is corrupt: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;
