//! Provider error types.

use std::time::Duration;

use bricks_api::ApiError;
use thiserror::Error;

/// Configuration problems caught before any remote call.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("only one of {fields:?} may be set in {group}")]
    Conflict { group: String, fields: Vec<String> },

    #[error("one of {fields:?} must be set in {group}")]
    NoneSet {
        group: String,
        fields: Vec<&'static str>,
    },

    #[error("required field {path} is missing")]
    MissingField { path: String },

    #[error("{path} must be a {expected}, got {found}")]
    TypeMismatch {
        path: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("{path} value {value} does not fit in a 32-bit integer")]
    OutOfRange { path: String, value: i64 },

    #[error("{path} allows at most one block, got {found}")]
    TooManyBlocks { path: String, found: usize },

    #[error("invalid value for {path}: {reason}")]
    InvalidValue { path: String, reason: String },

    #[error("invalid resource id: {0}")]
    InvalidHandle(String),
}

/// Errors surfaced by reconciliation.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("timed out after {waited:?} waiting for {handle}")]
    Timeout { handle: String, waited: Duration },

    #[error("cancelled while waiting for {handle}")]
    Cancelled { handle: String },

    #[error("{kind} has no id; create it first")]
    MissingHandle { kind: &'static str },
}

/// Result type for reconciliation.
pub type Result<T> = std::result::Result<T, ProviderError>;
