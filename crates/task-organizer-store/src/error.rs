//! Error types for record store operations.

use thiserror::Error;

/// Errors that can occur while talking to a record store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Collection name or record key breaks the database key rules.
    #[error("Invalid {kind} '{value}': {reason}")]
    InvalidPath {
        /// Which path segment was rejected.
        kind: &'static str,
        /// The rejected value.
        value: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// Database URL cannot be used.
    #[error("Invalid database URL: {0}")]
    InvalidUrl(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to encode or decode JSON.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// HTTP transport failed.
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Database answered with a non-success status.
    #[error("Database responded with status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, if any.
        body: String,
    },

    /// Blocking file work did not run to completion.
    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// Subscriptions spawn background feeds and need a tokio runtime.
    #[error("No tokio runtime available for the subscription feed")]
    NoRuntime,
}
