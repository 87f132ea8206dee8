//! Error types shared across the application
//!
//! Each layer gets its own enum; the controller only ever sees the opaque
//! [`ApiError`] and decides on a user-facing message per section.

use std::path::PathBuf;
use thiserror::Error;

/// Failure of one API call.
///
/// The controller never branches on the reason; it only needs to know that
/// the operation failed so it can show the section's banner.
#[derive(Debug, Clone, Error)]
#[error("{operation} failed: {reason}")]
pub struct ApiError {
    operation: &'static str,
    reason: String,
}

impl ApiError {
    pub fn new(operation: &'static str, reason: impl ToString) -> Self {
        Self {
            operation,
            reason: reason.to_string(),
        }
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Errors raised by the SQLite catalog.
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("invalid image metadata: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("could not prepare {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while storing an uploaded image file.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not a supported image: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("cannot store upload at {path}: {source}")]
    Store {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Failure reported by a single effect. Logged, never fatal.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct EffectError(String);

impl EffectError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Scheduler-level failures. These point at a wiring mistake in the effect
/// graph rather than at anything the user did.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("effects still pending after {limit} passes: {pending:?}")]
    PassLimitExceeded {
        limit: usize,
        pending: Vec<&'static str>,
    },
}
