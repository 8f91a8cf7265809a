use std::path::PathBuf;

use facematch_vision::ExtractError;
use thiserror::Error;

/// Failures of the durable record store.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode store {path}: {message}")]
    Encode { path: PathBuf, message: String },
    #[error("failed to decode store {path}: {message}")]
    Decode { path: PathBuf, message: String },
    #[error("corrupt record {identity_id}: {reason}")]
    Corrupt { identity_id: String, reason: String },
}

/// Every failure the recognition core can surface to its caller.
#[derive(Error, Debug)]
pub enum FaceError {
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error("identity not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error("invalid record: {0}")]
    InvalidRecord(String),
    #[error("embedding has {actual} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("threshold must be a positive finite number, got {0}")]
    InvalidThreshold(f64),
}
