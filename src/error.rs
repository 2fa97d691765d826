//! Error types shared across the puller.
//!
//! The variants line up with the error kinds from the design: a malformed
//! reference, an auth handshake that never produced a usable token, an
//! unexpected registry response, an inconsistent manifest, a digest that
//! doesn't match what the registry promised, a staging directory that's
//! in the way, and a tar write that had to be abandoned mid-archive.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PusherError>;

#[derive(Error, Debug)]
pub enum PusherError {
    #[error("invalid image reference: {0}")]
    InvalidReference(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("registry error: {0}")]
    Registry(String),

    #[error("manifest inconsistent: {0}")]
    ManifestInconsistent(String),

    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("staging conflict at {0}")]
    StagingConflict(std::path::PathBuf),

    #[error("archive aborted: {0}")]
    ArchiveAborted(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}
