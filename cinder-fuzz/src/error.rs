//! Backend construction errors.
//!
//! Only fatal misconfiguration is an `Err` here: a solver that cannot
//! find its toolchain refuses to construct. Everything that can go
//! wrong *during* a solve (unsupported sorts, compile failures,
//! inconclusive fuzzing, cancellation) is folded into an `Unknown`
//! verdict with detail on the diagnostic stream.

use std::path::PathBuf;
use thiserror::Error;

/// Error type for backend setup.
#[derive(Error, Debug)]
pub enum BackendError {
    /// The configured compiler binary does not exist.
    #[error("toolchain binary not found: {path}")]
    MissingToolchain {
        /// The path that was checked.
        path: PathBuf,
    },
    /// The working directory could not be prepared.
    #[error("working directory {path} unusable: {source}")]
    WorkingDirectory {
        /// Directory root.
        path: PathBuf,
        /// Underlying IO failure.
        source: std::io::Error,
    },
    /// Other IO error during setup.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for backend setup.
pub type BackendResult<T> = Result<T, BackendError>;
