//! Error types for stale-du
//!
//! This module defines the error hierarchy for:
//! - Directory read failures (recoverable, absorbed by the walker)
//! - Configuration and CLI errors
//! - Worker task errors
//!
//! Design philosophy:
//! - Use thiserror for structured error types in library code
//! - A failed directory read never escapes the walker; it is logged and counted
//! - Preserve error chains for debugging

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the stale-du application
#[derive(Error, Debug)]
pub enum WalkerError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Worker/concurrency errors
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),
}

/// A directory could not be listed
///
/// Covers permission denied, vanished paths, and paths that are not
/// directories. The walker treats the subtree as empty.
#[derive(Error, Debug)]
#[error("Failed to read directory '{}': {source}", path.display())]
pub struct ReadDirError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

impl ReadDirError {
    pub fn new(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self {
            path: path.into(),
            source,
        }
    }

    /// Check if this is one of the expected failures of a live filesystem
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.source.kind(),
            io::ErrorKind::PermissionDenied | io::ErrorKind::NotFound
        )
    }
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Admission pool must hold at least one token
    #[error("Invalid max open directories {count}: must be at least 1")]
    InvalidConcurrency { count: usize },

    /// Progress cadence must be non-zero
    #[error("Invalid progress interval {millis}ms: must be at least 1ms")]
    InvalidInterval { millis: u64 },

    /// Runtime worker thread count
    #[error("Invalid thread count {count}: must be between 1 and {max}")]
    InvalidThreadCount { count: usize, max: usize },

    /// A root given on the command line was empty
    #[error("Root path at position {index} is empty")]
    EmptyRoot { index: usize },
}

/// Worker task errors
#[derive(Error, Debug)]
pub enum WorkerError {
    /// A task panicked or was aborted
    #[error("Task '{task}' failed: {message}")]
    Panicked { task: &'static str, message: String },
}

/// Result type alias for WalkerError
pub type Result<T> = std::result::Result<T, WalkerError>;
