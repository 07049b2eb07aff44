//! Error types shared by the planning, execution and undo stages.

use crate::config::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while organizing files or undoing an organization.
///
/// Directory-level variants (`SourceNotFound`, `ReadDirFailed`, the manifest
/// variants when loading) abort a run before anything is moved. Per-file
/// variants are attached to a single operation result and never stop a batch.
#[derive(Debug, Error)]
pub enum OrganizeError {
    /// The source directory is missing or is not a directory.
    #[error("source directory not found: {path} ({reason})")]
    SourceNotFound { path: PathBuf, reason: String },

    /// Listing the source directory failed.
    #[error("failed to read directory {path}: {source}")]
    ReadDirFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to create a category directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreationFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to move a file.
    #[error("failed to move {from} to {to}: {source}")]
    MoveFailed {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },

    /// No free name could be found for a destination.
    #[error("no free name for {candidate} after {attempts} attempts: {reason}")]
    CollisionExhausted {
        candidate: PathBuf,
        attempts: u32,
        reason: String,
    },

    /// A manifest record could not be parsed.
    #[error("manifest {path} is corrupt at record {record} (byte offset {offset}): {reason}")]
    ManifestCorrupt {
        path: PathBuf,
        record: usize,
        offset: u64,
        reason: String,
    },

    /// Reading or writing the manifest failed.
    #[error("manifest {path}: {source}")]
    ManifestIo {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The configuration could not be loaded or validated.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for organize and undo operations.
pub type OrganizeResult<T> = Result<T, OrganizeError>;
