// src/error.rs

//! Error types for manifest diffing

use thiserror::Error;

/// Errors produced while loading manifests, querying collaborators or
/// writing reports
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error with context
    #[error("I/O error: {0}")]
    IoError(String),

    /// Raw I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed manifest document
    #[error("Invalid manifest: {0}")]
    ManifestError(String),

    /// Failed to parse collaborator output or a config file
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Changelog download failed
    #[error("Download error: {0}")]
    DownloadError(String),

    /// Archive index query failed (not the same as "not found")
    #[error("Archive query error: {0}")]
    ArchiveError(String),

    /// Requested item does not exist
    #[error("Not found: {0}")]
    NotFoundError(String),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Failed to set up a collaborator
    #[error("Initialization error: {0}")]
    InitError(String),
}

/// Result type alias using the crate error type
pub type Result<T> = std::result::Result<T, Error>;
