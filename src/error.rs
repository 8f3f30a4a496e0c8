// src/error.rs

use thiserror::Error;

use crate::dist::InstalledDistribution;

/// Core error types for Stevedore
#[derive(Error, Debug)]
pub enum Error {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Database initialization error
    #[error("Failed to initialize database: {0}")]
    InitError(String),

    /// Database not found
    #[error("Database not found at path: {0}")]
    DatabaseNotFound(String),

    /// A requirement string could not be parsed
    #[error("Malformed requirement: '{0}'")]
    MalformedRequirement(String),

    /// A version string could not be normalized
    #[error("Invalid version: '{0}'")]
    InvalidVersion(String),

    /// The catalog has no project with the requested name
    #[error("Project '{0}' not found in catalog")]
    ProjectNotFound(String),

    /// The project exists but no release satisfies the requirement
    #[error("No release satisfies requirement '{0}'")]
    ReleaseNotFound(String),

    /// The plan would break installed distributions; nothing was touched
    #[error("Installation conflicts with installed distributions: {}", format_dists(.0))]
    InstallationConflict(Vec<InstalledDistribution>),

    /// An install hook failed; staged state has been rolled back
    #[error("Failed to install {dist}: {source}")]
    Install {
        dist: String,
        #[source]
        source: Box<Error>,
    },

    /// Rollback itself failed; the system may be left inconsistent
    #[error("Rollback failed, manual intervention required: {0}")]
    Rollback(String),

    /// Download errors
    #[error("Download error: {0}")]
    Download(String),

    /// Checksum mismatch on a downloaded artifact
    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// Errors reported by an install backend
    #[error("Install backend error: {0}")]
    Backend(String),
}

fn format_dists(dists: &[InstalledDistribution]) -> String {
    dists
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type alias using Stevedore's Error type
pub type Result<T> = std::result::Result<T, Error>;
