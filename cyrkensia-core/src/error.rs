//! Error types for cyrkensia-core

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A config file could not be read or parsed. The source is skipped.
    #[error("Config source {path:?}: {reason}")]
    ConfigSource { path: PathBuf, reason: String },

    /// The merged configuration is unusable. Fatal at startup.
    #[error("Invalid configuration: {0}")]
    StartupConfig(String),

    #[error("Credential file {path:?}: {reason}")]
    CredentialFile { path: PathBuf, reason: String },

    /// Per-album failure while building the catalog.
    #[error("Catalog error in {path:?}: {reason}")]
    CatalogIo { path: PathBuf, reason: String },

    #[error("Path rejected: {0}")]
    PathSecurity(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Authentication denied")]
    AuthDenied,

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Transport-independent outcome of a per-request error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    NotFound,
    Unauthorized,
    Internal,
}

impl Error {
    /// Classify an error for the HTTP adapter.
    ///
    /// Traversal attempts are indistinguishable from missing files.
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::NotFound(_) | Error::PathSecurity(_) => ErrorClass::NotFound,
            Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound => ErrorClass::NotFound,
            Error::AuthDenied => ErrorClass::Unauthorized,
            _ => ErrorClass::Internal,
        }
    }
}
