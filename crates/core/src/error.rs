//! Error types for bt-core
//!
//! Provides a unified error type that can be converted to appropriate exit codes
//! and classified for retry decisions.

use thiserror::Error;

/// Result type alias for bt-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for bt-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid path format
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Object key cannot be mapped to a safe destination
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Permission failure from the storage provider
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Network error (retryable)
    #[error("Network error: {0}")]
    Network(String),

    /// Local filesystem error on a destination path
    #[error("Local IO error: {0}")]
    LocalIo(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Run cancelled before completion
    #[error("Interrupted")]
    Interrupted,

    /// General error
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Get the appropriate exit code for this error
    pub const fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidPath(_) | Error::Config(_) => 2, // UsageError
            Error::Network(_) => 3,                         // NetworkError
            Error::AccessDenied(_) => 4,                    // AuthError
            Error::NotFound(_) => 5,                        // NotFound
            Error::Interrupted => 130,                      // Interrupted
            _ => 1,                                         // GeneralError
        }
    }

    /// Whether a retry of the same request may succeed
    pub const fn is_transient(&self) -> bool {
        matches!(self, Error::Network(_))
    }

    /// Wrap an IO error that happened on a destination path
    pub fn local_io(path: &std::path::Path, err: std::io::Error) -> Self {
        Error::LocalIo(format!("{}: {err}", path.display()))
    }
}
