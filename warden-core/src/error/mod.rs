use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Cryptographic error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Random source unavailable: {0}")]
    RandomSource(String),
}

/// Failures of the on-disk audit trail.
///
/// These are never returned to callers and are not part of [`Error`]: the
/// logger reports them through `tracing` and carries on with the in-memory
/// cache.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Failed to create audit directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write audit file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to rotate audit file {path}: {source}")]
    Rotate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read audit file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to purge expired audit file {path}: {source}")]
    Retention {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl AuditError {
    /// The file or directory the failed operation touched.
    pub fn path(&self) -> &std::path::Path {
        match self {
            AuditError::CreateDir { path, .. }
            | AuditError::Write { path, .. }
            | AuditError::Rotate { path, .. }
            | AuditError::Read { path, .. }
            | AuditError::Retention { path, .. } => path,
        }
    }
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid field: {0}")]
    InvalidField(String),
}

impl Error {
    pub fn is_crypto_error(&self) -> bool {
        matches!(self, Error::Crypto(_))
    }

    pub fn is_validation_error(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}
