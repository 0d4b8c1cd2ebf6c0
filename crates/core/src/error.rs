use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of an [`InstallError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad configuration, such as a source address with the wrong scheme.
    Validation,
    /// A required blob or part is missing from the asset store.
    NotFound,
    /// Copy, size or checksum failure while writing a destination file.
    Assembly,
    /// The installation registry could not be read or written.
    Registry,
    /// A catalog or directory setting could not be loaded or resolved.
    Config,
}

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("invalid {subject}: {reason}")]
    Validation { subject: String, reason: String },

    #[error("asset not found: {0}")]
    NotFound(String),

    #[error("size mismatch after assembly of {path:?}: wrote {expected} bytes, found {actual}")]
    SizeMismatch {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error("checksum mismatch for {path:?}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("{operation} failed for {path:?}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("registry error: {0}")]
    Registry(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{operation} failed for model `{spec}`")]
    Spec {
        spec: String,
        operation: &'static str,
        #[source]
        source: Box<InstallError>,
    },
}

impl InstallError {
    pub fn validation(subject: impl Into<String>, reason: impl Into<String>) -> Self {
        InstallError::Validation {
            subject: subject.into(),
            reason: reason.into(),
        }
    }

    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        InstallError::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Wraps `self` with the spec name and the operation that failed.
    pub fn in_spec(self, spec: &str, operation: &'static str) -> Self {
        InstallError::Spec {
            spec: spec.to_string(),
            operation,
            source: Box::new(self),
        }
    }

    /// The innermost error beneath any `Spec` wrappers.
    pub fn root(&self) -> &InstallError {
        match self {
            InstallError::Spec { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self.root() {
            InstallError::Validation { .. } => ErrorKind::Validation,
            InstallError::NotFound(_) => ErrorKind::NotFound,
            InstallError::SizeMismatch { .. }
            | InstallError::ChecksumMismatch { .. }
            | InstallError::Io { .. } => ErrorKind::Assembly,
            InstallError::Registry(_) => ErrorKind::Registry,
            InstallError::Config(_) => ErrorKind::Config,
            InstallError::Spec { source, .. } => source.kind(),
        }
    }
}
