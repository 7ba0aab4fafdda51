use std::path::PathBuf;

/// Errors from hashing operations.
#[derive(Debug, thiserror::Error)]
pub enum HashError {
    /// The file could not be opened or read.
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file changed size while it was being hashed.
    #[error("length mismatch for {path}: expected {expected} bytes, read {actual}")]
    LengthMismatch {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result alias for hashing operations.
pub type HashResult<T> = Result<T, HashError>;
