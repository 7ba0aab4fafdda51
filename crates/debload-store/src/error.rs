use debload_types::ObjectId;

/// Errors from archive store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Content hash mismatch on write or read (data corruption).
    #[error("hash mismatch for {id}: computed {computed}")]
    HashMismatch { id: ObjectId, computed: ObjectId },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored record is malformed or cannot be decoded.
    #[error("corrupt record {id}: {reason}")]
    CorruptRecord { id: String, reason: String },

    /// Attempted to write a record with a null ID.
    #[error("cannot store {kind} with null ID")]
    NullObjectId { kind: &'static str },

    /// Computing an identifier failed.
    #[error("hashing error: {0}")]
    Hash(#[from] debload_hash::HashError),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
