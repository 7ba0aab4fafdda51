use std::path::PathBuf;

use thiserror::Error;

/// Failures that skip a single package.
///
/// The batch driver catches these per package; none of them aborts a run.
#[derive(Debug, Error)]
pub enum PackageError {
    /// The extraction tool failed or could not be run.
    #[error("extraction of {dsc} failed: {reason}")]
    ExtractionFailed { dsc: PathBuf, reason: String },

    /// The package descriptor file does not exist.
    #[error("descriptor {0} does not exist")]
    DescriptorMissing(PathBuf),

    /// The extracted tree could not be walked.
    #[error("cannot walk {path}: {reason}")]
    TreeWalk { path: PathBuf, reason: String },

    /// A file could not be hashed.
    #[error(transparent)]
    Hash(#[from] debload_hash::HashError),

    /// Descriptor or changelog could not be parsed.
    #[error("metadata error in {path}: {reason}")]
    Metadata { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PackageError {
    /// Short machine-readable name of the failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ExtractionFailed { .. } => "extraction_failed",
            Self::DescriptorMissing(_) => "descriptor_missing",
            Self::TreeWalk { .. } => "tree_walk",
            Self::Hash(_) => "hash",
            Self::Metadata { .. } => "metadata",
            Self::Io(_) => "io",
        }
    }

    pub(crate) fn metadata(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Metadata {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Errors that end a batch: store failures and flush-time I/O.
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("store error: {0}")]
    Store(#[from] debload_store::StoreError),

    #[error("hashing error: {0}")]
    Hash(#[from] debload_hash::HashError),

    /// A release was requested for a package whose revision is not known yet.
    #[error("package {name} {version} has no revision assigned")]
    RevisionNotAssigned { name: String, version: String },

    /// Occurrences need the origin registered for the package name.
    #[error("package {name} has no origin assigned")]
    OriginNotAssigned { name: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type LoaderResult<T> = Result<T, LoaderError>;
