//! Hashing and identity for debload.
//!
//! Provides the streaming file hasher that produces a [`MultiHash`] in one
//! pass, and the git-compatible manifest formats from which directory,
//! revision and release identifiers are computed.
//!
//! All digests wrap the `sha1`, `sha2` and `blake3` crates.
//!
//! [`MultiHash`]: debload_types::MultiHash

pub mod error;
pub mod hasher;
pub mod manifest;

pub use error::{HashError, HashResult};
pub use hasher::{
    hash_bytes, hash_file, hash_symlink, symlink_target_bytes, ContentHasher, MultiHasher,
    ObjectType,
};
pub use manifest::{
    canonical_json, directory_id, directory_manifest, release_id, release_manifest, revision_id,
    revision_manifest, ManifestEntry, ReleaseManifest, RevisionManifest,
};
