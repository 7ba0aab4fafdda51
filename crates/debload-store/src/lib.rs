//! Archive records and storage backends for debload.
//!
//! The loader turns every source package into records of five kinds, all
//! keyed by git-compatible identifiers:
//!
//! - [`Content`] -- file bytes, `visible` or `absent` when over the ceiling
//! - [`Directory`] -- a tree's immediate entries
//! - [`Revision`] -- synthetic commit for one package version
//! - [`Release`] -- named pointer to a revision
//! - [`Occurrence`] -- branch binding an [`Origin`] and authority to a revision
//!
//! # Storage Backends
//!
//! All backends implement the [`ArchiveStore`] trait:
//!
//! - [`InMemoryArchiveStore`] -- map-based store with a call log, for tests
//!   and embedding
//! - [`DirArchiveStore`] -- plain files under a root directory
//!
//! # Design Rules
//!
//! 1. Writes are idempotent by identifier.
//! 2. Records are checked against their identifier before they are written.
//! 3. All I/O errors are propagated, never silently ignored.

pub mod dir;
pub mod error;
pub mod memory;
pub mod object;
pub mod traits;

pub use dir::DirArchiveStore;
pub use error::{StoreError, StoreResult};
pub use memory::{InMemoryArchiveStore, StoreCall};
pub use object::{
    Content, ContentStatus, Directory, DirectoryEntry, EntryKind, Occurrence, Origin, OriginId,
    Release, Revision, RevisionType, TargetType,
};
pub use traits::ArchiveStore;
