use debload_types::ObjectId;

use crate::error::StoreResult;
use crate::object::{Content, Directory, Occurrence, Origin, OriginId, Release, Revision};

/// Backing archival store.
///
/// All implementations must satisfy these invariants:
/// - Writes are idempotent by identifier. Re-adding a stored object is a
///   no-op, never an error.
/// - Each call is all-or-nothing from the caller's point of view.
/// - All I/O errors are propagated, never silently ignored.
pub trait ArchiveStore: Send + Sync {
    /// Return the subset of `ids` not yet stored, preserving input order.
    fn content_missing(&self, ids: &[ObjectId]) -> StoreResult<Vec<ObjectId>>;

    /// Store content records, with their bytes when visible.
    fn content_add(&self, contents: &[Content]) -> StoreResult<()>;

    /// Store directory records.
    fn directory_add(&self, directories: &[Directory]) -> StoreResult<()>;

    /// Return the subset of directory `ids` not yet stored.
    ///
    /// The default reports every id as missing, which keeps directory writes
    /// unconditional for backends that cannot answer cheaply.
    fn directory_missing(&self, ids: &[ObjectId]) -> StoreResult<Vec<ObjectId>> {
        Ok(ids.to_vec())
    }

    /// Store revision records.
    fn revision_add(&self, revisions: &[Revision]) -> StoreResult<()>;

    /// Store release records.
    fn release_add(&self, releases: &[Release]) -> StoreResult<()>;

    /// Store branch records.
    fn occurrence_add(&self, occurrences: &[Occurrence]) -> StoreResult<()>;

    /// Register an origin and return its id.
    ///
    /// Idempotent by `(type, url)`: a known origin returns its existing id.
    fn origin_add_one(&self, origin: &Origin) -> StoreResult<OriginId>;
}

impl<S: ArchiveStore + ?Sized> ArchiveStore for &S {
    fn content_missing(&self, ids: &[ObjectId]) -> StoreResult<Vec<ObjectId>> {
        (**self).content_missing(ids)
    }

    fn content_add(&self, contents: &[Content]) -> StoreResult<()> {
        (**self).content_add(contents)
    }

    fn directory_add(&self, directories: &[Directory]) -> StoreResult<()> {
        (**self).directory_add(directories)
    }

    fn directory_missing(&self, ids: &[ObjectId]) -> StoreResult<Vec<ObjectId>> {
        (**self).directory_missing(ids)
    }

    fn revision_add(&self, revisions: &[Revision]) -> StoreResult<()> {
        (**self).revision_add(revisions)
    }

    fn release_add(&self, releases: &[Release]) -> StoreResult<()> {
        (**self).release_add(releases)
    }

    fn occurrence_add(&self, occurrences: &[Occurrence]) -> StoreResult<()> {
        (**self).occurrence_add(occurrences)
    }

    fn origin_add_one(&self, origin: &Origin) -> StoreResult<OriginId> {
        (**self).origin_add_one(origin)
    }
}
