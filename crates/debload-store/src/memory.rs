use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use debload_hash::ContentHasher;
use debload_types::ObjectId;

use crate::error::{StoreError, StoreResult};
use crate::object::{Content, Directory, Occurrence, Origin, OriginId, Release, Revision};
use crate::traits::ArchiveStore;

/// One call made against an [`InMemoryArchiveStore`], in call order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreCall {
    ContentMissing(Vec<ObjectId>),
    ContentAdd(Vec<ObjectId>),
    DirectoryMissing(Vec<ObjectId>),
    DirectoryAdd(Vec<ObjectId>),
    RevisionAdd(Vec<ObjectId>),
    ReleaseAdd(Vec<ObjectId>),
    OccurrenceAdd(Vec<String>),
    OriginAddOne(String),
}

#[derive(Default)]
struct Tables {
    contents: BTreeMap<ObjectId, Content>,
    directories: BTreeMap<ObjectId, Directory>,
    revisions: BTreeMap<ObjectId, Revision>,
    releases: BTreeMap<ObjectId, Release>,
    occurrences: Vec<Occurrence>,
    origins: HashMap<Origin, OriginId>,
}

/// In-memory archive store.
///
/// Intended for tests and embedding. Records are held behind a `RwLock` and
/// every call is appended to a log, so tests can assert what reached the
/// store and in which order.
pub struct InMemoryArchiveStore {
    tables: RwLock<Tables>,
    calls: RwLock<Vec<StoreCall>>,
}

impl InMemoryArchiveStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            calls: RwLock::new(Vec::new()),
        }
    }

    fn record(&self, call: StoreCall) {
        self.calls.write().expect("lock poisoned").push(call);
    }

    /// Every call made so far.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.read().expect("lock poisoned").clone()
    }

    /// Number of times `content` was written, across all `content_add` calls.
    pub fn content_write_count(&self, id: &ObjectId) -> usize {
        self.calls
            .read()
            .expect("lock poisoned")
            .iter()
            .filter_map(|call| match call {
                StoreCall::ContentAdd(ids) => Some(ids.iter().filter(|i| *i == id).count()),
                _ => None,
            })
            .sum()
    }

    pub fn content(&self, id: &ObjectId) -> Option<Content> {
        self.tables.read().expect("lock poisoned").contents.get(id).cloned()
    }

    pub fn directory(&self, id: &ObjectId) -> Option<Directory> {
        self.tables
            .read()
            .expect("lock poisoned")
            .directories
            .get(id)
            .cloned()
    }

    pub fn revision(&self, id: &ObjectId) -> Option<Revision> {
        self.tables
            .read()
            .expect("lock poisoned")
            .revisions
            .get(id)
            .cloned()
    }

    /// All stored revisions, ordered by id.
    pub fn revisions(&self) -> Vec<Revision> {
        let tables = self.tables.read().expect("lock poisoned");
        tables.revisions.values().cloned().collect()
    }

    /// All stored releases, ordered by id.
    pub fn releases(&self) -> Vec<Release> {
        let tables = self.tables.read().expect("lock poisoned");
        tables.releases.values().cloned().collect()
    }

    /// All stored occurrences, in write order.
    pub fn occurrences(&self) -> Vec<Occurrence> {
        self.tables.read().expect("lock poisoned").occurrences.clone()
    }

    pub fn content_count(&self) -> usize {
        self.tables.read().expect("lock poisoned").contents.len()
    }

    pub fn directory_count(&self) -> usize {
        self.tables.read().expect("lock poisoned").directories.len()
    }

    /// Returns `true` if nothing has been stored.
    pub fn is_empty(&self) -> bool {
        let tables = self.tables.read().expect("lock poisoned");
        tables.contents.is_empty()
            && tables.directories.is_empty()
            && tables.revisions.is_empty()
            && tables.releases.is_empty()
            && tables.occurrences.is_empty()
    }
}

impl Default for InMemoryArchiveStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Reject a null identifier and any visible content whose bytes do not hash
/// to its identifier.
pub(crate) fn check_content(content: &Content) -> StoreResult<()> {
    let id = content.id();
    if id.is_null() {
        return Err(StoreError::NullObjectId { kind: "content" });
    }
    if let Some(data) = content.data() {
        let computed = ContentHasher::BLOB.hash(data);
        if computed != id {
            return Err(StoreError::HashMismatch { id, computed });
        }
    }
    Ok(())
}

pub(crate) fn check_revision(revision: &Revision) -> StoreResult<()> {
    if revision.id.is_null() {
        return Err(StoreError::NullObjectId { kind: "revision" });
    }
    let computed = revision.compute_id()?;
    if computed != revision.id {
        return Err(StoreError::HashMismatch {
            id: revision.id,
            computed,
        });
    }
    Ok(())
}

pub(crate) fn check_release(release: &Release) -> StoreResult<()> {
    if release.id.is_null() {
        return Err(StoreError::NullObjectId { kind: "release" });
    }
    let computed = release.compute_id();
    if computed != release.id {
        return Err(StoreError::HashMismatch {
            id: release.id,
            computed,
        });
    }
    Ok(())
}

impl ArchiveStore for InMemoryArchiveStore {
    fn content_missing(&self, ids: &[ObjectId]) -> StoreResult<Vec<ObjectId>> {
        self.record(StoreCall::ContentMissing(ids.to_vec()));
        let tables = self.tables.read().expect("lock poisoned");
        Ok(ids
            .iter()
            .filter(|id| !tables.contents.contains_key(id))
            .copied()
            .collect())
    }

    fn content_add(&self, contents: &[Content]) -> StoreResult<()> {
        for content in contents {
            check_content(content)?;
        }
        self.record(StoreCall::ContentAdd(contents.iter().map(Content::id).collect()));
        let mut tables = self.tables.write().expect("lock poisoned");
        for content in contents {
            tables
                .contents
                .entry(content.id())
                .or_insert_with(|| content.clone());
        }
        Ok(())
    }

    fn directory_add(&self, directories: &[Directory]) -> StoreResult<()> {
        for directory in directories {
            directory.verify()?;
        }
        self.record(StoreCall::DirectoryAdd(
            directories.iter().map(|d| d.id).collect(),
        ));
        let mut tables = self.tables.write().expect("lock poisoned");
        for directory in directories {
            tables
                .directories
                .entry(directory.id)
                .or_insert_with(|| directory.clone());
        }
        Ok(())
    }

    fn directory_missing(&self, ids: &[ObjectId]) -> StoreResult<Vec<ObjectId>> {
        self.record(StoreCall::DirectoryMissing(ids.to_vec()));
        let tables = self.tables.read().expect("lock poisoned");
        Ok(ids
            .iter()
            .filter(|id| !tables.directories.contains_key(id))
            .copied()
            .collect())
    }

    fn revision_add(&self, revisions: &[Revision]) -> StoreResult<()> {
        for revision in revisions {
            check_revision(revision)?;
        }
        self.record(StoreCall::RevisionAdd(revisions.iter().map(|r| r.id).collect()));
        let mut tables = self.tables.write().expect("lock poisoned");
        for revision in revisions {
            tables
                .revisions
                .entry(revision.id)
                .or_insert_with(|| revision.clone());
        }
        Ok(())
    }

    fn release_add(&self, releases: &[Release]) -> StoreResult<()> {
        for release in releases {
            check_release(release)?;
        }
        self.record(StoreCall::ReleaseAdd(releases.iter().map(|r| r.id).collect()));
        let mut tables = self.tables.write().expect("lock poisoned");
        for release in releases {
            tables
                .releases
                .entry(release.id)
                .or_insert_with(|| release.clone());
        }
        Ok(())
    }

    fn occurrence_add(&self, occurrences: &[Occurrence]) -> StoreResult<()> {
        self.record(StoreCall::OccurrenceAdd(
            occurrences.iter().map(|o| o.branch.clone()).collect(),
        ));
        let mut tables = self.tables.write().expect("lock poisoned");
        for occurrence in occurrences {
            if !tables.occurrences.contains(occurrence) {
                tables.occurrences.push(occurrence.clone());
            }
        }
        Ok(())
    }

    fn origin_add_one(&self, origin: &Origin) -> StoreResult<OriginId> {
        self.record(StoreCall::OriginAddOne(origin.url.clone()));
        let mut tables = self.tables.write().expect("lock poisoned");
        let next = OriginId(tables.origins.len() as u64 + 1);
        Ok(*tables.origins.entry(origin.clone()).or_insert(next))
    }
}

impl std::fmt::Debug for InMemoryArchiveStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tables = self.tables.read().expect("lock poisoned");
        f.debug_struct("InMemoryArchiveStore")
            .field("contents", &tables.contents.len())
            .field("directories", &tables.directories.len())
            .field("revisions", &tables.revisions.len())
            .field("releases", &tables.releases.len())
            .field("occurrences", &tables.occurrences.len())
            .finish()
    }
}
