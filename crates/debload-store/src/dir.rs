//! On-disk archive store.
//!
//! Layout under the store root:
//!
//! ```text
//! objects/<aa>/<bb>/<sha1_git hex>   visible content bytes
//! content/<hex>.json                 content records (status, hashes, length)
//! directory/<hex>.json               directory records
//! revision/<hex>.json                revision records
//! release/<hex>.json                 release records
//! occurrence.jsonl                   one occurrence per line
//! origin.json                        registered origins, in id order
//! ```
//!
//! Every file is written to a temporary sibling and renamed into place, so a
//! reader never observes a partially written record.

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use debload_types::ObjectId;
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::error::{StoreError, StoreResult};
use crate::memory::{check_content, check_release, check_revision};
use crate::object::{Content, Directory, Occurrence, Origin, OriginId, Release, Revision};
use crate::traits::ArchiveStore;

const OCCURRENCE_LOG: &str = "occurrence.jsonl";
const ORIGIN_FILE: &str = "origin.json";

/// Archive store persisted as plain files under a root directory.
pub struct DirArchiveStore {
    root: PathBuf,
    origins: RwLock<Vec<Origin>>,
    occurrences: RwLock<HashSet<Occurrence>>,
}

impl DirArchiveStore {
    /// Open a store rooted at `root`, creating the layout if needed.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        for sub in ["objects", "content", "directory", "revision", "release"] {
            fs::create_dir_all(root.join(sub))?;
        }

        let origins = match fs::read(root.join(ORIGIN_FILE)) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| StoreError::CorruptRecord {
                id: ORIGIN_FILE.to_string(),
                reason: e.to_string(),
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let mut occurrences = HashSet::new();
        let log = root.join(OCCURRENCE_LOG);
        if log.exists() {
            let reader = BufReader::new(fs::File::open(&log)?);
            for (lineno, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let occurrence: Occurrence =
                    serde_json::from_str(&line).map_err(|e| StoreError::CorruptRecord {
                        id: format!("{OCCURRENCE_LOG}:{}", lineno + 1),
                        reason: e.to_string(),
                    })?;
                occurrences.insert(occurrence);
            }
        }

        tracing::debug!(root = %root.display(), origins = origins.len(), "opened archive store");
        Ok(Self {
            root,
            origins: RwLock::new(origins),
            occurrences: RwLock::new(occurrences),
        })
    }

    /// The store root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the raw bytes of a content.
    pub fn object_path(&self, id: &ObjectId) -> PathBuf {
        let hex = id.to_hex();
        self.root
            .join("objects")
            .join(&hex[0..2])
            .join(&hex[2..4])
            .join(hex)
    }

    fn record_path(&self, table: &str, id: &ObjectId) -> PathBuf {
        self.root.join(table).join(format!("{}.json", id.to_hex()))
    }

    /// Read back a content record, without its bytes.
    pub fn read_content(&self, id: &ObjectId) -> StoreResult<Option<Content>> {
        self.read_record("content", id)
    }

    pub fn read_directory(&self, id: &ObjectId) -> StoreResult<Option<Directory>> {
        self.read_record("directory", id)
    }

    pub fn read_revision(&self, id: &ObjectId) -> StoreResult<Option<Revision>> {
        self.read_record("revision", id)
    }

    pub fn read_release(&self, id: &ObjectId) -> StoreResult<Option<Release>> {
        self.read_record("release", id)
    }

    /// Raw bytes of a visible content.
    pub fn read_object(&self, id: &ObjectId) -> StoreResult<Option<Vec<u8>>> {
        match fs::read(self.object_path(id)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Registered origins with their ids.
    pub fn origins(&self) -> Vec<(OriginId, Origin)> {
        self.origins
            .read()
            .expect("lock poisoned")
            .iter()
            .enumerate()
            .map(|(i, o)| (OriginId(i as u64 + 1), o.clone()))
            .collect()
    }

    fn read_record<T: serde::de::DeserializeOwned>(
        &self,
        table: &str,
        id: &ObjectId,
    ) -> StoreResult<Option<T>> {
        match fs::read(self.record_path(table, id)) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| StoreError::CorruptRecord {
                    id: id.to_hex(),
                    reason: e.to_string(),
                }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_record<T: Serialize>(&self, table: &str, id: &ObjectId, record: &T) -> StoreResult<()> {
        let path = self.record_path(table, id);
        if path.exists() {
            return Ok(());
        }
        let bytes = serde_json::to_vec_pretty(record)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        write_atomic(&path, &bytes)
    }
}

/// Write `bytes` to a temporary file next to `path`, then rename it over.
fn write_atomic(path: &Path, bytes: &[u8]) -> StoreResult<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

impl ArchiveStore for DirArchiveStore {
    fn content_missing(&self, ids: &[ObjectId]) -> StoreResult<Vec<ObjectId>> {
        Ok(ids
            .iter()
            .filter(|id| !self.record_path("content", id).exists())
            .copied()
            .collect())
    }

    fn content_add(&self, contents: &[Content]) -> StoreResult<()> {
        for content in contents {
            check_content(content)?;
        }
        for content in contents {
            let id = content.id();
            if let Some(data) = content.data() {
                let path = self.object_path(&id);
                if !path.exists() {
                    write_atomic(&path, data)?;
                }
            }
            // The record goes last: its presence is what marks the content stored.
            self.write_record("content", &id, content)?;
        }
        tracing::debug!(count = contents.len(), "stored contents");
        Ok(())
    }

    fn directory_add(&self, directories: &[Directory]) -> StoreResult<()> {
        for directory in directories {
            directory.verify()?;
            self.write_record("directory", &directory.id, directory)?;
        }
        tracing::debug!(count = directories.len(), "stored directories");
        Ok(())
    }

    fn directory_missing(&self, ids: &[ObjectId]) -> StoreResult<Vec<ObjectId>> {
        Ok(ids
            .iter()
            .filter(|id| !self.record_path("directory", id).exists())
            .copied()
            .collect())
    }

    fn revision_add(&self, revisions: &[Revision]) -> StoreResult<()> {
        for revision in revisions {
            check_revision(revision)?;
            self.write_record("revision", &revision.id, revision)?;
        }
        Ok(())
    }

    fn release_add(&self, releases: &[Release]) -> StoreResult<()> {
        for release in releases {
            check_release(release)?;
            self.write_record("release", &release.id, release)?;
        }
        Ok(())
    }

    fn occurrence_add(&self, occurrences: &[Occurrence]) -> StoreResult<()> {
        let mut known = self.occurrences.write().expect("lock poisoned");
        let mut lines = Vec::new();
        for occurrence in occurrences {
            if known.contains(occurrence) {
                continue;
            }
            let mut line = serde_json::to_vec(occurrence)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            line.push(b'\n');
            lines.extend_from_slice(&line);
            known.insert(occurrence.clone());
        }
        if lines.is_empty() {
            return Ok(());
        }
        let mut log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.root.join(OCCURRENCE_LOG))?;
        log.write_all(&lines)?;
        log.sync_all()?;
        Ok(())
    }

    fn origin_add_one(&self, origin: &Origin) -> StoreResult<OriginId> {
        let mut origins = self.origins.write().expect("lock poisoned");
        if let Some(pos) = origins.iter().position(|o| o == origin) {
            return Ok(OriginId(pos as u64 + 1));
        }
        origins.push(origin.clone());
        let bytes = serde_json::to_vec_pretty(&*origins)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        if let Err(e) = write_atomic(&self.root.join(ORIGIN_FILE), &bytes) {
            origins.pop();
            return Err(e);
        }
        Ok(OriginId(origins.len() as u64))
    }
}

impl std::fmt::Debug for DirArchiveStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirArchiveStore")
            .field("root", &self.root)
            .finish()
    }
}
