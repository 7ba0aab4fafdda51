use std::fmt;

use debload_hash::{
    canonical_json, directory_id, release_id, revision_id, ManifestEntry, ObjectType,
    ReleaseManifest, RevisionManifest,
};
use debload_types::{MultiHash, ObjectId, Person, Timestamp};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};

// ---------------------------------------------------------------------------
// Content
// ---------------------------------------------------------------------------

/// Persistence status of a content.
///
/// Only `Visible` carries bytes; an `Absent` content never holds data.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ContentStatus {
    /// Data embedded. The bytes are not part of the JSON record.
    Visible {
        #[serde(skip)]
        data: Vec<u8>,
    },
    /// Data elided, with the reason it was left out.
    Absent { reason: String },
}

impl fmt::Debug for ContentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Visible { data } => write!(f, "Visible({} bytes)", data.len()),
            Self::Absent { reason } => write!(f, "Absent({reason:?})"),
        }
    }
}

/// A file content ready for persistence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    /// Full hash set; `hashes.sha1_git` is the identifier.
    pub hashes: MultiHash,
    /// Length in bytes.
    pub length: u64,
    /// Git permission bits of the file this content was read from.
    pub perms: u32,
    /// Kind of the directory entry this content was read from.
    pub kind: EntryKind,
    #[serde(flatten)]
    pub status: ContentStatus,
}

impl Content {
    /// The content identifier (`sha1_git`).
    pub fn id(&self) -> ObjectId {
        self.hashes.sha1_git
    }

    /// Embedded bytes, if the content is visible.
    pub fn data(&self) -> Option<&[u8]> {
        match &self.status {
            ContentStatus::Visible { data } => Some(data),
            ContentStatus::Absent { .. } => None,
        }
    }

    /// Returns `true` if the content was elided.
    pub fn is_absent(&self) -> bool {
        matches!(self.status, ContentStatus::Absent { .. })
    }
}

// ---------------------------------------------------------------------------
// Directory
// ---------------------------------------------------------------------------

/// Kind of a directory entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Regular file (plain or executable).
    File,
    /// Subdirectory.
    Directory,
    /// Symbolic link; its content is the unresolved target text.
    Symlink,
    /// FIFO, socket or device node.
    Special,
}

impl EntryKind {
    /// Git permission bits for this kind. `executable` only matters for files.
    pub fn perms(&self, executable: bool) -> u32 {
        match self {
            Self::File | Self::Special if executable => 0o100755,
            Self::File | Self::Special => 0o100644,
            Self::Symlink => 0o120000,
            Self::Directory => 0o40000,
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, Self::Directory)
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Directory => write!(f, "dir"),
            Self::Symlink => write!(f, "symlink"),
            Self::Special => write!(f, "special"),
        }
    }
}

/// A single entry in a directory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    /// Raw entry name.
    #[serde(with = "name_bytes")]
    pub name: Vec<u8>,
    pub kind: EntryKind,
    /// Identifier of the referenced content or directory.
    pub target: ObjectId,
    pub perms: u32,
}

impl DirectoryEntry {
    pub fn new(name: impl Into<Vec<u8>>, kind: EntryKind, target: ObjectId, perms: u32) -> Self {
        Self {
            name: name.into(),
            kind,
            target,
            perms,
        }
    }

    fn as_manifest_entry(&self) -> ManifestEntry<'_> {
        ManifestEntry {
            name: &self.name,
            perms: self.perms,
            target: self.target,
            is_directory: self.kind.is_directory(),
        }
    }
}

/// Directory listing record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directory {
    pub id: ObjectId,
    /// Entries in manifest order.
    pub entries: Vec<DirectoryEntry>,
}

impl Directory {
    /// Build a directory from its entries and compute its identifier.
    ///
    /// Entries are stored sorted by name for stable output.
    pub fn new(mut entries: Vec<DirectoryEntry>) -> Self {
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        let id = Self::compute_id(&entries);
        Self { id, entries }
    }

    /// Compute the identifier of an entry list.
    pub fn compute_id(entries: &[DirectoryEntry]) -> ObjectId {
        let manifest: Vec<ManifestEntry<'_>> =
            entries.iter().map(DirectoryEntry::as_manifest_entry).collect();
        directory_id(&manifest)
    }

    /// Check the stored identifier against the entries.
    pub fn verify(&self) -> StoreResult<()> {
        let computed = Self::compute_id(&self.entries);
        if computed != self.id {
            return Err(StoreError::HashMismatch {
                id: self.id,
                computed,
            });
        }
        Ok(())
    }

    /// Look up an entry by name.
    pub fn get(&self, name: &[u8]) -> Option<&DirectoryEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Revision
// ---------------------------------------------------------------------------

/// Origin format of a revision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RevisionType {
    /// Synthesized from a Debian source package.
    Dsc,
}

impl RevisionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dsc => "dsc",
        }
    }
}

/// Commit-like record for one package version.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Revision {
    pub id: ObjectId,
    /// Root directory of the revision.
    pub directory: ObjectId,
    pub parents: Vec<ObjectId>,
    pub author: Person,
    pub date: Timestamp,
    pub committer: Person,
    pub committer_date: Timestamp,
    #[serde(rename = "type")]
    pub rev_type: RevisionType,
    pub message: String,
    pub synthetic: bool,
    /// Normalized provenance metadata. Part of the identifier.
    pub metadata: serde_json::Value,
}

impl Revision {
    /// Compute the identifier from every identity-relevant field.
    ///
    /// The type tag, synthetic flag and metadata travel as extra headers, in
    /// that order. Metadata is compact JSON with sorted object keys.
    pub fn compute_id(&self) -> StoreResult<ObjectId> {
        let headers = vec![
            ("type".to_string(), self.rev_type.as_str().as_bytes().to_vec()),
            ("synthetic".to_string(), self.synthetic.to_string().into_bytes()),
            ("metadata".to_string(), canonical_json(&self.metadata)?),
        ];
        Ok(revision_id(&RevisionManifest {
            directory: self.directory,
            parents: &self.parents,
            author: &self.author,
            date: self.date,
            committer: &self.committer,
            committer_date: self.committer_date,
            extra_headers: &headers,
            message: self.message.as_bytes(),
        }))
    }

    /// Set `id` from the record contents and return it.
    pub fn assign_id(&mut self) -> StoreResult<ObjectId> {
        self.id = self.compute_id()?;
        Ok(self.id)
    }
}

// ---------------------------------------------------------------------------
// Release
// ---------------------------------------------------------------------------

/// Type of object a release points to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    Revision,
    Release,
    Directory,
    Content,
}

impl TargetType {
    /// The git object type written into manifests.
    pub fn object_type(&self) -> ObjectType {
        match self {
            Self::Revision => ObjectType::Commit,
            Self::Release => ObjectType::Tag,
            Self::Directory => ObjectType::Tree,
            Self::Content => ObjectType::Blob,
        }
    }
}

/// Named pointer to a revision.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub id: ObjectId,
    pub target: ObjectId,
    pub target_type: TargetType,
    /// The version string.
    pub name: String,
    pub author: Person,
    pub date: Timestamp,
    pub message: String,
    pub synthetic: bool,
}

impl Release {
    /// Compute the identifier. The synthetic flag is an extra header.
    pub fn compute_id(&self) -> ObjectId {
        let headers = vec![(
            "synthetic".to_string(),
            self.synthetic.to_string().into_bytes(),
        )];
        release_id(&ReleaseManifest {
            target: self.target,
            target_type: self.target_type.object_type(),
            name: &self.name,
            author: &self.author,
            date: self.date,
            extra_headers: &headers,
            message: self.message.as_bytes(),
        })
    }

    /// Set `id` from the record contents and return it.
    pub fn assign_id(&mut self) -> ObjectId {
        self.id = self.compute_id();
        self.id
    }
}

// ---------------------------------------------------------------------------
// Origin & occurrence
// ---------------------------------------------------------------------------

/// Store-assigned origin identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OriginId(pub u64);

impl fmt::Display for OriginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a package's history was retrieved from.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Origin {
    #[serde(rename = "type")]
    pub origin_type: String,
    pub url: String,
}

impl Origin {
    /// The snapshot origin for a Debian source package.
    pub fn debian_snapshot(package: &str) -> Self {
        Self {
            origin_type: "deb".to_string(),
            url: format!("http://snapshot.debian.org/package/{package}/"),
        }
    }
}

/// Branch binding an origin and an authority to a revision.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Occurrence {
    pub origin: OriginId,
    /// Branch name: the package version string.
    pub branch: String,
    pub target: ObjectId,
    pub target_type: TargetType,
    /// Authority asserting the occurrence.
    pub authority: Uuid,
    /// Instant from which the authority vouches for it.
    pub validity: Timestamp,
}

/// Serde adapter for raw entry names: UTF-8 names are JSON strings, other
/// names are byte arrays.
mod name_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(name: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        match std::str::from_utf8(name) {
            Ok(text) => serializer.serialize_str(text),
            Err(_) => serializer.serialize_bytes(name),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Name {
            Text(String),
            Raw(Vec<u8>),
        }
        Ok(match Name::deserialize(deserializer)? {
            Name::Text(text) => text.into_bytes(),
            Name::Raw(raw) => raw,
        })
    }
}
