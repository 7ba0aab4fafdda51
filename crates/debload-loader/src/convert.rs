//! Conversions from walker output and processed packages to store records.

use std::path::PathBuf;

use debload_hash::symlink_target_bytes;
use debload_store::{
    Content, ContentStatus, Directory, EntryKind, Release, Revision, RevisionType, TargetType,
};
use debload_types::{MultiHash, ObjectId, Person};

use crate::error::{LoaderError, LoaderResult};
use crate::package::Package;
use crate::walker::{FileObject, TreeObject};

/// Reason recorded on contents over the length ceiling.
pub const ABSENT_REASON: &str = "Content too large";

/// Committer of every synthetic revision.
pub fn robot_author() -> Person {
    Person::new("Software Heritage", "robot@softwareheritage.org")
}

/// A content without its bytes, still pointing at its file on disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShallowContent {
    pub hashes: MultiHash,
    pub length: u64,
    pub perms: u32,
    pub kind: EntryKind,
    pub path: PathBuf,
}

impl ShallowContent {
    pub fn id(&self) -> ObjectId {
        self.hashes.sha1_git
    }
}

/// Drop everything but the metadata needed to materialize a content later.
pub fn file_to_shallow_content(file: &FileObject) -> ShallowContent {
    ShallowContent {
        hashes: file.hashes,
        length: file.length,
        perms: file.perms,
        kind: file.kind,
        path: file.path.clone(),
    }
}

/// Materialize a content under a length ceiling.
///
/// Contents strictly longer than `max_length` become absent and are never
/// read. Others are read from disk; symlinks contribute their target text.
pub fn shallow_content_to_content(shallow: &ShallowContent, max_length: u64) -> LoaderResult<Content> {
    let status = if shallow.length > max_length {
        ContentStatus::Absent {
            reason: ABSENT_REASON.to_string(),
        }
    } else {
        let data = match shallow.kind {
            EntryKind::Symlink => symlink_target_bytes(&shallow.path)?,
            EntryKind::Special => Vec::new(),
            EntryKind::File | EntryKind::Directory => {
                std::fs::read(&shallow.path).map_err(|source| LoaderError::Io {
                    path: shallow.path.clone(),
                    source,
                })?
            }
        };
        ContentStatus::Visible { data }
    };
    Ok(Content {
        hashes: shallow.hashes,
        length: shallow.length,
        perms: shallow.perms,
        kind: shallow.kind,
        status,
    })
}

/// Directory record of a walked tree.
pub fn tree_to_directory(tree: &TreeObject) -> Directory {
    Directory {
        id: tree.id,
        entries: tree.entries.clone(),
    }
}

/// Parse `Display Name <email>` into a person. Never fails.
pub fn identity_to_person(text: &str) -> Person {
    Person::from_identity(text)
}

/// Build the synthetic revision of a package.
///
/// The committer date is the signature date, or the changelog date when the
/// descriptor is unsigned.
pub fn package_to_revision(package: &Package) -> LoaderResult<Revision> {
    let info = &package.metadata.package_info;
    let committer_date = match &info.pgp_signature {
        Some(signature) => signature.date,
        None => {
            tracing::info!(
                kind = "deb_missing_signature",
                package = %package.name(),
                version = %package.version(),
                "no PGP signature on package"
            );
            info.changelog.date
        }
    };
    let metadata = serde_json::to_value(&package.metadata)
        .map_err(|e| LoaderError::Serialization(e.to_string()))?;

    let mut revision = Revision {
        id: ObjectId::null(),
        directory: package.directory,
        parents: Vec::new(),
        author: info.changelog.person.clone(),
        date: info.changelog.date,
        committer: robot_author(),
        committer_date,
        rev_type: RevisionType::Dsc,
        message: format!(
            "Synthetic revision for Debian source package {} version {}",
            package.name(),
            package.version()
        ),
        synthetic: true,
        metadata,
    };
    revision.assign_id()?;
    Ok(revision)
}

/// Build the synthetic release of a package. Its revision must be assigned.
pub fn package_to_release(package: &Package) -> LoaderResult<Release> {
    let target = package.revision.ok_or_else(|| LoaderError::RevisionNotAssigned {
        name: package.name().to_string(),
        version: package.version().to_string(),
    })?;
    let changelog = &package.metadata.package_info.changelog;

    let mut release = Release {
        id: ObjectId::null(),
        target,
        target_type: TargetType::Revision,
        name: package.version().to_string(),
        author: changelog.person.clone(),
        date: changelog.date,
        message: format!(
            "Synthetic release for Debian source package {} version {}",
            package.name(),
            package.version()
        ),
        synthetic: true,
    };
    release.assign_id();
    Ok(release)
}
