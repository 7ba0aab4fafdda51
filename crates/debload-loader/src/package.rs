use std::path::{Path, PathBuf};

use debload_hash::hash_file;
use debload_store::OriginId;
use debload_types::{DebianVersion, MultiHash, ObjectId, Person, Timestamp};
use serde::{Deserialize, Serialize};

use crate::error::PackageError;

/// Lister recorded in package provenance.
pub const LISTER: &str = "snapshot.debian.org";

/// A candidate package, as supplied by discovery.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePackage {
    pub name: String,
    pub version: DebianVersion,
    /// Path of the `.dsc` descriptor. Listed files sit next to it.
    pub dsc: PathBuf,
    /// Package identifier in the lister's database.
    #[serde(default)]
    pub id: u64,
    /// Assigned by the loader when origins are registered.
    #[serde(default)]
    pub origin: Option<OriginId>,
}

impl SourcePackage {
    pub fn new(name: impl Into<String>, version: DebianVersion, dsc: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            version,
            dsc: dsc.into(),
            id: 0,
            origin: None,
        }
    }

    /// `<name>_<version>`, the conventional Debian file stem.
    pub fn stem(&self) -> String {
        format!("{}_{}", self.name, self.version)
    }
}

/// A package that went through extraction, walking and metadata assembly.
#[derive(Clone, Debug, PartialEq)]
pub struct Package {
    pub source: SourcePackage,
    /// Temporary directory holding the extracted tree.
    pub basedir: PathBuf,
    /// Root directory identifier.
    pub directory: ObjectId,
    pub metadata: PackageMetadata,
    /// Set once the revision has been computed.
    pub revision: Option<ObjectId>,
    /// Set once the release has been computed.
    pub release: Option<ObjectId>,
}

impl Package {
    pub fn name(&self) -> &str {
        &self.source.name
    }

    pub fn version(&self) -> &DebianVersion {
        &self.source.version
    }
}

/// Provenance metadata attached to every revision.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMetadata {
    /// The `.dsc` followed by every file listed in it.
    pub original_artifact: Vec<FileInfo>,
    pub package_info: PackageInfo,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    pub name: String,
    pub version: String,
    pub lister_metadata: ListerMetadata,
    pub changelog: ChangelogInfo,
    /// Absent when the descriptor carries no usable signature.
    pub pgp_signature: Option<SignatureInfo>,
    /// `Maintainer` followed by every `Uploaders` entry.
    pub maintainers: Vec<Person>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListerMetadata {
    pub lister: String,
    pub id: u64,
}

impl ListerMetadata {
    pub fn snapshot(id: u64) -> Self {
        Self {
            lister: LISTER.to_string(),
            id,
        }
    }
}

/// What the top changelog entry says about the upload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangelogInfo {
    pub person: Person,
    pub date: Timestamp,
    /// `(package, version)` of every entry but the first.
    pub history: Vec<(String, String)>,
}

/// Signer and signing time of a descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureInfo {
    pub date: Timestamp,
    pub keyid: String,
    pub person: Person,
}

/// Name, hashes and length of an original source artifact.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub name: String,
    #[serde(flatten)]
    pub hashes: MultiHash,
    pub length: u64,
}

/// Hash an original artifact.
pub fn get_file_info(path: &Path) -> Result<FileInfo, PackageError> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (hashes, length) = hash_file(path)?;
    Ok(FileInfo {
        name,
        hashes,
        length,
    })
}
