//! Fixtures shared by the integration tests: an extractor that writes
//! prepared trees and a metadata source that needs no descriptor parsing.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use debload_loader::{
    ChangelogInfo, Extractor, ListerMetadata, MetadataSource, PackageError, PackageInfo,
    PackageMetadata, SignatureInfo, SourcePackage,
};
use debload_types::{DebianVersion, Person, Timestamp};

/// Base changelog date; each package adds its index in hours.
pub const CHANGELOG_EPOCH: i64 = 1_420_449_072;

/// Writes the tree registered for a descriptor. Unknown descriptors fail the
/// way `dpkg-source` exiting non-zero does.
#[derive(Default)]
pub struct FixtureExtractor {
    trees: HashMap<PathBuf, Vec<(String, Vec<u8>)>>,
}

impl FixtureExtractor {
    pub fn with_tree(mut self, dsc: &Path, files: &[(&str, &[u8])]) -> Self {
        let files = files
            .iter()
            .map(|(name, data)| (name.to_string(), data.to_vec()))
            .collect();
        self.trees.insert(dsc.to_path_buf(), files);
        self
    }
}

impl Extractor for FixtureExtractor {
    fn extract(&self, dsc: &Path, dest: &Path) -> Result<(), PackageError> {
        let files = self.trees.get(dsc).ok_or_else(|| PackageError::ExtractionFailed {
            dsc: dsc.to_path_buf(),
            reason: "dpkg-source exited with exit status: 2".to_string(),
        })?;
        std::fs::create_dir_all(dest)?;
        for (name, data) in files {
            let path = dest.join(name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, data)?;
        }
        Ok(())
    }
}

/// Metadata derived from the package name and version alone.
pub struct FixtureMetadata {
    pub signed: bool,
}

impl FixtureMetadata {
    pub fn changelog_date(version: &DebianVersion) -> Timestamp {
        let minor: i64 = version
            .upstream()
            .rsplit('.')
            .next()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        Timestamp::new(CHANGELOG_EPOCH + minor * 3600, 0, 60)
    }
}

impl MetadataSource for FixtureMetadata {
    fn package_metadata(
        &self,
        package: &SourcePackage,
        _extracted: &Path,
        _keyrings: &[PathBuf],
    ) -> Result<PackageMetadata, PackageError> {
        let maintainer = Person::new("Jane Doe", "jane@example.org");
        let date = Self::changelog_date(&package.version);
        Ok(PackageMetadata {
            original_artifact: vec![],
            package_info: PackageInfo {
                name: package.name.clone(),
                version: package.version.to_string(),
                lister_metadata: ListerMetadata::snapshot(package.id),
                changelog: ChangelogInfo {
                    person: maintainer.clone(),
                    date,
                    history: vec![],
                },
                pgp_signature: self.signed.then(|| SignatureInfo {
                    date: Timestamp::from_unix(date.seconds + 60),
                    keyid: "0123456789ABCDEF".to_string(),
                    person: maintainer.clone(),
                }),
                maintainers: vec![maintainer],
            },
        })
    }
}

/// Write an empty descriptor and return the candidate for it.
pub fn candidate(dir: &Path, name: &str, version: &str) -> SourcePackage {
    let dsc = dir.join(format!("{name}_{version}.dsc"));
    std::fs::write(&dsc, format!("Source: {name}\nVersion: {version}\n")).unwrap();
    SourcePackage::new(name, DebianVersion::parse(version).unwrap(), dsc)
}
