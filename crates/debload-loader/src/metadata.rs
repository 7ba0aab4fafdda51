//! Package metadata from the `.dsc` descriptor and `debian/changelog`.
//!
//! Only the fields the loader records are read: `Files`, `Maintainer` and
//! `Uploaders` from the descriptor, and the header and trailer lines of each
//! changelog entry.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use debload_types::{Person, Timestamp};

use crate::convert::identity_to_person;
use crate::error::PackageError;
use crate::package::{
    get_file_info, ChangelogInfo, ListerMetadata, PackageInfo, PackageMetadata, SourcePackage,
};
use crate::signature::{GpgvVerifier, SignatureVerifier};

/// Assembles the metadata of an extracted package.
pub trait MetadataSource {
    fn package_metadata(
        &self,
        package: &SourcePackage,
        extracted: &Path,
        keyrings: &[PathBuf],
    ) -> Result<PackageMetadata, PackageError>;
}

impl<M: MetadataSource + ?Sized> MetadataSource for &M {
    fn package_metadata(
        &self,
        package: &SourcePackage,
        extracted: &Path,
        keyrings: &[PathBuf],
    ) -> Result<PackageMetadata, PackageError> {
        (**self).package_metadata(package, extracted, keyrings)
    }
}

/// Reads metadata from the descriptor, the changelog and the signature.
#[derive(Clone, Debug, Default)]
pub struct DebianMetadataParser<V = GpgvVerifier> {
    verifier: V,
}

impl<V: SignatureVerifier> DebianMetadataParser<V> {
    pub fn new(verifier: V) -> Self {
        Self { verifier }
    }
}

impl<V: SignatureVerifier> MetadataSource for DebianMetadataParser<V> {
    fn package_metadata(
        &self,
        package: &SourcePackage,
        extracted: &Path,
        keyrings: &[PathBuf],
    ) -> Result<PackageMetadata, PackageError> {
        let dsc_bytes = std::fs::read(&package.dsc)?;
        let fields = parse_deb822(&String::from_utf8_lossy(&dsc_bytes));

        let mut original_artifact = vec![get_file_info(&package.dsc)?];
        let dsc_dir = package.dsc.parent().unwrap_or_else(|| Path::new("."));
        for name in dsc_files(&fields) {
            original_artifact.push(get_file_info(&dsc_dir.join(name))?);
        }

        let changelog_path = extracted.join("debian").join("changelog");
        let raw = std::fs::read(&changelog_path)?;
        let text = match String::from_utf8(raw) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(
                    kind = "deb_changelog_encoding",
                    package = %package.name,
                    version = %package.version,
                    changelog = %changelog_path.display(),
                    "unknown encoding for changelog, falling back to ISO-8859-15"
                );
                decode_iso_8859_15(e.as_bytes())
            }
        };
        let changelog = parse_changelog(&text)
            .map_err(|reason| PackageError::metadata(&changelog_path, reason))?;

        let pgp_signature = self.verifier.verify(&package.dsc, keyrings);
        if pgp_signature.is_none() {
            tracing::info!(
                kind = "deb_missing_signature",
                package = %package.name,
                version = %package.version,
                "could not get PGP signature on package"
            );
        }

        let maintainer = fields
            .get("maintainer")
            .ok_or_else(|| PackageError::metadata(&package.dsc, "missing Maintainer field"))?;
        let mut maintainers = vec![identity_to_person(maintainer)];
        if let Some(uploaders) = fields.get("uploaders") {
            maintainers.extend(split_uploaders(uploaders).map(identity_to_person));
        }

        Ok(PackageMetadata {
            original_artifact,
            package_info: PackageInfo {
                name: package.name.clone(),
                version: package.version.to_string(),
                lister_metadata: ListerMetadata::snapshot(package.id),
                changelog,
                pgp_signature,
                maintainers,
            },
        })
    }
}

// ---------------------------------------------------------------------------
// Descriptor
// ---------------------------------------------------------------------------

/// Parse the first paragraph of a deb822 document into lowercase keys.
///
/// An inline PGP armor is stripped first. Continuation lines are joined with
/// newlines, with a lone `.` standing for an empty line.
pub fn parse_deb822(text: &str) -> BTreeMap<String, String> {
    let mut fields: BTreeMap<String, String> = BTreeMap::new();
    let mut current: Option<String> = None;

    for line in strip_armor(text) {
        if line.trim().is_empty() {
            if fields.is_empty() {
                continue;
            }
            break;
        }
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(value) = current.as_ref().and_then(|key| fields.get_mut(key)) {
                let continued = line.trim();
                value.push('\n');
                if continued != "." {
                    value.push_str(continued);
                }
            }
            continue;
        }
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim().to_ascii_lowercase();
            fields.insert(key.clone(), value.trim().to_string());
            current = Some(key);
        }
    }
    fields
}

fn strip_armor(text: &str) -> Vec<&str> {
    let mut lines = text.lines();
    let Some(first) = text.lines().find(|l| !l.trim().is_empty()) else {
        return Vec::new();
    };
    if first.trim() != "-----BEGIN PGP SIGNED MESSAGE-----" {
        return text.lines().collect();
    }
    // Skip the armor header block up to its blank line.
    for line in lines.by_ref() {
        if line.trim().is_empty() {
            break;
        }
    }
    lines
        .take_while(|l| l.trim() != "-----BEGIN PGP SIGNATURE-----")
        .map(|l| l.strip_prefix("- ").unwrap_or(l))
        .collect()
}

/// File names listed in the `Files` field (`<md5> <size> <name>` lines).
pub fn dsc_files(fields: &BTreeMap<String, String>) -> Vec<&str> {
    fields
        .get("files")
        .map(|files| {
            files
                .lines()
                .filter_map(|line| line.split_whitespace().nth(2))
                .collect()
        })
        .unwrap_or_default()
}

/// Split an `Uploaders` value on the commas that close an address.
pub fn split_uploaders(value: &str) -> impl Iterator<Item = &str> {
    let mut parts = Vec::new();
    let mut start = 0;
    for (i, c) in value.char_indices() {
        if c == ',' && value[start..i].trim_end().ends_with('>') {
            parts.push(value[start..i].trim());
            start = i + 1;
        }
    }
    parts.push(value[start..].trim());
    parts.into_iter().filter(|p| !p.is_empty())
}

// ---------------------------------------------------------------------------
// Changelog
// ---------------------------------------------------------------------------

/// Parse the entries of a Debian changelog.
///
/// Author and date come from the trailer of the first entry; the history
/// lists every later entry.
pub fn parse_changelog(text: &str) -> Result<ChangelogInfo, String> {
    let mut blocks: Vec<(String, String)> = Vec::new();
    let mut first_trailer: Option<(Person, Timestamp)> = None;

    for line in text.lines() {
        if let Some(rest) = line.strip_prefix(" -- ") {
            if blocks.len() == 1 && first_trailer.is_none() {
                let (identity, date) = rest
                    .split_once("  ")
                    .ok_or_else(|| format!("malformed trailer line {line:?}"))?;
                let date = Timestamp::parse_rfc2822(date).map_err(|e| e.to_string())?;
                first_trailer = Some((identity_to_person(identity.trim()), date));
            }
            continue;
        }
        if line.is_empty() || line.starts_with(char::is_whitespace) {
            continue;
        }
        if let Some((package, version)) = parse_header(line) {
            blocks.push((package, version));
        }
    }

    if blocks.is_empty() {
        return Err("no changelog entry".to_string());
    }
    let (person, date) = first_trailer.ok_or_else(|| "first entry has no trailer".to_string())?;
    Ok(ChangelogInfo {
        person,
        date,
        history: blocks.into_iter().skip(1).collect(),
    })
}

/// `package (version) distributions; urgency=...`
fn parse_header(line: &str) -> Option<(String, String)> {
    let (package, rest) = line.split_once(" (")?;
    let (version, _) = rest.split_once(')')?;
    if package.is_empty() || package.contains(char::is_whitespace) {
        return None;
    }
    Some((package.to_string(), version.to_string()))
}

/// Decode ISO-8859-15: Latin-1 except for eight code points.
pub fn decode_iso_8859_15(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| match b {
            0xA4 => '\u{20AC}',
            0xA6 => '\u{0160}',
            0xA8 => '\u{0161}',
            0xB4 => '\u{017D}',
            0xB8 => '\u{017E}',
            0xBC => '\u{0152}',
            0xBD => '\u{0153}',
            0xBE => '\u{0178}',
            _ => char::from(b),
        })
        .collect()
}
