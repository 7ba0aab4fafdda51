//! Canonical manifests for structured objects.
//!
//! Every identifier is `sha1("<type> <len>\0" || body)`. The bodies follow
//! git's formats so that identifiers stay interoperable with any store keyed
//! the same way:
//!
//! ```text
//! tree:    for each entry: "<octal perms> <name>\0" <20 raw id bytes>
//!          (sorted by name bytes, directories compared as "<name>/")
//! commit:  tree <hex>\n
//!          parent <hex>\n            (zero or more)
//!          author <person> <date>\n
//!          committer <person> <date>\n
//!          <key> <value>\n           (extra headers, in the given order)
//!          \n
//!          <message>
//! tag:     object <hex>\n
//!          type <target type>\n
//!          tag <name>\n
//!          tagger <person> <date>\n
//!          <key> <value>\n           (extra headers)
//!          \n
//!          <message>
//! ```
//!
//! `<person>` is `name <email>` and `<date>` is `<seconds> <±HHMM>`. Header
//! values containing newlines are continued with a leading space, as git
//! does.

use debload_types::{ObjectId, Person, Timestamp};
use serde::Serialize;

use crate::error::{HashError, HashResult};
use crate::hasher::{ContentHasher, ObjectType};

/// One entry of a directory manifest.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ManifestEntry<'a> {
    /// Raw entry name (file names need not be UTF-8).
    pub name: &'a [u8],
    /// Git permission bits (`0o100644`, `0o100755`, `0o120000`, `0o40000`).
    pub perms: u32,
    /// Identifier of the referenced object.
    pub target: ObjectId,
    /// Directories sort as though their name ended in `/`.
    pub is_directory: bool,
}

impl ManifestEntry<'_> {
    fn sort_key(&self) -> Vec<u8> {
        let mut key = self.name.to_vec();
        if self.is_directory {
            key.push(b'/');
        }
        key
    }
}

/// Serialize a directory body. Entry order in the input does not matter.
pub fn directory_manifest(entries: &[ManifestEntry<'_>]) -> Vec<u8> {
    let mut sorted: Vec<(Vec<u8>, &ManifestEntry<'_>)> =
        entries.iter().map(|e| (e.sort_key(), e)).collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));

    let mut body = Vec::new();
    for (_, entry) in sorted {
        body.extend_from_slice(format!("{:o} ", entry.perms).as_bytes());
        body.extend_from_slice(entry.name);
        body.push(0);
        body.extend_from_slice(entry.target.as_bytes());
    }
    body
}

/// Identifier of a directory.
pub fn directory_id(entries: &[ManifestEntry<'_>]) -> ObjectId {
    ContentHasher::TREE.hash(&directory_manifest(entries))
}

/// Identity-relevant fields of a revision.
#[derive(Clone, Debug)]
pub struct RevisionManifest<'a> {
    pub directory: ObjectId,
    pub parents: &'a [ObjectId],
    pub author: &'a Person,
    pub date: Timestamp,
    pub committer: &'a Person,
    pub committer_date: Timestamp,
    pub extra_headers: &'a [(String, Vec<u8>)],
    pub message: &'a [u8],
}

/// Serialize a revision body.
pub fn revision_manifest(rev: &RevisionManifest<'_>) -> Vec<u8> {
    let mut body = Vec::new();
    push_header(&mut body, "tree", rev.directory.to_hex().as_bytes());
    for parent in rev.parents {
        push_header(&mut body, "parent", parent.to_hex().as_bytes());
    }
    push_header(&mut body, "author", &signature_line(rev.author, rev.date));
    push_header(
        &mut body,
        "committer",
        &signature_line(rev.committer, rev.committer_date),
    );
    for (key, value) in rev.extra_headers {
        push_header(&mut body, key, value);
    }
    body.push(b'\n');
    body.extend_from_slice(rev.message);
    body
}

/// Identifier of a revision.
pub fn revision_id(rev: &RevisionManifest<'_>) -> ObjectId {
    ContentHasher::COMMIT.hash(&revision_manifest(rev))
}

/// Identity-relevant fields of a release.
#[derive(Clone, Debug)]
pub struct ReleaseManifest<'a> {
    pub target: ObjectId,
    pub target_type: ObjectType,
    pub name: &'a str,
    pub author: &'a Person,
    pub date: Timestamp,
    pub extra_headers: &'a [(String, Vec<u8>)],
    pub message: &'a [u8],
}

/// Serialize a release body.
pub fn release_manifest(rel: &ReleaseManifest<'_>) -> Vec<u8> {
    let mut body = Vec::new();
    push_header(&mut body, "object", rel.target.to_hex().as_bytes());
    push_header(&mut body, "type", rel.target_type.as_str().as_bytes());
    push_header(&mut body, "tag", rel.name.as_bytes());
    push_header(&mut body, "tagger", &signature_line(rel.author, rel.date));
    for (key, value) in rel.extra_headers {
        push_header(&mut body, key, value);
    }
    body.push(b'\n');
    body.extend_from_slice(rel.message);
    body
}

/// Identifier of a release.
pub fn release_id(rel: &ReleaseManifest<'_>) -> ObjectId {
    ContentHasher::TAG.hash(&release_manifest(rel))
}

/// Compact JSON used when structured metadata takes part in an identifier.
///
/// Struct fields keep their declaration order. Values built through
/// `serde_json::Value` come out with object keys sorted, which is the form
/// stored alongside revisions.
pub fn canonical_json<T: Serialize>(value: &T) -> HashResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| HashError::Serialization(e.to_string()))
}

fn signature_line(person: &Person, date: Timestamp) -> Vec<u8> {
    let mut line = person.to_git_bytes();
    line.push(b' ');
    line.extend_from_slice(date.to_git_string().as_bytes());
    line
}

fn push_header(body: &mut Vec<u8>, key: &str, value: &[u8]) {
    body.extend_from_slice(key.as_bytes());
    body.push(b' ');
    for &byte in value {
        body.push(byte);
        if byte == b'\n' {
            body.push(b' ');
        }
    }
    body.push(b'\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::hash_bytes;

    fn file_entry<'a>(name: &'a str, target: ObjectId) -> ManifestEntry<'a> {
        ManifestEntry {
            name: name.as_bytes(),
            perms: 0o100644,
            target,
            is_directory: false,
        }
    }

    fn dir_entry<'a>(name: &'a str, target: ObjectId) -> ManifestEntry<'a> {
        ManifestEntry {
            name: name.as_bytes(),
            perms: 0o40000,
            target,
            is_directory: true,
        }
    }

    #[test]
    fn empty_tree_matches_git() {
        assert_eq!(
            directory_id(&[]).to_hex(),
            "4b825dc642cb6eb9a060e54bf8d69288fbee4904"
        );
    }

    #[test]
    fn single_entry_layout() {
        let blob = hash_bytes(b"hello world\n").sha1_git;
        let body = directory_manifest(&[file_entry("onefile.txt", blob)]);
        let mut expected = b"100644 onefile.txt\0".to_vec();
        expected.extend_from_slice(blob.as_bytes());
        assert_eq!(body, expected);
    }

    #[test]
    fn directory_perms_have_no_leading_zero() {
        let body = directory_manifest(&[dir_entry("sub", ObjectId::null())]);
        assert!(body.starts_with(b"40000 sub\0"));
    }

    #[test]
    fn entry_order_is_irrelevant() {
        let a = hash_bytes(b"a").sha1_git;
        let b = hash_bytes(b"b").sha1_git;
        let forward = directory_id(&[file_entry("a", a), file_entry("b", b)]);
        let backward = directory_id(&[file_entry("b", b), file_entry("a", a)]);
        assert_eq!(forward, backward);
    }

    #[test]
    fn directories_sort_with_trailing_slash() {
        let id = ObjectId::null();
        let body = directory_manifest(&[dir_entry("a", id), file_entry("a.txt", id)]);
        // '.' (0x2e) sorts before '/' (0x2f), so the file comes first.
        let file_pos = body.windows(5).position(|w| w == b"a.txt").unwrap();
        let dir_pos = body.windows(6).position(|w| w == b" a\0\0\0\0").unwrap();
        assert!(file_pos < dir_pos);
    }

    #[test]
    fn changing_any_entry_changes_id() {
        let a = hash_bytes(b"a").sha1_git;
        let base = directory_id(&[file_entry("a", a)]);
        let renamed = directory_id(&[file_entry("b", a)]);
        let mut exec = file_entry("a", a);
        exec.perms = 0o100755;
        assert_ne!(base, renamed);
        assert_ne!(base, directory_id(&[exec]));
    }

    fn sample_revision<'a>(
        author: &'a Person,
        robot: &'a Person,
        headers: &'a [(String, Vec<u8>)],
    ) -> RevisionManifest<'a> {
        RevisionManifest {
            directory: directory_id(&[]),
            parents: &[],
            author,
            date: Timestamp::new(1_420_449_072, 0, 60),
            committer: robot,
            committer_date: Timestamp::new(1_420_449_100, 0, 0),
            extra_headers: headers,
            message: b"Synthetic revision",
        }
    }

    #[test]
    fn revision_manifest_layout() {
        let author = Person::new("Jane Doe", "jane@example.org");
        let robot = Person::new("Robot", "robot@example.org");
        let headers = vec![("synthetic".to_string(), b"true".to_vec())];
        let body = revision_manifest(&sample_revision(&author, &robot, &headers));
        let text = String::from_utf8(body).unwrap();
        assert_eq!(
            text,
            "tree 4b825dc642cb6eb9a060e54bf8d69288fbee4904\n\
             author Jane Doe <jane@example.org> 1420449072 +0100\n\
             committer Robot <robot@example.org> 1420449100 +0000\n\
             synthetic true\n\
             \n\
             Synthetic revision"
        );
    }

    #[test]
    fn multiline_header_values_are_continued() {
        let author = Person::new("A", "a@x");
        let headers = vec![("note".to_string(), b"line1\nline2".to_vec())];
        let body = revision_manifest(&sample_revision(&author, &author, &headers));
        let text = String::from_utf8(body).unwrap();
        assert!(text.contains("note line1\n line2\n"));
    }

    #[test]
    fn revision_id_is_deterministic_and_sensitive() {
        let author = Person::new("A", "a@x");
        let robot = Person::new("R", "r@x");
        let headers: Vec<(String, Vec<u8>)> = Vec::new();
        let rev = sample_revision(&author, &robot, &headers);
        assert_eq!(revision_id(&rev), revision_id(&rev.clone()));

        let mut later = rev.clone();
        later.committer_date = Timestamp::new(1, 0, 0);
        assert_ne!(revision_id(&rev), revision_id(&later));
    }

    #[test]
    fn release_manifest_layout() {
        let author = Person::new("Jane", "j@x");
        let target = ObjectId::from_hash([0x11; 20]);
        let rel = ReleaseManifest {
            target,
            target_type: ObjectType::Commit,
            name: "1.0-1",
            author: &author,
            date: Timestamp::new(100, 0, 0),
            extra_headers: &[],
            message: b"msg",
        };
        let text = String::from_utf8(release_manifest(&rel)).unwrap();
        assert_eq!(
            text,
            format!(
                "object {}\ntype commit\ntag 1.0-1\ntagger Jane <j@x> 100 +0000\n\nmsg",
                "11".repeat(20)
            )
        );
        assert_eq!(release_id(&rel), ContentHasher::TAG.hash(text.as_bytes()));
    }

    #[test]
    fn canonical_json_is_compact() {
        #[derive(Serialize)]
        struct Sample {
            b: u32,
            a: &'static str,
        }
        let json = canonical_json(&Sample { b: 1, a: "x" }).unwrap();
        assert_eq!(json, br#"{"b":1,"a":"x"}"#.to_vec());
    }
}
