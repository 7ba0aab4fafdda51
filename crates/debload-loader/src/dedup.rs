//! Per-package deduplication.
//!
//! Collapsing a walk by identifier is pure; deleting the on-disk copies of
//! the duplicates is a separate step controlled by [`RemoveDuplicates`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use debload_store::Directory;
use debload_types::ObjectId;

use crate::convert::{file_to_shallow_content, tree_to_directory, ShallowContent};
use crate::walker::{WalkedObject, WalkedObjects};

/// Whether duplicate content files are deleted from disk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RemoveDuplicates {
    #[default]
    Yes,
    No,
}

/// Objects of one or more packages, keyed by identifier per class.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObjectSet {
    pub contents: BTreeMap<ObjectId, ShallowContent>,
    pub directories: BTreeMap<ObjectId, Directory>,
}

impl ObjectSet {
    pub fn is_empty(&self) -> bool {
        self.contents.is_empty() && self.directories.is_empty()
    }
}

/// Result of collapsing one walk.
#[derive(Clone, Debug, Default)]
pub struct Collapsed {
    pub objects: ObjectSet,
    /// On-disk paths of contents already present under the same identifier.
    pub duplicate_paths: Vec<PathBuf>,
}

/// Convert every walked object once, keeping the first of each identifier.
pub fn collapse_objects(walked: &WalkedObjects) -> Collapsed {
    let mut collapsed = Collapsed::default();
    for object in walked.iter() {
        match object {
            WalkedObject::Blob(file) => {
                if collapsed.objects.contents.contains_key(&file.id()) {
                    collapsed.duplicate_paths.push(file.path.clone());
                } else {
                    collapsed
                        .objects
                        .contents
                        .insert(file.id(), file_to_shallow_content(file));
                }
            }
            WalkedObject::Tree(tree) => {
                collapsed
                    .objects
                    .directories
                    .entry(tree.id)
                    .or_insert_with(|| tree_to_directory(tree));
            }
        }
    }
    collapsed
}

/// Collapse a walk and, if asked, delete the duplicate content files.
pub fn dedup_objects(walked: &WalkedObjects, remove: RemoveDuplicates) -> ObjectSet {
    let collapsed = collapse_objects(walked);
    if remove == RemoveDuplicates::Yes {
        for path in &collapsed.duplicate_paths {
            remove_transient(path);
        }
    }
    collapsed.objects
}

/// Delete a transient copy. Failures are logged; the object itself is safe
/// since another copy with the same identifier is kept.
pub(crate) fn remove_transient(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "could not remove duplicate file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::walker::walk_tree;
    use std::fs;

    fn tree_with_duplicates() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("a")).unwrap();
        fs::create_dir(dir.path().join("b")).unwrap();
        fs::write(dir.path().join("a/COPYING"), b"GPL").unwrap();
        fs::write(dir.path().join("b/COPYING"), b"GPL").unwrap();
        fs::write(dir.path().join("b/other"), b"other").unwrap();
        dir
    }

    #[test]
    fn collapse_keeps_one_per_id_without_touching_disk() {
        let dir = tree_with_duplicates();
        let walked = walk_tree(dir.path()).unwrap();
        let collapsed = collapse_objects(&walked);

        assert_eq!(collapsed.objects.contents.len(), 2);
        assert_eq!(collapsed.duplicate_paths.len(), 1);
        // a/, b/ and root.
        assert_eq!(collapsed.objects.directories.len(), 3);
        assert!(collapsed.duplicate_paths[0].exists());
    }

    #[test]
    fn dedup_removes_duplicate_files() {
        let dir = tree_with_duplicates();
        let walked = walk_tree(dir.path()).unwrap();
        let objects = dedup_objects(&walked, RemoveDuplicates::Yes);

        let survivors = [dir.path().join("a/COPYING"), dir.path().join("b/COPYING")]
            .iter()
            .filter(|p| p.exists())
            .count();
        assert_eq!(survivors, 1);
        // The kept record points at the surviving copy.
        let kept = objects.contents.values().find(|c| c.length == 3).unwrap();
        assert!(kept.path.exists());
    }

    #[test]
    fn dedup_without_removal_keeps_files() {
        let dir = tree_with_duplicates();
        let walked = walk_tree(dir.path()).unwrap();
        dedup_objects(&walked, RemoveDuplicates::No);
        assert!(dir.path().join("a/COPYING").exists());
        assert!(dir.path().join("b/COPYING").exists());
    }

    #[test]
    fn identical_subtrees_collapse() {
        let dir = tempfile::tempdir().unwrap();
        for sub in ["x", "y"] {
            fs::create_dir(dir.path().join(sub)).unwrap();
            fs::write(dir.path().join(sub).join("f"), b"same").unwrap();
        }
        let walked = walk_tree(dir.path()).unwrap();
        let objects = dedup_objects(&walked, RemoveDuplicates::No);
        // x/ and y/ share one id, plus the root.
        assert_eq!(objects.directories.len(), 2);
    }
}
