//! Bottom-up walk of an extracted package tree.
//!
//! The walk visits every entry below the root with `walkdir` in
//! contents-first order, so a directory is only reached once all of its
//! children have been hashed and its identifier can be computed.

use std::collections::{BTreeMap, HashMap};
use std::fs::FileType;
use std::path::{Path, PathBuf};

use debload_hash::{hash_bytes, hash_file, hash_symlink};
use debload_store::{Directory, DirectoryEntry, EntryKind};
use debload_types::{MultiHash, ObjectId};
use walkdir::WalkDir;

use crate::error::PackageError;

/// Key of a children list in [`WalkedObjects`].
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TreeKey {
    /// Holds the single root tree.
    Root,
    /// Holds the direct children of the directory at this path.
    Dir(PathBuf),
}

/// A hashed non-directory entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileObject {
    /// Location on disk. Transient: only valid while the tree exists.
    pub path: PathBuf,
    pub name: Vec<u8>,
    pub hashes: MultiHash,
    pub length: u64,
    pub perms: u32,
    pub kind: EntryKind,
}

impl FileObject {
    pub fn id(&self) -> ObjectId {
        self.hashes.sha1_git
    }
}

/// A directory with its identifier and resolved entries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeObject {
    pub path: PathBuf,
    pub name: Vec<u8>,
    pub id: ObjectId,
    pub entries: Vec<DirectoryEntry>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WalkedObject {
    Blob(FileObject),
    Tree(TreeObject),
}

impl WalkedObject {
    pub fn id(&self) -> ObjectId {
        match self {
            Self::Blob(file) => file.id(),
            Self::Tree(tree) => tree.id,
        }
    }

    fn name(&self) -> &[u8] {
        match self {
            Self::Blob(file) => &file.name,
            Self::Tree(tree) => &tree.name,
        }
    }

    fn to_entry(&self) -> DirectoryEntry {
        match self {
            Self::Blob(file) => DirectoryEntry::new(file.name.clone(), file.kind, file.id(), file.perms),
            Self::Tree(tree) => DirectoryEntry::new(
                tree.name.clone(),
                EntryKind::Directory,
                tree.id,
                EntryKind::Directory.perms(false),
            ),
        }
    }
}

/// Walk output: children lists keyed by parent directory, plus the root.
#[derive(Clone, Debug, Default)]
pub struct WalkedObjects {
    children: BTreeMap<TreeKey, Vec<WalkedObject>>,
}

impl WalkedObjects {
    /// The root tree.
    pub fn root(&self) -> Option<&TreeObject> {
        match self.children.get(&TreeKey::Root)?.first()? {
            WalkedObject::Tree(tree) => Some(tree),
            WalkedObject::Blob(_) => None,
        }
    }

    /// Direct children of a key.
    pub fn get(&self, key: &TreeKey) -> Option<&[WalkedObject]> {
        self.children.get(key).map(Vec::as_slice)
    }

    /// Every walked object, each listed once under its parent.
    pub fn iter(&self) -> impl Iterator<Item = &WalkedObject> {
        self.children.values().flatten()
    }

    /// Number of children lists, the root included.
    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

/// Walk `root` and hash every entry below it.
///
/// Symbolic links are never followed: their content is the link target
/// text. Fails with [`PackageError::TreeWalk`] if `root` is not a directory.
pub fn walk_tree(root: &Path) -> Result<WalkedObjects, PackageError> {
    let meta = std::fs::symlink_metadata(root).map_err(|e| PackageError::TreeWalk {
        path: root.to_path_buf(),
        reason: e.to_string(),
    })?;
    if !meta.is_dir() {
        return Err(PackageError::TreeWalk {
            path: root.to_path_buf(),
            reason: "not a directory".to_string(),
        });
    }

    let mut pending: HashMap<PathBuf, Vec<WalkedObject>> = HashMap::new();
    let mut walked = WalkedObjects::default();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .contents_first(true)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry.map_err(|e| PackageError::TreeWalk {
            path: e.path().unwrap_or(root).to_path_buf(),
            reason: e.to_string(),
        })?;
        let path = entry.path().to_path_buf();
        let name = name_bytes(&path);
        let file_type = entry.file_type();

        let object = if file_type.is_dir() {
            let mut children = pending.remove(&path).unwrap_or_default();
            children.sort_by(|a, b| a.name().cmp(b.name()));
            let entries: Vec<DirectoryEntry> = children.iter().map(WalkedObject::to_entry).collect();
            let directory = Directory::new(entries);
            walked.children.insert(TreeKey::Dir(path.clone()), children);
            WalkedObject::Tree(TreeObject {
                path: path.clone(),
                name,
                id: directory.id,
                entries: directory.entries,
            })
        } else {
            WalkedObject::Blob(hash_entry(&path, name, file_type)?)
        };

        if entry.depth() == 0 {
            walked.children.insert(TreeKey::Root, vec![object]);
        } else if let Some(parent) = path.parent() {
            pending.entry(parent.to_path_buf()).or_default().push(object);
        }
    }

    tracing::debug!(root = %root.display(), dirs = walked.len(), "walked tree");
    Ok(walked)
}

fn hash_entry(path: &Path, name: Vec<u8>, file_type: FileType) -> Result<FileObject, PackageError> {
    let (kind, perms, (hashes, length)) = if file_type.is_symlink() {
        (EntryKind::Symlink, EntryKind::Symlink.perms(false), hash_symlink(path)?)
    } else if file_type.is_file() {
        let executable = is_executable(path)?;
        (EntryKind::File, EntryKind::File.perms(executable), hash_file(path)?)
    } else {
        // Fifos, sockets and device nodes are recorded empty.
        (EntryKind::Special, EntryKind::Special.perms(false), (hash_bytes(b""), 0))
    };
    Ok(FileObject {
        path: path.to_path_buf(),
        name,
        hashes,
        length,
        perms,
        kind,
    })
}

#[cfg(unix)]
fn is_executable(path: &Path) -> std::io::Result<bool> {
    use std::os::unix::fs::PermissionsExt;
    Ok(std::fs::symlink_metadata(path)?.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(_path: &Path) -> std::io::Result<bool> {
    Ok(false)
}

fn name_bytes(path: &Path) -> Vec<u8> {
    let Some(name) = path.file_name() else {
        return Vec::new();
    };
    #[cfg(unix)]
    {
        use std::os::unix::ffi::OsStrExt;
        name.as_bytes().to_vec()
    }
    #[cfg(not(unix))]
    {
        name.to_string_lossy().into_owned().into_bytes()
    }
}
