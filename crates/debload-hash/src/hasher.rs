use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use debload_types::{MultiHash, ObjectId};
use sha1::{Digest, Sha1};
use sha2::Sha256;

use crate::error::{HashError, HashResult};

const CHUNK_SIZE: usize = 64 * 1024;

/// Git object type used as the header of every manifest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectType {
    Blob,
    Tree,
    Commit,
    Tag,
}

impl ObjectType {
    /// The header keyword.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blob => "blob",
            Self::Tree => "tree",
            Self::Commit => "commit",
            Self::Tag => "tag",
        }
    }

    /// Git header for a body of `len` bytes: `"<type> <len>\0"`.
    pub fn header(&self, len: u64) -> Vec<u8> {
        format!("{} {}\0", self.as_str(), len).into_bytes()
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type-separated git SHA-1 hasher.
///
/// Each hasher prepends its object type header to the hashed body, so a blob
/// and a tree with identical bytes produce different identifiers.
pub struct ContentHasher {
    object_type: ObjectType,
}

impl ContentHasher {
    /// Hasher for file contents.
    pub const BLOB: Self = Self::new(ObjectType::Blob);
    /// Hasher for directory manifests.
    pub const TREE: Self = Self::new(ObjectType::Tree);
    /// Hasher for revision manifests.
    pub const COMMIT: Self = Self::new(ObjectType::Commit);
    /// Hasher for release manifests.
    pub const TAG: Self = Self::new(ObjectType::Tag);

    pub const fn new(object_type: ObjectType) -> Self {
        Self { object_type }
    }

    /// Hash a complete manifest body.
    pub fn hash(&self, body: &[u8]) -> ObjectId {
        let mut hasher = Sha1::new();
        hasher.update(self.object_type.header(body.len() as u64));
        hasher.update(body);
        ObjectId::from_hash(hasher.finalize().into())
    }

    /// Verify that a body produces the expected identifier.
    pub fn verify(&self, body: &[u8], expected: &ObjectId) -> bool {
        self.hash(body) == *expected
    }

    /// The object type this hasher is bound to.
    pub fn object_type(&self) -> ObjectType {
        self.object_type
    }
}

/// Single-pass hasher producing every digest of a [`MultiHash`].
///
/// The git blob header needs the length up front, so the caller declares it
/// and [`MultiHasher::finalize`] reports how many bytes actually arrived.
pub struct MultiHasher {
    declared: u64,
    seen: u64,
    sha1: Sha1,
    sha1_git: Sha1,
    sha256: Sha256,
    blake3: blake3::Hasher,
}

impl MultiHasher {
    pub fn new(declared_length: u64) -> Self {
        let mut sha1_git = Sha1::new();
        sha1_git.update(ObjectType::Blob.header(declared_length));
        Self {
            declared: declared_length,
            seen: 0,
            sha1: Sha1::new(),
            sha1_git,
            sha256: Sha256::new(),
            blake3: blake3::Hasher::new(),
        }
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.seen += chunk.len() as u64;
        self.sha1.update(chunk);
        self.sha1_git.update(chunk);
        self.sha256.update(chunk);
        self.blake3.update(chunk);
    }

    /// Finish hashing. Returns the hashes and the number of bytes fed.
    pub fn finalize(self) -> (MultiHash, u64) {
        let hashes = MultiHash {
            sha1: self.sha1.finalize().into(),
            sha1_git: ObjectId::from_hash(self.sha1_git.finalize().into()),
            sha256: self.sha256.finalize().into(),
            blake3: *self.blake3.finalize().as_bytes(),
        };
        (hashes, self.seen)
    }

    /// The length declared at construction.
    pub fn declared_length(&self) -> u64 {
        self.declared
    }
}

/// Hash an in-memory byte string.
pub fn hash_bytes(data: &[u8]) -> MultiHash {
    let mut hasher = MultiHasher::new(data.len() as u64);
    hasher.update(data);
    hasher.finalize().0
}

/// Hash a regular file, streaming it in fixed-size chunks.
///
/// Returns the hash set and the byte length. Fails if the file cannot be
/// read or if its size changes while it is being read.
pub fn hash_file(path: &Path) -> HashResult<(MultiHash, u64)> {
    let io_err = |source| HashError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::open(path).map_err(io_err)?;
    let declared = file.metadata().map_err(io_err)?.len();

    let mut hasher = MultiHasher::new(declared);
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf).map_err(io_err)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    let (hashes, actual) = hasher.finalize();
    if actual != declared {
        return Err(HashError::LengthMismatch {
            path: path.to_path_buf(),
            expected: declared,
            actual,
        });
    }
    Ok((hashes, actual))
}

/// Hash a symbolic link: the blob body is the link target, unresolved.
pub fn hash_symlink(path: &Path) -> HashResult<(MultiHash, u64)> {
    let target = symlink_target_bytes(path)?;
    Ok((hash_bytes(&target), target.len() as u64))
}

/// Raw bytes of a symbolic link's target.
pub fn symlink_target_bytes(path: &Path) -> HashResult<Vec<u8>> {
    let target = std::fs::read_link(path).map_err(|source| HashError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    #[cfg(unix)]
    {
        use std::os::unix::ffi::OsStrExt;
        Ok(target.as_os_str().as_bytes().to_vec())
    }
    #[cfg(not(unix))]
    {
        Ok(target.to_string_lossy().into_owned().into_bytes())
    }
}
