use std::collections::{BTreeMap, HashSet};

use debload_store::Directory;
use debload_types::ObjectId;

use crate::convert::ShallowContent;
use crate::dedup::{remove_transient, ObjectSet, RemoveDuplicates};

/// Batch-wide merge buffer.
///
/// The working maps are drained by every flush. The seen-sets are never
/// cleared, so an identifier queued once in a run is never queued again.
#[derive(Debug, Default)]
pub struct Accumulator {
    pub contents: BTreeMap<ObjectId, ShallowContent>,
    pub directories: BTreeMap<ObjectId, Directory>,
    content_seen: HashSet<ObjectId>,
    directory_seen: HashSet<ObjectId>,
}

/// What a merge did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub new_contents: usize,
    pub duplicate_contents: usize,
    pub new_directories: usize,
    pub duplicate_directories: usize,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one package's objects.
    ///
    /// Contents already seen in this run are dropped and, with
    /// [`RemoveDuplicates::Yes`], their transient file is deleted.
    pub fn merge_objects(&mut self, updates: ObjectSet, remove: RemoveDuplicates) -> MergeStats {
        let mut stats = MergeStats::default();

        for (id, content) in updates.contents {
            if self.content_seen.insert(id) {
                self.contents.insert(id, content);
                stats.new_contents += 1;
            } else {
                if remove == RemoveDuplicates::Yes {
                    remove_transient(&content.path);
                }
                stats.duplicate_contents += 1;
            }
        }

        for (id, directory) in updates.directories {
            if self.directory_seen.insert(id) {
                self.directories.insert(id, directory);
                stats.new_directories += 1;
            } else {
                stats.duplicate_directories += 1;
            }
        }

        stats
    }

    pub fn content_seen(&self, id: &ObjectId) -> bool {
        self.content_seen.contains(id)
    }

    pub fn directory_seen(&self, id: &ObjectId) -> bool {
        self.directory_seen.contains(id)
    }

    /// Byte volume of pending contents at or under `max_length`.
    pub fn content_volume(&self, max_length: u64) -> u64 {
        self.contents
            .values()
            .map(|c| c.length)
            .filter(|&len| len <= max_length)
            .sum()
    }

    /// Take the pending contents, leaving the seen-set intact.
    pub fn take_contents(&mut self) -> BTreeMap<ObjectId, ShallowContent> {
        std::mem::take(&mut self.contents)
    }

    /// Take the pending directories, leaving the seen-set intact.
    pub fn take_directories(&mut self) -> BTreeMap<ObjectId, Directory> {
        std::mem::take(&mut self.directories)
    }
}
