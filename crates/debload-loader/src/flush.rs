//! Flush policy and end-of-batch finalization.
//!
//! Pending objects leave the accumulator in a fixed order: contents, then
//! directories, then the temporary directories they were read from. Once the
//! package stream is exhausted, revisions, releases and occurrences follow,
//! each phase depending on the identifiers assigned by the previous one.

use std::path::PathBuf;

use debload_store::{ArchiveStore, Content, Directory, Occurrence, TargetType};
use debload_types::{DebianVersion, ObjectId};
use serde::Serialize;

use crate::accumulator::Accumulator;
use crate::config::{Authority, FlushThresholds};
use crate::convert::{package_to_release, package_to_revision, shallow_content_to_content};
use crate::error::{LoaderError, LoaderResult};
use crate::package::Package;
use crate::processor::PartialResult;

/// What one flush attempt did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    pub flushed: bool,
    pub contents_written: usize,
    /// Contents the store already had.
    pub contents_skipped: usize,
    pub directories_written: usize,
    /// Directories the store already had.
    pub directories_skipped: usize,
    pub tempdirs_removed: usize,
}

/// Final state of one candidate package.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PackageStatus {
    Loaded {
        revision: ObjectId,
        release: ObjectId,
    },
    Skipped {
        kind: &'static str,
        reason: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PackageReport {
    pub name: String,
    pub version: DebianVersion,
    pub status: PackageStatus,
}

/// Totals for a whole batch.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub flushes: usize,
    pub contents_written: usize,
    pub contents_skipped: usize,
    pub directories_written: usize,
    pub directories_skipped: usize,
    pub tempdirs_removed: usize,
    pub revisions: usize,
    pub releases: usize,
    pub occurrences: usize,
    /// Every candidate, sorted by name then version.
    pub packages: Vec<PackageReport>,
}

impl BatchReport {
    pub fn record_flush(&mut self, flush: &FlushReport) {
        if !flush.flushed {
            return;
        }
        self.flushes += 1;
        self.contents_written += flush.contents_written;
        self.contents_skipped += flush.contents_skipped;
        self.directories_written += flush.directories_written;
        self.directories_skipped += flush.directories_skipped;
        self.tempdirs_removed += flush.tempdirs_removed;
    }

    pub fn loaded(&self) -> usize {
        self.packages
            .iter()
            .filter(|p| matches!(p.status, PackageStatus::Loaded { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.packages.len() - self.loaded()
    }
}

/// Whether any threshold is reached by the pending objects.
pub fn should_flush(objects: &Accumulator, thresholds: &FlushThresholds) -> bool {
    objects.contents.len() >= thresholds.content_packet_size
        || objects.directories.len() >= thresholds.directory_packet_size
        || objects.content_volume(thresholds.content_max_length_one)
            >= thresholds.content_packet_length
}

/// Flush pending objects when `force` is set or a threshold fires.
///
/// Contents and directories always go out together, followed by removal of
/// every temporary directory recorded so far.
pub fn try_flush_partial<S: ArchiveStore + ?Sized>(
    store: &S,
    partial: &mut PartialResult,
    thresholds: &FlushThresholds,
    force: bool,
) -> LoaderResult<FlushReport> {
    if !force && !should_flush(&partial.objects, thresholds) {
        return Ok(FlushReport::default());
    }

    let (contents_written, contents_skipped) =
        flush_content(store, &mut partial.objects, thresholds.content_max_length_one)?;
    let (directories_written, directories_skipped) =
        flush_directory(store, &mut partial.objects, thresholds.check_directories)?;
    let tempdirs_removed = remove_tempdirs(&mut partial.tempdirs);

    tracing::info!(
        kind = "deb_flush",
        force,
        contents_written,
        contents_skipped,
        directories_written,
        directories_skipped,
        tempdirs_removed,
        "flushed pending objects"
    );

    Ok(FlushReport {
        flushed: true,
        contents_written,
        contents_skipped,
        directories_written,
        directories_skipped,
        tempdirs_removed,
    })
}

/// Write the pending contents the store lacks, then drop them all.
///
/// Only missing contents are read from disk. Returns the written and
/// skipped counts.
pub fn flush_content<S: ArchiveStore + ?Sized>(
    store: &S,
    objects: &mut Accumulator,
    max_length: u64,
) -> LoaderResult<(usize, usize)> {
    if objects.contents.is_empty() {
        return Ok((0, 0));
    }
    let ids: Vec<_> = objects.contents.keys().copied().collect();
    let missing = store.content_missing(&ids)?;

    let contents = missing
        .iter()
        .filter_map(|id| objects.contents.get(id))
        .map(|shallow| shallow_content_to_content(shallow, max_length))
        .collect::<LoaderResult<Vec<Content>>>()?;
    if !contents.is_empty() {
        store.content_add(&contents)?;
    }

    let written = contents.len();
    objects.take_contents();
    Ok((written, ids.len() - written))
}

/// Write the pending directories, then drop them all.
///
/// With `check` set only the directories the store lacks are written.
/// Returns the written and skipped counts.
pub fn flush_directory<S: ArchiveStore + ?Sized>(
    store: &S,
    objects: &mut Accumulator,
    check: bool,
) -> LoaderResult<(usize, usize)> {
    let mut pending = objects.take_directories();
    if pending.is_empty() {
        return Ok((0, 0));
    }
    let total = pending.len();
    let directories: Vec<Directory> = if check {
        let ids: Vec<_> = pending.keys().copied().collect();
        store
            .directory_missing(&ids)?
            .iter()
            .filter_map(|id| pending.remove(id))
            .collect()
    } else {
        pending.into_values().collect()
    };
    if !directories.is_empty() {
        store.directory_add(&directories)?;
    }
    Ok((directories.len(), total - directories.len()))
}

/// Remove every recorded temporary directory and forget them.
///
/// Failures are logged and do not stop the batch. Returns how many were
/// removed.
pub fn remove_tempdirs(tempdirs: &mut Vec<PathBuf>) -> usize {
    let mut removed = 0;
    for dir in tempdirs.drain(..) {
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %dir.display(), error = %e, "cannot remove temporary directory")
            }
        }
    }
    removed
}

/// Compute and write a revision for every package, recording its id.
pub fn flush_revision<S: ArchiveStore + ?Sized>(
    store: &S,
    packages: &mut [Package],
) -> LoaderResult<usize> {
    let mut revisions = Vec::with_capacity(packages.len());
    for package in packages.iter_mut() {
        let revision = package_to_revision(package)?;
        package.revision = Some(revision.id);
        revisions.push(revision);
    }
    store.revision_add(&revisions)?;
    Ok(revisions.len())
}

/// Compute and write a release for every package. Revisions must be set.
pub fn flush_release<S: ArchiveStore + ?Sized>(
    store: &S,
    packages: &mut [Package],
) -> LoaderResult<usize> {
    let mut releases = Vec::with_capacity(packages.len());
    for package in packages.iter_mut() {
        let release = package_to_release(package)?;
        package.release = Some(release.id);
        releases.push(release);
    }
    store.release_add(&releases)?;
    Ok(releases.len())
}

/// Write one branch per package and authority, named by the version and
/// pointing at the package revision.
pub fn flush_occurrences<S: ArchiveStore + ?Sized>(
    store: &S,
    packages: &[Package],
    authorities: &[Authority],
) -> LoaderResult<usize> {
    let mut occurrences = Vec::with_capacity(packages.len() * authorities.len());
    for package in packages {
        let origin = package.source.origin.ok_or_else(|| LoaderError::OriginNotAssigned {
            name: package.name().to_string(),
        })?;
        let target = package.revision.ok_or_else(|| LoaderError::RevisionNotAssigned {
            name: package.name().to_string(),
            version: package.version().to_string(),
        })?;
        for authority in authorities {
            occurrences.push(Occurrence {
                origin,
                branch: package.version().to_string(),
                target,
                target_type: TargetType::Revision,
                authority: authority.authority,
                validity: authority.validity_timestamp(),
            });
        }
    }
    if !occurrences.is_empty() {
        store.occurrence_add(&occurrences)?;
    }
    Ok(occurrences.len())
}

/// Force-flush the remainder and write the per-package records.
///
/// A batch where no package was processed writes no revision, release or
/// occurrence.
pub fn finalize<S: ArchiveStore + ?Sized>(
    store: &S,
    partial: &mut PartialResult,
    thresholds: &FlushThresholds,
    authorities: &[Authority],
) -> LoaderResult<BatchReport> {
    let mut report = BatchReport::default();
    report.record_flush(&try_flush_partial(store, partial, thresholds, true)?);

    if !partial.packages.is_empty() {
        report.revisions = flush_revision(store, &mut partial.packages)?;
        report.releases = flush_release(store, &mut partial.packages)?;
        report.occurrences = flush_occurrences(store, &partial.packages, authorities)?;
    }

    report.packages = package_reports(partial);
    Ok(report)
}

fn package_reports(partial: &PartialResult) -> Vec<PackageReport> {
    let loaded = partial.packages.iter().map(|package| PackageReport {
        name: package.name().to_string(),
        version: package.version().clone(),
        status: match (package.revision, package.release) {
            (Some(revision), Some(release)) => PackageStatus::Loaded { revision, release },
            _ => PackageStatus::Skipped {
                kind: "unfinished",
                reason: "records not written".to_string(),
            },
        },
    });
    let skipped = partial.skipped.iter().map(|skipped| PackageReport {
        name: skipped.source.name.clone(),
        version: skipped.source.version.clone(),
        status: PackageStatus::Skipped {
            kind: skipped.error.kind(),
            reason: skipped.error.to_string(),
        },
    });
    let mut reports: Vec<PackageReport> = loaded.chain(skipped).collect();
    reports.sort_by(|a, b| (&a.name, &a.version).cmp(&(&b.name, &b.version)));
    reports
}
