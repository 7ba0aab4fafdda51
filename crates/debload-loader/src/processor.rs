use std::path::PathBuf;

use crate::accumulator::Accumulator;
use crate::dedup::{dedup_objects, ObjectSet, RemoveDuplicates};
use crate::error::PackageError;
use crate::extractor::Extractor;
use crate::metadata::MetadataSource;
use crate::package::{Package, SourcePackage};
use crate::walker::walk_tree;

/// Result of processing one package.
#[derive(Debug)]
pub enum PackageOutcome {
    Processed { package: Package, objects: ObjectSet },
    Skipped(SkippedPackage),
}

/// A package left out of the batch, with the reason.
#[derive(Debug)]
pub struct SkippedPackage {
    pub source: SourcePackage,
    pub error: PackageError,
    /// Temporary directory created before the failure, if any.
    pub tempdir: Option<PathBuf>,
}

/// Extracts, walks and describes packages one at a time.
pub struct PackageProcessor<E, M> {
    extractor: E,
    metadata: M,
    keyrings: Vec<PathBuf>,
    work_dir: PathBuf,
    remove_duplicates: RemoveDuplicates,
}

impl<E: Extractor, M: MetadataSource> PackageProcessor<E, M> {
    /// Temporary directories are created under `work_dir`.
    pub fn new(extractor: E, metadata: M, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            extractor,
            metadata,
            keyrings: Vec::new(),
            work_dir: work_dir.into(),
            remove_duplicates: RemoveDuplicates::Yes,
        }
    }

    pub fn with_keyrings(mut self, keyrings: Vec<PathBuf>) -> Self {
        self.keyrings = keyrings;
        self
    }

    pub fn with_remove_duplicates(mut self, remove: RemoveDuplicates) -> Self {
        self.remove_duplicates = remove;
        self
    }

    pub fn remove_duplicates(&self) -> RemoveDuplicates {
        self.remove_duplicates
    }

    /// Process one package into its deduplicated objects.
    ///
    /// Never panics on a bad package: every failure becomes
    /// [`PackageOutcome::Skipped`], carrying the temporary directory so the
    /// caller can still remove it.
    pub fn process_source_package(&self, source: &SourcePackage) -> PackageOutcome {
        tracing::info!(
            kind = "deb_process_start",
            package = %source.name,
            version = %source.version,
            "processing package"
        );
        let mut tempdir = None;
        match self.process(source, &mut tempdir) {
            Ok((package, objects)) => PackageOutcome::Processed { package, objects },
            Err(error) => PackageOutcome::Skipped(SkippedPackage {
                source: source.clone(),
                error,
                tempdir,
            }),
        }
    }

    fn process(
        &self,
        source: &SourcePackage,
        tempdir: &mut Option<PathBuf>,
    ) -> Result<(Package, ObjectSet), PackageError> {
        if !source.dsc.exists() {
            return Err(PackageError::DescriptorMissing(source.dsc.clone()));
        }

        std::fs::create_dir_all(&self.work_dir)?;
        let basedir = tempfile::Builder::new()
            .prefix("debload-")
            .tempdir_in(&self.work_dir)?
            .into_path();
        *tempdir = Some(basedir.clone());

        let debdir = basedir.join(source.stem());
        self.extractor.extract(&source.dsc, &debdir)?;

        let walked = walk_tree(&debdir)?;
        let directory = walked
            .root()
            .map(|root| root.id)
            .ok_or_else(|| PackageError::TreeWalk {
                path: debdir.clone(),
                reason: "no root tree".to_string(),
            })?;
        let metadata = self
            .metadata
            .package_metadata(source, &debdir, &self.keyrings)?;
        let objects = dedup_objects(&walked, self.remove_duplicates);

        Ok((
            Package {
                source: source.clone(),
                basedir,
                directory,
                metadata,
                revision: None,
                release: None,
            },
            objects,
        ))
    }

    /// Stream over `packages`, merging each processed package into one
    /// accumulator.
    pub fn process_source_packages<I>(&self, packages: I) -> SourcePackageStream<'_, E, M, I::IntoIter>
    where
        I: IntoIterator<Item = SourcePackage>,
    {
        SourcePackageStream {
            processor: self,
            packages: packages.into_iter(),
            partial: PartialResult::default(),
        }
    }
}

/// Everything accumulated so far in a batch.
#[derive(Debug, Default)]
pub struct PartialResult {
    pub objects: Accumulator,
    /// Successfully processed packages, in processing order.
    pub packages: Vec<Package>,
    /// Temporary directories not yet removed.
    pub tempdirs: Vec<PathBuf>,
    pub skipped: Vec<SkippedPackage>,
}

/// Lazily processes packages and exposes the partial result after each one
/// that succeeds.
///
/// Skipped packages are recorded but never produce a step of their own.
pub struct SourcePackageStream<'p, E, M, I> {
    processor: &'p PackageProcessor<E, M>,
    packages: I,
    partial: PartialResult,
}

impl<E, M, I> SourcePackageStream<'_, E, M, I>
where
    E: Extractor,
    M: MetadataSource,
    I: Iterator<Item = SourcePackage>,
{
    /// Process packages until one succeeds, then hand out the partial result
    /// for inspection and flushing. `None` once the input is exhausted.
    pub fn next_partial(&mut self) -> Option<&mut PartialResult> {
        let remove = self.processor.remove_duplicates();
        for source in self.packages.by_ref() {
            match self.processor.process_source_package(&source) {
                PackageOutcome::Processed { package, objects } => {
                    self.partial.objects.merge_objects(objects, remove);
                    self.partial.tempdirs.push(package.basedir.clone());
                    self.partial.packages.push(package);
                    return Some(&mut self.partial);
                }
                PackageOutcome::Skipped(skipped) => {
                    tracing::warn!(
                        kind = "deb_process_failed",
                        package = %skipped.source.name,
                        version = %skipped.source.version,
                        error_kind = skipped.error.kind(),
                        "could not process package: {}",
                        skipped.error
                    );
                    if let Some(tempdir) = &skipped.tempdir {
                        self.partial.tempdirs.push(tempdir.clone());
                    }
                    self.partial.skipped.push(skipped);
                }
            }
        }
        None
    }

    /// The partial result, whether or not any package succeeded.
    pub fn partial(&mut self) -> &mut PartialResult {
        &mut self.partial
    }

    pub fn into_partial(self) -> PartialResult {
        self.partial
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::{ChangelogInfo, ListerMetadata, PackageInfo, PackageMetadata};
    use debload_types::{DebianVersion, Person, Timestamp};
    use std::path::Path;

    /// Writes a fixed tree; fails for packages named "bar".
    struct FakeExtractor;

    impl Extractor for FakeExtractor {
        fn extract(&self, dsc: &Path, dest: &Path) -> Result<(), PackageError> {
            if dsc.to_string_lossy().contains("bar") {
                return Err(PackageError::ExtractionFailed {
                    dsc: dsc.to_path_buf(),
                    reason: "exit status: 2".into(),
                });
            }
            std::fs::create_dir_all(dest)?;
            std::fs::write(dest.join("README"), b"shared")?;
            Ok(())
        }
    }

    struct FakeMetadata;

    impl MetadataSource for FakeMetadata {
        fn package_metadata(
            &self,
            package: &SourcePackage,
            _extracted: &Path,
            _keyrings: &[PathBuf],
        ) -> Result<PackageMetadata, PackageError> {
            Ok(PackageMetadata {
                original_artifact: vec![],
                package_info: PackageInfo {
                    name: package.name.clone(),
                    version: package.version.to_string(),
                    lister_metadata: ListerMetadata::snapshot(package.id),
                    changelog: ChangelogInfo {
                        person: Person::new("A", "a@x"),
                        date: Timestamp::from_unix(0),
                        history: vec![],
                    },
                    pgp_signature: None,
                    maintainers: vec![],
                },
            })
        }
    }

    fn candidate(dir: &Path, name: &str) -> SourcePackage {
        let dsc = dir.join(format!("{name}_1.0.dsc"));
        std::fs::write(&dsc, b"Source: x\n").unwrap();
        SourcePackage::new(name, DebianVersion::parse("1.0").unwrap(), dsc)
    }

    #[test]
    fn processes_into_tempdir() {
        let work = tempfile::tempdir().unwrap();
        let processor = PackageProcessor::new(FakeExtractor, FakeMetadata, work.path());
        match processor.process_source_package(&candidate(work.path(), "foo")) {
            PackageOutcome::Processed { package, objects } => {
                assert!(package.basedir.starts_with(work.path()));
                assert!(package.basedir.join("foo_1.0/README").exists());
                assert_eq!(objects.contents.len(), 1);
                assert_eq!(objects.directories.len(), 1);
                assert!(objects.directories.contains_key(&package.directory));
            }
            PackageOutcome::Skipped(s) => panic!("unexpected skip: {}", s.error),
        }
    }

    #[test]
    fn missing_descriptor_skips_without_tempdir() {
        let work = tempfile::tempdir().unwrap();
        let processor = PackageProcessor::new(FakeExtractor, FakeMetadata, work.path());
        let source = SourcePackage::new(
            "foo",
            DebianVersion::parse("1.0").unwrap(),
            work.path().join("missing.dsc"),
        );
        match processor.process_source_package(&source) {
            PackageOutcome::Skipped(s) => {
                assert!(matches!(s.error, PackageError::DescriptorMissing(_)));
                assert!(s.tempdir.is_none());
            }
            PackageOutcome::Processed { .. } => panic!("expected skip"),
        }
    }

    #[test]
    fn extraction_failure_keeps_tempdir_for_cleanup() {
        let work = tempfile::tempdir().unwrap();
        let processor = PackageProcessor::new(FakeExtractor, FakeMetadata, work.path());
        match processor.process_source_package(&candidate(work.path(), "bar")) {
            PackageOutcome::Skipped(s) => {
                assert!(matches!(s.error, PackageError::ExtractionFailed { .. }));
                assert!(s.tempdir.unwrap().exists());
            }
            PackageOutcome::Processed { .. } => panic!("expected skip"),
        }
    }

    /// Leaves a file nobody but root can read.
    #[cfg(unix)]
    struct UnreadableExtractor;

    #[cfg(unix)]
    impl Extractor for UnreadableExtractor {
        fn extract(&self, _dsc: &Path, dest: &Path) -> Result<(), PackageError> {
            use std::os::unix::fs::PermissionsExt;
            std::fs::create_dir_all(dest)?;
            std::fs::write(dest.join("README"), b"fine")?;
            let locked = dest.join("locked");
            std::fs::write(&locked, b"secret")?;
            std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000))?;
            Ok(())
        }
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_file_skips_whole_package() {
        let work = tempfile::tempdir().unwrap();
        let processor = PackageProcessor::new(UnreadableExtractor, FakeMetadata, work.path());
        match processor.process_source_package(&candidate(work.path(), "foo")) {
            PackageOutcome::Skipped(s) => {
                assert!(matches!(s.error, PackageError::Hash(_)));
                assert_eq!(s.error.kind(), "hash");
                assert!(s.tempdir.unwrap().exists());
            }
            PackageOutcome::Processed { package, .. } => {
                // Root ignores file modes, so the read cannot fail there.
                assert!(std::fs::read(package.basedir.join("foo_1.0/locked")).is_ok());
            }
        }
    }

    #[test]
    fn stream_yields_once_per_success() {
        let work = tempfile::tempdir().unwrap();
        let processor = PackageProcessor::new(FakeExtractor, FakeMetadata, work.path());
        let packages = vec![
            candidate(work.path(), "foo"),
            candidate(work.path(), "bar"),
            candidate(work.path(), "baz"),
        ];
        let mut stream = processor.process_source_packages(packages);

        let mut steps = 0;
        while let Some(partial) = stream.next_partial() {
            steps += 1;
            assert_eq!(partial.packages.len(), steps);
        }
        assert_eq!(steps, 2);

        let partial = stream.into_partial();
        let names: Vec<&str> = partial.packages.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["foo", "baz"]);
        assert_eq!(partial.skipped.len(), 1);
        // foo, bar (failed) and baz each own a tempdir.
        assert_eq!(partial.tempdirs.len(), 3);
        // Same README in foo and baz.
        assert_eq!(partial.objects.contents.len(), 1);
    }
}
