use std::collections::BTreeMap;

use debload_store::{ArchiveStore, Origin, OriginId};

use crate::config::{Authority, FlushThresholds, LoaderConfig};
use crate::dedup::RemoveDuplicates;
use crate::error::LoaderResult;
use crate::extractor::{DpkgSourceExtractor, Extractor};
use crate::flush::{finalize, try_flush_partial, BatchReport};
use crate::metadata::{DebianMetadataParser, MetadataSource};
use crate::package::SourcePackage;
use crate::processor::PackageProcessor;
use crate::signature::GpgvVerifier;

/// Batch driver: registers origins, streams packages through the processor
/// and flushes into the store.
pub struct Loader<S, E, M> {
    store: S,
    processor: PackageProcessor<E, M>,
    thresholds: FlushThresholds,
    authorities: Vec<Authority>,
}

impl<S: ArchiveStore> Loader<S, DpkgSourceExtractor, DebianMetadataParser<GpgvVerifier>> {
    /// Loader running `dpkg-source` and `gpgv` as configured.
    pub fn from_config(store: S, config: &LoaderConfig) -> Self {
        let extractor = DpkgSourceExtractor::new(&config.extractor.command)
            .with_timeout(config.extractor.timeout());
        let metadata = DebianMetadataParser::new(GpgvVerifier::new(&config.gpgv));
        let remove = if config.remove_duplicates {
            RemoveDuplicates::Yes
        } else {
            RemoveDuplicates::No
        };
        let processor = PackageProcessor::new(extractor, metadata, config.work_dir())
            .with_keyrings(config.keyrings.clone())
            .with_remove_duplicates(remove);

        Self::new(store, processor)
            .with_thresholds(config.thresholds.clone())
            .with_authorities(config.authorities.clone())
    }
}

impl<S, E, M> Loader<S, E, M>
where
    S: ArchiveStore,
    E: Extractor,
    M: MetadataSource,
{
    pub fn new(store: S, processor: PackageProcessor<E, M>) -> Self {
        Self {
            store,
            processor,
            thresholds: FlushThresholds::default(),
            authorities: vec![Authority::default()],
        }
    }

    pub fn with_thresholds(mut self, thresholds: FlushThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_authorities(mut self, authorities: Vec<Authority>) -> Self {
        self.authorities = authorities;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Register one origin per distinct package name and stamp every
    /// package with its id.
    pub fn register_origins(
        &self,
        packages: &mut [SourcePackage],
    ) -> LoaderResult<BTreeMap<String, OriginId>> {
        let mut origins = BTreeMap::new();
        for package in packages.iter_mut() {
            let id = match origins.get(&package.name) {
                Some(id) => *id,
                None => {
                    let origin = Origin::debian_snapshot(&package.name);
                    let id = self.store.origin_add_one(&origin)?;
                    tracing::debug!(package = %package.name, origin = %id, url = %origin.url, "registered origin");
                    origins.insert(package.name.clone(), id);
                    id
                }
            };
            package.origin = Some(id);
        }
        Ok(origins)
    }

    /// Load a batch of packages.
    ///
    /// Packages run in (name, version) order so repeated runs flush at the
    /// same boundaries. A package that fails is skipped and reported; only
    /// store errors end the batch.
    pub fn load(&self, mut packages: Vec<SourcePackage>) -> LoaderResult<BatchReport> {
        packages.sort_by(|a, b| (&a.name, &a.version).cmp(&(&b.name, &b.version)));
        self.register_origins(&mut packages)?;
        tracing::info!(packages = packages.len(), "loading batch");

        let mut flushes = Vec::new();
        let mut stream = self.processor.process_source_packages(packages);
        while let Some(partial) = stream.next_partial() {
            let flush = try_flush_partial(&self.store, partial, &self.thresholds, false)?;
            if flush.flushed {
                flushes.push(flush);
            }
        }

        let mut partial = stream.into_partial();
        let mut report = finalize(&self.store, &mut partial, &self.thresholds, &self.authorities)?;
        for flush in &flushes {
            report.record_flush(flush);
        }

        tracing::info!(
            loaded = report.loaded(),
            skipped = report.skipped(),
            revisions = report.revisions,
            flushes = report.flushes,
            "batch done"
        );
        Ok(report)
    }
}
