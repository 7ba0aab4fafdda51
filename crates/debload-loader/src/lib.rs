//! Debian source package loading pipeline.
//!
//! Each package goes through the same stages:
//!
//! 1. **Extract** -- [`Extractor`] unpacks the `.dsc` into a fresh temporary
//!    directory.
//! 2. **Walk** -- [`walk_tree`] hashes every file and directory bottom-up.
//! 3. **Describe** -- [`MetadataSource`] reads the descriptor, changelog and
//!    signature into [`PackageMetadata`].
//! 4. **Deduplicate** -- [`dedup_objects`] collapses identical files within
//!    the package, then [`Accumulator::merge_objects`] across the batch.
//! 5. **Flush** -- [`try_flush_partial`] writes contents and directories once
//!    a threshold fires, and [`finalize`] writes revisions, releases and
//!    occurrences at the end.
//!
//! [`Loader`] drives the whole batch. A package that fails any stage is
//! skipped and reported; only store errors end a batch.

pub mod accumulator;
pub mod config;
pub mod convert;
pub mod dedup;
pub mod driver;
pub mod error;
pub mod extractor;
pub mod flush;
pub mod manifest;
pub mod metadata;
pub mod package;
pub mod processor;
pub mod signature;
pub mod walker;

pub use accumulator::{Accumulator, MergeStats};
pub use config::{Authority, ExtractorConfig, FlushThresholds, LoaderConfig, SNAPSHOT_AUTHORITY};
pub use convert::{
    file_to_shallow_content, identity_to_person, package_to_release, package_to_revision,
    shallow_content_to_content, tree_to_directory, ShallowContent,
};
pub use dedup::{collapse_objects, dedup_objects, ObjectSet, RemoveDuplicates};
pub use driver::Loader;
pub use error::{LoaderError, LoaderResult, PackageError};
pub use extractor::{DpkgSourceExtractor, Extractor};
pub use flush::{
    finalize, try_flush_partial, BatchReport, FlushReport, PackageReport, PackageStatus,
};
pub use manifest::Manifest;
pub use metadata::{DebianMetadataParser, MetadataSource};
pub use package::{
    get_file_info, ChangelogInfo, FileInfo, ListerMetadata, Package, PackageInfo,
    PackageMetadata, SignatureInfo, SourcePackage,
};
pub use processor::{PackageOutcome, PackageProcessor, PartialResult, SkippedPackage};
pub use signature::{GpgvVerifier, NoSignature, SignatureVerifier};
pub use walker::{walk_tree, WalkedObject, WalkedObjects};
