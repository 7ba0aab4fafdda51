//! End-to-end batches against the in-memory store.

mod common;

use std::io::Write;
use std::sync::{Arc, Mutex};

use common::{candidate, FixtureExtractor, FixtureMetadata};
use debload_hash::{hash_bytes, ContentHasher};
use debload_loader::{
    FlushThresholds, Loader, PackageError, PackageOutcome, PackageProcessor, PackageStatus,
};
use debload_store::{ContentStatus, InMemoryArchiveStore, StoreCall};

type FixtureLoader<'s> = Loader<&'s InMemoryArchiveStore, FixtureExtractor, FixtureMetadata>;

fn fixture_loader<'a>(
    store: &'a InMemoryArchiveStore,
    work: &std::path::Path,
    extractor: FixtureExtractor,
    signed: bool,
) -> FixtureLoader<'a> {
    let processor = PackageProcessor::new(extractor, FixtureMetadata { signed }, work.join("work"));
    Loader::new(store, processor)
}

#[test]
fn two_versions_share_unchanged_content() {
    let dir = tempfile::tempdir().unwrap();
    let old = candidate(dir.path(), "foo", "1.0");
    let new = candidate(dir.path(), "foo", "1.1");
    let extractor = FixtureExtractor::default()
        .with_tree(
            &old.dsc,
            &[
                ("src/main.c", b"int main() { return 0; }\n"),
                ("debian/changelog", b"foo (1.0) unstable; urgency=low\n"),
            ],
        )
        .with_tree(
            &new.dsc,
            &[
                ("src/main.c", b"int main() { return 0; }\n"),
                ("debian/changelog", b"foo (1.1) unstable; urgency=low\n"),
            ],
        );
    let store = InMemoryArchiveStore::new();
    let report = fixture_loader(&store, dir.path(), extractor, true)
        .load(vec![new, old])
        .unwrap();

    assert_eq!(report.loaded(), 2);
    assert_eq!(store.revisions().len(), 2);
    assert_eq!(store.releases().len(), 2);

    let shared = hash_bytes(b"int main() { return 0; }\n").sha1_git;
    assert!(store.content(&shared).is_some());
    assert_eq!(store.content_write_count(&shared), 1);
    // Shared file plus two changelogs.
    assert_eq!(store.content_count(), 3);

    let releases = store.releases();
    for package in &report.packages {
        let PackageStatus::Loaded { revision, release } = package.status else {
            panic!("{} {} not loaded", package.name, package.version);
        };
        let release = releases.iter().find(|r| r.id == release).unwrap();
        assert_eq!(release.target, revision);
        assert_eq!(release.name, package.version.to_string());
    }

    let mut branches: Vec<String> = store.occurrences().into_iter().map(|o| o.branch).collect();
    branches.sort();
    assert_eq!(branches, vec!["1.0", "1.1"]);
    for revision in store.revisions() {
        assert!(revision.parents.is_empty());
        assert!(revision.synthetic);
    }
}

#[test]
fn single_file_root_directory_id() {
    let dir = tempfile::tempdir().unwrap();
    let package = candidate(dir.path(), "single", "1.0");
    let data = b"just one file\n";
    let extractor = FixtureExtractor::default().with_tree(&package.dsc, &[("onefile.txt", data)]);
    let processor = PackageProcessor::new(extractor, FixtureMetadata { signed: true }, dir.path().join("work"));

    let PackageOutcome::Processed { package, objects } = processor.process_source_package(&package)
    else {
        panic!("package skipped");
    };

    let mut body = b"100644 onefile.txt\0".to_vec();
    body.extend_from_slice(hash_bytes(data).sha1_git.as_bytes());
    let expected = ContentHasher::TREE.hash(&body);

    assert_eq!(package.directory, expected);
    let root = &objects.directories[&expected];
    assert_eq!(root.entries.len(), 1);
    assert_eq!(root.entries[0].name, b"onefile.txt".to_vec());
}

#[test]
fn failed_extraction_skips_only_that_package() {
    let dir = tempfile::tempdir().unwrap();
    let foo = candidate(dir.path(), "foo", "1.0");
    let bar = candidate(dir.path(), "bar", "1.0");
    let baz = candidate(dir.path(), "baz", "1.0");
    let extractor = FixtureExtractor::default()
        .with_tree(&foo.dsc, &[("README", b"foo\n")])
        .with_tree(&baz.dsc, &[("README", b"baz\n")]);

    {
        let processor = PackageProcessor::new(
            &extractor,
            FixtureMetadata { signed: true },
            dir.path().join("probe"),
        );
        match processor.process_source_package(&bar) {
            PackageOutcome::Skipped(skipped) => {
                assert!(matches!(skipped.error, PackageError::ExtractionFailed { .. }))
            }
            PackageOutcome::Processed { .. } => panic!("bar should fail"),
        }

        let mut stream =
            processor.process_source_packages(vec![foo.clone(), bar.clone(), baz.clone()]);
        let mut snapshots = Vec::new();
        while let Some(partial) = stream.next_partial() {
            snapshots.push(partial.packages.last().unwrap().name().to_string());
        }
        assert_eq!(snapshots, vec!["foo", "baz"]);
        let partial = stream.into_partial();
        assert!(partial.packages.iter().all(|p| p.name() != "bar"));
    }

    let store = InMemoryArchiveStore::new();
    let report = fixture_loader(&store, dir.path(), extractor, true)
        .load(vec![foo, bar, baz])
        .unwrap();
    assert_eq!(report.loaded(), 2);
    let bar_report = report.packages.iter().find(|p| p.name == "bar").unwrap();
    assert!(matches!(
        bar_report.status,
        PackageStatus::Skipped { kind: "extraction_failed", .. }
    ));
    assert_eq!(store.revisions().len(), 2);
    assert_eq!(store.releases().len(), 2);
    assert!(store.occurrences().iter().all(|o| o.branch == "1.0"));
    assert_eq!(store.occurrences().len(), 2);
    // The failed package's temporary directory is cleaned up too.
    let leftovers = std::fs::read_dir(dir.path().join("work")).unwrap().count();
    assert_eq!(leftovers, 0);
}

#[test]
fn content_at_ceiling_is_visible() {
    let dir = tempfile::tempdir().unwrap();
    let package = candidate(dir.path(), "edge", "1.0");
    let at_ceiling = vec![b'a'; 64];
    let over_ceiling = vec![b'b'; 65];
    let extractor = FixtureExtractor::default().with_tree(
        &package.dsc,
        &[("at", at_ceiling.as_slice()), ("over", over_ceiling.as_slice())],
    );
    let store = InMemoryArchiveStore::new();
    let thresholds = FlushThresholds {
        content_max_length_one: 64,
        ..FlushThresholds::default()
    };
    fixture_loader(&store, dir.path(), extractor, true)
        .with_thresholds(thresholds)
        .load(vec![package])
        .unwrap();

    let at = store.content(&hash_bytes(&at_ceiling).sha1_git).unwrap();
    match &at.status {
        ContentStatus::Visible { data } => assert_eq!(data, &at_ceiling),
        other => panic!("expected visible, got {other:?}"),
    }
    let over = store.content(&hash_bytes(&over_ceiling).sha1_git).unwrap();
    assert!(over.is_absent());
    assert!(over.data().is_none());
}

/// Collects formatted log output for assertions.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn unsigned_package_uses_changelog_date() {
    let dir = tempfile::tempdir().unwrap();
    let package = candidate(dir.path(), "plain", "1.2");
    let version = package.version.clone();
    let extractor = FixtureExtractor::default().with_tree(&package.dsc, &[("README", b"plain\n")]);
    let store = InMemoryArchiveStore::new();

    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_max_level(tracing::Level::INFO)
        .with_writer(move || writer.clone())
        .finish();
    let report = tracing::subscriber::with_default(subscriber, || {
        fixture_loader(&store, dir.path(), extractor, false).load(vec![package])
    })
    .unwrap();
    assert_eq!(report.loaded(), 1);

    let revisions = store.revisions();
    assert_eq!(revisions.len(), 1);
    assert_eq!(
        revisions[0].committer_date,
        FixtureMetadata::changelog_date(&version)
    );
    assert_eq!(revisions[0].date, revisions[0].committer_date);

    let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
    assert!(output.contains("deb_missing_signature"), "logs: {output}");
}

#[test]
fn small_thresholds_flush_between_packages() {
    let dir = tempfile::tempdir().unwrap();
    let packages: Vec<_> = ["1.0", "1.1", "1.2"]
        .iter()
        .map(|v| candidate(dir.path(), "foo", v))
        .collect();
    let mut extractor = FixtureExtractor::default();
    for package in &packages {
        let readme = format!("foo {}\n", package.version);
        extractor = extractor.with_tree(
            &package.dsc,
            &[("COPYING", b"GPL\n"), ("README", readme.as_bytes())],
        );
    }
    let store = InMemoryArchiveStore::new();
    let thresholds = FlushThresholds {
        content_packet_size: 2,
        ..FlushThresholds::default()
    };
    let report = fixture_loader(&store, dir.path(), extractor, true)
        .with_thresholds(thresholds)
        .load(packages)
        .unwrap();

    assert!(report.flushes >= 2);
    assert_eq!(store.content_count(), 4);
    assert_eq!(
        store.content_write_count(&hash_bytes(b"GPL\n").sha1_git),
        1
    );
    // Every content add is preceded by a missing check for the same batch.
    let calls = store.calls();
    for (i, call) in calls.iter().enumerate() {
        if let StoreCall::ContentAdd(ids) = call {
            let StoreCall::ContentMissing(asked) = &calls[i - 1] else {
                panic!("content_add without preceding content_missing");
            };
            assert!(ids.iter().all(|id| asked.contains(id)));
        }
    }
}
