//! Batch importer behaviour against in-memory collaborators

mod helpers;

use docimport::error::ImportError;
use docimport::fetcher::FileFetcher;
use docimport::importer::{BatchImporter, ImportReport, ImportState};
use docimport::metastore::MetadataStore;
use docimport::selector::{pending_files, PendingFiles};
use docimport::transform::{TransformError, Transformer};
use helpers::*;
use tempfile::TempDir;

fn seed_payloads(store: &MemoryObjectStore, count: usize) {
    for i in 0..count {
        store.put_payload(&hash_for(i));
    }
}

#[test]
fn test_selector_yields_each_pending_file_once_in_order() {
    let metastore = MemoryMetadataStore::with_files(12);
    metastore.set_deleted(&hash_for(3));

    let seen: Vec<String> = PendingFiles::with_page_size(&metastore, 5)
        .map(|r| r.unwrap().content_hash.to_string())
        .collect();

    let expected: Vec<String> = (0..12).filter(|i| *i != 3).map(hash_for).collect();
    assert_eq!(seen, expected);
}

#[test]
fn test_selector_skips_rows_imported_mid_walk() {
    let metastore = MemoryMetadataStore::with_files(6);
    let mut walk = PendingFiles::with_page_size(&metastore, 2);

    let first = walk.next().unwrap().unwrap();
    metastore
        .mark_imported(&[first.content_hash.clone()])
        .unwrap();

    let rest: Vec<String> = walk.map(|r| r.unwrap().content_hash.to_string()).collect();
    assert_eq!(rest.len(), 5);
    assert!(!rest.contains(&first.content_hash.to_string()));

    // A fresh walk no longer sees the imported row.
    assert_eq!(pending_files(&metastore).count(), 5);
}

#[tokio::test]
async fn test_second_fetch_makes_no_network_call() {
    let tmp = TempDir::new().unwrap();
    let store = MemoryObjectStore::new();
    seed_payloads(&store, 1);
    let metastore = MemoryMetadataStore::with_files(1);
    let record = pending_files(&metastore).next().unwrap().unwrap();

    let fetcher = FileFetcher::new(&store, REMOTE_DIR);
    let first = fetcher.fetch(&record, tmp.path()).await.unwrap();
    let second = fetcher.fetch(&record, tmp.path()).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(store.downloads(), 1);
    assert!(first.unwrap().ends_with("h0000.pdf"));
}

#[tokio::test]
async fn test_batches_of_one_hundred() {
    let tmp = TempDir::new().unwrap();
    let store = MemoryObjectStore::new();
    seed_payloads(&store, 250);
    let metastore = MemoryMetadataStore::with_files(250);
    let command = RecordingCommand::new();

    let mut importer = BatchImporter::new(
        &metastore,
        FileFetcher::new(&store, REMOTE_DIR),
        Transformer::new("landtag"),
        &command,
        tmp.path().join("stage"),
    );
    let report = importer.run().await.unwrap();

    assert_eq!(
        report,
        ImportReport {
            batches: 3,
            imported: 250,
            missing: 0
        }
    );
    assert_eq!(importer.state(), ImportState::Done);
    assert!(importer.pending_batch().is_empty());

    let invocations = command.invocations();
    let sizes: Vec<usize> = invocations.iter().map(|i| i.payloads().len()).collect();
    assert_eq!(sizes, vec![100, 100, 50]);
    for invocation in &invocations {
        assert_eq!(invocation.sidecars(), invocation.payloads().len());
    }

    let calls = metastore.mark_calls();
    assert_eq!(calls.len(), 3);
    for (call, invocation) in calls.iter().zip(&invocations) {
        let mut marked = call.clone();
        marked.sort();
        assert_eq!(marked, invocation.payloads());
    }
    let expected: Vec<String> = (0..100).map(hash_for).collect();
    assert_eq!(calls[0], expected);
    assert_eq!(metastore.imported().len(), 250);
}

#[tokio::test]
async fn test_failed_batch_stops_the_run_and_stays_unmarked() {
    let tmp = TempDir::new().unwrap();
    let store = MemoryObjectStore::new();
    seed_payloads(&store, 250);
    let metastore = MemoryMetadataStore::with_files(250);
    let command = RecordingCommand::failing_on(2);

    let mut importer = BatchImporter::new(
        &metastore,
        FileFetcher::new(&store, REMOTE_DIR),
        Transformer::new("landtag"),
        &command,
        tmp.path().join("stage"),
    );
    let err = importer.run().await.unwrap_err();

    assert!(matches!(
        err,
        ImportError::CommandFailed { code: Some(2), .. }
    ));
    assert_eq!(command.invocations().len(), 2);

    let calls = metastore.mark_calls();
    assert_eq!(calls.len(), 1);
    let first: Vec<String> = (0..100).map(hash_for).collect();
    assert_eq!(calls[0], first);

    let imported = metastore.imported();
    assert_eq!(imported, first);
    assert_eq!(pending_files(&metastore).count(), 150);
}

#[tokio::test]
async fn test_missing_payload_is_skipped_without_residue() {
    let tmp = TempDir::new().unwrap();
    let stage = tmp.path().join("stage");
    let store = MemoryObjectStore::new();
    seed_payloads(&store, 10);
    store.fail_midway_as_missing(payload_key(&hash_for(4)));
    let metastore = MemoryMetadataStore::with_files(10);
    let command = RecordingCommand::new();

    let mut importer = BatchImporter::new(
        &metastore,
        FileFetcher::new(&store, REMOTE_DIR),
        Transformer::new("landtag"),
        &command,
        &stage,
    );
    let report = importer.run().await.unwrap();

    assert_eq!(report.imported, 9);
    assert_eq!(report.missing, 1);

    let invocations = command.invocations();
    assert_eq!(invocations.len(), 1);
    let staged = &invocations[0].files;
    assert!(!staged.iter().any(|f| f.starts_with("h0004")));
    assert_eq!(invocations[0].payloads().len(), 9);

    assert!(!metastore.imported().contains(&hash_for(4)));
    assert!(!stage.join("h0004.pdf").exists());
    assert_eq!(pending_files(&metastore).count(), 1);
}

#[tokio::test]
async fn test_sidecar_carries_collection_and_tag() {
    let tmp = TempDir::new().unwrap();
    let stage = tmp.path().join("stage");
    let store = MemoryObjectStore::new();
    seed_payloads(&store, 1);
    let metastore = MemoryMetadataStore::with_files(1);
    let record = pending_files(&metastore).next().unwrap().unwrap();
    let command = RecordingCommand::new();

    let importer = BatchImporter::new(
        &metastore,
        FileFetcher::new(&store, REMOTE_DIR),
        Transformer::new("landtag").with_tag(Some("wahl-2023".to_string())),
        &command,
        &stage,
    );
    let staged = importer.process_file(&record).await.unwrap();
    assert_eq!(staged, Some(stage.join("h0000.pdf")));

    let sidecars = staged_sidecars(&stage);
    let sidecar = &sidecars["h0000"];
    assert_eq!(sidecar["portal"], "landtag");
    assert_eq!(sidecar["tags"], serde_json::json!(["wahl-2023"]));
    assert_eq!(sidecar["data"]["publisher"], "by");
    assert_eq!(sidecar["published_at"], "2021-03-04T00:00:00+00:00");
}

#[tokio::test]
async fn test_record_missing_required_field_aborts() {
    let tmp = TempDir::new().unwrap();
    let store = MemoryObjectStore::new();
    seed_payloads(&store, 2);
    let mut broken = source_row(&hash_for(1));
    broken.remove("publisher:name");
    let metastore = MemoryMetadataStore::with_rows([source_row(&hash_for(0)), broken]);
    let command = RecordingCommand::new();

    let mut importer = BatchImporter::new(
        &metastore,
        FileFetcher::new(&store, REMOTE_DIR),
        Transformer::new("landtag"),
        &command,
        tmp.path().join("stage"),
    );
    let err = importer.run().await.unwrap_err();

    assert!(matches!(
        err,
        ImportError::Transform(TransformError::MissingField("publisher:name"))
    ));
    assert!(command.invocations().is_empty());
    assert!(metastore.mark_calls().is_empty());
}

#[tokio::test]
async fn test_nothing_pending_runs_no_command() {
    let tmp = TempDir::new().unwrap();
    let store = MemoryObjectStore::new();
    let metastore = MemoryMetadataStore::with_files(0);
    let command = RecordingCommand::new();

    let mut importer = BatchImporter::new(
        &metastore,
        FileFetcher::new(&store, REMOTE_DIR),
        Transformer::new("landtag"),
        &command,
        tmp.path().join("stage"),
    )
    .with_batch_size(10);
    let report = importer.run().await.unwrap();

    assert_eq!(report, ImportReport::default());
    assert!(command.invocations().is_empty());
    assert_eq!(store.downloads(), 0);
}

#[tokio::test]
async fn test_all_missing_batch_is_not_marked() {
    let tmp = TempDir::new().unwrap();
    let store = MemoryObjectStore::new();
    let metastore = MemoryMetadataStore::with_files(3);
    let command = RecordingCommand::new();

    let mut importer = BatchImporter::new(
        &metastore,
        FileFetcher::new(&store, REMOTE_DIR),
        Transformer::new("landtag"),
        &command,
        tmp.path().join("stage"),
    );
    let report = importer.run().await.unwrap();

    assert_eq!(report.missing, 3);
    assert_eq!(report.imported, 0);
    assert!(command.invocations().is_empty());
    assert!(metastore.mark_calls().is_empty());
}

#[tokio::test]
async fn test_odd_timestamp_does_not_stop_the_batch() {
    let tmp = TempDir::new().unwrap();
    let stage = tmp.path().join("stage");
    let store = MemoryObjectStore::new();
    seed_payloads(&store, 3);
    let mut odd = source_row(&hash_for(1));
    odd.insert("published_at".into(), "2021-03-04T10:20".into());
    let metastore = MemoryMetadataStore::with_rows([
        source_row(&hash_for(0)),
        odd,
        source_row(&hash_for(2)),
    ]);
    let command = RecordingCommand::new();

    let mut importer = BatchImporter::new(
        &metastore,
        FileFetcher::new(&store, REMOTE_DIR),
        Transformer::new("landtag"),
        &command,
        &stage,
    );
    let record = PendingFiles::with_page_size(&metastore, 10)
        .nth(1)
        .unwrap()
        .unwrap();
    importer.process_file(&record).await.unwrap();
    assert_eq!(staged_sidecars(&stage)["h0001"]["published_at"], "2021-03-04T10:20");

    let report = importer.run().await.unwrap();
    assert_eq!(report.imported, 3);
    assert_eq!(command.invocations().len(), 1);
    assert_eq!(metastore.imported().len(), 3);
}
