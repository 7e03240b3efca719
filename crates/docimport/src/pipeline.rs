//! End-to-end run: sync, select, stage, import

use crate::command::{ImportCommand, ShellCommand};
use crate::config::ImportConfig;
use crate::error::Result;
use crate::fetcher::FileFetcher;
use crate::importer::{BatchImporter, ImportReport};
use crate::storage::{ObjectStore, S3ObjectStore};
use crate::sync::MetadataSync;
use crate::transform::Transformer;
use tracing::info;

/// Run one import against explicit collaborators.
pub async fn run_with(
    store: &dyn ObjectStore,
    command: &dyn ImportCommand,
    config: &ImportConfig,
) -> Result<ImportReport> {
    config.validate()?;

    let metastore = MetadataSync::new(store, &config.data_dir)
        .run(&config.remote_dir)
        .await?;

    let fetcher = FileFetcher::new(store, config.remote_dir.as_str());
    let transformer = Transformer::new(config.collection.as_str())
        .with_language(config.language.as_str())
        .with_tag(config.tag.clone());

    let mut importer =
        BatchImporter::new(&metastore, fetcher, transformer, command, &config.target_dir)
            .with_batch_size(config.batch_size);
    let report = importer.run().await?;
    Ok(report)
}

/// Run one import against S3 with the configured shell command.
pub async fn run_import(config: &ImportConfig) -> Result<ImportReport> {
    config.validate()?;
    let command = ShellCommand::parse(&config.command)?;
    let store = S3ObjectStore::new(&config.storage).await;

    info!(
        collection = %config.collection,
        bucket = %config.storage.bucket,
        remote_dir = %config.remote_dir,
        "Starting import"
    );
    run_with(&store, &command, config).await
}
