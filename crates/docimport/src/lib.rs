//! docimport library
//!
//! Incrementally imports documents and their metadata from an archive bucket
//! into a local ingestion pipeline.
//!
//! # Pipeline
//!
//! 1. [`sync`] mirrors the remote `_mmmeta` snapshot and refreshes the local
//!    [`metastore`]
//! 2. [`selector`] walks files that are neither imported nor deleted
//! 3. [`fetcher`] stages each payload, [`transform`] writes its sidecar
//! 4. [`importer`] runs the [`command`] per batch and marks batches imported
//!
//! # Example
//!
//! ```no_run
//! use docimport::{config::ImportConfig, pipeline, storage::StorageConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let storage = StorageConfig::new("archive").with_env();
//!     let config = ImportConfig::new(
//!         "landtag-by",
//!         storage,
//!         "landtag-by",
//!         "/srv/stage",
//!         "aleph crawldir /srv/stage",
//!     );
//!     let report = pipeline::run_import(&config).await?;
//!     println!("imported {} files", report.imported);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod command;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod importer;
pub mod metastore;
pub mod pipeline;
pub mod selector;
pub mod storage;
pub mod sync;
pub mod transform;

pub use cli::Cli;
pub use error::{ImportError, Result};
