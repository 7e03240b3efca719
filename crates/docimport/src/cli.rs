//! Command-line interface
//!
//! Two invocation shapes are accepted:
//!
//! ```text
//! docimport <collection> <bucket> <remote-dir> <target-dir> <command>
//! docimport --collection <name> --bucket <name> --dir <remote-dir> \
//!           --target <local-dir> --command "<words>" [--tag <tag>]
//! ```
//!
//! A flag wins over the positional word in the same slot.

use crate::config::{ImportConfig, DEFAULT_DATA_DIR};
use crate::error::{ImportError, Result};
use crate::importer::DEFAULT_BATCH_SIZE;
use crate::storage::StorageConfig;
use crate::transform::DEFAULT_LANGUAGE;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "docimport")]
#[command(author, version, about = "Incrementally import archived documents into the ingestion pipeline")]
pub struct Cli {
    /// Positional form: <collection> <bucket> <remote-dir> <target-dir> <command>
    #[arg(value_name = "ARGS", num_args = 0..=5)]
    pub positional: Vec<String>,

    /// Collection name, written as `portal` into every sidecar
    #[arg(long)]
    pub collection: Option<String>,

    /// Bucket holding the archive
    #[arg(long)]
    pub bucket: Option<String>,

    /// Directory inside the bucket
    #[arg(long = "dir")]
    pub remote_dir: Option<String>,

    /// Local staging directory scanned by the import command
    #[arg(long = "target")]
    pub target_dir: Option<PathBuf>,

    /// Import command, whitespace separated
    #[arg(long, allow_hyphen_values = true)]
    pub command: Option<String>,

    /// Tag added to every imported document
    #[arg(long)]
    pub tag: Option<String>,

    /// Files per import command invocation
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Root of the local metadata mirror
    #[arg(long, default_value = DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,

    /// Language code written into every sidecar
    #[arg(long, default_value = DEFAULT_LANGUAGE)]
    pub language: String,

    /// S3-compatible endpoint
    #[arg(long, env = "ARCHIVE_ENDPOINT_URL")]
    pub endpoint_url: Option<String>,

    /// Bucket region
    #[arg(long, env = "AWS_REGION")]
    pub region: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

fn slot(flag: Option<String>, positional: &[String], index: usize, name: &str) -> Result<String> {
    flag.or_else(|| positional.get(index).cloned())
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ImportError::config(format!("missing required argument: {}", name)))
}

impl Cli {
    /// Merge flags, positional words and the environment into a validated
    /// configuration.
    pub fn into_config(self) -> Result<ImportConfig> {
        let p = &self.positional;
        let collection = slot(self.collection, p, 0, "collection")?;
        let bucket = slot(self.bucket, p, 1, "bucket")?;
        let remote_dir = slot(self.remote_dir, p, 2, "remote directory")?;
        let target_dir = slot(
            self.target_dir.map(|t| t.to_string_lossy().into_owned()),
            p,
            3,
            "target directory",
        )?;
        let command = slot(self.command, p, 4, "command")?;

        let mut storage = StorageConfig::new(bucket).with_env();
        if let Some(endpoint) = self.endpoint_url {
            storage = storage.with_endpoint(endpoint);
        }
        if let Some(region) = self.region {
            storage = storage.with_region(region);
        }

        let mut config = ImportConfig::new(collection, storage, remote_dir, target_dir, command);
        config.tag = self.tag;
        config.batch_size = self.batch_size;
        config.data_dir = self.data_dir;
        config.language = self.language;
        config.validate()?;
        Ok(config)
    }
}
