//! Remote object store access
//!
//! The pipeline only needs two capabilities from the archive bucket: list the
//! keys under a prefix and stream one object into a local file. They are
//! expressed by [`ObjectStore`] so the sync and fetch steps can run against an
//! in-memory store in tests; [`S3ObjectStore`] is the production backend.

use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::Region,
    error::{DisplayErrorContext, SdkError},
    operation::get_object::GetObjectError,
    Client,
};
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};

pub mod config;

pub use config::StorageConfig;

pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The object does not exist. Callers may treat this as skippable.
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Storage backend error during {operation}: {message}")]
    Backend {
        operation: &'static str,
        message: String,
    },

    #[error("IO error while writing {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }

    pub fn io(path: &Path, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Read-only view of a bucket.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// All keys starting with `prefix`, in the order the backend returns them.
    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>>;

    /// Stream the object at `key` into `dest`, creating or truncating the
    /// file. Returns the number of bytes written.
    ///
    /// On error the file may exist with partial content; cleaning it up is
    /// the caller's responsibility.
    async fn download_to(&self, key: &str, dest: &Path) -> StorageResult<u64>;
}

#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    pub async fn new(config: &StorageConfig) -> Self {
        debug!("Initializing storage with config: {:?}", config);

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        if let Some((access_key, secret_key)) = config.static_credentials() {
            loader = loader.credentials_provider(Credentials::new(
                access_key,
                secret_key,
                None,
                None,
                "docimport-static",
            ));
        }

        let shared = loader.load().await;
        let mut builder =
            aws_sdk_s3::config::Builder::from(&shared).force_path_style(config.path_style);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        info!(
            bucket = %config.bucket,
            endpoint = config.endpoint.as_deref().unwrap_or("default"),
            "Storage client initialized"
        );

        Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

fn backend_error<E>(operation: &'static str, err: E) -> StorageError
where
    E: std::error::Error,
{
    StorageError::Backend {
        operation,
        message: DisplayErrorContext(err).to_string(),
    }
}

fn classify_get_error<R>(key: &str, err: SdkError<GetObjectError, R>) -> StorageError
where
    R: std::fmt::Debug,
{
    let not_found = match &err {
        SdkError::ServiceError(service) => service.err().is_no_such_key(),
        _ => false,
    };
    let message = DisplayErrorContext(&err).to_string();

    if not_found || message.contains("NoSuchKey") || message.contains("NotFound") {
        StorageError::NotFound(key.to_string())
    } else {
        StorageError::Backend {
            operation: "get_object",
            message,
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix);
            if let Some(t) = token.take() {
                request = request.continuation_token(t);
            }

            let response = request
                .send()
                .await
                .map_err(|e| backend_error("list_objects_v2", e))?;

            keys.extend(
                response
                    .contents()
                    .iter()
                    .filter_map(|obj| obj.key().map(str::to_string)),
            );

            match (response.is_truncated(), response.next_continuation_token()) {
                (Some(true), Some(next)) => token = Some(next.to_string()),
                _ => break,
            }
        }

        debug!("Listed {} objects under s3://{}/{}", keys.len(), self.bucket, prefix);
        Ok(keys)
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn download_to(&self, key: &str, dest: &Path) -> StorageResult<u64> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify_get_error(key, e))?;

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| StorageError::io(dest, e))?;
        let mut body = response.body.into_async_read();
        let written = tokio::io::copy(&mut body, &mut file)
            .await
            .map_err(|e| StorageError::io(dest, e))?;
        file.flush().await.map_err(|e| StorageError::io(dest, e))?;

        debug!("Downloaded {} bytes from s3://{}/{}", written, self.bucket, key);
        Ok(written)
    }
}
