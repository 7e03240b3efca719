use serde::{Deserialize, Serialize};
use std::env;

/// Environment variable holding the archive's S3-compatible endpoint.
pub const ENDPOINT_ENV: &str = "ARCHIVE_ENDPOINT_URL";

pub const DEFAULT_REGION: &str = "us-east-1";

#[derive(Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Custom endpoint; `None` uses the public AWS endpoint for the region.
    pub endpoint: Option<String>,
    pub region: String,
    pub bucket: String,
    /// Static credentials. When absent the default provider chain is used.
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub path_style: bool,
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .field("access_key", &self.access_key.as_ref().map(|_| "<redacted>"))
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .field("path_style", &self.path_style)
            .finish()
    }
}

impl StorageConfig {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            endpoint: None,
            region: DEFAULT_REGION.to_string(),
            bucket: bucket.into(),
            access_key: None,
            secret_key: None,
            path_style: false,
        }
    }

    /// Fill endpoint, region and static credentials from the environment.
    ///
    /// A custom endpoint switches to path-style addressing, which is what
    /// MinIO and most self-hosted archives expect.
    pub fn with_env(mut self) -> Self {
        if let Some(endpoint) = env::var(ENDPOINT_ENV).ok().filter(|v| !v.is_empty()) {
            self = self.with_endpoint(endpoint);
        }
        if let Ok(region) = env::var("AWS_REGION") {
            self.region = region;
        }
        self.access_key = env::var("S3_ACCESS_KEY").ok();
        self.secret_key = env::var("S3_SECRET_KEY").ok();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self.path_style = true;
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn static_credentials(&self) -> Option<(&str, &str)> {
        match (&self.access_key, &self.secret_key) {
            (Some(access), Some(secret)) => Some((access.as_str(), secret.as_str())),
            _ => None,
        }
    }
}
