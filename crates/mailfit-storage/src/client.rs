//! S3 client implementation.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};

/// Store interface the worker pipeline is written against.
///
/// Keys are fully qualified (see [`crate::keys`]); implementations decide
/// where they live.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Download a source object into a local file, creating parent
    /// directories as needed. Streams to disk; the object is never held
    /// in memory whole.
    async fn download_source(&self, key: &str, dest: &Path) -> StorageResult<()>;

    /// Upload a local file as a result object, replacing any existing
    /// object under the same key.
    async fn upload_result(&self, src: &Path, key: &str, content_type: &str) -> StorageResult<()>;

    /// Produce a time-limited GET URL for a result object that forces a
    /// download with the given `Content-Disposition` value.
    async fn presign_result(
        &self,
        key: &str,
        disposition: &str,
        ttl: Duration,
    ) -> StorageResult<String>;
}

/// Configuration for the S3 client.
#[derive(Debug, Clone)]
pub struct S3Config {
    /// Bucket holding uploaded sources
    pub uploads_bucket: String,
    /// Bucket holding compressed results
    pub outputs_bucket: String,
    /// Region
    pub region: String,
    /// Custom endpoint (MinIO and other S3 compatibles)
    pub endpoint_url: Option<String>,
    /// Static access key; when absent the SDK's default credential chain is used
    pub access_key_id: Option<String>,
    /// Static secret key
    pub secret_access_key: Option<String>,
}

impl S3Config {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            uploads_bucket: std::env::var("UPLOADS_BUCKET")
                .map_err(|_| StorageError::config_error("UPLOADS_BUCKET not set"))?,
            outputs_bucket: std::env::var("OUTPUTS_BUCKET")
                .map_err(|_| StorageError::config_error("OUTPUTS_BUCKET not set"))?,
            region: std::env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            endpoint_url: std::env::var("S3_ENDPOINT_URL").ok(),
            access_key_id: std::env::var("AWS_ACCESS_KEY_ID").ok(),
            secret_access_key: std::env::var("AWS_SECRET_ACCESS_KEY").ok(),
        })
    }
}

/// S3-backed object store.
#[derive(Clone)]
pub struct S3Store {
    client: Client,
    uploads_bucket: String,
    outputs_bucket: String,
}

impl S3Store {
    /// Create a new store from configuration.
    pub async fn new(config: S3Config) -> StorageResult<Self> {
        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.region));

        if let (Some(access_key), Some(secret_key)) =
            (&config.access_key_id, &config.secret_access_key)
        {
            loader = loader.credentials_provider(Credentials::new(
                access_key, secret_key, None, None, "mailfit",
            ));
        }

        let sdk_config = loader.load().await;
        let mut builder = Builder::from(&sdk_config);
        if let Some(endpoint) = &config.endpoint_url {
            // Path-style addressing is required by most S3 compatibles
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        let client = Client::from_conf(builder.build());

        Ok(Self {
            client,
            uploads_bucket: config.uploads_bucket,
            outputs_bucket: config.outputs_bucket,
        })
    }

    /// Create from environment variables.
    pub async fn from_env() -> StorageResult<Self> {
        let config = S3Config::from_env()?;
        Self::new(config).await
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn download_source(&self, key: &str, dest: &Path) -> StorageResult<()> {
        debug!("Downloading {} to {}", key, dest.display());

        let response = self
            .client
            .get_object()
            .bucket(&self.uploads_bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.to_string().contains("NoSuchKey") {
                    StorageError::not_found(key)
                } else {
                    StorageError::download_failed(e.to_string())
                }
            })?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut body = response.body;
        let mut written: u64 = 0;
        while let Some(chunk) = body
            .try_next()
            .await
            .map_err(|e| StorageError::download_failed(e.to_string()))?
        {
            written += chunk.len() as u64;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        info!("Downloaded {} ({} bytes) to {}", key, written, dest.display());
        Ok(())
    }

    async fn upload_result(&self, src: &Path, key: &str, content_type: &str) -> StorageResult<()> {
        debug!("Uploading {} to {}", src.display(), key);

        let body = ByteStream::from_path(src)
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        self.client
            .put_object()
            .bucket(&self.outputs_bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        info!("Uploaded {} to {}", src.display(), key);
        Ok(())
    }

    async fn presign_result(
        &self,
        key: &str,
        disposition: &str,
        ttl: Duration,
    ) -> StorageResult<String> {
        let presign_config = PresigningConfig::expires_in(ttl)
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        let presigned = self
            .client
            .get_object()
            .bucket(&self.outputs_bucket)
            .key(key)
            .response_content_disposition(disposition)
            .presigned(presign_config)
            .await
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        Ok(presigned.uri().to_string())
    }
}
