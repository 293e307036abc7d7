use async_trait::async_trait;
use s3::creds::Credentials;
use s3::{Bucket, Region};

use crate::config::S3Settings;

/// Persists bytes and hands back a URL clients can fetch them from.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str)
        -> Result<String, StorageError>;
}

/// S3 (or S3-compatible) object store for panel images.
pub struct S3ObjectStore {
    bucket: Box<Bucket>,
    public_base_url: String,
}

impl S3ObjectStore {
    pub fn new(settings: &S3Settings) -> Result<Self, StorageError> {
        let region = match &settings.endpoint {
            Some(endpoint) => Region::Custom {
                region: settings.region.clone(),
                endpoint: endpoint.clone(),
            },
            None => settings
                .region
                .parse::<Region>()
                .map_err(|e| StorageError::Config(e.to_string()))?,
        };

        let credentials = Credentials::new(
            Some(&settings.access_key),
            Some(&settings.secret_key),
            None,
            None,
            None,
        )
        .map_err(|e| StorageError::Config(e.to_string()))?;

        let mut bucket = Bucket::new(&settings.bucket, region, credentials)
            .map_err(|e| StorageError::Config(e.to_string()))?;
        if settings.endpoint.is_some() {
            bucket = bucket.with_path_style();
        }

        Ok(Self {
            bucket,
            public_base_url: settings.public_base_url.clone(),
        })
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        if data.is_empty() {
            return Err(StorageError::EmptyPayload);
        }

        let response = self
            .bucket
            .put_object_with_content_type(key, &data, content_type)
            .await?;

        let status = response.status_code();
        if !(200..300).contains(&status) {
            return Err(StorageError::Rejected(status));
        }

        Ok(format!("{}/{}", self.public_base_url, key))
    }
}

/// Used when no bucket is configured; every upload fails as unavailable.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledObjectStore;

#[async_trait]
impl ObjectStore for DisabledObjectStore {
    async fn put(&self, _: &str, _: Vec<u8>, _: &str) -> Result<String, StorageError> {
        Err(StorageError::Unavailable)
    }
}

/// Content type and file extension for encoded image bytes. Defaults to PNG
/// when the format cannot be recognised.
pub fn sniff_image(data: &[u8]) -> (&'static str, &'static str) {
    match image::guess_format(data) {
        Ok(image::ImageFormat::Jpeg) => ("image/jpeg", "jpg"),
        Ok(image::ImageFormat::WebP) => ("image/webp", "webp"),
        _ => ("image/png", "png"),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("S3 operation failed: {0}")]
    S3(#[from] s3::error::S3Error),

    #[error("Object store rejected upload with status {0}")]
    Rejected(u16),

    #[error("Refusing to upload an empty object")]
    EmptyPayload,

    #[error("Object storage is not configured")]
    Unavailable,

    #[error("Storage configuration error: {0}")]
    Config(String),
}
