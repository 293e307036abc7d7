use serde::Deserialize;
use std::time::Duration;

use crate::services::orchestrator::IllustrationFailurePolicy;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000")
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection string. Without it stories live in process memory.
    pub database_url: Option<String>,

    /// Bearer token for the OpenAI-compatible API
    pub openai_api_key: String,

    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,

    #[serde(default = "default_text_model")]
    pub text_model: String,

    #[serde(default = "default_image_model")]
    pub image_model: String,

    #[serde(default = "default_image_size")]
    pub image_size: String,

    /// HTTP timeout for text and image calls
    #[serde(default = "default_upstream_timeout_secs")]
    pub upstream_timeout_secs: u64,

    /// S3 bucket for panel images. Uploads are disabled unless bucket, region
    /// and both keys are set.
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_access_key: Option<String>,
    pub s3_secret_key: Option<String>,

    /// Custom endpoint for S3-compatible stores
    pub s3_endpoint: Option<String>,

    /// Public URL prefix for uploaded objects (defaults to the bucket's S3 URL)
    pub s3_public_base_url: Option<String>,

    /// HS256 secret for reading the submitter from a bearer token
    pub jwt_secret: Option<String>,

    #[serde(default = "default_duplicate_cooldown_secs")]
    pub duplicate_cooldown_secs: u64,

    #[serde(default = "default_duplicate_retention_secs")]
    pub duplicate_retention_secs: u64,

    #[serde(default)]
    pub illustration_failure_policy: IllustrationFailurePolicy,

    /// Four fixed panel URLs served for "(dev)" prompts
    #[serde(default)]
    pub dev_panel_urls: Vec<String>,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_text_model() -> String {
    "gpt-4o".to_string()
}

fn default_image_model() -> String {
    "gpt-image-1".to_string()
}

fn default_image_size() -> String {
    "1024x1024".to_string()
}

fn default_upstream_timeout_secs() -> u64 {
    180
}

fn default_duplicate_cooldown_secs() -> u64 {
    10
}

fn default_duplicate_retention_secs() -> u64 {
    3600
}

/// Connection details for the panel bucket.
#[derive(Debug, Clone)]
pub struct S3Settings {
    pub bucket: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    pub endpoint: Option<String>,
    pub public_base_url: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    pub fn duplicate_cooldown(&self) -> Duration {
        Duration::from_secs(self.duplicate_cooldown_secs)
    }

    pub fn duplicate_retention(&self) -> Duration {
        Duration::from_secs(self.duplicate_retention_secs)
    }

    /// Returns `None` when any required S3 setting is missing.
    pub fn s3(&self) -> Option<S3Settings> {
        let bucket = self.s3_bucket.clone()?;
        let public_base_url = self
            .s3_public_base_url
            .clone()
            .unwrap_or_else(|| format!("https://{bucket}.s3.amazonaws.com"));

        Some(S3Settings {
            region: self.s3_region.clone()?,
            access_key: self.s3_access_key.clone()?,
            secret_key: self.s3_secret_key.clone()?,
            endpoint: self.s3_endpoint.clone(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            bucket,
        })
    }

    /// The dev-mode panel set, only when exactly four URLs are configured.
    pub fn dev_panels(&self) -> Option<[String; 4]> {
        let urls: Vec<String> = self
            .dev_panel_urls
            .iter()
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .collect();
        urls.try_into().ok()
    }
}
