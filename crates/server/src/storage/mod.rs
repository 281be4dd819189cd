//! Object storage for communication attachments.
//!
//! Files never pass through the API: clients upload and download with
//! short-lived presigned URLs, and the server only checks or removes
//! objects by key.

use std::collections::HashMap;
use std::time::Duration;

use aws_sdk_s3::{
    config::{Credentials, Region},
    presigning::PresigningConfig,
    Client,
};
use shared_types::AppError;

const PRESIGN_EXPIRY: Duration = Duration::from_secs(15 * 60);
const DEFAULT_BUCKET: &str = "attachments";
const DEFAULT_REGION: &str = "us-east-1";

#[allow(async_fn_in_trait)]
pub trait ObjectStore: Send + Sync {
    /// Presigned PUT URL plus the headers the client must send with it.
    async fn presign_put(
        &self,
        key: &str,
        content_type: &str,
    ) -> Result<(String, HashMap<String, String>), String>;

    async fn presign_get(&self, key: &str) -> Result<String, String>;

    /// `Ok(false)` when the object does not exist.
    async fn head(&self, key: &str) -> Result<bool, String>;

    async fn delete(&self, key: &str) -> Result<(), String>;
}

/// Replace anything outside `[A-Za-z0-9._-]` with `_` and drop leading dots.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    match cleaned.trim_start_matches('.') {
        "" => "file".to_string(),
        rest => rest.to_string(),
    }
}

pub fn attachment_key(communication_id: i64, attachment_id: uuid::Uuid, file_name: &str) -> String {
    format!(
        "communications/{}/{}/{}",
        communication_id,
        attachment_id,
        sanitize_file_name(file_name)
    )
}

/// Connection settings. Both the `AWS_*` names and the shorter `S3_*`
/// aliases are accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct S3Settings {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    pub bucket: String,
}

impl S3Settings {
    /// Resolve settings through `lookup`. Returns the first missing
    /// variable name on failure.
    pub fn resolve(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, &'static str> {
        let either = |primary: &str, alias: &str| lookup(primary).or_else(|| lookup(alias));
        Ok(Self {
            endpoint: either("AWS_ENDPOINT_URL_S3", "S3_ENDPOINT").ok_or("AWS_ENDPOINT_URL_S3")?,
            access_key: either("AWS_ACCESS_KEY_ID", "S3_ACCESS_KEY").ok_or("AWS_ACCESS_KEY_ID")?,
            secret_key: either("AWS_SECRET_ACCESS_KEY", "S3_SECRET_KEY")
                .ok_or("AWS_SECRET_ACCESS_KEY")?,
            region: either("AWS_REGION", "S3_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string()),
            bucket: lookup("ATTACHMENTS_BUCKET").unwrap_or_else(|| DEFAULT_BUCKET.to_string()),
        })
    }
}

/// S3-compatible store (AWS S3, MinIO, RustFS) with path-style addressing.
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(settings: S3Settings) -> Self {
        let credentials =
            Credentials::new(&settings.access_key, &settings.secret_key, None, None, "comunigov");
        let config = aws_sdk_s3::Config::builder()
            .endpoint_url(&settings.endpoint)
            .region(Region::new(settings.region))
            .credentials_provider(credentials)
            .force_path_style(true)
            .behavior_version_latest()
            .build();

        Self {
            client: Client::from_conf(config),
            bucket: settings.bucket,
        }
    }

    pub fn from_env() -> Result<Self, AppError> {
        let settings = S3Settings::resolve(|name| std::env::var(name).ok()).map_err(|missing| {
            tracing::error!(variable = missing, "Attachment storage is not configured");
            AppError::internal("Attachment storage is not configured")
        })?;
        Ok(Self::new(settings))
    }

    /// Create the bucket on first start. Failures are logged only.
    pub async fn ensure_bucket(&self) {
        if self.client.head_bucket().bucket(&self.bucket).send().await.is_ok() {
            return;
        }
        match self.client.create_bucket().bucket(&self.bucket).send().await {
            Ok(_) => tracing::info!(bucket = %self.bucket, "Attachments bucket created"),
            Err(e) => tracing::warn!(bucket = %self.bucket, error = %e, "Could not create attachments bucket"),
        }
    }
}

fn presigning() -> Result<PresigningConfig, String> {
    PresigningConfig::expires_in(PRESIGN_EXPIRY).map_err(|e| format!("Presign config error: {}", e))
}

impl ObjectStore for S3ObjectStore {
    async fn presign_put(
        &self,
        key: &str,
        content_type: &str,
    ) -> Result<(String, HashMap<String, String>), String> {
        let request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .presigned(presigning()?)
            .await
            .map_err(|e| format!("Presign PUT failed: {}", e))?;

        // Encryption travels as an unsigned header; some backends reject it signed.
        let headers = HashMap::from([
            ("Content-Type".to_string(), content_type.to_string()),
            ("x-amz-server-side-encryption".to_string(), "AES256".to_string()),
        ]);
        Ok((request.uri().to_string(), headers))
    }

    async fn presign_get(&self, key: &str) -> Result<String, String> {
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning()?)
            .await
            .map_err(|e| format!("Presign GET failed: {}", e))?;
        Ok(request.uri().to_string())
    }

    async fn head(&self, key: &str) -> Result<bool, String> {
        let result = self.client.head_object().bucket(&self.bucket).key(key).send().await;
        match result {
            Ok(_) => Ok(true),
            Err(e) => match e.into_service_error() {
                err if err.is_not_found() => Ok(false),
                err => Err(format!("HEAD failed: {}", err)),
            },
        }
    }

    async fn delete(&self, key: &str) -> Result<(), String> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| format!("DELETE failed: {}", e))
    }
}
