/// Supabase Storage backend
///
/// Talks to the Storage REST API with the service role key:
///
/// - upload: `POST {url}/storage/v1/object/{bucket}/{path}` with `x-upsert: true`
/// - delete: `DELETE {url}/storage/v1/object/{bucket}` with `{"prefixes": [path]}`
/// - public URL: `{url}/storage/v1/object/public/{bucket}/{path}`

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::json;
use tracing::{debug, error};

use super::{ObjectStorage, StorageError};
use crate::config::StorageConfig;

/// Supabase Storage client
#[derive(Debug, Clone)]
pub struct SupabaseStorage {
    base_url: String,
    service_role_key: String,
    client: reqwest::Client,
}

impl SupabaseStorage {
    pub fn new(base_url: &str, service_role_key: &str) -> Result<Self, StorageError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            service_role_key: service_role_key.to_string(),
            client,
        })
    }

    /// Builds a client when both the URL and the key are configured
    pub fn from_config(config: &StorageConfig) -> Result<Option<Self>, StorageError> {
        match (&config.supabase_url, &config.service_role_key) {
            (Some(url), Some(key)) => Ok(Some(Self::new(url, key)?)),
            _ => Ok(None),
        }
    }

    fn object_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, bucket, path)
    }

    fn public_prefix(&self) -> String {
        format!("{}/storage/v1/object/public/", self.base_url)
    }

    /// Public URL for an object
    pub fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}{}/{}", self.public_prefix(), bucket, path)
    }

    /// Splits a public URL back into `(bucket, path)`
    pub fn parse_public_url<'a>(&self, url: &'a str) -> Option<(&'a str, &'a str)> {
        let rest = url.strip_prefix(&self.public_prefix())?;
        let (bucket, path) = rest.split_once('/')?;
        if bucket.is_empty() || path.is_empty() {
            return None;
        }
        Some((bucket, path))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .bearer_auth(&self.service_role_key)
            .header("apikey", &self.service_role_key)
    }
}

#[async_trait]
impl ObjectStorage for SupabaseStorage {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let size = data.len();
        let request = self
            .client
            .post(self.object_url(bucket, path))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", "true")
            .body(data);

        let response = self.authorize(request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(%status, bucket, path, body = %body, "Object upload failed");
            return Err(StorageError::Upstream(format!("Upload failed with status {}", status)));
        }

        debug!(bucket, path, size, "Uploaded object");
        Ok(self.public_url(bucket, path))
    }

    async fn delete(&self, url: &str) -> Result<(), StorageError> {
        let (bucket, path) = self
            .parse_public_url(url)
            .ok_or_else(|| StorageError::InvalidUrl(url.to_string()))?;

        let request = self
            .client
            .delete(format!("{}/storage/v1/object/{}", self.base_url, bucket))
            .json(&json!({ "prefixes": [path] }));

        let response = self.authorize(request).send().await?;

        if !response.status().is_success() {
            return Err(StorageError::Upstream(format!(
                "Delete failed with status {}",
                response.status()
            )));
        }

        debug!(bucket, path, "Deleted object");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_url_round_trip() {
        let storage = SupabaseStorage::new("https://abc.supabase.co/", "key").unwrap();
        let url = storage.public_url("avatars", "avatars/u-1.png");

        assert_eq!(
            url,
            "https://abc.supabase.co/storage/v1/object/public/avatars/avatars/u-1.png"
        );
        assert_eq!(storage.parse_public_url(&url), Some(("avatars", "avatars/u-1.png")));
        assert_eq!(storage.parse_public_url("https://elsewhere.com/x.png"), None);
    }

    #[test]
    fn test_from_config_requires_both_values() {
        let config = StorageConfig {
            supabase_url: Some("https://abc.supabase.co".to_string()),
            service_role_key: None,
            max_file_size: 1024,
        };
        assert!(SupabaseStorage::from_config(&config).unwrap().is_none());
    }
}
