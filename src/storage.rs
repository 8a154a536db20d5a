use async_trait::async_trait;
use derive_more::Display;
use std::path::{Path, PathBuf};

use crate::config::StorageConfig;

#[derive(Display, Debug)]
pub enum StorageError {
    #[display(fmt = "could not read uploaded file: {}", _0)]
    Read(String),
    #[display(fmt = "upload request failed: {}", _0)]
    Request(String),
    #[display(fmt = "storage service answered {}", _0)]
    Status(u16),
}

/// Scratch space for received uploads. Must share a filesystem with the
/// multipart temp dir so persisting is a rename.
pub struct UploadDir(pub PathBuf);

/// Where cat photos end up.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload(&self, key: &str, bytes: Vec<u8>) -> Result<(), StorageError>;

    fn public_url(&self, key: &str) -> String;
}

/// Generates a short random key, keeping the extension of `file_name`.
pub fn object_key(file_name: &Path) -> String {
    let mut key = uuid::Uuid::new_v4().simple().to_string();
    key.truncate(12);

    if let Some(ext) = file_name.extension().and_then(|e| e.to_str()) {
        if !ext.is_empty() {
            key.push('.');
            key.push_str(&ext.to_ascii_lowercase());
        }
    }
    key
}

pub fn compose_url(base_url: &str, bucket: &str, key: &str) -> String {
    let base = base_url.trim_end_matches('/');
    format!("{}/{}/{}", base, bucket, key)
}

/// Uploads with a plain HTTP `PUT` to `{endpoint}/{bucket}/{key}`.
pub struct HttpObjectStore {
    client: reqwest::Client,
    config: StorageConfig,
}

impl HttpObjectStore {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn upload(&self, key: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        let url = compose_url(&self.config.endpoint, &self.config.bucket, key);
        let mut request = self.client.put(&url).body(bytes);
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| StorageError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StorageError::Status(response.status().as_u16()));
        }
        debug!("Stored object {} at {}", key, url);
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        compose_url(&self.config.base_url, &self.config.bucket, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_keep_the_extension() {
        let key = object_key(Path::new("whiskers.JPG"));
        assert!(key.ends_with(".jpg"));
        assert_eq!(key.len(), 12 + ".jpg".len());
    }

    #[test]
    fn keys_without_extension_are_bare() {
        let key = object_key(Path::new("whiskers"));
        assert_eq!(key.len(), 12);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn keys_differ_between_uploads() {
        let a = object_key(Path::new("a.png"));
        let b = object_key(Path::new("a.png"));
        assert_ne!(a, b);
    }

    #[test]
    fn urls_join_base_bucket_and_key() {
        assert_eq!(
            compose_url("https://s3.amazonaws.com/", "catcollector", "abc.png"),
            "https://s3.amazonaws.com/catcollector/abc.png"
        );
        assert_eq!(
            compose_url("http://localhost:9000", "cats", "abc"),
            "http://localhost:9000/cats/abc"
        );
    }

    #[test]
    fn http_store_builds_public_urls_from_base() {
        let store = HttpObjectStore::new(StorageConfig {
            base_url: "https://cdn.example.test/".to_string(),
            bucket: "catcollector".to_string(),
            endpoint: "http://127.0.0.1:9000".to_string(),
            token: None,
        });
        assert_eq!(
            store.public_url("k.png"),
            "https://cdn.example.test/catcollector/k.png"
        );
    }
}
