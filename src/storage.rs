//! Remote-storage capability for results that cannot be returned as a path.
//!
//! The orchestrator only needs `upload(file) -> URL | None`. A `None` means
//! "not delivered" for any reason; the caller falls back to inline data, so
//! implementations log their failures instead of returning them.

use crate::config::StorageConfig;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Upload a local file and hand back a public reference.
#[async_trait]
pub trait RemoteStorage: Send + Sync {
    /// Upload `path` under a name derived from `suggested_name`.
    ///
    /// Returns the public URL, or `None` when the upload did not happen.
    /// Never panics and never returns an error.
    async fn upload(&self, path: &Path, suggested_name: &str) -> Option<String>;
}

/// Plain HTTP `PUT` storage (S3 presigned buckets, R2 public buckets, WebDAV, …).
pub struct HttpStorage {
    client: reqwest::Client,
    config: StorageConfig,
}

impl HttpStorage {
    pub fn new(config: StorageConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;
        Ok(Self { client, config })
    }

    /// Object key: a unique prefix keeps concurrent uploads of `report.zip` apart.
    fn object_key(suggested_name: &str) -> String {
        format!("{}/{}", uuid::Uuid::new_v4().simple(), suggested_name)
    }

    fn join(base: &str, key: &str) -> String {
        format!("{}/{}", base.trim_end_matches('/'), key)
    }
}

#[async_trait]
impl RemoteStorage for HttpStorage {
    async fn upload(&self, path: &Path, suggested_name: &str) -> Option<String> {
        let bytes = match tokio::fs::read(path).await {
            Ok(b) => b,
            Err(e) => {
                warn!("Upload skipped, cannot read {}: {}", path.display(), e);
                return None;
            }
        };
        let size = bytes.len();
        let key = Self::object_key(suggested_name);
        let put_url = Self::join(&self.config.upload_url, &key);

        let mut request = self
            .client
            .put(&put_url)
            .header(reqwest::header::CONTENT_TYPE, crate::pipeline::encode::mime_for_path(path))
            .body(bytes);
        if let Some(ref token) = self.config.auth_token {
            request = request.bearer_auth(token);
        }

        match request.send().await {
            Ok(resp) if resp.status().is_success() => {
                let public = match self.config.public_base_url {
                    Some(ref base) => Self::join(base, &key),
                    None => put_url,
                };
                info!(key = %key, size, "Uploaded to remote storage");
                Some(public)
            }
            Ok(resp) => {
                warn!(key = %key, status = %resp.status(), "Remote storage rejected upload");
                None
            }
            Err(e) => {
                warn!(key = %key, "Remote storage upload failed: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_handles_trailing_slash() {
        assert_eq!(
            HttpStorage::join("https://cdn.example.com/files/", "k/a.zip"),
            "https://cdn.example.com/files/k/a.zip"
        );
        assert_eq!(
            HttpStorage::join("https://cdn.example.com", "k/a.zip"),
            "https://cdn.example.com/k/a.zip"
        );
    }

    #[test]
    fn object_keys_are_unique_and_keep_name() {
        let a = HttpStorage::object_key("report.zip");
        let b = HttpStorage::object_key("report.zip");
        assert_ne!(a, b);
        assert!(a.ends_with("/report.zip"));
    }

    #[tokio::test]
    async fn unreadable_file_yields_none() {
        let storage = HttpStorage::new(StorageConfig {
            upload_url: "http://127.0.0.1:9/uploads".into(),
            public_base_url: None,
            auth_token: None,
            timeout_secs: 1,
        })
        .unwrap();
        let url = storage
            .upload(Path::new("/definitely/not/here.zip"), "here.zip")
            .await;
        assert!(url.is_none());
    }

    #[tokio::test]
    async fn unreachable_endpoint_yields_none() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("a.zip");
        std::fs::write(&file, b"PK").unwrap();
        let storage = HttpStorage::new(StorageConfig {
            upload_url: "http://127.0.0.1:9/uploads".into(),
            public_base_url: None,
            auth_token: None,
            timeout_secs: 1,
        })
        .unwrap();
        assert!(storage.upload(&file, "a.zip").await.is_none());
    }
}
