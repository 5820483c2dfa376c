//! Content-addressed blob store collaborator
//!
//! Workers post signed submissions here and auditors fetch them back by
//! reference. The store is external; this module provides the seam, an
//! in-memory implementation and an HTTP client for a gateway.

use crate::backend::{Result, StorageError};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Store a blob and return its content reference
    async fn put(&self, data: &[u8]) -> Result<String>;

    /// Fetch a blob by reference; `Ok(None)` when the store has no such blob
    async fn get(&self, cid: &str) -> Result<Option<Vec<u8>>>;
}

/// Content reference derived from the blob's Blake3 hash
pub fn content_id(data: &[u8]) -> String {
    format!("b3{}", hex::encode(blake3::hash(data).as_bytes()))
}

/// In-memory blob store
pub struct MemoryContentStore {
    blobs: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self {
            blobs: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for MemoryContentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn put(&self, data: &[u8]) -> Result<String> {
        let cid = content_id(data);
        self.blobs.write().await.insert(cid.clone(), data.to_vec());
        Ok(cid)
    }

    async fn get(&self, cid: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.blobs.read().await.get(cid).cloned())
    }
}

#[derive(Debug, Deserialize)]
struct PutResponse {
    cid: String,
}

/// Blob store reached through an HTTP gateway.
///
/// `GET {base_url}/{cid}` returns the blob, `POST {base_url}` stores one and
/// answers `{"cid": "..."}`. Every request carries the configured timeout.
pub struct HttpContentStore {
    base_url: String,
    client: reqwest::Client,
}

impl HttpContentStore {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StorageError::BackendError(format!("HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl ContentStore for HttpContentStore {
    async fn put(&self, data: &[u8]) -> Result<String> {
        let response = self
            .client
            .post(&self.base_url)
            .body(data.to_vec())
            .send()
            .await
            .map_err(|e| StorageError::Transport(e.to_string()))?
            .error_for_status()
            .map_err(|e| StorageError::Transport(e.to_string()))?;

        let body: PutResponse = response
            .json()
            .await
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;
        Ok(body.cid)
    }

    async fn get(&self, cid: &str) -> Result<Option<Vec<u8>>> {
        let url = format!("{}/{}", self.base_url, cid);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| StorageError::Transport(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            debug!(cid, "Blob not found at gateway");
            return Ok(None);
        }

        let response = response
            .error_for_status()
            .map_err(|e| StorageError::Transport(e.to_string()))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| StorageError::Transport(e.to_string()))?;
        Ok(Some(bytes.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_put_get() {
        let store = MemoryContentStore::new();
        let cid = store.put(b"submission").await.unwrap();
        assert!(cid.starts_with("b3"));
        assert_eq!(store.get(&cid).await.unwrap(), Some(b"submission".to_vec()));
        assert_eq!(store.get("b3missing").await.unwrap(), None);
    }

    #[test]
    fn test_content_id_is_stable() {
        assert_eq!(content_id(b"abc"), content_id(b"abc"));
        assert_ne!(content_id(b"abc"), content_id(b"abd"));
    }

    #[tokio::test]
    async fn test_http_store_unreachable_is_transport_error() {
        let store = HttpContentStore::new("http://127.0.0.1:9", Duration::from_millis(200)).unwrap();
        assert!(matches!(
            store.get("b3abc").await,
            Err(StorageError::Transport(_))
        ));
    }
}
