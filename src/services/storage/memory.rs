use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

use super::BlobSink;
use crate::core::errors::StorageResult;

/// A stored object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// In-process sink keyed by `container/key`. Clones share the same store.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    blobs: Arc<DashMap<String, StoredBlob>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, container: &str, key: &str) -> Option<StoredBlob> {
        self.blobs
            .get(&format!("{container}/{key}"))
            .map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    /// Sorted `container/key` names
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.blobs.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl BlobSink for MemorySink {
    async fn put(&self, container: &str, key: &str, bytes: Vec<u8>, content_type: &str) -> StorageResult<()> {
        self.blobs.insert(
            format!("{container}/{key}"),
            StoredBlob {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    fn describe(&self) -> String {
        format!("in-memory store ({} objects)", self.blobs.len())
    }
}
