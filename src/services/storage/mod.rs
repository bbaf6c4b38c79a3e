// Blob sinks: where annotated images are written
//
// Every sink has overwrite semantics and performs exactly one write per call.
// No retries happen here; failures are returned to the caller.

pub mod azure;
pub mod connection;
pub mod local;
pub mod memory;

use async_trait::async_trait;
use std::sync::Arc;

use crate::core::config::StorageBackend;
use crate::core::errors::StorageResult;

pub use azure::AzureBlobSink;
pub use connection::{StorageAuth, StorageConnection};
pub use local::LocalDirSink;
pub use memory::MemorySink;

/// Object storage destination for annotated images.
#[async_trait]
pub trait BlobSink: Send + Sync {
    /// Write `bytes` to `container/key`, replacing any existing object.
    async fn put(&self, container: &str, key: &str, bytes: Vec<u8>, content_type: &str) -> StorageResult<()>;

    /// Short human-readable description for logs (never includes secrets).
    fn describe(&self) -> String;
}

/// Build the sink selected by configuration.
pub fn build_sink(backend: &StorageBackend) -> StorageResult<Arc<dyn BlobSink>> {
    Ok(match backend {
        StorageBackend::Azure { connection_string } => {
            Arc::new(AzureBlobSink::from_connection_string(connection_string)?)
        }
        StorageBackend::Local { root } => Arc::new(LocalDirSink::new(root)),
        StorageBackend::Memory => Arc::new(MemorySink::new()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_sink_per_backend() {
        let memory = build_sink(&StorageBackend::Memory).unwrap();
        assert!(memory.describe().starts_with("in-memory"));

        let local = build_sink(&StorageBackend::Local {
            root: "out".to_string(),
        })
        .unwrap();
        assert!(local.describe().contains("out"));

        let azure = build_sink(&StorageBackend::Azure {
            connection_string: "UseDevelopmentStorage=true".to_string(),
        })
        .unwrap();
        assert!(azure.describe().contains("devstoreaccount1"));

        assert!(build_sink(&StorageBackend::Azure {
            connection_string: "garbage".to_string(),
        })
        .is_err());
    }
}
