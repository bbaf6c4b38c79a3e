use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tracing::info;

use super::BlobSink;
use crate::core::errors::{StorageError, StorageResult};

/// Writes blobs to `<root>/<container>/<key>` on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalDirSink {
    root: PathBuf,
}

impl LocalDirSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve the on-disk path, refusing keys that would escape the root.
    pub fn path_for(&self, container: &str, key: &str) -> StorageResult<PathBuf> {
        let relative = Path::new(container).join(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if escapes || key.is_empty() || container.is_empty() {
            return Err(StorageError::Io {
                path: relative.display().to_string(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "blob key must be a relative path"),
            });
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobSink for LocalDirSink {
    async fn put(&self, container: &str, key: &str, bytes: Vec<u8>, _content_type: &str) -> StorageResult<()> {
        let path = self.path_for(container, key)?;
        let io_err = |source| StorageError::Io {
            path: path.display().to_string(),
            source,
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let len = bytes.len();
        tokio::fs::write(&path, bytes).await.map_err(io_err)?;
        info!("Wrote {} ({} bytes)", path.display(), len);
        Ok(())
    }

    fn describe(&self) -> String {
        format!("local directory {}", self.root.display())
    }
}
