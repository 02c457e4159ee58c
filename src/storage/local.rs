use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::storage::StorageProvider;

/// Local file system storage, served back by the application under `public_base_url`
pub struct LocalStorage {
    base_path: PathBuf,
    public_base_url: String,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            base_path: base_path.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Resolve a storage path below the base directory
    ///
    /// Only plain relative components are accepted, so `..` and absolute
    /// paths cannot escape the base.
    fn get_full_path(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let is_plain = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if path.is_empty() || !is_plain {
            return Err(AppError::BadRequest(format!("Invalid storage path: {}", path)));
        }
        Ok(self.base_path.join(relative))
    }

    /// Remove now-empty directories between `start` and the base path
    async fn prune_empty_dirs(&self, start: Option<&Path>) -> Result<()> {
        let mut current_dir = start.map(Path::to_path_buf);
        while let Some(dir) = current_dir {
            if dir == self.base_path {
                break;
            }
            match fs::read_dir(&dir).await {
                Ok(mut entries) => {
                    if entries.next_entry().await?.is_some() {
                        break;
                    }
                    let _ = fs::remove_dir(&dir).await;
                }
                Err(_) => break,
            }
            current_dir = dir.parent().map(Path::to_path_buf);
        }
        Ok(())
    }
}

#[async_trait]
impl StorageProvider for LocalStorage {
    async fn put(&self, path: &str, data: Bytes) -> Result<()> {
        let full_path = self.get_full_path(path)?;

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&full_path).await?;
        file.write_all(&data).await?;
        file.flush().await?;

        tracing::debug!("Saved {} bytes to {:?}", data.len(), full_path);
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Bytes> {
        let full_path = self.get_full_path(path)?;

        let data = fs::read(&full_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::NotFound(format!("File not found: {}", path))
            } else {
                AppError::Storage(format!("Failed to read file: {}", e))
            }
        })?;

        Ok(Bytes::from(data))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let full_path = self.get_full_path(path)?;

        match fs::remove_file(&full_path).await {
            Ok(()) => {
                tracing::debug!("Deleted file {:?}", full_path);
                self.prune_empty_dirs(full_path.parent()).await
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Storage(format!(
                "Failed to delete {}: {}",
                path, e
            ))),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let full_path = self.get_full_path(path)?;
        Ok(fs::try_exists(&full_path).await?)
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.public_base_url, path.trim_start_matches('/'))
    }

    fn storage_type(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "/media/");

        let path = "blog/post-1/1700000000000-abcd1234.png";
        storage.put(path, Bytes::from_static(b"png")).await.unwrap();
        assert!(storage.exists(path).await.unwrap());
        assert_eq!(storage.get(path).await.unwrap(), Bytes::from_static(b"png"));
        assert_eq!(
            storage.public_url(path),
            "/media/blog/post-1/1700000000000-abcd1234.png"
        );

        storage.delete(path).await.unwrap();
        assert!(!storage.exists(path).await.unwrap());
        // emptied directories are pruned up to the base
        assert!(!dir.path().join("blog").exists());

        // deleting again is fine
        storage.delete(path).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_escaping_paths() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "/media");

        for path in ["../outside.txt", "/etc/passwd", "blog/../../x", ""] {
            let err = storage.put(path, Bytes::from_static(b"x")).await.unwrap_err();
            assert!(matches!(err, AppError::BadRequest(_)), "{}", path);
        }
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "/media");
        let err = storage.get("nope.txt").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
