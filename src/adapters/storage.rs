use crate::domain::ports::Storage;
use crate::utils::error::{AppError, Result};
use async_trait::async_trait;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// 拒絕跳出根目錄的路徑 (`..`、絕對路徑)
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(AppError::ProcessingError {
                message: format!("Refusing storage path outside base directory: {}", path),
            });
        }
        Ok(self.base_path.join(relative))
    }
}

const LOCK_FILE: &str = "site-cms.lock";

impl LocalStorage {
    /// 取得目錄的獨佔鎖 (`site-cms.lock`，內容為行程 id)
    ///
    /// 鎖檔已存在時回傳 `Conflict`；行程異常結束留下的鎖檔需手動刪除。
    pub fn lock(&self) -> Result<DirLock> {
        std::fs::create_dir_all(&self.base_path)?;
        let path = self.base_path.join(LOCK_FILE);
        match std::fs::OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                write!(file, "{}", std::process::id())?;
                tracing::debug!("🔒 Locked {}", self.base_path.display());
                Ok(DirLock { path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let owner = std::fs::read_to_string(&path).unwrap_or_default();
                Err(AppError::conflict(format!(
                    "{} is in use by process {} (delete {} if that process is gone)",
                    self.base_path.display(),
                    owner.trim(),
                    path.display()
                )))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// 目錄鎖，drop 時刪除鎖檔
#[derive(Debug)]
pub struct DirLock {
    path: PathBuf,
}

impl Drop for DirLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!("⚠️  Failed to remove {}: {}", self.path.display(), e);
        }
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn read_file(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let full_path = self.resolve(path)?;
        match tokio::fs::read(&full_path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.resolve(path)?;

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // 先寫暫存檔再改名，避免寫到一半的快照
        let tmp_path = full_path.with_extension("tmp");
        tokio::fs::write(&tmp_path, data).await?;
        tokio::fs::rename(&tmp_path, &full_path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_then_read_nested_file() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path());

        storage.write_file("ai/cover.png", b"png-bytes").await.unwrap();
        let data = storage.read_file("ai/cover.png").await.unwrap();
        assert_eq!(data.as_deref(), Some(&b"png-bytes"[..]));

        assert!(storage.read_file("missing.json").await.unwrap().is_none());
    }

    #[test]
    fn test_lock_is_exclusive_until_dropped() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path().join("data"));

        let lock = storage.lock().unwrap();
        let owner = std::fs::read_to_string(temp_dir.path().join("data").join(LOCK_FILE)).unwrap();
        assert_eq!(owner, std::process::id().to_string());
        assert!(matches!(storage.lock(), Err(AppError::Conflict { .. })));

        drop(lock);
        assert!(!temp_dir.path().join("data").join(LOCK_FILE).exists());
        assert!(storage.lock().is_ok());
    }

    #[tokio::test]
    async fn test_rejects_parent_traversal() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path());

        assert!(storage.write_file("../escape.txt", b"x").await.is_err());
        assert!(storage.read_file("/etc/passwd").await.is_err());
    }
}
