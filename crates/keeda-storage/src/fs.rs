// ── keeda-storage / fs ─────────────────────────────────────────────────────────
//
// Async filesystem seam used by the save protocol, backups and the recent
// registry.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use keeda_core::{VaultError, VaultResult};

// ── Filesystem trait ─────────────────────────────────────────────────────────

/// The file operations persistence needs.
#[async_trait]
pub trait VaultFs: Send + Sync {
    async fn read(&self, path: &Path) -> VaultResult<Vec<u8>>;

    /// Create or truncate `path` and write `data`.
    async fn write(&self, path: &Path, data: &[u8]) -> VaultResult<()>;

    async fn exists(&self, path: &Path) -> bool;

    async fn remove(&self, path: &Path) -> VaultResult<()>;

    /// Full paths of the files directly inside `dir`.
    async fn list(&self, dir: &Path) -> VaultResult<Vec<PathBuf>>;

    async fn create_dir_all(&self, dir: &Path) -> VaultResult<()>;
}

pub type SharedFs = Arc<dyn VaultFs>;

fn io_error(action: &str, path: &Path, e: std::io::Error) -> VaultError {
    VaultError::io(format!("Failed to {} {}: {}", action, path.display(), e))
}

// ── Tokio implementation ─────────────────────────────────────────────────────

/// The real filesystem via `tokio::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioFs;

impl TokioFs {
    pub fn shared() -> SharedFs {
        Arc::new(Self)
    }
}

#[async_trait]
impl VaultFs for TokioFs {
    async fn read(&self, path: &Path) -> VaultResult<Vec<u8>> {
        tokio::fs::read(path)
            .await
            .map_err(|e| io_error("read", path, e))
    }

    async fn write(&self, path: &Path, data: &[u8]) -> VaultResult<()> {
        tokio::fs::write(path, data)
            .await
            .map_err(|e| io_error("write", path, e))
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn remove(&self, path: &Path) -> VaultResult<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error("remove", path, e)),
        }
    }

    async fn list(&self, dir: &Path) -> VaultResult<Vec<PathBuf>> {
        let mut out = Vec::new();
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| io_error("list", dir, e))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_error("list", dir, e))?
        {
            out.push(entry.path());
        }
        Ok(out)
    }

    async fn create_dir_all(&self, dir: &Path) -> VaultResult<()> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| io_error("create directory", dir, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keeda_core::VaultErrorKind;

    #[tokio::test]
    async fn write_read_list_remove() {
        let tmp = tempfile::tempdir().unwrap();
        let fs = TokioFs;
        let nested = tmp.path().join("a").join("b");
        fs.create_dir_all(&nested).await.unwrap();

        let file = nested.join("vault.kdvx");
        assert!(!fs.exists(&file).await);
        fs.write(&file, b"hello").await.unwrap();
        assert!(fs.exists(&file).await);
        assert_eq!(fs.read(&file).await.unwrap(), b"hello");
        assert_eq!(fs.list(&nested).await.unwrap(), vec![file.clone()]);

        fs.remove(&file).await.unwrap();
        assert!(!fs.exists(&file).await);
        // removing twice is fine
        fs.remove(&file).await.unwrap();
    }

    #[tokio::test]
    async fn read_missing_file_is_io_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = TokioFs.read(&tmp.path().join("missing")).await.unwrap_err();
        assert_eq!(err.kind, VaultErrorKind::Io);
        assert!(err.message.contains("missing"));
    }
}
