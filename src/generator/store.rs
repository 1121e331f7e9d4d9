use crate::{error::Result, files};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Two-phase persistence of generated images.
///
/// `stage` does the slow write without holding the session lock;
/// `publish` moves the staged file to its final name and runs under it.
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn stage(&self, data: &[u8]) -> Result<PathBuf>;

    fn publish(&self, staged: &Path, file_name: &str) -> Result<PathBuf>;

    async fn discard(&self, staged: &Path);
}

pub struct DiskStore {
    output_dir: PathBuf,
}

impl DiskStore {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    fn staged_path(&self) -> PathBuf {
        self.output_dir
            .join(format!(".dndig-{}.part", Uuid::new_v4()))
    }

    /// A write that fails part way may still have created the file.
    async fn settle_stage(&self, staged: PathBuf, written: Result<()>) -> Result<PathBuf> {
        match written {
            Ok(()) => Ok(staged),
            Err(e) => {
                self.discard(&staged).await;
                Err(e)
            }
        }
    }
}

#[async_trait]
impl ImageStore for DiskStore {
    async fn stage(&self, data: &[u8]) -> Result<PathBuf> {
        let staged = self.staged_path();
        let written = files::save_binary_file(&staged, data).await;
        self.settle_stage(staged, written).await
    }

    fn publish(&self, staged: &Path, file_name: &str) -> Result<PathBuf> {
        let target = self.output_dir.join(file_name);
        std::fs::rename(staged, &target)?;
        log::info!("File saved to: {}", target.display());
        Ok(target)
    }

    async fn discard(&self, staged: &Path) {
        if let Err(e) = tokio::fs::remove_file(staged).await {
            log::debug!("Could not remove staged file {}: {}", staged.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn staged_files_are_published_under_final_name() {
        let dir = TempDir::new().unwrap();
        let store = DiskStore::new(dir.path());

        let staged = store.stage(b"png-bytes").await.unwrap();
        assert!(staged.exists());

        let path = store.publish(&staged, "castle_ts_1.png").unwrap();
        assert_eq!(path, dir.path().join("castle_ts_1.png"));
        assert!(!staged.exists());
        assert_eq!(std::fs::read(&path).unwrap(), b"png-bytes");
    }

    #[tokio::test]
    async fn discard_removes_staged_file() {
        let dir = TempDir::new().unwrap();
        let store = DiskStore::new(dir.path());
        let staged = store.stage(b"x").await.unwrap();
        store.discard(&staged).await;
        assert!(!staged.exists());
    }

    #[tokio::test]
    async fn failed_write_leaves_no_part_file() {
        let dir = TempDir::new().unwrap();
        let store = DiskStore::new(dir.path());
        let staged = store.staged_path();
        std::fs::write(&staged, b"trunc").unwrap();

        let written = Err(std::io::Error::other("No space left on device").into());
        assert!(store.settle_stage(staged, written).await.is_err());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn staging_into_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let store = DiskStore::new(dir.path().join("missing"));
        assert!(store.stage(b"x").await.is_err());
    }
}
