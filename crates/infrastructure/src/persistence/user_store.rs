//! File-backed user store (`user.json` in the data directory).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use gymlog_application::ports::{FileSystem, FileSystemError, StoreError, UserStore};
use gymlog_domain::User;

use super::to_store_error;
use crate::serialization::{from_json_bytes, to_json_stable_bytes};

const USER_FILE: &str = "user.json";

/// User store persisting the profile as JSON.
#[derive(Debug, Clone)]
pub struct FileUserStore<F> {
    fs: F,
    path: PathBuf,
}

impl<F: FileSystem> FileUserStore<F> {
    /// Creates a store keeping its file under `data_dir`.
    pub fn new(fs: F, data_dir: &Path) -> Self {
        Self {
            fs,
            path: data_dir.join(USER_FILE),
        }
    }

    /// Location of the user file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl<F: FileSystem> UserStore for FileUserStore<F> {
    async fn get(&self) -> Result<Option<User>, StoreError> {
        if !self.fs.exists(&self.path).await {
            return Ok(None);
        }
        let content = self.fs.read_file(&self.path).await.map_err(to_store_error)?;
        from_json_bytes(&content)
            .map(Some)
            .map_err(|e| StoreError::Serialization(e.to_string()))
    }

    async fn save(&self, user: &User) -> Result<(), StoreError> {
        let content =
            to_json_stable_bytes(user).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.fs
            .write_file(&self.path, &content)
            .await
            .map_err(to_store_error)
    }

    async fn remove(&self) -> Result<(), StoreError> {
        match self.fs.remove_file(&self.path).await {
            Ok(()) | Err(FileSystemError::NotFound(_)) => Ok(()),
            Err(e) => Err(to_store_error(e)),
        }
    }
}
