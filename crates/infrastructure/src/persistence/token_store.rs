//! File-backed token store.
//!
//! The pair lives in `auth_token.json` inside the data directory:
//! ```json
//! {
//!   "token": "eyJhbGciOi...",
//!   "refresh_token": "6c1f0a4e-..."
//! }
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use gymlog_application::ports::{FileSystem, FileSystemError, StoreError, TokenStore};
use gymlog_domain::TokenPair;
use tracing::debug;

use super::to_store_error;
use crate::serialization::{from_json_bytes, to_json_stable_bytes};

const TOKEN_FILE: &str = "auth_token.json";

/// Token store persisting the pair as JSON.
#[derive(Debug, Clone)]
pub struct FileTokenStore<F> {
    fs: F,
    path: PathBuf,
}

impl<F: FileSystem> FileTokenStore<F> {
    /// Creates a store keeping its file under `data_dir`.
    pub fn new(fs: F, data_dir: &Path) -> Self {
        Self {
            fs,
            path: data_dir.join(TOKEN_FILE),
        }
    }

    /// Location of the token file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl<F: FileSystem> TokenStore for FileTokenStore<F> {
    async fn get(&self) -> Result<Option<TokenPair>, StoreError> {
        if !self.fs.exists(&self.path).await {
            return Ok(None);
        }

        let content = self.fs.read_file(&self.path).await.map_err(to_store_error)?;
        let pair: TokenPair =
            from_json_bytes(&content).map_err(|e| StoreError::Serialization(e.to_string()))?;

        Ok(pair.is_complete().then_some(pair))
    }

    async fn save(&self, access_token: &str, refresh_token: &str) -> Result<(), StoreError> {
        let content = to_json_stable_bytes(&TokenPair::new(access_token, refresh_token))
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        self.fs
            .write_file(&self.path, &content)
            .await
            .map_err(to_store_error)?;

        debug!(path = %self.path.display(), "Token pair saved");
        Ok(())
    }

    async fn remove(&self) -> Result<(), StoreError> {
        match self.fs.remove_file(&self.path).await {
            Ok(()) | Err(FileSystemError::NotFound(_)) => Ok(()),
            Err(e) => Err(to_store_error(e)),
        }
    }
}
