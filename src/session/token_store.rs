//! Durable token storage
//!
//! The session persists exactly one value between runs: the bearer token.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tokio::io::AsyncWriteExt;

/// Errors from reading or writing the persisted token
#[derive(Error, Debug)]
pub enum TokenStoreError {
    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Where the session keeps its bearer token between runs
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Read the stored token, if any
    async fn load(&self) -> Result<Option<String>, TokenStoreError>;

    /// Replace the stored token
    async fn save(&self, token: &str) -> Result<(), TokenStoreError>;

    /// Remove the stored token. Clearing an empty store is not an error.
    async fn clear(&self) -> Result<(), TokenStoreError>;
}

/// Token persisted as a single file
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> TokenStoreError {
        TokenStoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn load(&self) -> Result<Option<String>, TokenStoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => {
                let token = content.trim();
                Ok((!token.is_empty()).then(|| token.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_error(e)),
        }
    }

    async fn save(&self, token: &str) -> Result<(), TokenStoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options
            .open(&self.path)
            .await
            .map_err(|e| self.io_error(e))?;

        // mode() only applies to newly created files
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(|e| self.io_error(e))?;
        }

        file.write_all(token.as_bytes())
            .await
            .map_err(|e| self.io_error(e))?;
        file.flush().await.map_err(|e| self.io_error(e))?;

        Ok(())
    }

    async fn clear(&self) -> Result<(), TokenStoreError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }
}

/// Token kept in memory only; lost when the process exits
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a token, as if left behind by an earlier run
    pub fn with_token(token: &str) -> Self {
        Self {
            token: Mutex::new(Some(token.to_string())),
        }
    }

    /// Current value, for inspection without going through the trait
    pub fn peek(&self) -> Option<String> {
        self.token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set(&self, value: Option<String>) {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = value;
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load(&self) -> Result<Option<String>, TokenStoreError> {
        Ok(self.peek())
    }

    async fn save(&self, token: &str) -> Result<(), TokenStoreError> {
        self.set(Some(token.to_string()));
        Ok(())
    }

    async fn clear(&self) -> Result<(), TokenStoreError> {
        self.set(None);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_file_store_lifecycle() {
        let dir = tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("nested").join("gluco_meter_token"));

        assert_eq!(store.load().await.unwrap(), None);

        store.save("tok1").await.unwrap();
        assert_eq!(store.load().await.unwrap().as_deref(), Some("tok1"));

        store.save("tok2").await.unwrap();
        assert_eq!(store.load().await.unwrap().as_deref(), Some("tok2"));

        store.clear().await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);

        // clearing twice is fine
        store.clear().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_store_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let mode = |path: &Path| std::fs::metadata(path).unwrap().permissions().mode() & 0o777;

        let fresh = FileTokenStore::new(dir.path().join("fresh"));
        fresh.save("tok1").await.unwrap();
        assert_eq!(mode(fresh.path()), 0o600);

        let existing = dir.path().join("existing");
        std::fs::write(&existing, "old-token-that-is-longer").unwrap();
        std::fs::set_permissions(&existing, std::fs::Permissions::from_mode(0o644)).unwrap();

        let store = FileTokenStore::new(&existing);
        store.save("tok2").await.unwrap();
        assert_eq!(mode(&existing), 0o600);
        assert_eq!(store.load().await.unwrap().as_deref(), Some("tok2"));
    }

    #[tokio::test]
    async fn test_file_store_ignores_blank_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("token");
        std::fs::write(&path, "  \n").unwrap();

        let store = FileTokenStore::new(&path);
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryTokenStore::with_token("stale");
        assert_eq!(store.load().await.unwrap().as_deref(), Some("stale"));

        store.clear().await.unwrap();
        assert_eq!(store.peek(), None);

        store.save("fresh").await.unwrap();
        assert_eq!(store.peek().as_deref(), Some("fresh"));
    }
}
