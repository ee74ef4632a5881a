use crate::domain::model::StoredTokens;
use crate::domain::ports::TokenStore;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Persists the token pair as `<dir>/<storage_key>.json`.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(dir: impl AsRef<Path>, storage_key: &str) -> Self {
        Self {
            path: dir.as_ref().join(format!("{}.json", storage_key)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn load(&self) -> Result<Option<StoredTokens>> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&data)?))
    }

    async fn save(&self, tokens: &StoredTokens) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write then rename so a crash never leaves a half-written file behind.
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(tokens)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        tracing::debug!(path = %self.path.display(), "token store written");
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Process-local store; nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<Option<StoredTokens>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load(&self) -> Result<Option<StoredTokens>> {
        Ok(self.tokens.lock().await.clone())
    }

    async fn save(&self, tokens: &StoredTokens) -> Result<()> {
        *self.tokens.lock().await = Some(tokens.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.tokens.lock().await = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::ConsoleError;
    use tempfile::TempDir;

    fn tokens() -> StoredTokens {
        StoredTokens {
            access_token: "access-1".to_string(),
            refresh_token: Some("refresh-1".to_string()),
            subject_id: "t-1".to_string(),
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn test_file_store_round_trip_and_clear() {
        let dir = TempDir::new().unwrap();
        let store = FileTokenStore::new(dir.path().join("nested"), "dropout_console_session");

        assert!(store.load().await.unwrap().is_none());

        store.save(&tokens()).await.unwrap();
        assert!(store.path().ends_with("nested/dropout_console_session.json"));
        assert_eq!(store.load().await.unwrap(), Some(tokens()));

        // Survives a new handle, as after a restart.
        let reopened = FileTokenStore::new(dir.path().join("nested"), "dropout_console_session");
        assert_eq!(reopened.load().await.unwrap(), Some(tokens()));

        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_file_store_rejects_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let store = FileTokenStore::new(dir.path(), "session");
        tokio::fs::write(store.path(), b"{not json").await.unwrap();

        let err = store.load().await.unwrap_err();
        assert!(matches!(err, ConsoleError::SerializationError(_)));
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryTokenStore::new();
        store.save(&tokens()).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(tokens()));
        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }
}
