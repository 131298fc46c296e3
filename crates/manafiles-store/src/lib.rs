mod local;

pub use local::LocalStore;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    /// Keys are relative, slash-separated and never climb out of the store root.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("store error: {0}")]
    Internal(String),
}

/// Blob storage for uploaded file contents, keyed by relative paths.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write (create or overwrite) an object.
    async fn put(&self, key: &str, data: Bytes) -> Result<(), StoreError>;

    /// Read an object. Returns `StoreError::NotFound` if absent.
    async fn get(&self, key: &str) -> Result<Bytes, StoreError>;

    /// Delete an object. No-op if absent.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        match self.get(key).await {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Key under which the bytes of `file_id` are stored.
pub fn file_content_key(owner_id: &str, file_id: &str) -> String {
    format!("files/{owner_id}/{file_id}")
}

pub(crate) fn validate_key(key: &str) -> Result<(), StoreError> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key
            .split('/')
            .any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if bad {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

// -- Configuration --

#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    /// Root directory for blobs. Defaults to `<data dir>/objects`.
    pub local_data_dir: Option<String>,
}

impl StoreConfig {
    /// Reads `MANAFILES_STORE_DIR`.
    pub fn from_env() -> Self {
        Self {
            local_data_dir: std::env::var("MANAFILES_STORE_DIR").ok(),
        }
    }

    pub fn resolved_dir(&self) -> PathBuf {
        self.local_data_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| default_data_dir().join("objects"))
    }
}

/// Same lookup order as `manafiles_db::data_dir()`, without depending on the db crate.
fn default_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("MANAFILES_DATA_DIR") {
        return PathBuf::from(dir);
    }
    let base = if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg)
    } else if let Some(home) = std::env::var_os("HOME") {
        PathBuf::from(home).join(".local/share")
    } else {
        PathBuf::from(".")
    };
    base.join("manafiles")
}

/// Create the object store described by `config`.
pub fn create_store(config: &StoreConfig) -> Result<Arc<dyn ObjectStore>, StoreError> {
    let dir = config.resolved_dir();
    std::fs::create_dir_all(&dir)
        .map_err(|e| StoreError::Internal(format!("mkdir {}: {e}", dir.display())))?;
    tracing::debug!(dir = %dir.display(), "using local object store");
    Ok(Arc::new(LocalStore::new(dir)))
}
