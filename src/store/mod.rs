// Guild config persistence: one storage trait, a JSON file or Firestore
// backend, and Redis caching plus timeout decorators on top

pub mod cache;
pub mod firestore;
pub mod json_file;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::guild::GuildConfig;
use crate::utils::retry::retry_once_on_timeout;

pub use cache::{CachedStore, GuildCache, RedisCache};
pub use firestore::FirestoreStore;
pub use json_file::JsonFileStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Another writer created this server's config first
    #[error("a config for server {0} already exists")]
    DuplicateKey(String),
    #[error("storage backend timed out")]
    Timeout,
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("stored config is malformed: {0}")]
    Serde(#[from] serde_json::Error),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Read a server's config; `None` if it was never written
    async fn find(&self, server_id: &str) -> Result<Option<GuildConfig>, StoreError>;

    /// Create a new config. Fails with [`StoreError::DuplicateKey`] if one exists.
    async fn insert(&self, config: &GuildConfig) -> Result<(), StoreError>;

    /// Create or replace a config
    async fn save(&self, config: &GuildConfig) -> Result<(), StoreError>;

    /// Read without creating anything
    async fn find_or_default(&self, server_id: &str) -> Result<GuildConfig, StoreError> {
        Ok(self
            .find(server_id)
            .await?
            .unwrap_or_else(|| GuildConfig::new(server_id)))
    }

    /// Read, creating an empty config on first use. Losing a creation race
    /// re-reads the winner's document instead of overwriting it.
    async fn get_or_create(&self, server_id: &str) -> Result<GuildConfig, StoreError> {
        if let Some(config) = self.find(server_id).await? {
            return Ok(config);
        }

        let fresh = GuildConfig::new(server_id);
        match self.insert(&fresh).await {
            Ok(()) => Ok(fresh),
            Err(StoreError::DuplicateKey(id)) => self
                .find(server_id)
                .await?
                .ok_or(StoreError::DuplicateKey(id)),
            Err(e) => Err(e),
        }
    }
}

/// Puts every call under a time limit, retried once on expiry
pub struct TimedStore {
    inner: Arc<dyn ConfigStore>,
    limit: Duration,
}

impl TimedStore {
    pub fn new(inner: Arc<dyn ConfigStore>, limit: Duration) -> Self {
        Self { inner, limit }
    }
}

#[async_trait]
impl ConfigStore for TimedStore {
    async fn find(&self, server_id: &str) -> Result<Option<GuildConfig>, StoreError> {
        retry_once_on_timeout("store find", self.limit, || self.inner.find(server_id))
            .await
            .map_err(|_| StoreError::Timeout)?
    }

    async fn insert(&self, config: &GuildConfig) -> Result<(), StoreError> {
        retry_once_on_timeout("store insert", self.limit, || self.inner.insert(config))
            .await
            .map_err(|_| StoreError::Timeout)?
    }

    async fn save(&self, config: &GuildConfig) -> Result<(), StoreError> {
        retry_once_on_timeout("store save", self.limit, || self.inner.save(config))
            .await
            .map_err(|_| StoreError::Timeout)?
    }
}
