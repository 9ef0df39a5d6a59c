// File-backed config store
// Whole file is `{"servers": {"<serverId>": GuildConfig}}`

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{ConfigStore, StoreError};
use crate::models::guild::GuildConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ServersFile {
    #[serde(default)]
    servers: BTreeMap<String, GuildConfig>,
}

/// Keeps the whole file in memory; every write rewrites it.
/// Writers are serialized, so concurrent saves never interleave.
pub struct JsonFileStore {
    path: PathBuf,
    state: Mutex<ServersFile>,
}

impl JsonFileStore {
    /// Load `path`, starting empty if the file does not exist yet
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();

        let state = match tokio::fs::read_to_string(&path).await {
            Ok(content) if content.trim().is_empty() => ServersFile::default(),
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("{} not found, starting with no server configs", path.display());
                ServersFile::default()
            }
            Err(e) => return Err(e.into()),
        };

        debug!("Loaded {} server configs from {}", state.servers.len(), path.display());

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write through a temp file so a crash never leaves half a file
    async fn persist(&self, state: &ServersFile) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn write(&self, config: &GuildConfig, must_be_new: bool) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if must_be_new && state.servers.contains_key(&config.server_id) {
            return Err(StoreError::DuplicateKey(config.server_id.clone()));
        }

        // Only commit in memory once the file write succeeded
        let mut next = state.clone();
        next.servers.insert(config.server_id.clone(), config.clone());
        self.persist(&next).await?;
        *state = next;
        Ok(())
    }
}

#[async_trait]
impl ConfigStore for JsonFileStore {
    async fn find(&self, server_id: &str) -> Result<Option<GuildConfig>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.servers.get(server_id).cloned())
    }

    async fn insert(&self, config: &GuildConfig) -> Result<(), StoreError> {
        self.write(config, true).await
    }

    async fn save(&self, config: &GuildConfig) -> Result<(), StoreError> {
        self.write(config, false).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_missing_file_starts_empty() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("servers.json")).await.unwrap();

        assert!(store.find("1").await.unwrap().is_none());
        assert_eq!(store.find_or_default("1").await.unwrap(), GuildConfig::new("1"));
        // reading never creates the file
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("servers.json")).await.unwrap();

        let first = store.get_or_create("G1").await.unwrap();
        let second = store.get_or_create("G1").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("servers.json")).await.unwrap();

        store.insert(&GuildConfig::new("1")).await.unwrap();
        let err = store.insert(&GuildConfig::new("1")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey(id) if id == "1"));
    }

    #[tokio::test]
    async fn test_saves_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data").join("servers.json");

        let store = JsonFileStore::open(&path).await.unwrap();
        let mut config = store.get_or_create("G1").await.unwrap();
        config.upsert_word_image("cat", "https://img/cat.png").unwrap();
        store.save(&config).await.unwrap();

        let reopened = JsonFileStore::open(&path).await.unwrap();
        let loaded = reopened.find("G1").await.unwrap().unwrap();
        assert_eq!(loaded.word_image("cat"), Some("https://img/cat.png"));

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["servers"]["G1"]["serverId"], "G1");
    }

    #[tokio::test]
    async fn test_malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("servers.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = JsonFileStore::open(&path).await.err().unwrap();
        assert!(matches!(err, StoreError::Serde(_)));
    }
}
