// Read-through cache in front of a config store
// Cache failures are logged and treated as misses; they never fail a command.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::AsyncCommands;
use tracing::{error, info, warn};

use super::{ConfigStore, StoreError};
use crate::models::guild::GuildConfig;

/// Redis entries expire after this many seconds
pub const CACHE_TTL_SECS: u64 = 600;

/// Give up connecting after this many retries
pub const MAX_CONNECT_RETRIES: u32 = 10;

/// Per-attempt limit on opening a Redis connection
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

#[async_trait]
pub trait GuildCache: Send + Sync {
    async fn get(&self, server_id: &str) -> Result<Option<GuildConfig>>;
    async fn put(&self, config: &GuildConfig) -> Result<()>;
}

/// Delay before reconnect attempt `retries` (1-based), or `None` once
/// attempts are exhausted. 100ms, 200ms, ... capped at 3s.
pub fn reconnect_delay(retries: u32) -> Option<Duration> {
    if retries > MAX_CONNECT_RETRIES {
        return None;
    }
    Some(Duration::from_millis(u64::from(retries.saturating_mul(100)).min(3000)))
}

/// Redis-backed cache shared by every process of the bot
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    /// Connect with backoff. Exhausting every retry is fatal for startup.
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_retries(url, MAX_CONNECT_RETRIES).await
    }

    async fn connect_with_retries(url: &str, max_retries: u32) -> Result<Self> {
        let client = redis::Client::open(url)?;
        // One attempt per call; the backoff below is the only retry policy
        let config = ConnectionManagerConfig::new()
            .set_number_of_retries(0)
            .set_connection_timeout(CONNECT_TIMEOUT);
        let mut retries = 0;

        loop {
            match ConnectionManager::new_with_config(client.clone(), config.clone()).await {
                Ok(conn) => {
                    info!("Redis client connected and ready");
                    return Ok(Self { conn });
                }
                Err(e) => {
                    retries += 1;
                    let delay = reconnect_delay(retries).filter(|_| retries <= max_retries);
                    let Some(delay) = delay else {
                        error!("Redis reconnection attempts exceeded: {}", e);
                        return Err(anyhow!("could not connect to Redis: {}", e));
                    };
                    warn!("Redis client reconnecting in {:?} ({})", delay, e);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    fn key(server_id: &str) -> String {
        format!("nami:guild:{}", server_id)
    }
}

#[async_trait]
impl GuildCache for RedisCache {
    async fn get(&self, server_id: &str) -> Result<Option<GuildConfig>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(Self::key(server_id)).await?;
        Ok(raw.map(|s| serde_json::from_str(&s)).transpose()?)
    }

    async fn put(&self, config: &GuildConfig) -> Result<()> {
        let mut conn = self.conn.clone();
        let json = serde_json::to_string(config)?;
        conn.set_ex::<_, _, ()>(Self::key(&config.server_id), json, CACHE_TTL_SECS)
            .await?;
        Ok(())
    }
}

/// Checks the cache first, then the backend; writes go to the backend
/// and then refresh the cache.
pub struct CachedStore {
    inner: Arc<dyn ConfigStore>,
    cache: Arc<dyn GuildCache>,
}

impl CachedStore {
    pub fn new(inner: Arc<dyn ConfigStore>, cache: Arc<dyn GuildCache>) -> Self {
        Self { inner, cache }
    }

    async fn refresh(&self, config: &GuildConfig) {
        if let Err(e) = self.cache.put(config).await {
            error!("Failed to cache config for server {}: {:?}", config.server_id, e);
        }
    }
}

#[async_trait]
impl ConfigStore for CachedStore {
    async fn find(&self, server_id: &str) -> Result<Option<GuildConfig>, StoreError> {
        match self.cache.get(server_id).await {
            Ok(Some(cached)) => return Ok(Some(cached)),
            Ok(None) => {}
            Err(e) => error!("Cache read failed for server {}: {:?}", server_id, e),
        }

        let found = self.inner.find(server_id).await?;
        if let Some(config) = &found {
            self.refresh(config).await;
        }
        Ok(found)
    }

    async fn insert(&self, config: &GuildConfig) -> Result<(), StoreError> {
        self.inner.insert(config).await?;
        self.refresh(config).await;
        Ok(())
    }

    async fn save(&self, config: &GuildConfig) -> Result<(), StoreError> {
        self.inner.save(config).await?;
        self.refresh(config).await;
        Ok(())
    }
}
