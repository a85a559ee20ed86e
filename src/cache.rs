use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::warn;

/// The cache collaborator named in §6 (`race_state:{raceId}`,
/// `race_snapshot:{raceId}:{snapshotId}`, `race_snapshots:{raceId}`). A trait
/// so the snapshot store's cache-tier writes and the health monitor's ping
/// probe share one swappable backend; `RedisCache` is the concrete impl,
/// grounded on `mrkingsleyobi-f1-nexus`'s `redis` dependency (the reference
/// racing server has no cache layer at all).
#[async_trait]
pub trait Cache: Send + Sync {
    async fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), String>;
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, String>;
    async fn ping(&self) -> Result<(), String>;
}

pub struct RedisCache {
    manager: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(redis_url: &str) -> Result<Self, String> {
        let client = redis::Client::open(redis_url).map_err(|e| e.to_string())?;
        let manager = client
            .get_connection_manager()
            .await
            .map_err(|e| e.to_string())?;
        Ok(RedisCache { manager })
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), String> {
        let mut conn = self.manager.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1))
            .await
            .map_err(|e| e.to_string())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, String> {
        let mut conn = self.manager.clone();
        conn.get(key).await.map_err(|e| e.to_string())
    }

    async fn ping(&self) -> Result<(), String> {
        let mut conn = self.manager.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| e.to_string())?;
        Ok(())
    }
}

/// Used when no `REDIS_URL` is reachable at startup: the snapshot store's
/// in-memory tier remains authoritative, and cache writes are no-ops logged
/// once rather than retried forever.
pub struct NullCache;

#[async_trait]
impl Cache for NullCache {
    async fn set_with_ttl(&self, _key: &str, _value: &[u8], _ttl: Duration) -> Result<(), String> {
        Ok(())
    }

    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, String> {
        Ok(None)
    }

    async fn ping(&self) -> Result<(), String> {
        warn!("cache probe against NullCache: no redis connection configured");
        Err("no cache backend configured".to_string())
    }
}
