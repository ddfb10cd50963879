use std::sync::Arc;

use deadpool::managed::QueueMode;
use deadpool_redis::{Config as DeadpoolConfig, Pool, PoolConfig, Runtime, Timeouts};
use redis::{AsyncCommands, JsonAsyncCommands};

use crate::config::Config;
use crate::error::{DashboardError, Result};

/// Redis connection manager shared by the metrics store and the conversation log
#[derive(Clone)]
pub struct RedisManager {
    pool: Arc<Pool>,
    namespace: String,
}

impl RedisManager {
    /// Create a new Redis manager with configuration
    pub async fn new_with_config(config: &Config) -> Result<Self> {
        let namespace = config.store.project_id.clone().ok_or_else(|| {
            DashboardError::Config("METRICS_PROJECT_ID is required for the live store".to_string())
        })?;
        let redis_url = config.get_store_url();

        tracing::info!(
            "Connecting to Redis at {}:{} (db: {}, project: {})",
            config.store.host,
            config.store.port,
            config.store.database,
            namespace
        );

        let mut cfg = DeadpoolConfig::from_url(&redis_url);
        cfg.pool = Some(PoolConfig {
            max_size: config.store.pool.max_size,
            timeouts: Timeouts {
                wait: Some(config.get_pool_timeout()),
                create: Some(config.get_pool_create_timeout()),
                recycle: Some(config.get_pool_recycle_timeout()),
            },
            queue_mode: QueueMode::Fifo,
        });

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| DashboardError::PoolCreation(e.to_string()))?;

        let instance = Self {
            pool: Arc::new(pool),
            namespace,
        };
        instance.ping().await?;
        tracing::info!("Redis connection established");

        Ok(instance)
    }

    /// Get a connection from the pool
    pub async fn get_connection(&self) -> Result<deadpool_redis::Connection> {
        Ok(self.pool.get().await?)
    }

    /// Prefix a key with the project namespace
    pub fn key(&self, suffix: &str) -> String {
        format!("{}:{}", self.namespace, suffix)
    }

    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.get_connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut *conn).await?;
        Ok(())
    }

    /// Store a JSON object in Redis
    pub async fn json_set<T: serde::Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<()> {
        let mut conn = self.get_connection().await?;
        conn.json_set::<_, _, _, ()>(key, "$", value).await?;
        Ok(())
    }

    /// Fetch many JSON objects in one round trip, positionally aligned with `keys`
    pub async fn json_mget<T: serde::de::DeserializeOwned>(
        &self,
        keys: &[String],
    ) -> Result<Vec<Option<T>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.get_connection().await?;
        let results: Vec<Option<String>> = redis::cmd("JSON.MGET")
            .arg(keys)
            .arg("$")
            .query_async(&mut *conn)
            .await?;

        results
            .into_iter()
            .map(|json_str| match json_str {
                Some(json_str) => unwrap_path_result(&json_str),
                None => Ok(None),
            })
            .collect()
    }

    /// Add member to a set
    pub async fn sadd(&self, key: &str, member: &str) -> Result<()> {
        let mut conn = self.get_connection().await?;
        conn.sadd::<_, _, ()>(key, member).await?;
        Ok(())
    }

    pub async fn smembers(&self, key: &str) -> Result<Vec<String>> {
        let mut conn = self.get_connection().await?;
        Ok(conn.smembers(key).await?)
    }

    /// Add member to a sorted set with the given score
    pub async fn zadd(&self, key: &str, member: &str, score: i64) -> Result<()> {
        let mut conn = self.get_connection().await?;
        let _: () = conn.zadd(key, member, score).await?;
        Ok(())
    }

    /// Members with the highest scores first
    pub async fn zrevrange(&self, key: &str, limit: usize) -> Result<Vec<String>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.get_connection().await?;
        let stop = isize::try_from(limit).unwrap_or(isize::MAX) - 1;
        Ok(conn.zrevrange(key, 0, stop).await?)
    }

    pub async fn zcard(&self, key: &str) -> Result<u64> {
        let mut conn = self.get_connection().await?;
        Ok(conn.zcard(key).await?)
    }

    /// Count members with score >= min
    pub async fn zcount_since(&self, key: &str, min: i64) -> Result<u64> {
        let mut conn = self.get_connection().await?;
        Ok(conn.zcount(key, min, "+inf").await?)
    }
}

/// When using the "$" path, RedisJSON wraps the value in an array
fn unwrap_path_result<T: serde::de::DeserializeOwned>(json_str: &str) -> Result<Option<T>> {
    if let Ok(values) = serde_json::from_str::<Vec<serde_json::Value>>(json_str) {
        match values.into_iter().next() {
            Some(first) => Ok(Some(serde_json::from_value(first)?)),
            None => Ok(None),
        }
    } else {
        Ok(Some(serde_json::from_str(json_str)?))
    }
}
