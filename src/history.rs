use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use std::sync::Arc;

use crate::error::Result;
use crate::intent::start_of_day;
use crate::models::{QaRecord, QueryStatistics};
use crate::redis::RedisManager;

#[cfg(test)]
use mockall::automock;

/// Repository trait for question/answer storage
#[cfg_attr(test, automock)]
#[async_trait]
pub trait QueryRepository: Send + Sync + 'static {
    /// Store a record; records are never updated afterwards
    async fn save_query(&self, record: &QaRecord) -> Result<()>;

    /// Newest first, at most `limit` records
    async fn recent_queries(&self, user_id: &str, limit: usize) -> Result<Vec<QaRecord>>;

    /// Totals across all users; `today` counts records at or after `since`
    async fn statistics(&self, since: DateTime<Utc>) -> Result<QueryStatistics>;
}

/// Redis implementation of QueryRepository
pub struct RedisQueryRepository {
    redis: Arc<RedisManager>,
}

impl RedisQueryRepository {
    pub fn new(redis: Arc<RedisManager>) -> Self {
        Self { redis }
    }

    fn record_key(&self, id: &str) -> String {
        self.redis.key(&format!("user_queries:doc:{id}"))
    }

    fn user_index_key(&self, user_id: &str) -> String {
        self.redis.key(&format!("user_queries:by_user:{user_id}"))
    }

    fn all_index_key(&self) -> String {
        self.redis.key("user_queries:all")
    }
}

#[async_trait]
impl QueryRepository for RedisQueryRepository {
    async fn save_query(&self, record: &QaRecord) -> Result<()> {
        let score = record.timestamp.timestamp_millis();
        self.redis.json_set(&self.record_key(&record.id), record).await?;
        self.redis
            .zadd(&self.user_index_key(&record.user_id), &record.id, score)
            .await?;
        self.redis.zadd(&self.all_index_key(), &record.id, score).await?;
        Ok(())
    }

    async fn recent_queries(&self, user_id: &str, limit: usize) -> Result<Vec<QaRecord>> {
        let ids = self
            .redis
            .zrevrange(&self.user_index_key(user_id), limit)
            .await?;
        let keys: Vec<String> = ids.iter().map(|id| self.record_key(id)).collect();
        let records: Vec<Option<QaRecord>> = self.redis.json_mget(&keys).await?;
        Ok(records.into_iter().flatten().collect())
    }

    async fn statistics(&self, since: DateTime<Utc>) -> Result<QueryStatistics> {
        let key = self.all_index_key();
        Ok(QueryStatistics {
            total_queries: self.redis.zcard(&key).await?,
            today_queries: self
                .redis
                .zcount_since(&key, since.timestamp_millis())
                .await?,
        })
    }
}

/// Availability-first facade over the repository: when storage is missing or
/// failing, writes report `false` and reads come back empty.
pub struct ConversationLog {
    repo: Option<Arc<dyn QueryRepository>>,
    offset: FixedOffset,
}

impl ConversationLog {
    pub fn new(repo: Arc<dyn QueryRepository>, offset: FixedOffset) -> Self {
        Self {
            repo: Some(repo),
            offset,
        }
    }

    pub fn disconnected(offset: FixedOffset) -> Self {
        Self { repo: None, offset }
    }

    pub fn is_connected(&self) -> bool {
        self.repo.is_some()
    }

    pub async fn append(&self, user_id: &str, query: &str, response: &str) -> bool {
        let Some(repo) = &self.repo else {
            return false;
        };

        let record = QaRecord::new(user_id, query, response);
        match repo.save_query(&record).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to save query for {}: {}", user_id, e);
                false
            }
        }
    }

    pub async fn recent(&self, user_id: &str, limit: usize) -> Vec<QaRecord> {
        let Some(repo) = &self.repo else {
            return Vec::new();
        };

        match repo.recent_queries(user_id, limit).await {
            Ok(mut records) => {
                records.truncate(limit);
                records
            }
            Err(e) => {
                tracing::warn!("Failed to load recent queries for {}: {}", user_id, e);
                Vec::new()
            }
        }
    }

    pub async fn statistics(&self) -> QueryStatistics {
        let Some(repo) = &self.repo else {
            return QueryStatistics::default();
        };

        let since = start_of_day(Utc::now().with_timezone(&self.offset)).with_timezone(&Utc);
        repo.statistics(since).await.unwrap_or_else(|e| {
            tracing::warn!("Failed to load query statistics: {}", e);
            QueryStatistics::default()
        })
    }
}

/// Render prior exchanges oldest first for use as prompt context
pub fn replay_context(records: &[QaRecord]) -> String {
    records
        .iter()
        .rev()
        .map(|r| format!("Q: {}\nA: {}", r.query, r.response))
        .collect::<Vec<_>>()
        .join("\n\n")
}
