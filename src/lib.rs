pub mod aggregate;
pub mod composer;
pub mod config;
pub mod error;
pub mod history;
pub mod http;
pub mod intent;
pub mod models;
pub mod query;
pub mod redis;
pub mod schema;
pub mod service;
pub mod store;
pub mod transport;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use crate::composer::{Composer, GeminiComposer, UnconfiguredComposer};
use crate::config::Config;
use crate::error::Result;
use crate::history::{ConversationLog, RedisQueryRepository};
use crate::redis::RedisManager;
use crate::schema::SchemaCatalog;
use crate::service::DashboardService;
use crate::store::{FixtureMetricsStore, MetricsStore, RedisMetricsStore};
use crate::transport::{GeminiTransport, Transport};

/// Build the response composer: Gemini when a key is configured, otherwise a
/// stand-in that explains the missing setting
pub fn build_composer(cfg: &Config) -> Result<Arc<dyn Composer>> {
    if !cfg.gemini_configured() {
        tracing::warn!("GEMINI_API_KEY not configured - AI answers disabled");
        return Ok(Arc::new(UnconfiguredComposer));
    }

    let transport = Arc::new(GeminiTransport::new(
        cfg.gemini.api_key.clone(),
        cfg.gemini.base_url.clone(),
    )?);
    Ok(Arc::new(GeminiComposer::new(
        transport as Arc<dyn Transport>,
        cfg.gemini.model.clone(),
    )))
}

/// Wire the dashboard from configuration. The live store and the history log
/// share one Redis pool; when Redis is not configured or unreachable the
/// fixture store is used and history is disabled.
pub async fn build_service(cfg: &Config) -> Result<DashboardService> {
    let offset = cfg.utc_offset();

    let redis = if cfg.store.project_id.is_some() {
        match RedisManager::new_with_config(cfg).await {
            Ok(manager) => Some(Arc::new(manager)),
            Err(e) => {
                tracing::warn!("Live store unavailable, falling back to fixture data: {}", e);
                None
            }
        }
    } else {
        tracing::info!("METRICS_PROJECT_ID not set - using fixture data");
        None
    };

    let (store, log): (Arc<dyn MetricsStore>, ConversationLog) = match redis {
        Some(redis) => (
            Arc::new(RedisMetricsStore::new(Arc::clone(&redis))),
            ConversationLog::new(Arc::new(RedisQueryRepository::new(redis)), offset),
        ),
        None => (
            Arc::new(FixtureMetricsStore::following(offset)),
            ConversationLog::disconnected(offset),
        ),
    };

    Ok(DashboardService::new(
        cfg,
        store,
        build_composer(cfg)?,
        log,
        SchemaCatalog::load(&cfg.dashboard.schema_path),
    ))
}
