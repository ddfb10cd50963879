use anyhow::{Result, bail};
use std::sync::Arc;

use newflower_dashboard::config::Config;
use newflower_dashboard::redis::RedisManager;
use newflower_dashboard::store::{FixtureMetricsStore, RedisMetricsStore};

/// Load the fixture collections into the live store so a fresh Redis
/// instance answers the same way the offline dashboard does
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load();
    if config.store.project_id.is_none() {
        bail!("METRICS_PROJECT_ID must be set to seed the live store");
    }

    let redis = Arc::new(RedisManager::new_with_config(&config).await?);
    let store = RedisMetricsStore::new(redis);
    let fixtures = FixtureMetricsStore::following(config.utc_offset());

    for (collection, rows) in fixtures.collections().await {
        let count = rows.len();
        for row in rows {
            store.insert(&collection, row).await?;
        }
        tracing::info!("Seeded {} documents into {}", count, collection);
    }

    Ok(())
}
