//! Shared helpers for unit tests
use chrono::{DateTime, FixedOffset, TimeZone};
use serde_json::Value;
use std::sync::Arc;

use crate::composer::Composer;
use crate::config::Config;
use crate::history::ConversationLog;
use crate::history::tests::MemoryQueryRepository;
use crate::models::Row;
use crate::schema::SchemaCatalog;
use crate::service::DashboardService;
use crate::store::FixtureMetricsStore;

/// Fixed "now": mid-afternoon in the default +09:00 business zone
pub(crate) fn anchor() -> DateTime<FixedOffset> {
    FixedOffset::east_opt(9 * 3600)
        .expect("valid offset")
        .with_ymd_and_hms(2026, 10, 16, 14, 30, 0)
        .single()
        .expect("valid timestamp")
}

pub(crate) fn fixture_store() -> Arc<FixtureMetricsStore> {
    Arc::new(FixtureMetricsStore::new(anchor()))
}

pub(crate) fn row(value: Value) -> Row {
    value.as_object().cloned().expect("test rows are objects")
}

/// Fixture-backed service with an in-memory conversation log
pub(crate) fn dashboard_service(composer: Arc<dyn Composer>) -> DashboardService {
    let config = Config::default();
    DashboardService::new(
        &config,
        fixture_store(),
        composer,
        ConversationLog::new(Arc::new(MemoryQueryRepository::default()), *anchor().offset()),
        SchemaCatalog::fallback(),
    )
}
