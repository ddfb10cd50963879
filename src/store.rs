use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::intent::start_of_day;
use crate::models::Row;
use crate::query::DocumentQuery;
use crate::redis::RedisManager;

#[cfg(test)]
use mockall::automock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Live,
    Fixture,
}

/// Read side of the metrics document store
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MetricsStore: Send + Sync + 'static {
    fn backend(&self) -> StoreBackend;

    /// Run a filter/sort/limit query; every returned row carries `id`
    async fn fetch(&self, query: &DocumentQuery) -> Result<Vec<Row>>;
}

/// Live store: each document is a RedisJSON value, collections are id sets
pub struct RedisMetricsStore {
    redis: Arc<RedisManager>,
}

impl RedisMetricsStore {
    pub fn new(redis: Arc<RedisManager>) -> Self {
        Self { redis }
    }

    fn ids_key(&self, collection: &str) -> String {
        self.redis.key(&format!("{collection}:ids"))
    }

    fn doc_key(&self, collection: &str, id: &str) -> String {
        self.redis.key(&format!("{collection}:doc:{id}"))
    }

    /// Write a document, assigning an id when the row has none
    pub async fn insert(&self, collection: &str, mut row: Row) -> Result<String> {
        let id = match row.get("id").and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => uuid::Uuid::new_v4().to_string(),
        };
        row.insert("id".to_string(), Value::String(id.clone()));

        self.redis
            .json_set(&self.doc_key(collection, &id), &row)
            .await?;
        self.redis.sadd(&self.ids_key(collection), &id).await?;
        Ok(id)
    }
}

#[async_trait]
impl MetricsStore for RedisMetricsStore {
    fn backend(&self) -> StoreBackend {
        StoreBackend::Live
    }

    async fn fetch(&self, query: &DocumentQuery) -> Result<Vec<Row>> {
        let mut ids = self.redis.smembers(&self.ids_key(&query.collection)).await?;
        ids.sort();

        let keys: Vec<String> = ids
            .iter()
            .map(|id| self.doc_key(&query.collection, id))
            .collect();
        let rows: Vec<Option<Row>> = self.redis.json_mget(&keys).await?;

        // Ids whose document expired or was removed are skipped
        let rows = rows.into_iter().zip(ids).filter_map(|(row, id)| {
            let mut row = row?;
            row.entry("id").or_insert(Value::String(id));
            Some(row)
        });

        let result = query.apply(rows);
        tracing::debug!(
            collection = %query.collection,
            rows = result.len(),
            "Fetched documents from live store"
        );
        Ok(result)
    }
}

/// Signup buckets as (days before today, users)
const FIXTURE_USERS: [(i64, usize); 4] = [(0, 125), (1, 735), (10, 2_560), (90, 9_427)];

/// Paid order buckets as (days before today, orders, amount per order)
const FIXTURE_ORDERS: [(i64, usize, i64); 4] = [
    (0, 37, 50_000),
    (1, 142, 75_000),
    (10, 716, 50_000),
    (90, 3_342, 50_000),
];

/// Catalog as (name, category, price, stock, sales_count)
const FIXTURE_PRODUCTS: [(&str, &str, i64, i64, i64); 8] = [
    ("장미 꽃다발", "bouquet", 45_000, 3, 412),
    ("튤립 화분", "pot", 32_000, 12, 198),
    ("안개꽃 다발", "bouquet", 28_000, 25, 305),
    ("해바라기 한 송이", "single", 9_000, 7, 520),
    ("프리지아 꽃다발", "bouquet", 35_000, 18, 244),
    ("카네이션 바구니", "basket", 52_000, 2, 377),
    ("수국 화분", "pot", 48_000, 9, 133),
    ("라넌큘러스 다발", "bouquet", 39_000, 15, 167),
];

type Clock = Box<dyn Fn() -> DateTime<FixedOffset> + Send + Sync>;

struct FixtureSnapshot {
    midnight: DateTime<FixedOffset>,
    collections: HashMap<String, Vec<Row>>,
}

/// Deterministic stand-in used when the live store is not configured or reachable.
///
/// Rows are laid out relative to the current business day so that every window
/// the router asks for sees the same totals: today's rows sit at local midnight,
/// the rest one, ten and ninety days earlier. The layout moves forward whenever
/// the clock crosses midnight.
pub struct FixtureMetricsStore {
    clock: Clock,
    snapshot: RwLock<FixtureSnapshot>,
}

impl FixtureMetricsStore {
    /// Fixture frozen at `anchor`
    pub fn new(anchor: DateTime<FixedOffset>) -> Self {
        Self::with_clock(move || anchor)
    }

    /// Fixture that follows wall-clock time in the business zone
    pub fn following(offset: FixedOffset) -> Self {
        Self::with_clock(move || Utc::now().with_timezone(&offset))
    }

    pub fn with_clock(clock: impl Fn() -> DateTime<FixedOffset> + Send + Sync + 'static) -> Self {
        let midnight = start_of_day(clock());
        Self {
            clock: Box::new(clock),
            snapshot: RwLock::new(FixtureSnapshot {
                midnight,
                collections: fixture_collections(midnight),
            }),
        }
    }

    /// Current fixture documents by collection, used to seed a live store
    pub async fn collections(&self) -> HashMap<String, Vec<Row>> {
        self.refresh().await;
        self.snapshot.read().await.collections.clone()
    }

    async fn refresh(&self) {
        let midnight = start_of_day((self.clock)());
        if self.snapshot.read().await.midnight == midnight {
            return;
        }

        let mut snapshot = self.snapshot.write().await;
        if snapshot.midnight != midnight {
            tracing::info!("Re-anchoring fixture data at {}", midnight.to_rfc3339());
            *snapshot = FixtureSnapshot {
                midnight,
                collections: fixture_collections(midnight),
            };
        }
    }
}

fn fixture_collections(midnight: DateTime<FixedOffset>) -> HashMap<String, Vec<Row>> {
    let mut collections = HashMap::new();

    let mut users = Vec::new();
    for (days, count) in FIXTURE_USERS {
        let created_at = (midnight - Duration::days(days)).to_rfc3339();
        for _ in 0..count {
            let n = users.len() + 1;
            users.push(fixture_row(json!({
                "id": format!("user-{n:05}"),
                "name": format!("회원{n}"),
                "plan": if n % 4 == 0 { "premium" } else { "basic" },
                "created_at": created_at,
            })));
        }
    }

    let mut orders = Vec::new();
    for (days, count, amount) in FIXTURE_ORDERS {
        let created_at = (midnight - Duration::days(days)).to_rfc3339();
        for _ in 0..count {
            let n = orders.len() + 1;
            orders.push(fixture_row(json!({
                "id": format!("order-{n:05}"),
                "user_id": format!("user-{:05}", (n % users.len().max(1)) + 1),
                "amount": amount,
                "status": "paid",
                "created_at": created_at,
            })));
        }
    }
    // Unpaid orders carry no amount and must not move revenue totals
    for n in 1..=2 {
        orders.push(fixture_row(json!({
            "id": format!("order-pending-{n}"),
            "amount": Value::Null,
            "status": "pending",
            "created_at": midnight.to_rfc3339(),
        })));
    }

    let listed_at = (midnight - Duration::days(30)).to_rfc3339();
    let products = FIXTURE_PRODUCTS
        .iter()
        .enumerate()
        .map(|(i, (name, category, price, stock, sales))| {
            fixture_row(json!({
                "id": format!("product-{:02}", i + 1),
                "name": name,
                "category": category,
                "price": price,
                "stock": stock,
                "sales_count": sales,
                "created_at": listed_at,
            }))
        })
        .collect();

    collections.insert("users".to_string(), users);
    collections.insert("orders".to_string(), orders);
    collections.insert("products".to_string(), products);

    collections
}

fn fixture_row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        _ => Row::new(),
    }
}

#[async_trait]
impl MetricsStore for FixtureMetricsStore {
    fn backend(&self) -> StoreBackend {
        StoreBackend::Fixture
    }

    async fn fetch(&self, query: &DocumentQuery) -> Result<Vec<Row>> {
        self.refresh().await;
        let snapshot = self.snapshot.read().await;
        let rows = snapshot
            .collections
            .get(&query.collection)
            .map(|rows| query.apply(rows.iter().cloned()))
            .unwrap_or_default();
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{FilterOp, MetricFilter, SortDirection};
    use crate::test_support::anchor;

    #[tokio::test]
    async fn test_fixture_collection_sizes() {
        let store = FixtureMetricsStore::new(anchor());
        let users = store.fetch(&DocumentQuery::collection("users")).await.unwrap();
        assert_eq!(users.len(), 12_847);
        let orders = store.fetch(&DocumentQuery::collection("orders")).await.unwrap();
        assert_eq!(orders.len(), 37 + 142 + 716 + 3_342 + 2);
        assert!(orders.iter().all(|row| row.contains_key("id")));
    }

    #[tokio::test]
    async fn test_unknown_collection_is_empty() {
        let store = FixtureMetricsStore::new(anchor());
        let rows = store.fetch(&DocumentQuery::collection("coupons")).await.unwrap();
        assert!(rows.is_empty());
        assert_eq!(store.backend(), StoreBackend::Fixture);
    }

    #[tokio::test]
    async fn test_fixture_query_applies_filters_and_order() {
        let store = FixtureMetricsStore::new(anchor());
        let query = DocumentQuery::collection("products")
            .filter(MetricFilter::new("category", FilterOp::Eq, "bouquet"))
            .order_by("price", SortDirection::Desc)
            .limit(2);
        let rows = store.fetch(&query).await.unwrap();
        let names: Vec<&str> = rows
            .iter()
            .filter_map(|r| r.get("name").and_then(Value::as_str))
            .collect();
        assert_eq!(names, vec!["장미 꽃다발", "라넌큘러스 다발"]);
    }

    #[tokio::test]
    async fn test_fixture_follows_clock_across_midnight() {
        let now = Arc::new(std::sync::Mutex::new(anchor()));
        let clock = Arc::clone(&now);
        let store = FixtureMetricsStore::with_clock(move || *clock.lock().unwrap());
        let today = |day: &str| {
            DocumentQuery::collection("users").filter(MetricFilter::new(
                "created_at",
                FilterOp::Ge,
                format!("{day}T00:00:00+09:00"),
            ))
        };

        assert_eq!(store.fetch(&today("2026-10-16")).await.unwrap().len(), 125);

        *now.lock().unwrap() = anchor() + Duration::days(1);
        assert_eq!(store.fetch(&today("2026-10-17")).await.unwrap().len(), 125);
        let seeded = store.collections().await;
        assert_eq!(seeded["users"].len(), 12_847);
    }

    #[tokio::test]
    async fn test_today_rows_sit_at_local_midnight() {
        let store = FixtureMetricsStore::new(anchor());
        let query = DocumentQuery::collection("users").filter(MetricFilter::new(
            "created_at",
            FilterOp::Ge,
            "2026-10-16T00:00:00+09:00",
        ));
        assert_eq!(store.fetch(&query).await.unwrap().len(), 125);
    }
}
