//! Keyword-driven routing of business questions to canned queries.
//!
//! Classification is plain substring containment over ordered keyword
//! tables: the first intent family with a matching keyword wins, then the
//! first matching time window. Nothing here touches the network; the
//! [`IntentRouter`] executes the resulting [`QueryPlan`] against an injected
//! [`MetricsStore`].

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;

use crate::aggregate::Aggregator;
use crate::models::{AggregationKind, AggregationRequest, AggregationResult, Row};
use crate::query::{DocumentQuery, FilterOp, MetricFilter, SortDirection};
use crate::store::MetricsStore;

pub const USERS: &str = "users";
pub const ORDERS: &str = "orders";
pub const PRODUCTS: &str = "products";

const PRODUCT_LIST_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Intent {
    Subscriber,
    Revenue,
    Product,
    Summary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Window {
    Today,
    ThisWeek,
    ThisMonth,
    AllTime,
}

/// Intent families in priority order; `Summary` is the fallback
pub const INTENT_KEYWORDS: &[(Intent, &[&str])] = &[
    (
        Intent::Subscriber,
        &["가입자", "가입", "회원", "subscriber", "signup", "user"],
    ),
    (
        Intent::Revenue,
        &["매출", "수익", "판매액", "결제", "revenue", "sales"],
    ),
    (
        Intent::Product,
        &["상품", "제품", "재고", "product", "stock", "inventory"],
    ),
];

/// Time windows in priority order; `AllTime` is the fallback.
/// "어제" reads as the current day: the dashboard only reports running totals.
pub const WINDOW_KEYWORDS: &[(Window, &[&str])] = &[
    (Window::Today, &["오늘", "어제", "today", "yesterday"]),
    (
        Window::ThisWeek,
        &["이번 주", "이번주", "주간", "this week", "weekly"],
    ),
    (
        Window::ThisMonth,
        &["이번 달", "이번달", "월간", "this month", "monthly"],
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub intent: Intent,
    pub window: Window,
}

/// Classify a question. Matching is case-sensitive.
pub fn classify(question: &str) -> Classification {
    let intent = first_match(question, INTENT_KEYWORDS).unwrap_or(Intent::Summary);
    let window = first_match(question, WINDOW_KEYWORDS).unwrap_or(Window::AllTime);
    Classification { intent, window }
}

fn first_match<T: Copy>(question: &str, table: &[(T, &[&str])]) -> Option<T> {
    table
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| question.contains(k)))
        .map(|(value, _)| *value)
}

pub fn start_of_day(now: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    now.date_naive()
        .and_time(NaiveTime::MIN)
        .and_local_timezone(*now.offset())
        .single()
        .unwrap_or(now)
}

impl Window {
    /// Lower bound for `created_at`, or `None` for all-time
    pub fn start(self, now: DateTime<FixedOffset>) -> Option<DateTime<FixedOffset>> {
        match self {
            Self::Today => Some(start_of_day(now)),
            Self::ThisWeek => Some(now - Duration::days(7)),
            Self::ThisMonth => Some(now - Duration::days(30)),
            Self::AllTime => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Today => "오늘",
            Self::ThisWeek => "이번 주",
            Self::ThisMonth => "이번 달",
            Self::AllTime => "전체",
        }
    }

    fn filter(self, now: DateTime<FixedOffset>) -> Option<MetricFilter> {
        self.start(now)
            .map(|start| MetricFilter::new("created_at", FilterOp::Ge, start.to_rfc3339()))
    }
}

/// What the router will run for a classified question
#[derive(Debug, Clone, PartialEq)]
pub enum QueryPlan {
    Aggregate(AggregationRequest),
    Fetch(DocumentQuery),
    Summary,
}

pub fn plan(classification: Classification, now: DateTime<FixedOffset>) -> QueryPlan {
    let since = classification.window.filter(now);
    match classification.intent {
        Intent::Subscriber => {
            let mut request = AggregationRequest::count(USERS);
            request.filters.extend(since);
            QueryPlan::Aggregate(request)
        }
        Intent::Revenue => {
            let mut request = AggregationRequest::over(ORDERS, AggregationKind::Sum, "amount");
            request.filters.extend(since);
            QueryPlan::Aggregate(request)
        }
        Intent::Product => QueryPlan::Fetch(
            DocumentQuery::collection(PRODUCTS)
                .order_by("stock", SortDirection::Asc)
                .limit(PRODUCT_LIST_LIMIT),
        ),
        Intent::Summary => QueryPlan::Summary,
    }
}

/// Routed question with the fetched data rendered for display and prompting
#[derive(Debug, Clone, Serialize)]
pub struct RoutedAnswer {
    #[serde(flatten)]
    pub classification: Classification,
    pub text: String,
    pub data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RoutedAnswer {
    fn failed(classification: Classification, error: String) -> Self {
        tracing::warn!("Metrics lookup failed: {}", error);
        Self {
            classification,
            text: format!("❌ 데이터 조회 중 오류가 발생했습니다: {error}"),
            data: Value::Null,
            error: Some(error),
        }
    }
}

pub struct IntentRouter {
    store: Arc<dyn MetricsStore>,
    aggregator: Aggregator,
    offset: FixedOffset,
}

impl IntentRouter {
    pub fn new(store: Arc<dyn MetricsStore>, offset: FixedOffset) -> Self {
        Self {
            aggregator: Aggregator::new(Arc::clone(&store)),
            store,
            offset,
        }
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    pub async fn answer(&self, question: &str) -> RoutedAnswer {
        let now = Utc::now().with_timezone(&self.offset);
        self.answer_at(question, now).await
    }

    /// Route and execute a question as of `now`. Store failures come back as
    /// a diagnostic text, never as an error.
    pub async fn answer_at(&self, question: &str, now: DateTime<FixedOffset>) -> RoutedAnswer {
        let classification = classify(question);
        tracing::debug!(
            intent = ?classification.intent,
            window = ?classification.window,
            "Routing question"
        );

        match plan(classification, now) {
            QueryPlan::Aggregate(request) => {
                let result = self.aggregator.aggregate(&request).await;
                if let Some(error) = result.error.clone() {
                    return RoutedAnswer::failed(classification, error);
                }
                RoutedAnswer {
                    classification,
                    text: render_metric(classification, &result),
                    data: serde_json::to_value(&result).unwrap_or(Value::Null),
                    error: None,
                }
            }
            QueryPlan::Fetch(query) => match self.store.fetch(&query).await {
                Ok(rows) => RoutedAnswer {
                    classification,
                    text: render_products(&rows),
                    data: Value::Array(rows.into_iter().map(Value::Object).collect()),
                    error: None,
                },
                Err(e) => RoutedAnswer::failed(classification, e.to_string()),
            },
            QueryPlan::Summary => self.summary(classification, now).await,
        }
    }

    async fn summary(
        &self,
        classification: Classification,
        now: DateTime<FixedOffset>,
    ) -> RoutedAnswer {
        let today = Classification {
            intent: Intent::Subscriber,
            window: Window::Today,
        };
        let sections = [
            today,
            Classification {
                intent: Intent::Revenue,
                ..today
            },
            Classification {
                intent: Intent::Subscriber,
                window: Window::AllTime,
            },
        ];

        let mut lines = vec!["📊 대시보드 요약".to_string()];
        let mut data = serde_json::Map::new();
        for section in sections {
            let QueryPlan::Aggregate(request) = plan(section, now) else {
                continue;
            };
            let result = self.aggregator.aggregate(&request).await;
            if let Some(error) = result.error {
                return RoutedAnswer::failed(classification, error);
            }
            lines.push(format!("- {}", render_metric(section, &result)));
            data.insert(summary_key(section), json!(result.result));
        }

        let products = self
            .aggregator
            .aggregate(&AggregationRequest::count(PRODUCTS))
            .await;
        if let Some(error) = products.error {
            return RoutedAnswer::failed(classification, error);
        }
        lines.push(format!("- 등록 상품: {}개", thousands(products.result)));
        data.insert("product_count".to_string(), json!(products.result));

        RoutedAnswer {
            classification,
            text: lines.join("\n"),
            data: Value::Object(data),
            error: None,
        }
    }
}

fn summary_key(section: Classification) -> String {
    let metric = match section.intent {
        Intent::Revenue => "revenue",
        _ => "subscribers",
    };
    let window = match section.window {
        Window::AllTime => "total",
        _ => "today",
    };
    format!("{window}_{metric}")
}

fn render_metric(classification: Classification, result: &AggregationResult) -> String {
    let window = classification.window;
    match (classification.intent, window) {
        (Intent::Subscriber, Window::AllTime) => {
            format!("전체 가입자: {}명", thousands(result.result))
        }
        (Intent::Subscriber, _) => {
            format!("{} 신규 가입자: {}명", window.label(), thousands(result.result))
        }
        _ => format!("{} 매출: {}원", window.label(), thousands(result.result)),
    }
}

fn render_products(rows: &[Row]) -> String {
    if rows.is_empty() {
        return "등록된 상품이 없습니다.".to_string();
    }

    let mut lines = vec![format!("재고가 적은 상품 (상위 {}개):", rows.len())];
    for row in rows {
        let name = row.get("name").and_then(Value::as_str).unwrap_or("이름 없음");
        let stock = row.get("stock").and_then(Value::as_f64).unwrap_or(0.0);
        let mut line = format!("- {name}: 재고 {}개", thousands(stock));
        if let Some(price) = row.get("price").and_then(Value::as_f64) {
            line.push_str(&format!(", 가격 {}원", thousands(price)));
        }
        lines.push(line);
    }
    lines.join("\n")
}

/// Round to an integer and group digits by thousands: 12500000.0 -> "12,500,000"
pub fn thousands(value: f64) -> String {
    let rounded = value.round() as i64;
    let digits = rounded.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if rounded < 0 {
        grouped.insert(0, '-');
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DashboardError;
    use crate::store::{FixtureMetricsStore, MockMetricsStore};
    use crate::test_support::{anchor, fixture_store};

    fn router() -> IntentRouter {
        IntentRouter::new(fixture_store(), *anchor().offset())
    }

    #[test]
    fn test_subscriber_without_window_counts_all_users() {
        for question in ["가입자 수 알려줘", "회원은 몇 명?", "how many subscriber accounts"] {
            let c = classify(question);
            assert_eq!(c.intent, Intent::Subscriber, "{question}");
            assert_eq!(c.window, Window::AllTime, "{question}");
            assert_eq!(plan(c, anchor()), QueryPlan::Aggregate(AggregationRequest::count(USERS)));
        }
    }

    #[test]
    fn test_revenue_today_sums_amount_since_midnight() {
        let c = classify("오늘 매출은?");
        assert_eq!(
            c,
            Classification {
                intent: Intent::Revenue,
                window: Window::Today
            }
        );
        let expected = AggregationRequest::over(ORDERS, AggregationKind::Sum, "amount").with_filter(
            MetricFilter::new("created_at", FilterOp::Ge, "2026-10-16T00:00:00+09:00"),
        );
        assert_eq!(plan(c, anchor()), QueryPlan::Aggregate(expected));
    }

    #[test]
    fn test_priority_order_and_case_sensitivity() {
        // subscriber outranks revenue, today outranks this-week
        let c = classify("오늘 가입자와 이번 주 매출");
        assert_eq!(c.intent, Intent::Subscriber);
        assert_eq!(c.window, Window::Today);

        assert_eq!(classify("재고 현황").intent, Intent::Product);
        assert_eq!(classify("Revenue please").intent, Intent::Summary);
        assert_eq!(classify("revenue this month").window, Window::ThisMonth);
    }

    #[test]
    fn test_window_boundaries() {
        let now = anchor();
        assert_eq!(
            Window::Today.start(now).unwrap().to_rfc3339(),
            "2026-10-16T00:00:00+09:00"
        );
        assert_eq!(
            Window::ThisWeek.start(now).unwrap().to_rfc3339(),
            "2026-10-09T14:30:00+09:00"
        );
        assert!(Window::AllTime.start(now).is_none());
    }

    #[test]
    fn test_thousands_grouping() {
        assert_eq!(thousands(0.0), "0");
        assert_eq!(thousands(125.0), "125");
        assert_eq!(thousands(1000.0), "1,000");
        assert_eq!(thousands(12_500_000.0), "12,500,000");
        assert_eq!(thousands(-4_200.4), "-4,200");
    }

    #[tokio::test]
    async fn test_yesterday_signups_scenario() {
        let answer = router().answer_at("어제 신규 가입자는 몇 명이야?", anchor()).await;
        assert_eq!(answer.classification.intent, Intent::Subscriber);
        assert_eq!(answer.classification.window, Window::Today);
        assert_eq!(answer.text, "오늘 신규 가입자: 125명");
        assert_eq!(answer.data["result"], 125.0);
    }

    #[tokio::test]
    async fn test_weekly_revenue_scenario() {
        let answer = router().answer_at("이번 주 매출은 얼마야?", anchor()).await;
        assert_eq!(answer.classification.intent, Intent::Revenue);
        assert_eq!(answer.classification.window, Window::ThisWeek);
        assert_eq!(answer.text, "이번 주 매출: 12,500,000원");
        assert!(answer.error.is_none());
    }

    #[tokio::test]
    async fn test_fixture_scenarios_hold_on_later_days() {
        let now = Arc::new(std::sync::Mutex::new(anchor()));
        let clock = Arc::clone(&now);
        let store = FixtureMetricsStore::with_clock(move || *clock.lock().unwrap());
        let router = IntentRouter::new(Arc::new(store), *anchor().offset());

        let next_day = anchor() + Duration::days(1);
        *now.lock().unwrap() = next_day;
        let answer = router.answer_at("어제 신규 가입자는 몇 명이야?", next_day).await;
        assert_eq!(answer.text, "오늘 신규 가입자: 125명");

        let next_week = anchor() + Duration::days(8);
        *now.lock().unwrap() = next_week;
        let answer = router.answer_at("이번 주 매출은 얼마야?", next_week).await;
        assert_eq!(answer.text, "이번 주 매출: 12,500,000원");
    }

    #[tokio::test]
    async fn test_other_windows_against_fixture() {
        let router = router();
        let month = router.answer_at("이번 달 가입자", anchor()).await;
        assert_eq!(month.text, "이번 달 신규 가입자: 3,420명");
        let total = router.answer_at("전체 매출", anchor()).await;
        assert_eq!(total.text, "전체 매출: 215,400,000원");
    }

    #[tokio::test]
    async fn test_product_question_lists_low_stock() {
        let answer = router().answer_at("재고가 부족한 상품 알려줘", anchor()).await;
        assert_eq!(answer.classification.intent, Intent::Product);
        let lines: Vec<&str> = answer.text.lines().collect();
        assert_eq!(lines[0], "재고가 적은 상품 (상위 5개):");
        assert_eq!(lines[1], "- 카네이션 바구니: 재고 2개, 가격 52,000원");
        assert_eq!(lines[2], "- 장미 꽃다발: 재고 3개, 가격 45,000원");
        assert_eq!(answer.data.as_array().map(Vec::len), Some(5));
    }

    #[tokio::test]
    async fn test_unmatched_question_falls_back_to_summary() {
        let answer = router().answer_at("요즘 분위기 어때?", anchor()).await;
        assert_eq!(answer.classification.intent, Intent::Summary);
        assert_eq!(
            answer.text,
            "📊 대시보드 요약\n- 오늘 신규 가입자: 125명\n- 오늘 매출: 1,850,000원\n- 전체 가입자: 12,847명\n- 등록 상품: 8개"
        );
        assert_eq!(answer.data["today_revenue"], 1_850_000.0);
        assert_eq!(answer.data["total_subscribers"], 12_847.0);
    }

    #[tokio::test]
    async fn test_store_failure_becomes_diagnostic() {
        let mut store = MockMetricsStore::new();
        store
            .expect_fetch()
            .returning(|_| Err(DashboardError::Internal("connection refused".to_string())));
        let router = IntentRouter::new(Arc::new(store), *anchor().offset());

        let answer = router.answer_at("오늘 매출", anchor()).await;
        assert!(answer.text.starts_with("❌"));
        assert!(answer.text.contains("connection refused"));
        assert_eq!(answer.data, Value::Null);

        let products = router.answer_at("상품 목록", anchor()).await;
        assert!(products.error.is_some());
    }
}
