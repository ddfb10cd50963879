use serde_json::Value;
use std::sync::Arc;

use crate::models::{AggregationKind, AggregationRequest, AggregationResult, Row};
use crate::query::DocumentQuery;
use crate::store::MetricsStore;

/// Runs count/sum/avg/max/min over a filtered collection
pub struct Aggregator {
    store: Arc<dyn MetricsStore>,
}

impl Aggregator {
    pub fn new(store: Arc<dyn MetricsStore>) -> Self {
        Self { store }
    }

    /// Validation and store failures are reported in `error` with a zero result
    pub async fn aggregate(&self, request: &AggregationRequest) -> AggregationResult {
        if let AggregationKind::Unsupported(raw) = &request.kind {
            tracing::warn!("Rejected aggregation with unsupported kind '{}'", raw);
            return AggregationResult::failed(
                request.kind.clone(),
                format!("unsupported aggregation kind: {raw}"),
            );
        }

        let field = request.field.as_deref().filter(|f| !f.is_empty());
        if request.kind != AggregationKind::Count && field.is_none() {
            return AggregationResult::failed(
                request.kind.clone(),
                format!("field is required for {} aggregation", request.kind),
            );
        }

        let query = DocumentQuery::collection(&request.collection).filters(&request.filters);
        match self.store.fetch(&query).await {
            Ok(rows) => reduce(&request.kind, field, &rows),
            Err(e) => {
                tracing::warn!(
                    "Aggregation over {} failed: {}",
                    request.collection,
                    e
                );
                AggregationResult::failed(request.kind.clone(), e.to_string())
            }
        }
    }
}

/// Pure reduction over already-filtered rows.
///
/// Non-count kinds only see rows where `field` holds a JSON number; missing,
/// null and string values are skipped rather than read as zero.
pub fn reduce(kind: &AggregationKind, field: Option<&str>, rows: &[Row]) -> AggregationResult {
    if *kind == AggregationKind::Count {
        return AggregationResult {
            result: rows.len() as f64,
            kind: kind.clone(),
            count: Some(rows.len()),
            error: None,
        };
    }

    let values: Vec<f64> = match field {
        Some(field) => rows
            .iter()
            .filter_map(|row| row.get(field).and_then(Value::as_f64))
            .collect(),
        None => Vec::new(),
    };

    let result = if values.is_empty() {
        0.0
    } else {
        match kind {
            AggregationKind::Sum => values.iter().sum(),
            AggregationKind::Avg => values.iter().sum::<f64>() / values.len() as f64,
            AggregationKind::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            AggregationKind::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            AggregationKind::Count | AggregationKind::Unsupported(_) => 0.0,
        }
    };

    AggregationResult {
        result,
        kind: kind.clone(),
        count: Some(values.len()),
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DashboardError;
    use crate::query::{FilterOp, MetricFilter};
    use crate::store::MockMetricsStore;
    use crate::test_support::{fixture_store, row};
    use serde_json::json;

    fn rows() -> Vec<Row> {
        vec![
            row(json!({"id": "1", "amount": 10_000, "status": "paid"})),
            row(json!({"id": "2", "amount": 30_000, "status": "paid"})),
            row(json!({"id": "3", "amount": "35000", "status": "paid"})),
            row(json!({"id": "4", "amount": null, "status": "pending"})),
            row(json!({"id": "5", "status": "pending"})),
        ]
    }

    #[test]
    fn test_count_ignores_field() {
        let with_field = reduce(&AggregationKind::Count, Some("does_not_exist"), &rows());
        let without = reduce(&AggregationKind::Count, None, &rows());
        assert_eq!(with_field.result, 5.0);
        assert_eq!(with_field, without);
    }

    #[test]
    fn test_numeric_reductions_skip_non_numbers() {
        let data = rows();
        assert_eq!(reduce(&AggregationKind::Sum, Some("amount"), &data).result, 40_000.0);
        assert_eq!(reduce(&AggregationKind::Avg, Some("amount"), &data).result, 20_000.0);
        assert_eq!(reduce(&AggregationKind::Max, Some("amount"), &data).result, 30_000.0);
        let min = reduce(&AggregationKind::Min, Some("amount"), &data);
        assert_eq!(min.result, 10_000.0);
        assert_eq!(min.count, Some(2));
    }

    #[test]
    fn test_no_numeric_values_is_zero_not_error() {
        for kind in [
            AggregationKind::Sum,
            AggregationKind::Avg,
            AggregationKind::Max,
            AggregationKind::Min,
        ] {
            let result = reduce(&kind, Some("status"), &rows());
            assert_eq!(result.result, 0.0);
            assert!(result.error.is_none());
            assert_eq!(reduce(&kind, Some("amount"), &[]).result, 0.0);
        }
    }

    #[tokio::test]
    async fn test_unsupported_kind_reports_validation_error() {
        let aggregator = Aggregator::new(Arc::new(MockMetricsStore::new()));
        let request = AggregationRequest::over("orders", AggregationKind::from("median".to_string()), "amount");
        let result = aggregator.aggregate(&request).await;
        assert_eq!(result.result, 0.0);
        assert_eq!(result.error.as_deref(), Some("unsupported aggregation kind: median"));
    }

    #[tokio::test]
    async fn test_missing_field_reports_validation_error() {
        let aggregator = Aggregator::new(Arc::new(MockMetricsStore::new()));
        let mut request = AggregationRequest::count("orders");
        request.kind = AggregationKind::Avg;
        let result = aggregator.aggregate(&request).await;
        assert_eq!(result.result, 0.0);
        assert_eq!(result.error.as_deref(), Some("field is required for avg aggregation"));
    }

    #[tokio::test]
    async fn test_store_error_is_embedded() {
        let mut store = MockMetricsStore::new();
        store
            .expect_fetch()
            .times(1)
            .returning(|_| Err(DashboardError::Internal("timeout".to_string())));
        let aggregator = Aggregator::new(Arc::new(store));
        let result = aggregator.aggregate(&AggregationRequest::count("users")).await;
        assert_eq!(result.result, 0.0);
        assert!(result.error.unwrap().contains("timeout"));
    }

    #[tokio::test]
    async fn test_filters_reach_the_store() {
        let mut store = MockMetricsStore::new();
        store
            .expect_fetch()
            .withf(|query| query.collection == "orders" && query.filters.len() == 1)
            .returning(|_| Ok(vec![row(json!({"id": "1", "amount": 5}))]));
        let aggregator = Aggregator::new(Arc::new(store));
        let request = AggregationRequest::over("orders", AggregationKind::Sum, "amount")
            .with_filter(MetricFilter::new("status", FilterOp::Eq, "paid"));
        assert_eq!(aggregator.aggregate(&request).await.result, 5.0);
    }

    #[tokio::test]
    async fn test_identical_requests_give_identical_results() {
        let aggregator = Aggregator::new(fixture_store());
        let request = AggregationRequest::over("orders", AggregationKind::Avg, "amount")
            .with_filter(MetricFilter::new("status", FilterOp::Eq, "paid"));
        let first = aggregator.aggregate(&request).await;
        let second = aggregator.aggregate(&request).await;
        assert_eq!(first, second);
        assert!(first.result > 0.0);
    }
}
