use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

use crate::models::Row;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "not-in")]
    NotIn,
    #[serde(rename = "array-contains")]
    ArrayContains,
}

/// Single `field <op> value` condition. Rows lacking the field never match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricFilter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl MetricFilter {
    pub fn new(field: &str, op: FilterOp, value: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            op,
            value: value.into(),
        }
    }

    pub fn matches(&self, row: &Row) -> bool {
        let Some(actual) = row.get(&self.field) else {
            return false;
        };

        match self.op {
            FilterOp::Eq => values_equal(actual, &self.value),
            FilterOp::Ne => !values_equal(actual, &self.value),
            FilterOp::Lt => compare_values(actual, &self.value) == Some(Ordering::Less),
            FilterOp::Le => matches!(
                compare_values(actual, &self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            FilterOp::Gt => compare_values(actual, &self.value) == Some(Ordering::Greater),
            FilterOp::Ge => matches!(
                compare_values(actual, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            FilterOp::In => self
                .value
                .as_array()
                .is_some_and(|candidates| candidates.iter().any(|c| values_equal(actual, c))),
            FilterOp::NotIn => self
                .value
                .as_array()
                .is_some_and(|candidates| !candidates.iter().any(|c| values_equal(actual, c))),
            FilterOp::ArrayContains => actual
                .as_array()
                .is_some_and(|items| items.iter().any(|item| values_equal(item, &self.value))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

/// Filter/sort/limit query against one collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentQuery {
    pub collection: String,
    #[serde(default)]
    pub filters: Vec<MetricFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<OrderBy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl DocumentQuery {
    pub fn collection(name: &str) -> Self {
        Self {
            collection: name.to_string(),
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    pub fn filter(mut self, filter: MetricFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn filters(mut self, filters: &[MetricFilter]) -> Self {
        self.filters.extend_from_slice(filters);
        self
    }

    pub fn order_by(mut self, field: &str, direction: SortDirection) -> Self {
        self.order_by = Some(OrderBy {
            field: field.to_string(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Evaluate the query over an in-memory collection.
    ///
    /// Ordering drops rows that lack the sort field, and the sort is stable so
    /// equal keys keep their storage order.
    pub fn apply(&self, rows: impl IntoIterator<Item = Row>) -> Vec<Row> {
        let mut matched: Vec<Row> = rows
            .into_iter()
            .filter(|row| self.filters.iter().all(|f| f.matches(row)))
            .collect();

        if let Some(order) = &self.order_by {
            matched.retain(|row| row.contains_key(&order.field));
            matched.sort_by(|a, b| {
                let ord = match (a.get(&order.field), b.get(&order.field)) {
                    (Some(x), Some(y)) => sort_order(x, y),
                    _ => Ordering::Equal,
                };
                match order.direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            });
        }

        if let Some(limit) = self.limit {
            matched.truncate(limit);
        }

        matched
    }
}

/// Type classes in sort order: null, bool, number, timestamp, string, array, object
fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(s) if DateTime::parse_from_rfc3339(s).is_ok() => 3,
        Value::String(_) => 4,
        Value::Array(_) => 5,
        Value::Object(_) => 6,
    }
}

/// Order two JSON values of the same type class; RFC 3339 strings compare as
/// instants. Values of different classes are incomparable.
pub(crate) fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    if type_rank(a) != type_rank(b) {
        return None;
    }
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => Some(x.as_f64()?.total_cmp(&y.as_f64()?)),
        (Value::String(x), Value::String(y)) => {
            match (DateTime::parse_from_rfc3339(x), DateTime::parse_from_rfc3339(y)) {
                (Ok(x), Ok(y)) => Some(x.cmp(&y)),
                _ => Some(x.cmp(y)),
            }
        }
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

/// Total order for sorting: type class first, then value within the class.
/// Arrays and objects tie with their own class.
fn sort_order(a: &Value, b: &Value) -> Ordering {
    type_rank(a)
        .cmp(&type_rank(b))
        .then_with(|| compare_values(a, b).unwrap_or(Ordering::Equal))
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match compare_values(a, b) {
        Some(ord) => ord == Ordering::Equal,
        None => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().expect("test rows are objects")
    }

    fn sample_rows() -> Vec<Row> {
        vec![
            row(json!({"id": "a", "name": "장미", "stock": 3, "tags": ["red", "gift"],
                       "created_at": "2026-10-16T09:00:00+09:00"})),
            row(json!({"id": "b", "name": "튤립", "stock": 12, "tags": ["yellow"],
                       "created_at": "2026-10-15T23:30:00Z"})),
            row(json!({"id": "c", "name": "안개꽃", "stock": 25})),
            row(json!({"id": "d", "name": "수국", "stock": "unknown", "tags": ["gift"]})),
        ]
    }

    fn ids(rows: &[Row]) -> Vec<&str> {
        rows.iter()
            .map(|r| r.get("id").and_then(Value::as_str).unwrap_or_default())
            .collect()
    }

    #[test]
    fn test_filter_ops_deserialize_from_symbols() {
        let filter: MetricFilter =
            serde_json::from_str(r#"{"field":"stock","op":"<=","value":10}"#).unwrap();
        assert_eq!(filter.op, FilterOp::Le);
        let filter: MetricFilter =
            serde_json::from_str(r#"{"field":"tags","op":"array-contains","value":"gift"}"#)
                .unwrap();
        assert_eq!(filter.op, FilterOp::ArrayContains);
    }

    #[test]
    fn test_numeric_comparisons_skip_mismatched_types() {
        let q = DocumentQuery::collection("products").filter(MetricFilter::new(
            "stock",
            FilterOp::Lt,
            20,
        ));
        assert_eq!(ids(&q.apply(sample_rows())), vec!["a", "b"]);
    }

    #[test]
    fn test_timestamps_compare_as_instants() {
        // 2026-10-15T23:30Z is 08:30 on the 16th in +09:00
        let q = DocumentQuery::collection("products").filter(MetricFilter::new(
            "created_at",
            FilterOp::Ge,
            "2026-10-16T08:00:00+09:00",
        ));
        assert_eq!(ids(&q.apply(sample_rows())), vec!["a", "b"]);
    }

    #[test]
    fn test_membership_operators() {
        let rows = sample_rows();
        let in_q = DocumentQuery::collection("p").filter(MetricFilter::new(
            "name",
            FilterOp::In,
            json!(["장미", "수국"]),
        ));
        assert_eq!(ids(&in_q.apply(rows.clone())), vec!["a", "d"]);

        let not_in = DocumentQuery::collection("p").filter(MetricFilter::new(
            "name",
            FilterOp::NotIn,
            json!(["장미", "수국"]),
        ));
        assert_eq!(ids(&not_in.apply(rows.clone())), vec!["b", "c"]);

        let contains = DocumentQuery::collection("p").filter(MetricFilter::new(
            "tags",
            FilterOp::ArrayContains,
            "gift",
        ));
        assert_eq!(ids(&contains.apply(rows)), vec!["a", "d"]);
    }

    #[test]
    fn test_not_equal_excludes_rows_without_field() {
        let q = DocumentQuery::collection("p").filter(MetricFilter::new("tags", FilterOp::Ne, "x"));
        assert_eq!(q.apply(sample_rows()).len(), 3);
    }

    #[test]
    fn test_order_and_limit() {
        let q = DocumentQuery::collection("p")
            .order_by("stock", SortDirection::Desc)
            .limit(2);
        let result = q.apply(sample_rows().into_iter().take(3));
        assert_eq!(ids(&result), vec!["c", "b"]);

        let missing_field = DocumentQuery::collection("p").order_by("created_at", SortDirection::Asc);
        assert_eq!(ids(&missing_field.apply(sample_rows())), vec!["b", "a"]);
    }

    #[test]
    fn test_mixed_types_sort_by_type_class() {
        // numbers precede strings, whatever order the rows arrive in
        let asc = DocumentQuery::collection("p").order_by("stock", SortDirection::Asc);
        assert_eq!(ids(&asc.apply(sample_rows())), vec!["a", "b", "c", "d"]);

        let mut reversed = sample_rows();
        reversed.reverse();
        assert_eq!(ids(&asc.apply(reversed)), vec!["a", "b", "c", "d"]);

        let mut shuffled = sample_rows();
        shuffled.swap(0, 3);
        shuffled.swap(1, 2);
        let desc = DocumentQuery::collection("p").order_by("stock", SortDirection::Desc);
        assert_eq!(ids(&desc.apply(shuffled)), vec!["d", "c", "b", "a"]);
    }

    #[test]
    fn test_sort_order_is_transitive_across_types() {
        let three = json!(3);
        let twelve = json!(12);
        let unknown = json!("unknown");
        assert_eq!(sort_order(&three, &unknown), Ordering::Less);
        assert_eq!(sort_order(&unknown, &twelve), Ordering::Greater);
        assert_eq!(sort_order(&three, &twelve), Ordering::Less);
        assert_eq!(
            sort_order(&json!("2026-10-16T00:00:00+09:00"), &json!("apple")),
            Ordering::Less
        );
        assert_eq!(sort_order(&Value::Null, &json!(false)), Ordering::Less);
    }
}
