use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::query::MetricFilter;

/// A stored document; rows returned by a store always carry `id`
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Reduction applied over a filtered row set.
///
/// Kinds arrive as plain strings on the wire, so anything unrecognised is kept
/// as `Unsupported` and reported by the aggregator instead of failing to parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AggregationKind {
    Count,
    Sum,
    Avg,
    Max,
    Min,
    Unsupported(String),
}

impl AggregationKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Count => "count",
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Max => "max",
            Self::Min => "min",
            Self::Unsupported(raw) => raw,
        }
    }
}

impl From<String> for AggregationKind {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "count" => Self::Count,
            "sum" => Self::Sum,
            "avg" => Self::Avg,
            "max" => Self::Max,
            "min" => Self::Min,
            _ => Self::Unsupported(raw),
        }
    }
}

impl From<AggregationKind> for String {
    fn from(kind: AggregationKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for AggregationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationRequest {
    pub collection: String,
    pub kind: AggregationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default)]
    pub filters: Vec<MetricFilter>,
}

impl AggregationRequest {
    pub fn count(collection: &str) -> Self {
        Self {
            collection: collection.to_string(),
            kind: AggregationKind::Count,
            field: None,
            filters: Vec::new(),
        }
    }

    pub fn over(collection: &str, kind: AggregationKind, field: &str) -> Self {
        Self {
            collection: collection.to_string(),
            kind,
            field: Some(field.to_string()),
            filters: Vec::new(),
        }
    }

    pub fn with_filter(mut self, filter: MetricFilter) -> Self {
        self.filters.push(filter);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationResult {
    pub result: f64,
    pub kind: AggregationKind,
    /// Rows (count) or numeric values (other kinds) that fed the result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AggregationResult {
    pub fn failed(kind: AggregationKind, error: impl Into<String>) -> Self {
        Self {
            result: 0.0,
            kind,
            count: None,
            error: Some(error.into()),
        }
    }
}

/// Question/answer pair persisted by the conversation log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaRecord {
    pub id: String,
    pub user_id: String,
    pub query: String,
    pub response: String,
    pub timestamp: DateTime<Utc>,
}

impl QaRecord {
    pub fn new(user_id: &str, query: &str, response: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            query: query.to_string(),
            response: response.to_string(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryStatistics {
    pub total_queries: u64,
    pub today_queries: u64,
}

// Gemini generateContent request format
#[derive(Debug, Serialize, Clone)]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
}

impl GenerateContentRequest {
    pub fn from_prompt(prompt: String) -> Self {
        Self {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part { text: prompt }],
            }],
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Part {
    #[serde(default)]
    pub text: String,
}

// Gemini generateContent response format
#[derive(Debug, Deserialize, Default)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    pub content: Option<Content>,
}

impl GenerateContentResponse {
    /// Text of the first candidate with its parts joined
    pub fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content.parts.iter().map(|p| p.text.as_str()).collect();
        Some(text)
    }
}
