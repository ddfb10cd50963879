use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// One known collection and what its fields mean
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub description: String,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

/// Static description of the data the model may ask about.
///
/// Handed to the prompt verbatim; it is never checked against stored documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaCatalog {
    pub collections: BTreeMap<String, CollectionSchema>,
}

impl SchemaCatalog {
    /// Load the catalog from YAML (or JSON) at `path`, falling back to the
    /// built-in catalog when the file is absent or unreadable
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                tracing::info!(
                    "Schema catalog not readable at {}: {} - using built-in catalog",
                    path.display(),
                    e
                );
                return Self::fallback();
            }
        };

        match serde_yaml::from_str::<SchemaCatalog>(&contents) {
            Ok(catalog) if !catalog.collections.is_empty() => {
                tracing::info!(
                    "Loaded schema catalog with {} collections from {}",
                    catalog.collections.len(),
                    path.display()
                );
                catalog
            }
            Ok(_) => {
                tracing::warn!("Schema catalog at {} is empty - using built-in catalog", path.display());
                Self::fallback()
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to parse schema catalog {}: {} - using built-in catalog",
                    path.display(),
                    e
                );
                Self::fallback()
            }
        }
    }

    pub fn fallback() -> Self {
        let mut collections = BTreeMap::new();
        collections.insert(
            "users".to_string(),
            collection(
                "가입한 회원 목록",
                &[
                    ("id", "문서 ID"),
                    ("name", "회원 이름"),
                    ("plan", "구독 요금제 (basic, premium)"),
                    ("created_at", "가입 시각 (RFC 3339)"),
                ],
            ),
        );
        collections.insert(
            "orders".to_string(),
            collection(
                "주문 및 결제 내역",
                &[
                    ("id", "문서 ID"),
                    ("user_id", "주문한 회원 ID"),
                    ("amount", "결제 금액 (원), 미결제 주문은 비어 있음"),
                    ("status", "주문 상태 (paid, pending)"),
                    ("created_at", "주문 시각 (RFC 3339)"),
                ],
            ),
        );
        collections.insert(
            "products".to_string(),
            collection(
                "판매 중인 상품",
                &[
                    ("id", "문서 ID"),
                    ("name", "상품 이름"),
                    ("category", "분류 (bouquet, pot, basket, single)"),
                    ("price", "판매 가격 (원)"),
                    ("stock", "남은 재고 수량"),
                    ("sales_count", "누적 판매 수량"),
                    ("created_at", "등록 시각 (RFC 3339)"),
                ],
            ),
        );
        Self { collections }
    }

    /// Render the catalog as a plain-text hint for the model
    pub fn prompt_hint(&self) -> String {
        let mut hint = String::from("사용 가능한 데이터 컬렉션:");
        for (name, schema) in &self.collections {
            hint.push_str(&format!("\n- {name}: {}", schema.description));
            for (field, description) in &schema.fields {
                hint.push_str(&format!("\n  - {field}: {description}"));
            }
        }
        hint
    }
}

fn collection(description: &str, fields: &[(&str, &str)]) -> CollectionSchema {
    CollectionSchema {
        description: description.to_string(),
        fields: fields
            .iter()
            .map(|(name, desc)| (name.to_string(), desc.to_string()))
            .collect(),
    }
}
