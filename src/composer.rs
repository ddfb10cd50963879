use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::error::{DashboardError, Result};
use crate::models::GenerateContentRequest;
use crate::transport::Transport;

const ANALYST_PREAMBLE: &str = "당신은 데이터 분석 전문가입니다. 사용자의 질문에 친근하고 정확하게 답변해주세요.
특히 가입자 수, 매출, 상품 재고 같은 비즈니스 데이터 질문에는 전문적인 분석을 덧붙여 주세요.
답변은 한국어로 해주세요.";

pub const NOT_CONFIGURED: &str = "❌ Gemini API가 설정되지 않았습니다. API 키를 확인해주세요.";

/// Turns a question (plus optional reference data) into the model's reply.
/// Failures are returned as a `❌`-prefixed message, never as an error.
#[async_trait]
pub trait Composer: Send + Sync {
    fn is_connected(&self) -> bool;

    async fn compose(&self, question: &str, context: Option<&str>) -> String;

    /// Structured analysis of `data`: insights, numbers, recommendations
    async fn analyze(&self, data: &Value, question: &str) -> String;
}

pub fn build_prompt(question: &str, context: Option<&str>) -> String {
    let mut prompt = ANALYST_PREAMBLE.to_string();
    if let Some(context) = context.filter(|c| !c.trim().is_empty()) {
        prompt.push_str("\n\n참고 데이터:\n");
        prompt.push_str(context);
    }
    prompt.push_str("\n\n사용자 질문: ");
    prompt.push_str(question);
    prompt
}

pub fn build_analysis_prompt(data: &Value, question: &str) -> String {
    format!(
        "데이터 분석 전문가로서 다음 데이터를 분석하고 질문에 답변해주세요.

데이터: {data}
질문: {question}

분석 결과를 다음 형식으로 제공해주세요:
1. 핵심 인사이트
2. 구체적인 수치 분석
3. 추천사항 (있다면)

답변은 한국어로 해주세요."
    )
}

pub struct GeminiComposer {
    tx: Arc<dyn Transport>,
    model: String,
}

impl GeminiComposer {
    pub fn new(tx: Arc<dyn Transport>, model: String) -> Self {
        Self { tx, model }
    }

    async fn generate(&self, prompt: String) -> Result<String> {
        let request = GenerateContentRequest::from_prompt(prompt);
        let response = self.tx.generate(&self.model, &request).await?;
        response.text().ok_or_else(|| {
            DashboardError::Gemini("Gemini API returned no candidates".to_string())
        })
    }
}

#[async_trait]
impl Composer for GeminiComposer {
    fn is_connected(&self) -> bool {
        true
    }

    async fn compose(&self, question: &str, context: Option<&str>) -> String {
        tracing::info!("Composing answer with {} for question: {}", self.model, question);
        match self.generate(build_prompt(question, context)).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Gemini compose failed: {}", e);
                format!("❌ AI 응답 생성 중 오류가 발생했습니다: {e}")
            }
        }
    }

    async fn analyze(&self, data: &Value, question: &str) -> String {
        tracing::info!("Running data analysis with {} for question: {}", self.model, question);
        match self.generate(build_analysis_prompt(data, question)).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Gemini analysis failed: {}", e);
                format!("❌ 데이터 분석 중 오류가 발생했습니다: {e}")
            }
        }
    }
}

/// Stand-in used when no API key is configured
pub struct UnconfiguredComposer;

#[async_trait]
impl Composer for UnconfiguredComposer {
    fn is_connected(&self) -> bool {
        false
    }

    async fn compose(&self, _question: &str, _context: Option<&str>) -> String {
        NOT_CONFIGURED.to_string()
    }

    async fn analyze(&self, _data: &Value, _question: &str) -> String {
        NOT_CONFIGURED.to_string()
    }
}
