use async_trait::async_trait;
use reqwest::Client;

use crate::error::{DashboardError, Result};
use crate::models::{GenerateContentRequest, GenerateContentResponse};

#[async_trait]
pub trait Transport: Send + Sync {
    async fn generate(
        &self,
        model: &str,
        req: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse>;
}

/// Gemini `generateContent` over HTTPS. A single attempt per call.
pub struct GeminiTransport {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiTransport {
    pub fn new(api_key: String, base_url: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(DashboardError::Config("GEMINI_API_KEY is empty".to_string()));
        }
        Ok(Self {
            client: Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }
}

#[async_trait]
impl Transport for GeminiTransport {
    async fn generate(
        &self,
        model: &str,
        req: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        let response = self
            .client
            .post(self.endpoint(model))
            .query(&[("key", self.api_key.as_str())])
            .header("Content-Type", "application/json")
            .json(req)
            .send()
            .await
            .map_err(|e| {
                DashboardError::Gemini(format!("Failed to send request to Gemini API: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(DashboardError::Gemini(format!("HTTP {status}: {body}")));
        }

        response.json().await.map_err(|e| {
            DashboardError::Gemini(format!("Failed to parse Gemini API response: {e}"))
        })
    }
}
