//! Language model providers.
//!
//! Generation is a single request/response call. Gemini is the only
//! remote provider; tests plug in scripted models through [`LanguageModel`].

use std::future::Future;

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, error};

use campusdesk_core::{Error, Result};

use crate::config::GenerationConfig;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Text in, text out.
pub trait LanguageModel: Send + Sync {
    /// Generate a completion. Rate limiting surfaces as [`Error::Quota`].
    fn generate(&self, prompt: &str) -> impl Future<Output = Result<String>> + Send;
}

/// Gemini `generateContent` client.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: GEMINI_BASE_URL.to_string(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }

    pub fn from_config(config: &GenerationConfig) -> Result<Self> {
        Ok(Self::new(config.model.clone(), config.require_api_key()?))
    }

    /// Point at a different API host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

impl LanguageModel for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = json!({
            "contents": [{"role": "user", "parts": [{"text": prompt}]}],
        });

        debug!("Generating with model {}", self.model);

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Generation(format!("Request failed: {}", e)))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Quota(api_message(&body).unwrap_or(body)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Gemini error {}: {}", status, body);
            return Err(Error::Generation(format!(
                "API error {}: {}",
                status,
                api_message(&body).unwrap_or(body)
            )));
        }

        let parsed: Value = response
            .json()
            .await
            .map_err(|e| Error::Generation(format!("Invalid response: {}", e)))?;
        Ok(response_text(&parsed))
    }
}

/// Concatenated text parts of the first candidate; empty if there are none
/// (for instance when the response was blocked).
pub fn response_text(response: &Value) -> String {
    response["candidates"][0]["content"]["parts"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p["text"].as_str())
                .collect::<String>()
        })
        .unwrap_or_default()
}

fn api_message(body: &str) -> Option<String> {
    let parsed: Value = serde_json::from_str(body).ok()?;
    parsed["error"]["message"].as_str().map(str::to_string)
}
