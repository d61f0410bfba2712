use crate::error::{MosaicError, Result};
use async_trait::async_trait;
use tracing::warn;

/// Narrow completion interface: prompt in, text out. The SQL generator only
/// depends on this, so tests can plug in a deterministic stub instead of a
/// live model.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// OpenAI-compatible chat-completions client.
#[derive(Clone)]
pub struct LlmClient {
    api_key: String,
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl LlmClient {
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self {
            api_key,
            base_url,
            model,
            client: reqwest::Client::new(),
        }
    }

    async fn call_llm(&self, prompt: &str) -> Result<String> {
        // Temperature 0 for reproducible SQL on identical inputs.
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "user", "content": prompt}
            ],
            "temperature": 0.0,
        });

        // Use max_completion_tokens for newer models, max_tokens for older ones.
        // Reasoning models need headroom for reasoning tokens.
        if self.model.starts_with("gpt-5") || self.model.contains("o1") {
            body["max_completion_tokens"] = serde_json::json!(2000);
        } else if self.model.starts_with("gpt-4") {
            body["max_completion_tokens"] = serde_json::json!(500);
        } else {
            body["max_tokens"] = serde_json::json!(500);
        }

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| MosaicError::Generation(format!("LLM API call failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(MosaicError::Generation(format!(
                "LLM API error ({}): {}",
                status, error_text
            )));
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| MosaicError::Generation(format!("Failed to parse LLM response: {}", e)))?;

        if let Some(error) = response_json.get("error") {
            return Err(MosaicError::Generation(format!(
                "LLM API error: {}",
                serde_json::to_string(error).unwrap_or_else(|_| "Unknown error".to_string())
            )));
        }

        let choices = response_json
            .get("choices")
            .and_then(|c| c.as_array())
            .ok_or_else(|| {
                MosaicError::Generation("No choices array in LLM response".to_string())
            })?;

        if choices.is_empty() {
            return Err(MosaicError::Generation(
                "Empty choices array in LLM response".to_string(),
            ));
        }

        if let Some(finish_reason) = choices[0].get("finish_reason").and_then(|r| r.as_str()) {
            if finish_reason == "length" {
                warn!("LLM response was truncated due to length limit");
            } else if finish_reason == "content_filter" {
                return Err(MosaicError::Generation(
                    "LLM response was filtered by content policy".to_string(),
                ));
            }
        }

        let content = choices[0]["message"]["content"].as_str().ok_or_else(|| {
            MosaicError::Generation("No content in LLM response".to_string())
        })?;

        if content.is_empty() {
            return Err(MosaicError::Generation(
                "Empty content in LLM response".to_string(),
            ));
        }

        Ok(content.to_string())
    }
}

#[async_trait]
impl CompletionBackend for LlmClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.call_llm(prompt).await
    }
}
