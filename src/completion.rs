//! Answer generation through the OpenAI chat completions API.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::config::CompletionConfig;
use crate::error::{ChatError, ChatResult};
use crate::traits::ChatModel;

pub struct OpenAIChat {
    client: reqwest::Client,
    api_key: String,
    model: String,
    temperature: f64,
    url: String,
}

impl OpenAIChat {
    pub fn new(config: &CompletionConfig, api_key: &str) -> ChatResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ChatError::Configuration(format!("completion client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            url: format!("{}/chat/completions", config.api_base.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl ChatModel for OpenAIChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system: &str, user: &str) -> ChatResult<String> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
        });

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChatError::invocation(format!("completion request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(ChatError::Invocation(format!(
                "OpenAI completion error {}: {}",
                status, body_text
            )));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| ChatError::invocation(format!("completion response: {}", e)))?;
        parse_completion(&json)
    }
}

fn parse_completion(json: &Value) -> ChatResult<String> {
    json.get("choices")
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|msg| msg.get("content"))
        .and_then(|c| c.as_str())
        .map(|c| c.trim().to_string())
        .ok_or_else(|| ChatError::invocation("Completion response is missing message content"))
}
