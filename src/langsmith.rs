//! LangSmith client: run tracing and feedback capture.
//!
//! One [`LangSmithClient`] serves both seams. Each chain invocation becomes a
//! `chain` run posted under the configured project, and feedback is attached
//! to a run id. The same id is the session's correlation id.
//!
//! | Call | Endpoint |
//! |------|----------|
//! | start run | `POST {api_url}/runs` |
//! | end run | `PATCH {api_url}/runs/{id}` |
//! | feedback | `POST {api_url}/feedback` |

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use std::time::Duration;
use uuid::Uuid;

use crate::config::{Credentials, TracingConfig};
use crate::error::{ChatError, ChatResult};
use crate::traits::{FeedbackService, RunTracer};

pub struct LangSmithClient {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    project: String,
}

impl LangSmithClient {
    pub fn new(config: &TracingConfig, credentials: &Credentials) -> ChatResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ChatError::Configuration(format!("tracing client: {}", e)))?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: credentials.tracing_api_key.clone(),
            project: credentials.project.clone(),
        })
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value, String> {
        let response = request
            .header("x-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(format!("LangSmith error {}: {}", status, body_text));
        }

        // Run endpoints may answer with an empty body.
        let text = response.text().await.map_err(|e| e.to_string())?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| e.to_string())
    }
}

#[async_trait]
impl RunTracer for LangSmithClient {
    async fn start_run(&self, run_id: Uuid, name: &str, inputs: Value) -> ChatResult<()> {
        let body = start_run_body(run_id, name, inputs, &self.project);
        self.send(self.client.post(format!("{}/runs", self.api_url)).json(&body))
            .await
            .map(|_| ())
            .map_err(ChatError::Invocation)
    }

    async fn end_run(&self, run_id: Uuid, outcome: Result<Value, String>) -> ChatResult<()> {
        let body = end_run_body(outcome);
        self.send(
            self.client
                .patch(format!("{}/runs/{}", self.api_url, run_id))
                .json(&body),
        )
        .await
        .map(|_| ())
        .map_err(ChatError::Invocation)
    }
}

#[async_trait]
impl FeedbackService for LangSmithClient {
    async fn create_feedback(
        &self,
        run_id: Uuid,
        key: &str,
        score: f64,
        comment: Option<&str>,
    ) -> ChatResult<String> {
        let body = feedback_body(Uuid::new_v4(), run_id, key, score, comment);
        let json = self
            .send(self.client.post(format!("{}/feedback", self.api_url)).json(&body))
            .await
            .map_err(ChatError::FeedbackService)?;

        json.get("id")
            .and_then(|id| id.as_str())
            .map(str::to_string)
            .ok_or_else(|| ChatError::FeedbackService("feedback response has no id".into()))
    }
}

fn start_run_body(run_id: Uuid, name: &str, inputs: Value, project: &str) -> Value {
    json!({
        "id": run_id,
        "name": name,
        "run_type": "chain",
        "inputs": inputs,
        "start_time": Utc::now().to_rfc3339(),
        "session_name": project,
    })
}

fn end_run_body(outcome: Result<Value, String>) -> Value {
    let end_time = Utc::now().to_rfc3339();
    match outcome {
        Ok(outputs) => json!({ "outputs": outputs, "end_time": end_time }),
        Err(error) => json!({ "error": error, "end_time": end_time }),
    }
}

fn feedback_body(
    feedback_id: Uuid,
    run_id: Uuid,
    key: &str,
    score: f64,
    comment: Option<&str>,
) -> Value {
    json!({
        "id": feedback_id,
        "run_id": run_id,
        "key": key,
        "score": score,
        "comment": comment,
    })
}
