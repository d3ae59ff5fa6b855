use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use super::traits::ModelBackend;
use super::types::{BackendKind, ChatMessage, GenerationParams, Prompt};
use crate::constants::{HEALTH_CHECK_TIMEOUT_SECS, STOP_SEQUENCE};
use crate::utils::BackendError;

/// Backend for a local model daemon speaking the Ollama chat API
pub struct DaemonBackend {
    client: Client,
    base_url: String,
    model: String,
    display_name: String,
    params: GenerationParams,
}

impl DaemonBackend {
    pub fn new(
        base_url: &str,
        model: &str,
        params: GenerationParams,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Permanent(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            display_name: format!("daemon/{}", model),
            params,
        })
    }

    /// Models the daemon has pulled
    pub async fn list_models(&self) -> Result<Vec<String>, BackendError> {
        let health_client = Client::builder()
            .timeout(Duration::from_secs(HEALTH_CHECK_TIMEOUT_SECS))
            .build()?;

        let response = health_client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::from_status(status, &body));
        }

        let tags: TagsResponse = response.json().await?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

#[async_trait]
impl ModelBackend for DaemonBackend {
    async fn generate(
        &self,
        prompt: &Prompt,
        history: &[ChatMessage],
    ) -> Result<String, BackendError> {
        let request_body = json!({
            "model": self.model,
            "messages": prompt.to_role_messages(history),
            "stream": false,
            "options": {
                "num_predict": self.params.max_new_tokens,
                "temperature": self.params.temperature,
                "top_p": self.params.top_p,
                "stop": [STOP_SEQUENCE],
            }
        });

        let url = format!("{}/api/chat", self.base_url);
        debug!(url = %url, model = %self.model, "Sending chat request to model daemon");

        let response = self
            .client
            .post(&url)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| match BackendError::from(e) {
                BackendError::Transient(msg) => BackendError::Transient(format!(
                    "cannot reach model daemon at {}: {}",
                    self.base_url, msg
                )),
                other => other,
            })?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(BackendError::from_status(status, &body));
        }

        parse_chat_body(&body)
    }

    fn name(&self) -> &str {
        &self.display_name
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Daemon
    }

    async fn validate_connection(&self) -> Result<bool, BackendError> {
        let models = self.list_models().await?;
        // "llama3.1" matches "llama3.1:latest"
        Ok(models
            .iter()
            .any(|name| name == &self.model || name.split(':').next() == Some(self.model.as_str())))
    }
}

/// Parse a non-streaming reply, tolerating a daemon that streamed NDJSON anyway
fn parse_chat_body(body: &str) -> Result<String, BackendError> {
    if let Ok(parsed) = serde_json::from_str::<ChatResponse>(body) {
        return Ok(parsed.message.content);
    }

    let last_line = body
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or_default();

    serde_json::from_str::<ChatResponse>(last_line)
        .map(|parsed| parsed.message.content)
        .map_err(|e| {
            let preview: String = body.chars().take(200).collect();
            BackendError::Permanent(format!("unparseable daemon response ({}): {}", e, preview))
        })
}

// Response structures for the daemon chat API

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}
