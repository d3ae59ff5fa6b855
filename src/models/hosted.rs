use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

use super::traits::ModelBackend;
use super::types::{BackendKind, ChatMessage, GenerationParams, MessageRole, Prompt};
use crate::app::ApiKey;
use crate::constants::HEALTH_CHECK_TIMEOUT_SECS;
use crate::utils::BackendError;

const INST_CLOSE: &str = "[/INST]";

/// Backend for a hosted text-generation inference API
pub struct HostedApiBackend {
    client: Client,
    model_url: String,
    api_key: ApiKey,
    display_name: String,
    params: GenerationParams,
}

impl HostedApiBackend {
    pub fn new(
        api_url: &str,
        model: &str,
        api_key: ApiKey,
        params: GenerationParams,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Permanent(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            model_url: format!("{}/{}", api_url.trim_end_matches('/'), model),
            api_key,
            display_name: format!("hosted/{}", model),
            params,
        })
    }
}

#[async_trait]
impl ModelBackend for HostedApiBackend {
    async fn generate(
        &self,
        prompt: &Prompt,
        history: &[ChatMessage],
    ) -> Result<String, BackendError> {
        let request_body = json!({
            "inputs": render_instruct(prompt, history),
            "parameters": {
                "max_new_tokens": self.params.max_new_tokens,
                "temperature": self.params.temperature,
                "top_p": self.params.top_p,
                "repetition_penalty": self.params.repetition_penalty,
                "do_sample": true,
                "return_full_text": false,
            }
        });

        debug!(url = %self.model_url, "Sending generation request to hosted API");

        let response = self
            .client
            .post(&self.model_url)
            .bearer_auth(self.api_key.expose())
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::from_status(status, &body));
        }

        let result: Value = response.json().await?;
        extract_generated_text(&result).ok_or_else(|| {
            warn!(response = %result, "Unrecognized hosted API response shape");
            BackendError::Permanent("unrecognized response from hosted API".to_string())
        })
    }

    fn name(&self) -> &str {
        &self.display_name
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Hosted
    }

    async fn validate_connection(&self) -> Result<bool, BackendError> {
        let health_client = Client::builder()
            .timeout(Duration::from_secs(HEALTH_CHECK_TIMEOUT_SECS))
            .build()?;

        let response = health_client
            .head(&self.model_url)
            .bearer_auth(self.api_key.expose())
            .send()
            .await?;

        Ok(response.status().is_success())
    }
}

/// Llama-2 style instruct rendering of the whole conversation
fn render_instruct(prompt: &Prompt, history: &[ChatMessage]) -> String {
    let mut text = format!("<s>[INST] {} {}</s>\n", prompt.instructions, INST_CLOSE);
    for msg in history {
        match msg.role {
            MessageRole::User => text.push_str(&format!("<s>[INST] {} {}", msg.content, INST_CLOSE)),
            MessageRole::Assistant => text.push_str(&format!(" {}</s>\n", msg.content)),
        }
    }
    text.push_str(&format!("<s>[INST] {} {}", prompt.message, INST_CLOSE));
    text
}

/// Pull the generated text out of any of the response shapes the API uses
fn extract_generated_text(result: &Value) -> Option<String> {
    let text = match result {
        Value::String(s) => s.clone(),
        Value::Array(items) => match items.first()? {
            Value::String(s) => s.clone(),
            Value::Object(obj) => obj.get("generated_text")?.as_str()?.to_string(),
            _ => return None,
        },
        Value::Object(obj) => obj.get("generated_text")?.as_str()?.to_string(),
        _ => return None,
    };

    Some(strip_prompt_echo(&text))
}

/// Drop anything up to a leaked instruction marker
fn strip_prompt_echo(text: &str) -> String {
    match text.rsplit_once(INST_CLOSE) {
        Some((_, reply)) => reply.trim().to_string(),
        None => text.trim().to_string(),
    }
}
