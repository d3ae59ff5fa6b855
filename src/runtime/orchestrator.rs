use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::messages::{ChatReply, ChatRequest};
use crate::app::Config;
use crate::knowledge::{format_for_prompt, KnowledgeStore};
use crate::models::{ChatMessage, MessageRole, ModelBackend, Prompt};
use crate::session::SessionRegistry;
use crate::utils::{BackendError, ChatError};

/// Lifecycle of a single chat request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Received,
    Augmented,
    Dispatched,
    Replied,
    Failed,
}

/// Knobs the orchestrator needs from configuration
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub system_prompt: String,
    pub knowledge_items: usize,
    pub request_timeout: Duration,
    pub retry_delay: Duration,
}

impl OrchestratorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            system_prompt: config.chat.system_prompt.clone(),
            knowledge_items: config.chat.knowledge_items,
            request_timeout: Duration::from_secs(config.backend.request_timeout_secs),
            retry_delay: Duration::from_millis(config.backend.retry_delay_ms),
        }
    }
}

/// Turns one inbound message into one reply: session lookup, knowledge
/// augmentation, backend dispatch with a single retry on transient failure,
/// and history bookkeeping.
pub struct ChatOrchestrator {
    backend: Arc<dyn ModelBackend>,
    knowledge: Arc<KnowledgeStore>,
    sessions: Arc<SessionRegistry>,
    settings: OrchestratorSettings,
}

impl ChatOrchestrator {
    pub fn new(
        backend: Arc<dyn ModelBackend>,
        knowledge: Arc<KnowledgeStore>,
        sessions: Arc<SessionRegistry>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            backend,
            knowledge,
            sessions,
            settings,
        }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    /// Process a request and always produce something to send back
    pub async fn respond(&self, request: &ChatRequest) -> ChatReply {
        match self.handle(request).await {
            Ok(reply) => reply,
            Err(err) => ChatReply::from_error(&err),
        }
    }

    /// Process a request.
    ///
    /// Empty content is rejected before the session is touched. Otherwise the
    /// user message is always recorded; the assistant reply only on success.
    pub async fn handle(&self, request: &ChatRequest) -> Result<ChatReply, ChatError> {
        let client_id = request.client_id.as_str();
        trace_state(client_id, RequestState::Received);

        if request.content.trim().is_empty() {
            return Err(ChatError::validation("message content must not be empty"));
        }

        let session = self.sessions.get_or_create(client_id);
        let history = session.lock().snapshot();

        let prompt = self.build_prompt(&request.content, request.category.as_deref());
        trace_state(client_id, RequestState::Augmented);

        trace_state(client_id, RequestState::Dispatched);
        let outcome = self.dispatch(client_id, &prompt, &history).await;

        let mut conversation = session.lock();
        conversation.append(MessageRole::User, request.content.clone());

        match outcome {
            Ok(reply) => {
                conversation.append(MessageRole::Assistant, reply.clone());
                trace_state(client_id, RequestState::Replied);
                Ok(ChatReply::chat(reply))
            }
            Err(err) => {
                trace_state(client_id, RequestState::Failed);
                warn!(client_id = %client_id, error = %err, "Chat request failed");
                Err(err.into())
            }
        }
    }

    /// Preamble plus selected knowledge, and the new message
    pub fn build_prompt(&self, message: &str, category: Option<&str>) -> Prompt {
        let items = self
            .knowledge
            .select_for_prompt(category, self.settings.knowledge_items);
        let knowledge_block = format_for_prompt(&items);

        let instructions = if knowledge_block.is_empty() {
            self.settings.system_prompt.clone()
        } else {
            format!("{}\n\n{}", self.settings.system_prompt, knowledge_block)
        };

        Prompt::new(instructions, message)
    }

    async fn dispatch(
        &self,
        client_id: &str,
        prompt: &Prompt,
        history: &[ChatMessage],
    ) -> Result<String, BackendError> {
        match self.attempt(prompt, history).await {
            Err(err) if err.is_transient() => {
                info!(
                    client_id = %client_id,
                    error = %err,
                    delay_ms = self.settings.retry_delay.as_millis() as u64,
                    "Transient backend failure, retrying once"
                );
                tokio::time::sleep(self.settings.retry_delay).await;
                self.attempt(prompt, history).await
            }
            outcome => outcome,
        }
    }

    /// One backend call under the fixed deadline
    async fn attempt(&self, prompt: &Prompt, history: &[ChatMessage]) -> Result<String, BackendError> {
        let deadline = self.settings.request_timeout;
        match tokio::time::timeout(deadline, self.backend.generate(prompt, history)).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::Transient(format!(
                "no response within {}s",
                deadline.as_secs_f32()
            ))),
        }
    }
}

fn trace_state(client_id: &str, state: RequestState) {
    debug!(client_id = %client_id, state = ?state, "Chat request state");
}
