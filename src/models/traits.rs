use async_trait::async_trait;

use super::types::{BackendKind, ChatMessage, Prompt};
use crate::utils::BackendError;

/// Core trait that all model backends must implement.
///
/// Implementations hold nothing but their connection handle, so one instance is
/// shared by every connection and may be called concurrently.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Generate the assistant reply for `prompt`, given the prior turns
    async fn generate(&self, prompt: &Prompt, history: &[ChatMessage])
        -> Result<String, BackendError>;

    /// Human-readable name, e.g. "daemon/llama3.1"
    fn name(&self) -> &str;

    /// Which backend family this is
    fn kind(&self) -> BackendKind;

    /// Check that the underlying engine is reachable
    async fn validate_connection(&self) -> Result<bool, BackendError> {
        Ok(true)
    }
}
