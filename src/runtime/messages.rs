use crate::utils::ChatError;

/// Inbound chat turn from one client
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub client_id: String,
    pub content: String,
    /// Exact-match knowledge category hint
    pub category: Option<String>,
}

impl ChatRequest {
    pub fn new(client_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            content: content.into(),
            category: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    Chat,
    Status,
    Error,
}

/// What goes back to the client for one event
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub kind: ReplyKind,
    pub content: String,
}

impl ChatReply {
    pub fn chat(content: impl Into<String>) -> Self {
        Self {
            kind: ReplyKind::Chat,
            content: content.into(),
        }
    }

    pub fn status(content: impl Into<String>) -> Self {
        Self {
            kind: ReplyKind::Status,
            content: content.into(),
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            kind: ReplyKind::Error,
            content: content.into(),
        }
    }

    /// User-facing rendering of a failed request
    pub fn from_error(err: &ChatError) -> Self {
        match err {
            ChatError::Validation(msg) => Self::error(msg.clone()),
            ChatError::Backend(e) if e.is_transient() => Self::error(format!(
                "The model is temporarily unavailable, please try again: {}",
                e.message()
            )),
            ChatError::Backend(e) => Self::error(format!(
                "Sorry, an error occurred while generating a response: {}",
                e.message()
            )),
            other => Self::error(format!("Internal error: {}", other)),
        }
    }
}
