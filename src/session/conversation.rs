use std::collections::VecDeque;

use crate::models::{ChatMessage, MessageRole};

/// One client's ordered conversation history.
///
/// Messages are strictly append-ordered. Once the count exceeds `max_history`
/// the oldest entries are evicted first.
#[derive(Debug, Clone)]
pub struct ConversationSession {
    client_id: String,
    messages: VecDeque<ChatMessage>,
    max_history: usize,
}

impl ConversationSession {
    pub fn new(client_id: impl Into<String>, max_history: usize) -> Self {
        Self {
            client_id: client_id.into(),
            messages: VecDeque::new(),
            max_history: max_history.max(1),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Append a message, evicting from the front past the configured maximum
    pub fn append(&mut self, role: MessageRole, content: impl Into<String>) {
        self.messages.push_back(ChatMessage::new(role, content));
        while self.messages.len() > self.max_history {
            self.messages.pop_front();
        }
    }

    /// Read-only copy of the history, oldest first
    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.messages.iter().cloned().collect()
    }

    /// Empty the history; the session itself stays alive
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
