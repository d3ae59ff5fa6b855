use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::runtime::{ChatReply, ReplyKind};

/// Frames a client may send
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Chat {
        #[serde(default)]
        content: String,
        #[serde(default)]
        category: Option<String>,
    },
    Clear,
    #[serde(other)]
    Unknown,
}

/// Frames the server emits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    Chat { content: String },
    Status { content: String },
}

impl ServerFrame {
    pub fn status(content: impl Into<String>) -> Self {
        Self::Status {
            content: content.into(),
        }
    }
}

impl From<ChatReply> for ServerFrame {
    fn from(reply: ChatReply) -> Self {
        match reply.kind {
            ReplyKind::Chat => Self::Chat {
                content: reply.content,
            },
            ReplyKind::Status | ReplyKind::Error => Self::Status {
                content: reply.content,
            },
        }
    }
}

/// Outcome of decoding one text frame
#[derive(Debug, PartialEq)]
pub enum Decoded {
    Frame(ClientFrame),
    /// Well-formed JSON with a `type` we do not handle
    UnknownType(String),
    Invalid(String),
}

pub fn decode(text: &str) -> Decoded {
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => return Decoded::Invalid(e.to_string()),
    };

    let declared = value
        .get("type")
        .and_then(Value::as_str)
        .map(str::to_string);

    match serde_json::from_value::<ClientFrame>(value) {
        Ok(ClientFrame::Unknown) => Decoded::UnknownType(declared.unwrap_or_default()),
        Ok(frame) => Decoded::Frame(frame),
        Err(e) => Decoded::Invalid(e.to_string()),
    }
}
