/// Session management module - Gateway

mod conversation;
mod registry;

pub use conversation::ConversationSession;
pub use registry::{SessionHandle, SessionRegistry};
