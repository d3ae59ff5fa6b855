/// Chat orchestration module - Gateway
mod messages;
mod orchestrator;

pub use messages::{ChatReply, ChatRequest, ReplyKind};
pub use orchestrator::{ChatOrchestrator, OrchestratorSettings, RequestState};
