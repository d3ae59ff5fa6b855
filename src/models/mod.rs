// Gateway module for models - follows the Train Station Pattern
// All external access must go through this gateway

// Private submodules - not directly accessible from outside
mod daemon;
mod embedded;
mod factory;
mod hosted;
mod traits;
mod types;

// Public re-exports - the ONLY way to access model functionality
pub use daemon::DaemonBackend;
pub use embedded::{EmbeddedBackend, InferenceEngine, LlamaCliEngine};
pub use factory::ModelFactory;
pub use hosted::HostedApiBackend;
pub use traits::ModelBackend;
#[cfg(test)]
pub use traits::MockModelBackend;
pub use types::{BackendKind, ChatMessage, GenerationParams, MessageRole, Prompt};
