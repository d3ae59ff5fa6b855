pub mod app;
pub mod cli;
pub mod constants;
pub mod knowledge;
pub mod models;
pub mod runtime;
pub mod server;
pub mod session;
pub mod utils;

pub use app::{load_config, AppState, BackendSelection, Config};
pub use knowledge::KnowledgeStore;
pub use models::{ModelBackend, ModelFactory};
pub use runtime::ChatOrchestrator;
pub use utils::{BackendError, ChatError};
