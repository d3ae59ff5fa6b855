use std::sync::Arc;

use crate::app::{Config, DeploymentMode};
use crate::knowledge::KnowledgeStore;
use crate::models::ModelBackend;
use crate::runtime::{ChatOrchestrator, OrchestratorSettings};
use crate::session::SessionRegistry;

/// Shared application state handed to every connection and HTTP handler
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<ChatOrchestrator>,
    pub sessions: Arc<SessionRegistry>,
    pub knowledge: Arc<KnowledgeStore>,
    pub deployment_mode: DeploymentMode,
    /// Keep history after a client disconnects
    pub retain_sessions: bool,
}

impl AppState {
    /// Wire the orchestrator to an already-built backend and knowledge store
    pub fn new(
        config: &Config,
        backend: Arc<dyn ModelBackend>,
        knowledge: Arc<KnowledgeStore>,
    ) -> Self {
        let sessions = Arc::new(SessionRegistry::new(config.chat.max_history));
        let orchestrator = Arc::new(ChatOrchestrator::new(
            backend,
            knowledge.clone(),
            sessions.clone(),
            OrchestratorSettings::from_config(config),
        ));

        Self {
            orchestrator,
            sessions,
            knowledge,
            deployment_mode: config.deployment_mode,
            retain_sessions: config.server.retain_sessions_on_disconnect,
        }
    }

    pub fn backend_name(&self) -> &str {
        self.orchestrator.backend_name()
    }
}
