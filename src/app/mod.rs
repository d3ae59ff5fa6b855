// Gateway module for app - follows the Train Station Pattern
// All external access must go through this gateway

// Private submodules - not directly accessible from outside
mod config;
mod resolver;
mod state;

// Public re-exports - the ONLY way to access app functionality
pub use config::{
    apply_environment_signals, get_config_dir, init_config, load_config, render_config, save_config,
    ApiKey, BackendConfig, ChatConfig, Config, DeploymentMode, KnowledgeConfig, ServerConfig,
};
pub use resolver::BackendSelection;
pub use state::AppState;
