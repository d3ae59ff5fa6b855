use anyhow::{Context, Result};
use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::constants::{
    DEFAULT_CONTEXT_SIZE, DEFAULT_DAEMON_MODEL, DEFAULT_DAEMON_URL, DEFAULT_ENGINE_BINARY,
    DEFAULT_GPU_LAYERS, DEFAULT_HOST, DEFAULT_HOSTED_API_URL, DEFAULT_HOSTED_MODEL,
    DEFAULT_KNOWLEDGE_ITEMS, DEFAULT_MAX_HISTORY, DEFAULT_PORT, DEFAULT_SYSTEM_PROMPT,
    DEFAULT_THREADS, BACKEND_REQUEST_TIMEOUT_SECS, BACKEND_RETRY_DELAY_MS, ENVIRONMENT_ENV,
    ENV_PREFIX, HOSTED_API_KEY_ENV, PORT_ENV, RENDER_ENV,
};
use crate::models::GenerationParams;

/// Where the process is running, which decides the backend family
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentMode {
    #[default]
    Local,
    Hosted,
}

impl fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Hosted => write!(f, "hosted"),
        }
    }
}

/// API credential that never shows up in logs or debug output
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// "local" or "hosted"; environment signals may upgrade this to hosted
    #[serde(default)]
    pub deployment_mode: DeploymentMode,

    /// HTTP / websocket listener
    #[serde(default)]
    pub server: ServerConfig,

    /// Backend selection inputs
    #[serde(default)]
    pub backend: BackendConfig,

    /// Sampling parameters shared by every backend
    #[serde(default)]
    pub generation: GenerationParams,

    /// Conversation behaviour
    #[serde(default)]
    pub chat: ChatConfig,

    /// Knowledge store
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Keep a client's history after its connection closes
    pub retain_sessions_on_disconnect: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            retain_sessions_on_disconnect: false,
        }
    }
}

/// Backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Prefer the local model daemon when running locally
    pub use_daemon_backend: bool,
    pub daemon_model_name: String,
    pub daemon_url: String,
    /// Model file for the embedded engine; empty means not configured
    pub embedded_model_path: String,
    pub embedded_engine_binary: String,
    pub embedded_context_size: u32,
    pub embedded_gpu_layers: i32,
    pub embedded_threads: u32,
    pub hosted_model_name: String,
    pub hosted_api_key: Option<ApiKey>,
    pub hosted_api_url: String,
    /// Deadline for a single backend call
    pub request_timeout_secs: u64,
    /// Pause before retrying a transient failure
    pub retry_delay_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            use_daemon_backend: false,
            daemon_model_name: DEFAULT_DAEMON_MODEL.to_string(),
            daemon_url: DEFAULT_DAEMON_URL.to_string(),
            embedded_model_path: String::new(),
            embedded_engine_binary: DEFAULT_ENGINE_BINARY.to_string(),
            embedded_context_size: DEFAULT_CONTEXT_SIZE,
            embedded_gpu_layers: DEFAULT_GPU_LAYERS,
            embedded_threads: DEFAULT_THREADS,
            hosted_model_name: DEFAULT_HOSTED_MODEL.to_string(),
            hosted_api_key: None,
            hosted_api_url: DEFAULT_HOSTED_API_URL.to_string(),
            request_timeout_secs: BACKEND_REQUEST_TIMEOUT_SECS,
            retry_delay_ms: BACKEND_RETRY_DELAY_MS,
        }
    }
}

/// Chat configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Instruction preamble placed at the top of every prompt
    pub system_prompt: String,
    /// Messages kept per session before the oldest are evicted
    pub max_history: usize,
    /// Knowledge snippets injected into a prompt
    pub knowledge_items: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_history: DEFAULT_MAX_HISTORY,
            knowledge_items: DEFAULT_KNOWLEDGE_ITEMS,
        }
    }
}

/// Knowledge store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// JSON file backing the store; in-memory only when unset
    pub path: Option<PathBuf>,
}

/// Build the layered figment: defaults, global file, local file, explicit file, env
fn build_figment(global: Option<&Path>, local: &Path, explicit: Option<&Path>) -> Figment {
    let mut figment = Figment::from(Serialized::defaults(Config::default()));

    if let Some(global) = global {
        if global.exists() {
            figment = figment.merge(Toml::file(global));
        }
    }

    if local.exists() {
        figment = figment.merge(Toml::file(local));
    }

    if let Some(explicit) = explicit {
        figment = figment.merge(Toml::file(explicit));
    }

    // CHATBRIDGE_BACKEND__HOSTED_API_KEY -> backend.hosted_api_key
    figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// Load configuration from multiple sources, then fold in deployment signals
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    if let Some(path) = explicit {
        if !path.exists() {
            anyhow::bail!("Configuration file not found: {}", path.display());
        }
    }

    let global_config = get_config_dir().ok().map(|dir| dir.join("config.toml"));
    let local_config = PathBuf::from("chatbridge.toml");

    let config: Config = build_figment(global_config.as_deref(), &local_config, explicit)
        .extract()
        .context("Failed to load configuration")?;

    Ok(apply_environment_signals(config, |key| std::env::var(key).ok()))
}

/// Fold platform signals (RENDER, ENVIRONMENT, PORT, HUGGINGFACE_API_KEY) into the config
pub fn apply_environment_signals<F>(mut config: Config, lookup: F) -> Config
where
    F: Fn(&str) -> Option<String>,
{
    let on_render = lookup(RENDER_ENV)
        .map(|v| v.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    let production = lookup(ENVIRONMENT_ENV)
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "production" | "prod"))
        .unwrap_or(false);

    if on_render || production {
        config.deployment_mode = DeploymentMode::Hosted;
    }

    if let Some(port) = lookup(PORT_ENV).and_then(|p| p.trim().parse::<u16>().ok()) {
        config.server.port = port;
    }

    let has_key = config
        .backend
        .hosted_api_key
        .as_ref()
        .is_some_and(|k| !k.is_blank());
    if !has_key {
        if let Some(key) = lookup(HOSTED_API_KEY_ENV).filter(|k| !k.trim().is_empty()) {
            config.backend.hosted_api_key = Some(ApiKey::new(key));
        }
    }

    config
}

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    if let Some(proj_dirs) = ProjectDirs::from("", "", "chatbridge") {
        Ok(proj_dirs.config_dir().to_path_buf())
    } else {
        // Fallback to home directory
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .context("Could not determine home directory")?;
        Ok(PathBuf::from(home).join(".config").join("chatbridge"))
    }
}

/// Save configuration to file
pub fn save_config(config: &Config, path: Option<PathBuf>) -> Result<()> {
    let path = if let Some(p) = path {
        p
    } else {
        get_config_dir()?.join("config.toml")
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let toml_string = render_config(config)?;
    std::fs::write(&path, toml_string)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;

    Ok(())
}

const CONFIG_PREAMBLE: &str = "\
# chatbridge configuration
#
# Settings merge in order: built-in defaults, this file, ./chatbridge.toml,
# --config, then CHATBRIDGE_* environment variables (CHATBRIDGE_SERVER__PORT=9000).
# RENDER=true or ENVIRONMENT=production switch deployment_mode to \"hosted\".
# PORT and HUGGINGFACE_API_KEY are honoured as well.

";

const SECTION_NOTES: &[(&str, &str)] = &[
    ("[server]", "# HTTP / websocket listener"),
    (
        "[backend]",
        "# Model backend. Hosted mode always uses the hosted API and needs\n\
         # hosted_api_key. Locally the daemon is used when use_daemon_backend is\n\
         # true, otherwise the embedded engine when embedded_model_path is set.",
    ),
    ("[generation]", "# Sampling parameters shared by every backend"),
    (
        "[chat]",
        "# Prompt preamble, messages kept per client, knowledge items per prompt",
    ),
    (
        "[knowledge]",
        "# Set path to persist knowledge items as a JSON array, e.g.\n# path = \"knowledge.json\"",
    ),
];

/// Serialize a config as TOML with explanatory comments above each section
pub fn render_config(config: &Config) -> Result<String> {
    let mut body = toml::to_string_pretty(config)?;
    for (header, note) in SECTION_NOTES {
        let line = format!("{}\n", header);
        if let Some(pos) = body.find(&line) {
            body.insert_str(pos, &format!("{}\n", note));
        }
    }
    Ok(format!("{}{}", CONFIG_PREAMBLE, body))
}

/// Create a default configuration file if it doesn't exist
pub fn init_config() -> Result<PathBuf> {
    let config_file = get_config_dir()?.join("config.toml");

    if !config_file.exists() {
        save_config(&Config::default(), Some(config_file.clone()))?;
        println!("Created default configuration at: {}", config_file.display());
    } else {
        println!("Configuration already exists at: {}", config_file.display());
    }

    Ok(config_file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_local() {
        let config = apply_environment_signals(Config::default(), env(&[]));
        assert_eq!(config.deployment_mode, DeploymentMode::Local);
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert!(config.backend.hosted_api_key.is_none());
    }

    #[test]
    fn test_render_flag_forces_hosted() {
        let config = apply_environment_signals(Config::default(), env(&[("RENDER", "TRUE")]));
        assert_eq!(config.deployment_mode, DeploymentMode::Hosted);
    }

    #[test]
    fn test_production_environment_forces_hosted() {
        for value in ["production", "prod", "Production"] {
            let config =
                apply_environment_signals(Config::default(), env(&[("ENVIRONMENT", value)]));
            assert_eq!(config.deployment_mode, DeploymentMode::Hosted, "{}", value);
        }

        let config = apply_environment_signals(Config::default(), env(&[("ENVIRONMENT", "staging")]));
        assert_eq!(config.deployment_mode, DeploymentMode::Local);
    }

    #[test]
    fn test_port_and_api_key_from_environment() {
        let config = apply_environment_signals(
            Config::default(),
            env(&[("PORT", "10000"), ("HUGGINGFACE_API_KEY", "hf_abc")]),
        );
        assert_eq!(config.server.port, 10000);
        assert_eq!(
            config.backend.hosted_api_key.as_ref().map(ApiKey::expose),
            Some("hf_abc")
        );
    }

    #[test]
    fn test_configured_api_key_wins_over_environment() {
        let mut config = Config::default();
        config.backend.hosted_api_key = Some(ApiKey::new("from-file"));
        let config = apply_environment_signals(config, env(&[("HUGGINGFACE_API_KEY", "from-env")]));
        assert_eq!(
            config.backend.hosted_api_key.as_ref().map(ApiKey::expose),
            Some("from-file")
        );
    }

    #[test]
    fn test_api_key_is_redacted_in_debug() {
        let key = ApiKey::new("hf_secret");
        assert_eq!(format!("{:?}", key), "ApiKey(***)");
    }

    #[test]
    fn test_toml_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chatbridge.toml");
        std::fs::write(
            &path,
            r#"
deployment_mode = "hosted"

[backend]
use_daemon_backend = true
daemon_model_name = "mistral"
hosted_api_key = "hf_file"

[chat]
max_history = 4
"#,
        )
        .unwrap();

        let config: Config = build_figment(None, &dir.path().join("missing.toml"), Some(&path))
            .extract()
            .unwrap();

        assert_eq!(config.deployment_mode, DeploymentMode::Hosted);
        assert!(config.backend.use_daemon_backend);
        assert_eq!(config.backend.daemon_model_name, "mistral");
        assert_eq!(config.chat.max_history, 4);
        assert_eq!(config.chat.knowledge_items, DEFAULT_KNOWLEDGE_ITEMS);
        assert_eq!(config.backend.daemon_url, DEFAULT_DAEMON_URL);
    }

    #[test]
    fn test_save_then_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.backend.embedded_model_path = "/models/llama.gguf".to_string();
        save_config(&config, Some(path.clone())).unwrap();

        let loaded: Config = toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.backend.embedded_model_path, "/models/llama.gguf");
        assert_eq!(loaded.deployment_mode, DeploymentMode::Local);
    }

    #[test]
    fn test_rendered_config_is_commented_and_loadable() {
        let rendered = render_config(&Config::default()).unwrap();

        assert!(rendered.starts_with("# chatbridge configuration"));
        let server = rendered.find("[server]").unwrap();
        assert!(rendered[..server].ends_with("# HTTP / websocket listener\n"));

        let loaded: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(loaded.server.port, DEFAULT_PORT);
        assert_eq!(loaded.chat.max_history, DEFAULT_MAX_HISTORY);
    }
}
