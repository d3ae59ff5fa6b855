use std::path::PathBuf;

use super::config::{ApiKey, Config, DeploymentMode};
use crate::models::BackendKind;
use crate::utils::ChatError;

/// Backend chosen once at startup. Re-resolved only on restart.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendSelection {
    /// Local model daemon reached over HTTP
    Daemon { model: String, base_url: String },
    /// Engine running on this machine against a model file
    Embedded {
        model_path: PathBuf,
        engine_binary: String,
        context_size: u32,
        gpu_layers: i32,
        threads: u32,
    },
    /// Remote inference API
    Hosted {
        model: String,
        api_url: String,
        api_key: ApiKey,
    },
}

impl BackendSelection {
    /// Pick the backend for this deployment.
    ///
    /// Hosted mode always means the hosted API and requires a credential. Local
    /// mode prefers the daemon when enabled, then an embedded model file.
    pub fn resolve(config: &Config) -> Result<Self, ChatError> {
        let backend = &config.backend;

        match config.deployment_mode {
            DeploymentMode::Hosted => {
                let api_key = backend
                    .hosted_api_key
                    .clone()
                    .filter(|k| !k.is_blank())
                    .ok_or_else(|| {
                        ChatError::configuration(
                            "hosted deployment requires an API key (backend.hosted_api_key or HUGGINGFACE_API_KEY)",
                        )
                    })?;
                require_non_empty(&backend.hosted_model_name, "backend.hosted_model_name")?;

                Ok(Self::Hosted {
                    model: backend.hosted_model_name.trim().to_string(),
                    api_url: backend.hosted_api_url.trim_end_matches('/').to_string(),
                    api_key,
                })
            }
            DeploymentMode::Local if backend.use_daemon_backend => {
                require_non_empty(&backend.daemon_model_name, "backend.daemon_model_name")?;

                Ok(Self::Daemon {
                    model: backend.daemon_model_name.trim().to_string(),
                    base_url: backend.daemon_url.trim_end_matches('/').to_string(),
                })
            }
            DeploymentMode::Local if !backend.embedded_model_path.trim().is_empty() => {
                Ok(Self::Embedded {
                    model_path: PathBuf::from(backend.embedded_model_path.trim()),
                    engine_binary: backend.embedded_engine_binary.clone(),
                    context_size: backend.embedded_context_size,
                    gpu_layers: backend.embedded_gpu_layers,
                    threads: backend.embedded_threads,
                })
            }
            DeploymentMode::Local => Err(ChatError::configuration(
                "no local backend configured: enable backend.use_daemon_backend or set backend.embedded_model_path",
            )),
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Daemon { .. } => BackendKind::Daemon,
            Self::Embedded { .. } => BackendKind::Embedded,
            Self::Hosted { .. } => BackendKind::Hosted,
        }
    }

    /// Model identifier: daemon/hosted model name, or the model file path
    pub fn model_id(&self) -> String {
        match self {
            Self::Daemon { model, .. } | Self::Hosted { model, .. } => model.clone(),
            Self::Embedded { model_path, .. } => model_path.display().to_string(),
        }
    }

    /// Where the backend is reached
    pub fn endpoint(&self) -> String {
        match self {
            Self::Daemon { base_url, .. } => base_url.clone(),
            Self::Embedded { engine_binary, .. } => format!("{} (local process)", engine_binary),
            Self::Hosted { api_url, model, .. } => format!("{}/{}", api_url, model),
        }
    }
}

fn require_non_empty(value: &str, key: &str) -> Result<(), ChatError> {
    if value.trim().is_empty() {
        Err(ChatError::configuration(format!("{} must not be empty", key)))
    } else {
        Ok(())
    }
}
