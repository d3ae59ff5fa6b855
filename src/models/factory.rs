use std::sync::Arc;
use std::time::Duration;

use super::daemon::DaemonBackend;
use super::embedded::{EmbeddedBackend, LlamaCliEngine};
use super::hosted::HostedApiBackend;
use super::traits::ModelBackend;
use crate::app::{BackendSelection, Config};
use crate::utils::ChatError;

/// Factory for turning a resolved selection into a live backend
pub struct ModelFactory;

impl ModelFactory {
    /// Build the backend named by `selection`.
    ///
    /// Failures here happen at startup and are fatal, so they are reported as
    /// configuration errors.
    pub fn create(
        selection: &BackendSelection,
        config: &Config,
    ) -> Result<Arc<dyn ModelBackend>, ChatError> {
        let params = config.generation.clone();
        let timeout = Duration::from_secs(config.backend.request_timeout_secs);

        let backend: Arc<dyn ModelBackend> = match selection {
            BackendSelection::Daemon { model, base_url } => Arc::new(
                DaemonBackend::new(base_url, model, params, timeout)
                    .map_err(|e| ChatError::configuration(e.to_string()))?,
            ),
            BackendSelection::Embedded {
                model_path,
                engine_binary,
                context_size,
                gpu_layers,
                threads,
            } => {
                let engine = LlamaCliEngine::new(
                    engine_binary,
                    model_path,
                    *context_size,
                    *gpu_layers,
                    *threads,
                )?;
                let label = model_path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| model_path.display().to_string());
                Arc::new(EmbeddedBackend::new(Arc::new(engine), &label, params))
            }
            BackendSelection::Hosted {
                model,
                api_url,
                api_key,
            } => Arc::new(
                HostedApiBackend::new(api_url, model, api_key.clone(), params, timeout)
                    .map_err(|e| ChatError::configuration(e.to_string()))?,
            ),
        };

        Ok(backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ApiKey;
    use crate::models::BackendKind;

    #[test]
    fn test_builds_each_variant() {
        let config = Config::default();

        let daemon = ModelFactory::create(
            &BackendSelection::Daemon {
                model: "llama3.1".to_string(),
                base_url: "http://localhost:11434".to_string(),
            },
            &config,
        )
        .unwrap();
        assert_eq!(daemon.kind(), BackendKind::Daemon);
        assert_eq!(daemon.name(), "daemon/llama3.1");

        let hosted = ModelFactory::create(
            &BackendSelection::Hosted {
                model: "org/model".to_string(),
                api_url: "https://example.invalid/models".to_string(),
                api_key: ApiKey::new("hf_x"),
            },
            &config,
        )
        .unwrap();
        assert_eq!(hosted.kind(), BackendKind::Hosted);

        let file = tempfile::Builder::new().suffix(".gguf").tempfile().unwrap();
        let embedded = ModelFactory::create(
            &BackendSelection::Embedded {
                model_path: file.path().to_path_buf(),
                engine_binary: "llama-cli".to_string(),
                context_size: 4096,
                gpu_layers: -1,
                threads: 4,
            },
            &config,
        )
        .unwrap();
        assert_eq!(embedded.kind(), BackendKind::Embedded);
        assert!(embedded.name().ends_with(".gguf"));
    }

    #[test]
    fn test_embedded_without_model_file_fails() {
        let result = ModelFactory::create(
            &BackendSelection::Embedded {
                model_path: "/nonexistent/model.gguf".into(),
                engine_binary: "llama-cli".to_string(),
                context_size: 4096,
                gpu_layers: -1,
                threads: 4,
            },
            &Config::default(),
        );
        assert!(matches!(result, Err(ChatError::Configuration(_))));
    }
}
