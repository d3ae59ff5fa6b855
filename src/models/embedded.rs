use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::debug;

use super::traits::ModelBackend;
use super::types::{BackendKind, ChatMessage, GenerationParams, MessageRole, Prompt};
use crate::utils::{BackendError, ChatError};

/// A local inference engine that turns prompt text into a completion
#[async_trait]
pub trait InferenceEngine: Send + Sync {
    async fn complete(&self, prompt: &str, params: &GenerationParams)
        -> Result<String, BackendError>;

    /// Short description for logs and the status command
    fn describe(&self) -> String;

    /// Whether the engine can currently run
    fn is_ready(&self) -> bool {
        true
    }
}

/// Runs the llama.cpp command-line runner against a GGUF model file
#[derive(Debug, Clone)]
pub struct LlamaCliEngine {
    binary: String,
    model_path: PathBuf,
    context_size: u32,
    gpu_layers: i32,
    threads: u32,
}

impl LlamaCliEngine {
    pub fn new(
        binary: &str,
        model_path: &Path,
        context_size: u32,
        gpu_layers: i32,
        threads: u32,
    ) -> Result<Self, ChatError> {
        if !model_path.is_file() {
            return Err(ChatError::configuration(format!(
                "embedded model file does not exist: {}",
                model_path.display()
            )));
        }

        Ok(Self {
            binary: binary.to_string(),
            model_path: model_path.to_path_buf(),
            context_size,
            gpu_layers,
            threads,
        })
    }

    fn locate_binary(&self) -> Result<PathBuf, BackendError> {
        which::which(&self.binary).map_err(|_| {
            BackendError::Permanent(format!(
                "inference engine '{}' not found in PATH",
                self.binary
            ))
        })
    }

    fn args(&self, prompt: &str, params: &GenerationParams) -> Vec<String> {
        vec![
            "-m".to_string(),
            self.model_path.display().to_string(),
            "-p".to_string(),
            prompt.to_string(),
            "-n".to_string(),
            params.max_new_tokens.to_string(),
            "-c".to_string(),
            self.context_size.to_string(),
            "-ngl".to_string(),
            self.gpu_layers.to_string(),
            "-t".to_string(),
            self.threads.to_string(),
            "--temp".to_string(),
            params.temperature.to_string(),
            "--top-p".to_string(),
            params.top_p.to_string(),
            "--repeat-penalty".to_string(),
            params.repetition_penalty.to_string(),
            "--no-display-prompt".to_string(),
            "-no-cnv".to_string(),
        ]
    }
}

#[async_trait]
impl InferenceEngine for LlamaCliEngine {
    async fn complete(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, BackendError> {
        let binary = self.locate_binary()?;

        let output = Command::new(&binary)
            .args(self.args(prompt, params))
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                    BackendError::Permanent(format!("cannot start {}: {}", binary.display(), e))
                }
                _ => BackendError::Transient(format!("engine I/O failure: {}", e)),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: String = stderr
                .lines()
                .rev()
                .take(3)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect::<Vec<_>>()
                .join(" | ");
            return Err(BackendError::Transient(format!(
                "engine exited with {}: {}",
                output.status, tail
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if text.is_empty() {
            return Err(BackendError::Transient("engine produced no output".to_string()));
        }
        Ok(text)
    }

    fn describe(&self) -> String {
        format!("{} -m {}", self.binary, self.model_path.display())
    }

    fn is_ready(&self) -> bool {
        self.model_path.is_file() && self.locate_binary().is_ok()
    }
}

/// Backend for an engine running on this machine.
///
/// Local engines handle one request at a time, so calls are serialized.
pub struct EmbeddedBackend {
    engine: Arc<dyn InferenceEngine>,
    gate: Mutex<()>,
    display_name: String,
    params: GenerationParams,
}

impl EmbeddedBackend {
    pub fn new(engine: Arc<dyn InferenceEngine>, model_label: &str, params: GenerationParams) -> Self {
        Self {
            engine,
            gate: Mutex::new(()),
            display_name: format!("embedded/{}", model_label),
            params,
        }
    }
}

#[async_trait]
impl ModelBackend for EmbeddedBackend {
    async fn generate(
        &self,
        prompt: &Prompt,
        history: &[ChatMessage],
    ) -> Result<String, BackendError> {
        let text = render_llama3(prompt, history);
        let _turn = self.gate.lock().await;
        debug!(engine = %self.engine.describe(), "Running embedded engine");
        self.engine.complete(&text, &self.params).await
    }

    fn name(&self) -> &str {
        &self.display_name
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Embedded
    }

    async fn validate_connection(&self) -> Result<bool, BackendError> {
        Ok(self.engine.is_ready())
    }
}

/// Llama-3 chat template ending with an open assistant header
fn render_llama3(prompt: &Prompt, history: &[ChatMessage]) -> String {
    fn block(role: &str, content: &str) -> String {
        format!(
            "<|start_header_id|>{}<|end_header_id|>\n\n{}<|eot_id|>",
            role, content
        )
    }

    let mut text = block("system", &prompt.instructions);
    for msg in history {
        let role = match msg.role {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        };
        text.push_str(&block(role, &msg.content));
    }
    text.push_str(&block("user", &prompt.message));
    text.push_str("<|start_header_id|>assistant<|end_header_id|>\n\n");
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct EchoEngine {
        active: AtomicUsize,
        max_active: AtomicUsize,
    }

    #[async_trait]
    impl InferenceEngine for EchoEngine {
        async fn complete(
            &self,
            prompt: &str,
            _params: &GenerationParams,
        ) -> Result<String, BackendError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(format!("{} chars", prompt.len()))
        }

        fn describe(&self) -> String {
            "echo".to_string()
        }
    }

    #[test]
    fn test_llama3_template() {
        let prompt = Prompt::new("sys", "next");
        let history = vec![ChatMessage::user("hi")];
        let text = render_llama3(&prompt, &history);

        assert!(text.starts_with("<|start_header_id|>system<|end_header_id|>\n\nsys<|eot_id|>"));
        assert!(text.contains("<|start_header_id|>user<|end_header_id|>\n\nhi<|eot_id|>"));
        assert!(text.ends_with("next<|eot_id|><|start_header_id|>assistant<|end_header_id|>\n\n"));
    }

    #[test]
    fn test_missing_model_file_is_configuration_error() {
        let err = LlamaCliEngine::new("llama-cli", Path::new("/nonexistent/model.gguf"), 4096, -1, 4)
            .unwrap_err();
        assert!(matches!(err, ChatError::Configuration(_)));
    }

    #[test]
    fn test_cli_arguments() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let engine = LlamaCliEngine::new("llama-cli", file.path(), 2048, 0, 8).unwrap();
        let args = engine.args("hello", &GenerationParams::default());

        let pos = |flag: &str| args.iter().position(|a| a == flag).unwrap();
        assert_eq!(args[pos("-p") + 1], "hello");
        assert_eq!(args[pos("-c") + 1], "2048");
        assert_eq!(args[pos("-ngl") + 1], "0");
        assert_eq!(args[pos("-t") + 1], "8");
        assert_eq!(args[pos("-n") + 1], "256");
        assert!(args.contains(&"-no-cnv".to_string()));
    }

    #[tokio::test]
    async fn test_missing_binary_is_permanent() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let engine =
            LlamaCliEngine::new("chatbridge-no-such-engine", file.path(), 4096, -1, 4).unwrap();

        assert!(!engine.is_ready());
        let err = engine
            .complete("hi", &GenerationParams::default())
            .await
            .unwrap_err();
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_calls_are_serialized() {
        let engine = Arc::new(EchoEngine {
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        });
        let backend = Arc::new(EmbeddedBackend::new(
            engine.clone(),
            "model.gguf",
            GenerationParams::default(),
        ));

        let mut handles = Vec::new();
        for i in 0..4 {
            let backend = backend.clone();
            handles.push(tokio::spawn(async move {
                backend
                    .generate(&Prompt::new("sys", format!("msg {}", i)), &[])
                    .await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }

        assert_eq!(engine.max_active.load(Ordering::SeqCst), 1);
        assert_eq!(backend.name(), "embedded/model.gguf");
    }
}
