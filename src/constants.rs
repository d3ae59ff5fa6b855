/// Constants module to avoid magic numbers in the codebase

// Network Configuration
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_DAEMON_URL: &str = "http://localhost:11434";
pub const DEFAULT_HOSTED_API_URL: &str = "https://api-inference.huggingface.co/models";

// Environment signals
pub const ENV_PREFIX: &str = "CHATBRIDGE_";
pub const RENDER_ENV: &str = "RENDER";
pub const ENVIRONMENT_ENV: &str = "ENVIRONMENT";
pub const PORT_ENV: &str = "PORT";
pub const HOSTED_API_KEY_ENV: &str = "HUGGINGFACE_API_KEY";

// Timeouts
pub const BACKEND_REQUEST_TIMEOUT_SECS: u64 = 120;
pub const BACKEND_RETRY_DELAY_MS: u64 = 500;
pub const HEALTH_CHECK_TIMEOUT_SECS: u64 = 3;

// Default Model Configuration
pub const DEFAULT_DAEMON_MODEL: &str = "llama3.1";
pub const DEFAULT_HOSTED_MODEL: &str = "meta-llama/Meta-Llama-3.1-8B-Instruct";
pub const DEFAULT_ENGINE_BINARY: &str = "llama-cli";
pub const DEFAULT_CONTEXT_SIZE: u32 = 4096;
pub const DEFAULT_GPU_LAYERS: i32 = -1;
pub const DEFAULT_THREADS: u32 = 4;
pub const DEFAULT_MAX_NEW_TOKENS: u32 = 256;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_TOP_P: f32 = 0.9;
pub const DEFAULT_REPETITION_PENALTY: f32 = 1.1;
pub const STOP_SEQUENCE: &str = "</s>";

// Chat Configuration
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant.";
pub const DEFAULT_MAX_HISTORY: usize = 10;
pub const DEFAULT_KNOWLEDGE_ITEMS: usize = 5;
pub const KNOWLEDGE_HEADER: &str = "Here is important information you should know:";

// Status messages sent over the websocket
pub const STATUS_HISTORY_CLEARED: &str = "Chat history cleared";
pub const STATUS_INVALID_FRAME: &str = "Invalid message format";
pub const STATUS_ALREADY_CONNECTED: &str = "This client id already has an open connection";
