use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Surface Args ---
    /// User-facing surface to run (terminal, server)
    #[arg(long, env = "SURFACE", default_value = "terminal")]
    pub surface: String,

    /// Host address and port for the WebSocket chat server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:4000")]
    pub server_addr: String,

    /// Port for the HTTP API (relay endpoint and stored history). Disabled if not set.
    #[arg(long, env = "HTTP_PORT")]
    pub http_port: Option<u16>,

    // --- History Store Args ---
    /// Document store holding the conversation record (firestore, redis, memory).
    /// Defaults to memory, which keeps history only for the life of the process.
    #[arg(long, env = "HISTORY_TYPE", default_value = "memory")]
    pub history_type: String,

    /// History store host endpoint (e.g., redis://127.0.0.1:6379). Ignored by firestore and memory.
    #[arg(long, env = "HISTORY_HOST", default_value = "redis://127.0.0.1:6379")]
    pub history_host: String,

    /// Prefix for Redis document keys.
    #[arg(long, env = "HISTORY_REDIS_PREFIX", default_value = "history:")]
    pub history_redis_prefix: String,

    /// Collection holding the conversation record.
    #[arg(long, env = "HISTORY_COLLECTION", default_value = "message_collection")]
    pub history_collection: String,

    /// Name of the conversation record inside the collection.
    #[arg(long, env = "HISTORY_DOCUMENT", default_value = "message_document")]
    pub history_document: String,

    /// Google Cloud project id of the Firestore database.
    #[arg(long, env = "FIRESTORE_PROJECT_ID")]
    pub firestore_project_id: Option<String>,

    /// Path to the service account key (JSON) used to authenticate against Firestore.
    #[arg(long, env = "FIRESTORE_SA_KEY_PATH")]
    pub firestore_sa_key_path: Option<String>,

    // --- Chat LLM Provider Args ---
    /// Completion backend used by the chat session (proxy, openai, ollama)
    #[arg(long, env = "CHAT_LLM_TYPE", default_value = "proxy")]
    pub chat_llm_type: String,

    /// Base URL for the chat completion backend (for proxy: the full endpoint URL)
    #[arg(long, env = "CHAT_BASE_URL")] // No default, let adapters handle defaults if None
    pub chat_base_url: Option<String>,

    /// API Key for the chat completion backend (e.g., OpenAI)
    #[arg(long, env = "CHAT_API_KEY", default_value = "")]
    pub chat_api_key: String,

    /// Model name for chat completion (e.g., gpt-4o-mini, llama3)
    #[arg(long, env = "CHAT_MODEL")] // No default, rely on adapter defaults if None
    pub chat_model: Option<String>,

    // --- Relay LLM Provider Args ---
    /// Upstream provider behind the /api/chat relay endpoint (openai, ollama)
    #[arg(long, env = "RELAY_LLM_TYPE", default_value = "openai")]
    pub relay_llm_type: String,

    /// Base URL for the relay upstream provider.
    #[arg(long, env = "RELAY_BASE_URL")]
    pub relay_base_url: Option<String>,

    /// API Key for the relay upstream provider.
    #[arg(long, env = "RELAY_API_KEY", default_value = "")]
    pub relay_api_key: String,

    /// Model name used by the relay upstream provider.
    #[arg(long, env = "RELAY_MODEL")]
    pub relay_model: Option<String>,

    // --- Conversation Args ---
    /// Assistant greeting every new conversation starts with.
    #[arg(long, env = "GREETING", default_value = crate::history::DEFAULT_GREETING)]
    pub greeting: String,

    /// System prompt prepended by the relay when the window carries none.
    #[arg(long, env = "SYSTEM_PROMPT", default_value = crate::llm::DEFAULT_SYSTEM_PROMPT)]
    pub system_prompt: String,

    /// Enable debug logging/output
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,
}
