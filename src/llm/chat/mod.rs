pub mod ollama;
pub mod openai;
pub mod proxy;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::error::Error as StdError;
use std::sync::Arc;
use super::{ LlmConfig, LlmType };
use self::ollama::OllamaClient;
use self::openai::OpenAIChatClient;
use self::proxy::ProxyChatClient;
use crate::error::ChatError;
use crate::models::chat::{ ChatMessage, Role };

#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Asks the backend for the next assistant message given a window of the conversation.
    /// `Ok(None)` means the backend answered with an empty result.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<Option<ChatMessage>, ChatError>;

    fn get_model(&self) -> String;
    fn get_base_url(&self) -> Option<String>;
}

pub fn new_client(
    config: &LlmConfig
) -> Result<Arc<dyn ChatClient>, Box<dyn StdError + Send + Sync>> {
    let client: Arc<dyn ChatClient> = match config.llm_type {
        LlmType::Proxy => {
            let specific_client = ProxyChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
        LlmType::Ollama => {
            let specific_client = OllamaClient::from_config(config)?;
            Arc::new(specific_client)
        }
        LlmType::OpenAI => {
            let specific_client = OpenAIChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
    };
    Ok(client)
}

/// JavaScript-style falsiness of a decoded response body.
pub fn is_falsy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => true,
        JsonValue::Bool(b) => !b,
        JsonValue::Number(n) => n.as_f64() == Some(0.0),
        JsonValue::String(s) => s.is_empty(),
        JsonValue::Array(_) | JsonValue::Object(_) => false,
    }
}

/// Prepends the system prompt unless the window already carries a system message.
pub fn with_system_prompt(system_prompt: Option<&str>, messages: &[ChatMessage]) -> Vec<ChatMessage> {
    let mut out = Vec::with_capacity(messages.len() + 1);
    if let Some(prompt) = system_prompt {
        if !messages.iter().any(|m| m.role == Role::System) {
            out.push(ChatMessage::system(prompt));
        }
    }
    out.extend_from_slice(messages);
    out
}
