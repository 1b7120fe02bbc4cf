use reqwest::Client as HttpClient;
use serde::{ Deserialize, Serialize };
use async_trait::async_trait;
use std::error::Error as StdError;
use super::{ with_system_prompt, ChatClient };
use crate::error::ChatError;
use crate::llm::LlmConfig;
use crate::models::chat::ChatMessage;

#[derive(Debug)]
pub struct OllamaClient {
    http: HttpClient,
    base_url: String,
    completion_model: String,
    system_prompt: Option<String>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: Option<ChatMessage>,
}

impl OllamaClient {
    pub fn new(
        base_url: Option<String>,
        completion_model: Option<String>,
        system_prompt: Option<String>
    ) -> Self {
        let model = completion_model.unwrap_or_else(|| "llama3.2".to_string());
        let url = base_url.unwrap_or_else(|| "http://localhost:11434".into());

        Self {
            http: HttpClient::new(),
            base_url: url,
            completion_model: model,
            system_prompt,
        }
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        if config.llm_type != crate::llm::LlmType::Ollama {
            return Err("Invalid config type for OllamaClient".into());
        }

        Ok(Self::new(
            config.base_url.clone(),
            config.completion_model.clone(),
            config.system_prompt.clone()
        ))
    }
}

#[async_trait]
impl ChatClient for OllamaClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<Option<ChatMessage>, ChatError> {
        let url = format!("{}/api/chat", self.base_url.trim_end_matches('/'));
        let messages = with_system_prompt(self.system_prompt.as_deref(), messages);
        let req = ChatRequest {
            model: &self.completion_model,
            messages: &messages,
            stream: false,
        };

        let resp = self.http.post(&url).json(&req).send().await?;
        if !resp.status().is_success() {
            return Err(ChatError::from_status(resp.status()));
        }
        let data = resp.json::<ChatResponse>().await?;
        Ok(data.message.filter(|m| !m.content.is_empty()))
    }

    fn get_model(&self) -> String {
        self.completion_model.clone()
    }

    fn get_base_url(&self) -> Option<String> {
        Some(self.base_url.clone())
    }
}
