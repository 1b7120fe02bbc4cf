use async_trait::async_trait;
use log::info;
use reqwest::Client as HttpClient;
use serde_json::Value as JsonValue;
use std::error::Error as StdError;
use url::Url;

use super::{ is_falsy, ChatClient };
use crate::error::ChatError;
use crate::llm::{ LlmConfig, LlmType };
use crate::models::chat::{ ChatMessage, CompletionRequest };

const DEFAULT_PROXY_URL: &str = "http://127.0.0.1:4001/api/chat";

/// Posts the window as `{messages}` to a relay endpoint and reads back one message.
#[derive(Debug)]
pub struct ProxyChatClient {
    http: HttpClient,
    endpoint: Url,
}

impl ProxyChatClient {
    pub fn new(endpoint: Option<String>) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        let raw = endpoint.unwrap_or_else(|| DEFAULT_PROXY_URL.to_string());
        let endpoint = Url::parse(&raw).map_err(|e|
            format!("Invalid completion endpoint '{}': {}", raw, e)
        )?;

        Ok(Self {
            http: HttpClient::new(),
            endpoint,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        if config.llm_type != LlmType::Proxy {
            return Err("Invalid config type for ProxyChatClient".into());
        }

        Self::new(config.base_url.clone())
    }
}

#[async_trait]
impl ChatClient for ProxyChatClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<Option<ChatMessage>, ChatError> {
        let req = CompletionRequest { messages: messages.to_vec() };
        info!("Sending {} messages to {}", req.messages.len(), self.endpoint);

        let resp = self.http.post(self.endpoint.clone()).json(&req).send().await?;
        if !resp.status().is_success() {
            return Err(ChatError::from_status(resp.status()));
        }

        let body = resp.json::<JsonValue>().await?;
        if is_falsy(&body) {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(body)?))
    }

    fn get_model(&self) -> String {
        "proxy".to_string()
    }

    fn get_base_url(&self) -> Option<String> {
        Some(self.endpoint.to_string())
    }
}
