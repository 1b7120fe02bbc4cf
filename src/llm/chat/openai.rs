use async_trait::async_trait;
use reqwest::{ Client as HttpClient, header::{ HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION } };
use serde::{ Deserialize, Serialize };
use std::error::Error as StdError;

use super::{ with_system_prompt, ChatClient };
use crate::error::ChatError;
use crate::llm::LlmConfig;
use crate::models::chat::ChatMessage;

pub struct OpenAIChatClient {
    http: HttpClient,
    model: String,
    base_url: String,
    system_prompt: Option<String>,
}

#[derive(Serialize)]
struct OpenAIChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: ChatMessage,
}

impl OpenAIChatClient {
    pub fn new(
        api_key: String,
        model: Option<String>,
        base_url: Option<String>,
        system_prompt: Option<String>
    ) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        let chat_model = model.unwrap_or_else(|| "gpt-4o-mini".to_string());
        let api_url = base_url.unwrap_or_else(|| "https://api.openai.com".to_string());
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| format!("Invalid API key format: {}", e))?
        );

        let http = HttpClient::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| Box::new(e) as Box<dyn StdError + Send + Sync>)?;

        Ok(Self {
            http,
            model: chat_model,
            base_url: api_url,
            system_prompt,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        let api_key = config.api_key
            .clone()
            .ok_or_else(|| "OpenAI API key is required".to_string())?;

        Self::new(
            api_key,
            config.completion_model.clone(),
            config.base_url.clone(),
            config.system_prompt.clone(),
        )
    }

    fn completions_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            base.to_string()
        } else if base.ends_with("/v1") {
            format!("{}/chat/completions", base)
        } else {
            format!("{}/v1/chat/completions", base)
        }
    }
}

#[async_trait]
impl ChatClient for OpenAIChatClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<Option<ChatMessage>, ChatError> {
        let messages = with_system_prompt(self.system_prompt.as_deref(), messages);
        let req = OpenAIChatRequest {
            model: &self.model,
            messages: &messages,
            temperature: 1.0,
            max_completion_tokens: Some(2048),
        };

        let resp = self.http.post(self.completions_url()).json(&req).send().await?;
        if !resp.status().is_success() {
            return Err(ChatError::from_status(resp.status()));
        }

        let resp = resp.json::<OpenAIResponse>().await?;
        Ok(resp.choices.into_iter().next().map(|choice| choice.message))
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }

    fn get_base_url(&self) -> Option<String> {
        Some(self.base_url.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{ routing::post, Json, Router };
    use serde_json::{ json, Value as JsonValue };

    #[test]
    fn completions_url_accepts_common_base_forms() {
        let client = |base: &str| {
            OpenAIChatClient::new("k".into(), None, Some(base.to_string()), None).unwrap()
        };
        assert_eq!(client("https://api.openai.com").completions_url(), "https://api.openai.com/v1/chat/completions");
        assert_eq!(client("https://api.openai.com/v1/").completions_url(), "https://api.openai.com/v1/chat/completions");
        assert_eq!(client("http://x/v1/chat/completions").completions_url(), "http://x/v1/chat/completions");
    }

    #[test]
    fn missing_api_key_is_rejected() {
        let config = LlmConfig { llm_type: crate::llm::LlmType::OpenAI, ..LlmConfig::default() };
        assert!(OpenAIChatClient::from_config(&config).is_err());
    }

    #[tokio::test]
    async fn sends_system_prompt_and_returns_first_choice() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|Json(body): Json<JsonValue>| async move {
                let first_role = body["messages"][0]["role"].as_str().unwrap_or_default().to_string();
                Json(json!({
                    "choices": [{ "message": { "role": "assistant", "content": first_role } }]
                }))
            })
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = OpenAIChatClient::new(
            "k".into(),
            None,
            Some(format!("http://{}", addr)),
            Some("be a cat".into())
        ).unwrap();
        let reply = client.complete(&[ChatMessage::user("hello")]).await.unwrap();
        assert_eq!(reply, Some(ChatMessage::assistant("system")));
    }
}
