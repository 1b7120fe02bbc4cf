pub mod chat;
use serde::{ Deserialize, Serialize };
use std::str::FromStr;
use std::fmt;

pub const DEFAULT_SYSTEM_PROMPT: &str =
    "Your name is Nyang and you are a cheerful cat. Answer kindly and playfully, \
     sympathise when the user shares a worry, and end your sentences with \"nyang\".";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmType {
    /// Any HTTP endpoint speaking `{messages}` in, one message out.
    Proxy,
    Ollama,
    OpenAI,
}

impl fmt::Display for LlmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LlmType::Proxy => "proxy",
            LlmType::Ollama => "ollama",
            LlmType::OpenAI => "openai",
        };
        f.write_str(name)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseLlmTypeError {
    message: String,
}

impl fmt::Display for ParseLlmTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseLlmTypeError {}
impl FromStr for LlmType {
    type Err = ParseLlmTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "proxy" => Ok(LlmType::Proxy),
            "ollama" => Ok(LlmType::Ollama),
            "openai" => Ok(LlmType::OpenAI),
            _ =>
                Err(ParseLlmTypeError {
                    message: format!("Invalid LLM type: '{}'", s),
                }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub llm_type: LlmType,
    pub api_key: Option<String>,
    pub completion_model: Option<String>,
    pub base_url: Option<String>,
    pub system_prompt: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            llm_type: LlmType::Proxy,
            api_key: None,
            completion_model: None,
            base_url: None,
            system_prompt: None,
        }
    }
}

impl LlmConfig {
    pub fn from_parts(
        llm_type: &str,
        base_url: Option<String>,
        api_key: &str,
        completion_model: Option<String>,
        system_prompt: Option<String>
    ) -> Result<Self, ParseLlmTypeError> {
        Ok(Self {
            llm_type: llm_type.parse()?,
            base_url,
            api_key: Some(api_key.to_string()).filter(|k| !k.is_empty()),
            completion_model,
            system_prompt,
        })
    }
}
