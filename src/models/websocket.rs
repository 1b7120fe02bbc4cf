use serde::{ Serialize, Deserialize };
use super::chat::ChatMessage;

#[derive(Serialize, Deserialize, Debug)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "send")] Send {
        content: String,
    },
    #[serde(rename = "history")]
    History,
    #[serde(rename = "reset")]
    Reset,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "messages")] Messages {
        messages: Vec<ChatMessage>,
        loading: bool,
        timestamp: i64,
    },
    #[serde(rename = "notice")] Notice {
        message: String,
    },
    #[serde(rename = "error")] Error {
        message: String,
    },
}
