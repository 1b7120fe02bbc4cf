pub mod api;
pub mod websocket;

use crate::history::ConversationStore;
use crate::llm::chat::ChatClient;
use std::error::Error;
use std::sync::Arc;

/// Shared collaborators handed to every connection and request handler.
#[derive(Clone)]
pub struct ServerContext {
    pub store: Arc<ConversationStore>,
    /// Completion backend used by each connection's chat session.
    pub chat_client: Arc<dyn ChatClient>,
    /// Upstream provider behind the `/api/chat` relay.
    pub relay_client: Arc<dyn ChatClient>,
}

pub struct Server {
    addr: String,
    http_port: Option<u16>,
    context: ServerContext,
}

impl Server {
    pub fn new(addr: String, http_port: Option<u16>, context: ServerContext) -> Self {
        Self {
            addr,
            http_port,
            context,
        }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        if let Some(http_port) = self.http_port {
            self.start_http_server(http_port).await?;
        }

        self.start_ws_server().await?;

        Ok(())
    }

    async fn start_http_server(&self, http_port: u16) -> Result<(), Box<dyn Error + Send + Sync>> {
        api::start_http_server(http_port, self.context.clone()).await
    }

    async fn start_ws_server(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        websocket::start_ws_server(&self.addr, self.context.clone()).await
    }
}
