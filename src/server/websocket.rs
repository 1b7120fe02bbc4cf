use crate::agent::{ ChatAgent, ChatView, ReloadOutcome };
use crate::models::chat::ChatMessage;
use crate::models::websocket::{ ClientMessage, ServerMessage };
use super::ServerContext;

use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{ AsyncRead, AsyncWrite };
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use tokio_tungstenite::{ accept_async, WebSocketStream };
use tokio_tungstenite::tungstenite::protocol::Message;

use chrono::Utc;
use futures::{ SinkExt, StreamExt };
use log::{ info, warn, error };
use uuid::Uuid;

pub async fn start_ws_server(
    addr: &str,
    context: ServerContext
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;
    info!("WS server listening on: {}", addr);
    serve(listener, context).await
}

pub async fn serve(
    listener: TcpListener,
    context: ServerContext
) -> Result<(), Box<dyn Error + Send + Sync>> {
    loop {
        let (stream, peer) = listener.accept().await?;
        info!("Incoming connection from: {}", peer);
        let context = context.clone();

        tokio::spawn(async move {
            match accept_async(stream).await {
                Ok(ws) => handle_connection(peer, ws, context).await,
                Err(e) => error!("Handshake failed for {}: {}", peer, e),
            }
        });
    }
}

fn frame(msg: &ServerMessage) -> Option<Message> {
    match serde_json::to_string(msg) {
        Ok(json) => Some(Message::Text(json)),
        Err(e) => {
            error!("Failed to encode server message: {}", e);
            None
        }
    }
}

fn view_message(view: &ChatView) -> ServerMessage {
    ServerMessage::Messages {
        messages: view.messages.clone(),
        loading: view.loading,
        timestamp: Utc::now().timestamp(),
    }
}

/// Runs one chat session for the lifetime of the connection. Every connection owns its
/// own view; all of them share the stored record.
pub async fn handle_connection<S>(
    peer: SocketAddr,
    websocket: WebSocketStream<S>,
    context: ServerContext
)
    where S: AsyncRead + AsyncWrite + Unpin + Send + 'static
{
    let session_id = Uuid::new_v4();
    info!("New WebSocket connection: {} (session {})", peer, session_id);

    let agent = Arc::new(ChatAgent::new(context.chat_client.clone(), context.store.clone()));
    agent.seed_history().await;

    let (mut sink, mut rx) = websocket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<Message>(32);

    let writer = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            if let Err(e) = sink.send(msg).await {
                error!("Failed to write to {}: {}", peer, e);
                break;
            }
        }
    });

    let mut view_rx = agent.subscribe();
    let view_tx = out_tx.clone();
    let forwarder = tokio::spawn(async move {
        loop {
            let msg = {
                let view = view_rx.borrow_and_update();
                view_message(&view)
            };
            if let Some(frame) = frame(&msg) {
                if view_tx.send(frame).await.is_err() {
                    break;
                }
            }
            if view_rx.changed().await.is_err() {
                break;
            }
        }
    });

    while let Some(msg) = rx.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(ClientMessage::Send { content }) => {
                        let agent = agent.clone();
                        let out = out_tx.clone();
                        tokio::spawn(async move {
                            if let Err(e) = agent.send(ChatMessage::user(content)).await {
                                let notice = ServerMessage::Error { message: e.to_string() };
                                if let Some(frame) = frame(&notice) {
                                    let _ = out.send(frame).await;
                                }
                            }
                        });
                    }
                    Ok(ClientMessage::History) => {
                        let agent = agent.clone();
                        let out = out_tx.clone();
                        tokio::spawn(async move {
                            let notice = match agent.reload().await {
                                ReloadOutcome::Replaced(_) => None,
                                ReloadOutcome::NoRecord =>
                                    Some(ServerMessage::Notice {
                                        message: "No previous history".to_string(),
                                    }),
                                ReloadOutcome::Failed =>
                                    Some(ServerMessage::Error {
                                        message: "Failed to load previous history".to_string(),
                                    }),
                            };
                            if let Some(frame) = notice.as_ref().and_then(frame) {
                                let _ = out.send(frame).await;
                            }
                        });
                    }
                    Ok(ClientMessage::Reset) => agent.reset(),
                    Err(e) => {
                        error!("Failed to parse message from {}: {}", peer, e);
                        let error_msg = ServerMessage::Error {
                            message: format!("Failed to parse message: {}", e),
                        };
                        if let Some(frame) = frame(&error_msg) {
                            if out_tx.send(frame).await.is_err() {
                                break;
                            }
                        }
                    }
                }
            }
            Ok(Message::Close(_)) => {
                info!("Received close frame from {}", peer);
                break;
            }
            Ok(Message::Ping(ping_data)) => {
                if out_tx.send(Message::Pong(ping_data)).await.is_err() {
                    error!("Failed to send pong to {}", peer);
                    break;
                }
            }
            Ok(Message::Binary(_)) => {
                warn!("Ignoring binary message from {}", peer);
            }
            Ok(_) => {}
            Err(e) => {
                info!("WebSocket connection closed or protocol error for {}: {}", peer, e);
                break;
            }
        }
    }

    forwarder.abort();
    writer.abort();
    info!("WebSocket connection closed for {} (session {})", peer, session_id);
}
