use crate::error::ChatError;
use crate::models::chat::{ CompletionRequest, ConversationDocument };
use super::ServerContext;
use std::error::Error;
use std::net::SocketAddr;
use axum::{
    routing::{ get, post },
    Router,
    extract::State,
    response::IntoResponse,
    http::StatusCode,
    Json,
};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tower_http::cors::{ Any, CorsLayer };
use log::{ info, error };

#[derive(Serialize)]
struct ErrorResponse {
    message: String,
}

pub fn router(context: ServerContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/chat", post(chat_handler))
        .route("/api/history", get(history_handler))
        .layer(cors)
        .with_state(context)
}

pub async fn start_http_server(
    http_port: u16,
    context: ServerContext
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let addr = format!("0.0.0.0:{}", http_port).parse::<SocketAddr>()?;
    info!("Starting HTTP API server on: http://{}", addr);

    let app = router(context);

    tokio::spawn(async move {
        match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => {
                if let Err(e) = axum::serve(listener, app.into_make_service()).await {
                    error!("HTTP server error: {}", e);
                }
            }
            Err(e) => {
                error!("Failed to bind HTTP server to {}: {}. Try a different port.", addr, e);
            }
        }
    });

    info!("HTTP server started");
    Ok(())
}

/// Relays the window to the upstream provider and answers with its message,
/// or `null` when the provider produced nothing.
async fn chat_handler(
    State(context): State<ServerContext>,
    Json(req): Json<CompletionRequest>
) -> impl IntoResponse {
    match context.relay_client.complete(&req.messages).await {
        Ok(Some(message)) => (StatusCode::OK, Json(message)).into_response(),
        Ok(None) => (StatusCode::OK, Json(JsonValue::Null)).into_response(),
        Err(e) => {
            error!("Relay upstream failed: {}", e);
            let status = match e {
                ChatError::Decode(_) | ChatError::Status { .. } | ChatError::Request(_) => StatusCode::BAD_GATEWAY,
                ChatError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, Json(ErrorResponse { message: e.to_string() })).into_response()
        }
    }
}

async fn history_handler(State(context): State<ServerContext>) -> impl IntoResponse {
    match context.store.fetch().await {
        Ok(Some(message_db)) => (StatusCode::OK, Json(ConversationDocument { message_db })).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, Json(ErrorResponse { message: "No previous history".into() })).into_response(),
        Err(e) => {
            error!("Failed to read stored history: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse { message: e.to_string() })).into_response()
        }
    }
}
