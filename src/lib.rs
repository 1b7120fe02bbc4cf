pub mod agent;
pub mod cli;
pub mod error;
pub mod history;
pub mod llm;
pub mod models;
pub mod server;
pub mod terminal;

use agent::ChatAgent;
use cli::Args;
use history::initialize_conversation_store;
use llm::LlmConfig;
use llm::chat::new_client as new_chat_client;
use log::info;
use server::{ Server, ServerContext };
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Surface: {}", args.surface);
    info!("History Store Type: {}", args.history_type);
    info!("History Store Host: {}", args.history_host);
    info!("History Record: {}/{}", args.history_collection, args.history_document);
    info!("Chat LLM Type: {}", args.chat_llm_type);
    if args.surface == "server" {
        info!("Server Address: {}", args.server_addr);
        info!("HTTP Port: {:?}", args.http_port);
        info!("Relay LLM Type: {}", args.relay_llm_type);
    }
    info!("-------------------------");

    let chat_config = LlmConfig::from_parts(
        &args.chat_llm_type,
        args.chat_base_url.clone(),
        &args.chat_api_key,
        args.chat_model.clone(),
        Some(args.system_prompt.clone())
    )?;
    let chat_client = new_chat_client(&chat_config)?;
    info!(
        "Chat client configured: Type={}, Model={}, BaseURL={:?}",
        chat_config.llm_type,
        chat_client.get_model(),
        chat_client.get_base_url().as_deref().unwrap_or("adapter default")
    );

    let store = initialize_conversation_store(&args).await?;

    match args.surface.to_lowercase().as_str() {
        "terminal" => {
            let agent = Arc::new(ChatAgent::new(chat_client, store));
            agent.seed_history().await;
            terminal::run_terminal(agent).await
        }
        "server" => {
            let relay_config = LlmConfig::from_parts(
                &args.relay_llm_type,
                args.relay_base_url.clone(),
                &args.relay_api_key,
                args.relay_model.clone(),
                Some(args.system_prompt.clone())
            )?;
            let relay_client = new_chat_client(&relay_config)?;
            info!(
                "Relay client configured: Type={}, Model={}, BaseURL={:?}",
                relay_config.llm_type,
                relay_client.get_model(),
                relay_client.get_base_url().as_deref().unwrap_or("adapter default")
            );

            let context = ServerContext { store, chat_client, relay_client };
            info!("Starting server on: {}", args.server_addr);
            let server = Server::new(args.server_addr.clone(), args.http_port, context);
            server.run().await
        }
        other => Err(format!("Unsupported surface: {}", other).into()),
    }
}
