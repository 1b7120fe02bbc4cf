mod firestore;
mod memory;
mod redis;

pub use firestore::{ AccessTokenProvider, FirestoreDocumentStore };
pub use memory::MemoryDocumentStore;
pub use redis::RedisDocumentStore;

use async_trait::async_trait;
use log::info;
use std::error::Error;
use crate::cli::Args;
use std::sync::Arc;
use crate::models::chat::{ ChatMessage, ConversationDocument };

pub const DEFAULT_GREETING: &str = "안녕? 나는 냥이라고 한다냥. 궁금한 게 있냥?";
pub const DEFAULT_COLLECTION: &str = "message_collection";
pub const DEFAULT_DOCUMENT: &str = "message_document";

/// Raw record access against an external document database.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Returns `None` when the record does not exist.
    async fn read(
        &self,
        collection: &str,
        document: &str
    ) -> Result<Option<ConversationDocument>, Box<dyn Error + Send + Sync>>;

    /// Writes the whole record, replacing it if present.
    async fn create(
        &self,
        collection: &str,
        document: &str,
        record: &ConversationDocument
    ) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Overwrites the `message_db` field. Fails if the record does not exist.
    async fn update_messages(
        &self,
        collection: &str,
        document: &str,
        messages: &[ChatMessage]
    ) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// The single conversation record, addressed by a fixed collection and document name.
///
/// Writes are read-then-overwrite with no concurrency token: two writers racing
/// between the read and the write lose one of their appends.
pub struct ConversationStore {
    backend: Arc<dyn DocumentStore>,
    collection: String,
    document: String,
    greeting: ChatMessage,
}

impl ConversationStore {
    pub fn new(
        backend: Arc<dyn DocumentStore>,
        collection: impl Into<String>,
        document: impl Into<String>,
        greeting: ChatMessage
    ) -> Self {
        Self {
            backend,
            collection: collection.into(),
            document: document.into(),
            greeting,
        }
    }

    pub fn greeting(&self) -> &ChatMessage {
        &self.greeting
    }

    /// Reads the stored conversation without touching the record.
    pub async fn fetch(&self) -> Result<Option<Vec<ChatMessage>>, Box<dyn Error + Send + Sync>> {
        let record = self.backend.read(&self.collection, &self.document).await?;
        Ok(record.map(|doc| doc.message_db))
    }

    /// Returns the stored conversation, creating the record with the greeting on first use.
    pub async fn load(&self) -> Result<Vec<ChatMessage>, Box<dyn Error + Send + Sync>> {
        if let Some(messages) = self.fetch().await? {
            return Ok(messages);
        }

        info!(
            "No conversation record at {}/{}, creating it with the default greeting",
            self.collection,
            self.document
        );
        let record = ConversationDocument {
            message_db: vec![self.greeting.clone()],
        };
        self.backend.create(&self.collection, &self.document, &record).await?;
        Ok(record.message_db)
    }

    /// Appends the pair to the stored copy (not the caller's in-memory copy) and
    /// overwrites the record with the result.
    pub async fn append_and_persist(
        &self,
        user: &ChatMessage,
        reply: &ChatMessage
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut message_db = self.load().await?;
        message_db.push(user.clone());
        message_db.push(reply.clone());
        self.backend.update_messages(&self.collection, &self.document, &message_db).await?;
        info!("Persisted conversation with {} messages", message_db.len());
        Ok(())
    }
}

pub async fn create_document_store(
    args: &Args
) -> Result<Arc<dyn DocumentStore>, Box<dyn Error + Send + Sync>> {
    match args.history_type.to_lowercase().as_str() {
        "redis" => {
            let store = RedisDocumentStore::new(&args.history_host, &args.history_redis_prefix)?;
            Ok(Arc::new(store))
        }
        "firestore" => {
            let project_id = args.firestore_project_id
                .as_deref()
                .ok_or("FIRESTORE_PROJECT_ID is required for the firestore history store")?;
            let sa_key_path = args.firestore_sa_key_path
                .as_deref()
                .ok_or("FIRESTORE_SA_KEY_PATH is required for the firestore history store")?;
            let store = FirestoreDocumentStore::from_service_account(
                project_id,
                sa_key_path
            ).await?;
            Ok(Arc::new(store))
        }
        "memory" => Ok(Arc::new(MemoryDocumentStore::new())),
        _ =>
            Err(
                Box::new(
                    std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        format!("Unsupported history store type: {}", args.history_type)
                    )
                )
            ),
    }
}

pub async fn initialize_conversation_store(
    args: &Args
) -> Result<Arc<ConversationStore>, Box<dyn Error + Send + Sync>> {
    info!(
        "Conversation will be stored in: {} at {}/{}",
        args.history_type,
        args.history_collection,
        args.history_document
    );
    let backend = create_document_store(args).await?;
    Ok(
        Arc::new(
            ConversationStore::new(
                backend,
                args.history_collection.clone(),
                args.history_document.clone(),
                ChatMessage::assistant(args.greeting.clone())
            )
        )
    )
}
