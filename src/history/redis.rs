use async_trait::async_trait;
use crate::models::chat::{ ChatMessage, ConversationDocument };
use crate::history::DocumentStore;
use std::error::Error;
use redis::{ Client, AsyncCommands };

/// Keeps each record as one JSON value under `{prefix}{collection}/{document}`.
pub struct RedisDocumentStore {
    client: Client,
    key_prefix: String,
}

impl RedisDocumentStore {
    pub fn new(host: &str, key_prefix: &str) -> Result<Self, Box<dyn Error + Send + Sync>> {
        Ok(Self {
            client: Client::open(host)?,
            key_prefix: key_prefix.to_string(),
        })
    }

    async fn get_connection(&self) -> Result<redis::aio::MultiplexedConnection, redis::RedisError> {
        self.client.get_multiplexed_async_connection().await
    }

    fn key(&self, collection: &str, document: &str) -> String {
        format!("{}{}/{}", self.key_prefix, collection, document)
    }
}

#[async_trait]
impl DocumentStore for RedisDocumentStore {
    async fn read(
        &self,
        collection: &str,
        document: &str
    ) -> Result<Option<ConversationDocument>, Box<dyn Error + Send + Sync>> {
        let mut conn = self.get_connection().await?;
        let json: Option<String> = conn.get(self.key(collection, document)).await?;
        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn create(
        &self,
        collection: &str,
        document: &str,
        record: &ConversationDocument
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut conn = self.get_connection().await?;
        let json = serde_json::to_string(record)?;
        let _: () = conn.set(self.key(collection, document), json).await?;
        Ok(())
    }

    async fn update_messages(
        &self,
        collection: &str,
        document: &str,
        messages: &[ChatMessage]
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut conn = self.get_connection().await?;
        let key = self.key(collection, document);
        let record = ConversationDocument { message_db: messages.to_vec() };
        let json = serde_json::to_string(&record)?;

        // XX: only overwrite an existing record, like a document update.
        let reply: Option<String> = redis
            ::cmd("SET")
            .arg(&key)
            .arg(json)
            .arg("XX")
            .query_async(&mut conn).await?;

        match reply {
            Some(_) => Ok(()),
            None => Err(format!("No document to update at {}", key).into()),
        }
    }
}
