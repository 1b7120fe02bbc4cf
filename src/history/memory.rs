use async_trait::async_trait;
use crate::history::DocumentStore;
use crate::models::chat::{ ChatMessage, ConversationDocument };
use std::collections::HashMap;
use std::error::Error;
use tokio::sync::RwLock;

/// Process-local document store. Records live as long as the process.
#[derive(Default)]
pub struct MemoryDocumentStore {
    records: RwLock<HashMap<(String, String), ConversationDocument>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn record_key(collection: &str, document: &str) -> (String, String) {
    (collection.to_string(), document.to_string())
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn read(
        &self,
        collection: &str,
        document: &str
    ) -> Result<Option<ConversationDocument>, Box<dyn Error + Send + Sync>> {
        let records = self.records.read().await;
        Ok(records.get(&record_key(collection, document)).cloned())
    }

    async fn create(
        &self,
        collection: &str,
        document: &str,
        record: &ConversationDocument
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut records = self.records.write().await;
        records.insert(record_key(collection, document), record.clone());
        Ok(())
    }

    async fn update_messages(
        &self,
        collection: &str,
        document: &str,
        messages: &[ChatMessage]
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut records = self.records.write().await;
        match records.get_mut(&record_key(collection, document)) {
            Some(record) => {
                record.message_db = messages.to_vec();
                Ok(())
            }
            None => Err(format!("No document to update at {}/{}", collection, document).into()),
        }
    }
}
