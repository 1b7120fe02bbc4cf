use async_trait::async_trait;
use crate::history::DocumentStore;
use crate::models::chat::{ ChatMessage, ConversationDocument, Role };
use log::info;
use reqwest::header::{ ACCEPT, AUTHORIZATION };
use serde::{ Deserialize, Serialize };
use std::error::Error;
use std::path::Path;
use yup_oauth2::{ read_service_account_key, ServiceAccountAuthenticator };
use yup_oauth2::authenticator::DefaultAuthenticator;

const FIRESTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";
const FIRESTORE_API: &str = "https://firestore.googleapis.com/v1";

// Firestore REST encodes every value as a single-key object naming its type.

#[derive(Serialize, Deserialize, Debug, Default)]
struct FirestoreDocument {
    #[serde(default)]
    fields: DocumentFields,
}

#[derive(Serialize, Deserialize, Debug, Default)]
struct DocumentFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    message_db: Option<ArrayField>,
}

#[derive(Serialize, Deserialize, Debug)]
struct ArrayField {
    #[serde(rename = "arrayValue")]
    array_value: ArrayValue,
}

#[derive(Serialize, Deserialize, Debug)]
struct ArrayValue {
    // Firestore omits `values` for an empty array.
    #[serde(default)]
    values: Vec<MapField>,
}

#[derive(Serialize, Deserialize, Debug)]
struct MapField {
    #[serde(rename = "mapValue")]
    map_value: MapValue,
}

#[derive(Serialize, Deserialize, Debug)]
struct MapValue {
    fields: MessageFields,
}

#[derive(Serialize, Deserialize, Debug)]
struct MessageFields {
    role: StringField,
    content: StringField,
}

#[derive(Serialize, Deserialize, Debug)]
struct StringField {
    #[serde(rename = "stringValue")]
    string_value: String,
}

impl FirestoreDocument {
    fn from_messages(messages: &[ChatMessage]) -> Self {
        let values = messages
            .iter()
            .map(|msg| MapField {
                map_value: MapValue {
                    fields: MessageFields {
                        role: StringField { string_value: msg.role.as_str().to_string() },
                        content: StringField { string_value: msg.content.clone() },
                    },
                },
            })
            .collect();

        Self {
            fields: DocumentFields {
                message_db: Some(ArrayField { array_value: ArrayValue { values } }),
            },
        }
    }

    fn into_conversation(self) -> Result<ConversationDocument, Box<dyn Error + Send + Sync>> {
        let values = match self.fields.message_db {
            Some(field) => field.array_value.values,
            None => Vec::new(),
        };

        let mut message_db = Vec::with_capacity(values.len());
        for value in values {
            let fields = value.map_value.fields;
            let role: Role = fields.role.string_value.parse()?;
            message_db.push(ChatMessage::new(role, fields.content.string_value));
        }
        Ok(ConversationDocument { message_db })
    }
}

/// Source of the bearer token sent with every Firestore request.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String, Box<dyn Error + Send + Sync>>;
}

#[async_trait]
impl AccessTokenProvider for DefaultAuthenticator {
    async fn access_token(&self) -> Result<String, Box<dyn Error + Send + Sync>> {
        let token = self.token(&[FIRESTORE_SCOPE]).await?;
        token
            .token()
            .map(|t| t.to_string())
            .ok_or_else(|| "OAuth token was None".into())
    }
}

/// Firestore-backed record access over the REST API, authenticated with a service account.
pub struct FirestoreDocumentStore {
    client: reqwest::Client,
    tokens: Box<dyn AccessTokenProvider>,
    base_url: String,
    project_id: String,
}

impl FirestoreDocumentStore {
    pub async fn from_service_account(
        project_id: &str,
        sa_key_path: &str
    ) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let key = read_service_account_key(Path::new(sa_key_path)).await.map_err(|e|
            format!("Failed to load SA key from {}: {}", sa_key_path, e)
        )?;
        let auth = ServiceAccountAuthenticator::builder(key).build().await?;
        info!("Firestore store configured for project {}", project_id);

        Ok(Self::new_with(FIRESTORE_API, project_id, Box::new(auth)))
    }

    /// Talks to the REST API rooted at `base_url` (e.g. an emulator) with the given tokens.
    pub fn new_with(
        base_url: impl Into<String>,
        project_id: impl Into<String>,
        tokens: Box<dyn AccessTokenProvider>
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            tokens,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            project_id: project_id.into(),
        }
    }

    fn document_url(&self, collection: &str, document: &str) -> String {
        document_url(&self.base_url, &self.project_id, collection, document)
    }

    async fn patch(
        &self,
        url: &str,
        query: &[(&str, &str)],
        body: &FirestoreDocument
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let token = self.tokens.access_token().await?;
        let resp = self.client
            .patch(url)
            .query(query)
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .header(ACCEPT, "application/json")
            .json(body)
            .send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let err_body = resp.text().await.unwrap_or_default();
            return Err(format!("Unexpected status {}: {}", status, err_body).into());
        }
        Ok(())
    }
}

fn document_url(base_url: &str, project_id: &str, collection: &str, document: &str) -> String {
    format!(
        "{}/projects/{}/databases/(default)/documents/{}/{}",
        base_url,
        project_id,
        collection,
        document
    )
}

#[async_trait]
impl DocumentStore for FirestoreDocumentStore {
    async fn read(
        &self,
        collection: &str,
        document: &str
    ) -> Result<Option<ConversationDocument>, Box<dyn Error + Send + Sync>> {
        let token = self.tokens.access_token().await?;
        let resp = self.client
            .get(self.document_url(collection, document))
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .header(ACCEPT, "application/json")
            .send().await?;

        match resp.status() {
            reqwest::StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => {
                let doc = resp.json::<FirestoreDocument>().await?;
                Ok(Some(doc.into_conversation()?))
            }
            s => {
                let err_body = resp.text().await.unwrap_or_default();
                Err(format!("Unexpected status {}: {}", s, err_body).into())
            }
        }
    }

    async fn create(
        &self,
        collection: &str,
        document: &str,
        record: &ConversationDocument
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let url = self.document_url(collection, document);
        let body = FirestoreDocument::from_messages(&record.message_db);
        self.patch(&url, &[], &body).await
    }

    async fn update_messages(
        &self,
        collection: &str,
        document: &str,
        messages: &[ChatMessage]
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let url = self.document_url(collection, document);
        let body = FirestoreDocument::from_messages(messages);
        self.patch(
            &url,
            &[
                ("updateMask.fieldPaths", "message_db"),
                ("currentDocument.exists", "true"),
            ],
            &body
        ).await
    }
}
