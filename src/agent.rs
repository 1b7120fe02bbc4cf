use crate::error::ChatError;
use crate::history::ConversationStore;
use crate::llm::chat::ChatClient;
use crate::models::chat::{ trailing_window, ChatMessage };

use log::{ info, warn, error };
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;

/// Number of trailing messages sent to the completion backend.
pub const COMPLETION_WINDOW: usize = 6;

/// What the rendering layer draws: the message list and the busy indicator.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ChatView {
    pub messages: Vec<ChatMessage>,
    pub loading: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// The view now holds the stored conversation of this many messages.
    Replaced(usize),
    NoRecord,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Replied(ChatMessage),
    /// The backend answered with an empty result; nothing was appended or persisted.
    NoReply,
}

/// Owns one conversation view and drives it through the completion backend and the store.
///
/// Every state change is published on a watch channel, so subscribers observe the
/// optimistic user message before any network call returns. The `loading` flag is
/// advisory: overlapping sends are not rejected.
pub struct ChatAgent {
    chat_client: Arc<dyn ChatClient>,
    store: Arc<ConversationStore>,
    greeting: ChatMessage,
    view: watch::Sender<ChatView>,
}

impl ChatAgent {
    pub fn new(chat_client: Arc<dyn ChatClient>, store: Arc<ConversationStore>) -> Self {
        let greeting = store.greeting().clone();
        let (view, _) = watch::channel(ChatView {
            messages: vec![greeting.clone()],
            loading: false,
        });

        Self {
            chat_client,
            store,
            greeting,
            view,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ChatView> {
        self.view.subscribe()
    }

    pub fn snapshot(&self) -> ChatView {
        self.view.borrow().clone()
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.view.borrow().messages.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.view.borrow().loading
    }

    /// Makes sure the backing record exists. The view is left alone.
    pub async fn seed_history(&self) {
        match self.store.load().await {
            Ok(messages) => info!("Conversation record holds {} messages", messages.len()),
            Err(e) => error!("Failed to prepare conversation record: {}", e),
        }
    }

    /// Starts a new conversation locally. The stored record is not touched.
    pub fn reset(&self) {
        let greeting = self.greeting.clone();
        self.view.send_modify(|view| {
            view.messages = vec![greeting];
        });
    }

    /// Replaces the view with the stored conversation. Store failures are logged, not raised.
    pub async fn reload(&self) -> ReloadOutcome {
        match self.store.fetch().await {
            Ok(Some(stored)) => {
                let count = stored.len();
                self.view.send_modify(|view| {
                    view.messages = stored;
                });
                info!("Loaded {} messages from previous history", count);
                ReloadOutcome::Replaced(count)
            }
            Ok(None) => {
                info!("No previous history");
                ReloadOutcome::NoRecord
            }
            Err(e) => {
                error!("Failed to load previous history: {}", e);
                ReloadOutcome::Failed
            }
        }
    }

    /// Appends `message`, asks the backend for a reply and persists the pair.
    ///
    /// A failed completion keeps the optimistic append in the view. A store failure after
    /// a successful completion is returned as [`ChatError::Store`] with the reply already
    /// shown.
    pub async fn send(&self, message: ChatMessage) -> Result<SendOutcome, ChatError> {
        let mut window = Vec::new();
        self.view.send_modify(|view| {
            view.messages.push(message.clone());
            view.loading = true;
            window = trailing_window(&view.messages, COMPLETION_WINDOW).to_vec();
        });

        let reply = match self.chat_client.complete(&window).await {
            Ok(Some(reply)) => reply,
            Ok(None) => {
                // An empty reply still ends the busy state; nothing is appended or persisted.
                self.set_loading(false);
                warn!("Completion backend returned an empty result");
                return Ok(SendOutcome::NoReply);
            }
            Err(e) => {
                self.set_loading(false);
                error!("Completion request failed: {}", e);
                return Err(e);
            }
        };

        self.view.send_modify(|view| {
            view.loading = false;
            view.messages.push(reply.clone());
        });

        self.store.append_and_persist(&message, &reply).await.map_err(ChatError::Store)?;
        Ok(SendOutcome::Replied(reply))
    }

    fn set_loading(&self, loading: bool) {
        self.view.send_modify(|view| {
            view.loading = loading;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{ DocumentStore, MemoryDocumentStore, DEFAULT_COLLECTION, DEFAULT_DOCUMENT };
    use crate::models::chat::ConversationDocument;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::error::Error;
    use tokio::sync::{ Mutex, Notify };

    type Scripted = Result<Option<ChatMessage>, ChatError>;

    /// Replays scripted results and records every window it receives.
    struct ScriptedClient {
        replies: Mutex<VecDeque<Scripted>>,
        windows: Mutex<Vec<Vec<ChatMessage>>>,
        gate: Option<Arc<Notify>>,
    }

    impl ScriptedClient {
        fn new(replies: Vec<Scripted>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                windows: Mutex::new(Vec::new()),
                gate: None,
            }
        }

        fn gated(replies: Vec<Scripted>, gate: Arc<Notify>) -> Self {
            Self { gate: Some(gate), ..Self::new(replies) }
        }
    }

    #[async_trait]
    impl ChatClient for ScriptedClient {
        async fn complete(&self, messages: &[ChatMessage]) -> Result<Option<ChatMessage>, ChatError> {
            self.windows.lock().await.push(messages.to_vec());
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.replies.lock().await.pop_front().unwrap_or(Ok(None))
        }

        fn get_model(&self) -> String {
            "scripted".into()
        }

        fn get_base_url(&self) -> Option<String> {
            None
        }
    }

    /// A store that fails every call.
    struct BrokenStore;

    #[async_trait]
    impl DocumentStore for BrokenStore {
        async fn read(&self, _: &str, _: &str) -> Result<Option<ConversationDocument>, Box<dyn Error + Send + Sync>> {
            Err("store unavailable".into())
        }

        async fn create(&self, _: &str, _: &str, _: &ConversationDocument) -> Result<(), Box<dyn Error + Send + Sync>> {
            Err("store unavailable".into())
        }

        async fn update_messages(&self, _: &str, _: &str, _: &[ChatMessage]) -> Result<(), Box<dyn Error + Send + Sync>> {
            Err("store unavailable".into())
        }
    }

    fn greeting() -> ChatMessage {
        ChatMessage::assistant("hi")
    }

    fn conversation_store(backend: Arc<dyn DocumentStore>) -> Arc<ConversationStore> {
        Arc::new(ConversationStore::new(backend, DEFAULT_COLLECTION, DEFAULT_DOCUMENT, greeting()))
    }

    fn agent_with(client: Arc<ScriptedClient>, backend: Arc<dyn DocumentStore>) -> ChatAgent {
        ChatAgent::new(client, conversation_store(backend))
    }

    async fn stored(backend: &MemoryDocumentStore) -> Option<Vec<ChatMessage>> {
        backend
            .read(DEFAULT_COLLECTION, DEFAULT_DOCUMENT).await
            .unwrap()
            .map(|doc| doc.message_db)
    }

    #[tokio::test]
    async fn starts_with_greeting_without_touching_store() {
        let backend = Arc::new(MemoryDocumentStore::new());
        let agent = agent_with(Arc::new(ScriptedClient::new(vec![])), backend.clone());

        assert_eq!(agent.snapshot(), ChatView { messages: vec![greeting()], loading: false });
        assert!(stored(&backend).await.is_none());
    }

    #[tokio::test]
    async fn send_appends_user_message_then_reply_and_persists_pair() {
        let backend = Arc::new(MemoryDocumentStore::new());
        backend
            .create(DEFAULT_COLLECTION, DEFAULT_DOCUMENT, &ConversationDocument {
                message_db: vec![greeting()],
            }).await
            .unwrap();
        let client = Arc::new(ScriptedClient::new(vec![Ok(Some(ChatMessage::assistant("hey")))]));
        let agent = agent_with(client.clone(), backend.clone());

        let outcome = agent.send(ChatMessage::user("hello")).await.unwrap();

        assert_eq!(outcome, SendOutcome::Replied(ChatMessage::assistant("hey")));
        let expected = vec![greeting(), ChatMessage::user("hello"), ChatMessage::assistant("hey")];
        assert_eq!(agent.messages(), expected);
        assert!(!agent.is_loading());
        assert_eq!(stored(&backend).await.unwrap(), expected);
        assert_eq!(client.windows.lock().await[0], vec![greeting(), ChatMessage::user("hello")]);
    }

    #[tokio::test]
    async fn window_is_last_six_including_new_message() {
        let replies = (0..5)
            .map(|i| Ok(Some(ChatMessage::assistant(format!("r{}", i)))))
            .collect();
        let client = Arc::new(ScriptedClient::new(replies));
        let agent = agent_with(client.clone(), Arc::new(MemoryDocumentStore::new()));

        for i in 0..5 {
            agent.send(ChatMessage::user(format!("u{}", i))).await.unwrap();
        }

        let windows = client.windows.lock().await;
        assert_eq!(windows[0].len(), 2);
        assert_eq!(windows[2].len(), COMPLETION_WINDOW);
        let last = windows.last().unwrap();
        assert_eq!(last.len(), COMPLETION_WINDOW);
        assert_eq!(last.last(), Some(&ChatMessage::user("u4")));
        assert_eq!(last.first(), Some(&ChatMessage::assistant("r1")));
    }

    #[tokio::test]
    async fn optimistic_append_is_visible_before_reply() {
        let gate = Arc::new(Notify::new());
        let client = Arc::new(
            ScriptedClient::gated(vec![Ok(Some(ChatMessage::assistant("hey")))], gate.clone())
        );
        let agent = Arc::new(agent_with(client, Arc::new(MemoryDocumentStore::new())));
        let mut rx = agent.subscribe();

        let sending = {
            let agent = agent.clone();
            tokio::spawn(async move { agent.send(ChatMessage::user("hello")).await })
        };

        rx.changed().await.unwrap();
        let view = rx.borrow_and_update().clone();
        assert!(view.loading);
        assert_eq!(view.messages, vec![greeting(), ChatMessage::user("hello")]);

        gate.notify_one();
        sending.await.unwrap().unwrap();
        assert_eq!(agent.messages().len(), 3);
        assert!(!agent.is_loading());
    }

    #[tokio::test]
    async fn transport_failure_keeps_optimistic_append_and_skips_store() {
        let backend = Arc::new(MemoryDocumentStore::new());
        let client = Arc::new(
            ScriptedClient::new(
                vec![Err(ChatError::Status { status: 500, reason: "Internal Server Error".into() })]
            )
        );
        let agent = agent_with(client, backend.clone());

        let result = agent.send(ChatMessage::user("hello")).await;

        assert!(matches!(result, Err(ChatError::Status { status: 500, .. })));
        assert_eq!(agent.messages(), vec![greeting(), ChatMessage::user("hello")]);
        assert!(!agent.is_loading());
        assert!(stored(&backend).await.is_none());
    }

    #[tokio::test]
    async fn empty_result_is_a_silent_no_op() {
        let backend = Arc::new(MemoryDocumentStore::new());
        let agent = agent_with(Arc::new(ScriptedClient::new(vec![Ok(None)])), backend.clone());

        let outcome = agent.send(ChatMessage::user("hello")).await.unwrap();

        assert_eq!(outcome, SendOutcome::NoReply);
        assert_eq!(agent.messages(), vec![greeting(), ChatMessage::user("hello")]);
        assert!(!agent.is_loading());
        assert!(stored(&backend).await.is_none());
    }

    #[tokio::test]
    async fn persist_appends_to_stored_copy_not_view() {
        let backend = Arc::new(MemoryDocumentStore::new());
        let client = Arc::new(
            ScriptedClient::new(
                vec![
                    Ok(Some(ChatMessage::assistant("a1"))),
                    Ok(Some(ChatMessage::assistant("a2")))
                ]
            )
        );
        let agent = agent_with(client, backend.clone());

        agent.send(ChatMessage::user("u1")).await.unwrap();
        agent.reset();
        agent.send(ChatMessage::user("u2")).await.unwrap();

        assert_eq!(
            agent.messages(),
            vec![greeting(), ChatMessage::user("u2"), ChatMessage::assistant("a2")]
        );
        assert_eq!(
            stored(&backend).await.unwrap(),
            vec![
                greeting(),
                ChatMessage::user("u1"),
                ChatMessage::assistant("a1"),
                ChatMessage::user("u2"),
                ChatMessage::assistant("a2")
            ]
        );
    }

    #[tokio::test]
    async fn store_failure_after_reply_is_raised() {
        let client = Arc::new(ScriptedClient::new(vec![Ok(Some(ChatMessage::assistant("hey")))]));
        let agent = agent_with(client, Arc::new(BrokenStore));

        let result = agent.send(ChatMessage::user("hello")).await;

        assert!(matches!(result, Err(ChatError::Store(_))));
        assert_eq!(agent.messages().len(), 3);
        assert!(!agent.is_loading());
    }

    #[tokio::test]
    async fn reset_always_yields_greeting() {
        let client = Arc::new(ScriptedClient::new(vec![Ok(Some(ChatMessage::assistant("hey")))]));
        let agent = agent_with(client, Arc::new(MemoryDocumentStore::new()));
        agent.send(ChatMessage::user("hello")).await.unwrap();

        agent.reset();
        assert_eq!(agent.messages(), vec![greeting()]);
        agent.reset();
        assert_eq!(agent.messages(), vec![greeting()]);
    }

    #[tokio::test]
    async fn reload_replaces_view_with_stored_conversation() {
        let backend = Arc::new(MemoryDocumentStore::new());
        let stored_messages = vec![ChatMessage::assistant("old"), ChatMessage::user("older")];
        backend
            .create(DEFAULT_COLLECTION, DEFAULT_DOCUMENT, &ConversationDocument {
                message_db: stored_messages.clone(),
            }).await
            .unwrap();
        let agent = agent_with(Arc::new(ScriptedClient::new(vec![])), backend);

        assert_eq!(agent.reload().await, ReloadOutcome::Replaced(2));
        assert_eq!(agent.messages(), stored_messages);
    }

    #[tokio::test]
    async fn reload_without_record_or_with_broken_store_keeps_view() {
        let agent = agent_with(Arc::new(ScriptedClient::new(vec![])), Arc::new(MemoryDocumentStore::new()));
        assert_eq!(agent.reload().await, ReloadOutcome::NoRecord);
        assert_eq!(agent.messages(), vec![greeting()]);

        let broken = agent_with(Arc::new(ScriptedClient::new(vec![])), Arc::new(BrokenStore));
        assert_eq!(broken.reload().await, ReloadOutcome::Failed);
        assert_eq!(broken.messages(), vec![greeting()]);
    }

    #[tokio::test]
    async fn seed_history_creates_record_but_leaves_view() {
        let backend = Arc::new(MemoryDocumentStore::new());
        let client = Arc::new(ScriptedClient::new(vec![]));
        let agent = agent_with(client, backend.clone());

        agent.seed_history().await;

        assert_eq!(stored(&backend).await.unwrap(), vec![greeting()]);
        assert_eq!(agent.messages(), vec![greeting()]);
    }
}
