use crate::agent::{ ChatAgent, ChatView, ReloadOutcome };
use crate::models::chat::{ ChatMessage, Role };

use log::{ info, error };
use std::error::Error;
use std::sync::Arc;
use tokio::io::{ AsyncBufRead, AsyncBufReadExt, BufReader };
use tokio::sync::{ oneshot, watch };
use tokio::task::JoinSet;

#[derive(Debug, PartialEq, Eq)]
pub enum Input {
    Send(String),
    History,
    Reset,
    Quit,
    Empty,
}

pub fn parse_input(line: &str) -> Input {
    let trimmed = line.trim();
    match trimmed {
        "" => Input::Empty,
        "/history" => Input::History,
        "/new" => Input::Reset,
        "/quit" | "/exit" => Input::Quit,
        _ => Input::Send(trimmed.to_string()),
    }
}

fn render_message(msg: &ChatMessage) -> String {
    let speaker = match msg.role {
        Role::User => "you",
        Role::Assistant => "nyang",
        Role::System => "system",
    };
    format!("{:>6} > {}", speaker, msg.content)
}

/// Lines to print to move the screen from `shown` to `view`. Appends print only the
/// new tail; any other change redraws the whole list.
pub fn render_update(shown: &[ChatMessage], view: &ChatView) -> Vec<String> {
    let mut lines = Vec::new();
    if view.messages.starts_with(shown) {
        lines.extend(view.messages[shown.len()..].iter().map(render_message));
    } else {
        lines.push("------------------------------".to_string());
        lines.extend(view.messages.iter().map(render_message));
    }
    lines
}

/// What has been printed so far, so each update only prints the difference.
#[derive(Default)]
struct Screen {
    shown: Vec<ChatMessage>,
    was_loading: bool,
}

impl Screen {
    fn draw(&mut self, view: &ChatView) -> Vec<String> {
        let mut lines = render_update(&self.shown, view);
        if view.loading && !self.was_loading {
            lines.push("        ... nyang is typing".to_string());
        }
        self.was_loading = view.loading;
        self.shown = view.messages.clone();
        lines
    }
}

/// Prints view updates until `shutdown` fires, then draws the final view once more.
async fn render_loop(mut view_rx: watch::Receiver<ChatView>, mut shutdown: oneshot::Receiver<()>) {
    let mut screen = Screen::default();
    let mut stopping = false;
    loop {
        let view = view_rx.borrow_and_update().clone();
        for line in screen.draw(&view) {
            println!("{}", line);
        }
        if stopping {
            break;
        }

        tokio::select! {
            changed = view_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = &mut shutdown => stopping = true,
        }
    }
}

/// Applies each input line to `agent` until end of input or `/quit`.
///
/// Sends run in the background so `/new` and `/history` stay available while a reply is
/// pending. Both ways of leaving wait for every started send to finish, including its
/// persist, before returning.
pub async fn read_commands<R>(
    agent: &Arc<ChatAgent>,
    input: R
) -> Result<(), Box<dyn Error + Send + Sync>>
    where R: AsyncBufRead + Unpin
{
    let mut sends = JoinSet::new();
    let mut lines = input.lines();

    while let Some(line) = lines.next_line().await? {
        match parse_input(&line) {
            Input::Empty => {}
            Input::Quit => break,
            Input::Reset => agent.reset(),
            Input::History => {
                if agent.reload().await == ReloadOutcome::NoRecord {
                    println!("(no previous history)");
                }
            }
            Input::Send(content) => {
                let agent = agent.clone();
                sends.spawn(async move {
                    if let Err(e) = agent.send(ChatMessage::user(content)).await {
                        error!("Send failed: {}", e);
                    }
                });
            }
        }
    }

    if !sends.is_empty() {
        info!("Waiting for {} pending replies", sends.len());
    }
    while let Some(joined) = sends.join_next().await {
        if let Err(e) = joined {
            error!("Send task failed: {}", e);
        }
    }
    Ok(())
}

/// Interactive loop on stdin/stdout.
pub async fn run_terminal(agent: Arc<ChatAgent>) -> Result<(), Box<dyn Error + Send + Sync>> {
    println!("Type a message and press enter. /history shows previous history, /new starts over, /quit exits.");
    let (stop_tx, stop_rx) = oneshot::channel();
    let renderer = tokio::spawn(render_loop(agent.subscribe(), stop_rx));

    let result = read_commands(&agent, BufReader::new(tokio::io::stdin())).await;

    let _ = stop_tx.send(());
    if let Err(e) = renderer.await {
        error!("Renderer stopped abnormally: {}", e);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChatError;
    use crate::history::{ ConversationStore, MemoryDocumentStore, DEFAULT_COLLECTION, DEFAULT_DOCUMENT };
    use crate::llm::chat::ChatClient;
    use async_trait::async_trait;
    use std::time::Duration;

    /// Answers "meow" after a delay, like a slow completion backend.
    struct SlowClient;

    #[async_trait]
    impl ChatClient for SlowClient {
        async fn complete(&self, _messages: &[ChatMessage]) -> Result<Option<ChatMessage>, ChatError> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(Some(ChatMessage::assistant("meow")))
        }

        fn get_model(&self) -> String {
            "slow".into()
        }

        fn get_base_url(&self) -> Option<String> {
            None
        }
    }

    fn session() -> (Arc<ChatAgent>, Arc<ConversationStore>) {
        let store = Arc::new(
            ConversationStore::new(
                Arc::new(MemoryDocumentStore::new()),
                DEFAULT_COLLECTION,
                DEFAULT_DOCUMENT,
                ChatMessage::assistant("hi")
            )
        );
        (Arc::new(ChatAgent::new(Arc::new(SlowClient), store.clone())), store)
    }

    #[tokio::test]
    async fn end_of_input_waits_for_pending_reply_and_persist() {
        let (agent, store) = session();

        read_commands(&agent, &b"hello\n"[..]).await.unwrap();

        let expected = vec![
            ChatMessage::assistant("hi"),
            ChatMessage::user("hello"),
            ChatMessage::assistant("meow")
        ];
        assert_eq!(agent.messages(), expected);
        assert!(!agent.is_loading());
        assert_eq!(store.fetch().await.unwrap(), Some(expected));
    }

    #[tokio::test]
    async fn quit_stops_reading_but_finishes_started_sends() {
        let (agent, store) = session();

        read_commands(&agent, &b"hello\n/quit\nignored\n"[..]).await.unwrap();

        assert_eq!(agent.messages().len(), 3);
        assert_eq!(store.fetch().await.unwrap().map(|m| m.len()), Some(3));
    }

    #[test]
    fn screen_prints_typing_indicator_once_per_reply() {
        let mut screen = Screen::default();
        let greeting = ChatView { messages: vec![ChatMessage::assistant("hi")], loading: false };
        assert_eq!(screen.draw(&greeting), vec![" nyang > hi".to_string()]);

        let pending = ChatView {
            messages: vec![ChatMessage::assistant("hi"), ChatMessage::user("hello")],
            loading: true,
        };
        assert_eq!(screen.draw(&pending), vec![
            "   you > hello".to_string(),
            "        ... nyang is typing".to_string()
        ]);
        assert!(screen.draw(&pending).is_empty());
    }

    #[test]
    fn parses_commands_and_messages() {
        assert_eq!(parse_input("  "), Input::Empty);
        assert_eq!(parse_input("/history"), Input::History);
        assert_eq!(parse_input("/new\n"), Input::Reset);
        assert_eq!(parse_input("/quit"), Input::Quit);
        assert_eq!(parse_input(" hello nyang "), Input::Send("hello nyang".to_string()));
    }

    #[test]
    fn appends_print_only_new_messages() {
        let shown = vec![ChatMessage::assistant("hi")];
        let view = ChatView {
            messages: vec![ChatMessage::assistant("hi"), ChatMessage::user("hello")],
            loading: true,
        };
        assert_eq!(render_update(&shown, &view), vec!["   you > hello".to_string()]);
    }

    #[test]
    fn replaced_conversation_is_redrawn() {
        let shown = vec![ChatMessage::assistant("hi"), ChatMessage::user("hello")];
        let view = ChatView { messages: vec![ChatMessage::assistant("hi")], loading: false };
        let lines = render_update(&shown, &view);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], " nyang > hi");
    }
}
