//! State of the interactive session: which view is showing, the last search,
//! and the conversation with the open paper.

use papertalk_core::index::clamp_max_results;
use papertalk_core::{ChatSession, PaperSummary, SearchMode, SearchQuery};

use crate::action::Action;

pub const GREETING: &str = "I've finished reading the paper. Ask me anything about its content!";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Screen {
    #[default]
    Search,
    Chat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    User,
    Assistant,
}

/// A chat line as shown to the user. The context turn never appears here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayMessage {
    pub speaker: Speaker,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct SearchState {
    pub query: String,
    pub mode: SearchMode,
    pub max_results: usize,
    pub results: Vec<PaperSummary>,
}

impl SearchState {
    fn new(max_results: usize) -> Self {
        Self {
            query: String::new(),
            mode: SearchMode::default(),
            max_results: clamp_max_results(max_results),
            results: Vec::new(),
        }
    }
}

/// Work the caller has to carry out after [`App::update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    None,
    /// Run this query and hand the hits to [`App::set_results`].
    Search(SearchQuery),
    /// Ingest the paper and start a chat, then call [`App::attach_chat`]
    /// or [`App::chat_failed`].
    PrepareChat(PaperSummary),
    /// Forward this prompt with [`App::send_prompt`].
    Ask(String),
    Cite(PaperSummary),
    /// Something to tell the user; no state changed.
    Notice(String),
    Help,
    Quit,
}

pub struct App {
    pub screen: Screen,
    pub search: SearchState,
    pub active_paper: Option<PaperSummary>,
    pub chat: Option<ChatSession>,
    pub messages: Vec<DisplayMessage>,
    pub should_quit: bool,
}

impl App {
    pub fn new(max_results: usize) -> Self {
        Self {
            screen: Screen::Search,
            search: SearchState::new(max_results),
            active_paper: None,
            chat: None,
            messages: Vec::new(),
            should_quit: false,
        }
    }

    /// Apply one action and report the follow-up work.
    pub fn update(&mut self, action: Action) -> Effect {
        match action {
            Action::None => Effect::None,
            Action::Quit => {
                self.should_quit = true;
                Effect::Quit
            }
            Action::Help => Effect::Help,
            Action::Invalid(message) => Effect::Notice(message),
            Action::SetMode(mode) => {
                self.search.mode = mode;
                Effect::Notice(format!("Mode: {} ({})", mode.label(), mode.placeholder()))
            }
            Action::SetMax(n) => {
                self.search.max_results = clamp_max_results(n);
                Effect::Notice(format!("Number of results: {}", self.search.max_results))
            }
            Action::Search(text) => {
                if self.screen != Screen::Search {
                    return Effect::Notice("Go :back to search first.".to_string());
                }
                self.search.query = text.clone();
                Effect::Search(
                    SearchQuery::new(text, self.search.mode)
                        .with_max_results(self.search.max_results),
                )
            }
            Action::Open(n) => match self.open_paper(n) {
                Some(paper) => Effect::PrepareChat(paper),
                None => Effect::Notice(self.missing_result(n)),
            },
            Action::Cite(Some(n)) => match self.result(n) {
                Some(paper) => Effect::Cite(paper.clone()),
                None => Effect::Notice(self.missing_result(n)),
            },
            Action::Cite(None) => match &self.active_paper {
                Some(paper) => Effect::Cite(paper.clone()),
                None => Effect::Notice(":cite needs a result number".to_string()),
            },
            Action::Back => {
                self.back_to_search();
                Effect::None
            }
            Action::Ask(prompt) => {
                if self.chat.is_some() {
                    Effect::Ask(prompt)
                } else {
                    Effect::Notice("No paper is open for chat.".to_string())
                }
            }
        }
    }

    fn result(&self, n: usize) -> Option<&PaperSummary> {
        n.checked_sub(1).and_then(|i| self.search.results.get(i))
    }

    fn missing_result(&self, n: usize) -> String {
        match self.search.results.len() {
            0 => "No results to choose from; search first.".to_string(),
            len => format!("No result #{} (choose 1-{})", n, len),
        }
    }

    pub fn set_results(&mut self, results: Vec<PaperSummary>) {
        self.search.results = results;
    }

    /// Switch to the chat view for result `n` (1-based). Returns the paper
    /// whose chat needs preparing, or `None` if there is no such result.
    pub fn open_paper(&mut self, n: usize) -> Option<PaperSummary> {
        let paper = self.result(n)?.clone();
        self.active_paper = Some(paper.clone());
        self.chat = None;
        self.messages.clear();
        self.screen = Screen::Chat;
        Some(paper)
    }

    /// Open a paper that did not come from the result list.
    pub fn open_direct(&mut self, paper: PaperSummary) {
        self.search.results = vec![paper];
        self.open_paper(1);
    }

    /// True while a paper is open but its chat has not been set up yet.
    pub fn needs_chat(&self) -> bool {
        self.screen == Screen::Chat && self.active_paper.is_some() && self.chat.is_none()
    }

    /// Install the prepared chat and greet the user. A chat already in
    /// place is kept.
    pub fn attach_chat(&mut self, session: ChatSession) {
        if self.chat.is_some() || self.active_paper.is_none() {
            return;
        }
        self.chat = Some(session);
        self.messages = vec![DisplayMessage {
            speaker: Speaker::Assistant,
            text: GREETING.to_string(),
        }];
    }

    /// Chat preparation failed: report and fall back to the search view.
    pub fn chat_failed(&mut self, error: &str) -> String {
        self.back_to_search();
        format!("Failed to prepare the chat session: {}", error)
    }

    /// Send a question and record both sides of the exchange. Model failures
    /// come back as the assistant's reply.
    pub async fn send_prompt(&mut self, prompt: &str) -> Option<&DisplayMessage> {
        let chat = self.chat.as_mut()?;
        self.messages.push(DisplayMessage {
            speaker: Speaker::User,
            text: prompt.to_string(),
        });
        let reply = chat.send(prompt).await;
        self.messages.push(DisplayMessage {
            speaker: Speaker::Assistant,
            text: reply,
        });
        self.messages.last()
    }

    pub fn back_to_search(&mut self) {
        self.screen = Screen::Search;
        self.active_paper = None;
        self.chat = None;
        self.messages.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use papertalk_core::chat::ChatFuture;
    use papertalk_core::{ChatBackend, ChatContextDocument, ChatError, ChatMessage, PaperId};
    use std::sync::Arc;

    struct EchoBackend;

    impl ChatBackend for EchoBackend {
        fn model_name(&self) -> &str {
            "echo"
        }

        fn generate<'a>(&'a self, history: &'a [ChatMessage]) -> ChatFuture<'a> {
            Box::pin(async move {
                let last = history.last().map(|m| m.text.as_str()).unwrap_or("");
                if last.contains("fail") {
                    Err(ChatError::ModelCommunication("HTTP 500".into()))
                } else {
                    Ok(format!("echo: {}", last))
                }
            })
        }
    }

    fn summary(id: &str, title: &str) -> PaperSummary {
        PaperSummary {
            id: PaperId::new(id),
            title: title.into(),
            authors: vec!["A. Author".into()],
            published: None,
            summary: String::new(),
            entry_url: format!("http://arxiv.org/abs/{}", id),
            primary_category: None,
        }
    }

    fn app_with_results() -> App {
        let mut app = App::new(50);
        app.set_results(vec![summary("1", "First"), summary("2", "Second")]);
        app
    }

    async fn session() -> ChatSession {
        ChatSession::start(Arc::new(EchoBackend), ChatContextDocument::new("ctx"))
            .await
            .unwrap()
    }

    #[test]
    fn search_builds_clamped_query() {
        let mut app = App::new(5);
        app.update(Action::SetMode(SearchMode::Title));
        let effect = app.update(Action::Search("attention".into()));
        assert_eq!(
            effect,
            Effect::Search(SearchQuery::new("attention", SearchMode::Title).with_max_results(10))
        );
        assert_eq!(app.search.query, "attention");
    }

    #[test]
    fn max_is_clamped() {
        let mut app = App::new(50);
        app.update(Action::SetMax(1000));
        assert_eq!(app.search.max_results, 300);
    }

    #[test]
    fn open_switches_to_chat() {
        let mut app = app_with_results();
        let effect = app.update(Action::Open(2));
        assert_eq!(effect, Effect::PrepareChat(summary("2", "Second")));
        assert_eq!(app.screen, Screen::Chat);
        assert_eq!(app.active_paper.as_ref().map(|p| p.title.as_str()), Some("Second"));
        assert!(app.needs_chat());
    }

    #[test]
    fn open_out_of_range_stays_on_search() {
        let mut app = app_with_results();
        assert!(matches!(app.update(Action::Open(3)), Effect::Notice(_)));
        assert_eq!(app.screen, Screen::Search);
        assert!(app.active_paper.is_none());
    }

    #[test]
    fn ask_without_chat_is_notice() {
        let mut app = app_with_results();
        assert!(matches!(app.update(Action::Ask("hi".into())), Effect::Notice(_)));
    }

    #[test]
    fn cite_without_number_uses_open_paper() {
        let mut app = app_with_results();
        assert!(matches!(app.update(Action::Cite(None)), Effect::Notice(_)));
        app.update(Action::Open(1));
        assert_eq!(app.update(Action::Cite(None)), Effect::Cite(summary("1", "First")));
    }

    #[tokio::test]
    async fn attach_chat_greets_once() {
        let mut app = app_with_results();
        app.update(Action::Open(1));
        app.attach_chat(session().await);
        assert!(!app.needs_chat());
        assert_eq!(app.messages.len(), 1);
        assert_eq!(app.messages[0].text, GREETING);

        app.send_prompt("hello").await;
        app.attach_chat(session().await);
        assert_eq!(app.messages.len(), 3, "second attach must not reset the chat");
    }

    #[tokio::test]
    async fn send_prompt_records_exchange() {
        let mut app = app_with_results();
        app.update(Action::Open(1));
        app.attach_chat(session().await);

        assert_eq!(app.update(Action::Ask("hello".into())), Effect::Ask("hello".into()));
        let reply = app.send_prompt("hello").await.unwrap();
        assert_eq!(reply.speaker, Speaker::Assistant);
        assert_eq!(reply.text, "echo: hello");
        assert_eq!(app.messages.len(), 3);
    }

    #[tokio::test]
    async fn failed_prompt_shows_error_and_chat_continues() {
        let mut app = app_with_results();
        app.update(Action::Open(1));
        app.attach_chat(session().await);

        let reply = app.send_prompt("please fail").await.unwrap().text.clone();
        assert!(reply.starts_with(papertalk_core::chat::ERROR_REPLY_PREFIX));
        let history_len = app.chat.as_ref().unwrap().history().len();
        assert_eq!(history_len, 2);

        let reply = app.send_prompt("again").await.unwrap().text.clone();
        assert_eq!(reply, "echo: again");
        assert_eq!(app.messages.len(), 5);
    }

    #[tokio::test]
    async fn back_clears_chat_state() {
        let mut app = app_with_results();
        app.update(Action::Open(1));
        app.attach_chat(session().await);
        app.send_prompt("hello").await;

        app.update(Action::Back);
        assert_eq!(app.screen, Screen::Search);
        assert!(app.active_paper.is_none());
        assert!(app.chat.is_none());
        assert!(app.messages.is_empty());
        assert_eq!(app.search.results.len(), 2, "results survive going back");
    }

    #[test]
    fn chat_failure_returns_to_search() {
        let mut app = app_with_results();
        app.update(Action::Open(1));
        let message = app.chat_failed("HTTP 404");
        assert_eq!(message, "Failed to prepare the chat session: HTTP 404");
        assert_eq!(app.screen, Screen::Search);
        assert!(app.active_paper.is_none());
    }

    #[test]
    fn open_direct_enters_chat() {
        let mut app = App::new(50);
        app.open_direct(summary("1706.03762", "Attention Is All You Need"));
        assert_eq!(app.screen, Screen::Chat);
        assert!(app.needs_chat());
    }

    #[test]
    fn quit_sets_flag() {
        let mut app = App::new(50);
        assert_eq!(app.update(Action::Quit), Effect::Quit);
        assert!(app.should_quit);
    }
}
