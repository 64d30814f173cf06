//! Hosted language-model chat: backend trait, Gemini client, and the
//! per-paper conversation session.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Config;
use crate::context::ChatContextDocument;

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Prefix of the reply text produced when a chat turn fails.
pub const ERROR_REPLY_PREFIX: &str = "An error occurred while communicating with the model";

#[derive(Error, Debug)]
pub enum ChatError {
    /// Required setup (e.g. the API key) is missing. Raised before any
    /// network activity.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// The chat endpoint call failed.
    #[error("model communication error: {0}")]
    ModelCommunication(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// One turn of the conversation as sent to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
        }
    }
}

/// Boxed future returned by [`ChatBackend::generate`].
pub type ChatFuture<'a> = Pin<Box<dyn Future<Output = Result<String, ChatError>> + Send + 'a>>;

/// A hosted model that produces the next reply for a conversation.
pub trait ChatBackend: Send + Sync {
    fn model_name(&self) -> &str;

    /// Generate the reply to the last user turn in `history`.
    fn generate<'a>(&'a self, history: &'a [ChatMessage]) -> ChatFuture<'a>;
}

/// Google Gemini `generateContent` client.
pub struct GeminiBackend {
    api_key: String,
    model: String,
    endpoint: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl fmt::Debug for GeminiBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiBackend")
            .field("api_key", &"***")
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl GeminiBackend {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            client,
            timeout: Duration::from_secs(120),
        }
    }

    /// Build from resolved configuration. Fails with
    /// [`ChatError::Configuration`] when no API key is configured.
    pub fn from_config(config: &Config, client: reqwest::Client) -> Result<Self, ChatError> {
        let key = config
            .gemini_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                ChatError::Configuration(
                    "GEMINI_API_KEY not found. Set it in the environment, a .env file, \
                     or under [api_keys] in the config file."
                        .to_string(),
                )
            })?;
        Ok(Self::new(key, config.model.clone(), client).with_timeout(config.chat_timeout()))
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.endpoint.trim_end_matches('/'),
            self.model
        )
    }
}

impl ChatBackend for GeminiBackend {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn generate<'a>(&'a self, history: &'a [ChatMessage]) -> ChatFuture<'a> {
        Box::pin(async move {
            let body = GenerateRequest::from_history(history);
            let resp = self
                .client
                .post(self.url())
                .header("x-goog-api-key", &self.api_key)
                .timeout(self.timeout)
                .json(&body)
                .send()
                .await
                .map_err(|e| ChatError::ModelCommunication(e.to_string()))?;

            let status = resp.status();
            let text = resp
                .text()
                .await
                .map_err(|e| ChatError::ModelCommunication(e.to_string()))?;

            if !status.is_success() {
                let message = serde_json::from_str::<ErrorEnvelope>(&text)
                    .map(|env| env.error.message)
                    .unwrap_or(text);
                return Err(ChatError::ModelCommunication(format!(
                    "HTTP {}: {}",
                    status, message
                )));
            }

            let parsed: GenerateResponse = serde_json::from_str(&text)
                .map_err(|e| ChatError::ModelCommunication(format!("invalid response: {}", e)))?;
            parsed
                .into_text()
                .ok_or_else(|| ChatError::ModelCommunication("response contained no text".into()))
        })
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: Role,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

impl<'a> GenerateRequest<'a> {
    fn from_history(history: &'a [ChatMessage]) -> Self {
        Self {
            contents: history
                .iter()
                .map(|m| Content {
                    role: m.role,
                    parts: vec![Part { text: &m.text }],
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text parts of the first candidate.
    fn into_text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
        if text.is_empty() { None } else { Some(text) }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// A conversation grounded in one paper.
///
/// The context document is sent as the first user turn when the session
/// starts; the model's acknowledgement stays in the history but is never
/// shown to the user.
pub struct ChatSession {
    backend: Arc<dyn ChatBackend>,
    history: Vec<ChatMessage>,
}

impl ChatSession {
    /// Send the context document and wait for the model's acknowledgement.
    pub async fn start(
        backend: Arc<dyn ChatBackend>,
        context: ChatContextDocument,
    ) -> Result<Self, ChatError> {
        let mut history = vec![ChatMessage::user(context.into_string())];
        tracing::debug!(model = backend.model_name(), "sending context document");
        let ack = backend.generate(&history).await?;
        history.push(ChatMessage::model(ack));
        Ok(Self { backend, history })
    }

    /// Ask one question. A failed call yields an error-text reply and leaves
    /// the history exactly as it was before the call.
    pub async fn send(&mut self, prompt: &str) -> String {
        self.history.push(ChatMessage::user(prompt));
        match self.backend.generate(&self.history).await {
            Ok(reply) => {
                self.history.push(ChatMessage::model(reply.clone()));
                reply
            }
            Err(e) => {
                self.history.pop();
                tracing::warn!(error = %e, "chat turn failed");
                format!("{}: {}", ERROR_REPLY_PREFIX, e)
            }
        }
    }

    /// All turns sent to and received from the model, context included.
    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }
}
