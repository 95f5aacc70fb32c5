//! LLM backend implementations.
//!
//! A backend is the provider-specific bottom layer: it serialises one
//! [`Conversation`] into the provider's wire format, performs the HTTP
//! round trip, and hands back the assistant's text. Everything stateful
//! (history, streaming, retries) lives above this layer, so backends stay
//! plain request/response functions behind one `match`.
//!
//! Provider replies are deserialised into small typed structs that model
//! only the fields the engine reads; everything else in the payload is
//! ignored by serde, which doubles as the schema tolerance the rest of
//! the pipeline assumes.

use std::collections::VecDeque;
use std::sync::Mutex;

use serde::Deserialize;

use crate::config::{BackendConfig, BackendKind};
use crate::error::AgentError;

// ---------------------------------------------------------------------------
// Conversation shape
// ---------------------------------------------------------------------------

/// One turn of recorded conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    /// `true` for the user, `false` for the assistant.
    pub from_user: bool,
    /// The turn's text.
    pub text: String,
}

/// The full conversation handed to a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    /// The system directive.
    pub system: String,
    /// Alternating user/assistant turns, oldest first. The final turn is
    /// always the pending user message.
    pub turns: Vec<ChatTurn>,
}

impl Conversation {
    /// Render the turns as `{role, content}` objects for chat-style APIs.
    fn role_messages(&self) -> Vec<serde_json::Value> {
        self.turns
            .iter()
            .map(|turn| {
                serde_json::json!({
                    "role": if turn.from_user { "user" } else { "assistant" },
                    "content": turn.text,
                })
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Backend dispatch
// ---------------------------------------------------------------------------

/// An LLM backend that can complete a conversation.
pub enum LlmBackend {
    /// OpenAI-compatible chat completions API.
    OpenAi(OpenAiBackend),
    /// Anthropic Messages API.
    Anthropic(AnthropicBackend),
    /// In-process scripted responses.
    Scripted(ScriptedBackend),
}

impl LlmBackend {
    /// Complete a conversation, returning the assistant's text.
    ///
    /// # Errors
    ///
    /// Returns a typed [`AgentError`]: transient for network trouble and
    /// 429/5xx, auth for credential rejection, format for replies the
    /// engine cannot read anything out of.
    pub async fn complete(&self, conversation: &Conversation) -> Result<String, AgentError> {
        match self {
            Self::OpenAi(backend) => backend.complete(conversation).await,
            Self::Anthropic(backend) => backend.complete(conversation).await,
            Self::Scripted(backend) => backend.complete(),
        }
    }

    /// Human-readable name for logging.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::OpenAi(_) => "openai-compatible",
            Self::Anthropic(_) => "anthropic",
            Self::Scripted(_) => "scripted",
        }
    }
}

/// Create a backend from configuration.
pub fn create_backend(config: &BackendConfig) -> LlmBackend {
    match config.kind {
        BackendKind::OpenAi => LlmBackend::OpenAi(OpenAiBackend::new(config)),
        BackendKind::Anthropic => LlmBackend::Anthropic(AnthropicBackend::new(config)),
        BackendKind::Scripted => LlmBackend::Scripted(ScriptedBackend::default()),
    }
}

// ---------------------------------------------------------------------------
// Shared HTTP plumbing
// ---------------------------------------------------------------------------

/// Map an HTTP failure status onto the engine's error kinds.
fn classify_status(status: reqwest::StatusCode, body: &str) -> AgentError {
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        AgentError::Auth(format!("{status}: {body}"))
    } else if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        AgentError::Transient(format!("{status}: {body}"))
    } else {
        AgentError::Format(format!("{status}: {body}"))
    }
}

/// POST a JSON body and deserialise the reply.
///
/// Network failures are transient; non-2xx statuses are classified by
/// [`classify_status`] with whatever error body the provider sent; a 2xx
/// reply that does not match `T` is a format error.
async fn post_for_reply<T: serde::de::DeserializeOwned>(
    request: reqwest::RequestBuilder,
    body: &serde_json::Value,
) -> Result<T, AgentError> {
    let response = request
        .json(body)
        .send()
        .await
        .map_err(|e| AgentError::Transient(format!("request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let detail = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("error body unreadable"));
        return Err(classify_status(status, &detail));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| AgentError::Format(format!("malformed reply: {e}")))
}

// ---------------------------------------------------------------------------
// OpenAI-compatible backend
// ---------------------------------------------------------------------------

/// The slice of a chat-completions reply the engine reads. Providers add
/// usage counters, ids, and logprobs around this; serde drops them.
#[derive(Debug, Deserialize)]
struct ChatCompletionReply {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatCompletionReply {
    /// Take the first choice's message text.
    fn into_text(self) -> Result<String, AgentError> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                AgentError::Format(String::from("completion reply carried no message text"))
            })
    }
}

/// Backend for OpenAI-compatible chat completions APIs.
///
/// Works with `OpenAI`, `DeepSeek`, and Ollama endpoints. Sends requests
/// to `{api_url}/chat/completions`.
pub struct OpenAiBackend {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl OpenAiBackend {
    /// Create a new `OpenAI`-compatible backend.
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        }
    }

    async fn complete(&self, conversation: &Conversation) -> Result<String, AgentError> {
        // The system directive is message zero; history follows in order.
        let mut messages = vec![serde_json::json!({
            "role": "system",
            "content": conversation.system,
        })];
        messages.extend(conversation.role_messages());
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": 0.7,
            "max_tokens": self.max_tokens,
        });

        let request = self
            .client
            .post(format!("{}/chat/completions", self.api_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json");
        let reply: ChatCompletionReply = post_for_reply(request, &body).await?;
        reply.into_text()
    }
}

// ---------------------------------------------------------------------------
// Anthropic Messages API backend
// ---------------------------------------------------------------------------

/// The slice of a Messages API reply the engine reads. Assistant output
/// arrives as a list of content blocks; text blocks are concatenated and
/// non-text blocks are skipped.
#[derive(Debug, Deserialize)]
struct MessagesReply {
    #[serde(default)]
    content: Vec<MessageBlock>,
}

#[derive(Debug, Deserialize)]
struct MessageBlock {
    #[serde(default)]
    text: Option<String>,
}

impl MessagesReply {
    /// Join every text block into the assistant's reply.
    fn into_text(self) -> Result<String, AgentError> {
        let mut text = String::new();
        for block in self.content {
            if let Some(part) = block.text {
                text.push_str(&part);
            }
        }
        if text.is_empty() {
            Err(AgentError::Format(String::from(
                "messages reply carried no text blocks",
            )))
        } else {
            Ok(text)
        }
    }
}

/// Backend for the Anthropic Messages API.
///
/// Wire differences from the chat-completions shape: the key travels in
/// `x-api-key` (plus a pinned `anthropic-version`), the system directive
/// is a top-level field rather than message zero, and the reply is a list
/// of content blocks.
pub struct AnthropicBackend {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicBackend {
    /// Create a new Anthropic Messages API backend.
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        }
    }

    async fn complete(&self, conversation: &Conversation) -> Result<String, AgentError> {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "system": conversation.system,
            "messages": conversation.role_messages(),
        });

        let request = self
            .client
            .post(format!("{}/messages", self.api_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json");
        let reply: MessagesReply = post_for_reply(request, &body).await?;
        reply.into_text()
    }
}

// ---------------------------------------------------------------------------
// Scripted backend
// ---------------------------------------------------------------------------

/// In-process backend returning queued responses in order.
///
/// Drives offline mode and tests: push the responses the "model" should
/// give, and each `complete` call pops the next one. An empty queue is a
/// transient error so resilience paths are exercisable too.
#[derive(Default)]
pub struct ScriptedBackend {
    responses: Mutex<VecDeque<String>>,
}

impl ScriptedBackend {
    /// Create a backend pre-loaded with responses.
    pub fn with_responses(responses: impl IntoIterator<Item = String>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
        }
    }

    /// Queue another response.
    pub fn push_response(&self, response: impl Into<String>) {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(response.into());
        }
    }

    fn complete(&self) -> Result<String, AgentError> {
        self.responses
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front())
            .ok_or_else(|| AgentError::Transient(String::from("scripted backend exhausted")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_reply_takes_the_first_choice() {
        let reply: Result<ChatCompletionReply, _> = serde_json::from_value(serde_json::json!({
            "id": "cmpl-1",
            "choices": [
                {"message": {"role": "assistant", "content": "The grove darkens."}},
                {"message": {"role": "assistant", "content": "ignored alternative"}}
            ],
            "usage": {"total_tokens": 12}
        }));
        let text = reply.ok().and_then(|r| r.into_text().ok());
        assert_eq!(text.as_deref(), Some("The grove darkens."));
    }

    #[test]
    fn completion_reply_without_choices_is_a_format_error() {
        let reply: Result<ChatCompletionReply, _> =
            serde_json::from_value(serde_json::json!({"error": "rate_limit"}));
        let text = reply.ok().map(ChatCompletionReply::into_text);
        assert!(matches!(text, Some(Err(AgentError::Format(_)))));
    }

    #[test]
    fn messages_reply_joins_text_blocks() {
        let reply: Result<MessagesReply, _> = serde_json::from_value(serde_json::json!({
            "content": [
                {"type": "text", "text": "The gate "},
                {"type": "tool_use", "name": "ignored"},
                {"type": "text", "text": "hums at dusk."}
            ]
        }));
        let text = reply.ok().and_then(|r| r.into_text().ok());
        assert_eq!(text.as_deref(), Some("The gate hums at dusk."));
    }

    #[test]
    fn messages_reply_without_text_is_a_format_error() {
        let reply: Result<MessagesReply, _> =
            serde_json::from_value(serde_json::json!({"content": []}));
        let text = reply.ok().map(MessagesReply::into_text);
        assert!(matches!(text, Some(Err(AgentError::Format(_)))));
    }

    #[test]
    fn status_classification() {
        assert!(matches!(
            classify_status(reqwest::StatusCode::UNAUTHORIZED, ""),
            AgentError::Auth(_)
        ));
        assert!(matches!(
            classify_status(reqwest::StatusCode::TOO_MANY_REQUESTS, ""),
            AgentError::Transient(_)
        ));
        assert!(matches!(
            classify_status(reqwest::StatusCode::BAD_GATEWAY, ""),
            AgentError::Transient(_)
        ));
        assert!(matches!(
            classify_status(reqwest::StatusCode::BAD_REQUEST, ""),
            AgentError::Format(_)
        ));
    }

    #[test]
    fn role_messages_alternate_in_order() {
        let conversation = Conversation {
            system: String::from("You narrate."),
            turns: vec![
                ChatTurn {
                    from_user: true,
                    text: String::from("hello"),
                },
                ChatTurn {
                    from_user: false,
                    text: String::from("well met"),
                },
            ],
        };
        let messages = conversation.role_messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(
            messages.first().and_then(|m| m.get("role")).and_then(|r| r.as_str()),
            Some("user")
        );
        assert_eq!(
            messages.get(1).and_then(|m| m.get("role")).and_then(|r| r.as_str()),
            Some("assistant")
        );
    }

    #[tokio::test]
    async fn scripted_backend_pops_in_order() {
        let backend = LlmBackend::Scripted(ScriptedBackend::with_responses([
            String::from("first"),
            String::from("second"),
        ]));
        let conversation = Conversation {
            system: String::new(),
            turns: Vec::new(),
        };
        assert_eq!(
            backend.complete(&conversation).await.ok(),
            Some(String::from("first"))
        );
        assert_eq!(
            backend.complete(&conversation).await.ok(),
            Some(String::from("second"))
        );
        assert!(backend.complete(&conversation).await.is_err());
    }
}
