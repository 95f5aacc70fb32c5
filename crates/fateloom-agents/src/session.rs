//! Stateful chat sessions with ordered chunk streaming.
//!
//! A session owns one system directive and the full conversation history
//! `(system, user_1, assistant_1, user_2, ...)`; each `send` appends the
//! user message, completes through the backend with resilience applied,
//! records the assistant reply, and re-streams it as ordered word chunks
//! through a bounded channel.
//!
//! Backends return complete text; the word-streaming here satisfies the
//! chunk-stream contract for non-streaming providers. The stream is
//! finite per message, preserves order, and is cancellable: dropping the
//! receiver stops the producer at the next chunk boundary.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::backend::{ChatTurn, Conversation, LlmBackend};
use crate::config::ResilienceConfig;
use crate::error::AgentError;
use crate::resilience::call_with_resilience;

/// Capacity of the per-message chunk channel. Bounded so a stalled
/// consumer backpressures the producer instead of buffering unboundedly.
pub const CHUNK_CHANNEL_CAPACITY: usize = 256;

/// An ordered, finite stream of text chunks for one assistant reply.
pub struct ChunkStream {
    receiver: mpsc::Receiver<String>,
}

impl ChunkStream {
    /// Receive the next chunk, or `None` when the reply is complete.
    pub async fn next_chunk(&mut self) -> Option<String> {
        self.receiver.recv().await
    }

    /// Drain the stream into the full reply text.
    pub async fn collect_text(mut self) -> String {
        let mut text = String::new();
        while let Some(chunk) = self.next_chunk().await {
            text.push_str(&chunk);
        }
        text
    }
}

/// A stateful conversational session with one system directive.
pub struct ChatSession {
    backend: Arc<LlmBackend>,
    resilience: ResilienceConfig,
    system: String,
    turns: Vec<ChatTurn>,
}

impl ChatSession {
    /// Start a session with a system directive.
    pub const fn start(
        backend: Arc<LlmBackend>,
        resilience: ResilienceConfig,
        system: String,
    ) -> Self {
        Self {
            backend,
            resilience,
            system,
            turns: Vec::new(),
        }
    }

    /// Number of recorded turns (user and assistant).
    pub fn turn_count(&self) -> usize {
        self.turns.len()
    }

    /// Send a user message and collect the complete reply.
    ///
    /// History is appended on success: the user message and the
    /// assistant's reply both become part of every later call.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] from the resilience chain; on error the
    /// user message is not recorded, so the session can be retried.
    pub async fn send(&mut self, message: &str) -> Result<String, AgentError> {
        let mut conversation = Conversation {
            system: self.system.clone(),
            turns: self.turns.clone(),
        };
        conversation.turns.push(ChatTurn {
            from_user: true,
            text: String::from(message),
        });

        let reply =
            call_with_resilience(&self.backend, &conversation, &self.resilience).await?;

        self.turns.push(ChatTurn {
            from_user: true,
            text: String::from(message),
        });
        self.turns.push(ChatTurn {
            from_user: false,
            text: reply.clone(),
        });
        Ok(reply)
    }

    /// Send a user message and stream the reply as ordered word chunks.
    ///
    /// The producer task feeds a bounded channel; if the consumer drops
    /// the stream, production stops at the next chunk boundary and the
    /// already-recorded history keeps the full reply.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] if the underlying call fails; no stream is
    /// produced in that case.
    pub async fn send_streaming(&mut self, message: &str) -> Result<ChunkStream, AgentError> {
        let reply = self.send(message).await?;
        let (sender, receiver) = mpsc::channel(CHUNK_CHANNEL_CAPACITY);

        tokio::spawn(async move {
            for chunk in word_chunks(&reply) {
                if sender.send(chunk).await.is_err() {
                    // Consumer cancelled; discard the rest.
                    break;
                }
            }
        });

        Ok(ChunkStream { receiver })
    }
}

/// Split a reply into word-sized chunks, each carrying its trailing
/// whitespace so concatenation reproduces the original text exactly.
fn word_chunks(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        current.push(ch);
        if ch.is_whitespace() {
            chunks.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ScriptedBackend;

    fn session_with(responses: &[&str]) -> ChatSession {
        let backend = Arc::new(LlmBackend::Scripted(ScriptedBackend::with_responses(
            responses.iter().map(|r| String::from(*r)),
        )));
        ChatSession::start(
            backend,
            ResilienceConfig {
                timeout_ms: 1_000,
                max_retries: 0,
                base_delay_ms: 1,
                jitter_pct: 0,
            },
            String::from("You are the narrator."),
        )
    }

    #[test]
    fn word_chunks_reassemble_exactly() {
        let text = "The grove hums\nwith quiet power.";
        let chunks = word_chunks(text);
        assert!(chunks.len() > 3);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn word_chunks_of_empty_text() {
        assert!(word_chunks("").is_empty());
    }

    #[tokio::test]
    async fn session_carries_history_across_sends() {
        let mut session = session_with(&["First reply.", "Second reply."]);
        let first = session.send("Hello").await.ok();
        assert_eq!(first, Some(String::from("First reply.")));
        assert_eq!(session.turn_count(), 2);

        let second = session.send("And again").await.ok();
        assert_eq!(second, Some(String::from("Second reply.")));
        // user, assistant, user, assistant.
        assert_eq!(session.turn_count(), 4);
    }

    #[tokio::test]
    async fn failed_send_leaves_history_clean() {
        let mut session = session_with(&[]);
        let result = session.send("Hello").await;
        assert!(result.is_err());
        assert_eq!(session.turn_count(), 0);
    }

    #[tokio::test]
    async fn streaming_preserves_order_and_content() {
        let mut session = session_with(&["one two three"]);
        let stream = session.send_streaming("go").await.ok();
        let Some(stream) = stream else {
            assert!(false, "stream failed");
            return;
        };
        let text = stream.collect_text().await;
        assert_eq!(text, "one two three");
    }

    #[tokio::test]
    async fn dropping_the_stream_cancels_cleanly() {
        let mut session = session_with(&["a very long reply with many words to stream"]);
        let stream = session.send_streaming("go").await.ok();
        let Some(mut stream) = stream else {
            assert!(false, "stream failed");
            return;
        };
        let first = stream.next_chunk().await;
        assert_eq!(first.as_deref(), Some("a "));
        drop(stream);
        // The recorded history still carries the full reply.
        assert_eq!(session.turn_count(), 2);
    }
}
