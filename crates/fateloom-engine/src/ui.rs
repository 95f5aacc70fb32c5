//! The UI transport contract, engine side.
//!
//! The UI itself (terminal, web, WebSocket plumbing) is an external
//! collaborator; the engine only guarantees this contract:
//!
//! - **Output**: UTF-8 text chunks pushed through a bounded queue. When
//!   the queue is full the orchestrator blocks on emit, so a stalled
//!   consumer backpressures the narrator instead of buffering without
//!   bound.
//! - **Input**: one string per player submission, newline terminators
//!   stripped by the transport.
//! - **Connection state**: one active consumer per game. On disconnect
//!   the bounded queue retains buffered output; a reconnecting consumer
//!   resumes draining in order, or the session discards explicitly.

use tokio::sync::mpsc;

/// One message pushed to the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiMessage {
    /// A narration text chunk; render verbatim, in order.
    Chunk(String),
    /// A system notification line.
    Notification(String),
    /// The turn finished; the input gate may reopen.
    TurnComplete,
}

/// The engine side of one game's UI connection.
pub struct UiOutput {
    sender: mpsc::Sender<UiMessage>,
}

impl UiOutput {
    /// Create the output queue with the given bound, returning the engine
    /// side and the consumer side.
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<UiMessage>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Push one message, blocking when the queue is full. A closed
    /// (disconnected and dropped) consumer is not an error: the message
    /// is discarded and the turn continues.
    pub async fn emit(&self, message: UiMessage) {
        if self.sender.send(message).await.is_err() {
            tracing::debug!("UI consumer gone, output discarded");
        }
    }

    /// Push one narration chunk.
    pub async fn emit_chunk(&self, chunk: String) {
        self.emit(UiMessage::Chunk(chunk)).await;
    }

    /// Push one notification line.
    pub async fn emit_notification(&self, text: String) {
        self.emit(UiMessage::Notification(text)).await;
    }
}
