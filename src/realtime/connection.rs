//! WebSocket connection wrapper

use super::message::Message;
use crate::error::{JobError, Result};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Outcome of a non-blocking delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// The client is not keeping up; the message was dropped
    Full,
    /// The socket has gone away
    Closed,
}

/// One live WebSocket connection
///
/// Holds the sending half of the connection's outbound queue. User
/// bindings live in the [`ConnectionManager`](super::ConnectionManager),
/// not here, so the connection itself needs no lock.
#[derive(Debug)]
pub struct Connection {
    id: String,
    sender: mpsc::Sender<Message>,
}

impl Connection {
    pub fn new(id: impl Into<String>, sender: mpsc::Sender<Message>) -> Self {
        Self {
            id: id.into(),
            sender,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Send a message to this connection, waiting for queue space
    pub async fn send(&self, msg: Message) -> Result<()> {
        self.sender
            .send(msg)
            .await
            .map_err(|_| JobError::internal("Failed to send message: connection closed"))
    }

    pub async fn send_text(&self, text: impl Into<String>) -> Result<()> {
        self.send(Message::Text(text.into())).await
    }

    pub async fn send_json<T: Serialize>(&self, data: &T) -> Result<()> {
        let json = serde_json::to_string(data)
            .map_err(|e| JobError::internal(format!("Failed to serialize JSON: {}", e)))?;
        self.send_text(json).await
    }

    /// Queue a message without waiting; fanout never blocks on a slow client
    pub fn try_deliver(&self, msg: Message) -> Delivery {
        match self.sender.try_send(msg) {
            Ok(()) => Delivery::Sent,
            Err(TrySendError::Full(_)) => Delivery::Full,
            Err(TrySendError::Closed(_)) => Delivery::Closed,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    pub async fn close(&self) -> Result<()> {
        self.send(Message::Close(None)).await
    }
}
