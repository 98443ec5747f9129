//! Notification fanout
//!
//! Best-effort push of events to live connections: no acknowledgement, no
//! persistence, and nobody listening is not an error.

use super::manager::ConnectionManager;
use super::message::{Message, Notification, ServerEvent};
use crate::error::{JobError, Result};
use async_trait::async_trait;
use serde_json::Value;

/// Pushes events to users' live connections
#[async_trait]
pub trait NotificationFanout: Send + Sync {
    /// Deliver a `notification` event to every connection bound to `user_id`
    ///
    /// Returns how many connections it was queued for; zero when the user
    /// has none.
    async fn publish(&self, user_id: &str, message: &str) -> Result<usize>;

    /// Deliver an arbitrary event to every live connection
    async fn broadcast(&self, event: &str, data: Value) -> Result<usize>;
}

fn encode(event: &ServerEvent) -> Result<Message> {
    serde_json::to_string(event)
        .map(Message::Text)
        .map_err(|e| JobError::internal(format!("Failed to serialize event: {}", e)))
}

#[async_trait]
impl NotificationFanout for ConnectionManager {
    async fn publish(&self, user_id: &str, message: &str) -> Result<usize> {
        let msg = encode(&ServerEvent::notification(&Notification::new(message)))?;
        let delivered = self.send_to_user(user_id, &msg);
        tracing::debug!(user_id = %user_id, connections = delivered, "Notification published");
        Ok(delivered)
    }

    async fn broadcast(&self, event: &str, data: Value) -> Result<usize> {
        let msg = encode(&ServerEvent::new(event, data))?;
        let delivered = ConnectionManager::broadcast(self, &msg);
        tracing::debug!(event = %event, connections = delivered, "Event broadcast");
        Ok(delivered)
    }
}
