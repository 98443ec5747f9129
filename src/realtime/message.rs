//! Frames and events on the real-time channel
//!
//! [`Message`] wraps Axum's WebSocket frames. [`ClientEvent`] and
//! [`ServerEvent`] are the JSON events carried in text frames:
//!
//! ```text
//! client -> server  {"event":"join","userId":"u1"}
//! client -> server  {"event":"leave","userId":"u1"}
//! server -> client  {"event":"notification","data":{"message":"...","timestamp":"..."}}
//! ```

use axum::extract::ws;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// WebSocket message types
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Text(String),
    Binary(Vec<u8>),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close(Option<CloseFrame>),
}

impl Message {
    /// Convert from Axum's WebSocket message
    pub fn from_axum(msg: ws::Message) -> Self {
        match msg {
            ws::Message::Text(text) => Message::Text(text.to_string()),
            ws::Message::Binary(data) => Message::Binary(data.to_vec()),
            ws::Message::Ping(data) => Message::Ping(data.to_vec()),
            ws::Message::Pong(data) => Message::Pong(data.to_vec()),
            ws::Message::Close(close_frame) => Message::Close(close_frame.map(|f| CloseFrame {
                code: f.code,
                reason: f.reason.to_string(),
            })),
        }
    }

    /// Convert to Axum's WebSocket message
    pub fn into_axum(self) -> ws::Message {
        match self {
            Message::Text(text) => ws::Message::Text(ws::Utf8Bytes::from(text)),
            Message::Binary(data) => ws::Message::Binary(axum::body::Bytes::from(data)),
            Message::Ping(data) => ws::Message::Ping(axum::body::Bytes::from(data)),
            Message::Pong(data) => ws::Message::Pong(axum::body::Bytes::from(data)),
            Message::Close(close_frame) => ws::Message::Close(close_frame.map(|f| ws::CloseFrame {
                code: f.code,
                reason: ws::Utf8Bytes::from(f.reason),
            })),
        }
    }
}

/// WebSocket close frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseFrame {
    pub code: u16,
    pub reason: String,
}

/// Events a client may send
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum ClientEvent {
    /// Bind this connection to a user so it receives their notifications
    Join {
        #[serde(rename = "userId")]
        user_id: String,
    },
    /// Drop the binding again; without a user id, drop all of them
    Leave {
        #[serde(rename = "userId", default)]
        user_id: Option<String>,
    },
}

/// Payload of a `notification` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// An event pushed to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerEvent {
    pub event: String,
    pub data: Value,
}

impl ServerEvent {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    pub fn notification(notification: &Notification) -> Self {
        Self::new(
            "notification",
            serde_json::json!({
                "message": notification.message,
                "timestamp": notification.timestamp.to_rfc3339(),
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_join() {
        let event: ClientEvent = serde_json::from_str(r#"{"event":"join","userId":"u1"}"#).unwrap();
        assert_eq!(
            event,
            ClientEvent::Join {
                user_id: "u1".to_string()
            }
        );
    }

    #[test]
    fn test_parse_leave_without_user() {
        let event: ClientEvent = serde_json::from_str(r#"{"event":"leave"}"#).unwrap();
        assert_eq!(event, ClientEvent::Leave { user_id: None });
    }

    #[test]
    fn test_unknown_event_rejected() {
        assert!(serde_json::from_str::<ClientEvent>(r#"{"event":"shout","userId":"u1"}"#).is_err());
    }

    #[test]
    fn test_notification_event_shape() {
        let notification = Notification::new("Your feedback was graded");
        let value = serde_json::to_value(ServerEvent::notification(&notification)).unwrap();
        assert_eq!(value["event"], json!("notification"));
        assert_eq!(value["data"]["message"], json!("Your feedback was graded"));
        let ts = value["data"]["timestamp"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(ts).is_ok());
    }

    #[test]
    fn test_axum_roundtrip_text() {
        let msg = Message::Text("hello".to_string());
        assert_eq!(Message::from_axum(msg.clone().into_axum()), msg);
    }
}
