//! Real-time notification channel
//!
//! Browsers hold a WebSocket to the service and bind it to a user identity
//! with a `join` event. Workers then push notifications to that user through
//! the [`NotificationFanout`] trait, which [`ConnectionManager`] implements.
//!
//! # Example
//!
//! ```rust,ignore
//! use coursefeed_jobs::realtime::{self, ConnectionManager, NotificationFanout, RealtimeConfig};
//! use std::sync::Arc;
//!
//! let manager = Arc::new(ConnectionManager::new());
//! let app: axum::Router = realtime::router("/ws", manager.clone(), RealtimeConfig::default());
//!
//! // later, from a worker
//! manager.publish("u1", "Your feedback was answered").await?;
//! ```

mod config;
mod connection;
mod fanout;
mod manager;
mod message;
mod socket;


pub use config::RealtimeConfig;
pub use connection::{Connection, Delivery};
pub use fanout::NotificationFanout;
pub use manager::{ConnectionHandle, ConnectionManager, ConnectionMetrics};
pub use message::{ClientEvent, CloseFrame, Message, Notification, ServerEvent};
pub use socket::{handle_client_text, router};
