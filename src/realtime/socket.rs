//! WebSocket route and connection lifecycle

use super::config::RealtimeConfig;
use super::connection::Connection;
use super::manager::{ConnectionHandle, ConnectionManager};
use super::message::{ClientEvent, Message};
use axum::{extract::ws::WebSocketUpgrade, routing::get, Router};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
use uuid::Uuid;

/// Create the real-time WebSocket route
///
/// Clients connect, then send `{"event":"join","userId":"..."}` to start
/// receiving that user's notifications.
///
/// ```rust,ignore
/// let manager = Arc::new(ConnectionManager::with_max_connections(10_000));
/// let app: Router = Router::new()
///     .merge(realtime::router("/ws", manager.clone(), RealtimeConfig::default()));
/// ```
pub fn router<S>(path: &str, manager: Arc<ConnectionManager>, config: RealtimeConfig) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let config = Arc::new(config);
    Router::new().route(
        path,
        get(move |upgrade: WebSocketUpgrade| {
            let manager = manager.clone();
            let config = config.clone();
            async move { upgrade.on_upgrade(move |socket| handle_socket(socket, manager, config)) }
        }),
    )
}

/// Apply one client text frame to the binding table
///
/// Malformed or unknown events are logged and ignored.
pub fn handle_client_text(manager: &ConnectionManager, conn_id: &str, text: &str) {
    match serde_json::from_str::<ClientEvent>(text) {
        Ok(ClientEvent::Join { user_id }) => {
            if user_id.is_empty() {
                tracing::debug!(conn_id = %conn_id, "Ignoring join without user id");
                return;
            }
            if manager.bind(conn_id, &user_id) {
                tracing::debug!(conn_id = %conn_id, user_id = %user_id, "Connection joined");
            }
        }
        Ok(ClientEvent::Leave { user_id: Some(user_id) }) => {
            manager.unbind(conn_id, &user_id);
            tracing::debug!(conn_id = %conn_id, user_id = %user_id, "Connection left");
        }
        Ok(ClientEvent::Leave { user_id: None }) => manager.unbind_all(conn_id),
        Err(e) => {
            tracing::debug!(conn_id = %conn_id, error = %e, "Ignoring unrecognised client event");
        }
    }
}

/// Handle a WebSocket connection lifecycle
async fn handle_socket(
    socket: axum::extract::ws::WebSocket,
    manager: Arc<ConnectionManager>,
    config: Arc<RealtimeConfig>,
) {
    let conn_id = Uuid::new_v4().to_string();

    // Bounded; fanout drops messages for clients that fall behind
    let (tx, mut rx) = mpsc::channel::<Message>(config.channel_capacity.max(1));
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let conn: ConnectionHandle = Arc::new(Connection::new(conn_id.clone(), tx));

    if let Err(e) = manager.register(conn.clone()) {
        tracing::warn!(conn_id = %conn_id, error = %e, "Failed to register connection");
        let _ = ws_sender.close().await;
        return;
    }

    // Whoever finishes first performs the unregister
    let (cleanup_tx, mut cleanup_rx) = oneshot::channel::<()>();
    let cleanup_tx = Arc::new(Mutex::new(Some(cleanup_tx)));

    let heartbeat_interval = config.heartbeat_interval();
    let heartbeat_timeout = config.heartbeat_timeout();
    let last_pong = Arc::new(RwLock::new(Instant::now()));

    let heartbeat_task = {
        let conn = conn.clone();
        let manager = manager.clone();
        let conn_id = conn_id.clone();
        let last_pong = last_pong.clone();
        let cleanup_tx = cleanup_tx.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(heartbeat_interval);
            loop {
                interval.tick().await;

                if last_pong.read().await.elapsed() > heartbeat_timeout {
                    tracing::warn!(conn_id = %conn_id, "Connection heartbeat timeout");
                    if let Some(tx) = cleanup_tx.lock().await.take() {
                        let _ = tx.send(());
                        manager.unregister(&conn_id);
                    }
                    break;
                }

                let _ = conn.try_deliver(Message::Ping(vec![]));
            }
        })
    };

    let send_task = tokio::spawn({
        let conn_id = conn_id.clone();
        let manager = manager.clone();
        let cleanup_tx = cleanup_tx.clone();
        async move {
            while let Some(msg) = rx.recv().await {
                if ws_sender.send(msg.into_axum()).await.is_err() {
                    break;
                }
            }

            if let Some(tx) = cleanup_tx.lock().await.take() {
                let _ = tx.send(());
                manager.unregister(&conn_id);
            }
        }
    });

    let recv_task = tokio::spawn({
        let conn = conn.clone();
        let manager = manager.clone();
        let conn_id = conn_id.clone();
        let cleanup_tx = cleanup_tx.clone();

        async move {
            while let Some(result) = ws_receiver.next().await {
                match result {
                    Ok(axum_msg) => match Message::from_axum(axum_msg) {
                        Message::Ping(data) => {
                            let _ = conn.try_deliver(Message::Pong(data));
                        }
                        Message::Pong(_) => {
                            *last_pong.write().await = Instant::now();
                        }
                        Message::Close(_) => break,
                        Message::Text(text) => handle_client_text(&manager, &conn_id, &text),
                        Message::Binary(_) => {
                            tracing::debug!(conn_id = %conn_id, "Ignoring binary frame");
                        }
                    },
                    Err(e) => {
                        tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                        break;
                    }
                }
            }

            if let Some(tx) = cleanup_tx.lock().await.take() {
                let _ = tx.send(());
                manager.unregister(&conn_id);
            }
        }
    });

    tokio::pin!(send_task);
    tokio::pin!(recv_task);
    tokio::pin!(heartbeat_task);

    tokio::select! {
        _ = send_task.as_mut() => {
            recv_task.abort();
            heartbeat_task.abort();
        }
        _ = recv_task.as_mut() => {
            send_task.abort();
            heartbeat_task.abort();
        }
        _ = heartbeat_task.as_mut() => {
            send_task.abort();
            recv_task.abort();
        }
    }

    // Both remaining tasks may have been aborted before cleaning up
    if cleanup_rx.try_recv().is_err() {
        manager.unregister(&conn_id);
    }
}
