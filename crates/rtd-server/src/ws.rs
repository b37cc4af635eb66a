use crate::app::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use rtd_core::validate::validate_dispatch;
use rtd_core::{EventKind, Subject};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

const WRITER_QUEUE: usize = 256;

#[derive(Debug, Deserialize)]
struct WsCommand {
    #[serde(default)]
    action: String,
    #[serde(default)]
    knight: String,
    #[serde(default)]
    domain: String,
    #[serde(default)]
    task: String,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// One connection: a writer task owns the sink so the event-forward
/// task and any future writers serialize through a single channel, each
/// write bounded by the configured timeout.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Message>(WRITER_QUEUE);
    let write_timeout = state.write_timeout;
    let write_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match tokio::time::timeout(write_timeout, sink.send(msg)).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) | Err(_) => return,
            }
        }
    });

    let ping_tx = tx.clone();
    let ping_interval = state.ping_interval;
    let ping_task = tokio::spawn(async move {
        if ping_interval.is_zero() {
            return;
        }
        let mut ticker = tokio::time::interval(ping_interval);
        loop {
            ticker.tick().await;
            if ping_tx.send(Message::Ping(Vec::new())).await.is_err() {
                return;
            }
        }
    });

    let forward_tx = tx.clone();
    let mut events = state.bus.subscribe();
    let forward_task = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let text = match serde_json::to_string(&event.to_wire()) {
                        Ok(value) => value,
                        Err(_) => continue,
                    };
                    if forward_tx.send(Message::Text(text)).await.is_err() {
                        return;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(event = "ws_subscriber_lagged", skipped = skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    });

    info!(event = "ws_connected");
    loop {
        // Any inbound frame, pongs included, resets the idle deadline.
        let frame = if state.idle_timeout.is_zero() {
            stream.next().await
        } else {
            match tokio::time::timeout(state.idle_timeout, stream.next()).await {
                Ok(frame) => frame,
                Err(_) => {
                    debug!(event = "ws_idle_timeout");
                    break;
                }
            }
        };
        match frame {
            Some(Ok(Message::Text(text))) => handle_command(&state, &text),
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => {}
            Some(Err(err)) => {
                debug!(event = "ws_read_error", error = %err);
                break;
            }
        }
    }
    info!(event = "ws_disconnected");

    ping_task.abort();
    forward_task.abort();
    drop(tx);
    let _ = write_task.await;
}

/// Inbound dispatch over the stream is fire-and-forget: invalid
/// commands are skipped, valid ones publish a task message.
fn handle_command(state: &Arc<AppState>, text: &str) {
    let command: WsCommand = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(err) => {
            debug!(event = "ws_command_invalid", error = %err);
            return;
        }
    };
    if command.action != "dispatch" {
        return;
    }
    if let Err(err) = validate_dispatch(&command.knight, &command.domain, &command.task) {
        debug!(event = "ws_dispatch_rejected", error = %err);
        return;
    }

    let task_id = format!("{}-ws-{}", command.knight, Utc::now().timestamp_millis());
    let subject = Subject::task(&state.fleet_name, &command.domain, &task_id);
    let payload = json!({
        "from": "dashboard-ws",
        "task_id": task_id,
        "domain": command.domain,
        "task": command.task,
    });
    state.bus.publish(EventKind::Task, subject.clone(), payload);
    info!(event = "ws_task_dispatched", task_id = %task_id, subject = %subject);
}
