use crate::backoff::Backoff;
use crate::ring::EventRing;
use futures_util::{SinkExt, StreamExt};
use rtd_core::{Event, WireEvent};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};
use url::Url;

const DISPATCH_QUEUE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Serialize)]
struct DispatchRequest<'a> {
    action: &'static str,
    knight: &'a str,
    domain: &'a str,
    task: &'a str,
}

/// Owned, disposable client for the live event stream.
///
/// Holds the bounded event ring, reconnects with capped exponential
/// backoff, and exposes a fire-and-forget dispatch path over the same
/// connection. Dropping the client aborts the connection task
/// synchronously; no reconnect timer survives disposal.
pub struct StreamClient {
    ring: Arc<Mutex<EventRing>>,
    state: Arc<watch::Sender<ConnectionState>>,
    out_tx: mpsc::Sender<String>,
    task: JoinHandle<()>,
}

impl StreamClient {
    /// Spawns the connection loop against the bus WebSocket endpoint.
    pub fn connect(endpoint: Url) -> Self {
        let ring = Arc::new(Mutex::new(EventRing::new()));
        let state = Arc::new(watch::channel(ConnectionState::Disconnected).0);
        let (out_tx, out_rx) = mpsc::channel(DISPATCH_QUEUE);

        let task = tokio::spawn(run_loop(
            endpoint,
            ring.clone(),
            state.clone(),
            out_rx,
        ));

        StreamClient {
            ring,
            state,
            out_tx,
            task,
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.subscribe().borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Watch handle for consumers that want to react to connect /
    /// disconnect transitions.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Read-only copy of the buffered events, newest first.
    pub fn snapshot(&self) -> Vec<Event> {
        self.ring.lock().unwrap().snapshot()
    }

    pub fn buffered(&self) -> usize {
        self.ring.lock().unwrap().len()
    }

    /// Merges a one-time historical batch behind any live events so the
    /// view is never empty on first load.
    pub fn seed_history(&self, history: impl IntoIterator<Item = Event>) {
        self.ring.lock().unwrap().seed_history(history);
    }

    /// Fire-and-forget dispatch over the stream. Returns false when the
    /// request was dropped (not connected or queue full); callers that
    /// need guaranteed delivery use the synchronous dispatch endpoint.
    pub fn dispatch(&self, knight: &str, domain: &str, task: &str) -> bool {
        if !self.is_connected() {
            return false;
        }
        let request = DispatchRequest {
            action: "dispatch",
            knight,
            domain,
            task,
        };
        let text = match serde_json::to_string(&request) {
            Ok(value) => value,
            Err(_) => return false,
        };
        self.out_tx.try_send(text).is_ok()
    }

    /// Stops the connection loop and any pending reconnect timer, then
    /// marks the client disconnected. Idempotent.
    pub fn close(&self) {
        self.task.abort();
        self.state.send_replace(ConnectionState::Disconnected);
    }
}

impl Drop for StreamClient {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_loop(
    endpoint: Url,
    ring: Arc<Mutex<EventRing>>,
    state: Arc<watch::Sender<ConnectionState>>,
    mut out_rx: mpsc::Receiver<String>,
) {
    let mut backoff = Backoff::new();
    loop {
        state.send_replace(ConnectionState::Connecting);
        let (mut ws, _) = match connect_async(endpoint.clone()).await {
            Ok(value) => value,
            Err(err) => {
                debug!("bus_connect_error: {err}");
                state.send_replace(ConnectionState::Disconnected);
                tokio::time::sleep(backoff.next_delay()).await;
                continue;
            }
        };
        backoff.reset();
        state.send_replace(ConnectionState::Connected);

        loop {
            tokio::select! {
                inbound = ws.next() => {
                    match inbound {
                        Some(Ok(Message::Text(text))) => ingest(&ring, &text),
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                        Some(Ok(_)) => {}
                    }
                }
                outbound = out_rx.recv() => {
                    match outbound {
                        Some(text) => {
                            if ws.send(Message::Text(text)).await.is_err() {
                                warn!("bus_dispatch_send_error");
                                break;
                            }
                        }
                        // Handle dropped mid-teardown; the abort lands next.
                        None => break,
                    }
                }
            }
        }

        let _ = ws.close(None).await;
        state.send_replace(ConnectionState::Disconnected);
        // Anything queued while offline is dropped, not replayed.
        while out_rx.try_recv().is_ok() {}
        tokio::time::sleep(backoff.next_delay()).await;
    }
}

/// Parses one inbound frame. Malformed frames are dropped without
/// touching the buffer; the stream must survive them.
fn ingest(ring: &Arc<Mutex<EventRing>>, text: &str) {
    match serde_json::from_str::<WireEvent>(text) {
        Ok(wire) => ring.lock().unwrap().push_live(Event::from_wire(wire)),
        Err(err) => debug!("bus_event_discarded: {err}"),
    }
}
