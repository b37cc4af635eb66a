use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use rtd_stream::{ConnectionState, StreamClient};
use rtd_core::{Event, EventKind, WireEvent};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use url::Url;

struct TestBus {
    outbound: Vec<String>,
    dispatch_tx: mpsc::Sender<String>,
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(bus): State<Arc<TestBus>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, bus))
}

async fn handle_socket(mut socket: WebSocket, bus: Arc<TestBus>) {
    for frame in &bus.outbound {
        if socket.send(Message::Text(frame.clone())).await.is_err() {
            return;
        }
    }
    while let Some(Ok(msg)) = socket.recv().await {
        if let Message::Text(text) = msg {
            let _ = bus.dispatch_tx.send(text).await;
        }
    }
}

async fn spawn_bus(outbound: Vec<String>) -> (SocketAddr, mpsc::Receiver<String>) {
    let (dispatch_tx, dispatch_rx) = mpsc::channel(16);
    let bus = Arc::new(TestBus {
        outbound,
        dispatch_tx,
    });
    let app = Router::new().route("/ws", get(ws_handler)).with_state(bus);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test bus");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (addr, dispatch_rx)
}

fn wire_frame(id: u32) -> String {
    serde_json::to_string(&WireEvent {
        kind: EventKind::Result,
        subject: format!("fleet-a.results.security.{id}"),
        data: json!({"task_id": format!("galahad-ui-{id}"), "from": "galahad"}),
        timestamp: Utc::now(),
    })
    .expect("encode event")
}

async fn wait_for<F: Fn() -> bool>(what: &str, check: F) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {what}"));
}

#[tokio::test]
async fn client_buffers_live_events_newest_first_and_drops_malformed() {
    let frames = vec![
        wire_frame(1),
        "{not json".to_string(),
        r#"{"type":"unknown-kind","subject":"x","data":{},"timestamp":"bad"}"#.to_string(),
        wire_frame(2),
        wire_frame(3),
    ];
    let (addr, _dispatch_rx) = spawn_bus(frames).await;

    let client = StreamClient::connect(
        Url::parse(&format!("ws://{addr}/ws")).expect("endpoint url"),
    );
    wait_for("three buffered events", || client.buffered() == 3).await;
    assert!(client.is_connected());

    let snapshot = client.snapshot();
    let subjects: Vec<_> = snapshot.iter().map(|e| e.subject.as_str()).collect();
    assert_eq!(
        subjects,
        vec![
            "fleet-a.results.security.3",
            "fleet-a.results.security.2",
            "fleet-a.results.security.1",
        ]
    );
}

#[tokio::test]
async fn seeded_history_sits_behind_live_events() {
    let (addr, _dispatch_rx) = spawn_bus(vec![wire_frame(10)]).await;
    let client = StreamClient::connect(
        Url::parse(&format!("ws://{addr}/ws")).expect("endpoint url"),
    );
    wait_for("one live event", || client.buffered() == 1).await;

    let history: Vec<Event> = (1..=2)
        .map(|id| {
            Event::from_wire(WireEvent {
                kind: EventKind::Result,
                subject: format!("fleet-a.results.security.h{id}"),
                data: json!({}),
                timestamp: Utc::now(),
            })
        })
        .collect();
    client.seed_history(history);

    let subjects: Vec<String> = client
        .snapshot()
        .iter()
        .map(|e| e.subject.clone())
        .collect();
    assert_eq!(
        subjects,
        vec![
            "fleet-a.results.security.10",
            "fleet-a.results.security.h1",
            "fleet-a.results.security.h2",
        ]
    );
}

#[tokio::test]
async fn dispatch_travels_over_the_live_connection() {
    let (addr, mut dispatch_rx) = spawn_bus(Vec::new()).await;
    let client = StreamClient::connect(
        Url::parse(&format!("ws://{addr}/ws")).expect("endpoint url"),
    );
    wait_for("connected state", || client.is_connected()).await;

    assert!(client.dispatch("galahad", "security", "audit the logs"));
    let raw = tokio::time::timeout(Duration::from_secs(5), dispatch_rx.recv())
        .await
        .expect("dispatch received")
        .expect("channel open");
    let value: serde_json::Value = serde_json::from_str(&raw).expect("dispatch json");
    assert_eq!(value["action"], "dispatch");
    assert_eq!(value["knight"], "galahad");
    assert_eq!(value["domain"], "security");
}

#[tokio::test]
async fn dispatch_is_dropped_while_disconnected() {
    // Nothing listens on this port; the client stays disconnected.
    let client = StreamClient::connect(
        Url::parse("ws://127.0.0.1:9/ws").expect("endpoint url"),
    );
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!client.dispatch("galahad", "security", "audit the logs"));
}

#[tokio::test]
async fn close_marks_disconnected_and_stops_the_loop() {
    let (addr, _dispatch_rx) = spawn_bus(Vec::new()).await;
    let client = StreamClient::connect(
        Url::parse(&format!("ws://{addr}/ws")).expect("endpoint url"),
    );
    wait_for("connected state", || client.is_connected()).await;

    client.close();
    assert_eq!(client.state(), ConnectionState::Disconnected);
    // Closing twice is fine.
    client.close();
}
