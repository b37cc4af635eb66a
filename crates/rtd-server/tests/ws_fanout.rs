use futures_util::{SinkExt, StreamExt};
use rtd_server::app::{router, AppState};
use rtd_server::bus::EventBus;
use rtd_server::providers::{StaticChainProvider, StaticFleetProvider, VaultStore};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn spawn_server(bus: Arc<EventBus>) -> SocketAddr {
    spawn_server_with(bus, Duration::from_secs(30), Duration::from_secs(60)).await
}

async fn spawn_server_with(
    bus: Arc<EventBus>,
    ping_interval: Duration,
    idle_timeout: Duration,
) -> SocketAddr {
    let state = Arc::new(AppState {
        fleet: Box::new(StaticFleetProvider(Vec::new())),
        chains: Box::new(StaticChainProvider(Vec::new())),
        vault: VaultStore::new(std::env::temp_dir().join("rtd-ws-fanout-vault")),
        bus,
        fleet_name: "camelot".to_string(),
        write_timeout: Duration::from_secs(2),
        ping_interval,
        idle_timeout,
    });
    let app = router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn connect(addr: SocketAddr) -> WsClient {
    let url = Url::parse(&format!("ws://{addr}/api/ws")).unwrap();
    let (client, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    client
}

#[tokio::test]
async fn published_events_reach_subscribers() {
    let bus = Arc::new(EventBus::new());
    let addr = spawn_server(bus.clone()).await;
    let mut client = connect(addr).await;

    // The forward task subscribes shortly after the upgrade; keep
    // publishing until a frame comes through.
    let mut frame = None;
    for round in 0..50u32 {
        bus.publish(
            rtd_core::EventKind::Result,
            format!("camelot.results.research.lancelot-ui-{round}"),
            json!({"task_id": format!("lancelot-ui-{round}"), "success": true}),
        );
        if let Ok(Some(Ok(Message::Text(text)))) =
            timeout(Duration::from_millis(100), client.next()).await
        {
            frame = Some(text);
            break;
        }
    }

    let text = frame.expect("no event frame received");
    let wire: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(wire["type"], "result");
    assert!(wire["subject"]
        .as_str()
        .unwrap()
        .starts_with("camelot.results.research."));
    assert_eq!(wire["data"]["success"], true);
}

#[tokio::test]
async fn valid_ws_dispatch_is_published() {
    let bus = Arc::new(EventBus::new());
    let addr = spawn_server(bus.clone()).await;
    let mut client = connect(addr).await;
    let mut events = bus.subscribe();

    client
        .send(Message::Text(
            json!({
                "action": "dispatch",
                "knight": "galahad",
                "domain": "research",
                "task": "survey the northern border",
            })
            .to_string(),
        ))
        .await
        .unwrap();

    let event = timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("dispatch not published")
        .unwrap();
    assert_eq!(event.kind, rtd_core::EventKind::Task);
    let subject = event.parsed_subject().unwrap();
    assert_eq!(subject.fleet, "camelot");
    assert_eq!(subject.domain, "research");
    assert!(subject.id.starts_with("galahad-ws-"));
    assert_eq!(event.data["from"], "dashboard-ws");
}

#[tokio::test]
async fn idle_connections_are_pinged() {
    let bus = Arc::new(EventBus::new());
    let addr = spawn_server_with(
        bus,
        Duration::from_millis(100),
        Duration::from_secs(60),
    )
    .await;
    let mut client = connect(addr).await;

    let frame = timeout(Duration::from_secs(2), client.next())
        .await
        .expect("no keepalive frame")
        .expect("stream open")
        .expect("read error");
    assert!(matches!(frame, Message::Ping(_)));
}

#[tokio::test]
async fn silent_peers_are_disconnected_after_the_idle_deadline() {
    let bus = Arc::new(EventBus::new());
    let addr = spawn_server_with(bus, Duration::ZERO, Duration::from_millis(200)).await;
    let mut client = connect(addr).await;

    // No frames in either direction; the server must drop us.
    let ended = timeout(Duration::from_secs(3), async {
        loop {
            match client.next().await {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(ended.is_ok(), "connection survived the idle deadline");
}

#[tokio::test]
async fn invalid_ws_dispatch_is_skipped() {
    let bus = Arc::new(EventBus::new());
    let addr = spawn_server(bus.clone()).await;
    let mut client = connect(addr).await;

    client
        .send(Message::Text(
            json!({
                "action": "dispatch",
                "knight": "bad name!",
                "domain": "research",
                "task": "x",
            })
            .to_string(),
        ))
        .await
        .unwrap();
    client
        .send(Message::Text("not json".to_string()))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(bus.message_count(), 0);
}
