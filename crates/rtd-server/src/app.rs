use crate::bus::EventBus;
use crate::providers::{ChainProvider, FleetProvider, VaultStore};
use crate::{handlers, ws};
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;

/// Dispatch request bodies are capped well below anything legitimate.
pub const MAX_DISPATCH_BODY: usize = 1 << 20;

pub struct AppState {
    pub fleet: Box<dyn FleetProvider>,
    pub chains: Box<dyn ChainProvider>,
    pub vault: VaultStore,
    pub bus: Arc<EventBus>,
    pub fleet_name: String,
    pub write_timeout: Duration,
    /// Cadence of keepalive pings on WS connections; zero disables them.
    pub ping_interval: Duration,
    /// A WS peer silent for this long (no frames, no pongs) is dropped;
    /// zero disables the deadline.
    pub idle_timeout: Duration,
}

pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/fleet", get(handlers::fleet))
        .route("/fleet/:knight", get(handlers::knight))
        .route("/fleet/:knight/logs", get(handlers::knight_logs))
        .route("/fleet/:knight/session", get(handlers::knight_session))
        .route("/tasks", get(handlers::tasks))
        .route(
            "/tasks/dispatch",
            post(handlers::dispatch).layer(DefaultBodyLimit::max(MAX_DISPATCH_BODY)),
        )
        .route("/chains", get(handlers::chains))
        .route("/chains/:name", get(handlers::chain_detail))
        .route("/briefings", get(handlers::briefings))
        .route("/briefings/:date", get(handlers::briefing))
        .route("/ws", get(ws::ws_handler))
        .route("/health", get(handlers::health));

    Router::new().nest("/api", api).with_state(state)
}
