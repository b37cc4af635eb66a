use clap::Parser;
use rtd_server::app::{router, AppState};
use rtd_server::bus::EventBus;
use rtd_server::providers::{SnapshotChainProvider, SnapshotFleetProvider, VaultStore};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "rtd-server")]
struct Args {
    #[arg(long, default_value = "")]
    addr: String,
    #[arg(long, default_value = "")]
    fleet: String,
    #[arg(long, default_value = "")]
    fleet_snapshot: String,
    #[arg(long, default_value = "")]
    chain_snapshot: String,
    #[arg(long, default_value = "")]
    vault: String,
    #[arg(long, default_value_t = 2)]
    write_timeout: u64,
    #[arg(long, default_value_t = 30)]
    ping_interval: u64,
    #[arg(long, default_value_t = 60)]
    idle_timeout: u64,
    #[arg(long, default_value_t = false)]
    debug: bool,
}

#[derive(Clone, Debug)]
struct Config {
    addr: String,
    fleet_name: String,
    fleet_snapshot: String,
    chain_snapshot: String,
    vault_root: String,
    write_timeout: Duration,
    ping_interval: Duration,
    idle_timeout: Duration,
    debug: bool,
}

#[tokio::main]
async fn main() {
    let config = load_config();
    init_logging(&config);

    let addr: SocketAddr = match config.addr.parse() {
        Ok(value) => value,
        Err(err) => {
            error!(event = "invalid_addr", error = %err, addr = %config.addr);
            return;
        }
    };

    let state = Arc::new(AppState {
        fleet: Box::new(SnapshotFleetProvider::new(&config.fleet_snapshot)),
        chains: Box::new(SnapshotChainProvider::new(&config.chain_snapshot)),
        vault: VaultStore::new(&config.vault_root),
        bus: Arc::new(EventBus::new()),
        fleet_name: config.fleet_name.clone(),
        write_timeout: config.write_timeout,
        ping_interval: config.ping_interval,
        idle_timeout: config.idle_timeout,
    });
    let app = router(state);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(value) => value,
        Err(err) => {
            error!(event = "server_error", error = %err, addr = %config.addr);
            return;
        }
    };

    info!(event = "server_start", addr = %config.addr, fleet = %config.fleet_name);

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    if let Err(err) = axum::serve(listener, app).with_graceful_shutdown(shutdown).await {
        error!(event = "server_error", error = %err);
    }
}

fn load_config() -> Config {
    let args = Args::parse();
    Config {
        addr: resolve(&args.addr, "RTD_ADDR", "127.0.0.1:8089"),
        fleet_name: resolve(&args.fleet, "RTD_FLEET", "roundtable"),
        fleet_snapshot: resolve(&args.fleet_snapshot, "RTD_FLEET_SNAPSHOT", "fleet.json"),
        chain_snapshot: resolve(&args.chain_snapshot, "RTD_CHAIN_SNAPSHOT", "chains.json"),
        vault_root: resolve(&args.vault, "RTD_VAULT", "vault"),
        write_timeout: Duration::from_secs(args.write_timeout),
        ping_interval: Duration::from_secs(args.ping_interval),
        idle_timeout: Duration::from_secs(args.idle_timeout),
        debug: args.debug || env_true("RTD_DEBUG"),
    }
}

fn resolve(flag: &str, key: &str, fallback: &str) -> String {
    if !flag.is_empty() {
        return flag.to_string();
    }
    if let Ok(value) = std::env::var(key) {
        if !value.trim().is_empty() {
            return value;
        }
    }
    fallback.to_string()
}

fn env_true(key: &str) -> bool {
    matches!(
        std::env::var(key).unwrap_or_default().to_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}

fn init_logging(config: &Config) {
    let level = if config.debug {
        "debug".to_string()
    } else if let Ok(level) = std::env::var("RTD_LOG_LEVEL") {
        level
    } else {
        "info".to_string()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
