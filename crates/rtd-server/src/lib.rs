pub mod app;
pub mod bus;
pub mod handlers;
pub mod providers;
pub mod ws;

pub use app::{router, AppState};
pub use bus::EventBus;
pub use providers::{
    ChainProvider, FleetProvider, ProviderError, SnapshotChainProvider, SnapshotFleetProvider,
    StaticChainProvider, StaticFleetProvider, VaultError, VaultStore,
};
