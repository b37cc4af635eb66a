//! Seams to the external systems the dashboard observes. The
//! orchestrator and bus adapters live outside this repository; the
//! default wiring reads JSON snapshots so every endpoint stays
//! exercisable without them.

use rtd_core::chain::ChainResource;
use rtd_core::validate::{validate_briefing_date, ValidationError};
use rtd_core::{ChainRun, KnightStatus};
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    #[error("not found")]
    NotFound,
    #[error("timed out")]
    Timeout,
}

pub trait FleetProvider: Send + Sync {
    fn knights(&self) -> Result<Vec<KnightStatus>, ProviderError>;

    fn knight(&self, name: &str) -> Result<KnightStatus, ProviderError> {
        self.knights()?
            .into_iter()
            .find(|k| k.name == name)
            .ok_or(ProviderError::NotFound)
    }

    /// Recent log tail for one knight. Snapshot-backed fleets have no
    /// log source, so the default is unavailable.
    fn logs(&self, name: &str) -> Result<String, ProviderError> {
        let _ = name;
        Err(ProviderError::Unavailable("log source not configured".into()))
    }

    /// Introspects a knight's live session (`stats` by default). A
    /// provider backed by a request-reply transport answers within its
    /// own deadline and maps expiry to `ProviderError::Timeout`.
    fn session(&self, name: &str, query: &str) -> Result<Value, ProviderError> {
        let _ = (name, query);
        Err(ProviderError::Unavailable(
            "introspection not configured".into(),
        ))
    }
}

pub trait ChainProvider: Send + Sync {
    fn chains(&self) -> Result<Vec<ChainRun>, ProviderError>;

    fn chain(&self, name: &str) -> Result<ChainRun, ProviderError> {
        self.chains()?
            .into_iter()
            .find(|c| c.name == name)
            .ok_or(ProviderError::NotFound)
    }
}

/// Fleet state from a JSON snapshot file, re-read on every call so an
/// external refresher can swap it in place.
pub struct SnapshotFleetProvider {
    path: PathBuf,
}

impl SnapshotFleetProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SnapshotFleetProvider { path: path.into() }
    }
}

impl FleetProvider for SnapshotFleetProvider {
    fn knights(&self) -> Result<Vec<KnightStatus>, ProviderError> {
        let raw = std::fs::read_to_string(&self.path)
            .map_err(|err| ProviderError::Unavailable(err.to_string()))?;
        serde_json::from_str(&raw).map_err(|err| ProviderError::Unavailable(err.to_string()))
    }
}

/// Chain resources from a JSON snapshot file, merged into API summaries.
pub struct SnapshotChainProvider {
    path: PathBuf,
}

impl SnapshotChainProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SnapshotChainProvider { path: path.into() }
    }
}

impl ChainProvider for SnapshotChainProvider {
    fn chains(&self) -> Result<Vec<ChainRun>, ProviderError> {
        let raw = std::fs::read_to_string(&self.path)
            .map_err(|err| ProviderError::Unavailable(err.to_string()))?;
        let resources: Vec<ChainResource> = serde_json::from_str(&raw)
            .map_err(|err| ProviderError::Unavailable(err.to_string()))?;
        Ok(resources.into_iter().map(ChainRun::from_resource).collect())
    }
}

/// Fixed in-memory fleet, for wiring tests and local demos.
pub struct StaticFleetProvider(pub Vec<KnightStatus>);

impl FleetProvider for StaticFleetProvider {
    fn knights(&self) -> Result<Vec<KnightStatus>, ProviderError> {
        Ok(self.0.clone())
    }
}

/// Fixed in-memory chain list.
pub struct StaticChainProvider(pub Vec<ChainRun>);

impl ChainProvider for StaticChainProvider {
    fn chains(&self) -> Result<Vec<ChainRun>, ProviderError> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VaultError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("briefing not found")]
    NotFound,
}

/// Flat-file briefing vault: Markdown files keyed by date under
/// `<root>/Briefings/Daily`.
pub struct VaultStore {
    briefings_dir: PathBuf,
}

impl VaultStore {
    pub fn new(vault_root: impl AsRef<Path>) -> Self {
        VaultStore {
            briefings_dir: vault_root.as_ref().join("Briefings").join("Daily"),
        }
    }

    pub fn list(&self) -> Result<Vec<String>, ProviderError> {
        let entries =
            std::fs::read_dir(&self.briefings_dir).map_err(|_| ProviderError::NotFound)?;
        let mut names: Vec<String> = entries
            .flatten()
            .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        Ok(names)
    }

    /// Reads one briefing by validated `YYYY-MM-DD` key. The key is
    /// checked before any filesystem access and the resolved path must
    /// stay inside the briefings directory.
    pub fn read(&self, date: &str) -> Result<String, VaultError> {
        validate_briefing_date(date)?;
        let path = self.briefings_dir.join(format!("{date}.md"));
        if !path.starts_with(&self.briefings_dir) {
            return Err(VaultError::NotFound);
        }
        std::fs::read_to_string(path).map_err(|_| VaultError::NotFound)
    }
}
