use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum KnightState {
    Online,
    Offline,
    Starting,
    Busy,
}

impl Default for KnightState {
    fn default() -> Self {
        Self::Offline
    }
}

impl KnightState {
    pub fn as_str(&self) -> &'static str {
        match self {
            KnightState::Online => "online",
            KnightState::Offline => "offline",
            KnightState::Starting => "starting",
            KnightState::Busy => "busy",
        }
    }
}

impl fmt::Display for KnightState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A knight's current state as reported by the fleet provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KnightStatus {
    pub name: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub status: KnightState,
    #[serde(default)]
    pub ready: bool,
    #[serde(default)]
    pub restarts: i32,
    #[serde(default)]
    pub age: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub skills: u32,
    #[serde(default, rename = "nixTools")]
    pub nix_tools: u32,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}
