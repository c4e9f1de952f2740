use serde::{Deserialize, Serialize};

use crate::{Command, PlayerColor};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReplayFile {
    /// Replay file schema version.
    pub version: u32,
    pub map_width: u32,
    pub map_height: u32,
    pub num_players: u32,
    pub seed: u64,
    /// Deterministic hash of the asset-type catalog (used to reject
    /// mismatched replays).
    pub catalog_hash: u64,
    #[serde(default)]
    pub players: Vec<ReplayPlayer>,
    #[serde(default)]
    pub commands: Vec<ReplayCommand>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReplayPlayer {
    pub color: PlayerColor,
    pub name: String,
    pub is_ai: bool,
}

/// A command pinned to the cycle it was injected at.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReplayCommand {
    pub cycle: u32,
    pub player: PlayerColor,
    pub command: Command,
}
