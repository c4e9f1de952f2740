use serde::{Deserialize, Serialize};

use crate::{AssetId, AssetTypeId, PlayerColor, TilePos};

/// Compact, order-stable summary of simulation state, used for desync
/// detection and replay verification. Two runs of the same seed and command
/// stream must produce byte-identical digests every cycle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateDigest {
    pub cycle: u32,
    /// Ascending by asset id.
    pub assets: Vec<AssetDigest>,
    /// Indexed by player color.
    pub wallets: Vec<WalletDigest>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDigest {
    pub id: AssetId,
    pub type_id: AssetTypeId,
    pub color: PlayerColor,
    pub tile: TilePos,
    pub hit_points: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletDigest {
    pub color: PlayerColor,
    pub gold: i32,
    pub lumber: i32,
    pub stone: i32,
}
