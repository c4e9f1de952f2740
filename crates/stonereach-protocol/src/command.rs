use serde::{Deserialize, Serialize};

use crate::{AssetId, CapabilityKind, PlayerColor, TilePos};

/// Where a capability should be aimed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CommandTarget {
    /// Target-free capabilities (Cancel, StandGround, research upgrades).
    None,
    /// Another asset (attack, repair, mine a gold mine, convey to a
    /// repository).
    Asset { asset: AssetId },
    /// A map tile (move, patrol, build sites, harvest/quarry spots). The
    /// simulation materializes a transient marker asset for these.
    Tile { tile: TilePos },
}

/// All possible client→sim commands. Fully serializable.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Command {
    /// Ask `actor` to begin `capability` against `target`. Rejection
    /// (unaffordable, ineligible, bad target) is a quiet no-op on the sim
    /// side; issuing only legal commands is the caller's job.
    ApplyCapability {
        player: PlayerColor,
        actor: AssetId,
        capability: CapabilityKind,
        target: CommandTarget,
    },
}
