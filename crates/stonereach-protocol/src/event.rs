use serde::{Deserialize, Serialize};

use crate::AssetId;

/// Feedback classification consumed by the (out-of-scope) renderer and
/// audio layers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A capability request was accepted for this asset.
    Acknowledge,
    /// A trained unit or researched upgrade is ready.
    Ready,
    Death,
    Attacked,
    Harvest,
    Quarry,
    MineGold,
    MissileFire,
    MissileHit,
    MeleeHit,
    /// A building site was claimed.
    PlaceAction,
    WorkComplete,
}

/// One entry in a player's per-cycle event buffer.
///
/// Buffers are append-only during a cycle and drained once per frame by the
/// consumer; the referenced asset may already be gone by the time the event
/// is read, so consumers must treat the id as advisory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEvent {
    pub kind: EventKind,
    pub asset: AssetId,
}
