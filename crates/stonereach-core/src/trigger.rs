use stonereach_protocol::{AssetId, AssetTypeId, PlayerColor, TilePos, UpgradeId};

/// What kind of change a trigger context describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerKind {
    /// A player's wallet changed.
    Resource,
    /// A player's per-type asset count changed.
    AssetCount,
    /// An owned asset entered a new tile.
    AssetLocation,
    /// A new asset finished entering play.
    AssetCreation,
    /// A player lost one of their own assets.
    AssetLoss,
    /// A player destroyed someone else's asset.
    AssetDestruction,
}

/// Snapshot handed to the scenario layer after a qualifying change.
#[derive(Clone, Debug)]
pub struct TriggerContext {
    pub kind: TriggerKind,
    pub color: PlayerColor,
    /// Asset the change is about, when one exists.
    pub asset: Option<AssetId>,
    pub asset_type: Option<AssetTypeId>,
    pub tile: TilePos,
    pub amount: i32,
}

/// Instructions a scenario may hand back. Applied through the engine's
/// public mutators after the cycle's simulation steps, never mid-step.
#[derive(Clone, Debug)]
pub enum TriggerEffect {
    AddAsset {
        color: PlayerColor,
        asset_type: AssetTypeId,
        tile: TilePos,
    },
    RemoveAsset {
        asset: AssetId,
    },
    ChangeResources {
        color: PlayerColor,
        gold: i32,
        lumber: i32,
        stone: i32,
    },
    ModifyAssetHealth {
        asset: AssetId,
        delta: i32,
    },
    AddUpgrade {
        color: PlayerColor,
        upgrade: UpgradeId,
    },
    RemoveUpgrade {
        color: PlayerColor,
        upgrade: UpgradeId,
    },
}

/// Scenario hook. The engine calls this fire-and-forget after qualifying
/// changes; implementations decide victory conditions, scripted spawns,
/// resource bonuses, and similar scenario rules.
pub trait TriggerResolver: Send {
    fn resolve(&mut self, context: &TriggerContext) -> Vec<TriggerEffect>;
}

/// Resolver for plain skirmishes: no scenario rules at all.
#[derive(Debug, Default)]
pub struct NullTriggerResolver;

impl TriggerResolver for NullTriggerResolver {
    fn resolve(&mut self, _context: &TriggerContext) -> Vec<TriggerEffect> {
        Vec::new()
    }
}
