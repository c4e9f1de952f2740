mod asset;
mod capability;
mod catalog;
mod config;
mod entities;
mod game;
mod map;
mod player;
mod rng;
mod router;
pub mod skirmish;
mod trigger;
mod visibility;
mod world;

pub use crate::asset::{Asset, AssetCommand};
pub use crate::capability::{
    standard_registry, ActivatedCapability, Capability, CapabilityRegistry, TimedState,
};
pub use crate::catalog::{
    load_catalog, AssetCatalog, AssetTypeInfo, CatalogError, CatalogSource, UpgradeInfo,
};
pub use crate::config::SimConfig;
pub use crate::entities::AssetStore;
pub use crate::game::{
    import_replay, GameError, GameModel, ReplayImportError, REPLAY_VERSION,
};
pub use crate::map::{AssetMap, DecoratedAsset, DecoratedMap, INITIAL_LUMBER, INITIAL_STONE};
pub use crate::player::PlayerData;
pub use crate::rng::GameRng;
pub use crate::router::{OccupancyMap, RouterMap};
pub use crate::skirmish::{
    run_batch_skirmish, run_skirmish, AggregateMetrics, BatchSkirmishResult, SkirmishConfig,
    SkirmishError, SkirmishMetrics, SkirmishOutcome, SkirmishPlayerStats, SkirmishResult,
};
pub use crate::trigger::{
    NullTriggerResolver, TriggerContext, TriggerEffect, TriggerKind, TriggerResolver,
};
pub use crate::visibility::{TileVisibility, VisibilityMap};
pub use crate::world::World;
