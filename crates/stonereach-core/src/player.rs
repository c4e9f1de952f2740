use stonereach_protocol::{AssetId, AssetTypeId, GameEvent, PlayerColor, UpgradeId};

use crate::catalog::AssetCatalog;
use crate::map::{AssetMap, DecoratedMap};
use crate::visibility::VisibilityMap;

/// Everything the engine keeps per player: wallet, upgrade bits, roster,
/// fog state, the decorated map, score counters, and the outgoing event
/// buffer a client drains once per cycle.
#[derive(Debug)]
pub struct PlayerData {
    pub color: PlayerColor,
    pub is_ai: bool,
    pub gold: i32,
    pub lumber: i32,
    pub stone: i32,
    /// One flag per upgrade id; research flips a flag exactly once.
    pub upgrades: Vec<bool>,
    /// Ids of assets this player owns, in creation order.
    pub assets: Vec<AssetId>,
    pub visibility: VisibilityMap,
    pub player_map: DecoratedMap,
    /// Per-type lifetime counters, indexed by runtime type id.
    pub created: Vec<i32>,
    pub lost: Vec<i32>,
    pub destroyed: Vec<i32>,
    events: Vec<GameEvent>,
}

impl PlayerData {
    pub fn new(
        color: PlayerColor,
        is_ai: bool,
        actual_map: &AssetMap,
        catalog: &AssetCatalog,
    ) -> Self {
        Self {
            color,
            is_ai,
            gold: 0,
            lumber: 0,
            stone: 0,
            upgrades: vec![false; catalog.upgrades.len()],
            assets: Vec::new(),
            visibility: VisibilityMap::new(
                actual_map.width(),
                actual_map.height(),
                catalog.max_sight(),
            ),
            player_map: DecoratedMap::new(actual_map),
            created: vec![0; catalog.asset_types.len()],
            lost: vec![0; catalog.asset_types.len()],
            destroyed: vec![0; catalog.asset_types.len()],
            events: Vec::new(),
        }
    }

    /// Whether every upgrade is owned. Indexing is always in range because
    /// the flag vector is sized from the catalog at construction.
    #[inline]
    pub fn has_upgrade(&self, upgrade: UpgradeId) -> bool {
        self.upgrades[upgrade.raw as usize]
    }

    pub fn add_upgrade(&mut self, upgrade: UpgradeId) {
        self.upgrades[upgrade.raw as usize] = true;
    }

    pub fn remove_upgrade(&mut self, upgrade: UpgradeId) {
        self.upgrades[upgrade.raw as usize] = false;
    }

    pub fn can_afford(&self, gold: i32, lumber: i32, stone: i32) -> bool {
        self.gold >= gold && self.lumber >= lumber && self.stone >= stone
    }

    pub fn spend(&mut self, gold: i32, lumber: i32, stone: i32) {
        self.gold -= gold;
        self.lumber -= lumber;
        self.stone -= stone;
    }

    pub fn note_created(&mut self, asset_type: AssetTypeId) {
        self.created[asset_type.raw as usize] += 1;
    }

    pub fn note_lost(&mut self, asset_type: AssetTypeId) {
        self.lost[asset_type.raw as usize] += 1;
    }

    pub fn note_destroyed(&mut self, asset_type: AssetTypeId) {
        self.destroyed[asset_type.raw as usize] += 1;
    }

    pub fn add_event(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    /// Hand the buffered events to the client and clear the buffer.
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{load_catalog, CatalogSource};
    use stonereach_protocol::{EventKind, TileType};

    fn player() -> PlayerData {
        let catalog = load_catalog(CatalogSource::Embedded).expect("catalog");
        let map = AssetMap::new(8, 8, TileType::Grass);
        PlayerData::new(PlayerColor(1), false, &map, &catalog)
    }

    #[test]
    fn wallet_checks_all_three_resources() {
        let mut p = player();
        p.gold = 100;
        p.lumber = 50;
        assert!(p.can_afford(100, 50, 0));
        assert!(!p.can_afford(100, 50, 1));
        p.spend(40, 10, 0);
        assert_eq!((p.gold, p.lumber, p.stone), (60, 40, 0));
    }

    #[test]
    fn event_buffer_drains_to_empty() {
        let mut p = player();
        p.add_event(GameEvent {
            kind: EventKind::Ready,
            asset: AssetId::new(3, 0),
        });
        assert_eq!(p.drain_events().len(), 1);
        assert!(p.drain_events().is_empty());
    }
}
