use stonereach_protocol::{
    AssetAction, AssetId, AssetTypeId, EventKind, GameEvent, PlayerColor, ResourceKind,
    TileMetrics, TilePos,
};

use crate::asset::Asset;
use crate::catalog::{AssetCatalog, AssetTypeInfo};
use crate::config::SimConfig;
use crate::entities::AssetStore;
use crate::map::AssetMap;
use crate::player::PlayerData;
use crate::rng::GameRng;
use crate::trigger::{TriggerContext, TriggerKind};

/// The complete mutable simulation state: map, assets, players, and the
/// shared RNG. Capability policies and the engine's per-cycle handlers all
/// work against this; the engine wrapper adds the dispatch tables and the
/// scenario resolver on top.
pub struct World {
    pub catalog: AssetCatalog,
    pub config: SimConfig,
    pub metrics: TileMetrics,
    pub map: AssetMap,
    pub assets: AssetStore<Asset>,
    /// Indexed by `PlayerColor`; index 0 is the neutral player.
    pub players: Vec<PlayerData>,
    pub rng: GameRng,
    pub cycle: u32,
    pub(crate) events: Vec<GameEvent>,
    pub(crate) pending_triggers: Vec<TriggerContext>,
}

impl World {
    #[inline]
    pub fn player(&self, color: PlayerColor) -> &PlayerData {
        &self.players[color.0 as usize]
    }

    #[inline]
    pub fn player_mut(&mut self, color: PlayerColor) -> &mut PlayerData {
        &mut self.players[color.0 as usize]
    }

    #[inline]
    pub fn asset(&self, id: AssetId) -> Option<&Asset> {
        self.assets.get(id)
    }

    #[inline]
    pub fn asset_mut(&mut self, id: AssetId) -> Option<&mut Asset> {
        self.assets.get_mut(id)
    }

    #[inline]
    pub fn type_info(&self, asset: &Asset) -> &AssetTypeInfo {
        self.catalog.asset_type(asset.type_id)
    }

    pub fn effective_speed(&self, asset: &Asset) -> i32 {
        self.catalog
            .effective_speed(asset.type_id, &self.player(asset.color).upgrades)
    }

    pub fn effective_sight(&self, asset: &Asset) -> i32 {
        if asset.action() == AssetAction::Construct {
            self.type_info(asset).construction_sight
        } else {
            self.catalog
                .effective_sight(asset.type_id, &self.player(asset.color).upgrades)
        }
    }

    pub fn effective_range(&self, asset: &Asset) -> i32 {
        self.catalog
            .effective_range(asset.type_id, &self.player(asset.color).upgrades)
    }

    pub fn effective_armor(&self, asset: &Asset) -> i32 {
        self.catalog
            .effective_armor(asset.type_id, &self.player(asset.color).upgrades)
    }

    pub fn effective_basic_damage(&self, asset: &Asset) -> i32 {
        self.catalog
            .effective_basic_damage(asset.type_id, &self.player(asset.color).upgrades)
    }

    pub fn effective_piercing_damage(&self, asset: &Asset) -> i32 {
        self.catalog
            .effective_piercing_damage(asset.type_id, &self.player(asset.color).upgrades)
    }

    pub(crate) fn post_event(&mut self, kind: EventKind, asset: AssetId) {
        self.events.push(GameEvent { kind, asset });
    }

    pub(crate) fn queue_trigger(&mut self, context: TriggerContext) {
        self.pending_triggers.push(context);
    }

    /// Spawn a full asset of `asset_type` into play.
    pub fn create_asset(
        &mut self,
        asset_type: AssetTypeId,
        color: PlayerColor,
        tile: TilePos,
    ) -> AssetId {
        let info = self.catalog.asset_type(asset_type).clone();
        let metrics = self.metrics;
        let cycle = self.cycle;
        let id = self.assets.insert(Asset::new(
            AssetId::new(0, 0),
            asset_type,
            &info,
            color,
            tile,
            metrics,
            cycle,
        ));
        if let Some(asset) = self.assets.get_mut(id) {
            asset.id = id;
        }
        self.map.add_asset(id);
        if !color.is_neutral() {
            let player = self.player_mut(color);
            player.assets.push(id);
            player.note_created(asset_type);
        }
        self.queue_trigger(TriggerContext {
            kind: TriggerKind::AssetCreation,
            color,
            asset: Some(id),
            asset_type: Some(asset_type),
            tile,
            amount: 1,
        });
        self.queue_trigger(TriggerContext {
            kind: TriggerKind::AssetCount,
            color,
            asset: Some(id),
            asset_type: Some(asset_type),
            tile,
            amount: 1,
        });
        id
    }

    /// Spawn a marker pseudo-asset. Markers never join the map's asset
    /// list, never occupy tiles, and carry no player bookkeeping.
    pub fn create_marker(&mut self, color: PlayerColor, tile: TilePos) -> AssetId {
        let marker_type = self.catalog.marker_type;
        let info = self.catalog.asset_type(marker_type).clone();
        let metrics = self.metrics;
        let cycle = self.cycle;
        let id = self.assets.insert(Asset::new(
            AssetId::new(0, 0),
            marker_type,
            &info,
            color,
            tile,
            metrics,
            cycle,
        ));
        if let Some(asset) = self.assets.get_mut(id) {
            asset.id = id;
        }
        id
    }

    /// Remove an asset from play entirely. `destroyed_by` credits the
    /// destruction to an opponent's score.
    pub fn delete_asset(&mut self, id: AssetId, destroyed_by: Option<PlayerColor>) {
        let Some(asset) = self.assets.remove(id) else {
            return;
        };
        self.map.remove_asset(id);
        if !asset.color.is_neutral() && asset.type_id != self.catalog.marker_type {
            let asset_type = asset.type_id;
            let tile = asset.tile_position;
            self.player_mut(asset.color).assets.retain(|&a| a != id);
            self.queue_trigger(TriggerContext {
                kind: TriggerKind::AssetCount,
                color: asset.color,
                asset: None,
                asset_type: Some(asset_type),
                tile,
                amount: -1,
            });
            if let Some(credit) = destroyed_by {
                if !credit.is_neutral() && credit != asset.color {
                    self.player_mut(credit).note_destroyed(asset_type);
                    self.queue_trigger(TriggerContext {
                        kind: TriggerKind::AssetDestruction,
                        color: credit,
                        asset: None,
                        asset_type: Some(asset_type),
                        tile,
                        amount: 1,
                    });
                }
            }
        }
    }

    /// Wallet delta with the resource trigger attached.
    pub fn add_resources(&mut self, color: PlayerColor, gold: i32, lumber: i32, stone: i32) {
        if color.is_neutral() {
            return;
        }
        let player = self.player_mut(color);
        player.gold += gold;
        player.lumber += lumber;
        player.stone += stone;
        let tile = TilePos::INVALID;
        self.queue_trigger(TriggerContext {
            kind: TriggerKind::Resource,
            color,
            asset: None,
            asset_type: None,
            tile,
            amount: gold + lumber + stone,
        });
    }

    /// Food a player's completed buildings provide.
    pub fn food_production(&self, color: PlayerColor) -> i32 {
        self.player(color)
            .assets
            .iter()
            .filter_map(|&id| self.assets.get(id))
            .filter(|a| a.action() != AssetAction::Construct)
            .map(|a| self.type_info(a).food_production)
            .sum()
    }

    /// Food a player's units consume, trained and in training alike.
    pub fn food_consumption(&self, color: PlayerColor) -> i32 {
        self.player(color)
            .assets
            .iter()
            .filter_map(|&id| self.assets.get(id))
            .map(|a| self.type_info(a).food_consumption)
            .sum()
    }

    /// Whether the player owns a completed asset of every prerequisite
    /// type for `asset_type`.
    pub fn requirements_met(&self, color: PlayerColor, asset_type: AssetTypeId) -> bool {
        self.catalog
            .asset_type(asset_type)
            .asset_requirements
            .iter()
            .all(|&required| {
                self.player(color).assets.iter().any(|&id| {
                    self.assets.get(id).is_some_and(|a| {
                        a.type_id == required && a.alive() && a.action() != AssetAction::Construct
                    })
                })
            })
    }

    /// Nearest owned asset passing `filter`, by footprint gap from `from`.
    /// Roster order (creation order) breaks distance ties.
    pub fn find_nearest_owned(
        &self,
        color: PlayerColor,
        from: TilePos,
        filter: impl Fn(&Asset, &AssetTypeInfo) -> bool,
    ) -> Option<AssetId> {
        let mut best = None;
        let mut best_distance = i32::MAX;
        for &id in &self.player(color).assets {
            let Some(asset) = self.assets.get(id) else {
                continue;
            };
            if !asset.alive() || !filter(asset, self.type_info(asset)) {
                continue;
            }
            let distance = asset.tile_distance_to(from);
            if distance < best_distance {
                best_distance = distance;
                best = Some(id);
            }
        }
        best
    }

    /// Nearest completed drop-off building for a carried resource. Town
    /// centers take everything; the lumber mill takes only lumber.
    pub fn find_nearest_repository(
        &self,
        color: PlayerColor,
        from: TilePos,
        resource: ResourceKind,
    ) -> Option<AssetId> {
        self.find_nearest_owned(color, from, |asset, info| {
            if !info.is_building() || asset.action() == AssetAction::Construct {
                return false;
            }
            let name = self.catalog.asset_types[asset.type_id.raw as usize]
                .name
                .as_str();
            match name {
                "TownHall" | "Keep" | "Castle" => true,
                "LumberMill" => resource == ResourceKind::Lumber,
                _ => false,
            }
        })
    }

    /// Nearest live enemy this player can currently see, within `range`
    /// tiles of the given footprint. Searches the decorated map, so fog
    /// hides targets. Ties break on lower slot index.
    pub fn find_nearest_visible_enemy(
        &self,
        color: PlayerColor,
        anchor: TilePos,
        anchor_size: i32,
        range: i32,
    ) -> Option<AssetId> {
        let mut best = None;
        let mut best_distance = i32::MAX;
        for snapshot in self.player(color).player_map.assets() {
            if snapshot.color == color || snapshot.color.is_neutral() || snapshot.hit_points <= 0 {
                continue;
            }
            if matches!(snapshot.action, AssetAction::Death | AssetAction::Decay) {
                continue;
            }
            let distance =
                anchor.footprint_distance(anchor_size, snapshot.tile_position, snapshot.size);
            if distance > range {
                continue;
            }
            let better = distance < best_distance
                || (distance == best_distance
                    && best.is_some_and(|b: AssetId| snapshot.id.index < b.index));
            if better {
                best_distance = distance;
                best = Some(snapshot.id);
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{load_catalog, CatalogSource};
    use stonereach_protocol::TileType;

    fn test_world() -> World {
        let catalog = load_catalog(CatalogSource::Embedded).expect("catalog");
        let map = AssetMap::new(24, 24, TileType::Grass);
        let players = (0..3)
            .map(|i| PlayerData::new(PlayerColor(i), false, &map, &catalog))
            .collect();
        World {
            catalog,
            config: SimConfig::default(),
            metrics: TileMetrics::default(),
            map,
            assets: AssetStore::default(),
            players,
            rng: GameRng::seed_from_u64(11),
            cycle: 0,
            events: Vec::new(),
            pending_triggers: Vec::new(),
        }
    }

    #[test]
    fn create_and_delete_maintain_roster_and_counts() {
        let mut world = test_world();
        let peasant = world.catalog.asset_type_id("peasant").unwrap();
        let id = world.create_asset(peasant, PlayerColor(1), TilePos::new(4, 4));

        assert!(world.asset(id).is_some());
        assert_eq!(world.player(PlayerColor(1)).assets, vec![id]);
        assert_eq!(world.player(PlayerColor(1)).created[peasant.raw as usize], 1);
        assert_eq!(world.map.assets().len(), 1);

        world.delete_asset(id, Some(PlayerColor(2)));
        assert!(world.asset(id).is_none());
        assert!(world.player(PlayerColor(1)).assets.is_empty());
        assert_eq!(
            world.player(PlayerColor(2)).destroyed[peasant.raw as usize],
            1
        );
        assert!(world.map.assets().is_empty());
    }

    #[test]
    fn food_ignores_buildings_under_construction() {
        let mut world = test_world();
        let farm = world.catalog.asset_type_id("farm").unwrap();
        let id = world.create_asset(farm, PlayerColor(1), TilePos::new(4, 4));
        assert_eq!(world.food_production(PlayerColor(1)), 4);

        world
            .asset_mut(id)
            .unwrap()
            .push_command(crate::asset::AssetCommand::simple(AssetAction::Construct));
        assert_eq!(world.food_production(PlayerColor(1)), 0);
    }

    #[test]
    fn repository_search_respects_resource_kind() {
        let mut world = test_world();
        let hall = world.catalog.asset_type_id("town_hall").unwrap();
        let mill = world.catalog.asset_type_id("lumber_mill").unwrap();
        let hall_id = world.create_asset(hall, PlayerColor(1), TilePos::new(1, 1));
        let mill_id = world.create_asset(mill, PlayerColor(1), TilePos::new(18, 18));

        let near_mill = TilePos::new(20, 20);
        assert_eq!(
            world.find_nearest_repository(PlayerColor(1), near_mill, ResourceKind::Lumber),
            Some(mill_id)
        );
        assert_eq!(
            world.find_nearest_repository(PlayerColor(1), near_mill, ResourceKind::Gold),
            Some(hall_id)
        );
    }

    #[test]
    fn requirements_check_needs_completed_prerequisites() {
        let mut world = test_world();
        let ranger = world.catalog.asset_type_id("ranger").unwrap();
        assert!(!world.requirements_met(PlayerColor(1), ranger));

        let mill = world.catalog.asset_type_id("lumber_mill").unwrap();
        let mill_id = world.create_asset(mill, PlayerColor(1), TilePos::new(6, 6));
        assert!(world.requirements_met(PlayerColor(1), ranger));

        world
            .asset_mut(mill_id)
            .unwrap()
            .push_command(crate::asset::AssetCommand::simple(AssetAction::Construct));
        assert!(!world.requirements_met(PlayerColor(1), ranger));
    }
}
