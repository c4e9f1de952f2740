use std::collections::HashMap;

use thiserror::Error;

use stonereach_protocol::{
    AssetAction, AssetDigest, AssetId, CapabilityKind, Command, CommandTarget, EventKind,
    GameEvent, PixelPos, PlayerColor, ReplayFile, ResourceKind, StateDigest, TileMetrics, TilePos,
    TileType, WalletDigest,
};

use crate::asset::AssetCommand;
use crate::capability::{self, ActivatedCapability, CapabilityRegistry};
use crate::catalog::AssetCatalog;
use crate::config::SimConfig;
use crate::entities::AssetStore;
use crate::map::AssetMap;
use crate::player::PlayerData;
use crate::rng::GameRng;
use crate::router::{OccupancyMap, RouterMap};
use crate::trigger::{TriggerEffect, TriggerResolver};
use crate::world::World;

/// Replay container format version this engine writes and accepts.
pub const REPLAY_VERSION: u32 = 1;

/// Gold in a freshly spawned mine.
const INITIAL_MINE_GOLD: i32 = 15000;

#[derive(Debug, Error)]
pub enum GameError {
    #[error("unknown player color {0}")]
    UnknownPlayer(u8),
    #[error("the neutral player cannot issue commands")]
    NeutralPlayer,
    #[error("no such asset")]
    UnknownAsset,
    #[error("asset is not owned by the issuing player")]
    NotOwned,
    #[error("unknown asset type id `{0}`")]
    UnknownAssetType(String),
}

#[derive(Debug, Error)]
pub enum ReplayImportError {
    #[error("unsupported replay version {0}")]
    Version(u32),
    #[error("replay was recorded against a different catalog")]
    CatalogMismatch,
    #[error("replay map is {found_w}x{found_h}, expected {want_w}x{want_h}")]
    MapMismatch {
        want_w: u32,
        want_h: u32,
        found_w: u32,
        found_h: u32,
    },
    #[error("command at cycle {0} arrives out of order")]
    OutOfOrder(u32),
    #[error(transparent)]
    Game(#[from] GameError),
}

/// The deterministic simulation: identical catalog, map, seed, and
/// command sequence always produce identical state, cycle for cycle.
pub struct GameModel {
    registry: CapabilityRegistry,
    trigger: Box<dyn TriggerResolver>,
    router: RouterMap,
    occupancy: OccupancyMap,
    world: World,
    /// Tile each asset occupied last cycle, for location triggers.
    last_tiles: HashMap<AssetId, TilePos>,
}

impl GameModel {
    pub fn new(
        catalog: AssetCatalog,
        map: AssetMap,
        num_players: u8,
        seed: u64,
        config: SimConfig,
        metrics: TileMetrics,
        trigger: Box<dyn TriggerResolver>,
    ) -> Self {
        let players = (0..=num_players)
            .map(|i| PlayerData::new(PlayerColor(i), false, &map, &catalog))
            .collect();
        let registry = capability::standard_registry(&catalog);
        let width = map.width();
        let height = map.height();
        tracing::info!(width, height, num_players, seed, "game created");
        Self {
            registry,
            trigger,
            router: RouterMap::new(width, height),
            occupancy: OccupancyMap::new(width, height),
            world: World {
                catalog,
                config,
                metrics,
                map,
                assets: AssetStore::default(),
                players,
                rng: GameRng::seed_from_u64(seed),
                cycle: 0,
                events: Vec::new(),
                pending_triggers: Vec::new(),
            },
            last_tiles: HashMap::new(),
        }
    }

    #[inline]
    pub fn cycle(&self) -> u32 {
        self.world.cycle
    }

    #[inline]
    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn num_players(&self) -> u8 {
        (self.world.players.len() - 1) as u8
    }

    /// Place a starting asset before the first cycle. Mines come filled.
    pub fn create_initial_asset(
        &mut self,
        type_name: &str,
        color: PlayerColor,
        tile: TilePos,
    ) -> Result<AssetId, GameError> {
        let asset_type = self
            .world
            .catalog
            .asset_type_id(type_name)
            .ok_or_else(|| GameError::UnknownAssetType(type_name.to_owned()))?;
        if color.0 as usize >= self.world.players.len() {
            return Err(GameError::UnknownPlayer(color.0));
        }
        let id = self.world.create_asset(asset_type, color, tile);
        if type_name == "gold_mine" {
            if let Some(mine) = self.world.asset_mut(id) {
                mine.gold = INITIAL_MINE_GOLD;
            }
        }
        Ok(id)
    }

    pub fn grant_resources(&mut self, color: PlayerColor, gold: i32, lumber: i32, stone: i32) {
        self.world.add_resources(color, gold, lumber, stone);
    }

    pub fn drain_events(&mut self, color: PlayerColor) -> Vec<GameEvent> {
        if (color.0 as usize) < self.world.players.len() {
            self.world.player_mut(color).drain_events()
        } else {
            Vec::new()
        }
    }

    /// Validate and apply one player command. Ownership and player
    /// validity errors are hard failures; a policy refusing an otherwise
    /// well-formed command is not (the command is simply dropped, exactly
    /// as a lagged order for a dead unit would be).
    pub fn apply_command(&mut self, command: &Command) -> Result<(), GameError> {
        let Command::ApplyCapability {
            player,
            actor,
            capability,
            target,
        } = command;
        let player = *player;
        let actor = *actor;
        let capability = *capability;

        if player.is_neutral() {
            return Err(GameError::NeutralPlayer);
        }
        if player.0 as usize >= self.world.players.len() {
            return Err(GameError::UnknownPlayer(player.0));
        }
        let Some(asset) = self.world.asset(actor) else {
            return Err(GameError::UnknownAsset);
        };
        if asset.color != player {
            return Err(GameError::NotOwned);
        }
        if !asset.alive()
            || !self.world.type_info(asset).has_capability(capability)
            || (!asset.interruptible() && capability != CapabilityKind::Cancel)
        {
            return Ok(());
        }

        let (resolved, created_marker) = match target {
            CommandTarget::None => (actor, None),
            CommandTarget::Asset { asset } => (*asset, None),
            CommandTarget::Tile { tile } => {
                let marker = self.world.create_marker(player, *tile);
                (marker, Some(marker))
            }
        };

        let applied = self
            .registry
            .get(capability)
            .is_some_and(|policy| policy.apply(&mut self.world, actor, resolved));

        if applied {
            self.world
                .player_mut(player)
                .add_event(GameEvent {
                    kind: EventKind::Acknowledge,
                    asset: actor,
                });
            tracing::debug!(cycle = self.world.cycle, ?capability, "command applied");
        } else if let Some(marker) = created_marker {
            self.world.delete_asset(marker, None);
        }
        Ok(())
    }

    /// Advance the simulation one cycle.
    pub fn timestep(&mut self) {
        self.rebuild_occupancy();
        self.refresh_player_views();
        self.fire_location_triggers();

        // Turn order: a fresh RNG draw per asset, mobile before immobile,
        // high draw first, lower slot index breaking ties.
        let mut order: Vec<(bool, u32, AssetId)> = Vec::new();
        for (id, asset) in self.world.assets.iter_ordered() {
            if asset.type_id == self.world.catalog.marker_type {
                continue;
            }
            let mobile = self.world.type_info(asset).speed > 0;
            order.push((mobile, 0, id));
        }
        for entry in &mut order {
            entry.1 = self.world.rng.next_u32();
        }
        order.sort_by(|a, b| {
            b.0.cmp(&a.0)
                .then(b.1.cmp(&a.1))
                .then(a.2.index.cmp(&b.2.index))
        });

        for (_, _, id) in order {
            self.dispatch(id);
        }
        self.step_markers();
        self.resolve_triggers();
        self.broadcast_events();
        self.world.cycle += 1;
    }

    fn rebuild_occupancy(&mut self) {
        self.occupancy.clear();
        for (id, asset) in self.world.assets.iter_ordered() {
            if asset.type_id == self.world.catalog.marker_type {
                continue;
            }
            let action = asset.action();
            // Gatherers inside a mine or drop-off do not block tiles.
            if matches!(
                action,
                AssetAction::MineGold
                    | AssetAction::ConveyGold
                    | AssetAction::ConveyLumber
                    | AssetAction::ConveyStone
            ) {
                continue;
            }
            self.occupancy.stamp(asset.tile_position, asset.size, id);
            if action == AssetAction::Walk {
                self.occupancy
                    .stamp_moving(asset.tile_position, asset.direction);
                if asset.direction.is_diagonal()
                    && !asset.position.tile_aligned(self.world.metrics)
                {
                    self.occupancy.lock_corner(
                        asset.tile_position,
                        asset.tile_position.step(asset.direction),
                    );
                }
            }
        }
    }

    fn refresh_player_views(&mut self) {
        let World {
            ref map,
            ref assets,
            ref catalog,
            ref mut players,
            ..
        } = self.world;

        for player in players.iter_mut().skip(1) {
            let watchers: Vec<(TilePos, i32, i32)> = player
                .assets
                .iter()
                .filter_map(|&id| assets.get(id))
                .map(|a| {
                    let sight = if a.action() == AssetAction::Construct {
                        catalog.asset_type(a.type_id).construction_sight
                    } else {
                        catalog.effective_sight(a.type_id, &player.upgrades)
                    };
                    (a.tile_position, a.size, sight)
                })
                .collect();
            player.visibility.update(watchers.into_iter());
            player
                .player_map
                .refresh(map, assets, catalog, &player.visibility);
        }
    }

    fn dispatch(&mut self, id: AssetId) {
        let Some(action) = self.world.asset(id).map(|a| a.action()) else {
            return;
        };
        match action {
            AssetAction::None | AssetAction::Construct => {}
            AssetAction::Walk => self.handle_walk(id),
            AssetAction::StandGround => self.handle_stand_ground(id),
            AssetAction::Attack => self.handle_attack(id),
            AssetAction::Repair => self.handle_repair(id),
            AssetAction::HarvestLumber => self.handle_gather_terrain(id, TileType::Forest),
            AssetAction::QuarryStone => self.handle_gather_terrain(id, TileType::Rock),
            AssetAction::MineGold => self.handle_mine_gold(id),
            AssetAction::ConveyGold | AssetAction::ConveyLumber | AssetAction::ConveyStone => {
                self.handle_convey(id)
            }
            AssetAction::Death => self.handle_death(id),
            AssetAction::Decay => self.handle_decay(id),
            AssetAction::Capability => self.handle_capability(id),
        }
        // A handler that just queued travel (chase, gather trip, patrol
        // leg) gets its first router step in the same cycle.
        if action != AssetAction::Walk
            && self
                .world
                .asset(id)
                .is_some_and(|a| a.action() == AssetAction::Walk)
        {
            self.handle_walk(id);
        }
    }

    fn handle_capability(&mut self, id: AssetId) {
        let has_activated = self
            .world
            .asset(id)
            .and_then(|a| a.current_command())
            .is_some_and(|c| c.activated.is_some());
        if has_activated {
            capability::step_activated(&mut self.world, id);
        } else if let Some(asset) = self.world.asset_mut(id) {
            asset.pop_command();
        }
    }

    /// Pop the current walk, releasing its marker if it was one.
    fn finish_walk(&mut self, id: AssetId) {
        let Some(command) = self.world.asset_mut(id).and_then(|a| {
            a.step = 0;
            a.pop_command()
        }) else {
            return;
        };
        if let Some(target) = command.target {
            capability::release_marker(&mut self.world, id, target);
        }
    }

    /// Range at which the command under a walk is content to stop.
    fn lookahead_range(&self, walker: &crate::asset::Asset) -> Option<(AssetId, i32)> {
        let next = walker.next_command()?;
        let target = next.target?;
        let range = match next.action {
            AssetAction::Attack => self.world.effective_range(walker),
            AssetAction::Repair
            | AssetAction::MineGold
            | AssetAction::HarvestLumber
            | AssetAction::QuarryStone
            | AssetAction::ConveyGold
            | AssetAction::ConveyLumber
            | AssetAction::ConveyStone => 1,
            AssetAction::Capability => match next.activated {
                Some(ActivatedCapability::Build { .. }) => 1,
                _ => return None,
            },
            _ => return None,
        };
        Some((target, range))
    }

    fn handle_walk(&mut self, id: AssetId) {
        let metrics = self.world.metrics;
        let Some(asset) = self.world.asset(id) else {
            return;
        };
        let Some(target_id) = asset.current_command().and_then(|c| c.target) else {
            self.finish_walk(id);
            return;
        };
        let speed = self.world.effective_speed(asset);
        if speed <= 0 {
            self.finish_walk(id);
            return;
        }
        let Some(target) = self.world.asset(target_id) else {
            self.finish_walk(id);
            return;
        };
        let goal_pixel = target.closest_pixel(asset.position, metrics);
        let goal_tile = goal_pixel.tile(metrics);
        let aligned = asset.position.tile_aligned(metrics);

        if aligned {
            // Stop early when the command underneath is already in range.
            if let Some((look_target, range)) = self.lookahead_range(asset) {
                if let Some(t) = self.world.asset(look_target) {
                    if asset.tile_distance(t) <= range {
                        self.finish_walk(id);
                        return;
                    }
                }
            } else if asset.tile_position == goal_tile {
                self.finish_walk(id);
                return;
            }

            let from = asset.tile_position;
            let Some(direction) =
                self.router
                    .find_route(&self.world.map, &self.occupancy, id, from, goal_tile)
            else {
                self.finish_walk(id);
                return;
            };
            self.occupancy.stamp_moving(from, direction);
            if direction.is_diagonal() {
                self.occupancy.lock_corner(from, from.step(direction));
            }
            if let Some(asset) = self.world.asset_mut(id) {
                asset.direction = direction;
            }
        }

        // Advance toward the next tile center along the facing direction.
        let Some(asset) = self.world.asset_mut(id) else {
            return;
        };
        let direction = asset.direction;
        let heading_out = asset.position.tile_octant(metrics) == Some(direction);
        let dest_tile = if aligned || heading_out {
            asset.tile_position.step(direction)
        } else {
            asset.tile_position
        };
        let dest = PixelPos::from_tile(dest_tile, metrics);
        let move_axis = |from: i32, to: i32| -> i32 {
            let d = to - from;
            from + d.signum() * d.abs().min(speed)
        };
        let next = PixelPos::new(
            move_axis(asset.position.x, dest.x),
            move_axis(asset.position.y, dest.y),
        );
        asset.set_position(next, metrics);
    }

    fn handle_stand_ground(&mut self, id: AssetId) {
        let Some(asset) = self.world.asset(id) else {
            return;
        };
        let range = self.world.effective_range(asset).max(1);
        let Some(enemy) = self.world.find_nearest_visible_enemy(
            asset.color,
            asset.tile_position,
            asset.size,
            range,
        ) else {
            return;
        };
        if let Some(asset) = self.world.asset_mut(id) {
            asset.step = 0;
            asset.push_command(AssetCommand::targeted(AssetAction::Attack, enemy));
        }
    }

    fn handle_attack(&mut self, id: AssetId) {
        let metrics = self.world.metrics;
        let Some(asset) = self.world.asset(id) else {
            return;
        };
        let Some(target_id) = asset.current_command().and_then(|c| c.target) else {
            if let Some(a) = self.world.asset_mut(id) {
                a.step = 0;
                a.pop_command();
            }
            return;
        };
        if !self.world.asset(target_id).is_some_and(|t| t.alive()) {
            if let Some(a) = self.world.asset_mut(id) {
                a.step = 0;
                a.pop_command();
            }
            return;
        }

        let range = self.world.effective_range(asset);
        let Some(target) = self.world.asset(target_id) else {
            return;
        };
        if asset.tile_distance(target) > range {
            if let Some(a) = self.world.asset_mut(id) {
                a.push_command(AssetCommand::targeted(AssetAction::Walk, target_id));
            }
            return;
        }

        let facing = asset
            .position
            .direction_to(target.closest_pixel(asset.position, metrics));
        let info = self.world.type_info(asset);
        let attack_steps = info.attack_steps;
        let cycle_length = info.attack_steps + info.reload_steps;
        let basic = self.world.effective_basic_damage(asset);
        let piercing = self.world.effective_piercing_damage(asset);
        let armor = self.world.effective_armor(target);
        let attacker_color = asset.color;
        let attacker_position = asset.position;
        let attacker_tile = asset.tile_position;

        let step = match self.world.asset_mut(id) {
            Some(asset) => {
                if let Some(direction) = facing {
                    asset.direction = direction;
                }
                asset.step += 1;
                asset.step
            }
            None => return,
        };

        if step == attack_steps {
            let mut damage = (basic - armor).max(0) + piercing;
            if self.world.rng.low_bit() {
                damage /= 2;
            }
            if range > 1 {
                // Loose a projectile carrying the damage in its own
                // hit point field.
                let projectile = self.world.create_marker(attacker_color, attacker_tile);
                if let Some(p) = self.world.asset_mut(projectile) {
                    p.position = attacker_position;
                    p.hit_points = damage;
                    p.push_command(AssetCommand::targeted(AssetAction::Attack, target_id));
                    p.push_command(AssetCommand::targeted(AssetAction::Construct, target_id));
                }
                self.world.post_event(EventKind::MissileFire, projectile);
            } else {
                self.world.post_event(EventKind::MeleeHit, id);
                self.world.post_event(EventKind::Attacked, target_id);
                let dead = match self.world.asset_mut(target_id) {
                    Some(target) => {
                        target.hit_points -= damage;
                        target.hit_points <= 0
                    }
                    None => false,
                };
                if dead {
                    self.kill_asset(target_id, attacker_color);
                }
            }
        }
        if step >= cycle_length {
            if let Some(asset) = self.world.asset_mut(id) {
                asset.step = 0;
            }
        }
    }

    fn handle_repair(&mut self, id: AssetId) {
        let Some(asset) = self.world.asset(id) else {
            return;
        };
        let Some(target_id) = asset.current_command().and_then(|c| c.target) else {
            if let Some(a) = self.world.asset_mut(id) {
                a.pop_command();
            }
            return;
        };
        let Some(target) = self.world.asset(target_id).filter(|t| t.alive()) else {
            if let Some(a) = self.world.asset_mut(id) {
                a.step = 0;
                a.pop_command();
            }
            return;
        };
        if target.hit_points >= target.max_hit_points {
            if let Some(a) = self.world.asset_mut(id) {
                a.step = 0;
                a.pop_command();
            }
            return;
        }
        if asset.tile_distance(target) > 1 {
            if let Some(a) = self.world.asset_mut(id) {
                a.push_command(AssetCommand::targeted(AssetAction::Walk, target_id));
            }
            return;
        }

        let info = self.world.type_info(asset);
        let quantum = info.attack_steps + info.reload_steps;
        let color = asset.color;
        let facing = asset.tile_position.direction_to(target.tile_position);
        let done = match self.world.asset_mut(id) {
            Some(asset) => {
                if let Some(direction) = facing {
                    asset.direction = direction;
                }
                asset.step += 1;
                asset.step >= quantum
            }
            None => return,
        };
        if !done {
            return;
        }
        if let Some(asset) = self.world.asset_mut(id) {
            asset.step = 0;
        }

        // Each completed cycle of work costs a sliver of gold and lumber.
        let player = self.world.player(color);
        if player.gold > 0 && player.lumber > 0 {
            self.world.add_resources(color, -1, -1, 0);
            if let Some(target) = self.world.asset_mut(target_id) {
                target.hit_points = (target.hit_points + 1).min(target.max_hit_points);
            }
        } else if let Some(asset) = self.world.asset_mut(id) {
            asset.pop_command();
        }
    }

    /// Harvesting lumber from forest and quarrying stone from rock share
    /// one shape; only the tile type, timing, yield, and event differ.
    fn handle_gather_terrain(&mut self, id: AssetId, wanted: TileType) {
        let metrics = self.world.metrics;
        let config = self.world.config;
        let Some(asset) = self.world.asset(id) else {
            return;
        };
        let Some(marker_id) = asset.current_command().and_then(|c| c.target) else {
            if let Some(a) = self.world.asset_mut(id) {
                a.pop_command();
            }
            return;
        };
        let Some(marker) = self.world.asset(marker_id) else {
            if let Some(a) = self.world.asset_mut(id) {
                a.step = 0;
                a.pop_command();
            }
            return;
        };
        let tile = marker.tile_position;
        let remaining = match wanted {
            TileType::Forest => self.world.map.lumber(tile),
            _ => self.world.map.stone(tile),
        };

        if remaining <= 0 || self.world.map.tile_type(tile) != wanted {
            // Exhausted: retarget to the nearest patch the player knows of.
            let color = asset.color;
            let from = asset.tile_position;
            let replacement = self
                .world
                .player(color)
                .player_map
                .find_nearest_reachable_tile_type(from, wanted);
            if !replacement.is_valid() {
                if let Some(a) = self.world.asset_mut(id) {
                    a.step = 0;
                    a.pop_command();
                }
                capability::release_marker(&mut self.world, id, marker_id);
                return;
            }
            if let Some(m) = self.world.asset_mut(marker_id) {
                m.set_tile_position(replacement, metrics);
            }
            if let Some(a) = self.world.asset_mut(id) {
                a.step = 0;
                a.push_command(AssetCommand::targeted(AssetAction::Walk, marker_id));
            }
            return;
        }

        if asset.tile_distance_to(tile) > 1 {
            if let Some(a) = self.world.asset_mut(id) {
                a.push_command(AssetCommand::targeted(AssetAction::Walk, marker_id));
            }
            return;
        }

        let color = asset.color;
        let from = asset.tile_position;
        let facing = from.direction_to(tile);
        let (steps_needed, quantum) = match wanted {
            TileType::Forest => (config.harvest_steps(), config.lumber_per_harvest),
            _ => (config.quarry_steps(), config.stone_per_quarry),
        };
        let done = match self.world.asset_mut(id) {
            Some(asset) => {
                if let Some(direction) = facing {
                    asset.direction = direction;
                }
                asset.step += 1;
                asset.step >= steps_needed
            }
            None => return,
        };
        if !done {
            return;
        }

        let (gathered, event, resource) = match wanted {
            TileType::Forest => (
                self.world.map.remove_lumber(tile, quantum),
                EventKind::Harvest,
                ResourceKind::Lumber,
            ),
            _ => (
                self.world.map.remove_stone(tile, quantum),
                EventKind::Quarry,
                ResourceKind::Stone,
            ),
        };
        if let Some(asset) = self.world.asset_mut(id) {
            asset.step = 0;
            match resource {
                ResourceKind::Lumber => asset.lumber = gathered,
                ResourceKind::Stone => asset.stone = gathered,
                ResourceKind::Gold => {}
            }
        }
        if gathered <= 0 {
            return;
        }
        self.world.post_event(event, id);

        // The gather command stays underneath: after the delivery pops,
        // the loop walks back out on its own.
        match self.world.find_nearest_repository(color, from, resource) {
            Some(repository) => {
                let action = match resource {
                    ResourceKind::Lumber => AssetAction::ConveyLumber,
                    _ => AssetAction::ConveyStone,
                };
                if let Some(asset) = self.world.asset_mut(id) {
                    asset.push_command(AssetCommand::targeted(action, repository));
                    asset.push_command(AssetCommand::targeted(AssetAction::Walk, repository));
                }
            }
            None => {
                if let Some(asset) = self.world.asset_mut(id) {
                    asset.pop_command();
                }
                capability::release_marker(&mut self.world, id, marker_id);
            }
        }
    }

    fn handle_mine_gold(&mut self, id: AssetId) {
        let config = self.world.config;
        let Some(asset) = self.world.asset(id) else {
            return;
        };
        let Some(mine_id) = asset.current_command().and_then(|c| c.target) else {
            if let Some(a) = self.world.asset_mut(id) {
                a.pop_command();
            }
            return;
        };
        let Some(mine) = self.world.asset(mine_id) else {
            if let Some(a) = self.world.asset_mut(id) {
                a.step = 0;
                a.pop_command();
            }
            return;
        };
        if asset.tile_distance(mine) > 1 {
            if let Some(a) = self.world.asset_mut(id) {
                a.push_command(AssetCommand::targeted(AssetAction::Walk, mine_id));
            }
            return;
        }

        let color = asset.color;
        let from = asset.tile_position;
        let facing = from.direction_to(mine.tile_position);
        let done = match self.world.asset_mut(id) {
            Some(asset) => {
                if let Some(direction) = facing {
                    asset.direction = direction;
                }
                asset.step += 1;
                asset.step >= config.mine_steps()
            }
            None => return,
        };
        if !done {
            return;
        }

        let taken = match self.world.asset_mut(mine_id) {
            Some(mine) => {
                let taken = config.gold_per_mining.min(mine.gold);
                mine.gold -= taken;
                taken
            }
            None => return,
        };
        let exhausted = self.world.asset(mine_id).is_some_and(|m| m.gold <= 0);

        if let Some(asset) = self.world.asset_mut(id) {
            asset.step = 0;
            asset.gold = taken;
        }
        if taken <= 0 {
            if let Some(asset) = self.world.asset_mut(id) {
                asset.pop_command();
            }
            return;
        }
        self.world.post_event(EventKind::MineGold, id);

        match self
            .world
            .find_nearest_repository(color, from, ResourceKind::Gold)
        {
            Some(repository) => {
                if let Some(asset) = self.world.asset_mut(id) {
                    asset.push_command(AssetCommand::targeted(
                        AssetAction::ConveyGold,
                        repository,
                    ));
                    asset.push_command(AssetCommand::targeted(AssetAction::Walk, repository));
                }
            }
            None => {
                if let Some(asset) = self.world.asset_mut(id) {
                    asset.pop_command();
                }
            }
        }

        // A played-out mine collapses.
        if exhausted {
            self.world.post_event(EventKind::Death, mine_id);
            self.world.delete_asset(mine_id, None);
        }
    }

    fn handle_convey(&mut self, id: AssetId) {
        let config = self.world.config;
        let Some(asset) = self.world.asset(id) else {
            return;
        };
        let color = asset.color;
        let done = match self.world.asset_mut(id) {
            Some(asset) => {
                asset.step += 1;
                asset.step >= config.convey_steps()
            }
            None => return,
        };
        if !done {
            return;
        }
        let (gold, lumber, stone) = match self.world.asset_mut(id) {
            Some(asset) => {
                let load = (asset.gold, asset.lumber, asset.stone);
                asset.gold = 0;
                asset.lumber = 0;
                asset.stone = 0;
                asset.step = 0;
                asset.pop_command();
                load
            }
            None => return,
        };
        self.world.add_resources(color, gold, lumber, stone);
    }

    fn handle_death(&mut self, id: AssetId) {
        let config = self.world.config;
        let metrics = self.world.metrics;
        let done = {
            let Some(asset) = self.world.asset_mut(id) else {
                return;
            };
            asset.step += 1;
            asset.step >= config.death_steps()
        };
        if !done {
            return;
        }
        let Some(asset) = self.world.asset(id) else {
            return;
        };
        let leaves_corpse = self.world.type_info(asset).speed > 0;
        let color = asset.color;
        let tile = asset.tile_position;
        let position = asset.position;
        if leaves_corpse {
            let corpse = self.world.create_marker(color, tile);
            if let Some(c) = self.world.asset_mut(corpse) {
                c.set_position(position, metrics);
                c.push_command(AssetCommand::simple(AssetAction::Decay));
            }
        }
        self.world.delete_asset(id, None);
    }

    fn handle_decay(&mut self, id: AssetId) {
        let config = self.world.config;
        let done = {
            let Some(asset) = self.world.asset_mut(id) else {
                return;
            };
            asset.step += 1;
            asset.step >= config.decay_steps()
        };
        if done {
            self.world.delete_asset(id, None);
        }
    }

    /// Score the kill, drop the victim's in-flight work, and start its
    /// death animation. In-flight transaction costs are sunk, not
    /// refunded; combat losses are not cancellations.
    fn kill_asset(&mut self, id: AssetId, killer: PlayerColor) {
        let Some(asset) = self.world.asset_mut(id) else {
            return;
        };
        let color = asset.color;
        let asset_type = asset.type_id;
        let tile = asset.tile_position;
        let dropped = asset.take_commands();
        asset.push_command(AssetCommand::simple(AssetAction::Death));
        asset.step = 0;

        // Destination and patrol markers referenced only by the dropped
        // stack would otherwise outlive the victim forever.
        let marker_type = self.world.catalog.marker_type;
        let mut referenced: Vec<AssetId> = Vec::new();
        for command in &dropped {
            if let Some(target) = command.target {
                referenced.push(target);
            }
            if let Some(ActivatedCapability::Patrol {
                origin,
                destination,
            }) = &command.activated
            {
                referenced.push(*origin);
                referenced.push(*destination);
            }
        }
        for target in referenced {
            if self
                .world
                .asset(target)
                .is_some_and(|a| a.type_id == marker_type)
            {
                capability::release_marker(&mut self.world, id, target);
            }
        }

        self.world.post_event(EventKind::Death, id);
        if !color.is_neutral() {
            self.world.player_mut(color).note_lost(asset_type);
            self.world.queue_trigger(crate::trigger::TriggerContext {
                kind: crate::trigger::TriggerKind::AssetLoss,
                color,
                asset: Some(id),
                asset_type: Some(asset_type),
                tile,
                amount: 1,
            });
        }
        if !killer.is_neutral() && killer != color {
            self.world.player_mut(killer).note_destroyed(asset_type);
            self.world.queue_trigger(crate::trigger::TriggerContext {
                kind: crate::trigger::TriggerKind::AssetDestruction,
                color: killer,
                asset: Some(id),
                asset_type: Some(asset_type),
                tile,
                amount: 1,
            });
        }
    }

    /// Projectiles and corpses are marker-type assets; they move outside
    /// the turn-ordered dispatch, in slot order.
    fn step_markers(&mut self) {
        let marker_type = self.world.catalog.marker_type;
        let pending: Vec<(AssetId, AssetAction)> = self
            .world
            .assets
            .iter_ordered()
            .filter(|(_, a)| a.type_id == marker_type && a.command_count() > 0)
            .map(|(id, a)| (id, a.action()))
            .collect();
        for (id, action) in pending {
            match action {
                AssetAction::Construct => self.step_projectile(id),
                AssetAction::Attack => self.projectile_impact(id),
                AssetAction::Decay => self.handle_decay(id),
                _ => {}
            }
        }
    }

    fn step_projectile(&mut self, id: AssetId) {
        let metrics = self.world.metrics;
        let speed = self.world.config.projectile_speed;
        let Some(projectile) = self.world.asset(id) else {
            return;
        };
        let Some(target_id) = projectile.current_command().and_then(|c| c.target) else {
            self.world.delete_asset(id, None);
            return;
        };
        let Some(target) = self.world.asset(target_id) else {
            self.world.delete_asset(id, None);
            return;
        };
        let dest = target.closest_pixel(projectile.position, metrics);
        let position = projectile.position;
        let move_axis = |from: i32, to: i32| -> i32 {
            let d = to - from;
            from + d.signum() * d.abs().min(speed)
        };
        let next = PixelPos::new(move_axis(position.x, dest.x), move_axis(position.y, dest.y));
        if let Some(p) = self.world.asset_mut(id) {
            p.set_position(next, metrics);
            if next == dest {
                // Arrived; the strike underneath lands next pass.
                p.pop_command();
            }
        }
    }

    fn projectile_impact(&mut self, id: AssetId) {
        let Some(projectile) = self.world.asset(id) else {
            return;
        };
        let damage = projectile.hit_points;
        let color = projectile.color;
        let target_id = projectile.current_command().and_then(|c| c.target);

        if let Some(target_id) = target_id {
            if self.world.asset(target_id).is_some_and(|t| t.alive()) {
                self.world.post_event(EventKind::MissileHit, target_id);
                self.world.post_event(EventKind::Attacked, target_id);
                let dead = match self.world.asset_mut(target_id) {
                    Some(target) => {
                        target.hit_points -= damage;
                        target.hit_points <= 0
                    }
                    None => false,
                };
                if dead {
                    self.kill_asset(target_id, color);
                }
            }
        }
        self.world.delete_asset(id, None);
    }

    /// Assets are visited in slot order so the resolver sees location
    /// triggers in the same order on every run; the tile map from last
    /// cycle is only consulted for the change diff.
    fn fire_location_triggers(&mut self) {
        let marker_type = self.world.catalog.marker_type;
        let mut current: HashMap<AssetId, TilePos> = HashMap::new();
        let mut moved: Vec<crate::trigger::TriggerContext> = Vec::new();
        for (id, asset) in self.world.assets.iter_ordered() {
            if asset.type_id == marker_type || asset.color.is_neutral() {
                continue;
            }
            let tile = asset.tile_position;
            if self.last_tiles.get(&id) != Some(&tile) {
                moved.push(crate::trigger::TriggerContext {
                    kind: crate::trigger::TriggerKind::AssetLocation,
                    color: asset.color,
                    asset: Some(id),
                    asset_type: Some(asset.type_id),
                    tile,
                    amount: 0,
                });
            }
            current.insert(id, tile);
        }
        for context in moved {
            self.world.queue_trigger(context);
        }
        self.last_tiles = current;
    }

    fn resolve_triggers(&mut self) {
        let contexts = std::mem::take(&mut self.world.pending_triggers);
        for context in contexts {
            let effects = self.trigger.resolve(&context);
            for effect in effects {
                self.apply_trigger_effect(effect);
            }
        }
    }

    fn apply_trigger_effect(&mut self, effect: TriggerEffect) {
        match effect {
            TriggerEffect::AddAsset {
                color,
                asset_type,
                tile,
            } => {
                self.world.create_asset(asset_type, color, tile);
            }
            TriggerEffect::RemoveAsset { asset } => {
                self.world.delete_asset(asset, None);
            }
            TriggerEffect::ChangeResources {
                color,
                gold,
                lumber,
                stone,
            } => {
                self.world.add_resources(color, gold, lumber, stone);
            }
            TriggerEffect::ModifyAssetHealth { asset, delta } => {
                let dead = match self.world.asset_mut(asset) {
                    Some(a) => {
                        a.hit_points = (a.hit_points + delta).min(a.max_hit_points);
                        a.hit_points <= 0
                    }
                    None => false,
                };
                if dead {
                    self.kill_asset(asset, PlayerColor::NONE);
                }
            }
            TriggerEffect::AddUpgrade { color, upgrade } => {
                self.world.player_mut(color).add_upgrade(upgrade);
            }
            TriggerEffect::RemoveUpgrade { color, upgrade } => {
                self.world.player_mut(color).remove_upgrade(upgrade);
            }
        }
    }

    fn broadcast_events(&mut self) {
        let events = std::mem::take(&mut self.world.events);
        if events.is_empty() {
            return;
        }
        for player in self.world.players.iter_mut().skip(1) {
            for event in &events {
                player.add_event(event.clone());
            }
        }
    }

    /// Canonical end-of-cycle state summary for desync detection.
    pub fn state_digest(&self) -> StateDigest {
        let marker_type = self.world.catalog.marker_type;
        let assets = self
            .world
            .assets
            .iter_ordered()
            .filter(|(_, a)| a.type_id != marker_type)
            .map(|(id, a)| AssetDigest {
                id,
                type_id: a.type_id,
                color: a.color,
                tile: a.tile_position,
                hit_points: a.hit_points,
            })
            .collect();
        let wallets = self
            .world
            .players
            .iter()
            .skip(1)
            .map(|p| WalletDigest {
                color: p.color,
                gold: p.gold,
                lumber: p.lumber,
                stone: p.stone,
            })
            .collect();
        StateDigest {
            cycle: self.world.cycle,
            assets,
            wallets,
        }
    }
}

/// Rebuild a game from a replay, feeding each command in at its recorded
/// cycle. The returned model sits at the cycle after the last command;
/// callers may keep stepping it.
pub fn import_replay(
    replay: &ReplayFile,
    catalog: AssetCatalog,
    map: AssetMap,
    config: SimConfig,
    metrics: TileMetrics,
    trigger: Box<dyn TriggerResolver>,
    mut setup: impl FnMut(&mut GameModel),
) -> Result<GameModel, ReplayImportError> {
    if replay.version != REPLAY_VERSION {
        return Err(ReplayImportError::Version(replay.version));
    }
    if replay.catalog_hash != catalog.hash {
        return Err(ReplayImportError::CatalogMismatch);
    }
    if replay.map_width != map.width() as u32 || replay.map_height != map.height() as u32 {
        return Err(ReplayImportError::MapMismatch {
            want_w: replay.map_width,
            want_h: replay.map_height,
            found_w: map.width() as u32,
            found_h: map.height() as u32,
        });
    }

    let mut model = GameModel::new(
        catalog,
        map,
        replay.num_players as u8,
        replay.seed,
        config,
        metrics,
        trigger,
    );
    setup(&mut model);

    for entry in &replay.commands {
        if entry.cycle < model.cycle() {
            return Err(ReplayImportError::OutOfOrder(entry.cycle));
        }
        while model.cycle() < entry.cycle {
            model.timestep();
        }
        model.apply_command(&entry.command)?;
    }
    Ok(model)
}
