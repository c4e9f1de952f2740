use stonereach_protocol::{AssetAction, AssetId, AssetTypeId, CapabilityKind, EventKind};

use crate::asset::AssetCommand;
use crate::world::World;

use super::{interrupt_commands, release_marker, ActivatedCapability, Capability, TimedState};

/// A peasant raising a building at a marker tile. The full cost is paid
/// when the order is accepted; the building enters play at 1 hit point
/// and grows toward its maximum as construction steps complete.
pub struct BuildCapability {
    pub kind: CapabilityKind,
    pub building: AssetTypeId,
}

impl Capability for BuildCapability {
    fn can_initiate(&self, world: &World, actor: AssetId) -> bool {
        let Some(asset) = world.asset(actor) else {
            return false;
        };
        let info = world.catalog.asset_type(self.building);
        world
            .player(asset.color)
            .can_afford(info.gold_cost, info.lumber_cost, info.stone_cost)
            && world.requirements_met(asset.color, self.building)
    }

    fn can_apply(&self, world: &World, actor: AssetId, target: AssetId) -> bool {
        if !self.can_initiate(world, actor) {
            return false;
        }
        let Some(actor_asset) = world.asset(actor) else {
            return false;
        };
        let Some(marker) = world.asset(target) else {
            return false;
        };
        let size = world.catalog.asset_type(self.building).size;
        world
            .player(actor_asset.color)
            .player_map
            .can_place_asset(marker.tile_position, size, actor)
    }

    fn apply(&self, world: &mut World, actor: AssetId, target: AssetId) -> bool {
        if !self.can_apply(world, actor, target) {
            return false;
        }
        let (color, tile) = match world.asset(target) {
            Some(marker) => (
                world.asset(actor).map(|a| a.color).unwrap_or(marker.color),
                marker.tile_position,
            ),
            None => return false,
        };
        let info = world.catalog.asset_type(self.building).clone();

        interrupt_commands(world, actor);
        world.add_resources(color, -info.gold_cost, -info.lumber_cost, -info.stone_cost);

        let construction = world.create_asset(self.building, color, tile);
        if let Some(building) = world.asset_mut(construction) {
            building.hit_points = 1;
            building.push_command(AssetCommand::targeted(AssetAction::Construct, actor));
        }
        world.post_event(EventKind::PlaceAction, construction);

        let total = info.build_time * world.config.update_frequency;
        if let Some(asset) = world.asset_mut(actor) {
            asset.step = 0;
            asset.push_command(AssetCommand::capability(
                self.kind,
                construction,
                Some(ActivatedCapability::Build {
                    construction,
                    timed: TimedState::new(
                        total,
                        info.gold_cost,
                        info.lumber_cost,
                        info.stone_cost,
                    ),
                }),
            ));
            asset.push_command(AssetCommand {
                action: AssetAction::Walk,
                capability: Some(self.kind),
                target: Some(construction),
                activated: None,
            });
        }
        release_marker(world, actor, target);
        true
    }
}

/// One construction step. Called once per cycle while the builder's
/// capability command is on top of its stack, which only happens after
/// the approach walk has popped.
pub(super) fn step_build(
    world: &mut World,
    actor: AssetId,
    mut command: AssetCommand,
    construction: AssetId,
    mut timed: TimedState,
) {
    let metrics = world.metrics;
    let Some(max_hp) = world.asset(construction).map(|b| b.max_hit_points) else {
        // Building destroyed out from under the builder; the cost is sunk.
        if let Some(asset) = world.asset_mut(actor) {
            asset.step = 0;
        }
        return;
    };

    let delta = timed.hit_point_delta(max_hp);
    timed.step += 1;
    if let Some(building) = world.asset_mut(construction) {
        building.hit_points = (building.hit_points + delta).min(max_hp);
        building.step += 1;
    }
    if let Some(asset) = world.asset_mut(actor) {
        asset.step += 1;
    }

    if timed.step < timed.total {
        command.activated = Some(ActivatedCapability::Build {
            construction,
            timed,
        });
        if let Some(asset) = world.asset_mut(actor) {
            asset.push_command(command);
        }
        return;
    }

    // Done: finish the building and step the builder off the footprint.
    let (site, site_size) = match world.asset_mut(construction) {
        Some(building) => {
            building.hit_points = building.max_hit_points;
            building.pop_command();
            building.step = 0;
            (building.tile_position, building.size)
        }
        None => return,
    };
    world.post_event(EventKind::WorkComplete, actor);

    let Some(color) = world.asset(actor).map(|a| a.color) else {
        return;
    };
    let spot = world
        .player(color)
        .player_map
        .find_asset_placement(site, site_size, 1, actor);
    if let Some(asset) = world.asset_mut(actor) {
        asset.step = 0;
        if spot.is_valid() {
            asset.set_tile_position(spot, metrics);
        }
    }
}
