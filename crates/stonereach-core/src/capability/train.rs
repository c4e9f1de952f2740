use stonereach_protocol::{AssetAction, AssetId, AssetTypeId, CapabilityKind, EventKind};

use crate::asset::AssetCommand;
use crate::world::World;

use super::{interrupt_commands, ActivatedCapability, Capability, TimedState};

/// A completed building producing a unit. Cost and a food slot are
/// claimed up front; the recruit exists from cycle one at 1 hit point,
/// tucked inside the building's footprint until training completes.
pub struct TrainCapability {
    pub kind: CapabilityKind,
    pub unit: AssetTypeId,
}

impl Capability for TrainCapability {
    fn can_initiate(&self, world: &World, actor: AssetId) -> bool {
        let Some(asset) = world.asset(actor) else {
            return false;
        };
        if asset.action() == AssetAction::Construct {
            return false;
        }
        let info = world.catalog.asset_type(self.unit);
        if !world
            .player(asset.color)
            .can_afford(info.gold_cost, info.lumber_cost, info.stone_cost)
        {
            return false;
        }
        if !world.requirements_met(asset.color, self.unit) {
            return false;
        }
        let headroom =
            world.food_production(asset.color) - world.food_consumption(asset.color);
        headroom >= info.food_consumption
    }

    fn can_apply(&self, world: &World, actor: AssetId, _target: AssetId) -> bool {
        self.can_initiate(world, actor)
    }

    fn apply(&self, world: &mut World, actor: AssetId, _target: AssetId) -> bool {
        if !self.can_initiate(world, actor) {
            return false;
        }
        let (color, site) = match world.asset(actor) {
            Some(a) => (a.color, a.tile_position),
            None => return false,
        };
        let info = world.catalog.asset_type(self.unit).clone();

        interrupt_commands(world, actor);
        world.add_resources(color, -info.gold_cost, -info.lumber_cost, -info.stone_cost);

        let trainee = world.create_asset(self.unit, color, site);
        if let Some(unit) = world.asset_mut(trainee) {
            unit.hit_points = 1;
            unit.push_command(AssetCommand::targeted(AssetAction::Construct, actor));
        }

        let total = info.build_time * world.config.update_frequency;
        if let Some(asset) = world.asset_mut(actor) {
            asset.step = 0;
            asset.push_command(AssetCommand::capability(
                self.kind,
                trainee,
                Some(ActivatedCapability::Train {
                    trainee,
                    timed: TimedState::new(
                        total,
                        info.gold_cost,
                        info.lumber_cost,
                        info.stone_cost,
                    ),
                }),
            ));
        }
        true
    }
}

/// One training step; mirrors construction, with the building as the
/// active half and the recruit as the passive one.
pub(super) fn step_train(
    world: &mut World,
    actor: AssetId,
    mut command: AssetCommand,
    trainee: AssetId,
    mut timed: TimedState,
) {
    let metrics = world.metrics;
    let Some(max_hp) = world.asset(trainee).map(|t| t.max_hit_points) else {
        if let Some(asset) = world.asset_mut(actor) {
            asset.step = 0;
        }
        return;
    };

    let delta = timed.hit_point_delta(max_hp);
    timed.step += 1;
    if let Some(unit) = world.asset_mut(trainee) {
        unit.hit_points = (unit.hit_points + delta).min(max_hp);
    }
    if let Some(asset) = world.asset_mut(actor) {
        asset.step += 1;
    }

    if timed.step < timed.total {
        command.activated = Some(ActivatedCapability::Train { trainee, timed });
        if let Some(asset) = world.asset_mut(actor) {
            asset.push_command(command);
        }
        return;
    }

    // Done: place the recruit next to its building and announce it.
    let (site, site_size, color) = match world.asset(actor) {
        Some(a) => (a.tile_position, a.size, a.color),
        None => return,
    };
    let spot = world
        .player(color)
        .player_map
        .find_best_asset_placement(site, site, site_size, 1, trainee);
    if let Some(unit) = world.asset_mut(trainee) {
        unit.hit_points = unit.max_hit_points;
        unit.pop_command();
        unit.step = 0;
        if spot.is_valid() {
            unit.set_tile_position(spot, metrics);
        }
    }
    if let Some(asset) = world.asset_mut(actor) {
        asset.step = 0;
    }
    world.post_event(EventKind::Ready, trainee);
}
