use stonereach_protocol::{AssetAction, AssetId, AssetTypeId, CapabilityKind, EventKind, UpgradeId};

use crate::asset::AssetCommand;
use crate::world::World;

use super::{interrupt_commands, ActivatedCapability, Capability, TimedState};

/// A building converting itself into a stronger type (town hall to keep,
/// scout tower to guard tower, ...). Pays the target type's cost; the
/// conversion lands all at once when the timer completes.
pub struct BuildingUpgradeCapability {
    pub kind: CapabilityKind,
    pub target_type: AssetTypeId,
}

impl Capability for BuildingUpgradeCapability {
    fn can_initiate(&self, world: &World, actor: AssetId) -> bool {
        let Some(asset) = world.asset(actor) else {
            return false;
        };
        if asset.action() == AssetAction::Construct {
            return false;
        }
        let info = world.catalog.asset_type(self.target_type);
        world
            .player(asset.color)
            .can_afford(info.gold_cost, info.lumber_cost, info.stone_cost)
            && world.requirements_met(asset.color, self.target_type)
    }

    fn can_apply(&self, world: &World, actor: AssetId, _target: AssetId) -> bool {
        self.can_initiate(world, actor)
    }

    fn apply(&self, world: &mut World, actor: AssetId, _target: AssetId) -> bool {
        if !self.can_initiate(world, actor) {
            return false;
        }
        let Some(color) = world.asset(actor).map(|a| a.color) else {
            return false;
        };
        let info = world.catalog.asset_type(self.target_type).clone();

        interrupt_commands(world, actor);
        world.add_resources(color, -info.gold_cost, -info.lumber_cost, -info.stone_cost);

        let total = info.build_time * world.config.update_frequency;
        if let Some(asset) = world.asset_mut(actor) {
            asset.step = 0;
            asset.push_command(AssetCommand::capability(
                self.kind,
                actor,
                Some(ActivatedCapability::BuildingUpgrade {
                    target_type: self.target_type,
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

pub(super) fn step_building_upgrade(
    world: &mut World,
    actor: AssetId,
    mut command: AssetCommand,
    target_type: AssetTypeId,
    mut timed: TimedState,
) {
    timed.step += 1;
    if let Some(asset) = world.asset_mut(actor) {
        asset.step += 1;
    }

    if timed.step < timed.total {
        command.activated = Some(ActivatedCapability::BuildingUpgrade { target_type, timed });
        if let Some(asset) = world.asset_mut(actor) {
            asset.push_command(command);
        }
        return;
    }

    let new_info = world.catalog.asset_type(target_type).clone();
    if let Some(asset) = world.asset_mut(actor) {
        let old_max = asset.max_hit_points;
        asset.type_id = target_type;
        asset.size = new_info.size;
        asset.max_hit_points = new_info.hit_points;
        asset.hit_points = (asset.hit_points + new_info.hit_points - old_max)
            .clamp(1, new_info.hit_points);
        asset.step = 0;
    }
    world.post_event(EventKind::WorkComplete, actor);
}

/// Researching a stat upgrade at a building. The upgrade bit flips for
/// the whole player when the timer completes.
pub struct ResearchCapability {
    pub kind: CapabilityKind,
    pub upgrade: UpgradeId,
}

impl Capability for ResearchCapability {
    fn can_initiate(&self, world: &World, actor: AssetId) -> bool {
        let Some(asset) = world.asset(actor) else {
            return false;
        };
        if asset.action() == AssetAction::Construct {
            return false;
        }
        let player = world.player(asset.color);
        if player.has_upgrade(self.upgrade) {
            return false;
        }
        let info = world.catalog.upgrade(self.upgrade);
        player.can_afford(info.gold_cost, info.lumber_cost, info.stone_cost)
    }

    fn can_apply(&self, world: &World, actor: AssetId, _target: AssetId) -> bool {
        self.can_initiate(world, actor)
    }

    fn apply(&self, world: &mut World, actor: AssetId, _target: AssetId) -> bool {
        if !self.can_initiate(world, actor) {
            return false;
        }
        let Some(color) = world.asset(actor).map(|a| a.color) else {
            return false;
        };
        let info = world.catalog.upgrade(self.upgrade).clone();

        interrupt_commands(world, actor);
        world.add_resources(color, -info.gold_cost, -info.lumber_cost, -info.stone_cost);

        let total = info.research_time * world.config.update_frequency;
        if let Some(asset) = world.asset_mut(actor) {
            asset.step = 0;
            asset.push_command(AssetCommand::capability(
                self.kind,
                actor,
                Some(ActivatedCapability::Research {
                    upgrade: self.upgrade,
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

pub(super) fn step_research(
    world: &mut World,
    actor: AssetId,
    mut command: AssetCommand,
    upgrade: UpgradeId,
    mut timed: TimedState,
) {
    timed.step += 1;
    if let Some(asset) = world.asset_mut(actor) {
        asset.step += 1;
    }

    if timed.step < timed.total {
        command.activated = Some(ActivatedCapability::Research { upgrade, timed });
        if let Some(asset) = world.asset_mut(actor) {
            asset.push_command(command);
        }
        return;
    }

    if let Some(color) = world.asset(actor).map(|a| a.color) {
        world.player_mut(color).add_upgrade(upgrade);
    }
    if let Some(asset) = world.asset_mut(actor) {
        asset.step = 0;
    }
    world.post_event(EventKind::Ready, actor);
}
