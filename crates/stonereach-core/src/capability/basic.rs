use stonereach_protocol::{AssetAction, AssetId, CapabilityKind, ResourceKind};

use crate::asset::AssetCommand;
use crate::world::World;

use super::{cancel_command, interrupt_commands, release_marker, ActivatedCapability, Capability};

/// Send a mobile asset to a marker.
pub struct MoveCapability {
    pub kind: CapabilityKind,
}

impl Capability for MoveCapability {
    fn can_initiate(&self, world: &World, actor: AssetId) -> bool {
        world
            .asset(actor)
            .is_some_and(|a| world.effective_speed(a) > 0)
    }

    fn can_apply(&self, world: &World, actor: AssetId, target: AssetId) -> bool {
        self.can_initiate(world, actor) && world.asset(target).is_some()
    }

    fn apply(&self, world: &mut World, actor: AssetId, target: AssetId) -> bool {
        if !self.can_apply(world, actor, target) {
            return false;
        }
        interrupt_commands(world, actor);
        if let Some(asset) = world.asset_mut(actor) {
            asset.step = 0;
            asset.push_command(AssetCommand::capability(
                self.kind,
                target,
                Some(ActivatedCapability::Move),
            ));
        }
        true
    }
}

/// Walk back and forth between the actor's current tile and a marker.
pub struct PatrolCapability {
    pub kind: CapabilityKind,
}

impl Capability for PatrolCapability {
    fn can_initiate(&self, world: &World, actor: AssetId) -> bool {
        world
            .asset(actor)
            .is_some_and(|a| world.effective_speed(a) > 0)
    }

    fn can_apply(&self, world: &World, actor: AssetId, target: AssetId) -> bool {
        self.can_initiate(world, actor) && world.asset(target).is_some()
    }

    fn apply(&self, world: &mut World, actor: AssetId, target: AssetId) -> bool {
        if !self.can_apply(world, actor, target) {
            return false;
        }
        let (color, tile) = match world.asset(actor) {
            Some(a) => (a.color, a.tile_position),
            None => return false,
        };
        interrupt_commands(world, actor);
        let origin = world.create_marker(color, tile);
        if let Some(asset) = world.asset_mut(actor) {
            asset.step = 0;
            asset.push_command(AssetCommand::capability(
                self.kind,
                target,
                Some(ActivatedCapability::Patrol {
                    origin,
                    destination: target,
                }),
            ));
        }
        true
    }
}

pub struct AttackCapability {
    pub kind: CapabilityKind,
}

impl Capability for AttackCapability {
    fn can_initiate(&self, world: &World, actor: AssetId) -> bool {
        world
            .asset(actor)
            .is_some_and(|a| world.effective_speed(a) > 0 || world.effective_range(a) > 0)
    }

    fn can_apply(&self, world: &World, actor: AssetId, target: AssetId) -> bool {
        if !self.can_initiate(world, actor) {
            return false;
        }
        let Some(actor_asset) = world.asset(actor) else {
            return false;
        };
        world
            .asset(target)
            .is_some_and(|t| t.alive() && !t.color.is_neutral() && t.color != actor_asset.color)
    }

    fn apply(&self, world: &mut World, actor: AssetId, target: AssetId) -> bool {
        if !self.can_apply(world, actor, target) {
            return false;
        }
        interrupt_commands(world, actor);
        if let Some(asset) = world.asset_mut(actor) {
            asset.step = 0;
            asset.push_command(AssetCommand::capability(
                self.kind,
                target,
                Some(ActivatedCapability::Attack),
            ));
        }
        true
    }
}

/// Hold position, auto-engaging anything that comes into range.
pub struct StandGroundCapability {
    pub kind: CapabilityKind,
}

impl Capability for StandGroundCapability {
    fn can_initiate(&self, world: &World, actor: AssetId) -> bool {
        world.asset(actor).is_some()
    }

    fn can_apply(&self, world: &World, actor: AssetId, _target: AssetId) -> bool {
        self.can_initiate(world, actor)
    }

    fn apply(&self, world: &mut World, actor: AssetId, _target: AssetId) -> bool {
        if !self.can_initiate(world, actor) {
            return false;
        }
        interrupt_commands(world, actor);
        if let Some(asset) = world.asset_mut(actor) {
            asset.step = 0;
            asset.push_command(AssetCommand::capability(
                self.kind,
                actor,
                Some(ActivatedCapability::StandGround),
            ));
        }
        true
    }
}

pub struct RepairCapability {
    pub kind: CapabilityKind,
}

impl Capability for RepairCapability {
    fn can_initiate(&self, world: &World, actor: AssetId) -> bool {
        let Some(asset) = world.asset(actor) else {
            return false;
        };
        let player = world.player(asset.color);
        world.effective_speed(asset) > 0 && player.gold > 0 && player.lumber > 0
    }

    fn can_apply(&self, world: &World, actor: AssetId, target: AssetId) -> bool {
        if !self.can_initiate(world, actor) {
            return false;
        }
        let Some(actor_asset) = world.asset(actor) else {
            return false;
        };
        world.asset(target).is_some_and(|t| {
            t.color == actor_asset.color
                && world.type_info(t).is_building()
                && t.action() != AssetAction::Construct
                && t.alive()
                && t.hit_points < t.max_hit_points
        })
    }

    fn apply(&self, world: &mut World, actor: AssetId, target: AssetId) -> bool {
        if !self.can_apply(world, actor, target) {
            return false;
        }
        interrupt_commands(world, actor);
        if let Some(asset) = world.asset_mut(actor) {
            asset.step = 0;
            asset.push_command(AssetCommand::capability(
                self.kind,
                target,
                Some(ActivatedCapability::Repair),
            ));
        }
        true
    }
}

/// Deliver whatever the actor is carrying to a drop-off building.
pub struct ConveyCapability {
    pub kind: CapabilityKind,
}

impl Capability for ConveyCapability {
    fn can_initiate(&self, world: &World, actor: AssetId) -> bool {
        world.asset(actor).is_some_and(|a| a.carrying().is_some())
    }

    fn can_apply(&self, world: &World, actor: AssetId, target: AssetId) -> bool {
        let Some(actor_asset) = world.asset(actor) else {
            return false;
        };
        let Some((resource, _)) = actor_asset.carrying() else {
            return false;
        };
        world.asset(target).is_some_and(|t| {
            t.color == actor_asset.color
                && t.action() != AssetAction::Construct
                && repository_accepts(world, t.type_id, resource)
        })
    }

    fn apply(&self, world: &mut World, actor: AssetId, target: AssetId) -> bool {
        if !self.can_apply(world, actor, target) {
            return false;
        }
        interrupt_commands(world, actor);
        if let Some(asset) = world.asset_mut(actor) {
            asset.step = 0;
            asset.push_command(AssetCommand::capability(
                self.kind,
                target,
                Some(ActivatedCapability::Convey),
            ));
        }
        true
    }
}

/// Gather gold from a mine, or lumber/stone from a terrain marker.
pub struct MineCapability {
    pub kind: CapabilityKind,
}

impl Capability for MineCapability {
    fn can_initiate(&self, world: &World, actor: AssetId) -> bool {
        world
            .asset(actor)
            .is_some_and(|a| world.effective_speed(a) > 0)
    }

    fn can_apply(&self, world: &World, actor: AssetId, target: AssetId) -> bool {
        if !self.can_initiate(world, actor) {
            return false;
        }
        let Some(target_asset) = world.asset(target) else {
            return false;
        };
        if Some(target_asset.type_id) == world.catalog.asset_type_id("gold_mine") {
            return target_asset.gold > 0;
        }
        if target_asset.type_id == world.catalog.marker_type {
            let tile_type = world.map.tile_type(target_asset.tile_position);
            return matches!(
                tile_type,
                stonereach_protocol::TileType::Forest | stonereach_protocol::TileType::Rock
            );
        }
        false
    }

    fn apply(&self, world: &mut World, actor: AssetId, target: AssetId) -> bool {
        if !self.can_apply(world, actor, target) {
            return false;
        }
        interrupt_commands(world, actor);
        if let Some(asset) = world.asset_mut(actor) {
            asset.step = 0;
            asset.push_command(AssetCommand::capability(
                self.kind,
                target,
                Some(ActivatedCapability::Mine),
            ));
        }
        true
    }
}

/// Abort the actor's current command, unwinding any transaction in it.
pub struct CancelCapability;

impl Capability for CancelCapability {
    fn can_initiate(&self, world: &World, actor: AssetId) -> bool {
        world.asset(actor).is_some_and(|a| a.command_count() > 0)
    }

    fn can_apply(&self, world: &World, actor: AssetId, _target: AssetId) -> bool {
        self.can_initiate(world, actor)
    }

    fn apply(&self, world: &mut World, actor: AssetId, _target: AssetId) -> bool {
        let Some(command) = world.asset_mut(actor).and_then(|a| a.pop_command()) else {
            return false;
        };
        cancel_command(world, actor, command);
        if let Some(asset) = world.asset_mut(actor) {
            asset.step = 0;
        }
        true
    }
}

fn repository_accepts(
    world: &World,
    type_id: stonereach_protocol::AssetTypeId,
    resource: ResourceKind,
) -> bool {
    match world.catalog.asset_type(type_id).name.as_str() {
        "TownHall" | "Keep" | "Castle" => true,
        "LumberMill" => resource == ResourceKind::Lumber,
        _ => false,
    }
}

/// First increment of Move: face sensibly and head for the marker.
pub(super) fn step_move(world: &mut World, actor: AssetId, command: AssetCommand) {
    let metrics = world.metrics;
    let Some(asset) = world.asset_mut(actor) else {
        return;
    };
    if let Some(octant) = asset.position.tile_octant(metrics) {
        asset.direction = octant.opposite();
    }
    asset.step = 0;
    asset.push_command(AssetCommand {
        action: AssetAction::Walk,
        capability: command.capability,
        target: command.target,
        activated: None,
    });
}

/// One patrol leg: walk to the current destination, leaving a re-armed
/// patrol command underneath with the endpoints swapped.
pub(super) fn step_patrol(
    world: &mut World,
    actor: AssetId,
    command: AssetCommand,
    origin: AssetId,
    destination: AssetId,
) {
    let metrics = world.metrics;
    if world.asset(actor).is_none() || world.asset(destination).is_none() {
        release_marker(world, actor, origin);
        release_marker(world, actor, destination);
        return;
    }
    let kind = command.capability.unwrap_or(CapabilityKind::Patrol);
    let Some(asset) = world.asset_mut(actor) else {
        return;
    };
    if let Some(octant) = asset.position.tile_octant(metrics) {
        asset.direction = octant.opposite();
    }
    asset.step = 0;
    asset.push_command(AssetCommand::capability(
        kind,
        origin,
        Some(ActivatedCapability::Patrol {
            origin: destination,
            destination: origin,
        }),
    ));
    asset.push_command(AssetCommand {
        action: AssetAction::Walk,
        capability: Some(kind),
        target: Some(destination),
        activated: None,
    });
}

/// First increment of Attack: queue the strike and the approach walk.
pub(super) fn step_attack(world: &mut World, actor: AssetId, command: AssetCommand) {
    let Some(target) = command.target else {
        return;
    };
    if !world.asset(target).is_some_and(|t| t.alive()) {
        return;
    }
    let Some(asset) = world.asset_mut(actor) else {
        return;
    };
    asset.step = 0;
    asset.push_command(AssetCommand {
        action: AssetAction::Attack,
        capability: command.capability,
        target: Some(target),
        activated: None,
    });
    asset.push_command(AssetCommand {
        action: AssetAction::Walk,
        capability: command.capability,
        target: Some(target),
        activated: None,
    });
}

/// First increment of StandGround: settle onto a tile and hold it.
pub(super) fn step_stand_ground(world: &mut World, actor: AssetId) {
    let metrics = world.metrics;
    let Some(asset) = world.asset(actor) else {
        return;
    };
    let color = asset.color;
    let tile = asset.tile_position;
    let aligned = asset.position.tile_aligned(metrics);

    let walk_marker = if aligned {
        None
    } else {
        Some(world.create_marker(color, tile))
    };
    let Some(asset) = world.asset_mut(actor) else {
        return;
    };
    asset.step = 0;
    asset.push_command(AssetCommand::simple(AssetAction::StandGround));
    if let Some(marker) = walk_marker {
        asset.push_command(AssetCommand {
            action: AssetAction::Walk,
            capability: Some(CapabilityKind::StandGround),
            target: Some(marker),
            activated: None,
        });
    }
}

/// First increment of Repair: approach the damaged building.
pub(super) fn step_repair(world: &mut World, actor: AssetId, command: AssetCommand) {
    let Some(target) = command.target else {
        return;
    };
    if !world
        .asset(target)
        .is_some_and(|t| t.alive() && t.hit_points < t.max_hit_points)
    {
        return;
    }
    let Some(asset) = world.asset_mut(actor) else {
        return;
    };
    asset.step = 0;
    asset.push_command(AssetCommand {
        action: AssetAction::Repair,
        capability: command.capability,
        target: Some(target),
        activated: None,
    });
    asset.push_command(AssetCommand {
        action: AssetAction::Walk,
        capability: command.capability,
        target: Some(target),
        activated: None,
    });
}

/// First increment of Convey: head for a drop-off with the carried load.
pub(super) fn step_convey(world: &mut World, actor: AssetId, command: AssetCommand) {
    let Some((resource, _)) = world.asset(actor).and_then(|a| a.carrying()) else {
        return;
    };
    let repository = command
        .target
        .filter(|&id| world.asset(id).is_some_and(|t| t.alive()))
        .or_else(|| {
            let asset = world.asset(actor)?;
            world.find_nearest_repository(asset.color, asset.tile_position, resource)
        });
    let Some(repository) = repository else {
        return;
    };
    let action = match resource {
        ResourceKind::Gold => AssetAction::ConveyGold,
        ResourceKind::Lumber => AssetAction::ConveyLumber,
        ResourceKind::Stone => AssetAction::ConveyStone,
    };
    let Some(asset) = world.asset_mut(actor) else {
        return;
    };
    asset.step = 0;
    asset.push_command(AssetCommand {
        action,
        capability: command.capability,
        target: Some(repository),
        activated: None,
    });
    asset.push_command(AssetCommand {
        action: AssetAction::Walk,
        capability: command.capability,
        target: Some(repository),
        activated: None,
    });
}

/// First increment of Mine: pick the gather action from the target.
pub(super) fn step_mine(world: &mut World, actor: AssetId, command: AssetCommand) {
    let Some(target) = command.target else {
        return;
    };
    let Some(target_asset) = world.asset(target) else {
        return;
    };
    let action = if Some(target_asset.type_id) == world.catalog.asset_type_id("gold_mine") {
        AssetAction::MineGold
    } else {
        match world.map.tile_type(target_asset.tile_position) {
            stonereach_protocol::TileType::Forest => AssetAction::HarvestLumber,
            stonereach_protocol::TileType::Rock => AssetAction::QuarryStone,
            _ => {
                release_marker(world, actor, target);
                return;
            }
        }
    };
    let Some(asset) = world.asset_mut(actor) else {
        return;
    };
    asset.step = 0;
    asset.push_command(AssetCommand {
        action,
        capability: command.capability,
        target: Some(target),
        activated: None,
    });
    asset.push_command(AssetCommand {
        action: AssetAction::Walk,
        capability: command.capability,
        target: Some(target),
        activated: None,
    });
}
