mod basic;
mod build;
mod train;
mod upgrade;

use std::collections::HashMap;

use stonereach_protocol::{AssetAction, AssetId, AssetTypeId, CapabilityKind, UpgradeId};

use crate::asset::AssetCommand;
use crate::world::World;

pub use basic::{
    AttackCapability, CancelCapability, ConveyCapability, MineCapability, MoveCapability,
    PatrolCapability, RepairCapability, StandGroundCapability,
};
pub use build::BuildCapability;
pub use train::TrainCapability;
pub use upgrade::{BuildingUpgradeCapability, ResearchCapability};

/// Progress clock for the paid, timed capability families (construction,
/// training, upgrades). The amounts paid up front are remembered so a
/// cancel refunds exactly what was taken.
#[derive(Debug)]
pub struct TimedState {
    pub step: i32,
    pub total: i32,
    pub gold_paid: i32,
    pub lumber_paid: i32,
    pub stone_paid: i32,
}

impl TimedState {
    pub fn new(total: i32, gold_paid: i32, lumber_paid: i32, stone_paid: i32) -> Self {
        Self {
            step: 0,
            total: total.max(1),
            gold_paid,
            lumber_paid,
            stone_paid,
        }
    }

    /// Integer percent in 0..=100 for client progress bars.
    pub fn percent_complete(&self) -> i32 {
        self.step * 100 / self.total
    }

    /// Hit points to add this step. Integer division distributes the
    /// rounding so the deltas over all steps sum exactly to `max`.
    pub fn hit_point_delta(&self, max: i32) -> i32 {
        max * (self.step + 1) / self.total - max * self.step / self.total
    }
}

/// In-flight state carried by a Capability command on the stack. One-shot
/// arrangers (Move, Attack, ...) hold no payload; the command's own target
/// is all they need.
#[derive(Debug)]
pub enum ActivatedCapability {
    Move,
    Patrol {
        origin: AssetId,
        destination: AssetId,
    },
    Attack,
    StandGround,
    Repair,
    Convey,
    Mine,
    Build {
        construction: AssetId,
        timed: TimedState,
    },
    Train {
        trainee: AssetId,
        timed: TimedState,
    },
    BuildingUpgrade {
        target_type: AssetTypeId,
        timed: TimedState,
    },
    Research {
        upgrade: UpgradeId,
        timed: TimedState,
    },
}

impl ActivatedCapability {
    /// Progress percent for clients; one-shot arrangers report zero.
    pub fn percent_complete(&self) -> i32 {
        match self {
            ActivatedCapability::Build { timed, .. }
            | ActivatedCapability::Train { timed, .. }
            | ActivatedCapability::BuildingUpgrade { timed, .. }
            | ActivatedCapability::Research { timed, .. } => timed.percent_complete(),
            _ => 0,
        }
    }
}

/// A capability's three-step policy. `can_initiate` answers "could this
/// actor start this at all" (affordability, prerequisites); `can_apply`
/// additionally validates a concrete target; `apply` rearranges the
/// actor's command stack and pays any up-front cost.
pub trait Capability: Send + Sync {
    fn can_initiate(&self, world: &World, actor: AssetId) -> bool;
    fn can_apply(&self, world: &World, actor: AssetId, target: AssetId) -> bool;
    fn apply(&self, world: &mut World, actor: AssetId, target: AssetId) -> bool;
}

/// Capability-kind to policy table, built once at startup from the
/// catalog and immutable afterwards.
pub struct CapabilityRegistry {
    policies: HashMap<CapabilityKind, Box<dyn Capability>>,
}

impl CapabilityRegistry {
    pub fn get(&self, kind: CapabilityKind) -> Option<&dyn Capability> {
        self.policies.get(&kind).map(|p| p.as_ref())
    }
}

/// The standard ruleset's registry. Build/train/upgrade policies resolve
/// their product types from the catalog; kinds whose product is absent
/// from the catalog are simply not registered.
pub fn standard_registry(catalog: &crate::catalog::AssetCatalog) -> CapabilityRegistry {
    use CapabilityKind::*;

    let mut policies: HashMap<CapabilityKind, Box<dyn Capability>> = HashMap::new();
    let mut register = |kind: CapabilityKind, policy: Option<Box<dyn Capability>>| {
        if let Some(policy) = policy {
            policies.insert(kind, policy);
        }
    };

    let build = |kind, name: &str| -> Option<Box<dyn Capability>> {
        catalog
            .asset_type_id(name)
            .map(|building| Box::new(BuildCapability { kind, building }) as Box<dyn Capability>)
    };
    let train = |kind, name: &str| -> Option<Box<dyn Capability>> {
        catalog
            .asset_type_id(name)
            .map(|unit| Box::new(TrainCapability { kind, unit }) as Box<dyn Capability>)
    };
    let upgrade_building = |kind, name: &str| -> Option<Box<dyn Capability>> {
        catalog.asset_type_id(name).map(|target_type| {
            Box::new(BuildingUpgradeCapability { kind, target_type }) as Box<dyn Capability>
        })
    };
    let research = |kind, name: &str| -> Option<Box<dyn Capability>> {
        catalog
            .upgrade_id(name)
            .map(|upgrade| Box::new(ResearchCapability { kind, upgrade }) as Box<dyn Capability>)
    };

    for kind in CapabilityKind::ALL {
        let policy: Option<Box<dyn Capability>> = match kind {
            Move => Some(Box::new(MoveCapability { kind })),
            Patrol => Some(Box::new(PatrolCapability { kind })),
            Attack => Some(Box::new(AttackCapability { kind })),
            StandGround => Some(Box::new(StandGroundCapability { kind })),
            Repair => Some(Box::new(RepairCapability { kind })),
            Convey => Some(Box::new(ConveyCapability { kind })),
            Cancel => Some(Box::new(CancelCapability)),
            Mine => Some(Box::new(MineCapability { kind })),
            BuildFarm => build(kind, "farm"),
            BuildTownHall => build(kind, "town_hall"),
            BuildBarracks => build(kind, "barracks"),
            BuildLumberMill => build(kind, "lumber_mill"),
            BuildBlacksmith => build(kind, "blacksmith"),
            BuildScoutTower => build(kind, "scout_tower"),
            BuildWall => build(kind, "wall"),
            TrainPeasant => train(kind, "peasant"),
            TrainFootman => train(kind, "footman"),
            TrainArcher => train(kind, "archer"),
            BuildRanger => train(kind, "ranger"),
            BuildingUpgradeKeep => upgrade_building(kind, "keep"),
            BuildingUpgradeCastle => upgrade_building(kind, "castle"),
            BuildingUpgradeGuardTower => upgrade_building(kind, "guard_tower"),
            BuildingUpgradeCannonTower => upgrade_building(kind, "cannon_tower"),
            WeaponUpgrade2 => research(kind, "weapon_upgrade2"),
            WeaponUpgrade3 => research(kind, "weapon_upgrade3"),
            ArrowUpgrade2 => research(kind, "arrow_upgrade2"),
            ArrowUpgrade3 => research(kind, "arrow_upgrade3"),
            ArmorUpgrade2 => research(kind, "armor_upgrade2"),
            ArmorUpgrade3 => research(kind, "armor_upgrade3"),
            LongbowUpgrade => research(kind, "longbow_upgrade"),
            RangerScoutingUpgrade => research(kind, "ranger_scouting_upgrade"),
            MarksmanshipUpgrade => research(kind, "marksmanship_upgrade"),
        };
        register(kind, policy);
    }

    CapabilityRegistry { policies }
}

/// Advance the activated capability on top of `actor`'s stack by one
/// cycle. The command is taken off the stack, stepped, and re-pushed only
/// while still in progress.
pub(crate) fn step_activated(world: &mut World, actor: AssetId) {
    let Some(mut command) = world.asset_mut(actor).and_then(|a| a.pop_command()) else {
        return;
    };
    let Some(activated) = command.activated.take() else {
        return;
    };
    match activated {
        ActivatedCapability::Move => basic::step_move(world, actor, command),
        ActivatedCapability::Patrol {
            origin,
            destination,
        } => basic::step_patrol(world, actor, command, origin, destination),
        ActivatedCapability::Attack => basic::step_attack(world, actor, command),
        ActivatedCapability::StandGround => basic::step_stand_ground(world, actor),
        ActivatedCapability::Repair => basic::step_repair(world, actor, command),
        ActivatedCapability::Convey => basic::step_convey(world, actor, command),
        ActivatedCapability::Mine => basic::step_mine(world, actor, command),
        ActivatedCapability::Build {
            construction,
            timed,
        } => build::step_build(world, actor, command, construction, timed),
        ActivatedCapability::Train { trainee, timed } => {
            train::step_train(world, actor, command, trainee, timed)
        }
        ActivatedCapability::BuildingUpgrade { target_type, timed } => {
            upgrade::step_building_upgrade(world, actor, command, target_type, timed)
        }
        ActivatedCapability::Research { upgrade, timed } => {
            upgrade::step_research(world, actor, command, upgrade, timed)
        }
    }
}

/// Unwind one popped command: refund in-flight transactions, take the
/// other half of a builder/building or trainer/trainee pair out of play,
/// and release orphaned walk markers.
pub(crate) fn cancel_command(world: &mut World, actor: AssetId, mut command: AssetCommand) {
    if let Some(activated) = command.activated.take() {
        match activated {
            ActivatedCapability::Build {
                construction,
                timed,
            } => {
                refund(world, actor, &timed);
                if let Some(building) = world.asset_mut(construction) {
                    // Pop the paired Construct so deletion does not
                    // re-enter cancellation.
                    building.pop_command();
                }
                world.delete_asset(construction, None);
            }
            ActivatedCapability::Train { trainee, timed } => {
                refund(world, actor, &timed);
                if let Some(unit) = world.asset_mut(trainee) {
                    unit.pop_command();
                }
                world.delete_asset(trainee, None);
            }
            ActivatedCapability::BuildingUpgrade { timed, .. }
            | ActivatedCapability::Research { timed, .. } => {
                refund(world, actor, &timed);
            }
            ActivatedCapability::Patrol {
                origin,
                destination,
            } => {
                release_marker(world, actor, origin);
                release_marker(world, actor, destination);
            }
            _ => {}
        }
    } else if command.action == AssetAction::Construct {
        // The other half holds the activated transaction; cancelling it
        // refunds and removes this asset.
        if let Some(other) = command.target {
            if let Some(paired) = world.asset_mut(other).and_then(|a| {
                let cancels_this = matches!(
                    a.current_command().and_then(|c| c.activated.as_ref()),
                    Some(ActivatedCapability::Build { construction, .. }) if *construction == actor
                ) || matches!(
                    a.current_command().and_then(|c| c.activated.as_ref()),
                    Some(ActivatedCapability::Train { trainee, .. }) if *trainee == actor
                );
                if cancels_this {
                    a.pop_command()
                } else {
                    None
                }
            }) {
                cancel_command(world, other, paired);
            }
        }
    } else if command.action == AssetAction::Walk {
        if let Some(target) = command.target {
            release_marker(world, actor, target);
        }
    }
}

/// Pop and unwind the actor's whole stack. Every new capability
/// application goes through this first, so issuing a new order cancels
/// whatever transaction was in flight.
pub(crate) fn interrupt_commands(world: &mut World, actor: AssetId) {
    loop {
        let Some(command) = world.asset_mut(actor).and_then(|a| a.pop_command()) else {
            return;
        };
        cancel_command(world, actor, command);
    }
}

/// Return exactly what a timed transaction took when it started.
fn refund(world: &mut World, actor: AssetId, timed: &TimedState) {
    let Some(color) = world.asset(actor).map(|a| a.color) else {
        return;
    };
    world.add_resources(color, timed.gold_paid, timed.lumber_paid, timed.stone_paid);
}

/// Delete a marker once nothing on the actor's stack references it.
pub(crate) fn release_marker(world: &mut World, actor: AssetId, marker: AssetId) {
    let Some(asset) = world.asset(marker) else {
        return;
    };
    if asset.type_id != world.catalog.marker_type {
        return;
    }
    let still_referenced = world
        .asset(actor)
        .is_some_and(|a| a.has_marker_reference(marker));
    if !still_referenced {
        world.delete_asset(marker, None);
    }
}

#[cfg(test)]
mod tests {
    use super::TimedState;

    #[test]
    fn timed_deltas_sum_to_max_hit_points() {
        for (total, max) in [(450, 400), (250, 30), (7, 100), (1, 1)] {
            let mut timed = TimedState::new(total, 0, 0, 0);
            let mut accrued = 0;
            for _ in 0..timed.total {
                accrued += timed.hit_point_delta(max);
                timed.step += 1;
            }
            assert_eq!(accrued, max);
        }
    }

    #[test]
    fn percent_complete_stays_in_range() {
        let mut timed = TimedState::new(45, 0, 0, 0);
        for _ in 0..timed.total {
            let pct = timed.percent_complete();
            assert!((0..=100).contains(&pct));
            timed.step += 1;
        }
        assert_eq!(timed.percent_complete(), 100);
    }
}
