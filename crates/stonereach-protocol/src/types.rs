use serde::{Deserialize, Serialize};

/// Terrain classification for a single tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileType {
    None,
    Grass,
    Dirt,
    Forest,
    Rock,
    Stump,
    Rubble,
    Water,
    Wall,
    WallDamaged,
}

impl TileType {
    /// Ground units may walk over these.
    #[inline]
    pub const fn traversable(self) -> bool {
        matches!(
            self,
            TileType::None
                | TileType::Grass
                | TileType::Dirt
                | TileType::Stump
                | TileType::Rubble
        )
    }

    /// Building footprints may be placed on these.
    #[inline]
    pub const fn placeable(self) -> bool {
        matches!(self, TileType::Grass | TileType::Dirt)
    }
}

/// The three carriable resources. An asset carries at most one kind at a
/// time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Gold,
    Lumber,
    Stone,
}

/// Current action of an asset: the tag of the top command on its stack.
/// `None` means the stack is empty (idle).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetAction {
    #[default]
    None,
    Construct,
    Repair,
    Walk,
    StandGround,
    Attack,
    HarvestLumber,
    QuarryStone,
    MineGold,
    ConveyLumber,
    ConveyGold,
    ConveyStone,
    Death,
    Decay,
    Capability,
}

/// Every registered capability name. The registry is populated once at
/// simulation startup and immutable afterward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    Move,
    Patrol,
    Attack,
    StandGround,
    Repair,
    Convey,
    Cancel,
    /// Walks to the target and switches to harvest, quarry, or mine based
    /// on what is actually there.
    Mine,
    BuildFarm,
    BuildTownHall,
    BuildBarracks,
    BuildLumberMill,
    BuildBlacksmith,
    BuildWall,
    BuildScoutTower,
    TrainPeasant,
    TrainFootman,
    TrainArcher,
    BuildRanger,
    BuildingUpgradeKeep,
    BuildingUpgradeCastle,
    BuildingUpgradeGuardTower,
    BuildingUpgradeCannonTower,
    WeaponUpgrade2,
    WeaponUpgrade3,
    ArrowUpgrade2,
    ArrowUpgrade3,
    ArmorUpgrade2,
    ArmorUpgrade3,
    LongbowUpgrade,
    RangerScoutingUpgrade,
    MarksmanshipUpgrade,
}

impl CapabilityKind {
    pub const ALL: [CapabilityKind; 32] = [
        CapabilityKind::Move,
        CapabilityKind::Patrol,
        CapabilityKind::Attack,
        CapabilityKind::StandGround,
        CapabilityKind::Repair,
        CapabilityKind::Convey,
        CapabilityKind::Cancel,
        CapabilityKind::Mine,
        CapabilityKind::BuildFarm,
        CapabilityKind::BuildTownHall,
        CapabilityKind::BuildBarracks,
        CapabilityKind::BuildLumberMill,
        CapabilityKind::BuildBlacksmith,
        CapabilityKind::BuildWall,
        CapabilityKind::BuildScoutTower,
        CapabilityKind::TrainPeasant,
        CapabilityKind::TrainFootman,
        CapabilityKind::TrainArcher,
        CapabilityKind::BuildRanger,
        CapabilityKind::BuildingUpgradeKeep,
        CapabilityKind::BuildingUpgradeCastle,
        CapabilityKind::BuildingUpgradeGuardTower,
        CapabilityKind::BuildingUpgradeCannonTower,
        CapabilityKind::WeaponUpgrade2,
        CapabilityKind::WeaponUpgrade3,
        CapabilityKind::ArrowUpgrade2,
        CapabilityKind::ArrowUpgrade3,
        CapabilityKind::ArmorUpgrade2,
        CapabilityKind::ArmorUpgrade3,
        CapabilityKind::LongbowUpgrade,
        CapabilityKind::RangerScoutingUpgrade,
        CapabilityKind::MarksmanshipUpgrade,
    ];
}
