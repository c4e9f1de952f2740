use stonereach_protocol::{
    AssetAction, AssetId, AssetTypeId, CapabilityKind, Direction, PixelPos, PlayerColor,
    ResourceKind, TileMetrics, TilePos,
};

use crate::capability::ActivatedCapability;
use crate::catalog::AssetTypeInfo;

/// One pending action on an asset's command stack.
///
/// Commands are values, not references: the optional target is a handle
/// that may expire, and the optional activated capability is owned by the
/// command for its whole lifetime.
#[derive(Debug)]
pub struct AssetCommand {
    pub action: AssetAction,
    pub capability: Option<CapabilityKind>,
    pub target: Option<AssetId>,
    pub activated: Option<ActivatedCapability>,
}

impl AssetCommand {
    pub fn simple(action: AssetAction) -> Self {
        Self {
            action,
            capability: None,
            target: None,
            activated: None,
        }
    }

    pub fn targeted(action: AssetAction, target: AssetId) -> Self {
        Self {
            action,
            capability: None,
            target: Some(target),
            activated: None,
        }
    }

    pub fn capability(
        kind: CapabilityKind,
        target: AssetId,
        activated: Option<ActivatedCapability>,
    ) -> Self {
        Self {
            action: AssetAction::Capability,
            capability: Some(kind),
            target: Some(target),
            activated,
        }
    }
}

/// A unit or building. Transient markers, projectiles, and corpses are
/// assets of the catalog's `none` pseudo-type.
#[derive(Debug)]
pub struct Asset {
    pub id: AssetId,
    pub type_id: AssetTypeId,
    pub color: PlayerColor,
    pub tile_position: TilePos,
    pub position: PixelPos,
    pub hit_points: i32,
    pub max_hit_points: i32,
    /// Footprint is size x size tiles; copied from the type so building
    /// upgrades can change it in place.
    pub size: i32,
    /// Carried resources; at most one is non-zero at a time. For a gold
    /// mine this field holds the remaining gold in the mine.
    pub gold: i32,
    pub lumber: i32,
    pub stone: i32,
    /// Generic animation/progress clock for the current action.
    pub step: i32,
    pub creation_cycle: u32,
    pub direction: Direction,
    commands: Vec<AssetCommand>,
}

impl Asset {
    pub fn new(
        id: AssetId,
        type_id: AssetTypeId,
        info: &AssetTypeInfo,
        color: PlayerColor,
        tile: TilePos,
        metrics: TileMetrics,
        creation_cycle: u32,
    ) -> Self {
        Self {
            id,
            type_id,
            color,
            tile_position: tile,
            position: PixelPos::from_tile(tile, metrics),
            hit_points: info.hit_points,
            max_hit_points: info.hit_points,
            size: info.size,
            gold: 0,
            lumber: 0,
            stone: 0,
            step: 0,
            creation_cycle,
            direction: Direction::South,
            commands: Vec::new(),
        }
    }

    #[inline]
    pub fn alive(&self) -> bool {
        self.hit_points > 0
    }

    /// Tag of the top command, or `None` when idle.
    #[inline]
    pub fn action(&self) -> AssetAction {
        self.commands
            .last()
            .map(|c| c.action)
            .unwrap_or(AssetAction::None)
    }

    #[inline]
    pub fn current_command(&self) -> Option<&AssetCommand> {
        self.commands.last()
    }

    /// Peek one below the top: the lookahead used to switch from Walk to
    /// the action it was travelling for.
    #[inline]
    pub fn next_command(&self) -> Option<&AssetCommand> {
        self.commands.len().checked_sub(2).map(|i| &self.commands[i])
    }

    pub fn push_command(&mut self, command: AssetCommand) {
        self.commands.push(command);
    }

    pub fn pop_command(&mut self) -> Option<AssetCommand> {
        self.commands.pop()
    }

    pub fn take_commands(&mut self) -> Vec<AssetCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn command_count(&self) -> usize {
        self.commands.len()
    }

    /// Whether any remaining command still refers to `id`, either as a
    /// direct target or inside an activated capability's payload.
    pub fn has_marker_reference(&self, id: AssetId) -> bool {
        self.commands.iter().any(|c| {
            if c.target == Some(id) {
                return true;
            }
            match &c.activated {
                Some(ActivatedCapability::Patrol {
                    origin,
                    destination,
                }) => *origin == id || *destination == id,
                Some(ActivatedCapability::Build { construction, .. }) => *construction == id,
                Some(ActivatedCapability::Train { trainee, .. }) => *trainee == id,
                _ => false,
            }
        })
    }

    /// Death, decay, and construction cannot be displaced by a new command
    /// without an explicit Cancel.
    pub fn interruptible(&self) -> bool {
        !matches!(
            self.action(),
            AssetAction::Construct | AssetAction::Death | AssetAction::Decay
        )
    }

    pub fn carrying(&self) -> Option<(ResourceKind, i32)> {
        if self.lumber > 0 {
            Some((ResourceKind::Lumber, self.lumber))
        } else if self.gold > 0 {
            Some((ResourceKind::Gold, self.gold))
        } else if self.stone > 0 {
            Some((ResourceKind::Stone, self.stone))
        } else {
            None
        }
    }

    /// Move to a tile and snap the pixel position to its center.
    pub fn set_tile_position(&mut self, tile: TilePos, metrics: TileMetrics) {
        self.tile_position = tile;
        self.position = PixelPos::from_tile(tile, metrics);
    }

    /// Move to a pixel and re-derive the containing tile.
    pub fn set_position(&mut self, position: PixelPos, metrics: TileMetrics) {
        self.position = position;
        self.tile_position = position.tile(metrics);
    }

    /// Center pixel of the whole footprint.
    pub fn center(&self, metrics: TileMetrics) -> PixelPos {
        PixelPos::new(
            self.tile_position.x * metrics.width + self.size * metrics.half_width(),
            self.tile_position.y * metrics.height + self.size * metrics.half_height(),
        )
    }

    /// Point on this asset's footprint closest to `from`; projectiles aim
    /// here rather than at the footprint center.
    pub fn closest_pixel(&self, from: PixelPos, metrics: TileMetrics) -> PixelPos {
        let min_x = self.tile_position.x * metrics.width;
        let min_y = self.tile_position.y * metrics.height;
        let max_x = min_x + self.size * metrics.width - 1;
        let max_y = min_y + self.size * metrics.height - 1;
        PixelPos::new(from.x.clamp(min_x, max_x), from.y.clamp(min_y, max_y))
    }

    /// Chebyshev tile gap to another asset's footprint.
    pub fn tile_distance(&self, other: &Asset) -> i32 {
        self.tile_position
            .footprint_distance(self.size, other.tile_position, other.size)
    }

    /// Chebyshev tile gap to a single tile.
    pub fn tile_distance_to(&self, tile: TilePos) -> i32 {
        self.tile_position.footprint_distance(self.size, tile, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_info() -> AssetTypeInfo {
        AssetTypeInfo {
            name: "Dummy".into(),
            hit_points: 40,
            armor: 0,
            sight: 3,
            construction_sight: 3,
            size: 1,
            speed: 10,
            gold_cost: 0,
            lumber_cost: 0,
            stone_cost: 0,
            food_consumption: 0,
            food_production: 0,
            build_time: 0,
            attack_steps: 5,
            reload_steps: 5,
            basic_damage: 1,
            piercing_damage: 1,
            range: 1,
            capabilities: Vec::new(),
            asset_requirements: Vec::new(),
        }
    }

    fn dummy_asset() -> Asset {
        Asset::new(
            AssetId::new(0, 0),
            AssetTypeId::new(0),
            &dummy_info(),
            PlayerColor(1),
            TilePos::new(2, 2),
            TileMetrics::default(),
            0,
        )
    }

    #[test]
    fn command_stack_is_lifo_with_lookahead() {
        let mut asset = dummy_asset();
        assert_eq!(asset.action(), AssetAction::None);

        asset.push_command(AssetCommand::simple(AssetAction::Attack));
        asset.push_command(AssetCommand::simple(AssetAction::Walk));
        assert_eq!(asset.action(), AssetAction::Walk);
        assert_eq!(asset.next_command().unwrap().action, AssetAction::Attack);

        asset.pop_command();
        assert_eq!(asset.action(), AssetAction::Attack);
        assert!(asset.next_command().is_none());
    }

    #[test]
    fn carrying_reports_the_single_nonzero_resource() {
        let mut asset = dummy_asset();
        assert!(asset.carrying().is_none());
        asset.lumber = 100;
        assert_eq!(asset.carrying(), Some((ResourceKind::Lumber, 100)));
    }

    #[test]
    fn closest_pixel_clamps_onto_footprint() {
        let metrics = TileMetrics::default();
        let mut asset = dummy_asset();
        asset.size = 2;
        asset.set_tile_position(TilePos::new(4, 4), metrics);
        let from = PixelPos::new(0, 0);
        let closest = asset.closest_pixel(from, metrics);
        assert_eq!(closest, PixelPos::new(4 * 32, 4 * 32));
    }
}
