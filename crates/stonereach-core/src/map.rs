use stonereach_protocol::{
    AssetAction, AssetId, AssetTypeId, PixelPos, PlayerColor, TilePos, TileType,
};

use crate::asset::Asset;
use crate::catalog::AssetCatalog;
use crate::entities::AssetStore;
use crate::visibility::VisibilityMap;

/// Starting lumber on a freshly generated forest tile.
pub const INITIAL_LUMBER: i32 = 400;
/// Starting stone on a freshly generated rock tile.
pub const INITIAL_STONE: i32 = 400;

/// The authoritative terrain and resource grid. Asset positions live on the
/// assets themselves; the map only tracks which ids are currently placed.
#[derive(Clone, Debug)]
pub struct AssetMap {
    width: i32,
    height: i32,
    terrain: Vec<TileType>,
    lumber: Vec<i32>,
    stone: Vec<i32>,
    assets: Vec<AssetId>,
}

impl AssetMap {
    pub fn new(width: i32, height: i32, fill: TileType) -> Self {
        let count = (width * height) as usize;
        Self {
            width,
            height,
            terrain: vec![fill; count],
            lumber: vec![0; count],
            stone: vec![0; count],
            assets: Vec::new(),
        }
    }

    /// Build a map from one character row per line:
    /// `G` grass, `D` dirt, `F` forest, `R` rock, `W` water, `w` wall,
    /// anything else impassable void.
    pub fn from_legend(rows: &[&str]) -> Self {
        let height = rows.len() as i32;
        let width = rows.iter().map(|r| r.chars().count()).max().unwrap_or(0) as i32;
        let mut map = Self::new(width, height, TileType::None);
        for (y, row) in rows.iter().enumerate() {
            for (x, ch) in row.chars().enumerate() {
                let tile = TilePos::new(x as i32, y as i32);
                let tile_type = match ch {
                    'G' => TileType::Grass,
                    'D' => TileType::Dirt,
                    'F' => TileType::Forest,
                    'R' => TileType::Rock,
                    'W' => TileType::Water,
                    'w' => TileType::Wall,
                    _ => TileType::None,
                };
                map.set_tile_type(tile, tile_type);
            }
        }
        map
    }

    #[inline]
    pub fn width(&self) -> i32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> i32 {
        self.height
    }

    #[inline]
    pub fn contains(&self, tile: TilePos) -> bool {
        tile.x >= 0 && tile.y >= 0 && tile.x < self.width && tile.y < self.height
    }

    #[inline]
    fn index(&self, tile: TilePos) -> usize {
        (tile.y * self.width + tile.x) as usize
    }

    pub fn tile_type(&self, tile: TilePos) -> TileType {
        if self.contains(tile) {
            self.terrain[self.index(tile)]
        } else {
            TileType::None
        }
    }

    pub fn set_tile_type(&mut self, tile: TilePos, tile_type: TileType) {
        if self.contains(tile) {
            let index = self.index(tile);
            self.terrain[index] = tile_type;
            self.lumber[index] = if tile_type == TileType::Forest {
                INITIAL_LUMBER
            } else {
                0
            };
            self.stone[index] = if tile_type == TileType::Rock {
                INITIAL_STONE
            } else {
                0
            };
        }
    }

    pub fn lumber(&self, tile: TilePos) -> i32 {
        if self.contains(tile) {
            self.lumber[self.index(tile)]
        } else {
            0
        }
    }

    pub fn stone(&self, tile: TilePos) -> i32 {
        if self.contains(tile) {
            self.stone[self.index(tile)]
        } else {
            0
        }
    }

    /// Harvest up to `amount` lumber from a forest tile. The tile becomes a
    /// stump once depleted. Returns the amount actually removed.
    pub fn remove_lumber(&mut self, tile: TilePos, amount: i32) -> i32 {
        if !self.contains(tile) {
            return 0;
        }
        let index = self.index(tile);
        let taken = amount.min(self.lumber[index]);
        self.lumber[index] -= taken;
        if taken > 0 && self.lumber[index] == 0 {
            self.terrain[index] = TileType::Stump;
        }
        taken
    }

    /// Quarry up to `amount` stone from a rock tile. The tile becomes
    /// rubble once depleted. Returns the amount actually removed.
    pub fn remove_stone(&mut self, tile: TilePos, amount: i32) -> i32 {
        if !self.contains(tile) {
            return 0;
        }
        let index = self.index(tile);
        let taken = amount.min(self.stone[index]);
        self.stone[index] -= taken;
        if taken > 0 && self.stone[index] == 0 {
            self.terrain[index] = TileType::Rubble;
        }
        taken
    }

    pub fn assets(&self) -> &[AssetId] {
        &self.assets
    }

    pub fn add_asset(&mut self, id: AssetId) {
        self.assets.push(id);
    }

    pub fn remove_asset(&mut self, id: AssetId) {
        self.assets.retain(|&a| a != id);
    }

    /// Whether a size x size footprint anchored at `tile` sits entirely on
    /// placeable terrain, clear of the given footprints.
    pub fn can_place_asset<I>(&self, tile: TilePos, size: i32, obstacles: I) -> bool
    where
        I: IntoIterator<Item = (TilePos, i32)>,
    {
        for dy in 0..size {
            for dx in 0..size {
                let t = TilePos::new(tile.x + dx, tile.y + dy);
                if !self.tile_type(t).placeable() {
                    return false;
                }
            }
        }
        for (other, other_size) in obstacles {
            if tile.footprint_distance(size, other, other_size) == 0 {
                return false;
            }
        }
        true
    }
}

/// Snapshot of an asset as one player last saw it.
#[derive(Clone, Debug)]
pub struct DecoratedAsset {
    pub id: AssetId,
    pub type_id: AssetTypeId,
    pub color: PlayerColor,
    pub tile_position: TilePos,
    pub position: PixelPos,
    pub hit_points: i32,
    pub size: i32,
    pub speed: i32,
    pub action: AssetAction,
}

impl DecoratedAsset {
    fn snapshot(asset: &Asset, catalog: &AssetCatalog) -> Self {
        Self {
            id: asset.id,
            type_id: asset.type_id,
            color: asset.color,
            tile_position: asset.tile_position,
            position: asset.position,
            hit_points: asset.hit_points,
            size: asset.size,
            speed: catalog.asset_type(asset.type_id).speed,
            action: asset.action(),
        }
    }
}

/// A player's fog-filtered view: terrain as last seen, plus remembered
/// asset snapshots. All player-facing searches run against this, never the
/// authoritative map.
#[derive(Clone, Debug)]
pub struct DecoratedMap {
    width: i32,
    height: i32,
    terrain: Vec<TileType>,
    lumber: Vec<i32>,
    stone: Vec<i32>,
    assets: Vec<DecoratedAsset>,
}

impl DecoratedMap {
    /// Initial view: terrain is known from the start, assets are not.
    pub fn new(actual: &AssetMap) -> Self {
        Self {
            width: actual.width,
            height: actual.height,
            terrain: actual.terrain.clone(),
            lumber: actual.lumber.clone(),
            stone: actual.stone.clone(),
            assets: Vec::new(),
        }
    }

    #[inline]
    pub fn width(&self) -> i32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> i32 {
        self.height
    }

    #[inline]
    pub fn contains(&self, tile: TilePos) -> bool {
        tile.x >= 0 && tile.y >= 0 && tile.x < self.width && tile.y < self.height
    }

    #[inline]
    fn index(&self, tile: TilePos) -> usize {
        (tile.y * self.width + tile.x) as usize
    }

    pub fn tile_type(&self, tile: TilePos) -> TileType {
        if self.contains(tile) {
            self.terrain[self.index(tile)]
        } else {
            TileType::None
        }
    }

    pub fn lumber(&self, tile: TilePos) -> i32 {
        if self.contains(tile) {
            self.lumber[self.index(tile)]
        } else {
            0
        }
    }

    pub fn stone(&self, tile: TilePos) -> i32 {
        if self.contains(tile) {
            self.stone[self.index(tile)]
        } else {
            0
        }
    }

    pub fn assets(&self) -> &[DecoratedAsset] {
        &self.assets
    }

    pub fn asset(&self, id: AssetId) -> Option<&DecoratedAsset> {
        self.assets.iter().find(|a| a.id == id)
    }

    /// Merge the authoritative map into this view wherever the player's
    /// visibility currently reveals a tile. Remembered assets that would
    /// have moved on their own are purged; still buildings persist under
    /// the fog until re-observed.
    pub fn refresh(
        &mut self,
        actual: &AssetMap,
        store: &AssetStore<Asset>,
        catalog: &AssetCatalog,
        visibility: &VisibilityMap,
    ) {
        for y in 0..self.height {
            for x in 0..self.width {
                let tile = TilePos::new(x, y);
                if visibility.reveals(tile) {
                    let index = self.index(tile);
                    self.terrain[index] = actual.terrain[index];
                    self.lumber[index] = actual.lumber[index];
                    self.stone[index] = actual.stone[index];
                }
            }
        }

        self.assets.retain(|snapshot| {
            if footprint_revealed(visibility, snapshot.tile_position, snapshot.size) {
                return false;
            }
            snapshot.speed == 0
                && !matches!(
                    snapshot.action,
                    AssetAction::Death | AssetAction::Decay | AssetAction::Attack
                )
        });

        for &id in actual.assets() {
            let Some(asset) = store.get(id) else { continue };
            if asset.type_id == catalog.marker_type {
                continue;
            }
            if footprint_revealed(visibility, asset.tile_position, asset.size) {
                self.assets.push(DecoratedAsset::snapshot(asset, catalog));
            }
        }
    }

    pub fn can_place_asset(&self, tile: TilePos, size: i32, ignore: AssetId) -> bool {
        for dy in 0..size {
            for dx in 0..size {
                let t = TilePos::new(tile.x + dx, tile.y + dy);
                if !self.tile_type(t).placeable() {
                    return false;
                }
            }
        }
        self.assets.iter().all(|a| {
            a.id == ignore || tile.footprint_distance(size, a.tile_position, a.size) > 0
        })
    }

    /// First placeable anchor for a size x size footprint, searching square
    /// rings of increasing distance around an existing footprint. Scan
    /// order within a ring is top edge, right edge, bottom edge, left edge,
    /// so results are deterministic. Returns [`TilePos::INVALID`] when the
    /// whole map is exhausted.
    pub fn find_asset_placement(
        &self,
        around: TilePos,
        around_size: i32,
        size: i32,
        ignore: AssetId,
    ) -> TilePos {
        let max_distance = self.width.max(self.height);
        for distance in 1..=max_distance {
            let mut found = TilePos::INVALID;
            self.ring_candidates(around, around_size, size, distance, |candidate| {
                if found == TilePos::INVALID && self.can_place_asset(candidate, size, ignore) {
                    found = candidate;
                }
            });
            if found != TilePos::INVALID {
                return found;
            }
        }
        TilePos::INVALID
    }

    /// Like [`find_asset_placement`], but among the first ring with any
    /// fit, picks the candidate closest to `goal` by squared distance.
    /// Scan order breaks exact ties.
    ///
    /// [`find_asset_placement`]: Self::find_asset_placement
    pub fn find_best_asset_placement(
        &self,
        goal: TilePos,
        around: TilePos,
        around_size: i32,
        size: i32,
        ignore: AssetId,
    ) -> TilePos {
        self.find_best_asset_placement_with_constraints(
            goal,
            around,
            around_size,
            size,
            ignore,
            0b111,
            0b111,
        )
    }

    /// Constrained variant: `h_mask`/`v_mask` select which thirds of the
    /// ring, relative to the anchor footprint, are acceptable. Bit 0 is
    /// left/above, bit 1 level with the footprint, bit 2 right/below;
    /// `0b111` on both axes is unconstrained.
    #[allow(clippy::too_many_arguments)]
    pub fn find_best_asset_placement_with_constraints(
        &self,
        goal: TilePos,
        around: TilePos,
        around_size: i32,
        size: i32,
        ignore: AssetId,
        h_mask: u8,
        v_mask: u8,
    ) -> TilePos {
        let max_distance = self.width.max(self.height);
        for distance in 1..=max_distance {
            let mut best = TilePos::INVALID;
            let mut best_distance = i32::MAX;
            self.ring_candidates(around, around_size, size, distance, |candidate| {
                let h_bit = third_bit(candidate.x, around.x, around_size);
                let v_bit = third_bit(candidate.y, around.y, around_size);
                if h_mask & h_bit == 0 || v_mask & v_bit == 0 {
                    return;
                }
                if !self.can_place_asset(candidate, size, ignore) {
                    return;
                }
                let d = candidate.distance_squared(goal);
                if d < best_distance {
                    best_distance = d;
                    best = candidate;
                }
            });
            if best != TilePos::INVALID {
                return best;
            }
        }
        TilePos::INVALID
    }

    fn ring_candidates(
        &self,
        around: TilePos,
        around_size: i32,
        size: i32,
        distance: i32,
        mut visit: impl FnMut(TilePos),
    ) {
        // Anchors whose footprint sits `distance` tiles off the anchor
        // footprint's edge.
        let min_x = around.x - distance - (size - 1);
        let min_y = around.y - distance - (size - 1);
        let max_x = around.x + around_size - 1 + distance;
        let max_y = around.y + around_size - 1 + distance;

        for x in min_x..=max_x {
            visit(TilePos::new(x, min_y));
        }
        for y in (min_y + 1)..=max_y {
            visit(TilePos::new(max_x, y));
        }
        for x in (min_x..max_x).rev() {
            visit(TilePos::new(x, max_y));
        }
        for y in ((min_y + 1)..max_y).rev() {
            visit(TilePos::new(min_x, y));
        }
    }

    /// Breadth-first search over traversable terrain for the nearest tile
    /// of the wanted type, as this player currently knows the terrain.
    /// Matching tiles need only be adjacent (any of eight directions) to a
    /// reachable tile. Returns [`TilePos::INVALID`] when none remains.
    pub fn find_nearest_reachable_tile_type(&self, from: TilePos, wanted: TileType) -> TilePos {
        use std::collections::VecDeque;

        if !self.contains(from) {
            return TilePos::INVALID;
        }
        let mut visited = vec![false; (self.width * self.height) as usize];
        let mut queue = VecDeque::new();
        visited[self.index(from)] = true;
        queue.push_back(from);

        while let Some(tile) = queue.pop_front() {
            for dy in -1..=1 {
                for dx in -1..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let next = TilePos::new(tile.x + dx, tile.y + dy);
                    if !self.contains(next) {
                        continue;
                    }
                    if self.tile_type(next) == wanted {
                        return next;
                    }
                    // Expansion stays on traversable cardinal neighbors.
                    if dx != 0 && dy != 0 {
                        continue;
                    }
                    let index = self.index(next);
                    if !visited[index] && self.tile_type(next).traversable() {
                        visited[index] = true;
                        queue.push_back(next);
                    }
                }
            }
        }
        TilePos::INVALID
    }
}

fn third_bit(coordinate: i32, anchor: i32, anchor_size: i32) -> u8 {
    if coordinate < anchor {
        0b001
    } else if coordinate >= anchor + anchor_size {
        0b100
    } else {
        0b010
    }
}

fn footprint_revealed(visibility: &VisibilityMap, tile: TilePos, size: i32) -> bool {
    for dy in 0..size {
        for dx in 0..size {
            if visibility.reveals(TilePos::new(tile.x + dx, tile.y + dy)) {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_map(size: i32) -> AssetMap {
        AssetMap::new(size, size, TileType::Grass)
    }

    #[test]
    fn lumber_depletion_leaves_a_stump() {
        let mut map = open_map(8);
        map.set_tile_type(TilePos::new(3, 3), TileType::Forest);
        assert_eq!(map.remove_lumber(TilePos::new(3, 3), 250), 250);
        assert_eq!(map.tile_type(TilePos::new(3, 3)), TileType::Forest);
        assert_eq!(map.remove_lumber(TilePos::new(3, 3), 250), 150);
        assert_eq!(map.tile_type(TilePos::new(3, 3)), TileType::Stump);
        assert_eq!(map.remove_lumber(TilePos::new(3, 3), 250), 0);
    }

    #[test]
    fn stone_depletion_leaves_rubble() {
        let mut map = open_map(8);
        map.set_tile_type(TilePos::new(2, 2), TileType::Rock);
        assert_eq!(map.remove_stone(TilePos::new(2, 2), 400), 400);
        assert_eq!(map.tile_type(TilePos::new(2, 2)), TileType::Rubble);
    }

    #[test]
    fn placement_rejects_overlap_and_bad_terrain() {
        let mut map = open_map(8);
        map.set_tile_type(TilePos::new(1, 1), TileType::Water);
        assert!(!map.can_place_asset(TilePos::new(0, 0), 2, []));
        assert!(map.can_place_asset(TilePos::new(4, 4), 2, []));
        assert!(!map.can_place_asset(TilePos::new(4, 4), 2, [(TilePos::new(5, 5), 1)]));
        // Adjacent but not overlapping is fine.
        assert!(map.can_place_asset(TilePos::new(4, 4), 2, [(TilePos::new(6, 6), 1)]));
    }

    #[test]
    fn find_placement_returns_ring_adjacent_anchor() {
        let map = open_map(10);
        let decorated = DecoratedMap::new(&map);
        let spot = decorated.find_asset_placement(
            TilePos::new(4, 4),
            2,
            1,
            AssetId::new(u32::MAX, 0),
        );
        assert_ne!(spot, TilePos::INVALID);
        assert_eq!(spot.footprint_distance(1, TilePos::new(4, 4), 2), 1);
    }

    #[test]
    fn best_placement_prefers_candidates_near_goal() {
        let map = open_map(12);
        let decorated = DecoratedMap::new(&map);
        let goal = TilePos::new(11, 6);
        let spot = decorated.find_best_asset_placement(
            goal,
            TilePos::new(5, 5),
            2,
            1,
            AssetId::new(u32::MAX, 0),
        );
        // The east side of the ring is closest to the goal.
        assert_eq!(spot, TilePos::new(7, 6));
    }

    #[test]
    fn constrained_placement_honors_axis_masks() {
        let map = open_map(12);
        let decorated = DecoratedMap::new(&map);
        let anchor = TilePos::new(5, 5);
        let spot = decorated.find_best_asset_placement_with_constraints(
            anchor,
            anchor,
            2,
            1,
            AssetId::new(u32::MAX, 0),
            0b010,
            0b001,
        );
        assert_ne!(spot, TilePos::INVALID);
        // Level with the footprint horizontally, strictly above it.
        assert!(spot.x >= anchor.x && spot.x < anchor.x + 2);
        assert!(spot.y < anchor.y);
    }

    #[test]
    fn nearest_tile_search_routes_around_water() {
        let mut map = open_map(8);
        for y in 0..8 {
            if y != 7 {
                map.set_tile_type(TilePos::new(4, y), TileType::Water);
            }
        }
        map.set_tile_type(TilePos::new(6, 0), TileType::Forest);
        let decorated = DecoratedMap::new(&map);
        let found = decorated.find_nearest_reachable_tile_type(TilePos::new(0, 0), TileType::Forest);
        assert_eq!(found, TilePos::new(6, 0));
        assert_eq!(
            decorated.find_nearest_reachable_tile_type(TilePos::new(0, 0), TileType::Wall),
            TilePos::INVALID
        );
    }
}
