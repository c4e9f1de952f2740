use std::collections::VecDeque;

use stonereach_protocol::{AssetId, Direction, TilePos};

use crate::map::AssetMap;

/// Per-cycle grid of which asset hard-blocks each tile, which walkers are
/// about to leave their tile, and which diagonal corners are mid-crossing.
/// Rebuilt from scratch at the start of every cycle.
#[derive(Clone, Debug)]
pub struct OccupancyMap {
    width: i32,
    height: i32,
    tiles: Vec<Option<AssetId>>,
    moving: Vec<Option<Direction>>,
    corners: Vec<bool>,
}

impl OccupancyMap {
    pub fn new(width: i32, height: i32) -> Self {
        let count = (width * height) as usize;
        Self {
            width,
            height,
            tiles: vec![None; count],
            moving: vec![None; count],
            corners: vec![false; count],
        }
    }

    pub fn clear(&mut self) {
        self.tiles.fill(None);
        self.moving.fill(None);
        self.corners.fill(false);
    }

    #[inline]
    fn contains(&self, tile: TilePos) -> bool {
        tile.x >= 0 && tile.y >= 0 && tile.x < self.width && tile.y < self.height
    }

    #[inline]
    fn index(&self, tile: TilePos) -> usize {
        (tile.y * self.width + tile.x) as usize
    }

    pub fn stamp(&mut self, anchor: TilePos, size: i32, id: AssetId) {
        for dy in 0..size {
            for dx in 0..size {
                let tile = TilePos::new(anchor.x + dx, anchor.y + dy);
                if self.contains(tile) {
                    let index = self.index(tile);
                    self.tiles[index] = Some(id);
                }
            }
        }
    }

    /// Record that the occupant of `tile` is a walker currently leaving in
    /// `direction`; the router lets traffic through behind it.
    pub fn stamp_moving(&mut self, tile: TilePos, direction: Direction) {
        if self.contains(tile) {
            let index = self.index(tile);
            self.moving[index] = Some(direction);
        }
    }

    /// Lock the 2x2 corner a diagonal mover is crossing. The corner cell is
    /// the minimum-coordinate tile of the pair.
    pub fn lock_corner(&mut self, from: TilePos, to: TilePos) {
        let corner = TilePos::new(from.x.min(to.x), from.y.min(to.y));
        if self.contains(corner) {
            let index = self.index(corner);
            self.corners[index] = true;
        }
    }

    pub fn occupant(&self, tile: TilePos) -> Option<AssetId> {
        if self.contains(tile) {
            self.tiles[self.index(tile)]
        } else {
            None
        }
    }

    pub fn exit_direction(&self, tile: TilePos) -> Option<Direction> {
        if self.contains(tile) {
            self.moving[self.index(tile)]
        } else {
            None
        }
    }

    pub fn corner_locked(&self, from: TilePos, to: TilePos) -> bool {
        let corner = TilePos::new(from.x.min(to.x), from.y.min(to.y));
        self.contains(corner) && self.corners[self.index(corner)]
    }
}

const NO_PARENT: u8 = u8::MAX;

/// Breadth-first route planner over the eight-direction grid. Diagonal
/// expansion is allowed only when the step does not cut a blocked corner.
/// Buffers are reused across calls.
#[derive(Debug)]
pub struct RouterMap {
    width: i32,
    height: i32,
    came_from: Vec<u8>,
    queue: VecDeque<TilePos>,
}

impl RouterMap {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            came_from: vec![NO_PARENT; (width * height) as usize],
            queue: VecDeque::new(),
        }
    }

    #[inline]
    fn contains(&self, tile: TilePos) -> bool {
        tile.x >= 0 && tile.y >= 0 && tile.x < self.width && tile.y < self.height
    }

    #[inline]
    fn index(&self, tile: TilePos) -> usize {
        (tile.y * self.width + tile.x) as usize
    }

    /// Whether `mover` may step into `tile` travelling along `direction`.
    /// Walkers already leaving in roughly the same direction do not block.
    fn enterable(
        &self,
        map: &AssetMap,
        occupancy: &OccupancyMap,
        mover: AssetId,
        tile: TilePos,
        direction: Direction,
    ) -> bool {
        if !self.contains(tile) || !map.tile_type(tile).traversable() {
            return false;
        }
        match occupancy.occupant(tile) {
            None => true,
            Some(id) if id == mover => true,
            Some(_) => occupancy
                .exit_direction(tile)
                .is_some_and(|exit| exit.within_quarter_turn(direction)),
        }
    }

    /// Whether a diagonal step from `from` may cut the corner: both
    /// flanking cardinal tiles must be passable and nobody may already be
    /// crossing that corner.
    fn diagonal_allowed(
        &self,
        map: &AssetMap,
        occupancy: &OccupancyMap,
        mover: AssetId,
        from: TilePos,
        direction: Direction,
    ) -> bool {
        let (a, b) = flanking_cardinals(direction);
        self.enterable(map, occupancy, mover, from.step(a), direction)
            && self.enterable(map, occupancy, mover, from.step(b), direction)
            && !occupancy.corner_locked(from, from.step(direction))
    }

    /// Next step direction from `start` toward `goal`, or `None` when the
    /// mover is boxed in. When the goal itself is unreachable (occupied or
    /// walled off) the route heads for the closest approach found.
    pub fn find_route(
        &mut self,
        map: &AssetMap,
        occupancy: &OccupancyMap,
        mover: AssetId,
        start: TilePos,
        goal: TilePos,
    ) -> Option<Direction> {
        if start == goal || !self.contains(start) {
            return None;
        }

        self.came_from.fill(NO_PARENT);
        self.queue.clear();
        let start_index = self.index(start);
        // Sentinel distinct from NO_PARENT so the start is never re-entered.
        self.came_from[start_index] = 8;
        self.queue.push_back(start);

        let mut best = start;
        let mut best_distance = start.distance_squared(goal);
        let mut reached = false;

        // Expand headings nearest the straight line first so equal-length
        // routes deterministically favor the direct one.
        const SPREAD: [usize; 8] = [0, 1, 7, 2, 6, 3, 5, 4];

        while let Some(tile) = self.queue.pop_front() {
            let base = tile.direction_to(goal).unwrap_or(Direction::North);
            for offset in SPREAD {
                let direction = Direction::from_index(base.index() + offset);
                let next = tile.step(direction);
                if !self.contains(next) || self.came_from[self.index(next)] != NO_PARENT {
                    continue;
                }
                if !self.enterable(map, occupancy, mover, next, direction) {
                    continue;
                }
                if direction.is_diagonal()
                    && !self.diagonal_allowed(map, occupancy, mover, tile, direction)
                {
                    continue;
                }
                let next_index = self.index(next);
                self.came_from[next_index] = direction.index() as u8;
                let distance = next.distance_squared(goal);
                if distance < best_distance {
                    best_distance = distance;
                    best = next;
                }
                if next == goal {
                    reached = true;
                    break;
                }
                self.queue.push_back(next);
            }
            if reached {
                break;
            }
        }

        let target = if reached { goal } else { best };
        if target == start {
            return None;
        }

        // Backtrack to the first step leaving the start tile.
        let mut tile = target;
        let mut first = None;
        while tile != start {
            let direction = Direction::from_index(self.came_from[self.index(tile)] as usize);
            first = Some(direction);
            tile = tile.step(direction.opposite());
        }
        first
    }
}

/// The two cardinal tiles a diagonal step squeezes between.
fn flanking_cardinals(diagonal: Direction) -> (Direction, Direction) {
    use Direction::*;
    match diagonal {
        NorthEast => (North, East),
        SouthEast => (South, East),
        SouthWest => (South, West),
        NorthWest => (North, West),
        other => (other, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stonereach_protocol::TileType;

    fn open_map(size: i32) -> AssetMap {
        AssetMap::new(size, size, TileType::Grass)
    }

    fn id(n: u32) -> AssetId {
        AssetId::new(n, 0)
    }

    #[test]
    fn straight_route_takes_the_diagonal() {
        let map = open_map(8);
        let occupancy = OccupancyMap::new(8, 8);
        let mut router = RouterMap::new(8, 8);
        let step = router.find_route(
            &map,
            &occupancy,
            id(1),
            TilePos::new(1, 1),
            TilePos::new(4, 4),
        );
        assert_eq!(step, Some(Direction::SouthEast));
    }

    #[test]
    fn routes_around_water() {
        let mut map = open_map(8);
        for y in 0..7 {
            map.set_tile_type(TilePos::new(3, y), TileType::Water);
        }
        let occupancy = OccupancyMap::new(8, 8);
        let mut router = RouterMap::new(8, 8);
        let step = router.find_route(
            &map,
            &occupancy,
            id(1),
            TilePos::new(1, 1),
            TilePos::new(6, 1),
        );
        // Only the southern gap at y == 7 is open.
        assert!(matches!(
            step,
            Some(Direction::South) | Some(Direction::SouthEast)
        ));
    }

    #[test]
    fn corner_cutting_past_a_wall_is_forbidden() {
        let mut map = open_map(4);
        // Walls at (2, 1) and (1, 2) leave only the corner between them.
        map.set_tile_type(TilePos::new(2, 1), TileType::Wall);
        map.set_tile_type(TilePos::new(1, 2), TileType::Wall);
        let occupancy = OccupancyMap::new(4, 4);
        let mut router = RouterMap::new(4, 4);
        let step = router.find_route(
            &map,
            &occupancy,
            id(1),
            TilePos::new(1, 1),
            TilePos::new(2, 2),
        );
        // The squeeze is blocked; the route must go the long way round.
        assert_ne!(step, Some(Direction::SouthEast));
    }

    #[test]
    fn hard_blockers_stop_the_route() {
        let map = open_map(3);
        let mut occupancy = OccupancyMap::new(3, 3);
        for y in 0..3 {
            for x in 0..3 {
                if !(x == 1 && y == 1) {
                    occupancy.stamp(TilePos::new(x, y), 1, id(9));
                }
            }
        }
        let mut router = RouterMap::new(3, 3);
        let step = router.find_route(
            &map,
            &occupancy,
            id(1),
            TilePos::new(1, 1),
            TilePos::new(2, 2),
        );
        assert_eq!(step, None);
    }

    #[test]
    fn walker_leaving_ahead_does_not_block() {
        let map = open_map(4);
        let mut occupancy = OccupancyMap::new(4, 4);
        // A walker on (2, 1) heading east, away from us.
        occupancy.stamp(TilePos::new(2, 1), 1, id(9));
        occupancy.stamp_moving(TilePos::new(2, 1), Direction::East);
        let mut router = RouterMap::new(4, 4);
        let step = router.find_route(
            &map,
            &occupancy,
            id(1),
            TilePos::new(0, 1),
            TilePos::new(3, 1),
        );
        assert_eq!(step, Some(Direction::East));
    }

    #[test]
    fn oncoming_walker_blocks_and_forces_a_detour() {
        let map = open_map(4);
        let mut occupancy = OccupancyMap::new(4, 4);
        occupancy.stamp(TilePos::new(2, 1), 1, id(9));
        occupancy.stamp_moving(TilePos::new(2, 1), Direction::West);
        let mut router = RouterMap::new(4, 4);
        let step = router.find_route(
            &map,
            &occupancy,
            id(1),
            TilePos::new(0, 1),
            TilePos::new(3, 1),
        );
        assert!(step.is_some());
        assert_ne!(step, Some(Direction::East));
    }

    #[test]
    fn locked_corner_suppresses_the_diagonal() {
        let map = open_map(8);
        let mut occupancy = OccupancyMap::new(8, 8);
        occupancy.lock_corner(TilePos::new(1, 1), TilePos::new(2, 2));
        let mut router = RouterMap::new(8, 8);
        let step = router.find_route(
            &map,
            &occupancy,
            id(1),
            TilePos::new(1, 1),
            TilePos::new(4, 4),
        );
        // Falls back to a cardinal first leg.
        assert!(matches!(
            step,
            Some(Direction::East) | Some(Direction::South)
        ));
    }
}
