use serde::{Deserialize, Serialize};

/// The eight movement/facing octants, clockwise from north.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
}

impl Direction {
    pub const ALL: [Direction; 8] = [
        Direction::North,
        Direction::NorthEast,
        Direction::East,
        Direction::SouthEast,
        Direction::South,
        Direction::SouthWest,
        Direction::West,
        Direction::NorthWest,
    ];

    /// The four cardinal directions, in router expansion order.
    pub const CARDINALS: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub const fn from_index(index: usize) -> Direction {
        Self::ALL[index % 8]
    }

    /// Tile-grid delta for one step in this direction. Y grows downward.
    #[inline]
    pub const fn delta(self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::NorthEast => (1, -1),
            Direction::East => (1, 0),
            Direction::SouthEast => (1, 1),
            Direction::South => (0, 1),
            Direction::SouthWest => (-1, 1),
            Direction::West => (-1, 0),
            Direction::NorthWest => (-1, -1),
        }
    }

    #[inline]
    pub const fn opposite(self) -> Direction {
        Self::ALL[(self as usize + 4) % 8]
    }

    #[inline]
    pub const fn is_diagonal(self) -> bool {
        (self as usize) % 2 == 1
    }

    /// Number of 45-degree steps between two directions (0..=4).
    #[inline]
    pub fn angle_steps(self, other: Direction) -> u32 {
        let diff = (self as i32 - other as i32).rem_euclid(8);
        diff.min(8 - diff) as u32
    }

    /// True when `other` is within 90 degrees of this direction. Used by the
    /// router's moving-away check: a blocker vacating roughly along the
    /// follower's travel direction does not re-block the tile.
    #[inline]
    pub fn within_quarter_turn(self, other: Direction) -> bool {
        self.angle_steps(other) <= 2
    }
}

/// Tile width/height in pixels, fixed once at simulation startup and passed
/// down explicitly (no process-global statics).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileMetrics {
    pub width: i32,
    pub height: i32,
}

impl Default for TileMetrics {
    fn default() -> Self {
        Self {
            width: 32,
            height: 32,
        }
    }
}

impl TileMetrics {
    #[inline]
    pub const fn half_width(self) -> i32 {
        self.width / 2
    }

    #[inline]
    pub const fn half_height(self) -> i32 {
        self.height / 2
    }
}

/// Integer tile-grid coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TilePos {
    pub x: i32,
    pub y: i32,
}

impl TilePos {
    /// Sentinel returned by exhausted placement searches. Callers must check
    /// `is_valid` before using a search result positionally.
    pub const INVALID: TilePos = TilePos { x: -1, y: -1 };

    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    #[inline]
    pub const fn is_valid(self) -> bool {
        self.x >= 0 && self.y >= 0
    }

    #[inline]
    pub fn step(self, direction: Direction) -> TilePos {
        let (dx, dy) = direction.delta();
        TilePos {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    #[inline]
    pub fn distance_squared(self, other: TilePos) -> i32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Chebyshev gap between an NxN footprint anchored here and an MxM
    /// footprint anchored at `other`: zero when they overlap, one when
    /// adjacent. Range checks compare this against an asset's tile range.
    pub fn footprint_distance(self, size: i32, other: TilePos, other_size: i32) -> i32 {
        let gap = |a: i32, a_size: i32, b: i32, b_size: i32| {
            if b >= a + a_size {
                b - (a + a_size - 1)
            } else if a >= b + b_size {
                a - (b + b_size - 1)
            } else {
                0
            }
        };
        let dx = gap(self.x, size, other.x, other_size);
        let dy = gap(self.y, size, other.y, other_size);
        dx.max(dy)
    }

    /// Octant from this tile toward `other`, or `None` when identical.
    pub fn direction_to(self, other: TilePos) -> Option<Direction> {
        octant(other.x - self.x, other.y - self.y)
    }
}

/// Sub-tile pixel coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelPos {
    pub x: i32,
    pub y: i32,
}

impl PixelPos {
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Center pixel of a tile: the tile-aligned position.
    #[inline]
    pub fn from_tile(tile: TilePos, metrics: TileMetrics) -> Self {
        Self {
            x: tile.x * metrics.width + metrics.half_width(),
            y: tile.y * metrics.height + metrics.half_height(),
        }
    }

    /// The tile this pixel falls in. Lossless: every pixel maps to exactly
    /// one tile.
    #[inline]
    pub fn tile(self, metrics: TileMetrics) -> TilePos {
        TilePos {
            x: self.x.div_euclid(metrics.width),
            y: self.y.div_euclid(metrics.height),
        }
    }

    /// Tile-aligned means the in-tile offset is exactly half a tile on both
    /// axes.
    #[inline]
    pub fn tile_aligned(self, metrics: TileMetrics) -> bool {
        self.x.rem_euclid(metrics.width) == metrics.half_width()
            && self.y.rem_euclid(metrics.height) == metrics.half_height()
    }

    /// Octant of this pixel's offset from its own tile center, or `None`
    /// when tile-aligned. Walk commands face the opposite octant on launch
    /// so a mid-tile unit does not visually pop.
    pub fn tile_octant(self, metrics: TileMetrics) -> Option<Direction> {
        let dx = self.x.rem_euclid(metrics.width) - metrics.half_width();
        let dy = self.y.rem_euclid(metrics.height) - metrics.half_height();
        octant(dx, dy)
    }

    /// Octant toward `other`, or `None` when the positions coincide.
    pub fn direction_to(self, other: PixelPos) -> Option<Direction> {
        octant(other.x - self.x, other.y - self.y)
    }

    #[inline]
    pub fn distance_squared(self, other: PixelPos) -> i64 {
        let dx = (self.x - other.x) as i64;
        let dy = (self.y - other.y) as i64;
        dx * dx + dy * dy
    }
}

/// Classify an integer delta into one of the eight 45-degree sectors.
/// Cardinal wins when one axis dominates by more than 2:1 (tan 22.5 ~ 0.414,
/// approximated by the halving threshold); otherwise the diagonal of the two
/// signs. Pure integer math, fully deterministic.
fn octant(dx: i32, dy: i32) -> Option<Direction> {
    if dx == 0 && dy == 0 {
        return None;
    }
    let ax = dx.abs();
    let ay = dy.abs();
    Some(if ax > 2 * ay {
        if dx > 0 {
            Direction::East
        } else {
            Direction::West
        }
    } else if ay > 2 * ax {
        if dy > 0 {
            Direction::South
        } else {
            Direction::North
        }
    } else if dx > 0 {
        if dy > 0 {
            Direction::SouthEast
        } else {
            Direction::NorthEast
        }
    } else if dy > 0 {
        Direction::SouthWest
    } else {
        Direction::NorthWest
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_tile_round_trip_is_lossless() {
        let metrics = TileMetrics::default();
        for x in -3..3 {
            for y in -3..3 {
                let tile = TilePos::new(x, y);
                let pixel = PixelPos::from_tile(tile, metrics);
                assert_eq!(pixel.tile(metrics), tile);
                assert!(pixel.tile_aligned(metrics));
            }
        }
    }

    #[test]
    fn octant_covers_all_eight_sectors() {
        assert_eq!(octant(10, 0), Some(Direction::East));
        assert_eq!(octant(-10, 0), Some(Direction::West));
        assert_eq!(octant(0, 10), Some(Direction::South));
        assert_eq!(octant(0, -10), Some(Direction::North));
        assert_eq!(octant(10, 10), Some(Direction::SouthEast));
        assert_eq!(octant(10, -10), Some(Direction::NorthEast));
        assert_eq!(octant(-10, 10), Some(Direction::SouthWest));
        assert_eq!(octant(-10, -10), Some(Direction::NorthWest));
        assert_eq!(octant(0, 0), None);
    }

    #[test]
    fn opposite_reverses_every_direction() {
        for dir in Direction::ALL {
            assert_eq!(dir.opposite().opposite(), dir);
            assert_eq!(dir.angle_steps(dir.opposite()), 4);
        }
    }

    #[test]
    fn footprint_distance_touching_is_zero() {
        let hall = TilePos::new(4, 4);
        // Peasant standing directly east of a 3x3 hall.
        let peasant = TilePos::new(7, 5);
        assert_eq!(hall.footprint_distance(3, peasant, 1), 1);
        assert_eq!(peasant.footprint_distance(1, hall, 3), 1);
        let inside = TilePos::new(5, 5);
        assert_eq!(hall.footprint_distance(3, inside, 1), 0);
    }

    #[test]
    fn within_quarter_turn_matches_angle() {
        assert!(Direction::North.within_quarter_turn(Direction::NorthEast));
        assert!(Direction::North.within_quarter_turn(Direction::East));
        assert!(!Direction::North.within_quarter_turn(Direction::SouthEast));
        assert!(!Direction::North.within_quarter_turn(Direction::South));
    }
}
