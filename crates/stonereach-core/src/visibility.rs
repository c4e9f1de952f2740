use stonereach_protocol::TilePos;

/// Per-tile fog state for one player.
///
/// `Partial` and `PartialPartial` form the one-tile anti-aliasing ring just
/// outside full vision; the `Seen*` states remember terrain after the
/// watcher moves away.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TileVisibility {
    /// Never observed.
    None,
    /// Ring tile whose interior was never fully seen.
    PartialPartial,
    /// Ring tile around a fully seen interior.
    Partial,
    /// Fully seen before, not currently watched.
    Seen,
    /// Was a ring tile, not currently watched.
    SeenPartial,
    /// Currently inside a watcher's sight disc.
    Visible,
}

impl TileVisibility {
    /// Whether the authoritative map shows through at this state.
    #[inline]
    pub fn reveals(self) -> bool {
        matches!(
            self,
            TileVisibility::Visible | TileVisibility::Partial | TileVisibility::PartialPartial
        )
    }
}

/// One player's fog grid. The backing store carries a border of the
/// catalog's largest sight radius on every side, so disc stamping never
/// needs per-tile bounds checks against the map edge.
#[derive(Clone, Debug)]
pub struct VisibilityMap {
    map_width: i32,
    map_height: i32,
    pad: i32,
    padded_width: i32,
    padded_height: i32,
    tiles: Vec<TileVisibility>,
}

impl VisibilityMap {
    pub fn new(map_width: i32, map_height: i32, max_sight: i32) -> Self {
        // The ring extends one tile past the largest disc.
        let pad = max_sight + 1;
        let padded_width = map_width + 2 * pad;
        let padded_height = map_height + 2 * pad;
        Self {
            map_width,
            map_height,
            pad,
            padded_width,
            padded_height,
            tiles: vec![TileVisibility::None; (padded_width * padded_height) as usize],
        }
    }

    #[inline]
    fn index(&self, tile: TilePos) -> Option<usize> {
        let x = tile.x + self.pad;
        let y = tile.y + self.pad;
        if x < 0 || y < 0 || x >= self.padded_width || y >= self.padded_height {
            None
        } else {
            Some((y * self.padded_width + x) as usize)
        }
    }

    pub fn tile_visibility(&self, tile: TilePos) -> TileVisibility {
        self.index(tile)
            .map(|i| self.tiles[i])
            .unwrap_or(TileVisibility::None)
    }

    #[inline]
    pub fn reveals(&self, tile: TilePos) -> bool {
        self.tile_visibility(tile).reveals()
    }

    /// Recompute the grid from the player's current watchers. Each watcher
    /// is an anchor tile, a footprint size, and an effective sight radius.
    ///
    /// Old `Visible`/`Partial` decay to `Seen`, `PartialPartial` to
    /// `SeenPartial`; then every watcher stamps its disc (`Visible`) and
    /// the surrounding ring (`Partial` over seen ground, `PartialPartial`
    /// over unseen). Running the update twice with the same watchers
    /// yields the same grid.
    pub fn update(&mut self, watchers: impl Iterator<Item = (TilePos, i32, i32)>) {
        for state in &mut self.tiles {
            *state = match *state {
                TileVisibility::Visible | TileVisibility::Partial => TileVisibility::Seen,
                TileVisibility::PartialPartial => TileVisibility::SeenPartial,
                other => other,
            };
        }

        for (anchor, size, sight) in watchers {
            if sight <= 0 || !anchor.is_valid() {
                continue;
            }
            let sight = sight.min(self.pad - 1);
            let visible_sq = sight * sight;
            let ring_sq = (sight + 1) * (sight + 1);

            for y in (anchor.y - sight - 1)..(anchor.y + size + sight + 1) {
                for x in (anchor.x - sight - 1)..(anchor.x + size + sight + 1) {
                    // Distance is measured from the nearest footprint tile.
                    let dx = x - x.clamp(anchor.x, anchor.x + size - 1);
                    let dy = y - y.clamp(anchor.y, anchor.y + size - 1);
                    let distance_sq = dx * dx + dy * dy;
                    let Some(index) = self.index(TilePos::new(x, y)) else {
                        continue;
                    };
                    if distance_sq <= visible_sq {
                        self.tiles[index] = TileVisibility::Visible;
                    } else if distance_sq <= ring_sq {
                        self.tiles[index] = match self.tiles[index] {
                            TileVisibility::Visible => TileVisibility::Visible,
                            TileVisibility::Seen | TileVisibility::Partial => {
                                TileVisibility::Partial
                            }
                            _ => TileVisibility::PartialPartial,
                        };
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn states(map: &VisibilityMap, tiles: &[(i32, i32)]) -> Vec<TileVisibility> {
        tiles
            .iter()
            .map(|&(x, y)| map.tile_visibility(TilePos::new(x, y)))
            .collect()
    }

    #[test]
    fn disc_and_ring_states() {
        let mut map = VisibilityMap::new(16, 16, 6);
        map.update([(TilePos::new(8, 8), 1, 2)].into_iter());

        assert_eq!(map.tile_visibility(TilePos::new(8, 8)), TileVisibility::Visible);
        assert_eq!(map.tile_visibility(TilePos::new(8, 6)), TileVisibility::Visible);
        // Distance 3 on the axis: ring over never-seen ground.
        assert_eq!(
            map.tile_visibility(TilePos::new(8, 5)),
            TileVisibility::PartialPartial
        );
        assert_eq!(map.tile_visibility(TilePos::new(8, 4)), TileVisibility::None);
    }

    #[test]
    fn update_is_idempotent_for_static_watchers() {
        let mut map = VisibilityMap::new(16, 16, 6);
        let watchers = [(TilePos::new(5, 5), 2, 3)];
        map.update(watchers.into_iter());
        let tiles: Vec<(i32, i32)> = (0..16)
            .flat_map(|y| (0..16).map(move |x| (x, y)))
            .collect();
        let first = states(&map, &tiles);
        map.update(watchers.into_iter());
        assert_eq!(first, states(&map, &tiles));
    }

    #[test]
    fn leaving_demotes_to_seen_states() {
        let mut map = VisibilityMap::new(16, 16, 6);
        map.update([(TilePos::new(8, 8), 1, 2)].into_iter());
        // Watcher walks far away.
        map.update([(TilePos::new(0, 0), 1, 2)].into_iter());

        assert_eq!(map.tile_visibility(TilePos::new(8, 8)), TileVisibility::Seen);
        assert_eq!(
            map.tile_visibility(TilePos::new(8, 5)),
            TileVisibility::SeenPartial
        );
    }

    #[test]
    fn revisiting_ring_over_seen_ground_is_partial() {
        let mut map = VisibilityMap::new(16, 16, 6);
        map.update([(TilePos::new(8, 8), 1, 2)].into_iter());
        map.update([(TilePos::new(0, 0), 1, 2)].into_iter());
        // New watcher whose ring touches previously seen ground.
        map.update([(TilePos::new(8, 12), 1, 1)].into_iter());
        assert_eq!(
            map.tile_visibility(TilePos::new(8, 10)),
            TileVisibility::Partial
        );
    }

    #[test]
    fn footprint_anchors_the_disc() {
        let mut map = VisibilityMap::new(16, 16, 6);
        map.update([(TilePos::new(4, 4), 3, 2)].into_iter());
        // Opposite corners of the 3x3 footprint both project full sight.
        assert_eq!(map.tile_visibility(TilePos::new(2, 4)), TileVisibility::Visible);
        assert_eq!(map.tile_visibility(TilePos::new(8, 6)), TileVisibility::Visible);
    }
}
