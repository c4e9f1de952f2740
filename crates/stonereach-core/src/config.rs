use serde::{Deserialize, Serialize};

/// Fixed timing and quantum constants for one simulation.
///
/// Built once at startup and threaded through `GameModel`; never mutated
/// mid-game. Times are in seconds of game time; step counts derive from
/// `update_frequency` (cycles per second).
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SimConfig {
    pub update_frequency: i32,
    pub harvest_time: i32,
    pub quarry_time: i32,
    pub mine_time: i32,
    pub convey_time: i32,
    pub death_time: i32,
    pub decay_time: i32,
    /// Lumber gained per completed harvest trip.
    pub lumber_per_harvest: i32,
    /// Stone gained per completed quarry trip.
    pub stone_per_quarry: i32,
    /// Gold withdrawn from a mine per completed trip.
    pub gold_per_mining: i32,
    /// Pixels a projectile travels per cycle.
    pub projectile_speed: i32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            update_frequency: 10,
            harvest_time: 5,
            quarry_time: 5,
            mine_time: 5,
            convey_time: 1,
            death_time: 1,
            decay_time: 4,
            lumber_per_harvest: 100,
            stone_per_quarry: 100,
            gold_per_mining: 100,
            projectile_speed: 64,
        }
    }
}

impl SimConfig {
    #[inline]
    pub const fn harvest_steps(&self) -> i32 {
        self.harvest_time * self.update_frequency
    }

    #[inline]
    pub const fn quarry_steps(&self) -> i32 {
        self.quarry_time * self.update_frequency
    }

    #[inline]
    pub const fn mine_steps(&self) -> i32 {
        self.mine_time * self.update_frequency
    }

    #[inline]
    pub const fn convey_steps(&self) -> i32 {
        self.convey_time * self.update_frequency
    }

    #[inline]
    pub const fn death_steps(&self) -> i32 {
        self.death_time * self.update_frequency
    }

    #[inline]
    pub const fn decay_steps(&self) -> i32 {
        self.decay_time * self.update_frequency
    }
}
