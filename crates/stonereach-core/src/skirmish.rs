//! Headless skirmish harness.
//!
//! Runs a fixed, scripted economy-and-raid scenario with no renderer and no
//! network, collecting metrics for balance sweeps and determinism checks.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use stonereach_protocol::{
    wire, AssetId, CapabilityKind, Command, CommandTarget, EventKind, PlayerColor, TileMetrics,
    TilePos, TileType, WireError,
};

use crate::catalog::{load_catalog, CatalogError, CatalogSource};
use crate::config::SimConfig;
use crate::game::{GameError, GameModel};
use crate::map::AssetMap;
use crate::trigger::NullTriggerResolver;

#[derive(Debug, Error)]
pub enum SkirmishError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Game(#[from] GameError),
    #[error(transparent)]
    Wire(#[from] WireError),
}

/// Configuration for one scripted skirmish.
#[derive(Clone, Debug)]
pub struct SkirmishConfig {
    /// Map width in tiles.
    pub map_width: i32,
    /// Map height in tiles.
    pub map_height: i32,
    /// Random seed for determinism.
    pub seed: u64,
    /// Maximum cycles before declaring a draw.
    pub max_cycles: u32,
    pub starting_gold: i32,
    pub starting_lumber: i32,
    pub starting_stone: i32,
}

impl Default for SkirmishConfig {
    fn default() -> Self {
        Self {
            map_width: 40,
            map_height: 40,
            seed: 42,
            max_cycles: 3000,
            starting_gold: 1200,
            starting_lumber: 800,
            starting_stone: 400,
        }
    }
}

/// How the skirmish ended.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum SkirmishOutcome {
    /// One side lost every asset it owned.
    Domination { winner: u8 },
    /// Cycle limit reached, winner by score.
    ScoreVictory { winner: u8, scores: Vec<i32> },
    /// Cycle limit reached with tied scores.
    Draw,
}

/// Per-player final statistics.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SkirmishPlayerStats {
    pub color: u8,
    pub final_gold: i32,
    pub final_lumber: i32,
    pub final_stone: i32,
    pub assets_created: i32,
    pub assets_lost: i32,
    pub assets_destroyed: i32,
    pub final_asset_count: u32,
}

/// Metrics collected over one skirmish.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SkirmishMetrics {
    pub cycles_played: u32,
    pub player_stats: Vec<SkirmishPlayerStats>,
    pub total_harvest_trips: u32,
    pub total_mine_trips: u32,
    pub total_melee_hits: u32,
    pub total_deaths: u32,
    pub buildings_completed: u32,
}

/// Result of one skirmish.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SkirmishResult {
    pub seed: u64,
    pub outcome: SkirmishOutcome,
    pub metrics: SkirmishMetrics,
    /// Hash of the end-of-game state digest. Two runs of the same seed must
    /// produce the same hash.
    pub digest_hash: u64,
    /// Wall clock, not part of the deterministic surface.
    pub duration_ms: u64,
}

/// Batch results for sweeps across seeds.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchSkirmishResult {
    pub games_played: u32,
    pub results: Vec<SkirmishResult>,
    pub aggregate: AggregateMetrics,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AggregateMetrics {
    pub avg_cycles: f64,
    pub draw_rate: f64,
    pub avg_melee_hits: f64,
    pub avg_deaths: f64,
}

/// Fixed terrain for the scripted scenario: grass with a forest band down
/// the west side, a rock band along the south, and a gold mine in the
/// middle.
fn build_map(config: &SkirmishConfig) -> AssetMap {
    let mut map = AssetMap::new(config.map_width, config.map_height, TileType::Grass);
    for y in 0..config.map_height {
        for x in 1..3 {
            map.set_tile_type(TilePos::new(x, y), TileType::Forest);
        }
    }
    for x in 0..config.map_width {
        map.set_tile_type(TilePos::new(x, config.map_height - 2), TileType::Rock);
    }
    map
}

struct Side {
    color: PlayerColor,
    hall: AssetId,
    miner: AssetId,
    builder: AssetId,
    farm_site: TilePos,
}

/// Run a single scripted skirmish: both sides mine and harvest, raise a
/// farm, train an extra peasant, then send a raider at the enemy hall.
pub fn run_skirmish(config: &SkirmishConfig) -> Result<SkirmishResult, SkirmishError> {
    let start = std::time::Instant::now();

    let catalog = load_catalog(CatalogSource::Embedded)?;
    let map = build_map(config);
    let mut game = GameModel::new(
        catalog,
        map,
        2,
        config.seed,
        SimConfig::default(),
        TileMetrics::default(),
        Box::new(NullTriggerResolver),
    );

    let mine_tile = TilePos::new(config.map_width / 2, config.map_height / 2);
    let mine = game.create_initial_asset("gold_mine", PlayerColor::NONE, mine_tile)?;

    let hall_tiles = [
        TilePos::new(6, 6),
        TilePos::new(config.map_width - 10, config.map_height - 10),
    ];
    let mut sides = Vec::new();
    for (index, &hall_tile) in hall_tiles.iter().enumerate() {
        let color = PlayerColor(index as u8 + 1);
        let hall = game.create_initial_asset("town_hall", color, hall_tile)?;
        let miner = game.create_initial_asset(
            "peasant",
            color,
            TilePos::new(hall_tile.x + 4, hall_tile.y),
        )?;
        let builder = game.create_initial_asset(
            "peasant",
            color,
            TilePos::new(hall_tile.x, hall_tile.y + 4),
        )?;
        game.grant_resources(
            color,
            config.starting_gold,
            config.starting_lumber,
            config.starting_stone,
        );
        sides.push(Side {
            color,
            hall,
            miner,
            builder,
            farm_site: TilePos::new(hall_tile.x + 5, hall_tile.y + 5),
        });
    }

    // The script, in cycle order. Farms take 450 cycles of work, so the
    // train order waits for the food headroom they provide.
    let mut script: Vec<(u32, Command)> = Vec::new();
    for (index, side) in sides.iter().enumerate() {
        let enemy = &sides[1 - index];
        script.push((
            0,
            Command::ApplyCapability {
                player: side.color,
                actor: side.miner,
                capability: CapabilityKind::Mine,
                target: CommandTarget::Asset { asset: mine },
            },
        ));
        script.push((
            0,
            Command::ApplyCapability {
                player: side.color,
                actor: side.builder,
                capability: CapabilityKind::BuildFarm,
                target: CommandTarget::Tile {
                    tile: side.farm_site,
                },
            },
        ));
        script.push((
            700,
            Command::ApplyCapability {
                player: side.color,
                actor: side.hall,
                capability: CapabilityKind::TrainPeasant,
                target: CommandTarget::None,
            },
        ));
        script.push((
            1200,
            Command::ApplyCapability {
                player: side.color,
                actor: side.builder,
                capability: CapabilityKind::Attack,
                target: CommandTarget::Asset { asset: enemy.hall },
            },
        ));
    }
    script.sort_by_key(|&(cycle, _)| cycle);

    let mut metrics = SkirmishMetrics {
        player_stats: sides
            .iter()
            .map(|s| SkirmishPlayerStats {
                color: s.color.0,
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    };

    let mut next_command = 0;
    let outcome = loop {
        let cycle = game.cycle();
        if cycle >= config.max_cycles {
            break score_outcome(&game, &sides);
        }

        while next_command < script.len() && script[next_command].0 <= cycle {
            // Scripted orders for dead actors are quietly dropped, the same
            // as stale orders from a lagging client.
            let _ = game.apply_command(&script[next_command].1);
            next_command += 1;
        }
        game.timestep();

        // Events are broadcast to every player; count them from one buffer
        // and discard the rest.
        for event in game.drain_events(sides[0].color) {
            match event.kind {
                EventKind::Harvest | EventKind::Quarry => metrics.total_harvest_trips += 1,
                EventKind::MineGold => metrics.total_mine_trips += 1,
                EventKind::MeleeHit => metrics.total_melee_hits += 1,
                EventKind::Death => metrics.total_deaths += 1,
                EventKind::WorkComplete => metrics.buildings_completed += 1,
                _ => {}
            }
        }
        for side in &sides[1..] {
            game.drain_events(side.color);
        }

        let alive: Vec<&Side> = sides
            .iter()
            .filter(|s| !game.world().player(s.color).assets.is_empty())
            .collect();
        if alive.len() == 1 {
            break SkirmishOutcome::Domination {
                winner: alive[0].color.0,
            };
        }
    };

    metrics.cycles_played = game.cycle();
    for (side, stats) in sides.iter().zip(metrics.player_stats.iter_mut()) {
        let player = game.world().player(side.color);
        stats.final_gold = player.gold;
        stats.final_lumber = player.lumber;
        stats.final_stone = player.stone;
        stats.assets_created = player.created.iter().sum();
        stats.assets_lost = player.lost.iter().sum();
        stats.assets_destroyed = player.destroyed.iter().sum();
        stats.final_asset_count = player.assets.len() as u32;
    }

    let digest_hash = wire::digest_hash(&game.state_digest())?;
    Ok(SkirmishResult {
        seed: config.seed,
        outcome,
        metrics,
        digest_hash,
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

/// Run several skirmishes across consecutive seeds.
pub fn run_batch_skirmish(
    config: &SkirmishConfig,
    num_games: u32,
) -> Result<BatchSkirmishResult, SkirmishError> {
    let mut results = Vec::with_capacity(num_games as usize);
    for i in 0..num_games {
        let mut game_config = config.clone();
        game_config.seed = config.seed.wrapping_add(u64::from(i));
        results.push(run_skirmish(&game_config)?);
    }

    let n = results.len().max(1) as f64;
    let aggregate = AggregateMetrics {
        avg_cycles: results
            .iter()
            .map(|r| f64::from(r.metrics.cycles_played))
            .sum::<f64>()
            / n,
        draw_rate: results
            .iter()
            .filter(|r| r.outcome == SkirmishOutcome::Draw)
            .count() as f64
            / n,
        avg_melee_hits: results
            .iter()
            .map(|r| f64::from(r.metrics.total_melee_hits))
            .sum::<f64>()
            / n,
        avg_deaths: results
            .iter()
            .map(|r| f64::from(r.metrics.total_deaths))
            .sum::<f64>()
            / n,
    };

    Ok(BatchSkirmishResult {
        games_played: num_games,
        results,
        aggregate,
    })
}

fn score_outcome(game: &GameModel, sides: &[Side]) -> SkirmishOutcome {
    let scores: Vec<i32> = sides
        .iter()
        .map(|s| {
            let player = game.world().player(s.color);
            player.gold
                + player.lumber
                + player.stone
                + player.assets.len() as i32 * 100
                + player.destroyed.iter().sum::<i32>() * 50
        })
        .collect();
    let max_score = scores.iter().copied().max().unwrap_or(0);
    let winners: Vec<usize> = scores
        .iter()
        .enumerate()
        .filter(|(_, &s)| s == max_score)
        .map(|(i, _)| i)
        .collect();
    if winners.len() == 1 {
        SkirmishOutcome::ScoreVictory {
            winner: sides[winners[0]].color.0,
            scores,
        }
    } else {
        SkirmishOutcome::Draw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skirmish_completes_within_cycle_limit() {
        let config = SkirmishConfig {
            max_cycles: 200,
            ..Default::default()
        };
        let result = run_skirmish(&config).expect("skirmish run");
        assert!(result.metrics.cycles_played > 0);
        assert!(result.metrics.cycles_played <= 200);
        assert_eq!(result.metrics.player_stats.len(), 2);
    }

    #[test]
    fn identical_seeds_produce_identical_digests() {
        let config = SkirmishConfig {
            max_cycles: 300,
            seed: 9001,
            ..Default::default()
        };
        let a = run_skirmish(&config).expect("first run");
        let b = run_skirmish(&config).expect("second run");
        assert_eq!(a.digest_hash, b.digest_hash);
        assert_eq!(a.metrics.cycles_played, b.metrics.cycles_played);
    }

    #[test]
    fn batch_varies_seed_per_game() {
        let config = SkirmishConfig {
            max_cycles: 100,
            ..Default::default()
        };
        let batch = run_batch_skirmish(&config, 3).expect("batch run");
        assert_eq!(batch.games_played, 3);
        let seeds: Vec<u64> = batch.results.iter().map(|r| r.seed).collect();
        assert_eq!(seeds, vec![42, 43, 44]);
    }
}
