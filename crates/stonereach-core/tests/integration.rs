//! End-to-end scenario tests for the simulation engine.
//!
//! Each test drives a small game through `GameModel::timestep` exactly the
//! way a server would, then asserts on observable state.

use std::sync::{Arc, Mutex};

use stonereach_core::{
    import_replay, load_catalog, AssetMap, CatalogSource, GameModel, NullTriggerResolver,
    SimConfig, TriggerContext, TriggerEffect, TriggerKind, TriggerResolver, INITIAL_LUMBER,
    REPLAY_VERSION,
};
use stonereach_protocol::{
    wire, AssetAction, CapabilityKind, Command, CommandTarget, PlayerColor, ReplayCommand,
    ReplayFile, TileMetrics, TilePos, TileType,
};

fn new_game(map: AssetMap, seed: u64) -> GameModel {
    let catalog = load_catalog(CatalogSource::Embedded).expect("catalog load");
    GameModel::new(
        catalog,
        map,
        2,
        seed,
        SimConfig::default(),
        TileMetrics::default(),
        Box::new(NullTriggerResolver),
    )
}

fn flat_map(width: i32, height: i32) -> AssetMap {
    AssetMap::new(width, height, TileType::Grass)
}

fn move_command(player: PlayerColor, actor: stonereach_protocol::AssetId, tile: TilePos) -> Command {
    Command::ApplyCapability {
        player,
        actor,
        capability: CapabilityKind::Move,
        target: CommandTarget::Tile { tile },
    }
}

#[test]
fn move_order_walks_to_tile_and_cleans_up_marker() {
    let mut game = new_game(flat_map(24, 24), 1);
    let peasant = game
        .create_initial_asset("peasant", PlayerColor(1), TilePos::new(2, 2))
        .unwrap();

    game.apply_command(&move_command(PlayerColor(1), peasant, TilePos::new(10, 2)))
        .unwrap();

    for _ in 0..100 {
        game.timestep();
    }

    let asset = game.world().asset(peasant).expect("peasant still alive");
    assert_eq!(asset.tile_position, TilePos::new(10, 2));
    assert_eq!(asset.command_count(), 0);
    // The transient destination marker must be gone with the walk.
    let marker_type = game.world().catalog.marker_type;
    let markers = game
        .world()
        .assets
        .iter_ordered()
        .filter(|(_, a)| a.type_id == marker_type)
        .count();
    assert_eq!(markers, 0);
}

#[test]
fn attack_order_kills_idle_defender_and_scores_the_kill() {
    let mut game = new_game(flat_map(16, 16), 3);
    let attacker = game
        .create_initial_asset("footman", PlayerColor(1), TilePos::new(5, 5))
        .unwrap();
    let defender = game
        .create_initial_asset("footman", PlayerColor(2), TilePos::new(6, 5))
        .unwrap();

    game.apply_command(&Command::ApplyCapability {
        player: PlayerColor(1),
        actor: attacker,
        capability: CapabilityKind::Attack,
        target: CommandTarget::Asset { asset: defender },
    })
    .unwrap();

    for _ in 0..400 {
        game.timestep();
    }

    // Defender dead and fully decayed; only the attacker remains.
    assert!(game.world().asset(defender).is_none());
    assert_eq!(game.world().assets.len(), 1);
    assert!(game.world().player(PlayerColor(2)).assets.is_empty());

    let footman = game.world().asset(attacker).unwrap().type_id;
    assert_eq!(
        game.world().player(PlayerColor(1)).destroyed[footman.raw as usize],
        1
    );
    assert_eq!(
        game.world().player(PlayerColor(2)).lost[footman.raw as usize],
        1
    );
    // The attacker ran out of targets and went idle.
    assert_eq!(game.world().asset(attacker).unwrap().command_count(), 0);
}

#[test]
fn peasant_builds_farm_to_completion() {
    let mut game = new_game(flat_map(24, 24), 5);
    let peasant = game
        .create_initial_asset("peasant", PlayerColor(1), TilePos::new(5, 5))
        .unwrap();
    game.grant_resources(PlayerColor(1), 1000, 1000, 0);

    game.apply_command(&Command::ApplyCapability {
        player: PlayerColor(1),
        actor: peasant,
        capability: CapabilityKind::BuildFarm,
        target: CommandTarget::Tile {
            tile: TilePos::new(8, 5),
        },
    })
    .unwrap();

    // Cost is taken when the order is accepted, not when work finishes.
    assert_eq!(game.world().player(PlayerColor(1)).gold, 900);
    assert_eq!(game.world().player(PlayerColor(1)).lumber, 800);

    // 45 seconds of construction at 10 cycles per second, plus the walk.
    for _ in 0..600 {
        game.timestep();
    }

    let player = game.world().player(PlayerColor(1));
    assert_eq!(player.assets.len(), 2);
    let farm = player
        .assets
        .iter()
        .copied()
        .find(|&id| id != peasant)
        .expect("farm exists");
    let farm_asset = game.world().asset(farm).unwrap();
    assert_eq!(farm_asset.hit_points, farm_asset.max_hit_points);
    assert_eq!(farm_asset.command_count(), 0);
    assert_eq!(game.world().food_production(PlayerColor(1)), 4);

    // The builder stepped off the farm's footprint and went idle.
    let builder = game.world().asset(peasant).unwrap();
    assert_eq!(builder.command_count(), 0);
    assert!(builder.tile_position.footprint_distance(1, farm_asset.tile_position, 2) > 0);
}

#[test]
fn cancelled_training_refunds_the_exact_cost() {
    let mut game = new_game(flat_map(24, 24), 8);
    let hall = game
        .create_initial_asset("town_hall", PlayerColor(1), TilePos::new(4, 4))
        .unwrap();
    let farm = game
        .create_initial_asset("farm", PlayerColor(1), TilePos::new(12, 4))
        .unwrap();
    game.grant_resources(PlayerColor(1), 1000, 500, 0);
    let _ = farm;

    game.apply_command(&Command::ApplyCapability {
        player: PlayerColor(1),
        actor: hall,
        capability: CapabilityKind::TrainPeasant,
        target: CommandTarget::None,
    })
    .unwrap();
    assert_eq!(game.world().player(PlayerColor(1)).gold, 600);
    assert_eq!(game.world().player(PlayerColor(1)).assets.len(), 3);

    for _ in 0..10 {
        game.timestep();
    }

    game.apply_command(&Command::ApplyCapability {
        player: PlayerColor(1),
        actor: hall,
        capability: CapabilityKind::Cancel,
        target: CommandTarget::None,
    })
    .unwrap();

    // Refund is exact and the half-trained recruit is gone.
    assert_eq!(game.world().player(PlayerColor(1)).gold, 1000);
    assert_eq!(game.world().player(PlayerColor(1)).assets.len(), 2);
    assert_eq!(game.world().asset(hall).unwrap().command_count(), 0);
}

#[test]
fn harvest_loop_delivers_lumber_to_the_hall() {
    let mut map = flat_map(24, 24);
    for y in 0..24 {
        map.set_tile_type(TilePos::new(10, y), TileType::Forest);
    }
    let mut game = new_game(map, 13);
    let _hall = game
        .create_initial_asset("town_hall", PlayerColor(1), TilePos::new(2, 2))
        .unwrap();
    let peasant = game
        .create_initial_asset("peasant", PlayerColor(1), TilePos::new(8, 3))
        .unwrap();

    game.apply_command(&Command::ApplyCapability {
        player: PlayerColor(1),
        actor: peasant,
        capability: CapabilityKind::Mine,
        target: CommandTarget::Tile {
            tile: TilePos::new(10, 3),
        },
    })
    .unwrap();

    for _ in 0..500 {
        game.timestep();
    }

    let player = game.world().player(PlayerColor(1));
    assert!(player.lumber >= 100, "lumber was {}", player.lumber);
    // Trips deliver whole loads.
    assert_eq!(player.lumber % 100, 0);
}

#[test]
fn fogged_building_snapshot_persists_on_the_player_map() {
    let mut game = new_game(flat_map(32, 32), 21);
    let peasant = game
        .create_initial_asset("peasant", PlayerColor(1), TilePos::new(5, 5))
        .unwrap();
    let farm = game
        .create_initial_asset("farm", PlayerColor(2), TilePos::new(8, 5))
        .unwrap();

    game.timestep();
    assert!(
        game.world()
            .player(PlayerColor(1))
            .player_map
            .asset(farm)
            .is_some(),
        "farm in sight range should be snapshotted"
    );

    // Walk far away; the farm leaves sight but stays on the player map.
    game.apply_command(&move_command(PlayerColor(1), peasant, TilePos::new(5, 28)))
        .unwrap();
    for _ in 0..200 {
        game.timestep();
    }
    assert_eq!(
        game.world().asset(peasant).unwrap().tile_position,
        TilePos::new(5, 28)
    );
    assert!(game
        .world()
        .player(PlayerColor(1))
        .player_map
        .asset(farm)
        .is_some());
}

#[test]
fn replay_import_reproduces_the_live_digest() {
    let catalog = load_catalog(CatalogSource::Embedded).expect("catalog load");
    let catalog_hash = catalog.hash;
    let seed = 7;

    let setup = |game: &mut GameModel| {
        game.create_initial_asset("peasant", PlayerColor(1), TilePos::new(2, 2))
            .unwrap();
        game.create_initial_asset("peasant", PlayerColor(2), TilePos::new(20, 20))
            .unwrap();
        game.grant_resources(PlayerColor(1), 500, 500, 0);
        game.grant_resources(PlayerColor(2), 500, 500, 0);
    };

    let mut live = GameModel::new(
        catalog,
        flat_map(24, 24),
        2,
        seed,
        SimConfig::default(),
        TileMetrics::default(),
        Box::new(NullTriggerResolver),
    );
    setup(&mut live);
    let actor = live.world().player(PlayerColor(1)).assets[0];
    let command = move_command(PlayerColor(1), actor, TilePos::new(12, 2));
    live.apply_command(&command).unwrap();
    for _ in 0..80 {
        live.timestep();
    }

    let replay = ReplayFile {
        version: REPLAY_VERSION,
        map_width: 24,
        map_height: 24,
        num_players: 2,
        seed,
        catalog_hash,
        players: Vec::new(),
        commands: vec![ReplayCommand {
            cycle: 0,
            player: PlayerColor(1),
            command,
        }],
    };

    let catalog = load_catalog(CatalogSource::Embedded).expect("catalog load");
    let mut imported = import_replay(
        &replay,
        catalog,
        flat_map(24, 24),
        SimConfig::default(),
        TileMetrics::default(),
        Box::new(NullTriggerResolver),
        setup,
    )
    .expect("replay import");
    while imported.cycle() < live.cycle() {
        imported.timestep();
    }

    assert_eq!(live.state_digest(), imported.state_digest());
    assert_eq!(
        wire::digest_hash(&live.state_digest()).unwrap(),
        wire::digest_hash(&imported.state_digest()).unwrap()
    );
}

#[test]
fn replay_with_wrong_catalog_hash_is_rejected() {
    let catalog = load_catalog(CatalogSource::Embedded).expect("catalog load");
    let replay = ReplayFile {
        version: REPLAY_VERSION,
        map_width: 24,
        map_height: 24,
        num_players: 2,
        seed: 1,
        catalog_hash: catalog.hash ^ 1,
        players: Vec::new(),
        commands: Vec::new(),
    };
    let result = import_replay(
        &replay,
        catalog,
        flat_map(24, 24),
        SimConfig::default(),
        TileMetrics::default(),
        Box::new(NullTriggerResolver),
        |_| {},
    );
    assert!(result.is_err());
}

/// Records which assets location triggers fire for, in arrival order.
struct RecordingResolver {
    seen: Arc<Mutex<Vec<u32>>>,
}

impl TriggerResolver for RecordingResolver {
    fn resolve(&mut self, context: &TriggerContext) -> Vec<TriggerEffect> {
        if context.kind == TriggerKind::AssetLocation {
            if let Some(asset) = context.asset {
                self.seen.lock().unwrap().push(asset.index);
            }
        }
        Vec::new()
    }
}

/// Strikes down any second-player asset the moment it reports a location.
struct CullResolver;

impl TriggerResolver for CullResolver {
    fn resolve(&mut self, context: &TriggerContext) -> Vec<TriggerEffect> {
        if context.kind == TriggerKind::AssetLocation && context.color == PlayerColor(2) {
            if let Some(asset) = context.asset {
                return vec![TriggerEffect::ModifyAssetHealth {
                    asset,
                    delta: -10_000,
                }];
            }
        }
        Vec::new()
    }
}

#[test]
fn location_triggers_arrive_in_the_same_order_every_run() {
    let run = || -> Vec<u32> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let catalog = load_catalog(CatalogSource::Embedded).expect("catalog load");
        let mut game = GameModel::new(
            catalog,
            flat_map(24, 24),
            2,
            42,
            SimConfig::default(),
            TileMetrics::default(),
            Box::new(RecordingResolver {
                seen: Arc::clone(&seen),
            }),
        );
        for i in 0..8 {
            game.create_initial_asset("peasant", PlayerColor(1), TilePos::new(2 + 2 * i, 4))
                .unwrap();
        }
        for _ in 0..3 {
            game.timestep();
        }
        let order = seen.lock().unwrap().clone();
        order
    };

    let first = run();
    let second = run();
    assert_eq!(first, second);
    // All eight fire on entering play, in slot order.
    assert_eq!(first.len(), 8);
    assert!(first.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn chase_travel_starts_in_the_cycle_the_attacker_falls_short() {
    let mut game = new_game(flat_map(24, 24), 9);
    let attacker = game
        .create_initial_asset("footman", PlayerColor(1), TilePos::new(2, 2))
        .unwrap();
    let defender = game
        .create_initial_asset("footman", PlayerColor(2), TilePos::new(10, 2))
        .unwrap();
    game.apply_command(&Command::ApplyCapability {
        player: PlayerColor(1),
        actor: attacker,
        capability: CapabilityKind::Attack,
        target: CommandTarget::Asset { asset: defender },
    })
    .unwrap();

    let start = game.world().asset(attacker).unwrap().position;
    game.timestep();

    // The out-of-range check queues a walk and the walk itself advances
    // within the same cycle, not one cycle later.
    let moved = game.world().asset(attacker).unwrap();
    assert_ne!(moved.position, start);
    assert_eq!(moved.action(), AssetAction::Walk);
}

#[test]
fn killed_walker_releases_its_destination_marker() {
    let catalog = load_catalog(CatalogSource::Embedded).expect("catalog load");
    let mut game = GameModel::new(
        catalog,
        flat_map(32, 32),
        2,
        11,
        SimConfig::default(),
        TileMetrics::default(),
        Box::new(CullResolver),
    );
    let victim = game
        .create_initial_asset("peasant", PlayerColor(2), TilePos::new(6, 5))
        .unwrap();
    game.apply_command(&move_command(PlayerColor(2), victim, TilePos::new(25, 5)))
        .unwrap();

    let marker_type = game.world().catalog.marker_type;
    let markers = |game: &GameModel| {
        game.world()
            .assets
            .iter_ordered()
            .filter(|(_, a)| a.type_id == marker_type)
            .count()
    };
    assert_eq!(markers(&game), 1);

    for _ in 0..3 {
        game.timestep();
    }
    // The walker died mid-trip; its destination marker went with the
    // dropped command stack instead of lingering in the arena.
    assert_eq!(markers(&game), 0);
    assert_eq!(
        game.world().asset(victim).unwrap().action(),
        AssetAction::Death
    );

    for _ in 0..60 {
        game.timestep();
    }
    assert_eq!(game.world().assets.len(), 0);
}

#[test]
fn harvester_retargets_after_the_forest_tile_is_felled() {
    let mut map = flat_map(24, 24);
    map.set_tile_type(TilePos::new(10, 3), TileType::Forest);
    map.remove_lumber(TilePos::new(10, 3), INITIAL_LUMBER - 100);
    map.set_tile_type(TilePos::new(10, 5), TileType::Forest);
    let mut game = new_game(map, 17);
    game.create_initial_asset("town_hall", PlayerColor(1), TilePos::new(2, 2))
        .unwrap();
    let peasant = game
        .create_initial_asset("peasant", PlayerColor(1), TilePos::new(8, 3))
        .unwrap();

    game.apply_command(&Command::ApplyCapability {
        player: PlayerColor(1),
        actor: peasant,
        capability: CapabilityKind::Mine,
        target: CommandTarget::Tile {
            tile: TilePos::new(10, 3),
        },
    })
    .unwrap();

    for _ in 0..800 {
        game.timestep();
    }

    // One load empties the first tile; the second and later loads come
    // from the other patch the peasant has already scouted.
    let player = game.world().player(PlayerColor(1));
    assert!(player.lumber >= 200, "lumber was {}", player.lumber);
    assert_eq!(
        game.world().map.tile_type(TilePos::new(10, 3)),
        TileType::Stump
    );
    assert!(game.world().map.lumber(TilePos::new(10, 5)) < INITIAL_LUMBER);
}
