//! Progressive scaling smoke tests: the tick loop should stay roughly
//! linear in entity count. The default run stays small enough for CI; the
//! larger scale is `#[ignore]`d and meant for local profiling.

use redoubt_core::character::CharacterState;
use redoubt_core::collision::Aabb;
use redoubt_core::constants::DEFAULT_CONSTANTS;
use redoubt_core::ecs::{ComponentKind, PlayerComponent, World};
use redoubt_core::math::FixedVec3;
use redoubt_core::terrain::TerrainTile;
use redoubt_core::tick::{TickLoop, WorldColliders};
use redoubt_core::transport::{PeerId, Transport};
use std::time::Instant;

#[derive(Default)]
struct NullTransport;

impl Transport for NullTransport {
    fn try_recv_high(&mut self) -> Option<(PeerId, Vec<u8>)> {
        None
    }
    fn try_recv_low(&mut self) -> Option<(PeerId, Vec<u8>)> {
        None
    }
    fn send_high(&mut self, _peer: PeerId, _bytes: &[u8]) {}
    fn send_low(&mut self, _peer: PeerId, _bytes: &[u8]) {}
    fn broadcast_high(&mut self, _bytes: &[u8]) {}
    fn broadcast_low(&mut self, _bytes: &[u8]) {}
}

fn flat_floor(size: usize) -> TerrainTile {
    let mut tile = TerrainTile::new(size, size, 4);
    for x in 0..size as i32 {
        for z in 0..size as i32 {
            tile.set_solid(x, 0, z, true);
        }
    }
    tile
}

fn populated_room(player_count: usize, terrain_size: usize) -> (World, TerrainTile) {
    let tile = flat_floor(terrain_size);
    let mut world = World::new();
    for i in 0..player_count {
        let id = world.create_entity();
        let x = (i % terrain_size) as f32;
        let z = (i / terrain_size) as f32;
        world.add(
            id,
            ComponentKind::Player,
            PlayerComponent {
                state: CharacterState::spawn_at(FixedVec3::from_f32(x, 5.0, z), &DEFAULT_CONSTANTS),
                last_processed_input: 0,
            },
        );
    }
    (world, tile)
}

fn run_ticks(player_count: usize, terrain_size: usize, ticks: u32) -> f64 {
    let (mut world, tile) = populated_room(player_count, terrain_size);
    let mut loop_ = TickLoop::new(DEFAULT_CONSTANTS);
    let mut transport = NullTransport;
    let colliders = WorldColliders {
        terrain: Some(&tile),
        trees: &[],
        rocks: &[],
    };
    let block_colliders: Vec<Aabb> = Vec::new();

    let start = Instant::now();
    for _ in 0..ticks {
        loop_.run_tick(&mut world, &mut transport, &colliders, &block_colliders, &[], |_, _| {});
    }
    start.elapsed().as_secs_f64() * 1000.0 / ticks as f64
}

#[test]
fn tick_loop_keeps_up_with_a_small_room() {
    let ms_per_tick = run_ticks(8, 32, 120);
    // Generous bound: this only guards against gross accidental quadratic
    // blowups, not tight performance regression.
    assert!(ms_per_tick < 50.0, "small room tick took {ms_per_tick:.3}ms, expected well under 50ms");
}

#[test]
#[ignore = "profiling-scale run; invoke explicitly with --ignored"]
fn tick_loop_scales_to_a_large_room() {
    let small = run_ticks(16, 64, 60);
    let large = run_ticks(512, 64, 60);
    println!("8 players: {small:.3}ms/tick, 512 players: {large:.3}ms/tick");
    assert!(large < small * 200.0, "512-player tick cost grew far more than linearly with entity count");
}
