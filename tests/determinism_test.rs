//! Two independently-run tick loops, fed the identical input sequence over
//! an identical in-memory transport, must end up bit-for-bit identical.
//! This is the core promise a lockstep-authoritative/predicting pair relies
//! on (§8 property 1).

use redoubt_core::building::GridPos;
use redoubt_core::character::CharacterState;
use redoubt_core::collision::Aabb;
use redoubt_core::constants::DEFAULT_CONSTANTS;
use redoubt_core::ecs::{ComponentKind, PlayerComponent, World};
use redoubt_core::math::FixedVec3;
use redoubt_core::protocol::{InputMsg, Message};
use redoubt_core::terrain::TerrainTile;
use redoubt_core::tick::{TickLoop, WorldColliders};
use redoubt_core::transport::{PeerId, Transport};
use std::collections::VecDeque;

#[derive(Default)]
struct FeedTransport {
    high: VecDeque<(PeerId, Vec<u8>)>,
    low: VecDeque<(PeerId, Vec<u8>)>,
}

impl Transport for FeedTransport {
    fn try_recv_high(&mut self) -> Option<(PeerId, Vec<u8>)> {
        self.high.pop_front()
    }
    fn try_recv_low(&mut self) -> Option<(PeerId, Vec<u8>)> {
        self.low.pop_front()
    }
    fn send_high(&mut self, _peer: PeerId, _bytes: &[u8]) {}
    fn send_low(&mut self, _peer: PeerId, _bytes: &[u8]) {}
    fn broadcast_high(&mut self, _bytes: &[u8]) {}
    fn broadcast_low(&mut self, _bytes: &[u8]) {}
}

fn flat_floor() -> TerrainTile {
    let mut tile = TerrainTile::new(32, 32, 4);
    for x in 0..32 {
        for z in 0..32 {
            tile.set_solid(x, 0, z, true);
        }
    }
    tile
}

/// Runs `ticks` ticks of a fresh room with one player, feeding the same
/// deterministic input sequence every tick via a freshly-fed transport, and
/// returns the player's final replicated state.
///
/// `ingest_input` maps a peer straight onto `EntityId(peer.0)`, so the peer
/// id here must match the entity id the fresh world hands out to the first
/// entity it creates (`EntityId(0)`).
fn run_room(ticks: u64) -> PlayerComponent {
    let tile = flat_floor();
    let mut world = World::new();
    let player = world.create_entity();
    let peer = PeerId(player.0);
    world.add(
        player,
        ComponentKind::Player,
        PlayerComponent {
            state: CharacterState::spawn_at(FixedVec3::from_f32(0.0, 5.0, 0.0), &DEFAULT_CONSTANTS),
            last_processed_input: 0,
        },
    );

    let mut loop_ = TickLoop::new(DEFAULT_CONSTANTS);
    let colliders = WorldColliders {
        terrain: Some(&tile),
        trees: &[],
        rocks: &[],
    };
    let block_colliders: Vec<Aabb> = Vec::new();

    for t in 0..ticks {
        let mut transport = FeedTransport::default();
        let msg = Message::Input(InputMsg {
            sequence: t + 1,
            forward: if t % 3 == 0 { 1 } else { 0 },
            right: if t % 5 == 0 { 1 } else { 0 },
            camera_yaw: redoubt_core::math::fnum(t as f64 * 0.02),
            camera_pitch: redoubt_core::math::FixedNum::ZERO,
            jump: t % 40 == 0,
            sprint: t % 11 == 0,
            dive: false,
        })
        .encode()
        .unwrap();
        transport.high.push_back((peer, msg));

        loop_.run_tick(&mut world, &mut transport, &colliders, &block_colliders, &[], |_, _| {});
    }

    *world.get::<PlayerComponent>(player, ComponentKind::Player).unwrap()
}

#[test]
fn two_independent_runs_with_identical_inputs_converge_bit_for_bit() {
    let a = run_room(200);
    let b = run_room(200);
    assert_eq!(a.state, b.state);
    assert_eq!(a.last_processed_input, b.last_processed_input);
}

#[test]
fn building_lifecycle_is_reproducible_across_identical_operation_sequences() {
    use redoubt_core::building::Building;
    use redoubt_core::math::FixedNum;
    use redoubt_core::tick::{apply_block_place, apply_block_remove};

    let run = || {
        let mut world = World::new();
        let owner = world.create_entity();
        let building = world.create_entity();
        world.add(building, ComponentKind::Building, Building::new(owner, GridPos { x: 0, y: 0, z: 0 }, FixedNum::ZERO));
        let mut materials = 10;
        for i in 0..6 {
            apply_block_place(&mut world, building, GridPos { x: i, y: 0, z: 0 }, 0, owner, &mut materials).unwrap();
        }
        apply_block_remove(&mut world, building, GridPos { x: 2, y: 0, z: 0 }, owner, &mut materials, 10).unwrap();
        let b = world.get::<Building>(building, ComponentKind::Building).unwrap();
        (b.non_empty_cells(), materials)
    };

    assert_eq!(run(), run());
}
