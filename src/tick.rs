//! Tick & Broadcast Loop (§4.10): fixed 1/60 s timestep. Drains the two
//! transport priorities, advances players then projectiles then item
//! pickups/respawns, and broadcasts state at ~20 Hz. The within-tick order
//! is load-bearing for reconciliation (§4.10 "Ordering guarantee") and is
//! not reordered for convenience anywhere in this module.

use crate::building::{Building, GridPos};
use crate::character::{step as character_step, CharacterInput, StepColliders};
use crate::collision::Aabb;
use crate::colliders::StaticCollider;
use crate::constants::Constants;
use crate::ecs::{ComponentKind, EntityId, PlayerComponent, World};
use crate::error::SimError;
use crate::items::{ItemGrid, PendingPickup, PickupSystem, RespawnScheduler};
use crate::math::fnum;
use crate::projectile::{tick_projectile, PlayerHitbox, Projectile, TickOutcome};
use crate::protocol::Message;
use crate::terrain::TerrainGrid;
use crate::transport::{PeerId, Transport};
use redoubt_macros::profile;
use std::collections::HashMap;

/// Monotonic tick counter. `.value()` matches the profiling macro's
/// expected accessor (`redoubt_macros::profile`'s tick-aware branch).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Tick(pub u64);

impl Tick {
    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn next(self) -> Tick {
        Tick(self.0 + 1)
    }
}

/// Per-player buffered input plus the sequence the tick loop has already
/// applied (§4.10 "Cancellation: client-issued inputs with sequence <=
/// already-processed are dropped").
#[derive(Debug, Clone, Copy)]
struct PlayerInputSlot {
    latest: CharacterInput,
    last_sequence: u64,
}

/// Static world-level collision inputs `character::step` draws from. Held
/// by reference for the duration of a tick; rebuilt by the owning level
/// loader on level load or builder-room edits (§4.12), never mid-tick.
pub struct WorldColliders<'a> {
    pub terrain: Option<&'a dyn TerrainGrid>,
    pub trees: &'a [StaticCollider],
    pub rocks: &'a [StaticCollider],
}

/// Drives the fixed-timestep simulation loop for one room. Owns nothing
/// about transport framing beyond the `Transport` trait object it is
/// handed each tick.
pub struct TickLoop {
    pub tick: Tick,
    pub constants: Constants,
    inputs: HashMap<EntityId, PlayerInputSlot>,
    projectiles: HashMap<i64, Projectile>,
    next_projectile_id: i64,
    item_grid: ItemGrid,
    pickups: PickupSystem,
    respawns: RespawnScheduler,
    ticks_since_broadcast: u32,
}

impl TickLoop {
    pub fn new(constants: Constants) -> Self {
        let item_grid = ItemGrid::new(constants.item_grid_cell_size);
        Self {
            tick: Tick(0),
            constants,
            inputs: HashMap::new(),
            projectiles: HashMap::new(),
            next_projectile_id: 1,
            item_grid,
            pickups: PickupSystem::new(),
            respawns: RespawnScheduler::new(),
            ticks_since_broadcast: 0,
        }
    }

    fn broadcast_interval_ticks(&self) -> u32 {
        (self.constants.tick_rate_hz / self.constants.broadcast_rate_hz).round() as u32
    }

    /// §4.10 step 1: drain both channels, applying the cancellation rule
    /// to buffered inputs and handing every other message to `on_message`
    /// for building/item/lifecycle handling.
    fn drain_messages(&mut self, transport: &mut dyn Transport, mut on_message: impl FnMut(PeerId, Message)) {
        while let Some((peer, bytes)) = transport.try_recv_high() {
            if let Ok(msg) = Message::decode(&bytes) {
                if let Message::Input(input) = &msg {
                    self.ingest_input(EntityId(peer.0), input);
                } else {
                    on_message(peer, msg);
                }
            }
        }
        while let Some((peer, bytes)) = transport.try_recv_low() {
            if let Ok(msg) = Message::decode(&bytes) {
                on_message(peer, msg);
            }
        }
    }

    fn ingest_input(&mut self, player: EntityId, input: &crate::protocol::InputMsg) {
        let slot = self.inputs.entry(player).or_insert(PlayerInputSlot {
            latest: CharacterInput {
                forward: 0,
                right: 0,
                camera_yaw: crate::math::FixedNum::ZERO,
                camera_pitch: crate::math::FixedNum::ZERO,
                jump: false,
                sprint: false,
                dive: false,
            },
            last_sequence: 0,
        });
        if input.sequence <= slot.last_sequence && slot.last_sequence != 0 {
            return; // Cancellation rule: stale/duplicate sequence dropped.
        }
        slot.last_sequence = input.sequence;
        slot.latest = CharacterInput {
            forward: input.forward,
            right: input.right,
            camera_yaw: input.camera_yaw,
            camera_pitch: input.camera_pitch,
            jump: input.jump,
            sprint: input.sprint,
            dive: input.dive,
        };
    }

    /// §4.10 step 2: advance each player's `step` once using its currently
    /// buffered input.
    #[profile]
    fn advance_players(&mut self, world: &mut World, colliders: &WorldColliders, block_colliders: &[Aabb]) {
        let dt = fnum(self.constants.tick_dt as f64);
        let players = world.query(&[ComponentKind::Player]);
        for player in players {
            let Some(slot) = self.inputs.get(&player) else { continue };
            let input = slot.latest;
            let last_sequence = slot.last_sequence;
            if let Some(p) = world.get_mut::<PlayerComponent>(player, ComponentKind::Player) {
                let step_colliders = StepColliders {
                    terrain: colliders.terrain,
                    trees: Some(colliders.trees),
                    rocks: Some(colliders.rocks),
                    blocks: Some(block_colliders),
                };
                character_step(&mut p.state, &input, dt, &self.constants, &step_colliders);
                p.last_processed_input = last_sequence;
            }
        }
    }

    /// §4.10 step 3: advance every live projectile one tick.
    #[profile(2)]
    fn advance_projectiles(&mut self, hitboxes: &[PlayerHitbox]) -> Vec<(i64, TickOutcome)> {
        let dt = fnum(self.constants.tick_dt as f64);
        let mut outcomes = Vec::new();
        let mut finished = Vec::new();
        for (&id, proj) in self.projectiles.iter_mut() {
            let outcome = tick_projectile(proj, dt, hitboxes, &self.constants);
            if !matches!(outcome, TickOutcome::Alive) {
                finished.push(id);
            }
            outcomes.push((id, outcome));
        }
        for id in finished {
            self.projectiles.remove(&id);
        }
        outcomes
    }

    pub fn spawn_projectile(&mut self, proj: Projectile) -> i64 {
        let id = self.next_projectile_id;
        self.next_projectile_id += 1;
        self.projectiles.insert(id, proj);
        id
    }

    /// §4.10 step 4: process pickups, then respawns.
    fn process_items(&mut self, world: &World, players: &[EntityId]) -> Vec<PendingPickup> {
        let pickup_range = fnum(self.constants.pickup_range as f64);
        self.pickups.sweep(world, &self.item_grid, players, pickup_range, |player| {
            world.has(player, ComponentKind::WeaponType)
        })
    }

    pub fn due_respawns(&mut self, now_secs: f64) -> Vec<crate::math::FixedVec3> {
        self.respawns.due(fnum(now_secs))
    }

    pub fn schedule_respawn(&mut self, now_secs: f64, spawn_point: crate::math::FixedVec3) {
        self.respawns.schedule(fnum(now_secs), fnum(self.constants.consumable_respawn_seconds as f64), spawn_point);
    }

    pub fn item_grid_mut(&mut self) -> &mut ItemGrid {
        &mut self.item_grid
    }

    pub fn mark_pickup_consumed(&mut self, item: EntityId) {
        self.pickups.mark_consumed(item);
    }

    /// Runs one full tick per the fixed §4.10 order: drain, sim players,
    /// sim projectiles, items, then (conditionally) broadcast.
    pub fn run_tick(
        &mut self,
        world: &mut World,
        transport: &mut dyn Transport,
        colliders: &WorldColliders,
        block_colliders: &[Aabb],
        hitboxes: &[PlayerHitbox],
        on_message: impl FnMut(PeerId, Message),
    ) -> TickReport {
        self.drain_messages(transport, on_message);
        self.advance_players(world, colliders, block_colliders);
        let projectile_outcomes = self.advance_projectiles(hitboxes);
        let players = world.query(&[ComponentKind::Player]);
        let pickups = self.process_items(world, &players);

        self.ticks_since_broadcast += 1;
        let should_broadcast = self.ticks_since_broadcast >= self.broadcast_interval_ticks();
        if should_broadcast {
            self.ticks_since_broadcast = 0;
        }

        self.tick = self.tick.next();
        crate::profile_log!(
            self.tick.value(),
            tick = self.tick.value(),
            projectiles = self.projectiles.len(),
            should_broadcast,
            "tick summary"
        );
        TickReport {
            tick: self.tick,
            should_broadcast,
            projectile_outcomes,
            pickups,
        }
    }
}

/// Summary of what happened during one tick, for the caller to turn into
/// broadcast messages (building/item lifecycle messages are applied by
/// the caller's `on_message` closure directly, not summarized here).
pub struct TickReport {
    pub tick: Tick,
    pub should_broadcast: bool,
    pub projectile_outcomes: Vec<(i64, TickOutcome)>,
    pub pickups: Vec<PendingPickup>,
}

/// Building lifecycle application helpers (§4.8 protocol), kept in `tick`
/// since they are invoked from the message-drain phase of the loop.
/// Failures distinguish the policy `SimError` calls for (§7): a missing
/// building or non-owner request is never retried, a materials shortfall
/// or occupied cell is a plain no-op.
pub fn apply_block_place(world: &mut World, building: EntityId, grid: GridPos, color_index: u8, requester: EntityId, materials: &mut i32) -> Result<(), SimError> {
    let Some(b) = world.building_mut(building) else {
        return Err(SimError::EntityNotFound("building"));
    };
    if b.owner != requester {
        return Err(SimError::UnauthorizedAction("block place"));
    }
    if *materials < 1 {
        return Err(SimError::ResourceConstraint("insufficient materials"));
    }
    if !b.place(grid.x, grid.y, grid.z, color_index) {
        return Err(SimError::InvalidInput("cell occupied or out of range"));
    }
    *materials -= 1;
    Ok(())
}

pub fn apply_block_remove(world: &mut World, building: EntityId, grid: GridPos, requester: EntityId, materials: &mut i32, max_materials: i32) -> Result<(), SimError> {
    let Some(b) = world.building_mut(building) else {
        return Err(SimError::EntityNotFound("building"));
    };
    if b.owner != requester {
        return Err(SimError::UnauthorizedAction("block remove"));
    }
    if !b.remove(grid.x, grid.y, grid.z) {
        return Err(SimError::InvalidInput("cell already empty or out of range"));
    }
    *materials = (*materials + 1).min(max_materials);
    Ok(())
}

/// `BuildingCreate` (§4.8): allocates a fresh building entity owned by
/// `requester` with an empty voxel grid, returning its id for the
/// `BuildingCreated` reply. Creation itself has no ownership/resource
/// precondition to fail, unlike the mutation entry points above.
pub fn apply_building_create(world: &mut World, requester: EntityId, pos: GridPos, rot_y: crate::math::FixedNum) -> EntityId {
    let id = world.create_entity();
    world.add(id, ComponentKind::Building, Building::new(requester, pos, rot_y));
    id
}

/// `BuildingTransform` (§4.8): owner-only rewrite of a building's
/// placement, rebuilding every non-empty cell's world AABB in place.
pub fn apply_building_transform(world: &mut World, building: EntityId, requester: EntityId, pos: GridPos, rot_y: crate::math::FixedNum) -> Result<(), SimError> {
    let Some(b) = world.building_mut(building) else {
        return Err(SimError::EntityNotFound("building"));
    };
    if b.owner != requester {
        return Err(SimError::UnauthorizedAction("building transform"));
    }
    b.transform(pos, rot_y);
    Ok(())
}

/// `BuildingDestroy` (§4.8): owner-only destroy, refunding materials equal
/// to the non-empty cell count before dropping the entity (and every
/// derived collider with it).
pub fn apply_building_destroy(world: &mut World, building: EntityId, requester: EntityId, materials: &mut i32, max_materials: i32) -> Result<(), SimError> {
    let Some(b) = world.get::<Building>(building, ComponentKind::Building) else {
        return Err(SimError::EntityNotFound("building"));
    };
    if b.owner != requester {
        return Err(SimError::UnauthorizedAction("building destroy"));
    }
    let refund = b.non_empty_cell_count() as i32;
    *materials = (*materials + refund).min(max_materials);
    world.destroy_entity(building);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::building::Building;
    use crate::constants::DEFAULT_CONSTANTS;

    #[test]
    fn block_place_requires_ownership_and_materials() {
        let mut world = World::new();
        let owner = world.create_entity();
        let intruder = world.create_entity();
        let building = world.create_entity();
        world.add(building, ComponentKind::Building, Building::new(owner, GridPos { x: 0, y: 0, z: 0 }, crate::math::FixedNum::ZERO));

        let mut materials = 0;
        assert_eq!(
            apply_block_place(&mut world, building, GridPos { x: 1, y: 1, z: 1 }, 0, owner, &mut materials),
            Err(SimError::ResourceConstraint("insufficient materials"))
        );

        materials = 3;
        assert_eq!(
            apply_block_place(&mut world, building, GridPos { x: 1, y: 1, z: 1 }, 0, intruder, &mut materials),
            Err(SimError::UnauthorizedAction("block place"))
        );
        assert_eq!(materials, 3);

        assert!(apply_block_place(&mut world, building, GridPos { x: 1, y: 1, z: 1 }, 2, owner, &mut materials).is_ok());
        assert_eq!(materials, 2);
    }

    #[test]
    fn block_remove_refunds_clamped_to_max() {
        let mut world = World::new();
        let owner = world.create_entity();
        let building = world.create_entity();
        let mut b = Building::new(owner, GridPos { x: 0, y: 0, z: 0 }, crate::math::FixedNum::ZERO);
        b.place(1, 1, 1, 0);
        world.add(building, ComponentKind::Building, b);

        let mut materials = 10;
        assert!(apply_block_remove(&mut world, building, GridPos { x: 1, y: 1, z: 1 }, owner, &mut materials, 10).is_ok());
        assert_eq!(materials, 10); // clamped, was already at max
    }

    #[test]
    fn building_create_transform_destroy_round_trip_and_enforce_ownership() {
        let mut world = World::new();
        let owner = world.create_entity();
        let intruder = world.create_entity();

        let building = apply_building_create(&mut world, owner, GridPos { x: 0, y: 0, z: 0 }, crate::math::FixedNum::ZERO);
        assert!(world.has(building, ComponentKind::Building));

        assert_eq!(
            apply_building_transform(&mut world, building, intruder, GridPos { x: 5, y: 0, z: 5 }, crate::math::FixedNum::ZERO),
            Err(SimError::UnauthorizedAction("building transform"))
        );
        assert!(apply_building_transform(&mut world, building, owner, GridPos { x: 5, y: 0, z: 5 }, crate::math::FixedNum::ZERO).is_ok());
        assert_eq!(world.get::<Building>(building, ComponentKind::Building).unwrap().pos, GridPos { x: 5, y: 0, z: 5 });

        let mut materials = 0;
        let mut place_materials = 3;
        apply_block_place(&mut world, building, GridPos { x: 1, y: 1, z: 1 }, 0, owner, &mut place_materials).unwrap();
        apply_block_place(&mut world, building, GridPos { x: 2, y: 1, z: 1 }, 0, owner, &mut place_materials).unwrap();

        assert_eq!(
            apply_building_destroy(&mut world, building, intruder, &mut materials, 99),
            Err(SimError::UnauthorizedAction("building destroy"))
        );
        assert!(apply_building_destroy(&mut world, building, owner, &mut materials, 99).is_ok());
        assert_eq!(materials, 2);
        assert!(!world.exists(building));
    }

    #[test]
    fn tick_advances_counter_and_respects_broadcast_cadence() {
        let loop_ = TickLoop::new(DEFAULT_CONSTANTS);
        let interval = loop_.broadcast_interval_ticks();
        assert_eq!(interval, 3); // 60 / 20
    }

    #[test]
    fn stale_input_sequence_is_dropped() {
        let mut loop_ = TickLoop::new(DEFAULT_CONSTANTS);
        let player = EntityId(7);
        let msg = crate::protocol::InputMsg {
            sequence: 5,
            forward: 1,
            right: 0,
            camera_yaw: crate::math::FixedNum::ZERO,
            camera_pitch: crate::math::FixedNum::ZERO,
            jump: false,
            sprint: false,
            dive: false,
        };
        loop_.ingest_input(player, &msg);
        assert_eq!(loop_.inputs[&player].last_sequence, 5);

        let stale = crate::protocol::InputMsg { sequence: 3, forward: -1, ..msg };
        loop_.ingest_input(player, &stale);
        assert_eq!(loop_.inputs[&player].last_sequence, 5);
        assert_eq!(loop_.inputs[&player].latest.forward, 1);
    }
}
