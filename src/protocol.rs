//! Protocol & Opcodes (§6, §13): enumerated, schema-defined messages
//! crossing the transport boundary. Numeric opcode assignment is free per
//! the design — only the name/field contract is — so the wire tag is a
//! plain ordinal, encoded alongside its payload with `bincode` (the
//! teacher's wire-format dependency).

use crate::building::GridPos;
use crate::ecs::{BuffType, EntityId, WeaponType};
use crate::math::{FixedNum, FixedVec3};
use serde::{Deserialize, Serialize};

/// A unit quaternion, used only for the wire representation of rotation —
/// the simulation core itself drives orientation from `yaw`/`headPitch`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quat {
    pub x: FixedNum,
    pub y: FixedNum,
    pub z: FixedNum,
    pub w: FixedNum,
}

impl Quat {
    /// Yaw-only rotation about Y, matching the character controller's
    /// single-axis orientation (§4.5 step 14 only ever sets yaw).
    pub fn from_yaw(yaw: FixedNum) -> Self {
        let (sin_half, cos_half) = crate::math::trig::sin_cos(yaw / crate::math::fnum(2.0));
        Quat {
            x: FixedNum::ZERO,
            y: sin_half,
            z: FixedNum::ZERO,
            w: cos_half,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InputMsg {
    pub sequence: u64,
    pub forward: i8,
    pub right: i8,
    pub camera_yaw: FixedNum,
    pub camera_pitch: FixedNum,
    pub jump: bool,
    pub sprint: bool,
    pub dive: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformSnapshotMsg {
    pub entity_id: EntityId,
    pub pos: FixedVec3,
    pub rot: Quat,
    pub vel: FixedVec3,
    pub head_pitch: FixedNum,
    pub last_processed_input: u64,
    pub is_in_water: Option<bool>,
    pub is_head_underwater: Option<bool>,
    pub breath_remaining: Option<FixedNum>,
    pub water_depth: Option<FixedNum>,
    pub is_exhausted: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShootMsg {
    pub base_dir: FixedVec3,
    pub spawn_point: FixedVec3,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReloadMsg {
    pub entity_id: EntityId,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ItemTossLandMsg {
    pub item_id: EntityId,
    pub land_point: FixedVec3,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LadderPlaceMsg {
    pub pos: FixedVec3,
    pub yaw: FixedNum,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BuildingCreateMsg {
    pub pos: FixedVec3,
    pub rot_y: FixedNum,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BuildingCreatedMsg {
    pub building_id: EntityId,
    pub owner_id: EntityId,
    pub pos: FixedVec3,
    pub rot_y: FixedNum,
    pub size: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockPlaceMsg {
    pub building_id: EntityId,
    pub grid_x: i32,
    pub grid_y: i32,
    pub grid_z: i32,
    pub color_index: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRemoveMsg {
    pub building_id: EntityId,
    pub grid_x: i32,
    pub grid_y: i32,
    pub grid_z: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockPlacedMsg {
    pub building_id: EntityId,
    pub grid_x: i32,
    pub grid_y: i32,
    pub grid_z: i32,
    pub color_index: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRemovedMsg {
    pub building_id: EntityId,
    pub grid_x: i32,
    pub grid_y: i32,
    pub grid_z: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BuildingTransformMsg {
    pub building_id: EntityId,
    pub pos: FixedVec3,
    pub rot_y: FixedNum,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BuildingTransformedMsg {
    pub building_id: EntityId,
    pub pos: FixedVec3,
    pub rot_y: FixedNum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingDestroyMsg {
    pub building_id: EntityId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingDestroyedMsg {
    pub building_id: EntityId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingInitialStateMsg {
    pub building_id: EntityId,
    pub owner_id: EntityId,
    pub pos: GridPos,
    pub rot_y_milli: i64,
    /// `(x, y, z, colorIndex)` for every non-empty cell.
    pub cells: Vec<(i32, i32, i32, u8)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectileSpawnMsg {
    pub projectile_id: i64,
    pub owner_id: EntityId,
    pub pos: FixedVec3,
    pub dir: FixedVec3,
    pub speed: FixedNum,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectileSpawnBatchMsg {
    pub spawns: Vec<ProjectileSpawnMsg>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectileDestroyMsg {
    pub projectile_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ItemSpawnMsg {
    pub item_id: EntityId,
    pub pos: FixedVec3,
    pub weapon: Option<WeaponType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ItemUpdateMsg {
    pub item_id: EntityId,
    pub pos: FixedVec3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPickupMsg {
    pub item_id: EntityId,
    pub player_id: EntityId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDropSoundMsg {
    pub item_id: EntityId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDamageMsg {
    pub target: EntityId,
    pub amount: i32,
    pub headshot: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialsUpdateMsg {
    pub player_id: EntityId,
    pub materials: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BuffAppliedMsg {
    pub player_id: EntityId,
    pub buff: BuffType,
    pub duration: FixedNum,
}

/// Every message the core protocol defines, tagged by an ordinal (§6:
/// "numeric assignment is free"). `bincode` serializes this enum directly;
/// `priority()` routes it to the `High`/`Low` channel it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Message {
    Input(InputMsg),
    TransformSnapshot(TransformSnapshotMsg),
    Shoot(ShootMsg),
    Reload(ReloadMsg),
    ItemTossLand(ItemTossLandMsg),
    LadderPlace(LadderPlaceMsg),
    BuildingCreate(BuildingCreateMsg),
    BuildingCreated(BuildingCreatedMsg),
    BlockPlace(BlockPlaceMsg),
    BlockRemove(BlockRemoveMsg),
    BlockPlaced(BlockPlacedMsg),
    BlockRemoved(BlockRemovedMsg),
    BuildingTransform(BuildingTransformMsg),
    BuildingTransformed(BuildingTransformedMsg),
    BuildingDestroy(BuildingDestroyMsg),
    BuildingDestroyed(BuildingDestroyedMsg),
    BuildingInitialState(BuildingInitialStateMsg),
    ProjectileSpawn(ProjectileSpawnMsg),
    ProjectileSpawnBatch(ProjectileSpawnBatchMsg),
    ProjectileDestroy(ProjectileDestroyMsg),
    ItemSpawn(ItemSpawnMsg),
    ItemUpdate(ItemUpdateMsg),
    ItemPickup(ItemPickupMsg),
    ItemDropSound(ItemDropSoundMsg),
    EntityDamage(EntityDamageMsg),
    MaterialsUpdate(MaterialsUpdateMsg),
    BuffApplied(BuffAppliedMsg),
}

impl Message {
    pub fn priority(&self) -> crate::transport::Priority {
        use crate::transport::Priority::*;
        match self {
            Message::Input(_) | Message::TransformSnapshot(_) => High,
            _ => Low,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Message, bincode::Error> {
        bincode::deserialize(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_message_round_trips_through_bincode() {
        let msg = Message::Input(InputMsg {
            sequence: 42,
            forward: 1,
            right: -1,
            camera_yaw: crate::math::fnum(1.5),
            camera_pitch: crate::math::fnum(0.1),
            jump: true,
            sprint: false,
            dive: false,
        });
        let bytes = msg.encode().unwrap();
        let decoded = Message::decode(&bytes).unwrap();
        match decoded {
            Message::Input(i) => assert_eq!(i.sequence, 42),
            other => panic!("wrong variant decoded: {other:?}"),
        }
    }

    #[test]
    fn input_and_transform_route_high_priority() {
        assert_eq!(
            Message::Input(InputMsg {
                sequence: 0,
                forward: 0,
                right: 0,
                camera_yaw: FixedNum::ZERO,
                camera_pitch: FixedNum::ZERO,
                jump: false,
                sprint: false,
                dive: false,
            })
            .priority(),
            crate::transport::Priority::High
        );
    }

    #[test]
    fn building_create_routes_low_priority() {
        assert_eq!(
            Message::BuildingCreate(BuildingCreateMsg {
                pos: FixedVec3::ZERO,
                rot_y: FixedNum::ZERO,
            })
            .priority(),
            crate::transport::Priority::Low
        );
    }

    #[test]
    fn building_initial_state_round_trips_voxel_data_exactly() {
        let msg = BuildingInitialStateMsg {
            building_id: EntityId(5),
            owner_id: EntityId(1),
            pos: GridPos { x: 0, y: 0, z: 0 },
            rot_y_milli: 0,
            cells: vec![(1, 2, 3, 7), (11, 11, 11, 15)],
        };
        let encoded = Message::BuildingInitialState(msg.clone()).encode().unwrap();
        let decoded = Message::decode(&encoded).unwrap();
        match decoded {
            Message::BuildingInitialState(m) => assert_eq!(m.cells, msg.cells),
            other => panic!("wrong variant: {other:?}"),
        }
    }
}
