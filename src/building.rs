//! Building System (§4.8): one 12³ voxel grid per building entity, with
//! placement/removal/transform mutating the grid and a derived AABB
//! collider cache kept in lock-step. Cell/world mapping is reproduced
//! bit-exact per the design's worked-through arithmetic.

use crate::collision::Aabb;
use crate::ecs::EntityId;
use crate::math::{fnum, trig, FixedNum, FixedVec3};
use serde::{Deserialize, Serialize};

pub const GRID_SIZE: usize = 12;
pub const CELL_SIZE: f32 = 0.5;
const CELL_COUNT: usize = GRID_SIZE * GRID_SIZE * GRID_SIZE;

/// `0` = empty; non-zero stores `colorIndex + 1` (1..16) (§3 invariant).
pub type Cell = u8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

/// One building: owner, placement, 12³ voxel data, and a derived AABB
/// collider cache rebuilt whenever placement or transform changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Building {
    pub owner: EntityId,
    pub pos: GridPos,
    pub rot_y: FixedNum,
    #[serde(with = "serde_big_array_voxels")]
    pub voxel_data: [Cell; CELL_COUNT],
    /// Derived per-cell world AABBs, indexed by the same flat index as
    /// `voxel_data`; `None` for empty cells. Rebuilt on place/remove
    /// (single cell) or transform (every non-empty cell).
    #[serde(skip)]
    colliders: Vec<Option<Aabb>>,
}

mod serde_big_array_voxels {
    use super::CELL_COUNT;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8; CELL_COUNT], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_bytes(data)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; CELL_COUNT], D::Error> {
        let bytes: Vec<u8> = serde::Deserialize::deserialize(d)?;
        let mut arr = [0u8; CELL_COUNT];
        let n = bytes.len().min(CELL_COUNT);
        arr[..n].copy_from_slice(&bytes[..n]);
        Ok(arr)
    }
}

fn flat_index(gx: i32, gy: i32, gz: i32) -> Option<usize> {
    if !(0..GRID_SIZE as i32).contains(&gx) || !(0..GRID_SIZE as i32).contains(&gy) || !(0..GRID_SIZE as i32).contains(&gz) {
        return None;
    }
    Some((gx as usize * GRID_SIZE + gy as usize) * GRID_SIZE + gz as usize)
}

/// Cell-to-world mapping (§4.8), reproduced bit-exact:
/// `halfCell = 0.25`, `halfSize = 3.0`, `local = g*0.5 - 3.0 + 0.25`,
/// `world = pos + Rot_y(rotY) * local` (x/z only; y additive).
pub fn cell_local_position(gx: i32, gy: i32, gz: i32) -> FixedVec3 {
    let half_size = fnum(3.0);
    let half_cell = fnum(0.25);
    let cell = fnum(CELL_SIZE as f64);
    let lx = fnum(gx as f64) * cell - half_size + half_cell;
    let ly = fnum(gy as f64) * cell - half_size + half_cell;
    let lz = fnum(gz as f64) * cell - half_size + half_cell;
    FixedVec3::new(lx, ly, lz)
}

pub fn cell_world_position(building_pos: FixedVec3, rot_y: FixedNum, gx: i32, gy: i32, gz: i32) -> FixedVec3 {
    let local = cell_local_position(gx, gy, gz);
    let (sin_y, cos_y) = trig::sin_cos(rot_y);
    let rx = local.x * cos_y + local.z * sin_y;
    let rz = -local.x * sin_y + local.z * cos_y;
    FixedVec3::new(building_pos.x + rx, building_pos.y + local.y, building_pos.z + rz)
}

impl Building {
    pub fn new(owner: EntityId, pos: GridPos, rot_y: FixedNum) -> Self {
        Self {
            owner,
            pos,
            rot_y,
            voxel_data: [0; CELL_COUNT],
            colliders: vec![None; CELL_COUNT],
        }
    }

    pub fn world_pos(&self) -> FixedVec3 {
        FixedVec3::new(fnum(self.pos.x as f64), fnum(self.pos.y as f64), fnum(self.pos.z as f64))
    }

    fn cell_aabb(&self, gx: i32, gy: i32, gz: i32) -> Aabb {
        let half = fnum(0.25);
        let center = cell_world_position(self.world_pos(), self.rot_y, gx, gy, gz);
        Aabb::new(center, FixedVec3::new(half, half, half))
    }

    /// `BlockPlace` (§4.8): if the cell is empty, writes `colorIndex + 1`
    /// and (re)builds its collider. Callers are responsible for the
    /// ownership and materials checks before calling this — this function
    /// is the unconditional mutation once those checks have passed.
    pub fn place(&mut self, gx: i32, gy: i32, gz: i32, color_index: u8) -> bool {
        let Some(idx) = flat_index(gx, gy, gz) else { return false };
        if self.voxel_data[idx] != 0 {
            return false;
        }
        self.voxel_data[idx] = color_index + 1;
        self.colliders[idx] = Some(self.cell_aabb(gx, gy, gz));
        true
    }

    /// `BlockRemove` (§4.8): zeroes the voxel and drops its collider.
    /// Returns whether a non-empty cell was actually cleared (used by the
    /// caller to decide whether to refund materials).
    pub fn remove(&mut self, gx: i32, gy: i32, gz: i32) -> bool {
        let Some(idx) = flat_index(gx, gy, gz) else { return false };
        if self.voxel_data[idx] == 0 {
            return false;
        }
        self.voxel_data[idx] = 0;
        self.colliders[idx] = None;
        true
    }

    /// `BuildingTransform` (§4.8): rewrites the transform and rebuilds
    /// every non-empty cell's world AABB in place.
    pub fn transform(&mut self, pos: GridPos, rot_y: FixedNum) {
        self.pos = pos;
        self.rot_y = rot_y;
        self.rebuild_colliders();
    }

    fn rebuild_colliders(&mut self) {
        for gx in 0..GRID_SIZE as i32 {
            for gy in 0..GRID_SIZE as i32 {
                for gz in 0..GRID_SIZE as i32 {
                    let idx = flat_index(gx, gy, gz).unwrap();
                    self.colliders[idx] = if self.voxel_data[idx] != 0 {
                        Some(self.cell_aabb(gx, gy, gz))
                    } else {
                        None
                    };
                }
            }
        }
    }

    pub fn cell(&self, gx: i32, gy: i32, gz: i32) -> Cell {
        flat_index(gx, gy, gz).map(|i| self.voxel_data[i]).unwrap_or(0)
    }

    pub fn non_empty_cell_count(&self) -> usize {
        self.voxel_data.iter().filter(|&&c| c != 0).count()
    }

    /// Every non-empty cell as `(x, y, z, colorIndex)`, for
    /// `BuildingInitialState` snapshots (§4.8).
    pub fn non_empty_cells(&self) -> Vec<(i32, i32, i32, u8)> {
        let mut out = Vec::with_capacity(self.non_empty_cell_count());
        for gx in 0..GRID_SIZE as i32 {
            for gy in 0..GRID_SIZE as i32 {
                for gz in 0..GRID_SIZE as i32 {
                    let c = self.cell(gx, gy, gz);
                    if c != 0 {
                        out.push((gx, gy, gz, c - 1));
                    }
                }
            }
        }
        out
    }

    /// The current derived collider set, for insertion into the octree or
    /// direct use by `character::step`'s block-collider pass.
    pub fn colliders(&self) -> Vec<Aabb> {
        self.colliders.iter().filter_map(|c| *c).collect()
    }
}
