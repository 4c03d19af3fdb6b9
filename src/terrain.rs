//! Read-only query surface over a column-based voxel terrain grid.
//!
//! The grid itself is produced by an external generator from a seed; this
//! module only reads it (§4.2, §5 "the only place the core tolerates
//! concurrent readers is the static terrain grid, which is frozen after
//! generation"). A [`MultiTileTerrain`] adapter stitches several tiles into
//! one logical grid for world streaming, mirroring the multi-tile
//! requirement without the core ever needing to know how tiles are loaded.

use crate::constants::Constants;
use crate::math::{fnum, FixedNum, FixedVec3};

/// A single, frozen column-based voxel tile. `solid` is a dense row-major
/// `[x][z][y]`-flattened occupancy array; `heights` caches the topmost
/// solid cell per column so `get_world_surface_y` is O(1).
#[derive(Debug, Clone)]
pub struct TerrainTile {
    pub grid_width: usize,
    pub grid_depth: usize,
    pub grid_height: usize,
    solid: Vec<bool>,
    heights: Vec<i32>,
}

impl TerrainTile {
    pub fn new(grid_width: usize, grid_depth: usize, grid_height: usize) -> Self {
        Self {
            grid_width,
            grid_depth,
            grid_height,
            solid: vec![false; grid_width * grid_depth * grid_height],
            heights: vec![-1; grid_width * grid_depth],
        }
    }

    fn index(&self, gx: i32, gy: i32, gz: i32) -> Option<usize> {
        if gx < 0
            || gz < 0
            || gy < 0
            || gx as usize >= self.grid_width
            || gz as usize >= self.grid_depth
            || gy as usize >= self.grid_height
        {
            return None;
        }
        let (gx, gy, gz) = (gx as usize, gy as usize, gz as usize);
        Some((gx * self.grid_depth + gz) * self.grid_height + gy)
    }

    /// Sets a cell and maintains the column height cache. Used only by
    /// whatever owns generation (outside the core); the core itself never
    /// mutates terrain after it is handed a tile.
    pub fn set_solid(&mut self, gx: i32, gy: i32, gz: i32, solid: bool) {
        if let Some(idx) = self.index(gx, gy, gz) {
            self.solid[idx] = solid;
            let col = gx as usize * self.grid_depth + gz as usize;
            if solid {
                if gy > self.heights[col] {
                    self.heights[col] = gy;
                }
            } else if gy == self.heights[col] {
                // Recompute by scanning down; generation-time only.
                let mut h = -1;
                for y in 0..self.grid_height as i32 {
                    if self.index(gx, y, gz).map(|i| self.solid[i]).unwrap_or(false) {
                        h = y;
                    }
                }
                self.heights[col] = h;
            }
        }
    }

    pub fn is_solid_grid(&self, gx: i32, gy: i32, gz: i32) -> bool {
        self.index(gx, gy, gz).map(|i| self.solid[i]).unwrap_or(false)
    }

    pub fn column_height(&self, gx: i32, gz: i32) -> i32 {
        if gx < 0 || gz < 0 || gx as usize >= self.grid_width || gz as usize >= self.grid_depth {
            return -1;
        }
        self.heights[gx as usize * self.grid_depth + gz as usize]
    }
}

/// The terrain query surface the rest of the core depends on. Implemented
/// by [`TerrainTile`] directly and by [`MultiTileTerrain`] for world
/// streaming; `character::step` and the collision primitives take
/// `&dyn TerrainGrid` so they never depend on the tiling strategy.
pub trait TerrainGrid {
    fn is_solid(&self, world: FixedVec3, c: &Constants) -> bool;
    fn get_column_height(&self, grid_x: i32, grid_z: i32) -> i32;
    fn get_world_surface_y(&self, world_x: FixedNum, world_z: FixedNum, c: &Constants) -> FixedNum;
}

fn world_to_grid(world: FixedNum, voxel_size: FixedNum, offset: FixedNum) -> i32 {
    ((world - offset) / voxel_size).floor().to_num::<i32>()
}

fn grid_to_world(grid: i32, voxel_size: FixedNum, offset: FixedNum) -> FixedNum {
    FixedNum::from_num(grid) * voxel_size + offset
}

impl TerrainGrid for TerrainTile {
    fn is_solid(&self, world: FixedVec3, c: &Constants) -> bool {
        let gx = world_to_grid(world.x, fnum(c.voxel_width as f64), fnum(c.level_offset_x as f64));
        let gy = world_to_grid(world.y, fnum(c.voxel_height as f64), fnum(c.level_offset_y as f64));
        let gz = world_to_grid(world.z, fnum(c.voxel_depth as f64), fnum(c.level_offset_z as f64));
        self.is_solid_grid(gx, gy, gz)
    }

    fn get_column_height(&self, grid_x: i32, grid_z: i32) -> i32 {
        self.column_height(grid_x, grid_z)
    }

    fn get_world_surface_y(&self, world_x: FixedNum, world_z: FixedNum, c: &Constants) -> FixedNum {
        let gx = world_to_grid(world_x, fnum(c.voxel_width as f64), fnum(c.level_offset_x as f64));
        let gz = world_to_grid(world_z, fnum(c.voxel_depth as f64), fnum(c.level_offset_z as f64));
        let h = self.column_height(gx, gz);
        if h < 0 {
            fnum(c.level_offset_y as f64)
        } else {
            grid_to_world(h + 1, fnum(c.voxel_height as f64), fnum(c.level_offset_y as f64))
        }
    }
}

/// Stitches a 3x3 (or arbitrary) set of tiles, each offset in world space,
/// into one logical grid. Queries are routed to the tile whose bounds
/// contain the world coordinate.
pub struct MultiTileTerrain {
    /// (tile, world_origin_x, world_origin_z)
    tiles: Vec<(TerrainTile, FixedNum, FixedNum)>,
    tile_world_width: FixedNum,
    tile_world_depth: FixedNum,
}

impl MultiTileTerrain {
    pub fn new(tile_world_width: f32, tile_world_depth: f32) -> Self {
        Self {
            tiles: Vec::new(),
            tile_world_width: fnum(tile_world_width as f64),
            tile_world_depth: fnum(tile_world_depth as f64),
        }
    }

    pub fn add_tile(&mut self, tile: TerrainTile, origin_x: f32, origin_z: f32) {
        self.tiles.push((tile, fnum(origin_x as f64), fnum(origin_z as f64)));
    }

    fn locate(&self, world_x: FixedNum, world_z: FixedNum) -> Option<&(TerrainTile, FixedNum, FixedNum)> {
        self.tiles.iter().find(|(_, ox, oz)| {
            world_x >= *ox
                && world_x < *ox + self.tile_world_width
                && world_z >= *oz
                && world_z < *oz + self.tile_world_depth
        })
    }
}

impl TerrainGrid for MultiTileTerrain {
    fn is_solid(&self, world: FixedVec3, c: &Constants) -> bool {
        match self.locate(world.x, world.z) {
            Some((tile, ox, oz)) => tile.is_solid(FixedVec3::new(world.x - *ox, world.y, world.z - *oz), c),
            None => false,
        }
    }

    fn get_column_height(&self, grid_x: i32, grid_z: i32) -> i32 {
        // Column-space lookups are tile-local by convention; callers that
        // need multi-tile column queries should locate the tile themselves.
        self.tiles
            .first()
            .map(|(t, _, _)| t.column_height(grid_x, grid_z))
            .unwrap_or(-1)
    }

    fn get_world_surface_y(&self, world_x: FixedNum, world_z: FixedNum, c: &Constants) -> FixedNum {
        match self.locate(world_x, world_z) {
            Some((tile, ox, oz)) => tile.get_world_surface_y(world_x - *ox, world_z - *oz, c),
            None => fnum(c.level_offset_y as f64),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_CONSTANTS;

    #[test]
    fn flat_floor_reports_surface_at_one_voxel() {
        let mut tile = TerrainTile::new(8, 8, 8);
        for x in 0..8 {
            for z in 0..8 {
                tile.set_solid(x, 0, z, true);
            }
        }
        let c = DEFAULT_CONSTANTS;
        assert!(tile.is_solid(FixedVec3::from_f32(1.5, 0.5, 1.5), &c));
        assert!(!tile.is_solid(FixedVec3::from_f32(1.5, 1.5, 1.5), &c));
        assert_eq!(tile.get_world_surface_y(fnum(1.5), fnum(1.5), &c), FixedNum::ONE);
    }

    #[test]
    fn multi_tile_routes_to_correct_tile() {
        let mut a = TerrainTile::new(4, 4, 4);
        a.set_solid(0, 0, 0, true);
        let mut b = TerrainTile::new(4, 4, 4);
        b.set_solid(0, 0, 0, true);

        let mut multi = MultiTileTerrain::new(4.0, 4.0);
        multi.add_tile(a, 0.0, 0.0);
        multi.add_tile(b, 4.0, 0.0);

        let c = DEFAULT_CONSTANTS;
        assert!(multi.is_solid(FixedVec3::from_f32(0.5, 0.5, 0.5), &c));
        assert!(multi.is_solid(FixedVec3::from_f32(4.5, 0.5, 0.5), &c));
        assert!(!multi.is_solid(FixedVec3::from_f32(4.5, 1.5, 0.5), &c));
    }
}
