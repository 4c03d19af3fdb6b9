//! Fixed constants that must be identical, bit-for-bit, on every peer.
//!
//! These are the environment-affecting values called out in §6/§4.5/§4.8/
//! §4.9 of the design: world extents, timestep, character physics, water
//! levels, voxel sizes. They are baked into the binary as
//! [`DEFAULT_CONSTANTS`] rather than hot-reloaded, because a config value
//! that can change mid-session while two peers disagree on its value is a
//! desync waiting to happen. Non-default rulesets can still be loaded at
//! startup (see [`crate::config`]) as long as loading happens once, before
//! the first tick, identically on both sides.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Constants {
    /// World X/Z are clamped to [-WORLD_HALF_EXTENT, +WORLD_HALF_EXTENT].
    pub world_half_extent: f32,
    pub tick_dt: f32,
    pub tick_rate_hz: f32,
    pub broadcast_rate_hz: f32,

    pub movement_max_speed: f32,
    pub sprint_multiplier: f32,
    pub air_control: f32,
    pub friction: f32,
    pub jump_velocity: f32,
    pub gravity: f32,
    pub step_height: f32,
    pub ground_probe_depth: f32,

    pub water_level_y: f32,
    pub swim_depth_threshold: f32,
    pub water_acceleration: f32,
    pub water_control: f32,
    pub water_max_speed: f32,
    pub water_max_speed_sprint: f32,
    pub water_drag: f32,
    pub swim_up_impulse: f32,
    pub buoyancy: f32,
    pub forced_sink_gravity_multiplier: f32,
    pub breath_max: f32,

    pub voxel_width: f32,
    pub voxel_height: f32,
    pub voxel_depth: f32,
    pub level_offset_x: f32,
    pub level_offset_y: f32,
    pub level_offset_z: f32,

    pub building_grid_size: i32,
    pub building_cell_size: f32,

    pub pickup_range: f32,
    pub item_grid_cell_size: f32,
    pub consumable_respawn_seconds: f32,

    pub projectile_substeps: u32,
    pub default_gravity_start_distance: f32,

    pub prediction_buffer_capacity: usize,
    pub reconciliation_hard_snap_distance: f32,
    pub visual_error_half_life_ms: f32,
    pub remote_interpolation_window_ms: f32,

    pub octree_max_depth: u32,
    pub octree_max_entries_per_node: usize,

    pub character_half_extent: f32,
    pub character_capsule_radius: f32,
    pub head_half_extent: f32,
    pub head_offset_y: f32,
}

pub const DEFAULT_CONSTANTS: Constants = Constants {
    world_half_extent: 270.0,
    tick_dt: 1.0 / 60.0,
    tick_rate_hz: 60.0,
    broadcast_rate_hz: 20.0,

    movement_max_speed: 5.0,
    sprint_multiplier: 1.5,
    air_control: 0.3,
    friction: 8.0,
    jump_velocity: 6.0,
    gravity: -20.0,
    step_height: 0.55,
    ground_probe_depth: 0.05,

    water_level_y: 0.0,
    swim_depth_threshold: 0.5,
    water_acceleration: 6.0,
    water_control: 0.6,
    water_max_speed: 3.0,
    water_max_speed_sprint: 4.5,
    water_drag: 2.0,
    swim_up_impulse: 4.0,
    buoyancy: 9.0,
    forced_sink_gravity_multiplier: 1.5,
    breath_max: 10.0,

    voxel_width: 1.0,
    voxel_height: 1.0,
    voxel_depth: 1.0,
    level_offset_x: 0.0,
    level_offset_y: 0.0,
    level_offset_z: 0.0,

    building_grid_size: 12,
    building_cell_size: 0.5,

    pickup_range: 0.75,
    item_grid_cell_size: 2.0,
    consumable_respawn_seconds: 10.0,

    projectile_substeps: 4,
    default_gravity_start_distance: 40.0,

    prediction_buffer_capacity: 64,
    reconciliation_hard_snap_distance: 4.0,
    visual_error_half_life_ms: 100.0,
    remote_interpolation_window_ms: 50.0,

    octree_max_depth: 6,
    octree_max_entries_per_node: 8,

    character_half_extent: 0.4,
    character_capsule_radius: 0.4,
    head_half_extent: 0.3,
    head_offset_y: 1.3,
};
