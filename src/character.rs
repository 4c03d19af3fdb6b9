//! Character Controller (§4.5): the canonical deterministic `step`
//! function used verbatim by both the authoritative server and the
//! predicting client. The 14-step order below is load-bearing — changing
//! the order changes the physics, so it is not refactored into
//! independently-reorderable passes.

use crate::collision::{self, Aabb};
use crate::colliders::StaticCollider;
use crate::constants::Constants;
use crate::math::{fnum, trig, FixedNum, FixedVec3};
use crate::terrain::TerrainGrid;
use serde::{Deserialize, Serialize};

/// Canonical, deterministic character state (§3). Every field here is
/// exactly what must replay bit-identically given the same seed input
/// sequence — nothing render-only (camera shake, eye offset, etc.) lives
/// on this struct.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CharacterState {
    pub pos: FixedVec3,
    pub vel: FixedVec3,
    pub yaw: FixedNum,
    pub is_grounded: bool,
    pub has_jumped: bool,
    pub is_in_water: bool,
    pub is_head_underwater: bool,
    pub breath_remaining: FixedNum,
    pub water_depth: FixedNum,
    pub is_exhausted: bool,
}

impl CharacterState {
    pub fn spawn_at(pos: FixedVec3, c: &Constants) -> Self {
        Self {
            pos,
            vel: FixedVec3::ZERO,
            yaw: FixedNum::ZERO,
            is_grounded: false,
            has_jumped: false,
            is_in_water: false,
            is_head_underwater: false,
            breath_remaining: fnum(c.breath_max as f64),
            water_depth: FixedNum::ZERO,
            is_exhausted: false,
        }
    }
}

/// A single tick's worth of client input (§3). Fields are clamped by the
/// ingestion layer before reaching `step`; `step` itself never fails.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CharacterInput {
    /// -1, 0, or 1.
    pub forward: i8,
    /// -1, 0, or 1.
    pub right: i8,
    pub camera_yaw: FixedNum,
    pub camera_pitch: FixedNum,
    pub jump: bool,
    pub sprint: bool,
    pub dive: bool,
}

impl CharacterInput {
    pub fn clamped(mut self) -> Self {
        self.forward = self.forward.clamp(-1, 1);
        self.right = self.right.clamp(-1, 1);
        self
    }
}

/// Collider inputs `step` draws from. All optional except terrain, which
/// may also be absent (§4.5 "optional terrain grid").
pub struct StepColliders<'a> {
    pub terrain: Option<&'a dyn TerrainGrid>,
    pub trees: Option<&'a [StaticCollider]>,
    pub rocks: Option<&'a [StaticCollider]>,
    pub blocks: Option<&'a [Aabb]>,
}

impl<'a> StepColliders<'a> {
    pub fn none() -> Self {
        Self {
            terrain: None,
            trees: None,
            rocks: None,
            blocks: None,
        }
    }
}

/// The canonical deterministic character tick. Cannot fail (§4.5). Mirrors
/// the 14-step order enumerated in the design exactly.
pub fn step(state: &mut CharacterState, input: &CharacterInput, dt: FixedNum, c: &Constants, colliders: &StepColliders) {
    let input = input.clamped();

    // 1. Decide swimming.
    let swim_threshold = fnum(c.swim_depth_threshold as f64);
    let swimming = state.water_depth > swim_threshold;

    // 2. Camera-relative basis.
    let (sin_yaw, cos_yaw) = trig::sin_cos(state.yaw);
    let mut forward_dir = FixedVec3::new(sin_yaw, FixedNum::ZERO, cos_yaw);
    let right_dir = FixedVec3::new(-cos_yaw, FixedNum::ZERO, sin_yaw);
    if swimming {
        let (sin_pitch, cos_pitch) = trig::sin_cos(input.camera_pitch);
        forward_dir = FixedVec3::new(sin_yaw * cos_pitch, -sin_pitch, cos_yaw * cos_pitch);
    }

    let wish_dir = forward_dir * fnum(input.forward as f64) + right_dir * fnum(input.right as f64);
    let wish_dir = if wish_dir.length_squared() > FixedNum::ZERO {
        wish_dir.normalize()
    } else {
        FixedVec3::ZERO
    };
    let has_input = input.forward != 0 || input.right != 0;

    // 3. Acceleration.
    if swimming {
        let accel = fnum(c.water_acceleration as f64);
        let mut new_vel = state.vel + wish_dir * (accel * dt);
        if input.dive {
            new_vel.y -= accel * dt;
        }
        let max_speed = if input.sprint {
            fnum(c.water_max_speed_sprint as f64)
        } else {
            fnum(c.water_max_speed as f64)
        };
        let speed = new_vel.length();
        if speed > max_speed && speed > FixedNum::ZERO {
            new_vel = new_vel * (max_speed / speed);
        }
        state.vel = new_vel;
    } else {
        let control = if state.is_grounded {
            FixedNum::ONE
        } else {
            fnum(c.air_control as f64)
        };
        let mut horiz = state.vel.horizontal() + wish_dir * (fnum(c.movement_max_speed as f64) * control * dt * fnum(4.0));
        let mut max_speed = fnum(c.movement_max_speed as f64);
        if input.sprint {
            max_speed *= fnum(c.sprint_multiplier as f64);
        }
        if state.water_depth > FixedNum::ZERO && state.is_grounded {
            horiz = horiz * fnum(0.5);
            max_speed *= fnum(0.5);
        }
        let speed = horiz.length();
        if speed > max_speed && speed > FixedNum::ZERO {
            horiz = horiz * (max_speed / speed);
        }
        state.vel.x = horiz.x;
        state.vel.z = horiz.z;
    }

    // 4. Friction.
    if swimming {
        if !has_input {
            let drag = fnum(c.water_drag as f64);
            let factor = (FixedNum::ONE - drag * dt).max(FixedNum::ZERO);
            state.vel = state.vel * factor;
        }
    } else if state.is_grounded && !has_input {
        let friction = fnum(c.friction as f64);
        let factor = (FixedNum::ONE - friction * dt).max(FixedNum::ZERO);
        state.vel.x *= factor;
        state.vel.z *= factor;
    }

    // 5. Jump / surface impulse.
    if !input.jump {
        state.has_jumped = false;
    }
    if swimming {
        if input.jump && !state.has_jumped {
            state.vel.y += fnum(c.swim_up_impulse as f64);
            state.has_jumped = true;
        }
    } else if state.is_grounded && input.jump && !state.has_jumped {
        state.vel.y = fnum(c.jump_velocity as f64);
        state.is_grounded = false;
        state.has_jumped = true;
    }

    // 6. Vertical force.
    if swimming {
        if state.is_exhausted {
            state.vel.y += fnum(c.gravity as f64) * fnum(c.forced_sink_gravity_multiplier as f64) * dt;
        } else {
            state.vel.y += fnum(c.buoyancy as f64) * dt;
        }
        state.is_grounded = false;
    } else if !state.is_grounded {
        state.vel.y += fnum(c.gravity as f64) * dt;
    }

    // 7. Integrate axes separately with step-up on X/Z.
    integrate_axes(state, dt, c, colliders);

    // 8. Probe grounded for next tick.
    state.is_grounded = probe_grounded(state.pos, c, colliders);

    // 9. Clamp X/Z to world bounds.
    let half_extent = fnum(c.world_half_extent as f64);
    if state.pos.x > half_extent {
        state.pos.x = half_extent;
        state.vel.x = FixedNum::ZERO;
    } else if state.pos.x < -half_extent {
        state.pos.x = -half_extent;
        state.vel.x = FixedNum::ZERO;
    }
    if state.pos.z > half_extent {
        state.pos.z = half_extent;
        state.vel.z = FixedNum::ZERO;
    } else if state.pos.z < -half_extent {
        state.pos.z = -half_extent;
        state.vel.z = FixedNum::ZERO;
    }

    // 10. Mesh collisions (trees, then rocks).
    resolve_mesh_collisions(state, c, colliders.trees.unwrap_or(&[]), true);
    resolve_mesh_collisions(state, c, colliders.rocks.unwrap_or(&[]), false);

    // 11. Block colliders: up to 3 relaxation iterations.
    if let Some(blocks) = colliders.blocks {
        resolve_block_colliders(state, c, blocks);
    }

    // 12. Re-probe grounded after block resolution.
    state.is_grounded = probe_grounded(state.pos, c, colliders);

    // 13. Water state.
    let water_level = fnum(c.water_level_y as f64);
    let feet_y = state.pos.y - fnum(c.character_half_extent as f64);
    let head_y = state.pos.y + fnum(c.head_offset_y as f64);
    state.is_in_water = feet_y < water_level;
    state.is_head_underwater = head_y < water_level;
    if state.is_head_underwater {
        state.breath_remaining = (state.breath_remaining - dt).max(FixedNum::ZERO);
    } else {
        state.breath_remaining = fnum(c.breath_max as f64);
    }

    // 14. Snap yaw to camera yaw, no smoothing.
    state.yaw = input.camera_yaw;
}

fn integrate_axes(state: &mut CharacterState, dt: FixedNum, c: &Constants, colliders: &StepColliders) {
    let hx = fnum(c.character_half_extent as f64);
    let hy = hx;
    let hz = hx;
    let step_height = fnum(c.step_height as f64);

    // X axis, with step-up.
    {
        let dx = state.vel.x * dt;
        let target = state.pos.x + dx;
        if dx != FixedNum::ZERO && blocked_at(target, state.pos.y, state.pos.z, hx, hy, hz, c, colliders) {
            if state.is_grounded && !blocked_at(target, state.pos.y + step_height, state.pos.z, hx, hy, hz, c, colliders) {
                state.pos.y += step_height;
                state.pos.x = target;
            } else {
                state.vel.x = FixedNum::ZERO;
            }
        } else {
            state.pos.x = target;
        }
    }

    // Z axis, with step-up.
    {
        let dz = state.vel.z * dt;
        let target = state.pos.z + dz;
        if dz != FixedNum::ZERO && blocked_at(state.pos.x, state.pos.y, target, hx, hy, hz, c, colliders) {
            if state.is_grounded && !blocked_at(state.pos.x, state.pos.y + step_height, target, hx, hy, hz, c, colliders) {
                state.pos.y += step_height;
                state.pos.z = target;
            } else {
                state.vel.z = FixedNum::ZERO;
            }
        } else {
            state.pos.z = target;
        }
    }

    // Y axis.
    {
        let dy = state.vel.y * dt;
        let target = state.pos.y + dy;
        if dy != FixedNum::ZERO && blocked_at(state.pos.x, target, state.pos.z, hx, hy, hz, c, colliders) {
            if dy < FixedNum::ZERO {
                state.is_grounded = true;
                state.vel.y = FixedNum::ZERO;
            } else {
                state.vel.y = FixedNum::ZERO;
            }
        } else {
            state.pos.y = target;
        }
    }
}

fn blocked_at(x: FixedNum, y: FixedNum, z: FixedNum, hx: FixedNum, hy: FixedNum, hz: FixedNum, c: &Constants, colliders: &StepColliders) -> bool {
    if let Some(grid) = colliders.terrain {
        if collision::aabb_vs_voxel_grid(grid, x, y, z, hx, hy, hz, c) {
            return true;
        }
    }
    if let Some(blocks) = colliders.blocks {
        if collision::aabb_vs_boxes(FixedVec3::new(x, y, z), FixedVec3::new(hx, hy, hz), blocks) {
            return true;
        }
    }
    false
}

fn probe_grounded(pos: FixedVec3, c: &Constants, colliders: &StepColliders) -> bool {
    let probe_depth = fnum(c.ground_probe_depth as f64);
    let hx = fnum(c.character_half_extent as f64);
    let probe_y = pos.y - probe_depth;
    match colliders.terrain {
        Some(grid) => {
            let mut grounded = collision::aabb_vs_voxel_grid(grid, pos.x, probe_y, pos.z, hx, hx, hx, c);
            if !grounded {
                if let Some(blocks) = colliders.blocks {
                    grounded = collision::aabb_vs_boxes(FixedVec3::new(pos.x, probe_y, pos.z), FixedVec3::new(hx, hx, hx), blocks);
                }
            }
            grounded
        }
        None => {
            if let Some(blocks) = colliders.blocks {
                collision::aabb_vs_boxes(FixedVec3::new(pos.x, probe_y, pos.z), FixedVec3::new(hx, hx, hx), blocks)
            } else {
                // No terrain/blocks supplied: treat y<=0 as flat ground.
                pos.y <= FixedNum::ZERO
            }
        }
    }
}

fn resolve_mesh_collisions(state: &mut CharacterState, c: &Constants, meshes: &[StaticCollider], is_tree: bool) {
    let radius = fnum(c.character_capsule_radius as f64);
    let height = fnum(c.character_half_extent as f64) * fnum(2.0) * fnum(2.25); // approx capsule height from hitbox
    for collider in meshes {
        let hit = if is_tree {
            // Trees use the cheaper trunk-cylinder routine via their mesh's
            // bounding data; callers supply trunk segments through the
            // mesh transform's translation/scale for single-trunk trees.
            collision::capsule_vs_triangle_mesh(state.pos.x, state.pos.y, state.pos.z, radius, height, &collider.mesh, &collider.transform)
        } else {
            collision::capsule_vs_triangle_mesh(state.pos.x, state.pos.y, state.pos.z, radius, height, &collider.mesh, &collider.transform)
        };
        if hit.colliding {
            state.pos = state.pos + hit.push;
            let push_norm = if hit.push.length_squared() > FixedNum::ZERO {
                hit.push.normalize()
            } else {
                FixedVec3::ZERO
            };
            let into_surface = state.vel.dot(push_norm);
            if into_surface < FixedNum::ZERO {
                state.vel = state.vel - push_norm * into_surface;
            }
            if push_norm.y > fnum(0.7) && state.vel.y <= FixedNum::ZERO {
                state.is_grounded = true;
                state.vel.y = FixedNum::ZERO;
            }
        }
    }
}

fn resolve_block_colliders(state: &mut CharacterState, c: &Constants, blocks: &[Aabb]) {
    let half = fnum(c.character_half_extent as f64);
    let step_height = fnum(c.step_height as f64);

    for _ in 0..3 {
        let overlapping = collision::overlapping_boxes(state.pos, FixedVec3::new(half, half, half), blocks);
        if overlapping.is_empty() {
            break;
        }
        for b in overlapping {
            if state.is_grounded {
                let top_y = b.max().y;
                let stepped_y = top_y + half;
                if stepped_y - state.pos.y <= step_height {
                    let free_above = !collision::aabb_vs_boxes(
                        FixedVec3::new(state.pos.x, stepped_y, state.pos.z),
                        FixedVec3::new(half, half, half),
                        blocks,
                    );
                    if free_above {
                        state.pos.y = stepped_y;
                        state.is_grounded = true;
                        if state.vel.y < FixedNum::ZERO {
                            state.vel.y = FixedNum::ZERO;
                        }
                        continue;
                    }
                }
            }

            // Push along the smallest-overlap axis.
            let delta = state.pos - b.center;
            let overlap_x = half + b.half.x - delta.x.abs();
            let overlap_y = half + b.half.y - delta.y.abs();
            let overlap_z = half + b.half.z - delta.z.abs();

            if overlap_x <= overlap_y && overlap_x <= overlap_z {
                let sign = if delta.x >= FixedNum::ZERO { FixedNum::ONE } else { -FixedNum::ONE };
                state.pos.x += sign * overlap_x;
                if (state.vel.x * sign) < FixedNum::ZERO {
                    state.vel.x = FixedNum::ZERO;
                }
            } else if overlap_y <= overlap_x && overlap_y <= overlap_z {
                let sign = if delta.y >= FixedNum::ZERO { FixedNum::ONE } else { -FixedNum::ONE };
                state.pos.y += sign * overlap_y;
                if sign > FixedNum::ZERO {
                    state.is_grounded = true;
                }
                if (state.vel.y * sign) < FixedNum::ZERO {
                    state.vel.y = FixedNum::ZERO;
                }
            } else {
                let sign = if delta.z >= FixedNum::ZERO { FixedNum::ONE } else { -FixedNum::ONE };
                state.pos.z += sign * overlap_z;
                if (state.vel.z * sign) < FixedNum::ZERO {
                    state.vel.z = FixedNum::ZERO;
                }
            }
        }
    }
}
