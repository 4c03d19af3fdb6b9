//! Collision primitives (§4.4): pure, deterministic, allocation-free
//! routines shared by `character::step` and the projectile engine. None of
//! these suspend or allocate on the hot path (§5) — Vec growth only
//! happens in the mesh-push accumulators, which are bounded by triangle
//! count, not by tick count.

use crate::colliders::{ColliderTransform, Triangle};
use crate::math::{fnum, FixedNum, FixedVec3};
use crate::terrain::TerrainGrid;
use crate::constants::Constants;

/// AABB-vs-voxel-grid overlap test (§4.4): full cell-range iteration over
/// the query box in integer grid indices, early exit on first solid cell.
/// Every coordinate stays a [`FixedNum`] end to end so this resolves
/// bit-identically on every peer, matching every other primitive in this
/// module.
pub fn aabb_vs_voxel_grid(
    grid: &dyn TerrainGrid,
    x: FixedNum,
    y: FixedNum,
    z: FixedNum,
    hx: FixedNum,
    hy: FixedNum,
    hz: FixedNum,
    c: &Constants,
) -> bool {
    let min = FixedVec3::new(x - hx, y - hy, z - hz);
    let max = FixedVec3::new(x + hx, y + hy, z + hz);

    let voxel_width = fnum(c.voxel_width as f64);
    let voxel_height = fnum(c.voxel_height as f64);
    let voxel_depth = fnum(c.voxel_depth as f64);
    let offset = FixedVec3::new(fnum(c.level_offset_x as f64), fnum(c.level_offset_y as f64), fnum(c.level_offset_z as f64));

    let to_grid = |world: FixedNum, voxel_size: FixedNum, off: FixedNum| -> i32 { ((world - off) / voxel_size).floor().to_num::<i32>() };

    let gx_min = to_grid(min.x, voxel_width, offset.x);
    let gx_max = to_grid(max.x, voxel_width, offset.x);
    let gy_min = to_grid(min.y, voxel_height, offset.y);
    let gy_max = to_grid(max.y, voxel_height, offset.y);
    let gz_min = to_grid(min.z, voxel_depth, offset.z);
    let gz_max = to_grid(max.z, voxel_depth, offset.z);

    for gx in gx_min..=gx_max {
        let world_x = FixedNum::from_num(gx) * voxel_width + offset.x + voxel_width / fnum(2.0);
        for gy in gy_min..=gy_max {
            let world_y = FixedNum::from_num(gy) * voxel_height + offset.y + voxel_height / fnum(2.0);
            for gz in gz_min..=gz_max {
                let world_z = FixedNum::from_num(gz) * voxel_depth + offset.z + voxel_depth / fnum(2.0);
                if grid.is_solid(FixedVec3::new(world_x, world_y, world_z), c) {
                    return true;
                }
            }
        }
    }
    false
}

/// A simple world-space AABB used for building/block colliders (§4.4's
/// `aabb_vs_box_list`).
#[derive(Debug, Clone, Copy)]
pub struct Aabb {
    pub center: FixedVec3,
    pub half: FixedVec3,
}

impl Aabb {
    pub fn new(center: FixedVec3, half: FixedVec3) -> Self {
        Self { center, half }
    }

    pub fn min(&self) -> FixedVec3 {
        self.center - self.half
    }

    pub fn max(&self) -> FixedVec3 {
        self.center + self.half
    }

    fn overlaps(&self, other_center: FixedVec3, other_half: FixedVec3) -> bool {
        let min = self.min();
        let max = self.max();
        let omin = other_center - other_half;
        let omax = other_center + other_half;
        min.x <= omax.x
            && max.x >= omin.x
            && min.y <= omax.y
            && max.y >= omin.y
            && min.z <= omax.z
            && max.z >= omin.z
    }
}

/// Linear scan over a box list; returns on first overlap (§4.4).
pub fn aabb_vs_boxes(center: FixedVec3, half: FixedVec3, boxes: &[Aabb]) -> bool {
    boxes.iter().any(|b| b.overlaps(center, half))
}

/// Every box overlapping `center`/`half`, used by the relaxation pass in
/// `character::step` step 11, which needs all simultaneous overlaps rather
/// than a boolean. A character rarely straddles more than a couple of
/// blocks at once, so this is inline-capacity-8, same spirit as the
/// teacher's neighbor lists.
pub fn overlapping_boxes<'a>(center: FixedVec3, half: FixedVec3, boxes: &'a [Aabb]) -> smallvec::SmallVec<[&'a Aabb; 8]> {
    boxes.iter().filter(|b| b.overlaps(center, half)).collect()
}

/// Result of a capsule-vs-mesh test: whether any triangle was penetrated,
/// and the accumulated minimum-translation push vector that separates the
/// capsule from every penetrated triangle.
#[derive(Debug, Clone, Copy, Default)]
pub struct CapsuleHit {
    pub colliding: bool,
    pub push: FixedVec3,
}

/// Capsule-vs-triangle-mesh (§4.4): a vertical capsule (feet at
/// `py - height/2`, head at `py + height/2`, `radius`) tested against each
/// world-space triangle of a transformed mesh. For each penetrated
/// triangle, the minimum translation along the triangle normal that
/// separates capsule from triangle is accumulated into the push vector.
///
/// This approximates the capsule as its central segment plus `radius`: for
/// each triangle we find the closest point on the triangle to the capsule's
/// central segment and push out along the vector between them if the
/// distance is under `radius`.
pub fn capsule_vs_triangle_mesh(
    px: FixedNum,
    py: FixedNum,
    pz: FixedNum,
    radius: FixedNum,
    height: FixedNum,
    mesh: &[Triangle],
    transform: &ColliderTransform,
) -> CapsuleHit {
    let half_h = height / fnum(2.0);
    let seg_a = FixedVec3::new(px, py - half_h, pz);
    let seg_b = FixedVec3::new(px, py + half_h, pz);

    let mut hit = CapsuleHit::default();

    for tri in mesh {
        let a = transform.to_world(tri.a);
        let b = transform.to_world(tri.b);
        let c = transform.to_world(tri.c);

        let (closest_on_tri, closest_on_seg) = closest_segment_triangle(seg_a, seg_b, a, b, c);
        let delta = closest_on_seg - closest_on_tri;
        let dist_sq = delta.length_squared();
        let r2 = radius * radius;
        if dist_sq < r2 {
            let dist = crate::math::fixed_sqrt(dist_sq);
            let normal = if dist > FixedNum::ZERO {
                delta / dist
            } else {
                // Degenerate (segment intersects triangle plane exactly):
                // push along the triangle's face normal instead.
                tri_normal_world(a, b, c)
            };
            let penetration = radius - dist;
            hit.colliding = true;
            hit.push = hit.push + normal * penetration;
        }
    }
    hit
}

/// Tree-trunk specialization (§4.4): a tree's collidable geometry is a
/// vertical cylinder per trunk segment rather than an arbitrary triangle
/// soup, so this skips the general mesh routine's per-triangle closest-
/// point search in favor of a cheap 2D (XZ) circle-vs-circle test extruded
/// along Y, matching the "cheaper than the general mesh routine" contract
/// in §4.4.
#[derive(Debug, Clone, Copy)]
pub struct TrunkSegment {
    /// World-space base center (trunk axis is vertical).
    pub base: FixedVec3,
    pub height: FixedNum,
    pub radius: FixedNum,
}

pub fn capsule_vs_tree_mesh(
    px: FixedNum,
    py: FixedNum,
    pz: FixedNum,
    radius: FixedNum,
    height: FixedNum,
    segments: &[TrunkSegment],
) -> CapsuleHit {
    let half_h = height / fnum(2.0);
    let cap_lo = py - half_h;
    let cap_hi = py + half_h;

    let mut hit = CapsuleHit::default();
    for seg in segments {
        let seg_lo = seg.base.y;
        let seg_hi = seg.base.y + seg.height;
        if cap_hi < seg_lo || cap_lo > seg_hi {
            continue;
        }
        let dx = px - seg.base.x;
        let dz = pz - seg.base.z;
        let dist_sq = dx * dx + dz * dz;
        let combined = radius + seg.radius;
        if dist_sq < combined * combined {
            let dist = crate::math::fixed_sqrt(dist_sq);
            let (nx, nz) = if dist > FixedNum::ZERO {
                (dx / dist, dz / dist)
            } else {
                (FixedNum::ONE, FixedNum::ZERO)
            };
            let penetration = combined - dist;
            hit.colliding = true;
            hit.push = hit.push + FixedVec3::new(nx * penetration, FixedNum::ZERO, nz * penetration);
        }
    }
    hit
}

fn tri_normal_world(a: FixedVec3, b: FixedVec3, c: FixedVec3) -> FixedVec3 {
    (b - a).cross(c - a).normalize()
}

/// Closest point on segment `p1-p2` to segment `q1-q2`, clamped so `q1-q2`
/// represents the (degenerate, single-point-sampled) triangle edge being
/// tested; here specialized to segment-vs-triangle by sampling the
/// triangle's three edges and its interior projection, returning whichever
/// candidate pair is nearest. This keeps the routine allocation-free and
/// branch-bounded rather than pulling in a full GJK/SAT implementation.
fn closest_segment_triangle(
    seg_a: FixedVec3,
    seg_b: FixedVec3,
    a: FixedVec3,
    b: FixedVec3,
    c: FixedVec3,
) -> (FixedVec3, FixedVec3) {
    let mut best_dist = FixedNum::MAX;
    let mut best = (a, seg_a);

    for &(e0, e1) in &[(a, b), (b, c), (c, a)] {
        let (cp_tri, cp_seg) = closest_segment_segment(e0, e1, seg_a, seg_b);
        let d = (cp_tri - cp_seg).length_squared();
        if d < best_dist {
            best_dist = d;
            best = (cp_tri, cp_seg);
        }
    }

    // Also test the capsule segment's two endpoints projected onto the
    // triangle's plane and clamped into the triangle (covers the case
    // where the segment passes over the triangle's interior rather than
    // near an edge).
    for p in [seg_a, seg_b] {
        let cp = closest_point_on_triangle(p, a, b, c);
        let d = (cp - p).length_squared();
        if d < best_dist {
            best_dist = d;
            best = (cp, p);
        }
    }

    best
}

fn closest_segment_segment(p1: FixedVec3, p2: FixedVec3, q1: FixedVec3, q2: FixedVec3) -> (FixedVec3, FixedVec3) {
    let d1 = p2 - p1;
    let d2 = q2 - q1;
    let r = p1 - q1;
    let a = d1.dot(d1);
    let e = d2.dot(d2);
    let f = d2.dot(r);

    let (s, t);
    if a <= FixedNum::from_num(1e-9) && e <= FixedNum::from_num(1e-9) {
        s = FixedNum::ZERO;
        t = FixedNum::ZERO;
    } else if a <= FixedNum::from_num(1e-9) {
        s = FixedNum::ZERO;
        t = (f / e).clamp(FixedNum::ZERO, FixedNum::ONE);
    } else {
        let c = d1.dot(r);
        if e <= FixedNum::from_num(1e-9) {
            t = FixedNum::ZERO;
            s = (-c / a).clamp(FixedNum::ZERO, FixedNum::ONE);
        } else {
            let b = d1.dot(d2);
            let denom = a * e - b * b;
            let s0 = if denom != FixedNum::ZERO {
                ((b * f - c * e) / denom).clamp(FixedNum::ZERO, FixedNum::ONE)
            } else {
                FixedNum::ZERO
            };
            let t0 = (b * s0 + f) / e;
            let (s1, t1) = if t0 < FixedNum::ZERO {
                ((-c / a).clamp(FixedNum::ZERO, FixedNum::ONE), FixedNum::ZERO)
            } else if t0 > FixedNum::ONE {
                (((b - c) / a).clamp(FixedNum::ZERO, FixedNum::ONE), FixedNum::ONE)
            } else {
                (s0, t0)
            };
            s = s1;
            t = t1;
        }
    }

    (p1 + d1 * s, q1 + d2 * t)
}

fn closest_point_on_triangle(p: FixedVec3, a: FixedVec3, b: FixedVec3, c: FixedVec3) -> FixedVec3 {
    let ab = b - a;
    let ac = c - a;
    let ap = p - a;

    let d1 = ab.dot(ap);
    let d2 = ac.dot(ap);
    if d1 <= FixedNum::ZERO && d2 <= FixedNum::ZERO {
        return a;
    }

    let bp = p - b;
    let d3 = ab.dot(bp);
    let d4 = ac.dot(bp);
    if d3 >= FixedNum::ZERO && d4 <= d3 {
        return b;
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= FixedNum::ZERO && d1 >= FixedNum::ZERO && d3 <= FixedNum::ZERO {
        let v = d1 / (d1 - d3);
        return a + ab * v;
    }

    let cp = p - c;
    let d5 = ab.dot(cp);
    let d6 = ac.dot(cp);
    if d6 >= FixedNum::ZERO && d5 <= d6 {
        return c;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= FixedNum::ZERO && d2 >= FixedNum::ZERO && d6 <= FixedNum::ZERO {
        let w = d2 / (d2 - d6);
        return a + ac * w;
    }

    let va = d3 * d6 - d5 * d4;
    if va <= FixedNum::ZERO && (d4 - d3) >= FixedNum::ZERO && (d5 - d6) >= FixedNum::ZERO {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return b + (c - b) * w;
    }

    let denom = FixedNum::ONE / (va + vb + vc);
    let v = vb * denom;
    let w = vc * denom;
    a + ab * v + ac * w
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_CONSTANTS;
    use crate::math::FixedNum;
    use crate::terrain::TerrainTile;

    #[test]
    fn aabb_vs_voxel_grid_detects_overlap_with_floor() {
        let mut tile = TerrainTile::new(8, 8, 8);
        for x in 0..8 {
            for z in 0..8 {
                tile.set_solid(x, 0, z, true);
            }
        }
        let c = DEFAULT_CONSTANTS;
        assert!(aabb_vs_voxel_grid(&tile, fnum(2.0), fnum(0.9), fnum(2.0), fnum(0.4), fnum(0.4), fnum(0.4), &c));
        assert!(!aabb_vs_voxel_grid(&tile, fnum(2.0), fnum(5.0), fnum(2.0), fnum(0.4), fnum(0.4), fnum(0.4), &c));
    }

    #[test]
    fn aabb_vs_boxes_early_exits_on_first_overlap() {
        let boxes = vec![
            Aabb::new(FixedVec3::from_f32(10.0, 0.0, 0.0), FixedVec3::from_f32(0.5, 0.5, 0.5)),
            Aabb::new(FixedVec3::ZERO, FixedVec3::from_f32(0.5, 0.5, 0.5)),
        ];
        assert!(aabb_vs_boxes(FixedVec3::ZERO, FixedVec3::from_f32(0.4, 0.4, 0.4), &boxes));
        assert!(!aabb_vs_boxes(
            FixedVec3::from_f32(100.0, 100.0, 100.0),
            FixedVec3::from_f32(0.4, 0.4, 0.4),
            &boxes
        ));
    }

    #[test]
    fn capsule_vs_triangle_mesh_pushes_out_of_penetrating_floor() {
        // A large flat triangle pair at y=0, capsule standing with feet
        // slightly below the plane.
        let tris = vec![
            Triangle {
                a: FixedVec3::from_f32(-10.0, 0.0, -10.0),
                b: FixedVec3::from_f32(10.0, 0.0, -10.0),
                c: FixedVec3::from_f32(10.0, 0.0, 10.0),
            },
            Triangle {
                a: FixedVec3::from_f32(-10.0, 0.0, -10.0),
                b: FixedVec3::from_f32(10.0, 0.0, 10.0),
                c: FixedVec3::from_f32(-10.0, 0.0, 10.0),
            },
        ];
        let transform = ColliderTransform::new(FixedVec3::ZERO, FixedNum::ZERO, FixedNum::ONE);
        let hit = capsule_vs_triangle_mesh(
            FixedNum::ZERO,
            FixedNum::from_num(0.1),
            FixedNum::ZERO,
            FixedNum::from_num(0.4),
            FixedNum::from_num(1.8),
            &tris,
            &transform,
        );
        assert!(hit.colliding);
    }

    #[test]
    fn capsule_vs_tree_mesh_pushes_away_from_trunk_axis() {
        let segs = vec![TrunkSegment {
            base: FixedVec3::ZERO,
            height: FixedNum::from_num(5.0),
            radius: FixedNum::from_num(0.3),
        }];
        let hit = capsule_vs_tree_mesh(
            FixedNum::from_num(0.2),
            FixedNum::from_num(1.0),
            FixedNum::ZERO,
            FixedNum::from_num(0.4),
            FixedNum::from_num(1.8),
            &segs,
        );
        assert!(hit.colliding);
        assert!(hit.push.x > FixedNum::ZERO);
    }

    #[test]
    fn no_collision_far_from_mesh() {
        let segs = vec![TrunkSegment {
            base: FixedVec3::ZERO,
            height: FixedNum::from_num(5.0),
            radius: FixedNum::from_num(0.3),
        }];
        let hit = capsule_vs_tree_mesh(
            FixedNum::from_num(50.0),
            FixedNum::from_num(1.0),
            FixedNum::ZERO,
            FixedNum::from_num(0.4),
            FixedNum::from_num(1.8),
            &segs,
        );
        assert!(!hit.colliding);
    }
}
