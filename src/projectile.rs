//! Projectile Engine (§4.6): swept, sub-stepped integration with per-tick
//! AABB hit tests against player hitboxes. A projectile is removed exactly
//! once, by lifetime expiry or by a single hit resolution (§8 property 7).

use crate::constants::Constants;
use crate::ecs::EntityId;
use crate::math::{fnum, FixedNum, FixedVec3};
use crate::spatial::ray_vs_aabb;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Projectile {
    pub owner: EntityId,
    pub dir: FixedVec3,
    pub speed: FixedNum,
    pub lifetime: FixedNum,
    pub pos: FixedVec3,
    pub vel_y: FixedNum,
    pub distance_traveled: FixedNum,
    pub gravity_start_distance: FixedNum,
    pub tick_counter: u64,
    pub last_collision_check_pos: FixedVec3,
}

impl Projectile {
    pub fn spawn(owner: EntityId, pos: FixedVec3, dir: FixedVec3, speed: FixedNum, lifetime: FixedNum, gravity_start_distance: FixedNum) -> Self {
        Self {
            owner,
            dir: dir.normalize(),
            speed,
            lifetime,
            pos,
            vel_y: FixedNum::ZERO,
            distance_traveled: FixedNum::ZERO,
            gravity_start_distance,
            tick_counter: 0,
            last_collision_check_pos: pos,
        }
    }
}

/// A candidate player hitbox to test against, per §4.6/§3: head box
/// (half 0.3, centered `+1.3` above body center) tested before the body
/// box (half `character_half_extent`).
#[derive(Debug, Clone, Copy)]
pub struct PlayerHitbox {
    pub entity: EntityId,
    pub body_center: FixedVec3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitPart {
    Head,
    Body,
}

#[derive(Debug, Clone, Copy)]
pub struct ProjectileHit {
    pub target: EntityId,
    pub part: HitPart,
}

/// Outcome of advancing one projectile by one tick.
#[derive(Debug, Clone, Copy)]
pub enum TickOutcome {
    Alive,
    Hit(ProjectileHit),
    Expired,
}

/// Advances `proj` by one tick, sub-stepping the swept segment between the
/// previous and new position and testing each candidate (skipping the
/// owner) head-first, then body, at every sub-step. The first hit across
/// every sub-step ends the projectile for this tick.
pub fn tick_projectile(proj: &mut Projectile, dt: FixedNum, candidates: &[PlayerHitbox], c: &Constants) -> TickOutcome {
    proj.lifetime -= dt;
    proj.tick_counter += 1;

    let prev_pos = proj.pos;

    if proj.distance_traveled > proj.gravity_start_distance {
        proj.vel_y += fnum(c.gravity as f64) * dt;
    }

    let horizontal_delta = proj.dir * (proj.speed * dt);
    let new_pos = FixedVec3::new(
        prev_pos.x + horizontal_delta.x,
        prev_pos.y + horizontal_delta.y + proj.vel_y * dt,
        prev_pos.z + horizontal_delta.z,
    );

    let substeps = c.projectile_substeps.max(1);
    let head_half = fnum(c.head_half_extent as f64);
    let head_offset = fnum(c.head_offset_y as f64);
    let body_half = fnum(c.character_half_extent as f64);

    for step in 1..=substeps {
        let t = fnum(step as f64) / fnum(substeps as f64);
        let sub_pos = prev_pos + (new_pos - prev_pos) * t;
        let seg = sub_pos - proj.last_collision_check_pos;
        let seg_len = seg.length();
        if seg_len == FixedNum::ZERO {
            continue;
        }
        let seg_dir = seg / seg_len;

        for candidate in candidates {
            if candidate.entity == proj.owner {
                continue;
            }
            let head_center = FixedVec3::new(candidate.body_center.x, candidate.body_center.y + head_offset, candidate.body_center.z);
            if ray_vs_aabb(
                proj.last_collision_check_pos,
                seg_dir,
                seg_len,
                head_center - FixedVec3::new(head_half, head_half, head_half),
                head_center + FixedVec3::new(head_half, head_half, head_half),
            )
            .is_some()
            {
                proj.last_collision_check_pos = sub_pos;
                proj.pos = sub_pos;
                return TickOutcome::Hit(ProjectileHit {
                    target: candidate.entity,
                    part: HitPart::Head,
                });
            }
            if ray_vs_aabb(
                proj.last_collision_check_pos,
                seg_dir,
                seg_len,
                candidate.body_center - FixedVec3::new(body_half, body_half, body_half),
                candidate.body_center + FixedVec3::new(body_half, body_half, body_half),
            )
            .is_some()
            {
                proj.last_collision_check_pos = sub_pos;
                proj.pos = sub_pos;
                return TickOutcome::Hit(ProjectileHit {
                    target: candidate.entity,
                    part: HitPart::Body,
                });
            }
        }
        proj.last_collision_check_pos = sub_pos;
    }

    proj.distance_traveled += (new_pos.horizontal() - prev_pos.horizontal()).length();
    proj.pos = new_pos;

    if proj.lifetime <= FixedNum::ZERO {
        TickOutcome::Expired
    } else {
        TickOutcome::Alive
    }
}

/// Rotates `base_dir` by a uniform cone angle in `[0, accuracy]` about a
/// perpendicular basis rotated by a uniform azimuth (§4.6 multi-pellet
/// spread). Must be implemented identically on both peers to keep visual
/// correspondence, so it draws only from the shared [`crate::math::SeedRng`].
pub fn spread_pellet_direction(base_dir: FixedVec3, accuracy: FixedNum, rng: &mut crate::math::SeedRng) -> FixedVec3 {
    let base_dir = base_dir.normalize();
    let cone_angle = rng.range(FixedNum::ZERO, accuracy);
    let azimuth = rng.range(FixedNum::ZERO, fnum(std::f64::consts::PI * 2.0));

    // Build an arbitrary perpendicular basis (u, v) to base_dir.
    let helper = if base_dir.x.abs() < fnum(0.9) {
        FixedVec3::new(FixedNum::ONE, FixedNum::ZERO, FixedNum::ZERO)
    } else {
        FixedVec3::new(FixedNum::ZERO, FixedNum::ONE, FixedNum::ZERO)
    };
    let u = base_dir.cross(helper).normalize();
    let v = base_dir.cross(u).normalize();

    let (sin_az, cos_az) = crate::math::trig::sin_cos(azimuth);
    let (sin_cone, cos_cone) = crate::math::trig::sin_cos(cone_angle);

    let perturbation = (u * cos_az + v * sin_az) * sin_cone;
    (base_dir * cos_cone + perturbation).normalize()
}

/// Small per-pellet horizontal jitter applied at spawn (§4.6).
pub fn pellet_spawn_jitter(rng: &mut crate::math::SeedRng, magnitude: FixedNum) -> FixedVec3 {
    FixedVec3::new(rng.range(-magnitude, magnitude), FixedNum::ZERO, rng.range(-magnitude, magnitude))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_CONSTANTS;
    use crate::math::SeedRng;

    #[test]
    fn projectile_expires_exactly_once_by_lifetime() {
        let c = DEFAULT_CONSTANTS;
        let mut proj = Projectile::spawn(
            EntityId(0),
            FixedVec3::ZERO,
            FixedVec3::new(FixedNum::ZERO, FixedNum::ZERO, FixedNum::ONE),
            fnum(1.0),
            fnum(0.01),
            fnum(c.default_gravity_start_distance as f64),
        );
        let outcome = tick_projectile(&mut proj, fnum(c.tick_dt as f64), &[], &c);
        assert!(matches!(outcome, TickOutcome::Expired));
    }

    #[test]
    fn head_hit_priority_over_body_on_same_tick() {
        let c = DEFAULT_CONSTANTS;
        let target = PlayerHitbox {
            entity: EntityId(1),
            body_center: FixedVec3::new(FixedNum::ZERO, fnum(1.0), fnum(5.0)),
        };
        let mut proj = Projectile::spawn(
            EntityId(0),
            FixedVec3::new(FixedNum::ZERO, fnum(1.3), FixedNum::ZERO),
            FixedVec3::new(FixedNum::ZERO, FixedNum::ZERO, FixedNum::ONE),
            fnum(40.0),
            fnum(5.0),
            fnum(c.default_gravity_start_distance as f64),
        );
        let outcome = tick_projectile(&mut proj, fnum(c.tick_dt as f64), std::slice::from_ref(&target), &c);
        match outcome {
            TickOutcome::Hit(hit) => {
                assert_eq!(hit.target, target.entity);
                assert_eq!(hit.part, HitPart::Head);
            }
            other => panic!("expected a head hit, got {other:?}"),
        }
    }

    #[test]
    fn owner_is_skipped() {
        let c = DEFAULT_CONSTANTS;
        let owner_id = EntityId(0);
        let target = PlayerHitbox {
            entity: owner_id,
            body_center: FixedVec3::new(FixedNum::ZERO, fnum(1.0), fnum(1.0)),
        };
        let mut proj = Projectile::spawn(
            owner_id,
            FixedVec3::ZERO,
            FixedVec3::new(FixedNum::ZERO, FixedNum::ZERO, FixedNum::ONE),
            fnum(40.0),
            fnum(5.0),
            fnum(c.default_gravity_start_distance as f64),
        );
        let outcome = tick_projectile(&mut proj, fnum(c.tick_dt as f64), std::slice::from_ref(&target), &c);
        assert!(matches!(outcome, TickOutcome::Alive));
    }

    #[test]
    fn pellet_spread_stays_within_cone_and_unit_length() {
        let mut rng = SeedRng::new("pellet-test");
        let base = FixedVec3::new(FixedNum::ZERO, FixedNum::ZERO, FixedNum::ONE);
        let accuracy = fnum(0.1);
        let mut angle_sum = 0.0f64;
        let n = 200;
        for _ in 0..n {
            let dir = spread_pellet_direction(base, accuracy, &mut rng);
            let len = dir.length().to_num::<f64>();
            assert!((len - 1.0).abs() < 1e-3);
            let cos_angle = dir.dot(base).to_num::<f64>().clamp(-1.0, 1.0);
            let angle = cos_angle.acos();
            assert!(angle <= 0.1 + 1e-3);
            angle_sum += angle;
        }
        let mean = angle_sum / n as f64;
        assert!((0.02..=0.07).contains(&mean), "mean angle {mean} out of expected band");
    }
}
