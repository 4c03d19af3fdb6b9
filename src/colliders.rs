//! Immutable static collider meshes for rocks and trees (§3 "Static
//! Collider Meshes"). The core never builds these meshes — a procedural
//! generator outside the core scope produces the triangle soup and the
//! placement transform; the core stores them and hands them to the
//! collision primitives in [`crate::collision`].

use crate::math::FixedVec3;

/// A single triangle in mesh-local space.
#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    pub a: FixedVec3,
    pub b: FixedVec3,
    pub c: FixedVec3,
}

impl Triangle {
    pub fn normal(&self) -> FixedVec3 {
        (self.b - self.a).cross(self.c - self.a).normalize()
    }
}

/// Translation, yaw (radians, about Y), and uniform scale — the only
/// transform degrees of freedom static colliders use.
#[derive(Debug, Clone, Copy)]
pub struct ColliderTransform {
    pub translation: FixedVec3,
    pub yaw: FixedVec3, // yaw carried as a FixedNum in .x, rest unused; kept as FixedVec3 for uniform storage.
    pub scale: crate::math::FixedNum,
}

impl ColliderTransform {
    pub fn new(translation: FixedVec3, yaw: crate::math::FixedNum, scale: crate::math::FixedNum) -> Self {
        Self {
            translation,
            yaw: FixedVec3::new(yaw, crate::math::FixedNum::ZERO, crate::math::FixedNum::ZERO),
            scale,
        }
    }

    pub fn yaw_value(&self) -> crate::math::FixedNum {
        self.yaw.x
    }

    /// World-space point from a mesh-local point: scale, yaw-rotate about
    /// Y, then translate. Uses the same `trig::sin_cos` lookup the
    /// character controller's camera-relative basis (§4.5 step 2) builds
    /// its rotation from, so every yaw rotation in the crate resolves
    /// bit-identically regardless of platform.
    pub fn to_world(&self, local: FixedVec3) -> FixedVec3 {
        let scaled = local * self.scale;
        let (sin_y, cos_y) = crate::math::trig::sin_cos(self.yaw_value());
        let rotated = FixedVec3::new(
            scaled.x * cos_y + scaled.z * sin_y,
            scaled.y,
            -scaled.x * sin_y + scaled.z * cos_y,
        );
        rotated + self.translation
    }
}

/// A placed static collider: an immutable mesh plus the transform that
/// positions it in the world, and the kind tag the octree stores entries
/// under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColliderKind {
    Rock,
    Tree,
}

#[derive(Debug, Clone)]
pub struct StaticCollider {
    pub kind: ColliderKind,
    pub mesh: std::sync::Arc<Vec<Triangle>>,
    pub transform: ColliderTransform,
}

impl StaticCollider {
    /// Conservative world-space AABB covering every transformed vertex;
    /// used to build the octree entry.
    pub fn world_aabb(&self) -> (FixedVec3, FixedVec3) {
        let mut min = FixedVec3::new(
            crate::math::FixedNum::MAX,
            crate::math::FixedNum::MAX,
            crate::math::FixedNum::MAX,
        );
        let mut max = FixedVec3::new(
            crate::math::FixedNum::MIN,
            crate::math::FixedNum::MIN,
            crate::math::FixedNum::MIN,
        );
        for tri in self.mesh.iter() {
            for v in [tri.a, tri.b, tri.c] {
                let w = self.transform.to_world(v);
                min.x = min.x.min(w.x);
                min.y = min.y.min(w.y);
                min.z = min.z.min(w.z);
                max.x = max.x.max(w.x);
                max.y = max.y.max(w.y);
                max.z = max.z.max(w.z);
            }
        }
        (min, max)
    }
}
