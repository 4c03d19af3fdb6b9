//! Deterministic fixed-point math shared by server and client.
//!
//! Every number that feeds into `character::step`, the collision primitives,
//! the octree, or the projectile integrator is a [`FixedNum`], never an
//! `f32`/`f64`. Floating point arithmetic is not guaranteed bit-identical
//! across CPUs/compilers; `fixed`'s `I48F16` is. This is critical for
//! multiplayer lockstep networking where all peers must simulate
//! identically from the same seed and input sequence.

mod rng;
pub mod trig;
mod vec3;

pub use rng::SeedRng;
pub use vec3::{fixed_sqrt, FixedVec3};

use fixed::types::I48F16;

/// The one fixed-point numeric type used throughout the simulation core.
/// 48 integer bits, 16 fractional bits — ample range for a ±270 m world
/// with sub-millimeter precision.
pub type FixedNum = I48F16;

/// Convenience constructor, mirrors `FixedNum::from_num` but reads better
/// at call sites full of literals.
#[inline]
pub fn fnum(v: f64) -> FixedNum {
    FixedNum::from_num(v)
}
