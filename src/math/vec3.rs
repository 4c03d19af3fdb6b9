use super::FixedNum;
use serde::{Deserialize, Serialize};
use std::ops::{Add, Div, Mul, Neg, Sub};

/// A 3D vector over [`FixedNum`]. The fixed-point analogue of `Vec3`,
/// used everywhere the simulation core touches position/velocity/direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FixedVec3 {
    pub x: FixedNum,
    pub y: FixedNum,
    pub z: FixedNum,
}

impl FixedVec3 {
    pub const ZERO: FixedVec3 = FixedVec3 {
        x: FixedNum::ZERO,
        y: FixedNum::ZERO,
        z: FixedNum::ZERO,
    };

    pub fn new(x: FixedNum, y: FixedNum, z: FixedNum) -> Self {
        Self { x, y, z }
    }

    pub fn from_f32(x: f32, y: f32, z: f32) -> Self {
        Self {
            x: FixedNum::from_num(x),
            y: FixedNum::from_num(y),
            z: FixedNum::from_num(z),
        }
    }

    pub fn to_f32(self) -> (f32, f32, f32) {
        (self.x.to_num(), self.y.to_num(), self.z.to_num())
    }

    pub fn length_squared(self) -> FixedNum {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    /// Integer square root over the fixed-point representation. `fixed`
    /// has no native `sqrt`, so this uses a bit-doubling Newton iteration
    /// that is itself deterministic (no float fallback).
    pub fn length(self) -> FixedNum {
        fixed_sqrt(self.length_squared())
    }

    pub fn normalize(self) -> FixedVec3 {
        let len = self.length();
        if len == FixedNum::ZERO {
            FixedVec3::ZERO
        } else {
            FixedVec3::new(self.x / len, self.y / len, self.z / len)
        }
    }

    pub fn dot(self, other: FixedVec3) -> FixedNum {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(self, other: FixedVec3) -> FixedVec3 {
        FixedVec3::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// Horizontal (XZ) component only, as used by the character controller's
    /// ground-plane speed clamps.
    pub fn horizontal(self) -> FixedVec3 {
        FixedVec3::new(self.x, FixedNum::ZERO, self.z)
    }
}

impl Add for FixedVec3 {
    type Output = FixedVec3;
    fn add(self, rhs: FixedVec3) -> FixedVec3 {
        FixedVec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for FixedVec3 {
    type Output = FixedVec3;
    fn sub(self, rhs: FixedVec3) -> FixedVec3 {
        FixedVec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<FixedNum> for FixedVec3 {
    type Output = FixedVec3;
    fn mul(self, rhs: FixedNum) -> FixedVec3 {
        FixedVec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Div<FixedNum> for FixedVec3 {
    type Output = FixedVec3;
    fn div(self, rhs: FixedNum) -> FixedVec3 {
        FixedVec3::new(self.x / rhs, self.y / rhs, self.z / rhs)
    }
}

impl Neg for FixedVec3 {
    type Output = FixedVec3;
    fn neg(self) -> FixedVec3 {
        FixedVec3::new(-self.x, -self.y, -self.z)
    }
}

/// Deterministic fixed-point square root (Newton-Raphson from a bit-length
/// based seed estimate). Never calls into `f32`/`f64` sqrt so results are
/// bit-identical across platforms.
pub fn fixed_sqrt(v: FixedNum) -> FixedNum {
    if v <= FixedNum::ZERO {
        return FixedNum::ZERO;
    }
    // Seed the iteration with a power-of-two estimate derived from the
    // integer part's bit length, then refine.
    let mut x = if v > FixedNum::ONE { v } else { FixedNum::ONE };
    for _ in 0..24 {
        let next = (x + v / x) / FixedNum::from_num(2.0);
        if next == x {
            break;
        }
        x = next;
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_of_unit_axis_is_one() {
        let v = FixedVec3::new(FixedNum::ONE, FixedNum::ZERO, FixedNum::ZERO);
        assert_eq!(v.length(), FixedNum::ONE);
    }

    #[test]
    fn normalize_preserves_direction() {
        let v = FixedVec3::from_f32(3.0, 4.0, 0.0);
        let n = v.normalize();
        let len = n.length();
        assert!((len - FixedNum::ONE).abs() < FixedNum::from_num(0.001));
    }

    #[test]
    fn cross_of_orthonormal_axes() {
        let x = FixedVec3::from_f32(1.0, 0.0, 0.0);
        let y = FixedVec3::from_f32(0.0, 1.0, 0.0);
        let z = x.cross(y);
        assert_eq!(z, FixedVec3::from_f32(0.0, 0.0, 1.0));
    }
}
