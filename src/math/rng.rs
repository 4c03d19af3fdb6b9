//! Deterministic, explicit-state pseudo-random number generator.
//!
//! No global state: every generator is created from a seed and threaded
//! through explicitly, so the same seed and draw sequence always produce
//! the same numbers on every peer. Used for shotgun pellet spread and
//! consumable respawn point selection — anywhere the spec requires both
//! sides to agree on "random" choices.

use super::FixedNum;

/// Multiplicative string hash: fold-xor over char codes into a 32-bit
/// accumulator, then take the absolute value. This is the seed hash
/// contract from the component design — any two implementations hashing
/// the same string must agree bit for bit.
pub fn hash_seed(seed: &str) -> u32 {
    let mut acc: i32 = 0;
    for ch in seed.chars() {
        acc = acc.wrapping_mul(31) ^ (ch as i32);
    }
    acc.unsigned_abs()
}

/// A simple, explicit-state linear congruential generator. Parameters
/// match the well-known Numerical Recipes constants, chosen for a long
/// period and cheap 64-bit multiply/add — no external `rand` crate is
/// used, since this generator's exact algorithm, not merely "some PRNG",
/// is part of the determinism contract between client and server.
#[derive(Debug, Clone, Copy)]
pub struct SeedRng {
    state: u64,
}

impl SeedRng {
    pub fn new(seed: &str) -> Self {
        Self::from_u32(hash_seed(seed))
    }

    pub fn from_u32(seed: u32) -> Self {
        Self {
            state: (seed as u64) ^ 0x9E3779B97F4A7C15,
        }
    }

    fn next_u32(&mut self) -> u32 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.state >> 32) as u32
    }

    /// Uniform draw in `[0, 1)`.
    pub fn next(&mut self) -> FixedNum {
        let bits = self.next_u32();
        // Scale a 32-bit value into the fixed-point unit interval.
        FixedNum::from_num(bits) / FixedNum::from_num(u32::MAX as i64 + 1)
    }

    /// Uniform draw in `[a, b)`.
    pub fn range(&mut self, a: FixedNum, b: FixedNum) -> FixedNum {
        a + self.next() * (b - a)
    }

    /// Uniform integer draw in `[a, b]` inclusive.
    pub fn int(&mut self, a: i64, b: i64) -> i64 {
        if b <= a {
            return a;
        }
        let span = (b - a + 1) as u64;
        a + (self.next_u32() as u64 % span) as i64
    }
}
