//! `redoubt_core` — the deterministic simulation substrate shared by an
//! authoritative server and a predicting client: character physics and
//! collision, spatial indexing, the ECS world and tick loop, projectile
//! integration, the voxel building model, and the client prediction /
//! reconciliation protocol. No rendering, audio, asset loading, transport
//! framing, or persistence lives here — those are external collaborators
//! consumed only through the interfaces this crate exposes.

pub mod building;
pub mod character;
pub mod colliders;
pub mod collision;
pub mod config;
pub mod constants;
pub mod ecs;
pub mod error;
pub mod items;
pub mod logging;
pub mod math;
pub mod prediction;
pub mod projectile;
pub mod protocol;
pub mod spatial;
pub mod terrain;
pub mod tick;
pub mod transport;

// ============================================================================
// Profiling Macros
// ============================================================================

/// Conditionally log a tick-scoped message every 100 ticks when the
/// `perf_stats` feature is enabled; compiles to nothing (arguments included)
/// otherwise.
#[macro_export]
#[cfg(feature = "perf_stats")]
macro_rules! profile_log {
    ($tick:expr, $($arg:tt)*) => {
        if $tick % 100 == 0 {
            tracing::debug!($($arg)*);
        }
    };
}

#[macro_export]
#[cfg(not(feature = "perf_stats"))]
macro_rules! profile_log {
    ($tick:expr, $($arg:tt)*) => {};
}
