//! Error taxonomy for the handful of fallible entry points into the core.
//!
//! `character::step`, the collision primitives, and the octree queries are
//! infallible by design (§4.5, §5) and do not appear here. `SimError`
//! covers the mutation entry points described in §7: building edits, item
//! pickups, and protocol message application. None of these are retried;
//! the policy for each variant is fixed by the design and implemented at
//! the call site, not inside this enum.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimError {
    /// Bad sequence number, out-of-range input fields. Policy: drop, log once.
    InvalidInput(&'static str),
    /// Non-owner editing a building; pickup of an unknown id. Policy: silently ignore.
    UnauthorizedAction(&'static str),
    /// Place without materials, reload while full. Policy: no-op.
    ResourceConstraint(&'static str),
    /// Snapshot or message refers to an unknown id. Policy: ignore.
    EntityNotFound(&'static str),
    /// `|reconciliation delta| > hard-snap distance`. Policy: hard snap.
    DesyncBeyondThreshold,
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            SimError::UnauthorizedAction(msg) => write!(f, "unauthorized action: {msg}"),
            SimError::ResourceConstraint(msg) => write!(f, "resource constraint: {msg}"),
            SimError::EntityNotFound(msg) => write!(f, "entity not found: {msg}"),
            SimError::DesyncBeyondThreshold => write!(f, "reconciliation desync beyond threshold"),
        }
    }
}

impl std::error::Error for SimError {}
