//! The only seam the core has to a real network stack (§6, §9: transport
//! framing and session/lobby management are external collaborators). No
//! concrete transport ships here — a real implementation sits outside the
//! core; an in-memory stand-in lives under `tests/` for integration tests.

/// Opaque per-connection identity; the core never interprets this beyond
/// equality/hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(pub u64);

/// The two message priorities §6 requires: `High` (unreliable-ordered,
/// inputs and transform snapshots) and `Low` (reliable-ordered,
/// lifecycle/equipment/building/item/chat).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    High,
    Low,
}

/// Non-blocking message drain/send surface. All methods are `try_*` —
/// `step`, collision, octree, and projectile code never call through this
/// trait; only the tick loop's message-drain and broadcast phases do
/// (§5: "suspension points: none inside `step` ... the tick loop suspends
/// only for incoming message drains and outgoing broadcast hand-offs").
pub trait Transport {
    fn try_recv_high(&mut self) -> Option<(PeerId, Vec<u8>)>;
    fn try_recv_low(&mut self) -> Option<(PeerId, Vec<u8>)>;
    fn send_high(&mut self, peer: PeerId, bytes: &[u8]);
    fn send_low(&mut self, peer: PeerId, bytes: &[u8]);
    fn broadcast_high(&mut self, bytes: &[u8]);
    fn broadcast_low(&mut self, bytes: &[u8]);
}
