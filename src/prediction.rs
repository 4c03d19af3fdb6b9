//! Client Prediction & Reconciliation (§4.11): the predicting peer replays
//! buffered inputs against an authoritative snapshot, absorbing the
//! residual as a decaying visual offset. Remote players are interpolated
//! rather than predicted.

use crate::character::{step as character_step, CharacterInput, CharacterState, StepColliders};
use crate::constants::Constants;
use crate::math::{fnum, FixedNum, FixedVec3};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy)]
struct BufferedInput {
    sequence: u64,
    input: CharacterInput,
}

/// Bounded ring of `{sequence, input}` pairs (§4.11 step (b), default
/// capacity 64 per the Open Question — see DESIGN.md).
pub struct PredictionBuffer {
    capacity: usize,
    entries: VecDeque<BufferedInput>,
}

impl PredictionBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, sequence: u64, input: CharacterInput) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(BufferedInput { sequence, input });
    }

    /// §4.11 reconciliation step 1: prune every entry with
    /// `sequence <= last_processed`.
    pub fn prune_up_to(&mut self, last_processed: u64) {
        self.entries.retain(|e| e.sequence > last_processed);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Local-player prediction state: the authoritative-replay state plus the
/// decaying visual error offset and interpolation anchor used for
/// rendering (§4.11).
pub struct LocalPrediction {
    pub state: CharacterState,
    pub prev: CharacterState,
    pub buffer: PredictionBuffer,
    pub visual_error_offset: FixedVec3,
    next_sequence: u64,
}

impl LocalPrediction {
    pub fn new(initial: CharacterState, buffer_capacity: usize) -> Self {
        Self {
            state: initial,
            prev: initial,
            buffer: PredictionBuffer::new(buffer_capacity),
            visual_error_offset: FixedVec3::ZERO,
            next_sequence: 1,
        }
    }

    /// Runs one local tick: saves `prev`, buffers the input under a fresh
    /// sequence, and replays `step` (§4.11 (a)-(c)). Returns the sequence
    /// assigned to this input, for the caller to attach to the outgoing
    /// `Input` message.
    pub fn tick(&mut self, input: CharacterInput, dt: FixedNum, c: &Constants, colliders: &StepColliders) -> u64 {
        self.prev = self.state;
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.buffer.push(sequence, input);
        character_step(&mut self.state, &input, dt, c, colliders);
        sequence
    }

    /// Decays the visual error offset toward zero with an exponential
    /// half-life (§4.11: "~100 ms half-life"). Called once per render
    /// frame with the elapsed wall-clock time.
    pub fn decay_visual_offset(&mut self, elapsed_secs: FixedNum, half_life_ms: f32) {
        if self.visual_error_offset == FixedVec3::ZERO {
            return;
        }
        let half_life = fnum((half_life_ms / 1000.0) as f64);
        if half_life <= FixedNum::ZERO {
            self.visual_error_offset = FixedVec3::ZERO;
            return;
        }
        // factor = 0.5^(elapsed / half_life), evaluated via repeated
        // halving rather than a fractional exponent (no pow on FixedNum).
        let halvings = (elapsed_secs / half_life).to_num::<f64>();
        let factor = 0.5f64.powf(halvings);
        self.visual_error_offset = self.visual_error_offset * fnum(factor);
    }

    /// Render-time position: `lerp(prev, state, alpha) + visual_error_offset`,
    /// with the asymmetric vertical rule from §4.11 ("going down follows
    /// instantly, going up rises at <= 4 u/s").
    pub fn render_position(&self, alpha: FixedNum, max_rise_per_sec: FixedNum, frame_dt: FixedNum, rendered_prev_y: FixedNum) -> FixedVec3 {
        let lerp_xz = FixedVec3::new(
            lerp(self.prev.pos.x, self.state.pos.x, alpha),
            FixedNum::ZERO,
            lerp(self.prev.pos.z, self.state.pos.z, alpha),
        );
        let target_y = lerp(self.prev.pos.y, self.state.pos.y, alpha);
        let y = if target_y <= rendered_prev_y {
            target_y
        } else {
            let max_delta = max_rise_per_sec * frame_dt;
            (rendered_prev_y + max_delta).min(target_y)
        };
        FixedVec3::new(lerp_xz.x + self.visual_error_offset.x, y + self.visual_error_offset.y, lerp_xz.z + self.visual_error_offset.z)
    }

    /// §4.11 "On receiving an authoritative snapshot", steps 1-5.
    pub fn reconcile(
        &mut self,
        snapshot_pos: FixedVec3,
        snapshot_vel: FixedVec3,
        snapshot_water_depth: FixedNum,
        snapshot_stamina: Option<FixedNum>,
        last_processed_input: u64,
        dt: FixedNum,
        c: &Constants,
        colliders: &StepColliders,
        hard_snap_distance: FixedNum,
    ) {
        // 1. Prune.
        self.buffer.prune_up_to(last_processed_input);

        // 2. Record old predicted position.
        let old_predicted = self.state.pos;

        // 3. Overwrite position/velocity/water/stamina; yaw/pitch untouched.
        self.state.pos = snapshot_pos;
        self.state.vel = snapshot_vel;
        self.state.water_depth = snapshot_water_depth;
        let _ = snapshot_stamina; // stamina lives on a separate component owned by the caller.

        // 4. Replay every remaining buffered input.
        let replay: Vec<BufferedInput> = self.buffer.entries.iter().copied().collect();
        for entry in &replay {
            character_step(&mut self.state, &entry.input, dt, c, colliders);
        }

        // 5. Compute delta and either hard-snap or absorb into the offset.
        let new_predicted = self.state.pos;
        let delta = old_predicted - new_predicted;
        if delta.length() > hard_snap_distance {
            self.visual_error_offset = FixedVec3::ZERO;
            self.prev = self.state;
        } else {
            self.visual_error_offset = self.visual_error_offset + delta;
        }
    }
}

fn lerp(a: FixedNum, b: FixedNum, t: FixedNum) -> FixedNum {
    a + (b - a) * t
}

/// Remote-player interpolation (§4.11): quat slerp + vec lerp from `prev`
/// to `target` over a fixed window; large deltas snap instead of
/// interpolating through an implausible path.
pub struct RemoteInterpolation {
    pub prev_pos: FixedVec3,
    pub target_pos: FixedVec3,
    pub prev_yaw: FixedNum,
    pub target_yaw: FixedNum,
    pub head_pitch: FixedNum,
    elapsed: FixedNum,
    window: FixedNum,
}

impl RemoteInterpolation {
    pub fn new(initial_pos: FixedVec3, initial_yaw: FixedNum, window_ms: f32) -> Self {
        Self {
            prev_pos: initial_pos,
            target_pos: initial_pos,
            prev_yaw: initial_yaw,
            target_yaw: initial_yaw,
            head_pitch: FixedNum::ZERO,
            elapsed: FixedNum::ZERO,
            window: fnum((window_ms / 1000.0) as f64),
        }
    }

    /// Receives a new authoritative transform; large deltas snap rather
    /// than interpolate.
    pub fn on_snapshot(&mut self, pos: FixedVec3, yaw: FixedNum, head_pitch: FixedNum, snap_distance: FixedNum) {
        let current = self.sample();
        self.prev_pos = if (pos - current).length() > snap_distance { pos } else { current };
        self.target_pos = pos;
        self.prev_yaw = yaw;
        self.target_yaw = yaw;
        self.head_pitch = head_pitch;
        self.elapsed = FixedNum::ZERO;
    }

    pub fn advance(&mut self, dt: FixedNum) {
        self.elapsed = (self.elapsed + dt).min(self.window);
    }

    fn alpha(&self) -> FixedNum {
        if self.window <= FixedNum::ZERO {
            FixedNum::ONE
        } else {
            (self.elapsed / self.window).min(FixedNum::ONE)
        }
    }

    pub fn sample(&self) -> FixedVec3 {
        let a = self.alpha();
        FixedVec3::new(
            lerp(self.prev_pos.x, self.target_pos.x, a),
            lerp(self.prev_pos.y, self.target_pos.y, a),
            lerp(self.prev_pos.z, self.target_pos.z, a),
        )
    }

    pub fn sample_yaw(&self) -> FixedNum {
        lerp(self.prev_yaw, self.target_yaw, self.alpha())
    }
}

/// Pairs locally-predicted projectile ids (negative, client-only) with
/// server-assigned ids from the same owner, in spawn order (§4.6
/// "Predicted projectiles"). Destroying the server id removes the paired
/// local visual.
#[derive(Default)]
pub struct PredictedProjectilePairing {
    /// FIFO of unpaired locally-predicted ids per owner.
    pending: std::collections::HashMap<crate::ecs::EntityId, VecDeque<i64>>,
    paired: std::collections::HashMap<i64, i64>,
}

impl PredictedProjectilePairing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_local(&mut self, owner: crate::ecs::EntityId, local_id: i64) {
        self.pending.entry(owner).or_default().push_back(local_id);
    }

    /// Pairs the oldest unpaired local id for `owner` with `server_id`.
    /// Returns the paired local id, if any was pending.
    pub fn pair_server_spawn(&mut self, owner: crate::ecs::EntityId, server_id: i64) -> Option<i64> {
        let local_id = self.pending.get_mut(&owner)?.pop_front()?;
        self.paired.insert(server_id, local_id);
        Some(local_id)
    }

    /// On `ProjectileDestroy(server_id)`, returns the paired local id to
    /// remove from the client's visual projectile list, if one exists.
    pub fn on_server_destroy(&mut self, server_id: i64) -> Option<i64> {
        self.paired.remove(&server_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_CONSTANTS;

    fn idle_input() -> CharacterInput {
        CharacterInput {
            forward: 0,
            right: 0,
            camera_yaw: FixedNum::ZERO,
            camera_pitch: FixedNum::ZERO,
            jump: false,
            sprint: false,
            dive: false,
        }
    }

    #[test]
    fn small_reconciliation_delta_is_absorbed_not_snapped() {
        let c = DEFAULT_CONSTANTS;
        let initial = CharacterState::spawn_at(FixedVec3::from_f32(1.0, 5.0, 0.0), &c);
        let mut pred = LocalPrediction::new(initial, 64);
        pred.state.pos = FixedVec3::from_f32(1.0, 5.0, 0.0);

        let colliders = StepColliders::none();
        pred.reconcile(
            FixedVec3::from_f32(1.003, 5.0, 0.0),
            FixedVec3::ZERO,
            FixedNum::ZERO,
            None,
            0,
            fnum(c.tick_dt as f64),
            &c,
            &colliders,
            fnum(c.reconciliation_hard_snap_distance as f64),
        );

        // Delta magnitude ~0.003, well under the hard-snap threshold.
        assert!(pred.visual_error_offset.length() > FixedNum::ZERO);
        assert!(pred.visual_error_offset.length() < fnum(0.01));
    }

    #[test]
    fn large_reconciliation_delta_hard_snaps() {
        let c = DEFAULT_CONSTANTS;
        let initial = CharacterState::spawn_at(FixedVec3::from_f32(0.0, 5.0, 0.0), &c);
        let mut pred = LocalPrediction::new(initial, 64);
        pred.state.pos = FixedVec3::from_f32(100.0, 5.0, 0.0);

        let colliders = StepColliders::none();
        pred.reconcile(
            FixedVec3::from_f32(0.0, 5.0, 0.0),
            FixedVec3::ZERO,
            FixedNum::ZERO,
            None,
            0,
            fnum(c.tick_dt as f64),
            &c,
            &colliders,
            fnum(c.reconciliation_hard_snap_distance as f64),
        );
        assert_eq!(pred.visual_error_offset, FixedVec3::ZERO);
    }

    #[test]
    fn visual_offset_decays_below_one_millimeter_within_five_half_lives() {
        let mut pred = LocalPrediction::new(CharacterState::spawn_at(FixedVec3::ZERO, &DEFAULT_CONSTANTS), 64);
        pred.visual_error_offset = FixedVec3::from_f32(0.1, 0.0, 0.0);
        // 5 half-lives at 100ms = 500ms.
        pred.decay_visual_offset(fnum(0.5), 100.0);
        assert!(pred.visual_error_offset.length() < fnum(0.001));
    }

    #[test]
    fn buffer_prunes_processed_sequences() {
        let mut buf = PredictionBuffer::new(64);
        for seq in 1..=10u64 {
            buf.push(seq, idle_input());
        }
        buf.prune_up_to(7);
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn buffer_is_bounded_at_capacity() {
        let mut buf = PredictionBuffer::new(4);
        for seq in 1..=10u64 {
            buf.push(seq, idle_input());
        }
        assert_eq!(buf.len(), 4);
    }

    #[test]
    fn predicted_projectile_pairs_oldest_first() {
        let mut pairing = PredictedProjectilePairing::new();
        let owner = crate::ecs::EntityId(1);
        pairing.register_local(owner, -1);
        pairing.register_local(owner, -2);

        let paired_a = pairing.pair_server_spawn(owner, 100).unwrap();
        assert_eq!(paired_a, -1);
        let paired_b = pairing.pair_server_spawn(owner, 101).unwrap();
        assert_eq!(paired_b, -2);

        assert_eq!(pairing.on_server_destroy(100), Some(-1));
        assert_eq!(pairing.on_server_destroy(100), None);
    }

    #[test]
    fn remote_interpolation_snaps_on_large_delta() {
        let mut interp = RemoteInterpolation::new(FixedVec3::ZERO, FixedNum::ZERO, 50.0);
        interp.on_snapshot(FixedVec3::from_f32(500.0, 0.0, 0.0), FixedNum::ZERO, FixedNum::ZERO, fnum(10.0));
        assert_eq!(interp.prev_pos, FixedVec3::from_f32(500.0, 0.0, 0.0));
    }
}
