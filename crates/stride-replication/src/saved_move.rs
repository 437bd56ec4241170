//! Saved moves: one tick's captured input+state snapshot, replayable.
//!
//! Captured values are normalized through the wire quantization at capture
//! time, so replaying a stored move and re-simulating its decoded wire form
//! are bit-identical — the core requirement for client/server convergence.

use glam::Vec3;
use stride_movement::{ActorMotionState, CapsuleFrame, MoveInput, MovementMode, RootMotion};
use stride_net::{
    MoveFlags, QuantVec10, QuantVec100, WireBase, compress_angle_byte, decompress_angle_byte,
};

/// Immutable-after-capture record of one simulated input tick.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedMove {
    /// Client timestamp, seconds.
    pub timestamp: f32,
    /// Tick duration used for the local simulation. Not transmitted; the
    /// server derives it from timestamp deltas.
    pub delta_time: f32,
    /// Input acceleration, quantization-normalized.
    pub acceleration: Vec3,
    /// Capsule location at move start.
    pub capsule_loc: Vec3,
    /// Capsule location after the move was simulated.
    pub client_loc: Vec3,
    /// Externally tracked capsule displacement, quantization-normalized.
    pub frame_diff: Vec3,
    /// Path-following requested velocity, if any.
    pub requested_velocity: Option<Vec3>,
    /// Capsule yaw in degrees, quantization-normalized.
    pub capsule_yaw: f32,
    /// Compressed input flags.
    pub flags: MoveFlags,
    /// Capsule roll in degrees, quantization-normalized.
    pub capsule_roll: f32,
    /// View yaw in degrees.
    pub view_yaw: f32,
    /// View pitch in degrees.
    pub view_pitch: f32,
    /// Movement base at capture, if any.
    pub base: Option<WireBase>,
    /// Movement mode at capture.
    pub mode: MovementMode,
    /// Root motion carried by this move, if any.
    pub root_motion: Option<RootMotion>,
}

impl Default for SavedMove {
    fn default() -> Self {
        Self {
            timestamp: 0.0,
            delta_time: 0.0,
            acceleration: Vec3::ZERO,
            capsule_loc: Vec3::ZERO,
            client_loc: Vec3::ZERO,
            frame_diff: Vec3::ZERO,
            requested_velocity: None,
            capsule_yaw: 0.0,
            flags: MoveFlags::default(),
            capsule_roll: 0.0,
            view_yaw: 0.0,
            view_pitch: 0.0,
            base: None,
            mode: MovementMode::default(),
            root_motion: None,
        }
    }
}

/// Normalizes an angle through its one-byte wire form.
fn normalize_angle(degrees: f32) -> f32 {
    decompress_angle_byte(compress_angle_byte(degrees))
}

impl SavedMove {
    /// Resets all fields to identity/zero.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Captures the actor's capsule-relative location, rotation, and
    /// requested velocity at move-creation time. Never mutates the actor.
    pub fn set_initial_position(&mut self, state: &ActorMotionState, frame: &CapsuleFrame) {
        self.capsule_loc = frame.location;
        self.capsule_yaw = normalize_angle(frame.yaw);
        self.capsule_roll = normalize_angle(state.rotation.roll);
        self.view_yaw = state.rotation.yaw;
        self.view_pitch = state.rotation.pitch;
        self.base = state.base.as_ref().map(|base| WireBase {
            net_id: base.net_id,
            bone: base.bone.clone(),
        });
        self.mode = state.mode;
    }

    /// Builds a complete record from the actor state and this tick's input.
    ///
    /// Lossy wire fields are normalized through their quantization here, so
    /// the local simulation runs on exactly the values the server will
    /// decode.
    pub fn capture(
        timestamp: f32,
        delta_time: f32,
        input: &MoveInput,
        flags: MoveFlags,
        state: &ActorMotionState,
        frame: &CapsuleFrame,
    ) -> Self {
        let mut mv = Self::default();
        mv.set_initial_position(state, frame);
        mv.timestamp = timestamp;
        mv.delta_time = delta_time;
        mv.acceleration = QuantVec10::from_vec3(input.acceleration).to_vec3();
        mv.frame_diff = QuantVec100::from_vec3(input.tracked_delta).to_vec3();
        mv.requested_velocity = input
            .requested_velocity
            .map(|v| QuantVec100::from_vec3(v).to_vec3());
        mv.capsule_yaw = normalize_angle(input.yaw);
        mv.flags = flags;
        mv.root_motion = input.root_motion.map(|rm| RootMotion {
            translation: QuantVec100::from_vec3(rm.translation).to_vec3(),
            yaw: normalize_angle(rm.yaw),
        });
        mv
    }

    /// Records the post-simulation result. Called once, right after the
    /// local simulation of this move.
    pub fn post_update(&mut self, frame: &CapsuleFrame) {
        self.client_loc = frame.location;
    }

    /// Rebuilds the engine input for replay. Must match what the server
    /// decodes from this move's wire form.
    pub fn to_input(&self) -> MoveInput {
        MoveInput {
            acceleration: self.acceleration,
            tracked_delta: self.frame_diff,
            yaw: self.capsule_yaw,
            jump: self.flags.jump(),
            requested_velocity: self.requested_velocity,
            root_motion: self.root_motion,
        }
    }

    /// Combinability predicate consumed by the move combiner.
    ///
    /// Two consecutive moves may share a dual packet only when nothing the
    /// dual form drops for the older move differs between them: movement
    /// mode, movement base, input flags, and requested-move state. Root
    /// motion never combines into a plain dual — a root-motion move can only
    /// ride the hybrid form, and never downgrades.
    pub fn can_combine_with(&self, newer: &SavedMove) -> bool {
        if self.root_motion.is_some() || newer.root_motion.is_some() {
            return false;
        }
        self.mode == newer.mode
            && self.base == newer.base
            && self.flags == newer.flags
            && self.requested_velocity.is_some() == newer.requested_velocity.is_some()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
