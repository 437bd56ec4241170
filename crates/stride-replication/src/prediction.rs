//! Client-side prediction: capture, transmit, correction, and replay.
//!
//! The client simulates its own moves immediately and keeps every
//! unacknowledged [`SavedMove`] for replay. When the server corrects, the
//! client purges acknowledged moves, snaps to the authoritative state, and
//! deterministically re-simulates the remainder.

use std::collections::VecDeque;

use stride_collision::CollisionQuery;
use stride_config::{MovementConfig, NetworkConfig, PredictionConfig};
use stride_movement::{
    ActorMotionState, BaseRegistry, BaseReference, CapsuleFrame, FloorResult, MoveInput,
    MovementMode, WalkingEngine,
};
use stride_net::{Correction, MoveFlags, MovePacket, PackedView, decompress_angle_byte};

use crate::combine::select_packet;
use crate::saved_move::SavedMove;

// ---------------------------------------------------------------------------
// PredictionBuffer
// ---------------------------------------------------------------------------

/// Ordered queue of unacknowledged saved moves.
///
/// Invariant: strictly time-increasing. Bounded by size; staleness is
/// policed separately by the forced-resync check.
pub struct PredictionBuffer {
    entries: VecDeque<SavedMove>,
    max_size: usize,
}

impl PredictionBuffer {
    /// Creates a buffer holding at most `max_size` moves.
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(max_size),
            max_size,
        }
    }

    /// Appends a move, evicting the oldest if at capacity. A move that does
    /// not advance the timeline is dropped.
    pub fn push(&mut self, mv: SavedMove) {
        if let Some(last) = self.entries.back()
            && mv.timestamp <= last.timestamp
        {
            tracing::debug!(
                timestamp = mv.timestamp,
                "non-increasing move timestamp dropped"
            );
            return;
        }
        if self.entries.len() >= self.max_size {
            self.entries.pop_front();
        }
        self.entries.push_back(mv);
    }

    /// Discards all moves with timestamp ≤ `timestamp` (server-confirmed).
    pub fn discard_up_to(&mut self, timestamp: f32) {
        while self
            .entries
            .front()
            .is_some_and(|mv| mv.timestamp <= timestamp)
        {
            self.entries.pop_front();
        }
    }

    /// Drops every buffered move.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Timestamp of the oldest unacknowledged move.
    pub fn oldest_timestamp(&self) -> Option<f32> {
        self.entries.front().map(|mv| mv.timestamp)
    }

    /// All buffered moves, oldest first.
    pub fn entries(&self) -> &VecDeque<SavedMove> {
        &self.entries
    }

    /// Number of buffered moves.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// PredictedActor
// ---------------------------------------------------------------------------

/// The locally predicted actor: motion state plus the tracked capsule
/// frame, and whether this client may predict it at all.
#[derive(Debug, Clone)]
pub struct PredictedActor {
    /// Motion state mirrored from the walking engine.
    pub state: ActorMotionState,
    /// The tracked root capsule frame.
    pub frame: CapsuleFrame,
    /// Whether this client owns prediction for the actor.
    pub has_authority: bool,
}

// ---------------------------------------------------------------------------
// Correction outcome
// ---------------------------------------------------------------------------

/// What a correction did on the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CorrectionOutcome {
    /// The predicted state diverged and was snapped to the server state.
    pub corrected: bool,
    /// Number of buffered moves replayed after the snap.
    pub replayed: usize,
    /// Number of moves discarded because their movement base vanished.
    pub discarded: usize,
}

// ---------------------------------------------------------------------------
// ClientPrediction
// ---------------------------------------------------------------------------

/// Per-connection client prediction driver.
pub struct ClientPrediction {
    buffer: PredictionBuffer,
    engine: WalkingEngine,
    prediction_cfg: PredictionConfig,
    tolerance: f32,
}

impl ClientPrediction {
    /// Creates a prediction driver from configuration.
    pub fn new(
        movement_cfg: MovementConfig,
        prediction_cfg: PredictionConfig,
        network_cfg: &NetworkConfig,
    ) -> Self {
        Self {
            buffer: PredictionBuffer::new(prediction_cfg.max_buffer_size),
            engine: WalkingEngine::new(movement_cfg),
            prediction_cfg,
            tolerance: network_cfg.correction_tolerance,
        }
    }

    /// The underlying move buffer.
    pub fn buffer(&self) -> &PredictionBuffer {
        &self.buffer
    }

    /// Captures this tick's move, simulates it locally, and buffers it.
    ///
    /// Silently drops the move (returning `false`) when the actor has no
    /// movement component attached or this client lacks prediction
    /// authority.
    pub fn capture_move(
        &mut self,
        actor: Option<&mut PredictedActor>,
        input: &MoveInput,
        flags: MoveFlags,
        timestamp: f32,
        delta_time: f32,
        scene: &dyn CollisionQuery,
        bases: &BaseRegistry,
    ) -> bool {
        let Some(actor) = actor else {
            return false;
        };
        if !actor.has_authority {
            return false;
        }

        let mut mv = SavedMove::capture(
            timestamp,
            delta_time,
            input,
            flags,
            &actor.state,
            &actor.frame,
        );

        // Simulate with the quantization-normalized input the server will
        // decode, not the raw one.
        let normalized = mv.to_input();
        self.engine.simulate(
            &mut actor.state,
            &mut actor.frame,
            &normalized,
            delta_time,
            scene,
            bases,
        );
        mv.post_update(&actor.frame);
        self.buffer.push(mv);
        true
    }

    /// Builds this tick's wire packet: the newest move, paired with the
    /// previous unacknowledged move when the combiner allows. Transmission
    /// is fire-and-forget unreliable; a lost packet is healed by the next
    /// tick's dual resend.
    pub fn build_packet(&self) -> Option<MovePacket> {
        let len = self.buffer.len();
        let newest = self.buffer.entries().back()?;
        let previous = if len >= 2 {
            self.buffer.entries().get(len - 2)
        } else {
            None
        };
        Some(select_packet(previous, newest))
    }

    /// Handles a server correction.
    ///
    /// Purges acknowledged moves, and when the predicted state at the
    /// correction's timestamp diverged beyond tolerance, snaps to the
    /// authoritative state and replays the remaining moves in timestamp
    /// order. A replayed move whose movement base no longer exists is
    /// discarded and the mode falls back to falling.
    pub fn apply_correction(
        &mut self,
        correction: &Correction,
        actor: &mut PredictedActor,
        scene: &dyn CollisionQuery,
        bases: &BaseRegistry,
    ) -> CorrectionOutcome {
        let predicted_at = self
            .buffer
            .entries()
            .iter()
            .find(|mv| mv.timestamp == correction.timestamp)
            .map(|mv| mv.client_loc);

        self.buffer.discard_up_to(correction.timestamp);

        let server_loc = correction.position.to_vec3();
        let diverged = match predicted_at {
            Some(predicted) => (predicted - server_loc).length() > self.tolerance,
            // No prediction for that timestamp (already evicted, or a
            // forced ack): trust the server.
            None => true,
        };
        if !diverged {
            return CorrectionOutcome::default();
        }

        tracing::debug!(
            timestamp = correction.timestamp,
            "prediction diverged; snapping and replaying {} moves",
            self.buffer.len()
        );
        snap_to_correction(actor, correction, bases);

        let mut outcome = CorrectionOutcome {
            corrected: true,
            ..Default::default()
        };
        let moves: Vec<SavedMove> = self.buffer.entries().iter().cloned().collect();
        for mv in &moves {
            if let Some(base) = &mv.base
                && bases.get(base.net_id).is_none()
            {
                // Irrecoverable move: its platform is gone.
                tracing::debug!(net_id = base.net_id, "replay move dropped, base missing");
                actor.state.base = None;
                actor.state.mode = MovementMode::Falling;
                outcome.discarded += 1;
                continue;
            }
            let input = mv.to_input();
            self.engine.simulate(
                &mut actor.state,
                &mut actor.frame,
                &input,
                mv.delta_time,
                scene,
                bases,
            );
            outcome.replayed += 1;
        }
        outcome
    }

    /// Bounds replay cost: when the oldest unacknowledged move exceeds the
    /// configured age, the buffer is dropped wholesale and the actor snaps
    /// to the last known server state instead of replaying.
    ///
    /// Returns `true` when a forced resync happened.
    pub fn maybe_force_resync(
        &mut self,
        now: f32,
        actor: &mut PredictedActor,
        last_known: Option<&Correction>,
        bases: &BaseRegistry,
    ) -> bool {
        let Some(oldest) = self.buffer.oldest_timestamp() else {
            return false;
        };
        if now - oldest <= self.prediction_cfg.max_move_age_secs {
            return false;
        }

        tracing::warn!(
            age = now - oldest,
            "unacknowledged moves too old; forcing resync"
        );
        self.buffer.clear();
        if let Some(correction) = last_known {
            snap_to_correction(actor, correction, bases);
        }
        true
    }
}

/// Snaps the actor to a correction's authoritative state.
///
/// A correction naming a base that no longer resolves degrades to falling,
/// per the missing-reference failure policy.
fn snap_to_correction(actor: &mut PredictedActor, correction: &Correction, bases: &BaseRegistry) {
    let view = PackedView(correction.view);

    actor.frame.location = correction.position.to_vec3();
    actor.state.position = actor.frame.location;
    actor.state.velocity = correction.velocity.to_vec3();
    actor.state.rotation.yaw = view.yaw();
    actor.state.rotation.pitch = view.pitch();
    actor.state.rotation.roll = decompress_angle_byte(correction.roll);
    actor.frame.yaw = actor.state.rotation.yaw;
    actor.state.mode =
        MovementMode::from_byte(correction.movement_mode).unwrap_or(MovementMode::Falling);
    // The replayed walking tick re-derives the floor.
    actor.state.floor = FloorResult::no_floor();

    actor.state.base = match &correction.base {
        Some(wire_base) => match bases.get(wire_base.net_id) {
            Some(platform) => Some(BaseReference {
                net_id: wire_base.net_id,
                bone: wire_base.bone.clone(),
                origin: platform.position,
            }),
            None => {
                tracing::debug!(net_id = wire_base.net_id, "corrected base missing; falling");
                actor.state.mode = MovementMode::Falling;
                None
            }
        },
        None => None,
    };
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
