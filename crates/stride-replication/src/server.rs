//! Server-side move processing: validate, re-simulate, correct.
//!
//! The server never trusts a reported position. Each incoming move is
//! validated as a pure step, then re-simulated through the same walking
//! engine the client runs; only the resulting divergence against the
//! client-reported location decides whether a correction goes out.

use stride_collision::CollisionQuery;
use stride_config::{MovementConfig, NetworkConfig};
use stride_movement::{ActorMotionState, BaseRegistry, CapsuleFrame, WalkingEngine};
use stride_net::{Correction, MovePacket, PackedView, QuantVec100, WireBase, compress_angle_byte};

use crate::combine::{DecodedMove, MoveRejection, decode_packet};

/// Smallest tick the server will integrate; shorter gaps are clamped up.
const MIN_TICK_SECS: f32 = 1.0 / 240.0;

/// Largest tick the server will integrate; a client cannot buy extra
/// movement by stretching timestamps.
const MAX_TICK_SECS: f32 = 0.25;

/// What a processed packet did to the authoritative state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Accepted {
    /// Moves re-simulated and applied.
    pub applied: usize,
    /// Moves acknowledged but skipped as duplicates/stale.
    pub skipped: usize,
    /// A correction was queued for the client.
    pub corrected: bool,
}

/// Per-connection authoritative move processor.
pub struct MoveProcessor {
    engine: WalkingEngine,
    tolerance: f32,
    /// Authoritative motion state for this connection's actor.
    pub state: ActorMotionState,
    /// Authoritative capsule frame.
    pub frame: CapsuleFrame,
    last_timestamp: f32,
    pending_correction: Option<Correction>,
}

impl MoveProcessor {
    /// Creates a processor for one connection, starting from the actor's
    /// spawn state.
    pub fn new(
        movement_cfg: MovementConfig,
        network_cfg: &NetworkConfig,
        state: ActorMotionState,
        frame: CapsuleFrame,
    ) -> Self {
        Self {
            engine: WalkingEngine::new(movement_cfg),
            tolerance: network_cfg.correction_tolerance,
            state,
            frame,
            last_timestamp: 0.0,
            pending_correction: None,
        }
    }

    /// Timestamp of the newest applied move.
    pub fn last_timestamp(&self) -> f32 {
        self.last_timestamp
    }

    /// Pure validation of an incoming packet. Never touches state.
    pub fn validate_packet(&self, packet: &MovePacket) -> Result<(), MoveRejection> {
        decode_packet(packet).map(|_| ())
    }

    /// Validates and applies a packet.
    ///
    /// On rejection the packet is dropped whole and server state is
    /// untouched. Within an accepted packet, moves whose timestamps do not
    /// advance past the last processed one are acknowledged but skipped —
    /// duplicates and replayed traffic never mutate state.
    pub fn process_packet(
        &mut self,
        packet: &MovePacket,
        scene: &dyn CollisionQuery,
        bases: &BaseRegistry,
    ) -> Result<Accepted, MoveRejection> {
        let moves = decode_packet(packet)?;

        let mut accepted = Accepted::default();
        for mv in &moves {
            if mv.timestamp <= self.last_timestamp {
                tracing::debug!(
                    timestamp = mv.timestamp,
                    last = self.last_timestamp,
                    "stale move acknowledged but not applied"
                );
                accepted.skipped += 1;
                continue;
            }
            self.apply_move(mv, scene, bases);
            accepted.applied += 1;
        }

        if accepted.applied > 0
            && let Some(newest) = moves.last()
            && newest.timestamp == self.last_timestamp
            && let Some(client_loc) = newest.client_loc
        {
            let error = (client_loc - self.frame.location).length();
            if error > self.tolerance {
                tracing::debug!(
                    error,
                    tolerance = self.tolerance,
                    "client diverged; queueing correction"
                );
                self.pending_correction = Some(self.make_correction());
                accepted.corrected = true;
            }
        }

        Ok(accepted)
    }

    /// Takes the queued correction, if any, for transmission.
    pub fn take_correction(&mut self) -> Option<Correction> {
        self.pending_correction.take()
    }

    fn apply_move(&mut self, mv: &DecodedMove, scene: &dyn CollisionQuery, bases: &BaseRegistry) {
        // Timestamps are seconds since connection start, so the baseline of
        // 0 gives the first move its real tick duration.
        let dt = (mv.timestamp - self.last_timestamp).clamp(MIN_TICK_SECS, MAX_TICK_SECS);

        let input = mv.to_input();
        self.engine
            .simulate(&mut self.state, &mut self.frame, &input, dt, scene, bases);
        self.last_timestamp = mv.timestamp;
    }

    fn make_correction(&self) -> Correction {
        Correction {
            timestamp: self.last_timestamp,
            position: QuantVec100::from_vec3(self.frame.location),
            velocity: QuantVec100::from_vec3(self.state.velocity),
            view: PackedView::pack(self.state.rotation.yaw, self.state.rotation.pitch).0,
            roll: compress_angle_byte(self.state.rotation.roll),
            movement_mode: self.state.mode.to_byte(),
            base: self.state.base.as_ref().map(|base| WireBase {
                net_id: base.net_id,
                bone: base.bone.clone(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use stride_collision::{CapsuleShape, CollisionChannel, RapierScene};
    use stride_config::PredictionConfig;
    use stride_movement::{MoveInput, MovementMode};
    use stride_net::MoveFlags;

    use crate::prediction::{ClientPrediction, PredictedActor};

    const DT: f32 = 1.0 / 64.0;

    fn flat_scene() -> RapierScene {
        let mut scene = RapierScene::new();
        scene.add_box(
            Vec3::new(0.0, -0.5, 0.0),
            Vec3::new(50.0, 0.5, 50.0),
            CollisionChannel::MovementBlocking,
        );
        scene
    }

    fn resting_actor() -> PredictedActor {
        PredictedActor {
            state: ActorMotionState {
                mode: MovementMode::Walking,
                ..Default::default()
            },
            frame: CapsuleFrame::resting_on(0.0, 0.0, 0.0, CapsuleShape::new(0.6, 0.3)),
            has_authority: true,
        }
    }

    fn client() -> ClientPrediction {
        ClientPrediction::new(
            MovementConfig::default(),
            PredictionConfig::default(),
            &NetworkConfig::default(),
        )
    }

    fn server(actor: &PredictedActor) -> MoveProcessor {
        MoveProcessor::new(
            MovementConfig::default(),
            &NetworkConfig::default(),
            actor.state.clone(),
            actor.frame,
        )
    }

    fn forward_input() -> MoveInput {
        MoveInput {
            acceleration: Vec3::new(10.0, 0.0, 0.0),
            ..Default::default()
        }
    }

    /// Drives `ticks` client ticks and feeds every packet to the server.
    fn run_linked(
        client: &mut ClientPrediction,
        actor: &mut PredictedActor,
        processor: &mut MoveProcessor,
        scene: &RapierScene,
        bases: &BaseRegistry,
        ticks: std::ops::Range<u32>,
    ) {
        for tick in ticks {
            client.capture_move(
                Some(actor),
                &forward_input(),
                MoveFlags::default(),
                tick as f32 * DT,
                DT,
                scene,
                bases,
            );
            let packet = client.build_packet().unwrap();
            processor.process_packet(&packet, scene, bases).unwrap();
        }
    }

    #[test]
    fn test_server_resimulation_matches_client_exactly() {
        let scene = flat_scene();
        let bases = BaseRegistry::new();
        let mut client = client();
        let mut actor = resting_actor();
        let mut processor = server(&actor);

        run_linked(&mut client, &mut actor, &mut processor, &scene, &bases, 1..61);

        // Same engine, same normalized inputs, same tick durations: the
        // authoritative result is bit-identical to the prediction.
        assert_eq!(processor.frame.location, actor.frame.location);
        assert_eq!(processor.state.velocity, actor.state.velocity);
        assert_eq!(processor.state.mode, actor.state.mode);
        assert!(processor.take_correction().is_none(), "no divergence, no correction");
    }

    #[test]
    fn test_monotonicity_rejects_stale_timestamps() {
        let scene = flat_scene();
        let bases = BaseRegistry::new();
        let mut client = client();
        let mut actor = resting_actor();
        let mut processor = server(&actor);

        run_linked(&mut client, &mut actor, &mut processor, &scene, &bases, 1..4);
        let position = processor.frame.location;
        let last = processor.last_timestamp();

        // Replay the tick-2 packet: both contained moves are stale.
        let mut replay_client = client_with_two_moves(&scene, &bases);
        let stale_packet = replay_client.build_packet().unwrap();
        let accepted = processor.process_packet(&stale_packet, &scene, &bases).unwrap();

        assert_eq!(accepted.applied, 0);
        assert_eq!(accepted.skipped, 2);
        assert_eq!(processor.frame.location, position, "stale moves must not move the actor");
        assert_eq!(processor.last_timestamp(), last);
    }

    /// Helper: a fresh client that has produced moves for ticks 1 and 2.
    fn client_with_two_moves(scene: &RapierScene, bases: &BaseRegistry) -> ClientPrediction {
        let mut fresh = client();
        let mut actor = resting_actor();
        for tick in 1..3u32 {
            fresh.capture_move(
                Some(&mut actor),
                &forward_input(),
                MoveFlags::default(),
                tick as f32 * DT,
                DT,
                scene,
                bases,
            );
        }
        fresh
    }

    #[test]
    fn test_dual_packet_with_stale_old_move() {
        let scene = flat_scene();
        let bases = BaseRegistry::new();
        let mut client = client();
        let mut actor = resting_actor();
        let mut processor = server(&actor);

        // Process ticks 1 and 2 normally (tick 2 arrives as a dual resend,
        // so its old half is already stale — exactly the redundancy path).
        run_linked(&mut client, &mut actor, &mut processor, &scene, &bases, 1..3);

        client.capture_move(
            Some(&mut actor),
            &forward_input(),
            MoveFlags::default(),
            3.0 * DT,
            DT,
            &scene,
            &bases,
        );
        let packet = client.build_packet().unwrap();
        assert!(matches!(packet, MovePacket::Dual(_)));

        let accepted = processor.process_packet(&packet, &scene, &bases).unwrap();
        // Old half (tick 2) discarded, new half (tick 3) still evaluated.
        assert_eq!(accepted.skipped, 1);
        assert_eq!(accepted.applied, 1);
        assert_eq!(processor.last_timestamp(), 3.0 * DT);
    }

    #[test]
    fn test_validation_failure_drops_packet_without_state_change() {
        let scene = flat_scene();
        let bases = BaseRegistry::new();
        let mut client = client();
        let mut actor = resting_actor();
        let mut processor = server(&actor);

        run_linked(&mut client, &mut actor, &mut processor, &scene, &bases, 1..2);
        let position = processor.frame.location;
        let last = processor.last_timestamp();

        client.capture_move(
            Some(&mut actor),
            &forward_input(),
            MoveFlags::default(),
            2.0 * DT,
            DT,
            &scene,
            &bases,
        );
        let packet = client.build_packet().unwrap();

        // Corrupt the flags byte into an undefined combination.
        let tampered = match packet {
            MovePacket::Dual(mut dual) => {
                dual.new.flags = 0xFF;
                MovePacket::Dual(dual)
            }
            other => panic!("expected a dual packet, got {other:?}"),
        };

        assert!(processor.validate_packet(&tampered).is_err());
        let result = processor.process_packet(&tampered, &scene, &bases);
        assert!(matches!(result, Err(MoveRejection::UndefinedFlags(0xFF))));
        assert_eq!(processor.frame.location, position, "rejected packet must not mutate state");
        assert_eq!(processor.last_timestamp(), last);
    }

    #[test]
    fn test_divergence_emits_correction_and_client_converges() {
        let scene = flat_scene();
        let bases = BaseRegistry::new();
        let mut client = client();
        let mut actor = resting_actor();

        // The server believes the actor spawned elsewhere: guaranteed
        // divergence beyond tolerance.
        let mut server_actor = resting_actor();
        server_actor.frame.location += Vec3::new(1.0, 0.0, 0.0);
        server_actor.state.position = server_actor.frame.location;
        let mut processor = server(&server_actor);

        client.capture_move(
            Some(&mut actor),
            &forward_input(),
            MoveFlags::default(),
            DT,
            DT,
            &scene,
            &bases,
        );
        let packet = client.build_packet().unwrap();
        let accepted = processor.process_packet(&packet, &scene, &bases).unwrap();
        assert!(accepted.corrected, "1m of divergence must trigger a correction");

        let correction = processor.take_correction().expect("correction queued");
        let outcome = client.apply_correction(&correction, &mut actor, &scene, &bases);
        assert!(outcome.corrected);

        // One snap-and-replay pass converges to the authoritative state
        // (within wire quantization).
        assert!(
            (actor.frame.location - processor.frame.location).length() < 0.02,
            "client={:?} server={:?}",
            actor.frame.location,
            processor.frame.location
        );
        assert_eq!(actor.state.mode, processor.state.mode);
    }

    #[test]
    fn test_out_of_order_packets_cannot_rewind_server() {
        let scene = flat_scene();
        let bases = BaseRegistry::new();
        let mut client = client();
        let mut actor = resting_actor();
        let mut processor = server(&actor);

        run_linked(&mut client, &mut actor, &mut processor, &scene, &bases, 1..11);
        let advanced = processor.last_timestamp();

        // An attacker replays the very first packet.
        let mut replay_client = client_with_two_moves(&scene, &bases);
        let old_packet = replay_client.build_packet().unwrap();
        let accepted = processor.process_packet(&old_packet, &scene, &bases).unwrap();

        assert_eq!(accepted.applied, 0);
        assert_eq!(processor.last_timestamp(), advanced, "timestamp gate must hold");
    }
}
