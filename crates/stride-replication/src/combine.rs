//! Move combining and wire form selection/translation.
//!
//! Chooses between the three client→server packet forms, encodes saved
//! moves into their quantized wire fields, and decodes/validates incoming
//! packets into replayable moves. Validation is pure: a failed decode never
//! touches simulation state.

use glam::Vec3;
use stride_movement::{MoveInput, MovementMode, RootMotion};
use stride_net::{
    DualHybridRootMotionMove, DualMove, MoveFlags, MovePacket, OldMove, QuantVec10, QuantVec100,
    PackedView, RootMotionPayload, SingleMove, WireBase, compress_angle_byte,
    decompress_angle_byte,
};

use crate::saved_move::SavedMove;

// ---------------------------------------------------------------------------
// Rejection reasons
// ---------------------------------------------------------------------------

/// Why an incoming move packet was rejected. A rejection drops the entire
/// packet without mutating server state.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MoveRejection {
    /// A decoded field was not a finite number.
    #[error("non-finite field: {0}")]
    NonFiniteField(&'static str),

    /// The compressed-flags byte contains undefined bits.
    #[error("undefined flag bits: {0:#04x}")]
    UndefinedFlags(u8),

    /// The movement-mode byte is not a defined mode.
    #[error("undefined movement mode: {0}")]
    UndefinedMode(u8),

    /// A dual packet's old move is not older than its new move.
    #[error("out-of-order move pair: old {old} >= new {new}")]
    OutOfOrderPair {
        /// Old half's timestamp.
        old: f32,
        /// New half's timestamp.
        new: f32,
    },
}

// ---------------------------------------------------------------------------
// Decoded moves
// ---------------------------------------------------------------------------

/// A validated, decoded move ready for authoritative re-simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedMove {
    /// Client timestamp, seconds.
    pub timestamp: f32,
    /// Input acceleration.
    pub acceleration: Vec3,
    /// Capsule location at move start, as reported by the client.
    pub capsule_loc: Vec3,
    /// Client's post-move location. `None` for the old half of dual
    /// packets, which never carries one.
    pub client_loc: Option<Vec3>,
    /// Tracked capsule displacement for the tick.
    pub frame_diff: Vec3,
    /// Requested velocity, if the move carries one.
    pub requested_velocity: Option<Vec3>,
    /// Capsule yaw, degrees.
    pub capsule_yaw: f32,
    /// Input flags.
    pub flags: MoveFlags,
    /// Movement base claimed by the client.
    pub base: Option<WireBase>,
    /// Movement mode at capture.
    pub mode: MovementMode,
    /// Root motion for the tick, if any.
    pub root_motion: Option<RootMotion>,
}

impl DecodedMove {
    /// Rebuilds the engine input for re-simulation.
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
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

fn encode_new(mv: &SavedMove) -> SingleMove {
    SingleMove {
        timestamp: mv.timestamp,
        acceleration: QuantVec10::from_vec3(mv.acceleration),
        client_loc: QuantVec100::from_vec3(mv.client_loc),
        capsule_loc: QuantVec100::from_vec3(mv.capsule_loc),
        requested_velocity: QuantVec100::from_vec3(mv.requested_velocity.unwrap_or(Vec3::ZERO)),
        has_requested_velocity: mv.requested_velocity.is_some(),
        frame_diff: QuantVec100::from_vec3(mv.frame_diff),
        capsule_yaw: compress_angle_byte(mv.capsule_yaw),
        flags: mv.flags.bits(),
        client_roll: compress_angle_byte(mv.capsule_roll),
        view: PackedView::pack(mv.view_yaw, mv.view_pitch).0,
        base: mv.base.clone(),
        movement_mode: mv.mode.to_byte(),
    }
}

fn encode_old(mv: &SavedMove) -> OldMove {
    OldMove {
        timestamp: mv.timestamp,
        acceleration: QuantVec10::from_vec3(mv.acceleration),
        pending_flags: mv.flags.bits(),
        view: PackedView::pack(mv.view_yaw, mv.view_pitch).0,
        capsule_loc: QuantVec100::from_vec3(mv.capsule_loc),
        requested_velocity: QuantVec100::from_vec3(mv.requested_velocity.unwrap_or(Vec3::ZERO)),
        has_requested_velocity: mv.requested_velocity.is_some(),
        frame_diff: QuantVec100::from_vec3(mv.frame_diff),
        capsule_yaw: compress_angle_byte(mv.capsule_yaw),
    }
}

fn encode_root_motion(rm: &RootMotion) -> RootMotionPayload {
    RootMotionPayload {
        translation: QuantVec100::from_vec3(rm.translation),
        yaw: compress_angle_byte(rm.yaw),
    }
}

/// Selects the wire form for the newest move, given the previous
/// still-unacknowledged move.
///
/// A root-motion move rides the hybrid form behind a plain previous move
/// and never downgrades to plain-dual combining; with no previous move to
/// pair with, it ships as a single and its root motion is dropped (the
/// server falls back to plain re-simulation for that tick).
pub fn select_packet(previous: Option<&SavedMove>, newest: &SavedMove) -> MovePacket {
    match (previous, newest.root_motion.as_ref()) {
        (Some(old), Some(root_motion)) if old.root_motion.is_none() => {
            MovePacket::DualHybridRootMotion(DualHybridRootMotionMove {
                old: encode_old(old),
                new: encode_new(newest),
                root_motion: encode_root_motion(root_motion),
            })
        }
        (Some(old), None) if old.can_combine_with(newest) => MovePacket::Dual(DualMove {
            old: encode_old(old),
            new: encode_new(newest),
        }),
        _ => {
            if newest.root_motion.is_some() {
                tracing::debug!("lone root-motion move sent as single; payload dropped");
            }
            MovePacket::Single(encode_new(newest))
        }
    }
}

// ---------------------------------------------------------------------------
// Decoding / validation
// ---------------------------------------------------------------------------

fn check_finite(value: f32, field: &'static str) -> Result<f32, MoveRejection> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(MoveRejection::NonFiniteField(field))
    }
}

fn decode_flags(bits: u8) -> Result<MoveFlags, MoveRejection> {
    MoveFlags::from_bits(bits).ok_or(MoveRejection::UndefinedFlags(bits))
}

fn decode_new(
    mv: &SingleMove,
    root_motion: Option<&RootMotionPayload>,
) -> Result<DecodedMove, MoveRejection> {
    let mode = MovementMode::from_byte(mv.movement_mode)
        .ok_or(MoveRejection::UndefinedMode(mv.movement_mode))?;

    Ok(DecodedMove {
        timestamp: check_finite(mv.timestamp, "timestamp")?,
        acceleration: mv.acceleration.to_vec3(),
        capsule_loc: mv.capsule_loc.to_vec3(),
        client_loc: Some(mv.client_loc.to_vec3()),
        frame_diff: mv.frame_diff.to_vec3(),
        requested_velocity: mv
            .has_requested_velocity
            .then(|| mv.requested_velocity.to_vec3()),
        capsule_yaw: decompress_angle_byte(mv.capsule_yaw),
        flags: decode_flags(mv.flags)?,
        base: mv.base.clone(),
        mode,
        root_motion: root_motion.map(|rm| RootMotion {
            translation: rm.translation.to_vec3(),
            yaw: decompress_angle_byte(rm.yaw),
        }),
    })
}

fn decode_old(mv: &OldMove, newer: &SingleMove) -> Result<DecodedMove, MoveRejection> {
    // Fields the dual form drops for the old half are inherited from the
    // new half — combinability guaranteed they matched at capture.
    let mode = MovementMode::from_byte(newer.movement_mode)
        .ok_or(MoveRejection::UndefinedMode(newer.movement_mode))?;

    Ok(DecodedMove {
        timestamp: check_finite(mv.timestamp, "old timestamp")?,
        acceleration: mv.acceleration.to_vec3(),
        capsule_loc: mv.capsule_loc.to_vec3(),
        client_loc: None,
        frame_diff: mv.frame_diff.to_vec3(),
        requested_velocity: mv
            .has_requested_velocity
            .then(|| mv.requested_velocity.to_vec3()),
        capsule_yaw: decompress_angle_byte(mv.capsule_yaw),
        flags: decode_flags(mv.pending_flags)?,
        base: newer.base.clone(),
        mode,
        root_motion: None,
    })
}

/// Validates and decodes a packet into moves in chronological order.
///
/// This is the pure validation step: any failure rejects the whole packet
/// and nothing downstream runs.
pub fn decode_packet(packet: &MovePacket) -> Result<Vec<DecodedMove>, MoveRejection> {
    match packet {
        MovePacket::Single(mv) => Ok(vec![decode_new(mv, None)?]),
        MovePacket::Dual(dual) => {
            let old = decode_old(&dual.old, &dual.new)?;
            let new = decode_new(&dual.new, None)?;
            if old.timestamp >= new.timestamp {
                return Err(MoveRejection::OutOfOrderPair {
                    old: old.timestamp,
                    new: new.timestamp,
                });
            }
            Ok(vec![old, new])
        }
        MovePacket::DualHybridRootMotion(dual) => {
            let old = decode_old(&dual.old, &dual.new)?;
            let new = decode_new(&dual.new, Some(&dual.root_motion))?;
            if old.timestamp >= new.timestamp {
                return Err(MoveRejection::OutOfOrderPair {
                    old: old.timestamp,
                    new: new.timestamp,
                });
            }
            Ok(vec![old, new])
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
