//! Wire packet types and serialization.
//!
//! All packets are serialized with [`postcard`] and prefixed with a protocol
//! version byte. Client→server traffic is one of three move packet forms
//! (single, dual, dual-hybrid-root-motion); server→client corrections use
//! [`Correction`]. Use the `serialize_*`/`deserialize_*` helpers for
//! encoding/decoding.

use serde::{Deserialize, Serialize};

use crate::quant::{QuantVec10, QuantVec100};

/// Current wire-protocol version. Prepended to every serialized packet.
pub const PROTOCOL_VERSION: u8 = 1;

// ---------------------------------------------------------------------------
// Compressed input flags
// ---------------------------------------------------------------------------

/// Compressed input-flags byte sent with every move.
///
/// Only the bits in [`MoveFlags::VALID_MASK`] are defined; a byte with any
/// other bit set is rejected during packet validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MoveFlags(u8);

impl MoveFlags {
    /// Jump pressed this tick.
    pub const JUMP: u8 = 0x01;
    /// Crouch held this tick.
    pub const CROUCH: u8 = 0x02;
    /// Game-specific flag 0.
    pub const CUSTOM_0: u8 = 0x10;
    /// Game-specific flag 1.
    pub const CUSTOM_1: u8 = 0x20;
    /// All defined bits.
    pub const VALID_MASK: u8 =
        Self::JUMP | Self::CROUCH | Self::CUSTOM_0 | Self::CUSTOM_1;

    /// Builds flags from a raw byte, rejecting undefined bits.
    pub fn from_bits(bits: u8) -> Option<Self> {
        if bits & !Self::VALID_MASK != 0 {
            return None;
        }
        Some(Self(bits))
    }

    /// Builds flags from individual inputs.
    pub fn new(jump: bool, crouch: bool) -> Self {
        let mut bits = 0;
        if jump {
            bits |= Self::JUMP;
        }
        if crouch {
            bits |= Self::CROUCH;
        }
        Self(bits)
    }

    /// Raw wire byte.
    pub fn bits(self) -> u8 {
        self.0
    }

    /// Jump bit.
    pub fn jump(self) -> bool {
        self.0 & Self::JUMP != 0
    }

    /// Crouch bit.
    pub fn crouch(self) -> bool {
        self.0 & Self::CROUCH != 0
    }
}

// ---------------------------------------------------------------------------
// Packet payloads
// ---------------------------------------------------------------------------

/// Movement-base reference on the wire: platform net-id plus attachment
/// bone name (empty for the root).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireBase {
    /// Network identifier of the platform actor.
    pub net_id: u64,
    /// Attachment bone name.
    pub bone: String,
}

/// One client move: inputs plus the client's resulting location for the
/// server's divergence check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleMove {
    /// Client timestamp of this move, seconds.
    pub timestamp: f32,
    /// Input acceleration (coarse quantization).
    pub acceleration: QuantVec10,
    /// Client's post-move capsule location. Compared against the server's
    /// re-simulated result, never applied directly.
    pub client_loc: QuantVec100,
    /// Capsule location at move start.
    pub capsule_loc: QuantVec100,
    /// Path-following requested velocity; meaningful only when
    /// `has_requested_velocity` is set.
    pub requested_velocity: QuantVec100,
    /// Whether `requested_velocity` carries data.
    pub has_requested_velocity: bool,
    /// Externally tracked capsule displacement for this tick.
    pub frame_diff: QuantVec100,
    /// Capsule yaw, byte-compressed.
    pub capsule_yaw: u8,
    /// Compressed input-flags byte.
    pub flags: u8,
    /// Client roll, byte-compressed.
    pub client_roll: u8,
    /// Packed view rotation (16-bit yaw | 16-bit pitch).
    pub view: u32,
    /// Movement base at capture, if any.
    pub base: Option<WireBase>,
    /// Movement mode byte at capture.
    pub movement_mode: u8,
}

/// The older (previously pending) half of a dual packet. Carries only the
/// fields the server needs to replay the move; the rest is implied by the
/// newer move it was combined with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OldMove {
    /// Client timestamp of the old move, seconds.
    pub timestamp: f32,
    /// Input acceleration of the old move.
    pub acceleration: QuantVec10,
    /// Compressed input-flags byte of the old move.
    pub pending_flags: u8,
    /// Packed view rotation of the old move.
    pub view: u32,
    /// Capsule location at the old move's start.
    pub capsule_loc: QuantVec100,
    /// Requested velocity of the old move.
    pub requested_velocity: QuantVec100,
    /// Whether `requested_velocity` carries data.
    pub has_requested_velocity: bool,
    /// Tracked capsule displacement of the old move.
    pub frame_diff: QuantVec100,
    /// Capsule yaw of the old move, byte-compressed.
    pub capsule_yaw: u8,
}

/// Two consecutive moves combined into one packet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DualMove {
    /// The earlier, previously unacknowledged move.
    pub old: OldMove,
    /// The current move.
    pub new: SingleMove,
}

/// Procedural root-motion payload. Cannot share the plain moves'
/// quantization path: the translation is authored animation data, not an
/// integrated velocity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootMotionPayload {
    /// Root-motion translation for the move's tick.
    pub translation: QuantVec100,
    /// Root-motion yaw delta, byte-compressed.
    pub yaw: u8,
}

/// Dual packet whose first move is plain and whose second carries root
/// motion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DualHybridRootMotionMove {
    /// The earlier, plain move.
    pub old: OldMove,
    /// The current move.
    pub new: SingleMove,
    /// Root motion attached to the current move.
    pub root_motion: RootMotionPayload,
}

/// Client→server move packet. The enum discriminant is the wire form tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MovePacket {
    /// One move.
    Single(SingleMove),
    /// Two combinable consecutive moves.
    Dual(DualMove),
    /// Two moves where the second carries root motion.
    DualHybridRootMotion(DualHybridRootMotionMove),
}

impl MovePacket {
    /// The newest move in the packet.
    pub fn newest(&self) -> &SingleMove {
        match self {
            Self::Single(m) => m,
            Self::Dual(d) => &d.new,
            Self::DualHybridRootMotion(d) => &d.new,
        }
    }
}

/// Server→client correction: the authoritative state the client must snap
/// to before replaying its outstanding moves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correction {
    /// Timestamp of the acknowledged move the correction supersedes.
    pub timestamp: f32,
    /// Authoritative capsule location.
    pub position: QuantVec100,
    /// Authoritative velocity.
    pub velocity: QuantVec100,
    /// Packed authoritative view rotation.
    pub view: u32,
    /// Authoritative roll, byte-compressed.
    pub roll: u8,
    /// Authoritative movement mode byte.
    pub movement_mode: u8,
    /// Authoritative movement base, if any.
    pub base: Option<WireBase>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during packet deserialization.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    /// The payload was empty (no version byte).
    #[error("empty payload — no version byte")]
    EmptyPayload,

    /// The version byte does not match [`PROTOCOL_VERSION`].
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// Postcard deserialization failed.
    #[error("deserialization error: {0}")]
    Postcard(#[from] postcard::Error),
}

// ---------------------------------------------------------------------------
// Serialization helpers
// ---------------------------------------------------------------------------

fn frame_payload<T: Serialize>(value: &T) -> Result<Vec<u8>, postcard::Error> {
    let body = postcard::to_allocvec(value)?;
    let mut out = Vec::with_capacity(1 + body.len());
    out.push(PROTOCOL_VERSION);
    out.extend_from_slice(&body);
    Ok(out)
}

fn unframe_payload<'a, T: Deserialize<'a>>(data: &'a [u8]) -> Result<T, MessageError> {
    if data.is_empty() {
        return Err(MessageError::EmptyPayload);
    }

    let version = data[0];
    if version != PROTOCOL_VERSION {
        return Err(MessageError::UnsupportedVersion(version));
    }

    Ok(postcard::from_bytes(&data[1..])?)
}

/// Serialize a [`MovePacket`] into a versioned binary payload.
///
/// Wire format: `[version: u8] [postcard-encoded MovePacket]`
pub fn serialize_move_packet(packet: &MovePacket) -> Result<Vec<u8>, postcard::Error> {
    frame_payload(packet)
}

/// Deserialize a versioned binary payload into a [`MovePacket`].
pub fn deserialize_move_packet(data: &[u8]) -> Result<MovePacket, MessageError> {
    unframe_payload(data)
}

/// Serialize a [`Correction`] into a versioned binary payload.
pub fn serialize_correction(correction: &Correction) -> Result<Vec<u8>, postcard::Error> {
    frame_payload(correction)
}

/// Deserialize a versioned binary payload into a [`Correction`].
pub fn deserialize_correction(data: &[u8]) -> Result<Correction, MessageError> {
    unframe_payload(data)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn sample_move(timestamp: f32) -> SingleMove {
        SingleMove {
            timestamp,
            acceleration: QuantVec10::from_vec3(Vec3::new(12.3, 0.0, -4.5)),
            client_loc: QuantVec100::from_vec3(Vec3::new(10.55, 0.92, -3.11)),
            capsule_loc: QuantVec100::from_vec3(Vec3::new(10.47, 0.92, -3.11)),
            requested_velocity: QuantVec100::default(),
            has_requested_velocity: false,
            frame_diff: QuantVec100::from_vec3(Vec3::new(0.02, 0.0, 0.01)),
            capsule_yaw: 64,
            flags: MoveFlags::new(true, false).bits(),
            client_roll: 0,
            view: crate::quant::PackedView::pack(90.0, 350.0).0,
            base: Some(WireBase {
                net_id: 17,
                bone: String::new(),
            }),
            movement_mode: 1,
        }
    }

    fn sample_old(timestamp: f32) -> OldMove {
        OldMove {
            timestamp,
            acceleration: QuantVec10::from_vec3(Vec3::new(12.0, 0.0, -4.0)),
            pending_flags: 0,
            view: crate::quant::PackedView::pack(89.0, 350.0).0,
            capsule_loc: QuantVec100::from_vec3(Vec3::new(10.39, 0.92, -3.10)),
            requested_velocity: QuantVec100::default(),
            has_requested_velocity: false,
            frame_diff: QuantVec100::default(),
            capsule_yaw: 63,
        }
    }

    #[test]
    fn test_single_move_roundtrip_is_byte_identical() {
        let packet = MovePacket::Single(sample_move(1.25));
        let bytes = serialize_move_packet(&packet).unwrap();
        let decoded = deserialize_move_packet(&bytes).unwrap();
        assert_eq!(decoded, packet);

        let re_encoded = serialize_move_packet(&decoded).unwrap();
        assert_eq!(re_encoded, bytes, "re-encode must be byte-identical");
    }

    #[test]
    fn test_dual_move_roundtrip_is_byte_identical() {
        let packet = MovePacket::Dual(DualMove {
            old: sample_old(1.2333),
            new: sample_move(1.25),
        });
        let bytes = serialize_move_packet(&packet).unwrap();
        let decoded = deserialize_move_packet(&bytes).unwrap();
        assert_eq!(decoded, packet);
        assert_eq!(serialize_move_packet(&decoded).unwrap(), bytes);
    }

    #[test]
    fn test_hybrid_root_motion_roundtrip() {
        let packet = MovePacket::DualHybridRootMotion(DualHybridRootMotionMove {
            old: sample_old(2.0),
            new: sample_move(2.0167),
            root_motion: RootMotionPayload {
                translation: QuantVec100::from_vec3(Vec3::new(0.03, 0.0, 0.01)),
                yaw: 4,
            },
        });
        let bytes = serialize_move_packet(&packet).unwrap();
        let decoded = deserialize_move_packet(&bytes).unwrap();
        assert_eq!(decoded, packet);
        assert_eq!(serialize_move_packet(&decoded).unwrap(), bytes);
    }

    #[test]
    fn test_correction_roundtrip() {
        let correction = Correction {
            timestamp: 5.5,
            position: QuantVec100::from_vec3(Vec3::new(1.0, 0.92, 2.0)),
            velocity: QuantVec100::from_vec3(Vec3::new(0.5, 0.0, 0.0)),
            view: crate::quant::PackedView::pack(180.0, 0.0).0,
            roll: 0,
            movement_mode: 2,
            base: None,
        };
        let bytes = serialize_correction(&correction).unwrap();
        let decoded = deserialize_correction(&bytes).unwrap();
        assert_eq!(decoded, correction);
        assert_eq!(serialize_correction(&decoded).unwrap(), bytes);
    }

    #[test]
    fn test_version_byte_is_first_byte() {
        let bytes = serialize_move_packet(&MovePacket::Single(sample_move(0.0))).unwrap();
        assert_eq!(bytes[0], PROTOCOL_VERSION);
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let mut bytes = serialize_move_packet(&MovePacket::Single(sample_move(0.0))).unwrap();
        bytes[0] = 255;
        assert!(matches!(
            deserialize_move_packet(&bytes),
            Err(MessageError::UnsupportedVersion(255))
        ));
    }

    #[test]
    fn test_empty_payload_rejected() {
        assert!(matches!(
            deserialize_move_packet(&[]),
            Err(MessageError::EmptyPayload)
        ));
    }

    #[test]
    fn test_corrupted_payload_rejected() {
        let result = deserialize_move_packet(&[PROTOCOL_VERSION, 0xFF, 0xFF, 0xFF]);
        assert!(result.is_err(), "corrupted payload should fail to decode");
    }

    #[test]
    fn test_single_is_smaller_than_dual() {
        let single = serialize_move_packet(&MovePacket::Single(sample_move(1.0))).unwrap();
        let dual = serialize_move_packet(&MovePacket::Dual(DualMove {
            old: sample_old(0.98),
            new: sample_move(1.0),
        }))
        .unwrap();
        assert!(
            single.len() < dual.len(),
            "single={} dual={}",
            single.len(),
            dual.len()
        );
    }

    #[test]
    fn test_flags_reject_undefined_bits() {
        assert!(MoveFlags::from_bits(MoveFlags::JUMP).is_some());
        assert!(MoveFlags::from_bits(MoveFlags::JUMP | MoveFlags::CUSTOM_1).is_some());
        assert!(MoveFlags::from_bits(0x04).is_none());
        assert!(MoveFlags::from_bits(0x80).is_none());
        assert!(MoveFlags::from_bits(0xFF).is_none());
    }

    #[test]
    fn test_flags_accessors() {
        let flags = MoveFlags::new(true, true);
        assert!(flags.jump());
        assert!(flags.crouch());
        assert_eq!(flags.bits(), MoveFlags::JUMP | MoveFlags::CROUCH);
    }

    #[test]
    fn test_newest_move_per_form() {
        let single = MovePacket::Single(sample_move(3.0));
        assert_eq!(single.newest().timestamp, 3.0);

        let dual = MovePacket::Dual(DualMove {
            old: sample_old(2.98),
            new: sample_move(3.0),
        });
        assert_eq!(dual.newest().timestamp, 3.0);
    }
}
