//! Wire codec for the stride movement core.
//!
//! Quantized field types bound bandwidth; three client→server move packet
//! forms plus the server→client correction packet ride a versioned
//! postcard framing.

mod messages;
mod quant;

pub use messages::{
    Correction, DualHybridRootMotionMove, DualMove, MessageError, MoveFlags, MovePacket, OldMove,
    PROTOCOL_VERSION, RootMotionPayload, SingleMove, WireBase, deserialize_correction,
    deserialize_move_packet, serialize_correction, serialize_move_packet,
};
pub use quant::{
    PackedView, QuantVec10, QuantVec100, compress_angle_byte, compress_angle_short,
    decompress_angle_byte, decompress_angle_short,
};
