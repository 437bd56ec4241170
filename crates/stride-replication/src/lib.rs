//! Move replication: saved moves, combining, client prediction, and the
//! server move processor.
//!
//! The client captures one [`SavedMove`] per tick, simulates it
//! immediately, and ships it through the combiner's three wire forms. The
//! server validates, re-simulates from inputs, and corrects divergence;
//! the client answers a correction with a deterministic snap-and-replay.

mod combine;
mod path_follow;
mod prediction;
mod saved_move;
mod server;

pub use combine::{DecodedMove, MoveRejection, decode_packet, select_packet};
pub use path_follow::{PathFollowResult, PathRequestId, on_move_completed};
pub use prediction::{
    ClientPrediction, CorrectionOutcome, PredictedActor, PredictionBuffer,
};
pub use saved_move::SavedMove;
pub use server::{Accepted, MoveProcessor};
