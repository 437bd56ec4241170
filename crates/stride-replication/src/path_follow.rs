//! Reaction to path-following completion.
//!
//! Path planning and following live in an external navigation collaborator;
//! this core only reacts to its completion callback, dropping out of the
//! scripted movement mode.

use stride_movement::{ActorMotionState, MovementMode};

/// Identifier of a navigation move request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PathRequestId(pub u32);

/// How a navigation move request finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathFollowResult {
    /// Destination reached.
    Success,
    /// Blocked before reaching the destination.
    Blocked,
    /// Actor strayed off the path.
    OffPath,
    /// Request was aborted by a newer one.
    Aborted,
    /// Request was invalid.
    Invalid,
}

/// Handles the navigation collaborator's completion callback.
///
/// Exits the scripted (Custom) movement mode, returning to walking when
/// standing on walkable floor and falling otherwise. Other modes are left
/// untouched.
pub fn on_move_completed(
    state: &mut ActorMotionState,
    request_id: PathRequestId,
    result: PathFollowResult,
) {
    tracing::debug!(request_id = request_id.0, ?result, "path following completed");

    if state.mode == MovementMode::Custom {
        state.mode = if state.floor.is_walkable_floor() {
            MovementMode::Walking
        } else {
            MovementMode::Falling
        };
    }
}
