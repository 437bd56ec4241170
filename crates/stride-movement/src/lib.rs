//! Floor-relative walking physics for an externally tracked capsule.
//!
//! The per-tick simulation that must stay identical between client
//! prediction/replay and server re-simulation: movement modes, floor
//! detection, penetration-tolerant sweeps, step-up, wall repulsion, and
//! based movement on platforms. All geometry access goes through the
//! `stride-collision` query trait; all tuning comes from `stride-config`.

mod based;
mod floor;
mod mode;
mod state;
mod step_up;
mod walking;

pub use based::{
    BaseRegistry, PlatformState, imparted_base_velocity, set_base_from_floor,
    update_based_movement,
};
pub use floor::{find_floor, ground_movement_delta};
pub use mode::MovementMode;
pub use state::{
    ActorMotionState, BaseReference, CapsuleFrame, FloorResult, REST_FLOOR_DIST, Rotator,
};
pub use walking::{MoveInput, RootMotion, WalkingEngine};
