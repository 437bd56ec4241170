//! Actor motion state and the tracked capsule reference frame.

use glam::Vec3;
use stride_collision::{CapsuleShape, SurfaceId};

use crate::mode::MovementMode;

/// Resting distance kept between the capsule's lowest point and the floor.
pub const REST_FLOOR_DIST: f32 = 0.02;

/// Yaw/pitch/roll rotation in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rotator {
    /// Heading around the vertical axis.
    pub yaw: f32,
    /// Look up/down.
    pub pitch: f32,
    /// Lean around the forward axis.
    pub roll: f32,
}

/// Result of the most recent floor query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloorResult {
    /// A blocking surface was found below the capsule.
    pub blocking_hit: bool,
    /// The surface slope is within the walkable threshold.
    pub walkable: bool,
    /// Downward distance from the current capsule position to contact.
    pub distance: f32,
    /// Surface normal at the contact.
    pub normal: Vec3,
    /// The surface that was hit. Non-owning.
    pub surface: Option<SurfaceId>,
}

impl FloorResult {
    /// "No floor found" — also the result for degenerate geometry.
    pub fn no_floor() -> Self {
        Self {
            blocking_hit: false,
            walkable: false,
            distance: 0.0,
            normal: Vec3::ZERO,
            surface: None,
        }
    }

    /// `true` when the actor can stand here.
    pub fn is_walkable_floor(&self) -> bool {
        self.blocking_hit && self.walkable
    }
}

impl Default for FloorResult {
    fn default() -> Self {
        Self::no_floor()
    }
}

/// Weak reference to the platform the actor is standing on.
///
/// The registry lookup by `net_id` is the only way to reach the platform;
/// this struct never owns it. `origin` is the platform position at the last
/// based-movement update, used to derive the per-tick platform delta.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseReference {
    /// Network identifier of the platform actor.
    pub net_id: u64,
    /// Attachment bone on the platform, empty for the root.
    pub bone: String,
    /// Platform position at the last based-movement update.
    pub origin: Vec3,
}

/// Per-actor motion state, mutated once per simulation tick by the walking
/// engine and never by the network layer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ActorMotionState {
    /// World-space actor position. Follows the capsule frame.
    pub position: Vec3,
    /// Actor rotation.
    pub rotation: Rotator,
    /// Linear velocity in units per second.
    pub velocity: Vec3,
    /// Acceleration applied during the last tick.
    pub acceleration: Vec3,
    /// Current movement mode.
    pub mode: MovementMode,
    /// Floor query result from the last tick.
    pub floor: FloorResult,
    /// Platform the actor is standing on, if any.
    pub base: Option<BaseReference>,
}

/// The tracked root capsule's own location and rotation.
///
/// Decoupled from the generic actor transform: floor queries, step-up, and
/// based-movement offsets all read this frame, because the capsule is driven
/// by an externally tracked position rather than purely simulated motion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapsuleFrame {
    /// Capsule center in world space.
    pub location: Vec3,
    /// Capsule yaw in degrees.
    pub yaw: f32,
    /// Capsule dimensions.
    pub capsule: CapsuleShape,
}

impl CapsuleFrame {
    /// Frame at an explicit center location.
    pub fn new(location: Vec3, yaw: f32, capsule: CapsuleShape) -> Self {
        Self {
            location,
            yaw,
            capsule,
        }
    }

    /// Frame resting on a horizontal floor whose top surface is at
    /// `floor_top`, with the standard resting clearance.
    pub fn resting_on(floor_top: f32, x: f32, z: f32, capsule: CapsuleShape) -> Self {
        Self {
            location: Vec3::new(
                x,
                floor_top + capsule.total_half_height() + REST_FLOOR_DIST,
                z,
            ),
            yaw: 0.0,
            capsule,
        }
    }

    /// The capsule's lowest point. Navigation consumers query this instead
    /// of the generic component bounds.
    pub fn feet_location(&self) -> Vec3 {
        self.location - Vec3::new(0.0, self.capsule.total_half_height(), 0.0)
    }

    /// Immersion depth of the tracked capsule. Always zero: the capsule
    /// frame does not probe swim volumes.
    pub fn immersion_depth(&self) -> f32 {
        0.0
    }
}
