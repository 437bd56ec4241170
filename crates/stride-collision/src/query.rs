//! Collision query interface consumed by the walking engine.
//!
//! The engine never owns scene geometry; it asks an implementor of
//! [`CollisionQuery`] to sweep the capsule, measure penetration, and probe
//! for floor. Queries are channel-filtered so floor detection can skip
//! physics-simulated props.

use glam::Vec3;

/// Collision channel a query runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionChannel {
    /// Geometry that blocks actor movement (world statics, movers).
    MovementBlocking,
    /// Physics-simulated props. Never produce floor hits.
    PhysicsOnly,
}

/// Vertical capsule used for all movement queries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapsuleShape {
    /// Half-height of the cylindrical segment, excluding the end caps.
    pub half_height: f32,
    /// Radius of the cylinder and end caps.
    pub radius: f32,
}

impl CapsuleShape {
    /// Creates a capsule from segment half-height and radius.
    pub fn new(half_height: f32, radius: f32) -> Self {
        Self {
            half_height,
            radius,
        }
    }

    /// Distance from the capsule center to its lowest point.
    pub fn total_half_height(&self) -> f32 {
        self.half_height + self.radius
    }
}

/// Identifier of the surface (collider owner) a query hit. Non-owning; the
/// surrounding simulation assigns these and maps them to actors.
pub type SurfaceId = u64;

/// Result of a sweep query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepHit {
    /// Fraction of the requested delta travelled before impact, in `0..=1`.
    pub fraction: f32,
    /// Capsule center at the moment of impact.
    pub location: Vec3,
    /// Contact point on the hit surface.
    pub impact_point: Vec3,
    /// Surface normal at the contact, pointing away from the surface.
    pub normal: Vec3,
    /// The capsule already overlapped the surface at sweep start.
    pub start_penetrating: bool,
    /// The surface that was hit.
    pub surface: SurfaceId,
}

/// Minimum-translation fix for a penetrating capsule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PenetrationFix {
    /// Unit direction to translate the capsule along to separate it.
    pub direction: Vec3,
    /// Overlap depth along `direction`.
    pub depth: f32,
}

/// Sweep, penetration, and floor queries against scene geometry.
///
/// Implementations must be deterministic: identical scene state and inputs
/// must produce identical results, or client replay and server
/// re-simulation will diverge.
pub trait CollisionQuery {
    /// Sweeps the capsule from `start` along `delta`, returning the first
    /// blocking hit on `channel`. A zero-length delta is a degenerate sweep
    /// and returns `None`.
    fn sweep(
        &self,
        capsule: &CapsuleShape,
        start: Vec3,
        delta: Vec3,
        channel: CollisionChannel,
    ) -> Option<SweepHit>;

    /// Measures the deepest overlap of the capsule resting at `location`
    /// against `channel` geometry. `None` when the capsule is free.
    fn penetration(
        &self,
        capsule: &CapsuleShape,
        location: Vec3,
        channel: CollisionChannel,
    ) -> Option<PenetrationFix>;

    /// Downward sweep used by floor detection. Callers pass the
    /// movement-blocking channel so physics-only props never register as
    /// floor.
    fn floor_sweep(
        &self,
        capsule: &CapsuleShape,
        location: Vec3,
        distance: f32,
        channel: CollisionChannel,
    ) -> Option<SweepHit> {
        if distance <= 0.0 {
            return None;
        }
        self.sweep(capsule, location, Vec3::new(0.0, -distance, 0.0), channel)
    }
}
