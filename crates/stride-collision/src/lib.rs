//! Collision query service interface for the stride movement core.
//!
//! The walking engine consumes sweep/penetration/floor queries through the
//! [`CollisionQuery`] trait and never owns geometry. [`RapierScene`] is the
//! Rapier-backed adapter used by integration code and tests.

mod query;
mod rapier_scene;

pub use query::{
    CapsuleShape, CollisionChannel, CollisionQuery, PenetrationFix, SurfaceId, SweepHit,
};
pub use rapier_scene::RapierScene;
