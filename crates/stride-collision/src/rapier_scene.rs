//! Rapier-backed implementation of [`CollisionQuery`].
//!
//! Owns all Rapier state behind a single [`RapierScene`], mirroring the
//! engine-side physics wrapper. Movement code only ever sees the
//! [`CollisionQuery`] trait; this adapter exists so integration code and
//! tests have a real backend to run against.

use std::collections::HashMap;

use glam::Vec3;
use rapier3d::parry::query::ShapeCastOptions;
use rapier3d::prelude::*;

use crate::query::{
    CapsuleShape, CollisionChannel, CollisionQuery, PenetrationFix, SurfaceId, SweepHit,
};

/// Collision scene owning Rapier broad/narrow phase state and a registry of
/// surface identifiers.
pub struct RapierScene {
    /// Timestep and solver configuration (only used to refresh queries).
    pub integration_parameters: IntegrationParameters,
    /// The main simulation pipeline, run with zero gravity to rebuild
    /// acceleration structures after geometry edits.
    pub physics_pipeline: PhysicsPipeline,
    /// Tracks sleeping/awake body islands.
    pub island_manager: IslandManager,
    /// Broad-phase collision detection (also provides the query pipeline).
    pub broad_phase: BroadPhaseBvh,
    /// Narrow-phase collision detection.
    pub narrow_phase: NarrowPhase,
    /// All rigid bodies in the scene.
    pub rigid_body_set: RigidBodySet,
    /// All colliders in the scene.
    pub collider_set: ColliderSet,
    /// Impulse-based joints (unused, required by the pipeline).
    pub impulse_joint_set: ImpulseJointSet,
    /// Multibody joints (unused, required by the pipeline).
    pub multibody_joint_set: MultibodyJointSet,
    /// Continuous collision detection solver.
    pub ccd_solver: CCDSolver,

    surfaces: HashMap<ColliderHandle, SurfaceId>,
    handles: HashMap<SurfaceId, (RigidBodyHandle, ColliderHandle)>,
    next_surface: SurfaceId,
}

/// Collision group memberships per channel.
fn channel_memberships(channel: CollisionChannel) -> Group {
    match channel {
        CollisionChannel::MovementBlocking => Group::GROUP_1,
        CollisionChannel::PhysicsOnly => Group::GROUP_2,
    }
}

/// Query-side interaction groups: match only colliders on `channel`.
fn channel_filter(channel: CollisionChannel) -> InteractionGroups {
    InteractionGroups::new(Group::ALL, channel_memberships(channel), InteractionTestMode::And)
}

impl RapierScene {
    /// Creates an empty scene.
    pub fn new() -> Self {
        Self {
            integration_parameters: IntegrationParameters {
                dt: 1.0 / 60.0,
                ..Default::default()
            },
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: BroadPhaseBvh::new(),
            narrow_phase: NarrowPhase::new(),
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            surfaces: HashMap::new(),
            handles: HashMap::new(),
            next_surface: 1,
        }
    }

    /// Adds a fixed axis-aligned box. Returns its surface id.
    pub fn add_box(
        &mut self,
        center: Vec3,
        half_extents: Vec3,
        channel: CollisionChannel,
    ) -> SurfaceId {
        self.add_box_rotated(center, half_extents, 0.0, channel)
    }

    /// Adds a fixed box rotated `z_angle_rad` around the Z axis (ramps).
    /// Returns its surface id.
    pub fn add_box_rotated(
        &mut self,
        center: Vec3,
        half_extents: Vec3,
        z_angle_rad: f32,
        channel: CollisionChannel,
    ) -> SurfaceId {
        let body = RigidBodyBuilder::fixed()
            .translation(Vector::new(center.x, center.y, center.z))
            .rotation(Vector::new(0.0, 0.0, z_angle_rad))
            .build();
        let body_handle = self.rigid_body_set.insert(body);

        let collider = ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z)
            .collision_groups(InteractionGroups::new(
                channel_memberships(channel),
                Group::ALL,
                InteractionTestMode::And,
            ))
            .build();
        let collider_handle =
            self.collider_set
                .insert_with_parent(collider, body_handle, &mut self.rigid_body_set);

        let id = self.next_surface;
        self.next_surface += 1;
        self.surfaces.insert(collider_handle, id);
        self.handles.insert(id, (body_handle, collider_handle));
        self.refresh();
        id
    }

    /// Removes a surface and its body from the scene.
    pub fn remove_surface(&mut self, id: SurfaceId) {
        if let Some((body_handle, collider_handle)) = self.handles.remove(&id) {
            self.surfaces.remove(&collider_handle);
            self.rigid_body_set.remove(
                body_handle,
                &mut self.island_manager,
                &mut self.collider_set,
                &mut self.impulse_joint_set,
                &mut self.multibody_joint_set,
                true,
            );
            self.refresh();
        }
    }

    /// Teleports a surface's body (platform movers).
    pub fn set_surface_translation(&mut self, id: SurfaceId, center: Vec3) {
        if let Some((body_handle, _)) = self.handles.get(&id)
            && let Some(body) = self.rigid_body_set.get_mut(*body_handle)
        {
            body.set_translation(Vector::new(center.x, center.y, center.z), true);
            self.refresh();
        }
    }

    /// Rebuilds acceleration structures after geometry edits. The scene only
    /// holds fixed bodies, so stepping the pipeline moves nothing.
    pub fn refresh(&mut self) {
        self.physics_pipeline.step(
            Vector::ZERO,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            &(),
            &(),
        );
    }

    fn surface_id(&self, handle: ColliderHandle) -> SurfaceId {
        self.surfaces.get(&handle).copied().unwrap_or(0)
    }
}

impl Default for RapierScene {
    fn default() -> Self {
        Self::new()
    }
}

impl RapierScene {
    fn cast(
        &self,
        capsule: &CapsuleShape,
        start: Vec3,
        delta: Vec3,
        channel: CollisionChannel,
        stop_at_penetration: bool,
    ) -> Option<SweepHit> {
        let len = delta.length();
        if len <= f32::EPSILON {
            // Degenerate sweep: treated as "no hit" per the error taxonomy.
            return None;
        }

        let shape = Capsule::new_y(capsule.half_height, capsule.radius);
        let shape_pos = Pose::translation(start.x, start.y, start.z);
        let shape_vel = Vector::new(delta.x, delta.y, delta.z);

        let filter = QueryFilter::new().groups(channel_filter(channel));
        let query_pipeline = self.broad_phase.as_query_pipeline(
            self.narrow_phase.query_dispatcher(),
            &self.rigid_body_set,
            &self.collider_set,
            filter,
        );

        let options = ShapeCastOptions {
            max_time_of_impact: 1.0,
            target_distance: 0.0,
            stop_at_penetration,
            compute_impact_geometry_on_penetration: true,
        };

        let (handle, hit) = query_pipeline.cast_shape(&shape_pos, shape_vel, &shape, options)?;

        let start_penetrating = matches!(
            hit.status,
            rapier3d::parry::query::ShapeCastStatus::PenetratingOrWithinTargetDist
        );
        let fraction = hit.time_of_impact.clamp(0.0, 1.0);

        // Normal on the hit surface, oriented against the sweep direction.
        let mut normal = Vec3::new(hit.normal2.x, hit.normal2.y, hit.normal2.z);
        if normal.length_squared() > f32::EPSILON {
            normal = normal.normalize();
            if normal.dot(delta) > 0.0 {
                normal = -normal;
            }
        } else {
            normal = Vec3::ZERO;
        }

        Some(SweepHit {
            fraction,
            location: start + delta * fraction,
            impact_point: Vec3::new(hit.witness2.x, hit.witness2.y, hit.witness2.z),
            normal,
            start_penetrating,
            surface: self.surface_id(handle),
        })
    }
}

impl CollisionQuery for RapierScene {
    fn sweep(
        &self,
        capsule: &CapsuleShape,
        start: Vec3,
        delta: Vec3,
        channel: CollisionChannel,
    ) -> Option<SweepHit> {
        // Movement sweeps report initial overlaps so the caller can retain
        // the hit and resolve the penetration itself.
        self.cast(capsule, start, delta, channel, true)
    }

    /// Downward probe that ignores overlaps the motion does not deepen: a
    /// capsule laterally stuck in a wall must still find the floor beneath
    /// it instead of reporting the wall at zero distance.
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
        self.cast(
            capsule,
            location,
            Vec3::new(0.0, -distance, 0.0),
            channel,
            false,
        )
    }

    fn penetration(
        &self,
        capsule: &CapsuleShape,
        location: Vec3,
        channel: CollisionChannel,
    ) -> Option<PenetrationFix> {
        let shape = Capsule::new_y(capsule.half_height, capsule.radius);
        let shape_pos = Pose::translation(location.x, location.y, location.z);

        let filter = QueryFilter::new().groups(channel_filter(channel));
        let query_pipeline = self.broad_phase.as_query_pipeline(
            self.narrow_phase.query_dispatcher(),
            &self.rigid_body_set,
            &self.collider_set,
            filter,
        );

        let (handle, _) = query_pipeline.intersect_shape(shape_pos, &shape).next()?;
        let collider = self.collider_set.get(handle)?;

        let contact = rapier3d::parry::query::contact(
            &shape_pos,
            &shape,
            collider.position(),
            collider.shape(),
            0.0,
        )
        .ok()
        .flatten()?;

        if contact.dist >= 0.0 {
            return None;
        }

        // normal1 points out of the capsule toward the obstacle; separate
        // along the opposite direction.
        let direction = -Vec3::new(contact.normal1.x, contact.normal1.y, contact.normal1.z);
        if direction.length_squared() <= f32::EPSILON {
            return None;
        }

        Some(PenetrationFix {
            direction: direction.normalize(),
            depth: -contact.dist,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
