//! Based movement: standing on moving platforms.
//!
//! Platforms live in a [`BaseRegistry`] owned by the surrounding simulation;
//! the movement core holds only `net_id` handles and resolves them per tick.
//! A handle that no longer resolves degrades the actor to falling — the core
//! never keeps a platform alive.

use std::collections::HashMap;

use bevy_ecs::prelude::*;
use glam::Vec3;

use crate::mode::MovementMode;
use crate::state::{ActorMotionState, BaseReference, CapsuleFrame, FloorResult};

/// Server-replicated state of a platform actors can stand on.
#[derive(Debug, Clone, Component)]
pub struct PlatformState {
    /// Network identifier, shared with the collision scene's surface ids.
    pub net_id: u64,
    /// Platform position in world space.
    pub position: Vec3,
    /// Platform linear velocity in units per second.
    pub velocity: Vec3,
    /// Platform yaw in degrees.
    pub yaw: f32,
}

/// Registry of platform entities, keyed by network id.
///
/// Owned by the surrounding simulation; the walking engine only reads it.
pub struct BaseRegistry {
    world: World,
    by_net_id: HashMap<u64, Entity>,
}

impl BaseRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            world: World::new(),
            by_net_id: HashMap::new(),
        }
    }

    /// Registers a platform. Returns its entity handle.
    pub fn register(&mut self, platform: PlatformState) -> Entity {
        let net_id = platform.net_id;
        let entity = self.world.spawn(platform).id();
        self.by_net_id.insert(net_id, entity);
        entity
    }

    /// Removes a platform. Actors based on it will degrade to falling on
    /// their next tick.
    pub fn unregister(&mut self, net_id: u64) {
        if let Some(entity) = self.by_net_id.remove(&net_id) {
            self.world.despawn(entity);
        }
    }

    /// Looks up a platform by network id.
    pub fn get(&self, net_id: u64) -> Option<&PlatformState> {
        let entity = self.by_net_id.get(&net_id)?;
        self.world.get::<PlatformState>(*entity)
    }

    /// Updates a platform's motion state.
    pub fn set_motion(&mut self, net_id: u64, position: Vec3, velocity: Vec3) {
        if let Some(entity) = self.by_net_id.get(&net_id)
            && let Some(mut platform) = self.world.get_mut::<PlatformState>(*entity)
        {
            platform.position = position;
            platform.velocity = velocity;
        }
    }

    /// Number of registered platforms.
    pub fn len(&self) -> usize {
        self.by_net_id.len()
    }

    /// `true` when no platforms are registered.
    pub fn is_empty(&self) -> bool {
        self.by_net_id.is_empty()
    }
}

impl Default for BaseRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies the current base's motion to the capsule frame.
///
/// The base offset is fixed at zero: the capsule frame already accounts for
/// the actor's offset on the platform, so only the raw platform delta is
/// applied. A vanished base clears the reference and degrades a walking
/// actor to falling.
pub fn update_based_movement(
    state: &mut ActorMotionState,
    frame: &mut CapsuleFrame,
    bases: &BaseRegistry,
) {
    let Some(base) = &mut state.base else {
        return;
    };

    match bases.get(base.net_id) {
        Some(platform) => {
            let delta = platform.position - base.origin;
            if delta != Vec3::ZERO {
                frame.location += delta;
            }
            base.origin = platform.position;
        }
        None => {
            tracing::debug!(net_id = base.net_id, "movement base vanished; falling");
            state.base = None;
            if state.mode == MovementMode::Walking {
                state.mode = MovementMode::Falling;
            }
        }
    }
}

/// Adopts (or drops) the movement base indicated by the latest floor result.
pub fn set_base_from_floor(
    state: &mut ActorMotionState,
    floor: &FloorResult,
    bases: &BaseRegistry,
) {
    let new_base = floor
        .surface
        .and_then(|surface| bases.get(surface))
        .map(|platform| BaseReference {
            net_id: platform.net_id,
            bone: String::new(),
            origin: platform.position,
        });

    match (&state.base, &new_base) {
        (Some(old), Some(new)) if old.net_id == new.net_id => {}
        _ => state.base = new_base,
    }
}

/// Velocity the actor inherits from its base when leaving it.
///
/// Sampled at the capsule location; the capsule half height is not
/// subtracted, unlike generic component-origin sampling.
pub fn imparted_base_velocity(state: &ActorMotionState, bases: &BaseRegistry) -> Vec3 {
    state
        .base
        .as_ref()
        .and_then(|base| bases.get(base.net_id))
        .map(|platform| platform.velocity)
        .unwrap_or(Vec3::ZERO)
}
