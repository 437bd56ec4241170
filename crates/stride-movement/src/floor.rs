//! Floor detection relative to the tracked capsule frame.

use glam::Vec3;
use stride_collision::{CollisionChannel, CollisionQuery};

use crate::state::{CapsuleFrame, FloorResult};

/// Extra probe distance below the step height when sweeping for floor.
const FLOOR_PROBE_EXTRA: f32 = 0.1;

/// Normals shorter than this are degenerate and yield "no floor".
const DEGENERATE_NORMAL: f32 = 1e-4;

/// Sweeps downward from the capsule-frame location for floor.
///
/// Queries run on the movement-blocking channel exclusively, so
/// physics-simulated props never register as floor. A degenerate sweep or
/// normal is reported as "no floor", which drives the mode to falling
/// rather than surfacing an error.
pub fn find_floor(
    scene: &dyn CollisionQuery,
    frame: &CapsuleFrame,
    walkable_y: f32,
    max_step_height: f32,
) -> FloorResult {
    let probe = max_step_height + FLOOR_PROBE_EXTRA;
    let Some(hit) = scene.floor_sweep(
        &frame.capsule,
        frame.location,
        probe,
        CollisionChannel::MovementBlocking,
    ) else {
        return FloorResult::no_floor();
    };

    if hit.normal.length_squared() < DEGENERATE_NORMAL {
        return FloorResult::no_floor();
    }

    let distance = if hit.start_penetrating {
        0.0
    } else {
        hit.fraction * probe
    };

    FloorResult {
        blocking_hit: true,
        walkable: hit.normal.y >= walkable_y && hit.normal.y > DEGENERATE_NORMAL,
        distance,
        normal: hit.normal,
        surface: Some(hit.surface),
    }
}

/// Ground movement delta along the floor plane.
///
/// Keeps the horizontal components and derives the vertical one from the
/// floor normal, so slope ascent/descent preserves horizontal speed. The
/// parallel sweep direction is what keeps client and server ramp movement
/// identical.
pub fn ground_movement_delta(delta: Vec3, floor: &FloorResult) -> Vec3 {
    if !floor.is_walkable_floor() || floor.normal.y <= DEGENERATE_NORMAL {
        return Vec3::new(delta.x, 0.0, delta.z);
    }
    let n = floor.normal;
    let y = -(n.x * delta.x + n.z * delta.z) / n.y;
    Vec3::new(delta.x, y, delta.z)
}
