//! Step-up: climbing ledges the forward sweep cannot cross.

use glam::Vec3;
use stride_collision::{CollisionChannel, CollisionQuery, SweepHit};

use crate::state::CapsuleFrame;

/// Clearance kept from swept surfaces.
const STEP_SKIN: f32 = 0.01;

/// Minimum forward progress for a step-up to count.
const MIN_STEP_PROGRESS: f32 = 0.01;

/// Attempts to climb over the obstacle described by `hit`.
///
/// Runs from the *actual* capsule-frame location — the frame may have been
/// adjusted out of penetration this tick, and `hit` is the retained initial
/// hit from before that adjustment. Sequence: sweep up by the step height,
/// sweep forward the blocked remainder (at least one capsule radius, so the
/// landing rests on the ledge interior rather than its edge), sweep back
/// down, and accept only a walkable landing that rises no more than
/// `max_step_height`.
///
/// Returns `true` and updates the frame on success.
pub fn step_up(
    scene: &dyn CollisionQuery,
    frame: &mut CapsuleFrame,
    remaining: Vec3,
    hit: &SweepHit,
    max_step_height: f32,
    walkable_y: f32,
) -> bool {
    let horizontal = Vec3::new(remaining.x, 0.0, remaining.z);
    if horizontal.length() <= MIN_STEP_PROGRESS || max_step_height <= 0.0 {
        return false;
    }
    let forward_len = horizontal
        .length()
        .max(frame.capsule.radius + 2.0 * STEP_SKIN);
    let forward = horizontal.normalize() * forward_len;

    // The retained hit caps how high the obstacle edge sits; an impact above
    // the step ceiling can never be climbed.
    let feet_y = frame.location.y - frame.capsule.total_half_height();
    if hit.impact_point.y > feet_y + max_step_height + frame.capsule.radius {
        return false;
    }

    let original = frame.location;
    let channel = CollisionChannel::MovementBlocking;
    let mut location = original;

    // 1. Up.
    let mut rise = max_step_height;
    match scene.sweep(&frame.capsule, location, Vec3::new(0.0, rise, 0.0), channel) {
        Some(up_hit) if up_hit.start_penetrating => return false,
        Some(up_hit) => {
            rise *= (up_hit.fraction - STEP_SKIN / rise).max(0.0);
        }
        None => {}
    }
    if rise <= MIN_STEP_PROGRESS {
        return false;
    }
    location.y += rise;

    // 2. Forward.
    match scene.sweep(&frame.capsule, location, forward, channel) {
        Some(fwd_hit) if fwd_hit.start_penetrating => return false,
        Some(fwd_hit) => {
            let applied = (fwd_hit.fraction - STEP_SKIN / forward_len).max(0.0);
            location += forward * applied;
        }
        None => location += forward,
    }
    let progress = Vec3::new(
        location.x - original.x,
        0.0,
        location.z - original.z,
    )
    .length();
    if progress <= MIN_STEP_PROGRESS {
        return false;
    }

    // 3. Down onto the ledge.
    match scene.sweep(&frame.capsule, location, Vec3::new(0.0, -rise, 0.0), channel) {
        Some(down_hit) if down_hit.start_penetrating => return false,
        Some(down_hit) => {
            if down_hit.normal.y < walkable_y {
                return false;
            }
            let applied = (down_hit.fraction - STEP_SKIN / rise).max(0.0);
            location.y -= rise * applied;
        }
        // Nothing within the step height below: the surface ahead is not a
        // step, it's level with (or lower than) the start.
        None => return false,
    }

    // Accept only an actual rise within the step budget.
    let rise_total = location.y - original.y;
    if rise_total <= STEP_SKIN || rise_total > max_step_height + STEP_SKIN {
        return false;
    }

    frame.location = location;
    true
}
