//! The floor-relative walking engine.
//!
//! One instance runs on the client (prediction + replay) and one on the
//! server (authoritative re-simulation). Given identical starting state and
//! inputs, both must produce identical results; everything here is plain
//! arithmetic over the collision trait, no hidden state.

use glam::Vec3;
use stride_collision::{CollisionChannel, CollisionQuery, SweepHit};
use stride_config::MovementConfig;

use crate::based::{self, BaseRegistry};
use crate::floor::{find_floor, ground_movement_delta};
use crate::mode::MovementMode;
use crate::state::{ActorMotionState, CapsuleFrame, FloorResult, REST_FLOOR_DIST};
use crate::step_up::step_up;

/// Clearance kept from swept surfaces.
const SWEEP_SKIN: f32 = 0.01;

/// Extra separation applied when resolving penetration.
const PENETRATION_EXTRA: f32 = 0.001;

/// Dead zone around the resting floor distance before snapping.
const FLOOR_SNAP_TOLERANCE: f32 = 0.005;

/// Upward velocity applied on jump (units/s).
const JUMP_IMPULSE: f32 = 7.0;

/// Exponential ground braking rate with no input (per second).
const GROUND_FRICTION: f32 = 8.0;

/// Fraction of input acceleration available while airborne.
const AIR_CONTROL: f32 = 0.25;

/// One simulated tick's worth of inputs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MoveInput {
    /// World-space input acceleration, units/s².
    pub acceleration: Vec3,
    /// Externally tracked capsule displacement for this tick. This is what
    /// makes the capsule start ticks inside geometry: the tracked hardware
    /// moves it without consulting collision.
    pub tracked_delta: Vec3,
    /// Capsule yaw for this tick, degrees.
    pub yaw: f32,
    /// Jump was pressed this tick.
    pub jump: bool,
    /// Velocity requested by path following, overriding acceleration.
    pub requested_velocity: Option<Vec3>,
    /// Procedural root motion, applied only in [`MovementMode::Custom`].
    pub root_motion: Option<RootMotion>,
}

/// Procedural root motion for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RootMotion {
    /// Translation to apply this tick.
    pub translation: Vec3,
    /// Yaw delta to apply this tick, degrees.
    pub yaw: f32,
}

/// Result of a capsule move, including the retained initial hit when the
/// frame started the tick in penetration.
struct MoveOutcome {
    blocking_hit: Option<SweepHit>,
    initial_hit: Option<SweepHit>,
    fraction: f32,
}

impl MoveOutcome {
    fn unobstructed() -> Self {
        Self {
            blocking_hit: None,
            initial_hit: None,
            fraction: 1.0,
        }
    }
}

fn project_onto_plane(v: Vec3, n: Vec3) -> Vec3 {
    if n.length_squared() <= f32::EPSILON {
        return v;
    }
    v - n * v.dot(n)
}

/// Floor-relative walking physics, parameterized by [`MovementConfig`].
pub struct WalkingEngine {
    cfg: MovementConfig,
}

impl WalkingEngine {
    /// Creates an engine, clamping config values to their documented bounds.
    pub fn new(mut cfg: MovementConfig) -> Self {
        cfg.wall_repulsion_multiplier = cfg.wall_repulsion_multiplier.clamp(0.01, 1.0);
        cfg.walkable_floor_angle_deg = cfg.walkable_floor_angle_deg.clamp(0.0, 89.0);
        Self { cfg }
    }

    /// The engine's effective configuration.
    pub fn config(&self) -> &MovementConfig {
        &self.cfg
    }

    /// Minimum floor-normal Y for a walkable surface.
    fn walkable_y(&self) -> f32 {
        self.cfg.walkable_floor_angle_deg.to_radians().cos()
    }

    /// Runs one simulation tick.
    ///
    /// Mutates `state` and `frame` only; the scene and base registry are
    /// read-only collaborators.
    pub fn simulate(
        &self,
        state: &mut ActorMotionState,
        frame: &mut CapsuleFrame,
        input: &MoveInput,
        dt: f32,
        scene: &dyn CollisionQuery,
        bases: &BaseRegistry,
    ) {
        if !(dt > 0.0) {
            return;
        }

        frame.yaw = input.yaw;
        state.rotation.yaw = input.yaw;
        state.acceleration = input.acceleration;

        based::update_based_movement(state, frame, bases);

        match state.mode {
            MovementMode::Walking => self.phys_walking(state, frame, input, dt, scene, bases),
            MovementMode::Falling => self.phys_falling(state, frame, input, dt, scene, bases),
            MovementMode::Flying | MovementMode::Swimming => {
                self.phys_flying(state, frame, input, dt, scene)
            }
            MovementMode::Custom => self.phys_scripted(state, frame, input, dt, scene),
            MovementMode::None => {}
        }

        state.position = frame.location;
    }

    fn phys_walking(
        &self,
        state: &mut ActorMotionState,
        frame: &mut CapsuleFrame,
        input: &MoveInput,
        dt: f32,
        scene: &dyn CollisionQuery,
        bases: &BaseRegistry,
    ) {
        let walkable_y = self.walkable_y();

        if input.jump {
            let imparted = based::imparted_base_velocity(state, bases);
            state.velocity.y = JUMP_IMPULSE;
            state.velocity += imparted;
            state.base = None;
            state.mode = MovementMode::Falling;
            self.phys_falling(state, frame, input, dt, scene, bases);
            return;
        }

        // Ground-plane velocity update. Path following drives velocity
        // directly; otherwise integrate acceleration with braking friction.
        let mut velocity = match input.requested_velocity {
            Some(requested) => Vec3::new(requested.x, 0.0, requested.z),
            None => {
                let mut v = state.velocity + input.acceleration * dt;
                v.y = 0.0;
                if input.acceleration.length_squared() <= f32::EPSILON {
                    v *= (1.0 - GROUND_FRICTION * dt).max(0.0);
                }
                v
            }
        };
        let speed = velocity.length();
        if speed > self.cfg.max_walk_speed {
            velocity *= self.cfg.max_walk_speed / speed;
        }

        // Desired delta: slope-projected velocity plus the externally
        // tracked capsule displacement.
        let delta = ground_movement_delta(velocity * dt, &state.floor) + input.tracked_delta;
        let outcome = self.safe_move(frame, delta, scene);

        let hit = outcome
            .blocking_hit
            .as_ref()
            .or(outcome.initial_hit.as_ref());
        if let Some(hit) = hit
            && hit.normal.y < walkable_y
        {
            let remaining = delta * (1.0 - outcome.fraction);
            if self.cfg.allow_walking_through_walls {
                frame.location += remaining;
            } else {
                // Repulsion/slide response, then a step-up attempt with the
                // retained initial hit from the actual frame location.
                let slide =
                    project_onto_plane(remaining, hit.normal) * self.cfg.wall_repulsion_multiplier;
                self.safe_move(frame, slide, scene);
                let step_hit = outcome.initial_hit.as_ref().unwrap_or(hit);
                step_up(
                    scene,
                    frame,
                    remaining,
                    step_hit,
                    self.cfg.max_step_height,
                    walkable_y,
                );
            }
        }

        // Floor maintenance from the capsule frame, never the generic
        // transform.
        let floor = find_floor(scene, frame, walkable_y, self.cfg.max_step_height);
        if floor.is_walkable_floor() {
            let adjust = floor.distance - REST_FLOOR_DIST;
            if adjust.abs() > FLOOR_SNAP_TOLERANCE {
                frame.location.y -= adjust;
            }
            state.floor = floor;
            based::set_base_from_floor(state, &floor, bases);
            state.velocity = velocity;
        } else {
            tracing::trace!("floor lost while walking; falling");
            let imparted = based::imparted_base_velocity(state, bases);
            state.floor = floor;
            state.base = None;
            state.mode = MovementMode::Falling;
            state.velocity = velocity + imparted;
        }
    }

    fn phys_falling(
        &self,
        state: &mut ActorMotionState,
        frame: &mut CapsuleFrame,
        input: &MoveInput,
        dt: f32,
        scene: &dyn CollisionQuery,
        bases: &BaseRegistry,
    ) {
        let walkable_y = self.walkable_y();

        let mut velocity = state.velocity;
        velocity.y += self.cfg.gravity_y * dt;
        velocity += Vec3::new(input.acceleration.x, 0.0, input.acceleration.z) * AIR_CONTROL * dt;

        let horizontal = Vec3::new(velocity.x, 0.0, velocity.z);
        let hspeed = horizontal.length();
        if hspeed > self.cfg.max_walk_speed {
            let scaled = horizontal * (self.cfg.max_walk_speed / hspeed);
            velocity.x = scaled.x;
            velocity.z = scaled.z;
        }

        let delta = velocity * dt + input.tracked_delta;
        let outcome = self.safe_move(frame, delta, scene);

        if let Some(hit) = outcome.blocking_hit.as_ref()
            && hit.normal.y < walkable_y
        {
            // Steep surface: slide the remainder and kill velocity into it.
            let remaining = delta * (1.0 - outcome.fraction);
            let slide = project_onto_plane(remaining, hit.normal);
            self.safe_move(frame, slide, scene);
            velocity = project_onto_plane(velocity, hit.normal);
        }

        let floor = find_floor(scene, frame, walkable_y, self.cfg.max_step_height);
        if floor.is_walkable_floor()
            && velocity.y <= 0.0
            && floor.distance <= REST_FLOOR_DIST + FLOOR_SNAP_TOLERANCE
        {
            self.process_landed(state, frame, floor, velocity, bases);
            return;
        }

        state.floor = floor;
        state.velocity = velocity;
    }

    fn phys_flying(
        &self,
        state: &mut ActorMotionState,
        frame: &mut CapsuleFrame,
        input: &MoveInput,
        dt: f32,
        scene: &dyn CollisionQuery,
    ) {
        let mut velocity = match input.requested_velocity {
            Some(requested) => requested,
            None => state.velocity + input.acceleration * dt,
        };
        let speed = velocity.length();
        if speed > self.cfg.max_walk_speed {
            velocity *= self.cfg.max_walk_speed / speed;
        }

        let delta = velocity * dt + input.tracked_delta;
        let outcome = self.safe_move(frame, delta, scene);

        if let Some(hit) = outcome.blocking_hit.as_ref() {
            let remaining = delta * (1.0 - outcome.fraction);
            let slide = project_onto_plane(remaining, hit.normal);
            self.safe_move(frame, slide, scene);
            velocity = project_onto_plane(velocity, hit.normal);
        }

        state.floor = FloorResult::no_floor();
        state.velocity = velocity;
    }

    fn phys_scripted(
        &self,
        state: &mut ActorMotionState,
        frame: &mut CapsuleFrame,
        input: &MoveInput,
        dt: f32,
        scene: &dyn CollisionQuery,
    ) {
        let Some(root_motion) = &input.root_motion else {
            return;
        };

        frame.yaw += root_motion.yaw;
        state.rotation.yaw = frame.yaw;

        let delta = root_motion.translation + input.tracked_delta;
        self.safe_move(frame, delta, scene);
        state.velocity = root_motion.translation / dt;
    }

    fn process_landed(
        &self,
        state: &mut ActorMotionState,
        frame: &mut CapsuleFrame,
        floor: FloorResult,
        velocity: Vec3,
        bases: &BaseRegistry,
    ) {
        tracing::trace!("landed; falling -> walking");
        state.mode = MovementMode::Walking;
        state.velocity = Vec3::new(velocity.x, 0.0, velocity.z);

        let adjust = floor.distance - REST_FLOOR_DIST;
        if adjust.abs() > FLOOR_SNAP_TOLERANCE {
            frame.location.y -= adjust;
        }
        state.floor = floor;
        based::set_base_from_floor(state, &floor, bases);
    }

    /// Sweep-moves the capsule frame along `delta`.
    ///
    /// When the frame starts the tick in penetration, the initial hit is
    /// retained for step-up evaluation instead of being discarded, and
    /// penetration is re-checked only *after* the positional adjustment —
    /// checking before falsely rejects legitimate step-ups, because the
    /// tracked capsule routinely begins ticks overlapping geometry.
    fn safe_move(
        &self,
        frame: &mut CapsuleFrame,
        delta: Vec3,
        scene: &dyn CollisionQuery,
    ) -> MoveOutcome {
        let len = delta.length();
        if len <= f32::EPSILON {
            return MoveOutcome::unobstructed();
        }
        let channel = CollisionChannel::MovementBlocking;

        match scene.sweep(&frame.capsule, frame.location, delta, channel) {
            None => {
                frame.location += delta;
                MoveOutcome::unobstructed()
            }
            Some(hit) if hit.start_penetrating => {
                let initial = hit;
                if let Some(fix) = scene.penetration(&frame.capsule, frame.location, channel) {
                    frame.location += fix.direction * (fix.depth + PENETRATION_EXTRA);
                }

                match scene.sweep(&frame.capsule, frame.location, delta, channel) {
                    None => {
                        frame.location += delta;
                        MoveOutcome {
                            blocking_hit: None,
                            initial_hit: Some(initial),
                            fraction: 1.0,
                        }
                    }
                    Some(second) if second.start_penetrating => MoveOutcome {
                        blocking_hit: Some(second),
                        initial_hit: Some(initial),
                        fraction: 0.0,
                    },
                    Some(second) => {
                        let applied = (second.fraction - SWEEP_SKIN / len).max(0.0);
                        frame.location += delta * applied;
                        MoveOutcome {
                            blocking_hit: Some(second),
                            initial_hit: Some(initial),
                            fraction: applied,
                        }
                    }
                }
            }
            Some(hit) => {
                let applied = (hit.fraction - SWEEP_SKIN / len).max(0.0);
                frame.location += delta * applied;
                MoveOutcome {
                    blocking_hit: Some(hit),
                    initial_hit: None,
                    fraction: applied,
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use stride_collision::{CapsuleShape, RapierScene};

    const DT: f32 = 1.0 / 60.0;

    fn capsule() -> CapsuleShape {
        CapsuleShape::new(0.6, 0.3)
    }

    fn engine() -> WalkingEngine {
        WalkingEngine::new(MovementConfig::default())
    }

    fn flat_scene() -> RapierScene {
        let mut scene = RapierScene::new();
        scene.add_box(
            Vec3::new(0.0, -0.5, 0.0),
            Vec3::new(50.0, 0.5, 50.0),
            CollisionChannel::MovementBlocking,
        );
        scene
    }

    fn walking_state(scene: &RapierScene, frame: &CapsuleFrame, eng: &WalkingEngine) -> ActorMotionState {
        let floor = find_floor(scene, frame, eng.walkable_y(), eng.config().max_step_height);
        ActorMotionState {
            position: frame.location,
            mode: MovementMode::Walking,
            floor,
            ..Default::default()
        }
    }

    fn accel(x: f32, z: f32) -> MoveInput {
        MoveInput {
            acceleration: Vec3::new(x, 0.0, z),
            ..Default::default()
        }
    }

    #[test]
    fn test_at_rest_on_flat_floor_is_stationary() {
        let scene = flat_scene();
        let eng = engine();
        let bases = BaseRegistry::new();
        let mut frame = CapsuleFrame::resting_on(0.0, 0.0, 0.0, capsule());
        let mut state = walking_state(&scene, &frame, &eng);
        let start = frame.location;

        for _ in 0..10 {
            eng.simulate(&mut state, &mut frame, &MoveInput::default(), DT, &scene, &bases);
        }

        assert_eq!(state.mode, MovementMode::Walking);
        assert!(
            (frame.location - start).length() < 1e-4,
            "at rest with zero acceleration must not drift: moved {:?}",
            frame.location - start
        );
        assert!(state.floor.is_walkable_floor());
    }

    #[test]
    fn test_walks_on_walkable_slope() {
        let mut scene = RapierScene::new();
        // 30° ramp rising toward +X; below the 45° walkable threshold.
        scene.add_box_rotated(
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(10.0, 0.1, 10.0),
            30.0_f32.to_radians(),
            CollisionChannel::MovementBlocking,
        );
        let eng = engine();
        let bases = BaseRegistry::new();

        // Drop onto the ramp first.
        let mut frame = CapsuleFrame::new(Vec3::new(0.0, 3.0, 0.0), 0.0, capsule());
        let mut state = ActorMotionState {
            mode: MovementMode::Falling,
            ..Default::default()
        };
        for _ in 0..240 {
            eng.simulate(&mut state, &mut frame, &MoveInput::default(), DT, &scene, &bases);
            if state.mode == MovementMode::Walking {
                break;
            }
        }
        assert_eq!(state.mode, MovementMode::Walking, "should land on the 30° ramp");

        // Accelerate uphill (+X). Mode must stay Walking with slope-projected
        // movement (the capsule rises as it advances).
        let start = frame.location;
        for _ in 0..60 {
            eng.simulate(&mut state, &mut frame, &accel(20.0, 0.0), DT, &scene, &bases);
            assert_eq!(state.mode, MovementMode::Walking);
        }
        assert!(frame.location.x > start.x + 0.5, "should advance uphill");
        assert!(
            frame.location.y > start.y + 0.2,
            "slope-projected movement should raise the capsule: dy={}",
            frame.location.y - start.y
        );
        assert!(state.floor.walkable);
    }

    #[test]
    fn test_start_penetrating_wall_resolves_without_sticking() {
        let mut scene = flat_scene();
        // Wall face at x=4.5.
        scene.add_box(
            Vec3::new(5.0, 1.5, 0.0),
            Vec3::new(0.5, 1.5, 50.0),
            CollisionChannel::MovementBlocking,
        );
        let eng = engine();
        let bases = BaseRegistry::new();

        // Capsule starts the tick 2cm inside the wall, as happens when the
        // tracked position drives it in between ticks.
        let mut frame = CapsuleFrame::resting_on(0.0, 4.22, 0.0, capsule());
        let mut state = walking_state(&scene, &frame, &eng);

        for _ in 0..5 {
            eng.simulate(&mut state, &mut frame, &accel(30.0, 0.0), DT, &scene, &bases);
        }

        assert_eq!(state.mode, MovementMode::Walking, "must not report a stuck state");
        assert!(frame.location.is_finite());
        assert!(
            scene
                .penetration(&capsule(), frame.location, CollisionChannel::MovementBlocking)
                .is_none(),
            "penetration must be resolved after the adjustment"
        );
        assert!(
            frame.location.x + capsule().radius <= 4.5 + 1e-3,
            "capsule must not end up inside the wall: x={}",
            frame.location.x
        );
    }

    #[test]
    fn test_falling_lands_on_floor() {
        let scene = flat_scene();
        let eng = engine();
        let bases = BaseRegistry::new();

        let mut frame = CapsuleFrame::new(Vec3::new(0.0, 3.0, 0.0), 0.0, capsule());
        let mut state = ActorMotionState {
            mode: MovementMode::Falling,
            ..Default::default()
        };

        let mut landed_at = None;
        for tick in 0..240 {
            eng.simulate(&mut state, &mut frame, &MoveInput::default(), DT, &scene, &bases);
            if state.mode == MovementMode::Walking {
                landed_at = Some(tick);
                break;
            }
        }

        assert!(landed_at.is_some(), "should land within 4 seconds");
        assert_eq!(state.velocity.y, 0.0);
        let feet = frame.feet_location().y;
        assert!(
            (feet - REST_FLOOR_DIST).abs() < 0.02,
            "should rest just above the floor: feet={feet}"
        );
    }

    #[test]
    fn test_walks_up_small_ledge() {
        let mut scene = flat_scene();
        // 0.3-high ledge starting at x=2, below the 0.5 step height.
        scene.add_box(
            Vec3::new(7.0, 0.15, 0.0),
            Vec3::new(5.0, 0.15, 50.0),
            CollisionChannel::MovementBlocking,
        );
        let eng = engine();
        let bases = BaseRegistry::new();

        let mut frame = CapsuleFrame::resting_on(0.0, 1.0, 0.0, capsule());
        let mut state = walking_state(&scene, &frame, &eng);

        for _ in 0..120 {
            eng.simulate(&mut state, &mut frame, &accel(30.0, 0.0), DT, &scene, &bases);
        }

        assert!(
            frame.location.x > 2.0,
            "should have stepped onto the ledge: x={}",
            frame.location.x
        );
        assert!(
            frame.feet_location().y > 0.25,
            "feet should be on the ledge top: feet={}",
            frame.feet_location().y
        );
        assert_eq!(state.mode, MovementMode::Walking);
    }

    #[test]
    fn test_walks_off_ledge_into_falling() {
        let mut scene = RapierScene::new();
        // Small platform with its top at 0.5.
        scene.add_box(
            Vec3::new(0.0, 0.25, 0.0),
            Vec3::new(1.0, 0.25, 1.0),
            CollisionChannel::MovementBlocking,
        );
        let eng = engine();
        let bases = BaseRegistry::new();

        let mut frame = CapsuleFrame::resting_on(0.5, 0.0, 0.0, capsule());
        let mut state = walking_state(&scene, &frame, &eng);
        assert!(state.floor.is_walkable_floor());

        let mut fell = false;
        for _ in 0..240 {
            eng.simulate(&mut state, &mut frame, &accel(30.0, 0.0), DT, &scene, &bases);
            if state.mode == MovementMode::Falling {
                fell = true;
                break;
            }
        }
        assert!(fell, "walking past the platform edge should transition to falling");
    }

    #[test]
    fn test_wall_repulsion_multiplier_scales_slide() {
        let slide_distance = |multiplier: f32| -> f32 {
            let mut scene = flat_scene();
            // Wall face at z=1.0, running along X.
            scene.add_box(
                Vec3::new(0.0, 1.5, 1.5),
                Vec3::new(50.0, 1.5, 0.5),
                CollisionChannel::MovementBlocking,
            );
            let cfg = MovementConfig {
                wall_repulsion_multiplier: multiplier,
                ..Default::default()
            };
            let eng = WalkingEngine::new(cfg);
            let bases = BaseRegistry::new();

            // Start against the wall, pushing diagonally into it.
            let mut frame = CapsuleFrame::resting_on(0.0, 0.0, 0.65, capsule());
            let mut state = walking_state(&scene, &frame, &eng);
            for _ in 0..60 {
                eng.simulate(&mut state, &mut frame, &accel(20.0, 20.0), DT, &scene, &bases);
            }
            assert!(
                frame.location.z + capsule().radius <= 1.0 + 1e-3,
                "must not cross the wall plane: z={}",
                frame.location.z
            );
            frame.location.x
        };

        let low = slide_distance(0.05);
        let high = slide_distance(1.0);
        assert!(
            high > low + 0.1,
            "higher repulsion multiplier should slide farther: low={low}, high={high}"
        );
    }

    #[test]
    fn test_allow_walking_through_walls_passes_through() {
        let mut scene = flat_scene();
        scene.add_box(
            Vec3::new(3.0, 1.5, 0.0),
            Vec3::new(0.2, 1.5, 50.0),
            CollisionChannel::MovementBlocking,
        );
        let cfg = MovementConfig {
            allow_walking_through_walls: true,
            ..Default::default()
        };
        let eng = WalkingEngine::new(cfg);
        let bases = BaseRegistry::new();

        let mut frame = CapsuleFrame::resting_on(0.0, 2.0, 0.0, capsule());
        let mut state = walking_state(&scene, &frame, &eng);

        for _ in 0..180 {
            eng.simulate(&mut state, &mut frame, &accel(30.0, 0.0), DT, &scene, &bases);
        }
        assert!(
            frame.location.x > 3.2,
            "debug flythrough should cross the wall: x={}",
            frame.location.x
        );
    }

    #[test]
    fn test_jump_transitions_to_falling() {
        let scene = flat_scene();
        let eng = engine();
        let bases = BaseRegistry::new();

        let mut frame = CapsuleFrame::resting_on(0.0, 0.0, 0.0, capsule());
        let mut state = walking_state(&scene, &frame, &eng);

        let input = MoveInput {
            jump: true,
            ..Default::default()
        };
        eng.simulate(&mut state, &mut frame, &input, DT, &scene, &bases);

        assert_eq!(state.mode, MovementMode::Falling);
        assert!(state.velocity.y > 0.0, "jump should set upward velocity");
    }

    #[test]
    fn test_tracked_delta_moves_capsule_without_input() {
        let scene = flat_scene();
        let eng = engine();
        let bases = BaseRegistry::new();

        let mut frame = CapsuleFrame::resting_on(0.0, 0.0, 0.0, capsule());
        let mut state = walking_state(&scene, &frame, &eng);
        let start = frame.location;

        // Tracked hardware slides the capsule sideways with no game input.
        let input = MoveInput {
            tracked_delta: Vec3::new(0.05, 0.0, 0.0),
            ..Default::default()
        };
        for _ in 0..10 {
            eng.simulate(&mut state, &mut frame, &input, DT, &scene, &bases);
        }

        assert!(
            (frame.location.x - (start.x + 0.5)).abs() < 1e-3,
            "tracked delta should translate the capsule: x={}",
            frame.location.x
        );
        assert_eq!(state.mode, MovementMode::Walking);
    }

    #[test]
    fn test_identical_inputs_are_deterministic() {
        let run = || -> Vec3 {
            let scene = flat_scene();
            let eng = engine();
            let bases = BaseRegistry::new();
            let mut frame = CapsuleFrame::resting_on(0.0, 0.0, 0.0, capsule());
            let mut state = walking_state(&scene, &frame, &eng);

            for tick in 0..120 {
                let input = MoveInput {
                    acceleration: Vec3::new(
                        10.0 + (tick % 7) as f32,
                        0.0,
                        (tick % 3) as f32 - 1.0,
                    ),
                    tracked_delta: Vec3::new(0.001 * (tick % 5) as f32, 0.0, 0.0),
                    jump: tick == 40,
                    ..Default::default()
                };
                eng.simulate(&mut state, &mut frame, &input, DT, &scene, &bases);
            }
            frame.location
        };

        let first = run();
        let second = run();
        assert_eq!(first, second, "identical input sequences must be bit-identical");
    }

    #[test]
    fn test_scripted_mode_follows_root_motion() {
        let scene = flat_scene();
        let eng = engine();
        let bases = BaseRegistry::new();

        let mut frame = CapsuleFrame::resting_on(0.0, 0.0, 0.0, capsule());
        let mut state = ActorMotionState {
            mode: MovementMode::Custom,
            ..Default::default()
        };
        let start = frame.location;

        let input = MoveInput {
            root_motion: Some(RootMotion {
                translation: Vec3::new(0.02, 0.0, 0.01),
                yaw: 1.5,
            }),
            ..Default::default()
        };
        for _ in 0..10 {
            eng.simulate(&mut state, &mut frame, &input, DT, &scene, &bases);
        }

        assert!((frame.location.x - (start.x + 0.2)).abs() < 1e-3);
        assert!((frame.location.z - (start.z + 0.1)).abs() < 1e-3);
        assert!((frame.yaw - 15.0).abs() < 1e-3);
        assert_eq!(state.mode, MovementMode::Custom);
    }
}
