//! Player entity and sliding physics
//!
//! Integration is time-correct: friction decays velocity by
//! `friction_factor^dt`, so the same input held for the same wall time
//! produces the same motion at 30 Hz and at 240 Hz.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::clamp_dt;
use crate::config::Tuning;
use crate::consts::*;

/// Behavioural mode of the player entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MotionState {
    #[default]
    Idle,
    Move,
    Fall,
    Crash,
}

impl MotionState {
    /// Input is ignored once the player has fallen or crashed
    pub fn is_controllable(self) -> bool {
        matches!(self, MotionState::Idle | MotionState::Move)
    }
}

/// The local player. Created once, reset on every attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub pos: Vec2,
    pub vel: Vec2,
    /// Heading in radians
    pub angle: f32,
    pub motion: MotionState,
    /// Sprite frame
    pub frame: u32,
    /// Seconds since the frame last advanced
    pub anim_timer: f32,
    /// Render radius
    pub radius: f32,
}

impl Player {
    pub fn new(radius: f32) -> Self {
        Self {
            pos: Vec2::ZERO,
            vel: Vec2::ZERO,
            angle: 0.0,
            motion: MotionState::Idle,
            frame: 0,
            anim_timer: 0.0,
            radius,
        }
    }

    /// Put the player back at rest on a spawn point
    pub fn reset(&mut self, spawn: Vec2) {
        self.pos = spawn;
        self.vel = Vec2::ZERO;
        self.angle = 0.0;
        self.motion = MotionState::Idle;
        self.frame = 0;
        self.anim_timer = 0.0;
    }

    pub fn speed(&self) -> f32 {
        self.vel.length()
    }

    /// Enter the fall state. Returns false if already falling.
    pub fn begin_fall(&mut self) -> bool {
        if self.motion == MotionState::Fall {
            return false;
        }
        self.motion = MotionState::Fall;
        self.frame = FALL_FIRST_FRAME;
        true
    }

    /// Enter the crash state. Returns false if already crashed.
    pub fn begin_crash(&mut self) -> bool {
        if self.motion == MotionState::Crash {
            return false;
        }
        self.motion = MotionState::Crash;
        self.frame = CRASH_FRAME;
        true
    }

    /// Step the sinking animation; holds on the last frame
    pub fn advance_fall_frame(&mut self) {
        if self.anim_timer > FALL_FRAME_SECS {
            self.frame = (self.frame + 1).min(FALL_LAST_FRAME);
            self.anim_timer = 0.0;
        }
    }

    /// Update motion state and sprite frame from the current speed
    pub fn animate(&mut self, dt: f32, run_threshold: f32) {
        self.anim_timer += dt;
        match self.motion {
            // Driven by the tile resolver and the dying state
            MotionState::Fall | MotionState::Crash => {}
            MotionState::Idle | MotionState::Move => {
                if self.speed() > run_threshold {
                    self.motion = MotionState::Move;
                    if self.anim_timer > RUN_FRAME_SECS {
                        self.frame = (self.frame + 1) % RUN_FRAMES;
                        self.anim_timer = 0.0;
                    }
                } else {
                    self.motion = MotionState::Idle;
                    self.frame = 0;
                }
            }
        }
    }
}

/// Acceleration requested by input, or `None` when the player cannot steer
pub type Thrust = Option<Vec2>;

/// Advance velocity, position and heading by `dt` seconds. Returns the new speed.
pub fn integrate(player: &mut Player, thrust: Thrust, dt: f32, tuning: &Tuning) -> f32 {
    let dt = clamp_dt(dt, tuning.max_dt);

    if let Some(accel) = thrust {
        player.vel += accel * dt;
    }

    player.vel *= tuning.friction_factor.powf(dt);

    let mut speed = player.vel.length();
    if speed > tuning.max_speed {
        player.vel *= tuning.max_speed / speed;
        speed = tuning.max_speed;
    }

    player.pos += player.vel * dt;

    if speed > tuning.heading_threshold {
        player.angle = player.vel.y.atan2(player.vel.x);
    }

    speed
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn player_moving(vel: Vec2) -> Player {
        let mut p = Player::new(10.0);
        p.vel = vel;
        p
    }

    #[test]
    fn test_friction_is_frame_rate_independent() {
        let tuning = Tuning::default();
        let mut coarse = player_moving(Vec2::new(1000.0, 0.0));
        let mut fine = coarse.clone();

        for _ in 0..30 {
            integrate(&mut coarse, None, 1.0 / 30.0, &tuning);
        }
        for _ in 0..240 {
            integrate(&mut fine, None, 1.0 / 240.0, &tuning);
        }

        // One second of sliding leaves exactly friction_factor of the speed
        assert!((coarse.vel.x - 250.0).abs() < 0.5, "coarse {}", coarse.vel.x);
        assert!((fine.vel.x - 250.0).abs() < 0.5, "fine {}", fine.vel.x);
    }

    #[test]
    fn test_thrust_accelerates_and_heading_snaps() {
        let tuning = Tuning::default();
        let mut p = Player::new(10.0);
        let speed = integrate(&mut p, Some(Vec2::new(0.0, tuning.accel)), 0.1, &tuning);
        assert!(speed > tuning.heading_threshold);
        assert!(p.pos.y > 0.0);
        assert!((p.angle - std::f32::consts::FRAC_PI_2).abs() < 1e-5);
    }

    #[test]
    fn test_slow_player_keeps_heading() {
        let tuning = Tuning::default();
        let mut p = player_moving(Vec2::new(-1.0, 0.0));
        p.angle = 1.0;
        integrate(&mut p, None, FRAME_DT, &tuning);
        assert_eq!(p.angle, 1.0);
    }

    #[test]
    fn test_large_dt_is_clamped() {
        let tuning = Tuning::default();
        let mut a = player_moving(Vec2::new(100.0, 0.0));
        let mut b = a.clone();
        integrate(&mut a, None, 5.0, &tuning);
        integrate(&mut b, None, tuning.max_dt, &tuning);
        assert_eq!(a.pos, b.pos);
    }

    #[test]
    fn test_nan_dt_leaves_player_untouched() {
        let tuning = Tuning::default();
        let mut p = player_moving(Vec2::new(100.0, 50.0));
        p.pos = Vec2::new(10.0, 20.0);
        integrate(&mut p, Some(Vec2::new(tuning.accel, 0.0)), f32::NAN, &tuning);
        assert_eq!(p.pos, Vec2::new(10.0, 20.0));
        assert_eq!(p.vel, Vec2::new(100.0, 50.0));
        integrate(&mut p, None, FRAME_DT, &tuning);
        assert!(p.pos.is_finite());
    }

    #[test]
    fn test_fall_and_crash_are_idempotent() {
        let mut p = Player::new(10.0);
        assert!(p.begin_fall());
        assert!(!p.begin_fall());
        assert_eq!(p.frame, FALL_FIRST_FRAME);

        p.anim_timer = 1.0;
        for _ in 0..10 {
            p.anim_timer = 1.0;
            p.advance_fall_frame();
        }
        assert_eq!(p.frame, FALL_LAST_FRAME);

        let mut q = Player::new(10.0);
        assert!(q.begin_crash());
        assert!(!q.begin_crash());
        assert!(!q.motion.is_controllable());
    }

    #[test]
    fn test_animation_cycles_run_frames() {
        let mut p = player_moving(Vec2::new(500.0, 0.0));
        for _ in 0..20 {
            p.animate(0.11, 50.0);
        }
        assert_eq!(p.motion, MotionState::Move);
        assert!(p.frame < RUN_FRAMES);

        p.vel = Vec2::ZERO;
        p.animate(0.01, 50.0);
        assert_eq!(p.motion, MotionState::Idle);
        assert_eq!(p.frame, 0);
    }

    proptest! {
        #[test]
        fn prop_friction_strictly_decays(
            vx in -5000.0f32..5000.0,
            vy in -5000.0f32..5000.0,
            dt in 0.001f32..0.1,
        ) {
            prop_assume!(vx.abs() + vy.abs() > 1.0);
            let tuning = Tuning::default();
            let mut p = player_moving(Vec2::new(vx, vy));
            let mut last = p.speed();
            for _ in 0..50 {
                let speed = integrate(&mut p, None, dt, &tuning);
                prop_assert!(speed < last);
                last = speed;
            }
        }

        #[test]
        fn prop_speed_never_exceeds_cap(
            ax in -1.0e7f32..1.0e7,
            ay in -1.0e7f32..1.0e7,
            dt in 0.0f32..1.0,
            steps in 1usize..20,
        ) {
            let tuning = Tuning::default();
            let mut p = Player::new(10.0);
            for _ in 0..steps {
                let speed = integrate(&mut p, Some(Vec2::new(ax, ay)), dt, &tuning);
                prop_assert!(speed <= tuning.max_speed * (1.0 + 1e-5));
                prop_assert!(p.speed() <= tuning.max_speed * (1.0 + 1e-5));
            }
        }
    }
}
