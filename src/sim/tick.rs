//! Variable timestep simulation tick
//!
//! One tick is a complete synchronous pass: scheduled events, then either the
//! transition timer or physics and tile interaction, then the camera.

use glam::Vec2;

use super::interaction::{self, Interaction};
use super::physics;
use super::state::{GameEvent, GameState, SessionState, SimEnv, SoundCue};
use crate::clamp_dt;

/// Input held during a single tick
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    /// Analog stick in [-1, 1]²; overrides the keys when non-zero
    pub joystick: Option<Vec2>,
    /// Drop a bomb at the player's position (one-shot)
    pub place_bomb: bool,
}

impl TickInput {
    /// Requested acceleration for a given full-input strength
    pub fn acceleration(&self, accel: f32) -> Vec2 {
        if let Some(stick) = self.joystick {
            if stick != Vec2::ZERO {
                return stick.clamp_length_max(1.0) * accel;
            }
        }
        let mut a = Vec2::ZERO;
        if self.up {
            a.y -= accel;
        }
        if self.down {
            a.y += accel;
        }
        if self.left {
            a.x -= accel;
        }
        if self.right {
            a.x += accel;
        }
        a
    }
}

/// Advance the session by `dt` seconds
pub fn tick(state: &mut GameState, env: &mut SimEnv<'_>, input: &TickInput, dt: f32) {
    let dt = clamp_dt(dt, env.tuning.max_dt);
    state.clock_ms += dt as f64 * 1000.0;

    state.fire_due(env);

    match state.state {
        SessionState::Menu | SessionState::Win => return,
        SessionState::Transition => {
            state.step_transition(env, dt);
            return;
        }
        SessionState::Playing | SessionState::Dying => {}
    }

    let tuning = env.tuning;
    let controllable = state.state == SessionState::Playing && state.player.motion.is_controllable();
    let thrust = controllable.then(|| input.acceleration(tuning.accel));

    physics::integrate(&mut state.player, thrust, dt, tuning);
    state.player.animate(dt, tuning.run_threshold);

    if state.state == SessionState::Dying {
        // Keep sinking while waiting for the restart
        if state.player.motion == physics::MotionState::Fall {
            state.player.advance_fall_frame();
        }
    } else if let Some(level) = state.level.as_mut() {
        match interaction::resolve(&mut state.player, level, dt, tuning) {
            Interaction::Fell { triggered } => {
                if triggered {
                    state.emit(GameEvent::Sound(SoundCue::Fall));
                    state.die(tuning.fall_grace_ms);
                }
                return;
            }
            Interaction::Crashed { triggered } => {
                if triggered {
                    state.emit(GameEvent::Sound(SoundCue::Crash));
                    state.die(tuning.crash_grace_ms);
                }
                return;
            }
            Interaction::Bounced => state.emit(GameEvent::Sound(SoundCue::Bump)),
            Interaction::ReachedFinish => {
                state.begin_transition(tuning);
                return;
            }
            Interaction::Collected { cell } => state.collect_present(cell, env),
            Interaction::None => {}
        }
    }

    state.follow_camera(dt, tuning);
}
