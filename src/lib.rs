//! Penguin Dash - A tile-based ice sliding arcade game
//!
//! Core modules:
//! - `sim`: Simulation core (physics, tile interactions, session state machine)
//! - `net`: Shared key-value store, remote player ghosts and networked bombs
//! - `progress`: Unlocked levels, collected presents, currency
//! - `config`: Data-driven tuning
//! - `game`: Ties the pieces together into one per-frame update

pub mod config;
pub mod game;
pub mod net;
pub mod progress;
pub mod sim;

pub use config::Tuning;
pub use game::Game;
pub use progress::{Progress, ProgressStore};

/// Game configuration constants
pub mod consts {
    /// Edge length of one tile in world units
    pub const TILE_SIZE: f32 = 256.0;
    /// Nominal frame step used by the headless driver and tests (60 Hz)
    pub const FRAME_DT: f32 = 1.0 / 60.0;
    /// Largest step a single tick will integrate (spiral-of-death guard)
    pub const MAX_DT: f32 = 0.1;

    /// Run cycle frames
    pub const RUN_FRAMES: u32 = 6;
    /// Seconds per run frame
    pub const RUN_FRAME_SECS: f32 = 0.1;
    /// First and last frame of the fall animation
    pub const FALL_FIRST_FRAME: u32 = 12;
    pub const FALL_LAST_FRAME: u32 = 16;
    /// Seconds per fall frame
    pub const FALL_FRAME_SECS: f32 = 0.15;
    /// Crash pose
    pub const CRASH_FRAME: u32 = 18;

    /// Wire value of the level index when playing an editor level
    pub const CUSTOM_LEVEL_WIRE: i64 = -1;
}

/// Normalize an angle to (-π, π]
#[inline]
pub fn normalize_angle(mut angle: f32) -> f32 {
    use std::f32::consts::{PI, TAU};
    if !angle.is_finite() {
        return 0.0;
    }
    while angle > PI {
        angle -= TAU;
    }
    while angle <= -PI {
        angle += TAU;
    }
    angle
}

/// Clamp a frame step into [0, max]. NaN and infinite steps count as zero.
#[inline]
pub fn clamp_dt(dt: f32, max: f32) -> f32 {
    if dt.is_finite() { dt.clamp(0.0, max) } else { 0.0 }
}

/// Signed shortest rotation taking `from` to `to`, in (-π, π]
#[inline]
pub fn shortest_arc(from: f32, to: f32) -> f32 {
    normalize_angle(to - from)
}

/// Cubic ease-in-out over [0, 1]
#[inline]
pub fn ease_in_out_cubic(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}
