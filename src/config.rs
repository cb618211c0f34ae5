//! Data-driven game tuning
//!
//! Every constant that shapes the feel of the game lives here so it can be
//! tweaked from a JSON file without a rebuild. Missing fields fall back to
//! the defaults, so a tuning file only needs the values it overrides.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::{MAX_DT, TILE_SIZE};

/// Errors raised while reading or writing a tuning file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access tuning file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed tuning file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Game tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    // === World ===
    /// Edge length of one tile in world units
    pub tile_size: f32,
    /// Visible area used to centre the camera
    pub viewport: (f32, f32),
    /// Camera catch-up fraction per 60 Hz frame
    pub camera_follow: f32,

    // === Physics ===
    /// Acceleration applied by full input (units/s²)
    pub accel: f32,
    /// Fraction of velocity left after one second of sliding
    pub friction_factor: f32,
    /// Hard speed cap (units/s)
    pub max_speed: f32,
    /// Frame steps larger than this are clamped (seconds)
    pub max_dt: f32,
    /// Heading snaps to velocity above this speed
    pub heading_threshold: f32,
    /// Run animation plays above this speed
    pub run_threshold: f32,
    /// Velocity kept (and reversed) when bouncing off coal
    pub bounce_restitution: f32,

    // === Rules ===
    /// Score awarded per present
    pub present_score: u64,
    /// Delay before restarting after falling (ms)
    pub fall_grace_ms: u32,
    /// Delay before restarting after crashing (ms)
    pub crash_grace_ms: u32,
    /// Delay before restarting after a bomb hit (ms)
    pub bomb_grace_ms: u32,
    /// Full length of the level transition curtain (seconds)
    pub transition_secs: f32,

    // === Network ===
    /// Minimum spacing between outbound position publishes (ms)
    pub publish_interval_ms: u64,
    /// Ghosts whose last update is older than this are dropped (ms)
    pub stale_after_ms: u64,
    /// Ghost smoothing rate (per second)
    pub smoothing_rate: f32,

    // === Bombs ===
    /// Fuse length (ms)
    pub bomb_lifetime_ms: u64,
    /// Extra time the owner waits after detonation before deleting (ms)
    pub bomb_cleanup_delay_ms: u64,
    /// Players closer than this to a detonation die
    pub bomb_damage_radius: f32,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            tile_size: TILE_SIZE,
            viewport: (1280.0, 720.0),
            camera_follow: 0.1,

            accel: 2500.0,
            friction_factor: 0.25,
            max_speed: 20000.0,
            max_dt: MAX_DT,
            heading_threshold: 20.0,
            run_threshold: 50.0,
            bounce_restitution: 0.8,

            present_score: 100,
            fall_grace_ms: 800,
            crash_grace_ms: 500,
            bomb_grace_ms: 1000,
            transition_secs: 1.0,

            publish_interval_ms: 100,
            stale_after_ms: 10_000,
            smoothing_rate: 10.0,

            bomb_lifetime_ms: 5000,
            bomb_cleanup_delay_ms: 500,
            bomb_damage_radius: 300.0,
        }
    }
}

impl Tuning {
    /// Parse tuning from a JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str::<Tuning>(json)?.sanitized())
    }

    /// Load tuning from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path.as_ref())?;
        let tuning = Self::from_json(&json)?;
        log::info!("Loaded tuning from {}", path.as_ref().display());
        Ok(tuning)
    }

    /// Load tuning, falling back to defaults when the file is absent or broken
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path.as_ref()) {
            Ok(tuning) => tuning,
            Err(e) => {
                log::warn!("Using default tuning ({e})");
                Self::default()
            }
        }
    }

    /// Save tuning as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Pull out-of-range values back into something the simulation can run with
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if !(self.tile_size > 0.0) {
            self.tile_size = defaults.tile_size;
        }
        if !(self.friction_factor > 0.0 && self.friction_factor < 1.0) {
            self.friction_factor = defaults.friction_factor;
        }
        if !(self.max_speed > 0.0) {
            self.max_speed = defaults.max_speed;
        }
        if !(self.max_dt > 0.0) {
            self.max_dt = defaults.max_dt;
        }
        if !(self.transition_secs > 0.0) {
            self.transition_secs = defaults.transition_secs;
        }
        self.camera_follow = self.camera_follow.clamp(0.0, 1.0);
        self.smoothing_rate = self.smoothing_rate.max(0.0);
        self
    }

    /// Player collision/render radius
    pub fn player_radius(&self) -> f32 {
        self.tile_size * 0.3
    }
}
