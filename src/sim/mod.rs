//! Simulation core
//!
//! All gameplay logic lives here. No rendering, audio or network calls:
//! side effects leave as [`GameEvent`]s and collaborators come in through
//! [`SimEnv`].

pub mod interaction;
pub mod level;
pub mod physics;
pub mod schedule;
pub mod state;
pub mod tick;
pub mod tile;

pub use interaction::{Interaction, resolve};
pub use level::{Cell, Level, LevelError, LevelPack, LevelSource};
pub use physics::{MotionState, Player, integrate};
pub use schedule::{EventKey, EventKind, Scheduler};
pub use state::{
    GameEvent, GameState, LevelSlot, Music, RestartFrom, SessionState, SimEnv, SoundCue,
    Transition, TransitionPhase,
};
pub use tick::{TickInput, tick};
pub use tile::Tile;
