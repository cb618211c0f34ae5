//! Session state and the state machine that drives it
//!
//! ```text
//!   MENU --start--> PLAYING --death--> DYING --grace elapsed--> PLAYING (same level)
//!                      |
//!                   finish
//!                      v
//!                  TRANSITION --t >= 0.5: swap level--> ... --t >= 1--> PLAYING
//!                      |
//!               past last level
//!                      v
//!                     WIN
//! ```
//!
//! Every level load starts a new *attempt*. Delayed events remember the
//! attempt they were scheduled in and are dropped if it is no longer current.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::level::{Cell, Level, LevelSource};
use super::physics::Player;
use super::schedule::{EventKey, EventKind, Scheduler};
use super::tile::Tile;
use crate::config::Tuning;
use crate::consts::CUSTOM_LEVEL_WIRE;
use crate::ease_in_out_cubic;
use crate::progress::ProgressStore;

/// Top-level session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Title screen, no simulation
    Menu,
    /// Active gameplay
    Playing,
    /// Died, waiting out the grace period before restarting
    Dying,
    /// Curtain between levels, physics suspended
    Transition,
    /// Campaign finished, no simulation
    Win,
}

/// Which level is being played
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LevelSlot {
    /// Built-in level by index
    Campaign(usize),
    /// Externally authored level
    Custom,
}

impl LevelSlot {
    /// Level index as published to other players
    pub fn wire_index(self) -> i64 {
        match self {
            LevelSlot::Campaign(i) => i as i64,
            LevelSlot::Custom => CUSTOM_LEVEL_WIRE,
        }
    }
}

/// Portion of the level transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionPhase {
    /// Curtain closing over the old level
    Closing,
    /// Screen covered, level swapped, upcoming level number shown
    Hold,
    /// Curtain opening on the new level
    Opening,
}

/// Where the closing phase ends
pub const TRANSITION_CLOSE_END: f32 = 0.35;
/// Where the opening phase begins
pub const TRANSITION_OPEN_START: f32 = 0.65;
/// Where the level is swapped
pub const TRANSITION_SWAP_AT: f32 = 0.5;

/// Timer for the curtain between levels
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition {
    pub elapsed: f32,
    pub duration: f32,
    /// The level swap has happened
    pub switched: bool,
}

impl Transition {
    pub fn new(duration: f32) -> Self {
        Self {
            elapsed: 0.0,
            duration,
            switched: false,
        }
    }

    /// Elapsed fraction in [0, 1]
    pub fn progress(&self) -> f32 {
        (self.elapsed / self.duration).clamp(0.0, 1.0)
    }

    pub fn phase(&self) -> TransitionPhase {
        let t = self.progress();
        if t < TRANSITION_CLOSE_END {
            TransitionPhase::Closing
        } else if t <= TRANSITION_OPEN_START {
            TransitionPhase::Hold
        } else {
            TransitionPhase::Opening
        }
    }

    /// How much of the screen the curtain covers, 0 (open) to 1 (closed)
    pub fn curtain(&self) -> f32 {
        let t = self.progress();
        match self.phase() {
            TransitionPhase::Closing => ease_in_out_cubic(t / TRANSITION_CLOSE_END),
            TransitionPhase::Hold => 1.0,
            TransitionPhase::Opening => {
                1.0 - ease_in_out_cubic((t - TRANSITION_OPEN_START) / (1.0 - TRANSITION_OPEN_START))
            }
        }
    }
}

/// One-shot sound effects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundCue {
    Fall,
    Crash,
    Die,
    Bump,
    Collect,
    LevelComplete,
    Win,
    Explosion,
}

/// Looping music tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Music {
    Menu,
    Game,
}

/// Side effects the host should present (audio, HUD)
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GameEvent {
    Sound(SoundCue),
    MusicStarted(Music),
    MusicStopped(Music),
    ScoreChanged(u64),
    LevelStarted(LevelSlot),
    /// A bomb went off at this position
    Explosion(Vec2),
    Victory,
}

/// How an explicit restart picks its level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartFrom {
    FirstLevel,
    CurrentLevel,
}

/// Collaborators the state machine reads and writes
pub struct SimEnv<'a> {
    pub tuning: &'a Tuning,
    pub levels: &'a dyn LevelSource,
    pub progress: &'a mut dyn ProgressStore,
}

impl SimEnv<'_> {
    /// All campaign levels have been completed at least once
    pub fn fully_progressed(&self) -> bool {
        self.progress.max_level() >= self.levels.len()
    }
}

/// Process-wide session state
#[derive(Debug, Clone)]
pub struct GameState {
    pub state: SessionState,
    pub slot: LevelSlot,
    pub score: u64,
    /// Top-left of the view in world units
    pub camera: Vec2,
    pub player: Player,
    /// This attempt's private copy of the level
    pub level: Option<Level>,
    /// Active while `state` is `Transition`
    pub transition: Option<Transition>,
    /// Logical clock, advanced by each tick's clamped dt
    pub clock_ms: f64,
    /// Incremented on every level load
    pub attempt: u64,
    pub schedule: Scheduler,
    /// Canonical copy of an externally authored level
    custom_level: Option<Level>,
    events: Vec<GameEvent>,
}

impl GameState {
    pub fn new(tuning: &Tuning) -> Self {
        Self {
            state: SessionState::Menu,
            slot: LevelSlot::Campaign(0),
            score: 0,
            camera: Vec2::ZERO,
            player: Player::new(tuning.player_radius()),
            level: None,
            transition: None,
            clock_ms: 0.0,
            attempt: 0,
            schedule: Scheduler::new(),
            custom_level: None,
            events: vec![GameEvent::MusicStarted(Music::Menu)],
        }
    }

    /// Take the events raised since the last call
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn emit(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    /// Physics runs in these states
    pub fn is_live(&self) -> bool {
        matches!(self.state, SessionState::Playing | SessionState::Dying)
    }

    /// Start the game. From the menu or the win screen this begins again at level 1.
    pub fn start(&mut self, env: &mut SimEnv<'_>) {
        match self.state {
            SessionState::Menu | SessionState::Win => {
                self.score = 0;
                if let LevelSlot::Campaign(_) = self.slot {
                    self.slot = LevelSlot::Campaign(0);
                }
                self.emit(GameEvent::ScoreChanged(0));
            }
            _ => {}
        }
        if self.state == SessionState::Menu {
            self.emit(GameEvent::MusicStopped(Music::Menu));
        }
        self.emit(GameEvent::MusicStarted(Music::Game));
        log::info!("Starting {:?}", self.slot);
        self.play_attempt(env);
    }

    /// Force a restart. Ignored on the menu and win screens.
    pub fn restart(&mut self, env: &mut SimEnv<'_>, from: RestartFrom) -> bool {
        if matches!(self.state, SessionState::Menu | SessionState::Win) {
            log::debug!("Restart ignored in {:?}", self.state);
            return false;
        }
        if from == RestartFrom::FirstLevel {
            self.score = 0;
            self.emit(GameEvent::ScoreChanged(0));
            if let LevelSlot::Campaign(_) = self.slot {
                self.slot = LevelSlot::Campaign(0);
            }
        }
        self.play_attempt(env);
        true
    }

    /// Play an externally authored level from scratch
    pub fn play_custom(&mut self, level: Level, env: &mut SimEnv<'_>) {
        self.custom_level = Some(level);
        self.slot = LevelSlot::Custom;
        self.score = 0;
        self.emit(GameEvent::ScoreChanged(0));
        log::info!("Playing custom level");
        self.play_attempt(env);
    }

    /// Load the current slot and enter `Playing`, unless loading ran past the last level
    fn play_attempt(&mut self, env: &mut SimEnv<'_>) {
        // Any curtain in progress is abandoned
        self.transition = None;
        if self.load_attempt(env) {
            self.state = SessionState::Playing;
        }
    }

    /// Load a fresh copy of the current level and reset the player.
    /// Returns false if there is no such level and the game was won instead.
    fn load_attempt(&mut self, env: &mut SimEnv<'_>) -> bool {
        let fresh = match self.slot {
            LevelSlot::Campaign(i) => env.levels.level(i),
            LevelSlot::Custom => self.custom_level.clone(),
        };
        let Some(mut level) = fresh else {
            self.victory(env);
            return false;
        };
        level.tile_size = env.tuning.tile_size;

        if let LevelSlot::Campaign(index) = self.slot {
            if !env.fully_progressed() {
                hide_collected_presents(&mut level, index, &*env.progress);
            }
        }

        self.player.reset(level.spawn_point());
        self.camera = self.camera_target(self.player.pos, env.tuning);
        self.level = Some(level);
        self.attempt += 1;
        self.emit(GameEvent::LevelStarted(self.slot));
        log::debug!("Attempt {} on {:?}", self.attempt, self.slot);
        true
    }

    /// Signal a death. Ignored unless playing.
    pub fn die(&mut self, grace_ms: u32) -> bool {
        if self.state != SessionState::Playing {
            return false;
        }
        self.state = SessionState::Dying;
        let key = EventKey {
            attempt: self.attempt,
            kind: EventKind::Restart,
        };
        self.schedule.schedule(key, self.clock_ms + grace_ms as f64);
        self.emit(GameEvent::Sound(SoundCue::Die));
        log::debug!("Died on {:?}, restarting in {grace_ms} ms", self.slot);
        true
    }

    /// Run scheduled events that are due on the logical clock
    pub fn fire_due(&mut self, env: &mut SimEnv<'_>) {
        for fired in self.schedule.drain_due(self.clock_ms) {
            match fired.key.kind {
                EventKind::Restart => {
                    if fired.key.attempt == self.attempt && self.state == SessionState::Dying {
                        log::debug!("Grace period over, restarting {:?}", self.slot);
                        self.play_attempt(env);
                    } else {
                        log::debug!("Dropping stale restart for attempt {}", fired.key.attempt);
                    }
                }
            }
        }
    }

    /// Goal reached: start the curtain. Ignored unless playing.
    pub fn begin_transition(&mut self, tuning: &Tuning) -> bool {
        if self.state != SessionState::Playing {
            return false;
        }
        self.emit(GameEvent::Sound(SoundCue::LevelComplete));
        self.state = SessionState::Transition;
        self.transition = Some(Transition::new(tuning.transition_secs));
        log::info!("Finished {:?}", self.slot);
        true
    }

    /// Advance the curtain timer, swapping the level once at the midpoint
    pub fn step_transition(&mut self, env: &mut SimEnv<'_>, dt: f32) {
        let Some(transition) = self.transition.as_mut() else {
            self.state = SessionState::Playing;
            return;
        };
        transition.elapsed += dt;
        let t = transition.progress();
        let swap = t >= TRANSITION_SWAP_AT && !transition.switched;
        if swap {
            transition.switched = true;
        }
        let done = t >= 1.0;

        if swap {
            self.advance_level(env);
        }
        if self.state == SessionState::Transition && done {
            self.transition = None;
            self.state = SessionState::Playing;
        }
    }

    /// Move on from the current level, or win after the last one
    fn advance_level(&mut self, env: &mut SimEnv<'_>) {
        match self.slot {
            LevelSlot::Campaign(index) if index + 1 < env.levels.len() => {
                env.progress.complete_level(index);
                self.slot = LevelSlot::Campaign(index + 1);
                self.load_attempt(env);
            }
            LevelSlot::Campaign(_) | LevelSlot::Custom => self.victory(env),
        }
    }

    /// Enter the win screen. Idempotent.
    pub fn victory(&mut self, env: &mut SimEnv<'_>) {
        if self.state == SessionState::Win {
            return;
        }
        self.state = SessionState::Win;
        self.transition = None;
        if let LevelSlot::Campaign(index) = self.slot {
            env.progress.complete_level(index.min(env.levels.len().saturating_sub(1)));
        }
        self.emit(GameEvent::MusicStopped(Music::Game));
        self.emit(GameEvent::Sound(SoundCue::Win));
        self.emit(GameEvent::Victory);
        log::info!("Victory with score {}", self.score);
    }

    /// Present picked up at `cell`
    pub fn collect_present(&mut self, cell: Cell, env: &mut SimEnv<'_>) {
        self.score += env.tuning.present_score;
        self.emit(GameEvent::Sound(SoundCue::Collect));
        self.emit(GameEvent::ScoreChanged(self.score));

        if let LevelSlot::Campaign(index) = self.slot {
            if env.fully_progressed() {
                env.progress.add_currency(1);
            } else {
                env.progress.collect_item(index, cell.row as usize, cell.col as usize);
            }
        }
    }

    /// Level number to show on the curtain while it is fully closed (1-based)
    pub fn banner_level(&self) -> Option<usize> {
        let transition = self.transition.as_ref()?;
        if transition.phase() != TransitionPhase::Hold {
            return None;
        }
        match self.slot {
            LevelSlot::Campaign(i) if transition.switched => Some(i + 1),
            LevelSlot::Campaign(i) => Some(i + 2),
            LevelSlot::Custom => None,
        }
    }

    /// Screen coverage of the transition curtain
    pub fn curtain(&self) -> f32 {
        self.transition.as_ref().map_or(0.0, Transition::curtain)
    }

    fn camera_target(&self, focus: Vec2, tuning: &Tuning) -> Vec2 {
        focus - Vec2::new(tuning.viewport.0, tuning.viewport.1) / 2.0
    }

    /// Ease the camera toward the player
    pub fn follow_camera(&mut self, dt: f32, tuning: &Tuning) {
        let target = self.camera_target(self.player.pos, tuning);
        // camera_follow is tuned per 60 Hz frame
        let blend = 1.0 - (1.0 - tuning.camera_follow).powf(dt * 60.0);
        self.camera += (target - self.camera) * blend;
    }
}

/// Turn presents collected on earlier runs back into plain ice
fn hide_collected_presents(level: &mut Level, index: usize, progress: &dyn ProgressStore) {
    let taken: Vec<Cell> = level
        .cells()
        .filter(|&(cell, tile)| {
            tile == Tile::Present
                && progress.is_item_collected(index, cell.row as usize, cell.col as usize)
        })
        .map(|(cell, _)| cell)
        .collect();
    for cell in taken {
        level.set(cell, Tile::Ice);
    }
}
