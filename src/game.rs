//! One running game: session, collaborators and the multiplayer layer
//!
//! Per update, in order: apply network snapshots, evaluate bomb timers,
//! run the simulation tick, then interpolate ghosts and publish our pose.

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;

use crate::clamp_dt;
use crate::config::Tuning;
use crate::net::{
    BOMBS_PATH, Detonation, GhostView, HazardTracker, HazardView, NetworkStore, PLAYERS_PATH,
    RemoteSync, random_id,
};
use crate::progress::ProgressStore;
use crate::sim::{
    GameEvent, GameState, Level, LevelError, LevelSource, RestartFrom, SessionState, SimEnv,
    SoundCue, TickInput, tick,
};

pub struct Game<P: ProgressStore, N: NetworkStore> {
    pub state: GameState,
    tuning: Tuning,
    levels: Box<dyn LevelSource>,
    progress: P,
    net: N,
    sync: RemoteSync,
    hazards: HazardTracker,
    rng: Pcg32,
    /// Wall clock of the latest update (ms)
    now_ms: u64,
}

impl<P: ProgressStore, N: NetworkStore> Game<P, N> {
    /// Create a game on the menu and join the shared store
    pub fn new(tuning: Tuning, levels: Box<dyn LevelSource>, progress: P, net: N, seed: u64) -> Self {
        let tuning = tuning.sanitized();
        let mut rng = Pcg32::seed_from_u64(seed);
        let id = random_id(&mut rng);
        let mut game = Self {
            state: GameState::new(&tuning),
            sync: RemoteSync::new(id, &tuning),
            hazards: HazardTracker::new(&tuning),
            tuning,
            levels,
            progress,
            net,
            rng,
            now_ms: 0,
        };
        if game.sync.connect(&mut game.net) {
            game.hazards.connect(&mut game.net);
        }
        log::info!("Game ready with {} levels", game.levels.len());
        game
    }

    fn split(&mut self) -> (&mut GameState, SimEnv<'_>) {
        (
            &mut self.state,
            SimEnv {
                tuning: &self.tuning,
                levels: &*self.levels,
                progress: &mut self.progress,
            },
        )
    }

    /// Start from the menu or win screen, or restart the current level
    pub fn start(&mut self) {
        let (state, mut env) = self.split();
        state.start(&mut env);
    }

    pub fn restart(&mut self, from: RestartFrom) -> bool {
        let (state, mut env) = self.split();
        state.restart(&mut env, from)
    }

    /// Play a level given as JSON rows of tile codes
    pub fn load_custom_level(&mut self, json: &str) -> Result<(), LevelError> {
        let level = Level::from_json(json)?;
        self.play_level(level);
        Ok(())
    }

    pub fn play_level(&mut self, level: Level) {
        let (state, mut env) = self.split();
        state.play_custom(level, &mut env);
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.sync.set_name(name);
    }

    /// Advance everything by `dt` seconds; `now_ms` is the shared wall clock
    pub fn update(&mut self, input: &TickInput, dt: f32, now_ms: u64) {
        let dt = clamp_dt(dt, self.tuning.max_dt);
        self.now_ms = now_ms;

        self.pump_network();

        if self.state.state != SessionState::Menu {
            let level = self.state.slot.wire_index();
            let detonations =
                self.hazards
                    .evaluate(&mut self.net, self.sync.id(), level, self.state.player.pos, now_ms);
            for detonation in detonations {
                self.on_detonation(detonation);
            }
        }

        let (state, mut env) = self.split();
        tick(state, &mut env, input, dt);

        self.sync.interpolate(dt);
        if self.state.state == SessionState::Playing {
            let player = &self.state.player;
            self.sync.publish(
                &mut self.net,
                player.pos,
                player.angle,
                self.state.slot.wire_index(),
                now_ms,
            );
            if input.place_bomb {
                self.place_bomb();
            }
        }
    }

    fn pump_network(&mut self) {
        for snapshot in self.net.poll() {
            match snapshot.path.as_str() {
                PLAYERS_PATH => self.sync.apply_snapshot(snapshot.value.as_ref(), self.now_ms),
                BOMBS_PATH => self.hazards.apply_snapshot(snapshot.value.as_ref()),
                other => log::debug!("Ignoring snapshot for {other}"),
            }
        }
    }

    fn on_detonation(&mut self, detonation: Detonation) {
        self.state.emit(GameEvent::Explosion(detonation.pos));
        self.state.emit(GameEvent::Sound(SoundCue::Explosion));
        if detonation.hit && self.state.die(self.tuning.bomb_grace_ms) {
            self.state.player.begin_crash();
            log::info!("Caught in the blast of bomb {}", detonation.id);
        }
    }

    fn place_bomb(&mut self) {
        let id = random_id(&mut self.rng);
        let pos = self.state.player.pos;
        let level = self.state.slot.wire_index();
        if let Err(e) =
            self.hazards
                .place(&mut self.net, &id, self.sync.id(), pos, level, self.now_ms)
        {
            log::debug!("Bomb not placed: {e}");
        }
    }

    /// Remove our player record from the shared store
    pub fn leave(&mut self) {
        self.sync.leave(&mut self.net);
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        self.state.drain_events()
    }

    /// Other players on our level
    pub fn ghosts(&self) -> Vec<GhostView> {
        self.sync.visible(self.state.slot.wire_index())
    }

    /// Unexploded bombs on our level
    pub fn hazards(&self) -> Vec<HazardView> {
        self.hazards.active(self.state.slot.wire_index(), self.now_ms)
    }

    pub fn online_count(&self) -> usize {
        self.sync.online_count()
    }

    pub fn player_id(&self) -> &str {
        self.sync.id()
    }

    pub fn player_pos(&self) -> Vec2 {
        self.state.player.pos
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    pub fn levels(&self) -> &dyn LevelSource {
        &*self.levels
    }

    pub fn progress(&self) -> &P {
        &self.progress
    }

    pub fn progress_mut(&mut self) -> &mut P {
        &mut self.progress
    }

    pub fn net(&self) -> &N {
        &self.net
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::FRAME_DT;
    use crate::net::{MemoryHub, MemoryStore, OfflineStore};
    use crate::progress::Progress;
    use crate::sim::{LevelPack, LevelSlot, MotionState};

    fn pack(levels: &[&[&str]]) -> Box<dyn LevelSource> {
        Box::new(LevelPack::new(
            levels.iter().map(|rows| Level::from_ascii(rows).unwrap()).collect(),
        ))
    }

    fn solo(levels: &[&[&str]]) -> Game<Progress, OfflineStore> {
        Game::new(Tuning::default(), pack(levels), Progress::new(), OfflineStore, 1)
    }

    fn online(hub: &MemoryHub, levels: &[&[&str]], seed: u64) -> Game<Progress, MemoryStore> {
        Game::new(Tuning::default(), pack(levels), Progress::new(), hub.connect(), seed)
    }

    fn right() -> TickInput {
        TickInput {
            right: true,
            ..Default::default()
        }
    }

    /// Run frames at 60 Hz until `done` or a frame limit
    fn run_until<P: ProgressStore, N: NetworkStore>(
        game: &mut Game<P, N>,
        input: &TickInput,
        clock: &mut u64,
        max_frames: usize,
        mut done: impl FnMut(&Game<P, N>) -> bool,
    ) -> bool {
        for _ in 0..max_frames {
            if done(game) {
                return true;
            }
            *clock += 16;
            game.update(input, FRAME_DT, *clock);
        }
        done(game)
    }

    #[test]
    fn test_finish_advances_one_level_through_transition() {
        let mut game = solo(&[&["SIF"], &["SIIF"], &["SIIIF"]]);
        let mut clock = 0;
        game.start();
        game.drain_events();

        let mut seen = vec![game.state.state];
        for _ in 0..600 {
            clock += 16;
            game.update(&right(), FRAME_DT, clock);
            if seen.last() != Some(&game.state.state) {
                seen.push(game.state.state);
            }
            if seen.len() == 3 {
                break;
            }
        }
        assert_eq!(
            seen,
            vec![SessionState::Playing, SessionState::Transition, SessionState::Playing]
        );
        assert_eq!(game.state.slot, LevelSlot::Campaign(1));
        let started = game
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, GameEvent::LevelStarted(_)))
            .count();
        assert_eq!(started, 1);
        assert_eq!(game.progress().max_level(), 1);
    }

    #[test]
    fn test_fall_restarts_same_level_after_grace() {
        let mut game = solo(&[&["I_"]]);
        let mut clock = 0;
        game.start();
        let spawn = game.player_pos();

        assert!(run_until(&mut game, &right(), &mut clock, 300, |g| {
            g.state.state == SessionState::Dying
        }));
        assert_eq!(game.state.player.motion, MotionState::Fall);
        let attempt = game.state.attempt;

        // No input during the grace period; restart lands after ~800 ms
        let idle = TickInput::default();
        let mut frames = 0;
        while game.state.state == SessionState::Dying && frames < 120 {
            clock += 16;
            game.update(&idle, FRAME_DT, clock);
            frames += 1;
        }
        let waited = frames as f32 * FRAME_DT;
        assert!((0.78..0.85).contains(&waited), "restarted after {waited}");
        assert_eq!(game.state.state, SessionState::Playing);
        assert_eq!(game.state.slot, LevelSlot::Campaign(0));
        assert_eq!(game.state.attempt, attempt + 1);
        assert_eq!(game.player_pos(), spawn);
        assert_eq!(game.state.player.motion, MotionState::Idle);
    }

    #[test]
    fn test_offline_game_plays_solo() {
        let mut game = solo(&[&["SIF"]]);
        game.start();
        let input = TickInput {
            right: true,
            place_bomb: true,
            ..Default::default()
        };
        game.update(&input, FRAME_DT, 16);
        assert_eq!(game.state.state, SessionState::Playing);
        assert!(game.ghosts().is_empty());
        assert!(game.hazards().is_empty());
        assert_eq!(game.online_count(), 1);
    }

    #[test]
    fn test_custom_level_ends_in_win() {
        let mut game = solo(&[&["SIF"]]);
        assert!(game.load_custom_level("[[1, 7]]").is_ok());
        assert_eq!(game.state.slot, LevelSlot::Custom);
        assert!(game.load_custom_level("[[1, 42]]").is_err());

        game.load_custom_level("[[2, 3]]").unwrap();
        let mut clock = 0;
        assert!(run_until(&mut game, &right(), &mut clock, 600, |g| {
            g.state.state == SessionState::Win
        }));
        assert_eq!(game.progress().max_level(), 0);
    }

    #[test]
    fn test_peers_see_each_other_as_ghosts() {
        let hub = MemoryHub::new();
        let levels: &[&[&str]] = &[&["SIIIIIIIIF"], &["SIF"]];
        let mut a = online(&hub, levels, 1);
        let mut b = online(&hub, levels, 2);
        a.set_name("Ada");
        a.start();
        b.start();

        let mut clock = 1000;
        for _ in 0..30 {
            clock += 16;
            a.update(&right(), FRAME_DT, clock);
            b.update(&TickInput::default(), FRAME_DT, clock);
        }
        assert_eq!(a.online_count(), 2);
        assert_eq!(b.online_count(), 2);

        let ghosts = b.ghosts();
        assert_eq!(ghosts.len(), 1);
        assert_eq!(ghosts[0].name, "Ada");
        assert!(ghosts[0].x > b.player_pos().x);

        a.leave();
        clock += 16;
        b.update(&TickInput::default(), FRAME_DT, clock);
        assert!(b.ghosts().is_empty());
    }

    #[test]
    fn test_ghosts_on_other_levels_are_hidden() {
        let hub = MemoryHub::new();
        let levels: &[&[&str]] = &[&["SIIF"], &["SIIF"]];
        let mut a = online(&hub, levels, 1);
        let mut b = online(&hub, levels, 2);
        a.start();
        a.state.slot = LevelSlot::Campaign(1);
        a.restart(RestartFrom::CurrentLevel);
        b.start();

        let mut clock = 0;
        for _ in 0..10 {
            clock += 16;
            a.update(&TickInput::default(), FRAME_DT, clock);
            b.update(&TickInput::default(), FRAME_DT, clock);
        }
        assert_eq!(b.online_count(), 2);
        assert!(b.ghosts().is_empty());
    }

    #[test]
    fn test_joining_after_old_bomb_is_safe() {
        let hub = MemoryHub::new();
        let levels: &[&[&str]] = &[&["SIIIIF"]];
        {
            let mut owner = online(&hub, levels, 1);
            owner.start();
            let bomb = TickInput {
                place_bomb: true,
                ..Default::default()
            };
            owner.update(&bomb, FRAME_DT, 16);
        }
        assert_eq!(hub.count("bombs"), 1);

        let mut late = online(&hub, levels, 2);
        late.start();
        late.update(&TickInput::default(), FRAME_DT, 600_000);
        assert_eq!(late.state.state, SessionState::Playing);
        assert!(
            !late
                .drain_events()
                .iter()
                .any(|e| matches!(e, GameEvent::Explosion(_)))
        );
    }

    #[test]
    fn test_bomb_kills_nearby_peer_once() {
        let hub = MemoryHub::new();
        let levels: &[&[&str]] = &[&["SIIIIF"]];
        let mut a = online(&hub, levels, 1);
        let mut b = online(&hub, levels, 2);
        a.start();
        b.start();

        let bomb = TickInput {
            place_bomb: true,
            ..Default::default()
        };
        let idle = TickInput::default();
        let mut clock = 0;
        clock += 16;
        a.update(&bomb, FRAME_DT, clock);
        b.update(&idle, FRAME_DT, clock);
        assert_eq!(hub.count("bombs"), 1);
        assert_eq!(b.hazards().len(), 1);

        let mut explosions = 0;
        let mut b_died = false;
        while clock < 7000 {
            clock += 16;
            a.update(&idle, FRAME_DT, clock);
            b.update(&idle, FRAME_DT, clock);
            for event in b.drain_events() {
                if matches!(event, GameEvent::Explosion(_)) {
                    explosions += 1;
                }
            }
            b_died |= b.state.state == SessionState::Dying;
        }
        assert_eq!(explosions, 1);
        assert!(b_died);
        assert_eq!(b.state.state, SessionState::Playing);
        assert_eq!(hub.count("bombs"), 0);
        assert!(b.hazards().is_empty());
    }
}
