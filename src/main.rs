//! Penguin Dash headless driver
//!
//! Runs two peers on an in-process network for a while and logs what
//! happens. Usage: `penguin-dash [tuning.json] [seconds]`

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    native::run();
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // No headless driver on the web
}

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use glam::Vec2;

    use penguin_dash::consts::FRAME_DT;
    use penguin_dash::net::{MemoryHub, MemoryStore};
    use penguin_dash::sim::{GameEvent, LevelPack, SessionState, TickInput, Tile};
    use penguin_dash::{Game, Progress, Tuning};

    type Peer = Game<Progress, MemoryStore>;

    /// Autopilot peer drops a bomb this often (ms)
    const BOMB_EVERY_MS: u64 = 7000;

    pub fn run() {
        env_logger::init();
        let mut args = std::env::args().skip(1);
        let tuning = match args.next() {
            Some(path) => Tuning::load_or_default(path),
            None => Tuning::default(),
        };
        let seconds: f32 = args.next().and_then(|s| s.parse().ok()).unwrap_or(60.0);
        log::info!("Penguin Dash (headless) running for {seconds} s");

        let hub = MemoryHub::new();
        let mut racer = peer(&hub, &tuning, "Racer", 1);
        let mut bomber = peer(&hub, &tuning, "Bomber", 2);
        racer.start();
        bomber.start();

        let mut clock_ms = 0.0f64;
        let mut next_bomb = BOMB_EVERY_MS;
        let mut last_state = racer.state.state;
        let frames = (seconds / FRAME_DT) as usize;

        // Simulated time only, stepped at a fixed 60 Hz
        for _ in 0..frames {
            clock_ms += f64::from(FRAME_DT) * 1000.0;
            let now_ms = clock_ms as u64;
            racer.update(&autopilot(&racer), FRAME_DT, now_ms);

            let bomb = now_ms >= next_bomb;
            if bomb {
                next_bomb += BOMB_EVERY_MS;
            }
            let input = TickInput {
                place_bomb: bomb,
                ..autopilot(&bomber)
            };
            bomber.update(&input, FRAME_DT, now_ms);

            for peer in [&mut racer, &mut bomber] {
                report(peer);
            }
            if racer.state.state != last_state {
                log::info!("Racer: {:?} -> {:?}", last_state, racer.state.state);
                last_state = racer.state.state;
            }
            if racer.state.state == SessionState::Win {
                break;
            }
        }

        log::info!(
            "Done: racer on {:?} with score {}, {} levels unlocked, {} ghosts visible",
            racer.state.slot,
            racer.state.score,
            racer.progress().data.max_level,
            racer.ghosts().len()
        );
        racer.leave();
        bomber.leave();
    }

    fn peer(hub: &MemoryHub, tuning: &Tuning, name: &str, seed: u64) -> Peer {
        let mut game = Game::new(
            tuning.clone(),
            Box::new(LevelPack::campaign()),
            Progress::new(),
            hub.connect(),
            seed,
        );
        game.set_name(name);
        game
    }

    /// Steer straight at the finish tile
    fn autopilot(game: &Peer) -> TickInput {
        let Some(level) = game.state.level.as_ref() else {
            return TickInput::default();
        };
        let finish = level
            .cells()
            .find(|&(_, tile)| tile == Tile::Finish)
            .map(|(cell, _)| level.cell_center(cell));
        let stick = finish
            .map(|target| (target - game.player_pos()).normalize_or_zero())
            .unwrap_or(Vec2::ZERO);
        TickInput {
            joystick: Some(stick),
            ..Default::default()
        }
    }

    fn report(game: &mut Peer) {
        let id = game.player_id().to_string();
        for event in game.drain_events() {
            match event {
                GameEvent::LevelStarted(slot) => log::info!("[{id}] level {slot:?}"),
                GameEvent::Explosion(pos) => log::info!("[{id}] explosion at {pos}"),
                GameEvent::Victory => log::info!("[{id}] victory"),
                other => log::trace!("[{id}] {other:?}"),
            }
        }
    }
}
