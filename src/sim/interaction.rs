//! Tile interaction resolution
//!
//! Maps the player's position to a grid cell and applies the effect of the
//! tile underneath. Checks run in a fixed priority order and the first match
//! wins:
//!
//! 1. Fall (off the grid, or on water)
//! 2. Crash (snowman, ice block, iceberg)
//! 3. Bounce (tree)
//! 4. Finish
//! 5. Present
//!
//! The out-of-bounds test uses the raw cell while tile lookup uses the
//! clamped cell, so the grid can always be indexed safely while wandering
//! off the edge is still detected.

use super::level::{Cell, Level};
use super::physics::Player;
use super::tile::Tile;
use crate::config::Tuning;

/// What touching the current tile did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interaction {
    /// Nothing special underfoot
    None,
    /// Player is over water. `triggered` is true only on the first tick.
    Fell { triggered: bool },
    /// Player hit a solid hazard. `triggered` is true only on the first tick.
    Crashed { triggered: bool },
    /// Player bounced off a tree
    Bounced,
    /// Player reached the goal
    ReachedFinish,
    /// A present was picked up at this cell
    Collected { cell: Cell },
}

impl Interaction {
    /// Later checks are skipped after these
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Interaction::Fell { .. } | Interaction::Crashed { .. } | Interaction::ReachedFinish
        )
    }
}

/// Apply the tile under the player
///
/// Mutates the player (motion state, bounce) and the attempt's level copy
/// (collected presents). Scoring, deaths and level changes are left to the
/// caller.
pub fn resolve(player: &mut Player, level: &mut Level, dt: f32, tuning: &Tuning) -> Interaction {
    let cell = level.cell_at(player.pos);
    let safe = level.clamp_cell(cell);
    let tile = level.get(safe).unwrap_or(Tile::Empty);

    if !level.contains(cell) || tile == Tile::Empty {
        let triggered = player.begin_fall();
        player.advance_fall_frame();
        return Interaction::Fell { triggered };
    }

    match tile {
        t if t.is_hard_hazard() => Interaction::Crashed {
            triggered: player.begin_crash(),
        },
        Tile::Coal => {
            player.vel *= -tuning.bounce_restitution;
            // Push two steps along the reflected velocity so the next tick starts outside the tree
            player.pos += player.vel * dt * 2.0;
            Interaction::Bounced
        }
        Tile::Finish => Interaction::ReachedFinish,
        Tile::Present => {
            level.set(safe, Tile::Ice);
            Interaction::Collected { cell: safe }
        }
        _ => Interaction::None,
    }
}
