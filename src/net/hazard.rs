//! Networked bombs
//!
//! A bomb lives in the shared store under `bombs/{id}`. Once its lifetime is
//! up every observer detonates it locally, once, and checks whether its own
//! player was in range. Only the bomb's owner deletes it from the store, a
//! little after the deadline.
//!
//! A bomb only goes off inside its blast window, from the end of its
//! lifetime until the owner's cleanup deadline. One first seen later than
//! that (a late joiner, a level change) is marked as exploded silently.
//!
//! Bombs are not registered for removal on disconnect. If the owner leaves
//! before cleaning up, the record stays in the store, harmless but never
//! collected.

use std::collections::{BTreeMap, BTreeSet};

use glam::Vec2;
use serde_json::Value;

use super::{BOMBS_PATH, BombRecord, NetError, NetworkStore, child_key, decode_children};
use crate::config::Tuning;

/// A bomb that went off this tick
#[derive(Debug, Clone, PartialEq)]
pub struct Detonation {
    pub id: String,
    pub pos: Vec2,
    /// The local player was inside the damage radius
    pub hit: bool,
}

/// A live bomb, ready to draw
#[derive(Debug, Clone, PartialEq)]
pub struct HazardView {
    pub id: String,
    pub x: f32,
    pub y: f32,
    /// Fraction of the fuse burnt, 0 to 1
    pub fuse: f32,
}

/// Owns the local view of every bomb and which ones have already gone off
#[derive(Debug, Clone)]
pub struct HazardTracker {
    bombs: BTreeMap<String, BombRecord>,
    exploded: BTreeSet<String>,
    /// Own bombs whose removal has been sent
    removed: BTreeSet<String>,
    lifetime_ms: u64,
    cleanup_delay_ms: u64,
    damage_radius: f32,
}

impl HazardTracker {
    pub fn new(tuning: &Tuning) -> Self {
        Self {
            bombs: BTreeMap::new(),
            exploded: BTreeSet::new(),
            removed: BTreeSet::new(),
            lifetime_ms: tuning.bomb_lifetime_ms,
            cleanup_delay_ms: tuning.bomb_cleanup_delay_ms,
            damage_radius: tuning.bomb_damage_radius,
        }
    }

    pub fn connect(&mut self, net: &mut dyn NetworkStore) -> bool {
        match net.subscribe(BOMBS_PATH) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Bombs unavailable: {e}");
                false
            }
        }
    }

    /// Replace the known bombs with a fresh `bombs` snapshot
    pub fn apply_snapshot(&mut self, snapshot: Option<&Value>) {
        self.bombs = decode_children::<BombRecord>(snapshot).into_iter().collect();
        // Ids that left the store can never come back
        self.exploded.retain(|id| self.bombs.contains_key(id));
        self.removed.retain(|id| self.bombs.contains_key(id));
    }

    /// Drop a bomb. It shows up locally once the store echoes it back.
    pub fn place(
        &mut self,
        net: &mut dyn NetworkStore,
        id: &str,
        owner_id: &str,
        pos: Vec2,
        level: i64,
        now_ms: u64,
    ) -> Result<(), NetError> {
        let record = BombRecord {
            x: pos.x,
            y: pos.y,
            level,
            owner_id: owner_id.to_string(),
            placed_at: now_ms,
        };
        net.set(&child_key(BOMBS_PATH, id), serde_json::to_value(&record)?)?;
        log::debug!("Placed bomb {id} on level {level}");
        Ok(())
    }

    /// Detonate due bombs on `level` and clean up our own expired ones
    pub fn evaluate(
        &mut self,
        net: &mut dyn NetworkStore,
        self_id: &str,
        level: i64,
        player_pos: Vec2,
        now_ms: u64,
    ) -> Vec<Detonation> {
        let mut detonations = Vec::new();
        let mut cleanup = Vec::new();

        for (id, bomb) in &self.bombs {
            let elapsed = now_ms.saturating_sub(bomb.placed_at);
            if elapsed < self.lifetime_ms {
                continue;
            }

            let expired = elapsed >= self.lifetime_ms + self.cleanup_delay_ms;
            // Bombs first seen after their blast window are marked without going off
            if bomb.level == level && self.exploded.insert(id.clone()) && !expired {
                let pos = Vec2::new(bomb.x, bomb.y);
                let hit = player_pos.distance(pos) < self.damage_radius;
                log::debug!("Bomb {id} detonated (hit: {hit})");
                detonations.push(Detonation {
                    id: id.clone(),
                    pos,
                    hit,
                });
            }

            if bomb.owner_id == self_id && expired && !self.removed.contains(id)
            {
                cleanup.push(id.clone());
            }
        }

        for id in cleanup {
            match net.remove(&child_key(BOMBS_PATH, &id)) {
                Ok(()) => {
                    self.removed.insert(id);
                }
                Err(e) => log::debug!("Bomb cleanup skipped: {e}"),
            }
        }

        detonations
    }

    /// Unexploded bombs on `level`
    pub fn active(&self, level: i64, now_ms: u64) -> Vec<HazardView> {
        self.bombs
            .iter()
            .filter(|(id, b)| b.level == level && !self.exploded.contains(*id))
            .map(|(id, b)| HazardView {
                id: id.clone(),
                x: b.x,
                y: b.y,
                fuse: (now_ms.saturating_sub(b.placed_at) as f32 / self.lifetime_ms as f32)
                    .clamp(0.0, 1.0),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.bombs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bombs.is_empty()
    }
}
