//! Remote player synchronization
//!
//! Outbound, the local pose is published at most once per publish interval.
//! Inbound, each `players` snapshot replaces the set of known peers: new ids
//! become ghosts, known ids get a new target pose, missing or stale ids are
//! dropped. Every tick the ghosts' drawn pose eases toward the target.

use std::collections::BTreeMap;

use glam::Vec2;
use serde_json::Value;

use super::{NetError, NetworkStore, PLAYERS_PATH, PlayerRecord, child_key, decode_children};
use crate::config::Tuning;
use crate::{normalize_angle, shortest_arc};

/// Position and heading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub pos: Vec2,
    pub angle: f32,
}

impl Pose {
    fn from_record(record: &PlayerRecord) -> Self {
        Self {
            pos: Vec2::new(record.x, record.y),
            angle: normalize_angle(record.angle),
        }
    }
}

/// Interpolated proxy of another player
#[derive(Debug, Clone, PartialEq)]
pub struct Ghost {
    /// Pose being drawn
    pub current: Pose,
    /// Last pose received
    pub target: Pose,
    pub name: String,
    /// Level the peer was last seen on
    pub level: i64,
    /// Peer's clock at its last publish (ms)
    pub timestamp: u64,
}

/// What the renderer needs to draw a ghost
#[derive(Debug, Clone, PartialEq)]
pub struct GhostView {
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub angle: f32,
}

/// Owns the ghost map and the outbound publish channel
#[derive(Debug, Clone)]
pub struct RemoteSync {
    id: String,
    name: String,
    ghosts: BTreeMap<String, Ghost>,
    last_publish_ms: Option<u64>,
    publish_interval_ms: u64,
    stale_after_ms: u64,
    smoothing_rate: f32,
    connected: bool,
}

impl RemoteSync {
    pub fn new(id: impl Into<String>, tuning: &Tuning) -> Self {
        Self {
            id: id.into(),
            name: "Anonymous".to_string(),
            ghosts: BTreeMap::new(),
            last_publish_ms: None,
            publish_interval_ms: tuning.publish_interval_ms,
            stale_after_ms: tuning.stale_after_ms,
            smoothing_rate: tuning.smoothing_rate,
            connected: false,
        }
    }

    /// This client's session id
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    fn key(&self) -> String {
        child_key(PLAYERS_PATH, &self.id)
    }

    /// Subscribe to peers and arrange for our record to vanish on disconnect
    pub fn connect(&mut self, net: &mut dyn NetworkStore) -> bool {
        let key = self.key();
        let result = net
            .remove_on_disconnect(&key)
            .and_then(|_| net.subscribe(PLAYERS_PATH));
        match result {
            Ok(()) => {
                self.connected = true;
                log::info!("Multiplayer connected as {}", self.id);
            }
            Err(e) => log::warn!("Multiplayer unavailable, playing solo: {e}"),
        }
        self.connected
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Publish the local pose if the publish interval has passed. Returns true if sent.
    pub fn publish(
        &mut self,
        net: &mut dyn NetworkStore,
        pos: Vec2,
        angle: f32,
        level: i64,
        now_ms: u64,
    ) -> bool {
        if !self.connected {
            return false;
        }
        if let Some(last) = self.last_publish_ms {
            if now_ms.saturating_sub(last) < self.publish_interval_ms {
                return false;
            }
        }
        self.last_publish_ms = Some(now_ms);

        let record = PlayerRecord {
            name: self.name.clone(),
            x: pos.x.round(),
            y: pos.y.round(),
            angle: (angle * 100.0).round() / 100.0,
            level,
            timestamp: now_ms,
        };
        let sent = serde_json::to_value(&record)
            .map_err(NetError::from)
            .and_then(|value| net.set(&self.key(), value));
        match sent {
            Ok(()) => true,
            Err(e) => {
                log::debug!("Position publish skipped: {e}");
                false
            }
        }
    }

    /// Replace the known peers with a fresh `players` snapshot
    pub fn apply_snapshot(&mut self, snapshot: Option<&Value>, now_ms: u64) {
        let records: Vec<(String, PlayerRecord)> = decode_children(snapshot);
        let mut seen = BTreeMap::new();

        for (id, record) in records {
            if id == self.id {
                continue;
            }
            if now_ms.saturating_sub(record.timestamp) > self.stale_after_ms {
                continue;
            }
            let target = Pose::from_record(&record);
            let ghost = match self.ghosts.remove(&id) {
                Some(mut ghost) => {
                    ghost.target = target;
                    ghost.name = record.name;
                    ghost.level = record.level;
                    ghost.timestamp = record.timestamp;
                    ghost
                }
                None => {
                    log::debug!("Peer {id} joined");
                    Ghost {
                        current: target,
                        target,
                        name: record.name,
                        level: record.level,
                        timestamp: record.timestamp,
                    }
                }
            };
            seen.insert(id, ghost);
        }

        for id in self.ghosts.keys() {
            log::debug!("Peer {id} left");
        }
        self.ghosts = seen;
    }

    /// Ease every ghost toward its target
    pub fn interpolate(&mut self, dt: f32) {
        let factor = (self.smoothing_rate * dt).clamp(0.0, 1.0);
        for ghost in self.ghosts.values_mut() {
            ghost.current.pos += (ghost.target.pos - ghost.current.pos) * factor;
            let turn = shortest_arc(ghost.current.angle, ghost.target.angle);
            ghost.current.angle = normalize_angle(ghost.current.angle + turn * factor);
        }
    }

    /// Ghosts on the given level, ready to draw
    pub fn visible(&self, level: i64) -> Vec<GhostView> {
        self.ghosts
            .values()
            .filter(|g| g.level == level)
            .map(|g| GhostView {
                name: g.name.clone(),
                x: g.current.pos.x,
                y: g.current.pos.y,
                angle: g.current.angle,
            })
            .collect()
    }

    pub fn ghost(&self, id: &str) -> Option<&Ghost> {
        self.ghosts.get(id)
    }

    /// Players online, including us
    pub fn online_count(&self) -> usize {
        self.ghosts.len() + 1
    }

    /// Remove our record from the shared store
    pub fn leave(&mut self, net: &mut dyn NetworkStore) {
        if !self.connected {
            return;
        }
        if let Err(e) = net.remove(&self.key()) {
            log::debug!("Leave failed: {e}");
        }
        self.connected = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::{MemoryHub, OfflineStore};
    use serde_json::json;

    fn sync(id: &str) -> RemoteSync {
        RemoteSync::new(id, &Tuning::default())
    }

    fn peer(x: f32, y: f32, angle: f32, level: i64, timestamp: u64) -> Value {
        json!({ "name": "Pip", "x": x, "y": y, "angle": angle, "level": level, "timestamp": timestamp })
    }

    #[test]
    fn test_snapshot_creates_updates_and_drops() {
        let mut s = sync("me");
        s.apply_snapshot(
            Some(&json!({ "me": peer(0.0, 0.0, 0.0, 0, 1000), "a": peer(10.0, 20.0, 0.5, 0, 1000) })),
            1000,
        );
        assert!(s.ghost("me").is_none());
        let a = s.ghost("a").unwrap();
        assert_eq!(a.current, a.target);
        assert_eq!(s.online_count(), 2);

        s.apply_snapshot(Some(&json!({ "a": peer(50.0, 20.0, 0.5, 2, 1100) })), 1100);
        let a = s.ghost("a").unwrap();
        assert_eq!(a.current.pos, Vec2::new(10.0, 20.0));
        assert_eq!(a.target.pos, Vec2::new(50.0, 20.0));
        assert_eq!(a.level, 2);

        s.apply_snapshot(Some(&json!({ "b": peer(0.0, 0.0, 0.0, 0, 1200) })), 1200);
        assert!(s.ghost("a").is_none());
        assert!(s.ghost("b").is_some());

        s.apply_snapshot(None, 1300);
        assert_eq!(s.online_count(), 1);
    }

    #[test]
    fn test_stale_peers_are_dropped() {
        let mut s = sync("me");
        s.apply_snapshot(Some(&json!({ "a": peer(0.0, 0.0, 0.0, 0, 1000) })), 1000);
        assert!(s.ghost("a").is_some());
        s.apply_snapshot(Some(&json!({ "a": peer(0.0, 0.0, 0.0, 0, 1000) })), 11_001);
        assert!(s.ghost("a").is_none());
    }

    #[test]
    fn test_interpolation_converges() {
        let mut s = sync("me");
        s.apply_snapshot(Some(&json!({ "a": peer(0.0, 0.0, 0.0, 0, 0) })), 0);
        s.apply_snapshot(Some(&json!({ "a": peer(100.0, -50.0, 0.0, 0, 0) })), 0);

        let mut last = f32::MAX;
        for _ in 0..60 {
            s.interpolate(1.0 / 60.0);
            let g = s.ghost("a").unwrap();
            let dist = g.current.pos.distance(g.target.pos);
            assert!(dist <= last);
            last = dist;
        }
        assert!(last < 0.1);
    }

    #[test]
    fn test_angle_blend_takes_short_way_round() {
        let mut s = sync("me");
        s.apply_snapshot(Some(&json!({ "a": peer(0.0, 0.0, 3.1, 0, 0) })), 0);
        s.apply_snapshot(Some(&json!({ "a": peer(0.0, 0.0, -3.1, 0, 0) })), 0);

        // Going the short way means passing through ±π, never through 0
        let mut last_gap = f32::MAX;
        for _ in 0..120 {
            s.interpolate(1.0 / 60.0);
            let g = s.ghost("a").unwrap();
            assert!(g.current.angle.abs() > 3.0, "went the long way: {}", g.current.angle);
            let gap = shortest_arc(g.current.angle, g.target.angle).abs();
            assert!(gap <= last_gap + 1e-6);
            last_gap = gap;
        }
        assert!(last_gap < 1e-3);
    }

    #[test]
    fn test_visible_filters_by_level() {
        let mut s = sync("me");
        s.apply_snapshot(
            Some(&json!({ "a": peer(1.0, 2.0, 0.0, 3, 0), "b": peer(0.0, 0.0, 0.0, 4, 0) })),
            0,
        );
        let views = s.visible(3);
        assert_eq!(views.len(), 1);
        assert_eq!(views[0], GhostView { name: "Pip".into(), x: 1.0, y: 2.0, angle: 0.0 });
    }

    #[test]
    fn test_publish_is_rate_limited_and_rounded() {
        let hub = MemoryHub::new();
        let mut net = hub.connect();
        let mut s = sync("me");
        s.set_name("Merry");
        assert!(s.connect(&mut net));

        assert!(s.publish(&mut net, Vec2::new(10.4, 20.6), 1.23456, 2, 1000));
        assert!(!s.publish(&mut net, Vec2::new(11.0, 20.0), 0.0, 2, 1050));
        assert!(s.publish(&mut net, Vec2::new(12.0, 20.0), 0.0, 2, 1100));

        let record: PlayerRecord =
            serde_json::from_value(hub.get("players/me").unwrap()).unwrap();
        assert_eq!(record.x, 12.0);
        assert_eq!(record.name, "Merry");
        assert_eq!(record.timestamp, 1100);

        s.leave(&mut net);
        assert!(hub.get("players/me").is_none());
    }

    #[test]
    fn test_angle_precision_is_reduced() {
        let hub = MemoryHub::new();
        let mut net = hub.connect();
        let mut s = sync("me");
        s.connect(&mut net);
        s.publish(&mut net, Vec2::ZERO, 1.23456, 0, 0);
        let record: PlayerRecord =
            serde_json::from_value(hub.get("players/me").unwrap()).unwrap();
        assert!((record.angle - 1.23).abs() < 1e-6);
    }

    #[test]
    fn test_offline_degrades_to_solo() {
        let mut net = OfflineStore;
        let mut s = sync("me");
        assert!(!s.connect(&mut net));
        assert!(!s.publish(&mut net, Vec2::ZERO, 0.0, 0, 0));
        s.interpolate(0.016);
        assert!(s.visible(0).is_empty());
        s.leave(&mut net);
    }
}
