//! Shared network state
//!
//! Peers exchange state through a generic publish/subscribe key-value
//! store. Player positions live under `players/{id}` and bombs under
//! `bombs/{id}`. A subscription delivers the full child map of its path
//! every time anything under it changes.
//!
//! Network trouble is never fatal: callers log [`NetError`]s and carry on.

pub mod hazard;
pub mod memory;
pub mod sync;

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use hazard::{Detonation, HazardTracker, HazardView};
pub use memory::{MemoryHub, MemoryStore, OfflineStore};
pub use sync::{Ghost, GhostView, Pose, RemoteSync};

/// Path holding every player's last published state
pub const PLAYERS_PATH: &str = "players";
/// Path holding live bombs
pub const BOMBS_PATH: &str = "bombs";

/// Errors from the shared store
#[derive(Debug, Error)]
pub enum NetError {
    #[error("network store is offline")]
    Offline,
    #[error("invalid key {0:?}")]
    BadKey(String),
    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Full contents of a subscribed path, `None` when it is empty
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub path: String,
    pub value: Option<Value>,
}

/// Publish/subscribe key-value store
pub trait NetworkStore {
    fn set(&mut self, key: &str, value: Value) -> Result<(), NetError>;
    fn remove(&mut self, key: &str) -> Result<(), NetError>;
    /// Delete `key` when this client disconnects
    fn remove_on_disconnect(&mut self, key: &str) -> Result<(), NetError>;
    /// Start receiving snapshots of `path`
    fn subscribe(&mut self, path: &str) -> Result<(), NetError>;
    /// Snapshots delivered since the last poll, oldest first
    fn poll(&mut self) -> Vec<Snapshot>;
}

/// Build `path/id`
pub fn child_key(path: &str, id: &str) -> String {
    format!("{path}/{id}")
}

/// Random 9-character base-36 identifier
pub fn random_id(rng: &mut impl Rng) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    (0..9)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect()
}

/// A player's published state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    #[serde(default)]
    pub name: String,
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub angle: f32,
    /// Level index, -1 for an editor level
    pub level: i64,
    /// Publisher's wall clock (ms since the epoch)
    pub timestamp: u64,
}

/// A bomb as stored on the network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BombRecord {
    pub x: f32,
    pub y: f32,
    pub level: i64,
    pub owner_id: String,
    /// Placement time (ms since the epoch)
    pub placed_at: u64,
}

/// Decode every well-formed child of a snapshot, skipping the rest
pub fn decode_children<T: serde::de::DeserializeOwned>(value: Option<&Value>) -> Vec<(String, T)> {
    let Some(value) = value else {
        return Vec::new();
    };
    let Some(map) = value.as_object() else {
        log::warn!("Ignoring snapshot that is not an object");
        return Vec::new();
    };
    map.iter()
        .filter_map(|(id, child)| match serde_json::from_value::<T>(child.clone()) {
            Ok(record) => Some((id.clone(), record)),
            Err(e) => {
                log::warn!("Skipping malformed entry {id}: {e}");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;
    use serde_json::json;

    #[test]
    fn test_random_id_shape() {
        let mut rng = Pcg32::seed_from_u64(7);
        let a = random_id(&mut rng);
        let b = random_id(&mut rng);
        assert_eq!(a.len(), 9);
        assert!(a.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_decode_skips_malformed_children() {
        let snapshot = json!({
            "good": { "name": "Ana", "x": 1.0, "y": 2.0, "angle": 0.5, "level": 3, "timestamp": 10 },
            "bad": { "x": "left" },
        });
        let players: Vec<(String, PlayerRecord)> = decode_children(Some(&snapshot));
        assert_eq!(players.len(), 1);
        assert_eq!(players[0].0, "good");
        assert_eq!(players[0].1.level, 3);

        let none: Vec<(String, PlayerRecord)> = decode_children(Some(&json!(42)));
        assert!(none.is_empty());
    }

    #[test]
    fn test_bomb_record_wire_names() {
        let bomb = BombRecord {
            x: 1.0,
            y: 2.0,
            level: 0,
            owner_id: "abc".into(),
            placed_at: 99,
        };
        let value = serde_json::to_value(&bomb).unwrap();
        assert_eq!(value["ownerId"], "abc");
        assert_eq!(value["placedAt"], 99);
    }
}
