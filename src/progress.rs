//! Player progression
//!
//! Tracks the highest unlocked level, which presents have been picked up,
//! the present currency and the skins bought with it. The simulation only
//! talks to the [`ProgressStore`] trait; [`Progress`] is the JSON-backed
//! implementation.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while persisting progress
#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("failed to access save file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed save file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Progression collaborator used by the session
pub trait ProgressStore {
    /// Number of levels completed (index of the highest unlocked level)
    fn max_level(&self) -> usize;
    /// Record that a level was finished
    fn complete_level(&mut self, index: usize);
    fn is_item_collected(&self, level: usize, row: usize, col: usize) -> bool;
    /// Record a picked-up present
    fn collect_item(&mut self, level: usize, row: usize, col: usize);
    fn add_currency(&mut self, amount: u64);
    /// Spend currency. Returns false and changes nothing if the balance is short.
    fn spend_currency(&mut self, amount: u64) -> bool;
}

/// A purchasable player tint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Skin {
    pub id: &'static str,
    pub name: &'static str,
    pub price: u64,
    /// RGB tint
    pub tint: u32,
}

/// Skin catalogue; the first entry is free and always owned
pub const SKINS: [Skin; 7] = [
    Skin { id: "default", name: "Original", price: 0, tint: 0xffffff },
    Skin { id: "red", name: "Red Scarf", price: 50, tint: 0xffaaaa },
    Skin { id: "gold", name: "Gold Member", price: 100, tint: 0xffd700 },
    Skin { id: "shadow", name: "Shadow", price: 200, tint: 0x888888 },
    Skin { id: "emerald", name: "Emerald", price: 150, tint: 0x88ff88 },
    Skin { id: "ice", name: "Ice Cold", price: 75, tint: 0xaaddff },
    Skin { id: "pink", name: "Fabulous", price: 120, tint: 0xffccff },
];

/// Persisted progression data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressData {
    /// Present currency balance
    pub presents: u64,
    pub unlocked_skins: Vec<String>,
    pub selected_skin: String,
    /// Count of completed levels
    pub max_level: usize,
    /// Collected present keys (`level:row:col`)
    pub collected: BTreeSet<String>,
}

impl Default for ProgressData {
    fn default() -> Self {
        Self {
            presents: 0,
            unlocked_skins: vec![SKINS[0].id.to_string()],
            selected_skin: SKINS[0].id.to_string(),
            max_level: 0,
            collected: BTreeSet::new(),
        }
    }
}

/// Progression store, optionally saved to a JSON file after every change
#[derive(Debug, Clone, Default)]
pub struct Progress {
    pub data: ProgressData,
    path: Option<PathBuf>,
}

impl Progress {
    /// In-memory progress that is never written anywhere
    pub fn new() -> Self {
        Self::default()
    }

    /// Load progress from a save file, starting fresh if it is absent or corrupt
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let data = match Self::read(&path) {
            Ok(data) => {
                log::info!("Loaded progress: {} levels, {} presents", data.max_level, data.presents);
                data
            }
            Err(ProgressError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No save at {}, starting fresh", path.display());
                ProgressData::default()
            }
            Err(e) => {
                log::warn!("Unusable save at {} ({e}), starting fresh", path.display());
                ProgressData::default()
            }
        };
        Self {
            data,
            path: Some(path),
        }
    }

    fn read(path: &Path) -> Result<ProgressData, ProgressError> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Write to the save file, if there is one
    pub fn save(&self) -> Result<(), ProgressError> {
        if let Some(path) = &self.path {
            let json = serde_json::to_string_pretty(&self.data)?;
            fs::write(path, json)?;
        }
        Ok(())
    }

    fn persist(&self) {
        if let Err(e) = self.save() {
            log::warn!("Failed to save progress: {e}");
        }
    }

    pub fn presents(&self) -> u64 {
        self.data.presents
    }

    pub fn has_skin(&self, id: &str) -> bool {
        self.data.unlocked_skins.iter().any(|s| s == id)
    }

    /// Buy a skin. Owning it already counts as success.
    pub fn buy_skin(&mut self, id: &str) -> bool {
        let Some(skin) = SKINS.iter().find(|s| s.id == id) else {
            return false;
        };
        if self.has_skin(id) {
            return true;
        }
        if !self.spend_currency(skin.price) {
            return false;
        }
        self.data.unlocked_skins.push(id.to_string());
        self.persist();
        log::info!("Bought skin {id}");
        true
    }

    pub fn equip_skin(&mut self, id: &str) -> bool {
        if !self.has_skin(id) {
            return false;
        }
        self.data.selected_skin = id.to_string();
        self.persist();
        true
    }

    pub fn selected_skin(&self) -> &'static Skin {
        SKINS
            .iter()
            .find(|s| s.id == self.data.selected_skin)
            .unwrap_or(&SKINS[0])
    }

    fn item_key(level: usize, row: usize, col: usize) -> String {
        format!("{level}:{row}:{col}")
    }
}

impl ProgressStore for Progress {
    fn max_level(&self) -> usize {
        self.data.max_level
    }

    fn complete_level(&mut self, index: usize) {
        if index >= self.data.max_level {
            self.data.max_level = index + 1;
            log::info!("Unlocked level {}", self.data.max_level);
            self.persist();
        }
    }

    fn is_item_collected(&self, level: usize, row: usize, col: usize) -> bool {
        self.data.collected.contains(&Self::item_key(level, row, col))
    }

    fn collect_item(&mut self, level: usize, row: usize, col: usize) {
        if self.data.collected.insert(Self::item_key(level, row, col)) {
            self.add_currency(1);
        }
    }

    fn add_currency(&mut self, amount: u64) {
        self.data.presents += amount;
        self.persist();
    }

    fn spend_currency(&mut self, amount: u64) -> bool {
        if self.data.presents < amount {
            return false;
        }
        self.data.presents -= amount;
        self.persist();
        true
    }
}
