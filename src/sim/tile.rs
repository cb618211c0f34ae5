//! Tile types
//!
//! A closed set of cell kinds. Numeric codes match the level editor's
//! on-disk format.

use serde::{Deserialize, Serialize};

/// One cell of a level grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Tile {
    /// Open water; the player falls
    #[default]
    Empty,
    Ice,
    /// Spawn point
    Start,
    /// Goal; touching it advances to the next level
    Finish,
    /// Snowman; crashing into it is fatal
    Obstacle,
    /// Collectible, becomes Ice once picked up
    Present,
    /// Tree; the player bounces off
    Coal,
    Snow,
    /// Small iceberg; fatal
    IceBlock,
    /// Large iceberg; fatal
    Iceberg,
}

/// Editor palette, in display order
pub const PALETTE: [Tile; 10] = [
    Tile::Ice,
    Tile::Snow,
    Tile::Iceberg,
    Tile::IceBlock,
    Tile::Obstacle,
    Tile::Coal,
    Tile::Present,
    Tile::Start,
    Tile::Finish,
    Tile::Empty,
];

/// Ground drawn underneath a tile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Floor {
    Water,
    Ice,
    Snow,
}

impl Tile {
    /// Decode an editor tile code
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => Tile::Empty,
            1 => Tile::Ice,
            2 => Tile::Start,
            3 => Tile::Finish,
            4 => Tile::Obstacle,
            5 => Tile::Present,
            6 => Tile::Coal,
            7 => Tile::Snow,
            8 => Tile::IceBlock,
            9 => Tile::Iceberg,
            _ => return None,
        })
    }

    /// Editor tile code
    pub fn code(self) -> u8 {
        match self {
            Tile::Empty => 0,
            Tile::Ice => 1,
            Tile::Start => 2,
            Tile::Finish => 3,
            Tile::Obstacle => 4,
            Tile::Present => 5,
            Tile::Coal => 6,
            Tile::Snow => 7,
            Tile::IceBlock => 8,
            Tile::Iceberg => 9,
        }
    }

    /// Touching this tile kills the player outright
    pub fn is_hard_hazard(self) -> bool {
        matches!(self, Tile::Obstacle | Tile::IceBlock | Tile::Iceberg)
    }

    /// Ground drawn underneath the tile
    pub fn floor(self) -> Floor {
        match self {
            // Icebergs float in the water
            Tile::Empty | Tile::Iceberg => Floor::Water,
            Tile::Snow => Floor::Snow,
            Tile::Ice
            | Tile::Start
            | Tile::Finish
            | Tile::Obstacle
            | Tile::Present
            | Tile::Coal
            | Tile::IceBlock => Floor::Ice,
        }
    }

    /// Sprite key of the object standing on the tile, if any
    pub fn prop_sprite(self) -> Option<&'static str> {
        match self {
            Tile::Empty | Tile::Ice | Tile::Snow => None,
            Tile::Start => Some("start"),
            Tile::Finish => Some("finish"),
            Tile::Obstacle => Some("snowman"),
            Tile::Present => Some("present"),
            Tile::Coal => Some("tree"),
            Tile::IceBlock => Some("iceblock"),
            Tile::Iceberg => Some("iceberg"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        for tile in PALETTE {
            assert_eq!(Tile::from_code(tile.code()), Some(tile));
        }
        assert_eq!(Tile::from_code(10), None);
        assert_eq!(Tile::Present.code(), 5);
    }

    #[test]
    fn test_hazard_classes() {
        assert!(Tile::Obstacle.is_hard_hazard());
        assert!(Tile::Iceberg.is_hard_hazard());
        assert!(!Tile::Coal.is_hard_hazard());
        assert_eq!(Tile::Iceberg.floor(), Floor::Water);
        assert_eq!(Tile::Snow.prop_sprite(), None);
    }
}
