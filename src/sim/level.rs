//! Level grids and the built-in campaign
//!
//! A [`Level`] is a rectangular row-major grid of [`Tile`]s. The canonical
//! copy handed out by a [`LevelSource`] is never mutated; every attempt plays
//! on its own clone so collected presents vanish only until the next restart.

use glam::Vec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::tile::Tile;
use crate::consts::TILE_SIZE;

/// Errors raised while building a level from external data
#[derive(Debug, Error)]
pub enum LevelError {
    #[error("level has no rows")]
    Empty,
    #[error("unknown tile code {code} at row {row}, column {col}")]
    UnknownCode { code: u8, row: usize, col: usize },
    #[error("unknown tile glyph {glyph:?} at row {row}, column {col}")]
    UnknownGlyph { glyph: char, row: usize, col: usize },
    #[error("malformed level json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Integer grid cell. Signed so positions off the left/top edge stay representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cell {
    pub row: i64,
    pub col: i64,
}

/// A rectangular tile grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Level {
    rows: usize,
    cols: usize,
    tiles: Vec<Tile>,
    /// World-unit edge length of a cell
    pub tile_size: f32,
}

impl Level {
    /// Build from rows of tiles. Short rows are padded with water.
    pub fn from_rows(rows: Vec<Vec<Tile>>) -> Result<Self, LevelError> {
        let cols = rows.iter().map(Vec::len).max().unwrap_or(0);
        if rows.is_empty() || cols == 0 {
            return Err(LevelError::Empty);
        }
        if rows.iter().any(|r| r.len() != cols) {
            log::warn!("Ragged level rows, padding to {cols} columns");
        }
        let mut tiles = Vec::with_capacity(rows.len() * cols);
        for row in &rows {
            tiles.extend_from_slice(row);
            tiles.extend(std::iter::repeat_n(Tile::Empty, cols - row.len()));
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            tiles,
            tile_size: TILE_SIZE,
        })
    }

    /// Build from editor tile codes
    pub fn from_codes(codes: &[Vec<u8>]) -> Result<Self, LevelError> {
        let rows = codes
            .iter()
            .enumerate()
            .map(|(row, line)| {
                line.iter()
                    .enumerate()
                    .map(|(col, &code)| {
                        Tile::from_code(code).ok_or(LevelError::UnknownCode { code, row, col })
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_rows(rows)
    }

    /// Parse the editor's JSON export (`[[code, ...], ...]`)
    pub fn from_json(json: &str) -> Result<Self, LevelError> {
        let codes: Vec<Vec<u8>> = serde_json::from_str(json)?;
        Self::from_codes(&codes)
    }

    /// Build from compact glyph rows
    ///
    /// `_` water, `I` ice, `S` start, `F` finish, `O` snowman, `P` present,
    /// `C` tree, `W` snow, `B` ice block, `G` iceberg.
    pub fn from_ascii(lines: &[&str]) -> Result<Self, LevelError> {
        let rows = lines
            .iter()
            .enumerate()
            .map(|(row, line)| {
                line.chars()
                    .enumerate()
                    .map(|(col, glyph)| {
                        Ok(match glyph {
                            '_' => Tile::Empty,
                            'I' => Tile::Ice,
                            'S' => Tile::Start,
                            'F' => Tile::Finish,
                            'O' => Tile::Obstacle,
                            'P' => Tile::Present,
                            'C' => Tile::Coal,
                            'W' => Tile::Snow,
                            'B' => Tile::IceBlock,
                            'G' => Tile::Iceberg,
                            _ => return Err(LevelError::UnknownGlyph { glyph, row, col }),
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_rows(rows)
    }

    /// Export as editor tile codes
    pub fn to_codes(&self) -> Vec<Vec<u8>> {
        self.tiles
            .chunks(self.cols)
            .map(|row| row.iter().map(|t| t.code()).collect())
            .collect()
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Tile at a cell, or `None` off the grid
    pub fn get(&self, cell: Cell) -> Option<Tile> {
        self.index(cell).map(|i| self.tiles[i])
    }

    /// Overwrite a tile. Returns false off the grid.
    pub fn set(&mut self, cell: Cell, tile: Tile) -> bool {
        match self.index(cell) {
            Some(i) => {
                self.tiles[i] = tile;
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, cell: Cell) -> bool {
        self.index(cell).is_some()
    }

    /// Grid cell containing a world position (may be off the grid)
    pub fn cell_at(&self, pos: Vec2) -> Cell {
        Cell {
            row: (pos.y / self.tile_size).floor() as i64,
            col: (pos.x / self.tile_size).floor() as i64,
        }
    }

    /// Nearest on-grid cell, for safe lookups
    pub fn clamp_cell(&self, cell: Cell) -> Cell {
        Cell {
            row: cell.row.clamp(0, self.rows as i64 - 1),
            col: cell.col.clamp(0, self.cols as i64 - 1),
        }
    }

    /// World position of a cell's centre
    pub fn cell_center(&self, cell: Cell) -> Vec2 {
        Vec2::new(
            (cell.col as f32 + 0.5) * self.tile_size,
            (cell.row as f32 + 0.5) * self.tile_size,
        )
    }

    /// First Start cell in row-major order
    pub fn start_cell(&self) -> Option<Cell> {
        self.cells().find(|&(_, t)| t == Tile::Start).map(|(c, _)| c)
    }

    /// Where the player spawns. Falls back to the centre of the top-left cell.
    pub fn spawn_point(&self) -> Vec2 {
        match self.start_cell() {
            Some(cell) => self.cell_center(cell),
            None => {
                log::warn!("Level has no Start tile, spawning at the top-left cell");
                self.cell_center(Cell { row: 0, col: 0 })
            }
        }
    }

    /// All cells with their tiles, row-major
    pub fn cells(&self) -> impl Iterator<Item = (Cell, Tile)> + '_ {
        self.tiles.iter().enumerate().map(|(i, &t)| {
            (
                Cell {
                    row: (i / self.cols) as i64,
                    col: (i % self.cols) as i64,
                },
                t,
            )
        })
    }

    /// World-space size of the whole grid
    pub fn world_size(&self) -> Vec2 {
        Vec2::new(self.cols as f32, self.rows as f32) * self.tile_size
    }

    fn index(&self, cell: Cell) -> Option<usize> {
        if cell.row < 0 || cell.col < 0 {
            return None;
        }
        let (row, col) = (cell.row as usize, cell.col as usize);
        (row < self.rows && col < self.cols).then(|| row * self.cols + col)
    }
}

/// Supplies canonical levels by index
pub trait LevelSource {
    /// Number of levels
    fn len(&self) -> usize;

    /// Fresh copy of a level, `None` past the end
    fn level(&self, index: usize) -> Option<Level>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A fixed list of levels
#[derive(Debug, Clone, Default)]
pub struct LevelPack {
    levels: Vec<Level>,
}

impl LevelPack {
    pub fn new(levels: Vec<Level>) -> Self {
        Self { levels }
    }

    /// The twenty built-in levels
    pub fn campaign() -> Self {
        let mut levels = Vec::with_capacity(CAMPAIGN.len() + 3);
        for (i, rows) in CAMPAIGN.iter().enumerate() {
            // Levels 11-13 are generated diagonals
            if i == 10 {
                levels.extend([7, 8, 9].map(snake));
            }
            match Level::from_ascii(rows) {
                Ok(level) => levels.push(level),
                Err(e) => log::warn!("Skipping broken campaign level {i}: {e}"),
            }
        }
        Self { levels }
    }
}

impl LevelSource for LevelPack {
    fn len(&self) -> usize {
        self.levels.len()
    }

    fn level(&self, index: usize) -> Option<Level> {
        self.levels.get(index).cloned()
    }
}

/// A diagonal two-tile-wide ribbon from the top-left Start to the bottom-right Finish
fn snake(size: usize) -> Level {
    let rows: Vec<Vec<Tile>> = (0..size)
        .map(|i| {
            let mut row = vec![Tile::Empty; size];
            row[i] = Tile::Ice;
            if i + 1 < size {
                row[i + 1] = Tile::Ice;
            }
            if i == 0 {
                row[0] = Tile::Start;
            } else if i == size - 1 {
                row[size - 1] = Tile::Finish;
            }
            row
        })
        .collect();
    Level {
        rows: size,
        cols: size,
        tiles: rows.into_iter().flatten().collect(),
        tile_size: TILE_SIZE,
    }
}

/// Hand-built campaign levels (the three generated diagonals slot in after the tenth)
const CAMPAIGN: [&[&str]; 17] = [
    &["_______", "SIWIWIF", "_______"],
    &["SII___", "__I___", "__III_", "____I_", "____IF"],
    &["__III_", "SII_I_", "____IF", "______"],
    &["_III__", "SIOIIF", "_III__"],
    &["_S____", "_I____", "_IIII_", "____I_", "_FIII_", "______"],
    &["SII__IF", "__IIII_", "___O___"],
    &["SI____", "_III__", "___I__", "_III__", "_I____", "_IIIIF"],
    &["___IIF", "_SII__", "___O__", "___I__"],
    &["SIOIOIF", "_I_I_I_", "_IIIII_"],
    &["__IF_", "SII__", "_IOI_", "_I_I_", "_III_"],
    &["SIII__", "___I__", "_III__", "_I____", "_IIIIF"],
    &["FIIIS", "_O_O_", "_III_"],
    &["SIII", "_OOI", "___I", "FIII"],
    &["SIIII", "__P__", "_IIII", "_I___", "_F___"],
    &["SI", "II", "II", "IF"],
    &["SIOPOIF"],
    &["___F_", "__II_", "_IIO_", "SI___"],
];
