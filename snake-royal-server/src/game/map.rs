//! Tile Map
//!
//! Fixed 48x32 grid of colored tiles. Snakes paint themselves onto the grid
//! and collision checks read it back, so the grid is the single source of
//! truth for occupancy. It is shipped whole inside every state snapshot.

use serde::{Serialize, Deserialize};

use crate::core::rng::ParkMiller;
use crate::core::vec2::GridVec2;
use crate::{TILE_MAP_HEIGHT, TILE_MAP_WIDTH};

/// Number of tiles in the grid.
pub const TILE_COUNT: usize = (TILE_MAP_WIDTH * TILE_MAP_HEIGHT) as usize;

/// Food tiles placed at the start of every round.
pub const ROUND_FOOD_COUNT: usize = 3;

/// RGB color.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    /// Red
    pub r: u8,
    /// Green
    pub g: u8,
    /// Blue
    pub b: u8,
}

impl Color {
    /// Background.
    pub const BLACK: Color = Color::new(0, 0, 0);
    /// Dead snake pieces.
    pub const GREY: Color = Color::new(128, 128, 128);
    /// Food.
    pub const ORANGE: Color = Color::new(255, 165, 0);

    /// Create a color.
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// What occupies a tile.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TileKind {
    /// Nothing
    #[default]
    Empty = 0,
    /// Head of a live snake
    SnakeHead = 1,
    /// Body of a live snake
    SnakeTail = 2,
    /// Remains of a dead snake
    SnakeDead = 3,
    /// Food
    Food = 4,
}

impl TileKind {
    /// Decode from the wire value.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(TileKind::Empty),
            1 => Some(TileKind::SnakeHead),
            2 => Some(TileKind::SnakeTail),
            3 => Some(TileKind::SnakeDead),
            4 => Some(TileKind::Food),
            _ => None,
        }
    }
}

/// One grid cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tile {
    /// Occupant.
    pub kind: TileKind,
    /// Paint color.
    pub color: Color,
}

/// The playing field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TileMap {
    tiles: Vec<Tile>,
}

impl Default for TileMap {
    fn default() -> Self {
        Self::new()
    }
}

impl TileMap {
    /// Create an empty grid.
    pub fn new() -> Self {
        Self {
            tiles: vec![Tile::default(); TILE_COUNT],
        }
    }

    #[inline]
    fn index(pos: GridVec2) -> usize {
        let pos = pos.wrap(TILE_MAP_WIDTH, TILE_MAP_HEIGHT);
        (pos.x + TILE_MAP_WIDTH * pos.y) as usize
    }

    /// Tile at `pos` (wrapped onto the grid).
    #[inline]
    pub fn get(&self, pos: GridVec2) -> Tile {
        self.tiles[Self::index(pos)]
    }

    /// Paint the tile at `pos`.
    #[inline]
    pub fn set(&mut self, pos: GridVec2, kind: TileKind, color: Color) {
        self.tiles[Self::index(pos)] = Tile { kind, color };
    }

    /// Clear every tile.
    pub fn reset(&mut self) {
        self.tiles.fill(Tile::default());
    }

    /// All tiles, row-major.
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// Replace the whole grid. Returns false (and leaves the grid alone) on a size mismatch.
    pub fn set_tiles(&mut self, tiles: &[Tile]) -> bool {
        if tiles.len() != TILE_COUNT {
            return false;
        }
        self.tiles.copy_from_slice(tiles);
        true
    }

    /// Count tiles of one kind.
    pub fn count(&self, kind: TileKind) -> usize {
        self.tiles.iter().filter(|t| t.kind == kind).count()
    }

    /// Place one food tile on a random empty cell.
    ///
    /// Draws from the shared generator, so authority and followers pick the
    /// same cell. Gives up after a bounded number of draws on a crowded grid.
    pub fn spawn_food(&mut self, rng: &mut ParkMiller) -> Option<GridVec2> {
        for _ in 0..TILE_COUNT * 4 {
            let x = rng.next_below(TILE_MAP_WIDTH as u32) as i32;
            let y = rng.next_below(TILE_MAP_HEIGHT as u32) as i32;
            let pos = GridVec2::new(x, y);
            if self.get(pos).kind == TileKind::Empty {
                self.set(pos, TileKind::Food, Color::ORANGE);
                return Some(pos);
            }
        }
        None
    }
}
