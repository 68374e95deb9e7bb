//! Board primitives: players, positions, board constants

pub mod game;
pub mod index;

pub use game::{GameState, MoveInfo, ParseGameError, ShapeUpdate};

use serde::{Deserialize, Serialize};

/// Default board size (19x19, standard Pente)
pub const DEFAULT_BOARD_SIZE: usize = 19;

/// The two players. `Black` moves first and must open in the center.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Player {
    Black,
    White,
}

impl Player {
    /// Get the other player
    #[inline]
    pub fn opponent(self) -> Player {
        match self {
            Player::Black => Player::White,
            Player::White => Player::Black,
        }
    }

    /// Index into per-player arrays (captures, etc.)
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Player::Black => 0,
            Player::White => 1,
        }
    }

    /// Byte used for this player's stones in board keys and pattern windows
    #[inline]
    pub fn as_byte(self) -> u8 {
        match self {
            Player::Black => b'0',
            Player::White => b'1',
        }
    }
}

/// Position on the board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pos {
    pub row: u8,
    pub col: u8,
}

impl Pos {
    #[inline]
    pub fn new(row: u8, col: u8) -> Self {
        Self { row, col }
    }

    #[inline]
    pub fn to_index(self, size: usize) -> usize {
        self.row as usize * size + self.col as usize
    }

    #[inline]
    pub fn is_valid(row: i32, col: i32, size: usize) -> bool {
        row >= 0 && row < size as i32 && col >= 0 && col < size as i32
    }

    /// Euclidean distance to another position
    pub fn distance_to(self, other: Pos) -> f64 {
        let dr = self.row as f64 - other.row as f64;
        let dc = self.col as f64 - other.col as f64;
        dr.hypot(dc)
    }

    /// Pente.org-style coordinates (letters skip I, rows count from the bottom)
    pub fn to_standard_coords(self, size: usize) -> String {
        const LETTERS: &[u8] = b"ABCDEFGHJKLMNOPQRST";
        let letter = LETTERS.get(self.col as usize).copied().unwrap_or(b'_');
        format!("{}{}", letter as char, size - self.row as usize)
    }
}

impl PartialOrd for Pos {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pos {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.row, self.col).cmp(&(other.row, other.col))
    }
}

impl std::fmt::Display for Pos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.row, self.col)
    }
}
