//! Game state and the move engine: custodial captures, exact undo
//!
//! `GameState` is the single mutable position type. It is only ever changed
//! through [`GameState::make_move`] / [`GameState::undo_move`]; everything
//! else (the shape index, the canonical board key) is derived state that
//! those two keep in sync incrementally. The search walks the tree in place
//! on one `GameState`, relying on undo being the exact inverse of make.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use super::{Player, Pos, DEFAULT_BOARD_SIZE};
use crate::shapes::LinearShape;

/// Shape deltas caused by one move
#[derive(Debug, Clone, Default)]
pub struct ShapeUpdate {
    pub added: Vec<LinearShape>,
    pub removed: Vec<LinearShape>,
}

/// Undo record for one applied move.
///
/// This is the sole mechanism for exact undo: nothing is recomputed on
/// undo, the deltas recorded here are replayed in reverse.
#[derive(Debug, Clone)]
pub struct MoveInfo {
    /// The stone placed by this move
    pub added_gems: Vec<Pos>,
    /// Captured stones, always in same-owner pairs
    pub removed_gems: Vec<Pos>,
    /// Exact shape-index deltas caused by this move
    pub shape_update: ShapeUpdate,
}

/// Error parsing a serialized game string
#[derive(Debug, Error)]
pub enum ParseGameError {
    #[error("missing '~' separator between board size and moves")]
    MissingSeparator,
    #[error("invalid board size: {0}")]
    InvalidSize(String),
    #[error("invalid move token: {0}")]
    InvalidMove(String),
    #[error("move ({0}, {1}) could not be replayed")]
    IllegalMove(usize, usize),
}

/// The mutable position: sparse board, capture counts, undo log and the
/// incrementally maintained linear shape index.
#[derive(Debug, Clone)]
pub struct GameState {
    size: usize,
    cells: Vec<Option<Player>>,
    /// Canonical one-byte-per-cell encoding, kept in sync with `cells`;
    /// doubles as the transposition-table position key
    board_key: Vec<u8>,
    current_player: Player,
    /// Captured pairs per player; 5 pairs wins
    captures: [u8; 2],
    n_moves: u32,
    is_over: bool,
    prev_moves: Vec<MoveInfo>,
    pub(crate) linear_shapes: Vec<LinearShape>,
}

impl GameState {
    /// Create an empty game on an NxN board
    pub fn new(size: usize) -> Self {
        Self {
            size,
            cells: vec![None; size * size],
            board_key: vec![b'_'; size * size],
            current_player: Player::Black,
            captures: [0, 0],
            n_moves: 0,
            is_over: false,
            prev_moves: Vec::new(),
            linear_shapes: Vec::new(),
        }
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Center cell index (the mandatory first move)
    #[inline]
    pub fn center(&self) -> usize {
        self.size / 2
    }

    #[inline]
    pub fn current_player(&self) -> Player {
        self.current_player
    }

    #[inline]
    pub fn captures(&self, player: Player) -> u8 {
        self.captures[player.index()]
    }

    #[inline]
    pub fn n_moves(&self) -> u32 {
        self.n_moves
    }

    #[inline]
    pub fn is_over(&self) -> bool {
        self.is_over
    }

    #[inline]
    pub fn linear_shapes(&self) -> &[LinearShape] {
        &self.linear_shapes
    }

    #[inline]
    pub fn prev_moves(&self) -> &[MoveInfo] {
        &self.prev_moves
    }

    /// Canonical board encoding (`'_'`/`'0'`/`'1'` per cell, row-major)
    #[inline]
    pub fn board_key(&self) -> &[u8] {
        &self.board_key
    }

    /// Stone at (r, c); `None` for empty or out of bounds
    #[inline]
    pub fn get(&self, r: i32, c: i32) -> Option<Player> {
        if !Pos::is_valid(r, c, self.size) {
            return None;
        }
        self.cells[r as usize * self.size + c as usize]
    }

    /// Window byte for (r, c): the stone byte or `'_'` when empty.
    /// Callers must ensure (r, c) is on the board.
    #[inline]
    pub(crate) fn cell_byte(&self, r: i32, c: i32) -> u8 {
        self.board_key[r as usize * self.size + c as usize]
    }

    #[inline]
    pub fn is_empty_cell(&self, pos: Pos) -> bool {
        self.cells[pos.to_index(self.size)].is_none()
    }

    /// All stones currently on the board
    pub fn stones(&self) -> impl Iterator<Item = (Pos, Player)> + '_ {
        self.cells.iter().enumerate().filter_map(|(i, cell)| {
            cell.map(|p| {
                (
                    Pos::new((i / self.size) as u8, (i % self.size) as u8),
                    p,
                )
            })
        })
    }

    fn set_cell(&mut self, pos: Pos, value: Option<Player>) {
        let idx = pos.to_index(self.size);
        self.cells[idx] = value;
        self.board_key[idx] = match value {
            Some(p) => p.as_byte(),
            None => b'_',
        };
    }

    /// Apply a move for the current player.
    ///
    /// Fails silently (returns `false`, state untouched) if the cell is out
    /// of bounds or occupied, or if this is move 0 and not the board center.
    /// On success: places the stone, performs custodial captures in all 8
    /// directions, refreshes linear shapes local to every changed cell,
    /// checks for game over, records the undo log entry and flips the
    /// player to move.
    pub fn make_move(&mut self, r: usize, c: usize) -> bool {
        if r >= self.size || c >= self.size {
            return false;
        }
        let pos = Pos::new(r as u8, c as u8);
        if !self.is_empty_cell(pos) {
            return false;
        }
        let center = self.center();
        if self.n_moves == 0 && (r != center || c != center) {
            return false;
        }

        let mover = self.current_player;
        let opponent = mover.opponent();

        self.set_cell(pos, Some(mover));
        let mut added_gems = vec![pos];
        let mut removed_gems: Vec<Pos> = Vec::new();

        // custodial capture: mover - enemy - enemy - mover along any of the
        // 8 directions removes the flanked enemy pair
        let (ri, ci) = (r as i32, c as i32);
        for dy in -1i32..=1 {
            for dx in -1i32..=1 {
                if dy == 0 && dx == 0 {
                    continue;
                }
                if !Pos::is_valid(ri + 3 * dy, ci + 3 * dx, self.size) {
                    continue;
                }
                let p1 = (ri + dy, ci + dx);
                let p2 = (ri + 2 * dy, ci + 2 * dx);
                let p3 = (ri + 3 * dy, ci + 3 * dx);
                if self.get(p1.0, p1.1) == Some(opponent)
                    && self.get(p2.0, p2.1) == Some(opponent)
                    && self.get(p3.0, p3.1) == Some(mover)
                {
                    let g1 = Pos::new(p1.0 as u8, p1.1 as u8);
                    let g2 = Pos::new(p2.0 as u8, p2.1 as u8);
                    self.set_cell(g1, None);
                    self.set_cell(g2, None);
                    removed_gems.push(g1);
                    removed_gems.push(g2);
                    self.captures[mover.index()] += 1;
                }
            }
        }

        // refresh shapes local to every changed cell
        let mut shape_update = ShapeUpdate::default();
        for gem in added_gems.iter().chain(removed_gems.iter()).copied() {
            self.update_linear_shapes(gem, &mut shape_update);
        }

        if self.captures[0] >= 5
            || self.captures[1] >= 5
            || self
                .linear_shapes
                .iter()
                .any(|s| s.kind == crate::shapes::ShapeKind::Pente)
        {
            self.is_over = true;
        }

        self.prev_moves.push(MoveInfo {
            added_gems: std::mem::take(&mut added_gems),
            removed_gems,
            shape_update,
        });
        self.current_player = opponent;
        self.n_moves += 1;
        true
    }

    /// Undo the last move. Exact inverse of [`GameState::make_move`] for any
    /// state it was applied to. Returns `false` when there is nothing to undo.
    pub fn undo_move(&mut self) -> bool {
        let Some(info) = self.prev_moves.pop() else {
            return false;
        };
        let prev_player = self.current_player.opponent();

        for &gem in &info.added_gems {
            self.set_cell(gem, None);
        }
        // captures always come off in same-owner pairs; the capture count
        // arithmetic below depends on it
        debug_assert!(info.removed_gems.len() % 2 == 0);
        self.captures[prev_player.index()] -= (info.removed_gems.len() / 2) as u8;
        for &gem in &info.removed_gems {
            // the player about to become non-current owned the captured stones
            self.set_cell(gem, Some(self.current_player));
        }

        self.linear_shapes
            .retain(|s| !info.shape_update.added.iter().any(|a| a.hash == s.hash));
        self.linear_shapes
            .extend(info.shape_update.removed.iter().copied());

        self.current_player = prev_player;
        self.n_moves -= 1;
        self.is_over = false;
        true
    }
}

impl PartialEq for GameState {
    /// Position equality: board, mover, captures, move count, terminal flag
    /// and the shape set (order-independent). The undo log is not compared.
    fn eq(&self, other: &Self) -> bool {
        if self.size != other.size
            || self.board_key != other.board_key
            || self.current_player != other.current_player
            || self.captures != other.captures
            || self.n_moves != other.n_moves
            || self.is_over != other.is_over
        {
            return false;
        }
        let mut a: Vec<u64> = self.linear_shapes.iter().map(|s| s.hash).collect();
        let mut b: Vec<u64> = other.linear_shapes.iter().map(|s| s.hash).collect();
        a.sort_unstable();
        b.sort_unstable();
        a == b
    }
}

impl fmt::Display for GameState {
    /// `"<boardSize>~<r0>.<c0>|<r1>.<c1>|..."` - board size plus ordered
    /// move history
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}~", self.size)?;
        for (i, info) in self.prev_moves.iter().enumerate() {
            if i > 0 {
                write!(f, "|")?;
            }
            write!(f, "{}", info.added_gems[0])?;
        }
        Ok(())
    }
}

impl FromStr for GameState {
    type Err = ParseGameError;

    /// Rebuild a game by replaying every move through `make_move`, so the
    /// captures and shape index always match what incremental play would
    /// have produced. Derived state is never copied from the string.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (size_str, move_str) = s
            .split_once('~')
            .ok_or(ParseGameError::MissingSeparator)?;
        let size: usize = size_str
            .parse()
            .map_err(|_| ParseGameError::InvalidSize(size_str.to_string()))?;
        if size == 0 || size > 52 {
            return Err(ParseGameError::InvalidSize(size_str.to_string()));
        }
        let mut game = GameState::new(size);
        for token in move_str.split('|').filter(|t| !t.is_empty()) {
            let (r_str, c_str) = token
                .split_once('.')
                .ok_or_else(|| ParseGameError::InvalidMove(token.to_string()))?;
            let r: usize = r_str
                .parse()
                .map_err(|_| ParseGameError::InvalidMove(token.to_string()))?;
            let c: usize = c_str
                .parse()
                .map_err(|_| ParseGameError::InvalidMove(token.to_string()))?;
            if !game.make_move(r, c) {
                return Err(ParseGameError::IllegalMove(r, c));
            }
        }
        Ok(game)
    }
}

impl Serialize for GameState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for GameState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new(DEFAULT_BOARD_SIZE)
    }
}
