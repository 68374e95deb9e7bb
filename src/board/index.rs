//! Incremental maintenance of the linear shape index
//!
//! After a cell changes, only shapes whose span crosses that cell can have
//! appeared or died. The updater runs two passes: an eviction pass over the
//! live set (cheap axis pre-check, then a character-by-character verify) and
//! an insertion pass that rebuilds the four local windows through the cell
//! and pattern-matches them. A full-board rescan exists as the reference
//! implementation for consistency checks in tests.

use std::collections::HashSet;

use super::game::{GameState, ShapeUpdate};
use super::Pos;
use crate::shapes::{window_matches, LinearShape, PATTERNS};

/// Canonical scan directions; reversed pattern variants cover the other four
const DIRECTIONS: [(i8, i8); 4] = [(0, 1), (1, 0), (1, 1), (-1, 1)];

/// Offset of (r, c) along `shape`'s line, if the cell lies inside its span
fn span_offset(shape: &LinearShape, r: i32, c: i32) -> Option<i32> {
    let dr = r - shape.begin.row as i32;
    let dc = c - shape.begin.col as i32;
    let (dy, dx) = (shape.dy as i32, shape.dx as i32);
    let i = if dy != 0 {
        if dr % dy != 0 {
            return None;
        }
        dr / dy
    } else {
        if dr != 0 {
            return None;
        }
        dc / dx
    };
    if i * dy != dr || i * dx != dc {
        return None;
    }
    (0..shape.length as i32).contains(&i).then_some(i)
}

impl GameState {
    /// Refresh the shape index around a changed cell, appending the deltas
    /// to `update` (consumed by the caller's undo record).
    pub(crate) fn update_linear_shapes(&mut self, pos: Pos, update: &mut ShapeUpdate) {
        let (r0, c0) = (pos.row as i32, pos.col as i32);

        // eviction: drop live shapes crossing the cell whose pattern no
        // longer matches the board
        let mut live = std::mem::take(&mut self.linear_shapes);
        live.retain(|shape| {
            if span_offset(shape, r0, c0).is_none() {
                return true;
            }
            let still_matches = (0..shape.length as usize).all(|i| {
                let (r, c) = shape.cell(i);
                self.cell_byte(r, c) == shape.pattern[i]
            });
            if !still_matches {
                update.removed.push(*shape);
            }
            still_matches
        });
        self.linear_shapes = live;

        // insertion: rebuild the four local windows through the cell and
        // match every known pattern against them
        let reach = PATTERNS.max_pattern_length() as i32 - 1;
        let mut known: HashSet<u64> = self.linear_shapes.iter().map(|s| s.hash).collect();
        for (dy, dx) in DIRECTIONS {
            let (dy_i, dx_i) = (dy as i32, dx as i32);
            let mut lo = -reach;
            while lo < 0 && !Pos::is_valid(r0 + lo * dy_i, c0 + lo * dx_i, self.size()) {
                lo += 1;
            }
            let mut hi = reach;
            while hi > 0 && !Pos::is_valid(r0 + hi * dy_i, c0 + hi * dx_i, self.size()) {
                hi -= 1;
            }
            let window: Vec<u8> = (lo..=hi)
                .map(|off| self.cell_byte(r0 + off * dy_i, c0 + off * dx_i))
                .collect();
            for m in window_matches(&window).iter() {
                let begin_off = lo + m.offset as i32;
                let begin = Pos::new(
                    (r0 + begin_off * dy_i) as u8,
                    (c0 + begin_off * dx_i) as u8,
                );
                let shape =
                    LinearShape::new(m.info.kind, m.info.owner, begin, dy, dx, m.info.pattern);
                if known.insert(shape.hash) {
                    self.linear_shapes.push(shape);
                    update.added.push(shape);
                }
            }
        }
    }

    /// Rebuild the complete shape set from scratch by scanning every line.
    /// Reference implementation for the incremental updater; used in tests
    /// and debug assertions, never on the hot path.
    pub fn scan_linear_shapes(&self) -> Vec<LinearShape> {
        let size = self.size() as i32;
        let mut shapes = Vec::new();
        let mut known: HashSet<u64> = HashSet::new();

        let mut scan_line = |start: (i32, i32), dy: i8, dx: i8| {
            let (dy_i, dx_i) = (dy as i32, dx as i32);
            let mut line = Vec::new();
            let (mut r, mut c) = start;
            while Pos::is_valid(r, c, self.size()) {
                line.push(self.cell_byte(r, c));
                r += dy_i;
                c += dx_i;
            }
            for m in window_matches(&line).iter() {
                let begin = Pos::new(
                    (start.0 + m.offset as i32 * dy_i) as u8,
                    (start.1 + m.offset as i32 * dx_i) as u8,
                );
                let shape =
                    LinearShape::new(m.info.kind, m.info.owner, begin, dy, dx, m.info.pattern);
                if known.insert(shape.hash) {
                    shapes.push(shape);
                }
            }
        };

        for r in 0..size {
            scan_line((r, 0), 0, 1);
        }
        for c in 0..size {
            scan_line((0, c), 1, 0);
        }
        for r in 0..size {
            scan_line((r, 0), 1, 1);
        }
        for c in 1..size {
            scan_line((0, c), 1, 1);
        }
        for r in 0..size {
            scan_line((r, 0), -1, 1);
        }
        for c in 1..size {
            scan_line((size - 1, c), -1, 1);
        }
        shapes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Player;
    use crate::shapes::ShapeKind;

    fn shape_hashes(shapes: &[LinearShape]) -> Vec<u64> {
        let mut hashes: Vec<u64> = shapes.iter().map(|s| s.hash).collect();
        hashes.sort_unstable();
        hashes
    }

    fn assert_index_consistent(game: &GameState) {
        assert_eq!(
            shape_hashes(game.linear_shapes()),
            shape_hashes(&game.scan_linear_shapes()),
            "incremental index diverged from rescan after {} moves",
            game.n_moves()
        );
    }

    #[test]
    fn test_open_pair_detected() {
        let mut g = GameState::new(19);
        g.make_move(9, 9); // B
        g.make_move(5, 5); // W
        g.make_move(9, 10); // B pair at 9,9 / 9,10
        let pairs: Vec<&LinearShape> = g
            .linear_shapes()
            .iter()
            .filter(|s| s.kind == ShapeKind::OpenPair && s.owner == Player::Black)
            .collect();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].begin, Pos::new(9, 8));
        assert_eq!((pairs[0].dy, pairs[0].dx), (0, 1));
    }

    #[test]
    fn test_blocking_evicts_open_shapes() {
        let mut g = GameState::new(19);
        g.make_move(9, 9); // B
        g.make_move(5, 5); // W
        g.make_move(9, 10); // B open pair
        assert!(g
            .linear_shapes()
            .iter()
            .any(|s| s.kind == ShapeKind::OpenPair && s.owner == Player::Black));
        g.make_move(9, 11); // W blocks one end: no longer an open pair
        assert!(!g
            .linear_shapes()
            .iter()
            .any(|s| s.kind == ShapeKind::OpenPair && s.owner == Player::Black));
        // blocking an open pair at the end creates a White capture threat
        assert!(g
            .linear_shapes()
            .iter()
            .any(|s| s.kind == ShapeKind::CaptureThreat && s.owner == Player::White));
        assert_index_consistent(&g);
    }

    #[test]
    fn test_incremental_matches_rescan_with_captures() {
        let mut g = GameState::new(19);
        let moves = [
            (9, 9),
            (9, 11),
            (9, 10),
            (9, 8), // capture
            (10, 10),
            (8, 8),
            (10, 9),
            (11, 9),
            (8, 10),
            (7, 11), // diagonal action
        ];
        for &(r, c) in &moves {
            assert!(g.make_move(r, c), "move ({}, {})", r, c);
            assert_index_consistent(&g);
        }
    }

    #[test]
    fn test_incremental_matches_rescan_after_undo() {
        let mut g = GameState::new(19);
        for &(r, c) in &[(9, 9), (9, 11), (9, 10), (9, 8), (10, 10), (8, 9)] {
            assert!(g.make_move(r, c));
        }
        while g.undo_move() {
            assert_index_consistent(&g);
        }
    }

    #[test]
    fn test_edge_windows_are_clipped() {
        // shapes hugging the board edge must be found despite window clipping
        let mut g = GameState::new(19);
        g.make_move(9, 9); // B center (required opening)
        g.make_move(0, 1); // W near the corner
        g.make_move(10, 10); // B
        g.make_move(0, 2); // W pair along the top edge
        assert_index_consistent(&g);
        // the pair's surrounding empties sit at columns 0 and 3, on-board
        assert!(g
            .linear_shapes()
            .iter()
            .any(|s| s.kind == ShapeKind::OpenPair
                && s.owner == Player::White
                && s.begin == Pos::new(0, 0)));
    }

    #[test]
    fn test_tria_and_threat_progression() {
        let mut g = GameState::new(19);
        g.make_move(9, 9); // B
        g.make_move(0, 0); // W
        g.make_move(9, 10); // B
        g.make_move(0, 2); // W
        g.make_move(9, 11); // B open tria
        assert!(g
            .linear_shapes()
            .iter()
            .any(|s| s.kind == ShapeKind::OpenTria && s.owner == Player::Black));
        g.make_move(0, 4); // W
        g.make_move(9, 12); // B open tessera
        assert!(g
            .linear_shapes()
            .iter()
            .any(|s| s.kind == ShapeKind::OpenTessera && s.owner == Player::Black));
        assert_index_consistent(&g);
    }
}
