//! Lazy, priority-ordered move generation
//!
//! Good moves cause cutoffs, so the generator never builds a full move list.
//! [`MoveCursor`] walks through candidate tiers and produces exactly as many
//! moves as the search consumes:
//!
//! 1. opening book moves (moves 0, 1, 2 follow established theory),
//! 2. the principal-variation move from the previous iteration,
//! 3. the transposition-table hash move,
//! 4. killer moves for this ply,
//! 5. cells inside linear shapes, most forcing shapes first (narrowed to
//!    the only relevant shapes when a forced sequence is on the board),
//! 6. a bounded neighborhood around existing stones, nearest offsets first.
//!
//! The cursor holds no borrow of the game; the caller passes the state to
//! every `next_move` call, which must see the same position the cursor was
//! created for (the search guarantees this by undoing between calls).
//! Early-game board symmetries collapse mirror-image candidates.

use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::board::{GameState, Pos};
use crate::eval::get_captures_blocking_all;
use crate::rules::{detect_symmetries, is_restricted, Symmetry};
use crate::shapes::{LinearShape, ShapeKind};

/// Second-move candidates considered tenable on pente.org forums,
/// as offsets from the center
const SECOND_MOVE_OFFSETS: [(i32, i32); 9] = [
    (0, 1),
    (0, 2),
    (1, 1),
    (1, 2),
    (1, 3),
    (1, 4),
    (2, 3),
    (2, 4),
    (3, 4),
];

/// Third-move candidates: orthogonal, two spaces outside the restricted box
const THIRD_MOVE_OFFSETS: [(i32, i32); 4] = [(-3, 0), (0, -3), (0, 3), (3, 0)];

/// Ordering rank for a shape, lower is tried earlier. Mine-vs-opponent
/// matters: my forcing shapes come before blocking the opponent's.
fn shape_priority(mine: bool, kind: ShapeKind) -> u32 {
    use ShapeKind::*;
    match (mine, kind) {
        (true, PenteThreat4) => 0,
        (true, PenteThreat31) => 1,
        (true, PenteThreat22) => 2,
        (false, PenteThreat4) => 3,
        (false, PenteThreat31) => 4,
        (false, PenteThreat22) => 5,
        // shapes that can create an open tessera; stretch tria first
        // because it carries a vulnerable pair
        (true, StretchTria) => 6,
        (true, OpenTria) => 7,
        (false, StretchTria) => 8,
        (false, OpenTria) => 9,
        // shapes that can create a pente threat, important for me
        (true, ExtendableStretchTria2) => 10,
        (true, PentePotential2) => 11,
        (true, ExtendableStretchTria1) => 12,
        (true, PentePotential1) => 13,
        (true, ExtendableTria) => 14,
        // shapes that can create a tria
        (true, OpenPair) => 15,
        (true, StretchTwo) => 16,
        (true, DoubleStretchTwo) => 17,
        // captures are sometimes forcing
        (true, CaptureThreat) => 18,
        // block opponent non-forcing shapes
        (false, CaptureThreat) => 19,
        (false, OpenPair) => 20,
        (false, StretchTwo) => 21,
        (false, DoubleStretchTwo) => 22,
        (false, ExtendableStretchTria2) => 23,
        (false, PentePotential2) => 24,
        (false, ExtendableStretchTria1) => 25,
        (false, PentePotential1) => 26,
        (false, ExtendableTria) => 27,
        // keep stones in line with each other
        (true, ThreeGap) => 28,
        (false, ThreeGap) => 29,
        _ => u32::MAX,
    }
}

enum Stage {
    Opening,
    Pv,
    Hash,
    Killer(usize),
    ShapesInit,
    Shapes,
    FallbackInit,
    Fallback,
    Done,
}

struct FallbackState {
    dists: &'static [i32],
    gems: Vec<Pos>,
    di: usize,
    dj: usize,
    gi: usize,
}

/// Resumable move cursor; see the module docs for the tier order
pub struct MoveCursor {
    ply: u32,
    seen: HashSet<Pos>,
    exclude: HashSet<Pos>,
    symmetries: Vec<Symmetry>,
    pv_move: Option<Pos>,
    hash_move: Option<Pos>,
    killers: Vec<Pos>,
    stage: Stage,
    opening_idx: usize,
    opening_emitted: bool,
    shapes: Vec<LinearShape>,
    shape_idx: usize,
    cell_idx: usize,
    include_fallback: bool,
    fallback: Option<FallbackState>,
}

impl MoveCursor {
    /// Cursor with no ordering hints
    pub fn new(game: &GameState, ply: u32) -> Self {
        Self::with_hints(game, ply, &[], None, None, &[])
    }

    /// Cursor with full ordering hints. `exclude` suppresses moves (and
    /// their symmetric images) already covered by earlier variations.
    pub fn with_hints(
        game: &GameState,
        ply: u32,
        exclude: &[Pos],
        pv_move: Option<Pos>,
        hash_move: Option<Pos>,
        killers: &[Pos],
    ) -> Self {
        let symmetries = if game.n_moves() <= 5 {
            detect_symmetries(game)
        } else {
            Vec::new()
        };
        let mut exclude_set: HashSet<Pos> = exclude.iter().copied().collect();
        for sym in &symmetries {
            for m in exclude {
                exclude_set.insert(sym.apply(*m, game.size()));
            }
        }
        Self {
            ply,
            seen: HashSet::new(),
            exclude: exclude_set,
            symmetries,
            pv_move,
            hash_move,
            killers: killers.to_vec(),
            stage: Stage::Opening,
            opening_idx: 0,
            opening_emitted: false,
            shapes: Vec::new(),
            shape_idx: 0,
            cell_idx: 0,
            include_fallback: true,
            fallback: None,
        }
    }

    fn is_valid(&self, game: &GameState, r: i32, c: i32) -> bool {
        if !Pos::is_valid(r, c, game.size()) {
            return false;
        }
        let pos = Pos::new(r as u8, c as u8);
        if is_restricted(game, r as usize, c as usize) {
            return false;
        }
        if self.seen.contains(&pos) || self.exclude.contains(&pos) {
            return false;
        }
        game.is_empty_cell(pos)
    }

    /// Record a yielded move along with its symmetric images, so mirror
    /// duplicates of it are never produced
    fn register(&mut self, game: &GameState, pos: Pos) {
        self.seen.insert(pos);
        for sym in &self.symmetries {
            self.seen.insert(sym.apply(pos, game.size()));
        }
    }

    /// Produce the next candidate, or `None` when exhausted.
    /// `game` must be in the position this cursor was created for.
    pub fn next_move(&mut self, game: &GameState) -> Option<Pos> {
        if game.is_over() {
            return None;
        }
        loop {
            match self.stage {
                Stage::Opening => {
                    if let Some(m) = self.next_opening(game) {
                        return Some(m);
                    }
                }
                Stage::Pv => {
                    self.stage = Stage::Hash;
                    if let Some(m) = self.pv_move {
                        if self.is_valid(game, m.row as i32, m.col as i32) {
                            self.register(game, m);
                            return Some(m);
                        }
                    }
                }
                Stage::Hash => {
                    self.stage = Stage::Killer(0);
                    if let Some(m) = self.hash_move {
                        if self.is_valid(game, m.row as i32, m.col as i32) {
                            self.register(game, m);
                            return Some(m);
                        }
                    }
                }
                Stage::Killer(i) => {
                    if i >= self.killers.len() {
                        self.stage = Stage::ShapesInit;
                        continue;
                    }
                    self.stage = Stage::Killer(i + 1);
                    let m = self.killers[i];
                    if self.is_valid(game, m.row as i32, m.col as i32) {
                        self.register(game, m);
                        return Some(m);
                    }
                }
                Stage::ShapesInit => {
                    self.init_shapes(game);
                    self.stage = Stage::Shapes;
                }
                Stage::Shapes => {
                    if let Some(m) = self.next_shape_move(game) {
                        return Some(m);
                    }
                    self.stage = if self.include_fallback {
                        Stage::FallbackInit
                    } else {
                        Stage::Done
                    };
                }
                Stage::FallbackInit => {
                    self.init_fallback(game);
                    self.stage = Stage::Fallback;
                }
                Stage::Fallback => {
                    if let Some(m) = self.next_fallback_move(game) {
                        return Some(m);
                    }
                    self.stage = Stage::Done;
                }
                Stage::Done => return None,
            }
        }
    }

    fn next_opening(&mut self, game: &GameState) -> Option<Pos> {
        let center = game.center() as i32;
        match game.n_moves() {
            0 => {
                // center is the only legal opening; it may still be excluded
                // when searching for a second variation, in which case there
                // are no moves at all
                self.stage = Stage::Done;
                if self.is_valid(game, center, center) {
                    let m = Pos::new(center as u8, center as u8);
                    self.register(game, m);
                    return Some(m);
                }
                None
            }
            1 => {
                while self.opening_idx < SECOND_MOVE_OFFSETS.len() {
                    let (dr, dc) = SECOND_MOVE_OFFSETS[self.opening_idx];
                    self.opening_idx += 1;
                    let (r, c) = (center + dr, center + dc);
                    if self.is_valid(game, r, c) {
                        let m = Pos::new(r as u8, c as u8);
                        self.register(game, m);
                        self.opening_emitted = true;
                        return Some(m);
                    }
                }
                self.stage = if self.opening_emitted {
                    Stage::Done
                } else {
                    Stage::Pv
                };
                None
            }
            2 => {
                while self.opening_idx < THIRD_MOVE_OFFSETS.len() {
                    let (dr, dc) = THIRD_MOVE_OFFSETS[self.opening_idx];
                    self.opening_idx += 1;
                    let (r, c) = (center + dr, center + dc);
                    if self.is_valid(game, r, c) {
                        let m = Pos::new(r as u8, c as u8);
                        self.register(game, m);
                        self.opening_emitted = true;
                        return Some(m);
                    }
                }
                // restrict to book moves only when this cursor is picking
                // the move actually about to be played
                self.stage = if self.opening_emitted && (self.ply == 1 || self.ply == 3) {
                    Stage::Done
                } else {
                    Stage::Pv
                };
                None
            }
            _ => {
                self.stage = Stage::Pv;
                None
            }
        }
    }

    /// Sort shapes by priority and apply the forcing restriction: when a
    /// forced line exists, only the shapes belonging to it are worth moves
    fn init_shapes(&mut self, game: &GameState) {
        let me = game.current_player();
        let mut shapes: Vec<LinearShape> = game.linear_shapes().to_vec();
        shapes.sort_by_key(|s| shape_priority(s.owner == me, s.kind));

        self.include_fallback = true;
        if let Some(threat) = shapes
            .iter()
            .find(|s| s.owner == me && s.kind.is_pente_threat())
        {
            // completing my pente is the only move worth trying
            self.shapes = vec![*threat];
            self.include_fallback = false;
        } else if game.captures(me) == 4
            && shapes
                .iter()
                .any(|s| s.owner == me && s.kind == ShapeKind::CaptureThreat)
        {
            let threat = shapes
                .iter()
                .find(|s| s.owner == me && s.kind == ShapeKind::CaptureThreat)
                .copied();
            self.shapes = threat.into_iter().collect();
            self.include_fallback = false;
        } else if game.captures(me.opponent()) == 4 {
            // opponent wins on their next capture: only capture threats
            // (completing mine, or defusing theirs) are relevant
            let capture_threats: Vec<LinearShape> = shapes
                .iter()
                .filter(|s| s.kind == ShapeKind::CaptureThreat)
                .copied()
                .collect();
            if capture_threats.iter().any(|s| s.owner != me) {
                self.shapes = capture_threats;
                self.include_fallback = false;
            } else {
                self.shapes = shapes;
            }
        } else {
            let opponent_threats: Vec<LinearShape> = shapes
                .iter()
                .filter(|s| s.owner != me && s.kind.is_pente_threat())
                .copied()
                .collect();
            if opponent_threats.is_empty() {
                self.shapes = shapes;
            } else {
                let mut restricted = opponent_threats.clone();
                restricted.extend(get_captures_blocking_all(game, &opponent_threats));
                self.shapes = restricted;
                self.include_fallback = false;
            }
        }
        self.shape_idx = 0;
        self.cell_idx = 0;
    }

    fn next_shape_move(&mut self, game: &GameState) -> Option<Pos> {
        while self.shape_idx < self.shapes.len() {
            let shape = self.shapes[self.shape_idx];
            while self.cell_idx < shape.length as usize {
                let (r, c) = shape.cell(self.cell_idx);
                self.cell_idx += 1;
                if self.is_valid(game, r, c) {
                    let m = Pos::new(r as u8, c as u8);
                    self.register(game, m);
                    return Some(m);
                }
            }
            self.shape_idx += 1;
            self.cell_idx = 0;
        }
        None
    }

    fn init_fallback(&mut self, game: &GameState) {
        // wider rings while the board is nearly empty
        let dists: &'static [i32] = if game.n_moves() < 4 {
            &[0, -1, 1, -2, 2, -3, 3]
        } else {
            &[0, -1, 1, -2, 2]
        };
        let me = game.current_player();
        let center = Pos::new(game.center() as u8, game.center() as u8);
        let mut mine: Vec<Pos> = Vec::new();
        let mut theirs: Vec<Pos> = Vec::new();
        for (pos, player) in game.stones() {
            if player == me {
                mine.push(pos);
            } else {
                theirs.push(pos);
            }
        }
        // central stones are more likely to be relevant
        let by_center_dist =
            |a: &Pos, b: &Pos| a.distance_to(center).total_cmp(&b.distance_to(center));
        mine.sort_by(by_center_dist);
        theirs.sort_by(by_center_dist);
        let mut gems = mine;
        gems.extend(theirs);
        self.fallback = Some(FallbackState {
            dists,
            gems,
            di: 0,
            dj: 0,
            gi: 0,
        });
    }

    fn next_fallback_move(&mut self, game: &GameState) -> Option<Pos> {
        // offsets iterate in the outer loops, nearest distances first, so
        // close cells around every stone come before anything farther out
        loop {
            let (dy, dx, gem) = {
                let fb = self.fallback.as_mut()?;
                if fb.di >= fb.dists.len() {
                    return None;
                }
                let dy = fb.dists[fb.di];
                let dx = fb.dists[fb.dj];
                if fb.gi >= fb.gems.len() {
                    fb.gi = 0;
                    fb.dj += 1;
                    if fb.dj >= fb.dists.len() {
                        fb.dj = 0;
                        fb.di += 1;
                    }
                    continue;
                }
                let gem = fb.gems[fb.gi];
                fb.gi += 1;
                (dy, dx, gem)
            };
            if dy == 0 && dx == 0 {
                continue;
            }
            let (r, c) = (gem.row as i32 + dy, gem.col as i32 + dx);
            if self.is_valid(game, r, c) {
                let m = Pos::new(r as u8, c as u8);
                self.register(game, m);
                return Some(m);
            }
        }
    }
}

/// Moves relevant to the tactical instability of a position, in order of
/// urgency. An empty result means the position is quiet. Consumed by the
/// evaluator as a feature and suitable for quiescence-style probing.
pub fn non_quiet_moves(game: &GameState) -> Vec<Pos> {
    let me = game.current_player();

    let mut my_pente_threat: Option<LinearShape> = None;
    let mut opponent_pente_threats: Vec<LinearShape> = Vec::new();
    let mut my_trias: Vec<LinearShape> = Vec::new();
    let mut my_extendable_trias: Vec<LinearShape> = Vec::new();
    let mut opponent_trias: Vec<LinearShape> = Vec::new();
    let mut my_capture_threats: Vec<LinearShape> = Vec::new();
    for shape in game.linear_shapes() {
        if shape.kind.is_pente_threat() {
            if shape.owner == me {
                // just play this move and win, nothing else matters
                my_pente_threat = Some(*shape);
                break;
            }
            opponent_pente_threats.push(*shape);
        } else if shape.kind.is_tria() {
            if shape.owner == me {
                my_trias.push(*shape);
            } else {
                opponent_trias.push(*shape);
            }
        } else if shape.kind.is_extendable_tria() && shape.owner == me {
            my_extendable_trias.push(*shape);
        } else if shape.kind == ShapeKind::CaptureThreat && shape.owner == me {
            my_capture_threats.push(*shape);
        }
    }

    let shapes: Vec<LinearShape> = if let Some(threat) = my_pente_threat {
        vec![threat]
    } else if !opponent_pente_threats.is_empty() {
        let mut s = opponent_pente_threats.clone();
        s.extend(get_captures_blocking_all(game, &opponent_pente_threats));
        s
    } else {
        let mut s = my_trias;
        s.extend(my_extendable_trias);
        s.extend(opponent_trias);
        s.extend(my_capture_threats);
        s
    };

    let mut moves = Vec::new();
    let mut seen: HashSet<Pos> = HashSet::new();
    for shape in &shapes {
        for i in 0..shape.length as usize {
            let (r, c) = shape.cell(i);
            if is_restricted(game, r as usize, c as usize) {
                continue;
            }
            let pos = Pos::new(r as u8, c as u8);
            if game.is_empty_cell(pos) && seen.insert(pos) {
                moves.push(pos);
            }
        }
    }
    moves
}

/// Aggregate finished games into an opening book: every opening prefix seen
/// at least `min_games` times maps to [player-0 wins, player-1 wins].
pub fn build_opening_book(game_strings: &[String], min_games: u32) -> HashMap<String, [u32; 2]> {
    let mut book: HashMap<String, [u32; 2]> = HashMap::new();
    for s in game_strings {
        let game: GameState = match s.parse() {
            Ok(g) => g,
            Err(err) => {
                warn!(game = %s, %err, "skipping unreplayable game string");
                continue;
            }
        };
        if !game.is_over() {
            continue;
        }
        // the player who made the last move won
        let winner = game.current_player().opponent().index();
        let parts: Vec<&str> = s.split('|').collect();
        let mut prefix = parts[0].to_string();
        for part in &parts[1..] {
            let counts = book.entry(prefix.clone()).or_insert([0, 0]);
            counts[winner] += 1;
            prefix.push('|');
            prefix.push_str(part);
        }
    }
    book.retain(|_, counts| counts[0] + counts[1] >= min_games);
    book
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Player;

    fn collect(game: &GameState, ply: u32) -> Vec<Pos> {
        let mut cursor = MoveCursor::new(game, ply);
        let mut moves = Vec::new();
        while let Some(m) = cursor.next_move(game) {
            moves.push(m);
        }
        moves
    }

    #[test]
    fn test_move_zero_only_center() {
        let g = GameState::new(19);
        assert_eq!(collect(&g, 1), vec![Pos::new(9, 9)]);
    }

    #[test]
    fn test_move_zero_excluded_yields_nothing() {
        let g = GameState::new(19);
        let mut cursor = MoveCursor::with_hints(&g, 1, &[Pos::new(9, 9)], None, None, &[]);
        assert_eq!(cursor.next_move(&g), None);
    }

    #[test]
    fn test_move_one_book_candidates() {
        let mut g = GameState::new(19);
        g.make_move(9, 9);
        let moves = collect(&g, 1);
        assert_eq!(moves.len(), 9);
        assert_eq!(moves[0], Pos::new(9, 10));
        assert!(moves.contains(&Pos::new(12, 13)));
        // book-only: nothing outside the tenable set
        assert!(!moves.contains(&Pos::new(8, 8)));
    }

    #[test]
    fn test_move_two_book_at_root() {
        let mut g = GameState::new(19);
        g.make_move(9, 9);
        g.make_move(9, 10);
        let moves = collect(&g, 1);
        // (12, 9) is the mirror image of (6, 9) across the occupied row and
        // gets collapsed by symmetry pruning
        assert_eq!(
            moves,
            vec![Pos::new(6, 9), Pos::new(9, 6), Pos::new(9, 12)]
        );
    }

    #[test]
    fn test_move_two_deep_ply_keeps_going() {
        let mut g = GameState::new(19);
        g.make_move(9, 9);
        g.make_move(9, 10);
        let moves = collect(&g, 2);
        assert!(moves.len() > 4);
        // the restricted center box stays off limits either way
        for m in &moves {
            assert!(!is_restricted(&g, m.row as usize, m.col as usize), "{}", m);
        }
    }

    #[test]
    fn test_no_duplicates_or_occupied() {
        let mut g = GameState::new(19);
        for &(r, c) in &[(9, 9), (9, 11), (9, 10), (9, 8), (10, 10), (8, 9)] {
            assert!(g.make_move(r, c));
        }
        let moves = collect(&g, 4);
        let unique: HashSet<Pos> = moves.iter().copied().collect();
        assert_eq!(unique.len(), moves.len(), "duplicate moves yielded");
        for m in &moves {
            assert!(g.is_empty_cell(*m), "occupied cell {} yielded", m);
        }
    }

    #[test]
    fn test_pv_hash_killers_come_first() {
        let mut g = GameState::new(19);
        for &(r, c) in &[(9, 9), (9, 11), (9, 10), (5, 5), (10, 10), (4, 4), (11, 11)] {
            assert!(g.make_move(r, c));
        }
        let pv = Pos::new(12, 12);
        let hash = Pos::new(3, 3);
        let killer = Pos::new(2, 2);
        let mut cursor = MoveCursor::with_hints(&g, 4, &[], Some(pv), Some(hash), &[killer]);
        assert_eq!(cursor.next_move(&g), Some(pv));
        assert_eq!(cursor.next_move(&g), Some(hash));
        assert_eq!(cursor.next_move(&g), Some(killer));
    }

    #[test]
    fn test_opponent_pente_threat_restricts_moves() {
        let mut g = GameState::new(19);
        // Black holds a pente threat (blocked left end), White to move
        for &(r, c) in &[(9, 9), (9, 8), (9, 10), (0, 0), (9, 11), (0, 2), (9, 12)] {
            assert!(g.make_move(r, c));
        }
        assert_eq!(g.current_player(), Player::White);
        let moves = collect(&g, 4);
        // the only empty cell inside the threat is the completion square
        assert_eq!(moves, vec![Pos::new(9, 13)]);
    }

    #[test]
    fn test_own_pente_threat_yields_winning_move_only() {
        let mut g = GameState::new(19);
        for &(r, c) in &[
            (9, 9),
            (0, 0),
            (9, 10),
            (0, 2),
            (9, 11),
            (0, 4),
            (9, 12),
            (9, 8),
        ] {
            assert!(g.make_move(r, c));
        }
        assert_eq!(g.current_player(), Player::Black);
        let moves = collect(&g, 4);
        assert_eq!(moves, vec![Pos::new(9, 13)]);
    }

    #[test]
    fn test_symmetry_suppresses_mirror_moves() {
        let mut g = GameState::new(19);
        g.make_move(9, 9);
        g.make_move(9, 12); // stones on row 9 only: vertical-mirror symmetric
        let moves = collect(&g, 2);
        for m in &moves {
            let image = Symmetry::FlipV.apply(*m, 19);
            assert!(
                image == *m || !moves.contains(&image),
                "{} and its mirror {} both yielded",
                m,
                image
            );
        }
    }

    #[test]
    fn test_non_quiet_moves_quiet_position() {
        let mut g = GameState::new(19);
        g.make_move(9, 9);
        g.make_move(0, 0);
        assert!(non_quiet_moves(&g).is_empty());
    }

    #[test]
    fn test_non_quiet_moves_pente_threat() {
        let mut g = GameState::new(19);
        for &(r, c) in &[
            (9, 9),
            (0, 0),
            (9, 10),
            (0, 2),
            (9, 11),
            (0, 4),
            (9, 12),
            (9, 8),
        ] {
            assert!(g.make_move(r, c));
        }
        // Black to move with a pente threat: the winning square only
        assert_eq!(non_quiet_moves(&g), vec![Pos::new(9, 13)]);
    }

    #[test]
    fn test_opening_book_counts_prefixes() {
        // five copies of the same finished game pass the min-games filter
        let mut g = GameState::new(19);
        g.make_move(9, 9);
        let black = [(10, 9), (11, 9), (12, 9), (13, 9)];
        let white = [(0, 0), (0, 2), (0, 4), (0, 6)];
        for i in 0..4 {
            g.make_move(white[i].0, white[i].1);
            g.make_move(black[i].0, black[i].1);
        }
        assert!(g.is_over());
        let s = g.to_string();
        let games = vec![s.clone(); 5];
        let book = build_opening_book(&games, 5);
        assert_eq!(book.get("19~9.9"), Some(&[5, 0]));
        assert!(book.len() > 1);
        // a single game does not survive the filter
        let thin = build_opening_book(&games[..1], 5);
        assert!(thin.is_empty());
    }
}
