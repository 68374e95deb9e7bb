//! Static position evaluation
//!
//! Mover-relative: higher is better for the player to move, whoever that is,
//! which is what the negamax search expects. Decided positions use the
//! tagged [`Eval`] ends (`Win`/`Loss`) instead of sentinel float values, so
//! score arithmetic can never touch an infinity.
//!
//! The quiet-position score is a linear model over a string-keyed feature
//! dict, with separately fitted opening and later-phase weight tables
//! blended by move count.

pub mod weights;

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::board::{GameState, Pos};
use crate::movegen::non_quiet_moves;
use crate::shapes::{LinearShape, ShapeKind};

/// A mover-relative evaluation. `Loss < Score(_) < Win`, with scores ordered
/// numerically. Proven results are tags, never float sentinels, so they
/// survive negation, comparison and serialization without edge cases.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum Eval {
    /// Proven loss for the player to move
    Loss,
    /// Heuristic score, positive favoring the player to move
    Score(f64),
    /// Proven win for the player to move
    Win,
}

impl Eval {
    /// Negamax negation: the other player's view of the same position
    #[inline]
    #[must_use]
    pub fn flip(self) -> Eval {
        match self {
            Eval::Loss => Eval::Win,
            Eval::Score(s) => Eval::Score(-s),
            Eval::Win => Eval::Loss,
        }
    }

    /// Smallest representable bound strictly above a score; the ends are
    /// absorbing. Used to build zero-width probe windows.
    #[inline]
    #[must_use]
    pub fn step_up(self) -> Eval {
        match self {
            Eval::Score(s) => Eval::Score(s + 1.0),
            end => end,
        }
    }

    /// True for proven results (either end)
    #[inline]
    pub fn is_decided(self) -> bool {
        !matches!(self, Eval::Score(_))
    }

    #[inline]
    pub fn is_win(self) -> bool {
        matches!(self, Eval::Win)
    }

    #[inline]
    pub fn is_loss(self) -> bool {
        matches!(self, Eval::Loss)
    }

    /// Collapse to a bounded float, for weighting schemes that need one
    #[inline]
    pub fn as_clamped_score(self) -> f64 {
        match self {
            Eval::Loss => -1e4,
            Eval::Score(s) => s.clamp(-1e4, 1e4),
            Eval::Win => 1e4,
        }
    }
}

impl PartialEq for Eval {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}
impl Eq for Eval {}

impl PartialOrd for Eval {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Eval {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        match (self, other) {
            (Eval::Loss, Eval::Loss) => Ordering::Equal,
            (Eval::Loss, _) => Ordering::Less,
            (_, Eval::Loss) => Ordering::Greater,
            (Eval::Win, Eval::Win) => Ordering::Equal,
            (Eval::Win, _) => Ordering::Greater,
            (_, Eval::Win) => Ordering::Less,
            // scores are produced by the linear model, never NaN
            (Eval::Score(a), Eval::Score(b)) => a.total_cmp(b),
        }
    }
}

impl std::fmt::Display for Eval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Eval::Loss => write!(f, "loss"),
            Eval::Score(s) => write!(f, "{:+.2}", s),
            Eval::Win => write!(f, "win"),
        }
    }
}

/// Evaluate a static position from the mover's perspective.
///
/// Decided positions are detected before any weights are touched, in order
/// of cheapness: game already over, own pente threat, own 5th capture
/// available, opponent open tessera with no capturing answer, opponent pente
/// threats that cannot all be blocked at once.
pub fn evaluate_position(game: &GameState) -> Eval {
    if game.is_over() {
        // the player who just moved won
        return Eval::Loss;
    }
    let me = game.current_player();
    let mut opponent_pente_threats: Vec<LinearShape> = Vec::new();
    for shape in game.linear_shapes() {
        if !shape.kind.is_pente_threat() {
            continue;
        }
        if shape.owner == me {
            return Eval::Win;
        }
        opponent_pente_threats.push(*shape);
    }
    if game.captures(me) >= 4
        && game
            .linear_shapes()
            .iter()
            .any(|s| s.kind == ShapeKind::CaptureThreat && s.owner == me)
    {
        return Eval::Win;
    }
    for shape in game.linear_shapes() {
        if shape.owner != me
            && shape.kind == ShapeKind::OpenTessera
            && get_blocking_captures(game, shape).is_empty()
        {
            return Eval::Loss;
        }
    }
    if !can_block_all_threats(game, &opponent_pente_threats) {
        return Eval::Loss;
    }

    let features = position_feature_dict(game);
    let blend = weights::opening_blend(game.n_moves());
    let mut value = weights::OPENING_BIAS * blend + weights::LATER_BIAS * (1.0 - blend);
    for (key, feature) in &features {
        let w = weights::weight_of(weights::OPENING_WEIGHTS, key) * blend
            + weights::weight_of(weights::LATER_WEIGHTS, key) * (1.0 - blend);
        value += feature * w;
    }
    Eval::Score(10.0 * value)
}

/// Shape kinds counted in the feature dict but given no weight on their own
/// (they still matter for move ordering and the threat features)
fn excluded_from_features(kind: ShapeKind) -> bool {
    kind == ShapeKind::Pente || kind.is_extendable_tria()
}

/// The evaluation feature dict, keyed by stable feature names.
///
/// Shape features are signed counts (mover's minus opponent's). Public so
/// positions can be exported as feature rows for offline weight fitting.
pub fn position_feature_dict(game: &GameState) -> BTreeMap<&'static str, f64> {
    let mut features: BTreeMap<&'static str, f64> = BTreeMap::new();
    for kind in ShapeKind::ALL {
        if excluded_from_features(kind) {
            continue;
        }
        features.insert(kind.name(), 0.0);
    }

    let me = game.current_player();
    let mut opponent_trias: Vec<LinearShape> = Vec::new();
    for shape in game.linear_shapes() {
        if shape.kind == ShapeKind::Pente {
            continue;
        }
        if !excluded_from_features(shape.kind) {
            let sign = if shape.owner == me { 1.0 } else { -1.0 };
            if let Some(count) = features.get_mut(shape.kind.name()) {
                *count += sign;
            }
        }
        if shape.kind.is_tria() && shape.owner != me {
            opponent_trias.push(*shape);
        }
    }

    let my_captures = game.captures(me);
    let opponent_captures = game.captures(me.opponent());
    features.insert("captures", f64::from(my_captures) - f64::from(opponent_captures));
    features.insert("my-4-captures", f64::from(u8::from(my_captures == 4)));
    features.insert("opp-4-captures", f64::from(u8::from(opponent_captures == 4)));
    features.insert(
        "can-block-trias",
        f64::from(u8::from(can_block_all_threats(game, &opponent_trias))),
    );
    features.insert("non-quiet-moves", non_quiet_moves(game).len() as f64);
    features
}

/// Capture threats (owned by the other side) that would remove a stone from
/// `threat`. Indices 1 and 2 of a capture-threat pattern are always the
/// capturable pair, in either orientation.
pub fn get_blocking_captures(game: &GameState, threat: &LinearShape) -> Vec<LinearShape> {
    let threat_stones: Vec<Pos> = threat.stone_cells().collect();
    game.linear_shapes()
        .iter()
        .filter(|s| s.kind == ShapeKind::CaptureThreat && s.owner != threat.owner)
        .filter(|s| {
            [1usize, 2].iter().any(|&i| {
                let (r, c) = s.cell(i);
                threat_stones.contains(&Pos::new(r as u8, c as u8))
            })
        })
        .copied()
        .collect()
}

/// Capture threats that remove a stone from every threat in the set
pub fn get_captures_blocking_all(game: &GameState, threats: &[LinearShape]) -> Vec<LinearShape> {
    let Some((first, rest)) = threats.split_first() else {
        return Vec::new();
    };
    let mut blocking = get_blocking_captures(game, first);
    for threat in rest {
        if blocking.is_empty() {
            break;
        }
        let hashes: HashSet<u64> = get_blocking_captures(game, threat)
            .iter()
            .map(|s| s.hash)
            .collect();
        blocking.retain(|s| hashes.contains(&s.hash));
    }
    blocking
}

/// Whether one move can answer every threat in the set: either all threats
/// share a single common empty cell, or some capture removes a stone from
/// each of them.
pub fn can_block_all_threats(game: &GameState, threats: &[LinearShape]) -> bool {
    // only the empty set is trivially blocked; a lone threat with two open
    // ends still needs the capture check
    if threats.is_empty() {
        return true;
    }
    let mut block_spot: Option<Pos> = None;
    let mut single_spot_works = true;
    'threats: for threat in threats {
        for empty in threat.empty_cells() {
            match block_spot {
                None => block_spot = Some(empty),
                Some(spot) if spot != empty => {
                    single_spot_works = false;
                    break 'threats;
                }
                _ => {}
            }
        }
    }
    if single_spot_works {
        return true;
    }
    !get_captures_blocking_all(game, threats).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eval_ordering() {
        assert!(Eval::Loss < Eval::Score(-1e9));
        assert!(Eval::Score(-1e9) < Eval::Score(0.0));
        assert!(Eval::Score(1e9) < Eval::Win);
        assert_eq!(Eval::Win, Eval::Win);
        assert_eq!(Eval::Score(1.5), Eval::Score(1.5));
    }

    #[test]
    fn test_eval_flip_and_step() {
        assert_eq!(Eval::Win.flip(), Eval::Loss);
        assert_eq!(Eval::Score(3.0).flip(), Eval::Score(-3.0));
        assert_eq!(Eval::Score(3.0).step_up(), Eval::Score(4.0));
        assert_eq!(Eval::Loss.step_up(), Eval::Loss);
        assert_eq!(Eval::Win.step_up(), Eval::Win);
    }

    #[test]
    fn test_finished_game_is_loss_for_mover() {
        let mut g = GameState::new(19);
        g.make_move(9, 9);
        let black = [(10, 9), (11, 9), (12, 9), (13, 9)];
        let white = [(0, 0), (0, 2), (0, 4), (0, 6)];
        for i in 0..4 {
            g.make_move(white[i].0, white[i].1);
            g.make_move(black[i].0, black[i].1);
        }
        assert!(g.is_over());
        assert_eq!(evaluate_position(&g), Eval::Loss);
    }

    #[test]
    fn test_own_pente_threat_is_win() {
        let mut g = GameState::new(19);
        // Black builds four in a row; White blocks one end last, leaving
        // Black to move holding a pente threat
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
        assert_eq!(evaluate_position(&g), Eval::Win);
    }

    #[test]
    fn test_opponent_open_tessera_is_loss() {
        let mut g = GameState::new(19);
        // Black ends up with an open tessera and White to move has no
        // capture threat against it
        for &(r, c) in &[(9, 9), (0, 0), (9, 10), (0, 2), (9, 11), (0, 4), (9, 12)] {
            assert!(g.make_move(r, c));
        }
        assert_eq!(evaluate_position(&g), Eval::Loss);
    }

    #[test]
    fn test_single_pente_threat_is_blockable() {
        let mut g = GameState::new(19);
        // Black holds one pente threat (blocked on the left); White to move
        // can block the single completion square
        for &(r, c) in &[(9, 9), (9, 8), (9, 10), (0, 0), (9, 11), (0, 2), (9, 12)] {
            assert!(g.make_move(r, c));
        }
        let threats: Vec<LinearShape> = g
            .linear_shapes()
            .iter()
            .filter(|s| s.kind.is_pente_threat())
            .copied()
            .collect();
        assert!(!threats.is_empty());
        assert!(can_block_all_threats(&g, &threats));
        assert!(!evaluate_position(&g).is_decided());
    }

    #[test]
    fn test_feature_dict_signed_counts() {
        let mut g = GameState::new(19);
        g.make_move(9, 9); // B
        g.make_move(5, 5); // W
        g.make_move(9, 10); // B open pair, White to move
        let features = position_feature_dict(&g);
        // mover-relative: the pair belongs to the opponent
        assert_eq!(features["open-pair"], -1.0);
        assert_eq!(features["captures"], 0.0);
        assert_eq!(features["my-4-captures"], 0.0);
    }

    #[test]
    fn test_blocking_captures_found() {
        let mut g = GameState::new(19);
        // Black pair at 9,9/9,10 with White at 9,11: White threatens the
        // capture at 9,8. Black then builds a vertical tria through 9,9
        // so the capture breaks it.
        for &(r, c) in &[(9, 9), (9, 11), (9, 10), (0, 0), (10, 9), (0, 2), (11, 9)] {
            assert!(g.make_move(r, c));
        }
        let tria = g
            .linear_shapes()
            .iter()
            .find(|s| s.kind.is_tria() && s.owner == crate::board::Player::Black)
            .copied()
            .expect("vertical tria missing");
        let blocking = get_blocking_captures(&g, &tria);
        assert!(!blocking.is_empty(), "capture through 9,9 not found");
        assert!(
            blocking.iter().all(|b| b.owner == crate::board::Player::White),
            "blocking captures must belong to the defender"
        );
    }

    #[test]
    fn test_lone_open_tria_without_captures_is_unblockable() {
        let mut g = GameState::new(19);
        for &(r, c) in &[(9, 9), (0, 0), (9, 10), (0, 2), (9, 11)] {
            assert!(g.make_move(r, c));
        }
        // White to move against a lone Black open tria: both ends are open
        // and no capture removes a tria stone, so no single move covers it
        let trias: Vec<LinearShape> = g
            .linear_shapes()
            .iter()
            .filter(|s| s.kind.is_tria() && s.owner == crate::board::Player::Black)
            .copied()
            .collect();
        assert_eq!(trias.len(), 1);
        assert!(!can_block_all_threats(&g, &trias));
        let features = position_feature_dict(&g);
        assert_eq!(features["can-block-trias"], 0.0);
    }

    #[test]
    fn test_one_capture_blocks_both_trias() {
        let mut g = GameState::new(19);
        // Black builds two open trias crossing at 9,9 (one along row 9, one
        // down the main diagonal) plus the 8,9 stone that makes the 8,9/9,9
        // pair capturable by White at 10,9. The trias share no empty cell,
        // so only the capture answers both.
        for &(r, c) in &[
            (9, 9),
            (0, 0),
            (9, 10),
            (0, 2),
            (9, 11),
            (0, 4),
            (10, 10),
            (0, 6),
            (11, 11),
            (7, 9),
            (8, 9),
        ] {
            assert!(g.make_move(r, c));
        }
        assert_eq!(g.current_player(), crate::board::Player::White);
        let trias: Vec<LinearShape> = g
            .linear_shapes()
            .iter()
            .filter(|s| s.kind.is_tria() && s.owner == crate::board::Player::Black)
            .copied()
            .collect();
        assert_eq!(trias.len(), 2);
        let blocking = get_captures_blocking_all(&g, &trias);
        assert!(!blocking.is_empty(), "shared capture through 9,9 not found");
        assert!(blocking
            .iter()
            .all(|b| b.owner == crate::board::Player::White));
        assert!(can_block_all_threats(&g, &trias));
    }

    #[test]
    fn test_evaluation_is_symmetry_invariant() {
        use crate::rules::Symmetry;
        let moves = [(9, 9), (8, 7), (10, 11), (5, 9), (11, 10), (6, 6)];
        let mut original = GameState::new(19);
        for &(r, c) in &moves {
            assert!(original.make_move(r, c));
        }
        for sym in Symmetry::ALL {
            let mut transformed = GameState::new(19);
            for &(r, c) in &moves {
                let p = sym.apply(Pos::new(r as u8, c as u8), 19);
                assert!(transformed.make_move(p.row as usize, p.col as usize));
            }
            assert_eq!(
                evaluate_position(&original),
                evaluate_position(&transformed),
                "evaluation changed under {:?}",
                sym
            );
        }
    }
}
