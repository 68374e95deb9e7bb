//! High-level engine facade: pick a move to play, or rank variations
//!
//! Early in the game the engine searches several variations and picks one
//! at random, weighted by a softmax over the evaluations, so it does not
//! play the same opening every game. Past the opening it plays the single
//! best move.

use std::time::Duration;

use rand::Rng;
use tracing::debug;

use crate::board::{GameState, Pos};
use crate::search::{SearchOptions, SearchResult, Searcher};

/// Inverse-temperature for opening move selection; below 1 flattens the
/// distribution toward more variety
const OPENING_SOFTMAX_B: f64 = 0.3;

pub struct Engine {
    searcher: Searcher,
}

impl Engine {
    pub fn new() -> Self {
        Self {
            searcher: Searcher::new(),
        }
    }

    /// Ranked variations for a position; see [`Searcher::find_best_moves`]
    pub fn find_best_moves(
        &mut self,
        game: &GameState,
        options: &SearchOptions,
        on_depth_complete: Option<&mut dyn FnMut(&[SearchResult])>,
    ) -> Vec<SearchResult> {
        self.searcher.find_best_moves(game, options, on_depth_complete)
    }

    /// The move the engine would play
    pub fn choose_move(
        &mut self,
        game: &GameState,
        max_depth: u32,
        time_limit: Option<Duration>,
    ) -> Option<Pos> {
        self.choose_move_with_rng(game, max_depth, time_limit, &mut rand::thread_rng())
    }

    /// As [`Engine::choose_move`], with a caller-supplied source of
    /// randomness for reproducible play
    pub fn choose_move_with_rng<R: Rng>(
        &mut self,
        game: &GameState,
        max_depth: u32,
        time_limit: Option<Duration>,
        rng: &mut R,
    ) -> Option<Pos> {
        let n_variations = match game.n_moves() {
            2 => 4,
            n if n < 4 => 3,
            n if n < 6 => 2,
            _ => 1,
        };
        let options = SearchOptions {
            max_depth,
            time_limit,
            n_variations,
            ..SearchOptions::default()
        };
        let results = self.searcher.find_best_moves(game, &options, None);
        if results.is_empty() {
            return None;
        }
        if n_variations == 1 || results.len() == 1 {
            return results[0].best_move();
        }
        let scores: Vec<f64> = results.iter().map(|r| r.eval.as_clamped_score()).collect();
        let probs = softmax(&scores, OPENING_SOFTMAX_B);
        let idx = choose_from_weights(&probs, rng);
        debug!(
            chosen = idx,
            candidates = results.len(),
            eval = %results[idx].eval,
            "opening variety pick"
        );
        results[idx].best_move()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

/// Numerically stable softmax; the max is subtracted before exponentiating
/// so clamped extreme scores stay finite
fn softmax(z: &[f64], b: f64) -> Vec<f64> {
    let max = z.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = z.iter().map(|&zi| (b * (zi - max)).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Sample an index from normalized weights
fn choose_from_weights<R: Rng>(weights: &[f64], rng: &mut R) -> usize {
    let roll: f64 = rng.gen();
    let mut cumulative = 0.0;
    for (i, w) in weights.iter().enumerate() {
        cumulative += w;
        if roll <= cumulative {
            return i;
        }
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_softmax_normalizes_and_orders() {
        let probs = softmax(&[1.0, 3.0, 2.0], 0.3);
        let sum: f64 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
        assert!(probs[1] > probs[2]);
        assert!(probs[2] > probs[0]);
    }

    #[test]
    fn test_softmax_survives_clamped_extremes() {
        let probs = softmax(&[1e4, -1e4, 0.0], 0.3);
        assert!(probs.iter().all(|p| p.is_finite()));
        assert!(probs[0] > 0.99);
    }

    #[test]
    fn test_choose_from_weights_covers_distribution() {
        let mut rng = StdRng::seed_from_u64(7);
        let weights = [0.5, 0.5];
        let mut counts = [0usize; 2];
        for _ in 0..200 {
            counts[choose_from_weights(&weights, &mut rng)] += 1;
        }
        assert!(counts[0] > 50 && counts[1] > 50);
    }

    #[test]
    fn test_first_move_is_center() {
        let game = GameState::new(19);
        let mut engine = Engine::new();
        let mut rng = StdRng::seed_from_u64(1);
        let m = engine.choose_move_with_rng(&game, 2, None, &mut rng);
        assert_eq!(m, Some(Pos::new(9, 9)));
    }

    #[test]
    fn test_completes_own_pente() {
        let mut game = GameState::new(19);
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
            assert!(game.make_move(r, c));
        }
        let mut engine = Engine::new();
        let mut rng = StdRng::seed_from_u64(1);
        let m = engine.choose_move_with_rng(&game, 2, None, &mut rng);
        assert_eq!(m, Some(Pos::new(9, 13)));
    }

    #[test]
    fn test_second_move_stays_in_book() {
        let mut game = GameState::new(19);
        game.make_move(9, 9);
        let mut engine = Engine::new();
        let mut rng = StdRng::seed_from_u64(42);
        let m = engine
            .choose_move_with_rng(&game, 2, None, &mut rng)
            .expect("no move chosen");
        // whichever variation the softmax picks, it comes from the book set
        let book: Vec<Pos> = [
            (9, 10),
            (9, 11),
            (10, 10),
            (10, 11),
            (10, 12),
            (10, 13),
            (11, 12),
            (11, 13),
            (12, 13),
        ]
        .iter()
        .map(|&(r, c)| Pos::new(r, c))
        .collect();
        assert!(book.contains(&m), "move {} not in the opening book", m);
    }
}
