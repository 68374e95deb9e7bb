//! Search: iterative-deepening principal variation search with a
//! transposition table, killer moves and multi-variation output

pub mod pvs;
pub mod tt;

pub use pvs::{SearchStats, Searcher};
pub use tt::{TranspositionTable, TtEntry, TtKey};

use std::cmp::Ordering;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::board::Pos;
use crate::eval::Eval;

/// How tight a search result's evaluation is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvalFlag {
    Exact,
    /// The true eval is at least this (search was cut off from above)
    LowerBound,
    /// The true eval is at most this; could be as bad as a loss
    UpperBound,
}

impl EvalFlag {
    /// Negamax flip: a child's lower bound is the parent's upper bound
    #[inline]
    #[must_use]
    pub fn flip(self) -> EvalFlag {
        match self {
            EvalFlag::Exact => EvalFlag::Exact,
            EvalFlag::LowerBound => EvalFlag::UpperBound,
            EvalFlag::UpperBound => EvalFlag::LowerBound,
        }
    }
}

/// One ranked line out of a search: evaluation (mover-relative unless the
/// caller asked for absolute output), its bound flag and the move sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub eval: Eval,
    pub eval_flag: EvalFlag,
    pub best_variation: Vec<Pos>,
}

impl SearchResult {
    pub fn leaf(eval: Eval) -> Self {
        Self {
            eval,
            eval_flag: EvalFlag::Exact,
            best_variation: Vec::new(),
        }
    }

    /// First move of the variation
    pub fn best_move(&self) -> Option<Pos> {
        self.best_variation.first().copied()
    }
}

/// Policy for ordering equal-evaluation results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TieBreak {
    /// Prefer shorter winning lines and longer losing lines
    #[default]
    PreferFastWin,
    /// Evaluation and bound flag only
    EvalOnly,
}

/// Order search results best first: exact beats upper-bound, then higher
/// eval, then the tie-break policy
pub fn compare_results(a: &SearchResult, b: &SearchResult, tie_break: TieBreak) -> Ordering {
    // an upper bound could hide a loss, so a real eval wins
    match (a.eval_flag, b.eval_flag) {
        (EvalFlag::Exact, EvalFlag::UpperBound) => return Ordering::Less,
        (EvalFlag::UpperBound, EvalFlag::Exact) => return Ordering::Greater,
        _ => {}
    }
    match b.eval.cmp(&a.eval) {
        Ordering::Equal => {}
        other => return other,
    }
    if tie_break == TieBreak::PreferFastWin {
        if a.eval.is_win() {
            return a.best_variation.len().cmp(&b.best_variation.len());
        }
        if a.eval.is_loss() {
            return b.best_variation.len().cmp(&a.best_variation.len());
        }
    }
    Ordering::Equal
}

/// Options for one search run
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub max_depth: u32,
    pub time_limit: Option<Duration>,
    /// How many distinct top variations to track and return
    pub n_variations: usize,
    /// Report evaluations from the first player's perspective instead of
    /// the mover's
    pub absolute_eval: bool,
    /// Root moves (and their symmetric images) to skip, for callers that
    /// gather extra variations through repeated runs
    pub exclude_root_moves: Vec<Pos>,
    pub tie_break: TieBreak,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            max_depth: 6,
            time_limit: None,
            n_variations: 1,
            absolute_eval: false,
            exclude_root_moves: Vec::new(),
            tie_break: TieBreak::default(),
        }
    }
}
