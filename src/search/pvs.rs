//! Principal variation search (negascout) with iterative deepening
//!
//! [`Searcher`] owns everything one search run needs: the transposition
//! table, killer-move table, statistics and the wall-clock deadline. Nothing
//! is process-global, so independent searches can run on independent
//! searchers concurrently.
//!
//! The recursion is negamax: every evaluation is from the perspective of
//! the player to move at that node, and child results are negated on the
//! way up. Timeouts are a distinguished outcome, never a score, so an
//! aborted subtree can never leak a bogus evaluation into the tree above.

use std::time::Instant;

use tracing::{debug, warn};

use crate::board::{GameState, Player, Pos};
use crate::eval::{evaluate_position, Eval};
use crate::movegen::MoveCursor;
use crate::shapes::ShapeKind;

use super::tt::{TranspositionTable, TtKey};
use super::{compare_results, EvalFlag, SearchOptions, SearchResult, TieBreak};

/// Counters for one iterative-deepening depth
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchStats {
    pub nodes_visited: u64,
    pub tt_hits: u64,
    pub tt_misses: u64,
    /// Null-window probes that had to be re-searched at full width
    pub fail_high: u64,
    /// Null-window probes confirmed below alpha
    pub confirm_alpha: u64,
    pub moves_generated_sum: u64,
    pub moves_generated_max: u32,
    pub nodes_expanded: u64,
}

impl SearchStats {
    fn reset(&mut self) {
        *self = SearchStats::default();
    }

    pub fn average_moves_generated(&self) -> f64 {
        if self.nodes_expanded == 0 {
            return 0.0;
        }
        self.moves_generated_sum as f64 / self.nodes_expanded as f64
    }
}

/// At most two killers per ply, most recent first
#[derive(Default)]
struct KillerTable {
    by_ply: Vec<Vec<Pos>>,
}

impl KillerTable {
    fn clear(&mut self) {
        self.by_ply.clear();
    }

    fn get(&self, ply: u32) -> &[Pos] {
        self.by_ply
            .get(ply as usize)
            .map_or(&[], |moves| moves.as_slice())
    }

    fn add(&mut self, ply: u32, pos: Pos) {
        let ply = ply as usize;
        if self.by_ply.len() <= ply {
            self.by_ply.resize_with(ply + 1, Vec::new);
        }
        let slot = &mut self.by_ply[ply];
        if slot.contains(&pos) {
            return;
        }
        slot.insert(0, pos);
        slot.truncate(2);
    }
}

enum NodeOutcome {
    Results(Vec<SearchResult>),
    /// The deadline passed before this node could conclude anything
    TimedOut,
}

/// Per-search context: transposition table, killers, stats and deadline
pub struct Searcher {
    tt: TranspositionTable,
    killers: KillerTable,
    stats: SearchStats,
    deadline: Option<Instant>,
    tie_break: TieBreak,
}

impl Searcher {
    pub fn new() -> Self {
        Self {
            tt: TranspositionTable::new(),
            killers: KillerTable::default(),
            stats: SearchStats::default(),
            deadline: None,
            tie_break: TieBreak::default(),
        }
    }

    pub fn stats(&self) -> &SearchStats {
        &self.stats
    }

    #[inline]
    fn timed_out(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() > d)
    }

    /// Iterative-deepening driver. Returns up to `n_variations` ranked
    /// results; degrades to whatever the last completed depth produced when
    /// the deadline passes. Depth 1 always completes regardless of the
    /// deadline, so there is always an answer.
    ///
    /// `on_depth_complete` fires after each finished depth with the results
    /// so far, for callers that want responsive intermediate output.
    pub fn find_best_moves(
        &mut self,
        game: &GameState,
        options: &SearchOptions,
        mut on_depth_complete: Option<&mut dyn FnMut(&[SearchResult])>,
    ) -> Vec<SearchResult> {
        let mut game = game.clone();
        let flip = options.absolute_eval && game.current_player() == Player::White;
        self.tie_break = options.tie_break;
        self.deadline = options.time_limit.map(|limit| Instant::now() + limit);
        // stale entries are keyed by position alone and would resurrect
        // moves excluded from this run
        self.tt.clear();
        let start = Instant::now();

        let mut prev_results: Vec<SearchResult> = Vec::new();
        for depth in 1..=options.max_depth {
            self.killers.clear();
            self.stats.reset();
            let pv: Vec<Pos> = prev_results
                .first()
                .map(|r| r.best_variation.clone())
                .unwrap_or_default();
            match self.pvs(
                &mut game,
                depth,
                1,
                Eval::Loss,
                Eval::Win,
                false,
                &pv,
                options.n_variations,
                &options.exclude_root_moves,
            ) {
                NodeOutcome::TimedOut => {
                    debug!(depth, "timed out mid-depth, keeping previous results");
                    break;
                }
                NodeOutcome::Results(results) => {
                    if results.is_empty() {
                        warn!(depth, "depth completed with no results");
                        break;
                    }
                    debug!(
                        depth,
                        nodes = self.stats.nodes_visited,
                        tt_hits = self.stats.tt_hits,
                        tt_misses = self.stats.tt_misses,
                        fail_high = self.stats.fail_high,
                        confirm_alpha = self.stats.confirm_alpha,
                        avg_moves = self.stats.average_moves_generated(),
                        max_moves = self.stats.moves_generated_max,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        best = %results[0].eval,
                        "completed depth"
                    );
                    prev_results = results;
                }
            }
            if self.timed_out() {
                debug!(depth, "deadline reached");
                break;
            }
            if prev_results[0].eval.is_decided() {
                // forced result proven, deeper search cannot change it
                break;
            }
            if let Some(cb) = on_depth_complete.as_mut() {
                cb(&prepare_output(&prev_results, flip));
            }
        }

        if prev_results.is_empty() {
            warn!("search produced no variations");
        }
        prepare_output(&prev_results, flip)
    }

    /// One negamax node. Returns results sorted best first (up to
    /// `n_variations` of them) or the timeout signal.
    #[allow(clippy::too_many_arguments)]
    fn pvs(
        &mut self,
        game: &mut GameState,
        depth: u32,
        ply: u32,
        mut alpha: Eval,
        mut beta: Eval,
        using_null_window: bool,
        principal_variation: &[Pos],
        n_variations: usize,
        exclude: &[Pos],
    ) -> NodeOutcome {
        self.stats.nodes_visited += 1;

        // the mandatory depth-1 root call must always return something
        if self.timed_out() && !(ply == 1 && depth == 1) {
            return NodeOutcome::TimedOut;
        }

        let static_eval = evaluate_position(game);
        // a decided eval at the root still needs a move generated, hence ply > 1
        if game.is_over() || depth == 0 || (static_eval.is_decided() && ply > 1) {
            return NodeOutcome::Results(vec![SearchResult::leaf(static_eval)]);
        }

        let alpha_orig = alpha;
        let table_key = TtKey::new(game, using_null_window);
        let entry = self.tt.get(&table_key);
        let hash_move = entry.and_then(|e| e.result.best_move());
        match entry.filter(|e| e.depth >= depth) {
            Some(entry) => {
                self.stats.tt_hits += 1;
                // narrowing is sound only for single-variation nodes; with
                // top-N tracking alpha is conditioned on the variation count
                if n_variations == 1 {
                    let result = entry.result.clone();
                    match result.eval_flag {
                        EvalFlag::Exact => return NodeOutcome::Results(vec![result]),
                        EvalFlag::LowerBound => alpha = alpha.max(result.eval),
                        EvalFlag::UpperBound => beta = beta.min(result.eval),
                    }
                    if alpha >= beta {
                        return NodeOutcome::Results(vec![result]);
                    }
                }
            }
            None => self.stats.tt_misses += 1,
        }

        // read forcing positions one ply deeper. Only the opponent can hold
        // these threats here: if the mover held one, the static eval would
        // have decided the node already. Not at depth 1, where the mandatory
        // root call cannot afford the extra work.
        let mut extension = 0;
        if depth > 1 {
            let me = game.current_player();
            let pente_threat_exists = game
                .linear_shapes()
                .iter()
                .any(|s| s.kind.is_pente_threat());
            let fifth_capture_threat = game.captures(me.opponent()) == 4
                && game
                    .linear_shapes()
                    .iter()
                    .any(|s| s.kind == ShapeKind::CaptureThreat && s.owner != me);
            if pente_threat_exists || fifth_capture_threat {
                extension = 1;
            }
        }

        let pv_move = principal_variation.first().copied();
        let rest_pv = if principal_variation.is_empty() {
            &[][..]
        } else {
            &principal_variation[1..]
        };
        let killers = self.killers.get(ply).to_vec();
        let mut cursor = MoveCursor::with_hints(game, ply, exclude, pv_move, hash_move, &killers);

        let mut best: Vec<SearchResult> = Vec::new();
        let mut move_index: u32 = 0;
        while let Some(mv) = cursor.next_move(game) {
            if !game.make_move(mv.row as usize, mv.col as usize) {
                warn!(%mv, "move generator produced an unplayable move");
                continue;
            }

            let outcome = if move_index == 0 {
                // first-ordered move: full window, full (extended) depth
                self.pvs(
                    game,
                    depth - 1 + extension,
                    ply + 1,
                    beta.flip(),
                    alpha.flip(),
                    using_null_window,
                    rest_pv,
                    1,
                    &[],
                )
            } else {
                // later moves are probably worse: null-window probe, reduced
                // depth when late in the ordering
                let mut probe_depth = if depth >= 3 && move_index >= 5 {
                    depth - 2
                } else {
                    depth - 1
                };
                probe_depth += extension;
                match self.pvs(
                    game,
                    probe_depth,
                    ply + 1,
                    alpha.step_up().flip(),
                    alpha.flip(),
                    true,
                    rest_pv,
                    1,
                    &[],
                ) {
                    NodeOutcome::TimedOut => NodeOutcome::TimedOut,
                    NodeOutcome::Results(probe) => {
                        let my_eval = probe[0].eval.flip();
                        // the equalities matter: with a degenerate window at
                        // an end value, any move fails high by equality
                        if alpha <= my_eval && my_eval <= beta && beta > alpha.step_up() {
                            self.stats.fail_high += 1;
                            self.pvs(
                                game,
                                depth - 1,
                                ply + 1,
                                beta.flip(),
                                alpha.flip(),
                                false,
                                rest_pv,
                                1,
                                &[],
                            )
                        } else {
                            self.stats.confirm_alpha += 1;
                            NodeOutcome::Results(probe)
                        }
                    }
                }
            };
            game.undo_move();

            let child = match outcome {
                NodeOutcome::TimedOut => {
                    // safe to return early only once the requested variation
                    // count is held: move 0 was the previous iteration's best,
                    // so the answer can only have improved
                    if best.len() >= n_variations {
                        return NodeOutcome::Results(best);
                    }
                    return NodeOutcome::TimedOut;
                }
                NodeOutcome::Results(results) => match results.into_iter().next() {
                    Some(child) => child,
                    None => {
                        warn!(%mv, "child search returned no result");
                        continue;
                    }
                },
            };

            let mut my_result = SearchResult {
                eval: child.eval.flip(),
                eval_flag: child.eval_flag.flip(),
                best_variation: std::iter::once(mv).chain(child.best_variation).collect(),
            };
            // a bound at an end value can only be the end value itself
            if (my_result.eval.is_loss() && my_result.eval_flag == EvalFlag::UpperBound)
                || (my_result.eval.is_win() && my_result.eval_flag == EvalFlag::LowerBound)
            {
                my_result.eval_flag = EvalFlag::Exact;
            }

            // upper bounds don't qualify on eval alone: the truth could be
            // anything below them
            let my_eval = my_result.eval;
            let qualifies = best.len() < n_variations
                || (my_result.eval_flag != EvalFlag::UpperBound
                    && best.last().is_some_and(|worst| my_result.eval > worst.eval));
            if qualifies {
                best.push(my_result);
                let tie_break = self.tie_break;
                best.sort_by(|a, b| compare_results(a, b, tie_break));
                best.truncate(n_variations);
            }

            // alpha and the cutoff both track the WORST kept variation, and
            // only once the requested count is held, so a later top-N
            // candidate is never pruned prematurely
            if best.len() == n_variations {
                if let Some(worst) = best.last().filter(|w| w.eval_flag != EvalFlag::UpperBound) {
                    alpha = alpha.max(worst.eval);
                    if worst.eval >= beta {
                        // no killer credit for arbitrary moves in lost positions
                        if !my_eval.is_loss() {
                            self.killers.add(ply, mv);
                        }
                        break;
                    }
                }
            }
            move_index += 1;

            // branching cap past the opening: a deliberate soundness/time
            // trade-off
            if game.n_moves() > 6 && move_index >= 20 {
                break;
            }
        }
        self.stats.moves_generated_sum += u64::from(move_index);
        self.stats.moves_generated_max = self.stats.moves_generated_max.max(move_index);
        self.stats.nodes_expanded += 1;

        if best.is_empty() {
            warn!(
                depth,
                ply,
                n_moves = game.n_moves(),
                "no moves at a non-terminal node, returning static eval"
            );
            return NodeOutcome::Results(vec![SearchResult::leaf(static_eval)]);
        }

        best[0].eval_flag = if best[0].eval <= alpha_orig {
            if best[0].eval.is_loss() {
                EvalFlag::Exact
            } else {
                EvalFlag::UpperBound
            }
        } else if best[0].eval >= beta {
            if best[0].eval.is_win() {
                EvalFlag::Exact
            } else {
                EvalFlag::LowerBound
            }
        } else {
            EvalFlag::Exact
        };

        // a null-window conclusion rests on an assumed bound; keep it out of
        // the full-window table
        if !using_null_window {
            self.tt.insert(table_key, best[0].clone(), depth);
        }

        NodeOutcome::Results(best)
    }
}

impl Default for Searcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Clone results for output, flipping to the first player's perspective
/// when requested
fn prepare_output(results: &[SearchResult], flip: bool) -> Vec<SearchResult> {
    results
        .iter()
        .map(|r| {
            let mut out = r.clone();
            if flip {
                out.eval = out.eval.flip();
                out.eval_flag = out.eval_flag.flip();
            }
            out
        })
        .collect()
}
