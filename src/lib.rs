//! Pente AI engine
//!
//! A game engine for Pente, the custodial-capture variant of gomoku:
//! - Standard 19x19 board
//! - 5-in-a-row (pente) to win, overlines count
//! - Capture win: 5 captured pairs
//! - Custodial capture: completing X-O-O-X removes the O-O pair
//! - Tournament rule: the first move is the center, the second mover's
//!   second stone must leave the 5x5 center box
//!
//! # Architecture
//!
//! The engine is organized into several modules:
//! - [`board`]: Game state with incremental shape tracking and exact undo
//! - [`shapes`]: The linear stone patterns the evaluator and move
//!   generator reason about
//! - [`rules`]: Move restrictions and board symmetries
//! - [`eval`]: Feature-based position evaluation with forced-win and
//!   forced-loss short-circuits
//! - [`movegen`]: Lazy, priority-ordered candidate move generation
//! - [`search`]: Iterative-deepening principal variation search with a
//!   transposition table, killer moves and multi-variation output
//! - [`engine`]: High-level facade that picks a move to play
//!
//! # Quick Start
//!
//! ```
//! use pente::{Engine, GameState, Pos};
//!
//! let mut game = GameState::new(19);
//! let mut engine = Engine::new();
//!
//! // the first move is always the center
//! if let Some(pos) = engine.choose_move(&game, 2, None) {
//!     assert_eq!(pos, Pos::new(9, 9));
//!     game.make_move(pos.row as usize, pos.col as usize);
//! }
//! ```
//!
//! # Search Priority
//!
//! Candidate moves are generated lazily, best first:
//! 1. Opening book moves
//! 2. Principal variation move from the previous iteration
//! 3. Transposition table move
//! 4. Killer moves for the current ply
//! 5. Shape-indexed moves ordered by threat priority
//! 6. Neighborhood cells around existing stones

pub mod board;
pub mod engine;
pub mod eval;
pub mod movegen;
pub mod rules;
pub mod search;
pub mod shapes;

// Re-export commonly used types for convenience
pub use board::{GameState, Player, Pos, DEFAULT_BOARD_SIZE};
pub use engine::Engine;
pub use eval::{evaluate_position, position_feature_dict, Eval};
pub use movegen::{build_opening_book, non_quiet_moves, MoveCursor};
pub use search::{
    compare_results, EvalFlag, SearchOptions, SearchResult, SearchStats, Searcher, TieBreak,
};
