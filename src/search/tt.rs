//! Transposition table with FIFO eviction
//!
//! Keyed by (player to move, canonical board bytes, null-window tag). The
//! null-window tag keeps conclusions reached under an assumed bound separate
//! from full-window results, because they are not interchangeable. Eviction
//! is insertion order at a fixed capacity; re-storing an existing key
//! replaces the value without refreshing its age.

use std::collections::{HashMap, VecDeque};

use super::SearchResult;
use crate::board::{GameState, Player};

pub const DEFAULT_TT_CAPACITY: usize = 200_000;

/// Position identity for table lookups
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TtKey {
    player: Player,
    board: Vec<u8>,
    null_window: bool,
}

impl TtKey {
    pub fn new(game: &GameState, null_window: bool) -> Self {
        Self {
            player: game.current_player(),
            board: game.board_key().to_vec(),
            null_window,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TtEntry {
    /// Remaining search depth the result was computed with; usable only for
    /// requests at this depth or less
    pub depth: u32,
    pub result: SearchResult,
}

pub struct TranspositionTable {
    map: HashMap<TtKey, TtEntry>,
    order: VecDeque<TtKey>,
    capacity: usize,
}

impl TranspositionTable {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            map: HashMap::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&mut self) {
        self.map.clear();
        self.order.clear();
    }

    pub fn get(&self, key: &TtKey) -> Option<&TtEntry> {
        self.map.get(key)
    }

    pub fn insert(&mut self, key: TtKey, result: SearchResult, depth: u32) {
        let entry = TtEntry { depth, result };
        if self.map.contains_key(&key) {
            self.map.insert(key, entry);
            return;
        }
        if self.map.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.map.remove(&oldest);
            }
        }
        self.order.push_back(key.clone());
        self.map.insert(key, entry);
    }
}

impl Default for TranspositionTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::Eval;

    fn key_for(moves: &[(usize, usize)], null_window: bool) -> TtKey {
        let mut g = GameState::new(19);
        for &(r, c) in moves {
            assert!(g.make_move(r, c));
        }
        TtKey::new(&g, null_window)
    }

    #[test]
    fn test_store_and_fetch() {
        let mut tt = TranspositionTable::new();
        let key = key_for(&[(9, 9)], false);
        tt.insert(key.clone(), SearchResult::leaf(Eval::Score(1.0)), 3);
        let entry = tt.get(&key).expect("missing entry");
        assert_eq!(entry.depth, 3);
        assert_eq!(entry.result.eval, Eval::Score(1.0));
    }

    #[test]
    fn test_null_window_keys_are_distinct() {
        let mut tt = TranspositionTable::new();
        let full = key_for(&[(9, 9)], false);
        let null = key_for(&[(9, 9)], true);
        assert_ne!(full, null);
        tt.insert(full.clone(), SearchResult::leaf(Eval::Score(1.0)), 2);
        assert!(tt.get(&null).is_none());
        assert!(tt.get(&full).is_some());
    }

    #[test]
    fn test_fifo_eviction() {
        let mut tt = TranspositionTable::with_capacity(2);
        let k1 = key_for(&[(9, 9)], false);
        let k2 = key_for(&[(9, 9), (9, 10)], false);
        let k3 = key_for(&[(9, 9), (10, 10)], false);
        tt.insert(k1.clone(), SearchResult::leaf(Eval::Score(1.0)), 1);
        tt.insert(k2.clone(), SearchResult::leaf(Eval::Score(2.0)), 1);
        tt.insert(k3.clone(), SearchResult::leaf(Eval::Score(3.0)), 1);
        // the first inserted key goes, regardless of later reads
        assert!(tt.get(&k1).is_none());
        assert!(tt.get(&k2).is_some());
        assert!(tt.get(&k3).is_some());
        assert_eq!(tt.len(), 2);
    }

    #[test]
    fn test_reinsert_replaces_without_growth() {
        let mut tt = TranspositionTable::with_capacity(2);
        let key = key_for(&[(9, 9)], false);
        tt.insert(key.clone(), SearchResult::leaf(Eval::Score(1.0)), 1);
        tt.insert(key.clone(), SearchResult::leaf(Eval::Score(9.0)), 4);
        assert_eq!(tt.len(), 1);
        let entry = tt.get(&key).expect("missing entry");
        assert_eq!(entry.depth, 4);
        assert_eq!(entry.result.eval, Eval::Score(9.0));
    }

    #[test]
    fn test_clear() {
        let mut tt = TranspositionTable::new();
        tt.insert(
            key_for(&[(9, 9)], false),
            SearchResult::leaf(Eval::Score(1.0)),
            1,
        );
        tt.clear();
        assert!(tt.is_empty());
    }
}
