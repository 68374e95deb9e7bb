//! Linear shape library: canonical pattern definitions and pattern matching
//!
//! Tactical patterns are expressed as strings over the alphabet
//! `{'0', '1', '_'}` where `'1'` is a stone of the shape's owner, `'0'` an
//! opponent stone and `'_'` an empty cell. Each base pattern (written from
//! the owner's perspective) is expanded into four concrete variants
//! (forward/reverse, both players) and stored in a pattern -> info map.
//!
//! Matching a local window string against every known pattern is memoized,
//! because the same windows recur constantly across the search tree.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::board::{Player, Pos};

/// Semantic categories of linear shapes, ordered roughly by forcing power.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeKind {
    /// Five in a row - the game is over
    Pente,
    /// `_1111_` - two ways to complete, unstoppable without a capture
    OpenTessera,
    /// `1111_` - one move from a pente
    PenteThreat4,
    /// `111_1`
    PenteThreat31,
    /// `11_11`
    PenteThreat22,
    /// `_111_`
    OpenTria,
    /// `_11_1_`
    StretchTria,
    /// `111__`
    ExtendableTria,
    /// `1_11_`
    ExtendableStretchTria1,
    /// `11_1_`
    ExtendableStretchTria2,
    /// `_11_`
    OpenPair,
    /// `100_` - placing at the open end captures the pair
    CaptureThreat,
    /// `_1_1_`
    StretchTwo,
    /// `_1__1_`
    DoubleStretchTwo,
    /// `1___1`
    ThreeGap,
    /// `1_1_1`
    PentePotential1,
    /// `1__11`
    PentePotential2,
}

impl ShapeKind {
    pub const ALL: [ShapeKind; 17] = [
        ShapeKind::Pente,
        ShapeKind::OpenTessera,
        ShapeKind::PenteThreat4,
        ShapeKind::PenteThreat31,
        ShapeKind::PenteThreat22,
        ShapeKind::OpenTria,
        ShapeKind::StretchTria,
        ShapeKind::ExtendableTria,
        ShapeKind::ExtendableStretchTria1,
        ShapeKind::ExtendableStretchTria2,
        ShapeKind::OpenPair,
        ShapeKind::CaptureThreat,
        ShapeKind::StretchTwo,
        ShapeKind::DoubleStretchTwo,
        ShapeKind::ThreeGap,
        ShapeKind::PentePotential1,
        ShapeKind::PentePotential2,
    ];

    /// Base pattern from the owner's perspective
    pub fn base_pattern(self) -> &'static str {
        match self {
            ShapeKind::Pente => "11111",
            ShapeKind::OpenTessera => "_1111_",
            ShapeKind::PenteThreat4 => "1111_",
            ShapeKind::PenteThreat31 => "111_1",
            ShapeKind::PenteThreat22 => "11_11",
            ShapeKind::OpenTria => "_111_",
            ShapeKind::StretchTria => "_11_1_",
            ShapeKind::ExtendableTria => "111__",
            ShapeKind::ExtendableStretchTria1 => "1_11_",
            ShapeKind::ExtendableStretchTria2 => "11_1_",
            ShapeKind::OpenPair => "_11_",
            ShapeKind::CaptureThreat => "100_",
            ShapeKind::StretchTwo => "_1_1_",
            ShapeKind::DoubleStretchTwo => "_1__1_",
            ShapeKind::ThreeGap => "1___1",
            ShapeKind::PentePotential1 => "1_1_1",
            ShapeKind::PentePotential2 => "1__11",
        }
    }

    /// Stable name, used for feature dict keys and logs
    pub fn name(self) -> &'static str {
        match self {
            ShapeKind::Pente => "pente",
            ShapeKind::OpenTessera => "open-tessera",
            ShapeKind::PenteThreat4 => "pente-threat-4",
            ShapeKind::PenteThreat31 => "pente-threat-31",
            ShapeKind::PenteThreat22 => "pente-threat-22",
            ShapeKind::OpenTria => "open-tria",
            ShapeKind::StretchTria => "stretch-tria",
            ShapeKind::ExtendableTria => "extendable-tria",
            ShapeKind::ExtendableStretchTria1 => "extendable-stretch-tria-1",
            ShapeKind::ExtendableStretchTria2 => "extendable-stretch-tria-2",
            ShapeKind::OpenPair => "open-pair",
            ShapeKind::CaptureThreat => "capture-threat",
            ShapeKind::StretchTwo => "stretch-two",
            ShapeKind::DoubleStretchTwo => "double-stretch-two",
            ShapeKind::ThreeGap => "three-gap",
            ShapeKind::PentePotential1 => "pente-potential-1",
            ShapeKind::PentePotential2 => "pente-potential-2",
        }
    }

    /// True for the three shapes that complete a pente in one move
    #[inline]
    pub fn is_pente_threat(self) -> bool {
        matches!(
            self,
            ShapeKind::PenteThreat4 | ShapeKind::PenteThreat31 | ShapeKind::PenteThreat22
        )
    }

    /// Open or stretch tria: one move from an open tessera
    #[inline]
    pub fn is_tria(self) -> bool {
        matches!(self, ShapeKind::OpenTria | ShapeKind::StretchTria)
    }

    /// Trias that can still be extended into a pente threat
    #[inline]
    pub fn is_extendable_tria(self) -> bool {
        matches!(
            self,
            ShapeKind::ExtendableTria
                | ShapeKind::ExtendableStretchTria1
                | ShapeKind::ExtendableStretchTria2
        )
    }

    fn encode(self) -> u64 {
        ShapeKind::ALL.iter().position(|k| k == &self).unwrap_or(0) as u64
    }
}

/// One recognized pattern occurrence on the board.
///
/// Immutable value type: it may be referenced simultaneously from the live
/// shape set, transposition-table entries and undo records, so it is shared
/// by value, never by mutable reference. Identity is the packed `hash`,
/// derived from (kind, owner, begin, direction).
#[derive(Debug, Clone, Copy)]
pub struct LinearShape {
    pub kind: ShapeKind,
    pub owner: Player,
    pub begin: Pos,
    pub dy: i8,
    pub dx: i8,
    pub length: u8,
    /// The concrete board pattern this occurrence matched
    pub pattern: &'static [u8],
    pub hash: u64,
}

impl LinearShape {
    pub fn new(
        kind: ShapeKind,
        owner: Player,
        begin: Pos,
        dy: i8,
        dx: i8,
        pattern: &'static [u8],
    ) -> Self {
        Self {
            kind,
            owner,
            begin,
            dy,
            dx,
            length: pattern.len() as u8,
            pattern,
            hash: pack_shape_hash(kind, owner, begin, dy, dx),
        }
    }

    /// Cell at offset `i` along the shape's direction
    #[inline]
    pub fn cell(&self, i: usize) -> (i32, i32) {
        (
            self.begin.row as i32 + i as i32 * self.dy as i32,
            self.begin.col as i32 + i as i32 * self.dx as i32,
        )
    }

    /// Positions of the stones making up this shape
    pub fn stone_cells(&self) -> impl Iterator<Item = Pos> + '_ {
        (0..self.length as usize).filter_map(|i| {
            if self.pattern[i] == b'_' {
                return None;
            }
            let (r, c) = self.cell(i);
            Some(Pos::new(r as u8, c as u8))
        })
    }

    /// Positions of the empty cells inside this shape
    pub fn empty_cells(&self) -> impl Iterator<Item = Pos> + '_ {
        (0..self.length as usize).filter_map(|i| {
            if self.pattern[i] != b'_' {
                return None;
            }
            let (r, c) = self.cell(i);
            Some(Pos::new(r as u8, c as u8))
        })
    }
}

impl PartialEq for LinearShape {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}
impl Eq for LinearShape {}

impl std::hash::Hash for LinearShape {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.hash.hash(state);
    }
}

/// Pack (kind, owner, begin, direction) into a stable u64 identity.
///
/// Layout: kind(5) | owner(1) | row(6) | col(6) | dy(2) | dx(2).
fn pack_shape_hash(kind: ShapeKind, owner: Player, begin: Pos, dy: i8, dx: i8) -> u64 {
    let k = kind.encode() & 0x1F;
    let o = owner.index() as u64;
    let r = begin.row as u64 & 0x3F;
    let c = begin.col as u64 & 0x3F;
    let dy = (dy + 1) as u64 & 0x3;
    let dx = (dx + 1) as u64 & 0x3;
    k | (o << 5) | (r << 6) | (c << 12) | (dy << 18) | (dx << 20)
}

/// One entry in the expanded pattern table
#[derive(Debug, Clone, Copy)]
pub struct PatternInfo {
    pub kind: ShapeKind,
    pub owner: Player,
    pub pattern: &'static [u8],
}

/// Expanded pattern table: every concrete pattern variant, plus the longest
/// pattern length (bounds the local window the incremental updater builds).
pub struct PatternTable {
    patterns: Vec<PatternInfo>,
    max_len: usize,
}

impl PatternTable {
    fn build() -> Self {
        // keyed by pattern bytes so symmetric variants collapse to one entry
        let mut by_pattern: HashMap<Vec<u8>, (ShapeKind, Player)> = HashMap::new();
        let mut max_len = 0;
        for kind in ShapeKind::ALL {
            let base = kind.base_pattern().as_bytes().to_vec();
            max_len = max_len.max(base.len());
            let reversed: Vec<u8> = base.iter().rev().copied().collect();
            let swapped: Vec<u8> = base.iter().map(|&b| swap_players(b)).collect();
            let swapped_rev: Vec<u8> = swapped.iter().rev().copied().collect();
            // White owns the base orientation ('1' bytes are White stones);
            // swapping 0<->1 yields Black's version of the same shape
            by_pattern.insert(base, (kind, Player::White));
            by_pattern.insert(reversed, (kind, Player::White));
            by_pattern.insert(swapped, (kind, Player::Black));
            by_pattern.insert(swapped_rev, (kind, Player::Black));
        }
        let patterns = by_pattern
            .into_iter()
            .map(|(pattern, (kind, owner))| PatternInfo {
                kind,
                owner,
                pattern: Box::leak(pattern.into_boxed_slice()),
            })
            .collect();
        Self { patterns, max_len }
    }

    /// Longest pattern in the table
    #[inline]
    pub fn max_pattern_length(&self) -> usize {
        self.max_len
    }

    pub fn patterns(&self) -> &[PatternInfo] {
        &self.patterns
    }
}

fn swap_players(b: u8) -> u8 {
    match b {
        b'0' => b'1',
        b'1' => b'0',
        other => other,
    }
}

/// The global pattern table, built once
pub static PATTERNS: LazyLock<PatternTable> = LazyLock::new(PatternTable::build);

/// A match of a concrete pattern at an offset inside a window string
#[derive(Debug, Clone, Copy)]
pub struct PatternMatch {
    pub offset: usize,
    pub info: PatternInfo,
}

thread_local! {
    // window string -> matches memo; windows repeat heavily across the tree
    static MATCH_CACHE: RefCell<HashMap<Vec<u8>, Rc<Vec<PatternMatch>>>> =
        RefCell::new(HashMap::new());
}

/// Find every pattern occurrence inside `window` (memoized).
pub fn window_matches(window: &[u8]) -> Rc<Vec<PatternMatch>> {
    MATCH_CACHE.with(|cache| {
        if let Some(hit) = cache.borrow().get(window) {
            return Rc::clone(hit);
        }
        let mut matches = Vec::new();
        for info in PATTERNS.patterns() {
            let pat = info.pattern;
            if pat.len() > window.len() {
                continue;
            }
            for offset in 0..=(window.len() - pat.len()) {
                if &window[offset..offset + pat.len()] == pat {
                    matches.push(PatternMatch {
                        offset,
                        info: *info,
                    });
                }
            }
        }
        let matches = Rc::new(matches);
        cache
            .borrow_mut()
            .insert(window.to_vec(), Rc::clone(&matches));
        matches
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_has_all_variants() {
        // 17 base patterns x 4 variants, minus collapsed symmetric duplicates
        let n = PATTERNS.patterns().len();
        assert!(n > 17 * 2, "expected both players' patterns, got {}", n);
        assert!(n <= 17 * 4);
        assert_eq!(PATTERNS.max_pattern_length(), 6);
    }

    #[test]
    fn test_pente_match_both_players() {
        let white = window_matches(b"11111");
        assert!(white
            .iter()
            .any(|m| m.info.kind == ShapeKind::Pente && m.info.owner == Player::White));
        let black = window_matches(b"00000");
        assert!(black
            .iter()
            .any(|m| m.info.kind == ShapeKind::Pente && m.info.owner == Player::Black));
    }

    #[test]
    fn test_capture_threat_orientations() {
        // forward and reversed orientations of the same base pattern
        for window in [&b"100_"[..], &b"_001"[..]] {
            let matches = window_matches(window);
            assert!(
                matches.iter().any(|m| m.info.kind == ShapeKind::CaptureThreat
                    && m.info.owner == Player::White),
                "no capture threat in {:?}",
                std::str::from_utf8(window)
            );
        }
    }

    #[test]
    fn test_contained_patterns_both_found() {
        // an open tessera window also contains pente threats
        let matches = window_matches(b"_1111_");
        assert!(matches.iter().any(|m| m.info.kind == ShapeKind::OpenTessera));
        assert!(matches.iter().any(|m| m.info.kind == ShapeKind::PenteThreat4));
    }

    #[test]
    fn test_match_offsets() {
        let matches = window_matches(b"__11111__");
        let pente = matches
            .iter()
            .find(|m| m.info.kind == ShapeKind::Pente)
            .expect("pente not found");
        assert_eq!(pente.offset, 2);
    }

    #[test]
    fn test_shape_hash_identity() {
        let pat: &'static [u8] = b"_111_";
        let a = LinearShape::new(ShapeKind::OpenTria, Player::Black, Pos::new(4, 5), 0, 1, pat);
        let b = LinearShape::new(ShapeKind::OpenTria, Player::Black, Pos::new(4, 5), 0, 1, pat);
        let c = LinearShape::new(ShapeKind::OpenTria, Player::Black, Pos::new(4, 6), 0, 1, pat);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a.hash, c.hash);
    }

    #[test]
    fn test_shape_cells() {
        let pat: &'static [u8] = b"_11_";
        let s = LinearShape::new(ShapeKind::OpenPair, Player::White, Pos::new(5, 5), 1, 1, pat);
        let stones: Vec<Pos> = s.stone_cells().collect();
        assert_eq!(stones, vec![Pos::new(6, 6), Pos::new(7, 7)]);
        let empties: Vec<Pos> = s.empty_cells().collect();
        assert_eq!(empties, vec![Pos::new(5, 5), Pos::new(8, 8)]);
    }
}
