//! Opening restrictions and board symmetry
//!
//! The tournament opening rule: the first player's second stone (move
//! index 2) may not land inside the 5x5 box around the center. The symmetry
//! helpers let the move generator collapse mirror-image candidates while the
//! position is still small enough for exact symmetry to be common.

use crate::board::{GameState, Pos};

/// True when (r, c) is forbidden by the tournament opening rule: on move
/// index 2 the first player must play outside the 5x5 center box.
#[inline]
pub fn is_restricted(game: &GameState, r: usize, c: usize) -> bool {
    if game.n_moves() != 2 {
        return false;
    }
    let center = game.center() as i32;
    (r as i32 - center).abs() < 3 && (c as i32 - center).abs() < 3
}

/// A non-identity element of the square's symmetry group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symmetry {
    Rot90,
    Rot180,
    Rot270,
    /// Mirror across the vertical axis
    FlipH,
    /// Mirror across the horizontal axis
    FlipV,
    /// Mirror across the main diagonal
    FlipMain,
    /// Mirror across the anti-diagonal
    FlipAnti,
}

impl Symmetry {
    pub const ALL: [Symmetry; 7] = [
        Symmetry::Rot90,
        Symmetry::Rot180,
        Symmetry::Rot270,
        Symmetry::FlipH,
        Symmetry::FlipV,
        Symmetry::FlipMain,
        Symmetry::FlipAnti,
    ];

    /// Image of `pos` under this transform on an NxN board
    pub fn apply(self, pos: Pos, size: usize) -> Pos {
        let n = (size - 1) as u8;
        let (r, c) = (pos.row, pos.col);
        let (r2, c2) = match self {
            Symmetry::Rot90 => (c, n - r),
            Symmetry::Rot180 => (n - r, n - c),
            Symmetry::Rot270 => (n - c, r),
            Symmetry::FlipH => (r, n - c),
            Symmetry::FlipV => (n - r, c),
            Symmetry::FlipMain => (c, r),
            Symmetry::FlipAnti => (n - c, n - r),
        };
        Pos::new(r2, c2)
    }
}

/// Symmetries that map the current stone arrangement onto itself,
/// respecting stone color
pub fn detect_symmetries(game: &GameState) -> Vec<Symmetry> {
    Symmetry::ALL
        .iter()
        .copied()
        .filter(|sym| {
            game.stones().all(|(pos, player)| {
                let image = sym.apply(pos, game.size());
                game.get(image.row as i32, image.col as i32) == Some(player)
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restriction_only_on_move_two() {
        let mut g = GameState::new(19);
        assert!(!is_restricted(&g, 9, 9));
        g.make_move(9, 9);
        assert!(!is_restricted(&g, 9, 10));
        g.make_move(9, 10);
        // now move index 2: the 5x5 box around (9, 9) is off limits
        assert!(is_restricted(&g, 9, 9));
        assert!(is_restricted(&g, 11, 11));
        assert!(is_restricted(&g, 7, 7));
        assert!(!is_restricted(&g, 12, 9));
        assert!(!is_restricted(&g, 9, 6));
        g.make_move(12, 9);
        assert!(!is_restricted(&g, 11, 11));
    }

    #[test]
    fn test_symmetry_apply() {
        let p = Pos::new(2, 5);
        assert_eq!(Symmetry::Rot180.apply(p, 19), Pos::new(16, 13));
        assert_eq!(Symmetry::FlipMain.apply(p, 19), Pos::new(5, 2));
        // rotating four times is the identity
        let mut q = p;
        for _ in 0..4 {
            q = Symmetry::Rot90.apply(q, 19);
        }
        assert_eq!(q, p);
    }

    #[test]
    fn test_center_stone_has_full_symmetry() {
        let mut g = GameState::new(19);
        g.make_move(9, 9);
        assert_eq!(detect_symmetries(&g).len(), 7);
    }

    #[test]
    fn test_axis_stone_keeps_one_mirror() {
        let mut g = GameState::new(19);
        g.make_move(9, 9);
        g.make_move(9, 12); // on the horizontal through the center
        let syms = detect_symmetries(&g);
        assert!(syms.contains(&Symmetry::FlipV));
        assert!(!syms.contains(&Symmetry::Rot90));
        assert!(!syms.contains(&Symmetry::FlipH));
    }

    #[test]
    fn test_asymmetric_board_has_no_symmetry() {
        let mut g = GameState::new(19);
        g.make_move(9, 9);
        g.make_move(8, 12);
        g.make_move(11, 10);
        assert!(detect_symmetries(&g).is_empty());
    }
}
