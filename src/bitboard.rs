//! 64-bit square sets.
//!
//! Bit `i` of a [`Bitboard`] stands for square `i` (see [`crate::square`]).
//! Neighbor expansion shifts the set in the four directions, masking off the
//! files and ranks that would wrap around the board edge.

use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, BitXor, BitXorAssign, Not};

use crate::piece::Color;
use crate::square::Square;

/// A set of squares.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Bitboard(pub u64);

impl Bitboard {
    pub const EMPTY: Bitboard = Bitboard(0);
    pub const ALL: Bitboard = Bitboard(0xFFFF_FFFF_FFFF_FFFF);

    pub const NOT_FILE_A: Bitboard = Bitboard(0xFEFE_FEFE_FEFE_FEFE);
    pub const NOT_FILE_H: Bitboard = Bitboard(0x7F7F_7F7F_7F7F_7F7F);
    pub const NOT_RANK_1: Bitboard = Bitboard(0xFFFF_FFFF_FFFF_FF00);
    pub const NOT_RANK_8: Bitboard = Bitboard(0x00FF_FFFF_FFFF_FFFF);

    pub const RANK_1: Bitboard = Bitboard(0x0000_0000_0000_00FF);
    pub const RANK_8: Bitboard = Bitboard(0xFF00_0000_0000_0000);

    /// c3, f3, c6 and f6.
    pub const TRAPS: Bitboard = Bitboard(0x0000_2400_0024_0000);

    /// Squares orthogonally adjacent to a trap.
    pub const TRAP_NEIGHBORS: Bitboard = Bitboard::TRAPS.neighbors();

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn contains(self, sq: Square) -> bool {
        self.0 & (1 << sq.index()) != 0
    }

    /// Population count.
    #[inline]
    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }

    /// Union of the one-step neighbors of every square in the set.
    #[inline]
    pub const fn neighbors(self) -> Bitboard {
        let b = self.0;
        Bitboard(
            (b & Self::NOT_FILE_A.0) >> 1
                | (b & Self::NOT_FILE_H.0) << 1
                | (b & Self::NOT_RANK_1.0) >> 8
                | (b & Self::NOT_RANK_8.0) << 8,
        )
    }

    /// The least significant square, if any.
    #[inline]
    pub fn first(self) -> Option<Square> {
        if self.0 == 0 {
            None
        } else {
            Square::new(self.0.trailing_zeros() as u8)
        }
    }

    /// Isolate the least significant bit.
    #[inline]
    pub const fn lsb(self) -> Bitboard {
        Bitboard(self.0 & self.0.wrapping_neg())
    }

    /// Iterate over the squares of the set from least to most significant.
    #[inline]
    pub fn squares(self) -> Squares {
        Squares(self.0)
    }

    /// The goal rank of `color`: rank 8 for Gold, rank 1 for Silver.
    #[inline]
    pub const fn goal_rank(color: Color) -> Bitboard {
        match color {
            Color::Gold => Self::RANK_8,
            Color::Silver => Self::RANK_1,
        }
    }
}

/// Iterator over the squares of a [`Bitboard`].
pub struct Squares(u64);

impl Iterator for Squares {
    type Item = Square;

    #[inline]
    fn next(&mut self) -> Option<Square> {
        if self.0 == 0 {
            return None;
        }
        let index = self.0.trailing_zeros() as u8;
        self.0 &= self.0 - 1;
        Square::new(index)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.0.count_ones() as usize;
        (n, Some(n))
    }
}

impl BitAnd for Bitboard {
    type Output = Bitboard;
    #[inline]
    fn bitand(self, rhs: Bitboard) -> Bitboard {
        Bitboard(self.0 & rhs.0)
    }
}

impl BitOr for Bitboard {
    type Output = Bitboard;
    #[inline]
    fn bitor(self, rhs: Bitboard) -> Bitboard {
        Bitboard(self.0 | rhs.0)
    }
}

impl BitXor for Bitboard {
    type Output = Bitboard;
    #[inline]
    fn bitxor(self, rhs: Bitboard) -> Bitboard {
        Bitboard(self.0 ^ rhs.0)
    }
}

impl Not for Bitboard {
    type Output = Bitboard;
    #[inline]
    fn not(self) -> Bitboard {
        Bitboard(!self.0)
    }
}

impl BitAndAssign for Bitboard {
    #[inline]
    fn bitand_assign(&mut self, rhs: Bitboard) {
        self.0 &= rhs.0;
    }
}

impl BitOrAssign for Bitboard {
    #[inline]
    fn bitor_assign(&mut self, rhs: Bitboard) {
        self.0 |= rhs.0;
    }
}

impl BitXorAssign for Bitboard {
    #[inline]
    fn bitxor_assign(&mut self, rhs: Bitboard) {
        self.0 ^= rhs.0;
    }
}

// =============================================================================
// Step Tables
// =============================================================================

/// One-step neighbor mask for every square.
pub static STEPS: [Bitboard; 64] = build_steps();

/// Neighbor masks for rabbits, which may not step toward their home rank.
/// Indexed by color, then square.
pub static RABBIT_STEPS: [[Bitboard; 64]; 2] = [build_rabbit_steps(true), build_rabbit_steps(false)];

const fn build_steps() -> [Bitboard; 64] {
    let mut table = [Bitboard::EMPTY; 64];
    let mut i = 0;
    while i < 64 {
        table[i] = Bitboard(1 << i).neighbors();
        i += 1;
    }
    table
}

const fn build_rabbit_steps(gold: bool) -> [Bitboard; 64] {
    let mut table = [Bitboard::EMPTY; 64];
    let mut i = 0;
    while i < 64 {
        let b: u64 = 1 << i;
        let backward = if gold {
            (b & Bitboard::NOT_RANK_1.0) >> 8
        } else {
            (b & Bitboard::NOT_RANK_8.0) << 8
        };
        table[i] = Bitboard(Bitboard(b).neighbors().0 & !backward);
        i += 1;
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(s: &str) -> Square {
        s.parse().unwrap()
    }

    #[test]
    fn test_neighbors_corner() {
        let n = sq("a1").bitboard().neighbors();
        assert_eq!(n.count(), 2);
        assert!(n.contains(sq("a2")));
        assert!(n.contains(sq("b1")));
    }

    #[test]
    fn test_neighbors_do_not_wrap() {
        let n = sq("h4").bitboard().neighbors();
        assert_eq!(n.count(), 3);
        assert!(!n.contains(sq("a5")));
        assert!(!n.contains(sq("a4")));
    }

    #[test]
    fn test_trap_neighbors() {
        assert_eq!(Bitboard::TRAPS.count(), 4);
        assert_eq!(Bitboard::TRAP_NEIGHBORS.count(), 16);
        assert!(Bitboard::TRAP_NEIGHBORS.contains(sq("c4")));
        assert!(!Bitboard::TRAP_NEIGHBORS.contains(sq("c3")));
    }

    #[test]
    fn test_rabbit_steps_forbid_retreat() {
        let d4 = sq("d4");
        let gold = RABBIT_STEPS[Color::Gold.index()][d4.index()];
        let silver = RABBIT_STEPS[Color::Silver.index()][d4.index()];
        assert!(!gold.contains(sq("d3")));
        assert!(gold.contains(sq("d5")));
        assert!(!silver.contains(sq("d5")));
        assert!(silver.contains(sq("d3")));
        assert_eq!(STEPS[d4.index()].count(), 4);
    }

    #[test]
    fn test_squares_iteration_order() {
        let b = sq("h8").bitboard() | sq("a1").bitboard() | sq("c3").bitboard();
        let v: Vec<Square> = b.squares().collect();
        assert_eq!(v, vec![sq("a1"), sq("c3"), sq("h8")]);
        assert_eq!(b.first(), Some(sq("a1")));
        assert_eq!(b.lsb(), sq("a1").bitboard());
    }
}
