//! Piece placement: bitboards per piece code, presence per color, and a
//! square-indexed mailbox for constant-time lookups.
//!
//! A [`Board`] knows nothing about turns or hashing. It moves pieces and
//! resolves trap captures; [`crate::position::Position`] layers the game
//! state on top.

use std::fmt;

use crate::bitboard::Bitboard;
use crate::piece::{Color, Piece};
use crate::square::Square;
use crate::step::Capture;

#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Board {
    /// One plane per piece code. Index 0 is the empty plane.
    planes: [Bitboard; Piece::COUNT],
    presence: [Bitboard; 2],
    mailbox: [Piece; 64],
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    /// An empty board.
    pub fn new() -> Self {
        let mut planes = [Bitboard::EMPTY; Piece::COUNT];
        planes[Piece::Empty.index()] = Bitboard::ALL;
        Board {
            planes,
            presence: [Bitboard::EMPTY; 2],
            mailbox: [Piece::Empty; 64],
        }
    }

    #[inline]
    pub fn at(&self, sq: Square) -> Piece {
        self.mailbox[sq.index()]
    }

    /// The plane of `piece`. `Piece::Empty` yields the empty squares.
    #[inline]
    pub fn bitboard(&self, piece: Piece) -> Bitboard {
        self.planes[piece.index()]
    }

    #[inline]
    pub fn empty(&self) -> Bitboard {
        self.planes[Piece::Empty.index()]
    }

    #[inline]
    pub fn presence(&self, color: Color) -> Bitboard {
        self.presence[color.index()]
    }

    #[inline]
    pub fn occupied(&self) -> Bitboard {
        !self.empty()
    }

    /// Number of `piece` on the board.
    #[inline]
    pub fn count(&self, piece: Piece) -> u32 {
        self.bitboard(piece).count()
    }

    /// Occupied squares with their pieces, in square order.
    pub fn pieces(&self) -> impl Iterator<Item = (Piece, Square)> + '_ {
        self.occupied().squares().map(|sq| (self.at(sq), sq))
    }

    /// Put `piece` on the empty square `sq`.
    pub fn put(&mut self, piece: Piece, sq: Square) {
        debug_assert!(self.at(sq).is_empty(), "put on occupied {sq}");
        let Some(color) = piece.color() else {
            return;
        };
        let b = sq.bitboard();
        self.planes[piece.index()] ^= b;
        self.planes[Piece::Empty.index()] ^= b;
        self.presence[color.index()] ^= b;
        self.mailbox[sq.index()] = piece;
    }

    /// Remove and return the piece on `sq`.
    pub fn take(&mut self, sq: Square) -> Piece {
        let piece = self.at(sq);
        let Some(color) = piece.color() else {
            return Piece::Empty;
        };
        let b = sq.bitboard();
        self.planes[piece.index()] ^= b;
        self.planes[Piece::Empty.index()] ^= b;
        self.presence[color.index()] ^= b;
        self.mailbox[sq.index()] = Piece::Empty;
        piece
    }

    /// Whether a piece of `color` stands next to `sq`.
    #[inline]
    pub fn has_friend(&self, sq: Square, color: Color) -> bool {
        !(sq.bitboard().neighbors() & self.presence(color)).is_empty()
    }

    /// Whether an enemy strictly stronger than `piece` stands next to `sq`.
    pub fn has_stronger_enemy(&self, sq: Square, piece: Piece) -> bool {
        let near = sq.bitboard().neighbors();
        piece
            .stronger_enemies()
            .any(|e| !(self.bitboard(e) & near).is_empty())
    }

    /// A piece is frozen when a stronger enemy is adjacent and no friendly
    /// piece is.
    pub fn is_frozen(&self, sq: Square) -> bool {
        let piece = self.at(sq);
        let Some(color) = piece.color() else {
            return false;
        };
        !self.has_friend(sq, color) && self.has_stronger_enemy(sq, piece)
    }

    /// Whether the piece on the trap `sq` has no friendly neighbor.
    fn is_unsupported_trap(&self, sq: Square) -> bool {
        if !sq.is_trap() {
            return false;
        }
        match self.at(sq).color() {
            Some(color) => !self.has_friend(sq, color),
            None => false,
        }
    }

    /// Move `piece` from `from` to the empty `to` and resolve the trap
    /// capture it causes, if any.
    ///
    /// Only two pieces can lose support: the mover itself if it lands on a
    /// trap, or a friendly piece on the trap next to `from`. Both cannot
    /// happen at once.
    pub fn step(&mut self, piece: Piece, from: Square, to: Square) -> Option<Capture> {
        debug_assert_eq!(self.at(from), piece, "step from {from}");
        self.take(from);
        self.put(piece, to);
        let victim = if self.is_unsupported_trap(to) {
            Some(to)
        } else {
            from.adjacent_trap()
                .filter(|&t| self.at(t).color() == piece.color() && self.is_unsupported_trap(t))
        };
        victim.map(|square| Capture {
            piece: self.take(square),
            square,
        })
    }

    /// Revert [`Board::step`]: restore the capture, then move back.
    pub fn unstep(&mut self, piece: Piece, from: Square, to: Square, capture: Option<Capture>) {
        if let Some(c) = capture {
            self.put(c.piece, c.square);
        }
        self.take(to);
        self.put(piece, from);
    }

    /// Whether the planes, presence sets and mailbox agree.
    pub fn is_consistent(&self) -> bool {
        let mut union = Bitboard::EMPTY;
        let mut presence = [Bitboard::EMPTY; 2];
        for piece in Piece::ALL {
            let b = self.bitboard(piece);
            if !(union & b).is_empty() {
                return false;
            }
            union |= b;
            if let Some(c) = piece.color() {
                presence[c.index()] ^= b;
            }
            if b.squares().any(|sq| self.at(sq) != piece) {
                return false;
            }
        }
        union == !self.empty()
            && presence == self.presence
            && self.empty().squares().all(|sq| self.at(sq).is_empty())
    }

    /// The 64 piece letters from a8 to h1, row by row.
    pub fn to_short(&self) -> String {
        (0..64u8)
            .map(|i| {
                let sq = Square::from_coords(i % 8, 7 - i / 8);
                self.at(sq).as_char()
            })
            .collect()
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, " +-----------------+")?;
        for rank in (0..8).rev() {
            write!(f, "{}|", rank + 1)?;
            for file in 0..8 {
                let sq = Square::from_coords(file, rank);
                let c = match self.at(sq) {
                    Piece::Empty if sq.is_trap() => 'x',
                    Piece::Empty => '.',
                    p => p.as_char(),
                };
                write!(f, " {c}")?;
            }
            writeln!(f, " |")?;
        }
        writeln!(f, " +-----------------+")?;
        write!(f, "   a b c d e f g h")
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Board({:?})", self.to_short())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(s: &str) -> Square {
        s.parse().unwrap()
    }

    #[test]
    fn test_put_take() {
        let mut b = Board::new();
        b.put(Piece::GDog, sq("d4"));
        assert_eq!(b.at(sq("d4")), Piece::GDog);
        assert!(b.presence(Color::Gold).contains(sq("d4")));
        assert!(!b.empty().contains(sq("d4")));
        assert!(b.is_consistent());
        assert_eq!(b.take(sq("d4")), Piece::GDog);
        assert_eq!(b, Board::new());
    }

    #[test]
    fn test_frozen() {
        let mut b = Board::new();
        b.put(Piece::GRabbit, sq("g5"));
        b.put(Piece::SCamel, sq("g6"));
        assert!(b.is_frozen(sq("g5")));
        assert!(!b.is_frozen(sq("g6")));
        b.put(Piece::GCat, sq("h5"));
        assert!(!b.is_frozen(sq("g5")));
    }

    #[test]
    fn test_equal_strength_does_not_freeze() {
        let mut b = Board::new();
        b.put(Piece::GDog, sq("d4"));
        b.put(Piece::SDog, sq("d5"));
        assert!(!b.is_frozen(sq("d4")));
        assert!(!b.is_frozen(sq("d5")));
    }

    #[test]
    fn test_step_onto_unsupported_trap_captures_mover() {
        let mut b = Board::new();
        b.put(Piece::GCat, sq("c4"));
        let cap = b.step(Piece::GCat, sq("c4"), sq("c3"));
        assert_eq!(
            cap,
            Some(Capture {
                piece: Piece::GCat,
                square: sq("c3")
            })
        );
        assert!(b.at(sq("c3")).is_empty());
        b.unstep(Piece::GCat, sq("c4"), sq("c3"), cap);
        assert_eq!(b.at(sq("c4")), Piece::GCat);
        assert!(b.is_consistent());
    }

    #[test]
    fn test_step_away_abandons_trap_piece() {
        let mut b = Board::new();
        b.put(Piece::SRabbit, sq("f6"));
        b.put(Piece::SCat, sq("f7"));
        let cap = b.step(Piece::SCat, sq("f7"), sq("g7"));
        assert_eq!(cap.map(|c| c.piece), Some(Piece::SRabbit));
        assert!(b.at(sq("f6")).is_empty());
        assert!(b.is_consistent());
    }

    #[test]
    fn test_supported_trap_piece_survives() {
        let mut b = Board::new();
        b.put(Piece::GHorse, sq("c4"));
        b.put(Piece::GDog, sq("b3"));
        assert_eq!(b.step(Piece::GHorse, sq("c4"), sq("c3")), None);
        assert_eq!(b.at(sq("c3")), Piece::GHorse);
    }

    #[test]
    fn test_short_layout() {
        let mut b = Board::new();
        b.put(Piece::SElephant, sq("a8"));
        b.put(Piece::GRabbit, sq("h1"));
        let s = b.to_short();
        assert_eq!(s.len(), 64);
        assert!(s.starts_with('e'));
        assert!(s.ends_with('R'));
    }
}
