//! Board squares and step directions.
//!
//! Squares are numbered `8 * rank + file`, so a1 is 0, h1 is 7 and h8 is 63.
//! Gold's home rank is rank 1 and Silver's is rank 8.

use std::fmt;

use crate::bitboard::Bitboard;
use crate::error::ParseError;

/// A square on the 8x8 board.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Square(u8);

impl Square {
    /// The four trap squares: c3, f3, c6, f6.
    pub const TRAPS: [Square; 4] = [Square(18), Square(21), Square(42), Square(45)];

    /// Create a square from its index, or `None` when out of range.
    #[inline]
    pub const fn new(index: u8) -> Option<Square> {
        if index < 64 { Some(Square(index)) } else { None }
    }

    /// Create a square from file (0 = a) and rank (0 = rank 1).
    #[inline]
    pub const fn from_coords(file: u8, rank: u8) -> Square {
        Square(8 * rank + file)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn file(self) -> u8 {
        self.0 % 8
    }

    #[inline]
    pub const fn rank(self) -> u8 {
        self.0 / 8
    }

    /// Singleton bitboard for this square.
    #[inline]
    pub const fn bitboard(self) -> Bitboard {
        Bitboard(1 << self.0)
    }

    /// The square seen from the other side of the board (rank mirrored).
    #[inline]
    pub const fn flip(self) -> Square {
        Square(self.0 ^ 56)
    }

    #[inline]
    pub fn is_trap(self) -> bool {
        Bitboard::TRAPS.contains(self)
    }

    /// Whether `other` is orthogonally adjacent to this square.
    #[inline]
    pub fn adjacent(self, other: Square) -> bool {
        self.bitboard().neighbors().contains(other)
    }

    /// Step one square in `dir`, or `None` off the edge of the board.
    pub fn translate(self, dir: Direction) -> Option<Square> {
        match dir {
            Direction::North if self.rank() < 7 => Some(Square(self.0 + 8)),
            Direction::South if self.rank() > 0 => Some(Square(self.0 - 8)),
            Direction::East if self.file() < 7 => Some(Square(self.0 + 1)),
            Direction::West if self.file() > 0 => Some(Square(self.0 - 1)),
            _ => None,
        }
    }

    /// Direction from this square to an adjacent `dest`.
    pub fn direction_to(self, dest: Square) -> Option<Direction> {
        Direction::ALL
            .into_iter()
            .find(|&d| self.translate(d) == Some(dest))
    }

    /// The trap square adjacent to this square, if any. At most one trap
    /// touches any square.
    pub fn adjacent_trap(self) -> Option<Square> {
        (self.bitboard().neighbors() & Bitboard::TRAPS).first()
    }

    /// Iterate over all 64 squares in index order.
    pub fn all() -> impl Iterator<Item = Square> {
        (0..64).map(Square)
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let file = (b'a' + self.file()) as char;
        let rank = (b'1' + self.rank()) as char;
        write!(f, "{file}{rank}")
    }
}

impl std::str::FromStr for Square {
    type Err = ParseError;

    /// Parse algebraic notation such as `c3`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != 2 {
            return Err(ParseError::Square(s.to_string()));
        }
        let (file, rank) = (bytes[0], bytes[1]);
        if !(b'a'..=b'h').contains(&file) || !(b'1'..=b'8').contains(&rank) {
            return Err(ParseError::Square(s.to_string()));
        }
        Ok(Square::from_coords(file - b'a', rank - b'1'))
    }
}

/// One of the four orthogonal step directions.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn as_char(self) -> char {
        match self {
            Direction::North => 'n',
            Direction::East => 'e',
            Direction::South => 's',
            Direction::West => 'w',
        }
    }

    pub fn from_char(c: char) -> Option<Direction> {
        match c {
            'n' => Some(Direction::North),
            'e' => Some(Direction::East),
            's' => Some(Direction::South),
            'w' => Some(Direction::West),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display_roundtrip() {
        for sq in Square::all() {
            let s = sq.to_string();
            assert_eq!(s.parse::<Square>().unwrap(), sq, "roundtrip failed for {s}");
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("i1".parse::<Square>().is_err());
        assert!("a9".parse::<Square>().is_err());
        assert!("a".parse::<Square>().is_err());
    }

    #[test]
    fn test_trap_indices() {
        let names: Vec<String> = Square::TRAPS.iter().map(|s| s.to_string()).collect();
        assert_eq!(names, ["c3", "f3", "c6", "f6"]);
        assert_eq!(Square::TRAPS[0].index(), 18);
        assert_eq!(Square::TRAPS[3].index(), 45);
    }

    #[test]
    fn test_translate_edges() {
        let a1: Square = "a1".parse().unwrap();
        let h8: Square = "h8".parse().unwrap();
        assert_eq!(a1.translate(Direction::West), None);
        assert_eq!(a1.translate(Direction::South), None);
        assert_eq!(a1.translate(Direction::North), Some("a2".parse().unwrap()));
        assert_eq!(h8.translate(Direction::East), None);
        assert_eq!(h8.translate(Direction::North), None);
        assert_eq!(h8.translate(Direction::West), Some("g8".parse().unwrap()));
    }

    #[test]
    fn test_direction_to() {
        let d4: Square = "d4".parse().unwrap();
        assert_eq!(d4.direction_to("d5".parse().unwrap()), Some(Direction::North));
        assert_eq!(d4.direction_to("c4".parse().unwrap()), Some(Direction::West));
        assert_eq!(d4.direction_to("e5".parse().unwrap()), None);
    }

    #[test]
    fn test_adjacent_trap() {
        let c4: Square = "c4".parse().unwrap();
        assert_eq!(c4.adjacent_trap(), Some("c3".parse().unwrap()));
        let a1: Square = "a1".parse().unwrap();
        assert_eq!(a1.adjacent_trap(), None);
    }
}
