//! Colors, piece kinds and colored pieces.

use std::fmt;

use crate::error::ParseError;

/// The two sides. Gold moves first and starts on ranks 1 and 2.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Color {
    Gold,
    Silver,
}

impl Color {
    pub const BOTH: [Color; 2] = [Color::Gold, Color::Silver];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub const fn opposite(self) -> Color {
        match self {
            Color::Gold => Color::Silver,
            Color::Silver => Color::Gold,
        }
    }

    pub const fn as_char(self) -> char {
        match self {
            Color::Gold => 'g',
            Color::Silver => 's',
        }
    }

    /// Parse a side letter. The legacy `w`/`b` letters are accepted.
    pub fn from_char(c: char) -> Result<Color, ParseError> {
        match c {
            'g' | 'w' => Ok(Color::Gold),
            's' | 'b' => Ok(Color::Silver),
            _ => Err(ParseError::Color(c)),
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Piece kinds ordered by strength.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Kind {
    Rabbit,
    Cat,
    Dog,
    Horse,
    Camel,
    Elephant,
}

impl Kind {
    pub const ALL: [Kind; 6] = [
        Kind::Rabbit,
        Kind::Cat,
        Kind::Dog,
        Kind::Horse,
        Kind::Camel,
        Kind::Elephant,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// A colored piece, or `Empty`.
///
/// The discriminant doubles as the index into the position's bitboard
/// array: `Empty` is 0, Gold pieces are 1..=6 and Silver pieces 7..=12.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Piece {
    Empty,
    GRabbit,
    GCat,
    GDog,
    GHorse,
    GCamel,
    GElephant,
    SRabbit,
    SCat,
    SDog,
    SHorse,
    SCamel,
    SElephant,
}

const PIECE_CHARS: &[u8; 13] = b" RCDHMErcdhme";

impl Piece {
    /// Number of piece codes including `Empty`.
    pub const COUNT: usize = 13;

    /// All twelve real pieces, Gold first.
    pub const ALL: [Piece; 12] = [
        Piece::GRabbit,
        Piece::GCat,
        Piece::GDog,
        Piece::GHorse,
        Piece::GCamel,
        Piece::GElephant,
        Piece::SRabbit,
        Piece::SCat,
        Piece::SDog,
        Piece::SHorse,
        Piece::SCamel,
        Piece::SElephant,
    ];

    #[inline]
    pub const fn new(color: Color, kind: Kind) -> Piece {
        Piece::ALL[color.index() * 6 + kind.index()]
    }

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        matches!(self, Piece::Empty)
    }

    /// Color of a real piece. Returns `None` for `Empty`.
    #[inline]
    pub const fn color(self) -> Option<Color> {
        match self as u8 {
            0 => None,
            1..=6 => Some(Color::Gold),
            _ => Some(Color::Silver),
        }
    }

    /// Kind of a real piece. Returns `None` for `Empty`.
    #[inline]
    pub const fn kind(self) -> Option<Kind> {
        match self as u8 {
            0 => None,
            n => Some(Kind::ALL[((n - 1) % 6) as usize]),
        }
    }

    #[inline]
    pub fn is_rabbit(self) -> bool {
        self.kind() == Some(Kind::Rabbit)
    }

    /// Whether `self` is strictly weaker than `other`, ignoring color.
    #[inline]
    pub fn weaker_than(self, other: Piece) -> bool {
        match (self.kind(), other.kind()) {
            (Some(a), Some(b)) => a < b,
            _ => false,
        }
    }

    /// Pieces of the opposite color that are strictly stronger than `self`.
    pub fn stronger_enemies(self) -> impl Iterator<Item = Piece> {
        let (color, kind) = match (self.color(), self.kind()) {
            (Some(c), Some(k)) => (c.opposite(), k.index() + 1),
            _ => (Color::Gold, 6),
        };
        (kind.min(6)..6).map(move |k| Piece::new(color, Kind::ALL[k]))
    }

    pub const fn as_char(self) -> char {
        PIECE_CHARS[self as usize] as char
    }

    /// Parse a piece letter (`RCDHME` Gold, `rcdhme` Silver, space empty).
    pub fn from_char(c: char) -> Result<Piece, ParseError> {
        PIECE_CHARS
            .iter()
            .position(|&b| b as char == c)
            .map(|i| Piece::from_index(i))
            .ok_or(ParseError::Piece(c))
    }

    #[inline]
    fn from_index(i: usize) -> Piece {
        if i == 0 { Piece::Empty } else { Piece::ALL[i - 1] }
    }
}

impl fmt::Display for Piece {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_piece_char_roundtrip() {
        for p in Piece::ALL {
            assert_eq!(Piece::from_char(p.as_char()).unwrap(), p);
        }
        assert_eq!(Piece::from_char(' ').unwrap(), Piece::Empty);
        assert!(Piece::from_char('x').is_err());
    }

    #[test]
    fn test_color_and_kind() {
        assert_eq!(Piece::GElephant.color(), Some(Color::Gold));
        assert_eq!(Piece::SRabbit.color(), Some(Color::Silver));
        assert_eq!(Piece::SCamel.kind(), Some(Kind::Camel));
        assert_eq!(Piece::Empty.kind(), None);
        assert_eq!(Piece::new(Color::Silver, Kind::Dog), Piece::SDog);
        assert_eq!(Piece::SDog.index(), 9);
    }

    #[test]
    fn test_strength_ordering() {
        assert!(Piece::GRabbit.weaker_than(Piece::SCat));
        assert!(!Piece::GCat.weaker_than(Piece::SCat));
        assert!(!Piece::SElephant.weaker_than(Piece::GCamel));
    }

    #[test]
    fn test_stronger_enemies() {
        let v: Vec<Piece> = Piece::GHorse.stronger_enemies().collect();
        assert_eq!(v, vec![Piece::SCamel, Piece::SElephant]);
        assert_eq!(Piece::SElephant.stronger_enemies().count(), 0);
    }

    #[test]
    fn test_color_parsing_accepts_legacy_letters() {
        assert_eq!(Color::from_char('w').unwrap(), Color::Gold);
        assert_eq!(Color::from_char('b').unwrap(), Color::Silver);
        assert!(Color::from_char('x').is_err());
    }
}
