//! Steps, captures and moves, with their text notation.
//!
//! Notation follows the usual Arimaa conventions:
//!
//! - `Ra2n` moves the Gold rabbit on a2 one square north
//! - `Ra1` places a Gold rabbit on a1 (setup only)
//! - `rc3x` records the capture of a Silver rabbit on c3
//!
//! A push is written pushed-piece first (`rd4n Ed3n`); a pull is written
//! puller first (`Ed4n rd3n`).

use std::fmt;

use crate::constants::{PASS_INDEX, POLICY_SIZE};
use crate::error::ParseError;
use crate::piece::Piece;
use crate::square::{Direction, Square};

/// One elementary action of a turn.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Step {
    /// Place `piece` on the empty `square` during move 1.
    Setup { piece: Piece, square: Square },
    /// Move `piece` from `src` to the adjacent empty `dest`.
    Default { piece: Piece, src: Square, dest: Square },
    /// The pushed piece moves `alt -> dest`, then the pusher follows
    /// `src -> alt`.
    Push {
        pusher: Piece,
        pushed: Piece,
        src: Square,
        dest: Square,
        alt: Square,
    },
    /// The puller moves `src -> dest`, then the pulled piece follows
    /// `alt -> src`.
    Pull {
        puller: Piece,
        pulled: Piece,
        src: Square,
        dest: Square,
        alt: Square,
    },
    /// End the turn.
    Pass,
}

impl Step {
    /// Number of steps this action consumes from the turn budget.
    #[inline]
    pub const fn len(&self) -> u8 {
        match self {
            Step::Setup { .. } | Step::Default { .. } => 1,
            Step::Push { .. } | Step::Pull { .. } => 2,
            Step::Pass => 0,
        }
    }

    #[inline]
    pub const fn is_pass(&self) -> bool {
        matches!(self, Step::Pass)
    }

    /// The piece that initiates the step. `Empty` for pass.
    pub const fn piece(&self) -> Piece {
        match *self {
            Step::Setup { piece, .. } | Step::Default { piece, .. } => piece,
            Step::Push { pusher, .. } => pusher,
            Step::Pull { puller, .. } => puller,
            Step::Pass => Piece::Empty,
        }
    }

    /// Elementary movements in the order they happen, as
    /// `(piece, from, to)`.
    pub fn movements(&self) -> impl Iterator<Item = (Piece, Square, Square)> {
        let (first, second) = match *self {
            Step::Default { piece, src, dest } => (Some((piece, src, dest)), None),
            Step::Push {
                pusher,
                pushed,
                src,
                dest,
                alt,
            } => (Some((pushed, alt, dest)), Some((pusher, src, alt))),
            Step::Pull {
                puller,
                pulled,
                src,
                dest,
                alt,
            } => (Some((puller, src, dest)), Some((pulled, alt, src))),
            Step::Setup { .. } | Step::Pass => (None, None),
        };
        first.into_iter().chain(second)
    }

    /// Slot of this step in a policy vector. Push and pull use the moving
    /// friendly piece; setup steps use the square index.
    pub fn policy_index(&self) -> usize {
        match *self {
            Step::Pass => PASS_INDEX,
            Step::Setup { square, .. } => square.index(),
            Step::Default { src, dest, .. } | Step::Pull { src, dest, .. } => {
                direction_index(src, dest)
            }
            Step::Push { src, alt, .. } => direction_index(src, alt),
        }
    }

    /// Parse a single step token. Capture tokens such as `rc3x` parse to
    /// `Ok(None)`: captures are implied by the position and never applied.
    pub fn parse(token: &str) -> Result<Option<Step>, ParseError> {
        let bad = || ParseError::Step(token.to_string());
        let chars: Vec<char> = token.chars().collect();
        if chars.len() != 3 && chars.len() != 4 {
            return Err(bad());
        }
        let piece = Piece::from_char(chars[0]).map_err(|_| bad())?;
        if piece.is_empty() {
            return Err(bad());
        }
        let square: Square = token
            .get(1..3)
            .ok_or_else(bad)?
            .parse()
            .map_err(|_| bad())?;
        if chars.len() == 3 {
            return Ok(Some(Step::Setup { piece, square }));
        }
        if chars[3] == 'x' {
            return Ok(None);
        }
        let dir = Direction::from_char(chars[3]).ok_or_else(bad)?;
        let dest = square.translate(dir).ok_or_else(bad)?;
        Ok(Some(Step::Default {
            piece,
            src: square,
            dest,
        }))
    }
}

fn fmt_movement(f: &mut fmt::Formatter<'_>, piece: Piece, from: Square, to: Square) -> fmt::Result {
    let dir = from.direction_to(to).map(Direction::as_char).unwrap_or('?');
    write!(f, "{piece}{from}{dir}")
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Step::Setup { piece, square } => write!(f, "{piece}{square}"),
            Step::Default { piece, src, dest } => fmt_movement(f, piece, src, dest),
            Step::Push {
                pusher,
                pushed,
                src,
                dest,
                alt,
            } => {
                fmt_movement(f, pushed, alt, dest)?;
                f.write_str(" ")?;
                fmt_movement(f, pusher, src, alt)
            }
            Step::Pull {
                puller,
                pulled,
                src,
                dest,
                alt,
            } => {
                fmt_movement(f, puller, src, dest)?;
                f.write_str(" ")?;
                fmt_movement(f, pulled, alt, src)
            }
            Step::Pass => f.write_str("pass"),
        }
    }
}

/// Compact index of the on-board `(square, direction)` pair.
fn direction_index(src: Square, dest: Square) -> usize {
    match src.direction_to(dest) {
        Some(dir) => DIRECTION_INDEX[src.index()][dir.index()] as usize,
        None => PASS_INDEX,
    }
}

/// `DIRECTION_INDEX[sq][dir]` numbers the 224 on-board step directions
/// consecutively. Off-board pairs map to the pass slot.
static DIRECTION_INDEX: [[u8; 4]; 64] = build_direction_index();

const fn build_direction_index() -> [[u8; 4]; 64] {
    let mut table = [[PASS_INDEX as u8; 4]; 64];
    let mut next = 0u8;
    let mut sq = 0;
    while sq < 64 {
        let (file, rank) = (sq % 8, sq / 8);
        // North, East, South, West.
        let on_board = [rank < 7, file < 7, rank > 0, file > 0];
        let mut d = 0;
        while d < 4 {
            if on_board[d] {
                table[sq][d] = next;
                next += 1;
            }
            d += 1;
        }
        sq += 1;
    }
    assert!((next as usize) < POLICY_SIZE);
    table
}

/// A piece lost to a trap.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Capture {
    pub piece: Piece,
    pub square: Square,
}

impl fmt::Display for Capture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}x", self.piece, self.square)
    }
}

/// Captures caused by one step, slotted by the movement that caused them.
/// A compound push or pull consists of two movements and each can cost at
/// most one piece.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Captures([Option<Capture>; 2]);

impl Captures {
    pub fn new(first: Option<Capture>, second: Option<Capture>) -> Self {
        Captures([first, second])
    }

    /// Capture caused by movement `i` (0 or 1).
    #[inline]
    pub fn get(&self, i: usize) -> Option<Capture> {
        self.0.get(i).copied().flatten()
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(Option::is_none)
    }

    pub fn len(&self) -> usize {
        self.0.iter().flatten().count()
    }

    pub fn iter(&self) -> impl Iterator<Item = Capture> + '_ {
        self.0.iter().flatten().copied()
    }
}

/// The steps of one turn. The terminating pass is implied.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Move {
    pub steps: Vec<Step>,
}

impl Move {
    pub fn new(steps: Vec<Step>) -> Move {
        Move { steps }
    }

    /// Total number of steps consumed.
    pub fn len(&self) -> usize {
        self.steps.iter().map(|s| s.len() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn is_setup(&self) -> bool {
        self.steps.iter().any(|s| matches!(s, Step::Setup { .. }))
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for step in self.steps.iter().filter(|s| !s.is_pass()) {
            if !first {
                f.write_str(" ")?;
            }
            write!(f, "{step}")?;
            first = false;
        }
        Ok(())
    }
}

impl std::str::FromStr for Move {
    type Err = ParseError;

    /// Parse a space-separated move such as `Da4n Ra3n`. Capture tokens
    /// are checked for syntax and dropped.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut steps = Vec::new();
        for token in s.split_whitespace() {
            let step =
                Step::parse(token).map_err(|e| ParseError::Move(s.to_string(), Box::new(e)))?;
            steps.extend(step);
        }
        Ok(Move { steps })
    }
}
