//! Setup move generation for move 1.
//!
//! Rather than search the huge space of placements, the engine samples
//! random arrangements of the pieces still in hand over the empty home
//! squares and keeps the one that scores best under a small setup table
//! plus the static evaluation.

use crate::board::Board;
use crate::constants::{PIECE_COUNTS, RANDOM_SETUP_ATTEMPTS};
use crate::eval;
use crate::piece::{Color, Kind, Piece};
use crate::position::Position;
use crate::square::Square;
use crate::step::{Move, Step};

/// Setup bonus by kind, home row (back rank first) and file.
#[rustfmt::skip]
const SETUP_VALUE: [[[i32; 8]; 2]; 6] = [
    [ // Rabbit
        [0, 0, 0, 0, 0, 0, 0, 0],
        [0, 0, 0, -50, -50, 0, 0, 0],
    ],
    [ // Cat
        [0, 0, 0, 5, 5, 0, 0, 0],
        [0, 0, 0, 0, 0, 0, 0, 0],
    ],
    [ // Dog
        [-20, 0, 0, 0, 0, 0, 0, -20],
        [0, 0, 0, 0, 0, 0, 0, 0],
    ],
    [ // Horse
        [-50, 0, 0, 0, 0, 0, 0, -50],
        [0, 0, 0, 0, 0, 0, 0, 0],
    ],
    [ // Camel
        [-50, -50, -50, -50, -50, -50, -50, -50],
        [0, 0, -50, 50, 50, -50, 0, 0],
    ],
    [ // Elephant
        [-50, -50, -50, -50, -50, -50, -50, -50],
        [0, 0, -50, 50, 50, -50, 0, 0],
    ],
];

/// Home row of `sq` for `color`: 0 for the back rank, 1 for the front
/// rank, `None` off the home ranks.
fn home_row(color: Color, sq: Square) -> Option<usize> {
    match (color, sq.rank()) {
        (Color::Gold, 0) | (Color::Silver, 7) => Some(0),
        (Color::Gold, 1) | (Color::Silver, 6) => Some(1),
        _ => None,
    }
}

/// Setup table score of the pieces of `color` on `board`.
pub fn setup_value(board: &Board, color: Color) -> i32 {
    board
        .pieces()
        .filter(|(piece, _)| piece.color() == Some(color))
        .filter_map(|(piece, sq)| {
            let kind = piece.kind()?;
            let row = home_row(color, sq)?;
            Some(SETUP_VALUE[kind.index()][row][sq.file() as usize])
        })
        .sum()
}

/// One random placement of the side to move's pieces in hand onto its
/// empty home squares.
pub fn random_setup(pos: &Position, rng: &mut fastrand::Rng) -> Move {
    let side = pos.side();
    let board = pos.board();
    let mut squares: Vec<Square> = Square::all()
        .filter(|&sq| home_row(side, sq).is_some() && board.at(sq).is_empty())
        .collect();
    let mut pieces: Vec<Piece> = Kind::ALL
        .iter()
        .flat_map(|&kind| {
            let piece = Piece::new(side, kind);
            let left = (PIECE_COUNTS[kind.index()] as u32).saturating_sub(board.count(piece));
            std::iter::repeat_n(piece, left as usize)
        })
        .collect();
    rng.shuffle(&mut pieces);
    rng.shuffle(&mut squares);
    let steps = pieces
        .into_iter()
        .zip(squares)
        .map(|(piece, square)| Step::Setup { piece, square })
        .collect();
    Move::new(steps)
}

/// Best of [`RANDOM_SETUP_ATTEMPTS`] random setups, or `None` if the
/// position is not in setup or no sample could be played.
pub fn best_setup(pos: &Position, rng: &mut fastrand::Rng) -> Option<Move> {
    if !pos.is_setup() {
        return None;
    }
    let side = pos.side();
    let mut scratch = pos.clone();
    let mut best: Option<(Move, i32)> = None;
    for _ in 0..RANDOM_SETUP_ATTEMPTS {
        let mv = random_setup(pos, rng);
        if scratch.make_move(&mv).is_err() {
            continue;
        }
        let score = setup_value(scratch.board(), side) + eval::side_score(&scratch, side);
        let undone = scratch.unmove();
        debug_assert!(undone.is_ok());
        if best.as_ref().is_none_or(|(_, s)| score > *s) {
            best = Some((mv, score));
        }
    }
    best.map(|(mv, _)| mv)
}
