//! Hand-tuned static evaluation.
//!
//! Scores are integers from the point of view of the side to move:
//! material with diminishing returns for rabbits, piece-square tables, and
//! a bonus for rabbits close to their goal. Terminal positions score
//! [`WIN`] or `-WIN`.

use std::cmp::Reverse;

use crate::bitboard::Bitboard;
use crate::movegen::step_captures;
use crate::piece::{Color, Kind, Piece};
use crate::position::Position;
use crate::square::{Direction, Square};
use crate::step::{Move, Step};

/// Score of a won position.
pub const WIN: i32 = 100_000;

/// Bonus or penalty for each piece a step sends into a trap.
pub const CAPTURE_SCORE: i32 = 1_000;

/// Value of the non-rabbit pieces by kind.
const PIECE_VALUE: [i32; 6] = [0, 200, 300, 500, 800, 1200];

/// Value of the whole rabbit force by count. Each extra rabbit is worth
/// less than the one before; losing the last one loses the game.
const RABBIT_VALUE: [i32; 9] = [-WIN, 250, 450, 600, 700, 780, 850, 910, 960];

/// Bonus for a rabbit 1, 2 or 3 ranks short of its goal.
const GOAL_THREAT: [i32; 4] = [0, 80, 40, 20];

/// Piece-square values for Gold, indexed by kind then square (a1 first).
/// Silver reads the same tables with the ranks mirrored.
#[rustfmt::skip]
const PIECE_SQUARE: [[i32; 64]; 6] = [
    [ // Rabbit
        1, 1, 1, 1, 1, 1, 1, 1,
        1, 1, 0, -5, -5, 0, 1, 1,
        1, 2, -3, -3, -3, -3, 2, 1,
        2, 1, 0, -3, -3, 0, 1, 2,
        2, 0, -3, -3, -3, -3, 0, 2,
        5, -2, -10, -5, -5, -10, -2, 5,
        10, 10, 5, 10, 10, 5, 10, 10,
        0, 0, 0, 0, 0, 0, 0, 0,
    ],
    [ // Cat
        5, 10, 10, 5, 5, 10, 10, 5,
        5, 8, 10, 5, 5, 10, 8, 5,
        0, 0, -2, 0, 0, -2, 0, 0,
        0, 0, 0, 0, 0, 0, 0, 0,
        0, 0, -8, 0, 0, -8, 0, 0,
        0, -8, -10, -8, -8, -10, -8, 0,
        0, 0, -8, 0, 0, -8, 0, 0,
        0, 0, 0, 0, 0, 0, 0, 0,
    ],
    [ // Dog
        0, 0, 0, 0, 0, 0, 0, 0,
        0, 0, 0, 0, 0, 0, 0, 0,
        0, 0, 0, 10, 10, 0, 0, 0,
        0, 0, 0, 0, 0, 0, 0, 0,
        0, 0, -8, 0, 0, -8, 0, 0,
        0, -8, -10, -8, -8, -10, -8, 0,
        0, 0, -8, 0, 0, -8, 0, 0,
        0, 0, 0, 0, 0, 0, 0, 0,
    ],
    [ // Horse
        -13, -8, -8, -8, -8, -8, -8, -13,
        -8, 0, 0, 0, 0, 0, 0, -8,
        -8, 5, 0, 0, 0, 0, 5, -8,
        -8, 5, 5, 2, 2, 5, 5, -8,
        -8, 5, 10, 2, 2, 10, 5, -8,
        -8, 5, -8, 10, 10, -8, 5, -8,
        -8, 0, 0, 0, 0, 0, 0, -8,
        -13, -8, -8, -8, -8, -8, -8, -13,
    ],
    [ // Camel
        -13, -8, -8, -8, -8, -8, -8, -13,
        -8, 0, 0, 0, 0, 0, 0, -8,
        -8, 0, 0, 5, 5, 0, 0, -8,
        -8, 0, 0, 2, 2, 0, 0, -8,
        -8, 0, 0, 2, 2, 0, 0, -8,
        -8, 5, -8, 10, 10, -8, 5, -8,
        -8, 0, 0, 0, 0, 0, 0, -8,
        -13, -8, -8, -8, -8, -8, -8, -13,
    ],
    [ // Elephant
        -22, -13, -13, -13, -13, -13, -13, -22,
        -13, 0, 0, 0, 0, 0, 0, -13,
        -13, 5, -8, 10, 10, -8, 5, -13,
        -13, 5, 10, 10, 10, 10, 5, -13,
        -13, 5, 5, 10, 10, 5, 5, -13,
        -13, 5, 0, 5, 5, 0, 5, -13,
        -13, 0, -1, 0, 0, -1, 0, -13,
        -22, -13, -13, -13, -13, -13, -13, -22,
    ],
];

/// Piece-square value of `piece` on `sq`.
#[inline]
pub fn piece_square(piece: Piece, sq: Square) -> i32 {
    match (piece.color(), piece.kind()) {
        (Some(Color::Gold), Some(kind)) => PIECE_SQUARE[kind.index()][sq.index()],
        (Some(Color::Silver), Some(kind)) => PIECE_SQUARE[kind.index()][sq.flip().index()],
        _ => 0,
    }
}

/// Number of ranks between `sq` and the goal rank of `color`.
#[inline]
fn goal_distance(color: Color, sq: Square) -> u8 {
    match color {
        Color::Gold => 7 - sq.rank(),
        Color::Silver => sq.rank(),
    }
}

/// Material, placement and goal threats of one side.
pub fn side_score(pos: &Position, color: Color) -> i32 {
    let board = pos.board();
    let mut score = 0;
    for kind in Kind::ALL {
        let piece = Piece::new(color, kind);
        let count = board.count(piece);
        score += match kind {
            Kind::Rabbit => RABBIT_VALUE[(count as usize).min(8)],
            _ => PIECE_VALUE[kind.index()] * count as i32,
        };
        for sq in board.bitboard(piece).squares() {
            score += piece_square(piece, sq);
        }
    }

    let forward = match color {
        Color::Gold => Direction::North,
        Color::Silver => Direction::South,
    };
    let rabbits = board.bitboard(Piece::new(color, Kind::Rabbit));
    for sq in rabbits.squares() {
        let d = goal_distance(color, sq) as usize;
        if d == 0 || d >= GOAL_THREAT.len() {
            continue;
        }
        let mut bonus = GOAL_THREAT[d];
        let open = sq
            .translate(forward)
            .is_some_and(|ahead| board.at(ahead).is_empty());
        if open && !board.is_frozen(sq) {
            bonus *= 2;
        }
        score += bonus;
    }
    score
}

/// Static score of `pos` for the side to move.
pub fn score(pos: &Position) -> i32 {
    let side = pos.side();
    if let Some(winner) = pos.winner() {
        return if winner == side { WIN } else { -WIN };
    }
    side_score(pos, side) - side_score(pos, side.opposite())
}

/// Quick score of a step for the side to move: captures it causes and
/// whether it puts a rabbit on the goal. Shorter goals score higher.
pub fn step_score(pos: &Position, step: &Step) -> i32 {
    let side = pos.side();
    let captures = step_captures(pos, step);
    let mut score = 0;
    for c in captures.iter() {
        if c.piece.color() == Some(side) {
            score -= CAPTURE_SCORE;
        } else {
            score += CAPTURE_SCORE;
        }
    }
    let goal = Bitboard::goal_rank(side);
    let rabbit = Piece::new(side, Kind::Rabbit);
    let scores_goal = step.movements().any(|(piece, _, to)| {
        piece == rabbit && goal.contains(to) && !captures.iter().any(|c| c.square == to)
    });
    if scores_goal {
        score = WIN - step.len() as i32;
    }
    score
}

/// Score `moves` from `pos` and sort them best first. Longer moves come
/// first among equal scores.
///
/// Each move is played on a scratch position and scored from the mover's
/// point of view. Moves that fail to apply keep `-WIN`.
pub fn order_moves(pos: &Position, moves: Vec<Move>) -> Vec<(Move, i32)> {
    let mut scratch = pos.clone();
    let mut scored: Vec<(Move, i32)> = moves
        .into_iter()
        .map(|mv| {
            let s = match scratch.make_move(&mv) {
                Ok(_) => {
                    let s = -score(&scratch);
                    let undone = scratch.unmove();
                    debug_assert!(undone.is_ok());
                    s
                }
                Err(_) => -WIN,
            };
            (mv, s)
        })
        .collect();
    scored.sort_by_key(|(mv, _)| Reverse(mv.len()));
    scored.sort_by_key(|&(_, s)| Reverse(s));
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movegen::root_moves;
    use crate::position::STANDARD_SHORT;

    fn sq(s: &str) -> Square {
        s.parse().unwrap()
    }

    fn place(side: char, pieces: &[(&str, char)]) -> Position {
        let mut cells = [' '; 64];
        for (s, c) in pieces {
            let sq = sq(s);
            cells[(7 - sq.rank() as usize) * 8 + sq.file() as usize] = *c;
        }
        Position::from_short(&format!("{side} [{}]", cells.iter().collect::<String>())).unwrap()
    }

    #[test]
    fn test_standard_position_is_balanced() {
        let p = Position::from_short(STANDARD_SHORT).unwrap();
        assert_eq!(score(&p), 0);
    }

    #[test]
    fn test_piece_square_mirrors() {
        for s in Square::all() {
            assert_eq!(
                piece_square(Piece::GHorse, s),
                piece_square(Piece::SHorse, s.flip())
            );
        }
        assert_eq!(piece_square(Piece::Empty, sq("d4")), 0);
    }

    #[test]
    fn test_material_advantage() {
        let p = place('g', &[("d4", 'E'), ("a2", 'R'), ("a7", 'r')]);
        assert!(score(&p) > 1000);
        let p = place('s', &[("d4", 'E'), ("a2", 'R'), ("a7", 'r')]);
        assert!(score(&p) < -1000);
    }

    #[test]
    fn test_terminal_scores() {
        let p = place('s', &[("d8", 'R'), ("a7", 'r')]);
        assert_eq!(score(&p), -WIN);
        let p = place('g', &[("d4", 'R'), ("a7", 'c')]);
        assert_eq!(score(&p), WIN);
    }

    #[test]
    fn test_goal_threat_bonus() {
        let near = place('g', &[("d7", 'R'), ("a8", 'r')]);
        let far = place('g', &[("d3", 'R'), ("a8", 'r')]);
        assert!(score(&near) > score(&far) + 100);
    }

    #[test]
    fn test_step_score_goal_and_capture() {
        let p = place('g', &[("g7", 'R'), ("c4", 'C'), ("a7", 'r')]);
        let goal = Step::Default {
            piece: Piece::GRabbit,
            src: sq("g7"),
            dest: sq("g8"),
        };
        assert_eq!(step_score(&p, &goal), WIN - 1);
        let suicide = Step::Default {
            piece: Piece::GCat,
            src: sq("c4"),
            dest: sq("c3"),
        };
        assert_eq!(step_score(&p, &suicide), -CAPTURE_SCORE);
        assert_eq!(step_score(&p, &Step::Pass), 0);
    }

    #[test]
    fn test_order_moves_prefers_goal() {
        let p = place('g', &[("g7", 'R'), ("a7", 'r')]);
        let ordered = order_moves(&p, root_moves(&p, 2));
        let (best, s) = &ordered[0];
        assert_eq!(*s, WIN);
        let mut q = p.clone();
        q.make_move(best).unwrap();
        assert_eq!(q.winner(), Some(Color::Gold));
        assert!(ordered.iter().any(|(m, s)| m.to_string() == "Rg7n" && *s == WIN));
    }
}
