//! Step generation and root move enumeration.
//!
//! [`generate_steps`] produces pseudo-legal steps: simple steps for every
//! unfrozen friendly piece, and compound pushes and pulls when two steps
//! remain. [`legal_steps`] filters them through the position and appends
//! the pass when one is allowed. [`root_moves`] composes whole turns.

use std::collections::HashSet;

use crate::bitboard::{RABBIT_STEPS, STEPS};
use crate::constants::{MAX_STEPS, PIECE_COUNTS};
use crate::piece::{Color, Kind, Piece};
use crate::position::Position;
use crate::square::Square;
use crate::step::{Captures, Move, Step};

/// Append the pseudo-legal steps of the side to move to `out`. Pass is not
/// included.
pub fn generate_steps(pos: &Position, out: &mut Vec<Step>) {
    if pos.steps_left() == 0 {
        return;
    }
    if pos.is_setup() {
        generate_setup(pos, out);
        return;
    }
    let board = pos.board();
    let side = pos.side();

    if let Some(push) = pos.pending_push() {
        // Only the stronger pieces next to the vacated square may follow.
        let near = STEPS[push.square.index()] & board.presence(side);
        for src in near.squares() {
            let piece = board.at(src);
            if push.piece.weaker_than(piece) && !board.is_frozen(src) {
                out.push(Step::Default {
                    piece,
                    src,
                    dest: push.square,
                });
            }
        }
        return;
    }

    let empty = board.empty();
    let enemies = board.presence(side.opposite());
    let compound = pos.steps_left() >= 2;
    for src in board.presence(side).squares() {
        if board.is_frozen(src) {
            continue;
        }
        let piece = board.at(src);
        let reach = if piece.is_rabbit() {
            RABBIT_STEPS[side.index()][src.index()]
        } else {
            STEPS[src.index()]
        };
        for dest in (reach & empty).squares() {
            out.push(Step::Default { piece, src, dest });
        }
        if !compound || piece.is_rabbit() {
            continue;
        }
        for alt in (STEPS[src.index()] & enemies).squares() {
            let victim = board.at(alt);
            if !victim.weaker_than(piece) {
                continue;
            }
            for dest in (STEPS[alt.index()] & empty).squares() {
                out.push(Step::Push {
                    pusher: piece,
                    pushed: victim,
                    src,
                    dest,
                    alt,
                });
            }
            for dest in (STEPS[src.index()] & empty).squares() {
                out.push(Step::Pull {
                    puller: piece,
                    pulled: victim,
                    src,
                    dest,
                    alt,
                });
            }
        }
    }
}

/// Placements of the pieces still in hand onto empty home squares.
fn generate_setup(pos: &Position, out: &mut Vec<Step>) {
    let side = pos.side();
    let board = pos.board();
    let home: Vec<Square> = Square::all()
        .filter(|sq| match side {
            Color::Gold => sq.rank() < 2,
            Color::Silver => sq.rank() > 5,
        })
        .filter(|&sq| board.at(sq).is_empty())
        .collect();
    for kind in Kind::ALL {
        let piece = Piece::new(side, kind);
        if board.count(piece) >= PIECE_COUNTS[kind.index()] as u32 {
            continue;
        }
        out.extend(home.iter().map(|&square| Step::Setup { piece, square }));
    }
}

/// Legal steps of the side to move, followed by pass when it is allowed.
pub fn legal_steps(pos: &Position) -> Vec<Step> {
    let mut steps = Vec::with_capacity(64);
    generate_steps(pos, &mut steps);
    steps.retain(|s| pos.is_legal(s));
    if pos.can_pass() {
        steps.push(Step::Pass);
    }
    steps
}

/// Captures `step` would cause, computed on a scratch board.
pub fn step_captures(pos: &Position, step: &Step) -> Captures {
    let mut board = *pos.board();
    let mut caps = [None, None];
    for (i, (piece, from, to)) in step.movements().enumerate() {
        if board.at(from) != piece || !board.at(to).is_empty() {
            break;
        }
        caps[i] = board.step(piece, from, to);
    }
    Captures::new(caps[0], caps[1])
}

/// All distinct turns of 1 to `depth` steps from `pos`, each ending in a
/// legal pass. Turns that lead to the same position are reported once, by
/// the first sequence found. `depth` is clamped to 1..=4.
///
/// Setup positions have no enumerable turns and yield an empty list.
pub fn root_moves(pos: &Position, depth: u8) -> Vec<Move> {
    if pos.is_setup() {
        return Vec::new();
    }
    let budget = depth.clamp(1, MAX_STEPS).min(pos.steps_left());
    let mut walk = Walk {
        pos: pos.clone(),
        path: Vec::with_capacity(MAX_STEPS as usize),
        visited: HashSet::new(),
        finals: HashSet::new(),
        moves: Vec::new(),
    };
    walk.visit(budget);
    walk.moves
}

struct Walk {
    pos: Position,
    path: Vec<Step>,
    /// Intermediate hashes already expanded. The hash covers steps left.
    visited: HashSet<u64>,
    /// Post-pass hashes already reported.
    finals: HashSet<u64>,
    moves: Vec<Move>,
}

impl Walk {
    fn visit(&mut self, budget: u8) {
        if !self.path.is_empty() && self.pos.can_pass() {
            let key = self.pos.hash_after_pass();
            if self.finals.insert(key) {
                self.moves.push(Move::new(self.path.clone()));
            }
        }
        if budget == 0 || (!self.path.is_empty() && self.pos.terminal()) {
            return;
        }
        let mut steps = Vec::with_capacity(64);
        generate_steps(&self.pos, &mut steps);
        for step in steps {
            if step.len() > budget || self.pos.step(step).is_err() {
                continue;
            }
            if self.visited.insert(self.pos.zhash()) {
                self.path.push(step);
                self.visit(budget - step.len());
                self.path.pop();
            }
            let undone = self.pos.unstep();
            debug_assert!(undone.is_ok());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::STANDARD_SHORT;

    fn sq(s: &str) -> Square {
        s.parse().unwrap()
    }

    fn pos(short: &str) -> Position {
        Position::from_short(short).unwrap()
    }

    fn place(side: char, pieces: &[(&str, char)]) -> Position {
        let mut cells = [' '; 64];
        for (s, c) in pieces {
            let sq = sq(s);
            cells[(7 - sq.rank() as usize) * 8 + sq.file() as usize] = *c;
        }
        pos(&format!("{side} [{}]", cells.iter().collect::<String>()))
    }

    #[test]
    fn test_opening_steps() {
        let p = pos(STANDARD_SHORT);
        let mut steps = Vec::new();
        generate_steps(&p, &mut steps);
        // Each of the eight rank-2 pieces can step north.
        assert_eq!(steps.len(), 8);
        assert!(steps.iter().all(|s| matches!(s, Step::Default { .. })));
    }

    #[test]
    fn test_rabbits_never_retreat() {
        let p = place('g', &[("d4", 'R'), ("a7", 'r')]);
        let steps = legal_steps(&p);
        for step in steps {
            if let Step::Default { src, dest, .. } = step {
                assert!(dest.rank() >= src.rank());
            }
        }
    }

    #[test]
    fn test_frozen_piece_generates_nothing() {
        let p = place('g', &[("g5", 'R'), ("g6", 'm'), ("a7", 'r')]);
        assert!(legal_steps(&p).is_empty());
    }

    #[test]
    fn test_push_and_pull_generation() {
        let p = place('g', &[("d4", 'E'), ("d5", 'r'), ("a7", 'r'), ("h2", 'R')]);
        let mut steps = Vec::new();
        generate_steps(&p, &mut steps);
        let pushes = steps.iter().filter(|s| matches!(s, Step::Push { .. })).count();
        let pulls = steps.iter().filter(|s| matches!(s, Step::Pull { .. })).count();
        // The rabbit on d5 has three empty neighbors; the elephant has three.
        assert_eq!(pushes, 3);
        assert_eq!(pulls, 3);
        for s in &steps {
            assert!(p.is_legal(s), "{s} should be legal");
        }
    }

    #[test]
    fn test_no_compound_on_last_step() {
        let mut p = place('g', &[("d4", 'E'), ("d5", 'r'), ("a7", 'r'), ("h2", 'R')]);
        for dest in ["h3", "h4", "h5"] {
            let src = p
                .board()
                .bitboard(Piece::GRabbit)
                .first()
                .unwrap();
            p.step(Step::Default {
                piece: Piece::GRabbit,
                src,
                dest: sq(dest),
            })
            .unwrap();
        }
        let steps = legal_steps(&p);
        assert!(steps.iter().all(|s| s.len() <= 1));
        assert!(steps.contains(&Step::Pass));
    }

    #[test]
    fn test_pending_push_completions() {
        let mut p = place('g', &[("d4", 'E'), ("c5", 'C'), ("d5", 'r'), ("a7", 'r')]);
        p.step(Step::Default {
            piece: Piece::SRabbit,
            src: sq("d5"),
            dest: sq("d6"),
        })
        .unwrap();
        let steps = legal_steps(&p);
        assert_eq!(steps.len(), 2);
        assert!(steps.iter().all(|s| matches!(s, Step::Default { dest, .. } if *dest == sq("d5"))));
    }

    #[test]
    fn test_step_captures_prediction() {
        let p = place('g', &[("d4", 'D'), ("d3", 'c'), ("c3", 'r'), ("a7", 'r'), ("h2", 'R')]);
        let pull = Step::Pull {
            puller: Piece::GDog,
            pulled: Piece::SCat,
            src: sq("d4"),
            dest: sq("e4"),
            alt: sq("d3"),
        };
        // Dragging the cat away strands the rabbit on c3.
        let caps = step_captures(&p, &pull);
        assert_eq!(caps.get(0), None);
        assert_eq!(caps.get(1).map(|c| (c.piece, c.square)), Some((Piece::SRabbit, sq("c3"))));

        let step = Step::Default {
            piece: Piece::GRabbit,
            src: sq("h2"),
            dest: sq("h3"),
        };
        assert!(step_captures(&p, &step).is_empty());
    }

    #[test]
    fn test_root_moves_are_distinct() {
        let p = place('g', &[("d4", 'E'), ("d5", 'r'), ("a7", 'r'), ("h2", 'R')]);
        let moves = root_moves(&p, 4);
        assert!(!moves.is_empty());
        let mut finals = HashSet::new();
        for mv in &moves {
            assert!((1..=4).contains(&mv.len()));
            let mut q = p.clone();
            q.make_move(mv).unwrap();
            assert!(finals.insert(q.zhash()), "duplicate result for {mv}");
        }
    }

    #[test]
    fn test_root_moves_depth_one() {
        let p = place('g', &[("d4", 'R'), ("a7", 'r')]);
        let moves = root_moves(&p, 1);
        let names: HashSet<String> = moves.iter().map(|m| m.to_string()).collect();
        let expected: HashSet<String> = ["Rd4n", "Rd4e", "Rd4w"].iter().map(|s| s.to_string()).collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn test_setup_generation() {
        let p = Position::new();
        let steps = legal_steps(&p);
        assert_eq!(steps.len(), 6 * 16);
        assert!(!steps.contains(&Step::Pass));
    }
}
