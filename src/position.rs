//! Arimaa position representation and step execution.
//!
//! A [`Position`] wraps a [`Board`] with the turn state: side to move,
//! steps left, move number, the running Zobrist hash and an undo stack
//! covering the whole game history. Every mutator validates first and
//! leaves the position untouched on error.
//!
//! Steps come in two granularities. The move generator emits compound
//! pushes and pulls, while the protocol feeds elementary steps in which an
//! enemy piece moves on its own. For the latter the position tracks a
//! pending push (the next step must be a stronger friendly piece entering
//! the vacated square) and the last friendly step (an enemy stepping into
//! its source square is a pull).

use std::fmt;
use std::sync::Arc;

use crate::bitboard::{Bitboard, RABBIT_STEPS};
use crate::board::Board;
use crate::constants::{MAX_STEPS, PIECE_COUNTS, SETUP_STEPS};
use crate::error::{ParseError, StepError};
use crate::piece::{Color, Kind, Piece};
use crate::repetition::Repetitions;
use crate::square::Square;
use crate::step::{Capture, Captures, Move, Step};
use crate::zobrist;

/// The standard opening, Silver's pieces listed first.
pub const STANDARD_SHORT: &str = concat!(
    "g [",
    "rrrrrrrr",
    "hdcemcdh",
    "                                ",
    "HDCMECDH",
    "RRRRRRRR",
    "]"
);

/// A piece together with the square it left.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Pending {
    pub piece: Piece,
    pub square: Square,
}

/// Push/pull bookkeeping that a step replaces.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
struct Tracking {
    push: Option<Pending>,
    last: Option<Pending>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Undo {
    Step {
        step: Step,
        captures: Captures,
        prior: Tracking,
    },
    Pass {
        null: bool,
        counted: bool,
        steps_left: u8,
        move_num: u32,
        turn_start: u64,
        prior: Tracking,
    },
}

/// The authoritative game state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Position {
    board: Board,
    side: Color,
    steps_left: u8,
    move_num: u32,
    zhash: u64,
    /// Board hash at the start of the turn.
    turn_start: u64,
    tracking: Tracking,
    undo: Vec<Undo>,
    repetitions: Arc<Repetitions>,
}

impl Default for Position {
    fn default() -> Self {
        Self::new()
    }
}

impl Position {
    /// An empty board with Gold to set up.
    pub fn new() -> Self {
        Self::with_board(Board::new(), Color::Gold, 1, SETUP_STEPS)
    }

    /// The standard opening with Gold to make move 2.
    pub fn standard() -> Self {
        // The constant is well formed; parsing cannot fail.
        Self::from_short(STANDARD_SHORT).unwrap_or_default()
    }

    fn with_board(board: Board, side: Color, move_num: u32, steps_left: u8) -> Self {
        let zhash = zobrist::hash(side, steps_left, board.pieces());
        let mut pos = Position {
            board,
            side,
            steps_left,
            move_num,
            zhash,
            turn_start: 0,
            tracking: Tracking::default(),
            undo: Vec::new(),
            repetitions: Arc::new(Repetitions::new()),
        };
        pos.turn_start = pos.board_hash();
        pos
    }

    /// Parse `<side> [<64 chars>]`, squares listed from a8 to h1.
    ///
    /// A side with no pieces on the board is taken to be setting up
    /// (move 1, 16 placements); otherwise it is move 2 with four steps.
    pub fn from_short(s: &str) -> Result<Self, ParseError> {
        let bad = || ParseError::ShortPosition(s.to_string());
        let chars: Vec<char> = s.chars().collect();
        if chars.len() != 68 || chars[1] != ' ' || chars[2] != '[' || chars[67] != ']' {
            return Err(bad());
        }
        let side = Color::from_char(chars[0]).map_err(|_| bad())?;
        let mut board = Board::new();
        for (i, &c) in chars[3..67].iter().enumerate() {
            let piece = Piece::from_char(c).map_err(|_| bad())?;
            let sq = Square::from_coords((i % 8) as u8, 7 - (i / 8) as u8);
            board.put(piece, sq);
        }
        let (move_num, steps) = if board.presence(side).is_empty() {
            (1, SETUP_STEPS)
        } else {
            (2, MAX_STEPS)
        };
        Ok(Self::with_board(board, side, move_num, steps))
    }

    /// Format as `<side> [<64 chars>]`.
    pub fn to_short(&self) -> String {
        format!("{} [{}]", self.side, self.board.to_short())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    #[inline]
    pub fn board(&self) -> &Board {
        &self.board
    }

    #[inline]
    pub fn at(&self, sq: Square) -> Piece {
        self.board.at(sq)
    }

    #[inline]
    pub fn side(&self) -> Color {
        self.side
    }

    #[inline]
    pub fn steps_left(&self) -> u8 {
        self.steps_left
    }

    #[inline]
    pub fn move_num(&self) -> u32 {
        self.move_num
    }

    #[inline]
    pub fn zhash(&self) -> u64 {
        self.zhash
    }

    /// Hash of the pieces and side only, ignoring the steps counter.
    #[inline]
    pub fn board_hash(&self) -> u64 {
        self.zhash ^ zobrist::steps_key(self.steps_left)
    }

    /// Hash recomputed from scratch. Always equal to [`Position::zhash`].
    pub fn compute_hash(&self) -> u64 {
        zobrist::hash(self.side, self.steps_left, self.board.pieces())
    }

    #[inline]
    pub fn is_setup(&self) -> bool {
        self.move_num == 1
    }

    /// Whether no step has been taken yet this turn.
    #[inline]
    pub fn turn_fresh(&self) -> bool {
        if self.is_setup() {
            self.steps_left == SETUP_STEPS
        } else {
            self.steps_left == MAX_STEPS
        }
    }

    /// The enemy piece displaced by an unfinished push.
    #[inline]
    pub fn pending_push(&self) -> Option<Pending> {
        self.tracking.push
    }

    /// The last friendly elementary step this turn, for pull detection.
    #[inline]
    pub fn last_step(&self) -> Option<Pending> {
        self.tracking.last
    }

    #[inline]
    pub fn is_frozen(&self, sq: Square) -> bool {
        self.board.is_frozen(sq)
    }

    pub fn repetitions(&self) -> &Repetitions {
        &self.repetitions
    }

    /// Steps of the current turn, oldest first.
    pub fn turn_steps(&self) -> Vec<Step> {
        let mut steps: Vec<Step> = self
            .undo
            .iter()
            .rev()
            .map_while(|u| match *u {
                Undo::Step { step, .. } => Some(step),
                Undo::Pass { .. } => None,
            })
            .collect();
        steps.reverse();
        steps
    }

    /// The side that made the most recent step: the side to move once it
    /// has stepped, otherwise the side that just passed.
    pub fn mover(&self) -> Color {
        if self.turn_fresh() {
            self.side.opposite()
        } else {
            self.side
        }
    }

    // =========================================================================
    // Terminal
    // =========================================================================

    /// The winner, if the game is over. Never decided during setup.
    ///
    /// A rabbit on its goal rank wins; when both sides have one the mover
    /// wins. Otherwise a side without rabbits loses.
    pub fn winner(&self) -> Option<Color> {
        if self.is_setup() {
            return None;
        }
        let goal = |c: Color| {
            let rabbits = self.board.bitboard(Piece::new(c, Kind::Rabbit));
            !(rabbits & Bitboard::goal_rank(c)).is_empty()
        };
        let no_rabbits = |c: Color| self.board.bitboard(Piece::new(c, Kind::Rabbit)).is_empty();
        let mover = self.mover();
        let other = mover.opposite();
        if goal(mover) {
            Some(mover)
        } else if goal(other) {
            Some(other)
        } else if no_rabbits(other) {
            Some(mover)
        } else if no_rabbits(mover) {
            Some(other)
        } else {
            None
        }
    }

    #[inline]
    pub fn terminal(&self) -> bool {
        self.winner().is_some()
    }

    // =========================================================================
    // Legality
    // =========================================================================

    fn expect_piece(&self, piece: Piece, sq: Square) -> Result<(), StepError> {
        if self.board.at(sq) != piece || piece.is_empty() {
            return Err(StepError::WrongPiece {
                expected: piece.as_char(),
                square: sq.to_string(),
            });
        }
        Ok(())
    }

    fn expect_empty(&self, sq: Square) -> Result<(), StepError> {
        if !self.board.at(sq).is_empty() {
            return Err(StepError::Occupied(sq.to_string()));
        }
        Ok(())
    }

    fn expect_adjacent(a: Square, b: Square) -> Result<(), StepError> {
        if !a.adjacent(b) {
            return Err(StepError::NotAdjacent(a.to_string(), b.to_string()));
        }
        Ok(())
    }

    fn expect_unfrozen(&self, sq: Square) -> Result<(), StepError> {
        if self.board.is_frozen(sq) {
            return Err(StepError::Frozen(sq.to_string()));
        }
        Ok(())
    }

    fn expect_steps(&self, needed: u8) -> Result<(), StepError> {
        if self.steps_left == 0 {
            return Err(StepError::NoStepsLeft);
        }
        if self.steps_left < needed {
            return Err(StepError::TooFewSteps {
                needed,
                left: self.steps_left,
            });
        }
        Ok(())
    }

    /// Validate `step` and return the push/pull tracking that follows it.
    fn check_step(&self, step: &Step) -> Result<Tracking, StepError> {
        match *step {
            Step::Setup { piece, square } => {
                self.check_setup(piece, square)?;
                Ok(Tracking::default())
            }
            Step::Pass => self.check_pass().map(|_| Tracking::default()),
            _ if self.is_setup() => Err(StepError::SetupRequired),
            Step::Default { piece, src, dest } => self.check_default(piece, src, dest),
            Step::Push {
                pusher,
                pushed,
                src,
                dest,
                alt,
            } => {
                self.check_compound(pusher, pushed, src, alt, alt, dest)?;
                Ok(Tracking::default())
            }
            Step::Pull {
                puller,
                pulled,
                src,
                dest,
                alt,
            } => {
                self.check_compound(puller, pulled, src, dest, alt, src)?;
                Ok(Tracking::default())
            }
        }
    }

    fn check_setup(&self, piece: Piece, square: Square) -> Result<(), StepError> {
        if !self.is_setup() {
            return Err(StepError::NotSetup);
        }
        self.expect_steps(1)?;
        let Some((color, kind)) = piece.color().zip(piece.kind()) else {
            return Err(StepError::WrongPiece {
                expected: piece.as_char(),
                square: square.to_string(),
            });
        };
        if color != self.side {
            return Err(StepError::SetupOpponent);
        }
        let home = match color {
            Color::Gold => square.rank() < 2,
            Color::Silver => square.rank() > 5,
        };
        if !home {
            return Err(StepError::SetupSquare(square.to_string()));
        }
        self.expect_empty(square)?;
        if self.board.count(piece) >= PIECE_COUNTS[kind.index()] as u32 {
            return Err(StepError::SetupCount(piece.as_char()));
        }
        Ok(())
    }

    fn check_default(&self, piece: Piece, src: Square, dest: Square) -> Result<Tracking, StepError> {
        self.expect_steps(1)?;
        self.expect_piece(piece, src)?;
        Self::expect_adjacent(src, dest)?;
        self.expect_empty(dest)?;

        if piece.color() == Some(self.side) {
            self.expect_unfrozen(src)?;
            if let Some(push) = self.tracking.push {
                if dest != push.square {
                    return Err(StepError::IncompletePush);
                }
                if !push.piece.weaker_than(piece) {
                    return Err(StepError::TooWeak);
                }
                return Ok(Tracking::default());
            }
            if piece.is_rabbit() && !RABBIT_STEPS[self.side.index()][src.index()].contains(dest) {
                return Err(StepError::RabbitBackward);
            }
            return Ok(Tracking {
                push: None,
                last: Some(Pending { piece, square: src }),
            });
        }

        // Moving an enemy piece: completes a pull or starts a push.
        if self.tracking.push.is_some() {
            return Err(StepError::IncompletePush);
        }
        if let Some(last) = self.tracking.last {
            if last.square == dest && piece.weaker_than(last.piece) {
                return Ok(Tracking::default());
            }
        }
        if self.steps_left < 2 {
            return Err(StepError::PushOnLastStep);
        }
        let near = src.bitboard().neighbors() & self.board.presence(self.side);
        let pusher = near
            .squares()
            .any(|sq| piece.weaker_than(self.board.at(sq)) && !self.board.is_frozen(sq));
        if !pusher {
            return Err(StepError::NoPusher);
        }
        Ok(Tracking {
            push: Some(Pending { piece, square: src }),
            last: None,
        })
    }

    /// Shared checks for a compound push or pull. `own` moves
    /// `own_src -> own_dest`, `enemy` moves `enemy_src -> enemy_dest`.
    fn check_compound(
        &self,
        own: Piece,
        enemy: Piece,
        own_src: Square,
        own_dest: Square,
        enemy_src: Square,
        enemy_dest: Square,
    ) -> Result<(), StepError> {
        if self.tracking.push.is_some() {
            return Err(StepError::IncompletePush);
        }
        self.expect_steps(2)?;
        self.expect_piece(own, own_src)?;
        self.expect_piece(enemy, enemy_src)?;
        if own.color() != Some(self.side) || enemy.color() != Some(self.side.opposite()) {
            return Err(StepError::WrongPiece {
                expected: own.as_char(),
                square: own_src.to_string(),
            });
        }
        Self::expect_adjacent(own_src, own_dest)?;
        Self::expect_adjacent(enemy_src, enemy_dest)?;
        Self::expect_adjacent(own_src, enemy_src)?;
        if !enemy.weaker_than(own) {
            return Err(StepError::TooWeak);
        }
        self.expect_unfrozen(own_src)?;
        // The square entered first must be empty. For a push that is the
        // enemy's destination; for a pull the puller's.
        let first = if own_dest == enemy_src { enemy_dest } else { own_dest };
        self.expect_empty(first)
    }

    /// Validate ending the turn now.
    pub fn check_pass(&self) -> Result<(), StepError> {
        if self.is_setup() {
            if self.steps_left != 0 {
                return Err(StepError::SetupIncomplete);
            }
            return Ok(());
        }
        if self.steps_left >= MAX_STEPS {
            return Err(StepError::PassWithoutStep);
        }
        if self.tracking.push.is_some() {
            return Err(StepError::IncompletePush);
        }
        if self.board_hash() == self.turn_start {
            return Err(StepError::RecurringPosition);
        }
        if self.repetitions.lookup(self.hash_after_pass()) >= 2 {
            return Err(StepError::ThirdRepetition);
        }
        Ok(())
    }

    #[inline]
    pub fn can_pass(&self) -> bool {
        self.check_pass().is_ok()
    }

    /// Whether `step` is legal here.
    pub fn is_legal(&self, step: &Step) -> bool {
        match step {
            Step::Pass => self.can_pass(),
            _ => self.check_step(step).is_ok(),
        }
    }

    /// The hash the position would have after passing now.
    pub fn hash_after_pass(&self) -> u64 {
        let (_, steps) = self.next_turn();
        self.zhash
            ^ zobrist::silver_key()
            ^ zobrist::steps_key(self.steps_left)
            ^ zobrist::steps_key(steps)
    }

    fn next_turn(&self) -> (u32, u8) {
        let move_num = match self.side {
            Color::Gold => self.move_num,
            Color::Silver => self.move_num + 1,
        };
        let steps = if move_num == 1 { SETUP_STEPS } else { MAX_STEPS };
        (move_num, steps)
    }

    // =========================================================================
    // Mutators
    // =========================================================================

    fn set_steps(&mut self, steps: u8) {
        self.zhash ^= zobrist::steps_key(self.steps_left) ^ zobrist::steps_key(steps);
        self.steps_left = steps;
    }

    fn movement(&mut self, piece: Piece, from: Square, to: Square) -> Option<Capture> {
        let capture = self.board.step(piece, from, to);
        self.zhash ^= zobrist::piece_key(piece, from) ^ zobrist::piece_key(piece, to);
        if let Some(c) = capture {
            self.zhash ^= zobrist::piece_key(c.piece, c.square);
        }
        capture
    }

    fn unmovement(&mut self, piece: Piece, from: Square, to: Square, capture: Option<Capture>) {
        self.board.unstep(piece, from, to, capture);
        self.zhash ^= zobrist::piece_key(piece, from) ^ zobrist::piece_key(piece, to);
        if let Some(c) = capture {
            self.zhash ^= zobrist::piece_key(c.piece, c.square);
        }
    }

    /// Take one step, returning any captures it caused. A `Pass` step ends
    /// the turn.
    pub fn step(&mut self, step: Step) -> Result<Captures, StepError> {
        if step.is_pass() {
            self.pass()?;
            return Ok(Captures::default());
        }
        let next = self.check_step(&step)?;
        Ok(self.apply_step(step, next))
    }

    fn apply_step(&mut self, step: Step, next: Tracking) -> Captures {
        let captures = match step {
            Step::Setup { piece, square } => {
                self.board.put(piece, square);
                self.zhash ^= zobrist::piece_key(piece, square);
                Captures::default()
            }
            _ => {
                let mut caps = [None, None];
                for (i, (piece, from, to)) in step.movements().enumerate() {
                    caps[i] = self.movement(piece, from, to);
                }
                Captures::new(caps[0], caps[1])
            }
        };
        self.undo.push(Undo::Step {
            step,
            captures,
            prior: self.tracking,
        });
        self.tracking = next;
        self.set_steps(self.steps_left - step.len());
        debug_assert!(self.board.is_consistent(), "inconsistent board\n{}", self);
        captures
    }

    /// Revert the last step of the current turn.
    pub fn unstep(&mut self) -> Result<Step, StepError> {
        match self.undo.pop() {
            Some(Undo::Step {
                step,
                captures,
                prior,
            }) => {
                self.revert_step(step, captures, prior);
                Ok(step)
            }
            Some(other) => {
                self.undo.push(other);
                Err(StepError::UndoMismatch("step"))
            }
            None => Err(StepError::EmptyUndo),
        }
    }

    fn revert_step(&mut self, step: Step, captures: Captures, prior: Tracking) {
        match step {
            Step::Setup { square, .. } => {
                let piece = self.board.take(square);
                self.zhash ^= zobrist::piece_key(piece, square);
            }
            _ => {
                let moves: Vec<_> = step.movements().enumerate().collect();
                for (i, (piece, from, to)) in moves.into_iter().rev() {
                    self.unmovement(piece, from, to, captures.get(i));
                }
            }
        }
        self.tracking = prior;
        self.set_steps(self.steps_left + step.len());
    }

    /// End the turn.
    pub fn pass(&mut self) -> Result<(), StepError> {
        self.check_pass()?;
        self.apply_pass(false);
        Ok(())
    }

    /// Hand the turn to the opponent without the legality checks of a pass.
    pub fn null_move(&mut self) {
        self.apply_pass(true);
    }

    fn apply_pass(&mut self, null: bool) {
        self.undo.push(Undo::Pass {
            null,
            counted: false,
            steps_left: self.steps_left,
            move_num: self.move_num,
            turn_start: self.turn_start,
            prior: self.tracking,
        });
        let (move_num, steps) = self.next_turn();
        self.set_steps(steps);
        self.zhash ^= zobrist::silver_key();
        self.side = self.side.opposite();
        self.move_num = move_num;
        self.tracking = Tracking::default();
        self.turn_start = self.board_hash();
    }

    /// Revert the last pass or null move.
    pub fn unpass(&mut self) -> Result<(), StepError> {
        match self.undo.pop() {
            Some(Undo::Pass {
                counted,
                steps_left,
                move_num,
                turn_start,
                prior,
                ..
            }) => {
                if counted {
                    Arc::make_mut(&mut self.repetitions).decrement(self.zhash);
                }
                self.zhash ^= zobrist::silver_key();
                self.side = self.side.opposite();
                self.set_steps(steps_left);
                self.move_num = move_num;
                self.turn_start = turn_start;
                self.tracking = prior;
                Ok(())
            }
            Some(other) => {
                self.undo.push(other);
                Err(StepError::UndoMismatch("pass"))
            }
            None => Err(StepError::EmptyUndo),
        }
    }

    /// Whether the most recent action was a null move.
    pub fn last_was_null(&self) -> bool {
        matches!(self.undo.last(), Some(Undo::Pass { null: true, .. }))
    }

    /// Play a complete move: its steps, then a pass. On any error the
    /// position is rolled back and the error returned.
    pub fn make_move(&mut self, mv: &Move) -> Result<Vec<Captures>, StepError> {
        let depth = self.undo.len();
        let mut captures = Vec::with_capacity(mv.steps.len());
        let mut result = Ok(());
        for &step in mv.steps.iter().filter(|s| !s.is_pass()) {
            match self.step(step) {
                Ok(c) => captures.push(c),
                Err(e) => {
                    result = Err(e);
                    break;
                }
            }
        }
        if result.is_ok() {
            result = self.pass();
        }
        if let Err(e) = result {
            while self.undo.len() > depth {
                // Records above `depth` are steps pushed here.
                let _ = self.unstep();
            }
            return Err(e);
        }
        Arc::make_mut(&mut self.repetitions).increment(self.zhash);
        if let Some(Undo::Pass { counted, .. }) = self.undo.last_mut() {
            *counted = true;
        }
        Ok(captures)
    }

    /// Take back the last complete move and return its steps.
    pub fn unmove(&mut self) -> Result<Move, StepError> {
        self.unpass()?;
        let mut steps = Vec::new();
        while let Some(Undo::Step { .. }) = self.undo.last() {
            steps.push(self.unstep()?);
        }
        steps.reverse();
        Ok(Move::new(steps))
    }

    /// Put `piece` on the empty square `sq`, outside of the step rules.
    pub fn place(&mut self, piece: Piece, sq: Square) -> Result<(), StepError> {
        self.expect_empty(sq)?;
        if piece.is_empty() {
            return Err(StepError::WrongPiece {
                expected: piece.as_char(),
                square: sq.to_string(),
            });
        }
        self.board.put(piece, sq);
        self.zhash ^= zobrist::piece_key(piece, sq);
        Ok(())
    }

    /// Remove and return the piece on `sq`, outside of the step rules.
    pub fn remove(&mut self, sq: Square) -> Result<Piece, StepError> {
        let piece = self.board.take(sq);
        if piece.is_empty() {
            return Err(StepError::WrongPiece {
                expected: Piece::Empty.as_char(),
                square: sq.to_string(),
            });
        }
        self.zhash ^= zobrist::piece_key(piece, sq);
        Ok(piece)
    }

    /// Notation of `mv` played from here, with captures appended after the
    /// step that caused them.
    pub fn annotate(&self, mv: &Move) -> Result<String, StepError> {
        let mut pos = self.clone();
        let mut parts = Vec::new();
        for &step in mv.steps.iter().filter(|s| !s.is_pass()) {
            let captures = pos.step(step)?;
            parts.push(step.to_string());
            parts.extend(captures.iter().map(|c| c.to_string()));
        }
        Ok(parts.join(" "))
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}{} steps={} hash={:016x}",
            self.move_num, self.side, self.steps_left, self.zhash
        )?;
        write!(f, "{}", self.board)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(s: &str) -> Square {
        s.parse().unwrap()
    }

    fn short(side: char, pieces: &[(&str, char)]) -> String {
        let mut cells = [' '; 64];
        for (s, c) in pieces {
            let sq = sq(s);
            cells[(7 - sq.rank() as usize) * 8 + sq.file() as usize] = *c;
        }
        format!("{side} [{}]", cells.iter().collect::<String>())
    }

    fn pos(side: char, pieces: &[(&str, char)]) -> Position {
        Position::from_short(&short(side, pieces)).unwrap()
    }

    fn default(piece: Piece, src: &str, dest: &str) -> Step {
        Step::Default {
            piece,
            src: sq(src),
            dest: sq(dest),
        }
    }

    #[test]
    fn test_short_roundtrip() {
        let p = Position::standard();
        assert_eq!(p.to_short(), STANDARD_SHORT);
        assert_eq!(p.side(), Color::Gold);
        assert_eq!(p.steps_left(), 4);
        assert_eq!(p.move_num(), 2);
        assert_eq!(p.at(sq("d2")), Piece::GCamel);
        assert_eq!(p.at(sq("e7")), Piece::SCamel);
        assert_eq!(p.zhash(), p.compute_hash());
    }

    #[test]
    fn test_short_rejects_malformed() {
        assert!(Position::from_short("g [").is_err());
        assert!(Position::from_short(&STANDARD_SHORT.replace('R', "X")).is_err());
        assert!(Position::from_short(&STANDARD_SHORT.replacen('g', "x", 1)).is_err());
    }

    #[test]
    fn test_empty_side_is_setup() {
        let p = Position::from_short(&short('s', &[("a1", 'R')])).unwrap();
        assert!(p.is_setup());
        assert_eq!(p.steps_left(), SETUP_STEPS);
        assert!(!p.terminal());
    }

    #[test]
    fn test_step_unstep_roundtrip() {
        let mut p = pos('g', &[("d4", 'E'), ("d5", 'r'), ("a7", 'r'), ("h2", 'R')]);
        let before = p.clone();
        let step = Step::Push {
            pusher: Piece::GElephant,
            pushed: Piece::SRabbit,
            src: sq("d4"),
            dest: sq("d6"),
            alt: sq("d5"),
        };
        p.step(step).unwrap();
        assert_eq!(p.at(sq("d6")), Piece::SRabbit);
        assert_eq!(p.at(sq("d5")), Piece::GElephant);
        assert_eq!(p.steps_left(), 2);
        assert_eq!(p.zhash(), p.compute_hash());
        assert_eq!(p.unstep().unwrap(), step);
        assert_eq!(p, before);
    }

    #[test]
    fn test_pull_roundtrip() {
        let mut p = pos('g', &[("c4", 'D'), ("b4", 'c'), ("a7", 'r'), ("h2", 'R')]);
        let before = p.clone();
        let step = Step::Pull {
            puller: Piece::GDog,
            pulled: Piece::SCat,
            src: sq("c4"),
            dest: sq("d4"),
            alt: sq("b4"),
        };
        let caps = p.step(step).unwrap();
        assert!(caps.is_empty());
        assert_eq!(p.at(sq("c4")), Piece::SCat);
        assert_eq!(p.at(sq("d4")), Piece::GDog);
        p.unstep().unwrap();
        assert_eq!(p, before);
    }

    #[test]
    fn test_capture_is_restored() {
        let mut p = pos('g', &[("c4", 'C'), ("a7", 'r'), ("h2", 'R')]);
        let before = p.clone();
        let caps = p.step(default(Piece::GCat, "c4", "c3")).unwrap();
        assert_eq!(caps.len(), 1);
        assert!(p.at(sq("c3")).is_empty());
        assert_eq!(p.zhash(), p.compute_hash());
        p.unstep().unwrap();
        assert_eq!(p, before);
    }

    #[test]
    fn test_frozen_piece_cannot_step() {
        let mut p = pos('g', &[("g5", 'R'), ("g6", 'm'), ("a7", 'r')]);
        let err = p.step(default(Piece::GRabbit, "g5", "f5")).unwrap_err();
        assert_eq!(err, StepError::Frozen("g5".into()));
        assert_eq!(p.steps_left(), 4);
    }

    #[test]
    fn test_rabbit_cannot_retreat() {
        let mut p = pos('g', &[("d4", 'R'), ("a7", 'r')]);
        assert_eq!(
            p.step(default(Piece::GRabbit, "d4", "d3")).unwrap_err(),
            StepError::RabbitBackward
        );
        assert!(p.step(default(Piece::GRabbit, "d4", "e4")).is_ok());
    }

    #[test]
    fn test_elementary_push_must_be_completed() {
        let mut p = pos('g', &[("d4", 'E'), ("d5", 'r'), ("a7", 'r'), ("h2", 'R')]);
        p.step(default(Piece::SRabbit, "d5", "d6")).unwrap();
        assert!(p.pending_push().is_some());
        assert_eq!(p.check_pass(), Err(StepError::IncompletePush));
        assert_eq!(
            p.step(default(Piece::GRabbit, "h2", "h3")).unwrap_err(),
            StepError::IncompletePush
        );
        p.step(default(Piece::GElephant, "d4", "d5")).unwrap();
        assert!(p.pending_push().is_none());
        assert!(p.can_pass());
    }

    #[test]
    fn test_push_needs_two_steps() {
        let mut p = pos('g', &[("d4", 'E'), ("d5", 'r'), ("a7", 'r'), ("h2", 'R')]);
        p.step(default(Piece::GRabbit, "h2", "h3")).unwrap();
        p.step(default(Piece::GRabbit, "h3", "h4")).unwrap();
        p.step(default(Piece::GRabbit, "h4", "h5")).unwrap();
        assert_eq!(
            p.step(default(Piece::SRabbit, "d5", "d6")).unwrap_err(),
            StepError::PushOnLastStep
        );
    }

    #[test]
    fn test_elementary_pull() {
        let mut p = pos('g', &[("d4", 'E'), ("d3", 'r'), ("a7", 'r'), ("h2", 'R')]);
        p.step(default(Piece::GElephant, "d4", "e4")).unwrap();
        p.step(default(Piece::SRabbit, "d3", "d4")).unwrap();
        assert!(p.pending_push().is_none());
        assert!(p.can_pass());
    }

    #[test]
    fn test_pass_rules() {
        let mut p = pos('g', &[("d4", 'R'), ("a7", 'r')]);
        assert_eq!(p.check_pass(), Err(StepError::PassWithoutStep));
        p.step(default(Piece::GRabbit, "d4", "e4")).unwrap();
        p.step(default(Piece::GRabbit, "e4", "d4")).unwrap();
        assert_eq!(p.check_pass(), Err(StepError::RecurringPosition));
        p.step(default(Piece::GRabbit, "d4", "d5")).unwrap();
        let hash = p.zhash();
        p.pass().unwrap();
        assert_eq!(p.side(), Color::Silver);
        assert_eq!(p.steps_left(), 4);
        assert_eq!(p.move_num(), 2);
        assert_eq!(p.zhash(), p.compute_hash());
        p.unpass().unwrap();
        assert_eq!(p.zhash(), hash);
        assert_eq!(p.side(), Color::Gold);
    }

    #[test]
    fn test_move_number_advances_after_silver() {
        let mut p = pos('s', &[("d4", 'R'), ("a7", 'r')]);
        p.step(default(Piece::SRabbit, "a7", "a6")).unwrap();
        p.pass().unwrap();
        assert_eq!(p.move_num(), 3);
        assert_eq!(p.side(), Color::Gold);
    }

    #[test]
    fn test_make_move_rolls_back() {
        let mut p = pos('g', &[("d4", 'R'), ("a7", 'r')]);
        let before = p.clone();
        let mv: Move = "Rd4e Re4w".parse().unwrap();
        assert_eq!(p.make_move(&mv), Err(StepError::RecurringPosition));
        assert_eq!(p, before);
        let mv: Move = "Rd4e Rd4n".parse().unwrap();
        assert!(p.make_move(&mv).is_err());
        assert_eq!(p, before);
    }

    #[test]
    fn test_make_unmove() {
        let mut p = Position::standard();
        let before = p.clone();
        let mv: Move = "Ha2n Ha3n Db2n Db3n".parse().unwrap();
        p.make_move(&mv).unwrap();
        assert_eq!(p.repetitions().lookup(p.zhash()), 1);
        assert_eq!(p.side(), Color::Silver);
        let back = p.unmove().unwrap();
        assert_eq!(back, mv);
        assert_eq!(p, before);
    }

    #[test]
    fn test_third_repetition_forbidden() {
        let mut p = pos('g', &[("d4", 'R'), ("a7", 'r')]);
        let there_g: Move = "Rd4e".parse().unwrap();
        let back_g: Move = "Re4w".parse().unwrap();
        let there_s: Move = "ra7e".parse().unwrap();
        let back_s: Move = "rb7w".parse().unwrap();
        p.make_move(&there_g).unwrap();
        p.make_move(&there_s).unwrap();
        p.make_move(&back_g).unwrap();
        p.make_move(&back_s).unwrap();
        p.make_move(&there_g).unwrap();
        assert_eq!(p.repetitions().lookup(p.zhash()), 2);
        p.make_move(&there_s).unwrap();
        p.make_move(&back_g).unwrap();
        p.make_move(&back_s).unwrap();
        assert_eq!(p.make_move(&there_g), Err(StepError::ThirdRepetition));
    }

    #[test]
    fn test_setup_move() {
        let mut p = Position::new();
        assert!(p.is_setup());
        let gold: Move = "Ra1 Rb1 Rc1 Rd1 Re1 Rf1 Rg1 Rh1 Ca2 Cb2 Dc2 Dd2 He2 Hf2 Mg2 Eh2"
            .parse()
            .unwrap();
        p.make_move(&gold).unwrap();
        assert_eq!(p.side(), Color::Silver);
        assert_eq!(p.steps_left(), SETUP_STEPS);
        assert_eq!(p.move_num(), 1);
        let ra8 = Step::Setup {
            piece: Piece::SRabbit,
            square: sq("a8"),
        };
        p.step(ra8).unwrap();
        assert_eq!(p.step(ra8), Err(StepError::Occupied("a8".into())));
        assert_eq!(p.unstep(), Ok(ra8));
        assert_eq!(
            p.step(Step::Setup {
                piece: Piece::SRabbit,
                square: sq("a4")
            }),
            Err(StepError::SetupSquare("a4".into()))
        );
        assert_eq!(
            p.step(Step::Setup {
                piece: Piece::GRabbit,
                square: sq("a8")
            }),
            Err(StepError::SetupOpponent)
        );
        let silver: Move = "ra8 rb8 rc8 rd8 re8 rf8 rg8 rh8 ca7 cb7 dc7 dd7 he7 hf7 mg7 eh7"
            .parse()
            .unwrap();
        p.make_move(&silver).unwrap();
        assert_eq!(p.move_num(), 2);
        assert_eq!(p.steps_left(), MAX_STEPS);
        assert_eq!(p.zhash(), p.compute_hash());
    }

    #[test]
    fn test_setup_limits_piece_counts() {
        let mut p = Position::new();
        let step = |s: &str| Step::Setup {
            piece: Piece::GElephant,
            square: sq(s),
        };
        p.step(step("a1")).unwrap();
        assert_eq!(p.step(step("b1")), Err(StepError::SetupCount('E')));
        assert_eq!(p.check_pass(), Err(StepError::SetupIncomplete));
    }

    #[test]
    fn test_winner() {
        let p = pos('s', &[("d8", 'R'), ("a7", 'r')]);
        assert_eq!(p.winner(), Some(Color::Gold));
        let p = pos('g', &[("d4", 'R'), ("a7", 'c')]);
        assert_eq!(p.winner(), Some(Color::Gold));
        let p = pos('g', &[("d4", 'R'), ("a7", 'r')]);
        assert_eq!(p.winner(), None);
        // Both rabbits home: the side that just moved wins.
        let p = pos('g', &[("d8", 'R'), ("a1", 'r')]);
        assert_eq!(p.winner(), Some(Color::Silver));
    }

    #[test]
    fn test_place_remove_keep_hash() {
        let mut p = Position::standard();
        p.place(Piece::GCat, sq("d4")).unwrap();
        assert_eq!(p.zhash(), p.compute_hash());
        assert!(p.place(Piece::GCat, sq("d4")).is_err());
        assert_eq!(p.remove(sq("d4")).unwrap(), Piece::GCat);
        assert_eq!(p.zhash(), Position::standard().zhash());
        assert!(p.remove(sq("d4")).is_err());
    }

    #[test]
    fn test_annotate_lists_captures() {
        let p = pos('g', &[("c4", 'C'), ("a7", 'r'), ("h2", 'R')]);
        let mv: Move = "Cc4s".parse().unwrap();
        assert_eq!(p.annotate(&mv).unwrap(), "Cc4s Cc3x");
    }
}
