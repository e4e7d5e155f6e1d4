//! Error types for parsing, move legality and the AEI front-end.

use thiserror::Error;

/// Malformed input: positions, squares, pieces, steps, moves and options.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("input does not match /^[wbgs] \\[[ RCDHMErcdhme]{{64}}\\]$/: {0:?}")]
    ShortPosition(String),

    #[error("invalid square: {0:?}")]
    Square(String),

    #[error("invalid piece: {0:?}")]
    Piece(char),

    #[error("invalid color: {0:?}")]
    Color(char),

    #[error("malformed step: {0:?}")]
    Step(String),

    #[error("malformed move {0:?}: {1}")]
    Move(String, Box<ParseError>),

    #[error("bad value for option {name}: {value:?}")]
    OptionValue { name: String, value: String },

    #[error("unsupported option: {0:?}")]
    UnknownOption(String),

    #[error("setoption does not match /^setoption name (\\S+) value (\\S+)$/: {0:?}")]
    SetOption(String),
}

/// A step or move that is well formed but not legal in the position.
/// The position is left unchanged when one of these is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StepError {
    #[error("no steps left this turn")]
    NoStepsLeft,

    #[error("step needs {needed} steps but only {left} remain")]
    TooFewSteps { needed: u8, left: u8 },

    #[error("expected {expected} at {square}")]
    WrongPiece { expected: char, square: String },

    #[error("destination {0} is not empty")]
    Occupied(String),

    #[error("{0} is not adjacent to {1}")]
    NotAdjacent(String, String),

    #[error("piece at {0} is frozen")]
    Frozen(String),

    #[error("rabbits may not step backward")]
    RabbitBackward,

    #[error("piece is not strong enough to push or pull")]
    TooWeak,

    #[error("a push must be completed before any other step")]
    IncompletePush,

    #[error("no stronger unfrozen piece is adjacent to push")]
    NoPusher,

    #[error("tried to start a push on the last step")]
    PushOnLastStep,

    #[error("cannot move opponent pieces during setup")]
    SetupOpponent,

    #[error("setup is only allowed on move 1")]
    NotSetup,

    #[error("setup square {0} is not on the home ranks")]
    SetupSquare(String),

    #[error("too many {0} placed")]
    SetupCount(char),

    #[error("setup steps are required on move 1")]
    SetupRequired,

    #[error("cannot pass before taking a step")]
    PassWithoutStep,

    #[error("setup move is incomplete")]
    SetupIncomplete,

    #[error("move does not change the position")]
    RecurringPosition,

    #[error("move repeats a position for the third time")]
    ThirdRepetition,

    #[error("nothing to undo")]
    EmptyUndo,

    #[error("last action was not a {0}")]
    UndoMismatch(&'static str),
}

/// Errors surfaced by the AEI command loop.
#[derive(Error, Debug)]
pub enum AeiError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("illegal: {0}")]
    Step(#[from] StepError),

    #[error("unsupported command: {0:?}")]
    UnknownCommand(String),

    #[error("{0}")]
    Usage(String),

    #[error("cannot {0} while searching")]
    Busy(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Not an error: the controller asked the engine to exit.
    #[error("quit")]
    Quit,
}

impl AeiError {
    /// Whether this is the `quit` sentinel rather than a real failure.
    pub fn is_quit(&self) -> bool {
        matches!(self, AeiError::Quit)
    }
}
