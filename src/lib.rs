//! Arimaa-Zoo: an Arimaa engine core.
//!
//! This crate provides the rules of Arimaa on bitboards, a Zobrist-hashed
//! position with full undo, move generation, a static evaluator, a
//! clustered transposition table and a parallel Monte Carlo Tree Search
//! (MCTS), driven through the Arimaa Engine Interface (AEI).
//!
//! ## Modules
//!
//! - [`constants`] - Rule constants and engine parameters
//! - [`square`], [`bitboard`], [`piece`] - Board geometry and pieces
//! - [`step`] - Steps, captures, moves and their notation
//! - [`zobrist`] - Position hashing
//! - [`board`] - Piece placement, freezing and traps
//! - [`position`] - Game state, legality and undo
//! - [`repetition`] - Repetition counting
//! - [`movegen`] - Step generation and root move enumeration
//! - [`eval`] - Hand-tuned static evaluation
//! - [`evaluator`] - Pluggable value/policy evaluators
//! - [`table`] - Transposition table
//! - [`mcts`] - Concurrent search tree
//! - [`setup`] - Setup move sampling
//! - [`timecontrol`] - Clock handling
//! - [`settings`] - Engine options
//! - [`engine`] - Search orchestration
//! - [`aei`] - AEI protocol front-end
//! - [`error`] - Error types
//!
//! ## Example
//!
//! ```
//! use arimaa_zoo::engine::Engine;
//! use arimaa_zoo::position::Position;
//! use arimaa_zoo::settings::Settings;
//!
//! // Start from the standard opening
//! let settings = Settings { playouts: 100, hash_mb: 1, ..Settings::default() };
//! let mut engine = Engine::new(settings);
//! engine.set_position(Position::standard());
//!
//! // Search and play the best move
//! let report = engine.search();
//! let best = report.best.unwrap();
//! println!("Best move: {}", report.notation);
//! engine.make_move(&best).unwrap();
//! ```

pub mod aei;
pub mod bitboard;
pub mod board;
pub mod constants;
pub mod engine;
pub mod error;
pub mod eval;
pub mod evaluator;
pub mod mcts;
pub mod movegen;
pub mod piece;
pub mod position;
pub mod repetition;
pub mod settings;
pub mod setup;
pub mod square;
pub mod step;
pub mod table;
pub mod timecontrol;
pub mod zobrist;
