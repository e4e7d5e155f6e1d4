//! Constants for board geometry, search parameters, and table sizing.
//!
//! This module collects the tunable numbers of the engine in one place.
//! Board masks that are derived from geometry live in [`crate::bitboard`].

// =============================================================================
// Game Rules
// =============================================================================

/// Number of steps a side may take in a normal turn.
pub const MAX_STEPS: u8 = 4;

/// Number of placements in a setup move (move 1 for each side).
pub const SETUP_STEPS: u8 = 16;

/// Number of pieces each side starts with, by kind (rabbit first).
pub const PIECE_COUNTS: [u8; 6] = [8, 2, 2, 2, 1, 1];

// =============================================================================
// Zobrist Hashing
// =============================================================================

/// Seed for the Zobrist key generator. Hashes are stable across runs.
pub const ZOBRIST_SEED: u64 = 1337;

// =============================================================================
// Evaluator Interface
// =============================================================================

/// Length of a policy vector: one slot per on-board (square, direction)
/// pair, padding, and the pass slot at the end.
pub const POLICY_SIZE: usize = 232;

/// Policy slot reserved for the pass step.
pub const PASS_INDEX: usize = POLICY_SIZE - 1;

// =============================================================================
// MCTS (Monte Carlo Tree Search) Parameters
// =============================================================================

/// UCT exploration constant (sqrt 2).
pub const UCT_C: f64 = std::f64::consts::SQRT_2;

/// Multiplier applied to the value of a root-turn child that wins outright.
pub const WIN_SENTINEL: f64 = 1e9;

/// Iterations between checks of the depth and time budget.
pub const BUDGET_CHECK_PERIOD: u64 = 64;

/// Default number of search workers.
pub const DEFAULT_CONCURRENCY: usize = 1;

// =============================================================================
// Transposition Table
// =============================================================================

/// Default table size in megabytes.
pub const DEFAULT_HASH_MB: usize = 50;

/// Entries per table cluster.
pub const CLUSTER_SIZE: usize = 3;

/// Amount added to the table generation on each new search. The low three
/// bits of an entry's generation byte hold flags.
pub const GENERATION_DELTA: u8 = 8;

/// Mask selecting the generation part of an entry's generation byte.
pub const GENERATION_MASK: u8 = 0xF8;

// =============================================================================
// Setup
// =============================================================================

/// Number of random setups sampled when choosing a setup move.
pub const RANDOM_SETUP_ATTEMPTS: usize = 100;

// =============================================================================
// Time Control
// =============================================================================

/// Turn time used when no time control is configured, in milliseconds.
pub const DEFAULT_TURN_MILLIS: u64 = 5_000;

/// Safety margin subtracted from every time budget, in milliseconds.
pub const TIME_MARGIN_MILLIS: u64 = 250;

/// Number of turns the reserve is spread across.
pub const RESERVE_HORIZON_TURNS: u32 = 20;
