//! Zobrist keys.
//!
//! Keys are drawn once from a PRNG seeded with [`ZOBRIST_SEED`], so hashes
//! are identical from run to run. The table holds one key for Silver to
//! move, five for the steps-left counter (0..=4) and one per (piece code,
//! square) for the 15 codes a 4-bit piece field can name.

use std::collections::HashSet;
use std::sync::OnceLock;

use crate::constants::{MAX_STEPS, ZOBRIST_SEED};
use crate::piece::{Color, Piece};
use crate::square::Square;

const PIECE_CODES: usize = 15;
const KEY_COUNT: usize = 1 + 5 + PIECE_CODES * 64;
const STEPS_OFFSET: usize = 1;
const PIECE_OFFSET: usize = STEPS_OFFSET + 5;

static KEYS: OnceLock<Vec<u64>> = OnceLock::new();

fn keys() -> &'static [u64] {
    KEYS.get_or_init(|| {
        let mut rng = fastrand::Rng::with_seed(ZOBRIST_SEED);
        let mut seen = HashSet::with_capacity(KEY_COUNT);
        let mut keys = Vec::with_capacity(KEY_COUNT);
        while keys.len() < KEY_COUNT {
            let k = rng.u64(..);
            if k != 0 && seen.insert(k) {
                keys.push(k);
            }
        }
        keys
    })
}

/// Key toggled when Silver is to move.
#[inline]
pub fn silver_key() -> u64 {
    keys()[0]
}

/// Key for a steps-left counter. Setup counters above four share the
/// key of four.
#[inline]
pub fn steps_key(steps_left: u8) -> u64 {
    keys()[STEPS_OFFSET + steps_left.min(MAX_STEPS) as usize]
}

/// Key for `piece` standing on `sq`. `Empty` squares contribute nothing.
#[inline]
pub fn piece_key(piece: Piece, sq: Square) -> u64 {
    if piece.is_empty() {
        0
    } else {
        keys()[PIECE_OFFSET + piece.index() * 64 + sq.index()]
    }
}

/// Hash of a position computed from scratch.
pub fn hash<I>(side: Color, steps_left: u8, pieces: I) -> u64
where
    I: IntoIterator<Item = (Piece, Square)>,
{
    let mut h = steps_key(steps_left);
    if side == Color::Silver {
        h ^= silver_key();
    }
    for (piece, sq) in pieces {
        h ^= piece_key(piece, sq);
    }
    h
}
