//! Repetition counts of post-move positions.

use std::collections::HashMap;

/// Counts how often each position hash has occurred at the end of a move.
///
/// Counts are bumped when a move completes and dropped again when it is
/// taken back. A move that would produce a third occurrence is illegal.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Repetitions {
    counts: HashMap<u64, u32>,
}

impl Repetitions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times `key` has been recorded.
    pub fn lookup(&self, key: u64) -> u32 {
        self.counts.get(&key).copied().unwrap_or(0)
    }

    /// Record `key` and return its new count.
    pub fn increment(&mut self, key: u64) -> u32 {
        let n = self.counts.entry(key).or_insert(0);
        *n += 1;
        *n
    }

    /// Forget one occurrence of `key` and return the remaining count.
    pub fn decrement(&mut self, key: u64) -> u32 {
        match self.counts.get_mut(&key) {
            Some(n) if *n > 1 => {
                *n -= 1;
                *n
            }
            Some(_) => {
                self.counts.remove(&key);
                0
            }
            None => 0,
        }
    }

    pub fn clear(&mut self) {
        self.counts.clear();
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}
