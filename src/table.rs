//! Clustered transposition table.
//!
//! The table is a fixed array of clusters of [`CLUSTER_SIZE`] entries,
//! sized in megabytes. The low 32 bits of the Zobrist hash pick the
//! cluster and the upper 16 bits identify the entry inside it. Each cluster
//! sits behind its own lock, so probes and saves from concurrent search
//! workers only contend when they hit the same cluster.
//!
//! Entries age by generation: [`Table::new_search`] bumps the generation
//! and the replacement policy prefers entries with few runs from old
//! searches.

use std::sync::atomic::{AtomicU8, Ordering};

use parking_lot::Mutex;

use crate::constants::{CLUSTER_SIZE, GENERATION_DELTA, GENERATION_MASK};

/// Flag bit in an entry's generation byte marking a principal variation
/// entry.
const PV_FLAG: u8 = 1 << 2;

/// `best` value of an entry without a recorded step.
pub const NO_BEST: u8 = u8::MAX;

/// One cached search result.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct TableEntry {
    /// Upper 16 bits of the position hash.
    pub key16: u16,
    /// Generation in the upper five bits, flags in the lower three.
    pub generation: u8,
    /// Policy index of the best step, or [`NO_BEST`].
    pub best: u8,
    /// Playouts behind `value`. Zero marks an unused slot.
    pub runs: u32,
    /// Mean value for the side to move.
    pub value: f32,
}

impl TableEntry {
    #[inline]
    pub fn is_pv(&self) -> bool {
        self.generation & PV_FLAG != 0
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.runs == 0
    }

    /// Policy index of the best step, if one was saved.
    #[inline]
    pub fn best_index(&self) -> Option<usize> {
        (self.best != NO_BEST).then_some(self.best as usize)
    }

    /// Replacement worth: runs, discounted by how many searches ago the
    /// entry was last touched. Handles the generation wrapping around.
    #[inline]
    fn worth(&self, generation: u8) -> i64 {
        let age = 263u16
            .wrapping_add(generation as u16)
            .wrapping_sub(self.generation as u16) as u8
            & GENERATION_MASK;
        self.runs as i64 - age as i64
    }
}

#[derive(Copy, Clone, Debug, Default)]
struct Cluster {
    entries: [TableEntry; CLUSTER_SIZE],
}

#[inline]
fn key16(key: u64) -> u16 {
    (key >> 48) as u16
}

pub struct Table {
    clusters: Vec<Mutex<Cluster>>,
    generation: AtomicU8,
}

impl Table {
    /// A table of roughly `mb` megabytes (at least one cluster).
    pub fn new(mb: usize) -> Self {
        let mut t = Table {
            clusters: Vec::new(),
            generation: AtomicU8::new(0),
        };
        t.resize(mb);
        t
    }

    /// Reallocate the table with `mb` megabytes, dropping all entries.
    /// Must not be called while a search is running.
    pub fn resize(&mut self, mb: usize) {
        let count = (mb * 1024 * 1024 / std::mem::size_of::<Mutex<Cluster>>()).max(1);
        self.clusters = (0..count).map(|_| Mutex::new(Cluster::default())).collect();
        self.generation.store(0, Ordering::Relaxed);
    }

    /// Forget all entries.
    pub fn clear(&self) {
        for c in &self.clusters {
            *c.lock() = Cluster::default();
        }
    }

    #[inline]
    pub fn cluster_count(&self) -> usize {
        self.clusters.len()
    }

    #[inline]
    pub fn generation(&self) -> u8 {
        self.generation.load(Ordering::Relaxed)
    }

    /// Age every entry by one search.
    pub fn new_search(&self) {
        self.generation.fetch_add(GENERATION_DELTA, Ordering::Relaxed);
    }

    #[inline]
    fn cluster(&self, key: u64) -> &Mutex<Cluster> {
        let index = ((key as u32 as u64) * self.clusters.len() as u64) >> 32;
        &self.clusters[index as usize]
    }

    /// Look up `key`, refreshing the entry's generation on a hit.
    pub fn probe(&self, key: u64) -> Option<TableEntry> {
        let k = key16(key);
        let generation = self.generation();
        let mut cluster = self.cluster(key).lock();
        cluster
            .entries
            .iter_mut()
            .find(|e| !e.is_empty() && e.key16 == k)
            .map(|e| {
                e.generation = generation | (e.generation & !GENERATION_MASK);
                *e
            })
    }

    /// Store a result for `key`.
    ///
    /// The entry for `key` is updated if present; otherwise the least
    /// valuable entry of the cluster is replaced. The best step survives
    /// unless the key changes or a new one is given. Value and runs are
    /// only overwritten for a new key or a deeper result.
    pub fn save(&self, key: u64, value: f32, pv: bool, runs: u32, best: Option<usize>) {
        let k = key16(key);
        let generation = self.generation();
        let runs = runs.max(1);
        let mut cluster = self.cluster(key).lock();
        let entries = &mut cluster.entries;

        let slot = match entries.iter().position(|e| !e.is_empty() && e.key16 == k) {
            Some(i) => i,
            None => match entries.iter().position(TableEntry::is_empty) {
                Some(i) => i,
                None => {
                    let mut victim = 0;
                    for i in 1..CLUSTER_SIZE {
                        if entries[i].worth(generation) < entries[victim].worth(generation) {
                            victim = i;
                        }
                    }
                    victim
                }
            },
        };

        let e = &mut entries[slot];
        let fresh = e.is_empty() || e.key16 != k;
        if best.is_some() || fresh {
            e.best = best.and_then(|b| u8::try_from(b).ok()).unwrap_or(NO_BEST);
        }
        if fresh || runs > e.runs {
            e.key16 = k;
            e.value = value;
            e.runs = runs;
            e.generation = if pv { generation | PV_FLAG } else { generation };
        }
    }

    /// Permille of sampled entries written during the current search.
    pub fn hashfull(&self) -> usize {
        let generation = self.generation();
        let sample = (1000 / CLUSTER_SIZE).min(self.clusters.len());
        let mut used = 0;
        for c in &self.clusters[..sample] {
            used += c
                .lock()
                .entries
                .iter()
                .filter(|e| !e.is_empty() && e.generation & GENERATION_MASK == generation)
                .count();
        }
        used * 1000 / (sample * CLUSTER_SIZE)
    }
}
