//! # Chunk Lifecycle
//!
//! Tracks which chunks are resident, which are being generated, and which
//! were unloaded and are waiting for their cache entry to become droppable.
//!
//! A cache entry is evicted only once all four edge neighbours have
//! finalized their own borders, so every shared value survives in at least
//! one neighbour's entry.
//!
//! A neighbour that is never generated (just outside a streamed strip) only
//! ever holds propagated data and never finalizes. Chunks next to it stay
//! pending and the cache grows with the distance walked along the strip.
//! [`ChunkLifecycle::pending_evictions`] exposes that backlog; a streaming
//! controller that wants it bounded calls `clear_caches` on the generator.

use std::collections::{HashMap, HashSet};

use crate::border::cache::BorderCache;
use crate::border::BorderSet;
use crate::chunk::{ChunkCoord, Side};

/// Resident snapshots, in-flight requests and pending evictions.
#[derive(Debug, Default)]
pub struct ChunkLifecycle {
    resident: HashMap<ChunkCoord, BorderSet>,
    in_flight: HashMap<ChunkCoord, u32>,
    unloaded: HashSet<ChunkCoord>,
    evictions: u64,
}

impl ChunkLifecycle {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a generation request.
    ///
    /// # Returns
    ///
    /// `true` if another request for the same chunk was already in flight.
    pub fn begin(&mut self, coord: ChunkCoord) -> bool {
        let count = self.in_flight.entry(coord).or_insert(0);
        *count += 1;
        *count > 1
    }

    /// Ends a generation request started with [`ChunkLifecycle::begin`].
    pub fn end(&mut self, coord: ChunkCoord) {
        if let Some(count) = self.in_flight.get_mut(&coord) {
            *count -= 1;
            if *count == 0 {
                self.in_flight.remove(&coord);
            }
        }
    }

    /// True while at least one request for the chunk is running.
    #[must_use]
    pub fn is_in_flight(&self, coord: ChunkCoord) -> bool {
        self.in_flight.contains_key(&coord)
    }

    /// Records the borders of a chunk just handed to a consumer.
    pub fn record_resident(&mut self, coord: ChunkCoord, borders: BorderSet) {
        self.unloaded.remove(&coord);
        self.resident.insert(coord, borders);
    }

    /// Borders of a resident chunk.
    #[must_use]
    pub fn resident(&self, coord: ChunkCoord) -> Option<&BorderSet> {
        self.resident.get(&coord)
    }

    /// Number of resident chunks.
    #[must_use]
    pub fn resident_count(&self) -> usize {
        self.resident.len()
    }

    /// Marks a chunk as unloaded by its consumer.
    pub fn notify_unloaded(&mut self, coord: ChunkCoord) {
        self.resident.remove(&coord);
        self.unloaded.insert(coord);
    }

    /// Chunks waiting for eviction.
    #[must_use]
    pub fn pending_evictions(&self) -> usize {
        self.unloaded.len()
    }

    /// Total entries evicted.
    #[must_use]
    pub const fn evictions(&self) -> u64 {
        self.evictions
    }

    /// Evicts the entries of unloaded chunks whose four neighbours are finalized.
    ///
    /// # Returns
    ///
    /// The number of entries evicted.
    pub fn sweep(&mut self, cache: &mut BorderCache) -> usize {
        let ready: Vec<ChunkCoord> = self
            .unloaded
            .iter()
            .copied()
            .filter(|&coord| {
                !self.in_flight.contains_key(&coord)
                    && Side::ALL
                        .iter()
                        .all(|&side| cache.is_finalized(coord.neighbor(side)))
            })
            .collect();

        for &coord in &ready {
            self.unloaded.remove(&coord);
            if cache.evict(coord).is_some() {
                self.evictions += 1;
                tracing::debug!("evicted border entry of chunk {}", coord);
            }
        }
        ready.len()
    }

    /// Forgets everything.
    pub fn clear(&mut self) {
        self.resident.clear();
        self.unloaded.clear();
    }
}
