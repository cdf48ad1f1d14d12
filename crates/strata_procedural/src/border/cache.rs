//! # Border Cache
//!
//! Process-wide store of border sets keyed by chunk coordinate.
//!
//! ## Rules
//!
//! - Entries are created on first touch (own commit or a neighbour's
//!   propagated write)
//! - A stored value is never overwritten; the cached value always wins
//! - A partial edge is replaced by a full one when it arrives
//! - A disagreement is logged as a [`TerrainError::CacheInconsistency`]

use std::collections::HashMap;

use crate::chunk::{ChunkCoord, Corner, Side};
use crate::error::TerrainError;

use super::propagate::{propagate_corner, propagate_edge, BorderData, BorderWrite};
use super::{BorderFeature, BorderSet};

/// Map from chunk coordinate to its known borders.
#[derive(Debug)]
pub struct BorderCache {
    entries: HashMap<ChunkCoord, BorderSet>,
    edge_len: usize,
    seam_tolerance: f64,
    inconsistencies: u64,
}

impl BorderCache {
    /// Creates an empty cache for edges of `edge_len` samples.
    #[must_use]
    pub fn new(edge_len: usize, seam_tolerance: f64) -> Self {
        Self {
            entries: HashMap::new(),
            edge_len,
            seam_tolerance,
            inconsistencies: 0,
        }
    }

    /// Entry for a chunk, if any value is known.
    #[inline]
    #[must_use]
    pub fn get(&self, coord: ChunkCoord) -> Option<&BorderSet> {
        self.entries.get(&coord)
    }

    /// Number of entries.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no entries exist.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of disagreements seen since creation.
    #[inline]
    #[must_use]
    pub const fn inconsistencies(&self) -> u64 {
        self.inconsistencies
    }

    /// True if the chunk committed its own borders.
    #[must_use]
    pub fn is_finalized(&self, coord: ChunkCoord) -> bool {
        self.entries.get(&coord).is_some_and(BorderSet::is_finalized)
    }

    /// Marks the chunk's own borders as committed.
    pub fn mark_finalized(&mut self, coord: ChunkCoord) {
        self.entries.entry(coord).or_default().mark_finalized();
    }

    /// Removes a chunk's entry.
    pub fn evict(&mut self, coord: ChunkCoord) -> Option<BorderSet> {
        self.entries.remove(&coord)
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Seeds an edge from an external source, possibly at another resolution.
    ///
    /// Ignored if the slot already holds data or any sample is NaN or infinite.
    ///
    /// # Returns
    ///
    /// `true` if the samples were stored.
    pub fn insert_partial_edge(&mut self, coord: ChunkCoord, side: Side, samples: Vec<f64>) -> bool {
        if let Some(bad) = samples.iter().find(|h| !h.is_finite()) {
            tracing::warn!(
                "rejected partial {} edge of chunk {}: non-finite sample {}",
                side,
                coord,
                bad
            );
            return false;
        }
        let entry = self.entries.entry(coord).or_default();
        if entry.edge(side).is_some() {
            return false;
        }
        entry.set_edge(side, samples);
        true
    }

    /// Applies one write unless the slot already holds an authoritative value.
    ///
    /// # Returns
    ///
    /// `true` if the value was stored.
    pub fn apply(&mut self, write: BorderWrite) -> bool {
        let edge_len = self.edge_len;
        let entry = self.entries.entry(write.target).or_default();
        let feature = write.feature();
        let conflict = match write.data {
            BorderData::Edge { side, samples } => match entry.full_edge(side, edge_len) {
                Some(cached) => max_difference(cached, &samples),
                None => {
                    entry.set_edge(side, samples);
                    return true;
                }
            },
            BorderData::Corner { corner, height } => match entry.corner(corner) {
                Some(cached) => Some((cached, height)),
                None => {
                    entry.set_corner(corner, height);
                    return true;
                }
            },
        };
        if let Some((cached, computed)) = conflict {
            self.report(write.target, feature, cached, computed);
        }
        false
    }

    /// The value any chunk at this lattice point already holds for the corner.
    ///
    /// Checks the chunk's own entry first, then the three sharers in order.
    #[must_use]
    pub fn authoritative_corner(&self, coord: ChunkCoord, corner: Corner) -> Option<f64> {
        let own = self
            .get(coord)
            .and_then(|set| set.corner_or_endpoint(corner, self.edge_len));
        own.or_else(|| {
            corner.sharers().into_iter().find_map(|((dx, dz), theirs)| {
                self.get(coord.offset(dx, dz))?
                    .corner_or_endpoint(theirs, self.edge_len)
            })
        })
    }

    /// The full edge either chunk sharing it already holds.
    #[must_use]
    pub fn authoritative_edge(&self, coord: ChunkCoord, side: Side) -> Option<&[f64]> {
        self.get(coord)
            .and_then(|set| set.full_edge(side, self.edge_len))
            .or_else(|| {
                self.get(coord.neighbor(side))?
                    .full_edge(side.opposite(), self.edge_len)
            })
    }

    /// Commits a corner, adopting any value already authoritative.
    ///
    /// # Returns
    ///
    /// The corner height every sharer now agrees on.
    pub fn commit_corner(&mut self, coord: ChunkCoord, corner: Corner, computed: f64) -> f64 {
        let height = match self.authoritative_corner(coord, corner) {
            Some(cached) => {
                if cached.to_bits() != computed.to_bits() {
                    self.report(coord, BorderFeature::Corner(corner), cached, computed);
                }
                cached
            }
            None => computed,
        };
        for write in propagate_corner(coord, corner, height) {
            self.apply(write);
        }
        height
    }

    /// Commits an edge, adopting any full edge already authoritative.
    ///
    /// # Returns
    ///
    /// The edge both sharers now agree on.
    pub fn commit_edge(&mut self, coord: ChunkCoord, side: Side, computed: Vec<f64>) -> Vec<f64> {
        let samples = match self.authoritative_edge(coord, side).map(<[f64]>::to_vec) {
            Some(cached) => {
                if let Some((c, v)) = max_difference(&cached, &computed) {
                    self.report(coord, BorderFeature::Edge(side), c, v);
                }
                cached
            }
            None => computed,
        };
        for write in propagate_edge(coord, side, &samples) {
            self.apply(write);
        }
        samples
    }

    fn report(&mut self, coord: ChunkCoord, feature: BorderFeature, cached: f64, computed: f64) {
        self.inconsistencies += 1;
        let err = TerrainError::CacheInconsistency {
            coord,
            feature,
            cached,
            computed,
        };
        if (cached - computed).abs() > self.seam_tolerance {
            tracing::warn!("{}", err);
        } else {
            tracing::debug!("{}", err);
        }
    }
}

/// The pair with the largest difference, if any pair differs.
fn max_difference(cached: &[f64], computed: &[f64]) -> Option<(f64, f64)> {
    if cached.len() != computed.len() {
        let c = cached.first().copied().unwrap_or(f64::NAN);
        let v = computed.first().copied().unwrap_or(f64::NAN);
        return Some((c, v));
    }
    cached
        .iter()
        .zip(computed)
        .filter(|(c, v)| c.to_bits() != v.to_bits())
        .map(|(&c, &v)| (c, v))
        .max_by(|a, b| (a.0 - a.1).abs().total_cmp(&(b.0 - b.1).abs()))
}
