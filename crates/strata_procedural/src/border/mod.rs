//! # Border Agreement
//!
//! Everything needed to make neighbouring chunks agree on the samples they
//! share:
//! - [`BorderSet`]: per-chunk edges and corners, possibly incomplete
//! - [`cache`]: the process-wide store of border sets
//! - [`propagate`]: fan-out of one resolved value to every chunk sharing it
//! - [`resolve`]: the precedence rules deciding each edge and corner

pub mod cache;
pub mod propagate;
pub mod resolve;

use std::fmt;

use crate::chunk::{Corner, Side};

/// One edge or corner of a chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BorderFeature {
    /// A full edge.
    Edge(Side),
    /// A single corner.
    Corner(Corner),
}

impl fmt::Display for BorderFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Edge(side) => write!(f, "{side} edge"),
            Self::Corner(corner) => write!(f, "{corner} corner"),
        }
    }
}

/// Known edges and corners of one chunk.
///
/// Edges are stored in ascending world-coordinate order. An edge may be
/// shorter or longer than `vertices_per_side` when it came from elsewhere at
/// another resolution; such an edge is partial.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BorderSet {
    edges: [Option<Vec<f64>>; 4],
    corners: [Option<f64>; 4],
    finalized: bool,
}

impl BorderSet {
    /// Edge samples, if any are known.
    #[inline]
    #[must_use]
    pub fn edge(&self, side: Side) -> Option<&[f64]> {
        self.edges[side.index()].as_deref()
    }

    /// The edge only if it has exactly `len` samples.
    #[inline]
    #[must_use]
    pub fn full_edge(&self, side: Side, len: usize) -> Option<&[f64]> {
        self.edge(side).filter(|edge| edge.len() == len)
    }

    /// Corner height, if known.
    #[inline]
    #[must_use]
    pub fn corner(&self, corner: Corner) -> Option<f64> {
        self.corners[corner.index()]
    }

    /// Corner height, or the matching endpoint of one of this chunk's full edges.
    #[must_use]
    pub fn corner_or_endpoint(&self, corner: Corner, len: usize) -> Option<f64> {
        self.corner(corner).or_else(|| {
            corner.sides().into_iter().find_map(|side| {
                let edge = self.full_edge(side, len)?;
                let (first, _) = side.endpoints();
                Some(if first == corner { edge[0] } else { edge[len - 1] })
            })
        })
    }

    /// Replaces an edge.
    #[inline]
    pub fn set_edge(&mut self, side: Side, samples: Vec<f64>) {
        self.edges[side.index()] = Some(samples);
    }

    /// Replaces a corner.
    #[inline]
    pub fn set_corner(&mut self, corner: Corner, height: f64) {
        self.corners[corner.index()] = Some(height);
    }

    /// True once the owning chunk committed its own borders.
    #[inline]
    #[must_use]
    pub const fn is_finalized(&self) -> bool {
        self.finalized
    }

    #[inline]
    pub(crate) fn mark_finalized(&mut self) {
        self.finalized = true;
    }

    /// True if no edge and no corner is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.iter().all(Option::is_none) && self.corners.iter().all(Option::is_none)
    }

    /// True if all four edges have `len` samples and all four corners are set.
    #[must_use]
    pub fn is_complete(&self, len: usize) -> bool {
        Side::ALL.iter().all(|&side| self.full_edge(side, len).is_some())
            && self.corners.iter().all(Option::is_some)
    }
}
