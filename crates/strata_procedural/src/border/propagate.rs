//! # Border Propagation
//!
//! Computes where one resolved border value must be written.
//!
//! An edge is shared by exactly two chunks; a corner by four. These
//! functions only describe the writes. [`super::cache::BorderCache`] applies
//! them.

use crate::chunk::{ChunkCoord, Corner, Side};

use super::BorderFeature;

/// Payload of a single write.
#[derive(Clone, Debug, PartialEq)]
pub enum BorderData {
    /// A full edge, in ascending world order.
    Edge {
        /// Which edge of the target chunk.
        side: Side,
        /// Edge samples.
        samples: Vec<f64>,
    },
    /// A corner height.
    Corner {
        /// Which corner of the target chunk.
        corner: Corner,
        /// Corner height.
        height: f64,
    },
}

/// One border value destined for one chunk's cache entry.
#[derive(Clone, Debug, PartialEq)]
pub struct BorderWrite {
    /// Chunk receiving the value.
    pub target: ChunkCoord,
    /// The value.
    pub data: BorderData,
}

impl BorderWrite {
    /// The edge or corner this write fills.
    #[must_use]
    pub fn feature(&self) -> BorderFeature {
        match &self.data {
            BorderData::Edge { side, .. } => BorderFeature::Edge(*side),
            BorderData::Corner { corner, .. } => BorderFeature::Corner(*corner),
        }
    }
}

/// Writes for an edge: the origin's own side and the neighbour's opposite side.
///
/// Both copies keep the same sample order.
#[must_use]
pub fn propagate_edge(origin: ChunkCoord, side: Side, samples: &[f64]) -> [BorderWrite; 2] {
    [
        BorderWrite {
            target: origin,
            data: BorderData::Edge {
                side,
                samples: samples.to_vec(),
            },
        },
        BorderWrite {
            target: origin.neighbor(side),
            data: BorderData::Edge {
                side: side.opposite(),
                samples: samples.to_vec(),
            },
        },
    ]
}

/// Writes for a corner: the origin plus the three other chunks at the lattice point.
#[must_use]
pub fn propagate_corner(origin: ChunkCoord, corner: Corner, height: f64) -> [BorderWrite; 4] {
    let [a, b, c] = corner.sharers().map(|((dx, dz), theirs)| BorderWrite {
        target: origin.offset(dx, dz),
        data: BorderData::Corner {
            corner: theirs,
            height,
        },
    });
    [
        BorderWrite {
            target: origin,
            data: BorderData::Corner { corner, height },
        },
        a,
        b,
        c,
    ]
}
