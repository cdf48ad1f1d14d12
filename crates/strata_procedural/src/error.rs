//! # Terrain Error Types
//!
//! All errors that can occur while configuring or generating terrain.
//!
//! Only `InvalidConfig` ever reaches a caller of the generator. Height
//! evaluation failures are recovered per chunk with a flat fallback grid, and
//! cache inconsistencies are formatted into the log and resolved in favour of
//! the cached value.

use thiserror::Error;

use crate::border::BorderFeature;
use crate::chunk::ChunkCoord;

/// Errors that can occur in the terrain system.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TerrainError {
    /// Configuration rejected at startup (not recoverable per chunk).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A height field implementation could not produce a value.
    #[error("height evaluation failed at ({x}, {z}): {reason}")]
    HeightEvaluation {
        /// World X coordinate.
        x: f64,
        /// World Z coordinate.
        z: f64,
        /// Why the evaluation failed.
        reason: String,
    },

    /// A height evaluated to NaN or infinity.
    #[error("non-finite height {value} at ({x}, {z})")]
    NonFiniteHeight {
        /// World X coordinate.
        x: f64,
        /// World Z coordinate.
        z: f64,
        /// The offending value.
        value: f64,
    },

    /// A computed border value disagrees with the cached one.
    ///
    /// The cached value always wins; this variant exists for reporting.
    #[error("cache inconsistency at chunk {coord} {feature}: cached {cached}, computed {computed}")]
    CacheInconsistency {
        /// Chunk whose entry holds the cached value.
        coord: ChunkCoord,
        /// Which edge or corner disagreed.
        feature: BorderFeature,
        /// The value kept.
        cached: f64,
        /// The value discarded.
        computed: f64,
    },
}

/// Result type for terrain operations.
pub type TerrainResult<T> = Result<T, TerrainError>;
