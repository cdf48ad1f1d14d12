//! # STRATA Procedural Terrain
//!
//! Deterministic, seam-free height fields for infinite chunked worlds.
//!
//! ## Design Principles
//!
//! 1. **Deterministic**: Same seed always produces the same world
//! 2. **Chunked**: World is generated in fixed-size square chunks
//! 3. **Seamless**: Neighbouring chunks agree on every shared sample,
//!    whatever order they were generated in
//! 4. **Never fails**: A chunk that cannot be generated becomes a flat
//!    fallback that still lines up with its neighbours
//!
//! ## Core Components
//!
//! - `noise2d` / `fractal2d`: Seeded value noise
//! - `BiomeClassifier`: Climate-based biome lookup
//! - `HeightField`: Biome-shaped elevation
//! - `BorderCache`: Shared edges and corners between chunks
//! - `TerrainGenerator`: Resolves borders and assembles height grids
//! - `WorldManager`: Dynamic chunk loading/unloading
//!
//! ## Example
//!
//! ```rust,ignore
//! use strata_procedural::{TerrainConfig, WorldManager, WorldSeed};
//!
//! let mut manager = WorldManager::new(WorldSeed::new(12345), TerrainConfig::default())?;
//!
//! // Observer at position (100, 200)
//! manager.update(100.0, 200.0);
//! manager.flush_generation_queue();
//!
//! let ground = manager.height_at(100.0, 200.0);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod assembler;
pub mod biome;
pub mod border;
pub mod chunk;
pub mod config;
pub mod error;
pub mod generator;
pub mod height;
pub mod lifecycle;
pub mod noise;
pub mod world_manager;

pub use biome::{Biome, BiomeClassifier, NeighborBiomes};
pub use border::cache::BorderCache;
pub use border::propagate::{propagate_corner, propagate_edge, BorderData, BorderWrite};
pub use border::{BorderFeature, BorderSet};
pub use chunk::{ChunkCoord, Corner, GridLayout, GridOrigin, HeightGrid, Side};
pub use config::{BiomeSettings, BlendSettings, SeamSettings, StreamingConfig, TerrainConfig};
pub use error::{TerrainError, TerrainResult};
pub use generator::{GeneratorStats, TerrainGenerator};
pub use height::{BiomeHeightField, HeightField};
pub use noise::{fractal2d, noise2d, FractalParams, WorldSeed};
pub use world_manager::{WorldManager, WorldStats};
