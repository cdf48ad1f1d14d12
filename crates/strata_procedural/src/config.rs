//! # Terrain Configuration
//!
//! Every tuning constant of the generator, loadable from TOML.
//!
//! Missing keys fall back to [`TerrainConfig::default`]; unknown keys are
//! rejected so a typo in a config file does not silently keep the default.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{TerrainError, TerrainResult};
use crate::noise::FractalParams;

/// Largest accepted `vertices_per_side`.
pub const MAX_VERTICES_PER_SIDE: usize = 1025;

/// Climate fields feeding the biome classifier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BiomeSettings {
    /// Frequency of the temperature field.
    pub temperature_scale: f64,
    /// Frequency of the humidity field.
    pub humidity_scale: f64,
    /// Distance from z = 0 at which the latitude contribution reaches zero.
    pub latitude_extent: f64,
    /// Frequency of the ruggedness field.
    pub ruggedness_scale: f64,
    /// Enables the Mountains override.
    pub mountains_enabled: bool,
    /// Ruggedness at or above which non-frozen ground becomes Mountains.
    pub mountain_threshold: f64,
}

impl Default for BiomeSettings {
    fn default() -> Self {
        Self {
            temperature_scale: 0.002,
            humidity_scale: 0.003,
            latitude_extent: 2000.0,
            ruggedness_scale: 0.004,
            mountains_enabled: true,
            mountain_threshold: 0.72,
        }
    }
}

/// Interior blending toward neighbour biomes and resolved borders.
///
/// Distances are normalised to the chunk edge length.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BlendSettings {
    /// Width of the band along an edge where a different neighbour biome blends in.
    pub biome_band: f64,
    /// Peak weight of a neighbour biome at the edge.
    pub biome_weight: f64,
    /// Width of the band over which an edge pulls interior heights.
    pub edge_band: f64,
    /// Radius over which a corner pulls interior heights.
    pub corner_band: f64,
    /// Peak weight of a corner relative to an edge.
    pub corner_weight: f64,
    /// Blend factor of the 3x3 smoothing pass.
    pub smoothing_blend: f64,
}

impl Default for BlendSettings {
    fn default() -> Self {
        Self {
            biome_band: 0.3,
            biome_weight: 0.5,
            edge_band: 0.4,
            corner_band: 0.3,
            corner_weight: 0.5,
            smoothing_blend: 0.5,
        }
    }
}

/// Tolerances of the border resolution protocol.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SeamSettings {
    /// Largest disagreement treated as agreement between two border values.
    pub seam_tolerance: f64,
    /// Amplitude of the seeded offset applied to a single-source corner.
    ///
    /// Must not exceed half of `seam_tolerance`.
    pub corner_offset_amplitude: f64,
    /// Amplitude of the bias added when resampling partial edges.
    pub edge_bias_amplitude: f64,
}

impl Default for SeamSettings {
    fn default() -> Self {
        Self {
            seam_tolerance: 0.25,
            corner_offset_amplitude: 0.1,
            edge_bias_amplitude: 0.1,
        }
    }
}

/// Configuration for the streaming world manager.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StreamingConfig {
    /// Radius (in chunks) kept loaded around the observer.
    pub view_radius: u32,
    /// Extra chunks beyond `view_radius` before a chunk is unloaded.
    pub unload_margin: u32,
    /// Maximum chunks generated per `update`.
    pub max_generations_per_update: usize,
    /// Worker threads used for batch generation.
    pub worker_threads: usize,
}

impl StreamingConfig {
    /// Production config: wide view, small per-frame budget.
    #[must_use]
    pub const fn production() -> Self {
        Self {
            view_radius: 8,
            unload_margin: 2,
            max_generations_per_update: 4,
            worker_threads: 4,
        }
    }

    /// Test config: tiny view radius, everything generated at once.
    #[must_use]
    pub const fn test() -> Self {
        Self {
            view_radius: 2,
            unload_margin: 1,
            max_generations_per_update: 64,
            worker_threads: 2,
        }
    }
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self::production()
    }
}

/// Complete generator configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TerrainConfig {
    /// Chunk edge length in world units.
    pub chunk_size: f64,
    /// Samples per chunk edge (shared with the neighbour).
    pub vertices_per_side: usize,
    /// Vertical scale `H` of the biome height curves.
    pub terrain_height: f64,
    /// Base terrain noise.
    pub height_noise: FractalParams,
    /// Biome classifier settings.
    pub biome: BiomeSettings,
    /// Interior blending settings.
    pub blend: BlendSettings,
    /// Border resolution tolerances.
    pub seams: SeamSettings,
    /// Elevation of the flat grid substituted when generation fails.
    pub fallback_elevation: f64,
    /// Streaming settings for [`crate::WorldManager`].
    pub streaming: StreamingConfig,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            chunk_size: 32.0,
            vertices_per_side: 33,
            terrain_height: 48.0,
            height_noise: FractalParams::default(),
            biome: BiomeSettings::default(),
            blend: BlendSettings::default(),
            seams: SeamSettings::default(),
            fallback_elevation: 0.0,
            streaming: StreamingConfig::default(),
        }
    }
}

impl TerrainConfig {
    /// Small grid for fast tests.
    #[must_use]
    pub fn test() -> Self {
        Self {
            vertices_per_side: 9,
            streaming: StreamingConfig::test(),
            ..Self::default()
        }
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` on malformed TOML, unknown keys, or values
    /// rejected by [`TerrainConfig::validate`].
    pub fn from_toml_str(source: &str) -> TerrainResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| TerrainError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> TerrainResult<Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|e| {
            TerrainError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&source)
    }

    /// Checks every value is in range.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` naming the first offending field.
    pub fn validate(&self) -> TerrainResult<()> {
        positive("chunk_size", self.chunk_size)?;
        if self.vertices_per_side < 3 || self.vertices_per_side > MAX_VERTICES_PER_SIDE {
            return Err(TerrainError::InvalidConfig(format!(
                "vertices_per_side must be in 3..={MAX_VERTICES_PER_SIDE}, got {}",
                self.vertices_per_side
            )));
        }
        non_negative("terrain_height", self.terrain_height)?;
        finite("fallback_elevation", self.fallback_elevation)?;

        let biome = &self.biome;
        positive("biome.temperature_scale", biome.temperature_scale)?;
        positive("biome.humidity_scale", biome.humidity_scale)?;
        positive("biome.latitude_extent", biome.latitude_extent)?;
        positive("biome.ruggedness_scale", biome.ruggedness_scale)?;
        unit("biome.mountain_threshold", biome.mountain_threshold)?;

        let blend = &self.blend;
        positive("blend.biome_band", blend.biome_band)?;
        positive("blend.edge_band", blend.edge_band)?;
        positive("blend.corner_band", blend.corner_band)?;
        unit("blend.biome_weight", blend.biome_weight)?;
        unit("blend.corner_weight", blend.corner_weight)?;
        unit("blend.smoothing_blend", blend.smoothing_blend)?;

        let seams = &self.seams;
        non_negative("seams.seam_tolerance", seams.seam_tolerance)?;
        non_negative("seams.corner_offset_amplitude", seams.corner_offset_amplitude)?;
        non_negative("seams.edge_bias_amplitude", seams.edge_bias_amplitude)?;
        if seams.corner_offset_amplitude > seams.seam_tolerance * 0.5 {
            return Err(TerrainError::InvalidConfig(format!(
                "seams.corner_offset_amplitude ({}) must not exceed half of seams.seam_tolerance ({})",
                seams.corner_offset_amplitude, seams.seam_tolerance
            )));
        }

        let streaming = &self.streaming;
        if streaming.max_generations_per_update == 0 {
            return Err(TerrainError::InvalidConfig(
                "streaming.max_generations_per_update must be at least 1".into(),
            ));
        }
        if streaming.worker_threads == 0 {
            return Err(TerrainError::InvalidConfig(
                "streaming.worker_threads must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn finite(name: &str, value: f64) -> TerrainResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(TerrainError::InvalidConfig(format!(
            "{name} must be finite, got {value}"
        )))
    }
}

fn positive(name: &str, value: f64) -> TerrainResult<()> {
    finite(name, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(TerrainError::InvalidConfig(format!(
            "{name} must be positive, got {value}"
        )))
    }
}

fn non_negative(name: &str, value: f64) -> TerrainResult<()> {
    finite(name, value)?;
    if value >= 0.0 {
        Ok(())
    } else {
        Err(TerrainError::InvalidConfig(format!(
            "{name} must not be negative, got {value}"
        )))
    }
}

fn unit(name: &str, value: f64) -> TerrainResult<()> {
    finite(name, value)?;
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(TerrainError::InvalidConfig(format!(
            "{name} must be in [0, 1], got {value}"
        )))
    }
}
