//! # Biome Classification
//!
//! Determines terrain type from noise values.
//!
//! Uses a climate model based on:
//! - Temperature (from a noise channel and latitude)
//! - Humidity (from a separate noise channel, warmed by temperature)
//! - Ruggedness (a third channel that raises mountain ranges)
//!
//! Results are memoised per integer lattice point. Classification always
//! runs at the floored point, so a memo hit and a recomputation agree.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::chunk::Side;
use crate::config::BiomeSettings;
use crate::error::TerrainResult;
use crate::noise::{channel, fractal2d, FractalParams, WorldSeed};

/// Biome types in the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Biome {
    /// Plains/grassland
    Plains = 0,
    /// Forest
    Forest = 1,
    /// High mountains
    Mountains = 2,
    /// Arid desert
    Desert = 3,
    /// Snowfield
    Snow = 4,
    /// Swamp/wetland
    Swamp = 5,
}

impl Biome {
    /// All biomes, in discriminant order.
    pub const ALL: [Self; 6] = [
        Self::Plains,
        Self::Forest,
        Self::Mountains,
        Self::Desert,
        Self::Snow,
        Self::Swamp,
    ];

    /// Converts from u8.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Plains),
            1 => Some(Self::Forest),
            2 => Some(Self::Mountains),
            3 => Some(Self::Desert),
            4 => Some(Self::Snow),
            5 => Some(Self::Swamp),
            _ => None,
        }
    }
}

/// Biomes of the four edge neighbours of a chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NeighborBiomes {
    /// Chunk at `z - 1`.
    pub north: Biome,
    /// Chunk at `z + 1`.
    pub south: Biome,
    /// Chunk at `x + 1`.
    pub east: Biome,
    /// Chunk at `x - 1`.
    pub west: Biome,
}

impl NeighborBiomes {
    /// All four neighbours share one biome.
    #[must_use]
    pub const fn uniform(biome: Biome) -> Self {
        Self {
            north: biome,
            south: biome,
            east: biome,
            west: biome,
        }
    }

    /// Biome across the given edge.
    #[must_use]
    pub const fn get(&self, side: Side) -> Biome {
        match side {
            Side::North => self.north,
            Side::South => self.south,
            Side::East => self.east,
            Side::West => self.west,
        }
    }
}

/// Classifies a climate sample with the fixed threshold table.
///
/// # Arguments
///
/// * `temperature` - Normalised temperature in [0, 1]
/// * `humidity` - Normalised humidity in [0, 1]
#[must_use]
pub fn classify_climate(temperature: f64, humidity: f64) -> Biome {
    if temperature < 0.2 {
        Biome::Snow
    } else if temperature < 0.4 {
        if humidity > 0.5 {
            Biome::Forest
        } else {
            Biome::Plains
        }
    } else if temperature < 0.7 {
        if humidity >= 0.6 {
            Biome::Swamp
        } else if humidity >= 0.3 {
            Biome::Forest
        } else {
            Biome::Plains
        }
    } else if humidity >= 0.6 {
        Biome::Swamp
    } else if humidity >= 0.3 {
        Biome::Plains
    } else {
        Biome::Desert
    }
}

/// Integer lattice point used as the memo key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct BiomeKey {
    x: i64,
    z: i64,
}

/// Climate values at one point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Climate {
    /// Temperature in [0, 1].
    pub temperature: f64,
    /// Humidity in [0, 1].
    pub humidity: f64,
    /// Ruggedness in [0, 1].
    pub ruggedness: f64,
}

/// Biome classifier that determines biome from world coordinates.
///
/// Uses multiple noise channels to simulate climate. Safe to share between
/// generation workers.
pub struct BiomeClassifier {
    temperature_seed: WorldSeed,
    humidity_seed: WorldSeed,
    ruggedness_seed: WorldSeed,
    temperature_params: FractalParams,
    humidity_params: FractalParams,
    ruggedness_params: FractalParams,
    settings: BiomeSettings,
    cache: RwLock<HashMap<BiomeKey, Biome>>,
}

impl BiomeClassifier {
    /// Creates a new biome classifier from a world seed.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if a noise scale is not a positive number.
    pub fn new(seed: WorldSeed, settings: BiomeSettings) -> TerrainResult<Self> {
        Ok(Self {
            temperature_seed: seed.derive(channel::TEMPERATURE),
            humidity_seed: seed.derive(channel::HUMIDITY),
            ruggedness_seed: seed.derive(channel::RUGGEDNESS),
            temperature_params: FractalParams::new(3, 0.5, 2.0, settings.temperature_scale)?,
            humidity_params: FractalParams::new(4, 0.4, 2.0, settings.humidity_scale)?,
            ruggedness_params: FractalParams::new(3, 0.5, 2.0, settings.ruggedness_scale)?,
            settings,
            cache: RwLock::new(HashMap::new()),
        })
    }

    /// Samples the climate fields at exact world coordinates.
    #[must_use]
    pub fn climate(&self, x: f64, z: f64) -> Climate {
        let latitude = (1.0 - z.abs() / self.settings.latitude_extent).max(0.0);
        let temperature = (0.7 * fractal2d(self.temperature_seed, x, z, &self.temperature_params)
            + 0.3 * latitude)
            .clamp(0.0, 1.0);
        let humidity = (0.8 * fractal2d(self.humidity_seed, x, z, &self.humidity_params)
            + 0.2 * temperature)
            .clamp(0.0, 1.0);
        let ruggedness = fractal2d(self.ruggedness_seed, x, z, &self.ruggedness_params);
        Climate {
            temperature,
            humidity,
            ruggedness,
        }
    }

    fn classify_uncached(&self, key: BiomeKey) -> Biome {
        let climate = self.climate(key.x as f64, key.z as f64);
        if self.settings.mountains_enabled
            && climate.ruggedness >= self.settings.mountain_threshold
            && climate.temperature >= 0.2
        {
            return Biome::Mountains;
        }
        classify_climate(climate.temperature, climate.humidity)
    }

    /// Classifies the biome at world coordinates.
    ///
    /// # Arguments
    ///
    /// * `x` - World X coordinate
    /// * `z` - World Z coordinate
    ///
    /// # Returns
    ///
    /// The biome of the lattice cell containing this location.
    #[must_use]
    pub fn classify(&self, x: f64, z: f64) -> Biome {
        let key = BiomeKey {
            x: x.floor() as i64,
            z: z.floor() as i64,
        };
        if let Some(&biome) = self.cache.read().get(&key) {
            return biome;
        }
        let biome = self.classify_uncached(key);
        *self.cache.write().entry(key).or_insert(biome)
    }

    /// Number of memoised lattice points.
    #[must_use]
    pub fn cached_points(&self) -> usize {
        self.cache.read().len()
    }

    /// Drops every memoised classification.
    pub fn clear_cache(&self) {
        self.cache.write().clear();
    }
}

impl std::fmt::Debug for BiomeClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BiomeClassifier")
            .field("settings", &self.settings)
            .field("cached_points", &self.cached_points())
            .finish_non_exhaustive()
    }
}
