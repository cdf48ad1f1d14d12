//! # Height Function
//!
//! Maps a world position and biome to an elevation.
//!
//! Heights are NOT continuous across biome changes; chunk borders are made
//! consistent by the border resolution protocol, not here.

use crate::biome::Biome;
use crate::config::TerrainConfig;
use crate::error::{TerrainError, TerrainResult};
use crate::noise::{channel, fractal2d, noise2d, FractalParams, WorldSeed};

/// Elevation source for chunk synthesis.
///
/// Implementations must be pure: the same `(x, z, biome)` always returns the
/// same value.
pub trait HeightField: Send + Sync {
    /// Elevation at world `(x, z)` as shaped by `biome`.
    ///
    /// # Errors
    ///
    /// Returns `HeightEvaluation` or `NonFiniteHeight` if no usable value
    /// exists at this point.
    fn height(&self, x: f64, z: f64, biome: Biome) -> TerrainResult<f64>;
}

/// Production height field: one base fractal reshaped per biome.
#[derive(Clone, Debug)]
pub struct BiomeHeightField {
    terrain_seed: WorldSeed,
    dunes_seed: WorldSeed,
    micro_seed: WorldSeed,
    undulation_seed: WorldSeed,
    base: FractalParams,
    dunes: FractalParams,
    terrain_height: f64,
}

impl BiomeHeightField {
    /// Creates the height field for a world.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the dune noise parameters are rejected.
    pub fn new(seed: WorldSeed, config: &TerrainConfig) -> TerrainResult<Self> {
        Ok(Self {
            terrain_seed: seed.derive(channel::TERRAIN),
            dunes_seed: seed.derive(channel::DUNES),
            micro_seed: seed.derive(channel::MICRO),
            undulation_seed: seed.derive(channel::UNDULATION),
            base: config.height_noise,
            dunes: FractalParams::new(2, 0.5, 2.0, 0.08)?,
            terrain_height: config.terrain_height,
        })
    }

    /// Lowest and highest value the biome curve can produce.
    ///
    /// Useful for sanity checks on generated chunks.
    #[must_use]
    pub fn range(&self, biome: Biome) -> (f64, f64) {
        let h = self.terrain_height;
        match biome {
            Biome::Mountains => (0.0, 1.8 * h),
            Biome::Plains => (0.5, 0.2 * h + 0.5),
            Biome::Forest => (1.0, 0.48 * h + 1.0),
            Biome::Desert => (0.0, 0.3 * h + 0.1 * h),
            Biome::Swamp => (0.2 - 0.15, 0.06 * h + 0.2 + 0.15),
            Biome::Snow => (2.0 - 0.04 * h, 0.45 * h + 2.0 + 0.04 * h),
        }
    }
}

impl HeightField for BiomeHeightField {
    fn height(&self, x: f64, z: f64, biome: Biome) -> TerrainResult<f64> {
        let h = self.terrain_height;
        let n = fractal2d(self.terrain_seed, x, z, &self.base);

        let value = match biome {
            Biome::Mountains => n.powf(0.8) * 1.8 * h,
            Biome::Plains => n.powf(1.5) * 0.5 * h * 0.4 + 0.5,
            Biome::Forest => n.powf(1.2) * 0.8 * h * 0.6 + 1.0,
            Biome::Desert => {
                let dunes = fractal2d(self.dunes_seed, x, z, &self.dunes);
                n.powf(1.1) * 0.6 * h * 0.5 + dunes * 0.1 * h
            }
            Biome::Swamp => {
                let micro = noise2d(self.micro_seed, x * 0.35, z * 0.35);
                n.powi(2) * 0.2 * h * 0.3 + 0.2 + micro * 0.15
            }
            Biome::Snow => {
                let undulation = noise2d(self.undulation_seed, x * 0.04, z * 0.04);
                n * 0.9 * h * 0.5 + 2.0 + undulation * 0.04 * h
            }
        };

        if value.is_finite() {
            Ok(value)
        } else {
            Err(TerrainError::NonFiniteHeight { x, z, value })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field() -> BiomeHeightField {
        BiomeHeightField::new(WorldSeed::new(2024), &TerrainConfig::default()).unwrap()
    }

    #[test]
    fn test_heights_within_biome_range() {
        let field = field();
        for biome in Biome::ALL {
            let (lo, hi) = field.range(biome);
            for i in 0..2000 {
                let x = i as f64 * 3.3 - 3000.0;
                let z = i as f64 * -1.7 + 900.0;
                let h = field.height(x, z, biome).unwrap();
                assert!(
                    h >= lo - 1e-9 && h <= hi + 1e-9,
                    "{biome:?} height {h} outside [{lo}, {hi}]"
                );
            }
        }
    }

    #[test]
    fn test_mountains_are_tallest_on_average() {
        let field = field();
        let mean = |biome: Biome| {
            (0..1000)
                .map(|i| field.height(i as f64 * 7.1, i as f64 * 2.9, biome).unwrap())
                .sum::<f64>()
                / 1000.0
        };
        let mountains = mean(Biome::Mountains);
        for biome in [Biome::Plains, Biome::Desert, Biome::Swamp, Biome::Snow, Biome::Forest] {
            assert!(mountains > mean(biome), "mountains should outrank {biome:?}");
        }
        assert!(mean(Biome::Swamp) < mean(Biome::Plains) + 1.0, "swamps stay low");
    }

    #[test]
    fn test_height_is_pure() {
        let field = field();
        for biome in Biome::ALL {
            let a = field.height(12.5, -40.25, biome).unwrap();
            let b = field.height(12.5, -40.25, biome).unwrap();
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn test_non_finite_reported() {
        let config = TerrainConfig {
            terrain_height: f64::MAX,
            ..TerrainConfig::default()
        };
        let field = BiomeHeightField::new(WorldSeed::new(1), &config).unwrap();
        let result = (0..100)
            .map(|i| field.height(i as f64 * 13.0, 0.0, Biome::Mountains))
            .find(Result::is_err);
        assert!(
            matches!(result, Some(Err(TerrainError::NonFiniteHeight { .. }))),
            "1.8 * f64::MAX overflows to infinity"
        );
    }
}
