//! # Seeded Value Noise
//!
//! Deterministic 2D noise built on an integer lattice hash.
//!
//! ## Why value noise on a bit-mixed lattice?
//!
//! - Every lattice value comes from integer arithmetic only, so the result
//!   does not depend on the platform's `sin`/`cos`
//! - Bilinear interpolation with a smoothstep curve is C1-continuous across
//!   lattice cells
//! - The output range is exact: lattice values live in [0, 1) and a convex
//!   combination of them cannot leave that interval
//!
//! ## Determinism Guarantee
//!
//! Given the same `WorldSeed` and coordinates, `noise2d` and `fractal2d`
//! return bit-identical values on any IEEE-754 platform.

use serde::{Deserialize, Serialize};

use crate::error::{TerrainError, TerrainResult};

/// World seed for deterministic generation.
///
/// All procedural generation derives from this seed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorldSeed(u64);

impl WorldSeed {
    /// Creates a new world seed.
    #[inline]
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self(seed)
    }

    /// Returns the raw seed value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Derives a sub-seed for a specific purpose (e.g., biome generation).
    ///
    /// Uses a hash function to create independent streams from one seed.
    #[inline]
    #[must_use]
    pub const fn derive(self, purpose: u64) -> Self {
        // FNV-1a style mixing
        let mut hash = self.0;
        hash ^= purpose;
        hash = hash.wrapping_mul(0x517c_c1b7_2722_0a95);
        hash ^= hash >> 32;
        Self(hash)
    }
}

impl Default for WorldSeed {
    fn default() -> Self {
        Self(0xDEAD_BEEF_CAFE_BABE)
    }
}

/// Purposes passed to [`WorldSeed::derive`] for each independent noise field.
pub(crate) mod channel {
    pub const TEMPERATURE: u64 = 1;
    pub const HUMIDITY: u64 = 2;
    pub const RUGGEDNESS: u64 = 3;
    pub const TERRAIN: u64 = 10;
    pub const DUNES: u64 = 11;
    pub const MICRO: u64 = 12;
    pub const UNDULATION: u64 = 13;
    pub const EDGE_BIAS: u64 = 20;
    pub const CORNER_OFFSET: u64 = 21;
}

/// Hashes an integer lattice point to a value in [0, 1).
///
/// Multiplicative hashing of both axes through large odd constants, then a
/// splitmix64 finaliser. The top 53 bits become the mantissa of the result.
#[inline]
#[must_use]
pub fn lattice_hash(ix: i64, iy: i64, seed: WorldSeed) -> f64 {
    let mut h = seed.value();
    h ^= (ix as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    h = h.rotate_left(31);
    h ^= (iy as u64).wrapping_mul(0xC2B2_AE3D_27D4_EB4F);
    h ^= h >> 30;
    h = h.wrapping_mul(0xBF58_476D_1CE4_E5B9);
    h ^= h >> 27;
    h = h.wrapping_mul(0x94D0_49BB_1331_11EB);
    h ^= h >> 31;
    (h >> 11) as f64 * (1.0 / (1_u64 << 53) as f64)
}

/// Hermite easing `3t² − 2t³`.
#[inline]
#[must_use]
pub fn smoothstep(t: f64) -> f64 {
    t * t * (3.0 - 2.0 * t)
}

#[inline]
fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Samples 2D value noise.
///
/// # Returns
///
/// A value in the range [-1, 1].
#[must_use]
pub fn noise2d(seed: WorldSeed, x: f64, y: f64) -> f64 {
    let x0 = x.floor();
    let y0 = y.floor();
    let ix = x0 as i64;
    let iy = y0 as i64;

    let tx = smoothstep(x - x0);
    let ty = smoothstep(y - y0);

    let v00 = lattice_hash(ix, iy, seed);
    let v10 = lattice_hash(ix.wrapping_add(1), iy, seed);
    let v01 = lattice_hash(ix, iy.wrapping_add(1), seed);
    let v11 = lattice_hash(ix.wrapping_add(1), iy.wrapping_add(1), seed);

    let north = lerp(v00, v10, tx);
    let south = lerp(v01, v11, tx);
    (lerp(north, south, ty) * 2.0 - 1.0).clamp(-1.0, 1.0)
}

/// Upper bound on octave count; beyond this the amplitude series is noise.
pub const MAX_OCTAVES: u32 = 16;

/// Unvalidated form of [`FractalParams`], as it appears in config files.
#[derive(Clone, Copy, Debug, Deserialize)]
struct RawFractalParams {
    octaves: u32,
    persistence: f64,
    lacunarity: f64,
    #[serde(default = "default_base_frequency")]
    base_frequency: f64,
}

const fn default_base_frequency() -> f64 {
    1.0
}

/// Validated parameters for fractal (octave) noise.
///
/// Can only be constructed through [`FractalParams::new`] or deserialization,
/// both of which reject zero octaves and non-positive factors.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawFractalParams")]
pub struct FractalParams {
    octaves: u32,
    persistence: f64,
    lacunarity: f64,
    base_frequency: f64,
}

impl FractalParams {
    /// Creates validated fractal parameters.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `octaves` is 0 or above [`MAX_OCTAVES`], or
    /// if `persistence`, `lacunarity` or `base_frequency` is not a finite
    /// positive number.
    pub fn new(
        octaves: u32,
        persistence: f64,
        lacunarity: f64,
        base_frequency: f64,
    ) -> TerrainResult<Self> {
        if octaves == 0 || octaves > MAX_OCTAVES {
            return Err(TerrainError::InvalidConfig(format!(
                "octaves must be in 1..={MAX_OCTAVES}, got {octaves}"
            )));
        }
        for (name, value) in [
            ("persistence", persistence),
            ("lacunarity", lacunarity),
            ("base_frequency", base_frequency),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(TerrainError::InvalidConfig(format!(
                    "{name} must be a positive number, got {value}"
                )));
            }
        }
        Ok(Self {
            octaves,
            persistence,
            lacunarity,
            base_frequency,
        })
    }

    /// Number of octaves.
    #[inline]
    #[must_use]
    pub const fn octaves(&self) -> u32 {
        self.octaves
    }

    /// Amplitude decay per octave.
    #[inline]
    #[must_use]
    pub const fn persistence(&self) -> f64 {
        self.persistence
    }

    /// Frequency growth per octave.
    #[inline]
    #[must_use]
    pub const fn lacunarity(&self) -> f64 {
        self.lacunarity
    }

    /// Frequency of the first octave.
    #[inline]
    #[must_use]
    pub const fn base_frequency(&self) -> f64 {
        self.base_frequency
    }
}

impl Default for FractalParams {
    /// The base terrain field: 4 octaves from 0.015 cycles per unit.
    fn default() -> Self {
        Self {
            octaves: 4,
            persistence: 0.5,
            lacunarity: 2.0,
            base_frequency: 0.015,
        }
    }
}

impl TryFrom<RawFractalParams> for FractalParams {
    type Error = TerrainError;

    fn try_from(raw: RawFractalParams) -> TerrainResult<Self> {
        Self::new(raw.octaves, raw.persistence, raw.lacunarity, raw.base_frequency)
    }
}

/// Generates fractal noise by summing octaves of [`noise2d`].
///
/// Each octave samples its own derived sub-seed so the octaves do not share
/// lattice values at the origin.
///
/// # Returns
///
/// A value in the range [0, 1].
#[must_use]
pub fn fractal2d(seed: WorldSeed, x: f64, y: f64, params: &FractalParams) -> f64 {
    let mut total = 0.0;
    let mut amplitude = 1.0;
    let mut frequency = params.base_frequency;
    let mut max_amplitude = 0.0;

    for octave in 0..params.octaves {
        let octave_seed = seed.derive(u64::from(octave));
        total += noise2d(octave_seed, x * frequency, y * frequency) * amplitude;
        max_amplitude += amplitude;
        amplitude *= params.persistence;
        frequency *= params.lacunarity;
    }

    ((total / max_amplitude + 1.0) * 0.5).clamp(0.0, 1.0)
}
