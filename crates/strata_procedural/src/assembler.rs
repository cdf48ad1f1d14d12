//! # Height-Map Assembler
//!
//! Fills a chunk's grid once its borders are resolved.
//!
//! ## Passes
//!
//! 1. Border rows and columns are copied from the resolved edges
//! 2. Interior samples start at the chunk biome's height, blend toward
//!    different neighbour biomes near each edge, then toward the border
//!    values themselves
//! 3. One 3x3 box smoothing pass over the interior; borders stay fixed

use crate::biome::{Biome, NeighborBiomes};
use crate::border::resolve::ResolvedBorders;
use crate::chunk::{ChunkCoord, Corner, GridLayout, GridOrigin, HeightGrid, Side};
use crate::config::BlendSettings;
use crate::error::TerrainResult;
use crate::height::HeightField;
use crate::noise::smoothstep;

/// Builds height grids from resolved borders.
pub struct Assembler<'a, H: HeightField> {
    /// Grid geometry.
    pub layout: GridLayout,
    /// Blend weights and bands.
    pub blend: &'a BlendSettings,
    /// Elevation source for interior samples.
    pub field: &'a H,
}

impl<H: HeightField> Assembler<'_, H> {
    /// Assembles and smooths the grid of one chunk.
    ///
    /// # Arguments
    ///
    /// * `coord` - Chunk to build
    /// * `biome` - The chunk's own biome
    /// * `neighbors` - Biomes across each edge
    /// * `borders` - Resolved edges and corners
    ///
    /// # Errors
    ///
    /// Propagates the first height evaluation failure.
    pub fn assemble(
        &self,
        coord: ChunkCoord,
        biome: Biome,
        neighbors: &NeighborBiomes,
        borders: &ResolvedBorders,
    ) -> TerrainResult<HeightGrid> {
        let n = self.layout.vertices();
        let last = (n - 1) as f64;
        let mut grid = HeightGrid::flat(coord, n, 0.0, GridOrigin::Generated);

        for side in Side::ALL {
            for (k, &h) in borders.edge(side).iter().enumerate() {
                let (i, j) = side.vertex(k, n);
                grid.set(i, j, h);
            }
        }
        for corner in Corner::ALL {
            let (i, j) = corner.vertex(n);
            grid.set(i, j, borders.corner(corner));
        }

        for j in 1..n - 1 {
            for i in 1..n - 1 {
                let u = i as f64 / last;
                let v = j as f64 / last;
                let (x, z) = self.layout.world_position(coord, i, j);

                let local = self.biome_blend(x, z, u, v, biome, neighbors)?;
                grid.set(i, j, self.border_blend(local, i, j, u, v, borders));
            }
        }

        smooth_interior(&mut grid, self.blend.smoothing_blend);
        Ok(grid)
    }

    fn biome_blend(
        &self,
        x: f64,
        z: f64,
        u: f64,
        v: f64,
        biome: Biome,
        neighbors: &NeighborBiomes,
    ) -> TerrainResult<f64> {
        let mut height = self.field.height(x, z, biome)?;
        let mut weight = 1.0;
        let band = self.blend.biome_band;

        for side in Side::ALL {
            let other = neighbors.get(side);
            let d = edge_distance(side, u, v);
            if other == biome || d >= band {
                continue;
            }
            let w = self.blend.biome_weight * smoothstep(1.0 - d / band);
            height += w * self.field.height(x, z, other)?;
            weight += w;
        }
        Ok(height / weight)
    }

    fn border_blend(&self, local: f64, i: usize, j: usize, u: f64, v: f64, borders: &ResolvedBorders) -> f64 {
        let mut sum = 0.0;
        let mut total = 0.0;

        for side in Side::ALL {
            let d = edge_distance(side, u, v);
            if d >= self.blend.edge_band {
                continue;
            }
            let w = (1.0 - d / self.blend.edge_band).powi(2);
            let k = match side {
                Side::North | Side::South => i,
                Side::East | Side::West => j,
            };
            sum += w * borders.edge(side)[k];
            total += w;
        }

        for corner in Corner::ALL {
            let (cu, cv) = corner.unit_position();
            let r = (u - cu).hypot(v - cv);
            if r >= self.blend.corner_band {
                continue;
            }
            let w = self.blend.corner_weight * (1.0 - r / self.blend.corner_band).powi(2);
            sum += w * borders.corner(corner);
            total += w;
        }

        if total <= 0.0 {
            return local;
        }
        let strength = total.min(1.0);
        local * (1.0 - strength) + (sum / total) * strength
    }
}

/// Normalised distance from `(u, v)` to an edge of the unit square.
#[inline]
fn edge_distance(side: Side, u: f64, v: f64) -> f64 {
    match side {
        Side::North => v,
        Side::South => 1.0 - v,
        Side::West => u,
        Side::East => 1.0 - u,
    }
}

/// One 3x3 box smoothing pass over the interior.
///
/// `new = (1 - factor) * old + factor * mean3x3(old)`, reading only the
/// unsmoothed values. Border samples are never written.
pub fn smooth_interior(grid: &mut HeightGrid, factor: f64) {
    let n = grid.size();
    if n < 3 || factor == 0.0 {
        return;
    }
    let source = grid.clone();
    for j in 1..n - 1 {
        for i in 1..n - 1 {
            let mut sum = 0.0;
            for dj in 0..3 {
                for di in 0..3 {
                    sum += source.get(i + di - 1, j + dj - 1);
                }
            }
            let old = source.get(i, j);
            grid.set(i, j, (1.0 - factor) * old + factor * (sum / 9.0));
        }
    }
}
