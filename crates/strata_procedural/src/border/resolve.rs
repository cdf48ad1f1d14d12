//! # Border Resolution
//!
//! Decides the edges and corners of a chunk from what is already known,
//! without holding any lock.
//!
//! ## Precedence
//!
//! Corners, resolved first:
//! 1. Cached: the chunk's own entry (corner or full-edge endpoint)
//! 2. Neighbor: one of the three sharers
//! 3. Agreement: partial-edge endpoints within `seam_tolerance`, averaged
//! 4. Offset: a single partial-edge endpoint plus a small seeded offset
//! 5. Fresh: the height field at the exact lattice point
//!
//! Edges: own full edge, the neighbour's facing full edge, resampled partial
//! data, then fresh samples. Every edge ends on the resolved corners.

use crate::chunk::{ChunkCoord, Corner, GridLayout, Side};
use crate::config::SeamSettings;
use crate::error::{TerrainError, TerrainResult};
use crate::noise::{noise2d, WorldSeed};

use super::BorderSet;

/// Frequency applied to world positions before sampling bias noise.
const BIAS_FREQUENCY: f64 = 0.37;

/// Which rule produced a border value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Resolution {
    /// The chunk's own cache entry.
    Cached,
    /// A chunk sharing the value.
    Neighbor,
    /// Averaged partial-edge endpoints.
    Agreement,
    /// One partial-edge endpoint, offset.
    Offset,
    /// Resampled partial edge.
    Resampled,
    /// Evaluated from the height field.
    Fresh,
}

/// Copies of the 3x3 block of border sets around a chunk.
#[derive(Clone, Debug, Default)]
pub struct Neighborhood {
    views: [[BorderSet; 3]; 3],
}

impl Neighborhood {
    /// Builds a snapshot by calling `view` for every offset in `-1..=1`.
    pub fn capture(mut view: impl FnMut(i32, i32) -> Option<BorderSet>) -> Self {
        let mut hood = Self::default();
        for dz in -1..=1 {
            for dx in -1..=1 {
                if let Some(set) = view(dx, dz) {
                    hood.views[(dz + 1) as usize][(dx + 1) as usize] = set;
                }
            }
        }
        hood
    }

    /// Border set of the chunk at offset `(dx, dz)`, each in `-1..=1`.
    #[inline]
    #[must_use]
    pub fn at(&self, dx: i32, dz: i32) -> &BorderSet {
        &self.views[(dz + 1) as usize][(dx + 1) as usize]
    }

    /// Border set of the centre chunk.
    #[inline]
    #[must_use]
    pub fn own(&self) -> &BorderSet {
        self.at(0, 0)
    }

    fn across(&self, side: Side) -> &BorderSet {
        let (dx, dz) = side.offset();
        self.at(dx, dz)
    }
}

/// Outcome of resolving a chunk's borders.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedBorders {
    /// Corner heights, indexed by [`Corner::index`].
    pub corners: [f64; 4],
    /// Full edges, indexed by [`Side::index`].
    pub edges: [Vec<f64>; 4],
    /// Rule used for each corner.
    pub corner_sources: [Resolution; 4],
    /// Rule used for each edge.
    pub edge_sources: [Resolution; 4],
}

impl ResolvedBorders {
    /// Corner height.
    #[inline]
    #[must_use]
    pub fn corner(&self, corner: Corner) -> f64 {
        self.corners[corner.index()]
    }

    /// Edge samples.
    #[inline]
    #[must_use]
    pub fn edge(&self, side: Side) -> &[f64] {
        &self.edges[side.index()]
    }

    /// Moves each edge's endpoints onto its corners, spreading the shift linearly.
    pub fn pin_edges_to_corners(&mut self) {
        for side in Side::ALL {
            let (first, last) = side.endpoints();
            let start = self.corners[first.index()];
            let end = self.corners[last.index()];
            pin_to_corners(&mut self.edges[side.index()], start, end);
        }
    }
}

/// Everything resolution needs besides the snapshot.
pub struct Resolver<'a> {
    /// Grid geometry.
    pub layout: GridLayout,
    /// Tolerances and amplitudes.
    pub seams: &'a SeamSettings,
    /// Seed of the partial-edge bias noise.
    pub edge_bias_seed: WorldSeed,
    /// Seed of the single-source corner offset noise.
    pub corner_offset_seed: WorldSeed,
    /// Height at an exact world position, using the biome found there.
    pub fresh: &'a dyn Fn(f64, f64) -> TerrainResult<f64>,
}

impl Resolver<'_> {
    /// Resolves all four corners, then all four edges.
    ///
    /// # Errors
    ///
    /// Propagates the first height evaluation failure.
    pub fn resolve(&self, coord: ChunkCoord, hood: &Neighborhood) -> TerrainResult<ResolvedBorders> {
        let mut corners = [0.0; 4];
        let mut corner_sources = [Resolution::Fresh; 4];
        for corner in Corner::ALL {
            let (height, source) = self.resolve_corner(coord, corner, hood)?;
            corners[corner.index()] = height;
            corner_sources[corner.index()] = source;
        }

        let mut edges: [Vec<f64>; 4] = Default::default();
        let mut edge_sources = [Resolution::Fresh; 4];
        for side in Side::ALL {
            let (first, last) = side.endpoints();
            let (samples, source) = self.resolve_edge(
                coord,
                side,
                corners[first.index()],
                corners[last.index()],
                hood,
            )?;
            edges[side.index()] = samples;
            edge_sources[side.index()] = source;
        }

        let mut resolved = ResolvedBorders {
            corners,
            edges,
            corner_sources,
            edge_sources,
        };
        resolved.pin_edges_to_corners();
        self.ensure_finite(coord, &resolved)?;
        Ok(resolved)
    }

    /// Rejects resolved borders holding NaN or infinity.
    fn ensure_finite(&self, coord: ChunkCoord, resolved: &ResolvedBorders) -> TerrainResult<()> {
        let n = self.layout.vertices();
        for side in Side::ALL {
            for (k, &value) in resolved.edge(side).iter().enumerate() {
                if !value.is_finite() {
                    let (i, j) = side.vertex(k, n);
                    let (x, z) = self.layout.world_position(coord, i, j);
                    return Err(TerrainError::NonFiniteHeight { x, z, value });
                }
            }
        }
        for corner in Corner::ALL {
            let value = resolved.corner(corner);
            if !value.is_finite() {
                let (i, j) = corner.vertex(n);
                let (x, z) = self.layout.world_position(coord, i, j);
                return Err(TerrainError::NonFiniteHeight { x, z, value });
            }
        }
        Ok(())
    }

    fn resolve_corner(
        &self,
        coord: ChunkCoord,
        corner: Corner,
        hood: &Neighborhood,
    ) -> TerrainResult<(f64, Resolution)> {
        let n = self.layout.vertices();

        if let Some(h) = hood.own().corner_or_endpoint(corner, n) {
            return Ok((h, Resolution::Cached));
        }
        for ((dx, dz), theirs) in corner.sharers() {
            if let Some(h) = hood.at(dx, dz).corner_or_endpoint(theirs, n) {
                return Ok((h, Resolution::Neighbor));
            }
        }

        let mut partial = Vec::with_capacity(2);
        partial.extend(partial_endpoints(hood.own(), corner, n));
        for ((dx, dz), theirs) in corner.sharers() {
            partial.extend(partial_endpoints(hood.at(dx, dz), theirs, n));
        }

        let (i, j) = corner.vertex(n);
        let (x, z) = self.layout.world_position(coord, i, j);
        match partial.as_slice() {
            [] => Ok(((self.fresh)(x, z)?, Resolution::Fresh)),
            [single] => {
                let offset = self.seams.corner_offset_amplitude
                    * noise2d(self.corner_offset_seed, x * BIAS_FREQUENCY, z * BIAS_FREQUENCY);
                Ok((single + offset, Resolution::Offset))
            }
            values => {
                let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
                let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                if hi - lo <= self.seams.seam_tolerance {
                    let mean = values.iter().sum::<f64>() / values.len() as f64;
                    Ok((mean, Resolution::Agreement))
                } else {
                    Ok(((self.fresh)(x, z)?, Resolution::Fresh))
                }
            }
        }
    }

    fn resolve_edge(
        &self,
        coord: ChunkCoord,
        side: Side,
        start: f64,
        end: f64,
        hood: &Neighborhood,
    ) -> TerrainResult<(Vec<f64>, Resolution)> {
        let n = self.layout.vertices();
        let facing = side.opposite();

        if let Some(edge) = hood.own().full_edge(side, n) {
            return Ok((edge.to_vec(), Resolution::Cached));
        }
        if let Some(edge) = hood.across(side).full_edge(facing, n) {
            return Ok((edge.to_vec(), Resolution::Neighbor));
        }

        let partial = hood
            .own()
            .edge(side)
            .or_else(|| hood.across(side).edge(facing));
        if let Some(source) = partial {
            return Ok((self.resample(coord, side, source, start, end), Resolution::Resampled));
        }

        let mut samples = Vec::with_capacity(n);
        samples.push(start);
        for k in 1..n - 1 {
            let (i, j) = side.vertex(k, n);
            let (x, z) = self.layout.world_position(coord, i, j);
            samples.push((self.fresh)(x, z)?);
        }
        samples.push(end);
        Ok((samples, Resolution::Fresh))
    }

    /// Stretches `source` to a full edge ending on `start` and `end`.
    fn resample(&self, coord: ChunkCoord, side: Side, source: &[f64], start: f64, end: f64) -> Vec<f64> {
        let n = self.layout.vertices();
        let last = (n - 1) as f64;
        let mut samples: Vec<f64> = (0..n)
            .map(|k| {
                let t = k as f64 / last;
                let base = if source.len() < 2 {
                    start + (end - start) * t
                } else {
                    let pos = t * (source.len() - 1) as f64;
                    let lo = (pos.floor() as usize).min(source.len() - 2);
                    let frac = pos - lo as f64;
                    source[lo] + (source[lo + 1] - source[lo]) * frac
                };
                let (i, j) = side.vertex(k, n);
                let (x, z) = self.layout.world_position(coord, i, j);
                let bias = self.seams.edge_bias_amplitude
                    * 4.0
                    * t
                    * (1.0 - t)
                    * noise2d(self.edge_bias_seed, x * BIAS_FREQUENCY, z * BIAS_FREQUENCY);
                base + bias
            })
            .collect();
        pin_to_corners(&mut samples, start, end);
        samples
    }
}

/// Endpoints of partial (non-full) edges of `set` meeting at `corner`.
fn partial_endpoints(set: &BorderSet, corner: Corner, n: usize) -> impl Iterator<Item = f64> + '_ {
    corner.sides().into_iter().filter_map(move |side| {
        let edge = set.edge(side)?;
        if edge.len() == n {
            return None;
        }
        let (first, _) = side.endpoints();
        if first == corner {
            edge.first().copied()
        } else {
            edge.last().copied()
        }
    })
}

/// Shifts `samples` linearly so the first equals `start` and the last `end`.
///
/// Endpoints are assigned exactly rather than by the correction arithmetic.
pub fn pin_to_corners(samples: &mut [f64], start: f64, end: f64) {
    let len = samples.len();
    if len < 2 {
        return;
    }
    let d0 = start - samples[0];
    let d1 = end - samples[len - 1];
    if d0 == 0.0 && d1 == 0.0 {
        return;
    }
    let last = (len - 1) as f64;
    for (k, sample) in samples.iter_mut().enumerate() {
        let t = k as f64 / last;
        *sample += d0 * (1.0 - t) + d1 * t;
    }
    samples[0] = start;
    samples[len - 1] = end;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seams() -> SeamSettings {
        SeamSettings::default()
    }

    fn planar(x: f64, z: f64) -> TerrainResult<f64> {
        Ok(x * 0.01 + z * 0.02)
    }

    fn resolver<'a>(seams: &'a SeamSettings, fresh: &'a dyn Fn(f64, f64) -> TerrainResult<f64>) -> Resolver<'a> {
        Resolver {
            layout: GridLayout::new(8.0, 5),
            seams,
            edge_bias_seed: WorldSeed::new(1),
            corner_offset_seed: WorldSeed::new(2),
            fresh,
        }
    }

    #[test]
    fn test_empty_neighborhood_is_fresh() {
        let seams = seams();
        let r = resolver(&seams, &planar);
        let resolved = r.resolve(ChunkCoord::new(1, 0), &Neighborhood::default()).unwrap();

        assert!(resolved.corner_sources.iter().all(|&s| s == Resolution::Fresh));
        assert!(resolved.edge_sources.iter().all(|&s| s == Resolution::Fresh));
        // NE corner of (1, 0) sits at world (16, 0)
        assert_eq!(resolved.corner(Corner::NorthEast), 0.16);
        assert_eq!(resolved.edge(Side::North).len(), 5);
    }

    #[test]
    fn test_neighbor_edge_copied_with_order() {
        let seams = seams();
        let r = resolver(&seams, &planar);
        let mut west = BorderSet::default();
        west.set_edge(Side::East, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        let hood = Neighborhood::capture(|dx, dz| (dx == -1 && dz == 0).then(|| west.clone()));

        let resolved = r.resolve(ChunkCoord::new(0, 0), &hood).unwrap();
        assert_eq!(resolved.edge(Side::West), &[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(resolved.edge_sources[Side::West.index()], Resolution::Neighbor);
        assert_eq!(resolved.corner(Corner::NorthWest), 1.0);
        assert_eq!(resolved.corner(Corner::SouthWest), 5.0);
        assert_eq!(resolved.corner_sources[Corner::NorthWest.index()], Resolution::Neighbor);
    }

    #[test]
    fn test_diagonal_corner_copied() {
        let seams = seams();
        let r = resolver(&seams, &planar);
        let mut diag = BorderSet::default();
        diag.set_corner(Corner::SouthEast, 42.0);
        let hood = Neighborhood::capture(|dx, dz| (dx == -1 && dz == -1).then(|| diag.clone()));

        let resolved = r.resolve(ChunkCoord::new(0, 0), &hood).unwrap();
        assert_eq!(resolved.corner(Corner::NorthWest), 42.0);
        assert_eq!(resolved.edge(Side::North)[0], 42.0);
        assert_eq!(resolved.edge(Side::West)[0], 42.0);
    }

    #[test]
    fn test_agreeing_partial_endpoints_are_averaged() {
        let seams = seams();
        let r = resolver(&seams, &planar);
        let mut own = BorderSet::default();
        own.set_edge(Side::North, vec![10.0, 11.0, 12.0]);
        own.set_edge(Side::West, vec![10.2, 9.0]);
        let hood = Neighborhood::capture(|dx, dz| (dx == 0 && dz == 0).then(|| own.clone()));

        let resolved = r.resolve(ChunkCoord::new(0, 0), &hood).unwrap();
        assert_eq!(resolved.corner_sources[Corner::NorthWest.index()], Resolution::Agreement);
        assert!((resolved.corner(Corner::NorthWest) - 10.1).abs() < 1e-12);
        assert_eq!(resolved.edge_sources[Side::North.index()], Resolution::Resampled);
    }

    #[test]
    fn test_disagreeing_partial_endpoints_fall_through_to_fresh() {
        let seams = seams();
        let r = resolver(&seams, &planar);
        let mut own = BorderSet::default();
        own.set_edge(Side::North, vec![10.0, 11.0]);
        own.set_edge(Side::West, vec![20.0, 9.0]);
        let hood = Neighborhood::capture(|dx, dz| (dx == 0 && dz == 0).then(|| own.clone()));

        let resolved = r.resolve(ChunkCoord::new(0, 0), &hood).unwrap();
        assert_eq!(resolved.corner_sources[Corner::NorthWest.index()], Resolution::Fresh);
        assert_eq!(resolved.corner(Corner::NorthWest), 0.0);
    }

    #[test]
    fn test_single_partial_endpoint_is_offset_within_bound() {
        let seams = seams();
        let r = resolver(&seams, &planar);
        let mut own = BorderSet::default();
        own.set_edge(Side::East, vec![5.0, 6.0, 7.0]);
        let hood = Neighborhood::capture(|dx, dz| (dx == 0 && dz == 0).then(|| own.clone()));

        let resolved = r.resolve(ChunkCoord::new(0, 0), &hood).unwrap();
        assert_eq!(resolved.corner_sources[Corner::NorthEast.index()], Resolution::Offset);
        let ne = resolved.corner(Corner::NorthEast);
        assert!((ne - 5.0).abs() <= seams.corner_offset_amplitude);
        assert!((resolved.corner(Corner::SouthEast) - 7.0).abs() <= seams.corner_offset_amplitude);
    }

    #[test]
    fn test_resampled_edge_ends_on_corners() {
        let seams = seams();
        let r = resolver(&seams, &planar);
        let mut east = BorderSet::default();
        east.set_edge(Side::West, vec![3.0, 4.0, 5.0]);
        east.set_corner(Corner::NorthWest, 2.5);
        east.set_corner(Corner::SouthWest, 5.5);
        let hood = Neighborhood::capture(|dx, dz| (dx == 1 && dz == 0).then(|| east.clone()));

        let resolved = r.resolve(ChunkCoord::new(0, 0), &hood).unwrap();
        let edge = resolved.edge(Side::East);
        assert_eq!(edge.len(), 5);
        assert_eq!(edge[0], 2.5);
        assert_eq!(edge[4], 5.5);
        assert_eq!(resolved.edge_sources[Side::East.index()], Resolution::Resampled);
        // Source midpoint 4.0, pinned shift 0.0 at the centre, bias at most the amplitude
        assert!((edge[2] - 4.0).abs() <= seams.edge_bias_amplitude + 1e-12);
    }

    #[test]
    fn test_short_partial_edge_interpolates_between_corners() {
        let seams = SeamSettings {
            edge_bias_amplitude: 0.0,
            ..SeamSettings::default()
        };
        let r = resolver(&seams, &planar);
        let mut own = BorderSet::default();
        own.set_edge(Side::South, vec![]);
        own.set_corner(Corner::SouthWest, 0.0);
        own.set_corner(Corner::SouthEast, 4.0);
        let hood = Neighborhood::capture(|dx, dz| (dx == 0 && dz == 0).then(|| own.clone()));

        let resolved = r.resolve(ChunkCoord::new(0, 0), &hood).unwrap();
        assert_eq!(resolved.edge(Side::South), &[0.0, 1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_fresh_error_propagates() {
        let seams = seams();
        let failing = |x: f64, z: f64| -> TerrainResult<f64> {
            Err(TerrainError::HeightEvaluation {
                x,
                z,
                reason: "unavailable".into(),
            })
        };
        let r = resolver(&seams, &failing);
        assert!(r.resolve(ChunkCoord::new(0, 0), &Neighborhood::default()).is_err());
    }

    #[test]
    fn test_non_finite_partial_edge_is_an_error() {
        let seams = seams();
        let r = resolver(&seams, &planar);
        let mut own = BorderSet::default();
        own.set_edge(Side::North, vec![f64::NAN, 1.0, 2.0]);
        let hood = Neighborhood::capture(|dx, dz| (dx == 0 && dz == 0).then(|| own.clone()));

        let err = r.resolve(ChunkCoord::new(0, 0), &hood).unwrap_err();
        assert!(matches!(err, TerrainError::NonFiniteHeight { .. }), "got {err}");
    }

    #[test]
    fn test_non_finite_neighbor_corner_is_an_error() {
        let seams = seams();
        let r = resolver(&seams, &planar);
        let mut diag = BorderSet::default();
        diag.set_corner(Corner::SouthEast, f64::INFINITY);
        let hood = Neighborhood::capture(|dx, dz| (dx == -1 && dz == -1).then(|| diag.clone()));

        assert!(matches!(
            r.resolve(ChunkCoord::new(0, 0), &hood),
            Err(TerrainError::NonFiniteHeight { x, z, .. }) if x == 0.0 && z == 0.0
        ));
    }

    #[test]
    fn test_pin_to_corners() {
        let mut samples = vec![1.0, 1.0, 1.0];
        pin_to_corners(&mut samples, 0.0, 2.0);
        assert_eq!(samples, vec![0.0, 1.0, 2.0]);
    }
}
