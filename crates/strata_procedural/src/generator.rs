//! # Terrain Generator
//!
//! Entry point for chunk synthesis.
//!
//! ## Generation Protocol
//!
//! Each request runs in three phases so height evaluation never happens
//! under the shared lock:
//! 1. Snapshot: copy the 3x3 block of border sets around the chunk
//! 2. Resolve: decide edges and corners from the snapshot, evaluating fresh
//!    heights where nothing is known
//! 3. Commit: publish the result; any value committed meanwhile by another
//!    worker wins and is adopted
//!
//! The interior is then assembled from the committed borders, and the grid's
//! borders are published again and marked final.
//!
//! ## Failure
//!
//! No height evaluation error escapes. The chunk becomes a flat grid at
//! `fallback_elevation` that keeps every border value already authoritative,
//! so neighbours still line up.

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::unbounded;
use parking_lot::Mutex;

use crate::assembler::Assembler;
use crate::biome::{Biome, BiomeClassifier, NeighborBiomes};
use crate::border::cache::BorderCache;
use crate::border::resolve::{pin_to_corners, Neighborhood, ResolvedBorders, Resolver};
use crate::border::BorderSet;
use crate::chunk::{ChunkCoord, Corner, GridLayout, GridOrigin, HeightGrid, Side};
use crate::config::TerrainConfig;
use crate::error::{TerrainError, TerrainResult};
use crate::height::{BiomeHeightField, HeightField};
use crate::lifecycle::ChunkLifecycle;
use crate::noise::{channel, WorldSeed};

/// Border cache and lifecycle, guarded together.
#[derive(Debug)]
struct TerrainState {
    cache: BorderCache,
    lifecycle: ChunkLifecycle,
}

impl TerrainState {
    fn snapshot(&self, coord: ChunkCoord, skip_own: bool) -> Neighborhood {
        Neighborhood::capture(|dx, dz| {
            if skip_own && dx == 0 && dz == 0 {
                return None;
            }
            let target = coord.offset(dx, dz);
            self.lifecycle
                .resident(target)
                .or_else(|| self.cache.get(target))
                .cloned()
        })
    }

    fn finish(&mut self, coord: ChunkCoord, borders: BorderSet) {
        self.cache.mark_finalized(coord);
        self.lifecycle.record_resident(coord, borders);
        self.lifecycle.sweep(&mut self.cache);
    }
}

/// Decrements the in-flight count of a chunk when dropped.
struct InFlight<'a> {
    state: &'a Mutex<TerrainState>,
    coord: ChunkCoord,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.state.lock().lifecycle.end(self.coord);
    }
}

/// Generator statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GeneratorStats {
    /// Grids returned, fallbacks included.
    pub chunks_generated: u64,
    /// Grids substituted after a failure.
    pub fallbacks: u64,
    /// Border cache entries.
    pub cache_entries: usize,
    /// Chunks currently held by a consumer.
    pub resident_chunks: usize,
    /// Unloaded chunks whose entries are not yet evicted.
    pub pending_evictions: usize,
    /// Entries evicted since creation.
    pub evictions: u64,
    /// Cached values that disagreed with a computed value.
    pub inconsistencies: u64,
}

/// Deterministic, seam-free terrain generator.
///
/// Shareable between threads; every method takes `&self`.
pub struct TerrainGenerator<H: HeightField = BiomeHeightField> {
    seed: WorldSeed,
    config: TerrainConfig,
    layout: GridLayout,
    classifier: BiomeClassifier,
    field: H,
    edge_bias_seed: WorldSeed,
    corner_offset_seed: WorldSeed,
    state: Mutex<TerrainState>,
    generated: AtomicU64,
    fallbacks: AtomicU64,
}

impl TerrainGenerator<BiomeHeightField> {
    /// Creates a generator with the production height field.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the configuration is rejected.
    pub fn new(seed: WorldSeed, config: TerrainConfig) -> TerrainResult<Self> {
        config.validate()?;
        let field = BiomeHeightField::new(seed, &config)?;
        Self::with_height_field(seed, config, field)
    }
}

impl<H: HeightField> TerrainGenerator<H> {
    /// Creates a generator around a custom height field.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the configuration is rejected.
    pub fn with_height_field(seed: WorldSeed, config: TerrainConfig, field: H) -> TerrainResult<Self> {
        config.validate()?;
        let layout = GridLayout::new(config.chunk_size, config.vertices_per_side);
        let classifier = BiomeClassifier::new(seed, config.biome.clone())?;
        let cache = BorderCache::new(config.vertices_per_side, config.seams.seam_tolerance);

        tracing::info!(
            "terrain generator ready: seed {}, chunk size {}, {} vertices per side",
            seed.value(),
            config.chunk_size,
            config.vertices_per_side
        );

        Ok(Self {
            seed,
            layout,
            classifier,
            field,
            edge_bias_seed: seed.derive(channel::EDGE_BIAS),
            corner_offset_seed: seed.derive(channel::CORNER_OFFSET),
            state: Mutex::new(TerrainState {
                cache,
                lifecycle: ChunkLifecycle::new(),
            }),
            generated: AtomicU64::new(0),
            fallbacks: AtomicU64::new(0),
            config,
        })
    }

    /// World seed.
    #[inline]
    #[must_use]
    pub const fn seed(&self) -> WorldSeed {
        self.seed
    }

    /// Active configuration.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &TerrainConfig {
        &self.config
    }

    /// Grid geometry.
    #[inline]
    #[must_use]
    pub const fn layout(&self) -> GridLayout {
        self.layout
    }

    /// Biome at world coordinates.
    #[must_use]
    pub fn biome_at(&self, x: f64, z: f64) -> Biome {
        self.classifier.classify(x, z)
    }

    /// Dominant biome of a chunk, taken at its centre.
    #[must_use]
    pub fn chunk_biome(&self, coord: ChunkCoord) -> Biome {
        let (x, z) = self.layout.center(coord);
        self.biome_at(x, z)
    }

    /// Biomes of the four edge neighbours of a chunk.
    #[must_use]
    pub fn neighbor_biomes(&self, coord: ChunkCoord) -> NeighborBiomes {
        NeighborBiomes {
            north: self.chunk_biome(coord.neighbor(Side::North)),
            south: self.chunk_biome(coord.neighbor(Side::South)),
            east: self.chunk_biome(coord.neighbor(Side::East)),
            west: self.chunk_biome(coord.neighbor(Side::West)),
        }
    }

    /// Builds the grid of a chunk, classifying its biomes internally.
    pub fn build_height_grid(&self, coord: ChunkCoord) -> HeightGrid {
        let biome = self.chunk_biome(coord);
        let neighbors = self.neighbor_biomes(coord);
        self.build_height_grid_with_biomes(coord, biome, neighbors)
    }

    /// Builds the grid of a chunk with caller-supplied biomes.
    ///
    /// Never fails: on a height evaluation error the result is a flat
    /// fallback grid (see [`HeightGrid::is_fallback`]). The fallback keeps
    /// border values already cached, so it is uniform only when nothing was.
    pub fn build_height_grid_with_biomes(
        &self,
        coord: ChunkCoord,
        biome: Biome,
        neighbors: NeighborBiomes,
    ) -> HeightGrid {
        let (reentrant, hood) = {
            let mut state = self.state.lock();
            let reentrant = state.lifecycle.begin(coord);
            (reentrant, state.snapshot(coord, reentrant))
        };
        let _in_flight = InFlight {
            state: &self.state,
            coord,
        };
        if reentrant {
            tracing::debug!("chunk {} already in flight, ignoring its own entry", coord);
        }

        let grid = match self.generate(coord, biome, &neighbors, &hood) {
            Ok(grid) => grid,
            Err(err) => self.fallback(coord, &err),
        };
        self.generated.fetch_add(1, Ordering::Relaxed);
        grid
    }

    fn generate(
        &self,
        coord: ChunkCoord,
        biome: Biome,
        neighbors: &NeighborBiomes,
        hood: &Neighborhood,
    ) -> TerrainResult<HeightGrid> {
        let fresh = |x: f64, z: f64| self.field.height(x, z, self.classifier.classify(x, z));
        let resolver = Resolver {
            layout: self.layout,
            seams: &self.config.seams,
            edge_bias_seed: self.edge_bias_seed,
            corner_offset_seed: self.corner_offset_seed,
            fresh: &fresh,
        };
        let mut borders = resolver.resolve(coord, hood)?;
        tracing::debug!(
            "chunk {} borders resolved: corners {:?}, edges {:?}",
            coord,
            borders.corner_sources,
            borders.edge_sources
        );

        self.commit(coord, &mut borders);

        let assembler = Assembler {
            layout: self.layout,
            blend: &self.config.blend,
            field: &self.field,
        };
        let grid = assembler.assemble(coord, biome, neighbors, &borders)?;

        let published = grid.border_set();
        let mut state = self.state.lock();
        for corner in Corner::ALL {
            if let Some(h) = published.corner(corner) {
                state.cache.commit_corner(coord, corner, h);
            }
        }
        for side in Side::ALL {
            if let Some(edge) = published.edge(side) {
                state.cache.commit_edge(coord, side, edge.to_vec());
            }
        }
        state.finish(coord, published);
        Ok(grid)
    }

    /// Commits resolved borders, replacing them with the authoritative values.
    fn commit(&self, coord: ChunkCoord, borders: &mut ResolvedBorders) {
        let mut state = self.state.lock();
        for corner in Corner::ALL {
            let computed = borders.corners[corner.index()];
            borders.corners[corner.index()] = state.cache.commit_corner(coord, corner, computed);
        }
        borders.pin_edges_to_corners();
        for side in Side::ALL {
            let computed = std::mem::take(&mut borders.edges[side.index()]);
            borders.edges[side.index()] = state.cache.commit_edge(coord, side, computed);
        }
        borders.pin_edges_to_corners();
    }

    fn fallback(&self, coord: ChunkCoord, err: &TerrainError) -> HeightGrid {
        tracing::error!(
            "chunk {} generation failed, substituting flat grid: {}",
            coord,
            err
        );
        self.fallbacks.fetch_add(1, Ordering::Relaxed);

        let n = self.layout.vertices();
        let flat = self.config.fallback_elevation;
        let mut grid = HeightGrid::flat(coord, n, flat, GridOrigin::Fallback);

        let mut state = self.state.lock();
        let mut corners = [flat; 4];
        for corner in Corner::ALL {
            let height = state.cache.authoritative_corner(coord, corner).unwrap_or(flat);
            corners[corner.index()] = state.cache.commit_corner(coord, corner, height);
        }
        for side in Side::ALL {
            let (first, last) = side.endpoints();
            let start = corners[first.index()];
            let end = corners[last.index()];
            let edge = match state.cache.authoritative_edge(coord, side) {
                Some(cached) => cached.to_vec(),
                None => {
                    let mut edge = vec![flat; n];
                    pin_to_corners(&mut edge, start, end);
                    edge
                }
            };
            let mut edge = state.cache.commit_edge(coord, side, edge);
            pin_to_corners(&mut edge, start, end);
            for (k, h) in edge.into_iter().enumerate() {
                let (i, j) = side.vertex(k, n);
                grid.set(i, j, h);
            }
        }
        state.finish(coord, grid.border_set());
        grid
    }

    /// Generates many chunks on scoped worker threads.
    ///
    /// # Returns
    ///
    /// Grids in the order of `coords`.
    pub fn generate_parallel(&self, coords: &[ChunkCoord], workers: usize) -> Vec<HeightGrid> {
        let workers = workers.clamp(1, coords.len().max(1));
        let (job_tx, job_rx) = unbounded::<(usize, ChunkCoord)>();
        let (result_tx, result_rx) = unbounded::<(usize, HeightGrid)>();

        for job in coords.iter().copied().enumerate() {
            if job_tx.send(job).is_err() {
                break;
            }
        }
        drop(job_tx);

        std::thread::scope(|scope| {
            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                scope.spawn(move || {
                    for (index, coord) in job_rx.iter() {
                        let grid = self.build_height_grid(coord);
                        if result_tx.send((index, grid)).is_err() {
                            break;
                        }
                    }
                });
            }
        });
        drop(result_tx);

        let mut slots: Vec<Option<HeightGrid>> = (0..coords.len()).map(|_| None).collect();
        for (index, grid) in result_rx.try_iter() {
            slots[index] = Some(grid);
        }
        slots.into_iter().flatten().collect()
    }

    /// Tells the generator a consumer discarded a chunk.
    ///
    /// Its cache entry is evicted once all four edge neighbours are final.
    pub fn notify_unloaded(&self, coord: ChunkCoord) {
        let mut state = self.state.lock();
        let TerrainState { cache, lifecycle } = &mut *state;
        lifecycle.notify_unloaded(coord);
        lifecycle.sweep(cache);
    }

    /// Seeds an edge from an external store, possibly at another resolution.
    ///
    /// Ignored if the chunk already has data for that edge, or if any sample
    /// is NaN or infinite.
    ///
    /// # Returns
    ///
    /// `true` if the samples were stored.
    pub fn insert_partial_edge(&self, coord: ChunkCoord, side: Side, samples: Vec<f64>) -> bool {
        self.state.lock().cache.insert_partial_edge(coord, side, samples)
    }

    /// Copy of the cached borders of a chunk.
    #[must_use]
    pub fn border_snapshot(&self, coord: ChunkCoord) -> Option<BorderSet> {
        self.state.lock().cache.get(coord).cloned()
    }

    /// Drops all cached borders, lifecycle state and biome memo (world reset).
    pub fn clear_caches(&self) {
        {
            let mut state = self.state.lock();
            state.cache.clear();
            state.lifecycle.clear();
        }
        self.classifier.clear_cache();
        tracing::info!("terrain caches cleared");
    }

    /// Current statistics.
    #[must_use]
    pub fn stats(&self) -> GeneratorStats {
        let state = self.state.lock();
        GeneratorStats {
            chunks_generated: self.generated.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            cache_entries: state.cache.len(),
            resident_chunks: state.lifecycle.resident_count(),
            pending_evictions: state.lifecycle.pending_evictions(),
            evictions: state.lifecycle.evictions(),
            inconsistencies: state.cache.inconsistencies(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::border::propagate::{BorderData, BorderWrite};

    fn generator() -> TerrainGenerator {
        TerrainGenerator::new(WorldSeed::new(42), TerrainConfig::test()).unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = TerrainConfig::test();
        config.chunk_size = -1.0;
        assert!(matches!(
            TerrainGenerator::new(WorldSeed::new(1), config),
            Err(TerrainError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_grid_shape() {
        let gen = generator();
        let grid = gen.build_height_grid(ChunkCoord::new(0, 0));
        assert_eq!(grid.size(), 9);
        assert_eq!(grid.heights().len(), 81);
        assert_eq!(grid.origin(), GridOrigin::Generated);
        assert!(grid.heights().iter().all(|h| h.is_finite()));
    }

    #[test]
    fn test_rebuild_reproduces_grid() {
        let gen = generator();
        let coord = ChunkCoord::new(-3, 7);
        let first = gen.build_height_grid(coord);
        let second = gen.build_height_grid(coord);
        assert_eq!(first, second);
        assert_eq!(gen.stats().inconsistencies, 0);
    }

    #[test]
    fn test_commit_publishes_to_neighbors() {
        let gen = generator();
        let coord = ChunkCoord::new(0, 0);
        let grid = gen.build_height_grid(coord);

        let east = gen.border_snapshot(ChunkCoord::new(1, 0)).unwrap();
        assert_eq!(east.edge(Side::West).unwrap(), grid.edge(Side::East).as_slice());
        let diag = gen.border_snapshot(ChunkCoord::new(-1, -1)).unwrap();
        assert_eq!(diag.corner(Corner::SouthEast), Some(grid.corner(Corner::NorthWest)));
        assert!(gen.border_snapshot(coord).unwrap().is_finalized());
        assert!(!east.is_finalized());
    }

    #[test]
    fn test_partial_edge_is_resampled() {
        let gen = generator();
        let coord = ChunkCoord::new(4, 4);
        assert!(gen.insert_partial_edge(coord, Side::North, vec![5.0, 5.0, 5.0]));
        let grid = gen.build_height_grid(coord);

        let north = grid.edge(Side::North);
        assert_eq!(north.len(), 9);
        assert_eq!(north[0], grid.corner(Corner::NorthWest));
        assert_eq!(north[8], grid.corner(Corner::NorthEast));
        let amp = gen.config().seams.corner_offset_amplitude;
        assert!((north[0] - 5.0).abs() <= amp, "single partial endpoint gives an offset corner");
    }

    #[test]
    fn test_non_finite_partial_edge_ignored() {
        let gen = generator();
        let coord = ChunkCoord::new(0, 0);
        assert!(!gen.insert_partial_edge(coord, Side::North, vec![f64::NAN, 1.0, 2.0]));

        let grid = gen.build_height_grid(coord);
        assert!(!grid.is_fallback());
        assert!(grid.heights().iter().all(|h| h.is_finite()));
    }

    #[test]
    fn test_non_finite_cached_edge_gives_finite_fallback() {
        let gen = generator();
        let coord = ChunkCoord::new(0, 0);
        gen.state.lock().cache.apply(BorderWrite {
            target: coord,
            data: BorderData::Edge {
                side: Side::North,
                samples: vec![f64::NAN, 1.0, 2.0],
            },
        });

        let grid = gen.build_height_grid(coord);
        assert!(grid.is_fallback());
        assert!(grid.heights().iter().all(|h| h.is_finite()));

        let diag = gen.build_height_grid(ChunkCoord::new(-1, -1));
        assert!(diag.corner(Corner::SouthEast).is_finite());
        assert_eq!(diag.corner(Corner::SouthEast), grid.corner(Corner::NorthWest));
        assert_eq!(gen.stats().fallbacks, 1);
    }

    #[test]
    fn test_reentrant_request_matches_plain_build() {
        let coord = ChunkCoord::new(2, -1);
        let plain = generator();
        let reentrant = generator();
        for gen in [&plain, &reentrant] {
            for side in Side::ALL {
                gen.build_height_grid(coord.neighbor(side));
            }
        }
        let expected = plain.build_height_grid(coord);

        // Hold the chunk in flight so the next request skips its own entry
        assert!(!reentrant.state.lock().lifecycle.begin(coord));
        let grid = reentrant.build_height_grid(coord);
        assert!(reentrant.state.lock().lifecycle.is_in_flight(coord));
        reentrant.state.lock().lifecycle.end(coord);

        assert_eq!(grid, expected);
        assert_eq!(reentrant.stats().inconsistencies, 0);
        assert!(reentrant.border_snapshot(coord).unwrap().is_finalized());
    }

    #[test]
    fn test_reentrant_request_adopts_committed_corner() {
        let gen = generator();
        let coord = ChunkCoord::new(0, 0);
        {
            let mut state = gen.state.lock();
            assert!(!state.lifecycle.begin(coord));
            state.cache.apply(BorderWrite {
                target: coord,
                data: BorderData::Corner {
                    corner: Corner::NorthWest,
                    height: 123.0,
                },
            });
        }

        let grid = gen.build_height_grid(coord);
        gen.state.lock().lifecycle.end(coord);

        assert_eq!(grid.corner(Corner::NorthWest), 123.0);
        assert_eq!(grid.edge(Side::North)[0], 123.0);
        assert_eq!(grid.edge(Side::West)[0], 123.0);
        assert_eq!(gen.stats().inconsistencies, 1);
        let diag = gen.border_snapshot(ChunkCoord::new(-1, -1)).unwrap();
        assert_eq!(diag.corner(Corner::SouthEast), Some(123.0));
    }

    #[test]
    fn test_reentrant_request_replaces_own_partial_edge() {
        let coord = ChunkCoord::new(3, 3);
        let expected = generator().build_height_grid(coord);

        let gen = generator();
        assert!(gen.insert_partial_edge(coord, Side::North, vec![30.0, 31.0, 32.0]));
        assert!(!gen.state.lock().lifecycle.begin(coord));
        let grid = gen.build_height_grid(coord);
        gen.state.lock().lifecycle.end(coord);

        assert_eq!(grid, expected, "own partial edge is ignored while in flight");
        assert_eq!(gen.stats().inconsistencies, 0);
        let cached = gen.border_snapshot(coord).unwrap();
        assert_eq!(cached.edge(Side::North), Some(grid.edge(Side::North).as_slice()));
    }

    #[test]
    fn test_stats_track_generation() {
        let gen = generator();
        for x in 0..3 {
            gen.build_height_grid(ChunkCoord::new(x, 0));
        }
        let stats = gen.stats();
        assert_eq!(stats.chunks_generated, 3);
        assert_eq!(stats.fallbacks, 0);
        assert_eq!(stats.resident_chunks, 3);
        assert!(stats.cache_entries >= 3);

        gen.clear_caches();
        assert_eq!(gen.stats().cache_entries, 0);
    }
}
