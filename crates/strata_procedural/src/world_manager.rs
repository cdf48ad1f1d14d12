//! # World Manager
//!
//! Streams chunks around a moving observer.
//!
//! ## Flow
//!
//! 1. `update(x, z)` queues every missing chunk within `view_radius`,
//!    nearest first
//! 2. Chunks beyond `view_radius + unload_margin` are dropped and the
//!    generator is told, so their border entries can be evicted later
//! 3. At most `max_generations_per_update` queued chunks are built per call;
//!    `flush_generation_queue` builds the rest on worker threads

use std::collections::{HashMap, HashSet, VecDeque};

use crate::chunk::{ChunkCoord, HeightGrid};
use crate::config::{StreamingConfig, TerrainConfig};
use crate::error::TerrainResult;
use crate::generator::TerrainGenerator;
use crate::height::{BiomeHeightField, HeightField};
use crate::noise::WorldSeed;

/// Session statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorldStats {
    /// Chunks generated since creation.
    pub generated_this_session: u64,
    /// Chunks unloaded since creation.
    pub unloaded_this_session: u64,
    /// Generated chunks that came back as flat fallbacks.
    pub fallbacks_this_session: u64,
    /// Chunks waiting in the queue.
    pub queued: usize,
}

/// Observer-driven chunk streaming on top of a [`TerrainGenerator`].
pub struct WorldManager<H: HeightField = BiomeHeightField> {
    generator: TerrainGenerator<H>,
    streaming: StreamingConfig,
    loaded: HashMap<ChunkCoord, HeightGrid>,
    queue: VecDeque<ChunkCoord>,
    queued: HashSet<ChunkCoord>,
    center: Option<ChunkCoord>,
    stats: WorldStats,
}

impl WorldManager<BiomeHeightField> {
    /// Creates a manager with the production height field.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the configuration is rejected.
    pub fn new(seed: WorldSeed, config: TerrainConfig) -> TerrainResult<Self> {
        Ok(Self::with_generator(TerrainGenerator::new(seed, config)?))
    }
}

impl<H: HeightField> WorldManager<H> {
    /// Wraps an existing generator, streaming with its configuration.
    #[must_use]
    pub fn with_generator(generator: TerrainGenerator<H>) -> Self {
        let streaming = generator.config().streaming.clone();
        Self {
            generator,
            streaming,
            loaded: HashMap::new(),
            queue: VecDeque::new(),
            queued: HashSet::new(),
            center: None,
            stats: WorldStats::default(),
        }
    }

    /// The underlying generator.
    #[inline]
    #[must_use]
    pub const fn generator(&self) -> &TerrainGenerator<H> {
        &self.generator
    }

    /// Moves the observer and spends this update's generation budget.
    ///
    /// # Arguments
    ///
    /// * `x` - Observer world X
    /// * `z` - Observer world Z
    pub fn update(&mut self, x: f64, z: f64) {
        let center = ChunkCoord::from_world_pos(x, z, self.generator.layout().chunk_size());
        if self.center != Some(center) {
            self.center = Some(center);
            self.unload_distant(center);
            self.enqueue_around(center, self.streaming.view_radius);
        }

        for _ in 0..self.streaming.max_generations_per_update {
            let Some(coord) = self.next_job() else {
                break;
            };
            let grid = self.generator.build_height_grid(coord);
            self.insert(grid);
        }
        self.stats.queued = self.queue.len();
    }

    /// Synchronously loads every chunk within `radius` of a world position.
    pub fn ensure_loaded_around(&mut self, x: f64, z: f64, radius: u32) {
        let center = ChunkCoord::from_world_pos(x, z, self.generator.layout().chunk_size());
        let missing: Vec<ChunkCoord> = ring_order(center, radius)
            .into_iter()
            .filter(|coord| !self.loaded.contains_key(coord))
            .collect();
        self.build_batch(&missing);
    }

    /// Builds everything still queued, in parallel.
    pub fn flush_generation_queue(&mut self) {
        let mut batch = Vec::with_capacity(self.queue.len());
        while let Some(coord) = self.next_job() {
            batch.push(coord);
        }
        self.build_batch(&batch);
        self.stats.queued = 0;
    }

    /// Grid of a loaded chunk.
    #[must_use]
    pub fn grid(&self, coord: ChunkCoord) -> Option<&HeightGrid> {
        self.loaded.get(&coord)
    }

    /// True if the chunk is loaded.
    #[must_use]
    pub fn is_loaded(&self, coord: ChunkCoord) -> bool {
        self.loaded.contains_key(&coord)
    }

    /// Bilinearly interpolated height at a world position, if its chunk is loaded.
    #[must_use]
    pub fn height_at(&self, x: f64, z: f64) -> Option<f64> {
        let layout = self.generator.layout();
        let coord = ChunkCoord::from_world_pos(x, z, layout.chunk_size());
        let grid = self.loaded.get(&coord)?;
        let n = grid.size();

        let fx = (x - f64::from(coord.x) * layout.chunk_size()) / layout.step();
        let fz = (z - f64::from(coord.z) * layout.chunk_size()) / layout.step();
        let i = (fx.max(0.0).floor() as usize).min(n - 2);
        let j = (fz.max(0.0).floor() as usize).min(n - 2);
        let tx = (fx - i as f64).clamp(0.0, 1.0);
        let tz = (fz - j as f64).clamp(0.0, 1.0);

        let north = grid.get(i, j) * (1.0 - tx) + grid.get(i + 1, j) * tx;
        let south = grid.get(i, j + 1) * (1.0 - tx) + grid.get(i + 1, j + 1) * tx;
        Some(north * (1.0 - tz) + south * tz)
    }

    /// Number of loaded chunks.
    #[must_use]
    pub fn loaded_chunk_count(&self) -> usize {
        self.loaded.len()
    }

    /// Session statistics.
    #[must_use]
    pub const fn stats(&self) -> WorldStats {
        self.stats
    }

    fn keep_radius(&self) -> i32 {
        (self.streaming.view_radius + self.streaming.unload_margin) as i32
    }

    fn unload_distant(&mut self, center: ChunkCoord) {
        let keep = self.keep_radius();
        let distant: Vec<ChunkCoord> = self
            .loaded
            .keys()
            .copied()
            .filter(|coord| coord.chebyshev_distance(center) > keep)
            .collect();
        for coord in distant {
            self.loaded.remove(&coord);
            self.generator.notify_unloaded(coord);
            self.stats.unloaded_this_session += 1;
        }
        self.queue.retain(|coord| coord.chebyshev_distance(center) <= keep);
        self.queued.retain(|coord| coord.chebyshev_distance(center) <= keep);
    }

    fn enqueue_around(&mut self, center: ChunkCoord, radius: u32) {
        for coord in ring_order(center, radius) {
            if !self.loaded.contains_key(&coord) && self.queued.insert(coord) {
                self.queue.push_back(coord);
            }
        }
        self.queue
            .make_contiguous()
            .sort_by_key(|&coord| distance_key(center, coord));
        tracing::debug!(
            "observer in chunk {}, {} chunks queued",
            center,
            self.queue.len()
        );
    }

    fn next_job(&mut self) -> Option<ChunkCoord> {
        while let Some(coord) = self.queue.pop_front() {
            self.queued.remove(&coord);
            if !self.loaded.contains_key(&coord) {
                return Some(coord);
            }
        }
        None
    }

    fn build_batch(&mut self, coords: &[ChunkCoord]) {
        if coords.is_empty() {
            return;
        }
        let grids = self
            .generator
            .generate_parallel(coords, self.streaming.worker_threads);
        for grid in grids {
            self.insert(grid);
        }
    }

    fn insert(&mut self, grid: HeightGrid) {
        self.stats.generated_this_session += 1;
        if grid.is_fallback() {
            self.stats.fallbacks_this_session += 1;
        }
        self.loaded.insert(grid.coord, grid);
    }
}

/// Chunks within `radius` (Chebyshev) of `center`, nearest first.
fn ring_order(center: ChunkCoord, radius: u32) -> Vec<ChunkCoord> {
    let r = radius as i32;
    let mut coords: Vec<ChunkCoord> = (-r..=r)
        .flat_map(|dz| (-r..=r).map(move |dx| center.offset(dx, dz)))
        .collect();
    coords.sort_by_key(|&coord| distance_key(center, coord));
    coords
}

/// Squared distance, ties broken by row then column.
fn distance_key(center: ChunkCoord, coord: ChunkCoord) -> (i64, i32, i32) {
    let dx = i64::from(coord.x) - i64::from(center.x);
    let dz = i64::from(coord.z) - i64::from(center.z);
    (dx * dx + dz * dz, coord.z, coord.x)
}
