//! # Seam Consistency Tests
//!
//! Proves neighbouring chunks share their borders bit for bit, whatever the
//! generation order, concurrency, or failures along the way.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use strata_procedural::{
    Biome, BiomeHeightField, ChunkCoord, Corner, HeightField, HeightGrid, Side, TerrainConfig,
    TerrainError, TerrainGenerator, TerrainResult, WorldSeed,
};

fn generator(seed: u64) -> TerrainGenerator {
    TerrainGenerator::new(WorldSeed::new(seed), TerrainConfig::test()).unwrap()
}

fn assert_bits_eq(a: &[f64], b: &[f64], what: &str) {
    assert_eq!(a.len(), b.len(), "{what}: length mismatch");
    for (k, (x, y)) in a.iter().zip(b).enumerate() {
        assert_eq!(x.to_bits(), y.to_bits(), "{what}: sample {k} differs ({x} vs {y})");
    }
}

fn assert_grids_identical(a: &HeightGrid, b: &HeightGrid) {
    assert_eq!(a.coord, b.coord);
    assert_bits_eq(a.heights(), b.heights(), &format!("grid {}", a.coord));
}

/// Height field that fails inside one square region.
struct FaultyField {
    inner: BiomeHeightField,
    min: f64,
    max: f64,
}

impl HeightField for FaultyField {
    fn height(&self, x: f64, z: f64, biome: Biome) -> TerrainResult<f64> {
        if (self.min..=self.max).contains(&x) && (self.min..=self.max).contains(&z) {
            return Err(TerrainError::HeightEvaluation {
                x,
                z,
                reason: "injected fault".into(),
            });
        }
        self.inner.height(x, z, biome)
    }
}

/// Test: Same seed, caches cleared in between, bit-identical grids.
#[test]
fn test_rebuild_after_clear_is_bit_identical() {
    let gen = generator(42);
    let coords = [ChunkCoord::new(0, 0), ChunkCoord::new(-4, 9), ChunkCoord::new(17, -3)];

    let first: Vec<HeightGrid> = coords.iter().map(|&c| gen.build_height_grid(c)).collect();
    gen.clear_caches();
    let second: Vec<HeightGrid> = coords.iter().map(|&c| gen.build_height_grid(c)).collect();

    for (a, b) in first.iter().zip(&second) {
        assert_grids_identical(a, b);
    }
}

/// Test: Two generators with the same seed agree.
#[test]
fn test_same_seed_same_world() {
    let a = generator(7).build_height_grid(ChunkCoord::new(2, 2));
    let b = generator(7).build_height_grid(ChunkCoord::new(2, 2));
    let c = generator(8).build_height_grid(ChunkCoord::new(2, 2));

    assert_grids_identical(&a, &b);
    assert_ne!(a.heights(), c.heights(), "different seeds should differ");
}

/// Test: East/west seam is identical in both generation orders.
#[test]
fn test_seam_independent_of_order() {
    let left = ChunkCoord::new(0, 0);
    let right = ChunkCoord::new(1, 0);

    let gen_lr = generator(42);
    let l1 = gen_lr.build_height_grid(left);
    let r1 = gen_lr.build_height_grid(right);

    let gen_rl = generator(42);
    let r2 = gen_rl.build_height_grid(right);
    let l2 = gen_rl.build_height_grid(left);

    assert_bits_eq(&l1.edge(Side::East), &r1.edge(Side::West), "seam, left first");
    assert_bits_eq(&l2.edge(Side::East), &r2.edge(Side::West), "seam, right first");
    assert_grids_identical(&l1, &l2);
    assert_grids_identical(&r1, &r2);
}

/// Test: North/south seam follows the same rule.
#[test]
fn test_vertical_seam() {
    let gen = generator(3);
    let top = gen.build_height_grid(ChunkCoord::new(-5, -1));
    let bottom = gen.build_height_grid(ChunkCoord::new(-5, 0));

    assert_bits_eq(&top.edge(Side::South), &bottom.edge(Side::North), "vertical seam");
}

fn corner_values(gen: &TerrainGenerator, order: &[ChunkCoord]) -> [f64; 4] {
    let grids: Vec<HeightGrid> = order.iter().map(|&c| gen.build_height_grid(c)).collect();
    let find = |coord: ChunkCoord| grids.iter().find(|g| g.coord == coord).unwrap();
    [
        find(ChunkCoord::new(0, 0)).corner(Corner::SouthEast),
        find(ChunkCoord::new(1, 0)).corner(Corner::SouthWest),
        find(ChunkCoord::new(0, 1)).corner(Corner::NorthEast),
        find(ChunkCoord::new(1, 1)).corner(Corner::NorthWest),
    ]
}

/// Test: Four chunks around a lattice point agree on it, in any order.
#[test]
fn test_corner_shared_by_four_chunks() {
    let clockwise = [
        ChunkCoord::new(0, 0),
        ChunkCoord::new(1, 0),
        ChunkCoord::new(1, 1),
        ChunkCoord::new(0, 1),
    ];
    let reference = corner_values(&generator(42), &clockwise);
    for value in reference {
        assert_eq!(value.to_bits(), reference[0].to_bits(), "clockwise corners disagree");
    }

    let mut rng = ChaCha8Rng::seed_from_u64(2024);
    for _ in 0..8 {
        let mut order = clockwise;
        order.shuffle(&mut rng);
        let values = corner_values(&generator(42), &order);
        for value in values {
            assert_eq!(
                value.to_bits(),
                reference[0].to_bits(),
                "corner differs for order {order:?}"
            );
        }
    }
}

/// Test: Failed chunk becomes flat, raises nothing, and its neighbour lines up.
#[test]
fn test_fault_gives_flat_fallback_and_consistent_neighbor() {
    let config = TerrainConfig::test();
    let seed = WorldSeed::new(42);
    let size = config.chunk_size;
    let field = FaultyField {
        inner: BiomeHeightField::new(seed, &config).unwrap(),
        min: 0.0,
        max: size,
    };
    let gen = TerrainGenerator::with_height_field(seed, config, field).unwrap();

    let failed = gen.build_height_grid(ChunkCoord::new(0, 0));
    assert!(failed.is_fallback());
    assert!(failed.is_uniform(), "fallback with nothing cached must be flat");
    assert_eq!(failed.get(0, 0), gen.config().fallback_elevation);

    let cached = gen.border_snapshot(ChunkCoord::new(1, 0)).unwrap();
    assert_bits_eq(
        cached.edge(Side::West).unwrap(),
        &failed.edge(Side::East),
        "fallback border propagated",
    );

    let neighbor = gen.build_height_grid(ChunkCoord::new(1, 0));
    assert!(!neighbor.is_fallback());
    assert_bits_eq(&neighbor.edge(Side::West), &failed.edge(Side::East), "seam after fallback");

    let stats = gen.stats();
    assert_eq!(stats.fallbacks, 1);
    assert_eq!(stats.chunks_generated, 2);
}

/// Test: Fallback keeps border values already authoritative.
#[test]
fn test_fallback_keeps_cached_borders() {
    let config = TerrainConfig::test();
    let seed = WorldSeed::new(5);
    let size = config.chunk_size;
    // Fault covers only the interior of chunk (0, 0)
    let field = FaultyField {
        inner: BiomeHeightField::new(seed, &config).unwrap(),
        min: 0.25 * size,
        max: 0.75 * size,
    };
    let gen = TerrainGenerator::with_height_field(seed, config, field).unwrap();

    let west = gen.build_height_grid(ChunkCoord::new(-1, 0));
    let failed = gen.build_height_grid(ChunkCoord::new(0, 0));

    assert!(failed.is_fallback());
    assert!(!failed.is_uniform());
    assert_bits_eq(&failed.edge(Side::West), &west.edge(Side::East), "kept cached edge");
}

/// Test: Parallel generation is seamless and matches sequential generation.
#[test]
fn test_parallel_region_is_seamless() {
    let coords: Vec<ChunkCoord> = (-3..3)
        .flat_map(|z| (-3..3).map(move |x| ChunkCoord::new(x, z)))
        .collect();

    let parallel = generator(99).generate_parallel(&coords, 4);
    assert_eq!(parallel.len(), coords.len());

    let sequential_gen = generator(99);
    for (grid, &coord) in parallel.iter().zip(&coords) {
        assert_eq!(grid.coord, coord, "results must keep request order");
        assert_grids_identical(grid, &sequential_gen.build_height_grid(coord));
    }

    let find = |coord: ChunkCoord| parallel.iter().find(|g| g.coord == coord);
    for grid in &parallel {
        if let Some(east) = find(grid.coord.neighbor(Side::East)) {
            assert_bits_eq(&grid.edge(Side::East), &east.edge(Side::West), "parallel east seam");
        }
        if let Some(south) = find(grid.coord.neighbor(Side::South)) {
            assert_bits_eq(&grid.edge(Side::South), &south.edge(Side::North), "parallel south seam");
        }
    }
}

/// Test: Duplicate concurrent requests for one chunk still agree.
#[test]
fn test_duplicate_parallel_requests() {
    let coords = vec![ChunkCoord::new(4, 4); 8];
    let grids = generator(11).generate_parallel(&coords, 4);
    assert_eq!(grids.len(), 8);
    for grid in &grids[1..] {
        assert_grids_identical(&grids[0], grid);
    }
}

/// Test: Entry evicted only after all four neighbours are final; regeneration reproduces it.
#[test]
fn test_eviction_and_regeneration() {
    let gen = generator(42);
    let center = ChunkCoord::new(0, 0);
    let original = gen.build_height_grid(center);

    gen.notify_unloaded(center);
    assert!(gen.border_snapshot(center).is_some(), "neighbours not final yet");
    assert_eq!(gen.stats().pending_evictions, 1);

    for side in Side::ALL {
        gen.build_height_grid(center.neighbor(side));
    }
    // Eviction runs when the last neighbour finalizes
    assert!(gen.border_snapshot(center).is_none());
    assert_eq!(gen.stats().evictions, 1);

    let regenerated = gen.build_height_grid(center);
    assert_grids_identical(&original, &regenerated);
}
