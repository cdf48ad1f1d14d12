//! # Chunk Grid
//!
//! The world surface is organized into fixed-size square chunks:
//! - Chunks are addressed by integer grid coordinates
//! - Each chunk owns a `vertices_per_side²` grid of height samples
//! - Adjacent chunks share their border row/column and corner samples
//!
//! ## Grid Layout
//!
//! Vertex `(i, j)` has `i` running east (+x) and `j` running south (+z).
//! The north edge is row `j = 0`, the west edge is column `i = 0`. Every
//! edge is stored in ascending world-coordinate order, so the east edge of
//! one chunk and the west edge of its neighbour have the same index order.

use std::fmt;

use bytemuck::cast_slice;

use crate::border::BorderSet;

/// Chunk coordinate (identifies a chunk in the world grid).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoord {
    /// X coordinate (in chunks, not world units).
    pub x: i32,
    /// Z coordinate (in chunks, not world units).
    pub z: i32,
}

impl ChunkCoord {
    /// Creates a new chunk coordinate.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Converts a world position to the chunk containing it.
    #[inline]
    #[must_use]
    pub fn from_world_pos(world_x: f64, world_z: f64, chunk_size: f64) -> Self {
        Self {
            x: (world_x / chunk_size).floor() as i32,
            z: (world_z / chunk_size).floor() as i32,
        }
    }

    /// Returns the coordinate shifted by `(dx, dz)` chunks.
    #[inline]
    #[must_use]
    pub const fn offset(self, dx: i32, dz: i32) -> Self {
        Self {
            x: self.x.wrapping_add(dx),
            z: self.z.wrapping_add(dz),
        }
    }

    /// Returns the chunk across the given edge.
    #[inline]
    #[must_use]
    pub const fn neighbor(self, side: Side) -> Self {
        let (dx, dz) = side.offset();
        self.offset(dx, dz)
    }

    /// Chebyshev distance in chunks.
    #[inline]
    #[must_use]
    pub fn chebyshev_distance(self, other: Self) -> i32 {
        (self.x - other.x).abs().max((self.z - other.z).abs())
    }
}

impl fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

/// One of the four edges of a chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    /// Row `j = 0` (toward -z).
    North,
    /// Row `j = n - 1` (toward +z).
    South,
    /// Column `i = n - 1` (toward +x).
    East,
    /// Column `i = 0` (toward -x).
    West,
}

impl Side {
    /// All sides in storage order.
    pub const ALL: [Self; 4] = [Self::North, Self::South, Self::East, Self::West];

    /// Storage index of this side.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::North => 0,
            Self::South => 1,
            Self::East => 2,
            Self::West => 3,
        }
    }

    /// The side a neighbour sees when looking back at us.
    #[inline]
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::North => Self::South,
            Self::South => Self::North,
            Self::East => Self::West,
            Self::West => Self::East,
        }
    }

    /// Chunk offset `(dx, dz)` toward the neighbour across this side.
    #[inline]
    #[must_use]
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Self::North => (0, -1),
            Self::South => (0, 1),
            Self::East => (1, 0),
            Self::West => (-1, 0),
        }
    }

    /// The corners at the first and last sample of this edge.
    #[inline]
    #[must_use]
    pub const fn endpoints(self) -> (Corner, Corner) {
        match self {
            Self::North => (Corner::NorthWest, Corner::NorthEast),
            Self::South => (Corner::SouthWest, Corner::SouthEast),
            Self::East => (Corner::NorthEast, Corner::SouthEast),
            Self::West => (Corner::NorthWest, Corner::SouthWest),
        }
    }

    /// Grid index `(i, j)` of sample `k` along this edge.
    #[inline]
    #[must_use]
    pub const fn vertex(self, k: usize, n: usize) -> (usize, usize) {
        match self {
            Self::North => (k, 0),
            Self::South => (k, n - 1),
            Self::East => (n - 1, k),
            Self::West => (0, k),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::North => "north",
            Self::South => "south",
            Self::East => "east",
            Self::West => "west",
        };
        f.write_str(name)
    }
}

/// One of the four corners of a chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Corner {
    /// Vertex `(0, 0)`.
    NorthWest,
    /// Vertex `(n - 1, 0)`.
    NorthEast,
    /// Vertex `(0, n - 1)`.
    SouthWest,
    /// Vertex `(n - 1, n - 1)`.
    SouthEast,
}

impl Corner {
    /// All corners in storage order.
    pub const ALL: [Self; 4] = [
        Self::NorthWest,
        Self::NorthEast,
        Self::SouthWest,
        Self::SouthEast,
    ];

    /// Storage index of this corner.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::NorthWest => 0,
            Self::NorthEast => 1,
            Self::SouthWest => 2,
            Self::SouthEast => 3,
        }
    }

    /// Grid index `(i, j)` of this corner.
    #[inline]
    #[must_use]
    pub const fn vertex(self, n: usize) -> (usize, usize) {
        match self {
            Self::NorthWest => (0, 0),
            Self::NorthEast => (n - 1, 0),
            Self::SouthWest => (0, n - 1),
            Self::SouthEast => (n - 1, n - 1),
        }
    }

    /// Position in the unit square of the chunk, `(u, v)`.
    #[inline]
    #[must_use]
    pub const fn unit_position(self) -> (f64, f64) {
        match self {
            Self::NorthWest => (0.0, 0.0),
            Self::NorthEast => (1.0, 0.0),
            Self::SouthWest => (0.0, 1.0),
            Self::SouthEast => (1.0, 1.0),
        }
    }

    /// The two edges that meet at this corner.
    #[inline]
    #[must_use]
    pub const fn sides(self) -> [Side; 2] {
        match self {
            Self::NorthWest => [Side::North, Side::West],
            Self::NorthEast => [Side::North, Side::East],
            Self::SouthWest => [Side::South, Side::West],
            Self::SouthEast => [Side::South, Side::East],
        }
    }

    /// The other chunks sharing this lattice point, as `((dx, dz), their corner)`.
    ///
    /// Order: horizontal neighbour, vertical neighbour, diagonal neighbour.
    #[must_use]
    pub const fn sharers(self) -> [((i32, i32), Self); 3] {
        match self {
            Self::NorthWest => [
                ((-1, 0), Self::NorthEast),
                ((0, -1), Self::SouthWest),
                ((-1, -1), Self::SouthEast),
            ],
            Self::NorthEast => [
                ((1, 0), Self::NorthWest),
                ((0, -1), Self::SouthEast),
                ((1, -1), Self::SouthWest),
            ],
            Self::SouthWest => [
                ((-1, 0), Self::SouthEast),
                ((0, 1), Self::NorthWest),
                ((-1, 1), Self::NorthEast),
            ],
            Self::SouthEast => [
                ((1, 0), Self::SouthWest),
                ((0, 1), Self::NorthEast),
                ((1, 1), Self::NorthWest),
            ],
        }
    }
}

impl fmt::Display for Corner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NorthWest => "north-west",
            Self::NorthEast => "north-east",
            Self::SouthWest => "south-west",
            Self::SouthEast => "south-east",
        };
        f.write_str(name)
    }
}

/// Maps grid vertices to world positions.
///
/// Positions are derived from the global lattice index, so a vertex shared
/// by two chunks evaluates to the bit-identical world coordinate from both.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridLayout {
    chunk_size: f64,
    vertices: usize,
    step: f64,
}

impl GridLayout {
    /// Creates a layout. Callers validate `chunk_size > 0` and `vertices >= 3`.
    #[must_use]
    pub fn new(chunk_size: f64, vertices: usize) -> Self {
        Self {
            chunk_size,
            vertices,
            step: chunk_size / (vertices - 1) as f64,
        }
    }

    /// Chunk edge length in world units.
    #[inline]
    #[must_use]
    pub const fn chunk_size(&self) -> f64 {
        self.chunk_size
    }

    /// Samples per edge.
    #[inline]
    #[must_use]
    pub const fn vertices(&self) -> usize {
        self.vertices
    }

    /// Distance between adjacent vertices.
    #[inline]
    #[must_use]
    pub const fn step(&self) -> f64 {
        self.step
    }

    /// World position of vertex `(i, j)` of `coord`.
    #[inline]
    #[must_use]
    pub fn world_position(&self, coord: ChunkCoord, i: usize, j: usize) -> (f64, f64) {
        let span = (self.vertices - 1) as i64;
        let gx = i64::from(coord.x) * span + i as i64;
        let gz = i64::from(coord.z) * span + j as i64;
        (gx as f64 * self.step, gz as f64 * self.step)
    }

    /// World position of the chunk's centre.
    #[inline]
    #[must_use]
    pub fn center(&self, coord: ChunkCoord) -> (f64, f64) {
        (
            (f64::from(coord.x) + 0.5) * self.chunk_size,
            (f64::from(coord.z) + 0.5) * self.chunk_size,
        )
    }
}

/// How a height grid was produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GridOrigin {
    /// Normal synthesis.
    Generated,
    /// Flat substitute after a generation failure.
    Fallback,
}

/// Fully populated height samples for one chunk.
#[derive(Clone, Debug, PartialEq)]
pub struct HeightGrid {
    /// Chunk position in the world.
    pub coord: ChunkCoord,
    size: usize,
    /// Row-major samples, indexed as `[j * size + i]`.
    heights: Vec<f64>,
    origin: GridOrigin,
}

impl HeightGrid {
    /// Creates a grid with every sample at `elevation`.
    #[must_use]
    pub fn flat(coord: ChunkCoord, size: usize, elevation: f64, origin: GridOrigin) -> Self {
        Self {
            coord,
            size,
            heights: vec![elevation; size * size],
            origin,
        }
    }

    /// Samples per edge.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// How this grid was produced.
    #[inline]
    #[must_use]
    pub const fn origin(&self) -> GridOrigin {
        self.origin
    }

    /// True if this is a fallback substitute.
    ///
    /// A fallback is flat inside, but its borders keep any values neighbours
    /// had already committed, so it is not necessarily uniform.
    #[inline]
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.origin == GridOrigin::Fallback
    }

    /// Height at vertex `(i, j)`.
    #[inline]
    #[must_use]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.heights[j * self.size + i]
    }

    #[inline]
    pub(crate) fn set(&mut self, i: usize, j: usize, height: f64) {
        self.heights[j * self.size + i] = height;
    }

    /// Row-major samples.
    #[inline]
    #[must_use]
    pub fn heights(&self) -> &[f64] {
        &self.heights
    }

    /// Raw bytes of the samples, for upload by a mesh builder.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        cast_slice(&self.heights)
    }

    /// Samples along one edge, in ascending world-coordinate order.
    #[must_use]
    pub fn edge(&self, side: Side) -> Vec<f64> {
        (0..self.size)
            .map(|k| {
                let (i, j) = side.vertex(k, self.size);
                self.get(i, j)
            })
            .collect()
    }

    /// Sample at one corner.
    #[inline]
    #[must_use]
    pub fn corner(&self, corner: Corner) -> f64 {
        let (i, j) = corner.vertex(self.size);
        self.get(i, j)
    }

    /// Extracts all four edges and corners.
    #[must_use]
    pub fn border_set(&self) -> BorderSet {
        let mut set = BorderSet::default();
        for side in Side::ALL {
            set.set_edge(side, self.edge(side));
        }
        for corner in Corner::ALL {
            set.set_corner(corner, self.corner(corner));
        }
        set
    }

    /// Lowest and highest sample.
    #[must_use]
    pub fn min_max(&self) -> (f64, f64) {
        self.heights
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &h| {
                (lo.min(h), hi.max(h))
            })
    }

    /// True if every sample is bit-identical.
    #[must_use]
    pub fn is_uniform(&self) -> bool {
        let first = self.heights[0].to_bits();
        self.heights.iter().all(|h| h.to_bits() == first)
    }
}
