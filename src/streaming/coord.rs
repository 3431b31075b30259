//! Chunk grid coordinates

use std::fmt;

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Size of a chunk in world units (meters)
pub const CHUNK_SIZE: u32 = 32;

/// Integer coordinate identifying a chunk on the horizontal world grid
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkCoord {
    pub x: i32,
    pub z: i32,
}

impl ChunkCoord {
    /// Create a new chunk coordinate
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Convert world position to chunk coordinate (height is ignored)
    pub fn from_world_pos(pos: Vec3) -> Self {
        Self {
            x: (pos.x / CHUNK_SIZE as f32).floor() as i32,
            z: (pos.z / CHUNK_SIZE as f32).floor() as i32,
        }
    }

    /// Get the world-space origin (minimum corner) of this chunk at height 0
    pub fn world_origin(&self) -> Vec3 {
        Vec3::new(
            self.x as f32 * CHUNK_SIZE as f32,
            0.0,
            self.z as f32 * CHUNK_SIZE as f32,
        )
    }

    /// Coordinate shifted by a grid offset
    pub fn offset(&self, dx: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.z + dz)
    }

    /// Chebyshev (chessboard) distance in chunks. This is the metric used for
    /// LOD bands and buffer membership.
    pub fn chebyshev_distance(&self, other: ChunkCoord) -> u32 {
        let dx = self.x.abs_diff(other.x);
        let dz = self.z.abs_diff(other.z);
        dx.max(dz)
    }

    /// Squared Euclidean distance in chunks
    pub fn distance_squared(&self, other: ChunkCoord) -> u64 {
        let dx = self.x.abs_diff(other.x) as u64;
        let dz = self.z.abs_diff(other.z) as u64;
        (dx * dx).saturating_add(dz * dz)
    }
}

impl fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}
