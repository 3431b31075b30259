//! External collaborators the scheduler calls into, and the scene
//! components it spawns for their output.
//!
//! Builders run on worker threads and return plain data; only the tick
//! thread turns that data into entities in the scene world.

use std::sync::Arc;

use glam::Vec3;

use crate::core::Result;
use crate::streaming::coord::{ChunkCoord, CHUNK_SIZE};
use crate::streaming::density::PopulationParams;
use crate::streaming::lod::LodTier;

/// Heightfield geometry for one chunk
#[derive(Clone, Debug, PartialEq)]
pub struct TerrainMesh {
    pub coord: ChunkCoord,
    pub lod: LodTier,
    /// Vertices per side
    pub resolution: u32,
    /// Row-major `resolution * resolution` heights
    pub heights: Vec<f32>,
}

impl TerrainMesh {
    pub fn vertex_count(&self) -> usize {
        self.heights.len()
    }
}

/// What a placed object belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PlacementCategory {
    Structure,
    Environment,
}

/// One object returned by a placement function
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    /// Collaborator-defined object kind
    pub kind: u32,
    /// World-space position
    pub position: Vec3,
    pub scale: f32,
}

// --- Scene components ---

/// Tags every entity spawned for a chunk
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkOwned {
    pub coord: ChunkCoord,
    pub epoch: u64,
}

/// Placed structure or environment object
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlacedObject {
    pub category: PlacementCategory,
    pub kind: u32,
    pub position: Vec3,
    pub scale: f32,
}

/// Marker: the object may cast a shadow.
///
/// Set once when the placement is spawned, from the player's chunk distance
/// under the profile active at that moment. Later movement or profile
/// changes leave it as is.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ShadowCaster;

// --- Collaborator traits ---

/// Builds renderable terrain geometry for a chunk
pub trait TerrainBuilder: Send + Sync {
    fn build(&self, coord: ChunkCoord, lod: LodTier, resolution: u32) -> Result<TerrainMesh>;
}

/// Places structures and environment objects in a chunk
pub trait Populator: Send + Sync {
    fn place_structures(&self, coord: ChunkCoord, params: &PopulationParams) -> Result<Vec<Placement>>;
    fn place_environment(&self, coord: ChunkCoord, params: &PopulationParams) -> Result<Vec<Placement>>;
}

/// Shared handles to the collaborators, cloned into worker tasks
#[derive(Clone)]
pub struct Collaborators {
    pub terrain: Arc<dyn TerrainBuilder>,
    pub populator: Arc<dyn Populator>,
}

impl Collaborators {
    pub fn new(terrain: impl TerrainBuilder + 'static, populator: impl Populator + 'static) -> Self {
        Self {
            terrain: Arc::new(terrain),
            populator: Arc::new(populator),
        }
    }
}

impl Default for Collaborators {
    fn default() -> Self {
        Self::new(FlatTerrainBuilder::default(), ScatterPopulator)
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("terrain", &"<dyn TerrainBuilder>")
            .field("populator", &"<dyn Populator>")
            .finish()
    }
}

// --- Reference collaborators ---

/// Flat ground at a fixed height
#[derive(Clone, Copy, Debug)]
pub struct FlatTerrainBuilder {
    pub height: f32,
}

impl Default for FlatTerrainBuilder {
    fn default() -> Self {
        Self { height: 0.0 }
    }
}

impl TerrainBuilder for FlatTerrainBuilder {
    fn build(&self, coord: ChunkCoord, lod: LodTier, resolution: u32) -> Result<TerrainMesh> {
        let side = resolution as usize;
        Ok(TerrainMesh {
            coord,
            lod,
            resolution,
            heights: vec![self.height; side * side],
        })
    }
}

/// Scatters `count` objects uniformly over the chunk from the chunk seed
#[derive(Clone, Copy, Debug, Default)]
pub struct ScatterPopulator;

impl ScatterPopulator {
    fn scatter(coord: ChunkCoord, count: u32, mut state: u64, kinds: u32) -> Vec<Placement> {
        let origin = coord.world_origin();
        let size = CHUNK_SIZE as f32;

        (0..count)
            .map(|_| {
                let a = next_unit(&mut state);
                let b = next_unit(&mut state);
                let c = next_unit(&mut state);
                Placement {
                    kind: (next_u64(&mut state) % kinds as u64) as u32,
                    position: origin + Vec3::new(a * size, 0.0, b * size),
                    scale: 0.8 + 0.4 * c,
                }
            })
            .collect()
    }
}

impl Populator for ScatterPopulator {
    fn place_structures(&self, coord: ChunkCoord, params: &PopulationParams) -> Result<Vec<Placement>> {
        Ok(Self::scatter(coord, params.structure_count, params.seed, 4))
    }

    fn place_environment(&self, coord: ChunkCoord, params: &PopulationParams) -> Result<Vec<Placement>> {
        Ok(Self::scatter(coord, params.environment_count, params.seed.rotate_left(17), 16))
    }
}

/// xorshift64*
fn next_u64(state: &mut u64) -> u64 {
    if *state == 0 {
        *state = 0x9E3779B97F4A7C15;
    }
    *state ^= *state >> 12;
    *state ^= *state << 25;
    *state ^= *state >> 27;
    state.wrapping_mul(0x2545F4914F6CDD1D)
}

/// Uniform in [0, 1)
fn next_unit(state: &mut u64) -> f32 {
    (next_u64(state) >> 40) as f32 / (1u64 << 24) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(structures: u32, environment: u32, seed: u64) -> PopulationParams {
        PopulationParams {
            structure_count: structures,
            environment_count: environment,
            seed,
        }
    }

    #[test]
    fn test_flat_terrain_resolution() {
        let builder = FlatTerrainBuilder { height: 2.5 };
        let mesh = builder.build(ChunkCoord::new(1, 1), LodTier::Mid, 16).unwrap();

        assert_eq!(mesh.resolution, 16);
        assert_eq!(mesh.vertex_count(), 256);
        assert!(mesh.heights.iter().all(|&h| h == 2.5));
        assert_eq!(mesh.lod, LodTier::Mid);
    }

    #[test]
    fn test_scatter_counts_and_bounds() {
        let coord = ChunkCoord::new(-2, 3);
        let p = params(5, 12, 42);
        let structures = ScatterPopulator.place_structures(coord, &p).unwrap();
        let environment = ScatterPopulator.place_environment(coord, &p).unwrap();

        assert_eq!(structures.len(), 5);
        assert_eq!(environment.len(), 12);

        let origin = coord.world_origin();
        let size = CHUNK_SIZE as f32;
        for placement in structures.iter().chain(&environment) {
            assert!(placement.position.x >= origin.x && placement.position.x <= origin.x + size);
            assert!(placement.position.z >= origin.z && placement.position.z <= origin.z + size);
            assert!(placement.scale >= 0.8 && placement.scale <= 1.2);
        }
        assert!(structures.iter().all(|p| p.kind < 4));
        assert!(environment.iter().all(|p| p.kind < 16));
    }

    #[test]
    fn test_scatter_deterministic() {
        let coord = ChunkCoord::new(0, 0);
        let a = ScatterPopulator.place_environment(coord, &params(0, 8, 7)).unwrap();
        let b = ScatterPopulator.place_environment(coord, &params(0, 8, 7)).unwrap();
        let c = ScatterPopulator.place_environment(coord, &params(0, 8, 8)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_zero_seed_still_scatters() {
        let placed = ScatterPopulator.place_structures(ChunkCoord::new(0, 0), &params(3, 0, 0)).unwrap();
        assert_eq!(placed.len(), 3);
        assert!(placed.windows(2).any(|w| w[0].position != w[1].position));
    }
}
