//! Per-chunk population counts derived from the profile densities.
//!
//! Counts depend only on the world seed, the chunk coordinate and the
//! profile: no external randomness, and float rounding is a single
//! round-half-up on an f64 product so results agree across platforms.

use serde::{Deserialize, Serialize};

use crate::streaming::coord::ChunkCoord;
use crate::streaming::profile::PerformanceProfile;

/// Baseline per-chunk population before density scaling
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationBaseline {
    /// Minimum structures per chunk at full density
    pub structures: u32,
    /// Extra structures added by the chunk seed (0..=spread)
    pub structure_spread: u32,
    /// Minimum environment objects per chunk at full density
    pub environment: u32,
    /// Extra environment objects added by the chunk seed (0..=spread)
    pub environment_spread: u32,
}

impl Default for PopulationBaseline {
    fn default() -> Self {
        Self {
            structures: 4,
            structure_spread: 2,
            environment: 24,
            environment_spread: 8,
        }
    }
}

/// Population handed to the placement collaborator
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PopulationParams {
    pub structure_count: u32,
    pub environment_count: u32,
    /// Chunk-local seed for placement randomness
    pub seed: u64,
}

/// Derives population parameters for newly scheduled chunks
#[derive(Clone, Debug)]
pub struct DensityController {
    world_seed: u32,
    baseline: PopulationBaseline,
}

impl DensityController {
    pub fn new(world_seed: u32, baseline: PopulationBaseline) -> Self {
        Self { world_seed, baseline }
    }

    pub fn baseline(&self) -> &PopulationBaseline {
        &self.baseline
    }

    /// Population for `coord` under `profile`
    pub fn population_params(&self, coord: ChunkCoord, profile: &PerformanceProfile) -> PopulationParams {
        let seed = chunk_seed(self.world_seed, coord);

        // Independent bit ranges of the seed drive each spread
        let structure_raw = self
            .baseline
            .structures
            .saturating_add(spread(seed, self.baseline.structure_spread));
        let environment_raw = self
            .baseline
            .environment
            .saturating_add(spread(seed >> 32, self.baseline.environment_spread));

        PopulationParams {
            structure_count: scale_count(structure_raw, profile.structure_density),
            environment_count: scale_count(environment_raw, profile.environment_density),
            seed,
        }
    }
}

impl Default for DensityController {
    fn default() -> Self {
        Self::new(12345, PopulationBaseline::default())
    }
}

/// Chunk-local seed: an integer hash of the coordinate and world seed
pub fn chunk_seed(world_seed: u32, coord: ChunkCoord) -> u64 {
    let mut h = (coord.x as u32 as u64).wrapping_mul(374761393)
        ^ (coord.z as u32 as u64).wrapping_mul(668265263).rotate_left(32)
        ^ (world_seed as u64).wrapping_mul(1274126177);
    // splitmix64 finalizer
    h = (h ^ (h >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    h = (h ^ (h >> 27)).wrapping_mul(0x94D049BB133111EB);
    h ^ (h >> 31)
}

fn spread(bits: u64, spread: u32) -> u32 {
    ((bits & 0xFFFF_FFFF) % (spread as u64 + 1)) as u32
}

/// Fixed-point scale for densities (four decimal places)
const DENSITY_SCALE: u64 = 10_000;

/// `floor(raw * density + 0.5)`, density clamped to [0, 1].
///
/// The density is snapped to four decimals first and the product is taken in
/// integers, so decimal densities like 0.35 hit exact halves.
pub fn scale_count(raw: u32, density: f32) -> u32 {
    let density = if density.is_nan() { 0.0 } else { density.clamp(0.0, 1.0) };
    let fixed = (density as f64 * DENSITY_SCALE as f64).round() as u64;
    ((raw as u64 * fixed + DENSITY_SCALE / 2) / DENSITY_SCALE) as u32
}
