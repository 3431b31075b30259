//! Level of Detail (LOD) bands for distance-based detail reduction
//!
//! Chunks are bucketed by their Chebyshev distance (in chunks) from the
//! player's chunk:
//! - Near:   0..=near band radius
//! - Mid:    ..=mid band radius
//! - Far:    ..=view distance
//! - Buffer: ..=buffer distance (pre-generated, not yet visible)
//!
//! Anything further is `Unloaded`. Each band maps to a terrain resolution
//! (vertices per chunk side) taken from the active profile.

use std::fmt;

use crate::streaming::profile::{PerformanceProfile, TerrainLodResolutions};

/// Discrete quality band, ordered nearest first
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LodTier {
    Near,
    Mid,
    Far,
    Buffer,
    Unloaded,
}

/// All resident tiers, nearest first
pub const LOD_TIERS: [LodTier; 4] = [LodTier::Near, LodTier::Mid, LodTier::Far, LodTier::Buffer];

impl LodTier {
    /// Whether chunks in this tier are inside the view distance
    pub fn is_visible(self) -> bool {
        matches!(self, LodTier::Near | LodTier::Mid | LodTier::Far)
    }

    /// Whether chunks in this tier are kept resident
    pub fn is_resident(self) -> bool {
        self != LodTier::Unloaded
    }
}

impl fmt::Display for LodTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LodTier::Near => "near",
            LodTier::Mid => "mid",
            LodTier::Far => "far",
            LodTier::Buffer => "buffer",
            LodTier::Unloaded => "unloaded",
        };
        f.write_str(name)
    }
}

/// Calculate LOD tier from Chebyshev distance in chunks
///
/// # Examples
/// ```
/// use worldstream::streaming::lod::{tier_from_distance, LodTier};
/// use worldstream::streaming::profile::{resolve, PerformanceMode};
///
/// let profile = resolve(PerformanceMode::Normal);
/// assert_eq!(tier_from_distance(0, &profile), LodTier::Near);
/// assert_eq!(tier_from_distance(3, &profile), LodTier::Mid);
/// assert_eq!(tier_from_distance(6, &profile), LodTier::Far);
/// assert_eq!(tier_from_distance(8, &profile), LodTier::Buffer);
/// assert_eq!(tier_from_distance(9, &profile), LodTier::Unloaded);
/// ```
pub fn tier_from_distance(distance: u32, profile: &PerformanceProfile) -> LodTier {
    if distance <= profile.lod_bands.near {
        LodTier::Near
    } else if distance <= profile.lod_bands.mid {
        LodTier::Mid
    } else if distance <= profile.view_distance {
        LodTier::Far
    } else if distance <= profile.buffer_distance {
        LodTier::Buffer
    } else {
        LodTier::Unloaded
    }
}

/// Terrain resolution (vertices per chunk side) for a tier
///
/// `Unloaded` has no geometry and returns 0.
pub fn resolution_for_tier(tier: LodTier, lod: &TerrainLodResolutions) -> u32 {
    match tier {
        LodTier::Near => lod.near,
        LodTier::Mid => lod.mid,
        LodTier::Far => lod.far,
        LodTier::Buffer => lod.buffer,
        LodTier::Unloaded => 0,
    }
}
