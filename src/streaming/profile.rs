//! Performance profiles: every tunable that trades quality for speed.
//!
//! A profile is resolved once per mode change and is read-only afterwards.
//! The built-in table has two entries, `normal` and `minimal`; a custom
//! ordered table of named profiles can be loaded from JSON.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};

/// Name of the fallback profile
pub const NORMAL: &str = "normal";
/// Name of the GPU-light profile
pub const MINIMAL: &str = "minimal";
/// Largest accepted buffer radius in chunks
pub const MAX_BUFFER_DISTANCE: u32 = 1024;

/// Two-valued mode selected by user settings
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum PerformanceMode {
    #[default]
    Normal,
    Minimal,
}

impl PerformanceMode {
    /// Map the settings toggle ("minimal mode enabled") to a mode
    pub fn from_flag(minimal: bool) -> Self {
        if minimal { Self::Minimal } else { Self::Normal }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => NORMAL,
            Self::Minimal => MINIMAL,
        }
    }
}

impl fmt::Display for PerformanceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PerformanceMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            NORMAL => Ok(Self::Normal),
            MINIMAL => Ok(Self::Minimal),
            other => Err(Error::Config(format!("unknown performance mode '{}'", other))),
        }
    }
}

/// Terrain vertex density (vertices per chunk side) per LOD band
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerrainLodResolutions {
    pub near: u32,
    pub mid: u32,
    pub far: u32,
    pub buffer: u32,
}

/// Outer radii (Chebyshev, in chunks) of the near and mid bands.
/// The far band ends at the view distance, the buffer band at the buffer distance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LodBands {
    pub near: u32,
    pub mid: u32,
}

/// Immutable bundle of every quality/performance tunable
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PerformanceProfile {
    /// Profile name
    pub name: String,
    /// Terrain resolution per band
    pub terrain_lod: TerrainLodResolutions,
    /// Band boundaries inside the view distance
    pub lod_bands: LodBands,
    /// Visible radius in chunks
    pub view_distance: u32,
    /// Pre-generation radius in chunks, never below the view distance
    pub buffer_distance: u32,
    /// Terrain generation/refinement jobs per frame
    pub chunks_per_frame: u32,
    /// Structure placement jobs per frame
    pub structure_chunks_per_frame: u32,
    /// Environment population jobs per frame
    pub env_chunks_per_frame: u32,
    /// Multiplier on baseline environment object counts (0.0-1.0)
    pub environment_density: f32,
    /// Multiplier on baseline structure counts (0.0-1.0)
    pub structure_density: f32,
    /// Radius in chunks beyond which nothing casts a shadow.
    /// `None` is unbounded, `Some(0)` disables shadows.
    pub shadow_caster_distance: Option<u32>,
}

impl PerformanceProfile {
    /// Full-quality profile
    pub fn normal() -> Self {
        Self {
            name: NORMAL.to_string(),
            terrain_lod: TerrainLodResolutions { near: 64, mid: 32, far: 16, buffer: 8 },
            lod_bands: LodBands { near: 2, mid: 4 },
            view_distance: 6,
            buffer_distance: 8,
            chunks_per_frame: 4,
            structure_chunks_per_frame: 2,
            env_chunks_per_frame: 2,
            environment_density: 1.0,
            structure_density: 1.0,
            shadow_caster_distance: None,
        }
    }

    /// GPU-light profile: coarser terrain, shorter radii, sparser population, no shadows
    pub fn minimal() -> Self {
        Self {
            name: MINIMAL.to_string(),
            terrain_lod: TerrainLodResolutions { near: 32, mid: 16, far: 8, buffer: 4 },
            lod_bands: LodBands { near: 1, mid: 2 },
            view_distance: 2,
            buffer_distance: 3,
            chunks_per_frame: 1,
            structure_chunks_per_frame: 1,
            env_chunks_per_frame: 1,
            environment_density: 0.35,
            structure_density: 0.5,
            shadow_caster_distance: Some(0),
        }
    }

    /// Whether an object `distance` chunks from the player may cast a shadow
    pub fn casts_shadow(&self, distance: u32) -> bool {
        match self.shadow_caster_distance {
            None => true,
            Some(0) => false,
            Some(max) => distance <= max,
        }
    }

    /// Check band ordering and density ranges
    pub fn validate(&self) -> Result<()> {
        let bands = &self.lod_bands;
        if !(bands.near <= bands.mid
            && bands.mid <= self.view_distance
            && self.view_distance <= self.buffer_distance)
        {
            return Err(Error::Config(format!(
                "profile '{}': bands must satisfy near ({}) <= mid ({}) <= view ({}) <= buffer ({})",
                self.name, bands.near, bands.mid, self.view_distance, self.buffer_distance
            )));
        }
        if self.buffer_distance > MAX_BUFFER_DISTANCE {
            return Err(Error::Config(format!(
                "profile '{}': buffer distance {} exceeds {}",
                self.name, self.buffer_distance, MAX_BUFFER_DISTANCE
            )));
        }
        for (label, density) in [
            ("environment_density", self.environment_density),
            ("structure_density", self.structure_density),
        ] {
            if !(0.0..=1.0).contains(&density) {
                return Err(Error::Config(format!(
                    "profile '{}': {} {} outside [0, 1]",
                    self.name, label, density
                )));
            }
        }
        Ok(())
    }
}

/// Ordered list of named profiles
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileTable {
    profiles: Vec<PerformanceProfile>,
}

impl Default for ProfileTable {
    fn default() -> Self {
        Self {
            profiles: vec![PerformanceProfile::normal(), PerformanceProfile::minimal()],
        }
    }
}

impl ProfileTable {
    /// Build a validated table. Names must be unique and `normal` must exist.
    pub fn new(profiles: Vec<PerformanceProfile>) -> Result<Self> {
        let table = Self { profiles };
        table.validate()?;
        Ok(table)
    }

    /// Parse and validate a JSON array of profiles
    pub fn from_json(json: &str) -> Result<Self> {
        let table: Self = serde_json::from_str(json)?;
        table.validate()?;
        Ok(table)
    }

    /// Load and validate a JSON profile table file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&data)
    }

    pub fn validate(&self) -> Result<()> {
        for (i, profile) in self.profiles.iter().enumerate() {
            profile.validate()?;
            if self.profiles[..i].iter().any(|p| p.name == profile.name) {
                return Err(Error::Config(format!("duplicate profile '{}'", profile.name)));
            }
        }
        if self.get(NORMAL).is_none() {
            return Err(Error::Config("profile table has no 'normal' entry".into()));
        }
        Ok(())
    }

    /// Look up a profile by exact name
    pub fn get(&self, name: &str) -> Option<&PerformanceProfile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    /// Profile names in table order
    pub fn names(&self) -> Vec<&str> {
        self.profiles.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

/// Maps a mode name to a concrete profile
#[derive(Clone, Debug, Default)]
pub struct ProfileResolver {
    table: ProfileTable,
}

impl ProfileResolver {
    pub fn new(table: ProfileTable) -> Self {
        Self { table }
    }

    /// Resolve a mode name. Total: unknown names fall back to `normal`.
    pub fn resolve(&self, mode: &str) -> PerformanceProfile {
        let key = mode.trim().to_ascii_lowercase();
        if let Some(profile) = self.table.get(&key) {
            return profile.clone();
        }
        log::warn!("Unknown performance mode '{}', falling back to '{}'", mode, NORMAL);
        self.table
            .get(NORMAL)
            .cloned()
            .unwrap_or_else(PerformanceProfile::normal)
    }

    pub fn resolve_mode(&self, mode: PerformanceMode) -> PerformanceProfile {
        self.resolve(mode.as_str())
    }

    pub fn table(&self) -> &ProfileTable {
        &self.table
    }
}

/// Resolve a mode against the built-in table
pub fn resolve(mode: PerformanceMode) -> PerformanceProfile {
    match mode {
        PerformanceMode::Normal => PerformanceProfile::normal(),
        PerformanceMode::Minimal => PerformanceProfile::minimal(),
    }
}
