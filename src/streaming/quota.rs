//! Per-frame work quotas
//!
//! Each work category draws from its own budget, reset every frame from the
//! active profile. Work that does not fit is deferred to a later frame by the
//! scheduler; it is never dropped.

use crate::core::InvariantViolation;
use crate::streaming::profile::PerformanceProfile;
use crate::streaming::state::WorkKind;

/// Remaining units of work for the current frame
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameQuota {
    /// Terrain generation and refinement jobs
    terrain: u32,
    /// Structure placement jobs
    structures: u32,
    /// Environment population jobs
    environment: u32,
}

impl FrameQuota {
    /// Create a quota with explicit limits
    pub fn new(terrain: u32, structures: u32, environment: u32) -> Self {
        Self {
            terrain,
            structures,
            environment,
        }
    }

    /// Fresh per-frame quota from a profile
    pub fn from_profile(profile: &PerformanceProfile) -> Self {
        Self::new(
            profile.chunks_per_frame,
            profile.structure_chunks_per_frame,
            profile.env_chunks_per_frame,
        )
    }

    /// No limit in any category
    pub fn unlimited() -> Self {
        Self::new(u32::MAX, u32::MAX, u32::MAX)
    }

    // --- Query methods ---

    /// Units left for a category
    pub fn remaining(&self, kind: WorkKind) -> u32 {
        match kind {
            WorkKind::Terrain => self.terrain,
            WorkKind::Structures => self.structures,
            WorkKind::Environment => self.environment,
        }
    }

    /// Whether one more unit of `kind` fits this frame
    pub fn can_take(&self, kind: WorkKind) -> bool {
        self.remaining(kind) > 0
    }

    /// Whether every category is spent
    pub fn is_exhausted(&self) -> bool {
        self.terrain == 0 && self.structures == 0 && self.environment == 0
    }

    // --- Accounting ---

    /// Consume one unit of `kind`.
    ///
    /// Taking from an empty category is a scheduler defect, so it is reported
    /// rather than saturating.
    pub fn take(&mut self, kind: WorkKind) -> Result<(), InvariantViolation> {
        let slot = match kind {
            WorkKind::Terrain => &mut self.terrain,
            WorkKind::Structures => &mut self.structures,
            WorkKind::Environment => &mut self.environment,
        };
        *slot = slot
            .checked_sub(1)
            .ok_or(InvariantViolation::QuotaExhausted(kind))?;
        Ok(())
    }

    /// Consume one unit if available
    pub fn try_take(&mut self, kind: WorkKind) -> bool {
        self.can_take(kind) && self.take(kind).is_ok()
    }
}
