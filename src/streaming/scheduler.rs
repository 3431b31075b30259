//! Frame-budgeted generation scheduler.
//!
//! Each frame the scheduler diffs the desired chunk set against the resident
//! chunk states and emits a bounded batch of actions:
//! - `resident - desired`: evicted, unconditionally and in the same frame
//! - `desired - resident`: admitted at `Absent`, terrain queued if quota allows
//! - `desired ∩ resident`: next pipeline step queued if quota allows, LOD band
//!   changes recorded, stale terrain refined
//!
//! Quotas are independent per [`WorkKind`]. Work that does not fit is simply
//! not emitted; the next frame's diff finds it again, nearest first.

use std::collections::{HashMap, HashSet};

use crate::streaming::coord::ChunkCoord;
use crate::streaming::density::{DensityController, PopulationParams};
use crate::streaming::lod::{resolution_for_tier, LodTier};
use crate::streaming::profile::PerformanceProfile;
use crate::streaming::quota::FrameQuota;
use crate::streaming::spatial::DesiredChunk;
use crate::streaming::state::{ChunkState, WorkKind};

/// One scheduling decision
#[derive(Clone, Debug, PartialEq)]
pub enum ChunkAction {
    /// Tear down a chunk that left the buffer radius
    Evict { coord: ChunkCoord },
    /// Create an `Absent` state for a chunk entering the buffer radius
    Admit { coord: ChunkCoord, lod: LodTier },
    /// Record a band change for a resident chunk
    Retier { coord: ChunkCoord, from: LodTier, to: LodTier },
    /// `Absent -> TerrainQueued`
    QueueTerrain { coord: ChunkCoord, lod: LodTier, resolution: u32 },
    /// Rebuild terrain built for a different band; the stage is unchanged
    RefineTerrain { coord: ChunkCoord, lod: LodTier, resolution: u32 },
    /// `TerrainReady -> StructuresQueued`
    QueueStructures { coord: ChunkCoord, params: PopulationParams },
    /// `StructuresReady -> EnvironmentQueued`
    QueueEnvironment { coord: ChunkCoord, params: PopulationParams },
}

impl ChunkAction {
    pub fn coord(&self) -> ChunkCoord {
        match *self {
            ChunkAction::Evict { coord }
            | ChunkAction::Admit { coord, .. }
            | ChunkAction::Retier { coord, .. }
            | ChunkAction::QueueTerrain { coord, .. }
            | ChunkAction::RefineTerrain { coord, .. }
            | ChunkAction::QueueStructures { coord, .. }
            | ChunkAction::QueueEnvironment { coord, .. } => coord,
        }
    }

    /// Quota category this action consumed, if any
    pub fn work_kind(&self) -> Option<WorkKind> {
        match self {
            ChunkAction::QueueTerrain { .. } | ChunkAction::RefineTerrain { .. } => Some(WorkKind::Terrain),
            ChunkAction::QueueStructures { .. } => Some(WorkKind::Structures),
            ChunkAction::QueueEnvironment { .. } => Some(WorkKind::Environment),
            ChunkAction::Evict { .. } | ChunkAction::Admit { .. } | ChunkAction::Retier { .. } => None,
        }
    }
}

/// Actions for one frame, in application order
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameBatch {
    pub actions: Vec<ChunkAction>,
    /// Work items that were ready but did not fit this frame's quota
    pub deferred: usize,
}

impl FrameBatch {
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChunkAction> {
        self.actions.iter()
    }

    /// Number of actions drawing on `kind`'s quota
    pub fn work_count(&self, kind: WorkKind) -> usize {
        self.actions.iter().filter(|a| a.work_kind() == Some(kind)).count()
    }

    /// Coordinates evicted this frame
    pub fn evictions(&self) -> impl Iterator<Item = ChunkCoord> + '_ {
        self.actions.iter().filter_map(|a| match a {
            ChunkAction::Evict { coord } => Some(*coord),
            _ => None,
        })
    }
}

/// Turns the desired chunk set into bounded per-frame work
#[derive(Clone, Debug, Default)]
pub struct GenerationScheduler {
    density: DensityController,
}

impl GenerationScheduler {
    pub fn new(density: DensityController) -> Self {
        Self { density }
    }

    pub fn density(&self) -> &DensityController {
        &self.density
    }

    /// Plan one frame under the profile's quotas
    pub fn step(
        &self,
        desired: &[DesiredChunk],
        resident: &HashMap<ChunkCoord, ChunkState>,
        profile: &PerformanceProfile,
    ) -> FrameBatch {
        self.step_with_quota(desired, resident, profile, FrameQuota::from_profile(profile))
    }

    /// Plan one frame under an explicit quota
    pub fn step_with_quota(
        &self,
        desired: &[DesiredChunk],
        resident: &HashMap<ChunkCoord, ChunkState>,
        profile: &PerformanceProfile,
        mut quota: FrameQuota,
    ) -> FrameBatch {
        let mut batch = FrameBatch::default();
        let wanted: HashSet<ChunkCoord> = desired.iter().map(|d| d.coord).collect();

        // Evictions first, in a stable order
        let mut leaving: Vec<ChunkCoord> = resident
            .keys()
            .filter(|coord| !wanted.contains(coord))
            .copied()
            .collect();
        leaving.sort_unstable();
        batch
            .actions
            .extend(leaving.into_iter().map(|coord| ChunkAction::Evict { coord }));

        for d in desired {
            match resident.get(&d.coord) {
                None => {
                    batch.actions.push(ChunkAction::Admit { coord: d.coord, lod: d.lod });
                    self.schedule_work(WorkKind::Terrain, d, profile, &mut quota, &mut batch);
                }
                Some(state) => {
                    if state.lod() != d.lod {
                        batch.actions.push(ChunkAction::Retier {
                            coord: d.coord,
                            from: state.lod(),
                            to: d.lod,
                        });
                    }

                    if let Some(kind) = state.stage().next_work() {
                        self.schedule_work(kind, d, profile, &mut quota, &mut batch);
                    }

                    let stale_mesh = state.mesh_lod().is_some_and(|mesh| mesh != d.lod);
                    if state.stage().has_terrain() && stale_mesh && !state.refine_pending() {
                        if quota.try_take(WorkKind::Terrain) {
                            batch.actions.push(ChunkAction::RefineTerrain {
                                coord: d.coord,
                                lod: d.lod,
                                resolution: resolution_for_tier(d.lod, &profile.terrain_lod),
                            });
                        } else {
                            batch.deferred += 1;
                        }
                    }
                }
            }
        }

        if !batch.is_empty() {
            log::trace!(
                "Scheduled {} actions (terrain {}, structures {}, environment {}, deferred {})",
                batch.len(),
                batch.work_count(WorkKind::Terrain),
                batch.work_count(WorkKind::Structures),
                batch.work_count(WorkKind::Environment),
                batch.deferred
            );
        }

        batch
    }

    fn schedule_work(
        &self,
        kind: WorkKind,
        d: &DesiredChunk,
        profile: &PerformanceProfile,
        quota: &mut FrameQuota,
        batch: &mut FrameBatch,
    ) {
        if !quota.try_take(kind) {
            batch.deferred += 1;
            return;
        }

        let action = match kind {
            WorkKind::Terrain => ChunkAction::QueueTerrain {
                coord: d.coord,
                lod: d.lod,
                resolution: resolution_for_tier(d.lod, &profile.terrain_lod),
            },
            WorkKind::Structures => ChunkAction::QueueStructures {
                coord: d.coord,
                params: self.density.population_params(d.coord, profile),
            },
            WorkKind::Environment => ChunkAction::QueueEnvironment {
                coord: d.coord,
                params: self.density.population_params(d.coord, profile),
            },
        };
        batch.actions.push(action);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::profile::{resolve, PerformanceMode};
    use crate::streaming::spatial::desired_chunks;
    use crate::streaming::state::GenerationStage;

    fn resident_at(coords: &[(ChunkCoord, LodTier)]) -> HashMap<ChunkCoord, ChunkState> {
        coords
            .iter()
            .enumerate()
            .map(|(i, &(coord, lod))| (coord, ChunkState::new(coord, lod, i as u64, 0)))
            .collect()
    }

    #[test]
    fn test_first_frame_minimal_single_terrain() {
        let profile = resolve(PerformanceMode::Minimal);
        assert_eq!(profile.chunks_per_frame, 1);
        assert_eq!(profile.buffer_distance, 3);

        let scheduler = GenerationScheduler::default();
        let desired = desired_chunks(ChunkCoord::new(0, 0), &profile);
        let batch = scheduler.step(&desired, &HashMap::new(), &profile);

        let admits = batch.iter().filter(|a| matches!(a, ChunkAction::Admit { .. })).count();
        assert_eq!(admits, 49);
        assert_eq!(batch.work_count(WorkKind::Terrain), 1);
        assert_eq!(batch.work_count(WorkKind::Structures), 0);
        assert_eq!(batch.deferred, 48);

        let queued: Vec<_> = batch
            .iter()
            .filter(|a| matches!(a, ChunkAction::QueueTerrain { .. }))
            .collect();
        assert_eq!(
            queued[0],
            &ChunkAction::QueueTerrain {
                coord: ChunkCoord::new(0, 0),
                lod: LodTier::Near,
                resolution: 32,
            }
        );
    }

    #[test]
    fn test_quota_respected_per_category() {
        let profile = resolve(PerformanceMode::Normal);
        let scheduler = GenerationScheduler::default();
        let desired = desired_chunks(ChunkCoord::new(0, 0), &profile);

        // Build a resident map with chunks waiting at every stage
        let mut resident = HashMap::new();
        for (i, d) in desired.iter().enumerate() {
            let mut state = ChunkState::new(d.coord, d.lod, i as u64, 0);
            let kinds = match i % 3 {
                0 => vec![],
                1 => vec![WorkKind::Terrain],
                _ => vec![WorkKind::Terrain, WorkKind::Structures],
            };
            for kind in kinds {
                state.begin(kind).unwrap();
                state.complete(kind).unwrap();
            }
            resident.insert(d.coord, state);
        }

        let batch = scheduler.step(&desired, &resident, &profile);
        assert_eq!(batch.work_count(WorkKind::Terrain), profile.chunks_per_frame as usize);
        assert_eq!(batch.work_count(WorkKind::Structures), profile.structure_chunks_per_frame as usize);
        assert_eq!(batch.work_count(WorkKind::Environment), profile.env_chunks_per_frame as usize);
        assert!(batch.evictions().next().is_none());
    }

    #[test]
    fn test_evictions_ignore_quota_and_come_first() {
        let profile = resolve(PerformanceMode::Minimal);
        let scheduler = GenerationScheduler::default();
        let desired = desired_chunks(ChunkCoord::new(0, 0), &profile);

        let far = [
            (ChunkCoord::new(10, 10), LodTier::Near),
            (ChunkCoord::new(-10, 4), LodTier::Far),
            (ChunkCoord::new(4, 0), LodTier::Buffer),
        ];
        let resident = resident_at(&far);

        let batch = scheduler.step_with_quota(&desired, &resident, &profile, FrameQuota::new(0, 0, 0));
        let evicted: Vec<_> = batch.evictions().collect();
        assert_eq!(
            evicted,
            vec![ChunkCoord::new(-10, 4), ChunkCoord::new(4, 0), ChunkCoord::new(10, 10)]
        );
        for (i, action) in batch.iter().take(3).enumerate() {
            assert_eq!(action, &ChunkAction::Evict { coord: evicted[i] });
        }
    }

    #[test]
    fn test_no_work_for_queued_or_complete_chunks() {
        let profile = resolve(PerformanceMode::Minimal);
        let scheduler = GenerationScheduler::default();
        let center = ChunkCoord::new(0, 0);
        let desired = vec![DesiredChunk { coord: center, lod: LodTier::Near }];

        let mut state = ChunkState::new(center, LodTier::Near, 1, 0);
        state.begin(WorkKind::Terrain).unwrap();
        let mut resident = HashMap::from([(center, state)]);

        let batch = scheduler.step(&desired, &resident, &profile);
        assert!(batch.is_empty());
        assert_eq!(batch.deferred, 0);

        let state = resident.get_mut(&center).unwrap();
        state.complete(WorkKind::Terrain).unwrap();
        for kind in [WorkKind::Structures, WorkKind::Environment] {
            state.begin(kind).unwrap();
            state.complete(kind).unwrap();
        }
        assert_eq!(state.stage(), GenerationStage::FullyPopulated);

        let batch = scheduler.step(&desired, &resident, &profile);
        assert!(batch.is_empty());
    }

    #[test]
    fn test_retier_and_refine() {
        let profile = resolve(PerformanceMode::Normal);
        let scheduler = GenerationScheduler::default();
        let coord = ChunkCoord::new(3, 0);

        let mut state = ChunkState::new(coord, LodTier::Near, 1, 0);
        state.begin(WorkKind::Terrain).unwrap();
        state.complete(WorkKind::Terrain).unwrap();
        let mut world = hecs::World::new();
        state.attach_terrain(world.spawn((0u8,)), LodTier::Near);
        let resident = HashMap::from([(coord, state)]);

        let desired = vec![DesiredChunk { coord, lod: LodTier::Mid }];
        let batch = scheduler.step_with_quota(&desired, &resident, &profile, FrameQuota::new(1, 0, 0));

        assert_eq!(
            batch.actions,
            vec![
                ChunkAction::Retier { coord, from: LodTier::Near, to: LodTier::Mid },
                ChunkAction::RefineTerrain { coord, lod: LodTier::Mid, resolution: 32 },
            ]
        );
        // the structure step wanted quota but had none
        assert_eq!(batch.deferred, 1);
    }

    #[test]
    fn test_refine_waits_for_pending_job() {
        let profile = resolve(PerformanceMode::Normal);
        let scheduler = GenerationScheduler::default();
        let coord = ChunkCoord::new(5, 0);

        let mut state = ChunkState::new(coord, LodTier::Far, 1, 0);
        state.begin(WorkKind::Terrain).unwrap();
        state.complete(WorkKind::Terrain).unwrap();
        let mut world = hecs::World::new();
        state.attach_terrain(world.spawn((0u8,)), LodTier::Near);
        state.begin_refine();
        let resident = HashMap::from([(coord, state)]);

        let desired = vec![DesiredChunk { coord, lod: LodTier::Far }];
        let batch = scheduler.step_with_quota(&desired, &resident, &profile, FrameQuota::new(5, 0, 0));
        assert_eq!(batch.work_count(WorkKind::Terrain), 0);
    }

    #[test]
    fn test_population_params_carried() {
        let profile = resolve(PerformanceMode::Minimal);
        let scheduler = GenerationScheduler::default();
        let coord = ChunkCoord::new(1, 0);

        let mut state = ChunkState::new(coord, LodTier::Near, 1, 0);
        state.begin(WorkKind::Terrain).unwrap();
        state.complete(WorkKind::Terrain).unwrap();
        let resident = HashMap::from([(coord, state)]);

        let desired = vec![DesiredChunk { coord, lod: LodTier::Near }];
        let batch = scheduler.step(&desired, &resident, &profile);
        assert_eq!(
            batch.actions,
            vec![ChunkAction::QueueStructures {
                coord,
                params: scheduler.density().population_params(coord, &profile),
            }]
        );
    }

    #[test]
    fn test_deterministic() {
        let profile = resolve(PerformanceMode::Normal);
        let scheduler = GenerationScheduler::default();
        let desired = desired_chunks(ChunkCoord::new(2, -7), &profile);
        let resident = resident_at(&[
            (ChunkCoord::new(30, 30), LodTier::Near),
            (ChunkCoord::new(-30, 1), LodTier::Near),
            (ChunkCoord::new(2, -7), LodTier::Mid),
        ]);

        let a = scheduler.step(&desired, &resident, &profile);
        let b = scheduler.step(&desired, &resident, &profile);
        assert_eq!(a, b);
    }

    #[test]
    fn test_action_accessors() {
        let coord = ChunkCoord::new(1, 1);
        let action = ChunkAction::Retier { coord, from: LodTier::Near, to: LodTier::Far };
        assert_eq!(action.coord(), coord);
        assert_eq!(action.work_kind(), None);

        let action = ChunkAction::RefineTerrain { coord, lod: LodTier::Far, resolution: 16 };
        assert_eq!(action.work_kind(), Some(WorkKind::Terrain));
    }
}
