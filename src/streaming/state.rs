//! Per-chunk lifecycle state.
//!
//! Each resident chunk walks a forward-only pipeline:
//!
//! ```text
//! Absent -> TerrainQueued -> TerrainReady -> StructuresQueued
//!        -> StructuresReady -> EnvironmentQueued -> FullyPopulated
//! ```
//!
//! The `*Queued` transitions consume one unit of quota (see [`WorkKind`]);
//! the following transition marks the work as completed. Eviction destroys
//! the state outright, so re-entry always starts again at `Absent`.

use hecs::Entity;

use crate::core::InvariantViolation;
use crate::streaming::coord::ChunkCoord;
use crate::streaming::lod::LodTier;

/// Position of a chunk in the generation pipeline
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GenerationStage {
    Absent,
    TerrainQueued,
    TerrainReady,
    StructuresQueued,
    StructuresReady,
    EnvironmentQueued,
    FullyPopulated,
}

impl GenerationStage {
    /// The work item that moves a chunk out of this stage, if it is waiting
    /// for one (as opposed to waiting for a job to complete, or being done)
    pub fn next_work(self) -> Option<WorkKind> {
        match self {
            GenerationStage::Absent => Some(WorkKind::Terrain),
            GenerationStage::TerrainReady => Some(WorkKind::Structures),
            GenerationStage::StructuresReady => Some(WorkKind::Environment),
            _ => None,
        }
    }

    /// Whether a job for this chunk is in flight
    pub fn is_queued(self) -> bool {
        matches!(
            self,
            GenerationStage::TerrainQueued
                | GenerationStage::StructuresQueued
                | GenerationStage::EnvironmentQueued
        )
    }

    /// Whether terrain geometry exists for this chunk
    pub fn has_terrain(self) -> bool {
        self >= GenerationStage::TerrainReady
    }
}

/// Quota category of a unit of generation work
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WorkKind {
    Terrain,
    Structures,
    Environment,
}

impl WorkKind {
    /// Stage a chunk must be in before this work can be dispatched
    pub fn ready_stage(self) -> GenerationStage {
        match self {
            WorkKind::Terrain => GenerationStage::Absent,
            WorkKind::Structures => GenerationStage::TerrainReady,
            WorkKind::Environment => GenerationStage::StructuresReady,
        }
    }

    /// Stage while the work is in flight
    pub fn queued_stage(self) -> GenerationStage {
        match self {
            WorkKind::Terrain => GenerationStage::TerrainQueued,
            WorkKind::Structures => GenerationStage::StructuresQueued,
            WorkKind::Environment => GenerationStage::EnvironmentQueued,
        }
    }

    /// Stage once the work has completed
    pub fn completed_stage(self) -> GenerationStage {
        match self {
            WorkKind::Terrain => GenerationStage::TerrainReady,
            WorkKind::Structures => GenerationStage::StructuresReady,
            WorkKind::Environment => GenerationStage::FullyPopulated,
        }
    }
}

/// Mutable record for one resident chunk
#[derive(Debug)]
pub struct ChunkState {
    coord: ChunkCoord,
    /// Band the chunk currently sits in
    lod: LodTier,
    /// Band the current terrain geometry was built for
    mesh_lod: Option<LodTier>,
    stage: GenerationStage,
    /// Unique per admission; stale job results carry an older epoch
    epoch: u64,
    last_touched_frame: u64,
    refine_pending: bool,
    terrain: Option<Entity>,
    entities: Vec<Entity>,
}

impl ChunkState {
    /// Fresh state for a coordinate entering the buffer radius
    pub fn new(coord: ChunkCoord, lod: LodTier, epoch: u64, frame: u64) -> Self {
        Self {
            coord,
            lod,
            mesh_lod: None,
            stage: GenerationStage::Absent,
            epoch,
            last_touched_frame: frame,
            refine_pending: false,
            terrain: None,
            entities: Vec::new(),
        }
    }

    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    pub fn lod(&self) -> LodTier {
        self.lod
    }

    pub fn mesh_lod(&self) -> Option<LodTier> {
        self.mesh_lod
    }

    pub fn stage(&self) -> GenerationStage {
        self.stage
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn last_touched_frame(&self) -> u64 {
        self.last_touched_frame
    }

    pub fn refine_pending(&self) -> bool {
        self.refine_pending
    }

    pub fn is_fully_populated(&self) -> bool {
        self.stage == GenerationStage::FullyPopulated
    }

    /// Number of scene entities this chunk owns
    pub fn entity_count(&self) -> usize {
        self.entities.len() + usize::from(self.terrain.is_some())
    }

    /// Mark the chunk as inside the buffer radius this frame
    pub fn touch(&mut self, frame: u64) {
        self.last_touched_frame = frame;
    }

    /// Move to a new LOD band
    pub fn set_lod(&mut self, lod: LodTier) {
        self.lod = lod;
    }

    /// Re-band after a profile change. Existing terrain is relabelled rather
    /// than rebuilt; only later band changes from movement refine it.
    pub fn rebase_lod(&mut self, lod: LodTier) {
        self.lod = lod;
        if self.mesh_lod.is_some() {
            self.mesh_lod = Some(lod);
        }
    }

    /// Dispatch `kind`: `ready_stage -> queued_stage`
    pub fn begin(&mut self, kind: WorkKind) -> Result<(), InvariantViolation> {
        self.transition(kind.ready_stage(), kind.queued_stage())
    }

    /// Complete `kind`: `queued_stage -> completed_stage`
    pub fn complete(&mut self, kind: WorkKind) -> Result<(), InvariantViolation> {
        self.transition(kind.queued_stage(), kind.completed_stage())
    }

    /// Undo a dispatch whose job failed, so the next frame re-issues it:
    /// `queued_stage -> ready_stage`
    pub fn release(&mut self, kind: WorkKind) -> Result<(), InvariantViolation> {
        self.transition(kind.queued_stage(), kind.ready_stage())
    }

    fn transition(
        &mut self,
        expected: GenerationStage,
        to: GenerationStage,
    ) -> Result<(), InvariantViolation> {
        if self.stage != expected {
            return Err(InvariantViolation::StageOutOfOrder {
                coord: self.coord,
                from: self.stage,
                to,
            });
        }
        self.stage = to;
        Ok(())
    }

    /// Flag an in-flight terrain refinement
    pub fn begin_refine(&mut self) {
        self.refine_pending = true;
    }

    /// Clear the refinement flag (completed or failed)
    pub fn end_refine(&mut self) {
        self.refine_pending = false;
    }

    /// Install terrain geometry built for `lod`, returning the entity it replaces
    pub fn attach_terrain(&mut self, entity: Entity, lod: LodTier) -> Option<Entity> {
        self.mesh_lod = Some(lod);
        self.terrain.replace(entity)
    }

    /// Take ownership of placed structure/environment entities
    pub fn attach_entities(&mut self, entities: impl IntoIterator<Item = Entity>) {
        self.entities.extend(entities);
    }

    /// Every owned entity, terrain first
    pub fn owned_entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.terrain.into_iter().chain(self.entities.iter().copied())
    }

    /// Give up every owned entity (eviction)
    pub fn take_entities(&mut self) -> Vec<Entity> {
        let mut owned: Vec<Entity> = self.terrain.take().into_iter().collect();
        owned.append(&mut self.entities);
        self.mesh_lod = None;
        owned
    }
}
