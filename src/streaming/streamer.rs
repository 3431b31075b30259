//! Frame-driven world streaming.
//!
//! [`WorldStreamer`] owns every resident [`ChunkState`], the scene world the
//! chunks populate, and the job executor. Each [`tick`](WorldStreamer::tick):
//!
//! 1. applies queued [`StreamerCommand`]s (profile changes)
//! 2. drains finished jobs, discarding results for chunks that left or were
//!    re-admitted since dispatch
//! 3. diffs the desired set against the resident set
//! 4. applies the batch: evictions first, then admissions and dispatches
//!
//! All chunk state is mutated on the calling thread only.

use std::collections::{HashMap, HashSet, VecDeque};

use glam::Vec3;

use crate::core::error::report_invariant;
use crate::core::{ExecutorKind, InvariantViolation, Result, StreamingConfig};
use crate::streaming::collaborators::{ChunkOwned, Collaborators, PlacedObject, ShadowCaster};
use crate::streaming::coord::ChunkCoord;
use crate::streaming::density::DensityController;
use crate::streaming::eviction::EvictionManager;
use crate::streaming::lod::{tier_from_distance, LodTier};
use crate::streaming::profile::{PerformanceMode, PerformanceProfile, ProfileResolver};
use crate::streaming::scheduler::{ChunkAction, FrameBatch, GenerationScheduler};
use crate::streaming::spatial::SpatialIndex;
use crate::streaming::state::{ChunkState, GenerationStage, WorkKind};
use crate::streaming::worker::{
    GenerationJob, InlineExecutor, JobExecutor, JobOutcome, JobPayload, JobWork, ThreadedExecutor,
};

/// Requests applied at the start of the next tick
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamerCommand {
    /// Switch to the named profile (unknown names fall back to `normal`)
    SetProfile(String),
}

/// Per-frame streaming statistics, reset at the start of each tick
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamingStats {
    pub frame: u64,
    /// Chunks within the buffer radius
    pub desired: usize,
    /// Chunks resident after the tick
    pub resident: usize,
    pub admitted: usize,
    pub evicted: usize,
    pub retiered: usize,
    pub terrain_queued: usize,
    pub refines_queued: usize,
    pub structures_queued: usize,
    pub environment_queued: usize,
    /// Ready work held back by quotas
    pub deferred: usize,
    /// Job results applied
    pub completed: usize,
    /// Job results that reported a collaborator failure
    pub failed: usize,
    /// Job results dropped because their chunk was evicted or re-admitted
    pub stale_discarded: usize,
    pub entities_spawned: usize,
    pub entities_released: usize,
    /// Jobs submitted but not yet drained
    pub in_flight: usize,
    pub profile_changed: bool,
}

/// Streams chunks around a moving player under a performance profile
pub struct WorldStreamer {
    resolver: ProfileResolver,
    profile: PerformanceProfile,
    index: SpatialIndex,
    scheduler: GenerationScheduler,
    eviction: EvictionManager,
    executor: Box<dyn JobExecutor>,
    resident: HashMap<ChunkCoord, ChunkState>,
    scene: hecs::World,
    commands: VecDeque<StreamerCommand>,
    frame: u64,
    next_epoch: u64,
    stats: StreamingStats,
}

impl WorldStreamer {
    /// Create a streamer with the executor named in `config`
    pub fn new(config: &StreamingConfig, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;
        let executor: Box<dyn JobExecutor> = match config.executor {
            ExecutorKind::Inline => Box::new(InlineExecutor::new(collaborators)),
            ExecutorKind::Threaded { max_concurrent } => {
                Box::new(ThreadedExecutor::new(collaborators, max_concurrent)?)
            }
        };
        Self::with_executor(config, executor)
    }

    /// Create a streamer around a caller-provided executor
    pub fn with_executor(config: &StreamingConfig, executor: Box<dyn JobExecutor>) -> Result<Self> {
        config.validate()?;
        let resolver = ProfileResolver::new(config.profile_table());
        let profile = resolver.resolve(&config.mode);
        log::info!(
            "World streamer using profile '{}' (view {}, buffer {})",
            profile.name,
            profile.view_distance,
            profile.buffer_distance
        );

        Ok(Self {
            index: SpatialIndex::new(&profile),
            scheduler: GenerationScheduler::new(DensityController::new(config.world_seed, config.population)),
            eviction: EvictionManager::new(config.tombstone_capacity),
            resolver,
            profile,
            executor,
            resident: HashMap::new(),
            scene: hecs::World::new(),
            commands: VecDeque::new(),
            frame: 0,
            next_epoch: 0,
            stats: StreamingStats::default(),
        })
    }

    // --- Commands ---

    /// Queue a mode switch for the next tick
    pub fn set_profile(&mut self, mode: PerformanceMode) {
        self.push_command(StreamerCommand::SetProfile(mode.as_str().to_string()));
    }

    /// Queue a switch to a named profile for the next tick
    pub fn set_profile_name(&mut self, name: impl Into<String>) {
        self.push_command(StreamerCommand::SetProfile(name.into()));
    }

    pub fn push_command(&mut self, command: StreamerCommand) {
        self.commands.push_back(command);
    }

    // --- Frame ---

    /// Advance one frame with the player at a world position
    pub fn tick_world_pos(&mut self, position: Vec3) -> FrameBatch {
        self.tick(ChunkCoord::from_world_pos(position))
    }

    /// Advance one frame with the player in `player`'s chunk
    pub fn tick(&mut self, player: ChunkCoord) -> FrameBatch {
        self.frame += 1;
        self.stats = StreamingStats {
            frame: self.frame,
            ..Default::default()
        };

        self.apply_commands(player);

        let desired = self.index.desired_chunks(player);
        let wanted: HashSet<ChunkCoord> = desired.iter().map(|d| d.coord).collect();

        for outcome in self.executor.drain() {
            self.apply_outcome(outcome, player, &wanted);
        }

        let batch = self.scheduler.step(&desired, &self.resident, &self.profile);
        for action in batch.iter() {
            self.apply_action(action);
        }

        for d in &desired {
            if let Some(state) = self.resident.get_mut(&d.coord) {
                state.touch(self.frame);
            }
        }

        self.stats.desired = desired.len();
        self.stats.resident = self.resident.len();
        self.stats.deferred = batch.deferred;
        self.stats.in_flight = self.executor.in_flight();

        if !batch.is_empty() || self.stats.completed > 0 {
            log::debug!(
                "Frame {} at {}: +{} admitted, -{} evicted, {} queued, {} completed, {} deferred ({} resident, {} in flight)",
                self.frame,
                player,
                self.stats.admitted,
                self.stats.evicted,
                self.stats.terrain_queued
                    + self.stats.refines_queued
                    + self.stats.structures_queued
                    + self.stats.environment_queued,
                self.stats.completed,
                self.stats.deferred,
                self.stats.resident,
                self.stats.in_flight
            );
        }

        batch
    }

    fn apply_commands(&mut self, player: ChunkCoord) {
        while let Some(command) = self.commands.pop_front() {
            match command {
                StreamerCommand::SetProfile(mode) => {
                    let profile = self.resolver.resolve(&mode);
                    if profile == self.profile {
                        continue;
                    }
                    log::info!("Switching profile '{}' -> '{}'", self.profile.name, profile.name);

                    // Resident chunks keep their stage and entities; only new work sees the new profile
                    for state in self.resident.values_mut() {
                        let tier = tier_from_distance(player.chebyshev_distance(state.coord()), &profile);
                        if tier.is_resident() {
                            state.rebase_lod(tier);
                        }
                    }
                    self.index = SpatialIndex::new(&profile);
                    self.profile = profile;
                    self.stats.profile_changed = true;
                }
            }
        }
    }

    fn apply_action(&mut self, action: &ChunkAction) {
        match *action {
            ChunkAction::Evict { coord } => self.evict(coord),
            ChunkAction::Admit { coord, lod } => {
                let epoch = self.next_epoch;
                self.next_epoch += 1;
                self.eviction.note_admitted(coord);
                self.resident.insert(coord, ChunkState::new(coord, lod, epoch, self.frame));
                self.stats.admitted += 1;
            }
            ChunkAction::Retier { coord, to, .. } => match self.resident.get_mut(&coord) {
                Some(state) => {
                    state.set_lod(to);
                    self.stats.retiered += 1;
                }
                None => report_invariant(InvariantViolation::UnknownChunk(coord)),
            },
            ChunkAction::QueueTerrain { coord, lod, resolution } => {
                self.dispatch(coord, JobWork::Terrain { lod, resolution })
            }
            ChunkAction::RefineTerrain { coord, lod, resolution } => {
                self.dispatch(coord, JobWork::Refine { lod, resolution })
            }
            ChunkAction::QueueStructures { coord, params } => self.dispatch(coord, JobWork::Structures(params)),
            ChunkAction::QueueEnvironment { coord, params } => self.dispatch(coord, JobWork::Environment(params)),
        }
    }

    fn evict(&mut self, coord: ChunkCoord) {
        let Some(state) = self.resident.remove(&coord) else {
            report_invariant(InvariantViolation::UnknownChunk(coord));
            return;
        };
        match self.eviction.evict(state, &mut self.scene) {
            Ok(report) => {
                self.stats.evicted += 1;
                self.stats.entities_released += report.entities_released;
            }
            Err(violation) => report_invariant(violation),
        }
    }

    fn dispatch(&mut self, coord: ChunkCoord, work: JobWork) {
        let Some(state) = self.resident.get_mut(&coord) else {
            report_invariant(InvariantViolation::UnknownChunk(coord));
            return;
        };

        let kind = work.kind();
        let refine = work.is_refine();
        if refine {
            state.begin_refine();
        } else if let Err(violation) = state.begin(kind) {
            report_invariant(violation);
            return;
        }

        let job = GenerationJob::new(coord, state.epoch(), work);
        if let Err(e) = self.executor.submit(job) {
            log::warn!("Could not dispatch {:?} work for chunk {}: {}", kind, coord, e);
            if let Some(state) = self.resident.get_mut(&coord) {
                Self::undo_dispatch(state, kind, refine);
            }
            return;
        }

        match (kind, refine) {
            (WorkKind::Terrain, true) => self.stats.refines_queued += 1,
            (WorkKind::Terrain, false) => self.stats.terrain_queued += 1,
            (WorkKind::Structures, _) => self.stats.structures_queued += 1,
            (WorkKind::Environment, _) => self.stats.environment_queued += 1,
        }
    }

    fn undo_dispatch(state: &mut ChunkState, kind: WorkKind, refine: bool) {
        if refine {
            state.end_refine();
        } else if let Err(violation) = state.release(kind) {
            report_invariant(violation);
        }
    }

    fn apply_outcome(&mut self, outcome: JobOutcome, player: ChunkCoord, wanted: &HashSet<ChunkCoord>) {
        let JobOutcome { job, result } = outcome;
        let state = match self.resident.get_mut(&job.coord) {
            Some(state) if state.epoch() == job.epoch && wanted.contains(&job.coord) => state,
            _ => {
                log::trace!(
                    "Discarding stale {:?} result for chunk {} (epoch {})",
                    job.work.kind(),
                    job.coord,
                    job.epoch
                );
                self.stats.stale_discarded += 1;
                return;
            }
        };

        let kind = job.work.kind();
        let refine = job.work.is_refine();
        let payload = match result {
            Ok(payload) => payload,
            Err(e) => {
                log::warn!("{:?} generation failed for chunk {}, will retry: {}", kind, job.coord, e);
                Self::undo_dispatch(state, kind, refine);
                self.stats.failed += 1;
                return;
            }
        };

        let owner = ChunkOwned {
            coord: job.coord,
            epoch: job.epoch,
        };
        match payload {
            JobPayload::Terrain(mesh) => {
                if refine {
                    state.end_refine();
                } else if let Err(violation) = state.complete(kind) {
                    report_invariant(violation);
                    return;
                }
                let lod = mesh.lod;
                let entity = self.scene.spawn((owner, mesh));
                self.stats.entities_spawned += 1;
                if let Some(replaced) = state.attach_terrain(entity, lod) {
                    match self.scene.despawn(replaced) {
                        Ok(()) => self.stats.entities_released += 1,
                        Err(_) => report_invariant(InvariantViolation::StaleEntity(job.coord)),
                    }
                }
            }
            JobPayload::Placements(category, placed) => {
                if let Err(violation) = state.complete(kind) {
                    report_invariant(violation);
                    return;
                }
                let casts_shadow = self.profile.casts_shadow(player.chebyshev_distance(job.coord));
                let scene = &mut self.scene;
                let entities: Vec<hecs::Entity> = placed
                    .into_iter()
                    .map(|p| {
                        let object = PlacedObject {
                            category,
                            kind: p.kind,
                            position: p.position,
                            scale: p.scale,
                        };
                        if casts_shadow {
                            scene.spawn((owner, object, ShadowCaster))
                        } else {
                            scene.spawn((owner, object))
                        }
                    })
                    .collect();
                self.stats.entities_spawned += entities.len();
                state.attach_entities(entities);
            }
        }
        self.stats.completed += 1;
    }

    // --- Queries ---

    pub fn is_fully_populated(&self, coord: ChunkCoord) -> bool {
        self.resident.get(&coord).is_some_and(ChunkState::is_fully_populated)
    }

    /// Pipeline stage of a resident chunk; `None` when not resident
    pub fn stage(&self, coord: ChunkCoord) -> Option<GenerationStage> {
        self.resident.get(&coord).map(ChunkState::stage)
    }

    /// LOD band of a resident chunk
    pub fn lod(&self, coord: ChunkCoord) -> Option<LodTier> {
        self.resident.get(&coord).map(ChunkState::lod)
    }

    pub fn chunk(&self, coord: ChunkCoord) -> Option<&ChunkState> {
        self.resident.get(&coord)
    }

    pub fn resident_coords(&self) -> impl Iterator<Item = ChunkCoord> + '_ {
        self.resident.keys().copied()
    }

    pub fn profile(&self) -> &PerformanceProfile {
        &self.profile
    }

    pub fn resident_count(&self) -> usize {
        self.resident.len()
    }

    /// Statistics for the most recent tick
    pub fn stats(&self) -> &StreamingStats {
        &self.stats
    }

    /// Entities spawned for resident chunks
    pub fn scene(&self) -> &hecs::World {
        &self.scene
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn in_flight(&self) -> usize {
        self.executor.in_flight()
    }

    pub fn evicted_total(&self) -> u64 {
        self.eviction.evicted_total()
    }
}

impl std::fmt::Debug for WorldStreamer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorldStreamer")
            .field("profile", &self.profile.name)
            .field("frame", &self.frame)
            .field("resident", &self.resident.len())
            .field("in_flight", &self.executor.in_flight())
            .finish()
    }
}
