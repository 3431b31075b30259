//! Generation job execution
//!
//! Jobs carry everything a collaborator needs (coordinate, admission epoch,
//! resolution or population parameters) and produce plain data. Executors
//! never see chunk state; the tick applies outcomes.
//!
//! - [`InlineExecutor`]: jobs submitted in one frame run in parallel on the
//!   rayon pool during the next drain, results in submission order
//! - [`ThreadedExecutor`]: dedicated tokio runtime with a bounded worker
//!   loop, results polled without blocking

use std::collections::{HashMap, VecDeque};

use rayon::prelude::*;
use tokio::runtime::{Builder, Runtime};
use tokio::sync::mpsc;
use tokio::task::{Id, JoinError, JoinSet};

use crate::core::{Error, Result};
use crate::streaming::collaborators::{Collaborators, Placement, PlacementCategory, TerrainMesh};
use crate::streaming::coord::ChunkCoord;
use crate::streaming::density::PopulationParams;
use crate::streaming::lod::LodTier;
use crate::streaming::state::WorkKind;

/// What a job produces
#[derive(Clone, Debug, PartialEq)]
pub enum JobWork {
    Terrain { lod: LodTier, resolution: u32 },
    /// Rebuild terrain for a new band without moving the stage
    Refine { lod: LodTier, resolution: u32 },
    Structures(PopulationParams),
    Environment(PopulationParams),
}

impl JobWork {
    pub fn kind(&self) -> WorkKind {
        match self {
            JobWork::Terrain { .. } | JobWork::Refine { .. } => WorkKind::Terrain,
            JobWork::Structures(_) => WorkKind::Structures,
            JobWork::Environment(_) => WorkKind::Environment,
        }
    }

    pub fn is_refine(&self) -> bool {
        matches!(self, JobWork::Refine { .. })
    }
}

/// One unit of generation work for a chunk admission
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationJob {
    pub coord: ChunkCoord,
    /// Admission epoch the job was issued under
    pub epoch: u64,
    pub work: JobWork,
}

impl GenerationJob {
    pub fn new(coord: ChunkCoord, epoch: u64, work: JobWork) -> Self {
        Self { coord, epoch, work }
    }

    /// Call the collaborator for this job
    pub fn run(&self, collaborators: &Collaborators) -> JobOutcome {
        let result = match &self.work {
            JobWork::Terrain { lod, resolution } | JobWork::Refine { lod, resolution } => collaborators
                .terrain
                .build(self.coord, *lod, *resolution)
                .map(JobPayload::Terrain),
            JobWork::Structures(params) => collaborators
                .populator
                .place_structures(self.coord, params)
                .map(|placed| JobPayload::Placements(PlacementCategory::Structure, placed)),
            JobWork::Environment(params) => collaborators
                .populator
                .place_environment(self.coord, params)
                .map(|placed| JobPayload::Placements(PlacementCategory::Environment, placed)),
        };

        JobOutcome { job: self.clone(), result }
    }
}

/// Collaborator output
#[derive(Clone, Debug, PartialEq)]
pub enum JobPayload {
    Terrain(TerrainMesh),
    Placements(PlacementCategory, Vec<Placement>),
}

/// A finished job and what it produced
#[derive(Debug)]
pub struct JobOutcome {
    pub job: GenerationJob,
    pub result: Result<JobPayload>,
}

impl JobOutcome {
    pub fn failed(job: GenerationJob, error: Error) -> Self {
        Self { job, result: Err(error) }
    }
}

/// Runs generation jobs off the tick path
pub trait JobExecutor: Send {
    /// Hand a job over for execution
    fn submit(&mut self, job: GenerationJob) -> Result<()>;

    /// Collect every outcome available now, without blocking on running work
    fn drain(&mut self) -> Vec<JobOutcome>;

    /// Jobs submitted whose outcome has not been drained yet
    fn in_flight(&self) -> usize;
}

// --- Inline executor ---

/// Deterministic executor: runs the previous frame's jobs on the rayon pool
#[derive(Debug)]
pub struct InlineExecutor {
    collaborators: Collaborators,
    queued: Vec<GenerationJob>,
}

impl InlineExecutor {
    pub fn new(collaborators: Collaborators) -> Self {
        Self {
            collaborators,
            queued: Vec::new(),
        }
    }
}

impl JobExecutor for InlineExecutor {
    fn submit(&mut self, job: GenerationJob) -> Result<()> {
        self.queued.push(job);
        Ok(())
    }

    fn drain(&mut self) -> Vec<JobOutcome> {
        let jobs = std::mem::take(&mut self.queued);
        let collaborators = &self.collaborators;
        jobs.par_iter().map(|job| job.run(collaborators)).collect()
    }

    fn in_flight(&self) -> usize {
        self.queued.len()
    }
}

// --- Threaded executor ---

/// Background executor on a dedicated tokio runtime
pub struct ThreadedExecutor {
    /// Closed on drop so the worker loop winds down
    request_tx: Option<mpsc::UnboundedSender<GenerationJob>>,
    result_rx: mpsc::UnboundedReceiver<JobOutcome>,
    in_flight: usize,
    max_concurrent: usize,
    runtime: Option<Runtime>,
}

impl ThreadedExecutor {
    /// Start the runtime and worker loop
    ///
    /// # Arguments
    /// * `collaborators` - Builders cloned into each task
    /// * `max_concurrent` - Maximum number of jobs running at once
    pub fn new(collaborators: Collaborators, max_concurrent: usize) -> Result<Self> {
        if max_concurrent == 0 {
            return Err(Error::Config("threaded executor needs max_concurrent >= 1".into()));
        }

        let (request_tx, request_rx) = mpsc::unbounded_channel::<GenerationJob>();
        let (result_tx, result_rx) = mpsc::unbounded_channel::<JobOutcome>();

        let runtime = Builder::new_multi_thread()
            .thread_name("worldstream-worker")
            .enable_all()
            .build()?;

        runtime.spawn(Self::worker_loop(collaborators, max_concurrent, request_rx, result_tx));
        log::debug!("Threaded executor started (max_concurrent = {})", max_concurrent);

        Ok(Self {
            request_tx: Some(request_tx),
            result_rx,
            in_flight: 0,
            max_concurrent,
            runtime: Some(runtime),
        })
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Worker loop that runs jobs in submission order with concurrency control
    async fn worker_loop(
        collaborators: Collaborators,
        max_concurrent: usize,
        mut request_rx: mpsc::UnboundedReceiver<GenerationJob>,
        result_tx: mpsc::UnboundedSender<JobOutcome>,
    ) {
        let mut active = JoinSet::new();
        let mut running: HashMap<Id, GenerationJob> = HashMap::new();
        let mut pending: VecDeque<GenerationJob> = VecDeque::new();
        let mut accepting = true;

        loop {
            tokio::select! {
                request = request_rx.recv(), if accepting => {
                    match request {
                        Some(job) => pending.push_back(job),
                        None => accepting = false,
                    }
                }

                Some(joined) = active.join_next_with_id(), if !active.is_empty() => {
                    if let Some(outcome) = Self::settle(joined, &mut running) {
                        // Receiver gone means the executor was dropped
                        let _ = result_tx.send(outcome);
                    }
                }

                else => break,
            }

            while active.len() < max_concurrent {
                let Some(job) = pending.pop_front() else {
                    break;
                };
                let collaborators = collaborators.clone();
                let task_job = job.clone();
                let handle = active.spawn(async move {
                    let fallback = task_job.clone();
                    match tokio::task::spawn_blocking(move || task_job.run(&collaborators)).await {
                        Ok(outcome) => outcome,
                        Err(e) => JobOutcome::failed(
                            fallback,
                            Error::Generation(format!("worker panicked: {e}")),
                        ),
                    }
                });
                running.insert(handle.id(), job);
            }
        }

        log::debug!("Threaded executor worker loop exited");
    }
}

impl ThreadedExecutor {
    /// Turn a joined task into an outcome. A task that was cancelled or
    /// panicked outside the collaborator still reports its job as failed.
    fn settle(
        joined: std::result::Result<(Id, JobOutcome), JoinError>,
        running: &mut HashMap<Id, GenerationJob>,
    ) -> Option<JobOutcome> {
        match joined {
            Ok((id, outcome)) => {
                running.remove(&id);
                Some(outcome)
            }
            Err(e) => {
                log::error!("Generation task aborted: {}", e);
                running
                    .remove(&e.id())
                    .map(|job| JobOutcome::failed(job, Error::Generation(format!("task aborted: {e}"))))
            }
        }
    }
}

impl JobExecutor for ThreadedExecutor {
    fn submit(&mut self, job: GenerationJob) -> Result<()> {
        let coord = job.coord;
        let sent = self
            .request_tx
            .as_ref()
            .is_some_and(|tx| tx.send(job).is_ok());
        if !sent {
            return Err(Error::Generation(format!("worker loop stopped, cannot run job for {coord}")));
        }
        self.in_flight += 1;
        Ok(())
    }

    fn drain(&mut self) -> Vec<JobOutcome> {
        let mut outcomes = Vec::new();
        while let Ok(outcome) = self.result_rx.try_recv() {
            self.in_flight = self.in_flight.saturating_sub(1);
            outcomes.push(outcome);
        }
        outcomes
    }

    fn in_flight(&self) -> usize {
        self.in_flight
    }
}

impl std::fmt::Debug for ThreadedExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadedExecutor")
            .field("in_flight", &self.in_flight)
            .field("max_concurrent", &self.max_concurrent)
            .finish()
    }
}

impl Drop for ThreadedExecutor {
    fn drop(&mut self) {
        // Closing the request channel ends the worker loop
        self.request_tx.take();
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}
