//! Error types for the streaming core

use thiserror::Error;

use crate::streaming::coord::ChunkCoord;
use crate::streaming::state::{GenerationStage, WorkKind};

/// Main error type for the streaming core
#[derive(Debug, Error)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Invariant violation: {0}")]
    Invariant(#[from] InvariantViolation),
}

/// Scheduler logic defects. These never describe a recoverable runtime
/// condition; see [`report_invariant`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("chunk {0} evicted twice without being re-admitted")]
    DoubleEviction(ChunkCoord),

    #[error("chunk {coord}: illegal transition {from:?} -> {to:?}")]
    StageOutOfOrder {
        coord: ChunkCoord,
        from: GenerationStage,
        to: GenerationStage,
    },

    #[error("{0:?} quota exhausted")]
    QuotaExhausted(WorkKind),

    #[error("chunk {0} is not resident")]
    UnknownChunk(ChunkCoord),

    #[error("chunk {0} owned an entity that was already despawned")]
    StaleEntity(ChunkCoord),
}

/// Surface an invariant violation: fatal with debug assertions, logged and
/// skipped otherwise.
pub fn report_invariant(violation: InvariantViolation) {
    if cfg!(debug_assertions) {
        panic!("streaming invariant violated: {violation}");
    }
    log::error!("streaming invariant violated (skipped): {}", violation);
}
