//! Chunk streaming and LOD scheduling around a moving player

pub mod collaborators;
pub mod coord;
pub mod density;
pub mod eviction;
pub mod lod;
pub mod profile;
pub mod quota;
pub mod scheduler;
pub mod spatial;
pub mod state;
pub mod streamer;
pub mod worker;

pub use collaborators::{
    ChunkOwned, Collaborators, FlatTerrainBuilder, PlacedObject, Placement, PlacementCategory,
    Populator, ScatterPopulator, ShadowCaster, TerrainBuilder, TerrainMesh,
};
pub use coord::{ChunkCoord, CHUNK_SIZE};
pub use density::{DensityController, PopulationBaseline, PopulationParams};
pub use eviction::{EvictionManager, EvictionReport};
pub use lod::{resolution_for_tier, tier_from_distance, LodTier, LOD_TIERS};
pub use profile::{PerformanceMode, PerformanceProfile, ProfileResolver, ProfileTable};
pub use quota::FrameQuota;
pub use scheduler::{ChunkAction, FrameBatch, GenerationScheduler};
pub use spatial::{desired_chunks, DesiredChunk, SpatialIndex};
pub use state::{ChunkState, GenerationStage, WorkKind};
pub use streamer::{StreamerCommand, StreamingStats, WorldStreamer};
pub use worker::{GenerationJob, InlineExecutor, JobExecutor, JobOutcome, JobPayload, JobWork, ThreadedExecutor};
