//! Chunk teardown
//!
//! Eviction consumes a chunk's state and despawns every scene entity it
//! owns. A bounded tombstone ledger remembers recently evicted coordinates
//! so a second eviction without an intervening admission is caught.

use std::collections::{HashSet, VecDeque};

use crate::core::InvariantViolation;
use crate::streaming::coord::ChunkCoord;
use crate::streaming::state::{ChunkState, GenerationStage};

/// Outcome of one eviction
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EvictionReport {
    pub coord: ChunkCoord,
    /// Stage the chunk had reached when it was torn down
    pub stage: GenerationStage,
    pub entities_released: usize,
}

/// Releases evicted chunks and tracks recent tombstones
#[derive(Debug)]
pub struct EvictionManager {
    tombstones: HashSet<ChunkCoord>,
    /// Eviction order: oldest first, newest last
    order: VecDeque<ChunkCoord>,
    capacity: usize,
    evicted_total: u64,
}

impl EvictionManager {
    /// Create a manager remembering up to `capacity` tombstones
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            tombstones: HashSet::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity,
            evicted_total: 0,
        }
    }

    /// Tear down `state`, despawning everything it owns from `world`.
    ///
    /// The ledger is updated and every live entity released even when an
    /// error is returned.
    pub fn evict(
        &mut self,
        mut state: ChunkState,
        world: &mut hecs::World,
    ) -> Result<EvictionReport, InvariantViolation> {
        let coord = state.coord();
        let double = self.tombstones.contains(&coord);
        if !double {
            self.record(coord);
            self.evicted_total += 1;
        }

        let mut released = 0;
        let mut stale = false;
        for entity in state.take_entities() {
            match world.despawn(entity) {
                Ok(()) => released += 1,
                Err(_) => stale = true,
            }
        }

        if double {
            return Err(InvariantViolation::DoubleEviction(coord));
        }
        if stale {
            return Err(InvariantViolation::StaleEntity(coord));
        }

        log::trace!("Evicted chunk {} at {:?} ({} entities)", coord, state.stage(), released);
        Ok(EvictionReport {
            coord,
            stage: state.stage(),
            entities_released: released,
        })
    }

    /// Clear the tombstone for a coordinate entering the buffer radius again
    pub fn note_admitted(&mut self, coord: ChunkCoord) {
        if self.tombstones.remove(&coord) {
            self.order.retain(|c| *c != coord);
        }
    }

    pub fn is_tombstoned(&self, coord: ChunkCoord) -> bool {
        self.tombstones.contains(&coord)
    }

    pub fn tombstone_count(&self) -> usize {
        self.tombstones.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Evictions performed over the manager's lifetime
    pub fn evicted_total(&self) -> u64 {
        self.evicted_total
    }

    fn record(&mut self, coord: ChunkCoord) {
        // Forget the oldest tombstone when full
        if self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.tombstones.remove(&oldest);
            }
        }
        self.tombstones.insert(coord);
        self.order.push_back(coord);
    }
}

impl Default for EvictionManager {
    fn default() -> Self {
        Self::new(1024)
    }
}
