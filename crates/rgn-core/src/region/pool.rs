//! Fixed-capacity region pools
//!
//! Regions and pieces are allocated from generation-tagged slot maps with a
//! hard cap. Hitting the cap is not an error the game sees: the allocation
//! fails, the store goes under pressure, and periodic compaction sweeps
//! anything left dangling until utilization drops again.

use serde::{Deserialize, Serialize};
use slotmap::{Key, SlotMap};
use strum::Display;
use tracing::{debug, warn};

use super::index::RegionStore;
use crate::error::RegionError;

/// Which pool an allocation came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[strum(serialize_all = "snake_case")]
pub enum PoolKind {
    Regions,
    Pieces,
}

/// Slot map with a capacity limit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pool<K: Key, V> {
    slots: SlotMap<K, V>,
    capacity: usize,
    kind: PoolKind,
}

impl<K: Key, V> Pool<K, V> {
    /// Empty pool holding at most `capacity` entries
    pub fn new(kind: PoolKind, capacity: usize) -> Self {
        Self {
            slots: SlotMap::with_capacity_and_key(capacity),
            capacity,
            kind,
        }
    }

    /// Store `value`, failing once the pool holds `capacity` entries
    pub fn allocate(&mut self, value: V) -> Result<K, RegionError> {
        if self.slots.len() >= self.capacity {
            return Err(RegionError::PoolExhausted {
                pool: self.kind,
                capacity: self.capacity,
            });
        }
        Ok(self.slots.insert(value))
    }

    /// Release a slot; its key (and every copy of it) goes stale
    pub fn free(&mut self, key: K) -> Option<V> {
        self.slots.remove(key)
    }

    /// Entry for `key`; stale keys find nothing
    pub fn get(&self, key: K) -> Option<&V> {
        self.slots.get(key)
    }

    pub fn get_mut(&mut self, key: K) -> Option<&mut V> {
        self.slots.get_mut(key)
    }

    pub fn contains(&self, key: K) -> bool {
        self.slots.contains_key(key)
    }

    /// Live entries
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn kind(&self) -> PoolKind {
        self.kind
    }

    /// Share of the capacity in use, rounded down
    pub fn utilization_percent(&self) -> u32 {
        if self.capacity == 0 {
            return 100;
        }
        (self.slots.len() * 100 / self.capacity) as u32
    }

    pub fn iter(&self) -> impl Iterator<Item = (K, &V)> {
        self.slots.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = K> + '_ {
        self.slots.keys()
    }

    pub(crate) fn iter_mut_values(&mut self) -> impl Iterator<Item = &mut V> {
        self.slots.values_mut()
    }

    /// Drop every entry the predicate rejects, returning how many went
    pub(crate) fn retain(&mut self, mut keep: impl FnMut(K, &mut V) -> bool) -> usize {
        let before = self.slots.len();
        self.slots.retain(|k, v| keep(k, v));
        before - self.slots.len()
    }
}

// ============================================================================
// Compaction
// ============================================================================

/// What a compaction pass cleaned up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CompactReport {
    /// Pieces whose region no longer exists
    pub orphans: usize,
    /// Stale keys dropped from cell chains and membership lists
    pub stale_links: usize,
    /// Cell chains removed because they became empty
    pub cells_dropped: usize,
    /// Backpressure was lifted by this pass
    pub pressure_cleared: bool,
}

impl RegionStore {
    /// Sweep orphaned pieces and stale links, then lift backpressure if
    /// both pools are below `release_percent` utilization
    pub fn compact(&mut self, release_percent: u32) -> CompactReport {
        let mut report = CompactReport::default();

        let regions = &self.regions;
        report.orphans = self
            .pieces
            .retain(|_, piece| regions.contains(piece.region));

        let pieces = &self.pieces;
        for region in self.regions.iter_mut_values() {
            let before = region.pieces.len();
            region.pieces.retain(|&p| pieces.contains(p));
            report.stale_links += before - region.pieces.len();
        }

        let cells_before = self.cells.len();
        self.cells.retain(|_, chain| {
            let before = chain.len();
            chain.retain(|&p| pieces.contains(p));
            report.stale_links += before - chain.len();
            !chain.is_empty()
        });
        report.cells_dropped = cells_before - self.cells.len();

        if report.orphans > 0 || report.stale_links > 0 {
            warn!(
                orphans = report.orphans,
                stale_links = report.stale_links,
                "compaction repaired the region index"
            );
        }

        if self.pressure
            && self.regions.utilization_percent() < release_percent
            && self.pieces.utilization_percent() < release_percent
        {
            self.pressure = false;
            report.pressure_cleared = true;
            debug!(
                regions = self.regions.len(),
                pieces = self.pieces.len(),
                "region backpressure cleared"
            );
        }

        report
    }
}
