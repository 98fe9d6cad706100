//! Dual index over region pieces
//!
//! Every live piece is reachable two ways: through the chain of the cell it
//! sits in (most recently added last, so the end of a chain is the top of
//! the stack) and through its region's membership list. Every mutation
//! here keeps both sides in step; [`RegionStore::audit`] checks that they
//! are.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::pool::{Pool, PoolKind};
use super::types::{Payload, PieceKey, Region, RegionKey, RegionPiece};
use crate::config::EngineConfig;
use crate::error::{IndexFault, RegionError};
use crate::geometry::Pos;
use crate::world::RegionWorld;

/// Which side of a distance threshold a visitor wants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DistanceFilter {
    /// Pieces no further than the threshold
    Within,
    /// Pieces strictly further than the threshold
    Beyond,
}

/// Which visibility test a visitor requires from the centre
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sight {
    LineOfSight,
    LineOfFire,
}

/// Region and piece storage plus the by-cell index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionStore {
    pub(crate) regions: Pool<RegionKey, Region>,
    pub(crate) pieces: Pool<PieceKey, RegionPiece>,
    pub(crate) cells: HashMap<Pos, Vec<PieceKey>>,
    /// Set when an allocation failed; optional growth is suppressed until
    /// compaction clears it
    pub(crate) pressure: bool,
}

impl RegionStore {
    /// Empty store with the given pool capacities
    pub fn new(region_capacity: usize, piece_capacity: usize) -> Self {
        Self {
            regions: Pool::new(PoolKind::Regions, region_capacity),
            pieces: Pool::new(PoolKind::Pieces, piece_capacity),
            cells: HashMap::new(),
            pressure: false,
        }
    }

    /// Empty store sized from `config`
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.region_capacity, config.piece_capacity)
    }

    // ========================================================================
    // Regions
    // ========================================================================

    /// Store a region with no pieces. Running out of slots sets pressure.
    pub fn allocate_region(&mut self, region: Region) -> Result<RegionKey, RegionError> {
        self.regions.allocate(region).inspect_err(|_| self.pressure = true)
    }

    /// Free a region record. Its pieces must already be excised.
    pub fn release_region(&mut self, key: RegionKey) -> Option<Region> {
        let region = self.regions.free(key)?;
        debug_assert!(region.pieces.is_empty(), "released region still owns pieces");
        Some(region)
    }

    pub fn region(&self, key: RegionKey) -> Option<&Region> {
        self.regions.get(key)
    }

    pub fn region_mut(&mut self, key: RegionKey) -> Option<&mut Region> {
        self.regions.get_mut(key)
    }

    pub fn contains_region(&self, key: RegionKey) -> bool {
        self.regions.contains(key)
    }

    /// Keys of every live region, in pool order
    pub fn region_keys(&self) -> Vec<RegionKey> {
        self.regions.keys().collect()
    }

    /// Live regions in slot order
    pub fn regions(&self) -> impl Iterator<Item = (RegionKey, &Region)> {
        self.regions.iter()
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    // ========================================================================
    // Pieces
    // ========================================================================

    /// Add a piece for `region` at `pos`, on top of the cell's stack
    pub fn insert(
        &mut self,
        region: RegionKey,
        pos: Pos,
        payload: Payload,
    ) -> Result<PieceKey, RegionError> {
        if !self.regions.contains(region) {
            return Err(RegionError::StaleRegion);
        }
        let key = self
            .pieces
            .allocate(RegionPiece {
                pos,
                payload,
                region,
            })
            .inspect_err(|_| self.pressure = true)?;
        self.cells.entry(pos).or_default().push(key);
        if let Some(owner) = self.regions.get_mut(region) {
            owner.pieces.push(key);
        }
        trace!(?pos, ?region, "piece inserted");
        Ok(key)
    }

    /// Remove a piece from both chains and free it. Excising a piece twice
    /// is harmless; the second call returns `None`.
    pub fn excise(&mut self, key: PieceKey) -> Option<RegionPiece> {
        let piece = self.pieces.free(key)?;
        self.unlink_cell(piece.pos, key);
        if let Some(owner) = self.regions.get_mut(piece.region) {
            owner.pieces.retain(|&p| p != key);
        }
        Some(piece)
    }

    /// Move a piece to another cell, putting it on top of that cell's stack
    pub fn relocate(&mut self, key: PieceKey, to: Pos) -> Result<Pos, RegionError> {
        let from = self
            .pieces
            .get(key)
            .map(|p| p.pos)
            .ok_or(RegionError::StalePiece)?;
        if from == to {
            return Ok(from);
        }
        self.unlink_cell(from, key);
        self.cells.entry(to).or_default().push(key);
        if let Some(piece) = self.pieces.get_mut(key) {
            piece.pos = to;
        }
        Ok(from)
    }

    fn unlink_cell(&mut self, pos: Pos, key: PieceKey) {
        if let Some(chain) = self.cells.get_mut(&pos) {
            chain.retain(|&p| p != key);
            if chain.is_empty() {
                self.cells.remove(&pos);
            }
        }
    }

    /// Live piece, `None` once excised
    pub fn piece(&self, key: PieceKey) -> Option<&RegionPiece> {
        self.pieces.get(key)
    }

    pub fn piece_mut(&mut self, key: PieceKey) -> Option<&mut RegionPiece> {
        self.pieces.get_mut(key)
    }

    pub fn contains_piece(&self, key: PieceKey) -> bool {
        self.pieces.contains(key)
    }

    pub fn piece_count(&self) -> usize {
        self.pieces.len()
    }

    /// Pieces in a cell, top of the stack first
    pub fn cell_snapshot(&self, pos: Pos) -> Vec<PieceKey> {
        self.cells
            .get(&pos)
            .map(|chain| chain.iter().rev().copied().collect())
            .unwrap_or_default()
    }

    /// Pieces of a region in insertion order
    pub fn region_pieces(&self, region: RegionKey) -> Vec<PieceKey> {
        self.regions
            .get(region)
            .map(|r| r.pieces.clone())
            .unwrap_or_default()
    }

    /// Distinct regions with a piece in `pos`, topmost first
    pub fn regions_at(&self, pos: Pos) -> Vec<RegionKey> {
        let mut out: Vec<RegionKey> = Vec::new();
        for key in self.cell_snapshot(pos) {
            if let Some(piece) = self.pieces.get(key)
                && !out.contains(&piece.region)
            {
                out.push(piece.region);
            }
        }
        out
    }

    /// The topmost piece `region` has in `pos`
    pub fn region_piece_at(&self, region: RegionKey, pos: Pos) -> Option<PieceKey> {
        self.cell_snapshot(pos)
            .into_iter()
            .find(|&k| self.pieces.get(k).is_some_and(|p| p.region == region))
    }

    /// Whether `region` has a piece in `pos`
    pub fn region_occupies(&self, region: RegionKey, pos: Pos) -> bool {
        self.region_piece_at(region, pos).is_some()
    }

    /// Move `region`'s pieces in `pos` to the top of the cell's stack.
    /// Returns false when the region has no piece there.
    pub fn raise_region(&mut self, pos: Pos, region: RegionKey) -> bool {
        let Some(chain) = self.cells.get_mut(&pos) else {
            return false;
        };
        let pieces = &self.pieces;
        let (mut mine, rest): (Vec<PieceKey>, Vec<PieceKey>) = chain
            .iter()
            .partition(|&&k| pieces.get(k).is_some_and(|p| p.region == region));
        if mine.is_empty() {
            return false;
        }
        *chain = rest;
        chain.append(&mut mine);
        true
    }

    /// Set by a failed allocation, cleared by compaction
    pub fn under_pressure(&self) -> bool {
        self.pressure
    }

    pub fn region_pool(&self) -> &Pool<RegionKey, Region> {
        &self.regions
    }

    pub fn piece_pool(&self) -> &Pool<PieceKey, RegionPiece> {
        &self.pieces
    }

    // ========================================================================
    // Visitors
    // ========================================================================
    //
    // Visitors walk a snapshot of keys and skip anything excised while the
    // walk was in progress, so the callback may mutate the store freely.

    /// Visit every piece in a cell, topmost first
    pub fn for_each_at_cell<F>(&mut self, pos: Pos, mut f: F)
    where
        F: FnMut(&mut RegionStore, PieceKey),
    {
        for key in self.cell_snapshot(pos) {
            if self.pieces.contains(key) {
                f(self, key);
            }
        }
    }

    /// Visit every piece of a region in insertion order
    pub fn for_each_in_region<F>(&mut self, region: RegionKey, mut f: F)
    where
        F: FnMut(&mut RegionStore, PieceKey),
    {
        for key in self.region_pieces(region) {
            if self.pieces.contains(key) {
                f(self, key);
            }
        }
    }

    /// Visit the pieces of a region on one side of a distance threshold
    /// from `center`, keeping only those `center` can see (or shoot) into
    #[allow(clippy::too_many_arguments)]
    pub fn for_each_in_region_within_distance<W, F>(
        &mut self,
        world: &W,
        region: RegionKey,
        center: Pos,
        distance: i32,
        filter: DistanceFilter,
        sight: Sight,
        mut f: F,
    ) where
        W: RegionWorld + ?Sized,
        F: FnMut(&mut RegionStore, PieceKey),
    {
        for key in self.region_pieces(region) {
            let Some(pos) = self.pieces.get(key).map(|p| p.pos) else {
                continue;
            };
            let d = center.distance(pos);
            let wanted = match filter {
                DistanceFilter::Within => d <= distance,
                DistanceFilter::Beyond => d > distance,
            };
            if !wanted {
                continue;
            }
            let visible = match sight {
                Sight::LineOfSight => world.line_of_sight(center, pos),
                Sight::LineOfFire => world.line_of_fire(center, pos),
            };
            if visible {
                f(self, key);
            }
        }
    }

    // ========================================================================
    // Consistency
    // ========================================================================

    /// Check that every live piece appears exactly once in each chain, in
    /// the right cell, owned by a live region, and that no chain references
    /// a freed piece
    pub fn audit(&self) -> Result<(), IndexFault> {
        let mut cell_counts: HashMap<PieceKey, usize> = HashMap::new();
        for (&cell, chain) in &self.cells {
            for &key in chain {
                let Some(piece) = self.pieces.get(key) else {
                    return Err(IndexFault::Dangling { piece: key });
                };
                if piece.pos != cell {
                    return Err(IndexFault::WrongCell { piece: key, cell });
                }
                *cell_counts.entry(key).or_default() += 1;
            }
        }

        let mut region_counts: HashMap<PieceKey, usize> = HashMap::new();
        for (region_key, region) in self.regions.iter() {
            for &key in &region.pieces {
                let Some(piece) = self.pieces.get(key) else {
                    return Err(IndexFault::Dangling { piece: key });
                };
                if piece.region != region_key {
                    return Err(IndexFault::Orphan {
                        piece: key,
                        region: piece.region,
                    });
                }
                *region_counts.entry(key).or_default() += 1;
            }
        }

        for (key, piece) in self.pieces.iter() {
            if !self.regions.contains(piece.region) {
                return Err(IndexFault::Orphan {
                    piece: key,
                    region: piece.region,
                });
            }
            let count = cell_counts.get(&key).copied().unwrap_or(0);
            if count != 1 {
                return Err(IndexFault::CellChainCount { piece: key, count });
            }
            let count = region_counts.get(&key).copied().unwrap_or(0);
            if count != 1 {
                return Err(IndexFault::RegionChainCount { piece: key, count });
            }
        }
        Ok(())
    }
}
