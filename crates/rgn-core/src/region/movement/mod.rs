//! Region movement
//!
//! Each active turn a region's [`MovementMode`] plans a list of
//! [`CellDelta`]s from a read-only view of the store; the engine then
//! validates and applies them. Rotation runs before planning and only
//! touches the region's facing and target.

mod rotate;
mod seeker;
mod spread;
mod vector;
mod wall;

pub(crate) use rotate::rotate;
pub(crate) use wall::first_front;

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::engine::RegionEngine;
use super::index::RegionStore;
use super::info::{MovementMode, RegionInfo};
use super::types::{Payload, Phase, PieceKey, Region, RegionKey, VectorPayload};
use crate::config::EngineConfig;
use crate::error::RegionError;
use crate::geometry::Pos;
use crate::rng::GameRng;
use crate::world::{ProjectFlags, RegionWorld, ShapeCell};

/// One planned change to a region's cells
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellDelta {
    /// Carry a piece into another cell
    Move { piece: PieceKey, to: Pos },
    /// Copy a piece into another cell
    Duplicate { piece: PieceKey, to: Pos },
    /// Drop a piece
    Prune { piece: PieceKey },
    /// Replace every piece with a freshly projected shape
    Rebuild { front: Pos, cells: Vec<ShapeCell> },
}

/// Read-only inputs shared by the planners
pub(crate) struct Planner<'a, W: RegionWorld + ?Sized> {
    pub world: &'a W,
    pub config: &'a EngineConfig,
    pub store: &'a RegionStore,
    pub info: &'a RegionInfo,
    pub key: RegionKey,
    pub region: &'a Region,
}

impl<W: RegionWorld + ?Sized> Planner<'_, W> {
    /// Live pieces of the region with their positions, in insertion order
    pub fn pieces(&self) -> Vec<(PieceKey, Pos)> {
        self.region
            .pieces
            .iter()
            .filter_map(|&k| self.store.piece(k).map(|p| (k, p.pos)))
            .collect()
    }

    pub fn passable(&self, pos: Pos) -> bool {
        self.world.is_passable(pos, self.region.shape.flags)
    }

    /// Plan this turn's movement
    pub fn plan(&self, rng: &mut GameRng) -> Vec<CellDelta> {
        match self.region.movement {
            MovementMode::Static => Vec::new(),
            MovementMode::Seeker => seeker::plan(self, rng),
            MovementMode::Vector => vector::plan(self),
            MovementMode::Spread => spread::plan(self, rng),
            MovementMode::Wall => wall::plan(self),
        }
    }
}

/// Outcome of applying a batch of deltas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct Applied {
    pub moved: usize,
    pub added: usize,
    pub pruned: usize,
}

impl RegionEngine {
    /// Apply planned deltas to `key`, pruning any piece whose destination
    /// is illegal. A region left without pieces turns lifeless.
    pub(crate) fn apply_deltas<W: RegionWorld + ?Sized>(
        &mut self,
        world: &mut W,
        key: RegionKey,
        deltas: Vec<CellDelta>,
    ) -> Applied {
        let mut applied = Applied::default();
        let Some(region) = self.store.region(key) else {
            return applied;
        };
        let flags = region.shape.flags;

        // Cells held by pieces that stay put this turn
        let moving: HashSet<PieceKey> = deltas
            .iter()
            .filter_map(|d| match d {
                CellDelta::Move { piece, .. } | CellDelta::Prune { piece } => Some(*piece),
                _ => None,
            })
            .collect();
        let mut claimed: HashSet<Pos> = self
            .store
            .region_pieces(key)
            .into_iter()
            .filter(|k| !moving.contains(k))
            .filter_map(|k| self.store.piece(k).map(|p| p.pos))
            .collect();
        let held = self.settle_moves(&*world, flags, &deltas, &mut claimed);

        for delta in deltas {
            match delta {
                CellDelta::Move { piece, to } => {
                    if !self.store.contains_piece(piece) {
                        continue;
                    }
                    if !world.in_bounds(to) || !world.is_passable(to, flags) {
                        let err = RegionError::IllegalDestination { pos: to };
                        trace!(%err, ?key, "pruning piece");
                        self.prune_piece(world, piece);
                        applied.pruned += 1;
                    } else if held.contains(&piece) {
                        trace!(?key, ?to, "piece held in place");
                    } else {
                        self.move_piece(world, piece, to);
                        applied.moved += 1;
                    }
                }
                CellDelta::Duplicate { piece, to } => {
                    let Some(payload) = self.store.piece(piece).map(|p| p.payload) else {
                        continue;
                    };
                    if !world.is_passable(to, flags) || !claimed.insert(to) {
                        continue;
                    }
                    match self.store.insert(key, to, payload) {
                        Ok(new) => {
                            self.overlay_new_piece(world, new, payload);
                            applied.added += 1;
                        }
                        Err(err) => {
                            trace!(%err, ?key, "spread stopped");
                            break;
                        }
                    }
                }
                CellDelta::Prune { piece } => {
                    if self.prune_piece(world, piece) {
                        applied.pruned += 1;
                    }
                }
                CellDelta::Rebuild { front, cells } => {
                    applied.added += self.rebuild(world, key, front, cells);
                    claimed = self
                        .store
                        .region_pieces(key)
                        .into_iter()
                        .filter_map(|k| self.store.piece(k).map(|p| p.pos))
                        .collect();
                }
            }
        }

        // A seeker's origin follows its leading piece
        let head = self
            .store
            .region(key)
            .and_then(|r| r.pieces.first().copied())
            .and_then(|k| self.store.piece(k))
            .map(|p| p.pos);
        if let Some(region) = self.store.region_mut(key) {
            match head {
                None => region.phase = Phase::Lifeless,
                Some(pos) if region.movement == MovementMode::Seeker => region.origin = pos,
                Some(_) => {}
            }
        }
        applied
    }

    /// Resolve a region's moves against each other and its resting pieces.
    /// A piece whose destination is already taken stays where it is, which
    /// can in turn block a piece bound for the cell it keeps. Returns the
    /// pieces that stay; `claimed` ends up holding every cell the region
    /// occupies once the legal moves are applied.
    fn settle_moves<W: RegionWorld + ?Sized>(
        &self,
        world: &W,
        flags: ProjectFlags,
        deltas: &[CellDelta],
        claimed: &mut HashSet<Pos>,
    ) -> HashSet<PieceKey> {
        let moves: Vec<(PieceKey, Pos, Pos)> = deltas
            .iter()
            .filter_map(|d| match d {
                CellDelta::Move { piece, to }
                    if world.in_bounds(*to) && world.is_passable(*to, flags) =>
                {
                    self.store.piece(*piece).map(|p| (*piece, p.pos, *to))
                }
                _ => None,
            })
            .collect();

        let mut held = HashSet::new();
        loop {
            let mut taken = claimed.clone();
            let blocked = moves
                .iter()
                .filter(|(piece, ..)| !held.contains(piece))
                .find(|&&(_, _, to)| !taken.insert(to));
            match blocked {
                Some(&(piece, from, _)) => {
                    held.insert(piece);
                    claimed.insert(from);
                }
                None => {
                    *claimed = taken;
                    return held;
                }
            }
        }
    }

    fn move_piece<W: RegionWorld + ?Sized>(&mut self, world: &mut W, piece: PieceKey, to: Pos) {
        let Some(current) = self.store.piece(piece).copied() else {
            return;
        };
        let overlays = matches!(current.payload, Payload::Terrain(_));
        if overlays {
            self.release_overlay(world, piece);
        }
        if self.store.relocate(piece, to).is_ok() {
            world.note_changed(current.pos);
            world.note_changed(to);
            if overlays {
                self.uplift(world, piece);
            }
        }
    }

    /// Excise one piece, handing back any terrain it was holding
    pub(crate) fn prune_piece<W: RegionWorld + ?Sized>(
        &mut self,
        world: &mut W,
        piece: PieceKey,
    ) -> bool {
        if !self.store.contains_piece(piece) {
            return false;
        }
        self.release_overlay(world, piece);
        match self.store.excise(piece) {
            Some(gone) => {
                world.note_changed(gone.pos);
                true
            }
            None => false,
        }
    }

    /// Swap every piece of `key` for a new shape. Returns pieces added.
    fn rebuild<W: RegionWorld + ?Sized>(
        &mut self,
        world: &mut W,
        key: RegionKey,
        front: Pos,
        cells: Vec<ShapeCell>,
    ) -> usize {
        for piece in self.store.region_pieces(key) {
            self.prune_piece(world, piece);
        }
        let Some(region) = self.store.region_mut(key) else {
            return 0;
        };
        region.front = front;
        let (scalar, damage, origin) = (region.scalar, region.damage, region.origin);
        let speed = self.catalog.get(region.kind).map_or(1, |info| info.speed);

        let mut added = 0;
        for cell in cells {
            if self.store.region_occupies(key, cell.pos) {
                continue;
            }
            let vector = VectorPayload::new(
                origin.angle_to(cell.pos),
                origin.chebyshev(cell.pos).clamp(0, 255) as u8,
                speed,
            );
            let payload = Payload::from_scalar(scalar, cell.scalar, damage, vector);
            match self.store.insert(key, cell.pos, payload) {
                Ok(new) => {
                    self.overlay_new_piece(world, new, payload);
                    added += 1;
                }
                Err(err) => {
                    trace!(%err, ?key, "rebuild cut short");
                    break;
                }
            }
        }
        added
    }

    /// Lay the overlay for a piece that was just inserted
    pub(crate) fn overlay_new_piece<W: RegionWorld + ?Sized>(
        &mut self,
        world: &mut W,
        piece: PieceKey,
        payload: Payload,
    ) {
        if matches!(payload, Payload::Terrain(_)) {
            if let Some(p) = self.store.piece_mut(piece) {
                p.payload = Payload::Terrain(None);
            }
            self.uplift(world, piece);
        }
        if let Some(pos) = self.store.piece(piece).map(|p| p.pos) {
            world.note_changed(pos);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::{RegionKind, RegionRequest};
    use crate::world::{GridWorld, ShapeParams};

    #[test]
    fn test_illegal_move_prunes_only_that_piece() {
        let mut world = GridWorld::new(10, 10);
        let mut engine = RegionEngine::with_defaults();
        let key = engine
            .create_region(
                &mut world,
                RegionRequest::new(RegionKind::FIRE_VORTEX, Pos::new(5, 5), Pos::new(5, 5))
                    .with_shape(ShapeParams::ball(1, 0)),
            )
            .expect("vortex");
        let pieces = engine.pieces_of(key);
        assert_eq!(pieces.len(), 9);

        let deltas = vec![
            CellDelta::Move {
                piece: pieces[0],
                to: Pos::new(-1, 5),
            },
            CellDelta::Move {
                piece: pieces[1],
                to: Pos::new(0, 0),
            },
        ];
        let applied = engine.apply_deltas(&mut world, key, deltas);
        assert_eq!(applied.pruned, 1);
        assert_eq!(applied.moved, 1);
        assert_eq!(engine.pieces_of(key).len(), 8);
        assert!(engine.store().region_occupies(key, Pos::new(0, 0)));
        assert!(engine.audit().is_ok());
    }

    #[test]
    fn test_move_into_held_cell_stays_put() {
        let mut world = GridWorld::new(10, 10);
        let mut engine = RegionEngine::with_defaults();
        let key = engine
            .create_region(
                &mut world,
                RegionRequest::new(RegionKind::FIRE_VORTEX, Pos::new(5, 5), Pos::new(5, 5))
                    .with_shape(ShapeParams::ball(1, 0)),
            )
            .expect("vortex");
        let pieces = engine.pieces_of(key);
        let at = |engine: &RegionEngine, k| engine.store().piece(k).map(|p| p.pos).expect("piece");
        let (first, second) = (pieces[0], pieces[1]);
        let home = at(&engine, first);
        let held = at(&engine, second);

        let applied = engine.apply_deltas(
            &mut world,
            key,
            vec![CellDelta::Move {
                piece: first,
                to: held,
            }],
        );
        assert_eq!(applied, Applied::default());
        assert_eq!(engine.pieces_of(key).len(), 9);
        assert_eq!(at(&engine, first), home);
        assert_eq!(engine.store().cell_snapshot(held).len(), 1);
        assert!(engine.audit().is_ok());
    }

    #[test]
    fn test_blocked_piece_blocks_its_follower() {
        let mut world = GridWorld::new(10, 10);
        let mut engine = RegionEngine::with_defaults();
        let key = engine
            .create_region(
                &mut world,
                RegionRequest::new(RegionKind::FIRE_VORTEX, Pos::new(5, 5), Pos::new(5, 5))
                    .with_shape(ShapeParams::ball(1, 0)),
            )
            .expect("vortex");
        let piece_at = |engine: &RegionEngine, pos| {
            engine.store().region_piece_at(key, pos).expect("piece")
        };
        let (west, centre, east) = (
            piece_at(&engine, Pos::new(5, 4)),
            piece_at(&engine, Pos::new(5, 5)),
            piece_at(&engine, Pos::new(5, 6)),
        );

        // The centre cannot join the resting east piece, so the west piece
        // following it into the centre has to stay too
        let applied = engine.apply_deltas(
            &mut world,
            key,
            vec![
                CellDelta::Move {
                    piece: west,
                    to: Pos::new(5, 5),
                },
                CellDelta::Move {
                    piece: centre,
                    to: Pos::new(5, 6),
                },
            ],
        );
        assert_eq!(applied.moved, 0);
        assert_eq!(engine.pieces_of(key).len(), 9);
        assert_eq!(piece_at(&engine, Pos::new(5, 4)), west);
        assert_eq!(piece_at(&engine, Pos::new(5, 5)), centre);
        assert_eq!(piece_at(&engine, Pos::new(5, 6)), east);
        assert!(engine.audit().is_ok());
    }

    #[test]
    fn test_pieces_may_swap_cells() {
        let mut world = GridWorld::new(10, 10);
        let mut engine = RegionEngine::with_defaults();
        let key = engine
            .create_region(
                &mut world,
                RegionRequest::new(RegionKind::FIRE_VORTEX, Pos::new(5, 5), Pos::new(5, 5))
                    .with_shape(ShapeParams::ball(1, 0)),
            )
            .expect("vortex");
        let west = engine.store().region_piece_at(key, Pos::new(5, 4)).expect("west");
        let centre = engine.store().region_piece_at(key, Pos::new(5, 5)).expect("centre");
        let applied = engine.apply_deltas(
            &mut world,
            key,
            vec![
                CellDelta::Move {
                    piece: west,
                    to: Pos::new(5, 5),
                },
                CellDelta::Move {
                    piece: centre,
                    to: Pos::new(5, 4),
                },
            ],
        );
        assert_eq!(applied.moved, 2);
        assert_eq!(engine.store().region_piece_at(key, Pos::new(5, 5)), Some(west));
        assert_eq!(engine.store().region_piece_at(key, Pos::new(5, 4)), Some(centre));
        assert!(engine.audit().is_ok());
    }

    #[test]
    fn test_empty_rebuild_makes_region_lifeless() {
        let mut world = GridWorld::new(10, 10);
        let mut engine = RegionEngine::with_defaults();
        let key = engine
            .create_region(
                &mut world,
                RegionRequest::new(RegionKind::ROTATING_BEAM, Pos::new(5, 5), Pos::new(5, 8))
                    .with_shape(ShapeParams::beam(3)),
            )
            .expect("beam");
        engine.apply_deltas(
            &mut world,
            key,
            vec![CellDelta::Rebuild {
                front: Pos::new(5, 5),
                cells: Vec::new(),
            }],
        );
        assert!(engine.pieces_of(key).is_empty());
        assert_eq!(engine.region(key).map(|r| r.phase), Some(Phase::Lifeless));
        assert!(engine.audit().is_ok());
    }
}
