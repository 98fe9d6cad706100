//! Triggers, lingering damage, terrain overlays and child regions
//!
//! A trigger walks a snapshot of the entered cell's pieces and re-checks
//! every key before use: the effect it applies can kill the mover, whose
//! death can drop items onto other traps, dispel regions or spawn new
//! ones. A region that is already firing is skipped, which is what stops a
//! trap from re-entering itself through such a cascade.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use super::engine::{RegionEngine, Retirement};
use super::info::{ChildMode, RegionFlags, RegionKind, TriggerTarget};
use super::types::{Payload, Phase, PieceKey, Region, RegionKey, RegionPiece, VectorPayload};
use crate::error::RegionError;
use crate::geometry::Pos;
use crate::rng::GameRng;
use crate::world::{Cascade, EffectCause, EffectRequest, RegionWorld, TriggerKind};

/// What a trigger (and everything it set off) did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TriggerReport {
    /// Regions that delivered a triggered effect
    pub fired: usize,
    /// Triggers the mover dodged
    pub avoided: usize,
    /// Lingering hits on the mover
    pub lingered: usize,
    /// Triggered or lingering effects that landed on something
    pub affected: usize,
    /// Cascades dropped for nesting too deep
    pub cut_off: usize,
    /// Regions dispelled by cascades
    pub dispelled: usize,
}

impl TriggerReport {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// `value * percent / 100`, saturating at the `i32` range
fn scale_percent(value: i32, percent: u32) -> i32 {
    let scaled = i64::from(value) * i64::from(percent) / 100;
    scaled.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

impl RegionEngine {
    // ========================================================================
    // Triggers
    // ========================================================================

    /// A mover entered `pos` (`TriggerKind::Move`) or something was dropped
    /// there (`TriggerKind::Drop`). Fires every matching region in the
    /// cell, topmost first, then drains any cascades.
    pub fn trigger<W: RegionWorld + ?Sized>(
        &mut self,
        world: &mut W,
        rng: &mut GameRng,
        pos: Pos,
        kind: TriggerKind,
    ) -> TriggerReport {
        let mut report = TriggerReport::default();
        self.trigger_at(world, rng, pos, kind, 0, &mut report);
        report
    }

    fn trigger_at<W: RegionWorld + ?Sized>(
        &mut self,
        world: &mut W,
        rng: &mut GameRng,
        pos: Pos,
        kind: TriggerKind,
        depth: usize,
        report: &mut TriggerReport,
    ) {
        if depth > self.config.max_cascade_depth {
            let err = RegionError::CascadeTooDeep {
                depth: self.config.max_cascade_depth,
            };
            warn!(%err, ?pos, "dropping trigger");
            report.cut_off += 1;
            return;
        }

        let wanted = match kind {
            TriggerKind::Move => RegionFlags::TRIGGER_MOVE,
            TriggerKind::Drop => RegionFlags::TRIGGER_DROP,
        };
        let mut lingered: Vec<RegionKey> = Vec::new();
        let mut fired: Vec<RegionKey> = Vec::new();

        for piece in self.store.cell_snapshot(pos) {
            let Some(owner) = self.store.piece(piece).map(|p| p.region) else {
                continue;
            };
            let Some(region) = self.store.region(owner) else {
                continue;
            };
            let flags = region.flags;

            if kind == TriggerKind::Move
                && flags.contains(RegionFlags::LINGER)
                && !lingered.contains(&owner)
            {
                lingered.push(owner);
                self.linger(world, rng, owner, piece, depth, report);
            }

            let Some(region) = self.store.region(owner) else {
                continue;
            };
            if region.flags.contains(wanted) && !region.firing && !fired.contains(&owner) {
                fired.push(owner);
                self.fire(world, rng, owner, pos, depth, report);
            }
        }
    }

    /// Scaled hit on whoever walked into a lingering region's cell
    fn linger<W: RegionWorld + ?Sized>(
        &mut self,
        world: &mut W,
        rng: &mut GameRng,
        key: RegionKey,
        piece: PieceKey,
        depth: usize,
        report: &mut TriggerReport,
    ) {
        let Some(region) = self.store.region(key) else {
            return;
        };
        let Some(hit) = self.store.piece(piece).copied() else {
            return;
        };
        let damage = scale_percent(hit.payload.damage(region.damage), self.config.linger_percent);
        let request = EffectRequest {
            region: key,
            source: region.source,
            pos: hit.pos,
            damage,
            effect: region.effect,
            cause: EffectCause::Linger,
        };
        if world.apply_effect(&request) {
            report.affected += 1;
        }
        report.lingered += 1;
        self.run_cascades(world, rng, depth + 1, report);
    }

    /// Deliver a triggered region's effect
    fn fire<W: RegionWorld + ?Sized>(
        &mut self,
        world: &mut W,
        rng: &mut GameRng,
        key: RegionKey,
        entered: Pos,
        depth: usize,
        report: &mut TriggerReport,
    ) {
        let Some(region) = self.store.region(key) else {
            return;
        };
        if region.flags.contains(RegionFlags::AVOIDABLE) && world.mover_avoids(entered, region.level)
        {
            trace!(?key, ?entered, "trigger avoided");
            report.avoided += 1;
            return;
        }

        let target_mode = self
            .catalog
            .get(region.kind)
            .map_or(TriggerTarget::Cell, |info| info.trigger_target);
        let cell = match target_mode {
            TriggerTarget::Cell => Some(entered),
            TriggerTarget::RandomPiece => rng
                .choose(&region.pieces)
                .and_then(|&k| self.store.piece(k))
                .map(|p| p.pos),
            TriggerTarget::FixedPiece => {
                if self.store.region_occupies(key, region.target) {
                    Some(region.target)
                } else {
                    region
                        .pieces
                        .first()
                        .and_then(|&k| self.store.piece(k))
                        .map(|p| p.pos)
                }
            }
        };
        let Some(cell) = cell else {
            return;
        };
        let damage = self
            .store
            .region_piece_at(key, cell)
            .and_then(|k| self.store.piece(k))
            .map_or(region.damage, |p| p.payload.damage(region.damage));
        let request = EffectRequest {
            region: key,
            source: region.source,
            pos: cell,
            damage,
            effect: region.effect,
            cause: EffectCause::Trigger,
        };

        if let Some(region) = self.store.region_mut(key) {
            region.firing = true;
            region.triggered = true;
        }
        if world.apply_effect(&request) {
            report.affected += 1;
        }
        report.fired += 1;
        debug!(?key, ?cell, damage, "region triggered");

        self.run_cascades(world, rng, depth + 1, report);

        let once = match self.store.region_mut(key) {
            Some(region) => {
                region.firing = false;
                region.flags.contains(RegionFlags::ONCE)
            }
            None => false,
        };
        if once {
            self.retire(world, key, Retirement::Fired);
        }
    }

    /// Drain and act on everything the world reported since the last
    /// effect, until it has nothing more to say
    pub(crate) fn run_cascades<W: RegionWorld + ?Sized>(
        &mut self,
        world: &mut W,
        rng: &mut GameRng,
        depth: usize,
        report: &mut TriggerReport,
    ) {
        loop {
            let cascades = world.drain_cascades();
            if cascades.is_empty() {
                break;
            }
            for cascade in cascades {
                match cascade {
                    Cascade::Trigger { pos, kind } => {
                        self.trigger_at(world, rng, pos, kind, depth, report);
                    }
                    Cascade::Dispel(key) => {
                        if self.dispel(world, key) {
                            report.dispelled += 1;
                        }
                    }
                }
            }
        }
    }

    // ========================================================================
    // Terrain overlays
    // ========================================================================

    /// Another actively overlaying piece of the same kind in `pos`, other
    /// than `except`
    fn overlay_peer(&self, kind: RegionKind, pos: Pos, except: PieceKey) -> Option<PieceKey> {
        self.store.cell_snapshot(pos).into_iter().find(|&k| {
            k != except
                && self.store.piece(k).is_some_and(|p| {
                    matches!(p.payload, Payload::Terrain(_))
                        && self
                            .store
                            .region(p.region)
                            .is_some_and(|r| r.kind == kind && r.phase != Phase::Backward)
                })
        })
    }

    /// Snapshot the terrain under a terrain piece and lay the overlay.
    /// A cell already overlaid by a region of the same kind keeps its
    /// original snapshot; this piece then holds nothing.
    pub(crate) fn uplift<W: RegionWorld + ?Sized>(&mut self, world: &mut W, piece: PieceKey) {
        let Some(p) = self.store.piece(piece).copied() else {
            return;
        };
        // A region unwinding backwards has already given its terrain back
        let Some(kind) = self
            .store
            .region(p.region)
            .filter(|r| r.phase != Phase::Backward)
            .map(|r| r.kind)
        else {
            return;
        };
        let Some(overlay) = self.catalog.get(kind).and_then(|info| info.overlay) else {
            return;
        };
        let saved = if self.overlay_peer(kind, p.pos, piece).is_some() {
            None
        } else {
            let under = world.terrain(p.pos);
            world.set_terrain(p.pos, overlay);
            world.note_changed(p.pos);
            Some(under)
        };
        if let Some(p) = self.store.piece_mut(piece) {
            p.payload = Payload::Terrain(saved);
        }
    }

    /// Give back the terrain a piece is holding: to another overlaying
    /// piece of the same kind in the cell if there is one, otherwise to the
    /// map. The piece is left holding nothing.
    pub(crate) fn release_overlay<W: RegionWorld + ?Sized>(
        &mut self,
        world: &mut W,
        piece: PieceKey,
    ) {
        let Some(p) = self.store.piece(piece).copied() else {
            return;
        };
        let Payload::Terrain(Some(saved)) = p.payload else {
            return;
        };
        let Some(kind) = self.store.region(p.region).map(|r| r.kind) else {
            return;
        };
        if let Some(heir) = self.overlay_peer(kind, p.pos, piece) {
            if let Some(h) = self.store.piece_mut(heir) {
                h.payload = Payload::Terrain(Some(saved));
            }
            trace!(pos = ?p.pos, "overlay snapshot handed over");
        } else {
            world.set_terrain(p.pos, saved);
            world.note_changed(p.pos);
        }
        if let Some(p) = self.store.piece_mut(piece) {
            p.payload = Payload::Terrain(None);
        }
    }

    /// Give back every overlay a region holds, keeping its pieces
    pub(crate) fn restore_overlays<W: RegionWorld + ?Sized>(&mut self, world: &mut W, key: RegionKey) {
        for piece in self.store.region_pieces(key) {
            self.release_overlay(world, piece);
        }
    }

    // ========================================================================
    // Children
    // ========================================================================

    /// Spawn the one-shot child of a retiring region over the cells it held.
    /// Skipped while the pools are under pressure.
    pub(crate) fn spawn_child_once<W: RegionWorld + ?Sized>(
        &mut self,
        world: &mut W,
        parent: &Region,
        pieces: &[RegionPiece],
    ) -> Option<RegionKey> {
        let info = self.catalog.get(parent.kind)?;
        if !parent.flags.contains(RegionFlags::CHILD) || info.child_mode != ChildMode::Once {
            return None;
        }
        let child_kind = info.child?;
        if pieces.is_empty() {
            return None;
        }
        self.spawn_child(world, parent, child_kind, pieces)
    }

    /// Spawn one child for every piece of `key` standing on the template's
    /// source terrain. Skipped while the pools are under pressure.
    pub(crate) fn spawn_children_continuous<W: RegionWorld + ?Sized>(
        &mut self,
        world: &mut W,
        key: RegionKey,
    ) -> Vec<RegionKey> {
        let Some(parent) = self.store.region(key).cloned() else {
            return Vec::new();
        };
        let Some(info) = self.catalog.get(parent.kind) else {
            return Vec::new();
        };
        if !parent.flags.contains(RegionFlags::CHILD) || info.child_mode != ChildMode::Continuous {
            return Vec::new();
        }
        let Some(child_kind) = info.child else {
            return Vec::new();
        };
        let source = info.child_source;

        let sources: Vec<RegionPiece> = parent
            .pieces
            .iter()
            .filter_map(|&k| self.store.piece(k).copied())
            .filter(|p| source.is_none_or(|t| world.terrain(p.pos) == t))
            .collect();

        let mut spawned = Vec::new();
        for piece in sources {
            match self.spawn_child(world, &parent, child_kind, std::slice::from_ref(&piece)) {
                Some(child) => spawned.push(child),
                None => break,
            }
        }
        spawned
    }

    fn spawn_child<W: RegionWorld + ?Sized>(
        &mut self,
        world: &mut W,
        parent: &Region,
        kind: RegionKind,
        pieces: &[RegionPiece],
    ) -> Option<RegionKey> {
        if self.store.under_pressure() {
            trace!(?kind, "child skipped under pressure");
            return None;
        }
        let info = self.catalog.get(kind)?;
        let (origin, target) = match pieces {
            [single] => (single.pos, single.pos),
            _ => (parent.origin, parent.target),
        };
        let mut child = Region::from_info(
            info,
            parent.source,
            parent.damage,
            parent.level,
            parent.shape,
            origin,
            target,
        );
        child.front = parent.front;
        let (scalar, speed) = (info.scalar, info.speed);

        let key = match self.store.allocate_region(child) {
            Ok(key) => key,
            Err(err) => {
                debug!(%err, ?kind, "child skipped");
                return None;
            }
        };
        for piece in pieces {
            let vector = match piece.payload {
                Payload::Vector(v) => v,
                _ => VectorPayload::new(
                    origin.angle_to(piece.pos),
                    origin.chebyshev(piece.pos).clamp(0, 255) as u8,
                    speed,
                ),
            };
            let payload =
                Payload::from_scalar(scalar, piece.payload.scalar(), parent.damage, vector);
            match self.store.insert(key, piece.pos, payload) {
                Ok(new) => self.overlay_new_piece(world, new, payload),
                Err(err) => {
                    debug!(%err, ?kind, "child cut short");
                    break;
                }
            }
        }
        if self.store.region(key).is_none_or(Region::is_empty) {
            self.store.release_region(key);
            return None;
        }
        trace!(?key, ?kind, "child spawned");
        Some(key)
    }
}
