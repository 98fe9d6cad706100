//! The region engine
//!
//! [`RegionEngine`] owns the templates, the pools and the cell index for one
//! level. The game creates regions through it, fires triggers when movers
//! enter cells, and runs [`RegionEngine::process_turn`] once per game turn.

use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::{debug, trace};

use super::index::RegionStore;
use super::info::{MovementMode, RegionCatalog, RegionKind, ScalarMode};
use super::movement::first_front;
use super::pool::PoolKind;
use super::types::{Payload, PieceKey, Region, RegionKey, RegionPiece, VectorPayload};
use crate::config::EngineConfig;
use crate::error::{IndexFault, RegionError};
use crate::geometry::Pos;
use crate::world::{RegionWorld, Shape, ShapeParams, SourceTag};

/// Everything needed to create a region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionRequest {
    pub source: SourceTag,
    pub kind: RegionKind,
    pub damage: i32,
    pub shape: ShapeParams,
    /// Caster level; also the difficulty of dodging a triggered region
    pub level: i32,
    pub origin: Pos,
    pub target: Pos,
}

impl RegionRequest {
    /// Single-cell request with no damage from an unknown source
    pub fn new(kind: RegionKind, origin: Pos, target: Pos) -> Self {
        Self {
            source: SourceTag::Unknown,
            kind,
            damage: 0,
            shape: ShapeParams::spot(),
            level: 1,
            origin,
            target,
        }
    }

    /// Who cast the region; seekers hunt that side's enemies
    pub fn with_source(mut self, source: SourceTag) -> Self {
        self.source = source;
        self
    }

    /// Base damage for every piece
    pub fn with_damage(mut self, damage: i32) -> Self {
        self.damage = damage;
        self
    }

    /// Override the template's projection shape
    pub fn with_shape(mut self, shape: ShapeParams) -> Self {
        self.shape = shape;
        self
    }

    /// Caster level, rolled against by avoidable triggers
    pub fn with_level(mut self, level: i32) -> Self {
        self.level = level;
        self
    }
}

/// Why a region ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Retirement {
    /// Reached its lifespan
    Expired,
    /// Finished playing backwards
    Unwound,
    /// Lost every piece
    Lifeless,
    /// Removed from outside
    Dispelled,
    /// A one-shot trigger went off
    Fired,
}

/// Result of retiring a region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Retired {
    pub reason: Retirement,
    /// Child spawned over the region's last cells
    pub child: Option<RegionKey>,
}

/// Region effects for one level
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionEngine {
    pub(crate) config: EngineConfig,
    pub(crate) catalog: RegionCatalog,
    pub(crate) store: RegionStore,
    pub(crate) turn: u64,
}

impl RegionEngine {
    /// Engine with empty pools sized from `config`
    pub fn new(config: EngineConfig, catalog: RegionCatalog) -> Self {
        let store = RegionStore::from_config(&config);
        Self {
            config,
            catalog,
            store,
            turn: 0,
        }
    }

    /// Default configuration with the stock templates
    pub fn with_defaults() -> Self {
        Self::new(EngineConfig::default(), RegionCatalog::builtin())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &RegionCatalog {
        &self.catalog
    }

    pub fn store(&self) -> &RegionStore {
        &self.store
    }

    /// Turns processed so far
    pub fn turn(&self) -> u64 {
        self.turn
    }

    // ========================================================================
    // Creation
    // ========================================================================

    /// Create a region. `None` means the effect fizzled: unknown template,
    /// nothing to cover, or no room left in the pools. Failures never
    /// disturb regions that already exist.
    pub fn create_region<W: RegionWorld + ?Sized>(
        &mut self,
        world: &mut W,
        request: RegionRequest,
    ) -> Option<RegionKey> {
        match self.try_create_region(world, request) {
            Ok(key) => Some(key),
            Err(err) => {
                debug!(%err, kind = %request.kind, "region fizzled");
                None
            }
        }
    }

    /// [`Self::create_region`] with the reason for failure
    pub fn try_create_region<W: RegionWorld + ?Sized>(
        &mut self,
        world: &mut W,
        request: RegionRequest,
    ) -> Result<RegionKey, RegionError> {
        let info = self
            .catalog
            .get(request.kind)
            .ok_or(RegionError::UnknownKind { kind: request.kind })?;
        let (scalar, speed) = (info.scalar, info.speed);

        let mut shape = request.shape;
        let mut region = Region::from_info(
            info,
            request.source,
            request.damage,
            request.level,
            shape,
            request.origin,
            request.target,
        );
        let cells = if info.movement == MovementMode::Wall {
            shape.shape = Shape::Wall;
            region.shape = shape;
            region.front = first_front(request.origin, request.target);
            world.project_shape(request.origin, region.front, &shape)
        } else {
            world.project_shape(request.origin, request.target, &shape)
        };

        let mut seen: Vec<Pos> = Vec::with_capacity(cells.len());
        let cells: Vec<_> = cells
            .into_iter()
            .filter(|cell| world.in_bounds(cell.pos))
            // Vector pieces need a bearing, which the origin cell lacks
            .filter(|cell| scalar != ScalarMode::Vector || cell.pos != request.origin)
            .filter(|cell| {
                let fresh = !seen.contains(&cell.pos);
                seen.push(cell.pos);
                fresh
            })
            .collect();
        if cells.is_empty() {
            return Err(RegionError::DegenerateGeometry);
        }

        let key = self.store.allocate_region(region)?;
        let mut failure = None;
        for cell in &cells {
            let vector = VectorPayload::new(
                request.origin.angle_to(cell.pos),
                request.origin.chebyshev(cell.pos).clamp(0, 255) as u8,
                speed,
            );
            let payload = Payload::from_scalar(scalar, cell.scalar, request.damage, vector);
            match self.store.insert(key, cell.pos, payload) {
                Ok(piece) => self.overlay_new_piece(world, piece, payload),
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }

        let placed = self.store.region(key).map_or(0, Region::piece_count);
        if placed == 0 {
            self.store.release_region(key);
            return Err(failure.unwrap_or(RegionError::PoolExhausted {
                pool: PoolKind::Pieces,
                capacity: self.config.piece_capacity,
            }));
        }
        if let Some(err) = failure {
            debug!(%err, placed, wanted = cells.len(), "region created short");
        }
        trace!(?key, kind = %request.kind, placed, "region created");
        Ok(key)
    }

    // ========================================================================
    // Retirement
    // ========================================================================

    /// Tear a region down: give back its overlays, free its pieces and its
    /// slot, and spawn its one-shot child unless it was dispelled
    pub(crate) fn retire<W: RegionWorld + ?Sized>(
        &mut self,
        world: &mut W,
        key: RegionKey,
        reason: Retirement,
    ) -> Option<Retired> {
        let pieces: Vec<RegionPiece> = self
            .store
            .region_pieces(key)
            .into_iter()
            .filter_map(|k| {
                let piece = self.store.piece(k).copied();
                self.prune_piece(world, k);
                piece
            })
            .collect();
        let region = self.store.release_region(key)?;

        let child = if reason == Retirement::Dispelled {
            None
        } else {
            self.spawn_child_once(world, &region, &pieces)
        };
        debug!(?key, kind = %region.kind, %reason, age = region.age, "region retired");
        Some(Retired { reason, child })
    }

    /// Remove a region at once, with no after-effects. False when the
    /// handle is already stale.
    pub fn dispel<W: RegionWorld + ?Sized>(&mut self, world: &mut W, key: RegionKey) -> bool {
        self.retire(world, key, Retirement::Dispelled).is_some()
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Whether a handle still refers to a live region. Re-check this after
    /// anything that can set off a cascade.
    pub fn region_exists(&self, key: RegionKey) -> bool {
        self.store.contains_region(key)
    }

    /// Live region, `None` once retired
    pub fn region(&self, key: RegionKey) -> Option<&Region> {
        self.store.region(key)
    }

    pub fn piece(&self, key: PieceKey) -> Option<&RegionPiece> {
        self.store.piece(key)
    }

    /// Regions with a piece in `pos`, topmost first
    pub fn regions_at(&self, pos: Pos) -> Vec<RegionKey> {
        self.store.regions_at(pos)
    }

    /// A region's pieces in insertion order; empty for a stale handle
    pub fn pieces_of(&self, key: RegionKey) -> Vec<PieceKey> {
        self.store.region_pieces(key)
    }

    /// Regions currently allocated
    pub fn live_regions(&self) -> usize {
        self.store.region_count()
    }

    pub fn live_pieces(&self) -> usize {
        self.store.piece_count()
    }

    /// Whether an allocation failed since the last compaction cleared it
    pub fn pool_pressure(&self) -> bool {
        self.store.under_pressure()
    }

    /// Put a region's pieces in `pos` on top of the cell's stack so its
    /// trigger is considered first
    pub fn raise_region(&mut self, pos: Pos, key: RegionKey) -> bool {
        self.store.raise_region(pos, key)
    }

    /// Check that the cell index and region membership agree
    pub fn audit(&self) -> Result<(), IndexFault> {
        self.store.audit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::TerrainId;
    use crate::world::GridWorld;

    #[test]
    fn test_create_fills_projection() {
        let mut world = GridWorld::new(21, 21);
        let mut engine = RegionEngine::with_defaults();
        let centre = Pos::new(10, 10);
        let key = engine
            .create_region(
                &mut world,
                RegionRequest::new(RegionKind::FIREBALL, centre, centre)
                    .with_damage(30)
                    .with_shape(ShapeParams::ball(2, 0)),
            )
            .expect("fireball");
        assert_eq!(engine.pieces_of(key).len(), 21);
        let at_centre = engine.store().region_piece_at(key, centre).expect("centre");
        assert_eq!(
            engine.piece(at_centre).map(|p| p.payload),
            Some(Payload::Distance(0))
        );
        assert_eq!(engine.regions_at(centre), vec![key]);
        assert!(engine.audit().is_ok());
    }

    #[test]
    fn test_unknown_kind_fizzles() {
        let mut world = GridWorld::new(5, 5);
        let mut engine = RegionEngine::with_defaults();
        let request = RegionRequest::new(RegionKind(999), Pos::new(1, 1), Pos::new(1, 1));
        assert_eq!(
            engine.try_create_region(&mut world, request),
            Err(RegionError::UnknownKind {
                kind: RegionKind(999)
            })
        );
        assert!(engine.create_region(&mut world, request).is_none());
        assert_eq!(engine.live_regions(), 0);
    }

    #[test]
    fn test_degenerate_projection_fizzles() {
        let mut world = GridWorld::new(5, 5);
        world.set_terrain(Pos::new(2, 2), TerrainId::WALL);
        let mut engine = RegionEngine::with_defaults();
        let request = RegionRequest::new(RegionKind::FIRE_VORTEX, Pos::new(2, 2), Pos::new(2, 2));
        assert_eq!(
            engine.try_create_region(&mut world, request),
            Err(RegionError::DegenerateGeometry)
        );
        assert_eq!(engine.live_regions(), 0);
    }

    #[test]
    fn test_piece_exhaustion_creates_short_region() {
        let mut world = GridWorld::new(21, 21);
        let config = EngineConfig {
            piece_capacity: 5,
            ..EngineConfig::default()
        };
        let mut engine = RegionEngine::new(config, RegionCatalog::builtin());
        let centre = Pos::new(10, 10);
        let key = engine
            .create_region(
                &mut world,
                RegionRequest::new(RegionKind::FIREBALL, centre, centre)
                    .with_shape(ShapeParams::ball(2, 0)),
            )
            .expect("short fireball");
        assert_eq!(engine.pieces_of(key).len(), 5);
        assert!(engine.pool_pressure());

        let other = RegionRequest::new(RegionKind::FIRE_VORTEX, Pos::new(1, 1), Pos::new(1, 1));
        assert!(matches!(
            engine.try_create_region(&mut world, other),
            Err(RegionError::PoolExhausted {
                pool: PoolKind::Pieces,
                ..
            })
        ));
        assert_eq!(engine.live_regions(), 1);
        assert!(engine.audit().is_ok());
    }

    #[test]
    fn test_retire_frees_everything() {
        let mut world = GridWorld::new(21, 21);
        let mut engine = RegionEngine::with_defaults();
        let centre = Pos::new(10, 10);
        let key = engine
            .create_region(
                &mut world,
                RegionRequest::new(RegionKind::STINKING_CLOUD, centre, centre)
                    .with_shape(ShapeParams::ball(2, 0)),
            )
            .expect("cloud");
        let retired = engine
            .retire(&mut world, key, Retirement::Expired)
            .expect("retired");
        assert_eq!(retired.child, None);
        assert!(!engine.region_exists(key));
        assert_eq!(engine.live_pieces(), 0);
        assert!(engine.regions_at(centre).is_empty());
        assert!(engine.retire(&mut world, key, Retirement::Expired).is_none());
    }

    #[test]
    fn test_raise_region_reorders_triggers() {
        let mut world = GridWorld::new(10, 10);
        let mut engine = RegionEngine::with_defaults();
        let pos = Pos::new(3, 3);
        let low = engine
            .create_region(&mut world, RegionRequest::new(RegionKind::RUNE_TRAP, pos, pos))
            .expect("low");
        let high = engine
            .create_region(&mut world, RegionRequest::new(RegionKind::TIME_ECHO, pos, pos))
            .expect("high");
        assert_eq!(engine.regions_at(pos), vec![high, low]);
        assert!(engine.raise_region(pos, low));
        assert_eq!(engine.regions_at(pos), vec![low, high]);
    }

    #[test]
    fn test_retirement_display() {
        assert_eq!(Retirement::Dispelled.to_string(), "dispelled");
    }
}
