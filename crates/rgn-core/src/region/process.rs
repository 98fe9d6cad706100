//! Per-turn region processing
//!
//! Every live region goes through the same steps once per turn, in order:
//!
//! 1. delay countdown; a region still counting down does nothing else
//! 2. acceleration / deceleration of the delay between active turns
//! 3. lifespan: lifeless regions retire, expired reversible regions start
//!    playing backwards, unwound regions retire
//! 4. rotation
//! 5. movement, then re-projection if rotation moved the target
//! 6. the automatic effect, unless a trigger already fired it this turn,
//!    and continuous children
//! 7. aging; a forward region that reaches its lifespan retires here, so
//!    a lifespan of N means exactly N applications
//!
//! Regions created during the pass (children, cascades) wait for the next
//! turn.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::engine::{RegionEngine, Retirement};
use super::info::{MovementMode, RegionFlags};
use super::movement::{rotate, CellDelta, Planner};
use super::pool::CompactReport;
use super::trigger::TriggerReport;
use super::types::{Phase, RegionKey};
use crate::rng::GameRng;
use crate::world::{EffectCause, EffectRequest, RegionWorld};

/// What one turn of processing did
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TurnReport {
    pub turn: u64,
    /// Regions that were active (not counting down)
    pub active: usize,
    /// Automatic effect applications
    pub applied: usize,
    /// Applications that affected something
    pub affected: usize,
    /// Pieces dropped by movement
    pub pruned: usize,
    pub retired: Vec<(RegionKey, Retirement)>,
    /// Regions that started playing backwards
    pub reversed: Vec<RegionKey>,
    /// Children created this turn
    pub spawned: Vec<RegionKey>,
    /// Everything set off by cascades from automatic effects
    pub triggered: TriggerReport,
    pub compacted: Option<CompactReport>,
}

impl TurnReport {
    /// Why `key` retired this turn, if it did
    pub fn retired_as(&self, key: RegionKey) -> Option<Retirement> {
        self.retired
            .iter()
            .find(|(k, _)| *k == key)
            .map(|&(_, reason)| reason)
    }
}

impl RegionEngine {
    /// Advance every live region by one game turn
    pub fn process_turn<W: RegionWorld + ?Sized>(
        &mut self,
        world: &mut W,
        rng: &mut GameRng,
    ) -> TurnReport {
        self.turn += 1;
        let mut report = TurnReport {
            turn: self.turn,
            ..TurnReport::default()
        };

        for key in self.store.region_keys() {
            self.process_region(world, rng, key, &mut report);
        }

        // A zero interval turns periodic compaction off
        let periodic = self.turn.checked_rem(self.config.compact_every) == Some(0);
        if self.store.under_pressure() || periodic {
            report.compacted = Some(self.store.compact(self.config.pressure_release_percent));
        }
        trace!(
            turn = self.turn,
            regions = self.store.region_count(),
            pieces = self.store.piece_count(),
            "turn processed"
        );
        report
    }

    fn process_region<W: RegionWorld + ?Sized>(
        &mut self,
        world: &mut W,
        rng: &mut GameRng,
        key: RegionKey,
        report: &mut TurnReport,
    ) {
        // A cascade earlier in the pass may have retired it
        let Some(region) = self.store.region_mut(key) else {
            return;
        };

        // 1. Delay
        region.delay = region.delay.saturating_sub(1);
        if region.delay > 0 {
            region.triggered = false;
            return;
        }
        report.active += 1;

        // 2. Acceleration
        region.ramp_delay();
        region.delay = region.delay_reset;

        // 3. Lifespan
        match region.phase {
            Phase::Lifeless => {
                self.retire_into(world, key, Retirement::Lifeless, report);
                return;
            }
            Phase::Forward if region.is_expired() => {
                if !region.flags.contains(RegionFlags::REVERSIBLE) {
                    self.retire_into(world, key, Retirement::Expired, report);
                    return;
                }
                self.reverse(world, key);
                report.reversed.push(key);
            }
            Phase::Backward if region.age == 0 => {
                self.retire_into(world, key, Retirement::Unwound, report);
                return;
            }
            _ => {}
        }

        // 4. Rotation
        let Some(kind) = self.store.region(key).map(|r| r.kind) else {
            return;
        };
        let info = self.catalog.get(kind);
        let step = info.map_or(0, |i| i.rotation_step);
        let reshape = match self.store.region_mut(key) {
            Some(region) => rotate(&*world, region, step),
            None => false,
        };

        // 5. Movement
        let deltas = match (self.store.region(key), info) {
            (Some(region), Some(info)) => Planner {
                world: &*world,
                config: &self.config,
                store: &self.store,
                info,
                key,
                region,
            }
            .plan(rng),
            _ => Vec::new(),
        };
        if !deltas.is_empty() {
            report.pruned += self.apply_deltas(world, key, deltas).pruned;
        }
        if reshape {
            self.reshape(world, key, report);
        }

        // 6. Effect
        let Some(region) = self.store.region(key) else {
            return;
        };
        if region.flags.contains(RegionFlags::AUTOMATIC) && !region.triggered {
            self.apply_automatic(world, rng, key, report);
        }
        if self.store.contains_region(key) {
            let children = self.spawn_children_continuous(world, key);
            report.spawned.extend(children);
        }

        // 7. Aging
        let Some(region) = self.store.region_mut(key) else {
            return;
        };
        region.advance_age();
        region.triggered = false;
        if region.is_expired() && !region.flags.contains(RegionFlags::REVERSIBLE) {
            self.retire_into(world, key, Retirement::Expired, report);
        }
    }

    fn retire_into<W: RegionWorld + ?Sized>(
        &mut self,
        world: &mut W,
        key: RegionKey,
        reason: Retirement,
        report: &mut TurnReport,
    ) {
        if let Some(retired) = self.retire(world, key, reason) {
            report.retired.push((key, reason));
            report.spawned.extend(retired.child);
        }
    }

    /// Start playing a region backwards: its overlays come down at once and
    /// its age runs back to zero
    fn reverse<W: RegionWorld + ?Sized>(&mut self, world: &mut W, key: RegionKey) {
        self.restore_overlays(world, key);
        if let Some(region) = self.store.region_mut(key) {
            region.phase = Phase::Backward;
            if region.flags.contains(RegionFlags::REVERSE_TRIGGER_ONLY) {
                region.flags.remove(RegionFlags::AUTOMATIC);
            }
            debug!(?key, kind = %region.kind, age = region.age, "region reversing");
        }
    }

    /// Re-project a region's shape after its target moved
    fn reshape<W: RegionWorld + ?Sized>(
        &mut self,
        world: &mut W,
        key: RegionKey,
        report: &mut TurnReport,
    ) {
        let Some(region) = self.store.region(key) else {
            return;
        };
        if region.movement == MovementMode::Wall {
            return;
        }
        let front = region.front;
        let cells = world.project_shape(region.origin, region.target, &region.shape);
        let applied = self.apply_deltas(world, key, vec![CellDelta::Rebuild { front, cells }]);
        report.pruned += applied.pruned;
    }

    /// Hit every cell of a region with its effect
    fn apply_automatic<W: RegionWorld + ?Sized>(
        &mut self,
        world: &mut W,
        rng: &mut GameRng,
        key: RegionKey,
        report: &mut TurnReport,
    ) {
        for piece in self.store.region_pieces(key) {
            let Some(region) = self.store.region(key) else {
                return;
            };
            let Some(hit) = self.store.piece(piece).copied() else {
                continue;
            };
            let request = EffectRequest {
                region: key,
                source: region.source,
                pos: hit.pos,
                damage: hit.payload.damage(region.damage),
                effect: region.effect,
                cause: EffectCause::Automatic,
            };
            report.applied += 1;
            if world.apply_effect(&request) {
                report.affected += 1;
            }
            self.run_cascades(world, rng, 1, &mut report.triggered);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Pos;
    use crate::config::EngineConfig;
    use crate::region::{
        MovementMode, RegionCatalog, RegionFlags, RegionInfo, RegionKind, RegionRequest,
        ScalarMode,
    };
    use crate::terrain::TerrainId;
    use crate::world::{GridWorld, ShapeParams, TriggerKind};

    fn spot(engine: &mut RegionEngine, world: &mut GridWorld, kind: RegionKind) -> RegionKey {
        let pos = Pos::new(5, 5);
        engine
            .create_region(world, RegionRequest::new(kind, pos, pos).with_damage(8))
            .expect("region")
    }

    /// Turns on which `pos` took an automatic hit
    fn active_turns(
        engine: &mut RegionEngine,
        world: &mut GridWorld,
        rng: &mut GameRng,
        turns: u64,
    ) -> Vec<u64> {
        let mut active = Vec::new();
        for _ in 0..turns {
            let report = engine.process_turn(world, rng);
            if report.applied > 0 {
                active.push(report.turn);
            }
        }
        active
    }

    #[test]
    fn test_lifespan_counts_applications() {
        let mut world = GridWorld::new(21, 21);
        let mut engine = RegionEngine::with_defaults();
        let mut rng = GameRng::new(1);
        let centre = Pos::new(10, 10);
        let key = engine
            .create_region(
                &mut world,
                RegionRequest::new(RegionKind::FIREBALL, centre, centre)
                    .with_damage(30)
                    .with_shape(ShapeParams::ball(1, 0)),
            )
            .expect("fireball");

        engine.process_turn(&mut world, &mut rng);
        engine.process_turn(&mut world, &mut rng);
        assert!(engine.region_exists(key));
        let report = engine.process_turn(&mut world, &mut rng);
        assert_eq!(report.retired_as(key), Some(Retirement::Expired));
        assert_eq!(report.spawned.len(), 1);
        assert!(!engine.region_exists(key));
        assert_eq!(world.hits_at(centre), 3);
        assert!(world.hits().iter().all(|hit| hit.cause == EffectCause::Automatic));
    }

    #[test]
    fn test_expired_region_dies_within_a_turn() {
        let mut world = GridWorld::new(21, 21);
        let mut engine = RegionEngine::with_defaults();
        let mut rng = GameRng::new(1);
        let key = spot(&mut engine, &mut world, RegionKind::STINKING_CLOUD);
        if let Some(region) = engine.store.region_mut(key) {
            region.age = 12;
        }
        let report = engine.process_turn(&mut world, &mut rng);
        assert_eq!(report.retired_as(key), Some(Retirement::Expired));
        assert!(!engine.region_exists(key));
        assert!(
            engine
                .store()
                .piece_pool()
                .iter()
                .all(|(_, piece)| piece.region != key)
        );
        assert!(engine.audit().is_ok());
    }

    #[test]
    fn test_trigger_stands_in_for_automatic_effect() {
        let mut world = GridWorld::new(10, 10);
        let mut engine = RegionEngine::with_defaults();
        let mut rng = GameRng::new(1);
        spot(&mut engine, &mut world, RegionKind::TIME_ECHO);
        let pos = Pos::new(5, 5);

        engine.trigger(&mut world, &mut rng, pos, TriggerKind::Move);
        assert_eq!(world.hits_at(pos), 1);
        let report = engine.process_turn(&mut world, &mut rng);
        assert_eq!(report.applied, 0);
        assert_eq!(world.hits_at(pos), 1);
        let report = engine.process_turn(&mut world, &mut rng);
        assert_eq!(report.applied, 1);
        assert_eq!(world.hits_at(pos), 2);
    }

    #[test]
    fn test_reversal_drops_automatic() {
        let mut world = GridWorld::new(10, 10);
        let mut engine = RegionEngine::with_defaults();
        let mut rng = GameRng::new(1);
        let key = spot(&mut engine, &mut world, RegionKind::TIME_ECHO);
        let pos = Pos::new(5, 5);

        assert_eq!(active_turns(&mut engine, &mut world, &mut rng, 4), vec![1, 2, 3, 4]);
        let report = engine.process_turn(&mut world, &mut rng);
        assert_eq!(report.reversed, vec![key]);
        assert_eq!(report.applied, 0);
        let region = engine.region(key).expect("reversing");
        assert_eq!(region.phase, Phase::Backward);
        assert!(!region.flags.contains(RegionFlags::AUTOMATIC));
        assert_eq!(region.age, 3);

        // Still answers triggers while unwinding
        let fired = engine.trigger(&mut world, &mut rng, pos, TriggerKind::Move);
        assert_eq!(fired.fired, 1);

        assert!(active_turns(&mut engine, &mut world, &mut rng, 3).is_empty());
        assert_eq!(engine.region(key).map(|r| r.age), Some(0));
        let report = engine.process_turn(&mut world, &mut rng);
        assert_eq!(report.retired_as(key), Some(Retirement::Unwound));
    }

    #[test]
    fn test_acceleration_shortens_gaps() {
        let mut world = GridWorld::new(10, 10);
        let mut engine = RegionEngine::with_defaults();
        let mut rng = GameRng::new(1);
        let key = spot(&mut engine, &mut world, RegionKind::QUICKENING_STORM);
        assert_eq!(
            active_turns(&mut engine, &mut world, &mut rng, 20),
            vec![6, 10, 12, 13, 14, 15, 16, 17]
        );
        assert!(!engine.region_exists(key));
    }

    #[test]
    fn test_deceleration_lengthens_gaps() {
        let mut world = GridWorld::new(10, 10);
        let mut engine = RegionEngine::with_defaults();
        let mut rng = GameRng::new(1);
        let key = spot(&mut engine, &mut world, RegionKind::FADING_MIASMA);
        assert_eq!(
            active_turns(&mut engine, &mut world, &mut rng, 12),
            vec![1, 3, 6, 11]
        );
        assert_eq!(engine.region(key).map(|r| r.delay_reset), Some(7));
    }

    #[test]
    fn test_lifeless_region_retires() {
        let mut world = GridWorld::new(10, 10);
        let mut engine = RegionEngine::with_defaults();
        let mut rng = GameRng::new(1);
        let key = spot(&mut engine, &mut world, RegionKind::WALL_OF_FORCE);
        if let Some(region) = engine.store.region_mut(key) {
            region.phase = Phase::Lifeless;
        }
        let report = engine.process_turn(&mut world, &mut rng);
        assert_eq!(report.retired_as(key), Some(Retirement::Lifeless));
        assert_eq!(engine.live_pieces(), 0);
    }

    #[test]
    fn test_rotating_beam_reprojects() {
        let mut world = GridWorld::new(21, 21);
        let mut engine = RegionEngine::with_defaults();
        let mut rng = GameRng::new(1);
        let key = engine
            .create_region(
                &mut world,
                RegionRequest::new(RegionKind::ROTATING_BEAM, Pos::new(10, 10), Pos::new(10, 14))
                    .with_shape(ShapeParams::beam(4)),
            )
            .expect("beam");
        assert!(engine.store().region_occupies(key, Pos::new(10, 14)));

        engine.process_turn(&mut world, &mut rng);
        let region = engine.region(key).expect("beam");
        assert_eq!(region.facing, 315);
        assert_eq!(engine.pieces_of(key).len(), 4);
        assert!(engine.store().region_occupies(key, Pos::new(13, 13)));
        assert!(!engine.store().region_occupies(key, Pos::new(10, 14)));
        assert_eq!(world.hits_at(Pos::new(13, 13)), 1);
        assert_eq!(world.hits_at(Pos::new(10, 14)), 0);
    }

    #[test]
    fn test_periodic_compaction() {
        let mut world = GridWorld::new(10, 10);
        let mut engine = RegionEngine::with_defaults();
        let mut rng = GameRng::new(1);
        for _ in 0..9 {
            assert!(engine.process_turn(&mut world, &mut rng).compacted.is_none());
        }
        let report = engine.process_turn(&mut world, &mut rng);
        assert_eq!(report.compacted, Some(CompactReport::default()));
    }

    #[test]
    fn test_zero_interval_skips_periodic_compaction() {
        let mut world = GridWorld::new(10, 10);
        let config = EngineConfig {
            compact_every: 0,
            ..EngineConfig::default()
        };
        let mut engine = RegionEngine::new(config, RegionCatalog::builtin());
        let mut rng = GameRng::new(1);
        spot(&mut engine, &mut world, RegionKind::STINKING_CLOUD);
        for _ in 0..25 {
            assert!(engine.process_turn(&mut world, &mut rng).compacted.is_none());
        }
    }

    #[test]
    fn test_unwinding_overlay_does_not_relay_terrain() {
        let mut world = GridWorld::new(20, 20);
        let mut catalog = RegionCatalog::builtin();
        catalog.insert(RegionInfo {
            flags: RegionFlags::REVERSIBLE,
            movement: MovementMode::Spread,
            scalar: ScalarMode::Terrain,
            lifespan: Some(3),
            spread_chance: 100,
            spread_limit: 1,
            overlay: Some(TerrainId::SCORCHED),
            ..RegionInfo::new(RegionKind(80), "smouldering patch")
        });
        let mut engine = RegionEngine::new(EngineConfig::default(), catalog);
        let mut rng = GameRng::new(4);
        let centre = Pos::new(10, 10);
        let key = engine
            .create_region(&mut world, RegionRequest::new(RegionKind(80), centre, centre))
            .expect("patch");
        let scorched = |world: &GridWorld| {
            (0..20)
                .flat_map(|y| (0..20).map(move |x| Pos::new(y, x)))
                .filter(|&pos| world.terrain(pos) == TerrainId::SCORCHED)
                .count()
        };
        assert_eq!(scorched(&world), 1);

        let mut backward_turns = 0;
        for _ in 0..12 {
            engine.process_turn(&mut world, &mut rng);
            match engine.region(key).map(|r| r.phase) {
                Some(Phase::Backward) => {
                    backward_turns += 1;
                    assert_eq!(scorched(&world), 0);
                    assert_eq!(engine.pieces_of(key).len(), 1);
                }
                Some(_) => assert_eq!(scorched(&world), 1),
                None => break,
            }
        }
        assert!(backward_turns > 0);
        assert!(!engine.region_exists(key));
        assert_eq!(scorched(&world), 0);
        assert!(engine.audit().is_ok());
    }
}
