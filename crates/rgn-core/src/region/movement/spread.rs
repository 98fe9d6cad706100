//! Spread movement: clouds that billow into neighbouring cells, growing
//! until they hit their piece limit and drifting afterwards

use super::{CellDelta, Planner};
use crate::rng::GameRng;
use crate::world::RegionWorld;

pub(super) fn plan<W: RegionWorld + ?Sized>(
    planner: &Planner<'_, W>,
    rng: &mut GameRng,
) -> Vec<CellDelta> {
    let chance = planner.info.spread_chance;
    if chance == 0 {
        return Vec::new();
    }
    // Growth is optional work; skip it while the pools are under pressure
    let may_grow = !planner.store.under_pressure();
    let mut count = planner.region.piece_count();
    let mut deltas = Vec::new();

    for (piece, pos) in planner.pieces() {
        if !rng.percent(chance) {
            continue;
        }
        let to = pos.step(rng.direction());
        if !planner.passable(to) {
            continue;
        }
        if may_grow && count < planner.info.spread_limit {
            count += 1;
            deltas.push(CellDelta::Duplicate { piece, to });
        } else {
            deltas.push(CellDelta::Move { piece, to });
        }
    }
    deltas
}

#[cfg(test)]
mod tests {
    use crate::config::EngineConfig;
    use crate::geometry::Pos;
    use crate::region::{
        MovementMode, RegionCatalog, RegionEngine, RegionFlags, RegionInfo, RegionKey,
        RegionKind, RegionRequest,
    };
    use crate::rng::GameRng;
    use crate::world::{GridWorld, ShapeParams};

    fn billow(limit: usize) -> RegionEngine {
        billow_with(EngineConfig::default(), limit)
    }

    fn billow_with(config: EngineConfig, limit: usize) -> RegionEngine {
        let mut catalog = RegionCatalog::new();
        catalog.insert(RegionInfo {
            flags: RegionFlags::AUTOMATIC,
            movement: MovementMode::Spread,
            lifespan: Some(50),
            spread_chance: 100,
            spread_limit: limit,
            ..RegionInfo::new(RegionKind(90), "billow")
        });
        RegionEngine::new(config, catalog)
    }

    #[test]
    fn test_cloud_grows_to_its_limit() {
        let mut world = GridWorld::new(40, 40);
        let mut engine = billow(12);
        let mut rng = GameRng::new(19);
        let key = engine
            .create_region(
                &mut world,
                RegionRequest::new(RegionKind(90), Pos::new(20, 20), Pos::new(20, 20)),
            )
            .expect("cloud");
        let mut peak = 1;
        for _ in 0..30 {
            engine.process_turn(&mut world, &mut rng);
            let now = engine.pieces_of(key).len();
            assert!(now <= 12);
            peak = peak.max(now);
        }
        assert!(peak > 1);
        assert!(engine.audit().is_ok());
    }

    /// Nine-piece cloud in the middle of a floor too wide to drift off
    fn full_cloud(engine: &mut RegionEngine, world: &mut GridWorld) -> RegionKey {
        let centre = Pos::new(30, 30);
        engine
            .create_region(
                world,
                RegionRequest::new(RegionKind(90), centre, centre)
                    .with_shape(ShapeParams::ball(1, 0)),
            )
            .expect("cloud")
    }

    #[test]
    fn test_cloud_at_its_limit_drifts_without_shrinking() {
        let mut world = GridWorld::new(61, 61);
        let mut engine = billow(9);
        let mut rng = GameRng::new(5);
        let key = full_cloud(&mut engine, &mut world);
        let start: Vec<Pos> = cells_of(&engine, key);
        assert_eq!(start.len(), 9);

        let mut drifted = false;
        for turn in 1..=25 {
            engine.process_turn(&mut world, &mut rng);
            assert_eq!(engine.pieces_of(key).len(), 9, "turn {turn}");
            drifted |= cells_of(&engine, key) != start;
        }
        assert!(drifted);
        assert!(engine.audit().is_ok());
    }

    #[test]
    fn test_cloud_under_pressure_drifts_without_growing_or_shrinking() {
        let mut world = GridWorld::new(61, 61);
        let config = EngineConfig {
            region_capacity: 1,
            ..EngineConfig::default()
        };
        let mut engine = billow_with(config, 40);
        let mut rng = GameRng::new(8);
        let key = full_cloud(&mut engine, &mut world);
        let far = Pos::new(5, 5);
        assert!(
            engine
                .create_region(&mut world, RegionRequest::new(RegionKind(90), far, far))
                .is_none()
        );
        assert!(engine.store().under_pressure());

        for turn in 1..=25 {
            engine.process_turn(&mut world, &mut rng);
            assert!(engine.store().under_pressure());
            assert_eq!(engine.pieces_of(key).len(), 9, "turn {turn}");
        }
        assert!(engine.audit().is_ok());
    }

    fn cells_of(engine: &RegionEngine, key: RegionKey) -> Vec<Pos> {
        let mut cells: Vec<Pos> = engine
            .pieces_of(key)
            .into_iter()
            .filter_map(|p| engine.store().piece(p).map(|p| p.pos))
            .collect();
        cells.sort_by_key(|p| (p.y, p.x));
        cells
    }

    #[test]
    fn test_cloud_never_stacks_on_itself() {
        let mut world = GridWorld::new(40, 40);
        let mut engine = billow(30);
        let mut rng = GameRng::new(23);
        let key = engine
            .create_region(
                &mut world,
                RegionRequest::new(RegionKind(90), Pos::new(20, 20), Pos::new(20, 20)),
            )
            .expect("cloud");
        for _ in 0..20 {
            engine.process_turn(&mut world, &mut rng);
        }
        let mut cells: Vec<Pos> = engine
            .pieces_of(key)
            .into_iter()
            .filter_map(|p| engine.store().piece(p).map(|p| p.pos))
            .collect();
        let total = cells.len();
        cells.sort_by_key(|p| (p.y, p.x));
        cells.dedup();
        assert_eq!(cells.len(), total);
    }
}
