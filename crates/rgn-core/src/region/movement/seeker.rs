//! Seeker movement: the whole region steps one cell towards the nearest
//! target, with a miss chance that grows as the surroundings close in

use strum::IntoEnumIterator;
use tracing::trace;

use super::{CellDelta, Planner};
use crate::geometry::{Direction, Pos};
use crate::rng::GameRng;
use crate::world::RegionWorld;

pub(super) fn plan<W: RegionWorld + ?Sized>(
    planner: &Planner<'_, W>,
    rng: &mut GameRng,
) -> Vec<CellDelta> {
    let pieces = planner.pieces();
    let Some(&(_, head)) = pieces.first() else {
        return Vec::new();
    };

    let Some(dir) = choose_direction(planner, rng, head) else {
        trace!(key = ?planner.key, ?head, "seeker is boxed in");
        return Vec::new();
    };

    pieces
        .into_iter()
        .map(|(piece, pos)| CellDelta::Move {
            piece,
            to: pos.step(dir),
        })
        .collect()
}

/// Step towards the target when the chase roll succeeds, a random step
/// otherwise, and any open step when the chosen one is blocked
fn choose_direction<W: RegionWorld + ?Sized>(
    planner: &Planner<'_, W>,
    rng: &mut GameRng,
    head: Pos,
) -> Option<Direction> {
    let open: Vec<Direction> = Direction::iter()
        .filter(|&d| planner.passable(head.step(d)))
        .collect();
    if open.is_empty() {
        return None;
    }

    let chase = planner.config.seeker_chase_percent(open.len());
    let chased = if rng.percent(chase) {
        planner
            .world
            .nearest_target(head, planner.region.source)
            .and_then(|target| Direction::toward(head, target))
    } else {
        None
    };
    let dir = chased.unwrap_or_else(|| rng.direction());

    if open.contains(&dir) {
        Some(dir)
    } else {
        rng.choose(&open).copied()
    }
}

#[cfg(test)]
mod tests {
    use crate::geometry::Pos;
    use crate::region::{RegionEngine, RegionKind, RegionRequest};
    use crate::rng::GameRng;
    use crate::terrain::TerrainId;
    use crate::world::{GridWorld, RegionWorld, ShapeParams, SourceTag};

    #[test]
    fn test_seeker_closes_in_on_target() {
        let mut world = GridWorld::walled(30, 30);
        world.add_target(Pos::new(15, 25));
        let mut engine = RegionEngine::with_defaults();
        let mut rng = GameRng::new(7);
        let key = engine
            .create_region(
                &mut world,
                RegionRequest::new(RegionKind::FIRE_VORTEX, Pos::new(15, 5), Pos::new(15, 5))
                    .with_source(SourceTag::Player),
            )
            .expect("vortex");

        let start = Pos::new(15, 5).chebyshev(Pos::new(15, 25));
        for _ in 0..15 {
            engine.process_turn(&mut world, &mut rng);
        }
        let pos = engine.region(key).map(|r| r.origin).expect("alive");
        assert!(pos.chebyshev(Pos::new(15, 25)) < start);
    }

    #[test]
    fn test_boxed_in_seeker_stays_put() {
        let mut world = GridWorld::new(9, 9);
        world.fill(Pos::new(3, 3), Pos::new(5, 5), TerrainId::WALL);
        world.set_terrain(Pos::new(4, 4), TerrainId::FLOOR);
        world.add_target(Pos::new(0, 0));
        let mut engine = RegionEngine::with_defaults();
        let mut rng = GameRng::new(3);
        let key = engine
            .create_region(
                &mut world,
                RegionRequest::new(RegionKind::FIRE_VORTEX, Pos::new(4, 4), Pos::new(4, 4))
                    .with_shape(ShapeParams::spot()),
            )
            .expect("vortex");
        engine.process_turn(&mut world, &mut rng);
        assert_eq!(engine.region(key).map(|r| r.origin), Some(Pos::new(4, 4)));
    }
}
