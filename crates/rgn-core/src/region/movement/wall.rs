//! Wall movement: a wavefront perpendicular to the line from origin to
//! target, advancing one cell per active turn until it runs out of range
//! or into something solid

use tracing::trace;

use super::{CellDelta, Planner};
use crate::geometry::{Direction, Pos};
use crate::world::RegionWorld;

pub(super) fn plan<W: RegionWorld + ?Sized>(planner: &Planner<'_, W>) -> Vec<CellDelta> {
    let region = planner.region;
    let Some(axis) = Direction::major_axis(region.origin, region.target) else {
        return Vec::new();
    };
    let next = region.front.step(axis);
    let range = i32::from(region.shape.range);

    let cells = if region.origin.distance(next) > range || !planner.passable(next) {
        trace!(key = ?planner.key, ?next, "wall front stopped");
        Vec::new()
    } else {
        planner.world.project_shape(region.origin, next, &region.shape)
    };
    vec![CellDelta::Rebuild { front: next, cells }]
}

/// First wavefront cell of a wall launched from `origin` towards `target`
pub(crate) fn first_front(origin: Pos, target: Pos) -> Pos {
    Direction::major_axis(origin, target).map_or(origin, |axis| origin.step(axis))
}
