//! Vector movement: every piece rides its own bearing outwards from the
//! origin at its own speed, and drops out when the path is cut or its
//! travel runs out

use super::{CellDelta, Planner};
use crate::geometry::point_at;
use crate::region::types::Payload;
use crate::world::RegionWorld;

/// Far point used to fix a bearing's line regardless of how far along it a
/// piece has travelled
const AIM_DISTANCE: i32 = 32;

pub(super) fn plan<W: RegionWorld + ?Sized>(planner: &Planner<'_, W>) -> Vec<CellDelta> {
    let region = planner.region;
    let range = u32::from(region.shape.range);
    let mut deltas = Vec::new();

    for (piece, pos) in planner.pieces() {
        let Some(Payload::Vector(v)) = planner.store.piece(piece).map(|p| p.payload) else {
            continue;
        };
        let dist = v.distance_at(region.age + 1);
        if range > 0 && dist > range {
            deltas.push(CellDelta::Prune { piece });
            continue;
        }
        if dist == 0 {
            continue;
        }

        let reach = AIM_DISTANCE.max(dist as i32);
        let aim = point_at(region.origin, v.angle, reach);
        let path = planner.world.project_path(
            region.origin,
            aim,
            dist as usize,
            region.shape.flags,
        );
        match path.get(dist as usize - 1) {
            Some(&to) if to != pos => deltas.push(CellDelta::Move { piece, to }),
            Some(_) => {}
            None => deltas.push(CellDelta::Prune { piece }),
        }
    }
    deltas
}
