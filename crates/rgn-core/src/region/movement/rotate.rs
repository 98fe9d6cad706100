//! Rotation pre-pass
//!
//! Turns a rotating region's facing by its step. When the first cell along
//! the new facing is blocked the region bounces: its sense of rotation
//! flips and it tries the other way. A region blocked both ways holds its
//! facing.

use crate::geometry::{normalize_angle, point_at};
use crate::region::info::RegionFlags;
use crate::region::types::Region;
use crate::world::RegionWorld;

/// Rotate `region` by `step` degrees. Returns true when the facing changed
/// and the region's shape must be re-projected.
pub(crate) fn rotate<W: RegionWorld + ?Sized>(world: &W, region: &mut Region, step: u16) -> bool {
    let sign = region.flags.rotation_sign();
    if sign == 0 || step == 0 {
        return false;
    }
    let (origin, flags) = (region.origin, region.shape.flags);
    let clear = |facing: u16| world.is_passable(point_at(origin, facing, 1), flags);

    let forward = normalize_angle(i32::from(region.facing) + sign * i32::from(step));
    let facing = if clear(forward) {
        forward
    } else {
        let back = normalize_angle(i32::from(region.facing) - sign * i32::from(step));
        if !clear(back) {
            return false;
        }
        region.flags.toggle(RegionFlags::ROTATE_CLOCKWISE | RegionFlags::ROTATE_COUNTER);
        back
    };

    region.facing = facing;
    let reach = i32::from(region.shape.range.max(1));
    region.target = point_at(origin, facing, reach);
    true
}
