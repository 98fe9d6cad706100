//! Reference world: a rectangular terrain map with point targets
//!
//! Good enough to drive the engine in tests and tools. It implements the
//! projection primitive for every [`Shape`], records every effect it
//! receives, and can be scripted to produce cascades when particular cells
//! are hit.

use hashbrown::HashMap;

use super::{
    Cascade, EffectRequest, ProjectFlags, RegionWorld, Shape, ShapeCell, ShapeParams, SourceTag,
};
use crate::geometry::{angle_between, line_path, Direction, Pos};
use crate::terrain::TerrainId;

/// Rectangular map implementing [`RegionWorld`]
#[derive(Debug, Clone)]
pub struct GridWorld {
    width: i32,
    height: i32,
    terrain: Vec<TerrainId>,
    /// Things seekers chase and effects can hurt
    targets: Vec<Pos>,
    /// Every effect applied, in order
    hits: Vec<EffectRequest>,
    /// Movers dodge traps whose difficulty is at most this
    alertness: Option<i32>,
    /// Cascades to raise the first time a cell is hit
    scripted: HashMap<Pos, Vec<Cascade>>,
    pending: Vec<Cascade>,
    changed: Vec<Pos>,
}

impl GridWorld {
    /// All-floor map
    pub fn new(width: i32, height: i32) -> Self {
        let cells = (width.max(0) * height.max(0)) as usize;
        Self {
            width,
            height,
            terrain: vec![TerrainId::FLOOR; cells],
            targets: Vec::new(),
            hits: Vec::new(),
            alertness: None,
            scripted: HashMap::new(),
            pending: Vec::new(),
            changed: Vec::new(),
        }
    }

    /// Floor map enclosed by a one-cell wall border
    pub fn walled(width: i32, height: i32) -> Self {
        let mut world = Self::new(width, height);
        for x in 0..width {
            world.set_terrain(Pos::new(0, x), TerrainId::WALL);
            world.set_terrain(Pos::new(height - 1, x), TerrainId::WALL);
        }
        for y in 0..height {
            world.set_terrain(Pos::new(y, 0), TerrainId::WALL);
            world.set_terrain(Pos::new(y, width - 1), TerrainId::WALL);
        }
        world
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    fn idx(&self, pos: Pos) -> Option<usize> {
        if self.in_bounds(pos) {
            Some((pos.y * self.width + pos.x) as usize)
        } else {
            None
        }
    }

    /// Put a creature seekers will chase at `pos`
    pub fn add_target(&mut self, pos: Pos) {
        self.targets.push(pos);
    }

    /// Remove the target at `pos`, if any
    pub fn remove_target(&mut self, pos: Pos) {
        self.targets.retain(|&t| t != pos);
    }

    pub fn targets(&self) -> &[Pos] {
        &self.targets
    }

    /// Level of the mover for avoidance rolls; `None` never avoids
    pub fn set_alertness(&mut self, alertness: Option<i32>) {
        self.alertness = alertness;
    }

    /// Raise `cascade` the first time an effect lands on `pos`
    pub fn script_cascade(&mut self, pos: Pos, cascade: Cascade) {
        self.scripted.entry(pos).or_default().push(cascade);
    }

    /// Queue a cascade to be drained with the next batch
    pub fn push_cascade(&mut self, cascade: Cascade) {
        self.pending.push(cascade);
    }

    /// Every effect applied so far, oldest first
    pub fn hits(&self) -> &[EffectRequest] {
        &self.hits
    }

    /// Number of effects applied at `pos`
    pub fn hits_at(&self, pos: Pos) -> usize {
        self.hits.iter().filter(|hit| hit.pos == pos).count()
    }

    /// Drain the recorded effects
    pub fn take_hits(&mut self) -> Vec<EffectRequest> {
        std::mem::take(&mut self.hits)
    }

    /// Cells flagged for redraw
    pub fn changed(&self) -> &[Pos] {
        &self.changed
    }

    /// Fill a rectangle (inclusive corners) with one terrain
    pub fn fill(&mut self, from: Pos, to: Pos, terrain: TerrainId) {
        for y in from.y.min(to.y)..=from.y.max(to.y) {
            for x in from.x.min(to.x)..=from.x.max(to.x) {
                self.set_terrain(Pos::new(y, x), terrain);
            }
        }
    }

    /// Text picture of the terrain, one row per line
    pub fn render(&self) -> String {
        let mut out = String::new();
        for y in 0..self.height {
            for x in 0..self.width {
                out.push(self.terrain(Pos::new(y, x)).symbol());
            }
            out.push('\n');
        }
        out
    }

    // ========================================================================
    // Projection
    // ========================================================================

    /// Where a bolt from `origin` towards `target` comes to rest, and how
    /// far it travelled
    fn bolt_end(&self, origin: Pos, target: Pos, params: &ShapeParams) -> (Pos, i32) {
        if origin == target {
            return (origin, 0);
        }
        let range = usize::from(params.range.max(1));
        let mut end = (origin, 0);
        for (step, pos) in line_path(origin, target, range).into_iter().enumerate() {
            if !self.is_passable(pos, params.flags) {
                break;
            }
            end = (pos, step as i32 + 1);
            if pos == target {
                break;
            }
        }
        end
    }

    fn area(&self, centre: Pos, radius: i32, flags: ProjectFlags) -> Vec<ShapeCell> {
        let mut cells = Vec::new();
        for y in centre.y - radius..=centre.y + radius {
            for x in centre.x - radius..=centre.x + radius {
                let pos = Pos::new(y, x);
                let dist = centre.distance(pos);
                if dist > radius || !self.is_passable(pos, flags) {
                    continue;
                }
                if !flags.contains(ProjectFlags::THRU_WALLS) && !self.line_of_sight(centre, pos) {
                    continue;
                }
                cells.push(ShapeCell::new(pos, dist));
            }
        }
        cells
    }

    fn ball(&self, origin: Pos, target: Pos, params: &ShapeParams) -> Vec<ShapeCell> {
        let (centre, _) = self.bolt_end(origin, target, params);
        if !self.is_passable(centre, params.flags) {
            return Vec::new();
        }
        self.area(centre, i32::from(params.radius), params.flags)
    }

    fn arc(&self, origin: Pos, target: Pos, params: &ShapeParams) -> Vec<ShapeCell> {
        let facing = origin.angle_to(target);
        let half = params.arc / 2;
        self.area(origin, i32::from(params.radius), params.flags)
            .into_iter()
            .filter(|cell| {
                if cell.pos == origin {
                    params.flags.contains(ProjectFlags::KEEP_ORIGIN)
                } else {
                    angle_between(origin.angle_to(cell.pos), facing) <= half
                }
            })
            .collect()
    }

    fn beam(&self, origin: Pos, target: Pos, params: &ShapeParams) -> Vec<ShapeCell> {
        let range = usize::from(params.range.max(1));
        let mut cells = Vec::new();
        if params.flags.contains(ProjectFlags::KEEP_ORIGIN) {
            cells.push(ShapeCell::new(origin, 0));
        }
        for (step, pos) in line_path(origin, target, range).into_iter().enumerate() {
            if !self.is_passable(pos, params.flags) {
                break;
            }
            cells.push(ShapeCell::new(pos, step as i32 + 1));
        }
        cells
    }

    fn wall(&self, origin: Pos, target: Pos, params: &ShapeParams) -> Vec<ShapeCell> {
        if !self.is_passable(target, params.flags) {
            return Vec::new();
        }
        let axis = Direction::major_axis(origin, target).unwrap_or(Direction::East);
        let (ax, ay) = axis.delta();
        // Perpendicular to the axis of travel
        let (px, py) = (ay, ax);
        let mut cells = vec![ShapeCell::new(target, 0)];
        for sign in [1, -1] {
            for k in 1..=i32::from(params.radius) {
                let pos = target.offset(px * k * sign, py * k * sign);
                if !self.is_passable(pos, params.flags) {
                    break;
                }
                cells.push(ShapeCell::new(pos, k));
            }
        }
        cells
    }
}

impl RegionWorld for GridWorld {
    fn in_bounds(&self, pos: Pos) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width && pos.y < self.height
    }

    fn project_shape(&self, origin: Pos, target: Pos, params: &ShapeParams) -> Vec<ShapeCell> {
        match params.shape {
            Shape::Spot => {
                if self.is_passable(target, params.flags) {
                    vec![ShapeCell::new(target, 0)]
                } else {
                    Vec::new()
                }
            }
            Shape::Bolt => {
                let (end, dist) = self.bolt_end(origin, target, params);
                if end == origin && origin != target {
                    Vec::new()
                } else {
                    vec![ShapeCell::new(end, dist)]
                }
            }
            Shape::Beam => self.beam(origin, target, params),
            Shape::Ball => self.ball(origin, target, params),
            Shape::Arc => self.arc(origin, target, params),
            Shape::Wall => self.wall(origin, target, params),
        }
    }

    fn apply_effect(&mut self, request: &EffectRequest) -> bool {
        self.hits.push(*request);
        if let Some(cascades) = self.scripted.remove(&request.pos) {
            self.pending.extend(cascades);
        }
        self.targets.contains(&request.pos)
    }

    fn is_passable(&self, pos: Pos, flags: ProjectFlags) -> bool {
        if !self.in_bounds(pos) {
            return false;
        }
        flags.contains(ProjectFlags::THRU_WALLS) || !self.terrain(pos).blocks()
    }

    fn nearest_target(&self, from: Pos, _source: SourceTag) -> Option<Pos> {
        self.targets
            .iter()
            .copied()
            .min_by_key(|&t| from.distance(t))
    }

    fn terrain(&self, pos: Pos) -> TerrainId {
        self.idx(pos)
            .map(|i| self.terrain[i])
            .unwrap_or(TerrainId::STONE)
    }

    fn set_terrain(&mut self, pos: Pos, terrain: TerrainId) {
        if let Some(i) = self.idx(pos) {
            self.terrain[i] = terrain;
        }
    }

    fn mover_avoids(&mut self, _pos: Pos, difficulty: i32) -> bool {
        self.alertness.is_some_and(|alert| alert >= difficulty)
    }

    fn drain_cascades(&mut self) -> Vec<Cascade> {
        std::mem::take(&mut self.pending)
    }

    fn note_changed(&mut self, pos: Pos) {
        self.changed.push(pos);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::RegionKey;
    use crate::world::{EffectCause, EffectKind, TriggerKind};

    #[test]
    fn test_ball_radius_two_in_open_room() {
        let world = GridWorld::new(21, 21);
        let centre = Pos::new(10, 10);
        let cells = world.project_shape(centre, centre, &ShapeParams::ball(2, 10));
        assert!(cells.iter().any(|c| c.pos == centre && c.scalar == 0));
        assert!(cells.iter().all(|c| centre.distance(c.pos) <= 2));
        // (8,10),(12,10),(10,8),(10,12) are at distance 2, (8,8) is at 3
        assert!(cells.iter().any(|c| c.pos == Pos::new(8, 10)));
        assert!(!cells.iter().any(|c| c.pos == Pos::new(8, 8)));
    }

    #[test]
    fn test_ball_blocked_by_wall() {
        let mut world = GridWorld::new(21, 21);
        world.fill(Pos::new(0, 12), Pos::new(20, 12), TerrainId::WALL);
        let centre = Pos::new(10, 10);
        let cells = world.project_shape(centre, centre, &ShapeParams::ball(4, 10));
        assert!(cells.iter().all(|c| c.pos.x < 12));
    }

    #[test]
    fn test_beam_stops_at_wall() {
        let mut world = GridWorld::new(20, 5);
        world.set_terrain(Pos::new(2, 6), TerrainId::WALL);
        let cells = world.project_shape(Pos::new(2, 1), Pos::new(2, 10), &ShapeParams::beam(20));
        let xs: Vec<i32> = cells.iter().map(|c| c.pos.x).collect();
        assert_eq!(xs, vec![2, 3, 4, 5]);
    }

    #[test]
    fn test_wall_is_perpendicular() {
        let world = GridWorld::new(20, 20);
        let cells = world.project_shape(Pos::new(10, 2), Pos::new(10, 3), &ShapeParams::wall(2, 10));
        let mut ys: Vec<i32> = cells.iter().map(|c| c.pos.y).collect();
        ys.sort();
        assert_eq!(ys, vec![8, 9, 10, 11, 12]);
        assert!(cells.iter().all(|c| c.pos.x == 3));
    }

    #[test]
    fn test_arc_faces_target() {
        let world = GridWorld::new(30, 30);
        let origin = Pos::new(15, 15);
        let cells = world.project_shape(origin, Pos::new(15, 25), &ShapeParams::arc(5, 60));
        assert!(!cells.is_empty());
        assert!(cells.iter().all(|c| c.pos.x > origin.x));
        assert!(!cells.iter().any(|c| c.pos == origin));
    }

    #[test]
    fn test_scripted_cascade_fires_once() {
        let mut world = GridWorld::new(5, 5);
        let pos = Pos::new(2, 2);
        world.script_cascade(
            pos,
            Cascade::Trigger {
                pos: Pos::new(2, 3),
                kind: TriggerKind::Drop,
            },
        );
        let request = EffectRequest {
            region: RegionKey::default(),
            source: SourceTag::Trap,
            pos,
            damage: 3,
            effect: EffectKind::FIRE,
            cause: EffectCause::Automatic,
        };
        world.apply_effect(&request);
        world.apply_effect(&request);
        assert_eq!(world.drain_cascades().len(), 1);
        assert!(world.drain_cascades().is_empty());
        assert_eq!(world.hits_at(pos), 2);
    }

    #[test]
    fn test_out_of_bounds_is_stone() {
        let world = GridWorld::walled(6, 6);
        assert_eq!(world.terrain(Pos::new(-1, 2)), TerrainId::STONE);
        assert!(!world.is_passable(Pos::new(0, 2), ProjectFlags::empty()));
        assert!(world.is_passable(Pos::new(0, 2), ProjectFlags::THRU_WALLS));
        assert!(world.is_passable(Pos::new(2, 2), ProjectFlags::empty()));
    }
}
