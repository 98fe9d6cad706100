//! The game as seen by the region engine
//!
//! [`RegionWorld`] is the whole contract between the engine and the rest of
//! the game: projection, passability, targeting, terrain and damage. The
//! engine calls it, never the other way round; when an effect has knock-on
//! consequences (a mover dies and drops its pack onto a trap) the world
//! reports them as [`Cascade`]s which the engine drains synchronously.

mod grid;

pub use grid::GridWorld;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::geometry::{line_path, Pos};
use crate::region::RegionKey;
use crate::terrain::TerrainId;

/// Who is responsible for an effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SourceTag {
    Player,
    Monster(u32),
    Trap,
    Feature,
    #[default]
    Unknown,
}

/// Opaque effect id handed back to the world when a region hits a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EffectKind(pub u16);

impl EffectKind {
    pub const NONE: EffectKind = EffectKind(0);
    pub const FIRE: EffectKind = EffectKind(1);
    pub const COLD: EffectKind = EffectKind(2);
    pub const POISON: EffectKind = EffectKind(3);
    pub const FORCE: EffectKind = EffectKind(4);
    pub const LIGHTNING: EffectKind = EffectKind(5);
    pub const SMOKE: EffectKind = EffectKind(6);
}

/// Projection geometry families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display)]
pub enum Shape {
    /// Only the target cell
    Spot,
    /// Travels to the target and affects the cell it stops in
    Bolt,
    /// Every cell along the line
    Beam,
    /// Radius around where a bolt to the target stops
    #[default]
    Ball,
    /// Cone of `arc` degrees around the bearing to the target
    Arc,
    /// Line perpendicular to the bearing, centred on the target
    Wall,
}

bitflags! {
    /// Projection passability flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ProjectFlags: u8 {
        /// Passes through walls and rock
        const THRU_WALLS = 0x01;
        /// Includes the origin cell in area shapes
        const KEEP_ORIGIN = 0x02;
    }
}

impl Serialize for ProjectFlags {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.bits().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ProjectFlags {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bits = u8::deserialize(deserializer)?;
        Ok(ProjectFlags::from_bits_truncate(bits))
    }
}

/// How a projection spreads from origin to target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeParams {
    pub shape: Shape,
    /// Area radius for balls, arcs and walls
    pub radius: u8,
    /// Maximum travel in cells
    pub range: u16,
    /// Cone width in degrees for arcs
    pub arc: u16,
    pub flags: ProjectFlags,
}

impl ShapeParams {
    /// Single cell at the target
    pub const fn spot() -> Self {
        Self {
            shape: Shape::Spot,
            radius: 0,
            range: 0,
            arc: 0,
            flags: ProjectFlags::empty(),
        }
    }

    /// Filled area of `radius` around where a bolt towards the target stops
    pub const fn ball(radius: u8, range: u16) -> Self {
        Self {
            shape: Shape::Ball,
            radius,
            range,
            arc: 0,
            flags: ProjectFlags::empty(),
        }
    }

    /// Straight line from the origin towards the target
    pub const fn beam(range: u16) -> Self {
        Self {
            shape: Shape::Beam,
            radius: 0,
            range,
            arc: 0,
            flags: ProjectFlags::empty(),
        }
    }

    /// Cone of `arc` degrees from the origin, opening towards the target
    pub const fn arc(radius: u8, arc: u16) -> Self {
        Self {
            shape: Shape::Arc,
            radius,
            range: radius as u16,
            arc,
            flags: ProjectFlags::empty(),
        }
    }

    /// Line through the target across the axis of travel, `radius` cells
    /// either side
    pub const fn wall(radius: u8, range: u16) -> Self {
        Self {
            shape: Shape::Wall,
            radius,
            range,
            arc: 0,
            flags: ProjectFlags::empty(),
        }
    }

    /// Replace the projection flags
    pub const fn with_flags(mut self, flags: ProjectFlags) -> Self {
        self.flags = flags;
        self
    }
}

impl Default for ShapeParams {
    fn default() -> Self {
        Self::spot()
    }
}

/// One cell produced by a projection, with its scalar (distance from the
/// centre of the shape, or travel distance for lines)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeCell {
    pub pos: Pos,
    pub scalar: i32,
}

impl ShapeCell {
    pub const fn new(pos: Pos, scalar: i32) -> Self {
        Self { pos, scalar }
    }
}

/// Why an effect is being applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum EffectCause {
    /// The region's own per-turn application
    Automatic,
    /// A mover or a dropped object set the region off
    Trigger,
    /// A mover walked into a lingering cloud
    Linger,
}

/// A request to hit one cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectRequest {
    pub region: RegionKey,
    pub source: SourceTag,
    pub pos: Pos,
    pub damage: i32,
    pub effect: EffectKind,
    pub cause: EffectCause,
}

/// What set a trigger off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum TriggerKind {
    /// A mover entered the cell
    Move,
    /// An object was dropped into the cell
    Drop,
}

/// Follow-up work caused by an effect, reported back by the world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cascade {
    /// Something entered or landed in a cell
    Trigger { pos: Pos, kind: TriggerKind },
    /// A region lost its reason to exist (e.g. its caster died)
    Dispel(RegionKey),
}

/// Everything the region engine consumes from the game
pub trait RegionWorld {
    /// Whether `pos` lies on the map
    fn in_bounds(&self, pos: Pos) -> bool;

    /// Cells (and their scalars) covered by a projection from `origin`
    /// towards `target`
    fn project_shape(&self, origin: Pos, target: Pos, params: &ShapeParams) -> Vec<ShapeCell>;

    /// Hit one cell; true when anything was affected
    fn apply_effect(&mut self, request: &EffectRequest) -> bool;

    /// Whether a projection with `flags` may occupy `pos`
    fn is_passable(&self, pos: Pos, flags: ProjectFlags) -> bool;

    /// Closest thing worth chasing for a seeker released by `source`
    fn nearest_target(&self, from: Pos, source: SourceTag) -> Option<Pos>;

    fn terrain(&self, pos: Pos) -> TerrainId;

    fn set_terrain(&mut self, pos: Pos, terrain: TerrainId);

    /// Cells a projection travels through from `origin` towards `target`,
    /// at most `range` long and cut short at the first impassable cell
    fn project_path(&self, origin: Pos, target: Pos, range: usize, flags: ProjectFlags) -> Vec<Pos> {
        line_path(origin, target, range)
            .into_iter()
            .take_while(|&pos| self.is_passable(pos, flags))
            .collect()
    }

    /// Unobstructed sight from `from` to `to`
    fn line_of_sight(&self, from: Pos, to: Pos) -> bool {
        if from == to {
            return true;
        }
        let range = from.chebyshev(to) as usize;
        line_path(from, to, range)
            .into_iter()
            .take_while(|&pos| pos != to)
            .all(|pos| self.is_passable(pos, ProjectFlags::empty()))
    }

    /// Unobstructed projectile path from `from` to `to`
    fn line_of_fire(&self, from: Pos, to: Pos) -> bool {
        self.line_of_sight(from, to)
    }

    /// Whether the mover at `pos` dodges a trap of the given difficulty
    fn mover_avoids(&mut self, _pos: Pos, _difficulty: i32) -> bool {
        false
    }

    /// Take the follow-up work produced by the latest effects
    fn drain_cascades(&mut self) -> Vec<Cascade> {
        Vec::new()
    }

    /// A cell's region overlay changed and should be redrawn
    fn note_changed(&mut self, _pos: Pos) {}
}
