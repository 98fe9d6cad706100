//! Live region records
//!
//! A [`Region`] is one ongoing effect; a [`RegionPiece`] is that effect's
//! presence on one cell. Both live in generation-tagged pools, so a key to
//! a retired region or piece is detectably stale instead of silently
//! pointing at whatever reused the slot.

use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

use super::info::{MovementMode, RegionFlags, RegionInfo, RegionKind, ScalarMode};
use crate::geometry::Pos;
use crate::terrain::TerrainId;
use crate::world::{EffectKind, ShapeParams, SourceTag};

new_key_type! {
    /// Handle to a live region
    pub struct RegionKey;
    /// Handle to a live region piece
    pub struct PieceKey;
}

/// Where a region is in its life
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Phase {
    /// Age counts up towards the lifespan
    #[default]
    Forward,
    /// Age counts down to zero, undoing the effect
    Backward,
    /// Lost all its pieces; retired on its next turn
    Lifeless,
}

/// Bearing, start offset and speed of a vector piece
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct VectorPayload {
    pub angle: u16,
    /// Distance from the origin when the region was created
    pub start: u8,
    pub speed: u8,
}

impl VectorPayload {
    pub const fn new(angle: u16, start: u8, speed: u8) -> Self {
        Self {
            angle,
            start,
            speed,
        }
    }

    /// Pack into one scalar: angle in the high half, start and speed below
    pub const fn pack(self) -> i32 {
        ((self.angle as i32) << 16) | ((self.start as i32) << 8) | self.speed as i32
    }

    pub const fn unpack(packed: i32) -> Self {
        Self {
            angle: ((packed >> 16) & 0xffff) as u16,
            start: ((packed >> 8) & 0xff) as u8,
            speed: (packed & 0xff) as u8,
        }
    }

    /// Distance from the origin after `age` turns of travel
    pub fn distance_at(self, age: u32) -> u32 {
        u32::from(self.start) + u32::from(self.speed) * age
    }
}

/// Per-piece payload, interpreted according to the region's [`ScalarMode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Payload {
    /// Raw damage
    Damage(i32),
    /// Distance from the shape centre; damage is divided by `distance + 1`
    Distance(i32),
    /// Terrain that was under the overlay, `None` when another region of
    /// the same kind took the snapshot first
    Terrain(Option<TerrainId>),
    Vector(VectorPayload),
}

impl Payload {
    /// Build a payload from a projection cell's scalar
    pub fn from_scalar(mode: ScalarMode, scalar: i32, damage: i32, vector: VectorPayload) -> Self {
        match mode {
            ScalarMode::Damage => Payload::Damage(damage),
            ScalarMode::Distance => Payload::Distance(scalar.max(0)),
            ScalarMode::Terrain => Payload::Terrain(None),
            ScalarMode::Vector => Payload::Vector(vector),
        }
    }

    /// Damage this piece deals given its region's base damage
    pub fn damage(&self, base: i32) -> i32 {
        match *self {
            Payload::Damage(d) => d,
            Payload::Distance(r) => base / r.max(0).saturating_add(1),
            Payload::Terrain(_) | Payload::Vector(_) => base,
        }
    }

    /// Scalar to hand down to a child region's payload
    pub fn scalar(&self) -> i32 {
        match *self {
            Payload::Damage(d) => d,
            Payload::Distance(r) => r,
            Payload::Terrain(t) => t.map_or(0, |t| i32::from(t.0)),
            Payload::Vector(v) => v.pack(),
        }
    }

    /// Terrain an overlaying piece is keeping for the map
    pub fn saved_terrain(&self) -> Option<TerrainId> {
        match *self {
            Payload::Terrain(t) => t,
            _ => None,
        }
    }
}

/// One region's presence on one cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionPiece {
    pub pos: Pos,
    pub payload: Payload,
    pub region: RegionKey,
}

/// One ongoing effect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub kind: RegionKind,
    pub flags: RegionFlags,
    pub movement: MovementMode,
    pub scalar: ScalarMode,

    // Payload
    pub source: SourceTag,
    pub effect: EffectKind,
    pub damage: i32,
    pub level: i32,
    pub shape: ShapeParams,

    // Geometry
    pub origin: Pos,
    pub target: Pos,
    /// Bearing from origin to target, in degrees
    pub facing: u16,
    /// Current wavefront cell of an advancing wall
    pub front: Pos,

    // Lifecycle
    pub age: u32,
    pub lifespan: Option<u32>,
    pub delay: u32,
    pub delay_reset: u32,
    pub phase: Phase,

    /// Membership list, in insertion order
    pub(crate) pieces: Vec<PieceKey>,
    /// Fired through a trigger this turn
    pub(crate) triggered: bool,
    /// Currently delivering a triggered effect
    pub(crate) firing: bool,
}

impl Region {
    /// Fresh region from a template
    pub fn from_info(
        info: &RegionInfo,
        source: SourceTag,
        damage: i32,
        level: i32,
        shape: ShapeParams,
        origin: Pos,
        target: Pos,
    ) -> Self {
        Self {
            kind: info.kind,
            flags: info.flags,
            movement: info.movement,
            scalar: info.scalar,
            source,
            effect: info.effect,
            damage,
            level,
            shape,
            origin,
            target,
            facing: origin.angle_to(target),
            front: origin,
            age: 0,
            lifespan: info.lifespan,
            delay: info.delay,
            delay_reset: info.delay_reset.max(1),
            phase: Phase::Forward,
            pieces: Vec::new(),
            triggered: false,
            firing: false,
        }
    }

    pub fn pieces(&self) -> &[PieceKey] {
        &self.pieces
    }

    pub fn piece_count(&self) -> usize {
        self.pieces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    /// A trigger fired since the last aging step
    pub fn triggered_this_turn(&self) -> bool {
        self.triggered
    }

    /// Currently delivering a triggered effect
    pub fn is_firing(&self) -> bool {
        self.firing
    }

    /// Forward region whose age has run out
    pub fn is_expired(&self) -> bool {
        self.phase == Phase::Forward && self.lifespan.is_some_and(|l| self.age >= l)
    }

    /// Shrink or grow the delay between active turns
    pub fn ramp_delay(&mut self) {
        if self.flags.contains(RegionFlags::ACCELERATE) {
            self.delay_reset = (self.delay_reset * 2 / 3).max(1);
        } else if self.flags.contains(RegionFlags::DECELERATE) {
            self.delay_reset += self.delay_reset / 3 + 1;
        }
    }

    /// Move age one step in the direction of the current phase
    pub fn advance_age(&mut self) {
        match self.phase {
            Phase::Forward => self.age = self.age.saturating_add(1),
            Phase::Backward => self.age = self.age.saturating_sub(1),
            Phase::Lifeless => {}
        }
    }
}
