//! Terrain identifiers
//!
//! The engine never interprets terrain beyond saving and restoring it, so
//! terrain is an opaque id owned by the game. The constants below are the
//! ids used by the reference [`crate::world::GridWorld`] and the built-in
//! region templates.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Opaque terrain/feature id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TerrainId(pub u16);

impl TerrainId {
    pub const STONE: TerrainId = TerrainId(0);
    pub const FLOOR: TerrainId = TerrainId(1);
    pub const WALL: TerrainId = TerrainId(2);
    pub const WATER: TerrainId = TerrainId(3);
    pub const LAVA: TerrainId = TerrainId(4);
    pub const ICE_WALL: TerrainId = TerrainId(5);
    pub const SCORCHED: TerrainId = TerrainId(6);
    pub const RUBBLE: TerrainId = TerrainId(7);

    /// Whether this terrain stops projections and movement
    pub const fn blocks(self) -> bool {
        matches!(self, Self::STONE | Self::WALL | Self::ICE_WALL | Self::RUBBLE)
    }

    /// Display character for the built-in terrain
    pub const fn symbol(self) -> char {
        match self {
            Self::STONE => ' ',
            Self::FLOOR => '.',
            Self::WALL => '#',
            Self::WATER => '~',
            Self::LAVA => '}',
            Self::ICE_WALL => '=',
            Self::SCORCHED => ',',
            Self::RUBBLE => ':',
            _ => '?',
        }
    }
}

impl fmt::Display for TerrainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "terrain#{}", self.0)
    }
}
