//! Region templates
//!
//! A [`RegionInfo`] describes how every region of one kind behaves: when it
//! fires, how it moves, how long it lasts and what it leaves behind.
//! Live regions copy the mutable parts (flags) and look the rest up here.

use core::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use crate::error::ConfigError;
use crate::terrain::TerrainId;
use crate::world::EffectKind;

/// Template id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionKind(pub u16);

impl RegionKind {
    pub const FIREBALL: RegionKind = RegionKind(1);
    pub const STINKING_CLOUD: RegionKind = RegionKind(2);
    pub const FIRE_VORTEX: RegionKind = RegionKind(3);
    pub const WALL_OF_FORCE: RegionKind = RegionKind(4);
    pub const ROTATING_BEAM: RegionKind = RegionKind(5);
    pub const ICE_WALL: RegionKind = RegionKind(6);
    pub const RUNE_TRAP: RegionKind = RegionKind(7);
    pub const SCORCH: RegionKind = RegionKind(8);
    pub const EXPANDING_RING: RegionKind = RegionKind(9);
    pub const SMOKE_VENT: RegionKind = RegionKind(10);
    pub const QUICKENING_STORM: RegionKind = RegionKind(11);
    pub const TIME_ECHO: RegionKind = RegionKind(12);
    pub const FADING_MIASMA: RegionKind = RegionKind(13);
}

impl fmt::Display for RegionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

bitflags! {
    /// Region behaviour flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RegionFlags: u32 {
        /// Applies its effect every active turn
        const AUTOMATIC = 1 << 0;
        /// Fires when a mover enters one of its cells
        const TRIGGER_MOVE = 1 << 1;
        /// Fires when an object is dropped into one of its cells
        const TRIGGER_DROP = 1 << 2;
        /// Hurts anything that walks into its cells
        const LINGER = 1 << 3;
        /// Alert movers can dodge the trigger
        const AVOIDABLE = 1 << 4;
        /// Retires right after firing through a trigger
        const ONCE = 1 << 5;
        /// Plays backwards after reaching its lifespan
        const REVERSIBLE = 1 << 6;
        /// Drops AUTOMATIC when it starts playing backwards
        const REVERSE_TRIGGER_ONLY = 1 << 7;
        const ROTATE_CLOCKWISE = 1 << 8;
        const ROTATE_COUNTER = 1 << 9;
        /// Delay between active turns shrinks every turn
        const ACCELERATE = 1 << 10;
        /// Delay between active turns grows every turn
        const DECELERATE = 1 << 11;
        /// Spawns the template's child region
        const CHILD = 1 << 12;
    }
}

// Manual serde impl for RegionFlags
impl Serialize for RegionFlags {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.bits().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RegionFlags {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bits = u32::deserialize(deserializer)?;
        Ok(RegionFlags::from_bits_truncate(bits))
    }
}

impl RegionFlags {
    /// Rotation sense: -1 clockwise, +1 counter-clockwise, 0 none
    pub fn rotation_sign(&self) -> i32 {
        if self.contains(RegionFlags::ROTATE_CLOCKWISE) {
            -1
        } else if self.contains(RegionFlags::ROTATE_COUNTER) {
            1
        } else {
            0
        }
    }
}

/// How a region's pieces move each active turn
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumIter,
)]
pub enum MovementMode {
    #[default]
    Static,
    /// Chases the nearest target like a vortex
    Seeker,
    /// Each piece travels along its own bearing from the origin
    Vector,
    /// Pieces drift and multiply into neighbouring cells
    Spread,
    /// A wavefront advancing from the origin towards the target
    Wall,
}

/// Meaning of a piece's payload
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumIter,
)]
pub enum ScalarMode {
    /// Every piece deals the region's damage
    #[default]
    Damage,
    /// Damage falls off with the piece's distance from the shape centre
    Distance,
    /// The piece overlays terrain and keeps what was underneath
    Terrain,
    /// The piece carries its own bearing and speed
    Vector,
}

/// Where a triggered region delivers its effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display)]
pub enum TriggerTarget {
    /// The cell that was entered
    #[default]
    Cell,
    /// A random piece of the region
    RandomPiece,
    /// The region's target cell (or its first piece if the target is gone)
    FixedPiece,
}

/// When a region's child is spawned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display)]
pub enum ChildMode {
    /// A single child copying all pieces when the parent retires
    #[default]
    Once,
    /// Every active turn, one child per piece standing on the source terrain
    Continuous,
}

/// Static description of a region kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionInfo {
    pub kind: RegionKind,
    pub name: String,
    pub flags: RegionFlags,
    pub movement: MovementMode,
    pub scalar: ScalarMode,
    pub effect: EffectKind,

    // Timing
    /// Turns before the first active turn
    pub delay: u32,
    /// Turns between active turns
    pub delay_reset: u32,
    /// Active turns before retiring, `None` for permanent
    pub lifespan: Option<u32>,

    // Movement
    /// Degrees turned per active turn by rotating regions
    pub rotation_step: u16,
    /// Cells per turn for vector pieces
    pub speed: u8,
    /// Percent chance per piece per turn to spread
    pub spread_chance: u32,
    /// Spreading duplicates pieces up to this count, then drifts
    pub spread_limit: usize,

    // Payload
    /// Terrain laid down by terrain regions
    pub overlay: Option<TerrainId>,
    pub trigger_target: TriggerTarget,

    // Children
    pub child: Option<RegionKind>,
    pub child_mode: ChildMode,
    /// Terrain that makes a continuous parent emit a child
    pub child_source: Option<TerrainId>,
}

impl Default for RegionInfo {
    fn default() -> Self {
        Self {
            kind: RegionKind::default(),
            name: String::new(),
            flags: RegionFlags::empty(),
            movement: MovementMode::Static,
            scalar: ScalarMode::Damage,
            effect: EffectKind::NONE,
            delay: 1,
            delay_reset: 1,
            lifespan: None,
            rotation_step: 15,
            speed: 1,
            spread_chance: 0,
            spread_limit: 0,
            overlay: None,
            trigger_target: TriggerTarget::Cell,
            child: None,
            child_mode: ChildMode::Once,
            child_source: None,
        }
    }
}

impl RegionInfo {
    /// Template with default timings and no behaviour
    pub fn new(kind: RegionKind, name: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn is_permanent(&self) -> bool {
        self.lifespan.is_none()
    }
}

/// Lookup table of region templates
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionCatalog {
    infos: Vec<RegionInfo>,
}

impl RegionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load templates from a JSON array, on top of nothing
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let infos: Vec<RegionInfo> = serde_json::from_str(text)?;
        let mut catalog = Self::new();
        for info in infos {
            if catalog.get(info.kind).is_some() {
                return Err(ConfigError::DuplicateKind { kind: info.kind });
            }
            catalog.insert(info);
        }
        Ok(catalog)
    }

    /// Add or replace a template
    pub fn insert(&mut self, info: RegionInfo) {
        match self.infos.iter_mut().find(|i| i.kind == info.kind) {
            Some(slot) => *slot = info,
            None => self.infos.push(info),
        }
    }

    /// Template for `kind`
    pub fn get(&self, kind: RegionKind) -> Option<&RegionInfo> {
        self.infos.iter().find(|i| i.kind == kind)
    }

    /// Template by display name
    pub fn by_name(&self, name: &str) -> Option<&RegionInfo> {
        self.infos.iter().find(|i| i.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegionInfo> {
        self.infos.iter()
    }

    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    /// Stock templates
    pub fn builtin() -> Self {
        let mut catalog = Self::new();

        catalog.insert(RegionInfo {
            flags: RegionFlags::AUTOMATIC | RegionFlags::CHILD,
            scalar: ScalarMode::Distance,
            effect: EffectKind::FIRE,
            lifespan: Some(3),
            child: Some(RegionKind::SCORCH),
            child_mode: ChildMode::Once,
            ..RegionInfo::new(RegionKind::FIREBALL, "fireball")
        });
        catalog.insert(RegionInfo {
            flags: RegionFlags::AUTOMATIC | RegionFlags::LINGER,
            movement: MovementMode::Spread,
            effect: EffectKind::POISON,
            lifespan: Some(12),
            spread_chance: 30,
            spread_limit: 40,
            ..RegionInfo::new(RegionKind::STINKING_CLOUD, "stinking cloud")
        });
        catalog.insert(RegionInfo {
            flags: RegionFlags::AUTOMATIC,
            movement: MovementMode::Seeker,
            effect: EffectKind::FIRE,
            lifespan: Some(25),
            ..RegionInfo::new(RegionKind::FIRE_VORTEX, "fire vortex")
        });
        catalog.insert(RegionInfo {
            flags: RegionFlags::AUTOMATIC,
            movement: MovementMode::Wall,
            effect: EffectKind::FORCE,
            ..RegionInfo::new(RegionKind::WALL_OF_FORCE, "wall of force")
        });
        catalog.insert(RegionInfo {
            flags: RegionFlags::AUTOMATIC | RegionFlags::ROTATE_CLOCKWISE,
            effect: EffectKind::LIGHTNING,
            lifespan: Some(8),
            rotation_step: 45,
            ..RegionInfo::new(RegionKind::ROTATING_BEAM, "rotating beam")
        });
        catalog.insert(RegionInfo {
            flags: RegionFlags::REVERSIBLE,
            scalar: ScalarMode::Terrain,
            effect: EffectKind::COLD,
            lifespan: Some(10),
            overlay: Some(TerrainId::ICE_WALL),
            ..RegionInfo::new(RegionKind::ICE_WALL, "wall of ice")
        });
        catalog.insert(RegionInfo {
            flags: RegionFlags::TRIGGER_MOVE
                | RegionFlags::TRIGGER_DROP
                | RegionFlags::AVOIDABLE
                | RegionFlags::ONCE,
            effect: EffectKind::FIRE,
            trigger_target: TriggerTarget::Cell,
            ..RegionInfo::new(RegionKind::RUNE_TRAP, "fire rune")
        });
        catalog.insert(RegionInfo {
            scalar: ScalarMode::Terrain,
            lifespan: Some(20),
            overlay: Some(TerrainId::SCORCHED),
            ..RegionInfo::new(RegionKind::SCORCH, "scorch marks")
        });
        catalog.insert(RegionInfo {
            flags: RegionFlags::AUTOMATIC,
            movement: MovementMode::Vector,
            scalar: ScalarMode::Vector,
            effect: EffectKind::FIRE,
            lifespan: Some(6),
            speed: 1,
            ..RegionInfo::new(RegionKind::EXPANDING_RING, "expanding ring of fire")
        });
        catalog.insert(RegionInfo {
            flags: RegionFlags::CHILD,
            effect: EffectKind::SMOKE,
            lifespan: Some(30),
            child: Some(RegionKind::STINKING_CLOUD),
            child_mode: ChildMode::Continuous,
            child_source: Some(TerrainId::LAVA),
            ..RegionInfo::new(RegionKind::SMOKE_VENT, "smoking vent")
        });
        catalog.insert(RegionInfo {
            flags: RegionFlags::AUTOMATIC | RegionFlags::ACCELERATE,
            effect: EffectKind::LIGHTNING,
            delay: 6,
            delay_reset: 6,
            lifespan: Some(8),
            ..RegionInfo::new(RegionKind::QUICKENING_STORM, "quickening storm")
        });
        catalog.insert(RegionInfo {
            flags: RegionFlags::AUTOMATIC
                | RegionFlags::TRIGGER_MOVE
                | RegionFlags::REVERSIBLE
                | RegionFlags::REVERSE_TRIGGER_ONLY,
            effect: EffectKind::FORCE,
            lifespan: Some(4),
            ..RegionInfo::new(RegionKind::TIME_ECHO, "time echo")
        });
        catalog.insert(RegionInfo {
            flags: RegionFlags::AUTOMATIC | RegionFlags::LINGER | RegionFlags::DECELERATE,
            effect: EffectKind::POISON,
            lifespan: Some(6),
            ..RegionInfo::new(RegionKind::FADING_MIASMA, "fading miasma")
        });

        catalog
    }
}
