//! rgn-core: region effect engine for a turn-based dungeon crawler
//!
//! Models ongoing, spatially extended effects on the dungeon grid:
//! expanding fireballs, lingering gas clouds, advancing walls of force,
//! seeking vortexes, rotating beams and delayed traps.
//!
//! The engine owns the regions and their per-cell pieces; everything it
//! needs from the surrounding game (terrain, projection, damage) is reached
//! through the [`world::RegionWorld`] trait. Like the rest of the game
//! logic it performs no I/O.

pub mod config;
pub mod error;
pub mod geometry;
pub mod region;
pub mod rng;
pub mod terrain;
pub mod world;

pub use config::EngineConfig;
pub use error::{ConfigError, IndexFault, RegionError};
pub use geometry::{Direction, Pos};
pub use region::{
    CellDelta, ChildMode, CompactReport, DistanceFilter, MovementMode, Payload, Phase, PieceKey,
    PoolKind, Region, RegionCatalog, RegionEngine, RegionFlags, RegionInfo, RegionKey,
    RegionKind, RegionPiece, RegionRequest, RegionStore, Retired, Retirement, ScalarMode, Sight,
    TriggerReport, TriggerTarget, TurnReport, VectorPayload,
};
pub use rng::GameRng;
pub use terrain::TerrainId;
pub use world::{
    Cascade, EffectCause, EffectKind, EffectRequest, GridWorld, ProjectFlags, RegionWorld,
    Shape, ShapeCell, ShapeParams, SourceTag, TriggerKind,
};
