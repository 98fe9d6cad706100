//! Region effects system
//!
//! Regions are persistent, spatially extended effects on the level: gas
//! clouds, expanding fireballs, walls of force, vortexes, rotating beams,
//! delayed traps. Each region occupies cells through [`RegionPiece`]s.
//!
//! Layout:
//! - [`info`]: static templates (behaviour flags, timings, children)
//! - [`types`]: live `Region` / `RegionPiece` records and their keys
//! - [`pool`]: fixed-capacity generation-tagged pools, backpressure, compaction
//! - [`index`]: the dual by-cell / by-region index over pieces
//! - [`movement`]: per-turn movement planners and the rotation pre-pass
//! - [`trigger`]: triggers, lingering damage, terrain overlays, children
//! - [`process`]: the per-turn lifecycle state machine
//! - [`engine`]: [`RegionEngine`], the façade the game talks to

pub mod engine;
pub mod index;
pub mod info;
pub mod movement;
pub mod pool;
pub mod process;
pub mod trigger;
pub mod types;

pub use engine::{RegionEngine, RegionRequest, Retired, Retirement};
pub use index::{DistanceFilter, RegionStore, Sight};
pub use info::{
    ChildMode, MovementMode, RegionCatalog, RegionFlags, RegionInfo, RegionKind, ScalarMode,
    TriggerTarget,
};
pub use movement::CellDelta;
pub use pool::{CompactReport, Pool, PoolKind};
pub use process::TurnReport;
pub use trigger::TriggerReport;
pub use types::{Payload, Phase, PieceKey, Region, RegionKey, RegionPiece, VectorPayload};
