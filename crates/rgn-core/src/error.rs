//! Error types for the region engine
//!
//! None of these reach a player: every failure degrades into "the effect
//! fizzles". They exist so internal code can propagate with `?` and so the
//! degradations can be logged and tested.

use thiserror::Error;

use crate::geometry::Pos;
use crate::region::{PieceKey, PoolKind, RegionKey, RegionKind};

/// Degenerate conditions met while creating, moving or firing regions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegionError {
    #[error("{pool} pool exhausted (capacity {capacity})")]
    PoolExhausted { pool: PoolKind, capacity: usize },

    #[error("region handle is stale")]
    StaleRegion,

    #[error("piece handle is stale")]
    StalePiece,

    #[error("destination ({}, {}) is not passable", pos.y, pos.x)]
    IllegalDestination { pos: Pos },

    #[error("projection produced no cells")]
    DegenerateGeometry,

    #[error("unknown region kind {kind}")]
    UnknownKind { kind: RegionKind },

    #[error("trigger cascade exceeded depth {depth}")]
    CascadeTooDeep { depth: usize },
}

/// Inconsistencies found by [`crate::region::RegionStore::audit`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexFault {
    #[error("piece {piece:?} is listed {count} times in cell chains")]
    CellChainCount { piece: PieceKey, count: usize },

    #[error("piece {piece:?} is listed {count} times in region chains")]
    RegionChainCount { piece: PieceKey, count: usize },

    #[error("piece {piece:?} sits in the chain of ({}, {}) but lives elsewhere", cell.y, cell.x)]
    WrongCell { piece: PieceKey, cell: Pos },

    #[error("piece {piece:?} belongs to region {region:?} which is not live")]
    Orphan { piece: PieceKey, region: RegionKey },

    #[error("chain references freed piece {piece:?}")]
    Dangling { piece: PieceKey },
}

/// Configuration loading and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{field} must be non-zero")]
    Zero { field: &'static str },

    #[error("{field} must be within 0..=100 (got {value})")]
    PercentOutOfRange { field: &'static str, value: u32 },

    #[error("duplicate region kind {kind}")]
    DuplicateKind { kind: RegionKind },
}
