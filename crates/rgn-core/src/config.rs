//! Engine configuration
//!
//! Capacities and tuning knobs for the region engine. Loaded from JSON by
//! the game's level setup; every field falls back to its default when it
//! is missing from the file.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Tunable parameters for a [`crate::RegionEngine`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    // Pools
    /// Maximum number of simultaneously live regions on a level
    pub region_capacity: usize,
    /// Maximum number of simultaneously live region pieces on a level
    pub piece_capacity: usize,
    /// Backpressure clears once both pools drop below this utilization
    pub pressure_release_percent: u32,
    /// Run compaction every this many turns; an engine given 0 only
    /// compacts under pressure
    pub compact_every: u64,

    // Seeker movement
    pub seeker_open_neighbors: usize,
    pub seeker_open_chase_percent: u32,
    pub seeker_partial_neighbors: usize,
    pub seeker_partial_chase_percent: u32,

    // Triggers
    /// Share of a region's damage dealt by lingering on entry
    pub linger_percent: u32,
    /// How many nested trigger cascades one mover may cause
    pub max_cascade_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            region_capacity: 64,
            piece_capacity: 1024,
            pressure_release_percent: 80,
            compact_every: 10,

            seeker_open_neighbors: 5,
            seeker_open_chase_percent: 85,
            seeker_partial_neighbors: 4,
            seeker_partial_chase_percent: 50,

            linger_percent: 50,
            max_cascade_depth: 8,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that capacities are usable and percentages are percentages
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.region_capacity == 0 {
            return Err(ConfigError::Zero {
                field: "region_capacity",
            });
        }
        if self.piece_capacity == 0 {
            return Err(ConfigError::Zero {
                field: "piece_capacity",
            });
        }
        if self.compact_every == 0 {
            return Err(ConfigError::Zero {
                field: "compact_every",
            });
        }
        for (field, value) in [
            ("pressure_release_percent", self.pressure_release_percent),
            ("seeker_open_chase_percent", self.seeker_open_chase_percent),
            ("seeker_partial_chase_percent", self.seeker_partial_chase_percent),
            ("linger_percent", self.linger_percent),
        ] {
            if value > 100 {
                return Err(ConfigError::PercentOutOfRange { field, value });
            }
        }
        Ok(())
    }

    /// Chance that a seeker with `open` passable neighbours chases its target
    pub fn seeker_chase_percent(&self, open: usize) -> u32 {
        if open >= self.seeker_open_neighbors {
            self.seeker_open_chase_percent
        } else if open >= self.seeker_partial_neighbors {
            self.seeker_partial_chase_percent
        } else {
            0
        }
    }
}
