//! Seeded randomness for region movement and triggers
//!
//! Every random decision the engine makes (spread rolls, seeker chase
//! rolls, wander directions, random trigger targets) draws from one
//! [`GameRng`], so a seed plus a sequence of calls replays a fight exactly.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::geometry::Direction;

const DIRECTIONS: [Direction; 8] = [
    Direction::North,
    Direction::South,
    Direction::East,
    Direction::West,
    Direction::NorthEast,
    Direction::NorthWest,
    Direction::SouthEast,
    Direction::SouthWest,
];

/// ChaCha-backed generator remembering its seed.
///
/// Only the seed is serialized: a restored generator starts over from it.
#[derive(Debug, Clone)]
pub struct GameRng {
    rng: ChaCha8Rng,
    seed: u64,
}

impl Serialize for GameRng {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.seed.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for GameRng {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(GameRng::new)
    }
}

impl GameRng {
    /// Generator seeded from `seed`
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }

    /// Seed this generator started from
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Index in `0..len`, or 0 for an empty range
    fn index(&mut self, len: usize) -> usize {
        if len == 0 { 0 } else { self.rng.gen_range(0..len) }
    }

    /// True `percent` times in a hundred; 0 never, 100 or more always
    pub fn percent(&mut self, percent: u32) -> bool {
        match percent {
            0 => false,
            p if p >= 100 => true,
            p => self.rng.gen_range(0..100) < p,
        }
    }

    /// Random element of `items`, `None` when empty
    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        let i = self.index(items.len());
        items.get(i)
    }

    /// Uniformly random compass direction for wandering pieces
    pub fn direction(&mut self) -> Direction {
        DIRECTIONS[self.index(DIRECTIONS.len())]
    }
}
