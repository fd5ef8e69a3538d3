//! Genetic operators over candidate strings.
//!
//! Provides random generation, crossover, and mutation. Every candidate
//! character stays in the displayable ASCII range.

use rand::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{EvolutionError, Result};

/// Lowest displayable character code.
pub const MIN_CHAR: u32 = 32;

/// Highest displayable character code.
pub const MAX_CHAR: u32 = 126;

/// Where crossover cuts the parents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossoverPoint {
    /// Cut at `len / 2`
    #[default]
    Midpoint,
    /// Cut uniformly in `[1, len - 2]`
    Random,
}

/// Direction of a point mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Character code minus one
    Down,
    /// Character code plus one
    Up,
}

impl Direction {
    fn delta(self) -> i64 {
        match self {
            Direction::Down => -1,
            Direction::Up => 1,
        }
    }
}

/// Random source for genetic operators.
///
/// One instance is threaded through a run; it is never re-seeded between
/// operator calls.
pub struct CodeRng {
    rng: StdRng,
}

impl CodeRng {
    /// Create from seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// The stream used to populate `generation` of the run seeded with `seed`.
    ///
    /// Replaying the population of a generation yields the same candidates.
    pub fn for_generation(seed: u64, generation: u64) -> Self {
        Self::new(seed ^ generation.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15))
    }

    /// A string of `length` characters uniform in the displayable range.
    pub fn random_candidate(&mut self, length: usize) -> String {
        (0..length)
            .map(|_| clamp_char(self.rng.gen_range(MIN_CHAR..=MAX_CHAR) as i64))
            .collect()
    }

    /// Cross two parents at a cut chosen by `point`.
    pub fn crossover(&mut self, a: &str, b: &str, point: CrossoverPoint) -> Result<(String, String)> {
        let len = a.chars().count();
        let cut = match point {
            CrossoverPoint::Midpoint => len / 2,
            // [1, len - 2] is empty below three characters.
            CrossoverPoint::Random if len >= 3 => self.rng.gen_range(1..=len - 2),
            CrossoverPoint::Random => len / 2,
        };
        crossover_at(a, b, cut)
    }

    /// Mutate `code` with the given chance.
    ///
    /// `probability` is the chance that a mutation happens; otherwise the
    /// input is returned unchanged.
    pub fn mutate(&mut self, code: &str, probability: f64) -> String {
        let len = code.chars().count();
        if len == 0 || self.rng.gen::<f64>() >= probability {
            return code.to_string();
        }
        let index = self.rng.gen_range(0..len);
        let direction = if self.rng.gen_bool(0.5) { Direction::Up } else { Direction::Down };
        mutate_at(code, index, direction)
    }
}

/// Splice the head of each parent onto the tail of the other at `cut`.
pub fn crossover_at(a: &str, b: &str, cut: usize) -> Result<(String, String)> {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.len() != b.len() {
        return Err(EvolutionError::InvalidCandidate {
            expected: a.len(),
            actual: b.len(),
        });
    }
    let cut = cut.min(a.len());

    let child_a = a[..cut].iter().chain(&b[cut..]).collect();
    let child_b = b[..cut].iter().chain(&a[cut..]).collect();
    Ok((child_a, child_b))
}

/// Shift the character at `index` by one, clamped to the displayable range.
///
/// An out-of-range index leaves the code unchanged.
pub fn mutate_at(code: &str, index: usize, direction: Direction) -> String {
    code.chars()
        .enumerate()
        .map(|(i, c)| {
            if i == index {
                clamp_char(c as i64 + direction.delta())
            } else {
                c
            }
        })
        .collect()
}

fn clamp_char(code: i64) -> char {
    let clamped = code.clamp(MIN_CHAR as i64, MAX_CHAR as i64) as u8;
    char::from(clamped)
}
