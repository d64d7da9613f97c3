//! HyperLogLog distinct-count sketch.
//!
//! `2^p` one-byte registers; each register keeps the largest rho (position of
//! the first 1-bit, 1-indexed) seen among hashes routed to it by their top `p`
//! bits.

use crate::sampling::estimator::CardinalityEstimator;

const MIN_PRECISION: u8 = 4;
const MAX_PRECISION: u8 = 16;

/// HyperLogLog sketch with configurable precision.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HyperLogLog {
    precision: u8,
    registers: Vec<u8>,
}

impl HyperLogLog {
    /// Creates an empty sketch. `precision` is clamped to `4..=16`.
    #[must_use]
    pub fn new(precision: u8) -> Self {
        let precision = precision.clamp(MIN_PRECISION, MAX_PRECISION);
        Self {
            precision,
            registers: vec![0; 1 << precision],
        }
    }

    /// Returns the precision in use.
    #[must_use]
    pub fn precision(&self) -> u8 {
        self.precision
    }

    fn alpha(m: f64) -> f64 {
        match m as usize {
            16 => 0.673,
            32 => 0.697,
            64 => 0.709,
            _ => 0.7213 / (1.0 + 1.079 / m),
        }
    }

    /// Merges another sketch of the same precision (register-wise maximum).
    ///
    /// Sketches of different precision are left untouched; returns whether the
    /// merge happened.
    pub fn merge(&mut self, other: &HyperLogLog) -> bool {
        if self.precision != other.precision {
            return false;
        }
        for (mine, theirs) in self.registers.iter_mut().zip(&other.registers) {
            if *theirs > *mine {
                *mine = *theirs;
            }
        }
        true
    }

    /// Returns true if nothing has been inserted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registers.iter().all(|&r| r == 0)
    }
}

impl CardinalityEstimator for HyperLogLog {
    #[inline]
    fn insert_hash(&mut self, hash: u64) {
        let p = u32::from(self.precision);
        let index = (hash >> (64 - p)) as usize;
        let w = hash << p;
        let rho = if w == 0 {
            (64 - p + 1) as u8
        } else {
            (w.leading_zeros() + 1) as u8
        };
        if rho > self.registers[index] {
            self.registers[index] = rho;
        }
    }

    fn estimate(&self) -> u64 {
        let m = self.registers.len() as f64;
        let mut sum = 0.0f64;
        let mut zeros = 0u32;
        for &reg in &self.registers {
            sum += 2.0f64.powi(-i32::from(reg));
            if reg == 0 {
                zeros += 1;
            }
        }

        let raw = Self::alpha(m) * m * m / sum;

        // Small range: linear counting
        if raw <= 2.5 * m && zeros > 0 {
            return (m * (m / f64::from(zeros)).ln()).round() as u64;
        }
        raw.round() as u64
    }
}
