//! Deterministic low-discrepancy number cycle.
//!
//! `x -> (x + increment) mod modulus`. With coprime parameters the values
//! are evenly spread over `[0, 1)`, and the same seed always reproduces the
//! same sequence, so reduced timelines render identically across runs.

use serde::{Deserialize, Serialize};

/// One step of the cycle
pub fn step(value: u32, increment: u32, modulus: u32) -> u32 {
    if modulus == 0 {
        return 0;
    }
    ((value as u64 + increment as u64) % modulus as u64) as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberCycle {
    value: u32,
    increment: u32,
    modulus: u32,
}

impl NumberCycle {
    pub fn new(seed: u32, increment: u32, modulus: u32) -> Self {
        Self {
            value: seed,
            increment,
            modulus,
        }
    }

    /// Advance and return the new value as a fraction of the modulus
    pub fn next_fraction(&mut self) -> f64 {
        self.value = step(self.value, self.increment, self.modulus);
        if self.modulus == 0 {
            0.0
        } else {
            self.value as f64 / self.modulus as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::config::{CYCLE_INCREMENT, CYCLE_MODULUS};

    #[test]
    fn test_default_cycle_values() {
        let mut cycle = NumberCycle::new(0, CYCLE_INCREMENT, CYCLE_MODULUS);
        let values: Vec<f64> = (0..4).map(|_| cycle.next_fraction()).collect();
        assert_eq!(values, vec![0.31, 0.62, 0.93, 0.24]);
    }

    #[test]
    fn test_cycle_visits_every_value() {
        let mut value = 0;
        let mut seen = std::collections::HashSet::new();
        for _ in 0..CYCLE_MODULUS {
            value = step(value, CYCLE_INCREMENT, CYCLE_MODULUS);
            seen.insert(value);
        }
        assert_eq!(seen.len(), CYCLE_MODULUS as usize);
    }
}
