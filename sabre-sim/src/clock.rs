//! Simulated time and seeded randomness for reproducible sessions.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::SimulationError;

/// Maximum time that can be advanced in a single operation (24 hours).
const MAX_TIME_ADVANCE_MS: f64 = 86_400_000.0;

/// Wall time of a simulated session in milliseconds.
///
/// Time only moves forward and is independent of the host clock. It counts
/// every millisecond the session spends downloading or waiting, which is not
/// the same as play time once stalls and seeks are involved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulatedClock {
    now_ms: f64,
}

impl SimulatedClock {
    /// Creates a clock at simulation time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current simulation time in milliseconds.
    pub fn now(&self) -> f64 {
        self.now_ms
    }

    /// Advances simulation time by `duration_ms`.
    ///
    /// # Errors
    ///
    /// - `SimulationError::InvalidTimeAdvance` - Duration is negative, not finite, or over 24 hours
    pub fn advance(&mut self, duration_ms: f64) -> Result<(), SimulationError> {
        if !duration_ms.is_finite() || !(0.0..=MAX_TIME_ADVANCE_MS).contains(&duration_ms) {
            return Err(SimulationError::InvalidTimeAdvance { duration_ms });
        }
        self.now_ms += duration_ms;
        Ok(())
    }
}

/// Deterministic random number generator for reproducible simulations.
///
/// Uses ChaCha8 algorithm for fast, high-quality pseudorandom numbers
/// with deterministic seed-based generation.
#[derive(Debug, Clone)]
pub struct DeterministicRng {
    rng: ChaCha8Rng,
    seed: u64,
}

impl DeterministicRng {
    /// Creates deterministic RNG from seed value.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }

    /// Returns the seed used for this RNG.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Generates random number in range [0, 1).
    pub fn random_f64(&mut self) -> f64 {
        self.rng.random::<f64>()
    }

    /// Multiplier uniformly spread over `[1 - spread, 1 + spread)`.
    ///
    /// `spread` is clamped to 0-1 so the factor never goes negative.
    pub fn jitter_factor(&mut self, spread: f64) -> f64 {
        let spread = spread.clamp(0.0, 1.0);
        if spread == 0.0 {
            return 1.0;
        }
        1.0 + spread * (2.0 * self.random_f64() - 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_advancement() {
        let mut clock = SimulatedClock::new();

        clock.advance(10_000.0).unwrap();
        clock.advance(5_000.0).unwrap();
        assert_eq!(clock.now(), 15_000.0);
    }

    #[test]
    fn test_clock_rejects_invalid_advances() {
        let mut clock = SimulatedClock::new();

        assert!(clock.advance(-1.0).is_err());
        assert!(clock.advance(f64::NAN).is_err());
        assert!(clock.advance(MAX_TIME_ADVANCE_MS + 1.0).is_err());
        assert_eq!(clock.now(), 0.0);
    }

    #[test]
    fn test_deterministic_rng_reproducibility() {
        let seed = 12345;
        let mut rng1 = DeterministicRng::from_seed(seed);
        let mut rng2 = DeterministicRng::from_seed(seed);

        let values1: Vec<f64> = (0..10).map(|_| rng1.jitter_factor(0.5)).collect();
        let values2: Vec<f64> = (0..10).map(|_| rng2.jitter_factor(0.5)).collect();

        assert_eq!(values1, values2);
        assert_eq!(rng1.seed(), seed);
    }

    #[test]
    fn test_jitter_factor_bounds() {
        let mut rng = DeterministicRng::from_seed(7);

        assert_eq!(rng.jitter_factor(0.0), 1.0);
        for _ in 0..1000 {
            let factor = rng.jitter_factor(0.25);
            assert!((0.75..1.25).contains(&factor));
        }
        for _ in 0..100 {
            assert!(rng.jitter_factor(5.0) >= 0.0);
        }
    }
}
