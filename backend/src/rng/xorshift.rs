//! xorshift64* random number generator
//!
//! # Determinism
//!
//! Same seed → same sequence of random numbers. [`RngManager::for_day`]
//! extends this to whole runs: the draws of global day `d` depend only on the
//! model seed and `d`.

use serde::{Deserialize, Serialize};

/// Deterministic random number generator using xorshift64*
///
/// # Example
/// ```
/// use callcenter_simulator_core_rs::RngManager;
///
/// let mut rng = RngManager::new(12345);
/// let first = rng.next();
/// assert_ne!(first, rng.next());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RngManager {
    /// Internal state (64-bit)
    state: u64,
}

impl RngManager {
    /// Create a new RNG with given seed
    ///
    /// # Arguments
    /// * `seed` - Initial seed value (u64)
    pub fn new(seed: u64) -> Self {
        // Ensure seed is never zero (xorshift requirement)
        let state = if seed == 0 { 1 } else { seed };
        Self { state }
    }

    /// Generator for one simulated day.
    ///
    /// The model seed and the global day index are mixed with a splitmix64
    /// finalizer so neighbouring days get unrelated streams.
    ///
    /// # Example
    /// ```
    /// use callcenter_simulator_core_rs::RngManager;
    ///
    /// let mut a = RngManager::for_day(7, 3);
    /// let mut b = RngManager::for_day(7, 3);
    /// assert_eq!(a.next(), b.next());
    /// assert_ne!(RngManager::for_day(7, 3).next(), RngManager::for_day(7, 4).next());
    /// ```
    pub fn for_day(seed: u64, day_global: u64) -> Self {
        let mut z = seed
            .wrapping_add(day_global.wrapping_add(1).wrapping_mul(0x9E3779B97F4A7C15));
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
        Self::new(z ^ (z >> 31))
    }

    /// Generate next random u64 value
    pub fn next(&mut self) -> u64 {
        // xorshift64* algorithm
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    /// Current generator state
    pub fn get_state(&self) -> u64 {
        self.state
    }

    /// Generate random f64 in range [0.0, 1.0)
    ///
    /// # Example
    /// ```
    /// use callcenter_simulator_core_rs::RngManager;
    ///
    /// let mut rng = RngManager::new(12345);
    /// let probability = rng.next_f64();
    /// assert!(probability >= 0.0 && probability < 1.0);
    /// ```
    pub fn next_f64(&mut self) -> f64 {
        let value = self.next();
        (value >> 11) as f64 * (1.0 / ((1u64 << 53) as f64))
    }

    /// Bernoulli trial: true with the given probability.
    ///
    /// A probability of 1 always succeeds, 0 never does.
    pub fn chance(&mut self, probability: f64) -> bool {
        if probability <= 0.0 {
            return false;
        }
        probability >= self.next_f64()
    }

    /// Picks an index by cumulative rates: the first `i` with
    /// `rates[0] + .. + rates[i] > u` for a uniform draw `u`.
    ///
    /// Returns `None` if the rates sum to at most `u` (the caller keeps its
    /// current choice then).
    pub fn pick_by_rates(&mut self, rates: &[f64]) -> Option<usize> {
        if rates.is_empty() {
            return None;
        }
        let p = self.next_f64();
        let mut sum = 0.0;
        for (i, rate) in rates.iter().enumerate() {
            sum += rate;
            if sum > p {
                return Some(i);
            }
        }
        None
    }

    /// Standard normal sample (Box-Muller transform).
    pub fn standard_normal(&mut self) -> f64 {
        let u1 = 1.0 - self.next_f64();
        let u2 = self.next_f64();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }
}
