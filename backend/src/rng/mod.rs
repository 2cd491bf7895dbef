//! Deterministic random number generation
//!
//! Uses the xorshift64* algorithm. Every simulated day draws from its own
//! generator derived from the model seed and the global day index, so results
//! do not depend on how days are spread over replica threads.
//! CRITICAL: All randomness in the simulator MUST go through this module.

mod distributions;
mod xorshift;

pub use distributions::{inverse_standard_normal_cdf, Distribution};
pub use xorshift::RngManager;
