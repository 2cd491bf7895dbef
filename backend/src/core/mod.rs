//! Simulated clock primitives and the half-hour interval accumulator.

pub mod interval;
pub mod time;
