//! Shared utility functions

use std::f64::consts::{PI, TAU};

/// Normalize angle to (-π, π].
#[inline]
pub fn normalize_angle(angle: f64) -> f64 {
    let a = angle.rem_euclid(TAU);
    if a > PI { a - TAU } else { a }
}
