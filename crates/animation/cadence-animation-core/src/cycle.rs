//! Cycle and weight normalization shared by the accumulator, the transitioner and
//! the event dispatcher.

use cadence_interp_core::functions::wrap_unit;

/// Largest cycle a non-looping sequence is evaluated at; 1.0 itself would wrap.
pub const MAX_NONLOOPING_CYCLE: f32 = 0.999;

/// Clamp a finite cycle into the sequence's domain.
#[inline]
pub fn clamp_cycle(cycle: f32, looping: bool) -> f32 {
    if looping {
        wrap_unit(cycle)
    } else {
        cycle.clamp(0.0, MAX_NONLOOPING_CYCLE)
    }
}

/// Like [`clamp_cycle`], with non-finite input mapped to 0.
/// The flag reports whether that substitution happened.
#[inline]
pub fn resolve_cycle(cycle: f32, looping: bool) -> (f32, bool) {
    if cycle.is_finite() {
        (clamp_cycle(cycle, looping), false)
    } else {
        (0.0, true)
    }
}

/// `None` for weights that contribute nothing (including NaN); otherwise capped at 1.
#[inline]
pub fn effective_weight(weight: f32) -> Option<f32> {
    if weight > 0.0 {
        Some(weight.min(1.0))
    } else {
        None
    }
}

/// Cycle reached `elapsed` seconds after `cycle` at the given rates.
#[inline]
pub fn advance_cycle(cycle: f32, elapsed: f32, playback_rate: f32, cycle_rate: f32) -> f32 {
    cycle + elapsed * playback_rate * cycle_rate
}
