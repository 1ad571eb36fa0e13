//! Interpolation policy: reconstruct a value at an arbitrary query time from a
//! [`SampleHistory`] and the per-variable flags.

use serde::{Deserialize, Serialize};

use crate::config::InterpSettings;
use crate::history::{Bracket, SampleHistory, MIN_SAMPLE_SPACING};
use crate::value::Interpolant;

/// Below this spacing the two newest samples are too close to extrapolate from.
const MIN_EXTRAPOLATION_GAP: f32 = 0.001;

/// Per-variable behaviour flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VarFlags {
    /// Values live on the unit loop (cycles); blend along the shorter way round.
    pub looping: bool,
    /// Never use three-point Hermite blending.
    pub linear_only: bool,
    /// Step between samples instead of blending.
    pub discontinuous: bool,
    /// Project past the newest sample when the global setting allows it.
    pub extrapolate: bool,
    /// Skipped by `latch`; the caller records samples explicitly.
    pub exclude_auto_latch: bool,
    /// Skipped by the per-frame interpolation pass.
    pub exclude_auto_interpolate: bool,
}

impl VarFlags {
    pub fn looping() -> Self {
        Self {
            looping: true,
            ..Self::default()
        }
    }

    pub fn linear() -> Self {
        Self {
            linear_only: true,
            ..Self::default()
        }
    }

    pub fn discontinuous() -> Self {
        Self {
            discontinuous: true,
            ..Self::default()
        }
    }

    pub fn with_extrapolation(mut self) -> Self {
        self.extrapolate = true;
        self
    }
}

/// Value reconstructed at a query time.
#[derive(Clone, Debug, PartialEq)]
pub struct Interpolated<T> {
    pub value: T,
    /// The value will not change for later query times until a new sample arrives.
    pub no_more_changes: bool,
}

/// Evaluate `history` at `query_time`. Returns `None` only for an empty history.
pub fn interpolate<T: Interpolant>(
    history: &SampleHistory<T>,
    query_time: f32,
    flags: VarFlags,
    settings: &InterpSettings,
) -> Option<Interpolated<T>> {
    let bracket = history.bracket(query_time)?;

    if bracket.past_newest {
        return past_newest(history, query_time, flags, settings);
    }

    if bracket.is_single() {
        let (value, _) = history.history_value(bracket.newer)?;
        return Some(Interpolated {
            value: value.clone(),
            no_more_changes: false,
        });
    }

    let value = blend(history, &bracket, flags)?;
    let no_more_changes = bracket.newer == 0 && 1.0 - bracket.frac < MIN_SAMPLE_SPACING;
    Some(Interpolated {
        value,
        no_more_changes,
    })
}

fn blend<T: Interpolant>(history: &SampleHistory<T>, b: &Bracket, flags: VarFlags) -> Option<T> {
    let (newer, newer_t) = history.history_value(b.newer)?;
    let (older, older_t) = history.history_value(b.older)?;

    if flags.discontinuous {
        let snapped = if b.frac == 0.0 { older } else { newer };
        return Some(snapped.clone());
    }

    if flags.looping {
        return Some(T::looping_lerp(older, newer, b.frac));
    }

    if !flags.linear_only {
        if let Some((oldest, oldest_t)) = b.oldest.and_then(|i| history.history_value(i)) {
            let dt = newer_t - older_t;
            let dt2 = older_t - oldest_t;
            if dt2 > MIN_SAMPLE_SPACING {
                // Re-space p0 so both tangent segments span the same time.
                let p0 = T::lerp(older, oldest, dt / dt2);
                return Some(T::hermite(&p0, older, newer, b.frac));
            }
        }
    }

    Some(T::lerp(older, newer, b.frac))
}

fn past_newest<T: Interpolant>(
    history: &SampleHistory<T>,
    query_time: f32,
    flags: VarFlags,
    settings: &InterpSettings,
) -> Option<Interpolated<T>> {
    let new = history.get(0)?;
    let extrapolating = flags.extrapolate && settings.allow_extrapolation;

    let old = match history.get(1) {
        Some(old) if extrapolating => old,
        _ => {
            return Some(Interpolated {
                value: new.value.clone(),
                no_more_changes: true,
            })
        }
    };

    if query_time <= new.time {
        return Some(Interpolated {
            value: new.value.clone(),
            no_more_changes: false,
        });
    }
    let gap = new.time - old.time;
    if gap < MIN_EXTRAPOLATION_GAP || flags.discontinuous {
        // No usable slope, or a stepped value: the projection is the newest value.
        return Some(Interpolated {
            value: new.value.clone(),
            no_more_changes: true,
        });
    }

    let ahead = (query_time - new.time).min(settings.max_extrapolation);
    let t = 1.0 + ahead / gap;
    let value = if flags.looping {
        T::looping_lerp(&old.value, &new.value, t)
    } else {
        T::lerp(&old.value, &new.value, t)
    };
    Some(Interpolated {
        value,
        // Past the cap the projection stops moving.
        no_more_changes: query_time - new.time >= settings.max_extrapolation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(samples: &[(f32, f32)]) -> SampleHistory<f32> {
        let mut h = SampleHistory::with_capacity(8);
        for &(t, v) in samples {
            h.note_changed(0.0, t, v, true);
        }
        h
    }

    fn eval(h: &SampleHistory<f32>, q: f32, flags: VarFlags) -> Interpolated<f32> {
        interpolate(h, q, flags, &InterpSettings::default()).unwrap()
    }

    #[test]
    fn empty_history_yields_none() {
        let h = SampleHistory::<f32>::with_capacity(4);
        assert!(interpolate(&h, 1.0, VarFlags::default(), &InterpSettings::default()).is_none());
    }

    #[test]
    fn single_sample_is_returned_unchanged() {
        let h = history(&[(1.0, 4.0)]);
        assert_eq!(eval(&h, 0.5, VarFlags::default()).value, 4.0);
        let past = eval(&h, 2.0, VarFlags::default().with_extrapolation());
        assert_eq!(past.value, 4.0);
        assert!(past.no_more_changes);
    }

    #[test]
    fn discontinuous_snaps() {
        let h = history(&[(0.0, 1.0), (1.0, 2.0)]);
        assert_eq!(eval(&h, 0.0, VarFlags::discontinuous()).value, 1.0);
        assert_eq!(eval(&h, 0.4, VarFlags::discontinuous()).value, 2.0);
    }

    #[test]
    fn hermite_passes_through_samples() {
        let h = history(&[(0.0, 0.0), (1.0, 1.0), (2.0, 4.0)]);
        let at = eval(&h, 1.0, VarFlags::default());
        assert!((at.value - 1.0).abs() < 1e-6);
        let mid = eval(&h, 1.5, VarFlags::default()).value;
        assert!(mid > 1.0 && mid < 4.0);
    }

    #[test]
    fn extrapolation_is_capped() {
        let h = history(&[(0.0, 0.0), (1.0, 1.0)]);
        let flags = VarFlags::default().with_extrapolation();
        let near = eval(&h, 1.1, flags);
        assert!((near.value - 1.1).abs() < 1e-5);
        assert!(!near.no_more_changes);
        let far = eval(&h, 5.0, flags);
        assert!((far.value - 1.25).abs() < 1e-5);
        assert!(far.no_more_changes);
    }

    #[test]
    fn extrapolation_respects_global_switch() {
        let h = history(&[(0.0, 0.0), (1.0, 1.0)]);
        let settings = InterpSettings::default().with_extrapolation(false, 0.25);
        let r = interpolate(&h, 1.2, VarFlags::default().with_extrapolation(), &settings).unwrap();
        assert_eq!(r.value, 1.0);
        assert!(r.no_more_changes);
    }

    #[test]
    fn linear_and_discontinuous_still_extrapolate() {
        let h = history(&[(0.0, 0.0), (1.0, 1.0)]);
        let r = eval(&h, 1.1, VarFlags::linear().with_extrapolation());
        assert!((r.value - 1.1).abs() < 1e-5);
        assert!(!r.no_more_changes);
        // stepped values project to the newest sample
        let r = eval(&h, 1.1, VarFlags::discontinuous().with_extrapolation());
        assert_eq!(r.value, 1.0);
        assert!(r.no_more_changes);
    }

    #[test]
    fn extrapolation_without_slope_retires() {
        let h = history(&[(1.0, 0.0), (1.0005, 1.0)]);
        let flags = VarFlags::default().with_extrapolation();
        let r = eval(&h, 1.2, flags);
        assert_eq!(r.value, 1.0);
        assert!(r.no_more_changes);
    }

    #[test]
    fn reaching_newest_sample_retires() {
        let h = history(&[(0.0, 0.0), (1.0, 1.0)]);
        assert!(!eval(&h, 0.5, VarFlags::linear()).no_more_changes);
        assert!(eval(&h, 1.0, VarFlags::linear()).no_more_changes);
    }
}
