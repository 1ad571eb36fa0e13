//! Bounded, time-ordered sample history for one tracked attribute.
//!
//! Model:
//! - Samples are kept newest-first; index 0 is always the most recent sample.
//! - Times are nondecreasing from oldest to newest; a write at an existing time
//!   replaces that sample instead of appending.
//! - Capacity is fixed at construction; the oldest sample is evicted on overflow.
//! - Samples that fall far enough behind `now` are culled on every write, keeping
//!   the first sample before the retention horizon plus two older ones for
//!   three-point interpolation.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::value::Interpolant;

/// Minimum spacing between two samples for them to define an interpolation segment.
pub const MIN_SAMPLE_SPACING: f32 = 0.0001;

/// Upper bound on the fractional position inside a segment.
pub const MAX_FRAC: f32 = 2.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sample<T> {
    pub time: f32,
    pub value: T,
}

/// Result of recording a sample.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NoteOutcome {
    /// Stored, and differs from what was newest before.
    Changed,
    /// Stored, but the newest value did not change; no interpolation work needed.
    Unchanged,
    /// Older than everything a full history retains; ignored.
    Dropped,
}

impl NoteOutcome {
    #[inline]
    pub fn needs_interpolation(self) -> bool {
        matches!(self, NoteOutcome::Changed)
    }
}

/// Samples bracketing a query time, as indices into the history (0 = newest).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Bracket {
    pub newer: usize,
    pub older: usize,
    /// The sample before `older`, when one exists.
    pub oldest: Option<usize>,
    /// Position of the query inside `[older.time, newer.time]`.
    pub frac: f32,
    /// The query is at or past the newest sample.
    pub past_newest: bool,
}

impl Bracket {
    #[inline]
    pub fn is_single(&self) -> bool {
        self.newer == self.older
    }
}

#[derive(Clone, Debug)]
pub struct SampleHistory<T> {
    samples: VecDeque<Sample<T>>,
    capacity: usize,
    /// Seconds of history kept behind `now`; `None` disables time culling.
    retention: Option<f32>,
    baseline: Option<Sample<T>>,
}

impl<T: Interpolant> SampleHistory<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            retention: None,
            baseline: None,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn set_retention(&mut self, seconds: Option<f32>) {
        self.retention = seconds;
    }

    #[inline]
    pub fn newest(&self) -> Option<&Sample<T>> {
        self.samples.front()
    }

    #[inline]
    pub fn oldest(&self) -> Option<&Sample<T>> {
        self.samples.back()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&Sample<T>> {
        self.samples.get(index)
    }

    /// Newest-first iteration.
    pub fn iter(&self) -> impl Iterator<Item = &Sample<T>> {
        self.samples.iter()
    }

    /// Random access by ring position; `None` past the valid range.
    pub fn history_value(&self, index: usize) -> Option<(&T, f32)> {
        self.samples.get(index).map(|s| (&s.value, s.time))
    }

    /// Mutable access to a stored value. Times are never exposed mutably so the
    /// ordering invariant cannot be broken through this handle.
    pub fn value_mut(&mut self, index: usize) -> Option<&mut T> {
        self.samples.get_mut(index).map(|s| &mut s.value)
    }

    /// Record `value` as observed at `change_time`.
    pub fn note_changed(
        &mut self,
        now: f32,
        change_time: f32,
        value: T,
        update_baseline: bool,
    ) -> NoteOutcome {
        if self.samples.len() >= self.capacity {
            if let Some(oldest) = self.samples.back() {
                if change_time < oldest.time {
                    return NoteOutcome::Dropped;
                }
            }
        }

        let changed = self.samples.front().map_or(true, |head| head.value != value);

        if update_baseline {
            self.baseline = Some(Sample {
                time: change_time,
                value: value.clone(),
            });
        }

        // First sample not newer than the incoming one.
        let pos = self
            .samples
            .iter()
            .position(|s| s.time <= change_time)
            .unwrap_or(self.samples.len());

        match self.samples.get_mut(pos) {
            Some(existing) if existing.time == change_time => existing.value = value,
            _ => {
                self.samples.insert(
                    pos,
                    Sample {
                        time: change_time,
                        value,
                    },
                );
                while self.samples.len() > self.capacity {
                    self.samples.pop_back();
                }
            }
        }

        if let Some(retention) = self.retention {
            self.remove_entries_before(now - retention);
        }

        if changed {
            NoteOutcome::Changed
        } else {
            NoteOutcome::Unchanged
        }
    }

    /// Drop samples that can no longer be bracketed by a query at or after `time`.
    pub fn remove_entries_before(&mut self, time: f32) {
        if let Some(i) = self.samples.iter().position(|s| s.time < time) {
            self.samples.truncate(i + 3);
        }
    }

    /// Value to restore predicted state to: the last authoritative sample, or the
    /// newest sample when no baseline was recorded.
    pub fn last_networked(&self) -> Option<&T> {
        self.baseline
            .as_ref()
            .or_else(|| self.samples.front())
            .map(|s| &s.value)
    }

    /// Collapse to the newest sample only (discontinuity reset).
    pub fn collapse_to_newest(&mut self) {
        self.samples.truncate(1);
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.baseline = None;
    }

    /// Locate the samples around `query_time`.
    ///
    /// - Query at or past the newest sample: `newer == older == 0`, `past_newest`.
    /// - Query before every sample: `newer == older == oldest index`.
    /// - Otherwise `older` is the newest sample at or before the query and `newer`
    ///   the sample right after it.
    pub fn bracket(&self, query_time: f32) -> Option<Bracket> {
        let n = self.samples.len();
        if n == 0 {
            return None;
        }

        let mut newer: Option<usize> = None;
        for (i, sample) in self.samples.iter().enumerate() {
            let older_time = sample.time;
            if query_time < older_time {
                newer = Some(i);
                continue;
            }

            let Some(nw) = newer else {
                return Some(Bracket {
                    newer: i,
                    older: i,
                    oldest: None,
                    frac: 0.0,
                    past_newest: true,
                });
            };

            let dt = self.samples[nw].time - older_time;
            let frac = if dt > MIN_SAMPLE_SPACING {
                ((query_time - older_time) / dt).min(MAX_FRAC)
            } else {
                0.0
            };
            let oldest = (i + 1 < n).then_some(i + 1);
            return Some(Bracket {
                newer: nw,
                older: i,
                oldest,
                frac,
                past_newest: false,
            });
        }

        let last = n - 1;
        Some(Bracket {
            newer: last,
            older: last,
            oldest: None,
            frac: 0.0,
            past_newest: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn times(h: &SampleHistory<f32>) -> Vec<f32> {
        h.iter().map(|s| s.time).collect()
    }

    #[test]
    fn out_of_order_sample_is_inserted_sorted() {
        let mut h = SampleHistory::with_capacity(8);
        h.note_changed(0.0, 1.0, 1.0, true);
        h.note_changed(0.0, 3.0, 3.0, true);
        h.note_changed(0.0, 2.0, 2.0, true);
        assert_eq!(times(&h), vec![3.0, 2.0, 1.0]);
    }

    #[test]
    fn duplicate_time_replaces() {
        let mut h = SampleHistory::with_capacity(8);
        h.note_changed(0.0, 1.0, 1.0, true);
        assert_eq!(h.note_changed(0.0, 1.0, 5.0, true), NoteOutcome::Changed);
        assert_eq!(h.len(), 1);
        assert_eq!(h.history_value(0), Some((&5.0, 1.0)));
    }

    #[test]
    fn same_value_is_unchanged() {
        let mut h = SampleHistory::with_capacity(8);
        assert_eq!(h.note_changed(0.0, 1.0, 2.0, true), NoteOutcome::Changed);
        assert_eq!(h.note_changed(0.0, 2.0, 2.0, true), NoteOutcome::Unchanged);
        assert_eq!(h.len(), 2);
    }

    #[test]
    fn full_history_drops_stale_writes() {
        let mut h = SampleHistory::with_capacity(2);
        h.note_changed(0.0, 1.0, 1.0, true);
        h.note_changed(0.0, 2.0, 2.0, true);
        assert_eq!(h.note_changed(0.0, 0.5, 9.0, true), NoteOutcome::Dropped);
        assert_eq!(times(&h), vec![2.0, 1.0]);
        h.note_changed(0.0, 3.0, 3.0, true);
        assert_eq!(times(&h), vec![3.0, 2.0]);
    }

    #[test]
    fn history_value_past_range_is_none() {
        let mut h = SampleHistory::with_capacity(4);
        h.note_changed(0.0, 1.0, 1.0, true);
        assert!(h.history_value(1).is_none());
        assert!(SampleHistory::<f32>::with_capacity(4).history_value(0).is_none());
    }

    #[test]
    fn retention_culls_but_keeps_bracketing_samples() {
        let mut h = SampleHistory::with_capacity(16);
        for i in 0..10 {
            h.note_changed(0.0, i as f32, i as f32, true);
        }
        h.set_retention(Some(2.5));
        // horizon 7.0: the first sample below it is t=6, kept with two older ones
        h.note_changed(9.5, 9.5, 10.0, true);
        assert_eq!(h.len(), 7);
        assert_eq!(h.oldest().map(|s| s.time), Some(4.0));
    }

    #[test]
    fn bracket_inside_segment() {
        let mut h = SampleHistory::with_capacity(8);
        h.note_changed(0.0, 0.0, 0.0, true);
        h.note_changed(0.0, 1.0, 1.0, true);
        h.note_changed(0.0, 2.0, 2.0, true);
        let b = h.bracket(1.25).unwrap();
        assert_eq!((b.newer, b.older, b.oldest), (0, 1, Some(2)));
        assert!((b.frac - 0.25).abs() < 1e-6);
        assert!(!b.past_newest);
    }

    #[test]
    fn bracket_edges() {
        let mut h = SampleHistory::with_capacity(8);
        h.note_changed(0.0, 1.0, 1.0, true);
        h.note_changed(0.0, 2.0, 2.0, true);
        let past = h.bracket(5.0).unwrap();
        assert!(past.is_single() && past.past_newest && past.newer == 0);
        let before = h.bracket(0.0).unwrap();
        assert!(before.is_single() && !before.past_newest && before.newer == 1);
    }

    #[test]
    fn baseline_survives_newer_unbaselined_samples() {
        let mut h = SampleHistory::with_capacity(8);
        h.note_changed(0.0, 1.0, 1.0, true);
        h.note_changed(0.0, 2.0, 7.0, false);
        assert_eq!(h.last_networked(), Some(&1.0));
    }
}
