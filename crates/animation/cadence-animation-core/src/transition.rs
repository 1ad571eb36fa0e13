//! Cross-fading of base sequence changes.
//!
//! The last entry of the queue is the sequence currently playing. When the base
//! sequence changes, the old entry stays in the queue and fades out over
//! `min(old.fade_out, new.fade_in)` seconds while its cycle keeps advancing from
//! where it was left.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cycle::{advance_cycle, clamp_cycle, effective_weight};
use crate::skeleton::Skeleton;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionEntry {
    pub sequence: i32,
    pub cycle: f32,
    pub playback_rate: f32,
    /// Last time this entry was the current sequence.
    pub anim_time: Option<f32>,
    /// Seconds this entry takes to fade once replaced.
    pub fade_out: f32,
    pub weight: f32,
}

impl TransitionEntry {
    fn new(sequence: i32, now: f32) -> Self {
        Self {
            sequence,
            cycle: 0.0,
            playback_rate: 1.0,
            anim_time: Some(now),
            fade_out: 0.0,
            weight: 1.0,
        }
    }
}

/// A fading sequence ready to accumulate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FadingSequence {
    pub sequence: i32,
    pub cycle: f32,
    pub weight: f32,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SequenceTransitioner {
    entries: Vec<TransitionEntry>,
}

impl SequenceTransitioner {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn entries(&self) -> &[TransitionEntry] {
        &self.entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Start a new current entry when `sequence` differs from the current one or a
    /// restart was forced. Without `interpolate`, or for snap sequences, older
    /// entries are dropped instead of faded.
    pub fn check_for_sequence_change(
        &mut self,
        skeleton: &Skeleton,
        sequence: i32,
        force_new_sequence: bool,
        interpolate: bool,
        now: f32,
    ) {
        let Some(current) = self.entries.last_mut() else {
            self.entries.push(TransitionEntry::new(sequence, now));
            return;
        };
        if current.sequence == sequence && !force_new_sequence {
            return;
        }

        let incoming = skeleton.sequence(sequence);
        let snap = incoming.map_or(false, |d| d.snap);
        if snap || !interpolate {
            self.entries.clear();
        } else {
            let fade_in = incoming.map_or(0.0, |d| d.fade_in);
            let fade_out = skeleton.sequence(current.sequence).map_or(0.0, |d| d.fade_out);
            current.fade_out = fade_out.min(fade_in);
            current.anim_time = Some(now);
        }
        debug!(sequence, snap, queued = self.entries.len(), "base sequence transition");
        self.entries.push(TransitionEntry::new(sequence, now));
    }

    /// Refresh the current entry from the live base sequence state.
    pub fn update_current(&mut self, sequence: i32, cycle: f32, playback_rate: f32, now: f32) {
        if let Some(current) = self.entries.last_mut() {
            current.sequence = sequence;
            current.cycle = cycle;
            current.playback_rate = playback_rate;
            current.anim_time = Some(now);
        }
    }

    /// Recompute fade weights for every entry but the current one and drop the
    /// entries that finished fading.
    pub fn update_fades(&mut self, now: f32) {
        let Some((_, fading)) = self.entries.split_last_mut() else {
            return;
        };
        for entry in fading.iter_mut() {
            let s = match entry.anim_time {
                Some(t) if entry.fade_out > 0.0 => 1.0 - (now - t) / entry.fade_out,
                _ => 0.0,
            };
            entry.weight = if s <= 0.0 {
                0.0
            } else if s >= 1.0 {
                1.0
            } else {
                3.0 * s * s - 2.0 * s * s * s
            };
        }
        let last = self.entries.len() - 1;
        let mut index = 0;
        self.entries.retain(|e| {
            let keep = index == last || e.weight > 0.0;
            index += 1;
            keep
        });
    }

    /// Fading entries, most recently replaced first, with cycles advanced to `now`.
    pub fn fading(&self, skeleton: &Skeleton, now: f32) -> Vec<FadingSequence> {
        let Some((_, fading)) = self.entries.split_last() else {
            return Vec::new();
        };
        fading
            .iter()
            .rev()
            .filter_map(|entry| {
                let desc = skeleton.sequence(entry.sequence)?;
                let weight = effective_weight(entry.weight)?;
                let elapsed = entry.anim_time.map_or(0.0, |t| now - t);
                let cycle = advance_cycle(entry.cycle, elapsed, entry.playback_rate, desc.cycle_rate);
                if !cycle.is_finite() {
                    return None;
                }
                Some(FadingSequence {
                    sequence: entry.sequence,
                    cycle: clamp_cycle(cycle, desc.looping),
                    weight,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::SequenceDesc;

    fn skeleton() -> Skeleton {
        Skeleton {
            name: "body".into(),
            bones: Vec::new(),
            sequences: vec![
                SequenceDesc {
                    looping: true,
                    fade_out: 0.4,
                    ..SequenceDesc::named("walk")
                },
                SequenceDesc {
                    fade_in: 0.2,
                    ..SequenceDesc::named("jump")
                },
                SequenceDesc {
                    snap: true,
                    ..SequenceDesc::named("die")
                },
            ],
        }
    }

    #[test]
    fn change_fades_previous_sequence() {
        let skel = skeleton();
        let mut tr = SequenceTransitioner::new();
        tr.check_for_sequence_change(&skel, 0, false, true, 0.0);
        tr.update_current(0, 0.5, 1.0, 1.0);
        tr.check_for_sequence_change(&skel, 1, false, true, 1.0);
        assert_eq!(tr.entries().len(), 2);
        assert!((tr.entries()[0].fade_out - 0.2).abs() < 1e-6);

        tr.update_fades(1.1);
        let fading = tr.fading(&skel, 1.1);
        assert_eq!(fading.len(), 1);
        // s = 0.5 -> smoothstep 0.5
        assert!((fading[0].weight - 0.5).abs() < 1e-5);
        assert!((fading[0].cycle - 0.6).abs() < 1e-5);

        tr.update_fades(1.3);
        assert_eq!(tr.entries().len(), 1);
        assert_eq!(tr.entries()[0].sequence, 1);
    }

    #[test]
    fn snap_and_disabled_interpolation_cut() {
        let skel = skeleton();
        let mut tr = SequenceTransitioner::new();
        tr.check_for_sequence_change(&skel, 0, false, true, 0.0);
        tr.check_for_sequence_change(&skel, 2, false, true, 0.5);
        assert_eq!(tr.entries().len(), 1);

        tr.check_for_sequence_change(&skel, 0, false, false, 1.0);
        assert_eq!(tr.entries().len(), 1);
        assert_eq!(tr.entries()[0].sequence, 0);
    }

    #[test]
    fn forced_restart_queues_same_sequence() {
        let skel = skeleton();
        let mut tr = SequenceTransitioner::new();
        tr.check_for_sequence_change(&skel, 0, false, true, 0.0);
        tr.check_for_sequence_change(&skel, 0, false, true, 0.1);
        assert_eq!(tr.entries().len(), 1);
        tr.check_for_sequence_change(&skel, 0, true, true, 0.2);
        assert_eq!(tr.entries().len(), 2);
    }
}
