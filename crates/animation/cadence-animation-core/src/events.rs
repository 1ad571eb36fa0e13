//! Exactly-once animation event delivery.
//!
//! Every animation channel (the base sequence and each overlay layer) owns an
//! [`EventCursor`] remembering the cycle it last fired up to. Each frame the cursor
//! is advanced to the channel's current cycle and every event whose trigger lies in
//! the crossed interval is handed to an [`EventSink`].
//!
//! Model:
//! - Forward motion fires triggers in `(prev, cycle]`, ascending.
//! - A backward jump larger than the wrap threshold on a looping sequence is one
//!   completed loop: the tail `(prev, 1]` fires first, then the scan restarts at
//!   the beginning of the new loop.
//! - Any other backward motion is out-of-order timing: nothing fires and the
//!   marker stays put, so the skipped interval is not replayed later.
//! - A freshly started channel also fires triggers at exactly 0.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::ids::ObjectId;
use crate::skeleton::{AnimEvent, SequenceDesc};

/// Marker value for a channel whose sequence just (re)started; below every trigger.
pub const NEW_SEQUENCE_MARKER: f32 = -0.01;

/// Receiver for fired events (sound, particles, gameplay hooks).
pub trait EventSink {
    fn fire_event(
        &mut self,
        object: ObjectId,
        origin: [f32; 3],
        angles: [f32; 3],
        event: i32,
        options: &str,
    );
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventCursor {
    sequence: i32,
    prev_cycle: f32,
    just_started: bool,
}

impl Default for EventCursor {
    fn default() -> Self {
        Self {
            sequence: -1,
            prev_cycle: NEW_SEQUENCE_MARKER,
            just_started: true,
        }
    }
}

impl EventCursor {
    #[inline]
    pub fn prev_cycle(&self) -> f32 {
        self.prev_cycle
    }

    #[inline]
    pub fn sequence(&self) -> i32 {
        self.sequence
    }

    /// Start over as if `sequence` had just been assigned.
    pub fn restart(&mut self, sequence: i32) {
        *self = Self {
            sequence,
            ..Self::default()
        };
    }

    /// Move the marker to `cycle`, calling `fire` for each due event in order.
    pub fn advance<'a>(
        &mut self,
        sequence: i32,
        desc: &'a SequenceDesc,
        cycle: f32,
        wrap_threshold: f32,
        mut fire: impl FnMut(&'a AnimEvent),
    ) {
        if self.sequence != sequence {
            self.restart(sequence);
        }
        if cycle == self.prev_cycle {
            return;
        }

        let mut prev = self.prev_cycle;
        if cycle <= prev {
            if !(desc.looping && prev > 0.0 && prev - cycle > wrap_threshold) {
                return;
            }
            for ev in desc.events.iter().filter(|e| e.cycle > prev) {
                fire(ev);
            }
            prev = NEW_SEQUENCE_MARKER;
        }

        let just_started = self.just_started;
        for ev in desc
            .events
            .iter()
            .filter(|e| (e.cycle > prev && e.cycle <= cycle) || (just_started && e.cycle == 0.0))
        {
            fire(ev);
        }

        self.just_started = false;
        self.prev_cycle = cycle;
    }
}

/// Advance `cursor` and deliver the client-side events that became due.
/// Returns the number of events fired.
#[allow(clippy::too_many_arguments)]
pub fn dispatch_events(
    cursor: &mut EventCursor,
    sequence: i32,
    desc: &SequenceDesc,
    cycle: f32,
    wrap_threshold: f32,
    object: ObjectId,
    origin: [f32; 3],
    angles: [f32; 3],
    sink: &mut dyn EventSink,
) -> usize {
    let mut fired = 0;
    cursor.advance(sequence, desc, cycle, wrap_threshold, |ev| {
        if !ev.client {
            return;
        }
        trace!(?object, sequence, event = ev.event, cycle = ev.cycle, "anim event");
        sink.fire_event(object, origin, angles, ev.event, &ev.options);
        fired += 1;
    });
    fired
}
