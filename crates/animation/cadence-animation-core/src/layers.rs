//! Animation layer set: a bounded, order-stable collection of overlay layers.
//!
//! A layer's storage slot never moves; presentation order is a separate,
//! user-assigned `order` value. The networked part of each layer lives in the
//! owning object's variable registry under [`layer_var_name`]; the set keeps the
//! interpolated copy plus per-layer evaluation state (dispatch cache, event cursor).

use cadence_interp_core::functions::{lerp_f32, looping_lerp};
use cadence_interp_core::{LayerState, SampleHistory, Value};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use tracing::{debug, warn};

use crate::accumulate::DispatchCache;
use crate::events::EventCursor;
use crate::ids::ObjectId;

/// Maximum number of layers per object.
pub const N_MAX: usize = 15;

/// `order` value of a layer that never contributes.
pub const INACTIVE: i32 = N_MAX as i32;

/// Time gap below which a sequence-change fixup does not re-space the third sample.
const MIN_FIXUP_GAP: f32 = 0.001;

pub fn layer_var_name(slot: usize) -> String {
    format!("layer.{slot}")
}

pub fn inactive_state() -> LayerState {
    LayerState {
        sequence: 0,
        cycle: 0.0,
        prev_cycle: 0.0,
        weight: 0.0,
        playback_rate: 1.0,
        order: INACTIVE,
        looping: false,
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnimationLayer {
    pub state: LayerState,
    #[serde(skip)]
    pub(crate) dispatch: DispatchCache,
    #[serde(skip)]
    pub(crate) events: EventCursor,
}

impl AnimationLayer {
    pub fn inactive() -> Self {
        Self {
            state: inactive_state(),
            dispatch: DispatchCache::default(),
            events: EventCursor::default(),
        }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.state.order != INACTIVE
    }

    #[inline]
    pub fn event_cursor(&self) -> &EventCursor {
        &self.events
    }

    #[inline]
    pub fn dispatch_cache(&self) -> &DispatchCache {
        &self.dispatch
    }
}

/// Slots whose registry variables must be created or dropped after a resize.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayerCountChange {
    pub added: Range<usize>,
    pub removed: Range<usize>,
}

/// Result of building the order-to-slot map for one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PresentationOrder {
    pub slots: [Option<usize>; N_MAX],
    /// Layers skipped this frame because their position was already taken.
    pub duplicates: u32,
}

impl PresentationOrder {
    /// Occupied slots in ascending presentation order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots.iter().flatten().copied()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LayerSet {
    /// Back-reference to the owning object; identity only.
    owner: ObjectId,
    layers: Vec<AnimationLayer>,
    #[serde(skip)]
    dirty: bool,
}

impl LayerSet {
    pub fn new(owner: ObjectId) -> Self {
        Self {
            owner,
            layers: Vec::new(),
            dirty: false,
        }
    }

    #[inline]
    pub fn owner(&self) -> ObjectId {
        self.owner
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn get(&self, slot: usize) -> Option<&AnimationLayer> {
        self.layers.get(slot)
    }

    /// Mutable access marks the set dirty; a dirty set forces the next pose setup
    /// to rebuild even within the same frame.
    pub fn get_mut(&mut self, slot: usize) -> Option<&mut AnimationLayer> {
        let layer = self.layers.get_mut(slot)?;
        self.dirty = true;
        Some(layer)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AnimationLayer> {
        self.layers.iter()
    }

    /// Mutable access for evaluation passes; does not mark the set dirty.
    pub(crate) fn slot_mut(&mut self, slot: usize) -> Option<&mut AnimationLayer> {
        self.layers.get_mut(slot)
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut AnimationLayer> {
        self.layers.iter_mut()
    }

    /// Clear and return the dirty flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Grow with inactive layers or shrink from the end. The caller bounds `count`.
    pub fn set_count(&mut self, count: usize) -> LayerCountChange {
        let old = self.layers.len();
        if count > old {
            self.layers.resize_with(count, AnimationLayer::inactive);
        } else {
            self.layers.truncate(count);
        }
        if count != old {
            self.dirty = true;
            debug!(owner = ?self.owner, old, new = count, "layer count changed");
        }
        LayerCountChange {
            added: old.min(count)..count,
            removed: count..old.max(count),
        }
    }

    /// Map presentation positions to storage slots. Inactive layers are left out;
    /// when two layers claim the same position, the lower slot keeps it.
    pub fn presentation_order(&self) -> PresentationOrder {
        let mut slots = [None; N_MAX];
        let mut duplicates = 0;
        for (slot, layer) in self.layers.iter().enumerate() {
            if !layer.is_active() {
                continue;
            }
            let pos = layer.state.order.clamp(0, N_MAX as i32 - 1) as usize;
            match slots[pos] {
                None => slots[pos] = Some(slot),
                Some(taken) => {
                    duplicates += 1;
                    warn!(owner = ?self.owner, slot, taken, order = layer.state.order, "duplicate layer order; layer skipped this frame");
                }
            }
        }
        PresentationOrder { slots, duplicates }
    }
}

/// Repair a layer history around `query_time` after a sequence switch so that no
/// interpolation ever blends cycles of two different sequences.
///
/// With `head` the newer sample of the bracket, `prev1` the older and `prev2` the
/// one before: when `head` and `prev1` disagree on the sequence, `prev1` is moved
/// onto the new sequence at `head.prev_cycle`, and `prev2` is re-derived along the
/// new sequence's timeline. Returns true when a switch was repaired.
pub fn fix_sequence_change(history: &mut SampleHistory<Value>, query_time: f32) -> bool {
    let Some(bracket) = history.bracket(query_time) else {
        return false;
    };
    if bracket.is_single() {
        return false;
    }

    let head_sample = history.get(bracket.newer);
    let prev1_sample = history.get(bracket.older);
    let (Some(head_sample), Some(prev1_sample)) = (head_sample, prev1_sample) else {
        return false;
    };
    let (Some(head), Some(prev1)) = (
        head_sample.value.as_layer().copied(),
        prev1_sample.value.as_layer(),
    ) else {
        return false;
    };
    if head.sequence == prev1.sequence {
        return false;
    }
    let (t0, t1) = (head_sample.time, prev1_sample.time);
    let t2 = bracket
        .oldest
        .and_then(|i| history.get(i))
        .map(|s| s.time);

    if let Some(prev1) = history.value_mut(bracket.older).and_then(Value::as_layer_mut) {
        debug!(from = prev1.sequence, to = head.sequence, "layer sequence switch");
        prev1.sequence = head.sequence;
        prev1.cycle = head.prev_cycle;
        prev1.weight = head.weight;
        prev1.looping = head.looping;
    }

    if let (Some(oldest), Some(t2)) = (bracket.oldest, t2) {
        let num = if (t0 - t1).abs() > MIN_FIXUP_GAP {
            (t2 - t1) / (t0 - t1)
        } else {
            0.0
        };
        let cycle = if head.looping {
            looping_lerp(num, head.prev_cycle, head.cycle)
        } else {
            lerp_f32(head.prev_cycle, head.cycle, num)
        };
        if let Some(prev2) = history.value_mut(oldest).and_then(Value::as_layer_mut) {
            prev2.sequence = head.sequence;
            prev2.cycle = cycle;
            prev2.weight = head.weight;
            prev2.looping = head.looping;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_orders(orders: &[i32]) -> LayerSet {
        let mut set = LayerSet::new(ObjectId(0));
        set.set_count(orders.len());
        for (slot, &order) in orders.iter().enumerate() {
            set.get_mut(slot).unwrap().state.order = order;
        }
        set
    }

    #[test]
    fn presentation_follows_order_not_slot() {
        let set = with_orders(&[2, 0, 1]);
        let order = set.presentation_order();
        assert_eq!(order.iter().collect::<Vec<_>>(), vec![1, 2, 0]);
        assert_eq!(order.duplicates, 0);
    }

    #[test]
    fn inactive_and_duplicates_are_left_out() {
        let set = with_orders(&[1, INACTIVE, 1, 40]);
        let order = set.presentation_order();
        assert_eq!(order.iter().collect::<Vec<_>>(), vec![0, 3]);
        assert_eq!(order.duplicates, 1);
    }

    #[test]
    fn set_count_reports_changed_slots() {
        let mut set = LayerSet::new(ObjectId(0));
        let grow = set.set_count(3);
        assert_eq!((grow.added, grow.removed), (0..3, 3..3));
        assert!(set.take_dirty());
        assert!(!set.take_dirty());
        let shrink = set.set_count(1);
        assert_eq!((shrink.added, shrink.removed), (1..1, 1..3));
        assert!(!set.get(0).unwrap().is_active());
    }
}
