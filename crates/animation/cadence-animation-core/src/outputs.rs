//! Per-frame outputs: fired events and development diagnostics.

use serde::{Deserialize, Serialize};

use crate::events::EventSink;
use crate::ids::ObjectId;

/// One animation event delivered this frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FiredEvent {
    pub object: ObjectId,
    pub event: i32,
    #[serde(default)]
    pub options: String,
    pub origin: [f32; 3],
    pub angles: [f32; 3],
}

/// Counters for conditions the frame pass recovered from. Never user facing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameDiagnostics {
    pub teleports: u32,
    pub retired: u32,
    pub missing_parents: u32,
    pub hierarchy_cycles: u32,
    pub skipped_layers: u32,
    pub duplicate_layer_orders: u32,
    pub non_finite_cycles: u32,
    pub dispatched_layers: u32,
    pub dispatch_fallbacks: u32,
    pub cached_poses: u32,
}

/// Outputs returned by Engine::update().
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FrameOutputs {
    #[serde(default)]
    pub events: Vec<FiredEvent>,
    #[serde(default)]
    pub diagnostics: FrameDiagnostics,
}

impl FrameOutputs {
    #[inline]
    pub fn clear(&mut self) {
        self.events.clear();
        self.diagnostics = FrameDiagnostics::default();
    }

    #[inline]
    pub fn push_event(&mut self, event: FiredEvent) {
        self.events.push(event);
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events fired for one object, in firing order.
    pub fn events_for(&self, object: ObjectId) -> impl Iterator<Item = &FiredEvent> {
        self.events.iter().filter(move |e| e.object == object)
    }
}

impl EventSink for FrameOutputs {
    fn fire_event(
        &mut self,
        object: ObjectId,
        origin: [f32; 3],
        angles: [f32; 3],
        event: i32,
        options: &str,
    ) {
        self.push_event(FiredEvent {
            object,
            event,
            options: options.to_string(),
            origin,
            angles,
        });
    }
}
