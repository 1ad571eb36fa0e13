//! Animated, interpolated object: tracked attributes, layers and pose state.

use cadence_interp_core::{InterpSettings, Value, VarFlags, VarRegistry};
use serde::{Deserialize, Serialize};

use crate::counter::FrameCounter;
use crate::events::EventCursor;
use crate::ids::{ObjectId, SkeletonId};
use crate::layers::{fix_sequence_change, layer_var_name, LayerSet};
use crate::merge::BoneMergeMap;
use crate::pose::PoseBuffer;
use crate::transition::SequenceTransitioner;

pub const ATTR_ORIGIN: &str = "origin";
pub const ATTR_ANGLES: &str = "angles";
pub const ATTR_SEQUENCE: &str = "sequence";
pub const ATTR_CYCLE: &str = "cycle";
pub const ATTR_PLAYBACK_RATE: &str = "playback_rate";

/// Attachment to a parent object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParentLink {
    pub object: ObjectId,
    /// Attachment point on the parent; 0 is the parent's origin.
    pub attachment: u32,
}

#[derive(Debug)]
pub struct AnimatedObject {
    pub(crate) id: ObjectId,
    pub(crate) skeleton: Option<SkeletonId>,
    pub(crate) registry: VarRegistry,
    pub(crate) layers: LayerSet,
    pub(crate) transitioner: SequenceTransitioner,
    pub(crate) base_events: EventCursor,

    pub(crate) parent: Option<ParentLink>,
    /// Parent as of the last processed frame; a mismatch means a teleport.
    pub(crate) acked_parent: Option<ParentLink>,
    pub(crate) no_interp: bool,
    pub(crate) predicted: bool,
    /// Dispatch target for overlay layers.
    pub(crate) attached: Option<ObjectId>,

    pub(crate) abs_origin: [f32; 3],
    pub(crate) abs_angles: [f32; 3],
    pub(crate) transform_dirty: bool,

    pub(crate) pose: PoseBuffer,
    pub(crate) pose_frame: Option<u64>,
    pub(crate) counter: FrameCounter,
    pub(crate) merge_cache: Option<(SkeletonId, SkeletonId, BoneMergeMap)>,

    pub(crate) reset_events: bool,
    pub(crate) force_new_sequence: bool,
}

impl AnimatedObject {
    pub(crate) fn new(id: ObjectId, settings: InterpSettings, counter: FrameCounter) -> Self {
        let mut registry = VarRegistry::new(settings);
        registry.add_var(ATTR_ORIGIN, Value::Vec3([0.0; 3]), VarFlags::default());
        registry.add_var(ATTR_ANGLES, Value::Angles([0.0; 3]), VarFlags::default());
        registry.add_var(ATTR_SEQUENCE, Value::Int(0), VarFlags::discontinuous());
        registry.add_var(ATTR_CYCLE, Value::Float(0.0), VarFlags::linear());
        registry.add_var(ATTR_PLAYBACK_RATE, Value::Float(1.0), VarFlags::linear());
        Self {
            id,
            skeleton: None,
            registry,
            layers: LayerSet::new(id),
            transitioner: SequenceTransitioner::new(),
            base_events: EventCursor::default(),
            parent: None,
            acked_parent: None,
            no_interp: false,
            predicted: false,
            attached: None,
            abs_origin: [0.0; 3],
            abs_angles: [0.0; 3],
            transform_dirty: true,
            pose: PoseBuffer::default(),
            pose_frame: None,
            counter,
            merge_cache: None,
            reset_events: false,
            force_new_sequence: false,
        }
    }

    #[inline]
    pub fn id(&self) -> ObjectId {
        self.id
    }

    #[inline]
    pub fn skeleton(&self) -> Option<SkeletonId> {
        self.skeleton
    }

    #[inline]
    pub fn registry(&self) -> &VarRegistry {
        &self.registry
    }

    #[inline]
    pub fn layers(&self) -> &LayerSet {
        &self.layers
    }

    #[inline]
    pub fn transitioner(&self) -> &SequenceTransitioner {
        &self.transitioner
    }

    #[inline]
    pub fn parent(&self) -> Option<ParentLink> {
        self.parent
    }

    #[inline]
    pub fn is_predicted(&self) -> bool {
        self.predicted
    }

    #[inline]
    pub fn pose(&self) -> &PoseBuffer {
        &self.pose
    }

    #[inline]
    pub fn abs_origin(&self) -> [f32; 3] {
        self.abs_origin
    }

    #[inline]
    pub fn abs_angles(&self) -> [f32; 3] {
        self.abs_angles
    }

    pub fn origin(&self) -> [f32; 3] {
        self.registry
            .value(ATTR_ORIGIN)
            .and_then(Value::as_vec3)
            .unwrap_or_default()
    }

    pub fn angles(&self) -> [f32; 3] {
        self.registry
            .value(ATTR_ANGLES)
            .and_then(Value::as_vec3)
            .unwrap_or_default()
    }

    pub fn sequence(&self) -> i32 {
        self.registry
            .value(ATTR_SEQUENCE)
            .and_then(Value::as_int)
            .unwrap_or_default()
    }

    pub fn cycle(&self) -> f32 {
        self.registry
            .value(ATTR_CYCLE)
            .and_then(Value::as_f32)
            .unwrap_or_default()
    }

    pub fn playback_rate(&self) -> f32 {
        self.registry
            .value(ATTR_PLAYBACK_RATE)
            .and_then(Value::as_f32)
            .unwrap_or(1.0)
    }

    /// Parent or attachment changed since the last frame, or interpolation was
    /// explicitly suppressed.
    #[inline]
    pub fn teleported(&self) -> bool {
        self.no_interp || self.parent != self.acked_parent
    }

    /// Drop the pose cached for the current frame; the next setup rebuilds it.
    #[inline]
    pub(crate) fn invalidate_pose(&mut self) {
        self.pose_frame = None;
    }

    pub(crate) fn acknowledge_teleport(&mut self) {
        self.acked_parent = self.parent;
        self.no_interp = false;
    }

    /// Repair layer histories around sequence switches, interpolate every tracked
    /// attribute at `query_time` and refresh the layer copies.
    /// Returns true when nothing will change until a new sample arrives.
    pub(crate) fn interpolate(&mut self, query_time: f32) -> bool {
        for slot in 0..self.layers.len() {
            let switched = self
                .registry
                .history_mut(&layer_var_name(slot))
                .map_or(false, |h| fix_sequence_change(h, query_time));
            if switched {
                if let Some(layer) = self.layers.slot_mut(slot) {
                    layer.events.restart(-1);
                }
            }
        }
        let done = self.registry.interpolate(query_time);
        self.sync_layers();
        self.transform_dirty = true;
        done
    }

    /// Jump every attribute to its newest sample.
    pub(crate) fn snap_to_latest(&mut self) {
        self.registry.snap_to_latest();
        self.sync_layers();
        self.transform_dirty = true;
    }

    /// Copy interpolated layer values into the layer set.
    pub(crate) fn sync_layers(&mut self) {
        for slot in 0..self.layers.len() {
            let state = self
                .registry
                .value(&layer_var_name(slot))
                .and_then(Value::as_layer)
                .copied();
            if let (Some(state), Some(layer)) = (state, self.layers.slot_mut(slot)) {
                layer.state = state;
            }
        }
    }
}
