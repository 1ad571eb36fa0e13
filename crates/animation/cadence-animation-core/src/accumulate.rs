//! Layer pose accumulation.
//!
//! Layers are visited in presentation order and blended into the object's working
//! pose through a [`PoseSink`]: [`DirectSink`] evaluates on the object's own
//! skeleton, [`MergedSink`] evaluates on an attached skeleton ("dispatch") seeded
//! from the primary pose and merges the result back.

use tracing::{debug, warn};

use crate::cycle::{effective_weight, resolve_cycle};
use crate::ids::SkeletonId;
use crate::layers::LayerSet;
use crate::merge::BoneMerge;
use crate::outputs::FrameDiagnostics;
use crate::pose::{PoseBuffer, PoseContext, PoseSource};
use crate::skeleton::Skeleton;

/// Where one layer's contribution goes.
pub trait PoseSink {
    fn accumulate(
        &mut self,
        source: &mut dyn PoseSource,
        pose: &mut PoseBuffer,
        sequence: i32,
        cycle: f32,
        weight: f32,
        ctx: &PoseContext,
    );
}

/// Accumulate straight into the primary pose.
pub struct DirectSink<'a> {
    pub skeleton: &'a Skeleton,
}

impl PoseSink for DirectSink<'_> {
    fn accumulate(
        &mut self,
        source: &mut dyn PoseSource,
        pose: &mut PoseBuffer,
        sequence: i32,
        cycle: f32,
        weight: f32,
        ctx: &PoseContext,
    ) {
        source.accumulate_pose(pose, self.skeleton, sequence, cycle, weight, ctx);
    }
}

/// Accumulate on an attached skeleton using the primary pose as its base.
/// `sequence` is an index into `target`.
pub struct MergedSink<'a> {
    pub target: &'a Skeleton,
    pub merge: &'a dyn BoneMerge,
    pub scratch: &'a mut PoseBuffer,
}

impl PoseSink for MergedSink<'_> {
    fn accumulate(
        &mut self,
        source: &mut dyn PoseSource,
        pose: &mut PoseBuffer,
        sequence: i32,
        cycle: f32,
        weight: f32,
        ctx: &PoseContext,
    ) {
        self.scratch.reset_to_bind(self.target);
        self.merge.copy_to_attached(pose, self.scratch);
        source.accumulate_pose(self.scratch, self.target, sequence, cycle, weight, ctx);
        self.merge.copy_from_attached(self.scratch, pose);
    }
}

/// Attached skeleton layers may be dispatched to.
pub struct DispatchTarget<'a> {
    pub id: SkeletonId,
    pub skeleton: &'a Skeleton,
    pub merge: &'a dyn BoneMerge,
}

/// Per-layer memo of which target sequence a source sequence resolves to.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DispatchCache {
    target_skeleton: Option<SkeletonId>,
    source_sequence: i32,
    resolved: Option<i32>,
    resolutions: u32,
}

impl DispatchCache {
    /// Target sequence with the same name as `source_sequence`, looked up again only
    /// when the source sequence or the target skeleton changed.
    pub fn resolve(
        &mut self,
        source_sequence: i32,
        primary: &Skeleton,
        target_id: SkeletonId,
        target: &Skeleton,
    ) -> Option<i32> {
        if self.target_skeleton == Some(target_id) && self.source_sequence == source_sequence {
            return self.resolved;
        }
        self.target_skeleton = Some(target_id);
        self.source_sequence = source_sequence;
        self.resolved = primary
            .sequence(source_sequence)
            .and_then(|desc| target.find_sequence(&desc.name));
        self.resolutions = self.resolutions.wrapping_add(1);
        debug!(
            source_sequence,
            target = ?target_id,
            resolved = ?self.resolved,
            "dispatch resolved"
        );
        self.resolved
    }

    pub fn clear(&mut self) {
        self.target_skeleton = None;
        self.resolved = None;
    }

    #[inline]
    pub fn resolved(&self) -> Option<i32> {
        self.resolved
    }

    /// How many lookups this cache has performed.
    #[inline]
    pub fn resolutions(&self) -> u32 {
        self.resolutions
    }
}

/// Blend every contributing layer into `pose` in ascending presentation order.
/// Returns the number of layers accumulated. Never fails: bad layers are skipped
/// or sanitized and counted in `diag`.
#[allow(clippy::too_many_arguments)]
pub fn accumulate_layers(
    layers: &mut LayerSet,
    skeleton: &Skeleton,
    dispatch: Option<&DispatchTarget<'_>>,
    source: &mut dyn PoseSource,
    pose: &mut PoseBuffer,
    scratch: &mut PoseBuffer,
    ctx: &PoseContext,
    diag: &mut FrameDiagnostics,
) -> usize {
    let order = layers.presentation_order();
    diag.duplicate_layer_orders += order.duplicates;

    let mut accumulated = 0;
    for slot in order.iter() {
        let Some(layer) = layers.slot_mut(slot) else {
            continue;
        };
        let state = layer.state;

        let Some(desc) = skeleton.sequence(state.sequence) else {
            diag.skipped_layers += 1;
            continue;
        };
        let Some(weight) = effective_weight(state.weight) else {
            continue;
        };
        let (cycle, non_finite) = resolve_cycle(state.cycle, desc.looping);
        if non_finite {
            diag.non_finite_cycles += 1;
            warn!(object = ?ctx.object, slot, sequence = state.sequence, "non-finite layer cycle; using 0");
        }

        let resolved = match dispatch {
            Some(target) => {
                let resolved =
                    layer
                        .dispatch
                        .resolve(state.sequence, skeleton, target.id, target.skeleton);
                if resolved.is_none() {
                    diag.dispatch_fallbacks += 1;
                }
                resolved.map(|seq| (target, seq))
            }
            None => {
                layer.dispatch.clear();
                None
            }
        };

        match resolved {
            Some((target, target_sequence)) => {
                let mut sink = MergedSink {
                    target: target.skeleton,
                    merge: target.merge,
                    scratch: &mut *scratch,
                };
                sink.accumulate(source, pose, target_sequence, cycle, weight, ctx);
                diag.dispatched_layers += 1;
            }
            None => {
                DirectSink { skeleton }.accumulate(
                    source,
                    pose,
                    state.sequence,
                    cycle,
                    weight,
                    ctx,
                );
            }
        }
        accumulated += 1;
    }
    accumulated
}
