//! Engine: owns skeletons and objects and runs the per-frame pass
//! (interpolation scheduling, pose setup, event firing).

use cadence_interp_core::{NoteOutcome, Value, VarFlags};
use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::accumulate::{accumulate_layers, DirectSink, DispatchTarget, PoseSink};
use crate::config::Config;
use crate::counter::FrameCounter;
use crate::cycle::{effective_weight, resolve_cycle};
use crate::error::{CoreError, CoreResult};
use crate::events::dispatch_events;
use crate::ids::{IdAllocator, ObjectId, SkeletonId};
use crate::layers::{inactive_state, layer_var_name, AnimationLayer};
use crate::merge::BoneMergeMap;
use crate::object::{AnimatedObject, ParentLink, ATTR_CYCLE, ATTR_SEQUENCE};
use crate::outputs::FrameOutputs;
use crate::pose::{PoseBuffer, PoseContext, PoseSource, SampledPoseSource};
use crate::scheduler::{query_time, FrameTime, InterpolationScheduler};
use crate::skeleton::{parse_skeleton_json, Skeleton};

/// Minimal skeleton library storage.
#[derive(Default, Debug)]
struct SkeletonLib {
    items: Vec<(SkeletonId, Skeleton)>,
}

impl SkeletonLib {
    fn insert(&mut self, id: SkeletonId, skeleton: Skeleton) {
        self.items.push((id, skeleton));
    }

    fn get(&self, id: SkeletonId) -> Option<&Skeleton> {
        self.items
            .iter()
            .find_map(|(s, sk)| if *s == id { Some(sk) } else { None })
    }
}

pub struct Engine {
    // Owned data
    cfg: Config,
    ids: IdAllocator,
    skeletons: SkeletonLib,
    objects: IndexMap<ObjectId, AnimatedObject>,

    // Systems
    scheduler: InterpolationScheduler,
    counter: FrameCounter,
    source: Box<dyn PoseSource>,
    scratch: PoseBuffer,

    // Per-frame state
    frame: FrameTime,
    outputs: FrameOutputs,
}

impl Engine {
    /// Create an engine that samples the keyframes stored on skeletons.
    pub fn new(cfg: Config) -> CoreResult<Self> {
        Self::with_pose_source(cfg, Box::new(SampledPoseSource))
    }

    /// Create an engine delegating pose accumulation to `source`.
    pub fn with_pose_source(cfg: Config, source: Box<dyn PoseSource>) -> CoreResult<Self> {
        cfg.validate()?;
        Ok(Self {
            cfg,
            ids: IdAllocator::new(),
            skeletons: SkeletonLib::default(),
            objects: IndexMap::new(),
            scheduler: InterpolationScheduler::new(),
            counter: FrameCounter::new(),
            source,
            scratch: PoseBuffer::default(),
            frame: FrameTime::default(),
            outputs: FrameOutputs::default(),
        })
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    #[inline]
    pub fn outputs(&self) -> &FrameOutputs {
        &self.outputs
    }

    #[inline]
    pub fn frame(&self) -> FrameTime {
        self.frame
    }

    /// Shared frame counter; clones observe every `update`.
    pub fn frame_counter(&self) -> FrameCounter {
        self.counter.clone()
    }

    // ---------- skeletons ----------

    pub fn load_skeleton(&mut self, mut skeleton: Skeleton) -> CoreResult<SkeletonId> {
        skeleton.prepare()?;
        let id = self.ids.alloc_skeleton();
        debug!(skeleton = ?id, name = %skeleton.name, "skeleton loaded");
        self.skeletons.insert(id, skeleton);
        Ok(id)
    }

    pub fn load_skeleton_json(&mut self, json: &str) -> CoreResult<SkeletonId> {
        let skeleton = parse_skeleton_json(json)?;
        self.load_skeleton(skeleton)
    }

    pub fn skeleton(&self, id: SkeletonId) -> Option<&Skeleton> {
        self.skeletons.get(id)
    }

    // ---------- objects ----------

    pub fn spawn(&mut self) -> ObjectId {
        let id = self.ids.alloc_object();
        let mut obj = AnimatedObject::new(id, self.cfg.history.clone(), self.counter.clone());
        obj.registry
            .set_interpolation_amount(self.cfg.interpolation_amount(false));
        self.objects.insert(id, obj);
        id
    }

    pub fn despawn(&mut self, id: ObjectId) -> CoreResult<()> {
        self.objects
            .shift_remove(&id)
            .ok_or(CoreError::ObjectNotFound { id })?;
        self.scheduler.remove(id);
        Ok(())
    }

    pub fn object(&self, id: ObjectId) -> Option<&AnimatedObject> {
        self.objects.get(&id)
    }

    pub fn objects(&self) -> impl Iterator<Item = &AnimatedObject> {
        self.objects.values()
    }

    fn obj_mut(&mut self, id: ObjectId) -> CoreResult<&mut AnimatedObject> {
        self.objects
            .get_mut(&id)
            .ok_or(CoreError::ObjectNotFound { id })
    }

    pub fn bind_skeleton(&mut self, id: ObjectId, skeleton: SkeletonId) -> CoreResult<()> {
        let skel = self
            .skeletons
            .get(skeleton)
            .ok_or(CoreError::SkeletonNotFound { id: skeleton })?;
        let obj = self
            .objects
            .get_mut(&id)
            .ok_or(CoreError::ObjectNotFound { id })?;
        obj.skeleton = Some(skeleton);
        obj.pose.reset_to_bind(skel);
        obj.invalidate_pose();
        obj.merge_cache = None;
        obj.transitioner.clear();
        let looping = skel.sequence(obj.sequence()).map_or(false, |d| d.looping);
        obj.registry.set_looping(ATTR_CYCLE, looping)?;
        Ok(())
    }

    /// Set or clear the parent. A changed link is processed as a teleport on the next pass.
    pub fn set_parent(&mut self, id: ObjectId, parent: Option<ParentLink>) -> CoreResult<()> {
        let obj = self.obj_mut(id)?;
        obj.parent = parent;
        obj.transform_dirty = true;
        Ok(())
    }

    /// Skip interpolation for this object on the next pass.
    pub fn set_no_interp(&mut self, id: ObjectId) -> CoreResult<()> {
        self.obj_mut(id)?.no_interp = true;
        Ok(())
    }

    pub fn set_predicted(&mut self, id: ObjectId, predicted: bool) -> CoreResult<()> {
        let amount = self.cfg.interpolation_amount(predicted);
        let obj = self.obj_mut(id)?;
        obj.predicted = predicted;
        obj.registry.set_interpolation_amount(amount);
        Ok(())
    }

    /// Route overlay layers to `target`'s skeleton when it defines the same sequence.
    pub fn attach(&mut self, id: ObjectId, target: Option<ObjectId>) -> CoreResult<()> {
        let obj = self.obj_mut(id)?;
        obj.attached = target;
        obj.invalidate_pose();
        Ok(())
    }

    // ---------- samples ----------

    /// Record a value observed for `attr` at `time` (network or playback input).
    pub fn note_value_changed(
        &mut self,
        id: ObjectId,
        attr: &str,
        time: f32,
        value: Value,
    ) -> CoreResult<NoteOutcome> {
        let now = self.frame.now;
        let obj = self
            .objects
            .get_mut(&id)
            .ok_or(CoreError::ObjectNotFound { id })?;

        let sequence_looping = if attr == ATTR_SEQUENCE {
            obj.skeleton
                .and_then(|s| self.skeletons.get(s))
                .zip(value.as_int())
                .and_then(|(skel, seq)| skel.sequence(seq))
                .map(|d| d.looping)
        } else {
            None
        };

        let outcome = obj.registry.note_changed(attr, now, time, value, true)?;
        if outcome != NoteOutcome::Dropped {
            obj.invalidate_pose();
        }
        if let Some(looping) = sequence_looping {
            obj.registry.set_looping(ATTR_CYCLE, looping)?;
        }
        if outcome.needs_interpolation() {
            self.scheduler.add_to_interpolation(id);
        }
        Ok(outcome)
    }

    /// Record a networked layer state for `slot`.
    pub fn note_layer(
        &mut self,
        id: ObjectId,
        slot: usize,
        time: f32,
        mut state: cadence_interp_core::LayerState,
    ) -> CoreResult<NoteOutcome> {
        let obj = self
            .objects
            .get(&id)
            .ok_or(CoreError::ObjectNotFound { id })?;
        let count = obj.layers.len();
        if slot >= count {
            return Err(CoreError::LayerOutOfRange { slot, count });
        }
        if let Some(desc) = obj
            .skeleton
            .and_then(|s| self.skeletons.get(s))
            .and_then(|skel| skel.sequence(state.sequence))
        {
            state.looping = desc.looping;
        }
        self.note_value_changed(id, &layer_var_name(slot), time, Value::Layer(state))
    }

    /// Record every auto-latched live value of the object at `change_time`.
    pub fn latch(&mut self, id: ObjectId, change_time: f32) -> CoreResult<bool> {
        let now = self.frame.now;
        let changed = self.obj_mut(id)?.registry.latch(now, change_time, true);
        if changed {
            self.scheduler.add_to_interpolation(id);
        }
        Ok(changed)
    }

    /// Overwrite a live value locally without recording a sample.
    pub fn set_value(&mut self, id: ObjectId, attr: &str, value: Value) -> CoreResult<()> {
        let obj = self.obj_mut(id)?;
        obj.registry.set_value(attr, value)?;
        obj.sync_layers();
        obj.transform_dirty = true;
        obj.invalidate_pose();
        Ok(())
    }

    /// Overwrite a layer locally without recording a sample.
    pub fn set_layer(
        &mut self,
        id: ObjectId,
        slot: usize,
        state: cadence_interp_core::LayerState,
    ) -> CoreResult<()> {
        let obj = self.obj_mut(id)?;
        let count = obj.layers.len();
        let layer = obj
            .layers
            .get_mut(slot)
            .ok_or(CoreError::LayerOutOfRange { slot, count })?;
        layer.state = state;
        obj.registry
            .set_value(&layer_var_name(slot), Value::Layer(state))?;
        Ok(())
    }

    pub fn layer(&self, id: ObjectId, slot: usize) -> Option<&AnimationLayer> {
        self.objects.get(&id).and_then(|o| o.layers.get(slot))
    }

    /// Resize the object's layer set, tracking new layers and dropping removed ones.
    pub fn set_layer_count(&mut self, id: ObjectId, count: usize) -> CoreResult<()> {
        let max = self.cfg.max_layers;
        if count > max {
            return Err(CoreError::TooManyLayers {
                requested: count,
                max,
            });
        }
        let obj = self.obj_mut(id)?;
        let change = obj.layers.set_count(count);
        for slot in change.removed {
            obj.registry.remove_var(&layer_var_name(slot))?;
        }
        for slot in change.added {
            obj.registry.add_var(
                &layer_var_name(slot),
                Value::Layer(inactive_state()),
                VarFlags::linear(),
            );
        }
        Ok(())
    }

    // ---------- prediction ----------

    pub fn prediction_query_time(&self, id: ObjectId, frame: &FrameTime) -> CoreResult<f32> {
        let obj = self
            .objects
            .get(&id)
            .ok_or(CoreError::ObjectNotFound { id })?;
        Ok(query_time(&self.cfg, frame, obj.predicted))
    }

    /// Put predicted live values back to the last authoritative samples.
    pub fn restore_to_last_networked(&mut self, id: ObjectId) -> CoreResult<()> {
        let obj = self.obj_mut(id)?;
        obj.registry.restore_to_last_networked();
        obj.sync_layers();
        obj.transform_dirty = true;
        obj.invalidate_pose();
        Ok(())
    }

    // ---------- animation control ----------

    /// Restart every event cursor of the object on the next event pass.
    pub fn request_event_reset(&mut self, id: ObjectId) -> CoreResult<()> {
        self.obj_mut(id)?.reset_events = true;
        Ok(())
    }

    /// Treat the current base sequence as newly started even if its id is unchanged.
    pub fn force_new_sequence(&mut self, id: ObjectId) -> CoreResult<()> {
        let obj = self.obj_mut(id)?;
        obj.force_new_sequence = true;
        obj.base_events.restart(-1);
        obj.invalidate_pose();
        Ok(())
    }

    #[inline]
    pub fn is_interpolating(&self, id: ObjectId) -> bool {
        self.scheduler.is_interpolating(id)
    }

    #[inline]
    pub fn is_resetting(&self, id: ObjectId) -> bool {
        self.scheduler.is_resetting(id)
    }

    // ---------- frame pass ----------

    /// Interpolation scheduling only.
    pub fn interpolate_objects(&mut self, frame: FrameTime) {
        self.frame = frame;
        self.scheduler.run(
            &mut self.objects,
            &self.cfg,
            &frame,
            &mut self.outputs.diagnostics,
        );
    }

    /// Build (or reuse, within one frame) the object's pose.
    pub fn setup_pose(&mut self, id: ObjectId) -> CoreResult<&PoseBuffer> {
        self.build_pose(id)?;
        self.objects
            .get(&id)
            .map(|o| &o.pose)
            .ok_or(CoreError::ObjectNotFound { id })
    }

    pub fn pose(&self, id: ObjectId) -> Option<&PoseBuffer> {
        self.objects.get(&id).map(|o| &o.pose)
    }

    /// Fire the object's due events into the frame outputs; returns how many fired.
    pub fn fire_events(&mut self, id: ObjectId) -> CoreResult<usize> {
        let Self {
            cfg,
            skeletons,
            objects,
            outputs,
            ..
        } = self;
        let skeletons = &*skeletons;
        let obj = objects
            .get_mut(&id)
            .ok_or(CoreError::ObjectNotFound { id })?;
        let skel_id = obj.skeleton.ok_or(CoreError::NoSkeleton { id })?;
        let skeleton = skeletons
            .get(skel_id)
            .ok_or(CoreError::SkeletonNotFound { id: skel_id })?;
        let (origin, angles) = (obj.abs_origin, obj.abs_angles);
        let threshold = cfg.loop_wrap_threshold;

        if std::mem::take(&mut obj.reset_events) {
            obj.base_events.restart(-1);
            for layer in obj.layers.iter_mut() {
                layer.events.restart(-1);
            }
        }

        let mut fired = 0;
        let sequence = obj.sequence();
        if let Some(desc) = skeleton.sequence(sequence) {
            let (cycle, _) = resolve_cycle(obj.cycle(), desc.looping);
            fired += dispatch_events(
                &mut obj.base_events,
                sequence,
                desc,
                cycle,
                threshold,
                id,
                origin,
                angles,
                &mut *outputs,
            );
        }

        let order = obj.layers.presentation_order();
        for slot in order.iter() {
            let Some(layer) = obj.layers.slot_mut(slot) else {
                continue;
            };
            let state = layer.state;
            let Some(desc) = skeleton.sequence(state.sequence) else {
                continue;
            };
            if effective_weight(state.weight).is_none() {
                continue;
            }
            let (cycle, _) = resolve_cycle(state.cycle, desc.looping);
            fired += dispatch_events(
                &mut layer.events,
                state.sequence,
                desc,
                cycle,
                threshold,
                id,
                origin,
                angles,
                &mut *outputs,
            );
        }
        Ok(fired)
    }

    /// Run one full frame: interpolate, set up poses and fire events for every
    /// object with a skeleton.
    pub fn update(&mut self, frame: FrameTime) -> &FrameOutputs {
        self.outputs.clear();
        self.counter.advance();
        self.interpolate_objects(frame);

        let ids: Vec<ObjectId> = self
            .objects
            .values()
            .filter(|o| o.skeleton.is_some())
            .map(|o| o.id)
            .collect();
        for id in ids {
            if let Err(err) = self.build_pose(id) {
                warn!(object = ?id, category = err.category(), %err, "pose setup skipped");
                continue;
            }
            if let Err(err) = self.fire_events(id) {
                warn!(object = ?id, category = err.category(), %err, "event pass skipped");
            }
        }
        &self.outputs
    }

    /// Drop every object and start the frame counter over. Skeletons stay loaded.
    pub fn reset_session(&mut self) {
        self.objects.clear();
        self.scheduler.clear();
        self.counter.reset();
        self.outputs.clear();
        self.frame = FrameTime::default();
    }

    fn build_pose(&mut self, id: ObjectId) -> CoreResult<()> {
        let Self {
            cfg,
            skeletons,
            objects,
            source,
            scratch,
            frame,
            outputs,
            ..
        } = self;
        let skeletons = &*skeletons;

        let (skel_id, attached) = {
            let obj = objects.get(&id).ok_or(CoreError::ObjectNotFound { id })?;
            (obj.skeleton.ok_or(CoreError::NoSkeleton { id })?, obj.attached)
        };
        let skeleton = skeletons
            .get(skel_id)
            .ok_or(CoreError::SkeletonNotFound { id: skel_id })?;
        let target = attached
            .and_then(|a| objects.get(&a))
            .and_then(|o| o.skeleton)
            .and_then(|sid| skeletons.get(sid).map(|s| (sid, s)));

        let obj = objects
            .get_mut(&id)
            .ok_or(CoreError::ObjectNotFound { id })?;
        let frame_no = obj.counter.current();
        let layers_changed = obj.layers.take_dirty();
        if obj.pose_frame == Some(frame_no) && !layers_changed {
            outputs.diagnostics.cached_poses += 1;
            return Ok(());
        }

        let now = frame.now;
        let ctx = PoseContext { now, object: id };
        let diag = &mut outputs.diagnostics;
        obj.pose.reset_to_bind(skeleton);

        // Base sequence at full weight.
        let sequence = obj.sequence();
        let base = skeleton.sequence(sequence).map(|desc| {
            let (cycle, non_finite) = resolve_cycle(obj.cycle(), desc.looping);
            if non_finite {
                diag.non_finite_cycles += 1;
                warn!(object = ?id, sequence, "non-finite base cycle; using 0");
            }
            cycle
        });
        if cfg.maintain_sequence_transitions {
            let force = std::mem::take(&mut obj.force_new_sequence);
            let rate = obj.playback_rate();
            obj.transitioner.check_for_sequence_change(
                skeleton,
                sequence,
                force,
                cfg.interpolation_enabled,
                now,
            );
            obj.transitioner
                .update_current(sequence, base.unwrap_or(0.0), rate, now);
            obj.transitioner.update_fades(now);
        } else {
            obj.force_new_sequence = false;
        }

        let mut direct = DirectSink { skeleton };
        if let Some(cycle) = base {
            direct.accumulate(&mut **source, &mut obj.pose, sequence, cycle, 1.0, &ctx);
        }
        if cfg.maintain_sequence_transitions {
            for fading in obj.transitioner.fading(skeleton, now) {
                direct.accumulate(
                    &mut **source,
                    &mut obj.pose,
                    fading.sequence,
                    fading.cycle,
                    fading.weight,
                    &ctx,
                );
            }
        }

        // Overlay layers, optionally dispatched to the attached skeleton.
        let dispatch = match target {
            Some((tid, tskel)) => {
                let fresh = matches!(&obj.merge_cache, Some((p, t, _)) if *p == skel_id && *t == tid);
                if !fresh {
                    obj.merge_cache = Some((skel_id, tid, BoneMergeMap::between(skeleton, tskel)));
                }
                obj.merge_cache.as_ref().map(|(_, _, map)| DispatchTarget {
                    id: tid,
                    skeleton: tskel,
                    merge: map,
                })
            }
            None => None,
        };
        accumulate_layers(
            &mut obj.layers,
            skeleton,
            dispatch.as_ref(),
            &mut **source,
            &mut obj.pose,
            scratch,
            &ctx,
            diag,
        );

        obj.pose_frame = Some(frame_no);
        Ok(())
    }
}
