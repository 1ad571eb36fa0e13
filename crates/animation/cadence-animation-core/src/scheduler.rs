//! Per-frame object interpolation scheduling.
//!
//! Every object is in at most one of two sets:
//! - **interpolate**: has samples that still change its live values;
//! - **reset**: teleported on the last processed frame.
//!
//! Each frame all objects are visited parent-before-child. Teleports snap and move
//! the object to the reset set; an object leaving the reset set re-enters the
//! interpolate set; interpolating objects leave it once all their variables settle.
//! Absolute transforms are recomputed for every object that moved or whose parent
//! moved this frame.

use hashbrown::{HashMap, HashSet};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, warn};

use crate::config::Config;
use crate::ids::ObjectId;
use crate::object::AnimatedObject;
use crate::outputs::FrameDiagnostics;

/// Clock values for one pass; read-only while the pass runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameTime {
    pub now: f32,
    /// Fraction of a tick the renderer is past the last simulated tick.
    #[serde(default)]
    pub interpolation_fraction: f32,
    /// Simulation time of the newest locally predicted tick.
    #[serde(default)]
    pub final_predicted_time: f32,
}

impl FrameTime {
    pub fn at(now: f32) -> Self {
        Self {
            now,
            interpolation_fraction: 0.0,
            final_predicted_time: now,
        }
    }
}

/// Time at which an object's histories are sampled this frame.
pub fn query_time(cfg: &Config, frame: &FrameTime, predicted: bool) -> f32 {
    if predicted {
        let tick = cfg.tick_interval;
        frame.final_predicted_time - tick + frame.interpolation_fraction * tick
    } else {
        frame.now - cfg.interpolation_amount(false)
    }
}

/// Order objects so every parent precedes its children. Links to unknown objects
/// count as no parent; objects caught in a parent cycle are appended last.
pub fn hierarchy_order<I>(links: I) -> (Vec<ObjectId>, usize)
where
    I: IntoIterator<Item = (ObjectId, Option<ObjectId>)>,
{
    let links: Vec<(ObjectId, Option<ObjectId>)> = links.into_iter().collect();
    let known: HashSet<ObjectId> = links.iter().map(|(id, _)| *id).collect();

    let mut children: HashMap<ObjectId, Vec<ObjectId>> = HashMap::new();
    let mut queue: VecDeque<ObjectId> = VecDeque::new();
    for &(id, parent) in &links {
        match parent.filter(|p| known.contains(p) && *p != id) {
            Some(p) => children.entry(p).or_default().push(id),
            None => queue.push_back(id),
        }
    }

    let mut order = Vec::with_capacity(links.len());
    let mut placed: HashSet<ObjectId> = HashSet::with_capacity(links.len());
    while let Some(id) = queue.pop_front() {
        if !placed.insert(id) {
            continue;
        }
        order.push(id);
        if let Some(kids) = children.get(&id) {
            queue.extend(kids.iter().copied());
        }
    }

    let mut cyclic = 0;
    for &(id, _) in &links {
        if placed.insert(id) {
            order.push(id);
            cyclic += 1;
        }
    }
    (order, cyclic)
}

#[derive(Clone, Debug, Default)]
pub struct InterpolationScheduler {
    interpolate: IndexSet<ObjectId>,
    reset: IndexSet<ObjectId>,
}

impl InterpolationScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an object for interpolation (new samples arrived).
    /// Objects in the reset set stay there until their teleport is processed.
    pub fn add_to_interpolation(&mut self, id: ObjectId) {
        if !self.reset.contains(&id) {
            self.interpolate.insert(id);
        }
    }

    pub fn remove(&mut self, id: ObjectId) {
        self.interpolate.shift_remove(&id);
        self.reset.shift_remove(&id);
    }

    #[inline]
    pub fn is_interpolating(&self, id: ObjectId) -> bool {
        self.interpolate.contains(&id)
    }

    #[inline]
    pub fn is_resetting(&self, id: ObjectId) -> bool {
        self.reset.contains(&id)
    }

    pub fn interpolating(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.interpolate.iter().copied()
    }

    pub fn clear(&mut self) {
        self.interpolate.clear();
        self.reset.clear();
    }

    fn move_to_reset(&mut self, id: ObjectId) {
        self.interpolate.shift_remove(&id);
        self.reset.insert(id);
    }

    fn leave_reset(&mut self, id: ObjectId) {
        if self.reset.shift_remove(&id) {
            self.interpolate.insert(id);
        }
    }

    /// Run one interpolation pass over `objects`.
    pub fn run(
        &mut self,
        objects: &mut IndexMap<ObjectId, AnimatedObject>,
        cfg: &Config,
        frame: &FrameTime,
        diag: &mut FrameDiagnostics,
    ) {
        let (order, cyclic) =
            hierarchy_order(objects.values().map(|o| (o.id, o.parent.map(|p| p.object))));
        if cyclic > 0 {
            warn!(count = cyclic, "parent cycle; objects processed as roots");
            diag.hierarchy_cycles += cyclic as u32;
        }

        let mut moved: HashSet<ObjectId> = HashSet::new();
        for id in order {
            let parent_link = objects.get(&id).and_then(|o| o.parent);
            let parent = match parent_link {
                Some(link) => match objects.get(&link.object) {
                    Some(p) => Some((link.object, p.abs_origin, p.abs_angles)),
                    None => {
                        debug!(object = ?id, parent = ?link.object, "missing parent; treated as root");
                        diag.missing_parents += 1;
                        None
                    }
                },
                None => None,
            };

            let Some(obj) = objects.get_mut(&id) else {
                continue;
            };

            if obj.teleported() {
                debug!(object = ?id, "teleport; snapping to latest samples");
                obj.snap_to_latest();
                obj.acknowledge_teleport();
                self.move_to_reset(id);
                diag.teleports += 1;
            } else {
                self.leave_reset(id);
                if self.interpolate.contains(&id) {
                    if !cfg.interpolation_enabled {
                        obj.snap_to_latest();
                        self.interpolate.shift_remove(&id);
                    } else if obj.interpolate(query_time(cfg, frame, obj.predicted)) {
                        debug!(object = ?id, "interpolation settled");
                        self.interpolate.shift_remove(&id);
                        diag.retired += 1;
                    }
                }
            }

            let parent_moved = parent.map_or(false, |(pid, _, _)| moved.contains(&pid));
            if obj.transform_dirty || parent_moved {
                let (origin, angles) = (obj.origin(), obj.angles());
                let (abs_origin, abs_angles) = match parent {
                    Some((_, po, pa)) => (add3(po, origin), add3(pa, angles)),
                    None => (origin, angles),
                };
                obj.abs_origin = abs_origin;
                obj.abs_angles = abs_angles;
                obj.transform_dirty = false;
                moved.insert(id);
            }
        }
    }
}

#[inline]
fn add3(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parents_come_first() {
        let links = [
            (ObjectId(3), Some(ObjectId(2))),
            (ObjectId(2), Some(ObjectId(1))),
            (ObjectId(1), None),
            (ObjectId(4), Some(ObjectId(99))),
        ];
        let (order, cyclic) = hierarchy_order(links);
        assert_eq!(cyclic, 0);
        let pos = |id: u32| order.iter().position(|o| *o == ObjectId(id)).unwrap();
        assert!(pos(1) < pos(2) && pos(2) < pos(3));
        assert_eq!(order.len(), 4);
    }

    #[test]
    fn cycles_are_appended() {
        let links = [
            (ObjectId(1), Some(ObjectId(2))),
            (ObjectId(2), Some(ObjectId(1))),
            (ObjectId(3), None),
        ];
        let (order, cyclic) = hierarchy_order(links);
        assert_eq!(cyclic, 2);
        assert_eq!(order[0], ObjectId(3));
        assert_eq!(order.len(), 3);
    }

    #[test]
    fn predicted_query_time_uses_simulation_clock() {
        let cfg = Config::default();
        let frame = FrameTime {
            now: 10.0,
            interpolation_fraction: 0.5,
            final_predicted_time: 2.0,
        };
        let tick = cfg.tick_interval;
        assert!((query_time(&cfg, &frame, true) - (2.0 - 0.5 * tick)).abs() < 1e-6);
        assert!((query_time(&cfg, &frame, false) - (10.0 - 3.0 * tick)).abs() < 1e-5);
    }

    #[test]
    fn reset_membership_is_exclusive() {
        let mut s = InterpolationScheduler::new();
        s.add_to_interpolation(ObjectId(1));
        s.move_to_reset(ObjectId(1));
        assert!(s.is_resetting(ObjectId(1)) && !s.is_interpolating(ObjectId(1)));
        s.add_to_interpolation(ObjectId(1));
        assert!(!s.is_interpolating(ObjectId(1)));
        s.leave_reset(ObjectId(1));
        assert!(s.is_interpolating(ObjectId(1)) && !s.is_resetting(ObjectId(1)));
    }
}
