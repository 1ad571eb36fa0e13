//! Skeleton and sequence definitions (read-only to the core once loaded).

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::pose::{BoneTransform, PoseBuffer};

fn default_true() -> bool {
    true
}

fn default_one() -> f32 {
    1.0
}

fn default_fade() -> f32 {
    0.2
}

/// Discrete event authored on a sequence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnimEvent {
    /// Cycle in [0, 1] at which the event becomes due.
    pub cycle: f32,
    pub event: i32,
    #[serde(default)]
    pub options: String,
    /// Server-only events are never fired by this core.
    #[serde(default = "default_true")]
    pub client: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SequenceDesc {
    pub name: String,
    #[serde(default)]
    pub looping: bool,
    /// Cycles per second at playback rate 1.
    #[serde(default = "default_one")]
    pub cycle_rate: f32,
    #[serde(default = "default_fade")]
    pub fade_in: f32,
    #[serde(default = "default_fade")]
    pub fade_out: f32,
    /// Cut to this sequence instead of cross-fading.
    #[serde(default)]
    pub snap: bool,
    #[serde(default)]
    pub events: Vec<AnimEvent>,
    /// Evenly spaced keyframes, one transform per bone.
    #[serde(default)]
    pub frames: Vec<Vec<BoneTransform>>,
}

impl SequenceDesc {
    /// Defaults with the given name; handy with struct update syntax.
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            looping: false,
            cycle_rate: 1.0,
            fade_in: default_fade(),
            fade_out: default_fade(),
            snap: false,
            events: Vec::new(),
            frames: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoneDesc {
    pub name: String,
    #[serde(default)]
    pub bind: BoneTransform,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Skeleton {
    pub name: String,
    pub bones: Vec<BoneDesc>,
    #[serde(default)]
    pub sequences: Vec<SequenceDesc>,
}

impl Skeleton {
    #[inline]
    pub fn num_sequences(&self) -> i32 {
        self.sequences.len() as i32
    }

    #[inline]
    pub fn has_sequence(&self, sequence: i32) -> bool {
        sequence >= 0 && sequence < self.num_sequences()
    }

    pub fn sequence(&self, sequence: i32) -> Option<&SequenceDesc> {
        usize::try_from(sequence)
            .ok()
            .and_then(|i| self.sequences.get(i))
    }

    pub fn find_sequence(&self, name: &str) -> Option<i32> {
        self.sequences
            .iter()
            .position(|s| s.name == name)
            .map(|i| i as i32)
    }

    pub fn bone_index(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|b| b.name == name)
    }

    pub fn bind_pose(&self) -> PoseBuffer {
        let mut pose = PoseBuffer::default();
        pose.reset_to_bind(self);
        pose
    }

    /// Check invariants the core relies on and sort each sequence's events by cycle.
    pub fn prepare(&mut self) -> CoreResult<()> {
        let bone_count = self.bones.len();
        for seq in &mut self.sequences {
            if let Some(frame) = seq.frames.iter().find(|f| f.len() != bone_count) {
                return Err(CoreError::InvalidSkeleton {
                    reason: format!(
                        "sequence '{}' has a frame with {} bones, skeleton has {}",
                        seq.name,
                        frame.len(),
                        bone_count
                    ),
                });
            }
            if let Some(ev) = seq
                .events
                .iter()
                .find(|e| !(e.cycle >= 0.0 && e.cycle <= 1.0))
            {
                return Err(CoreError::InvalidSkeleton {
                    reason: format!(
                        "sequence '{}' has event {} at cycle {} outside [0, 1]",
                        seq.name, ev.event, ev.cycle
                    ),
                });
            }
            if !(seq.cycle_rate >= 0.0) {
                return Err(CoreError::InvalidSkeleton {
                    reason: format!("sequence '{}' has a negative cycle rate", seq.name),
                });
            }
            seq.events.sort_by(|a, b| a.cycle.total_cmp(&b.cycle));
        }
        Ok(())
    }
}

/// Parse a skeleton definition from JSON and validate it.
pub fn parse_skeleton_json(s: &str) -> CoreResult<Skeleton> {
    let mut skeleton: Skeleton = serde_json::from_str(s)?;
    skeleton.prepare()?;
    Ok(skeleton)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_applies_defaults_and_sorts_events() {
        let json = r#"{
            "name": "walker",
            "bones": [{ "name": "root" }],
            "sequences": [{
                "name": "walk",
                "looping": true,
                "events": [
                    { "cycle": 0.9, "event": 3 },
                    { "cycle": 0.1, "event": 1, "client": false }
                ]
            }]
        }"#;
        let skel = parse_skeleton_json(json).unwrap();
        let walk = skel.sequence(0).unwrap();
        assert_eq!(walk.fade_out, 0.2);
        assert_eq!(walk.cycle_rate, 1.0);
        assert_eq!(walk.events[0].event, 1);
        assert!(!walk.events[0].client);
        assert!(walk.events[1].client);
        assert_eq!(skel.find_sequence("walk"), Some(0));
        assert!(skel.sequence(-1).is_none());
    }

    #[test]
    fn frame_bone_mismatch_is_rejected() {
        let json = r#"{
            "name": "broken",
            "bones": [{ "name": "root" }, { "name": "tip" }],
            "sequences": [{ "name": "idle", "frames": [[{ "pos": [0, 0, 0] }]] }]
        }"#;
        assert!(matches!(
            parse_skeleton_json(json),
            Err(CoreError::InvalidSkeleton { .. })
        ));
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(parse_skeleton_json("{ nope").is_err());
    }
}
