//! Pose buffers and the pose-source capability the accumulator drives.

use cadence_interp_core::functions::{lerp_vec3, nlerp_quat};
use serde::{Deserialize, Serialize};

use crate::ids::ObjectId;
use crate::skeleton::Skeleton;

/// Local transform of one bone.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoneTransform {
    #[serde(default)]
    pub pos: [f32; 3],
    /// Quaternion (x, y, z, w)
    #[serde(default = "identity_rot")]
    pub rot: [f32; 4],
}

fn identity_rot() -> [f32; 4] {
    [0.0, 0.0, 0.0, 1.0]
}

impl Default for BoneTransform {
    fn default() -> Self {
        Self {
            pos: [0.0; 3],
            rot: identity_rot(),
        }
    }
}

impl BoneTransform {
    /// Weighted blend toward `other`; `weight` 1 replaces.
    #[inline]
    pub fn blend(&self, other: &BoneTransform, weight: f32) -> BoneTransform {
        BoneTransform {
            pos: lerp_vec3(self.pos, other.pos, weight),
            rot: nlerp_quat(self.rot, other.rot, weight),
        }
    }
}

/// Per-bone working pose for one skeleton.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PoseBuffer {
    bones: Vec<BoneTransform>,
}

impl PoseBuffer {
    pub fn new(bone_count: usize) -> Self {
        Self {
            bones: vec![BoneTransform::default(); bone_count],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bones.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    #[inline]
    pub fn get(&self, bone: usize) -> Option<&BoneTransform> {
        self.bones.get(bone)
    }

    #[inline]
    pub fn get_mut(&mut self, bone: usize) -> Option<&mut BoneTransform> {
        self.bones.get_mut(bone)
    }

    #[inline]
    pub fn as_slice(&self) -> &[BoneTransform] {
        &self.bones
    }

    /// Overwrite with the skeleton's bind pose, resizing as needed.
    pub fn reset_to_bind(&mut self, skeleton: &Skeleton) {
        self.bones.clear();
        self.bones.extend(skeleton.bones.iter().map(|b| b.bind));
    }
}

/// Per-call context handed to the pose source.
#[derive(Clone, Copy, Debug)]
pub struct PoseContext {
    pub now: f32,
    pub object: ObjectId,
}

/// External bone-solving layer: blends one sequence at one cycle into `pose`.
pub trait PoseSource {
    fn accumulate_pose(
        &mut self,
        pose: &mut PoseBuffer,
        skeleton: &Skeleton,
        sequence: i32,
        cycle: f32,
        weight: f32,
        ctx: &PoseContext,
    );
}

/// Samples the keyframes stored on the skeleton's sequences.
///
/// Frames are spread evenly over the cycle. Looping sequences blend the last frame
/// back into the first; bones a frame does not cover keep their current pose.
#[derive(Clone, Copy, Debug, Default)]
pub struct SampledPoseSource;

impl PoseSource for SampledPoseSource {
    fn accumulate_pose(
        &mut self,
        pose: &mut PoseBuffer,
        skeleton: &Skeleton,
        sequence: i32,
        cycle: f32,
        weight: f32,
        _ctx: &PoseContext,
    ) {
        let Some(desc) = skeleton.sequence(sequence) else {
            return;
        };
        let frames = &desc.frames;
        if frames.is_empty() {
            return;
        }

        let n = frames.len();
        let (a, b, t) = if n == 1 {
            (0, 0, 0.0)
        } else {
            let span = if desc.looping { n } else { n - 1 };
            let pos = cycle.clamp(0.0, 1.0) * span as f32;
            let a = (pos.floor() as usize).min(span.saturating_sub(1)).min(n - 1);
            let b = if a + 1 < n { a + 1 } else { 0 };
            (a, b, pos - a as f32)
        };

        for (bone, current) in pose.bones.iter_mut().enumerate() {
            let (Some(fa), Some(fb)) = (frames[a].get(bone), frames[b].get(bone)) else {
                continue;
            };
            let sampled = fa.blend(fb, t);
            *current = current.blend(&sampled, weight);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::{BoneDesc, SequenceDesc};

    fn skeleton() -> Skeleton {
        let frame = |x: f32| {
            vec![BoneTransform {
                pos: [x, 0.0, 0.0],
                rot: identity_rot(),
            }]
        };
        Skeleton {
            name: "probe".into(),
            bones: vec![BoneDesc {
                name: "root".into(),
                bind: BoneTransform::default(),
            }],
            sequences: vec![SequenceDesc {
                frames: vec![frame(0.0), frame(2.0)],
                ..SequenceDesc::named("slide")
            }],
        }
    }

    fn ctx() -> PoseContext {
        PoseContext {
            now: 0.0,
            object: ObjectId(0),
        }
    }

    #[test]
    fn samples_between_frames() {
        let skel = skeleton();
        let mut pose = PoseBuffer::default();
        pose.reset_to_bind(&skel);
        SampledPoseSource.accumulate_pose(&mut pose, &skel, 0, 0.5, 1.0, &ctx());
        assert!((pose.get(0).unwrap().pos[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn weight_blends_with_existing_pose() {
        let skel = skeleton();
        let mut pose = PoseBuffer::default();
        pose.reset_to_bind(&skel);
        SampledPoseSource.accumulate_pose(&mut pose, &skel, 0, 1.0, 0.5, &ctx());
        assert!((pose.get(0).unwrap().pos[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn unknown_sequence_leaves_pose() {
        let skel = skeleton();
        let mut pose = PoseBuffer::default();
        pose.reset_to_bind(&skel);
        SampledPoseSource.accumulate_pose(&mut pose, &skel, 7, 0.5, 1.0, &ctx());
        assert_eq!(pose.get(0), Some(&BoneTransform::default()));
    }
}
