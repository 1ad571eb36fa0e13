//! Bone-merge mapping between a primary skeleton and an attached one.

use crate::pose::PoseBuffer;
use crate::skeleton::Skeleton;

/// Copies shared bones between a primary pose and an attached skeleton's pose.
/// Both calls only touch the buffers passed in.
pub trait BoneMerge {
    fn copy_to_attached(&self, primary: &PoseBuffer, attached: &mut PoseBuffer);
    fn copy_from_attached(&self, attached: &PoseBuffer, primary: &mut PoseBuffer);
}

/// Bones matched by name: `(primary index, attached index)` pairs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BoneMergeMap {
    pairs: Vec<(usize, usize)>,
}

impl BoneMergeMap {
    pub fn between(primary: &Skeleton, attached: &Skeleton) -> Self {
        let pairs = attached
            .bones
            .iter()
            .enumerate()
            .filter_map(|(ai, bone)| primary.bone_index(&bone.name).map(|pi| (pi, ai)))
            .collect();
        Self { pairs }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl BoneMerge for BoneMergeMap {
    fn copy_to_attached(&self, primary: &PoseBuffer, attached: &mut PoseBuffer) {
        for &(pi, ai) in &self.pairs {
            if let (Some(src), Some(dst)) = (primary.get(pi), attached.get_mut(ai)) {
                *dst = *src;
            }
        }
    }

    fn copy_from_attached(&self, attached: &PoseBuffer, primary: &mut PoseBuffer) {
        for &(pi, ai) in &self.pairs {
            if let (Some(src), Some(dst)) = (attached.get(ai), primary.get_mut(pi)) {
                *dst = *src;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::BoneTransform;
    use crate::skeleton::BoneDesc;

    fn skel(names: &[&str]) -> Skeleton {
        Skeleton {
            name: "s".into(),
            bones: names
                .iter()
                .map(|n| BoneDesc {
                    name: n.to_string(),
                    bind: BoneTransform::default(),
                })
                .collect(),
            sequences: Vec::new(),
        }
    }

    #[test]
    fn maps_shared_bones_both_ways() {
        let primary = skel(&["root", "hand", "head"]);
        let attached = skel(&["grip", "hand"]);
        let map = BoneMergeMap::between(&primary, &attached);
        assert_eq!(map.len(), 1);

        let mut p = primary.bind_pose();
        p.get_mut(1).unwrap().pos = [1.0, 2.0, 3.0];
        let mut a = attached.bind_pose();
        map.copy_to_attached(&p, &mut a);
        assert_eq!(a.get(1).unwrap().pos, [1.0, 2.0, 3.0]);
        assert_eq!(a.get(0).unwrap().pos, [0.0; 3]);

        a.get_mut(1).unwrap().pos = [5.0, 0.0, 0.0];
        map.copy_from_attached(&a, &mut p);
        assert_eq!(p.get(1).unwrap().pos, [5.0, 0.0, 0.0]);
    }
}
