//! Identifiers and simple allocators for core entities.

use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ObjectId(pub u32);

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct SkeletonId(pub u32);

/// Monotonic allocator for ObjectId and SkeletonId. IDs are never reused within a session.
#[derive(Default, Debug)]
pub struct IdAllocator {
    next_object: u32,
    next_skeleton: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn alloc_object(&mut self) -> ObjectId {
        let id = ObjectId(self.next_object);
        self.next_object = self.next_object.wrapping_add(1);
        id
    }

    #[inline]
    pub fn alloc_skeleton(&mut self) -> SkeletonId {
        let id = SkeletonId(self.next_skeleton);
        self.next_skeleton = self.next_skeleton.wrapping_add(1);
        id
    }

    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_monotonic() {
        let mut alloc = IdAllocator::new();
        assert_eq!(alloc.alloc_object(), ObjectId(0));
        assert_eq!(alloc.alloc_object(), ObjectId(1));
        assert_eq!(alloc.alloc_skeleton(), SkeletonId(0));
        alloc.reset();
        assert_eq!(alloc.alloc_object(), ObjectId(0));
    }
}
