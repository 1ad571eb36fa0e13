//! Frame counter shared by every object of one session.
//!
//! Objects hold a clone and compare it against the frame their pose was last
//! built in; a second setup request within the same frame reuses that pose.

use std::cell::Cell;
use std::rc::Rc;

#[derive(Clone, Debug, Default)]
pub struct FrameCounter(Rc<Cell<u64>>);

impl FrameCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new frame and return its number.
    #[inline]
    pub fn advance(&self) -> u64 {
        let next = self.0.get().wrapping_add(1);
        self.0.set(next);
        next
    }

    #[inline]
    pub fn current(&self) -> u64 {
        self.0.get()
    }

    /// Back to zero on session teardown.
    pub fn reset(&self) {
        self.0.set(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_count() {
        let a = FrameCounter::new();
        let b = a.clone();
        assert_eq!(a.advance(), 1);
        assert_eq!(b.current(), 1);
        b.reset();
        assert_eq!(a.current(), 0);
    }
}
