//! Page replacement policies for the buffer pool.

use crate::frame::FrameId;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Trait for page replacement algorithms.
pub trait Replacer: Send + Sync {
    /// Records that the given frame was accessed.
    fn record_access(&self, frame_id: FrameId);

    /// Selects a victim frame for eviction.
    ///
    /// `is_evictable` is checked against each candidate; the pool passes a
    /// pin-count check here so pinned frames are never chosen.
    /// Returns None if no frame qualifies.
    fn evict(&self, is_evictable: &dyn Fn(FrameId) -> bool) -> Option<FrameId>;

    /// Removes a frame from consideration (freed back to the pool).
    fn remove(&self, frame_id: FrameId);
}

/// Clock (second-chance) replacement.
///
/// Reference bits are atomic so access recording never takes a lock;
/// only the clock hand is mutex-guarded.
pub struct ClockReplacer {
    /// Number of frames covered.
    num_frames: usize,
    /// Reference bit per frame.
    reference_bits: Vec<AtomicBool>,
    /// Current clock hand position.
    clock_hand: Mutex<usize>,
}

impl ClockReplacer {
    /// Creates a new clock replacer over `num_frames` frames.
    pub fn new(num_frames: usize) -> Self {
        Self {
            num_frames,
            reference_bits: (0..num_frames).map(|_| AtomicBool::new(false)).collect(),
            clock_hand: Mutex::new(0),
        }
    }
}

impl Replacer for ClockReplacer {
    #[inline]
    fn record_access(&self, frame_id: FrameId) {
        let idx = frame_id.0 as usize;
        if idx < self.num_frames {
            self.reference_bits[idx].store(true, Ordering::Relaxed);
        }
    }

    fn evict(&self, is_evictable: &dyn Fn(FrameId) -> bool) -> Option<FrameId> {
        let mut hand = self.clock_hand.lock();

        // Two full rotations: the first clears reference bits, the second
        // takes the first candidate whose bit is already clear.
        for _ in 0..self.num_frames * 2 {
            let idx = *hand;
            *hand = (*hand + 1) % self.num_frames;

            let frame_id = FrameId(idx as u32);
            if !is_evictable(frame_id) {
                continue;
            }

            if self.reference_bits[idx].swap(false, Ordering::Relaxed) {
                continue;
            }

            return Some(frame_id);
        }

        None
    }

    #[inline]
    fn remove(&self, frame_id: FrameId) {
        let idx = frame_id.0 as usize;
        if idx < self.num_frames {
            self.reference_bits[idx].store(false, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_evicts_unreferenced_frame() {
        let replacer = ClockReplacer::new(4);

        replacer.record_access(FrameId(0));
        replacer.record_access(FrameId(1));

        // Frames 2 and 3 were never accessed; one of them goes first.
        let victim = replacer.evict(&|_| true).unwrap();
        assert!(victim == FrameId(2) || victim == FrameId(3));
    }

    #[test]
    fn test_clock_second_chance() {
        let replacer = ClockReplacer::new(2);

        replacer.record_access(FrameId(0));
        replacer.record_access(FrameId(1));

        // All bits set: the first rotation clears them, the second evicts.
        assert!(replacer.evict(&|_| true).is_some());
    }

    #[test]
    fn test_clock_respects_evictable_predicate() {
        let replacer = ClockReplacer::new(3);

        let victim = replacer.evict(&|fid| fid == FrameId(1));
        assert_eq!(victim, Some(FrameId(1)));
    }

    #[test]
    fn test_clock_no_candidates() {
        let replacer = ClockReplacer::new(3);
        assert_eq!(replacer.evict(&|_| false), None);
    }

    #[test]
    fn test_clock_remove_clears_bit() {
        let replacer = ClockReplacer::new(2);

        replacer.record_access(FrameId(0));
        replacer.remove(FrameId(0));

        // Bit cleared, so frame 0 is immediately evictable.
        let victim = replacer.evict(&|fid| fid == FrameId(0));
        assert_eq!(victim, Some(FrameId(0)));
    }

    #[test]
    fn test_clock_out_of_range_access_ignored() {
        let replacer = ClockReplacer::new(2);
        replacer.record_access(FrameId(99));
        replacer.remove(FrameId(99));
    }
}
