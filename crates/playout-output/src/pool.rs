//! Buffer pool recycling frame memory between producer and device.
//!
//! Frames released by the completion path come back here instead of being
//! freed, so steady-state playout allocates nothing. The pool is a plain
//! mutex-guarded free list; buffers that no longer match the current
//! geometry are discarded on the way out, which keeps the list
//! self-cleaning after a reconfiguration.

use parking_lot::Mutex;
use playout_core::{Frame, FrameDesc, HdrMetadata};
use std::mem;
use std::sync::{Arc, Weak};
use tracing::trace;

#[derive(Default)]
struct PoolShared {
    free: Mutex<Vec<Frame>>,
}

impl PoolShared {
    fn recycle(&self, frame: Frame) {
        self.free.lock().push(frame);
    }
}

/// Thread-safe free list of reusable frames.
#[derive(Clone, Default)]
pub struct FramePool {
    shared: Arc<PoolShared>,
}

impl FramePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a frame matching `desc`, recycled when possible.
    ///
    /// Mismatched buffers encountered during the scan are dropped for
    /// real, freeing their memory. Fresh allocations come back zeroed;
    /// recycled buffers keep their previous pixel content.
    pub fn acquire(&self, desc: &FrameDesc, stereo: bool, hdr: Option<HdrMetadata>) -> FrameHandle {
        let mut frame = None;
        {
            let mut free = self.shared.free.lock();
            while let Some(candidate) = free.pop() {
                if candidate.matches(desc, stereo) {
                    frame = Some(candidate);
                    break;
                }
                trace!(
                    desc = ?candidate.desc(),
                    "discarding stale pool buffer"
                );
            }
        }
        let mut frame = frame.unwrap_or_else(|| Frame::new(*desc, stereo, None));
        frame.timestamp = None;
        frame.timecode = None;
        frame.hdr = hdr;
        FrameHandle {
            slot: FrameSlot {
                frame,
                pool: Arc::downgrade(&self.shared),
            },
        }
    }

    /// Number of frames currently parked in the pool.
    pub fn len(&self) -> usize {
        self.shared.free.lock().len()
    }

    /// Whether the pool holds no recycled frames.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A frame plus the route back to its pool.
///
/// When the last owner drops the slot the frame returns to the pool; if
/// the pool itself is gone the memory is simply freed.
struct FrameSlot {
    frame: Frame,
    pool: Weak<PoolShared>,
}

impl Drop for FrameSlot {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.upgrade() {
            pool.recycle(mem::replace(&mut self.frame, Frame::empty()));
        }
    }
}

/// Uniquely owned frame handed to the producer for writing.
///
/// Exclusive ownership is what makes mutation safe: once the frame is
/// converted for scheduled submission it becomes shared and read-only.
pub struct FrameHandle {
    slot: FrameSlot,
}

impl FrameHandle {
    /// The frame, read-only.
    #[inline]
    pub fn frame(&self) -> &Frame {
        &self.slot.frame
    }

    /// The frame, for producer writes.
    #[inline]
    pub fn frame_mut(&mut self) -> &mut Frame {
        &mut self.slot.frame
    }

    /// Freeze the frame for scheduled submission.
    pub fn into_scheduled(self) -> ScheduledFrame {
        ScheduledFrame(Arc::new(self.slot))
    }
}

/// Shared, immutable reference to a frame in the scheduled pipeline.
///
/// Clones are the reference count: the queue, the device and the
/// "last scheduled" fallback each hold one. The buffer returns to the
/// pool when the last clone drops.
#[derive(Clone)]
pub struct ScheduledFrame(Arc<FrameSlot>);

impl ScheduledFrame {
    #[inline]
    pub fn frame(&self) -> &Frame {
        &self.0.frame
    }

    /// Current strong reference count, for diagnostics and tests.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}
