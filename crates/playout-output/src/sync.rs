//! Audio/video sync engine.
//!
//! Video frames are scheduled ahead of real time while audio is written
//! at presentation time, so audio timestamps must be translated into the
//! device clock domain of the video timeline. The scheduler publishes an
//! epoch offset into a shared [`SyncCell`] whenever sync is (re)acquired;
//! the audio path adopts that epoch exactly once per resynchronization
//! and converts block timestamps from the 90 kHz reference clock to the
//! device sample clock.

use parking_lot::Mutex;
use playout_core::{REFERENCE_CLOCK_HZ, TIMESTAMP_WRAP};
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::debug;

/// Sentinel: no epoch has ever been established (audio stays silent).
pub const SYNC_DEINIT: i64 = i64::MIN;
/// Sentinel: the previous epoch was invalidated; adopt the next one.
pub const SYNC_RESYNC: i64 = i64::MIN + 1;

/// Shared epoch cell, written by the scheduler thread and read by the
/// audio thread.
#[derive(Debug)]
pub struct SyncCell(AtomicI64);

impl Default for SyncCell {
    fn default() -> Self {
        Self(AtomicI64::new(SYNC_DEINIT))
    }
}

impl SyncCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard the current epoch; the next scheduled frame with a valid
    /// timestamp establishes a new one.
    pub fn flag_resync(&self) {
        self.0.store(SYNC_RESYNC, Ordering::Release);
    }

    /// Return to the uninitialized state (reconfiguration).
    pub fn reset(&self) {
        self.0.store(SYNC_DEINIT, Ordering::Release);
    }

    /// Whether the scheduler should capture a fresh epoch.
    pub fn needs_epoch(&self) -> bool {
        self.load() <= SYNC_RESYNC
    }

    pub fn set_epoch(&self, offset: i64) {
        self.0.store(offset, Ordering::Release);
    }

    pub fn load(&self) -> i64 {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone, Copy)]
struct AudioVals {
    saved_sync_ts: i64,
    last_sync_ts: i64,
}

impl Default for AudioVals {
    fn default() -> Self {
        Self {
            saved_sync_ts: SYNC_DEINIT,
            last_sync_ts: SYNC_DEINIT,
        }
    }
}

/// Translates audio block timestamps into device stream time.
#[derive(Default)]
pub struct AudioSync {
    vals: Mutex<AudioVals>,
}

impl AudioSync {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the adopted epoch (used when the cell is reset, so a
    /// re-published identical offset is re-adopted).
    pub fn reset(&self) {
        *self.vals.lock() = AudioVals::default();
    }

    /// Convert a block timestamp (90 kHz, 32-bit) to stream time in
    /// sample units at `sample_rate`.
    ///
    /// Returns `None` until a video epoch exists. The epoch is adopted
    /// once per resynchronization event, not per block; timestamps that
    /// jumped backwards by more than half the 32-bit range are treated
    /// as a clock wrap.
    pub fn stream_time(&self, cell: &SyncCell, timestamp: u32, sample_rate: u32) -> Option<i64> {
        let sync_ts = cell.load();
        let mut vals = self.vals.lock();

        if vals.saved_sync_ts == SYNC_DEINIT && sync_ts <= SYNC_RESYNC {
            return None;
        }
        if sync_ts > SYNC_RESYNC && vals.saved_sync_ts != sync_ts {
            *vals = AudioVals::default();
            vals.saved_sync_ts = sync_ts;
            vals.last_sync_ts = sync_ts;
            debug!(epoch = sync_ts, "adopted audio sync epoch");
        }

        if vals.last_sync_ts - i64::from(timestamp) > TIMESTAMP_WRAP / 2 {
            vals.last_sync_ts -= TIMESTAMP_WRAP;
        }
        let stream_time =
            (i64::from(timestamp) - vals.last_sync_ts) * i64::from(sample_rate) / REFERENCE_CLOCK_HZ;
        Some(stream_time)
    }
}
