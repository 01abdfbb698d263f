//! Playback scheduler for the device's internal timeline.
//!
//! Frames are queued by the producer and pushed to the device ahead of
//! the hardware clock, keeping between `min_window` and `max_window`
//! frames in flight. Device completion callbacks drive the steady-state
//! loop: every completed frame triggers another scheduling pass.
//!
//! Overflow and starvation are non-fatal by design: an overflowing frame
//! is released and a starved timeline repeats the last scheduled frame,
//! both flagging an audio resynchronization.

use crate::device::{CompletionResult, CompletionSink, VideoOutput};
use crate::pool::ScheduledFrame;
use crate::sync::SyncCell;
use parking_lot::Mutex;
use playout_core::{FrameRate, REFERENCE_CLOCK_HZ};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Tunable limits for the scheduled path.
///
/// The defaults replicate long-standing field-tested values; both windows
/// and the queue capacity are deliberately configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Pending frames held before submission.
    pub queue_capacity: usize,
    /// Below this many device-buffered frames the timeline is starved.
    pub min_window: u32,
    /// Above this many in-flight frames new submissions are dropped.
    pub max_window: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 10,
            min_window: 4,
            max_window: 6,
        }
    }
}

impl SchedulerConfig {
    /// Clamp the maximum window so it never undercuts the minimum.
    pub fn normalized(mut self) -> Self {
        self.max_window = self.max_window.max(self.min_window);
        self
    }
}

/// Lifecycle of the scheduled path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// No video output enabled.
    Idle,
    /// Initial frames queued, playback not yet started.
    Priming,
    /// Steady-state schedule/complete loop.
    Running,
    /// Reconfiguration or shutdown flushing the queue.
    Draining,
}

/// Cumulative completion statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputStats {
    pub late: u64,
    pub dropped: u64,
    pub flushed: u64,
}

struct SchedInner {
    queue: VecDeque<ScheduledFrame>,
    last_scheduled: Option<ScheduledFrame>,
    sequence: i64,
    state: SchedulerState,
}

/// Schedules pending frames onto the device timeline.
pub struct Scheduler {
    device: Arc<dyn VideoOutput>,
    config: SchedulerConfig,
    frame_duration: i64,
    time_scale: i64,
    sync: Arc<SyncCell>,
    inner: Mutex<SchedInner>,
    frames_late: AtomicU64,
    frames_dropped: AtomicU64,
    frames_flushed: AtomicU64,
    last_report: Mutex<Instant>,
}

const STATS_INTERVAL: Duration = Duration::from_secs(5);

impl Scheduler {
    pub fn new(
        device: Arc<dyn VideoOutput>,
        rate: FrameRate,
        config: SchedulerConfig,
        sync: Arc<SyncCell>,
    ) -> Self {
        Self {
            device,
            config: config.normalized(),
            frame_duration: rate.frame_duration_ticks(),
            time_scale: rate.time_scale(),
            sync,
            inner: Mutex::new(SchedInner {
                queue: VecDeque::new(),
                last_scheduled: None,
                sequence: 0,
                state: SchedulerState::Idle,
            }),
            frames_late: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
            frames_flushed: AtomicU64::new(0),
            last_report: Mutex::new(Instant::now()),
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.inner.lock().state
    }

    pub(crate) fn set_state(&self, state: SchedulerState) {
        self.inner.lock().state = state;
    }

    /// Number of frames awaiting submission.
    pub fn pending(&self) -> usize {
        self.inner.lock().queue.len()
    }

    /// Queue a frame for scheduled submission.
    ///
    /// Returns `false` if the queue is full; the frame is released on the
    /// spot and an audio resynchronization is flagged. Overflow is not
    /// an error; the producer keeps running.
    pub fn enqueue_frame(&self, frame: ScheduledFrame) -> bool {
        let mut inner = self.inner.lock();
        let buffered = inner.queue.len();
        if buffered < self.config.queue_capacity {
            inner.queue.push_back(frame);
            return true;
        }
        drop(inner);

        warn!(buffered, "scheduler queue overflow, dropping frame");
        self.sync.flag_resync();
        false
    }

    /// Push pending frames to the device within the look-ahead window.
    ///
    /// Called synchronously after priming and from the completion
    /// callback. An empty queue at or above the minimum window is the
    /// steady state; below it the last scheduled frame is repeated at the
    /// next slot so the device never starves.
    pub fn schedule_next(&self) {
        let mut buffered = self.device.buffered_frame_count();
        debug!(buffered, "scheduling pass");

        let mut inner = self.inner.lock();
        if inner.queue.is_empty() {
            if buffered >= self.config.min_window {
                return;
            }
            let Some(last) = inner.last_scheduled.clone() else {
                return;
            };
            warn!("missing frame, repeating last scheduled frame");
            self.sync.flag_resync();
            let slot = inner.sequence * self.frame_duration;
            if let Err(err) =
                self.device
                    .schedule_frame(last, slot, self.frame_duration, self.time_scale)
            {
                warn!(%err, "repeat frame submission failed");
            }
            inner.sequence += 1;
            return;
        }

        while let Some(frame) = inner.queue.pop_front() {
            buffered += 1;
            if buffered > self.config.max_window {
                // log-only; the drop counter tracks device completions
                warn!(buffered = buffered - 1, "dismissed frame over window");
                continue;
            }
            inner.last_scheduled = Some(frame.clone());
            if self.sync.needs_epoch() {
                if let Some(ts) = frame.frame().timestamp {
                    let video_pos =
                        self.frame_duration * inner.sequence * REFERENCE_CLOCK_HZ / self.time_scale;
                    self.sync.set_epoch(ts - video_pos);
                }
            }
            let slot = inner.sequence * self.frame_duration;
            if let Err(err) =
                self.device
                    .schedule_frame(frame, slot, self.frame_duration, self.time_scale)
            {
                warn!(%err, "frame submission failed");
            }
            inner.sequence += 1;
        }
    }

    /// Flush the pending queue and restart the timeline at sequence zero.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.state = SchedulerState::Draining;
        inner.queue.clear();
        inner.last_scheduled = None;
        inner.sequence = 0;
        inner.state = SchedulerState::Idle;
    }

    /// Completion counter snapshot.
    pub fn stats(&self) -> OutputStats {
        OutputStats {
            late: self.frames_late.load(Ordering::Relaxed),
            dropped: self.frames_dropped.load(Ordering::Relaxed),
            flushed: self.frames_flushed.load(Ordering::Relaxed),
        }
    }

    /// Log cumulative statistics, rate-limited to one line per interval.
    pub fn maybe_report(&self) {
        let mut last = self.last_report.lock();
        if last.elapsed() < STATS_INTERVAL {
            return;
        }
        *last = Instant::now();
        let stats = self.stats();
        tracing::info!(
            late = stats.late,
            dropped = stats.dropped,
            flushed = stats.flushed,
            "cumulative frame completions"
        );
    }
}

impl CompletionSink for Scheduler {
    fn frame_completed(&self, frame: ScheduledFrame, result: CompletionResult) {
        match result {
            CompletionResult::Completed => {}
            CompletionResult::DisplayedLate => {
                let total = self.frames_late.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(total, "late frame");
            }
            CompletionResult::Dropped => {
                let total = self.frames_dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(total, "dropped frame");
            }
            CompletionResult::Flushed => {
                let total = self.frames_flushed.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(total, "flushed frame");
            }
        }
        if let Some(tc) = frame.frame().timecode {
            debug!(timecode = %tc, "frame completed");
        }
        self.schedule_next();
        drop(frame);
    }
}
