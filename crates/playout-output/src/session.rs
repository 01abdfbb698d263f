//! Session surface: frame acquisition, submission and reconfiguration.
//!
//! A [`PlayoutSession`] ties the pool, the scheduler and the audio sync
//! engine to one device. Video reconfiguration is a full stop/restart
//! cycle under a single lock; any failure along the way leaves every
//! output disabled. Audio reconfiguration is recorded immediately but
//! applied on the next frame acquisition, so it never races a live
//! submission.

use crate::device::{AudioStreamKind, DeviceOptions, DisplayMode, OutputFlags, VideoOutput};
use crate::pool::{FrameHandle, FramePool};
use crate::scheduler::{OutputStats, Scheduler, SchedulerConfig, SchedulerState};
use crate::sync::{AudioSync, SyncCell};
use parking_lot::Mutex;
use playout_core::{
    AudioFormat, FrameDesc, HdrMetadata, PlayoutError, Result, Timecode, VideoFormat,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How frames reach the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionMode {
    /// Synchronous display, no device-side buffering.
    LowLatency,
    /// Timeline submission within the look-ahead window.
    Scheduled,
}

/// Static per-session settings, fixed at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub mode: SubmissionMode,
    /// Dual-stream 3D output requested up front. Toggled automatically
    /// when the incoming format disagrees.
    pub stereo: bool,
    /// Stamp and advance an RP188-style timecode on every frame.
    pub emit_timecode: bool,
    /// HDR metadata attached to every acquired frame.
    pub hdr: Option<HdrMetadata>,
    pub scheduler: SchedulerConfig,
    pub device_options: DeviceOptions,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mode: SubmissionMode::Scheduled,
            stereo: false,
            emit_timecode: false,
            hdr: None,
            scheduler: SchedulerConfig::default(),
            device_options: DeviceOptions::default(),
        }
    }
}

/// Outcome of the most recent video reconfiguration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconfigState {
    /// No video format has been configured yet.
    Idle,
    /// The last reconfiguration succeeded; output is live.
    Active,
    /// The last reconfiguration failed; all outputs are disabled.
    Failed,
}

struct ActiveVideo {
    format: VideoFormat,
    scheduler: Option<Arc<Scheduler>>,
}

struct SessionState {
    reconfig: ReconfigState,
    video: Option<ActiveVideo>,
    stereo: bool,
    audio_enabled: bool,
    audio_format: AudioFormat,
    pending_audio: Option<AudioFormat>,
    timecode: Timecode,
}

/// One live playout session against one output device.
pub struct PlayoutSession {
    device: Arc<dyn VideoOutput>,
    config: SessionConfig,
    pool: FramePool,
    sync_cell: Arc<SyncCell>,
    audio_sync: AudioSync,
    audio_pending: AtomicBool,
    state: Mutex<SessionState>,
}

impl PlayoutSession {
    pub fn new(device: Arc<dyn VideoOutput>, config: SessionConfig) -> Self {
        let stereo = config.stereo;
        Self {
            device,
            config,
            pool: FramePool::new(),
            sync_cell: Arc::new(SyncCell::new()),
            audio_sync: AudioSync::new(),
            audio_pending: AtomicBool::new(false),
            state: Mutex::new(SessionState {
                reconfig: ReconfigState::Idle,
                video: None,
                stereo,
                audio_enabled: false,
                audio_format: AudioFormat::default(),
                pending_audio: None,
                timecode: Timecode::default(),
            }),
        }
    }

    pub fn reconfig_state(&self) -> ReconfigState {
        self.state.lock().reconfig
    }

    /// The session's buffer pool, mainly for diagnostics.
    pub fn pool(&self) -> &FramePool {
        &self.pool
    }

    /// Completion statistics of the current scheduled run.
    pub fn stats(&self) -> OutputStats {
        self.state
            .lock()
            .video
            .as_ref()
            .and_then(|v| v.scheduler.as_ref())
            .map(|s| s.stats())
            .unwrap_or_default()
    }

    /// Hand out a writable frame for the configured format.
    ///
    /// A pending audio reconfiguration is applied here, before the
    /// producer starts filling the next frame.
    pub fn acquire_frame(&self) -> Result<FrameHandle> {
        if self.audio_pending.swap(false, Ordering::AcqRel) {
            self.apply_pending_audio();
        }
        let (desc, stereo) = {
            let state = self.state.lock();
            let video = state.video.as_ref().ok_or(PlayoutError::NotInitialized)?;
            let desc = FrameDesc::new(
                video.format.width,
                video.format.height,
                video.format.pixel_format,
            );
            (desc, video.format.stereo)
        };
        Ok(self.pool.acquire(&desc, stereo, self.config.hdr))
    }

    /// Send a filled frame to the device.
    ///
    /// Returns `Ok(false)` when the scheduled queue was full and the
    /// frame was released without being shown. In low-latency mode the
    /// frame is displayed synchronously and recycled on return.
    pub fn submit_frame(&self, mut handle: FrameHandle) -> Result<bool> {
        // the lock is held across the device call: reconfiguration takes
        // the same lock, so a submission never overlaps a teardown
        let mut state = self.state.lock();
        let video = state.video.as_ref().ok_or(PlayoutError::NotInitialized)?;
        let fps = video.format.rate.to_fps_f64();
        let scheduler = video.scheduler.clone();
        if self.config.emit_timecode {
            handle.frame_mut().timecode = Some(state.timecode);
            state.timecode.advance(fps);
        }

        match self.config.mode {
            SubmissionMode::LowLatency => {
                self.device.display_frame_sync(handle.frame())?;
                Ok(true)
            }
            SubmissionMode::Scheduled => {
                // completions drive the scheduling loop; submission only
                // queues
                let scheduler = scheduler.ok_or(PlayoutError::NotInitialized)?;
                let accepted = scheduler.enqueue_frame(handle.into_scheduled());
                scheduler.maybe_report();
                Ok(accepted)
            }
        }
    }

    /// Play an interleaved PCM block; `timestamp` is the block's 90 kHz
    /// source timestamp. Returns the number of sample frames accepted.
    ///
    /// Before the video timeline has established a sync epoch, scheduled
    /// audio is discarded silently. A device buffer that has already
    /// drained triggers an underflow warning and a resynchronization.
    pub fn write_audio(&self, data: &[u8], timestamp: u32) -> Result<u32> {
        // held across the device calls, mirroring submit_frame: a write
        // either completes before a reconfiguration or starts after it
        let state = self.state.lock();
        if !state.audio_enabled {
            return Err(PlayoutError::NotInitialized);
        }
        let format = state.audio_format;
        let samples = (data.len() / format.frame_bytes()) as u32;

        let accepted = match self.config.mode {
            SubmissionMode::LowLatency => self.device.write_audio_sync(data, samples)?,
            SubmissionMode::Scheduled => {
                if self.device.buffered_audio_samples() == 0 {
                    warn!("audio buffer underflow");
                    self.sync_cell.flag_resync();
                }
                match self
                    .audio_sync
                    .stream_time(&self.sync_cell, timestamp, format.sample_rate)
                {
                    Some(stream_time) => self.device.schedule_audio(data, samples, stream_time)?,
                    None => return Ok(0),
                }
            }
        };
        if accepted < samples {
            warn!(
                offered = samples,
                accepted, "audio buffer overflow, samples discarded"
            );
        }
        Ok(accepted)
    }

    /// Switch the video output to a new format.
    ///
    /// Stops playback, tears down both outputs, then validates and
    /// re-enables from scratch. On failure everything stays disabled and
    /// the session reports [`ReconfigState::Failed`].
    pub fn reconfigure_video(&self, format: VideoFormat) -> Result<()> {
        let mut state = self.state.lock();
        info!(%format, "reconfiguring video output");
        self.teardown(&mut state);
        match self.bring_up(&mut state, format) {
            Ok(()) => {
                state.reconfig = ReconfigState::Active;
                Ok(())
            }
            Err(err) => {
                warn!(%err, "video reconfiguration failed");
                self.teardown(&mut state);
                state.audio_enabled = false;
                state.reconfig = ReconfigState::Failed;
                Err(err)
            }
        }
    }

    /// Record a new audio format, applied on the next `acquire_frame`.
    pub fn reconfigure_audio(&self, format: AudioFormat) -> Result<()> {
        if format.sample_rate != 48_000 {
            return Err(PlayoutError::UnsupportedFormat(format!(
                "audio sample rate {} Hz",
                format.sample_rate
            )));
        }
        if !matches!(format.bytes_per_sample, 2 | 4) {
            return Err(PlayoutError::UnsupportedFormat(format!(
                "audio sample width {} bytes",
                format.bytes_per_sample
            )));
        }
        if !matches!(format.channels, 2 | 8 | 16) {
            return Err(PlayoutError::UnsupportedFormat(format!(
                "audio channel count {}",
                format.channels
            )));
        }
        self.state.lock().pending_audio = Some(format);
        self.audio_pending.store(true, Ordering::Release);
        Ok(())
    }

    fn stream_kind(&self) -> AudioStreamKind {
        match self.config.mode {
            SubmissionMode::LowLatency => AudioStreamKind::Continuous,
            SubmissionMode::Scheduled => AudioStreamKind::Timestamped,
        }
    }

    fn apply_pending_audio(&self) {
        let mut state = self.state.lock();
        let Some(format) = state.pending_audio.take() else {
            return;
        };
        info!(%format, "applying audio reconfiguration");
        if state.audio_enabled {
            if let Err(err) = self.device.disable_audio() {
                warn!(%err, "disabling audio output failed");
            }
            state.audio_enabled = false;
        }
        match self.device.enable_audio(&format, self.stream_kind()) {
            Ok(()) => {
                state.audio_format = format;
                state.audio_enabled = true;
            }
            Err(err) => warn!(%err, "enabling audio output failed"),
        }
    }

    fn find_mode(&self, format: &VideoFormat) -> Result<DisplayMode> {
        let wanted_fps = format.rate.to_fps_f64();
        self.device
            .display_modes()
            .into_iter()
            .find(|m| {
                m.width == format.width
                    && m.height == format.height
                    && m.interlaced == format.interlaced
                    && (m.rate.to_fps_f64() - wanted_fps).abs() < 0.01
            })
            .ok_or_else(|| PlayoutError::UnsupportedMode(format.to_string()))
    }

    fn bring_up(&self, state: &mut SessionState, format: VideoFormat) -> Result<()> {
        if format.stereo != state.stereo {
            info!(stereo = format.stereo, "toggling dual-stream 3D output");
            state.stereo = format.stereo;
        }
        let mode = self.find_mode(&format)?;
        debug!(%mode, "selected display mode");

        self.device.apply_options(&self.config.device_options)?;
        if !self
            .device
            .supports_mode(&mode, format.pixel_format, state.stereo)?
        {
            return Err(PlayoutError::UnsupportedFormat(format.to_string()));
        }
        let flags = OutputFlags {
            timecode: self.config.emit_timecode,
            stereo: state.stereo,
        };
        self.device.enable_video(&mode, flags)?;
        if state.audio_enabled {
            self.device
                .enable_audio(&state.audio_format, self.stream_kind())?;
        }

        let scheduler = match self.config.mode {
            SubmissionMode::LowLatency => None,
            SubmissionMode::Scheduled => {
                let scheduler = Arc::new(Scheduler::new(
                    self.device.clone(),
                    format.rate,
                    self.config.scheduler,
                    self.sync_cell.clone(),
                ));
                self.device.set_completion_sink(Some(scheduler.clone()));
                self.preroll(&scheduler, &format);
                self.device.start_playback(format.rate.time_scale())?;
                scheduler.set_state(SchedulerState::Running);
                Some(scheduler)
            }
        };
        state.video = Some(ActiveVideo { format, scheduler });
        Ok(())
    }

    /// Queue `min_window` copies of a black frame so the device timeline
    /// starts with a full look-ahead window.
    fn preroll(&self, scheduler: &Scheduler, format: &VideoFormat) {
        let desc = FrameDesc::new(format.width, format.height, format.pixel_format);
        let mut handle = self.pool.acquire(&desc, format.stereo, self.config.hdr);
        let frame = handle.frame_mut();
        frame.buffer_mut().data_mut().fill(0);
        if let Some(right) = frame.right_eye_mut() {
            right.data_mut().fill(0);
        }
        let black = handle.into_scheduled();

        scheduler.set_state(SchedulerState::Priming);
        for _ in 0..self.config.scheduler.min_window {
            scheduler.enqueue_frame(black.clone());
        }
        drop(black);
        scheduler.schedule_next();
    }

    /// Stop playback and disable both outputs. `audio_enabled` is left
    /// set so a following bring-up re-enables audio with the same format.
    fn teardown(&self, state: &mut SessionState) {
        self.sync_cell.reset();
        self.audio_sync.reset();
        if let Err(err) = self.device.stop_playback() {
            warn!(%err, "stopping playback failed");
        }
        self.device.set_completion_sink(None);
        if let Err(err) = self.device.disable_video() {
            warn!(%err, "disabling video output failed");
        }
        if state.audio_enabled {
            if let Err(err) = self.device.disable_audio() {
                warn!(%err, "disabling audio output failed");
            }
        }
        if let Some(video) = state.video.take() {
            if let Some(scheduler) = video.scheduler {
                scheduler.reset();
            }
        }
    }
}

impl Drop for PlayoutSession {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        self.teardown(&mut state);
        state.reconfig = ReconfigState::Idle;
    }
}
