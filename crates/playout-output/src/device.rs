//! The hardware device boundary.
//!
//! The vendor's reference-counted callback interface is re-expressed as a
//! single capability trait with explicit ownership: the scheduler keeps
//! one strong frame reference per in-flight submission, the device holds
//! another until it reports completion through [`CompletionSink`].

use crate::pool::ScheduledFrame;
use playout_core::{AudioFormat, Frame, FrameRate, PixelFormat, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// One display mode supported by the output device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayMode {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub rate: FrameRate,
    pub interlaced: bool,
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}x{}{} @ {})",
            self.name,
            self.width,
            self.height,
            if self.interlaced { "i" } else { "p" },
            self.rate
        )
    }
}

/// Flags passed when enabling video output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputFlags {
    /// Emit RP188 timecode with each frame.
    pub timecode: bool,
    /// Dual-stream 3D output.
    pub stereo: bool,
}

/// How audio samples are delivered to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioStreamKind {
    /// Samples play as they arrive (low-latency mode).
    Continuous,
    /// Samples carry a stream time on the scheduled timeline.
    Timestamped,
}

/// Device verdict on a completed scheduled frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionResult {
    /// Displayed in its assigned slot.
    Completed,
    /// Displayed, but after its assigned slot had begun.
    DisplayedLate,
    /// Never displayed; the device ran out of time.
    Dropped,
    /// Discarded because playback stopped.
    Flushed,
}

/// Receives asynchronous per-frame completion notifications.
///
/// The device invokes this once per scheduled frame, in submission order,
/// from its own callback thread.
pub trait CompletionSink: Send + Sync {
    fn frame_completed(&self, frame: ScheduledFrame, result: CompletionResult);
}

/// SDI link width for the output connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkConfiguration {
    Single,
    Dual,
    Quad,
}

/// Frame packing used on HDMI outputs for stereo signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Hdmi3dPacking {
    SideBySideHalf,
    LineByLine,
    TopAndBottom,
    FramePacking,
    LeftOnly,
    RightOnly,
}

/// Typed device configuration, applied in one pass at reconfiguration.
///
/// `None` leaves the device default untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceOptions {
    /// Show the last frame (rather than black) when the timeline idles.
    pub idle_shows_last_frame: bool,
    pub output_1080p_as_psf: Option<bool>,
    /// Must stay off for interlaced video in low-latency mode.
    pub field_flicker_removal: Option<bool>,
    pub low_latency_video: Option<bool>,
    pub sdi_link: Option<LinkConfiguration>,
    pub smpte_level_a: Option<bool>,
    pub hdmi_3d_packing: Option<Hdmi3dPacking>,
}

impl Default for DeviceOptions {
    fn default() -> Self {
        Self {
            idle_shows_last_frame: true,
            output_1080p_as_psf: Some(false),
            field_flicker_removal: Some(false),
            low_latency_video: Some(true),
            sdi_link: None,
            smpte_level_a: None,
            hdmi_3d_packing: None,
        }
    }
}

/// Capability interface of the hardware output.
///
/// Implementations are expected to be internally synchronized; the core
/// calls `buffered_frame_count` lock-free with respect to its own state.
pub trait VideoOutput: Send + Sync {
    /// Display modes supported on the output connector.
    fn display_modes(&self) -> Vec<DisplayMode>;

    /// Whether the device can drive `mode` with the given pixel format.
    fn supports_mode(&self, mode: &DisplayMode, format: PixelFormat, stereo: bool)
        -> Result<bool>;

    /// Write the typed option set to the device configuration registers.
    fn apply_options(&self, options: &DeviceOptions) -> Result<()>;

    fn enable_video(&self, mode: &DisplayMode, flags: OutputFlags) -> Result<()>;
    fn disable_video(&self) -> Result<()>;

    fn enable_audio(&self, format: &AudioFormat, stream: AudioStreamKind) -> Result<()>;
    fn disable_audio(&self) -> Result<()>;

    /// Register (or clear) the sink for scheduled-frame completions.
    fn set_completion_sink(&self, sink: Option<Arc<dyn CompletionSink>>);

    /// Submit a frame for display at `display_time` on the device
    /// timeline (`duration` ticks long, `scale` ticks per second).
    fn schedule_frame(
        &self,
        frame: ScheduledFrame,
        display_time: i64,
        duration: i64,
        scale: i64,
    ) -> Result<()>;

    /// Show a frame immediately, bypassing the scheduled timeline.
    fn display_frame_sync(&self, frame: &Frame) -> Result<()>;

    /// Number of scheduled frames buffered in the device, not yet shown.
    fn buffered_frame_count(&self) -> u32;

    fn start_playback(&self, time_scale: i64) -> Result<()>;
    fn stop_playback(&self) -> Result<()>;

    /// Schedule interleaved PCM at `stream_time` (in sample units).
    /// Returns the number of sample frames actually accepted.
    fn schedule_audio(&self, data: &[u8], samples: u32, stream_time: i64) -> Result<u32>;

    /// Write interleaved PCM for immediate playback. Returns the number
    /// of sample frames actually accepted.
    fn write_audio_sync(&self, data: &[u8], samples: u32) -> Result<u32>;

    /// Per-channel count of audio sample frames buffered in the device.
    fn buffered_audio_samples(&self) -> u32;
}
