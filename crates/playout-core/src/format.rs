//! Video and audio format descriptors exchanged with the output device.

use crate::frame::PixelFormat;
use crate::time::FrameRate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Description of the video signal being played out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoFormat {
    pub width: u32,
    pub height: u32,
    pub rate: FrameRate,
    pub interlaced: bool,
    pub pixel_format: PixelFormat,
    /// Whether the source delivers a separate right-eye stream.
    pub stereo: bool,
}

impl fmt::Display for VideoFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}{}{} {}{}",
            self.width,
            self.height,
            if self.interlaced { "i" } else { "p" },
            self.rate,
            self.pixel_format,
            if self.stereo { " (3D)" } else { "" }
        )
    }
}

/// PCM audio stream description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    /// Bytes per sample (2 or 4).
    pub bytes_per_sample: u16,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioFormat {
    /// Bytes per interleaved sample frame.
    #[inline]
    pub fn frame_bytes(&self) -> usize {
        self.bytes_per_sample as usize * self.channels as usize
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            bytes_per_sample: 2,
            sample_rate: 48_000,
            channels: 2,
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ch {} Hz {} bit",
            self.channels,
            self.sample_rate,
            self.bytes_per_sample * 8
        )
    }
}
