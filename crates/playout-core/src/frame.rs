//! Frame buffer types for video frames handed to the output device.
//!
//! A [`Frame`] owns its pixel storage and travels producer → scheduler →
//! device → buffer pool. Stereo frames carry a second, right-eye buffer
//! behind a single dispatch point ([`Frame::right_eye`]). Timecode and
//! HDR metadata ride along as optional side channels.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Pixel format enumeration for the SDI output path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 8-bit 4:2:2 YCbCr (16 bits per pixel)
    #[default]
    Uyvy,
    /// 10-bit 4:2:2 YCbCr, packed in 128-byte groups of 48 pixels
    V210,
    /// 8-bit RGBA (32 bits per pixel)
    Rgba,
    /// 10-bit RGB, 4 bytes per pixel
    R10k,
}

impl PixelFormat {
    /// Bytes per row for a given width, including format padding.
    pub fn row_bytes(self, width: u32) -> usize {
        match self {
            Self::Uyvy => (width as usize) * 2,
            // v210 packs 48 pixels into 128 bytes, rows padded to a full group
            Self::V210 => ((width as usize + 47) / 48) * 128,
            Self::Rgba | Self::R10k => (width as usize) * 4,
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uyvy => "UYVY",
            Self::V210 => "v210",
            Self::Rgba => "RGBA",
            Self::R10k => "R10k",
        };
        write!(f, "{name}")
    }
}

/// Geometry and format key used for buffer-pool matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameDesc {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Bytes per row
    pub row_bytes: usize,
    /// Pixel format
    pub format: PixelFormat,
}

impl FrameDesc {
    /// Create a descriptor with the row stride implied by the format.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            width,
            height,
            row_bytes: format.row_bytes(width),
            format,
        }
    }
}

/// An owned, zero-initialised pixel buffer for one eye of a frame.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    data: Vec<u8>,
}

impl FrameBuffer {
    /// Allocate cleared storage for the given geometry.
    pub fn new(desc: &FrameDesc) -> Self {
        Self {
            data: vec![0u8; desc.row_bytes * desc.height as usize],
        }
    }

    /// Raw pixel data.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable raw pixel data.
    #[inline]
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Total buffer size in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the buffer holds no bytes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Pixel storage: one buffer for mono frames, left + right for stereo.
#[derive(Debug, Clone)]
pub enum FramePixels {
    Mono(FrameBuffer),
    Stereo(FrameBuffer, FrameBuffer),
}

/// A video frame in CPU memory, with optional timecode and HDR metadata.
#[derive(Debug, Clone)]
pub struct Frame {
    desc: FrameDesc,
    pixels: FramePixels,
    /// Timecode stamped onto the frame, if timecode emission is enabled.
    pub timecode: Option<Timecode>,
    /// HDR metadata block attached to the frame.
    pub hdr: Option<HdrMetadata>,
    /// Source timestamp in 90 kHz reference-clock units; `None` = unset.
    pub timestamp: Option<i64>,
}

impl Frame {
    /// Allocate a new frame with cleared pixel storage.
    pub fn new(desc: FrameDesc, stereo: bool, hdr: Option<HdrMetadata>) -> Self {
        let pixels = if stereo {
            FramePixels::Stereo(FrameBuffer::new(&desc), FrameBuffer::new(&desc))
        } else {
            FramePixels::Mono(FrameBuffer::new(&desc))
        };
        Self {
            desc,
            pixels,
            timecode: None,
            hdr,
            timestamp: None,
        }
    }

    /// A zero-sized placeholder frame.
    pub fn empty() -> Self {
        Self::new(FrameDesc::new(0, 0, PixelFormat::Uyvy), false, None)
    }

    /// Geometry and format of this frame.
    #[inline]
    pub fn desc(&self) -> &FrameDesc {
        &self.desc
    }

    /// Whether this frame carries a right-eye buffer.
    #[inline]
    pub fn is_stereo(&self) -> bool {
        matches!(self.pixels, FramePixels::Stereo(..))
    }

    /// The primary (left-eye) pixel buffer.
    #[inline]
    pub fn buffer(&self) -> &FrameBuffer {
        match &self.pixels {
            FramePixels::Mono(b) | FramePixels::Stereo(b, _) => b,
        }
    }

    /// The primary (left-eye) pixel buffer, mutably.
    #[inline]
    pub fn buffer_mut(&mut self) -> &mut FrameBuffer {
        match &mut self.pixels {
            FramePixels::Mono(b) | FramePixels::Stereo(b, _) => b,
        }
    }

    /// The right-eye buffer of a stereo frame.
    #[inline]
    pub fn right_eye(&self) -> Option<&FrameBuffer> {
        match &self.pixels {
            FramePixels::Mono(_) => None,
            FramePixels::Stereo(_, r) => Some(r),
        }
    }

    /// The right-eye buffer of a stereo frame, mutably.
    #[inline]
    pub fn right_eye_mut(&mut self) -> Option<&mut FrameBuffer> {
        match &mut self.pixels {
            FramePixels::Mono(_) => None,
            FramePixels::Stereo(_, r) => Some(r),
        }
    }

    /// Whether this frame can be recycled for the given geometry.
    pub fn matches(&self, desc: &FrameDesc, stereo: bool) -> bool {
        self.desc == *desc && self.is_stereo() == stereo
    }
}

/// hh:mm:ss:ff timecode with NTSC drop-frame advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Timecode {
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
    pub frames: u8,
}

impl Timecode {
    /// Advance by one frame at the given rate.
    ///
    /// Fractional NTSC rates use drop-frame counting: the first two frame
    /// numbers of every minute not divisible by ten are skipped.
    pub fn advance(&mut self, fps: f64) {
        const EPSILON: f64 = 0.005;
        let drop_frame = fps.ceil() - fps > EPSILON;

        self.frames += 1;
        if f64::from(self.frames) > fps - EPSILON {
            self.frames = 0;
            self.seconds += 1;
            if self.seconds >= 60 {
                self.seconds = 0;
                self.minutes += 1;
                if drop_frame && self.minutes % 10 != 0 {
                    self.frames = 2;
                }
                if self.minutes >= 60 {
                    self.minutes = 0;
                    self.hours += 1;
                    if self.hours >= 24 {
                        self.hours = 0;
                    }
                }
            }
        }
    }
}

impl fmt::Display for Timecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}:{:02}",
            self.hours, self.minutes, self.seconds, self.frames
        )
    }
}

/// Electro-optical transfer function carried in HDR metadata.
///
/// Values map to CEA-861.3 EOTF codes 0-7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferFunction {
    Sdr,
    Hdr,
    Pq,
    Hlg,
    /// Raw CEA-861 code for EOTFs without a named variant.
    Cea861(u8),
}

impl TransferFunction {
    /// The CEA-861 code for this transfer function.
    pub fn code(self) -> u8 {
        match self {
            Self::Sdr => 0,
            Self::Hdr => 1,
            Self::Pq => 2,
            Self::Hlg => 3,
            Self::Cea861(c) => c,
        }
    }
}

/// CIE 1931 chromaticity coordinates for the mastering display.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChromaticityCoordinates {
    pub red_x: f64,
    pub red_y: f64,
    pub green_x: f64,
    pub green_y: f64,
    pub blue_x: f64,
    pub blue_y: f64,
    pub white_x: f64,
    pub white_y: f64,
}

/// Rec. 2020 primaries and D65 white point.
pub const REC2020_PRIMARIES: ChromaticityCoordinates = ChromaticityCoordinates {
    red_x: 0.708,
    red_y: 0.292,
    green_x: 0.170,
    green_y: 0.797,
    blue_x: 0.131,
    blue_y: 0.046,
    white_x: 0.3127,
    white_y: 0.3290,
};

/// Static HDR metadata block attached to output frames.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HdrMetadata {
    pub eotf: TransferFunction,
    pub primaries: ChromaticityCoordinates,
    pub max_display_mastering_luminance: f64,
    pub min_display_mastering_luminance: f64,
    pub max_cll: f64,
    pub max_fall: f64,
}

impl Default for HdrMetadata {
    fn default() -> Self {
        Self {
            eotf: TransferFunction::Hdr,
            primaries: REC2020_PRIMARIES,
            max_display_mastering_luminance: 1000.0,
            min_display_mastering_luminance: 0.0001,
            max_cll: 1000.0,
            max_fall: 50.0,
        }
    }
}
