//! Playout Core - Foundation types for the playout output engine
//!
//! This crate provides the fundamental types used throughout the playout
//! workspace:
//! - Time representation (RationalTime, FrameRate, 90 kHz reference clock)
//! - Pixel formats and frame buffers (mono and stereo)
//! - Timecode and HDR metadata side channels
//! - Video/audio format descriptors

pub mod error;
pub mod format;
pub mod frame;
pub mod time;

pub use error::{PlayoutError, Result};
pub use format::{AudioFormat, VideoFormat};
pub use frame::{
    Frame, FrameBuffer, FrameDesc, HdrMetadata, PixelFormat, Timecode, TransferFunction,
};
pub use time::{FrameRate, RationalTime, REFERENCE_CLOCK_HZ, TIMESTAMP_WRAP};
