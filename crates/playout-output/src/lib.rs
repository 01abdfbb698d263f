//! Playout Output - Real-time output scheduler for playout hardware
//!
//! This crate drives a hardware video/audio output device:
//! - `FramePool`: recycles frame memory between producer and device
//! - `Scheduler`: queues frames and submits them ahead of the hardware
//!   clock within a bounded look-ahead window
//! - `AudioSync`: phase-locks the audio stream to the scheduled video
//!   cadence via a shared epoch cell
//! - `PlayoutSession`: the public surface: frame acquisition, submission
//!   in low-latency or scheduled mode, audio writes, and atomic
//!   reconfiguration
//!
//! The device itself sits behind the [`device::VideoOutput`] trait; frame
//! completions arrive asynchronously through [`device::CompletionSink`].

pub mod device;
pub mod pool;
pub mod scheduler;
pub mod session;
pub mod sync;

pub use device::{
    AudioStreamKind, CompletionResult, CompletionSink, DeviceOptions, DisplayMode, Hdmi3dPacking,
    LinkConfiguration, OutputFlags, VideoOutput,
};
pub use pool::{FrameHandle, FramePool, ScheduledFrame};
pub use scheduler::{OutputStats, Scheduler, SchedulerConfig, SchedulerState};
pub use session::{PlayoutSession, ReconfigState, SessionConfig, SubmissionMode};
pub use sync::{AudioSync, SyncCell};
