//! # audio-device-core
//!
//! Platform-agnostic audio device core library.
//!
//! Provides the chunk ring buffer, ambisonic channel tables, clock and
//! latency reporting, and the buffer-queue playback and capture backends.
//! Native audio services (the software service in `audio-device-virtual`,
//! or a platform binding) implement the `NativeAudioService` trait and are
//! wrapped in a `BufferQueueBackendFactory`.
//!
//! ## Architecture
//!
//! ```text
//! audio-device-core (this crate)
//! ├── traits/       ← DeviceBackend, BackendFactory, NativeAudioService, AudioMixer, DeviceDelegate
//! ├── models/       ← BackendError, BackendState, DeviceFormat, DeviceConfig, Device
//! ├── processing/   ← RingBuffer, ambisonic tables, DeviceClock and latency math
//! └── backend/      ← BufferQueuePlayback, BufferQueueCapture, factory and registry
//! ```

pub mod backend;
pub mod models;
pub mod processing;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use backend::capture::BufferQueueCapture;
pub use backend::factory::BufferQueueBackendFactory;
pub use backend::playback::BufferQueuePlayback;
pub use backend::registry::BackendRegistry;
pub use models::config::{DeviceConfig, StopDrainPolicy};
pub use models::device::{Device, DeviceState, DisconnectEvent};
pub use models::diagnostics::BackendDiagnostics;
pub use models::error::{BackendError, NativeError, NativeResult, RingBufferError};
pub use models::format::{ChannelLayout, DeviceFormat, SampleType, StreamFormat};
pub use models::state::{BackendKind, BackendState};
pub use processing::latency::ClockLatency;
pub use processing::ring_buffer::{ChunkHandle, RingBuffer};
pub use traits::backend::{Backend, BackendFactory, CaptureBackend, DeviceBackend, PlaybackBackend};
pub use traits::device_delegate::DeviceDelegate;
pub use traits::mixer::{AudioMixer, SilenceMixer};
pub use traits::native::{
    CompletionCallback, DeviceProbe, NativeAudioService, NativeBufferQueue, NativeEngine,
    NativeOutputMix, NativePlayer, NativeRecorder,
};
