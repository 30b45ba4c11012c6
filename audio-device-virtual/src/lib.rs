//! # audio-device-virtual
//!
//! Software buffer-queue audio service for audio-device-core.
//!
//! Provides:
//! - `VirtualAudioService`: a `NativeAudioService` whose engine creates players and recorders
//! - `VirtualPlayer`: plays enqueued chunks on a service thread into an inspectable sink
//! - `VirtualRecorder`: fills enqueued chunks with a sine tone on a service thread
//! - `FaultPlan`: switches that make native calls fail, for exercising error paths
//!
//! Completions are paced in real time by default, or one chunk per tick with
//! `Pacing::Manual`.
//!
//! ## Usage
//! ```ignore
//! use std::sync::Arc;
//! use audio_device_core::{BackendFactory, BackendKind, BufferQueueBackendFactory, Device, DeviceFormat};
//! use audio_device_virtual::{VirtualAudioService, VirtualConfig};
//!
//! let service = VirtualAudioService::new(VirtualConfig::default())?;
//! let factory = BufferQueueBackendFactory::new(Arc::new(service));
//! factory.init();
//! let device = Arc::new(Device::new(DeviceFormat::default()));
//! let mut playback = factory.create_backend(device, BackendKind::Playback).and_then(|b| b.into_playback());
//! ```

pub mod faults;
pub mod player;
pub mod recorder;
pub mod service;
pub mod stream;

pub use faults::FaultPlan;
pub use player::{PlayerMonitor, VirtualPlayer};
pub use recorder::{RecorderMonitor, ToneGenerator, VirtualRecorder};
pub use service::{VirtualAudioService, VirtualConfig, VirtualConfigError};
pub use stream::Pacing;
