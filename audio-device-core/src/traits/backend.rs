use std::sync::Arc;

use crate::models::device::Device;
use crate::models::diagnostics::BackendDiagnostics;
use crate::models::error::BackendError;
use crate::models::state::{BackendKind, BackendState};
use crate::processing::latency::ClockLatency;
use crate::traits::native::DeviceProbe;

/// Lifecycle shared by playback and capture backends.
///
/// Lifecycle calls take `&mut self`, so they are serialized by the owner.
/// Mid-stream failures never surface here directly; they disconnect the
/// device and show up as `DeviceUnavailable` on the next call.
pub trait DeviceBackend: Send {
    fn kind(&self) -> BackendKind;

    fn state(&self) -> BackendState;

    fn device(&self) -> &Arc<Device>;

    /// Resolve `name` (or the default device) and acquire the native engine.
    fn open(&mut self, name: Option<&str>) -> Result<(), BackendError>;

    fn start(&mut self) -> Result<(), BackendError>;

    /// Stop streaming. A no-op unless running.
    fn stop(&mut self);

    /// Stop and release every native resource. Also run on drop.
    fn close(&mut self);

    fn clock_latency(&self) -> ClockLatency;

    fn diagnostics(&self) -> BackendDiagnostics;
}

pub trait PlaybackBackend: DeviceBackend {
    /// (Re)create the native stream and ring buffer for the device's
    /// current format. Stops a running stream first.
    fn reset(&mut self) -> Result<(), BackendError>;
}

pub trait CaptureBackend: DeviceBackend {
    /// Copy `frames` captured frames into `buffer`.
    fn capture_samples(&mut self, buffer: &mut [u8], frames: usize) -> Result<(), BackendError>;

    /// Frames ready to be captured.
    fn available_samples(&self) -> usize;
}

/// A backend of either direction, as returned by a factory.
pub enum Backend {
    Playback(Box<dyn PlaybackBackend>),
    Capture(Box<dyn CaptureBackend>),
}

impl Backend {
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Playback(_) => BackendKind::Playback,
            Self::Capture(_) => BackendKind::Capture,
        }
    }

    pub fn as_device_backend(&self) -> &dyn DeviceBackend {
        match self {
            Self::Playback(backend) => backend.as_ref(),
            Self::Capture(backend) => backend.as_ref(),
        }
    }

    pub fn as_device_backend_mut(&mut self) -> &mut dyn DeviceBackend {
        match self {
            Self::Playback(backend) => backend.as_mut(),
            Self::Capture(backend) => backend.as_mut(),
        }
    }

    pub fn into_playback(self) -> Option<Box<dyn PlaybackBackend>> {
        match self {
            Self::Playback(backend) => Some(backend),
            Self::Capture(_) => None,
        }
    }

    pub fn into_capture(self) -> Option<Box<dyn CaptureBackend>> {
        match self {
            Self::Capture(backend) => Some(backend),
            Self::Playback(_) => None,
        }
    }
}

/// Entry point for one native audio API.
pub trait BackendFactory: Send + Sync {
    fn name(&self) -> &str;

    /// Load the native service. Returns false if it is unavailable.
    fn init(&self) -> bool;

    fn deinit(&self);

    fn query_support(&self, kind: BackendKind) -> bool;

    /// Append the device names matching `probe` to `names`.
    fn probe(&self, probe: DeviceProbe, names: &mut Vec<String>);

    /// Create a backend bound to `device`, or `None` if `kind` is unsupported.
    fn create_backend(&self, device: Arc<Device>, kind: BackendKind) -> Option<Backend>;
}
