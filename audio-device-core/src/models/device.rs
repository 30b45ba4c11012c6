use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard, RwLock};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::config::DeviceConfig;
use super::error::BackendError;
use super::format::DeviceFormat;
use super::state::BackendState;
use crate::processing::latency::DeviceClock;
use crate::traits::device_delegate::DeviceDelegate;
use crate::traits::mixer::{AudioMixer, SilenceMixer};

/// Why and when a device stopped being usable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisconnectEvent {
    pub reason: String,
    pub at: DateTime<Utc>,
}

/// Device state guarded by the device lock.
///
/// The mixer thread holds this lock while mixing; latency queries and
/// disconnect handling take it too. The completion callback never does.
pub struct DeviceState {
    pub name: Option<String>,
    pub format: DeviceFormat,
    pub clock: DeviceClock,
    mixer: Box<dyn AudioMixer>,
    disconnect: Option<DisconnectEvent>,
}

impl DeviceState {
    /// Render `frames` frames into `buffer` with the attached mixer and
    /// advance the device clock.
    pub fn mix(&mut self, buffer: &mut [u8], frames: usize) {
        let format = self.format;
        self.mixer.mix(buffer, frames, &format);
        self.clock.advance(frames as u64, format.sample_rate);
    }

    pub fn clock_time(&self) -> Duration {
        self.clock.time(self.format.sample_rate)
    }

    pub fn disconnect_event(&self) -> Option<&DisconnectEvent> {
        self.disconnect.as_ref()
    }
}

/// The device a backend renders to or captures from.
///
/// Owned by the caller (usually behind an `Arc`); backends hold a reference
/// and read or update its format, but never outlive their own use of it.
pub struct Device {
    id: Uuid,
    preferred_name: Option<String>,
    connected: AtomicBool,
    state: Mutex<DeviceState>,
    delegate: RwLock<Option<Arc<dyn DeviceDelegate>>>,
}

impl Device {
    pub fn new(format: DeviceFormat) -> Self {
        Self {
            id: Uuid::new_v4(),
            preferred_name: None,
            connected: AtomicBool::new(true),
            state: Mutex::new(DeviceState {
                name: None,
                format,
                clock: DeviceClock::default(),
                mixer: Box::new(SilenceMixer),
                disconnect: None,
            }),
            delegate: RwLock::new(None),
        }
    }

    /// A device with the configured format, opened by the configured name
    /// when `open` is called without one.
    pub fn from_config(config: &DeviceConfig) -> Self {
        Self {
            preferred_name: config.device_name.clone(),
            ..Self::new(config.format())
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn preferred_name(&self) -> Option<&str> {
        self.preferred_name.as_deref()
    }

    /// Take the device lock.
    pub fn lock(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock()
    }

    pub fn format(&self) -> DeviceFormat {
        self.state.lock().format
    }

    pub fn set_format(&self, format: DeviceFormat) {
        self.state.lock().format = format;
    }

    pub fn name(&self) -> Option<String> {
        self.state.lock().name.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn disconnect_event(&self) -> Option<DisconnectEvent> {
        self.state.lock().disconnect.clone()
    }

    /// Replace the mixer that fills playback chunks.
    pub fn set_mixer(&self, mixer: impl AudioMixer + 'static) {
        self.state.lock().mixer = Box::new(mixer);
    }

    pub fn set_delegate(&self, delegate: Arc<dyn DeviceDelegate>) {
        *self.delegate.write() = Some(delegate);
    }

    /// Mark the device as lost.
    ///
    /// Takes the device lock, so callers must not hold it. Only the first
    /// reason is kept; later calls are ignored until the device is reopened.
    /// The delegate is told after the lock is released, so it may read the
    /// device. Worker threads are not stopped here; they observe the cleared
    /// flag.
    pub fn handle_disconnect(&self, reason: impl Into<String>) -> bool {
        let mut state = self.state.lock();
        if !self.connected.load(Ordering::Acquire) {
            return false;
        }

        let event = DisconnectEvent {
            reason: reason.into(),
            at: Utc::now(),
        };
        log::warn!("Device {} disconnected: {}", self.id, event.reason);
        state.disconnect = Some(event.clone());
        self.connected.store(false, Ordering::Release);
        drop(state);

        let delegate = self.delegate.read().clone();
        if let Some(delegate) = delegate {
            delegate.on_disconnected(self.id, &event);
        }
        true
    }

    /// Fails with `DeviceUnavailable` once the device has been disconnected.
    pub fn ensure_connected(&self) -> Result<(), BackendError> {
        if self.is_connected() {
            return Ok(());
        }
        let reason = self
            .disconnect_event()
            .map(|event| event.reason)
            .unwrap_or_else(|| "device disconnected".into());
        Err(BackendError::DeviceUnavailable(reason))
    }

    pub(crate) fn mark_connected(&self, state: &mut DeviceState) {
        state.disconnect = None;
        self.connected.store(true, Ordering::Release);
    }

    pub(crate) fn notify_state(&self, state: BackendState) {
        log::debug!("Device {} is now {}", self.id, state);
        let delegate = self.delegate.read().clone();
        if let Some(delegate) = delegate {
            delegate.on_state_changed(self.id, state);
        }
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Device")
            .field("id", &self.id)
            .field("connected", &self.is_connected())
            .field("name", &state.name)
            .field("format", &state.format)
            .finish()
    }
}
