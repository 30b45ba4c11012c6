use uuid::Uuid;

use crate::models::device::DisconnectEvent;
use crate::models::state::BackendState;

/// Event delegate for device notifications.
///
/// Methods are called on whichever thread caused the event: the caller's
/// thread for lifecycle changes, the mixer thread or a native service thread
/// for disconnects. No device lock is held during the call, so implementations
/// may read the device; they must not call back into the backend.
pub trait DeviceDelegate: Send + Sync {
    /// Called after a backend moves to a new lifecycle state.
    fn on_state_changed(&self, device: Uuid, state: BackendState);

    /// Called once when the device is lost, with the first reported reason.
    fn on_disconnected(&self, device: Uuid, event: &DisconnectEvent);
}
