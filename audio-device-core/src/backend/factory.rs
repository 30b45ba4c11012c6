use std::sync::Arc;

use super::capture::BufferQueueCapture;
use super::playback::BufferQueuePlayback;
use crate::models::config::{DeviceConfig, StopDrainPolicy};
use crate::models::device::Device;
use crate::models::error::NativeResultExt;
use crate::models::state::BackendKind;
use crate::traits::backend::{Backend, BackendFactory};
use crate::traits::native::{DeviceProbe, NativeAudioService};

/// Factory for buffer-queue backends over one native service.
pub struct BufferQueueBackendFactory {
    service: Arc<dyn NativeAudioService>,
    drain: StopDrainPolicy,
}

impl BufferQueueBackendFactory {
    pub fn new(service: Arc<dyn NativeAudioService>) -> Self {
        Self {
            service,
            drain: StopDrainPolicy::default(),
        }
    }

    /// Factory using the drain policy from `config`.
    pub fn from_config(service: Arc<dyn NativeAudioService>, config: &DeviceConfig) -> Self {
        Self::new(service).with_drain_policy(config.stop_drain)
    }

    pub fn drain_policy(&self) -> StopDrainPolicy {
        self.drain
    }

    /// Stop-drain policy handed to playback backends.
    pub fn with_drain_policy(mut self, drain: StopDrainPolicy) -> Self {
        self.drain = drain;
        self
    }

    pub fn service(&self) -> &Arc<dyn NativeAudioService> {
        &self.service
    }
}

impl BackendFactory for BufferQueueBackendFactory {
    fn name(&self) -> &str {
        self.service.name()
    }

    fn init(&self) -> bool {
        self.service.init().logged("service->Init").is_ok()
    }

    fn deinit(&self) {
        self.service.deinit();
    }

    fn query_support(&self, kind: BackendKind) -> bool {
        self.service.supports(kind)
    }

    fn probe(&self, probe: DeviceProbe, names: &mut Vec<String>) {
        names.extend(self.service.device_names(probe));
    }

    fn create_backend(&self, device: Arc<Device>, kind: BackendKind) -> Option<Backend> {
        if !self.query_support(kind) {
            log::debug!("{} does not support {}", self.name(), kind);
            return None;
        }
        let service = Arc::clone(&self.service);
        Some(match kind {
            BackendKind::Playback => {
                Backend::Playback(Box::new(BufferQueuePlayback::new(device, service, self.drain)))
            }
            BackendKind::Capture => Backend::Capture(Box::new(BufferQueueCapture::new(device, service))),
        })
    }
}
