use std::sync::Arc;

use crate::models::device::Device;
use crate::models::state::BackendKind;
use crate::traits::backend::{Backend, BackendFactory};
use crate::traits::native::DeviceProbe;

/// Backend factories in priority order.
#[derive(Default)]
pub struct BackendRegistry {
    factories: Vec<Arc<dyn BackendFactory>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, factory: Arc<dyn BackendFactory>) {
        self.factories.push(factory);
    }

    /// Initialise every factory, dropping those whose service is missing.
    pub fn init(&mut self) {
        self.factories.retain(|factory| {
            let ok = factory.init();
            if ok {
                log::info!("Initialized backend {}", factory.name());
            } else {
                log::warn!("Failed to initialize backend \"{}\"", factory.name());
            }
            ok
        });
    }

    pub fn deinit(&mut self) {
        for factory in self.factories.drain(..) {
            factory.deinit();
        }
    }

    pub fn factories(&self) -> &[Arc<dyn BackendFactory>] {
        &self.factories
    }

    pub fn playback_factory(&self) -> Option<&Arc<dyn BackendFactory>> {
        self.factory_for(BackendKind::Playback)
    }

    pub fn capture_factory(&self) -> Option<&Arc<dyn BackendFactory>> {
        self.factory_for(BackendKind::Capture)
    }

    fn factory_for(&self, kind: BackendKind) -> Option<&Arc<dyn BackendFactory>> {
        self.factories.iter().find(|f| f.query_support(kind))
    }

    /// Device names from every factory supporting the probe's direction,
    /// in priority order.
    pub fn probe(&self, probe: DeviceProbe) -> Vec<String> {
        let kind = match probe {
            DeviceProbe::AllDevices => BackendKind::Playback,
            DeviceProbe::CaptureDevices => BackendKind::Capture,
        };
        let mut names = Vec::new();
        for factory in self.factories.iter().filter(|f| f.query_support(kind)) {
            factory.probe(probe, &mut names);
        }
        names
    }

    /// Create a backend from the first factory supporting `kind`.
    pub fn create_backend(&self, device: Arc<Device>, kind: BackendKind) -> Option<Backend> {
        self.factory_for(kind)?.create_backend(device, kind)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::backend::factory::BufferQueueBackendFactory;
    use crate::backend::testing::ScriptedService;
    use crate::models::format::DeviceFormat;

    fn factory(service: &ScriptedService) -> Arc<dyn BackendFactory> {
        Arc::new(BufferQueueBackendFactory::new(Arc::new(service.clone())))
    }

    #[test]
    fn init_drops_unavailable_factories() {
        let broken = ScriptedService::new();
        broken.faults().init.store(true, Ordering::SeqCst);
        let working = ScriptedService::new();

        let mut registry = BackendRegistry::new();
        registry.register(factory(&broken));
        registry.register(factory(&working));
        registry.init();

        assert_eq!(registry.factories().len(), 1);
        assert!(registry.playback_factory().is_some());

        registry.deinit();
        assert!(registry.factories().is_empty());
    }

    #[test]
    fn picks_first_factory_supporting_direction() {
        let playback_only = ScriptedService::new();
        playback_only.faults().no_capture.store(true, Ordering::SeqCst);
        let both = ScriptedService::new();

        let mut registry = BackendRegistry::new();
        registry.register(factory(&playback_only));
        registry.register(factory(&both));
        registry.init();

        let device = Arc::new(Device::new(DeviceFormat::default()));
        let capture = registry
            .create_backend(device, BackendKind::Capture)
            .and_then(Backend::into_capture);
        assert!(capture.is_some());

        assert_eq!(
            registry.probe(DeviceProbe::CaptureDevices),
            vec![ScriptedService::DEVICE_NAME]
        );
        assert_eq!(
            registry.probe(DeviceProbe::AllDevices),
            vec![ScriptedService::DEVICE_NAME, ScriptedService::DEVICE_NAME]
        );
    }

    #[test]
    fn empty_registry_creates_nothing() {
        let registry = BackendRegistry::new();
        assert!(registry.probe(DeviceProbe::AllDevices).is_empty());
        assert!(registry
            .create_backend(
                Arc::new(Device::new(DeviceFormat::default())),
                BackendKind::Playback
            )
            .is_none());
    }
}
