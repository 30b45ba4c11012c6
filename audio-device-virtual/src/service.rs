//! The virtual native audio service and its engine.

use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use audio_device_core::models::error::NativeResult;
use audio_device_core::models::format::{SampleRepresentation, StreamFormat};
use audio_device_core::models::state::BackendKind;
use audio_device_core::traits::native::{
    DeviceProbe, NativeAudioService, NativeEngine, NativeOutputMix, NativePlayer, NativeRecorder,
};

use crate::faults::FaultPlan;
use crate::player::{PlayerMonitor, VirtualPlayer};
use crate::recorder::{sample_type_of, RecorderMonitor, ToneGenerator, VirtualRecorder};
use crate::stream::Pacing;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum VirtualConfigError {
    #[error("at least one playback device name is required")]
    NoPlaybackDevice,

    #[error("capture is enabled but no capture device name is given")]
    NoCaptureDevice,

    #[error("channel limit must be positive")]
    NoChannels,

    #[error("invalid tone: {0}")]
    InvalidTone(String),
}

/// Behaviour of a [`VirtualAudioService`].
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualConfig {
    /// Device names reported for playback probes.
    pub playback_devices: Vec<String>,

    /// Device names reported for capture probes.
    pub capture_devices: Vec<String>,

    /// Whether capture backends can be created.
    pub capture: bool,

    pub pacing: Pacing,

    /// Most channels a player accepts. Layouts above stereo also need a
    /// speaker mask.
    pub max_playback_channels: u32,

    pub max_capture_channels: u32,

    /// Whether 32-bit float samples are accepted.
    pub float_samples: bool,

    /// Recorder tone frequency in Hz.
    pub tone_hz: f32,

    /// Recorder tone amplitude, 0.0 to 1.0.
    pub tone_amplitude: f32,

    /// Played bytes kept per player for inspection.
    pub retain_bytes: usize,
}

impl VirtualConfig {
    pub fn validate(&self) -> Result<(), VirtualConfigError> {
        if self.playback_devices.is_empty() {
            return Err(VirtualConfigError::NoPlaybackDevice);
        }
        if self.capture && self.capture_devices.is_empty() {
            return Err(VirtualConfigError::NoCaptureDevice);
        }
        if self.max_playback_channels == 0 || self.max_capture_channels == 0 {
            return Err(VirtualConfigError::NoChannels);
        }
        if self.tone_hz.is_nan() || self.tone_hz <= 0.0 {
            return Err(VirtualConfigError::InvalidTone(format!(
                "frequency {} Hz",
                self.tone_hz
            )));
        }
        if !(0.0..=1.0).contains(&self.tone_amplitude) {
            return Err(VirtualConfigError::InvalidTone(format!(
                "amplitude {}",
                self.tone_amplitude
            )));
        }
        Ok(())
    }

    /// Manual pacing with otherwise default settings.
    pub fn manual() -> Self {
        Self {
            pacing: Pacing::Manual,
            ..Self::default()
        }
    }
}

impl Default for VirtualConfig {
    fn default() -> Self {
        Self {
            playback_devices: vec!["Virtual Output".into()],
            capture_devices: vec!["Virtual Input".into()],
            capture: true,
            pacing: Pacing::RealTime,
            max_playback_channels: 8,
            max_capture_channels: 2,
            float_samples: true,
            tone_hz: 440.0,
            tone_amplitude: 0.5,
            retain_bytes: 1 << 20,
        }
    }
}

/// Keeps one of the service's live-object counts up to date.
pub(crate) struct LiveToken(Arc<AtomicUsize>);

impl LiveToken {
    fn acquire(count: &Arc<AtomicUsize>) -> Self {
        count.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(count))
    }
}

impl Drop for LiveToken {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

struct ServiceShared {
    config: VirtualConfig,
    faults: Arc<FaultPlan>,
    initialized: AtomicBool,
    engines: Arc<AtomicUsize>,
    streams: Arc<AtomicUsize>,
    last_player: Mutex<Option<PlayerMonitor>>,
    last_recorder: Mutex<Option<RecorderMonitor>>,
}

/// Software audio service whose players and recorders run on their own
/// threads.
///
/// Cloning yields another handle to the same service.
#[derive(Clone)]
pub struct VirtualAudioService {
    shared: Arc<ServiceShared>,
}

impl VirtualAudioService {
    pub fn new(config: VirtualConfig) -> Result<Self, VirtualConfigError> {
        config.validate()?;
        Ok(Self {
            shared: Arc::new(ServiceShared {
                config,
                faults: Arc::new(FaultPlan::default()),
                initialized: AtomicBool::new(false),
                engines: Arc::new(AtomicUsize::new(0)),
                streams: Arc::new(AtomicUsize::new(0)),
                last_player: Mutex::new(None),
                last_recorder: Mutex::new(None),
            }),
        })
    }

    pub fn config(&self) -> &VirtualConfig {
        &self.shared.config
    }

    pub fn faults(&self) -> &FaultPlan {
        &self.shared.faults
    }

    /// Engines not yet released.
    pub fn open_engines(&self) -> usize {
        self.shared.engines.load(Ordering::SeqCst)
    }

    /// Players and recorders not yet released.
    pub fn open_streams(&self) -> usize {
        self.shared.streams.load(Ordering::SeqCst)
    }

    pub fn last_player(&self) -> Option<PlayerMonitor> {
        self.shared.last_player.lock().clone()
    }

    pub fn last_recorder(&self) -> Option<RecorderMonitor> {
        self.shared.last_recorder.lock().clone()
    }
}

impl NativeAudioService for VirtualAudioService {
    fn name(&self) -> &str {
        "Virtual"
    }

    fn init(&self) -> Result<(), NativeResult> {
        FaultPlan::check(&self.shared.faults.fail_init, NativeResult::ResourceError)?;
        self.shared.initialized.store(true, Ordering::SeqCst);
        log::info!("Virtual audio service initialized");
        Ok(())
    }

    fn deinit(&self) {
        self.shared.initialized.store(false, Ordering::SeqCst);
    }

    fn supports(&self, kind: BackendKind) -> bool {
        match kind {
            BackendKind::Playback => true,
            BackendKind::Capture => self.shared.config.capture,
        }
    }

    fn device_names(&self, probe: DeviceProbe) -> Vec<String> {
        match probe {
            DeviceProbe::AllDevices => self.shared.config.playback_devices.clone(),
            DeviceProbe::CaptureDevices if self.shared.config.capture => {
                self.shared.config.capture_devices.clone()
            }
            DeviceProbe::CaptureDevices => Vec::new(),
        }
    }

    fn create_engine(&self) -> Result<Box<dyn NativeEngine>, NativeResult> {
        if !self.shared.initialized.load(Ordering::SeqCst) {
            return Err(NativeResult::PreconditionsViolated);
        }
        FaultPlan::check(&self.shared.faults.fail_engine, NativeResult::ResourceError)?;
        Ok(Box::new(VirtualEngine {
            service: Arc::clone(&self.shared),
            _live: LiveToken::acquire(&self.shared.engines),
        }))
    }
}

struct VirtualEngine {
    service: Arc<ServiceShared>,
    _live: LiveToken,
}

impl NativeEngine for VirtualEngine {
    fn accepts_format(&self, format: &StreamFormat, kind: BackendKind) -> bool {
        let config = &self.service.config;
        let max_channels = match kind {
            BackendKind::Playback => config.max_playback_channels,
            BackendKind::Capture => config.max_capture_channels,
        };
        if format.sample_rate() == 0 || format.num_channels == 0 || format.num_channels > max_channels {
            return false;
        }
        if format.num_channels > 2 && format.channel_mask == 0 {
            return false;
        }
        if format.representation == SampleRepresentation::Float && !config.float_samples {
            return false;
        }
        sample_type_of(format).is_some()
    }

    fn create_output_mix(&self) -> Result<Box<dyn NativeOutputMix>, NativeResult> {
        FaultPlan::check(&self.service.faults.fail_output_mix, NativeResult::ResourceError)?;
        Ok(Box::new(VirtualOutputMix))
    }

    fn create_player(
        &self,
        output: &dyn NativeOutputMix,
        format: &StreamFormat,
        buffers: u32,
    ) -> Result<Arc<dyn NativePlayer>, NativeResult> {
        if output.as_any().downcast_ref::<VirtualOutputMix>().is_none() {
            return Err(NativeResult::SourceSinkIncompatible);
        }
        if !self.accepts_format(format, BackendKind::Playback) {
            return Err(NativeResult::ContentUnsupported);
        }
        FaultPlan::check(&self.service.faults.fail_stream, NativeResult::ResourceError)?;

        let config = &self.service.config;
        let player = VirtualPlayer::spawn(
            *format,
            buffers,
            config.pacing,
            config.retain_bytes,
            Arc::clone(&self.service.faults),
            LiveToken::acquire(&self.service.streams),
        )?;
        *self.service.last_player.lock() = Some(player.monitor());
        Ok(Arc::new(player))
    }

    fn create_recorder(
        &self,
        format: &StreamFormat,
        buffers: u32,
    ) -> Result<Arc<dyn NativeRecorder>, NativeResult> {
        if !self.service.config.capture {
            return Err(NativeResult::FeatureUnsupported);
        }
        if !self.accepts_format(format, BackendKind::Capture) {
            return Err(NativeResult::ContentUnsupported);
        }
        FaultPlan::check(&self.service.faults.fail_stream, NativeResult::ResourceError)?;

        let config = &self.service.config;
        let tone = ToneGenerator::new(format, config.tone_hz, config.tone_amplitude)
            .ok_or(NativeResult::ContentUnsupported)?;
        let recorder = VirtualRecorder::spawn(
            *format,
            buffers,
            config.pacing,
            tone,
            Arc::clone(&self.service.faults),
            LiveToken::acquire(&self.service.streams),
        )?;
        *self.service.last_recorder.lock() = Some(recorder.monitor());
        Ok(Arc::new(recorder))
    }
}

struct VirtualOutputMix;

impl NativeOutputMix for VirtualOutputMix {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use audio_device_core::models::format::{ChannelLayout, DeviceFormat, SampleType};

    fn stream(channels: ChannelLayout, sample_type: SampleType) -> StreamFormat {
        StreamFormat::from_device(&DeviceFormat {
            channels,
            sample_type,
            ..DeviceFormat::default()
        })
    }

    fn initialized(config: VirtualConfig) -> VirtualAudioService {
        let service = VirtualAudioService::new(config).unwrap();
        service.init().unwrap();
        service
    }

    #[test]
    fn default_config_is_valid() {
        assert!(VirtualConfig::default().validate().is_ok());
        assert_eq!(VirtualConfig::manual().pacing, Pacing::Manual);
    }

    #[test]
    fn rejects_bad_config() {
        let config = VirtualConfig {
            playback_devices: Vec::new(),
            ..VirtualConfig::default()
        };
        assert_eq!(
            VirtualAudioService::new(config).err(),
            Some(VirtualConfigError::NoPlaybackDevice)
        );

        let config = VirtualConfig {
            tone_amplitude: 1.5,
            ..VirtualConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(VirtualConfigError::InvalidTone(_))
        ));
    }

    #[test]
    fn engine_requires_init() {
        let service = VirtualAudioService::new(VirtualConfig::default()).unwrap();
        assert_eq!(
            service.create_engine().err(),
            Some(NativeResult::PreconditionsViolated)
        );

        service.init().unwrap();
        let engine = service.create_engine().unwrap();
        assert_eq!(service.open_engines(), 1);
        drop(engine);
        assert_eq!(service.open_engines(), 0);
    }

    #[test]
    fn format_support_follows_config() {
        let service = initialized(VirtualConfig {
            float_samples: false,
            ..VirtualConfig::default()
        });
        let engine = service.create_engine().unwrap();

        assert!(engine.accepts_format(&stream(ChannelLayout::X51, SampleType::I16), BackendKind::Playback));
        assert!(!engine.accepts_format(&stream(ChannelLayout::X51, SampleType::I16), BackendKind::Capture));
        assert!(!engine.accepts_format(&stream(ChannelLayout::Stereo, SampleType::F32), BackendKind::Playback));
        assert!(!engine.accepts_format(
            &stream(ChannelLayout::Ambi3D { order: 1 }, SampleType::I16),
            BackendKind::Playback
        ));
    }

    #[test]
    fn capture_can_be_disabled() {
        let service = initialized(VirtualConfig {
            capture: false,
            ..VirtualConfig::default()
        });
        assert!(service.supports(BackendKind::Playback));
        assert!(!service.supports(BackendKind::Capture));
        assert!(service.device_names(DeviceProbe::CaptureDevices).is_empty());

        let engine = service.create_engine().unwrap();
        assert_eq!(
            engine
                .create_recorder(&stream(ChannelLayout::Mono, SampleType::I16), 4)
                .err(),
            Some(NativeResult::FeatureUnsupported)
        );
    }

    #[test]
    fn streams_are_counted_until_released() {
        let service = initialized(VirtualConfig::manual());
        let engine = service.create_engine().unwrap();
        let mix = engine.create_output_mix().unwrap();

        let player = engine
            .create_player(mix.as_ref(), &stream(ChannelLayout::Stereo, SampleType::I16), 3)
            .unwrap();
        assert_eq!(service.open_streams(), 1);
        assert!(service.last_player().is_some());

        drop(player);
        assert_eq!(service.open_streams(), 0);
    }
}
