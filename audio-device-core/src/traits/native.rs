use std::any::Any;
use std::sync::Arc;

use crate::models::error::NativeResult;
use crate::models::format::StreamFormat;
use crate::models::state::BackendKind;
use crate::processing::ring_buffer::ChunkHandle;

/// Invoked by the native service, on a thread it owns, each time an enqueued
/// chunk finishes playing or has been filled. Must not block.
pub type CompletionCallback = Arc<dyn Fn() + Send + Sync + 'static>;

/// Which device names a probe asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceProbe {
    AllDevices,
    CaptureDevices,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayState {
    Stopped,
    Paused,
    Playing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordState {
    Stopped,
    Paused,
    Recording,
}

/// Buffers currently held by a native queue, and how many it has completed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferQueueState {
    pub count: u32,
    pub index: u32,
}

/// Optional stream configuration. Services that do not know a setting
/// report `FeatureUnsupported`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeConfiguration {
    /// Route playback as media.
    MediaStream,
    /// Record with the generic input preset.
    GenericRecording,
}

/// A platform audio service that backends talk to.
///
/// Implemented by:
/// - `VirtualAudioService` (software service, `audio-device-virtual`)
pub trait NativeAudioService: Send + Sync {
    fn name(&self) -> &str;

    /// Load or connect to the service. Called once by the factory.
    fn init(&self) -> Result<(), NativeResult>;

    fn deinit(&self);

    fn supports(&self, kind: BackendKind) -> bool;

    /// Device names exposed for the given probe.
    fn device_names(&self, probe: DeviceProbe) -> Vec<String>;

    /// Create and realize an engine object.
    fn create_engine(&self) -> Result<Box<dyn NativeEngine>, NativeResult>;
}

/// Root object of a native service session. Dropping it releases it.
pub trait NativeEngine: Send {
    /// Whether a player or recorder can be created with `format`.
    fn accepts_format(&self, format: &StreamFormat, kind: BackendKind) -> bool;

    fn create_output_mix(&self) -> Result<Box<dyn NativeOutputMix>, NativeResult>;

    /// Create and realize a buffer-queue player feeding `output`, holding
    /// up to `buffers` enqueued chunks.
    fn create_player(
        &self,
        output: &dyn NativeOutputMix,
        format: &StreamFormat,
        buffers: u32,
    ) -> Result<Arc<dyn NativePlayer>, NativeResult>;

    /// Create and realize a buffer-queue recorder from the default input.
    fn create_recorder(
        &self,
        format: &StreamFormat,
        buffers: u32,
    ) -> Result<Arc<dyn NativeRecorder>, NativeResult>;
}

/// Output endpoint that players render into.
pub trait NativeOutputMix: Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

/// Queue of chunks lent to the native service.
pub trait NativeBufferQueue: Send + Sync {
    /// Install or remove (`None`) the completion callback.
    fn register_callback(&self, callback: Option<CompletionCallback>) -> Result<(), NativeResult>;

    fn enqueue(&self, chunk: ChunkHandle) -> Result<(), NativeResult>;

    /// Drop every pending chunk without completing it.
    fn clear(&self) -> Result<(), NativeResult>;

    fn state(&self) -> Result<BufferQueueState, NativeResult>;

    fn set_configuration(&self, _config: NativeConfiguration) -> Result<(), NativeResult> {
        Err(NativeResult::FeatureUnsupported)
    }
}

pub trait NativePlayer: NativeBufferQueue {
    fn play_state(&self) -> Result<PlayState, NativeResult>;
    fn set_play_state(&self, state: PlayState) -> Result<(), NativeResult>;
}

pub trait NativeRecorder: NativeBufferQueue {
    fn record_state(&self) -> Result<RecordState, NativeResult>;
    fn set_record_state(&self, state: RecordState) -> Result<(), NativeResult>;
}
