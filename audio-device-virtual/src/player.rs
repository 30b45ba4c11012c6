//! Virtual buffer-queue player.
//!
//! Played chunks are copied into a bounded sink that tests and tools read
//! back through a [`PlayerMonitor`].

use std::sync::Arc;

use parking_lot::Mutex;

use audio_device_core::models::error::NativeResult;
use audio_device_core::models::format::StreamFormat;
use audio_device_core::processing::ring_buffer::ChunkHandle;
use audio_device_core::traits::native::{
    BufferQueueState, CompletionCallback, NativeBufferQueue, NativeConfiguration, NativePlayer,
    PlayState,
};

use crate::faults::FaultPlan;
use crate::service::LiveToken;
use crate::stream::{Pacing, ServiceThread, StreamShared};

#[derive(Debug, Default)]
struct RenderedAudio {
    bytes: Vec<u8>,
    chunks: u64,
    limit: usize,
}

impl RenderedAudio {
    fn push(&mut self, chunk: &[u8]) {
        self.chunks += 1;
        let room = self.limit.saturating_sub(self.bytes.len());
        self.bytes.extend_from_slice(&chunk[..chunk.len().min(room)]);
    }
}

pub struct VirtualPlayer {
    // Dropped first: stops and joins the service thread.
    _thread: ServiceThread,
    stream: Arc<StreamShared>,
    rendered: Arc<Mutex<RenderedAudio>>,
    play_state: Mutex<PlayState>,
    configurations: Arc<Mutex<Vec<NativeConfiguration>>>,
    format: StreamFormat,
    faults: Arc<FaultPlan>,
    _live: LiveToken,
}

impl VirtualPlayer {
    pub(crate) fn spawn(
        format: StreamFormat,
        buffers: u32,
        pacing: Pacing,
        retain_bytes: usize,
        faults: Arc<FaultPlan>,
        live: LiveToken,
    ) -> Result<Self, NativeResult> {
        let stream = StreamShared::new(buffers as usize, pacing);
        let rendered = Arc::new(Mutex::new(RenderedAudio {
            limit: retain_bytes,
            ..RenderedAudio::default()
        }));

        let sink = Arc::clone(&rendered);
        let thread = ServiceThread::spawn(
            "virtual-player",
            Arc::clone(&stream),
            format,
            move |chunk: &mut ChunkHandle| chunk.with_bytes(|bytes| sink.lock().push(bytes)),
        )?;

        log::debug!(
            "Virtual player created: {} channels at {} Hz, {} buffers",
            format.num_channels,
            format.sample_rate(),
            buffers
        );
        Ok(Self {
            _thread: thread,
            stream,
            rendered,
            play_state: Mutex::new(PlayState::Stopped),
            configurations: Arc::new(Mutex::new(Vec::new())),
            format,
            faults,
            _live: live,
        })
    }

    pub fn monitor(&self) -> PlayerMonitor {
        PlayerMonitor {
            stream: Arc::clone(&self.stream),
            configurations: Arc::clone(&self.configurations),
            rendered: Arc::clone(&self.rendered),
            format: self.format,
        }
    }
}

impl NativeBufferQueue for VirtualPlayer {
    fn register_callback(&self, callback: Option<CompletionCallback>) -> Result<(), NativeResult> {
        if callback.is_some() {
            FaultPlan::check(&self.faults.fail_register, NativeResult::InternalError)?;
        }
        self.stream.register_callback(callback);
        Ok(())
    }

    fn enqueue(&self, chunk: ChunkHandle) -> Result<(), NativeResult> {
        FaultPlan::check(&self.faults.fail_enqueue, NativeResult::BufferInsufficient)?;
        self.stream.enqueue(chunk)
    }

    fn clear(&self) -> Result<(), NativeResult> {
        self.stream.clear();
        Ok(())
    }

    fn state(&self) -> Result<BufferQueueState, NativeResult> {
        Ok(self.stream.state())
    }

    fn set_configuration(&self, config: NativeConfiguration) -> Result<(), NativeResult> {
        match config {
            NativeConfiguration::MediaStream => {
                self.configurations.lock().push(config);
                Ok(())
            }
            NativeConfiguration::GenericRecording => Err(NativeResult::FeatureUnsupported),
        }
    }
}

impl NativePlayer for VirtualPlayer {
    fn play_state(&self) -> Result<PlayState, NativeResult> {
        Ok(*self.play_state.lock())
    }

    fn set_play_state(&self, state: PlayState) -> Result<(), NativeResult> {
        FaultPlan::check(&self.faults.fail_play_state, NativeResult::ResourceLost)?;
        *self.play_state.lock() = state;
        self.stream.set_active(state == PlayState::Playing);
        Ok(())
    }
}

/// Observer handle onto a player's output. Stays valid after the player is
/// released.
#[derive(Clone)]
pub struct PlayerMonitor {
    stream: Arc<StreamShared>,
    configurations: Arc<Mutex<Vec<NativeConfiguration>>>,
    rendered: Arc<Mutex<RenderedAudio>>,
    format: StreamFormat,
}

impl PlayerMonitor {
    /// Let `chunks` more chunks play under manual pacing.
    pub fn advance(&self, chunks: usize) {
        self.stream.tick(chunks);
    }

    /// Bytes played so far, up to the service's retain limit.
    pub fn rendered(&self) -> Vec<u8> {
        self.rendered.lock().bytes.clone()
    }

    pub fn chunks_played(&self) -> u64 {
        self.rendered.lock().chunks
    }

    /// Chunks queued or playing.
    pub fn queued(&self) -> usize {
        self.stream.state().count as usize
    }

    pub fn completions(&self) -> u32 {
        self.stream.completed()
    }

    /// Optional configurations the backend applied, in order.
    pub fn configurations(&self) -> Vec<NativeConfiguration> {
        self.configurations.lock().clone()
    }

    pub fn has_callback(&self) -> bool {
        self.stream.has_callback()
    }

    pub fn format(&self) -> StreamFormat {
        self.format
    }
}
