use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::signal::{CancellationToken, ChunkSignal};
use super::{configure_optional, drain_queue, negotiate_format, resolve_device_name, unavailable};
use crate::models::config::StopDrainPolicy;
use crate::models::device::Device;
use crate::models::diagnostics::{BackendDiagnostics, DiagnosticsCounters};
use crate::models::error::{BackendError, NativeError, NativeResultExt};
use crate::models::state::{BackendKind, BackendState};
use crate::processing::latency::{buffered_latency, ClockLatency};
use crate::processing::ring_buffer::RingBuffer;
use crate::traits::backend::{DeviceBackend, PlaybackBackend};
use crate::traits::native::{
    CompletionCallback, DeviceProbe, NativeAudioService, NativeConfiguration, NativeEngine,
    NativeOutputMix, NativePlayer, PlayState,
};

/// Playback through a native buffer-queue player.
///
/// A dedicated mixer thread renders into free ring chunks and enqueues them;
/// the native service plays them in order and reports each finished chunk
/// through the completion callback, which frees it for the mixer again:
///
/// ```text
/// [AudioMixer] → mixer thread → [RingBuffer] → enqueue → [NativePlayer]
///                     ↑                                        │
///                     └──── ChunkSignal ← completion callback ─┘
/// ```
pub struct BufferQueuePlayback {
    device: Arc<Device>,
    service: Arc<dyn NativeAudioService>,
    drain: StopDrainPolicy,
    state: BackendState,
    counters: Arc<DiagnosticsCounters>,
    frame_size: usize,

    // Released in declaration order: the worker before the stream, the
    // stream before the output mix, the output mix before the engine.
    worker: Option<JoinHandle<()>>,
    cancel: CancellationToken,
    signal: Option<ChunkSignal>,
    player: Option<Arc<dyn NativePlayer>>,
    ring: Option<Arc<RingBuffer>>,
    output_mix: Option<Box<dyn NativeOutputMix>>,
    engine: Option<Box<dyn NativeEngine>>,
}

impl BufferQueuePlayback {
    pub fn new(
        device: Arc<Device>,
        service: Arc<dyn NativeAudioService>,
        drain: StopDrainPolicy,
    ) -> Self {
        Self {
            device,
            service,
            drain,
            state: BackendState::Closed,
            counters: Arc::new(DiagnosticsCounters::default()),
            frame_size: 0,
            worker: None,
            cancel: CancellationToken::cancelled(),
            signal: None,
            player: None,
            ring: None,
            output_mix: None,
            engine: None,
        }
    }

    /// Bytes per frame of the configured stream, or 0 before reset.
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    fn set_state(&mut self, state: BackendState) {
        self.state = state;
        self.device.notify_state(state);
    }

    /// Tear down the stream endpoint and ring, keeping the engine.
    fn release_stream(&mut self) {
        if let Some(player) = self.player.take() {
            let _ = player
                .register_callback(None)
                .logged("bufferQueue->RegisterCallback");
        }
        self.signal = None;
        self.ring = None;
        self.frame_size = 0;
    }

    fn completion_callback(&self, ring: &Arc<RingBuffer>, signal: &ChunkSignal) -> CompletionCallback {
        let ring = Arc::clone(ring);
        let signal = signal.clone();
        let counters = Arc::clone(&self.counters);
        Arc::new(move || {
            // The queue plays in order, so the oldest committed chunk is done.
            if ring.read_space() > 0 {
                ring.read_advance(1);
            }
            counters.add_completion();
            signal.post();
        })
    }
}

impl DeviceBackend for BufferQueuePlayback {
    fn kind(&self) -> BackendKind {
        BackendKind::Playback
    }

    fn state(&self) -> BackendState {
        self.state
    }

    fn device(&self) -> &Arc<Device> {
        &self.device
    }

    fn open(&mut self, name: Option<&str>) -> Result<(), BackendError> {
        if self.state.is_open() {
            self.close();
        }

        let name = name.or(self.device.preferred_name());
        let name = resolve_device_name(self.service.as_ref(), DeviceProbe::AllDevices, name)?;

        // On failure the locals drop in reverse order, releasing whatever
        // was already acquired.
        let engine = self
            .service
            .create_engine()
            .logged("slCreateEngine")
            .map_err(unavailable)?;
        let output_mix = engine
            .create_output_mix()
            .logged("engine->CreateOutputMix")
            .map_err(unavailable)?;

        self.engine = Some(engine);
        self.output_mix = Some(output_mix);

        {
            let mut state = self.device.lock();
            state.name = Some(name.clone());
            self.device.mark_connected(&mut state);
        }
        log::info!("Opened playback device \"{}\" on {}", name, self.service.name());
        self.set_state(BackendState::Open);
        Ok(())
    }

    fn start(&mut self) -> Result<(), BackendError> {
        self.device.ensure_connected()?;
        if self.state.is_running() {
            return Ok(());
        }

        let (Some(ring), Some(player), Some(signal)) =
            (self.ring.clone(), self.player.clone(), self.signal.clone())
        else {
            return Err(BackendError::StartFailed("playback is not configured".into()));
        };

        ring.reset();
        signal.drain();

        let callback = self.completion_callback(&ring, &signal);
        player
            .register_callback(Some(callback))
            .logged("bufferQueue->RegisterCallback")
            .map_err(|e| BackendError::StartFailed(e.to_string()))?;

        let cancel = CancellationToken::new();
        let worker = MixerWorker {
            device: Arc::clone(&self.device),
            ring,
            player: Arc::clone(&player),
            signal,
            cancel: cancel.clone(),
            counters: Arc::clone(&self.counters),
        };

        let handle = thread::Builder::new()
            .name("audio-mixer".into())
            .spawn(move || worker.run())
            .map_err(|e| {
                let _ = player
                    .register_callback(None)
                    .logged("bufferQueue->RegisterCallback");
                BackendError::StartFailed(format!("failed to spawn mixer thread: {}", e))
            })?;

        self.cancel = cancel;
        self.worker = Some(handle);
        self.set_state(BackendState::Running);
        Ok(())
    }

    fn stop(&mut self) {
        if self.cancel.cancel() {
            return;
        }

        if let Some(signal) = &self.signal {
            signal.post();
        }
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                log::error!("Mixer thread panicked");
            }
        }

        let drained = match self.player.clone() {
            Some(player) => {
                let stopped = player
                    .set_play_state(PlayState::Stopped)
                    .logged("player->SetPlayState")
                    .and_then(|_| player.clear().logged("bufferQueue->Clear"))
                    .and_then(|_| {
                        player
                            .register_callback(None)
                            .logged("bufferQueue->RegisterCallback")
                    });
                stopped.is_ok() && drain_queue(player.as_ref(), &self.drain)
            }
            None => true,
        };

        // Chunks left in the native queue still borrow ring slots, so the
        // ring cannot be reused; a new reset() is needed before starting.
        if !drained {
            log::warn!("Native queue not drained, releasing the playback stream");
            self.release_stream();
            self.set_state(BackendState::Open);
            return;
        }
        self.set_state(BackendState::Configured);
    }

    fn close(&mut self) {
        if self.state.is_closed() {
            return;
        }
        self.stop();
        self.release_stream();
        self.output_mix = None;
        self.engine = None;
        self.set_state(BackendState::Closed);
    }

    fn clock_latency(&self) -> ClockLatency {
        let state = self.device.lock();
        let latency = self
            .ring
            .as_ref()
            .map(|ring| {
                buffered_latency(ring.read_space(), state.format.update_size, state.format.sample_rate)
            })
            .unwrap_or_default();
        ClockLatency {
            clock_time: state.clock_time(),
            latency,
        }
    }

    fn diagnostics(&self) -> BackendDiagnostics {
        self.counters.snapshot()
    }
}

impl PlaybackBackend for BufferQueuePlayback {
    fn reset(&mut self) -> Result<(), BackendError> {
        if self.state.is_closed() {
            return Err(BackendError::ResetFailed("playback is not open".into()));
        }
        self.stop();
        self.release_stream();
        if self.state != BackendState::Open {
            self.set_state(BackendState::Open);
        }

        let (Some(engine), Some(output_mix)) = (self.engine.as_deref(), self.output_mix.as_deref())
        else {
            return Err(BackendError::ResetFailed("no native engine".into()));
        };

        let requested = self.device.format();
        requested.validate().map_err(BackendError::ResetFailed)?;
        let (format, stream) = negotiate_format(engine, &requested, BackendKind::Playback)?;
        let chunks = format.update_count as usize;

        let ring = Arc::new(RingBuffer::new(chunks, format.chunk_bytes(), true)?);
        let signal = ChunkSignal::new(chunks);

        let player = engine
            .create_player(output_mix, &stream, format.update_count)
            .logged("engine->CreateAudioPlayer")
            .map_err(|e| BackendError::ResetFailed(e.to_string()))?;
        configure_optional(player.as_ref(), NativeConfiguration::MediaStream);

        let callback = self.completion_callback(&ring, &signal);
        player
            .register_callback(Some(callback))
            .logged("bufferQueue->RegisterCallback")
            .map_err(|e| BackendError::ResetFailed(e.to_string()))?;

        if format != requested {
            self.device.set_format(format);
        }
        self.frame_size = format.frame_size();
        self.ring = Some(ring);
        self.signal = Some(signal);
        self.player = Some(player);

        log::debug!(
            "Playback configured: {} Hz, {:?} {:?}, {} x {} frames",
            format.sample_rate,
            format.channels,
            format.sample_type,
            format.update_count,
            format.update_size
        );
        self.set_state(BackendState::Configured);
        Ok(())
    }
}

impl Drop for BufferQueuePlayback {
    fn drop(&mut self) {
        self.close();
    }
}

/// State moved onto the mixer thread.
struct MixerWorker {
    device: Arc<Device>,
    ring: Arc<RingBuffer>,
    player: Arc<dyn NativePlayer>,
    signal: ChunkSignal,
    cancel: CancellationToken,
    counters: Arc<DiagnosticsCounters>,
}

impl MixerWorker {
    fn run(self) {
        log::debug!("Mixer thread started for device {}", self.device.id());

        while !self.cancel.is_cancelled() && self.device.is_connected() {
            if self.ring.write_space() == 0 {
                if self.ensure_playing().is_err() {
                    self.disconnect("Failed to start playback");
                    break;
                }
                if self.ring.write_space() == 0 {
                    self.signal.wait();
                    continue;
                }
            }

            let vector = self.ring.write_vector();
            {
                let mut state = self.device.lock();
                let update_size = state.format.update_size as usize;
                for span in [vector.first, vector.second] {
                    if span.is_empty() {
                        continue;
                    }
                    // SAFETY: spans of the write vector are free chunks, and
                    // this thread is the ring's only producer.
                    let bytes = unsafe { self.ring.span_bytes_mut(span) };
                    state.mix(bytes, span.len * update_size);
                }
                self.ring.write_advance(vector.len());
            }
            self.counters.add_mixed(vector.len());

            for slot in vector.slots() {
                if self
                    .player
                    .enqueue(self.ring.chunk(slot))
                    .logged("bufferQueue->Enqueue")
                    .is_err()
                {
                    self.disconnect("Failed to queue audio");
                    break;
                }
                self.counters.add_enqueued();
            }
        }

        log::debug!("Mixer thread exiting for device {}", self.device.id());
    }

    fn ensure_playing(&self) -> Result<(), NativeError> {
        let state = self.player.play_state().logged("player->GetPlayState")?;
        if state != PlayState::Playing {
            self.player
                .set_play_state(PlayState::Playing)
                .logged("player->SetPlayState")?;
        }
        Ok(())
    }

    fn disconnect(&self, reason: &str) {
        if self.device.handle_disconnect(reason) {
            self.counters.add_disconnect();
        }
    }
}
