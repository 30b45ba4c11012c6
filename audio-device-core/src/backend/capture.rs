use std::sync::Arc;

use super::{configure_optional, resolve_device_name, unavailable};
use crate::models::device::Device;
use crate::models::diagnostics::{BackendDiagnostics, DiagnosticsCounters};
use crate::models::error::{BackendError, NativeResultExt};
use crate::models::format::{DeviceFormat, StreamFormat};
use crate::models::state::{BackendKind, BackendState};
use crate::processing::latency::ClockLatency;
use crate::processing::ring_buffer::{ChunkSpan, RingBuffer};
use crate::traits::backend::{CaptureBackend, DeviceBackend};
use crate::traits::native::{
    CompletionCallback, DeviceProbe, NativeAudioService, NativeConfiguration, NativeEngine,
    NativeRecorder, RecordState,
};

/// Chunk size and count for a capture stream.
///
/// Chunks are 10 to 50 ms long and at least 100 ms are buffered in total.
pub fn capture_chunking(format: &DeviceFormat) -> (u32, u32) {
    let rate = u64::from(format.sample_rate);
    let requested = u64::from(format.update_count) * u64::from(format.update_size);
    let length = requested.max(rate / 10);
    let min_len = rate / 100;
    let update_len = (requested / 3).clamp(min_len, min_len * 5).max(1);
    let count = length.div_ceil(update_len);

    let to_u32 = |v: u64| u32::try_from(v).unwrap_or(u32::MAX);
    (to_u32(update_len), to_u32(count))
}

/// Capture through a native buffer-queue recorder.
///
/// Every ring chunk is lent to the recorder up front. The service fills them
/// in order and the completion callback commits each one; `capture_samples`
/// copies committed chunks out and hands each drained chunk straight back.
/// No thread is owned here.
pub struct BufferQueueCapture {
    device: Arc<Device>,
    service: Arc<dyn NativeAudioService>,
    state: BackendState,
    counters: Arc<DiagnosticsCounters>,
    frame_size: usize,
    update_size: usize,
    /// Frames already copied out of the oldest committed chunk.
    sample_offset: usize,

    recorder: Option<Arc<dyn NativeRecorder>>,
    ring: Option<Arc<RingBuffer>>,
    engine: Option<Box<dyn NativeEngine>>,
}

impl BufferQueueCapture {
    pub fn new(device: Arc<Device>, service: Arc<dyn NativeAudioService>) -> Self {
        Self {
            device,
            service,
            state: BackendState::Closed,
            counters: Arc::new(DiagnosticsCounters::default()),
            frame_size: 0,
            update_size: 0,
            sample_offset: 0,
            recorder: None,
            ring: None,
            engine: None,
        }
    }

    fn set_state(&mut self, state: BackendState) {
        self.state = state;
        self.device.notify_state(state);
    }

    fn completion_callback(&self, ring: &Arc<RingBuffer>) -> CompletionCallback {
        let ring = Arc::clone(ring);
        let counters = Arc::clone(&self.counters);
        Arc::new(move || {
            // A queued chunk has been filled.
            if ring.write_space() > 0 {
                ring.write_advance(1);
            }
            counters.add_completion();
        })
    }

    fn disconnect(&self, reason: &str) {
        if self.device.handle_disconnect(reason) {
            self.counters.add_disconnect();
        }
    }
}

impl DeviceBackend for BufferQueueCapture {
    fn kind(&self) -> BackendKind {
        BackendKind::Capture
    }

    fn state(&self) -> BackendState {
        self.state
    }

    fn device(&self) -> &Arc<Device> {
        &self.device
    }

    /// Open the recorder and configure the stream in one step.
    ///
    /// The update size and count are recomputed and written back to the
    /// device; the written-back values are the ones in effect.
    fn open(&mut self, name: Option<&str>) -> Result<(), BackendError> {
        if self.state.is_open() {
            self.close();
        }

        let name = name.or(self.device.preferred_name());
        let name = resolve_device_name(self.service.as_ref(), DeviceProbe::CaptureDevices, name)?;
        let requested = self.device.format();
        requested.validate().map_err(BackendError::InvalidValue)?;

        let engine = self
            .service
            .create_engine()
            .logged("slCreateEngine")
            .map_err(unavailable)?;

        let (update_size, chunk_count) = capture_chunking(&requested);
        let stream = StreamFormat::from_device(&requested);
        if !engine.accepts_format(&stream, BackendKind::Capture) {
            return Err(BackendError::InvalidValue(format!(
                "unsupported capture format: {} Hz {:?} {:?}",
                requested.sample_rate, requested.channels, requested.sample_type
            )));
        }

        let mut format = DeviceFormat {
            update_size,
            update_count: chunk_count,
            ..requested
        };
        let ring = Arc::new(RingBuffer::new(
            chunk_count as usize,
            format.chunk_bytes(),
            false,
        )?);
        format.update_count = u32::try_from(ring.capacity()).unwrap_or(u32::MAX);

        let recorder = engine
            .create_recorder(&stream, format.update_count)
            .logged("engine->CreateAudioRecorder")
            .map_err(unavailable)?;
        configure_optional(recorder.as_ref(), NativeConfiguration::GenericRecording);

        recorder
            .register_callback(Some(self.completion_callback(&ring)))
            .logged("bufferQueue->RegisterCallback")
            .map_err(unavailable)?;

        for slot in ring.write_vector().slots() {
            recorder
                .enqueue(ring.chunk(slot))
                .logged("bufferQueue->Enqueue")
                .map_err(unavailable)?;
            self.counters.add_enqueued();
        }

        {
            let mut state = self.device.lock();
            state.name = Some(name.clone());
            state.format = format;
            self.device.mark_connected(&mut state);
        }
        self.frame_size = format.frame_size();
        self.update_size = format.update_size as usize;
        self.sample_offset = 0;
        self.engine = Some(engine);
        self.ring = Some(ring);
        self.recorder = Some(recorder);

        log::info!(
            "Opened capture device \"{}\" on {}: {} x {} frames at {} Hz",
            name,
            self.service.name(),
            format.update_count,
            format.update_size,
            format.sample_rate
        );
        self.set_state(BackendState::Configured);
        Ok(())
    }

    fn start(&mut self) -> Result<(), BackendError> {
        self.device.ensure_connected()?;
        let Some(recorder) = self.recorder.clone() else {
            return Err(BackendError::StartFailed("capture is not open".into()));
        };

        if let Err(e) = recorder
            .set_record_state(RecordState::Recording)
            .logged("record->SetRecordState")
        {
            self.disconnect("Failed to start capture");
            return Err(BackendError::StartFailed(e.to_string()));
        }

        self.set_state(BackendState::Running);
        Ok(())
    }

    fn stop(&mut self) {
        if !self.state.is_running() {
            return;
        }
        if let Some(recorder) = &self.recorder {
            let _ = recorder
                .set_record_state(RecordState::Paused)
                .logged("record->SetRecordState");
        }
        self.set_state(BackendState::Configured);
    }

    fn close(&mut self) {
        if self.state.is_closed() {
            return;
        }
        self.stop();
        if let Some(recorder) = self.recorder.take() {
            let _ = recorder
                .set_record_state(RecordState::Stopped)
                .logged("record->SetRecordState");
            let _ = recorder
                .register_callback(None)
                .logged("bufferQueue->RegisterCallback");
            let _ = recorder.clear().logged("bufferQueue->Clear");
        }
        self.ring = None;
        self.engine = None;
        self.sample_offset = 0;
        self.set_state(BackendState::Closed);
    }

    /// Capture latency is not tracked; only the clock is reported.
    fn clock_latency(&self) -> ClockLatency {
        let state = self.device.lock();
        ClockLatency {
            clock_time: state.clock_time(),
            latency: Default::default(),
        }
    }

    fn diagnostics(&self) -> BackendDiagnostics {
        self.counters.snapshot()
    }
}

impl CaptureBackend for BufferQueueCapture {
    fn capture_samples(&mut self, buffer: &mut [u8], frames: usize) -> Result<(), BackendError> {
        self.device.ensure_connected()?;
        let (Some(ring), Some(recorder)) = (self.ring.clone(), self.recorder.clone()) else {
            return Err(BackendError::InvalidDevice("capture is not open".into()));
        };

        let available = self.available_samples();
        if frames > available {
            return Err(BackendError::InvalidValue(format!(
                "requested {frames} frames, only {available} available"
            )));
        }
        let frame_size = self.frame_size;
        if buffer.len() < frames * frame_size {
            return Err(BackendError::InvalidValue(format!(
                "buffer holds {} bytes, need {}",
                buffer.len(),
                frames * frame_size
            )));
        }

        let mut slots = ring.read_vector().slots();
        let mut slot = slots.next();
        let mut done = 0;
        while done < frames {
            let Some(current) = slot else {
                break;
            };
            let rem = (frames - done).min(self.update_size - self.sample_offset);

            // SAFETY: committed chunks belong to the reader until they are
            // re-enqueued below.
            let chunk = unsafe { ring.span_bytes(chunk_span(current)) };
            let src = &chunk[self.sample_offset * frame_size..][..rem * frame_size];
            buffer[done * frame_size..][..rem * frame_size].copy_from_slice(src);

            self.sample_offset += rem;
            done += rem;

            if self.sample_offset == self.update_size {
                self.sample_offset = 0;
                ring.read_advance(1);
                self.counters.add_captured();

                if recorder
                    .enqueue(ring.chunk(current))
                    .logged("bufferQueue->Enqueue")
                    .is_err()
                {
                    self.disconnect("Failed to update capture buffer");
                    return Err(BackendError::InvalidDevice(
                        "failed to re-enqueue capture chunk".into(),
                    ));
                }
                self.counters.add_requeued();
                slot = slots.next();
            }
        }

        Ok(())
    }

    fn available_samples(&self) -> usize {
        self.ring
            .as_ref()
            .map(|ring| (ring.read_space() * self.update_size).saturating_sub(self.sample_offset))
            .unwrap_or(0)
    }
}

impl Drop for BufferQueueCapture {
    fn drop(&mut self) {
        self.close();
    }
}

fn chunk_span(slot: usize) -> ChunkSpan {
    ChunkSpan { slot, len: 1 }
}
