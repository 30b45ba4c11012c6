//! Virtual buffer-queue recorder.
//!
//! Fills every chunk with a sine tone in the stream's sample format, the same
//! value on every channel, with phase carried across chunks.

use std::f64::consts::TAU;
use std::sync::Arc;

use parking_lot::Mutex;

use audio_device_core::models::error::NativeResult;
use audio_device_core::models::format::{SampleRepresentation, SampleType, StreamFormat};
use audio_device_core::processing::ring_buffer::ChunkHandle;
use audio_device_core::traits::native::{
    BufferQueueState, CompletionCallback, NativeBufferQueue, NativeConfiguration, NativeRecorder,
    RecordState,
};

use crate::faults::FaultPlan;
use crate::service::LiveToken;
use crate::stream::{Pacing, ServiceThread, StreamShared};

/// Sample type matching a stream's bit depth and representation.
pub fn sample_type_of(format: &StreamFormat) -> Option<SampleType> {
    use SampleRepresentation::*;
    match (format.representation, format.bits_per_sample) {
        (UnsignedInt, 8) => Some(SampleType::U8),
        (SignedInt, 8) => Some(SampleType::I8),
        (UnsignedInt, 16) => Some(SampleType::U16),
        (SignedInt, 16) => Some(SampleType::I16),
        (UnsignedInt, 32) => Some(SampleType::U32),
        (SignedInt, 32) => Some(SampleType::I32),
        (Float, 32) => Some(SampleType::F32),
        _ => None,
    }
}

/// Write `value` (in -1.0..=1.0) into `out` as one native-endian sample.
pub fn encode_sample(sample_type: SampleType, value: f32, out: &mut [u8]) {
    let v = f64::from(value.clamp(-1.0, 1.0));
    match sample_type {
        SampleType::U8 => out[0] = (v * 127.0 + 128.0).round() as u8,
        SampleType::I8 => out[0] = (v * 127.0).round() as i8 as u8,
        SampleType::U16 => out.copy_from_slice(&((v * 32767.0 + 32768.0).round() as u16).to_ne_bytes()),
        SampleType::I16 => out.copy_from_slice(&((v * 32767.0).round() as i16).to_ne_bytes()),
        SampleType::U32 => out.copy_from_slice(
            &((v * 2_147_483_647.0 + 2_147_483_648.0).round() as u32).to_ne_bytes(),
        ),
        SampleType::I32 => out.copy_from_slice(&((v * 2_147_483_647.0).round() as i32).to_ne_bytes()),
        SampleType::F32 => out.copy_from_slice(&(v as f32).to_ne_bytes()),
    }
}

/// Sine generator writing interleaved frames.
#[derive(Debug, Clone)]
pub struct ToneGenerator {
    sample_type: SampleType,
    channels: usize,
    amplitude: f32,
    step: f64,
    phase: f64,
}

impl ToneGenerator {
    pub fn new(format: &StreamFormat, frequency: f32, amplitude: f32) -> Option<Self> {
        let sample_type = sample_type_of(format)?;
        let rate = format.sample_rate();
        if rate == 0 || format.num_channels == 0 {
            return None;
        }
        Some(Self {
            sample_type,
            channels: format.num_channels as usize,
            amplitude,
            step: TAU * f64::from(frequency) / f64::from(rate),
            phase: 0.0,
        })
    }

    pub fn fill(&mut self, buffer: &mut [u8]) {
        let sample_bytes = self.sample_type.bytes();
        for frame in buffer.chunks_exact_mut(sample_bytes * self.channels) {
            let value = self.amplitude * self.phase.sin() as f32;
            for sample in frame.chunks_exact_mut(sample_bytes) {
                encode_sample(self.sample_type, value, sample);
            }
            self.phase = (self.phase + self.step) % TAU;
        }
    }
}

pub struct VirtualRecorder {
    // Dropped first: stops and joins the service thread.
    _thread: ServiceThread,
    stream: Arc<StreamShared>,
    record_state: Mutex<RecordState>,
    configurations: Arc<Mutex<Vec<NativeConfiguration>>>,
    faults: Arc<FaultPlan>,
    _live: LiveToken,
}

impl VirtualRecorder {
    pub(crate) fn spawn(
        format: StreamFormat,
        buffers: u32,
        pacing: Pacing,
        mut tone: ToneGenerator,
        faults: Arc<FaultPlan>,
        live: LiveToken,
    ) -> Result<Self, NativeResult> {
        let stream = StreamShared::new(buffers as usize, pacing);
        let thread = ServiceThread::spawn(
            "virtual-recorder",
            Arc::clone(&stream),
            format,
            move |chunk: &mut ChunkHandle| chunk.with_bytes_mut(|bytes| tone.fill(bytes)),
        )?;

        log::debug!(
            "Virtual recorder created: {} channels at {} Hz, {} buffers",
            format.num_channels,
            format.sample_rate(),
            buffers
        );
        Ok(Self {
            _thread: thread,
            stream,
            record_state: Mutex::new(RecordState::Stopped),
            configurations: Arc::new(Mutex::new(Vec::new())),
            faults,
            _live: live,
        })
    }

    pub fn monitor(&self) -> RecorderMonitor {
        RecorderMonitor {
            stream: Arc::clone(&self.stream),
            configurations: Arc::clone(&self.configurations),
        }
    }
}

impl NativeBufferQueue for VirtualRecorder {
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
            NativeConfiguration::GenericRecording => {
                self.configurations.lock().push(config);
                Ok(())
            }
            NativeConfiguration::MediaStream => Err(NativeResult::FeatureUnsupported),
        }
    }
}

impl NativeRecorder for VirtualRecorder {
    fn record_state(&self) -> Result<RecordState, NativeResult> {
        Ok(*self.record_state.lock())
    }

    fn set_record_state(&self, state: RecordState) -> Result<(), NativeResult> {
        FaultPlan::check(&self.faults.fail_record_state, NativeResult::ResourceLost)?;
        *self.record_state.lock() = state;
        self.stream.set_active(state == RecordState::Recording);
        Ok(())
    }
}

/// Observer handle onto a recorder's queue.
#[derive(Clone)]
pub struct RecorderMonitor {
    stream: Arc<StreamShared>,
    configurations: Arc<Mutex<Vec<NativeConfiguration>>>,
}

impl RecorderMonitor {
    /// Let `chunks` more chunks be filled under manual pacing.
    pub fn advance(&self, chunks: usize) {
        self.stream.tick(chunks);
    }

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
}
