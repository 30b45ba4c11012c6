//! Scripted native service for backend tests.
//!
//! Completions are delivered by hand with [`ScriptedQueue::complete`], and
//! every native call can be made to fail through [`Faults`].

use std::any::Any;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::models::error::NativeResult;
use crate::models::format::{SampleRepresentation, StreamFormat};
use crate::models::state::BackendKind;
use crate::processing::ring_buffer::ChunkHandle;
use crate::traits::native::{
    BufferQueueState, CompletionCallback, DeviceProbe, NativeAudioService, NativeBufferQueue,
    NativeConfiguration, NativeEngine, NativeOutputMix, NativePlayer, NativeRecorder, PlayState,
    RecordState,
};

/// Poll `cond` until it holds, failing the test after two seconds.
pub(crate) fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(1));
    }
}

pub(crate) fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

const ACCEPT_ALL: u8 = 0;
const ACCEPT_STEREO_I16: u8 = 1;
const ACCEPT_NONE: u8 = 2;

fn fail(flag: &AtomicBool, result: NativeResult) -> Result<(), NativeResult> {
    if flag.load(Ordering::SeqCst) {
        Err(result)
    } else {
        Ok(())
    }
}

/// Switches that make native calls fail.
#[derive(Default)]
pub(crate) struct Faults {
    pub init: AtomicBool,
    pub engine: AtomicBool,
    pub output_mix: AtomicBool,
    pub player: AtomicBool,
    pub register: AtomicBool,
    pub enqueue: AtomicBool,
    pub play_state: AtomicBool,
    pub record_state: AtomicBool,
    /// `clear()` succeeds but leaves buffers queued.
    pub stuck_clear: AtomicBool,
    pub no_capture: AtomicBool,
    formats: AtomicU8,
}

impl Faults {
    pub fn reject_formats_except_stereo_i16(&self) {
        self.formats.store(ACCEPT_STEREO_I16, Ordering::SeqCst);
    }

    pub fn reject_all_formats(&self) {
        self.formats.store(ACCEPT_NONE, Ordering::SeqCst);
    }

    fn accepts(&self, format: &StreamFormat) -> bool {
        match self.formats.load(Ordering::SeqCst) {
            ACCEPT_ALL => true,
            ACCEPT_STEREO_I16 => {
                format.num_channels == 2
                    && format.bits_per_sample == 16
                    && format.representation == SampleRepresentation::SignedInt
            }
            _ => false,
        }
    }
}

struct Shared {
    faults: Faults,
    queues: Mutex<Vec<Arc<ScriptedQueue>>>,
    /// Engines and output mixes not yet released.
    live: AtomicUsize,
}

/// Keeps `Shared::live` up to date for one native object.
struct LiveToken(Arc<Shared>);

impl LiveToken {
    fn new(shared: &Arc<Shared>) -> Self {
        shared.live.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(shared))
    }
}

impl Drop for LiveToken {
    fn drop(&mut self) {
        self.0.live.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Clone)]
pub(crate) struct ScriptedService {
    shared: Arc<Shared>,
}

impl ScriptedService {
    pub const DEVICE_NAME: &'static str = "Scripted Device";

    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                faults: Faults::default(),
                queues: Mutex::new(Vec::new()),
                live: AtomicUsize::new(0),
            }),
        }
    }

    pub fn faults(&self) -> &Faults {
        &self.shared.faults
    }

    /// The most recently created player or recorder.
    pub fn last_queue(&self) -> Arc<ScriptedQueue> {
        self.shared
            .queues
            .lock()
            .last()
            .cloned()
            .expect("no player or recorder created")
    }

    pub fn queue_count(&self) -> usize {
        self.shared.queues.lock().len()
    }

    pub fn live_objects(&self) -> usize {
        self.shared.live.load(Ordering::SeqCst)
    }
}

impl NativeAudioService for ScriptedService {
    fn name(&self) -> &str {
        "Scripted"
    }

    fn init(&self) -> Result<(), NativeResult> {
        fail(&self.shared.faults.init, NativeResult::ResourceError)
    }

    fn deinit(&self) {}

    fn supports(&self, kind: BackendKind) -> bool {
        kind == BackendKind::Playback || !self.shared.faults.no_capture.load(Ordering::SeqCst)
    }

    fn device_names(&self, _probe: DeviceProbe) -> Vec<String> {
        vec![Self::DEVICE_NAME.to_string()]
    }

    fn create_engine(&self) -> Result<Box<dyn NativeEngine>, NativeResult> {
        fail(&self.shared.faults.engine, NativeResult::ResourceError)?;
        Ok(Box::new(ScriptedEngine {
            shared: Arc::clone(&self.shared),
            _live: LiveToken::new(&self.shared),
        }))
    }
}

struct ScriptedEngine {
    shared: Arc<Shared>,
    _live: LiveToken,
}

impl ScriptedEngine {
    fn create_queue(&self, kind: BackendKind) -> Arc<ScriptedQueue> {
        let queue = Arc::new(ScriptedQueue {
            shared: Arc::clone(&self.shared),
            kind,
            inner: Mutex::new(QueueInner::default()),
        });
        self.shared.queues.lock().push(Arc::clone(&queue));
        queue
    }
}

impl NativeEngine for ScriptedEngine {
    fn accepts_format(&self, format: &StreamFormat, _kind: BackendKind) -> bool {
        self.shared.faults.accepts(format)
    }

    fn create_output_mix(&self) -> Result<Box<dyn NativeOutputMix>, NativeResult> {
        fail(&self.shared.faults.output_mix, NativeResult::ResourceError)?;
        Ok(Box::new(ScriptedOutputMix {
            _live: LiveToken::new(&self.shared),
        }))
    }

    fn create_player(
        &self,
        output: &dyn NativeOutputMix,
        _format: &StreamFormat,
        _buffers: u32,
    ) -> Result<Arc<dyn NativePlayer>, NativeResult> {
        if output.as_any().downcast_ref::<ScriptedOutputMix>().is_none() {
            return Err(NativeResult::ParameterInvalid);
        }
        fail(&self.shared.faults.player, NativeResult::ContentUnsupported)?;
        Ok(self.create_queue(BackendKind::Playback))
    }

    fn create_recorder(
        &self,
        _format: &StreamFormat,
        _buffers: u32,
    ) -> Result<Arc<dyn NativeRecorder>, NativeResult> {
        fail(&self.shared.faults.player, NativeResult::ContentUnsupported)?;
        Ok(self.create_queue(BackendKind::Capture))
    }
}

struct ScriptedOutputMix {
    _live: LiveToken,
}

impl NativeOutputMix for ScriptedOutputMix {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct QueueInner {
    pending: VecDeque<ChunkHandle>,
    callback: Option<CompletionCallback>,
    play_state: PlayState,
    record_state: RecordState,
    enqueued: Vec<usize>,
    played: Vec<Vec<u8>>,
    configurations: Vec<NativeConfiguration>,
    fill_value: u8,
}

impl Default for QueueInner {
    fn default() -> Self {
        Self {
            pending: VecDeque::new(),
            callback: None,
            play_state: PlayState::Stopped,
            record_state: RecordState::Stopped,
            enqueued: Vec::new(),
            played: Vec::new(),
            configurations: Vec::new(),
            fill_value: 0,
        }
    }
}

/// Player or recorder whose buffers complete only when told to.
pub(crate) struct ScriptedQueue {
    shared: Arc<Shared>,
    kind: BackendKind,
    inner: Mutex<QueueInner>,
}

impl ScriptedQueue {
    pub fn pending(&self) -> usize {
        self.inner.lock().pending.len()
    }

    /// Slot of every chunk ever enqueued, in order.
    pub fn enqueued_slots(&self) -> Vec<usize> {
        self.inner.lock().enqueued.clone()
    }

    /// Bytes of every chunk completed by a player.
    pub fn played(&self) -> Vec<Vec<u8>> {
        self.inner.lock().played.clone()
    }

    pub fn current_play_state(&self) -> PlayState {
        self.inner.lock().play_state
    }

    pub fn current_record_state(&self) -> RecordState {
        self.inner.lock().record_state
    }

    pub fn configurations(&self) -> Vec<NativeConfiguration> {
        self.inner.lock().configurations.clone()
    }

    pub fn has_callback(&self) -> bool {
        self.inner.lock().callback.is_some()
    }

    /// Finish up to `n` queued chunks in order, invoking the callback for
    /// each. Recorders fill chunk `k` with the byte `k` (starting at 1).
    pub fn complete(&self, n: usize) -> usize {
        let mut done = 0;
        while done < n {
            let (mut chunk, callback, fill) = {
                let mut inner = self.inner.lock();
                let Some(chunk) = inner.pending.pop_front() else {
                    break;
                };
                inner.fill_value = inner.fill_value.wrapping_add(1);
                (chunk, inner.callback.clone(), inner.fill_value)
            };

            match self.kind {
                BackendKind::Playback => {
                    let bytes = chunk.with_bytes(|b| b.to_vec());
                    self.inner.lock().played.push(bytes);
                }
                BackendKind::Capture => chunk.with_bytes_mut(|b| b.fill(fill)),
            }
            drop(chunk);

            if let Some(callback) = callback {
                callback();
            }
            done += 1;
        }
        done
    }
}

impl NativeBufferQueue for ScriptedQueue {
    fn register_callback(&self, callback: Option<CompletionCallback>) -> Result<(), NativeResult> {
        if callback.is_some() {
            fail(&self.shared.faults.register, NativeResult::InternalError)?;
        }
        self.inner.lock().callback = callback;
        Ok(())
    }

    fn enqueue(&self, chunk: ChunkHandle) -> Result<(), NativeResult> {
        fail(&self.shared.faults.enqueue, NativeResult::BufferInsufficient)?;
        let mut inner = self.inner.lock();
        inner.enqueued.push(chunk.slot());
        inner.pending.push_back(chunk);
        Ok(())
    }

    fn clear(&self) -> Result<(), NativeResult> {
        if !self.shared.faults.stuck_clear.load(Ordering::SeqCst) {
            self.inner.lock().pending.clear();
        }
        Ok(())
    }

    fn state(&self) -> Result<BufferQueueState, NativeResult> {
        let inner = self.inner.lock();
        Ok(BufferQueueState {
            count: inner.pending.len() as u32,
            index: inner.enqueued.len() as u32,
        })
    }

    fn set_configuration(&self, config: NativeConfiguration) -> Result<(), NativeResult> {
        self.inner.lock().configurations.push(config);
        Ok(())
    }
}

impl NativePlayer for ScriptedQueue {
    fn play_state(&self) -> Result<PlayState, NativeResult> {
        Ok(self.inner.lock().play_state)
    }

    fn set_play_state(&self, state: PlayState) -> Result<(), NativeResult> {
        fail(&self.shared.faults.play_state, NativeResult::ResourceLost)?;
        self.inner.lock().play_state = state;
        Ok(())
    }
}

impl NativeRecorder for ScriptedQueue {
    fn record_state(&self) -> Result<RecordState, NativeResult> {
        Ok(self.inner.lock().record_state)
    }

    fn set_record_state(&self, state: RecordState) -> Result<(), NativeResult> {
        fail(&self.shared.faults.record_state, NativeResult::ResourceLost)?;
        self.inner.lock().record_state = state;
        Ok(())
    }
}
