//! Chunk queue and service thread shared by the virtual player and recorder.
//!
//! The service thread takes the oldest queued chunk once the stream is
//! active, lets the stream-specific processor read or fill it, waits out the
//! chunk's duration (or a manual tick) and then runs the completion callback.
//! A chunk being processed still counts as queued until its callback is
//! fetched, so a stop-drain poll sees it.

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};

use audio_device_core::models::error::NativeResult;
use audio_device_core::models::format::StreamFormat;
use audio_device_core::processing::latency::frames_to_duration;
use audio_device_core::processing::ring_buffer::ChunkHandle;
use audio_device_core::traits::native::{BufferQueueState, CompletionCallback};

/// How the service thread paces completions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pacing {
    /// One chunk per chunk duration of wall-clock time.
    RealTime,
    /// One chunk per tick handed out through a monitor's `advance()`.
    Manual,
}

struct QueueInner {
    pending: VecDeque<ChunkHandle>,
    capacity: usize,
    in_flight: usize,
    completed: u32,
    callback: Option<CompletionCallback>,
    active: bool,
    ticks: usize,
    shutdown: bool,
}

pub(crate) struct StreamShared {
    inner: Mutex<QueueInner>,
    wake: Condvar,
    pacing: Pacing,
}

impl StreamShared {
    pub fn new(capacity: usize, pacing: Pacing) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(QueueInner {
                pending: VecDeque::with_capacity(capacity),
                capacity,
                in_flight: 0,
                completed: 0,
                callback: None,
                active: false,
                ticks: 0,
                shutdown: false,
            }),
            wake: Condvar::new(),
            pacing,
        })
    }

    pub fn register_callback(&self, callback: Option<CompletionCallback>) {
        self.inner.lock().callback = callback;
    }

    pub fn has_callback(&self) -> bool {
        self.inner.lock().callback.is_some()
    }

    pub fn enqueue(&self, chunk: ChunkHandle) -> Result<(), NativeResult> {
        let mut inner = self.inner.lock();
        if inner.pending.len() + inner.in_flight >= inner.capacity {
            return Err(NativeResult::BufferInsufficient);
        }
        inner.pending.push_back(chunk);
        self.wake.notify_all();
        Ok(())
    }

    /// Drop queued chunks. A chunk already being processed still completes.
    pub fn clear(&self) {
        self.inner.lock().pending.clear();
    }

    pub fn state(&self) -> BufferQueueState {
        let inner = self.inner.lock();
        BufferQueueState {
            count: (inner.pending.len() + inner.in_flight) as u32,
            index: inner.completed,
        }
    }

    pub fn set_active(&self, active: bool) {
        self.inner.lock().active = active;
        self.wake.notify_all();
    }

    /// Allow `n` more completions under manual pacing. Unused ticks carry
    /// over to chunks enqueued later.
    pub fn tick(&self, n: usize) {
        self.inner.lock().ticks += n;
        self.wake.notify_all();
    }

    pub fn completed(&self) -> u32 {
        self.inner.lock().completed
    }

    fn shutdown(&self) {
        self.inner.lock().shutdown = true;
        self.wake.notify_all();
    }

    /// Block until a chunk may be processed. `None` once shut down.
    fn next_chunk(&self) -> Option<ChunkHandle> {
        let mut inner = self.inner.lock();
        loop {
            if inner.shutdown {
                return None;
            }
            let paced = self.pacing == Pacing::RealTime || inner.ticks > 0;
            if inner.active && paced {
                if let Some(chunk) = inner.pending.pop_front() {
                    if self.pacing == Pacing::Manual {
                        inner.ticks -= 1;
                    }
                    inner.in_flight += 1;
                    return Some(chunk);
                }
            }
            self.wake.wait(&mut inner);
        }
    }

    fn finish_chunk(&self) -> Option<CompletionCallback> {
        let mut inner = self.inner.lock();
        inner.in_flight -= 1;
        inner.completed = inner.completed.wrapping_add(1);
        inner.callback.clone()
    }
}

/// A running service thread. Shuts the stream down and joins on drop.
pub(crate) struct ServiceThread {
    shared: Arc<StreamShared>,
    handle: Option<JoinHandle<()>>,
}

impl ServiceThread {
    pub fn spawn(
        name: &str,
        shared: Arc<StreamShared>,
        format: StreamFormat,
        mut process: impl FnMut(&mut ChunkHandle) + Send + 'static,
    ) -> Result<Self, NativeResult> {
        let worker = Arc::clone(&shared);
        let frame_size = format.frame_size().max(1);
        let rate = format.sample_rate();

        let handle = thread::Builder::new()
            .name(name.into())
            .spawn(move || {
                while let Some(mut chunk) = worker.next_chunk() {
                    process(&mut chunk);
                    let period = frames_to_duration((chunk.len() / frame_size) as u64, rate);
                    drop(chunk);

                    if worker.pacing == Pacing::RealTime {
                        thread::sleep(period);
                    }
                    // Called without the queue lock; the callback may enqueue.
                    if let Some(callback) = worker.finish_chunk() {
                        callback();
                    }
                }
                log::trace!("Service thread exiting");
            })
            .map_err(|e| {
                log::error!("Failed to spawn service thread: {}", e);
                NativeResult::ResourceError
            })?;

        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }
}

impl Drop for ServiceThread {
    fn drop(&mut self) {
        self.shared.shutdown();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Service thread panicked");
            }
        }
    }
}
