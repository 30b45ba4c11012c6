use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender};

/// Cooperative stop request shared between a backend and its worker.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A token that is already cancelled; used while no worker runs.
    pub fn cancelled() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Request cancellation. Returns whether it had already been requested.
    pub fn cancel(&self) -> bool {
        self.cancelled.swap(true, Ordering::AcqRel)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Wakeups from the completion callback (and `stop()`) to the mixer thread.
///
/// Bounded to one token per chunk plus one for `stop()`. A full channel
/// already guarantees a pending wakeup, so `post` never blocks.
#[derive(Debug, Clone)]
pub struct ChunkSignal {
    tx: Sender<()>,
    rx: Receiver<()>,
}

impl ChunkSignal {
    pub fn new(chunks: usize) -> Self {
        let (tx, rx) = bounded(chunks + 1);
        Self { tx, rx }
    }

    pub fn post(&self) {
        let _ = self.tx.try_send(());
    }

    /// Block until a token is available.
    pub fn wait(&self) {
        // Both ends live in `self`, so the channel cannot disconnect.
        let _ = self.rx.recv();
    }

    /// Drop pending tokens left over from a previous run.
    pub fn drain(&self) {
        while self.rx.try_recv().is_ok() {}
    }
}
