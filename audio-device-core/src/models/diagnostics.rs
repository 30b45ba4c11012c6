use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of backend counters, for debugging stream behaviour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackendDiagnostics {
    pub chunks_mixed: u64,
    pub chunks_enqueued: u64,
    pub completions: u64,
    pub chunks_captured: u64,
    pub chunks_requeued: u64,
    pub disconnects: u64,
}

/// Lock-free counters shared with the mixer thread and completion callback.
#[derive(Debug, Default)]
pub struct DiagnosticsCounters {
    chunks_mixed: AtomicU64,
    chunks_enqueued: AtomicU64,
    completions: AtomicU64,
    chunks_captured: AtomicU64,
    chunks_requeued: AtomicU64,
    disconnects: AtomicU64,
}

impl DiagnosticsCounters {
    pub fn add_mixed(&self, chunks: usize) {
        self.chunks_mixed.fetch_add(chunks as u64, Ordering::Relaxed);
    }

    pub fn add_enqueued(&self) {
        self.chunks_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_completion(&self) {
        self.completions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_captured(&self) {
        self.chunks_captured.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_requeued(&self) {
        self.chunks_requeued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> BackendDiagnostics {
        BackendDiagnostics {
            chunks_mixed: self.chunks_mixed.load(Ordering::Relaxed),
            chunks_enqueued: self.chunks_enqueued.load(Ordering::Relaxed),
            completions: self.completions.load(Ordering::Relaxed),
            chunks_captured: self.chunks_captured.load(Ordering::Relaxed),
            chunks_requeued: self.chunks_requeued.load(Ordering::Relaxed),
            disconnects: self.disconnects.load(Ordering::Relaxed),
        }
    }
}
