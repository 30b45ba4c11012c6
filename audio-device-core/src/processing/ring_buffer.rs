use std::cell::UnsafeCell;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::models::error::RingBufferError;

/// A run of physically contiguous chunk slots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkSpan {
    /// Index of the first slot.
    pub slot: usize,
    /// Number of chunks in the span.
    pub len: usize,
}

impl ChunkSpan {
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// The readable or writable region of a ring as at most two spans, in
/// traversal order: up to the end of storage, then from its start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RingVector {
    pub first: ChunkSpan,
    pub second: ChunkSpan,
}

impl RingVector {
    pub fn len(&self) -> usize {
        self.first.len + self.second.len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Physical slot indices covered by the vector, in order.
    pub fn slots(&self) -> impl Iterator<Item = usize> {
        let first = self.first.slot..self.first.slot + self.first.len;
        let second = self.second.slot..self.second.slot + self.second.len;
        first.chain(second)
    }
}

/// Single-producer/single-consumer ring of fixed-size chunks.
///
/// Cursors are monotonic counters; slot indices are taken modulo the
/// power-of-two slot count. The write cursor is only moved by the producer
/// and the read cursor only by the consumer, so neither needs a lock.
///
/// Chunk memory is shared between both sides and the native service. Which
/// side may touch a chunk follows from the cursors: free chunks belong to the
/// producer, committed chunks to the consumer.
pub struct RingBuffer {
    storage: Box<[UnsafeCell<u8>]>,
    write_pos: AtomicUsize,
    read_pos: AtomicUsize,
    slot_count: usize,
    capacity: usize,
    chunk_bytes: usize,
}

// SAFETY: cursor updates are atomic, and chunk access is partitioned between
// the single producer and single consumer by those cursors.
unsafe impl Send for RingBuffer {}
unsafe impl Sync for RingBuffer {}

impl RingBuffer {
    /// Allocate a ring for `chunk_count` chunks of `chunk_bytes` bytes.
    ///
    /// Storage is rounded up to a power-of-two number of slots. With
    /// `write_first`, the writer may only fill `chunk_count` chunks ahead of
    /// the reader; otherwise every slot is usable.
    pub fn new(
        chunk_count: usize,
        chunk_bytes: usize,
        write_first: bool,
    ) -> Result<Self, RingBufferError> {
        let slot_count = chunk_count.max(1).next_power_of_two();
        let total = slot_count
            .checked_mul(chunk_bytes)
            .ok_or(RingBufferError::Overflow {
                chunks: chunk_count,
                chunk_bytes,
            })?;

        let mut storage = Vec::new();
        storage
            .try_reserve_exact(total)
            .map_err(|_| RingBufferError::AllocationFailed(total))?;
        storage.resize_with(total, || UnsafeCell::new(0));

        Ok(Self {
            storage: storage.into_boxed_slice(),
            write_pos: AtomicUsize::new(0),
            read_pos: AtomicUsize::new(0),
            slot_count,
            capacity: if write_first { chunk_count.max(1) } else { slot_count },
            chunk_bytes,
        })
    }

    /// Usable capacity in chunks.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Physical chunk slots backing the ring.
    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    pub fn chunk_bytes(&self) -> usize {
        self.chunk_bytes
    }

    /// Chunks committed by the writer and not yet consumed.
    pub fn read_space(&self) -> usize {
        let w = self.write_pos.load(Ordering::Acquire);
        let r = self.read_pos.load(Ordering::Acquire);
        w.wrapping_sub(r)
    }

    /// Chunks the writer can fill without overtaking the reader.
    pub fn write_space(&self) -> usize {
        self.capacity.saturating_sub(self.read_space())
    }

    /// Commit `count` written chunks. Writer side only.
    pub fn write_advance(&self, count: usize) {
        debug_assert!(count <= self.write_space());
        self.write_pos.fetch_add(count, Ordering::AcqRel);
    }

    /// Release `count` consumed chunks. Reader side only.
    pub fn read_advance(&self, count: usize) {
        debug_assert!(count <= self.read_space());
        self.read_pos.fetch_add(count, Ordering::AcqRel);
    }

    /// Rewind both cursors to empty. Neither side may be active.
    pub fn reset(&self) {
        self.write_pos.store(0, Ordering::Release);
        self.read_pos.store(0, Ordering::Release);
    }

    /// The writable region, without moving any cursor.
    pub fn write_vector(&self) -> RingVector {
        let start = self.write_pos.load(Ordering::Acquire);
        self.vector(start, self.write_space())
    }

    /// The readable region, without moving any cursor.
    pub fn read_vector(&self) -> RingVector {
        let start = self.read_pos.load(Ordering::Acquire);
        self.vector(start, self.read_space())
    }

    fn vector(&self, start: usize, len: usize) -> RingVector {
        let slot = start & (self.slot_count - 1);
        let first_len = len.min(self.slot_count - slot);
        RingVector {
            first: ChunkSpan {
                slot,
                len: first_len,
            },
            second: ChunkSpan {
                slot: 0,
                len: len - first_len,
            },
        }
    }

    fn span_ptr(&self, span: ChunkSpan) -> (*mut u8, usize) {
        assert!(
            span.slot + span.len <= self.slot_count,
            "span {span:?} exceeds {} slots",
            self.slot_count
        );
        let offset = span.slot * self.chunk_bytes;
        let len = span.len * self.chunk_bytes;
        // SAFETY: offset + len is within storage (checked above).
        let ptr = unsafe { UnsafeCell::raw_get(self.storage.as_ptr().add(offset)) };
        (ptr, len)
    }

    /// Bytes of the chunks in `span`.
    ///
    /// # Safety
    /// The caller must own those chunks for reading: no other party may be
    /// writing them for the lifetime of the slice.
    pub unsafe fn span_bytes(&self, span: ChunkSpan) -> &[u8] {
        let (ptr, len) = self.span_ptr(span);
        std::slice::from_raw_parts(ptr, len)
    }

    /// Mutable bytes of the chunks in `span`.
    ///
    /// # Safety
    /// The caller must own those chunks exclusively (e.g. the producer over a
    /// span of its write vector) for the lifetime of the slice.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn span_bytes_mut(&self, span: ChunkSpan) -> &mut [u8] {
        let (ptr, len) = self.span_ptr(span);
        std::slice::from_raw_parts_mut(ptr, len)
    }

    /// Hand a single chunk slot to a native buffer queue.
    pub(crate) fn chunk(self: &Arc<Self>, slot: usize) -> ChunkHandle {
        ChunkHandle {
            ring: Arc::clone(self),
            slot,
        }
    }
}

impl fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity)
            .field("slot_count", &self.slot_count)
            .field("chunk_bytes", &self.chunk_bytes)
            .field("read_space", &self.read_space())
            .finish()
    }
}

/// One chunk of a ring, lent to a native buffer queue.
///
/// Handles are only created by backends when a chunk is enqueued, and the
/// queue holding one has sole access to the chunk until it signals
/// completion: playback queues read the mixed audio, capture queues fill it.
pub struct ChunkHandle {
    ring: Arc<RingBuffer>,
    slot: usize,
}

impl ChunkHandle {
    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn len(&self) -> usize {
        self.ring.chunk_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        // SAFETY: the queue holding this handle owns the chunk until completion.
        let bytes = unsafe { self.ring.span_bytes(self.span()) };
        f(bytes)
    }

    pub fn with_bytes_mut<R>(&mut self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        // SAFETY: as above, and `&mut self` keeps this handle's access unique.
        let bytes = unsafe { self.ring.span_bytes_mut(self.span()) };
        f(bytes)
    }

    fn span(&self) -> ChunkSpan {
        ChunkSpan {
            slot: self.slot,
            len: 1,
        }
    }
}

impl fmt::Debug for ChunkHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkHandle")
            .field("slot", &self.slot)
            .field("len", &self.len())
            .finish()
    }
}
