//! Fixed, pre-allocated buffer arena for the slot ring.
//!
//! Allocated once at `Pipeline::init` and reused for the life of the
//! pipeline. Each of the `D` slots owns `buffers_per_slot` block-sized
//! buffers; the scheduling protocol in `scheduler` guarantees that at most
//! one party (one worker, or the caller after `read_next`) touches a given
//! buffer at a time, so access below is expressed with `UnsafeCell` rather
//! than a lock — taking a lock per block read would serialize the one thing
//! this subsystem exists to parallelize.

use crate::error::{PipelineError, Result};
use std::cell::UnsafeCell;

/// One slot's worth of buffers.
struct SlotBuffers {
    buffers: Vec<UnsafeCell<Vec<u8>>>,
}

// Safety: callers only ever reach a buffer through `BufferPool::buffer_mut`/
// `buffer`, and the scheduling protocol (see `scheduler::Shared`) guarantees
// that for a given (slot, buffer_index) only one thread holds a reference at
// a time: a worker while it owns the slot, the caller once it has advanced
// past it. No two parties ever alias the same buffer concurrently.
unsafe impl Sync for SlotBuffers {}

pub struct BufferPool {
    slots: Vec<SlotBuffers>,
    block_size: usize,
    buffers_per_slot: usize,
}

impl BufferPool {
    pub fn new(depth: usize, buffers_per_slot: usize, block_size: usize) -> Result<Self> {
        if buffers_per_slot == 0 {
            return Err(PipelineError::BufferAlloc(
                "buffers_per_slot must be non-zero".into(),
            ));
        }

        let slots = (0..depth)
            .map(|_| SlotBuffers {
                buffers: (0..buffers_per_slot)
                    .map(|_| UnsafeCell::new(vec![0u8; block_size]))
                    .collect(),
            })
            .collect();

        Ok(Self {
            slots,
            block_size,
            buffers_per_slot,
        })
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn buffers_per_slot(&self) -> usize {
        self.buffers_per_slot
    }

    pub fn depth(&self) -> usize {
        self.slots.len()
    }

    /// Mutable access to one buffer. Only sound to call while the caller
    /// holds exclusive logical ownership of `(slot, buffer_index)` per the
    /// scheduling protocol (worker mid-read, or caller post-`read_next`).
    ///
    /// # Safety
    /// The caller must not hold any other reference (mutable or shared) to
    /// this same `(slot, buffer_index)` pair concurrently with this one.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn buffer_mut(&self, slot: usize, buffer_index: usize) -> &mut [u8] {
        &mut *self.slots[slot].buffers[buffer_index].get()
    }

    /// Shared access to one buffer, same safety contract as `buffer_mut`
    /// minus the exclusivity (any number of readers, no concurrent writer).
    ///
    /// # Safety
    /// The caller must not hold a concurrent mutable reference to this
    /// same `(slot, buffer_index)` pair.
    pub unsafe fn buffer(&self, slot: usize, buffer_index: usize) -> &[u8] {
        &*self.slots[slot].buffers[buffer_index].get()
    }

    /// Writes and verifies a repeating pattern across every buffer in the
    /// pool, to catch bad RAM before a long scrub run. Run once at `init`
    /// unless disabled.
    pub fn self_test(&self) -> Result<()> {
        const PATTERN: u8 = 0xA5;

        for slot in 0..self.depth() {
            for idx in 0..self.buffers_per_slot {
                // Safety: self-test runs before any worker or caller thread
                // has been started, so no other party can be touching this
                // buffer concurrently.
                let buf = unsafe { self.buffer_mut(slot, idx) };
                buf.fill(PATTERN);
                for &byte in buf.iter() {
                    if byte != PATTERN {
                        return Err(PipelineError::SelfTestFailed {
                            slot,
                            buffer: idx,
                            expected: PATTERN,
                            found: byte,
                        });
                    }
                }
                buf.fill(0);
            }
        }
        Ok(())
    }
}
