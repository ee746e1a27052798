// Copyright (c) 2024 Contributors to the membrane project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use core::alloc::Layout;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicU32, Ordering};

use membrane_bb_elementary::allocator::{AllocationError, BaseAllocator};
use membrane_bb_elementary::relative_pointer::RelativePointer;
use membrane_bb_elementary::relocatable_container::RelocatableContainer;
use membrane_bb_lock_free::mpmc::index_pool::IndexPool;
use membrane_log::{fail, fatal_panic};

use crate::constants::CHUNK_MEMORY_ALIGNMENT;

/// Snapshot of one pool's state. `min_free_chunks` is a monotonically
/// non-increasing low-water mark, the other fields are momentary values.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct MemPoolInfo {
    pub used_chunks: u32,
    pub min_free_chunks: u32,
    pub number_of_chunks: u32,
    pub chunk_size: u64,
}

/// A lock-free pool of equally sized chunks carved out of donated segment
/// memory. The free-list is a multi-producer multi-consumer
/// [`IndexPool`], the chunk array is addressed segment-relative so that
/// every attached process resolves the same chunk.
///
/// Like every relocatable container a [`MemPool`] is constructed in two
/// phases and must not be moved after [`MemPool::init()`].
#[derive(Debug)]
#[repr(C)]
pub struct MemPool {
    raw_memory: RelativePointer<u8>,
    chunk_size: u64,
    number_of_chunks: u32,
    used_chunks: AtomicU32,
    min_free: AtomicU32,
    free_indices: IndexPool,
}

impl MemPool {
    /// Creates the pool head. A chunk size below
    /// [`CHUNK_MEMORY_ALIGNMENT`], a chunk size that is no multiple of it
    /// or a chunk count of zero is a fatal configuration error.
    pub fn new_uninit(chunk_size: u64, number_of_chunks: u32) -> Self {
        let origin = "MemPool::new_uninit";
        if chunk_size < CHUNK_MEMORY_ALIGNMENT as u64
            || chunk_size % CHUNK_MEMORY_ALIGNMENT as u64 != 0
        {
            fatal_panic!(from origin,
                "The chunk size {} must be a non-zero multiple of the chunk memory alignment {}.",
                chunk_size, CHUNK_MEMORY_ALIGNMENT);
        }

        if number_of_chunks == 0 {
            fatal_panic!(from origin, "A mempool must contain at least one chunk.");
        }

        Self {
            raw_memory: RelativePointer::null(),
            chunk_size,
            number_of_chunks,
            used_chunks: AtomicU32::new(0),
            min_free: AtomicU32::new(number_of_chunks),
            free_indices: unsafe { IndexPool::new_uninit(number_of_chunks as usize) },
        }
    }

    /// Acquires the free-list memory from `management_allocator` and the
    /// chunk array from `chunk_memory_allocator`. Both allocators must hand
    /// out memory belonging to a registered segment.
    ///
    /// # Safety
    ///
    ///  * must be called exactly once, after the pool reached its final
    ///    memory location
    ///
    pub unsafe fn init<Management: BaseAllocator, ChunkMemory: BaseAllocator>(
        &mut self,
        management_allocator: &Management,
        chunk_memory_allocator: &ChunkMemory,
    ) -> Result<(), AllocationError> {
        fail!(from self, when self.free_indices.init(management_allocator),
            "Unable to initialize the free-list of the mempool.");

        let chunk_memory = fail!(from self, when chunk_memory_allocator.allocate(
                Layout::from_size_align_unchecked(
                    (self.chunk_size * self.number_of_chunks as u64) as usize,
                    CHUNK_MEMORY_ALIGNMENT)),
            "Unable to acquire the chunk memory of the mempool.");

        let chunk_memory = chunk_memory.cast::<u8>();
        self.raw_memory = match RelativePointer::from_ptr(chunk_memory) {
            Some(pointer) => pointer,
            None => fatal_panic!(from self,
                "The donated chunk memory at {:#x} does not belong to any registered segment.",
                chunk_memory.as_ptr() as usize),
        };

        Ok(())
    }

    fn base_ptr(&self) -> NonNull<u8> {
        match self.raw_memory.as_ptr() {
            Some(base) => base,
            None => fatal_panic!(from self,
                "The segment holding the chunk memory is no longer attached."),
        }
    }

    /// Acquires one chunk. Returns [`None`] when the pool is out of
    /// chunks, which is a normal runtime condition.
    pub fn get_chunk(&self) -> Option<NonNull<u8>> {
        let index = self.free_indices.acquire()?;

        let used = self.used_chunks.fetch_add(1, Ordering::Relaxed) + 1;
        self.min_free
            .fetch_min(self.number_of_chunks - used, Ordering::Relaxed);

        Some(unsafe {
            NonNull::new_unchecked(Self::index_to_pointer(
                index,
                self.chunk_size,
                self.base_ptr().as_ptr(),
            ))
        })
    }

    /// Returns a chunk to the pool. A pointer outside the pool's chunk
    /// array or one that is not chunk-aligned is a fatal corruption error.
    pub fn free_chunk(&self, chunk: NonNull<u8>) {
        let base = self.base_ptr().as_ptr() as usize;
        let position = chunk.as_ptr() as usize;
        let pool_bytes = self.chunk_size as usize * self.number_of_chunks as usize;

        if position < base
            || position >= base + pool_bytes
            || (position - base) % self.chunk_size as usize != 0
        {
            fatal_panic!(from self,
                "The chunk {:#x} does not belong to this mempool, refusing to corrupt the free-list.",
                position);
        }

        self.free_indices.release(Self::pointer_to_index(
            chunk.as_ptr(),
            self.chunk_size,
            base as *const u8,
        ));
        self.used_chunks.fetch_sub(1, Ordering::Relaxed);
    }

    /// O(1) conversion from a chunk index to its address.
    pub fn index_to_pointer(index: u32, chunk_size: u64, raw_memory_base: *mut u8) -> *mut u8 {
        unsafe { raw_memory_base.add(index as usize * chunk_size as usize) }
    }

    /// O(1) conversion from a chunk address to its index.
    pub fn pointer_to_index(chunk: *const u8, chunk_size: u64, raw_memory_base: *const u8) -> u32 {
        ((chunk as usize - raw_memory_base as usize) / chunk_size as usize) as u32
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn number_of_chunks(&self) -> u32 {
        self.number_of_chunks
    }

    pub fn used_chunks(&self) -> u32 {
        self.used_chunks.load(Ordering::Relaxed)
    }

    /// The fewest free chunks ever observed, a provisioning aid.
    pub fn min_free(&self) -> u32 {
        self.min_free.load(Ordering::Relaxed)
    }

    pub fn info(&self) -> MemPoolInfo {
        MemPoolInfo {
            used_chunks: self.used_chunks(),
            min_free_chunks: self.min_free(),
            number_of_chunks: self.number_of_chunks,
            chunk_size: self.chunk_size,
        }
    }

    /// Bytes [`MemPool::init()`] requests from the management allocator.
    pub fn management_memory_size(number_of_chunks: u32) -> usize {
        IndexPool::memory_size(number_of_chunks as usize)
    }

    /// Bytes [`MemPool::init()`] requests from the chunk memory allocator.
    pub fn chunk_memory_size(chunk_size: u64, number_of_chunks: u32) -> u64 {
        chunk_size * number_of_chunks as u64
    }
}
