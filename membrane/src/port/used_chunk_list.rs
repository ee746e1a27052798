// Copyright (c) 2024 Contributors to the membrane project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use core::cell::UnsafeCell;
use core::fmt::Debug;
use core::hint::spin_loop;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicBool, Ordering};

use crate::memory::chunk_header::ChunkHeader;
use crate::memory::shared_chunk::SharedChunk;
use crate::memory::shm_safe_unmanaged_chunk::ShmSafeUnmanagedChunk;

/// Tracks the chunks an endpoint currently holds so that the daemon can
/// reclaim them when the endpoint process dies while holding them.
///
/// A vector or list node structure could be corrupted when the process dies
/// mid-operation, so the chunks are stored as torn-write-safe
/// [`ShmSafeUnmanagedChunk`] slots threaded onto two intrusive index lists
/// (used and free). The daemon can walk the slots under all circumstances.
///
/// Access is serialized with a single test-and-set flag. The only
/// contenders are the endpoint's own thread and the daemon's reclaimer,
/// contention is rare and short, this is not a general purpose concurrent
/// list.
#[repr(C)]
pub struct UsedChunkList<const CAPACITY: usize> {
    synchronizer: AtomicBool,
    used_list_head: UnsafeCell<u32>,
    free_list_head: UnsafeCell<u32>,
    list_indices: [UnsafeCell<u32>; CAPACITY],
    list_data: [UnsafeCell<ShmSafeUnmanagedChunk>; CAPACITY],
}

unsafe impl<const CAPACITY: usize> Send for UsedChunkList<CAPACITY> {}
unsafe impl<const CAPACITY: usize> Sync for UsedChunkList<CAPACITY> {}

impl<const CAPACITY: usize> Debug for UsedChunkList<CAPACITY> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "UsedChunkList<{}>", CAPACITY)
    }
}

impl<const CAPACITY: usize> Default for UsedChunkList<CAPACITY> {
    fn default() -> Self {
        Self {
            synchronizer: AtomicBool::new(false),
            used_list_head: UnsafeCell::new(Self::INVALID_INDEX),
            free_list_head: UnsafeCell::new(0),
            list_indices: core::array::from_fn(|i| UnsafeCell::new(i as u32 + 1)),
            list_data: core::array::from_fn(|_| UnsafeCell::new(ShmSafeUnmanagedChunk::default())),
        }
    }
}

impl<const CAPACITY: usize> UsedChunkList<CAPACITY> {
    const INVALID_INDEX: u32 = CAPACITY as u32;

    pub fn new() -> Self {
        Self::default()
    }

    pub const fn capacity(&self) -> usize {
        CAPACITY
    }

    fn lock(&self) {
        while self
            .synchronizer
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            spin_loop();
        }
    }

    fn unlock(&self) {
        self.synchronizer.store(false, Ordering::Release);
    }

    #[allow(clippy::mut_from_ref)]
    // all cell access happens under the synchronizer flag
    fn index_at(&self, index: u32) -> &mut u32 {
        unsafe { &mut *self.list_indices[index as usize].get() }
    }

    #[allow(clippy::mut_from_ref)]
    fn data_at(&self, index: u32) -> &mut ShmSafeUnmanagedChunk {
        unsafe { &mut *self.list_data[index as usize].get() }
    }

    #[allow(clippy::mut_from_ref)]
    fn used_head(&self) -> &mut u32 {
        unsafe { &mut *self.used_list_head.get() }
    }

    #[allow(clippy::mut_from_ref)]
    fn free_head(&self) -> &mut u32 {
        unsafe { &mut *self.free_list_head.get() }
    }

    /// Stores a chunk. Returns false when the list is full, the chunk is
    /// dropped normally in that case.
    pub fn insert(&self, chunk: SharedChunk) -> bool {
        self.lock();

        let slot = *self.free_head();
        if slot == Self::INVALID_INDEX {
            self.unlock();
            return false;
        }

        *self.free_head() = *self.index_at(slot);
        *self.index_at(slot) = *self.used_head();
        *self.used_head() = slot;
        *self.data_at(slot) = ShmSafeUnmanagedChunk::new(chunk);

        self.unlock();
        true
    }

    /// Removes and returns the stored chunk whose header equals
    /// `chunk_header`, [`None`] when no stored chunk matches.
    pub fn remove(&self, chunk_header: NonNull<ChunkHeader>) -> Option<SharedChunk> {
        self.lock();

        let mut previous = Self::INVALID_INDEX;
        let mut current = *self.used_head();
        while current != Self::INVALID_INDEX {
            if self.data_at(current).chunk_header() == Some(chunk_header) {
                let next = *self.index_at(current);
                if previous == Self::INVALID_INDEX {
                    *self.used_head() = next;
                } else {
                    *self.index_at(previous) = next;
                }

                let chunk = self.data_at(current).release_to_shared_chunk();
                *self.index_at(current) = *self.free_head();
                *self.free_head() = current;

                self.unlock();
                return Some(chunk);
            }

            previous = current;
            current = *self.index_at(current);
        }

        self.unlock();
        None
    }

    /// Drops every stored chunk. Called by the endpoint on shutdown and by
    /// the daemon when the endpoint process died.
    pub fn cleanup(&self) {
        self.lock();

        let mut current = *self.used_head();
        while current != Self::INVALID_INDEX {
            let next = *self.index_at(current);

            drop(self.data_at(current).release_to_shared_chunk());
            *self.index_at(current) = *self.free_head();
            *self.free_head() = current;

            current = next;
        }
        *self.used_head() = Self::INVALID_INDEX;

        self.unlock();
    }

    /// Number of stored chunks.
    pub fn len(&self) -> usize {
        self.lock();

        let mut size = 0;
        let mut current = *self.used_head();
        while current != Self::INVALID_INDEX {
            size += 1;
            current = *self.index_at(current);
        }

        self.unlock();
        size
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
