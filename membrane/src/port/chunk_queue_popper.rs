// Copyright (c) 2024 Contributors to the membrane project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use core::ptr::NonNull;
use core::sync::atomic::Ordering;

use membrane_bb_elementary::relative_pointer::RelativePointer;
use membrane_bb_elementary::unique_id::UniqueId;
use membrane_log::{fatal_panic, warn};

use crate::memory::shared_chunk::SharedChunk;
use crate::memory::shm_safe_unmanaged_chunk::ShmSafeUnmanagedChunk;
use crate::port::chunk_queue_data::ChunkQueueData;
use crate::port::condition_variable::ConditionVariableData;
use crate::port::locking_policy::LockingPolicy;

/// The consumer side of a [`ChunkQueueData`], held by the subscribing
/// process. The queue is single-consumer, at most one popper may be
/// active per queue.
#[derive(Debug)]
pub struct ChunkQueuePopper<'a, Lock: LockingPolicy, const MAX_CAPACITY: usize> {
    queue: &'a ChunkQueueData<Lock, MAX_CAPACITY>,
}

impl<'a, Lock: LockingPolicy, const MAX_CAPACITY: usize> ChunkQueuePopper<'a, Lock, MAX_CAPACITY> {
    pub fn new(queue: &'a ChunkQueueData<Lock, MAX_CAPACITY>) -> Self {
        Self { queue }
    }

    pub fn queue_id(&self) -> UniqueId {
        self.queue.unique_id()
    }

    /// Takes the oldest chunk out of the queue. The queue slot held one
    /// reference which moves into the returned [`SharedChunk`], the count
    /// is not touched. A chunk whose header does not match this build's
    /// format and version is fatal, the processes must not exchange data.
    pub fn pop(&self) -> Option<SharedChunk> {
        // the queue is single-consumer by construction, see the type docs
        let value = unsafe { self.queue.queue.pop() }?;
        let chunk = ShmSafeUnmanagedChunk::from_bits(value).release_to_shared_chunk();

        let header = match chunk.chunk_header() {
            Some(header) => header,
            None => fatal_panic!(from self, "Popped a logically null chunk from the queue."),
        };

        if !unsafe { header.as_ref() }.has_compatible_format() {
            fatal_panic!(from self,
                "Popped a chunk with an incompatible chunk header version, the builds of \
                 publisher and subscriber cannot exchange data.");
        }

        Some(chunk)
    }

    /// True when the queue lost a chunk since the last call, the flag is
    /// cleared by reading it.
    pub fn has_lost_chunks(&self) -> bool {
        self.queue.queue_has_lost_chunks.swap(false, Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.queue.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.queue.len()
    }

    pub fn capacity(&self) -> usize {
        self.queue.queue.capacity()
    }

    /// Lowers the working capacity to `new_capacity`, clamped into
    /// `[1, MAX_CAPACITY]`. Must not be called while any push or pop is in
    /// flight.
    pub fn set_capacity(&self, new_capacity: usize) {
        let new_capacity = match new_capacity {
            0 => {
                warn!(from self, "A queue capacity of zero is not supported, using 1.");
                1
            }
            n if n > MAX_CAPACITY => {
                warn!(from self,
                    "The queue capacity {} exceeds the maximum supported capacity {}, clamping.",
                    n, MAX_CAPACITY);
                MAX_CAPACITY
            }
            n => n,
        };

        unsafe { self.queue.queue.set_capacity(new_capacity) };
    }

    /// Pops and drops until the queue is empty.
    pub fn clear(&self) {
        while let Some(chunk) = self.pop() {
            drop(chunk);
        }
    }

    /// Attaches the condition variable that a push signals. At most one
    /// condition variable per queue, a second attach is ignored with a
    /// warning. Returns false in that case.
    pub fn set_condition_variable(
        &self,
        condition_variable: &ConditionVariableData,
        notification_index: u64,
    ) -> bool {
        let _guard = self.queue.lock.guard();

        let current = unsafe { &mut *self.queue.condition_variable.get() };
        if !current.is_null() {
            warn!(from self,
                "A condition variable is already attached to this queue, ignoring the new one.");
            return false;
        }

        *current = match RelativePointer::from_ptr(NonNull::from(condition_variable)) {
            Some(pointer) => pointer,
            None => fatal_panic!(from self,
                "The condition variable at {:#x} does not belong to any registered segment.",
                condition_variable as *const _ as usize),
        };
        unsafe { *self.queue.condition_variable_index.get() = notification_index };
        true
    }

    /// Detaches the condition variable, future pushes signal nobody.
    pub fn unset_condition_variable(&self) {
        let _guard = self.queue.lock.guard();
        unsafe { *self.queue.condition_variable.get() = RelativePointer::null() };
    }

    pub fn has_condition_variable(&self) -> bool {
        let _guard = self.queue.lock.guard();
        !unsafe { &*self.queue.condition_variable.get() }.is_null()
    }
}
