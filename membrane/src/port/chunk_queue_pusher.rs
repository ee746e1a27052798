// Copyright (c) 2024 Contributors to the membrane project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use core::sync::atomic::Ordering;

use membrane_bb_container::variant_queue::PushResult;

use crate::memory::shared_chunk::SharedChunk;
use crate::memory::shm_safe_unmanaged_chunk::ShmSafeUnmanagedChunk;
use crate::port::chunk_queue_data::ChunkQueueData;
use crate::port::locking_policy::LockingPolicy;

/// The producer side of a [`ChunkQueueData`], held by the distributor of
/// the publishing process. The queue is single-producer, at most one
/// pusher may be active per queue, which the one-distributor-per-publisher
/// structure guarantees.
#[derive(Debug)]
pub struct ChunkQueuePusher<'a, Lock: LockingPolicy, const MAX_CAPACITY: usize> {
    queue: &'a ChunkQueueData<Lock, MAX_CAPACITY>,
}

impl<'a, Lock: LockingPolicy, const MAX_CAPACITY: usize> ChunkQueuePusher<'a, Lock, MAX_CAPACITY> {
    pub fn new(queue: &'a ChunkQueueData<Lock, MAX_CAPACITY>) -> Self {
        Self { queue }
    }

    /// Transfers a chunk into the queue. An evicting queue drops its
    /// oldest chunk and raises the lost-chunks flag, a rejecting queue
    /// hands the chunk back so the caller can apply its blocking policy.
    pub fn push(&self, chunk: SharedChunk) -> Result<(), SharedChunk> {
        let value = ShmSafeUnmanagedChunk::new(chunk).to_bits();

        // the queue is single-producer by construction, see the type docs
        match unsafe { self.queue.queue.push(value) } {
            PushResult::Pushed => {
                self.notify();
                Ok(())
            }
            PushResult::Evicted(oldest) => {
                drop(ShmSafeUnmanagedChunk::from_bits(oldest).release_to_shared_chunk());
                self.queue
                    .queue_has_lost_chunks
                    .store(true, Ordering::Relaxed);
                self.notify();
                Ok(())
            }
            PushResult::Full => {
                Err(ShmSafeUnmanagedChunk::from_bits(value).release_to_shared_chunk())
            }
        }
    }

    /// Tells the queue that a chunk meant for it was dropped, used when a
    /// refused push is not retried.
    pub fn lost_a_chunk(&self) {
        self.queue
            .queue_has_lost_chunks
            .store(true, Ordering::Relaxed);
    }

    fn notify(&self) {
        let _guard = self.queue.lock.guard();

        let condition_variable = unsafe { *self.queue.condition_variable.get() };
        if let Some(condition_variable) = condition_variable.as_ptr() {
            let notification_index = unsafe { *self.queue.condition_variable_index.get() };
            unsafe { condition_variable.as_ref() }.notify(notification_index);
        }
    }
}
