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
use core::sync::atomic::AtomicBool;

use membrane_bb_container::variant_queue::{VariantQueue, VariantQueueKind};
use membrane_bb_elementary::relative_pointer::RelativePointer;
use membrane_bb_elementary::unique_id::UniqueId;

use crate::port::condition_variable::ConditionVariableData;
use crate::port::locking_policy::LockingPolicy;
use crate::port::policy::QueueFullPolicy;

/// The shared-memory state of one subscriber queue: the bounded queue of
/// [`crate::memory::shm_safe_unmanaged_chunk::ShmSafeUnmanagedChunk`]
/// values, the lost-chunks flag and the optional condition variable
/// attachment. Pushed into by the publisher process through the
/// [`crate::port::chunk_queue_pusher::ChunkQueuePusher`], drained by the
/// subscriber process through the
/// [`crate::port::chunk_queue_popper::ChunkQueuePopper`].
///
/// The locking policy serializes only the condition variable attachment,
/// the queue itself is lock-free.
#[repr(C)]
pub struct ChunkQueueData<Lock: LockingPolicy, const MAX_CAPACITY: usize> {
    unique_id: UniqueId,
    pub(crate) lock: Lock,
    pub(crate) queue: VariantQueue<MAX_CAPACITY>,
    pub(crate) queue_has_lost_chunks: AtomicBool,
    pub(crate) condition_variable: UnsafeCell<RelativePointer<ConditionVariableData>>,
    pub(crate) condition_variable_index: UnsafeCell<u64>,
    queue_full_policy: QueueFullPolicy,
}

unsafe impl<Lock: LockingPolicy, const MAX_CAPACITY: usize> Send
    for ChunkQueueData<Lock, MAX_CAPACITY>
{
}
unsafe impl<Lock: LockingPolicy, const MAX_CAPACITY: usize> Sync
    for ChunkQueueData<Lock, MAX_CAPACITY>
{
}

impl<Lock: LockingPolicy, const MAX_CAPACITY: usize> Debug for ChunkQueueData<Lock, MAX_CAPACITY> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "ChunkQueueData<{}> {{ unique_id: {}, queue_full_policy: {:?} }}",
            MAX_CAPACITY,
            self.unique_id.value(),
            self.queue_full_policy,
        )
    }
}

impl<Lock: LockingPolicy, const MAX_CAPACITY: usize> ChunkQueueData<Lock, MAX_CAPACITY> {
    pub fn new(queue_kind: VariantQueueKind, queue_full_policy: QueueFullPolicy) -> Self {
        Self {
            unique_id: UniqueId::new(),
            lock: Lock::default(),
            queue: VariantQueue::new(queue_kind),
            queue_has_lost_chunks: AtomicBool::new(false),
            condition_variable: UnsafeCell::new(RelativePointer::null()),
            condition_variable_index: UnsafeCell::new(0),
            queue_full_policy,
        }
    }

    /// Process-wide unique identity of this queue, used by the distributor
    /// to keep registration idempotent.
    pub fn unique_id(&self) -> UniqueId {
        self.unique_id
    }

    pub fn queue_full_policy(&self) -> QueueFullPolicy {
        self.queue_full_policy
    }
}
