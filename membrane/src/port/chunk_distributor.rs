// Copyright (c) 2024 Contributors to the membrane project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The per-publisher fan-out. One [`ChunkDistributorData`] carries the
//! bounded set of subscriber queues and the bounded history of the most
//! recently published chunks. Delivering to all queues performs one atomic
//! reference count increment per queue and never copies the payload.
//!
//! The queue set is mutated by the daemon (subscribe/unsubscribe) while the
//! publisher thread delivers, both run under the record's locking policy.

use core::cell::UnsafeCell;
use core::fmt::Debug;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;

use membrane_bb_container::fixed_vec::FixedVec;
use membrane_bb_elementary::enum_gen;
use membrane_bb_elementary::relative_pointer::RelativePointer;
use membrane_log::{fail, fatal_panic, warn};

use crate::memory::shared_chunk::SharedChunk;
use crate::memory::shm_safe_unmanaged_chunk::ShmSafeUnmanagedChunk;
use crate::port::chunk_queue_data::ChunkQueueData;
use crate::port::chunk_queue_pusher::ChunkQueuePusher;
use crate::port::locking_policy::LockingPolicy;
use crate::port::policy::{ConsumerTooSlowPolicy, QueueFullPolicy};

enum_gen! {
    ChunkDistributorAddQueueError
  entry:
    QueueContainerOverflow
}

enum_gen! {
    ChunkDistributorRemoveQueueError
  entry:
    QueueNotInContainer
}

const SPIN_REPETITIONS: u64 = 100;
const YIELD_REPETITIONS: u64 = 200;
const INITIAL_WAIT: Duration = Duration::from_micros(100);
const MAX_WAIT: Duration = Duration::from_millis(1);

/// Back-off of the blocking delivery path: spin first, then yield, then
/// sleep in short slices so that the shutdown flag is observed promptly.
struct AdaptiveWait {
    repetitions: u64,
}

impl AdaptiveWait {
    fn new() -> Self {
        Self { repetitions: 0 }
    }

    fn wait(&mut self) {
        self.repetitions = self.repetitions.saturating_add(1);
        if self.repetitions <= SPIN_REPETITIONS {
            core::hint::spin_loop();
        } else if self.repetitions <= YIELD_REPETITIONS {
            std::thread::yield_now();
        } else if self.repetitions <= YIELD_REPETITIONS * 2 {
            std::thread::sleep(INITIAL_WAIT);
        } else {
            std::thread::sleep(MAX_WAIT);
        }
    }
}

/// The shared-memory state of one publisher's fan-out.
#[repr(C)]
pub struct ChunkDistributorData<
    Lock: LockingPolicy,
    QueueLock: LockingPolicy,
    const QUEUE_CAPACITY: usize,
    const MAX_QUEUES: usize,
    const MAX_HISTORY: usize,
> {
    lock: Lock,
    history_capacity: u64,
    queues: UnsafeCell<FixedVec<RelativePointer<ChunkQueueData<QueueLock, QUEUE_CAPACITY>>, MAX_QUEUES>>,
    history: UnsafeCell<FixedVec<ShmSafeUnmanagedChunk, MAX_HISTORY>>,
    consumer_too_slow_policy: ConsumerTooSlowPolicy,
    shutdown_requested: AtomicBool,
}

unsafe impl<
        Lock: LockingPolicy,
        QueueLock: LockingPolicy,
        const QUEUE_CAPACITY: usize,
        const MAX_QUEUES: usize,
        const MAX_HISTORY: usize,
    > Send for ChunkDistributorData<Lock, QueueLock, QUEUE_CAPACITY, MAX_QUEUES, MAX_HISTORY>
{
}
unsafe impl<
        Lock: LockingPolicy,
        QueueLock: LockingPolicy,
        const QUEUE_CAPACITY: usize,
        const MAX_QUEUES: usize,
        const MAX_HISTORY: usize,
    > Sync for ChunkDistributorData<Lock, QueueLock, QUEUE_CAPACITY, MAX_QUEUES, MAX_HISTORY>
{
}

impl<
        Lock: LockingPolicy,
        QueueLock: LockingPolicy,
        const QUEUE_CAPACITY: usize,
        const MAX_QUEUES: usize,
        const MAX_HISTORY: usize,
    > Debug for ChunkDistributorData<Lock, QueueLock, QUEUE_CAPACITY, MAX_QUEUES, MAX_HISTORY>
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "ChunkDistributorData<{}, {}, {}> {{ history_capacity: {}, policy: {:?} }}",
            QUEUE_CAPACITY, MAX_QUEUES, MAX_HISTORY, self.history_capacity,
            self.consumer_too_slow_policy,
        )
    }
}

impl<
        Lock: LockingPolicy,
        QueueLock: LockingPolicy,
        const QUEUE_CAPACITY: usize,
        const MAX_QUEUES: usize,
        const MAX_HISTORY: usize,
    > ChunkDistributorData<Lock, QueueLock, QUEUE_CAPACITY, MAX_QUEUES, MAX_HISTORY>
{
    pub fn new(consumer_too_slow_policy: ConsumerTooSlowPolicy, history_capacity: u64) -> Self {
        let history_capacity = if history_capacity > MAX_HISTORY as u64 {
            warn!(from "ChunkDistributorData::new",
                "The requested history capacity {} exceeds the maximum of {}, clamping.",
                history_capacity, MAX_HISTORY);
            MAX_HISTORY as u64
        } else {
            history_capacity
        };

        Self {
            lock: Lock::default(),
            history_capacity,
            queues: UnsafeCell::new(FixedVec::new()),
            history: UnsafeCell::new(FixedVec::new()),
            consumer_too_slow_policy,
            shutdown_requested: AtomicBool::new(false),
        }
    }

    pub fn history_capacity(&self) -> u64 {
        self.history_capacity
    }

    /// Releases a publisher that is blocked in
    /// [`ChunkDistributor::deliver_to_all_stored_queues()`] waiting for a
    /// consumer. Set by the publisher's own shutdown path or by the daemon
    /// when its liveness view declares a blocking consumer dead.
    pub fn signal_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::Relaxed);
    }
}

/// Operates on a [`ChunkDistributorData`], the publisher side uses it to
/// deliver, the daemon side to manage the queue set.
#[derive(Debug)]
pub struct ChunkDistributor<
    'a,
    Lock: LockingPolicy,
    QueueLock: LockingPolicy,
    const QUEUE_CAPACITY: usize,
    const MAX_QUEUES: usize,
    const MAX_HISTORY: usize,
> {
    data: &'a ChunkDistributorData<Lock, QueueLock, QUEUE_CAPACITY, MAX_QUEUES, MAX_HISTORY>,
}

impl<
        'a,
        Lock: LockingPolicy,
        QueueLock: LockingPolicy,
        const QUEUE_CAPACITY: usize,
        const MAX_QUEUES: usize,
        const MAX_HISTORY: usize,
    > ChunkDistributor<'a, Lock, QueueLock, QUEUE_CAPACITY, MAX_QUEUES, MAX_HISTORY>
{
    pub fn new(
        data: &'a ChunkDistributorData<Lock, QueueLock, QUEUE_CAPACITY, MAX_QUEUES, MAX_HISTORY>,
    ) -> Self {
        Self { data }
    }

    #[allow(clippy::mut_from_ref)]
    // only called under the data's locking policy
    fn queues(
        &self,
    ) -> &mut FixedVec<RelativePointer<ChunkQueueData<QueueLock, QUEUE_CAPACITY>>, MAX_QUEUES> {
        unsafe { &mut *self.data.queues.get() }
    }

    #[allow(clippy::mut_from_ref)]
    fn history(&self) -> &mut FixedVec<ShmSafeUnmanagedChunk, MAX_HISTORY> {
        unsafe { &mut *self.data.history.get() }
    }

    /// Registers a subscriber queue. Registration is idempotent, a queue
    /// that is already in the set stays registered exactly once. When
    /// `requested_history > 0` the newest
    /// `min(requested_history, history len)` chunks are delivered to the
    /// new queue oldest to newest before the call returns.
    pub fn try_add_queue(
        &self,
        queue: &ChunkQueueData<QueueLock, QUEUE_CAPACITY>,
        requested_history: u64,
    ) -> Result<(), ChunkDistributorAddQueueError> {
        let _guard = self.data.lock.guard();
        let queues = self.queues();

        if self.position_of(queues, queue).is_some() {
            return Ok(());
        }

        if queues.is_full() {
            fail!(from self.data, with ChunkDistributorAddQueueError::QueueContainerOverflow,
                "Unable to add another queue since the maximum number of {} queues is reached.",
                MAX_QUEUES);
        }

        let pointer = match RelativePointer::from_ptr(NonNull::from(queue)) {
            Some(pointer) => pointer,
            None => fatal_panic!(from self.data,
                "The queue at {:#x} does not belong to any registered segment.",
                queue as *const _ as usize),
        };
        queues.push(pointer);

        let history = self.history();
        let replay = (requested_history as usize).min(history.len());
        for stored in history[history.len() - replay..].iter() {
            self.deliver_with_policy(queue, stored.clone_to_shared_chunk());
        }

        Ok(())
    }

    /// Removes a queue by identity. A queue that was never added is an
    /// error the caller translates, usually into a NACK.
    pub fn try_remove_queue(
        &self,
        queue: &ChunkQueueData<QueueLock, QUEUE_CAPACITY>,
    ) -> Result<(), ChunkDistributorRemoveQueueError> {
        let _guard = self.data.lock.guard();
        let queues = self.queues();

        match self.position_of(queues, queue) {
            Some(position) => {
                queues.remove(position);
                Ok(())
            }
            None => {
                fail!(from self.data, with ChunkDistributorRemoveQueueError::QueueNotInContainer,
                    "Unable to remove the queue with the id {} since it is not registered.",
                    queue.unique_id().value());
            }
        }
    }

    pub fn remove_all_queues(&self) {
        let _guard = self.data.lock.guard();
        self.queues().clear();
    }

    pub fn number_of_stored_queues(&self) -> usize {
        let _guard = self.data.lock.guard();
        self.queues().len()
    }

    fn position_of(
        &self,
        queues: &FixedVec<RelativePointer<ChunkQueueData<QueueLock, QUEUE_CAPACITY>>, MAX_QUEUES>,
        queue: &ChunkQueueData<QueueLock, QUEUE_CAPACITY>,
    ) -> Option<usize> {
        queues.iter().position(|stored| {
            stored
                .as_ptr()
                .map(|ptr| unsafe { ptr.as_ref() }.unique_id() == queue.unique_id())
                .unwrap_or(false)
        })
    }

    /// Delivers a chunk to every registered queue and appends it to the
    /// history. Returns the number of queues that accepted it.
    ///
    /// Queues are independent: an evicting queue drops its oldest chunk, a
    /// rejecting queue either costs this chunk
    /// ([`ConsumerTooSlowPolicy::DiscardOldestData`]) or suspends delivery
    /// in a bounded back-off until the consumer made room or
    /// [`ChunkDistributorData::signal_shutdown()`] was called.
    pub fn deliver_to_all_stored_queues(&self, chunk: SharedChunk) -> u64 {
        let _guard = self.data.lock.guard();

        let mut number_of_deliveries = 0;
        for stored in self.queues().iter() {
            if let Some(queue) = stored.as_ptr() {
                if self.deliver_with_policy(unsafe { queue.as_ref() }, chunk.clone()) {
                    number_of_deliveries += 1;
                }
            }
        }

        self.add_to_history(chunk);
        number_of_deliveries
    }

    /// Delivers to one specific queue, registered or not. The history is
    /// not touched.
    pub fn deliver_to_queue(
        &self,
        queue: &ChunkQueueData<QueueLock, QUEUE_CAPACITY>,
        chunk: SharedChunk,
    ) -> bool {
        let _guard = self.data.lock.guard();
        self.deliver_with_policy(queue, chunk)
    }

    fn deliver_with_policy(
        &self,
        queue: &ChunkQueueData<QueueLock, QUEUE_CAPACITY>,
        chunk: SharedChunk,
    ) -> bool {
        let pusher = ChunkQueuePusher::new(queue);

        let mut rejected = match pusher.push(chunk) {
            Ok(()) => return true,
            Err(rejected) => rejected,
        };

        if queue.queue_full_policy() == QueueFullPolicy::BlockPublisher
            && self.data.consumer_too_slow_policy == ConsumerTooSlowPolicy::WaitForConsumer
        {
            let mut back_off = AdaptiveWait::new();
            loop {
                if self.data.shutdown_requested.load(Ordering::Relaxed) {
                    pusher.lost_a_chunk();
                    return false;
                }

                back_off.wait();
                match pusher.push(rejected) {
                    Ok(()) => return true,
                    Err(chunk) => rejected = chunk,
                }
            }
        }

        pusher.lost_a_chunk();
        false
    }

    fn add_to_history(&self, chunk: SharedChunk) {
        if self.data.history_capacity == 0 {
            return;
        }

        let history = self.history();
        if history.len() as u64 == self.data.history_capacity {
            let mut evicted = history.remove(0);
            drop(evicted.release_to_shared_chunk());
        }

        history.push(ShmSafeUnmanagedChunk::new(chunk));
    }

    /// Appends to the history without delivering to any queue.
    pub fn add_to_history_without_delivery(&self, chunk: SharedChunk) {
        let _guard = self.data.lock.guard();
        self.add_to_history(chunk);
    }

    pub fn history_size(&self) -> u64 {
        let _guard = self.data.lock.guard();
        self.history().len() as u64
    }

    pub fn clear_history(&self) {
        let _guard = self.data.lock.guard();
        let history = self.history();
        while let Some(mut stored) = history.pop() {
            drop(stored.release_to_shared_chunk());
        }
    }

    /// See [`ChunkDistributorData::signal_shutdown()`].
    pub fn signal_shutdown(&self) {
        self.data.signal_shutdown();
    }
}
