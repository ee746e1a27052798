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
use core::ptr::NonNull;
use core::sync::atomic::{AtomicU64, Ordering};

use membrane_bb_elementary::enum_gen;
use membrane_bb_elementary::relative_pointer::RelativePointer;
use membrane_log::{fail, fatal_panic};

use crate::memory::chunk_header::ChunkHeader;
use crate::memory::chunk_settings::ChunkSettings;
use crate::memory::memory_manager::{ChunkAcquireError, MemoryManager};
use crate::memory::shared_chunk::SharedChunk;
use crate::memory::shm_safe_unmanaged_chunk::ShmSafeUnmanagedChunk;
use crate::port::chunk_distributor::{
    ChunkDistributor, ChunkDistributorAddQueueError, ChunkDistributorData,
    ChunkDistributorRemoveQueueError,
};
use crate::port::chunk_queue_data::ChunkQueueData;
use crate::port::locking_policy::LockingPolicy;
use crate::port::policy::ConsumerTooSlowPolicy;
use crate::port::used_chunk_list::UsedChunkList;

enum_gen! {
    /// Failures of [`ChunkSender::try_allocate()`].
    ChunkSenderAllocateError
  entry:
    /// The sender already has the maximum number of chunks loaned out.
    TooManyChunksAllocatedInParallel
  mapping:
    ChunkAcquireError
}

/// The shared-memory state of one publishing endpoint: the fan-out, the
/// list of currently loaned chunks for crash recovery, the sequence number
/// and the most recently sent chunk kept around for in-place reuse.
#[repr(C)]
pub struct ChunkSenderData<
    Lock: LockingPolicy,
    QueueLock: LockingPolicy,
    const QUEUE_CAPACITY: usize,
    const MAX_QUEUES: usize,
    const MAX_HISTORY: usize,
    const MAX_CHUNKS_IN_USE: usize,
> {
    distributor: ChunkDistributorData<Lock, QueueLock, QUEUE_CAPACITY, MAX_QUEUES, MAX_HISTORY>,
    memory_manager: RelativePointer<MemoryManager>,
    chunks_in_use: UsedChunkList<MAX_CHUNKS_IN_USE>,
    sequence_number: AtomicU64,
    // touched only by the sending thread
    last_chunk: UnsafeCell<ShmSafeUnmanagedChunk>,
}

unsafe impl<
        Lock: LockingPolicy,
        QueueLock: LockingPolicy,
        const QUEUE_CAPACITY: usize,
        const MAX_QUEUES: usize,
        const MAX_HISTORY: usize,
        const MAX_CHUNKS_IN_USE: usize,
    > Send
    for ChunkSenderData<Lock, QueueLock, QUEUE_CAPACITY, MAX_QUEUES, MAX_HISTORY, MAX_CHUNKS_IN_USE>
{
}
unsafe impl<
        Lock: LockingPolicy,
        QueueLock: LockingPolicy,
        const QUEUE_CAPACITY: usize,
        const MAX_QUEUES: usize,
        const MAX_HISTORY: usize,
        const MAX_CHUNKS_IN_USE: usize,
    > Sync
    for ChunkSenderData<Lock, QueueLock, QUEUE_CAPACITY, MAX_QUEUES, MAX_HISTORY, MAX_CHUNKS_IN_USE>
{
}

impl<
        Lock: LockingPolicy,
        QueueLock: LockingPolicy,
        const QUEUE_CAPACITY: usize,
        const MAX_QUEUES: usize,
        const MAX_HISTORY: usize,
        const MAX_CHUNKS_IN_USE: usize,
    > Debug
    for ChunkSenderData<Lock, QueueLock, QUEUE_CAPACITY, MAX_QUEUES, MAX_HISTORY, MAX_CHUNKS_IN_USE>
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "ChunkSenderData {{ distributor: {:?}, sequence_number: {} }}",
            self.distributor,
            self.sequence_number.load(Ordering::Relaxed),
        )
    }
}

impl<
        Lock: LockingPolicy,
        QueueLock: LockingPolicy,
        const QUEUE_CAPACITY: usize,
        const MAX_QUEUES: usize,
        const MAX_HISTORY: usize,
        const MAX_CHUNKS_IN_USE: usize,
    > ChunkSenderData<Lock, QueueLock, QUEUE_CAPACITY, MAX_QUEUES, MAX_HISTORY, MAX_CHUNKS_IN_USE>
{
    /// The memory manager must be placed in registered segment memory.
    pub fn new(
        memory_manager: &MemoryManager,
        consumer_too_slow_policy: ConsumerTooSlowPolicy,
        history_capacity: u64,
    ) -> Self {
        let memory_manager = match RelativePointer::from_ptr(NonNull::from(memory_manager)) {
            Some(pointer) => pointer,
            None => fatal_panic!(from "ChunkSenderData::new",
                "The memory manager at {:#x} does not belong to any registered segment.",
                memory_manager as *const _ as usize),
        };

        Self {
            distributor: ChunkDistributorData::new(consumer_too_slow_policy, history_capacity),
            memory_manager,
            chunks_in_use: UsedChunkList::new(),
            sequence_number: AtomicU64::new(0),
            last_chunk: UnsafeCell::new(ShmSafeUnmanagedChunk::default()),
        }
    }

    pub fn distributor_data(
        &self,
    ) -> &ChunkDistributorData<Lock, QueueLock, QUEUE_CAPACITY, MAX_QUEUES, MAX_HISTORY> {
        &self.distributor
    }

    /// The list the daemon scans to reclaim loaned chunks of a dead
    /// publisher.
    pub fn chunks_in_use(&self) -> &UsedChunkList<MAX_CHUNKS_IN_USE> {
        &self.chunks_in_use
    }
}

/// The publishing endpoint facade: allocates chunks, tracks them until they
/// are sent or released, forwards sends to the distributor and recycles the
/// most recently sent chunk. All methods must be called from the one
/// sending thread.
#[derive(Debug)]
pub struct ChunkSender<
    'a,
    Lock: LockingPolicy,
    QueueLock: LockingPolicy,
    const QUEUE_CAPACITY: usize,
    const MAX_QUEUES: usize,
    const MAX_HISTORY: usize,
    const MAX_CHUNKS_IN_USE: usize,
> {
    data: &'a ChunkSenderData<
        Lock,
        QueueLock,
        QUEUE_CAPACITY,
        MAX_QUEUES,
        MAX_HISTORY,
        MAX_CHUNKS_IN_USE,
    >,
}

impl<
        'a,
        Lock: LockingPolicy,
        QueueLock: LockingPolicy,
        const QUEUE_CAPACITY: usize,
        const MAX_QUEUES: usize,
        const MAX_HISTORY: usize,
        const MAX_CHUNKS_IN_USE: usize,
    > ChunkSender<'a, Lock, QueueLock, QUEUE_CAPACITY, MAX_QUEUES, MAX_HISTORY, MAX_CHUNKS_IN_USE>
{
    pub fn new(
        data: &'a ChunkSenderData<
            Lock,
            QueueLock,
            QUEUE_CAPACITY,
            MAX_QUEUES,
            MAX_HISTORY,
            MAX_CHUNKS_IN_USE,
        >,
    ) -> Self {
        Self { data }
    }

    fn distributor(
        &self,
    ) -> ChunkDistributor<'a, Lock, QueueLock, QUEUE_CAPACITY, MAX_QUEUES, MAX_HISTORY> {
        ChunkDistributor::new(&self.data.distributor)
    }

    fn memory_manager(&self) -> &'a MemoryManager {
        match self.data.memory_manager.as_ptr() {
            Some(manager) => unsafe { manager.as_ref() },
            None => fatal_panic!(from self.data,
                "The segment holding the memory manager is no longer attached."),
        }
    }

    #[allow(clippy::mut_from_ref)]
    // touched only by the sending thread
    fn last_chunk(&self) -> &mut ShmSafeUnmanagedChunk {
        unsafe { &mut *self.data.last_chunk.get() }
    }

    /// Loans a chunk able to carry `settings` and stamps it with the
    /// origin and the next sequence number. When the previously sent chunk
    /// has no other owners and is large enough it is reused in place
    /// without going through the pools.
    pub fn try_allocate(
        &self,
        origin_id: u64,
        settings: ChunkSettings,
    ) -> Result<NonNull<ChunkHeader>, ChunkSenderAllocateError> {
        let msg = "Unable to allocate a chunk";

        if let Some(header) = self.try_reuse_last_chunk(&settings) {
            self.stamp(header, origin_id);
            return Ok(header);
        }

        let chunk = fail!(from self.data, when self.memory_manager().get_chunk(settings),
            "{} since the memory manager has no chunk available.", msg);

        let header = chunk
            .chunk_header()
            .expect("a freshly acquired chunk is never null");

        if !self.data.chunks_in_use.insert(chunk) {
            fail!(from self.data, with ChunkSenderAllocateError::TooManyChunksAllocatedInParallel,
                "{} since the sender already has {} chunks loaned out.", msg, MAX_CHUNKS_IN_USE);
        }

        self.stamp(header, origin_id);
        Ok(header)
    }

    fn try_reuse_last_chunk(&self, settings: &ChunkSettings) -> Option<NonNull<ChunkHeader>> {
        let last_chunk = self.last_chunk();
        if !last_chunk.is_not_logical_nullptr_and_has_no_other_owners() {
            return None;
        }

        let chunk_size = unsafe { last_chunk.chunk_header()?.as_ref() }.chunk_size();
        if chunk_size < settings.required_chunk_size() {
            return None;
        }

        let chunk = last_chunk.release_to_shared_chunk();
        let raw_chunk = chunk
            .chunk_header()
            .expect("the reused chunk is never null")
            .cast::<u8>();
        let header = unsafe { ChunkHeader::construct_in_place(raw_chunk, chunk_size, settings) };

        if !self.data.chunks_in_use.insert(chunk) {
            // the reused chunk went back to its pool, allocation continues
            // on the regular path and fails there with a proper error
            return None;
        }

        Some(header)
    }

    fn stamp(&self, mut header: NonNull<ChunkHeader>, origin_id: u64) {
        let header = unsafe { header.as_mut() };
        header.set_origin_id(origin_id);
        header.set_sequence_number(self.data.sequence_number.fetch_add(1, Ordering::Relaxed));
    }

    /// Returns a loaned chunk without sending it. A header that was not
    /// loaned from this sender is fatal.
    pub fn release(&self, header: NonNull<ChunkHeader>) {
        match self.data.chunks_in_use.remove(header) {
            Some(chunk) => drop(chunk),
            None => fatal_panic!(from self.data,
                "Released the chunk {:#x} which was not loaned from this sender.",
                header.as_ptr() as usize),
        }
    }

    /// Sends a loaned chunk to every registered queue, appends it to the
    /// history and keeps it as the reuse candidate. Returns the number of
    /// queues that accepted it.
    pub fn send(&self, header: NonNull<ChunkHeader>) -> u64 {
        let chunk = match self.data.chunks_in_use.remove(header) {
            Some(chunk) => chunk,
            None => fatal_panic!(from self.data,
                "Sent the chunk {:#x} which was not loaned from this sender.",
                header.as_ptr() as usize),
        };

        let number_of_deliveries = self.distributor().deliver_to_all_stored_queues(chunk.clone());
        self.remember_as_last_chunk(chunk);
        number_of_deliveries
    }

    /// Like [`ChunkSender::send()`] but the chunk only enters the history,
    /// nothing is delivered.
    pub fn push_to_history(&self, header: NonNull<ChunkHeader>) {
        let chunk = match self.data.chunks_in_use.remove(header) {
            Some(chunk) => chunk,
            None => fatal_panic!(from self.data,
                "Pushed the chunk {:#x} to the history although it was not loaned from this sender.",
                header.as_ptr() as usize),
        };

        self.distributor().add_to_history_without_delivery(chunk.clone());
        self.remember_as_last_chunk(chunk);
    }

    fn remember_as_last_chunk(&self, chunk: SharedChunk) {
        let previous = core::mem::replace(self.last_chunk(), ShmSafeUnmanagedChunk::new(chunk));
        if !previous.is_logical_nullptr() {
            let mut previous = previous;
            drop(previous.release_to_shared_chunk());
        }
    }

    /// The most recently sent chunk, when it is still exclusively owned by
    /// this sender and therefore reusable.
    pub fn try_get_previous_chunk(&self) -> Option<NonNull<ChunkHeader>> {
        let last_chunk = self.last_chunk();
        if last_chunk.is_not_logical_nullptr_and_has_no_other_owners() {
            last_chunk.chunk_header()
        } else {
            None
        }
    }

    pub fn try_add_queue(
        &self,
        queue: &ChunkQueueData<QueueLock, QUEUE_CAPACITY>,
        requested_history: u64,
    ) -> Result<(), ChunkDistributorAddQueueError> {
        self.distributor().try_add_queue(queue, requested_history)
    }

    pub fn try_remove_queue(
        &self,
        queue: &ChunkQueueData<QueueLock, QUEUE_CAPACITY>,
    ) -> Result<(), ChunkDistributorRemoveQueueError> {
        self.distributor().try_remove_queue(queue)
    }

    pub fn remove_all_queues(&self) {
        self.distributor().remove_all_queues()
    }

    pub fn number_of_stored_queues(&self) -> usize {
        self.distributor().number_of_stored_queues()
    }

    pub fn history_size(&self) -> u64 {
        self.distributor().history_size()
    }

    /// Drops every loaned chunk, the history and the reuse candidate.
    /// Called on publisher shutdown.
    pub fn release_all(&self) {
        self.data.chunks_in_use.cleanup();
        self.distributor().clear_history();

        let last_chunk = self.last_chunk();
        if !last_chunk.is_logical_nullptr() {
            drop(last_chunk.release_to_shared_chunk());
        }
    }
}
