// Copyright (c) 2024 Contributors to the membrane project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use core::fmt::Debug;
use core::ptr::NonNull;

use membrane_bb_container::variant_queue::VariantQueueKind;
use membrane_bb_elementary::enum_gen;
use membrane_log::{fail, fatal_panic};

use crate::memory::chunk_header::ChunkHeader;
use crate::port::chunk_queue_data::ChunkQueueData;
use crate::port::chunk_queue_popper::ChunkQueuePopper;
use crate::port::locking_policy::LockingPolicy;
use crate::port::policy::QueueFullPolicy;
use crate::port::used_chunk_list::UsedChunkList;

enum_gen! {
    /// Failures of [`ChunkReceiver::try_get()`].
    ChunkReceiveError
  entry:
    /// The receiver holds the maximum number of chunks, one must be
    /// released before another can be obtained.
    TooManyChunksHeldInParallel
}

/// The shared-memory state of one receiving endpoint: its queue plus the
/// list of chunks currently held by the application, the latter scanned by
/// the daemon when the process dies.
///
/// `MAX_CHUNKS_IN_USE` is the held-chunks maximum plus one slack slot so
/// that the one overshooting [`ChunkReceiver::try_get()`] is recoverable
/// with a single release call.
#[repr(C)]
pub struct ChunkReceiverData<
    QueueLock: LockingPolicy,
    const QUEUE_CAPACITY: usize,
    const MAX_CHUNKS_IN_USE: usize,
> {
    queue: ChunkQueueData<QueueLock, QUEUE_CAPACITY>,
    chunks_in_use: UsedChunkList<MAX_CHUNKS_IN_USE>,
}

impl<QueueLock: LockingPolicy, const QUEUE_CAPACITY: usize, const MAX_CHUNKS_IN_USE: usize> Debug
    for ChunkReceiverData<QueueLock, QUEUE_CAPACITY, MAX_CHUNKS_IN_USE>
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "ChunkReceiverData {{ queue: {:?}, chunks_in_use: {:?} }}",
            self.queue, self.chunks_in_use,
        )
    }
}

impl<QueueLock: LockingPolicy, const QUEUE_CAPACITY: usize, const MAX_CHUNKS_IN_USE: usize>
    ChunkReceiverData<QueueLock, QUEUE_CAPACITY, MAX_CHUNKS_IN_USE>
{
    pub fn new(queue_kind: VariantQueueKind, queue_full_policy: QueueFullPolicy) -> Self {
        Self {
            queue: ChunkQueueData::new(queue_kind, queue_full_policy),
            chunks_in_use: UsedChunkList::new(),
        }
    }

    /// The queue the publisher side registers at the distributor.
    pub fn queue_data(&self) -> &ChunkQueueData<QueueLock, QUEUE_CAPACITY> {
        &self.queue
    }

    /// The list the daemon scans to reclaim held chunks of a dead
    /// subscriber.
    pub fn chunks_in_use(&self) -> &UsedChunkList<MAX_CHUNKS_IN_USE> {
        &self.chunks_in_use
    }
}

/// The receiving endpoint facade: pops chunks from the queue into the
/// held-chunks list and hands the application the [`ChunkHeader`]. All
/// methods must be called from the one receiving thread.
#[derive(Debug)]
pub struct ChunkReceiver<
    'a,
    QueueLock: LockingPolicy,
    const QUEUE_CAPACITY: usize,
    const MAX_CHUNKS_IN_USE: usize,
> {
    data: &'a ChunkReceiverData<QueueLock, QUEUE_CAPACITY, MAX_CHUNKS_IN_USE>,
}

impl<'a, QueueLock: LockingPolicy, const QUEUE_CAPACITY: usize, const MAX_CHUNKS_IN_USE: usize>
    ChunkReceiver<'a, QueueLock, QUEUE_CAPACITY, MAX_CHUNKS_IN_USE>
{
    pub fn new(data: &'a ChunkReceiverData<QueueLock, QUEUE_CAPACITY, MAX_CHUNKS_IN_USE>) -> Self {
        Self { data }
    }

    pub fn popper(&self) -> ChunkQueuePopper<'a, QueueLock, QUEUE_CAPACITY> {
        ChunkQueuePopper::new(&self.data.queue)
    }

    /// Obtains the next chunk. `Ok(None)` means no chunk is available.
    /// When the held-chunks list is full the popped chunk is dropped and
    /// the receiver must release a chunk before trying again.
    pub fn try_get(&self) -> Result<Option<NonNull<ChunkHeader>>, ChunkReceiveError> {
        let chunk = match self.popper().pop() {
            None => return Ok(None),
            Some(chunk) => chunk,
        };

        let header = chunk
            .chunk_header()
            .expect("a popped chunk is never null");

        if !self.data.chunks_in_use.insert(chunk) {
            fail!(from self.data, with ChunkReceiveError::TooManyChunksHeldInParallel,
                "Unable to hold the obtained chunk since the receiver already holds {} chunks.",
                MAX_CHUNKS_IN_USE);
        }

        Ok(Some(header))
    }

    /// Returns a held chunk. A header that is not held by this receiver is
    /// fatal.
    pub fn release(&self, header: NonNull<ChunkHeader>) {
        match self.data.chunks_in_use.remove(header) {
            Some(chunk) => drop(chunk),
            None => fatal_panic!(from self.data,
                "Released the chunk {:#x} which is not held by this receiver.",
                header.as_ptr() as usize),
        }
    }

    /// Drops every held chunk and drains the queue. Called on subscriber
    /// shutdown.
    pub fn release_all(&self) {
        self.data.chunks_in_use.cleanup();
        self.popper().clear();
    }

    pub fn has_lost_chunks(&self) -> bool {
        self.popper().has_lost_chunks()
    }
}
