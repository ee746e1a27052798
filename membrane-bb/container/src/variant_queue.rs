// Copyright (c) 2024 Contributors to the membrane project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A queue whose overflow discipline is selected at construction: either the
//! rejecting [`FixedSizeIndexQueue`] or the overflowing
//! [`FixedSizeOverflowingIndexQueue`], behind one uniform push/pop surface.

use membrane_bb_lock_free::spsc::index_queue::FixedSizeIndexQueue;
use membrane_bb_lock_free::spsc::overflowing_index_queue::{
    FixedSizeOverflowingIndexQueue, QueueCreationError,
};

/// Selects the overflow discipline of a [`VariantQueue`].
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum VariantQueueKind {
    /// Strict FIFO, a push on a full queue is refused.
    FiFoRejectsOnOverflow,
    /// Safely overflowing FIFO, a push on a full queue evicts the oldest
    /// value.
    FiFoEvictsOldestOnOverflow,
}

/// The outcome of a [`VariantQueue::push()`].
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum PushResult {
    Pushed,
    /// The queue was full and evicted its oldest value to make room.
    Evicted(u64),
    /// The queue was full and refused the value.
    Full,
}

/// Single producer single consumer queue of `u64` values with a
/// construction-time overflow discipline.
#[derive(Debug)]
#[repr(C)]
pub enum VariantQueue<const CAPACITY: usize> {
    FiFo(FixedSizeIndexQueue<CAPACITY>),
    SoFi(FixedSizeOverflowingIndexQueue<CAPACITY>),
}

impl<const CAPACITY: usize> VariantQueue<CAPACITY> {
    pub fn new(kind: VariantQueueKind) -> Self {
        match kind {
            VariantQueueKind::FiFoRejectsOnOverflow => Self::FiFo(FixedSizeIndexQueue::new()),
            VariantQueueKind::FiFoEvictsOldestOnOverflow => {
                Self::SoFi(FixedSizeOverflowingIndexQueue::new())
            }
        }
    }

    /// Like [`VariantQueue::new()`] but with a reduced working capacity.
    pub fn with_capacity(
        kind: VariantQueueKind,
        capacity: usize,
    ) -> Result<Self, QueueCreationError> {
        Ok(match kind {
            VariantQueueKind::FiFoRejectsOnOverflow => {
                Self::FiFo(FixedSizeIndexQueue::with_capacity(capacity)?)
            }
            VariantQueueKind::FiFoEvictsOldestOnOverflow => {
                Self::SoFi(FixedSizeOverflowingIndexQueue::with_capacity(capacity)?)
            }
        })
    }

    pub fn kind(&self) -> VariantQueueKind {
        match self {
            Self::FiFo(_) => VariantQueueKind::FiFoRejectsOnOverflow,
            Self::SoFi(_) => VariantQueueKind::FiFoEvictsOldestOnOverflow,
        }
    }

    /// Adds a value to the queue.
    ///
    /// # Safety
    ///
    /// * at most one thread may push concurrently
    ///
    pub unsafe fn push(&self, value: u64) -> PushResult {
        match self {
            Self::FiFo(queue) => match queue.push(value) {
                true => PushResult::Pushed,
                false => PushResult::Full,
            },
            Self::SoFi(queue) => match queue.push(value) {
                None => PushResult::Pushed,
                Some(evicted) => PushResult::Evicted(evicted),
            },
        }
    }

    /// Acquires a value from the queue, [`None`] when it is empty.
    ///
    /// # Safety
    ///
    /// * at most one thread may pop concurrently
    ///
    pub unsafe fn pop(&self) -> Option<u64> {
        match self {
            Self::FiFo(queue) => queue.pop(),
            Self::SoFi(queue) => queue.pop(),
        }
    }

    /// Reduces the working capacity of the queue.
    ///
    /// # Safety
    ///
    /// * the queue must be empty and quiescent, `capacity <= CAPACITY`
    ///
    pub unsafe fn set_capacity(&self, capacity: usize) {
        match self {
            Self::FiFo(queue) => queue.set_capacity(capacity),
            Self::SoFi(queue) => queue.set_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::FiFo(queue) => queue.len(),
            Self::SoFi(queue) => queue.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::FiFo(queue) => queue.is_empty(),
            Self::SoFi(queue) => queue.is_empty(),
        }
    }

    pub fn is_full(&self) -> bool {
        match self {
            Self::FiFo(queue) => queue.is_full(),
            Self::SoFi(queue) => queue.is_full(),
        }
    }

    pub fn capacity(&self) -> usize {
        match self {
            Self::FiFo(queue) => queue.capacity(),
            Self::SoFi(queue) => queue.capacity(),
        }
    }
}
