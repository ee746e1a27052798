// Copyright (c) 2024 Contributors to the membrane project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A **threadsafe** **lock-free** single producer single consumer queue of
//! `u64` values which rejects a push when the queue is full. The overflowing
//! sibling is [`crate::spsc::overflowing_index_queue`].
//!
//! # Example
//!
//! ```
//! use membrane_bb_lock_free::spsc::index_queue::FixedSizeIndexQueue;
//!
//! const QUEUE_CAPACITY: usize = 128;
//! let queue = FixedSizeIndexQueue::<QUEUE_CAPACITY>::new();
//!
//! if unsafe { queue.push(1234) } {
//!     println!("pushed 1234");
//! }
//!
//! match unsafe { queue.pop() } {
//!     None => println!("queue is empty"),
//!     Some(v) => println!("got {}", v),
//! }
//! ```

use core::cell::UnsafeCell;
use core::fmt::Debug;
use core::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use membrane_bb_elementary::math::{align_to, unaligned_mem_size};
use membrane_bb_elementary::owning_pointer::OwningPointer;
use membrane_bb_elementary::pointer_trait::PointerTrait;
use membrane_bb_elementary::relocatable_ptr::RelocatablePointer;
use membrane_log::fail;

use crate::spsc::overflowing_index_queue::QueueCreationError;

/// Non-relocatable version of the index queue, backed by heap memory.
pub type IndexQueue = details::IndexQueue<OwningPointer<UnsafeCell<u64>>>;

/// Relocatable version of the index queue for shared memory placement.
pub type RelocatableIndexQueue = details::IndexQueue<RelocatablePointer<UnsafeCell<u64>>>;

pub mod details {
    use super::*;

    /// A bounded FIFO for exactly one producing and one consuming thread.
    /// When the queue is full a push is refused and the value stays with the
    /// caller.
    #[derive(Debug)]
    #[repr(C)]
    pub struct IndexQueue<PointerType: PointerTrait<UnsafeCell<u64>>> {
        // must stay the first member, the fixed-size variant relies on a
        // constant distance from this pointer to its data array
        data_ptr: PointerType,
        capacity: AtomicUsize,
        write_position: AtomicU64,
        read_position: AtomicU64,
        is_memory_initialized: AtomicBool,
    }

    unsafe impl<PointerType: PointerTrait<UnsafeCell<u64>>> Sync for IndexQueue<PointerType> {}
    unsafe impl<PointerType: PointerTrait<UnsafeCell<u64>>> Send for IndexQueue<PointerType> {}

    impl IndexQueue<OwningPointer<UnsafeCell<u64>>> {
        pub fn new(capacity: usize) -> Self {
            let mut data_ptr = OwningPointer::<UnsafeCell<u64>>::new_with_alloc(capacity);

            for i in 0..capacity {
                unsafe { data_ptr.as_mut_ptr().add(i).write(UnsafeCell::new(0)) };
            }

            Self {
                data_ptr,
                capacity: AtomicUsize::new(capacity),
                write_position: AtomicU64::new(0),
                read_position: AtomicU64::new(0),
                is_memory_initialized: AtomicBool::new(true),
            }
        }
    }

    impl IndexQueue<RelocatablePointer<UnsafeCell<u64>>> {
        /// Creates an [`IndexQueue`] whose data array starts at a fixed
        /// distance behind the queue head, see [`FixedSizeIndexQueue`].
        ///
        /// # Safety
        ///
        ///  * the memory at `distance_to_data` must hold `capacity`
        ///    initialized `UnsafeCell<u64>` values
        ///
        pub unsafe fn new(capacity: usize, distance_to_data: isize) -> Self {
            Self {
                data_ptr: RelocatablePointer::new(distance_to_data),
                capacity: AtomicUsize::new(capacity),
                write_position: AtomicU64::new(0),
                read_position: AtomicU64::new(0),
                is_memory_initialized: AtomicBool::new(true),
            }
        }
    }

    impl<PointerType: PointerTrait<UnsafeCell<u64>> + Debug> IndexQueue<PointerType> {
        #[inline(always)]
        fn verify_init(&self, source: &str) {
            debug_assert!(
                self.is_memory_initialized.load(Ordering::Relaxed),
                "Undefined behavior when calling IndexQueue::{source} and the object is not initialized."
            );
        }

        /// Returns the amount of memory required for an [`IndexQueue`] with
        /// the provided capacity.
        pub const fn const_memory_size(capacity: usize) -> usize {
            unaligned_mem_size::<UnsafeCell<u64>>(capacity)
        }

        fn at(&self, position: u64) -> *mut u64 {
            unsafe {
                (*self
                    .data_ptr
                    .as_ptr()
                    .add((position % self.capacity.load(Ordering::Relaxed) as u64) as usize))
                .get()
            }
        }

        /// Adds a value to the queue. Returns false and leaves the queue
        /// untouched when it is full.
        ///
        /// # Safety
        ///
        ///  * at most one thread may call [`IndexQueue::push()`]
        ///
        pub unsafe fn push(&self, value: u64) -> bool {
            self.verify_init("push()");

            let write_position = self.write_position.load(Ordering::Relaxed);
            ////////////////
            // SYNC POINT R
            ////////////////
            let read_position = self.read_position.load(Ordering::Acquire);

            if write_position == read_position + self.capacity.load(Ordering::Relaxed) as u64 {
                return false;
            }

            unsafe { self.at(write_position).write(value) };

            ////////////////
            // SYNC POINT W
            ////////////////
            self.write_position
                .store(write_position + 1, Ordering::Release);
            true
        }

        /// Acquires a value from the queue, [`None`] when it is empty.
        ///
        /// # Safety
        ///
        ///  * at most one thread may call [`IndexQueue::pop()`]
        ///
        pub unsafe fn pop(&self) -> Option<u64> {
            self.verify_init("pop()");

            let read_position = self.read_position.load(Ordering::Relaxed);
            ////////////////
            // SYNC POINT W
            ////////////////
            let is_empty = read_position == self.write_position.load(Ordering::Acquire);

            if is_empty {
                return None;
            }

            let value = unsafe { *self.at(read_position) };

            ////////////////
            // SYNC POINT R
            ////////////////
            self.read_position
                .store(read_position + 1, Ordering::Release);

            Some(value)
        }

        fn acquire_read_and_write_position(&self) -> (u64, u64) {
            loop {
                let write_position = self.write_position.load(Ordering::Relaxed);
                let read_position = self.read_position.load(Ordering::Relaxed);

                if write_position == self.write_position.load(Ordering::Relaxed)
                    && read_position == self.read_position.load(Ordering::Relaxed)
                {
                    return (write_position, read_position);
                }
            }
        }

        /// Note: only meaningful in a non-concurrent setup, the information
        /// can be out-of-date as soon as it is acquired.
        pub fn is_empty(&self) -> bool {
            let (write_position, read_position) = self.acquire_read_and_write_position();
            write_position == read_position
        }

        /// Note: only meaningful in a non-concurrent setup, the information
        /// can be out-of-date as soon as it is acquired.
        pub fn len(&self) -> usize {
            let (write_position, read_position) = self.acquire_read_and_write_position();
            (write_position - read_position) as usize
        }

        /// Note: only meaningful in a non-concurrent setup, the information
        /// can be out-of-date as soon as it is acquired.
        pub fn is_full(&self) -> bool {
            let (write_position, read_position) = self.acquire_read_and_write_position();
            write_position == read_position + self.capacity.load(Ordering::Relaxed) as u64
        }

        pub fn capacity(&self) -> usize {
            self.capacity.load(Ordering::Relaxed)
        }

        /// Reduces the working capacity of the queue.
        ///
        /// # Safety
        ///
        ///  * the queue must be empty
        ///  * no push or pop may occur while the capacity is changed
        ///  * `capacity` must not exceed the capacity the queue was created
        ///    with
        ///
        pub unsafe fn set_capacity(&self, capacity: usize) {
            debug_assert!(
                self.is_empty(),
                "the capacity of an IndexQueue can only be changed when it is empty"
            );
            self.capacity.store(capacity, Ordering::Relaxed);
        }
    }
}

/// The compile-time fixed size version of the [`IndexQueue`].
#[derive(Debug)]
#[repr(C)]
pub struct FixedSizeIndexQueue<const CAPACITY: usize> {
    state: RelocatableIndexQueue,
    data: [UnsafeCell<u64>; CAPACITY],
}

unsafe impl<const CAPACITY: usize> Sync for FixedSizeIndexQueue<CAPACITY> {}
unsafe impl<const CAPACITY: usize> Send for FixedSizeIndexQueue<CAPACITY> {}

impl<const CAPACITY: usize> Default for FixedSizeIndexQueue<CAPACITY> {
    fn default() -> Self {
        Self {
            state: unsafe {
                RelocatableIndexQueue::new(
                    CAPACITY,
                    align_to::<UnsafeCell<u64>>(core::mem::size_of::<RelocatableIndexQueue>())
                        as isize,
                )
            },
            data: core::array::from_fn(|_| UnsafeCell::new(0)),
        }
    }
}

impl<const CAPACITY: usize> FixedSizeIndexQueue<CAPACITY> {
    /// Creates a new empty [`FixedSizeIndexQueue`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new empty [`FixedSizeIndexQueue`] with a reduced working
    /// capacity. Fails when the capacity is zero or greater than CAPACITY.
    pub fn with_capacity(capacity: usize) -> Result<Self, QueueCreationError> {
        let origin = "FixedSizeIndexQueue::with_capacity";
        if capacity == 0 {
            fail!(from origin, with QueueCreationError::ProvidedCapacityIsZero,
                "Provided value of capacity is zero.");
        }

        if capacity > CAPACITY {
            fail!(from origin, with QueueCreationError::ProvidedCapacityGreaterThanMaxCapacity,
                "Provided value of capacity {} exceeds the maximum supported capacity of {}.",
                capacity, CAPACITY);
        }

        Ok(Self {
            state: unsafe {
                RelocatableIndexQueue::new(
                    capacity,
                    align_to::<UnsafeCell<u64>>(core::mem::size_of::<RelocatableIndexQueue>())
                        as isize,
                )
            },
            data: core::array::from_fn(|_| UnsafeCell::new(0)),
        })
    }

    /// See [`details::IndexQueue::push()`]
    ///
    /// # Safety
    ///
    /// * at most one thread may push concurrently
    ///
    pub unsafe fn push(&self, value: u64) -> bool {
        self.state.push(value)
    }

    /// See [`details::IndexQueue::pop()`]
    ///
    /// # Safety
    ///
    /// * at most one thread may pop concurrently
    ///
    pub unsafe fn pop(&self) -> Option<u64> {
        self.state.pop()
    }

    /// See [`details::IndexQueue::set_capacity()`]
    ///
    /// # Safety
    ///
    /// * the queue must be empty and quiescent, `capacity <= CAPACITY`
    ///
    pub unsafe fn set_capacity(&self, capacity: usize) {
        debug_assert!(capacity <= CAPACITY);
        self.state.set_capacity(capacity)
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }

    pub fn len(&self) -> usize {
        self.state.len()
    }

    pub fn is_full(&self) -> bool {
        self.state.is_full()
    }

    pub fn capacity(&self) -> usize {
        self.state.capacity()
    }
}
