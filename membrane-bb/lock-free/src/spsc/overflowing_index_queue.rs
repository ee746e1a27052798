// Copyright (c) 2024 Contributors to the membrane project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A **threadsafe** **lock-free** single producer single consumer queue of
//! `u64` values with overflow behavior: when the queue is full the oldest
//! value is evicted, handed back to the producer and replaced with the
//! newest.
//!
//! # Example
//!
//! ```
//! use membrane_bb_lock_free::spsc::overflowing_index_queue::FixedSizeOverflowingIndexQueue;
//!
//! const QUEUE_CAPACITY: usize = 128;
//! let queue = FixedSizeOverflowingIndexQueue::<QUEUE_CAPACITY>::new();
//!
//! match unsafe { queue.push(1234) } {
//!     Some(evicted) => println!("queue was full, evicted oldest value {}", evicted),
//!     None => println!("pushed 1234"),
//! }
//! ```

use core::cell::UnsafeCell;
use core::fmt::Debug;
use core::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use membrane_bb_elementary::enum_gen;
use membrane_bb_elementary::math::{align_to, unaligned_mem_size};
use membrane_bb_elementary::owning_pointer::OwningPointer;
use membrane_bb_elementary::pointer_trait::PointerTrait;
use membrane_bb_elementary::relocatable_ptr::RelocatablePointer;
use membrane_log::fail;

enum_gen! {
    /// Failures when constructing a queue with a reduced working capacity.
    QueueCreationError
  entry:
    ProvidedCapacityIsZero,
    ProvidedCapacityGreaterThanMaxCapacity
}

/// Non-relocatable version of the overflowing index queue.
pub type OverflowingIndexQueue = details::OverflowingIndexQueue<OwningPointer<UnsafeCell<u64>>>;

/// Relocatable version of the overflowing index queue for shared memory
/// placement.
pub type RelocatableOverflowingIndexQueue =
    details::OverflowingIndexQueue<RelocatablePointer<UnsafeCell<u64>>>;

pub mod details {
    use super::*;

    /// A bounded FIFO for exactly one producing and one consuming thread.
    /// When the queue is full the oldest value is evicted and returned to
    /// the producer. The data array holds one slot more than the capacity
    /// since an overflowing push writes its value before the oldest one is
    /// reclaimed.
    #[derive(Debug)]
    #[repr(C)]
    pub struct OverflowingIndexQueue<PointerType: PointerTrait<UnsafeCell<u64>>> {
        // must stay the first member, the fixed-size variant relies on a
        // constant distance from this pointer to its data array
        data_ptr: PointerType,
        capacity: AtomicUsize,
        write_position: AtomicU64,
        read_position: AtomicU64,
        is_memory_initialized: AtomicBool,
    }

    unsafe impl<PointerType: PointerTrait<UnsafeCell<u64>>> Sync
        for OverflowingIndexQueue<PointerType>
    {
    }
    unsafe impl<PointerType: PointerTrait<UnsafeCell<u64>>> Send
        for OverflowingIndexQueue<PointerType>
    {
    }

    impl OverflowingIndexQueue<OwningPointer<UnsafeCell<u64>>> {
        pub fn new(capacity: usize) -> Self {
            let mut data_ptr = OwningPointer::<UnsafeCell<u64>>::new_with_alloc(capacity + 1);

            for i in 0..capacity + 1 {
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

    impl OverflowingIndexQueue<RelocatablePointer<UnsafeCell<u64>>> {
        /// Creates an [`OverflowingIndexQueue`] whose data array starts at a
        /// fixed distance behind the queue head, see
        /// [`FixedSizeOverflowingIndexQueue`].
        ///
        /// # Safety
        ///
        ///  * the memory at `distance_to_data` must hold `capacity + 1`
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

    impl<PointerType: PointerTrait<UnsafeCell<u64>> + Debug> OverflowingIndexQueue<PointerType> {
        #[inline(always)]
        fn verify_init(&self, source: &str) {
            debug_assert!(
                self.is_memory_initialized.load(Ordering::Relaxed),
                "Undefined behavior when calling OverflowingIndexQueue::{source} and the object is not initialized."
            );
        }

        /// Returns the amount of memory required for an
        /// [`OverflowingIndexQueue`] with the provided capacity.
        pub const fn const_memory_size(capacity: usize) -> usize {
            unaligned_mem_size::<UnsafeCell<u64>>(capacity + 1)
        }

        fn at(&self, position: u64) -> *mut u64 {
            unsafe {
                (*self
                    .data_ptr
                    .as_ptr()
                    .add((position % (self.capacity.load(Ordering::Relaxed) as u64 + 1)) as usize))
                .get()
            }
        }

        /// Adds a value to the queue. When the queue is full the oldest
        /// value is evicted and returned, otherwise [`None`].
        ///
        /// # Safety
        ///
        ///  * at most one thread may call
        ///    [`OverflowingIndexQueue::push()`]
        ///
        pub unsafe fn push(&self, value: u64) -> Option<u64> {
            self.verify_init("push()");

            ////////////////
            // SYNC POINT R
            ////////////////
            // required when the overflow path of push is entered from a
            // different thread than the previous push
            let write_position = self.write_position.load(Ordering::Acquire);
            let read_position = self.read_position.load(Ordering::Relaxed);
            let is_full =
                write_position == read_position + self.capacity.load(Ordering::Relaxed) as u64;

            unsafe { self.at(write_position).write(value) };

            ////////////////
            // SYNC POINT W
            ////////////////
            self.write_position
                .store(write_position + 1, Ordering::Release);

            if is_full
                && self
                    .read_position
                    .compare_exchange(
                        read_position,
                        read_position + 1,
                        ////////////////
                        // SYNC POINT R
                        ////////////////
                        Ordering::AcqRel,
                        Ordering::Relaxed,
                    )
                    .is_ok()
            {
                Some(unsafe { *self.at(read_position) })
            } else {
                None
            }
        }

        /// Acquires a value from the queue, [`None`] when it is empty.
        ///
        /// # Safety
        ///
        ///  * at most one thread may call [`OverflowingIndexQueue::pop()`]
        ///
        pub unsafe fn pop(&self) -> Option<u64> {
            let mut read_position = self.read_position.load(Ordering::Relaxed);
            ////////////////
            // SYNC POINT W
            ////////////////
            let is_empty = read_position == self.write_position.load(Ordering::Acquire);

            if is_empty {
                return None;
            }

            // the producer may bump the read position concurrently when it
            // overflows, in that case the slot just read was overwritten and
            // the read must be retried
            let mut value;
            loop {
                value = unsafe { *self.at(read_position) };

                match self.read_position.compare_exchange(
                    read_position,
                    read_position + 1,
                    Ordering::Relaxed,
                    ////////////////
                    // SYNC POINT R
                    ////////////////
                    Ordering::Acquire,
                ) {
                    Ok(_) => break,
                    Err(v) => read_position = v,
                }
            }

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
                "the capacity of an OverflowingIndexQueue can only be changed when it is empty"
            );
            self.capacity.store(capacity, Ordering::Relaxed);
        }
    }
}

/// The compile-time fixed size version of the [`OverflowingIndexQueue`].
#[derive(Debug)]
#[repr(C)]
pub struct FixedSizeOverflowingIndexQueue<const CAPACITY: usize> {
    state: RelocatableOverflowingIndexQueue,
    data: [UnsafeCell<u64>; CAPACITY],
    data_plus_one: UnsafeCell<u64>,
}

unsafe impl<const CAPACITY: usize> Sync for FixedSizeOverflowingIndexQueue<CAPACITY> {}
unsafe impl<const CAPACITY: usize> Send for FixedSizeOverflowingIndexQueue<CAPACITY> {}

impl<const CAPACITY: usize> Default for FixedSizeOverflowingIndexQueue<CAPACITY> {
    fn default() -> Self {
        Self {
            state: unsafe {
                RelocatableOverflowingIndexQueue::new(
                    CAPACITY,
                    align_to::<UnsafeCell<u64>>(core::mem::size_of::<
                        RelocatableOverflowingIndexQueue,
                    >()) as isize,
                )
            },
            data: core::array::from_fn(|_| UnsafeCell::new(0)),
            data_plus_one: UnsafeCell::new(0),
        }
    }
}

impl<const CAPACITY: usize> FixedSizeOverflowingIndexQueue<CAPACITY> {
    /// Creates a new empty [`FixedSizeOverflowingIndexQueue`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new empty [`FixedSizeOverflowingIndexQueue`] with a reduced
    /// working capacity. Fails when the capacity is zero or greater than
    /// CAPACITY.
    pub fn with_capacity(capacity: usize) -> Result<Self, QueueCreationError> {
        let origin = "FixedSizeOverflowingIndexQueue::with_capacity";
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
                RelocatableOverflowingIndexQueue::new(
                    capacity,
                    align_to::<UnsafeCell<u64>>(core::mem::size_of::<
                        RelocatableOverflowingIndexQueue,
                    >()) as isize,
                )
            },
            data: core::array::from_fn(|_| UnsafeCell::new(0)),
            data_plus_one: UnsafeCell::new(0),
        })
    }

    /// See [`details::OverflowingIndexQueue::push()`]
    ///
    /// # Safety
    ///
    /// * at most one thread may push concurrently
    ///
    pub unsafe fn push(&self, value: u64) -> Option<u64> {
        self.state.push(value)
    }

    /// See [`details::OverflowingIndexQueue::pop()`]
    ///
    /// # Safety
    ///
    /// * at most one thread may pop concurrently
    ///
    pub unsafe fn pop(&self) -> Option<u64> {
        self.state.pop()
    }

    /// See [`details::OverflowingIndexQueue::set_capacity()`]
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
