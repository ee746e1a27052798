// Copyright (c) 2024 Contributors to the membrane project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A **threadsafe** and **lock-free** pool of indices, the free-list behind
//! every chunk pool. On creation it is filled with the indices
//! `0..capacity` which can be acquired and released from any number of
//! threads or processes.
//!
//! The pool head packs the top-of-stack index, an ABA counter and the number
//! of acquired indices into a single 64 bit compare-and-swap word, which
//! bounds the capacity to 2^24 - 2 indices.
//!
//! # Example
//!
//! ```
//! use membrane_bb_lock_free::mpmc::index_pool::FixedSizeIndexPool;
//!
//! const CAPACITY: usize = 128;
//! let pool = FixedSizeIndexPool::<CAPACITY>::new();
//!
//! let index = match pool.acquire() {
//!     None => panic!("out of indices"),
//!     Some(i) => i,
//! };
//!
//! pool.release(index);
//! ```

use core::alloc::Layout;
use core::cell::UnsafeCell;
use core::sync::atomic::{fence, AtomicBool, AtomicU64, Ordering};

use membrane_bb_elementary::allocator::{AllocationError, BaseAllocator};
use membrane_bb_elementary::math::{align_to, unaligned_mem_size};
use membrane_bb_elementary::pointer_trait::PointerTrait;
use membrane_bb_elementary::relocatable_container::RelocatableContainer;
use membrane_bb_elementary::relocatable_ptr::RelocatablePointer;
use membrane_log::{fail, fatal_panic};

/// Indices above this cannot be tracked since the in-use count shares the
/// 64 bit head word with the top index and the ABA counter.
pub const MAX_TRACKABLE_INDICES: usize = 2usize.pow(24) - 2;

const INDEX_BITS: u32 = 24;
const ABA_BITS: u32 = 16;

#[derive(Debug, Clone, Copy)]
struct HeadState {
    top: u32,
    aba: u16,
    in_use: u32,
}

impl HeadState {
    fn unpack(value: u64) -> Self {
        Self {
            top: (value >> (INDEX_BITS + ABA_BITS)) as u32 & ((1 << INDEX_BITS) - 1),
            aba: (value >> INDEX_BITS) as u16,
            in_use: value as u32 & ((1 << INDEX_BITS) - 1),
        }
    }

    fn pack(&self) -> u64 {
        ((self.top as u64) << (INDEX_BITS + ABA_BITS))
            | ((self.aba as u64) << INDEX_BITS)
            | self.in_use as u64
    }
}

/// A **non-movable** [`IndexPool`] with a runtime fixed capacity, placed
/// into shared memory with the two-phase [`RelocatableContainer`] scheme.
/// The compile time version is the [`FixedSizeIndexPool`].
#[repr(C)]
#[derive(Debug)]
pub struct IndexPool {
    // must stay the first member, the fixed-size variant relies on a
    // constant distance from this pointer to its data array
    next_free_index: RelocatablePointer<UnsafeCell<u32>>,
    capacity: u32,
    head: AtomicU64,
    is_memory_initialized: AtomicBool,
}

unsafe impl Send for IndexPool {}
unsafe impl Sync for IndexPool {}

impl RelocatableContainer for IndexPool {
    unsafe fn new_uninit(capacity: usize) -> Self {
        debug_assert!(
            0 < capacity && capacity <= MAX_TRACKABLE_INDICES,
            "the capacity must not exceed the maximum trackable indices of an IndexPool"
        );

        Self {
            next_free_index: RelocatablePointer::new_uninit(),
            capacity: capacity as u32,
            head: AtomicU64::new(0),
            is_memory_initialized: AtomicBool::new(false),
        }
    }

    unsafe fn init<T: BaseAllocator>(&mut self, allocator: &T) -> Result<(), AllocationError> {
        if self.is_memory_initialized.load(Ordering::Relaxed) {
            fatal_panic!(from self,
                "Memory already initialized. Initializing it twice may lead to undefined behavior.");
        }

        self.next_free_index.init(fail!(from self, when allocator
            .allocate(Layout::from_size_align_unchecked(
                core::mem::size_of::<u32>() * (self.capacity + 1) as usize,
                core::mem::align_of::<u32>())),
            "Failed to initialize since the allocation of the data memory failed."
        ));

        for i in 0..self.capacity + 1 {
            (self.next_free_index.as_ptr() as *mut UnsafeCell<u32>)
                .add(i as usize)
                .write(UnsafeCell::new(i + 1));
        }

        self.is_memory_initialized.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn memory_size(capacity: usize) -> usize {
        Self::const_memory_size(capacity)
    }
}

impl IndexPool {
    /// Creates an [`IndexPool`] whose data array starts at a fixed distance
    /// behind the pool head, see [`FixedSizeIndexPool`].
    ///
    /// # Safety
    ///
    ///  * the memory at `distance_to_data` must hold `capacity + 1`
    ///    initialized `u32` values forming the free-list
    ///
    pub unsafe fn new(capacity: usize, distance_to_data: isize) -> Self {
        Self {
            next_free_index: RelocatablePointer::new(distance_to_data),
            capacity: capacity as u32,
            head: AtomicU64::new(0),
            is_memory_initialized: AtomicBool::new(true),
        }
    }

    #[inline(always)]
    fn verify_init(&self, source: &str) {
        debug_assert!(
            self.is_memory_initialized.load(Ordering::Relaxed),
            "Undefined behavior when calling IndexPool::{source} and the object is not initialized."
        );
    }

    /// The compile time version of [`RelocatableContainer::memory_size()`].
    pub const fn const_memory_size(capacity: usize) -> usize {
        unaligned_mem_size::<UnsafeCell<u32>>(capacity + 1)
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Number of indices currently acquired.
    pub fn in_use(&self) -> usize {
        HeadState::unpack(self.head.load(Ordering::Relaxed)).in_use as usize
    }

    /// Acquires an index from the pool. Returns [`None`] when the pool is
    /// empty. The index **must** be returned with [`IndexPool::release()`],
    /// otherwise it is leaked.
    pub fn acquire(&self) -> Option<u32> {
        self.verify_init("acquire");

        let mut old_value = self.head.load(Ordering::Acquire);
        let mut old = HeadState::unpack(old_value);

        loop {
            if old.top >= self.capacity {
                return None;
            }

            let new_value = HeadState {
                top: *self.next_free_index(old.top),
                aba: old.aba.wrapping_add(1),
                in_use: old.in_use + 1,
            }
            .pack();

            match self.head.compare_exchange(
                old_value,
                new_value,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(v) => {
                    old_value = v;
                    old = HeadState::unpack(v);
                }
            }
        }

        let index = old.top;
        *self.next_free_index(index) = self.capacity + 1;

        fence(Ordering::Acquire);
        Some(index)
    }

    /// Returns an index to the pool.
    ///
    /// The index must have been acquired from this pool before and must not
    /// be released twice.
    pub fn release(&self, index: u32) {
        self.verify_init("release");
        fence(Ordering::Release);

        let mut old_value = self.head.load(Ordering::Acquire);
        let mut old = HeadState::unpack(old_value);

        loop {
            *self.next_free_index(index) = old.top;

            let new_value = HeadState {
                top: index,
                aba: old.aba.wrapping_add(1),
                in_use: old.in_use - 1,
            }
            .pack();

            match self.head.compare_exchange(
                old_value,
                new_value,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(v) => {
                    old_value = v;
                    old = HeadState::unpack(v);
                }
            }
        }
    }

    #[allow(clippy::mut_from_ref)]
    // convenience function to access the internally mutable free-list slots
    fn next_free_index(&self, index: u32) -> &mut u32 {
        unsafe { &mut *(*self.next_free_index.as_ptr().add(index as usize)).get() }
    }
}

/// The compile time fixed size version of the [`IndexPool`].
///
/// # Example
///
/// ```
/// use membrane_bb_lock_free::mpmc::index_pool::FixedSizeIndexPool;
///
/// let pool = FixedSizeIndexPool::<128>::new();
/// let index = pool.acquire().unwrap();
/// pool.release(index);
/// ```
#[repr(C)]
#[derive(Debug)]
pub struct FixedSizeIndexPool<const CAPACITY: usize> {
    state: IndexPool,
    next_free_index: [UnsafeCell<u32>; CAPACITY],
    next_free_index_plus_one: UnsafeCell<u32>,
}

unsafe impl<const CAPACITY: usize> Send for FixedSizeIndexPool<CAPACITY> {}
unsafe impl<const CAPACITY: usize> Sync for FixedSizeIndexPool<CAPACITY> {}

impl<const CAPACITY: usize> Default for FixedSizeIndexPool<CAPACITY> {
    fn default() -> Self {
        Self {
            state: unsafe {
                IndexPool::new(
                    CAPACITY,
                    align_to::<UnsafeCell<u32>>(core::mem::size_of::<IndexPool>()) as isize,
                )
            },
            next_free_index: core::array::from_fn(|i| UnsafeCell::new(i as u32 + 1)),
            next_free_index_plus_one: UnsafeCell::new(CAPACITY as u32 + 1),
        }
    }
}

impl<const CAPACITY: usize> FixedSizeIndexPool<CAPACITY> {
    pub fn new() -> Self {
        Self::default()
    }

    /// See [`IndexPool::acquire()`]
    pub fn acquire(&self) -> Option<u32> {
        self.state.acquire()
    }

    /// See [`IndexPool::release()`]
    pub fn release(&self, index: u32) {
        self.state.release(index)
    }

    /// See [`IndexPool::capacity()`]
    pub fn capacity(&self) -> u32 {
        self.state.capacity()
    }

    /// See [`IndexPool::in_use()`]
    pub fn in_use(&self) -> usize {
        self.state.in_use()
    }
}
