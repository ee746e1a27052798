// Copyright (c) 2024 Contributors to the membrane project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::allocator::{AllocationError, BaseAllocator};

/// Containers which can be placed in shared memory implement this two-phase
/// construction scheme: [`RelocatableContainer::new_uninit()`] creates the
/// container head without any backing memory, and once the head has reached
/// its final memory location [`RelocatableContainer::init()`] acquires the
/// backing memory from an allocator over the same segment. The container
/// must not be moved after `init` was called.
pub trait RelocatableContainer {
    /// Creates the container head without backing memory.
    ///
    /// # Safety
    ///
    ///  * [`RelocatableContainer::init()`] must be called exactly once
    ///    before any other method
    ///
    unsafe fn new_uninit(capacity: usize) -> Self;

    /// Acquires the backing memory. Must be called when the container has
    /// reached its final memory location.
    ///
    /// # Safety
    ///
    ///  * must be called exactly once
    ///  * the allocator must hand out memory from the same shared memory
    ///    segment the container lives in
    ///
    unsafe fn init<T: BaseAllocator>(&mut self, allocator: &T) -> Result<(), AllocationError>;

    /// The number of bytes [`RelocatableContainer::init()`] will request for
    /// the provided capacity.
    fn memory_size(capacity: usize) -> usize;
}
