// Copyright (c) 2024 Contributors to the membrane project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Test support. In production the daemon creates shared memory segments
//! and places the managers and ports inside them, the helpers here do the
//! same with plain heap memory registered as a segment so that every test
//! and example can run without a daemon.

use core::alloc::Layout;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicU16, Ordering};

use membrane_bb_elementary::allocator::BaseAllocator;
use membrane_bb_elementary::bump_allocator::BumpAllocator;
use membrane_bb_elementary::segment::{
    register_segment, unregister_segment, SegmentId, MAX_SEGMENTS,
};
use membrane_log::fatal_panic;

use crate::config::{DataSegmentConfig, PublisherOptions, SubscriberOptions};
use crate::memory::memory_manager::MemoryManager;
use crate::port::condition_variable::ConditionVariableData;
use crate::port::publisher_port::PublisherPortData;
use crate::port::subscriber_port::SubscriberPortData;
use crate::service::ServiceDescription;

const SEGMENT_ALIGNMENT: usize = 64;

/// A heap region registered as a shared memory segment for the lifetime of
/// this object.
#[derive(Debug)]
pub struct TestSegment {
    base: NonNull<u8>,
    layout: Layout,
    id: SegmentId,
}

impl TestSegment {
    pub fn create(size: usize) -> Self {
        let layout = Layout::from_size_align(size, SEGMENT_ALIGNMENT)
            .expect("a valid segment layout");
        let base = NonNull::new(unsafe { std::alloc::alloc_zeroed(layout) })
            .expect("out of heap memory");

        static NEXT_ID: AtomicU16 = AtomicU16::new(0);
        for _ in 0..MAX_SEGMENTS {
            let id = SegmentId::new(NEXT_ID.fetch_add(1, Ordering::Relaxed) % MAX_SEGMENTS as u16);
            if register_segment(id, base, size).is_ok() {
                return Self { base, layout, id };
            }
        }

        fatal_panic!(from "TestSegment::create",
            "Unable to find a free segment id, too many test segments are alive at the same time.");
    }

    pub fn id(&self) -> SegmentId {
        self.id
    }

    pub fn base(&self) -> NonNull<u8> {
        self.base
    }

    pub fn size(&self) -> usize {
        self.layout.size()
    }

    /// A bump allocator over the whole segment.
    pub fn allocator(&self) -> BumpAllocator {
        BumpAllocator::new(self.base, self.layout.size())
    }
}

impl Drop for TestSegment {
    fn drop(&mut self) {
        unregister_segment(self.id);
        unsafe { std::alloc::dealloc(self.base.as_ptr(), self.layout) };
    }
}

/// Moves a value into segment memory handed out by `allocator`. The value
/// is never dropped, the test segment reclaims the bytes wholesale.
pub fn emplace<T>(allocator: &BumpAllocator, value: T) -> NonNull<T> {
    let memory = allocator
        .allocate(Layout::new::<T>())
        .expect("the test segment is large enough");

    let ptr = memory.cast::<T>();
    unsafe { ptr.as_ptr().write(value) };
    ptr
}

/// A fully configured [`MemoryManager`] placed inside a [`TestSegment`],
/// the way the daemon places one inside a real segment.
#[derive(Debug)]
pub struct ManagedMemory {
    segment: TestSegment,
    manager: NonNull<MemoryManager>,
}

impl ManagedMemory {
    pub fn new(config: &DataSegmentConfig) -> Self {
        let size = core::mem::size_of::<MemoryManager>()
            + MemoryManager::required_full_memory_size(config) as usize
            + 4096;

        let segment = TestSegment::create(size);
        let allocator = segment.allocator();

        let manager = emplace(&allocator, MemoryManager::new());
        unsafe { &mut *manager.as_ptr() }.configure(config, &allocator, &allocator);

        Self { segment, manager }
    }

    pub fn manager(&self) -> &MemoryManager {
        unsafe { self.manager.as_ref() }
    }

    pub fn segment(&self) -> &TestSegment {
        &self.segment
    }
}

/// Creates publisher and subscriber ports in segment memory, the role the
/// daemon plays in a deployment. All chunks must be released before the
/// factory is dropped.
#[derive(Debug)]
pub struct PortFactory {
    memory: ManagedMemory,
    port_allocator: BumpAllocator,
    // keeps the port memory alive, dropped last
    port_segment: TestSegment,
}

impl PortFactory {
    pub fn new(config: &DataSegmentConfig) -> Self {
        let port_segment = TestSegment::create(1024 * 1024);
        let port_allocator = port_segment.allocator();

        Self {
            memory: ManagedMemory::new(config),
            port_allocator,
            port_segment,
        }
    }

    pub fn memory_manager(&self) -> &MemoryManager {
        self.memory.manager()
    }

    pub fn publisher(
        &self,
        service: ServiceDescription,
        options: &PublisherOptions,
    ) -> &PublisherPortData {
        let port = emplace(
            &self.port_allocator,
            PublisherPortData::new(service, self.memory.manager(), options),
        );
        unsafe { port.as_ref() }
    }

    pub fn subscriber(
        &self,
        service: ServiceDescription,
        options: &SubscriberOptions,
    ) -> &SubscriberPortData {
        let port = emplace(
            &self.port_allocator,
            SubscriberPortData::new(service, options),
        );
        unsafe { port.as_ref() }
    }

    pub fn condition_variable(&self) -> &ConditionVariableData {
        let condition_variable = emplace(&self.port_allocator, ConditionVariableData::new());
        unsafe { condition_variable.as_ref() }
    }
}
