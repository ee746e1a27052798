// Copyright (c) 2024 Contributors to the membrane project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use core::sync::atomic::AtomicU64;

use membrane_bb_elementary::relative_pointer::RelativePointer;

use crate::memory::chunk_header::ChunkHeader;
use crate::memory::mem_pool::MemPool;

/// The shared-memory ownership record of one chunk: the atomic reference
/// count plus segment-relative pointers to the chunk and the two pools
/// everything must be returned to. Allocated from the memory manager's
/// dedicated management pool.
///
/// When the reference count makes its 1 to 0 transition the chunk and this
/// record are returned to their pools, no other transition frees memory.
#[derive(Debug)]
#[repr(C)]
pub struct ChunkManagement {
    chunk_header: RelativePointer<ChunkHeader>,
    reference_counter: AtomicU64,
    mem_pool: RelativePointer<MemPool>,
    chunk_management_pool: RelativePointer<MemPool>,
}

impl ChunkManagement {
    /// Creates a record with a reference count of one, the reference held
    /// by whoever receives the record.
    pub(crate) fn new(
        chunk_header: RelativePointer<ChunkHeader>,
        mem_pool: RelativePointer<MemPool>,
        chunk_management_pool: RelativePointer<MemPool>,
    ) -> Self {
        Self {
            chunk_header,
            reference_counter: AtomicU64::new(1),
            mem_pool,
            chunk_management_pool,
        }
    }

    pub fn chunk_header(&self) -> RelativePointer<ChunkHeader> {
        self.chunk_header
    }

    pub fn mem_pool(&self) -> RelativePointer<MemPool> {
        self.mem_pool
    }

    pub fn chunk_management_pool(&self) -> RelativePointer<MemPool> {
        self.chunk_management_pool
    }

    pub fn reference_counter(&self) -> &AtomicU64 {
        &self.reference_counter
    }
}
