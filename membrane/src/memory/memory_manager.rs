// Copyright (c) 2024 Contributors to the membrane project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use core::ptr::NonNull;

use membrane_bb_container::fixed_vec::FixedVec;
use membrane_bb_elementary::allocator::BaseAllocator;
use membrane_bb_elementary::enum_gen;
use membrane_bb_elementary::math::align;
use membrane_bb_elementary::relative_pointer::RelativePointer;
use membrane_log::{debug, error, fail, fatal_panic};

use crate::config::DataSegmentConfig;
use crate::constants::{CHUNK_MEMORY_ALIGNMENT, MAX_NUMBER_OF_MEMPOOLS};
use crate::memory::chunk_header::ChunkHeader;
use crate::memory::chunk_management::ChunkManagement;
use crate::memory::chunk_settings::ChunkSettings;
use crate::memory::mem_pool::{MemPool, MemPoolInfo};
use crate::memory::shared_chunk::SharedChunk;

enum_gen! {
    /// Failures of [`MemoryManager::get_chunk()`], all of them normal
    /// runtime conditions for the caller to handle.
    ChunkAcquireError
  entry:
    /// The manager was never configured with a single mempool.
    NoMemPoolsAvailable,
    /// No configured size class is large enough for the request.
    NoMemPoolForRequestedChunkSize,
    /// The fitting size class is currently exhausted.
    MemPoolOutOfChunks
}

/// The ordered collection of size-class pools of one data segment plus the
/// dedicated pool for [`ChunkManagement`] records, sized to the sum of all
/// chunk counts so that it can never run dry before the payload pools do.
///
/// The manager is placed in shared memory by the daemon, configured once
/// and never moved afterwards.
#[derive(Debug)]
#[repr(C)]
pub struct MemoryManager {
    deny_add_mem_pool: bool,
    total_number_of_chunks: u32,
    mem_pools: FixedVec<MemPool, MAX_NUMBER_OF_MEMPOOLS>,
    chunk_management_pool: FixedVec<MemPool, 1>,
}

impl Default for MemoryManager {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryManager {
    pub fn new() -> Self {
        Self {
            deny_add_mem_pool: false,
            total_number_of_chunks: 0,
            mem_pools: FixedVec::new(),
            chunk_management_pool: FixedVec::new(),
        }
    }

    /// Chunk size able to carry `user_payload_size` bytes of default
    /// aligned payload behind the [`ChunkHeader`].
    pub fn size_with_chunk_header(user_payload_size: u64) -> u64 {
        align(
            core::mem::size_of::<ChunkHeader>() + user_payload_size as usize,
            CHUNK_MEMORY_ALIGNMENT,
        ) as u64
    }

    /// Appends the pools of `config` in order and generates the management
    /// pool. Every configuration violation is fatal: unordered size
    /// classes, a chunk count of zero, a second `configure` call, or
    /// allocators too small for the configured classes.
    pub fn configure<Management: BaseAllocator, ChunkMemory: BaseAllocator>(
        &mut self,
        config: &DataSegmentConfig,
        management_allocator: &Management,
        chunk_memory_allocator: &ChunkMemory,
    ) {
        if self.deny_add_mem_pool {
            fatal_panic!(from self,
                "After the generation of the chunk management pool no further mempool may be added.");
        }

        for entry in &config.mempool {
            self.add_mem_pool(
                management_allocator,
                chunk_memory_allocator,
                entry.size,
                entry.chunk_count,
            );
        }

        self.generate_chunk_management_pool(management_allocator);
    }

    fn print_mem_pools(&self) {
        for pool in self.mem_pools.iter() {
            debug!(from self,
                "  MemPool [ chunk_size = {}, payload_size = {}, chunk_count = {}, used = {} ]",
                pool.chunk_size(),
                pool.chunk_size() - core::mem::size_of::<ChunkHeader>() as u64,
                pool.number_of_chunks(),
                pool.used_chunks());
        }
    }

    fn add_mem_pool<Management: BaseAllocator, ChunkMemory: BaseAllocator>(
        &mut self,
        management_allocator: &Management,
        chunk_memory_allocator: &ChunkMemory,
        user_payload_size: u64,
        chunk_count: u32,
    ) {
        let adjusted_chunk_size = Self::size_with_chunk_header(user_payload_size);

        if let Some(last) = self.mem_pools.last() {
            if adjusted_chunk_size <= last.chunk_size() {
                fatal_panic!(from self,
                    "The mempools must be added in increasing chunk size order, the new chunk \
                     size {} does not exceed the previous chunk size {}.",
                    adjusted_chunk_size, last.chunk_size());
            }
        }

        if !self
            .mem_pools
            .push(MemPool::new_uninit(adjusted_chunk_size, chunk_count))
        {
            fatal_panic!(from self,
                "The config contains more than the maximum supported number of {} mempools.",
                MAX_NUMBER_OF_MEMPOOLS);
        }

        let pool = self.mem_pools.last_mut().expect("the pool was just added");
        fatal_panic!(from "MemoryManager::add_mem_pool",
            when unsafe { pool.init(management_allocator, chunk_memory_allocator) },
            "The donated memory does not suffice for the configured mempools.");

        self.total_number_of_chunks += chunk_count;
    }

    fn generate_chunk_management_pool<Management: BaseAllocator>(
        &mut self,
        management_allocator: &Management,
    ) {
        self.deny_add_mem_pool = true;

        let chunk_size = align(
            core::mem::size_of::<ChunkManagement>(),
            CHUNK_MEMORY_ALIGNMENT,
        ) as u64;
        self.chunk_management_pool
            .push(MemPool::new_uninit(chunk_size, self.total_number_of_chunks));

        let pool = self
            .chunk_management_pool
            .last_mut()
            .expect("the pool was just added");
        fatal_panic!(from "MemoryManager::generate_chunk_management_pool",
            when unsafe { pool.init(management_allocator, management_allocator) },
            "The donated memory does not suffice for the chunk management pool.");
    }

    /// Acquires a chunk able to carry `settings`, lays out the
    /// [`ChunkHeader`] and wires up the [`ChunkManagement`] record. The
    /// returned [`SharedChunk`] is the single owner.
    pub fn get_chunk(&self, settings: ChunkSettings) -> Result<SharedChunk, ChunkAcquireError> {
        let msg = "Unable to acquire a chunk";
        let required_chunk_size = settings.required_chunk_size();

        if self.mem_pools.is_empty() {
            error!(from self, "{} since no mempools are available.", msg);
            fail!(from self, with ChunkAcquireError::NoMemPoolsAvailable,
                "{} since no mempools are available.", msg);
        }

        let pool = match self
            .mem_pools
            .iter()
            .find(|pool| pool.chunk_size() >= required_chunk_size)
        {
            Some(pool) => pool,
            None => {
                error!(from self, "{} since no mempool supports a chunk size of {}.",
                    msg, required_chunk_size);
                self.print_mem_pools();
                fail!(from self, with ChunkAcquireError::NoMemPoolForRequestedChunkSize,
                    "{} since no mempool supports a chunk size of {}.", msg, required_chunk_size);
            }
        };

        let chunk = match pool.get_chunk() {
            Some(chunk) => chunk,
            None => {
                self.print_mem_pools();
                fail!(from self, with ChunkAcquireError::MemPoolOutOfChunks,
                    "{} since the mempool with chunk size {} is out of chunks.",
                    msg, pool.chunk_size());
            }
        };

        let header = unsafe { ChunkHeader::construct_in_place(chunk, pool.chunk_size(), &settings) };

        let management_chunk = match self.chunk_management_pool[0].get_chunk() {
            Some(chunk) => chunk.cast::<ChunkManagement>(),
            // sized to the sum of all payload chunks, running dry here
            // means the refcounting is corrupted
            None => fatal_panic!(from self,
                "The chunk management pool is exhausted although it is sized for every chunk."),
        };

        unsafe {
            management_chunk.as_ptr().write(ChunkManagement::new(
                self.relative_to(header),
                self.relative_to(NonNull::from(pool)),
                self.relative_to(NonNull::from(&self.chunk_management_pool[0])),
            ))
        };

        Ok(SharedChunk::new(management_chunk))
    }

    fn relative_to<T>(&self, ptr: NonNull<T>) -> RelativePointer<T> {
        match RelativePointer::from_ptr(ptr) {
            Some(pointer) => pointer,
            None => fatal_panic!(from self,
                "The address {:#x} does not belong to any registered segment, the memory manager \
                 must be placed in registered segment memory.",
                ptr.as_ptr() as usize),
        }
    }

    pub fn number_of_mem_pools(&self) -> u32 {
        self.mem_pools.len() as u32
    }

    pub fn pool_info(&self, index: u32) -> Option<MemPoolInfo> {
        self.mem_pools.get(index as usize).map(|pool| pool.info())
    }

    /// The chunk size of the pool that would serve `settings`, [`None`]
    /// when no pool is large enough.
    pub fn pool_chunk_size_for(&self, settings: ChunkSettings) -> Option<u64> {
        let required_chunk_size = settings.required_chunk_size();
        self.mem_pools
            .iter()
            .find(|pool| pool.chunk_size() >= required_chunk_size)
            .map(|pool| pool.chunk_size())
    }

    /// Bytes of chunk memory [`MemoryManager::configure()`] will request
    /// for `config`.
    pub fn required_chunk_memory_size(config: &DataSegmentConfig) -> u64 {
        config
            .mempool
            .iter()
            .map(|entry| {
                MemPool::chunk_memory_size(
                    Self::size_with_chunk_header(entry.size),
                    entry.chunk_count,
                ) + CHUNK_MEMORY_ALIGNMENT as u64
            })
            .sum()
    }

    /// Bytes of management memory [`MemoryManager::configure()`] will
    /// request for `config`: the free-lists of all pools, the management
    /// records and the management pool's own free-list.
    pub fn required_management_memory_size(config: &DataSegmentConfig) -> u64 {
        let mut memory_size = 0u64;
        let mut total_number_of_chunks = 0u32;
        for entry in &config.mempool {
            total_number_of_chunks += entry.chunk_count;
            memory_size += align(
                MemPool::management_memory_size(entry.chunk_count),
                CHUNK_MEMORY_ALIGNMENT,
            ) as u64;
        }

        memory_size += align(
            MemPool::management_memory_size(total_number_of_chunks),
            CHUNK_MEMORY_ALIGNMENT,
        ) as u64;
        memory_size += align(
            core::mem::size_of::<ChunkManagement>(),
            CHUNK_MEMORY_ALIGNMENT,
        ) as u64
            * total_number_of_chunks as u64
            + CHUNK_MEMORY_ALIGNMENT as u64;

        memory_size
    }

    /// Management plus chunk memory for `config`.
    pub fn required_full_memory_size(config: &DataSegmentConfig) -> u64 {
        Self::required_management_memory_size(config) + Self::required_chunk_memory_size(config)
    }
}
