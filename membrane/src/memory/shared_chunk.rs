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
use core::sync::atomic::Ordering;

use membrane_log::fatal_panic;

use crate::memory::chunk_header::ChunkHeader;
use crate::memory::chunk_management::ChunkManagement;

/// The process-local owning handle to a chunk. Cloning increments the
/// shared reference count, dropping decrements it, and the final drop
/// returns chunk and management record to their pools.
///
/// A [`SharedChunk`] may be empty. Two handles are equal when they refer to
/// the same management record.
///
/// The handle itself is not threadsafe, do not share one instance between
/// threads, hand every thread its own clone.
pub struct SharedChunk {
    management: Option<NonNull<ChunkManagement>>,
}

unsafe impl Send for SharedChunk {}

impl Debug for SharedChunk {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "SharedChunk {{ management: {:?} }}",
            self.management.map(|p| p.as_ptr() as usize)
        )
    }
}

impl Default for SharedChunk {
    fn default() -> Self {
        Self::null()
    }
}

impl PartialEq for SharedChunk {
    fn eq(&self, other: &Self) -> bool {
        self.management == other.management
    }
}

impl Eq for SharedChunk {}

impl Clone for SharedChunk {
    fn clone(&self) -> Self {
        if let Some(management) = self.management {
            unsafe { management.as_ref() }
                .reference_counter()
                .fetch_add(1, Ordering::Relaxed);
        }

        Self {
            management: self.management,
        }
    }
}

impl Drop for SharedChunk {
    fn drop(&mut self) {
        if let Some(management) = self.management {
            // pairs with the release below, any read of the chunk contents
            // is ordered before the final decrement frees the memory
            if unsafe { management.as_ref() }
                .reference_counter()
                .fetch_sub(1, Ordering::AcqRel)
                == 1
            {
                Self::free_chunk(management);
            }
        }
    }
}

impl SharedChunk {
    pub(crate) fn new(management: NonNull<ChunkManagement>) -> Self {
        Self {
            management: Some(management),
        }
    }

    /// An empty handle.
    pub fn null() -> Self {
        Self { management: None }
    }

    pub fn is_null(&self) -> bool {
        self.management.is_none()
    }

    pub(crate) fn management(&self) -> Option<NonNull<ChunkManagement>> {
        self.management
    }

    pub fn chunk_header(&self) -> Option<NonNull<ChunkHeader>> {
        self.management.map(|management| {
            match unsafe { management.as_ref() }.chunk_header().as_ptr() {
                Some(header) => header,
                None => fatal_panic!(from self,
                    "The segment holding the chunk header is no longer attached."),
            }
        })
    }

    pub fn user_payload(&self) -> Option<NonNull<u8>> {
        self.chunk_header()
            .map(|header| unsafe { header.as_ref() }.user_payload())
    }

    /// Detaches the management record without touching the reference count.
    /// Ownership of the count moves to the caller, used when a chunk is
    /// stored inside a shared memory slot.
    pub(crate) fn release(mut self) -> Option<NonNull<ChunkManagement>> {
        self.management.take()
    }

    fn free_chunk(management: NonNull<ChunkManagement>) {
        let origin = "SharedChunk::free_chunk";
        let record = unsafe { management.as_ref() };

        let header = match record.chunk_header().as_ptr() {
            Some(header) => header,
            None => fatal_panic!(from origin,
                "The segment holding the chunk header is no longer attached."),
        };
        let mem_pool = match record.mem_pool().as_ptr() {
            Some(pool) => pool,
            None => fatal_panic!(from origin,
                "The segment holding the chunk's mempool is no longer attached."),
        };
        let chunk_management_pool = match record.chunk_management_pool().as_ptr() {
            Some(pool) => pool,
            None => fatal_panic!(from origin,
                "The segment holding the chunk management pool is no longer attached."),
        };

        unsafe { mem_pool.as_ref() }.free_chunk(header.cast());
        unsafe { chunk_management_pool.as_ref() }.free_chunk(management.cast());
    }
}
