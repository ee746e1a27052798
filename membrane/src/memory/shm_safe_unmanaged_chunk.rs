// Copyright (c) 2024 Contributors to the membrane project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use core::ptr::NonNull;
use core::sync::atomic::Ordering;

use membrane_bb_elementary::relative_pointer::{RelativePointer, RelativePointerData};
use membrane_log::fatal_panic;

use crate::memory::chunk_header::ChunkHeader;
use crate::memory::chunk_management::ChunkManagement;
use crate::memory::shared_chunk::SharedChunk;

/// The non-owning, shared-memory-safe form of a chunk reference: a 64 bit
/// `(segment id, offset)` encoding of an optional
/// [`ChunkManagement`] pointer. Every chunk reference that is stored in
/// shared memory (queue slots, used-chunk lists, history rings) uses this
/// form, never a [`SharedChunk`].
///
/// It must not be larger than 64 bits and must be trivially copyable: when
/// an application dies while writing one, the daemon still reads a whole,
/// never a torn, value during cleanup.
///
/// Storing takes the [`SharedChunk`]'s reference with it, the count is not
/// touched. [`ShmSafeUnmanagedChunk::release_to_shared_chunk()`] is the
/// inverse, [`ShmSafeUnmanagedChunk::clone_to_shared_chunk()`] creates an
/// additional owner.
#[derive(Debug, Clone, Copy)]
#[repr(transparent)]
pub struct ShmSafeUnmanagedChunk {
    management: RelativePointerData,
}

// anything larger could be observed half-written by the daemon
const _: () = assert!(core::mem::size_of::<ShmSafeUnmanagedChunk>() == 8);
const _: () = assert!(core::mem::align_of::<ShmSafeUnmanagedChunk>() == 8);

impl Default for ShmSafeUnmanagedChunk {
    fn default() -> Self {
        Self {
            management: RelativePointerData::LOGICAL_NULLPTR,
        }
    }
}

impl ShmSafeUnmanagedChunk {
    /// Takes over a [`SharedChunk`] without touching the chunk reference
    /// counter.
    pub fn new(chunk: SharedChunk) -> Self {
        let management = match chunk.release() {
            None => RelativePointerData::LOGICAL_NULLPTR,
            Some(ptr) => match RelativePointer::from_ptr(ptr) {
                Some(relative) => relative.data(),
                None => fatal_panic!(from "ShmSafeUnmanagedChunk::new",
                    "The chunk management record at {:#x} does not belong to any registered segment.",
                    ptr.as_ptr() as usize),
            },
        };

        Self { management }
    }

    fn management_ptr(&self) -> Option<NonNull<ChunkManagement>> {
        RelativePointer::<ChunkManagement>::from_data(self.management).as_ptr()
    }

    /// Rebuilds the [`SharedChunk`] without touching the reference counter
    /// and invalidates this slot.
    pub fn release_to_shared_chunk(&mut self) -> SharedChunk {
        if self.management.is_logical_nullptr() {
            return SharedChunk::null();
        }

        let chunk = match self.management_ptr() {
            Some(management) => SharedChunk::new(management),
            None => fatal_panic!(from self,
                "The segment holding the chunk management record is no longer attached."),
        };
        self.management.reset();
        chunk
    }

    /// Rebuilds a [`SharedChunk`] as an additional owner, incrementing the
    /// reference counter. The slot stays valid.
    pub fn clone_to_shared_chunk(&self) -> SharedChunk {
        if self.management.is_logical_nullptr() {
            return SharedChunk::null();
        }

        match self.management_ptr() {
            Some(management) => {
                unsafe { management.as_ref() }
                    .reference_counter()
                    .fetch_add(1, Ordering::Relaxed);
                SharedChunk::new(management)
            }
            None => fatal_panic!(from self,
                "The segment holding the chunk management record is no longer attached."),
        }
    }

    pub fn is_logical_nullptr(&self) -> bool {
        self.management.is_logical_nullptr()
    }

    /// The [`ChunkHeader`] of the stored chunk, [`None`] when the slot is
    /// logically null.
    pub fn chunk_header(&self) -> Option<NonNull<ChunkHeader>> {
        self.management_ptr()
            .and_then(|management| unsafe { management.as_ref() }.chunk_header().as_ptr())
    }

    /// True when a chunk is stored and this slot holds the only reference.
    /// The daemon uses this to decide whether a crashed endpoint's chunk
    /// can be reclaimed.
    pub fn is_not_logical_nullptr_and_has_no_other_owners(&self) -> bool {
        match self.management_ptr() {
            None => false,
            Some(management) => {
                unsafe { management.as_ref() }
                    .reference_counter()
                    .load(Ordering::Relaxed)
                    == 1
            }
        }
    }

    /// The raw 64 bit value, used to store the reference in a queue of
    /// plain integers. The queue slot takes over the stored reference.
    pub(crate) fn to_bits(self) -> u64 {
        self.management.to_bits()
    }

    pub(crate) fn from_bits(bits: u64) -> Self {
        Self {
            management: RelativePointerData::from_bits(bits),
        }
    }
}
