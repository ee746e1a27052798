// Copyright (c) 2024 Contributors to the membrane project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use core::ptr::NonNull;

use membrane_bb_elementary::math::align;

use crate::memory::chunk_settings::ChunkSettings;

/// Identifies the binary layout family of a [`ChunkHeader`]. A subscriber
/// that pops a chunk with a foreign identifier or version must not touch
/// its contents, the builds are incompatible.
pub const CHUNK_FORMAT_IDENTIFIER: u16 = 0x6D62;

/// Bumped whenever the [`ChunkHeader`] layout changes.
pub const CHUNK_HEADER_VERSION: u8 = 1;

/// Marks a chunk that carries no user header.
pub const NO_USER_HEADER_ID: u16 = 0;

/// The fixed, versioned prefix of every chunk. It is laid out once when the
/// chunk leaves the memory manager and never modified after the chunk was
/// handed out of the sender. The user payload position is stored as a
/// signed offset from the header start so that the header is the only
/// thing a receiver needs.
#[derive(Debug)]
#[repr(C)]
pub struct ChunkHeader {
    format: u16,
    version: u8,
    _reserved: u8,
    user_header_id: u16,
    _padding: u16,
    chunk_size: u64,
    user_payload_size: u64,
    user_payload_alignment: u32,
    user_header_size: u32,
    origin_id: u64,
    sequence_number: u64,
    user_payload_offset: i64,
}

// the header layout is cross-process ABI
const _: () = assert!(core::mem::size_of::<ChunkHeader>() == 56);
const _: () = assert!(core::mem::align_of::<ChunkHeader>() == 8);

impl ChunkHeader {
    /// Lays the header out at the start of a raw chunk and computes the
    /// user payload position from the actual chunk base.
    ///
    /// # Safety
    ///
    ///  * `chunk` must point to at least `chunk_size` bytes aligned to
    ///    [`crate::constants::CHUNK_MEMORY_ALIGNMENT`]
    ///  * `chunk_size` must be at least
    ///    [`ChunkSettings::required_chunk_size()`] of the settings
    ///
    pub(crate) unsafe fn construct_in_place(
        chunk: NonNull<u8>,
        chunk_size: u64,
        settings: &ChunkSettings,
    ) -> NonNull<ChunkHeader> {
        let base = chunk.as_ptr() as usize;
        let header_end =
            base + core::mem::size_of::<ChunkHeader>() + settings.user_header_size() as usize;
        let payload_start = align(header_end, settings.user_payload_alignment().max(1) as usize);

        debug_assert!(
            payload_start + settings.user_payload_size() as usize <= base + chunk_size as usize,
            "the chunk is too small for the requested layout"
        );

        let header = chunk.cast::<ChunkHeader>();
        header.as_ptr().write(ChunkHeader {
            format: CHUNK_FORMAT_IDENTIFIER,
            version: CHUNK_HEADER_VERSION,
            _reserved: 0,
            user_header_id: match settings.user_header_size() {
                0 => NO_USER_HEADER_ID,
                _ => 1,
            },
            _padding: 0,
            chunk_size,
            user_payload_size: settings.user_payload_size(),
            user_payload_alignment: settings.user_payload_alignment(),
            user_header_size: settings.user_header_size(),
            origin_id: 0,
            sequence_number: 0,
            user_payload_offset: (payload_start - base) as i64,
        });

        header
    }

    /// True when format identifier and version match this build.
    pub fn has_compatible_format(&self) -> bool {
        self.format == CHUNK_FORMAT_IDENTIFIER && self.version == CHUNK_HEADER_VERSION
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn user_payload_size(&self) -> u64 {
        self.user_payload_size
    }

    pub fn user_payload_alignment(&self) -> u32 {
        self.user_payload_alignment
    }

    pub fn user_header_size(&self) -> u32 {
        self.user_header_size
    }

    pub fn user_header_id(&self) -> u16 {
        self.user_header_id
    }

    /// Unique id of the publisher port the chunk was sent from.
    pub fn origin_id(&self) -> u64 {
        self.origin_id
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn user_payload_offset(&self) -> i64 {
        self.user_payload_offset
    }

    /// Start of the user payload.
    pub fn user_payload(&self) -> NonNull<u8> {
        unsafe {
            NonNull::new_unchecked(
                (self as *const Self as *const u8).offset(self.user_payload_offset as isize)
                    as *mut u8,
            )
        }
    }

    /// Start of the user header, [`None`] when the chunk carries none.
    pub fn user_header(&self) -> Option<NonNull<u8>> {
        if self.user_header_size == 0 {
            return None;
        }

        Some(unsafe {
            NonNull::new_unchecked(
                (self as *const Self as *const u8).add(core::mem::size_of::<ChunkHeader>())
                    as *mut u8,
            )
        })
    }

    pub(crate) fn set_origin_id(&mut self, origin_id: u64) {
        self.origin_id = origin_id;
    }

    pub(crate) fn set_sequence_number(&mut self, sequence_number: u64) {
        self.sequence_number = sequence_number;
    }
}
