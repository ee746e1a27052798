// Copyright (c) 2024 Contributors to the membrane project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use membrane_bb_elementary::enum_gen;
use membrane_bb_elementary::math::align;
use membrane_log::fail;

use crate::constants::CHUNK_MEMORY_ALIGNMENT;
use crate::memory::chunk_header::ChunkHeader;

enum_gen! {
    ChunkSettingsError
  entry:
    UserPayloadAlignmentIsNotAPowerOfTwo,
    UserHeaderAlignmentIsNotAPowerOfTwo,
    UserHeaderAlignmentExceedsChunkAlignment
}

/// Validated layout request for one chunk: how many user payload bytes, at
/// which alignment, with an optional user header between the
/// [`ChunkHeader`] and the payload. The settings determine the smallest
/// chunk size able to carry the request via
/// [`ChunkSettings::required_chunk_size()`].
///
/// A payload size of zero is valid and yields a header-only chunk.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ChunkSettings {
    user_payload_size: u64,
    user_payload_alignment: u32,
    user_header_size: u32,
    user_header_alignment: u32,
}

impl ChunkSettings {
    pub fn new(
        user_payload_size: u64,
        user_payload_alignment: u32,
        user_header_size: u32,
        user_header_alignment: u32,
    ) -> Result<Self, ChunkSettingsError> {
        let origin = "ChunkSettings::new";
        if !user_payload_alignment.is_power_of_two() {
            fail!(from origin, with ChunkSettingsError::UserPayloadAlignmentIsNotAPowerOfTwo,
                "The user payload alignment {} is not a power of two.", user_payload_alignment);
        }

        if !user_header_alignment.is_power_of_two() {
            fail!(from origin, with ChunkSettingsError::UserHeaderAlignmentIsNotAPowerOfTwo,
                "The user header alignment {} is not a power of two.", user_header_alignment);
        }

        if user_header_alignment as usize > CHUNK_MEMORY_ALIGNMENT {
            fail!(from origin, with ChunkSettingsError::UserHeaderAlignmentExceedsChunkAlignment,
                "The user header alignment {} exceeds the chunk memory alignment {}, the user \
                 header directly follows the chunk header and cannot be aligned further.",
                user_header_alignment, CHUNK_MEMORY_ALIGNMENT);
        }

        Ok(Self {
            user_payload_size,
            user_payload_alignment,
            user_header_size,
            user_header_alignment,
        })
    }

    /// Settings for a chunk without a user header.
    pub fn new_payload_only(
        user_payload_size: u64,
        user_payload_alignment: u32,
    ) -> Result<Self, ChunkSettingsError> {
        Self::new(user_payload_size, user_payload_alignment, 0, 1)
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

    pub fn user_header_alignment(&self) -> u32 {
        self.user_header_alignment
    }

    /// The smallest chunk size able to carry these settings. Chunks are
    /// only guaranteed to be aligned to
    /// [`CHUNK_MEMORY_ALIGNMENT`], a payload alignment above that requires
    /// slack so that the payload start can be shifted to the next boundary
    /// wherever the chunk happens to start.
    pub fn required_chunk_size(&self) -> u64 {
        let unpadded =
            core::mem::size_of::<ChunkHeader>() as u64 + self.user_header_size as u64;
        let payload_alignment = self.user_payload_alignment as u64;

        if payload_alignment <= CHUNK_MEMORY_ALIGNMENT as u64 {
            align(unpadded as usize, payload_alignment as usize) as u64 + self.user_payload_size
        } else {
            align(unpadded as usize, CHUNK_MEMORY_ALIGNMENT) as u64
                + (payload_alignment - CHUNK_MEMORY_ALIGNMENT as u64)
                + self.user_payload_size
        }
    }
}
