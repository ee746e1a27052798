// Copyright (c) 2024 Contributors to the membrane project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The process-wide segment registry. Shared memory segments are donated by
//! the daemon and mapped at a different virtual address in every process.
//! Whoever attaches a segment registers its local base address here under
//! the daemon-assigned [`SegmentId`];
//! [`crate::relative_pointer::RelativePointer`] resolves `(segment id,
//! offset)` pairs through this registry.
//!
//! Registration and teardown are owned by the runtime facade of the process,
//! the data plane only performs lookups.

use core::ptr::NonNull;
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::enum_gen;
use membrane_log::fail;

/// Maximum number of segments a process can have attached at the same time.
pub const MAX_SEGMENTS: usize = 64;

const VACANT: usize = 0;
const RESERVED: usize = usize::MAX;

/// Identifies one attached shared memory segment, assigned by the daemon.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct SegmentId(u16);

impl SegmentId {
    pub fn new(value: u16) -> Self {
        debug_assert!(
            (value as usize) < MAX_SEGMENTS,
            "the segment id {value} exceeds the maximum supported segment id {}",
            MAX_SEGMENTS - 1
        );
        Self(value)
    }

    pub fn value(&self) -> u16 {
        self.0
    }
}

struct SegmentSlot {
    base: AtomicUsize,
    size: AtomicUsize,
}

#[allow(clippy::declare_interior_mutable_const)]
const UNATTACHED: SegmentSlot = SegmentSlot {
    base: AtomicUsize::new(VACANT),
    size: AtomicUsize::new(0),
};

static REGISTRY: [SegmentSlot; MAX_SEGMENTS] = [UNATTACHED; MAX_SEGMENTS];

enum_gen! {
    SegmentRegistrationError
  entry:
    SegmentIdAlreadyInUse,
    SegmentIdExceedsMaximum
}

/// Registers the local mapping of a segment. Fails when the id is already
/// registered or out of bounds.
pub fn register_segment(
    id: SegmentId,
    base: NonNull<u8>,
    size: usize,
) -> Result<(), SegmentRegistrationError> {
    let origin = "register_segment";
    let index = id.value() as usize;
    if index >= MAX_SEGMENTS {
        fail!(from origin, with SegmentRegistrationError::SegmentIdExceedsMaximum,
            "Unable to register segment since the id {} exceeds the maximum supported id {}.",
            index, MAX_SEGMENTS - 1);
    }

    let slot = &REGISTRY[index];
    if slot
        .base
        .compare_exchange(VACANT, RESERVED, Ordering::Acquire, Ordering::Relaxed)
        .is_err()
    {
        fail!(from origin, with SegmentRegistrationError::SegmentIdAlreadyInUse,
            "Unable to register segment since the id {} is already in use.", index);
    }

    slot.size.store(size, Ordering::Relaxed);
    slot.base.store(base.as_ptr() as usize, Ordering::Release);
    Ok(())
}

/// Removes a segment from the registry. Returns false when the id was not
/// registered. The caller must guarantee that no
/// [`crate::relative_pointer::RelativePointer`] into the segment is resolved
/// afterwards.
pub fn unregister_segment(id: SegmentId) -> bool {
    let slot = &REGISTRY[id.value() as usize];
    slot.size.store(0, Ordering::Relaxed);
    slot.base.swap(VACANT, Ordering::Release) != VACANT
}

/// Returns the local base address of a registered segment.
pub fn segment_base(id: SegmentId) -> Option<NonNull<u8>> {
    let base = REGISTRY[id.value() as usize].base.load(Ordering::Acquire);
    match base {
        VACANT | RESERVED => None,
        base => Some(unsafe { NonNull::new_unchecked(base as *mut u8) }),
    }
}

/// Reverse lookup: the segment an address belongs to, together with the
/// offset of the address inside that segment.
pub fn segment_containing(ptr: NonNull<u8>) -> Option<(SegmentId, u64)> {
    let address = ptr.as_ptr() as usize;
    for (index, slot) in REGISTRY.iter().enumerate() {
        let base = slot.base.load(Ordering::Acquire);
        if base == VACANT || base == RESERVED {
            continue;
        }

        let size = slot.size.load(Ordering::Relaxed);
        if base <= address && address < base + size {
            return Some((SegmentId::new(index as u16), (address - base) as u64));
        }
    }

    None
}
