// Copyright (c) 2024 Contributors to the membrane project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Every bound of the data plane is fixed at compile time so that no path
//! ever allocates at runtime. Changing a constant changes the shared memory
//! layout, processes of different builds must not be mixed.

/// Alignment of every chunk and every chunk size, in bytes.
pub const CHUNK_MEMORY_ALIGNMENT: usize = 8;

/// Maximum number of size-class pools a memory manager can carry.
pub const MAX_NUMBER_OF_MEMPOOLS: usize = 32;

/// Maximum number of shared memory segments a process can have attached.
pub const MAX_SHM_SEGMENTS: usize = membrane_bb_elementary::segment::MAX_SEGMENTS;

/// Maximum number of subscriber queues a publisher can deliver to.
pub const MAX_SUBSCRIBERS_PER_PUBLISHER: usize = 256;

/// Maximum number of chunks a publisher keeps for late joining subscribers.
pub const MAX_PUBLISHER_HISTORY: usize = 16;

/// Maximum capacity of a subscriber queue.
pub const MAX_SUBSCRIBER_QUEUE_CAPACITY: usize = 256;

/// Maximum number of chunks a publisher can have loaned at the same time.
pub const MAX_CHUNKS_ALLOCATED_PER_PUBLISHER_SIMULTANEOUSLY: usize = 8;

/// Maximum number of chunks a subscriber can hold at the same time.
pub const MAX_CHUNKS_HELD_PER_SUBSCRIBER_SIMULTANEOUSLY: usize = 256;

/// Capacity of the subscriber side used-chunk list. One slot more than the
/// held-chunks maximum so that the single overshooting `try_get` is
/// recoverable with one release call.
pub const MAX_CHUNKS_IN_USE_PER_SUBSCRIBER: usize =
    MAX_CHUNKS_HELD_PER_SUBSCRIBER_SIMULTANEOUSLY + 1;

/// Highest notification index that can be attached to a queue, the
/// condition variable record tracks its notifications in one 64 bit mask.
pub const MAX_NOTIFICATION_INDEX: u64 = 63;

/// Capacity of each identifier of a service description.
pub const SERVICE_IDENTIFIER_CAPACITY: usize = 64;

/// Capacity of a node name.
pub const NODE_NAME_CAPACITY: usize = 64;
