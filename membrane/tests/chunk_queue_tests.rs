// Copyright (c) 2024 Contributors to the membrane project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use membrane::config::{DataSegmentConfig, MemPoolConfig};
use membrane::memory::chunk_settings::ChunkSettings;
use membrane::memory::shared_chunk::SharedChunk;
use membrane::port::chunk_queue_data::ChunkQueueData;
use membrane::port::chunk_queue_popper::ChunkQueuePopper;
use membrane::port::chunk_queue_pusher::ChunkQueuePusher;
use membrane::port::condition_variable::ConditionVariableData;
use membrane::port::locking_policy::SingleThreadedPolicy;
use membrane::port::policy::QueueFullPolicy;
use membrane::testing::{emplace, ManagedMemory, TestSegment};
use membrane_bb_container::variant_queue::VariantQueueKind;
use membrane_testing::assert_that;

const MAX_CAPACITY: usize = 8;

type Queue = ChunkQueueData<SingleThreadedPolicy, MAX_CAPACITY>;

fn memory() -> ManagedMemory {
    ManagedMemory::new(&DataSegmentConfig {
        mempool: vec![MemPoolConfig {
            size: 128,
            chunk_count: 32,
        }],
    })
}

fn acquire_with_payload(memory: &ManagedMemory, payload: u64) -> SharedChunk {
    let chunk = memory
        .manager()
        .get_chunk(ChunkSettings::new_payload_only(8, 8).unwrap())
        .unwrap();
    unsafe { chunk.user_payload().unwrap().cast::<u64>().as_ptr().write(payload) };
    chunk
}

fn payload_of(chunk: &SharedChunk) -> u64 {
    unsafe { *chunk.user_payload().unwrap().cast::<u64>().as_ref() }
}

fn used_chunks(memory: &ManagedMemory) -> u32 {
    memory.manager().pool_info(0).unwrap().used_chunks
}

#[test]
fn chunks_travel_in_fifo_order() {
    let memory = memory();
    let sut = Queue::new(
        VariantQueueKind::FiFoEvictsOldestOnOverflow,
        QueueFullPolicy::DiscardOldestData,
    );
    let pusher = ChunkQueuePusher::new(&sut);
    let popper = ChunkQueuePopper::new(&sut);

    for payload in 0..4 {
        assert_that!(pusher.push(acquire_with_payload(&memory, payload)), is_ok);
    }

    for payload in 0..4 {
        let chunk = popper.pop();
        assert_that!(chunk, is_some);
        assert_that!(payload_of(&chunk.unwrap()), eq payload);
    }

    assert_that!(popper.pop(), is_none);
}

#[test]
fn an_overflowing_queue_drops_the_oldest_and_raises_the_lost_flag() {
    let memory = memory();
    let sut = Queue::new(
        VariantQueueKind::FiFoEvictsOldestOnOverflow,
        QueueFullPolicy::DiscardOldestData,
    );
    let pusher = ChunkQueuePusher::new(&sut);
    let popper = ChunkQueuePopper::new(&sut);
    popper.set_capacity(1);

    assert_that!(popper.has_lost_chunks(), eq false);

    for payload in 1..=5 {
        assert_that!(pusher.push(acquire_with_payload(&memory, payload)), is_ok);
    }

    let chunk = popper.pop().unwrap();
    assert_that!(payload_of(&chunk), eq 5);

    assert_that!(popper.has_lost_chunks(), eq true);
    // reading clears the flag
    assert_that!(popper.has_lost_chunks(), eq false);

    // the displaced chunks went back to the pool
    drop(chunk);
    assert_that!(used_chunks(&memory), eq 0);
}

#[test]
fn a_rejecting_queue_hands_the_chunk_back() {
    let memory = memory();
    let sut = Queue::new(
        VariantQueueKind::FiFoRejectsOnOverflow,
        QueueFullPolicy::BlockPublisher,
    );
    let pusher = ChunkQueuePusher::new(&sut);
    let popper = ChunkQueuePopper::new(&sut);
    popper.set_capacity(2);

    assert_that!(pusher.push(acquire_with_payload(&memory, 1)), is_ok);
    assert_that!(pusher.push(acquire_with_payload(&memory, 2)), is_ok);

    let rejected = pusher.push(acquire_with_payload(&memory, 3));
    assert_that!(rejected, is_err);
    assert_that!(payload_of(&rejected.err().unwrap()), eq 3);

    assert_that!(payload_of(&popper.pop().unwrap()), eq 1);
}

#[test]
fn an_explicitly_lost_chunk_raises_the_flag() {
    let sut = Queue::new(
        VariantQueueKind::FiFoRejectsOnOverflow,
        QueueFullPolicy::BlockPublisher,
    );
    let pusher = ChunkQueuePusher::new(&sut);
    let popper = ChunkQueuePopper::new(&sut);

    assert_that!(popper.has_lost_chunks(), eq false);
    pusher.lost_a_chunk();
    assert_that!(popper.has_lost_chunks(), eq true);
}

#[test]
fn clear_drains_the_queue_and_releases_the_chunks() {
    let memory = memory();
    let sut = Queue::new(
        VariantQueueKind::FiFoEvictsOldestOnOverflow,
        QueueFullPolicy::DiscardOldestData,
    );
    let pusher = ChunkQueuePusher::new(&sut);
    let popper = ChunkQueuePopper::new(&sut);

    for payload in 0..4 {
        assert_that!(pusher.push(acquire_with_payload(&memory, payload)), is_ok);
    }
    assert_that!(used_chunks(&memory), eq 4);

    popper.clear();
    assert_that!(popper.pop(), is_none);
    assert_that!(used_chunks(&memory), eq 0);
}

#[test]
fn a_push_notifies_the_attached_condition_variable() {
    let memory = memory();
    let segment = TestSegment::create(4096);
    let allocator = segment.allocator();
    let condition_variable = emplace(&allocator, ConditionVariableData::new());
    let condition_variable = unsafe { condition_variable.as_ref() };

    let sut = Queue::new(
        VariantQueueKind::FiFoEvictsOldestOnOverflow,
        QueueFullPolicy::DiscardOldestData,
    );
    let pusher = ChunkQueuePusher::new(&sut);
    let popper = ChunkQueuePopper::new(&sut);

    assert_that!(popper.set_condition_variable(condition_variable, 3), eq true);
    assert_that!(popper.has_condition_variable(), eq true);

    assert_that!(pusher.push(acquire_with_payload(&memory, 1)), is_ok);
    assert_that!(condition_variable.wake_count(), eq 1);
    assert_that!(condition_variable.take_notifications(), eq 1 << 3);
    assert_that!(condition_variable.take_notifications(), eq 0);

    popper.clear();
}

#[test]
fn a_second_condition_variable_attachment_is_ignored() {
    let segment = TestSegment::create(4096);
    let allocator = segment.allocator();
    let first = unsafe { emplace(&allocator, ConditionVariableData::new()).as_ref() };
    let second = unsafe { emplace(&allocator, ConditionVariableData::new()).as_ref() };

    let sut = Queue::new(
        VariantQueueKind::FiFoEvictsOldestOnOverflow,
        QueueFullPolicy::DiscardOldestData,
    );
    let popper = ChunkQueuePopper::new(&sut);

    assert_that!(popper.set_condition_variable(first, 0), eq true);
    assert_that!(popper.set_condition_variable(second, 1), eq false);

    popper.unset_condition_variable();
    assert_that!(popper.has_condition_variable(), eq false);
    assert_that!(popper.set_condition_variable(second, 1), eq true);
}

#[test]
fn after_unset_no_condition_variable_is_notified() {
    let memory = memory();
    let segment = TestSegment::create(4096);
    let allocator = segment.allocator();
    let condition_variable = unsafe { emplace(&allocator, ConditionVariableData::new()).as_ref() };

    let sut = Queue::new(
        VariantQueueKind::FiFoEvictsOldestOnOverflow,
        QueueFullPolicy::DiscardOldestData,
    );
    let pusher = ChunkQueuePusher::new(&sut);
    let popper = ChunkQueuePopper::new(&sut);

    popper.set_condition_variable(condition_variable, 0);
    popper.unset_condition_variable();

    assert_that!(pusher.push(acquire_with_payload(&memory, 1)), is_ok);
    assert_that!(condition_variable.wake_count(), eq 0);

    popper.clear();
}
