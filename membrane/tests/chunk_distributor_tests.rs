// Copyright (c) 2024 Contributors to the membrane project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::time::Duration;

use membrane::config::{DataSegmentConfig, MemPoolConfig};
use membrane::memory::chunk_settings::ChunkSettings;
use membrane::memory::shared_chunk::SharedChunk;
use membrane::port::chunk_distributor::{
    ChunkDistributor, ChunkDistributorAddQueueError, ChunkDistributorData,
    ChunkDistributorRemoveQueueError,
};
use membrane::port::chunk_queue_data::ChunkQueueData;
use membrane::port::chunk_queue_popper::ChunkQueuePopper;
use membrane::port::locking_policy::SingleThreadedPolicy;
use membrane::port::policy::{ConsumerTooSlowPolicy, QueueFullPolicy};
use membrane::testing::{emplace, ManagedMemory, TestSegment};
use membrane_bb_elementary::bump_allocator::BumpAllocator;
use membrane_bb_container::variant_queue::VariantQueueKind;
use membrane_testing::{assert_that, Watchdog};

const QUEUE_CAPACITY: usize = 4;
const MAX_QUEUES: usize = 2;
const MAX_HISTORY: usize = 3;

type Queue = ChunkQueueData<SingleThreadedPolicy, QUEUE_CAPACITY>;
type DistributorData = ChunkDistributorData<
    SingleThreadedPolicy,
    SingleThreadedPolicy,
    QUEUE_CAPACITY,
    MAX_QUEUES,
    MAX_HISTORY,
>;

fn memory() -> ManagedMemory {
    ManagedMemory::new(&DataSegmentConfig {
        mempool: vec![MemPoolConfig {
            size: 128,
            chunk_count: 32,
        }],
    })
}

fn evicting_queue<'a>(allocator: &BumpAllocator) -> &'a Queue {
    unsafe {
        emplace(
            allocator,
            Queue::new(
                VariantQueueKind::FiFoEvictsOldestOnOverflow,
                QueueFullPolicy::DiscardOldestData,
            ),
        )
        .as_ref()
    }
}

fn rejecting_queue<'a>(allocator: &BumpAllocator) -> &'a Queue {
    unsafe {
        emplace(
            allocator,
            Queue::new(
                VariantQueueKind::FiFoRejectsOnOverflow,
                QueueFullPolicy::BlockPublisher,
            ),
        )
        .as_ref()
    }
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
fn adding_the_same_queue_twice_registers_it_once() {
    let segment = TestSegment::create(64 * 1024);
    let allocator = segment.allocator();
    let queue = evicting_queue(&allocator);

    let data = DistributorData::new(ConsumerTooSlowPolicy::DiscardOldestData, 0);
    let sut = ChunkDistributor::new(&data);

    assert_that!(sut.try_add_queue(queue, 0), is_ok);
    assert_that!(sut.try_add_queue(queue, 0), is_ok);
    assert_that!(sut.number_of_stored_queues(), eq 1);
}

#[test]
fn a_full_queue_container_refuses_further_queues() {
    let segment = TestSegment::create(64 * 1024);
    let allocator = segment.allocator();

    let data = DistributorData::new(ConsumerTooSlowPolicy::DiscardOldestData, 0);
    let sut = ChunkDistributor::new(&data);

    for _ in 0..MAX_QUEUES {
        assert_that!(sut.try_add_queue(evicting_queue(&allocator), 0), is_ok);
    }

    let result = sut.try_add_queue(evicting_queue(&allocator), 0);
    assert_that!(result, is_err);
    assert_that!(
        result.err().unwrap(),
        eq ChunkDistributorAddQueueError::QueueContainerOverflow
    );
}

#[test]
fn removing_an_unknown_queue_fails() {
    let segment = TestSegment::create(64 * 1024);
    let allocator = segment.allocator();
    let queue = evicting_queue(&allocator);

    let data = DistributorData::new(ConsumerTooSlowPolicy::DiscardOldestData, 0);
    let sut = ChunkDistributor::new(&data);

    let result = sut.try_remove_queue(queue);
    assert_that!(result, is_err);
    assert_that!(
        result.err().unwrap(),
        eq ChunkDistributorRemoveQueueError::QueueNotInContainer
    );

    assert_that!(sut.try_add_queue(queue, 0), is_ok);
    assert_that!(sut.try_remove_queue(queue), is_ok);
    assert_that!(sut.number_of_stored_queues(), eq 0);
}

#[test]
fn remove_all_queues_on_an_empty_set_is_a_no_op() {
    let data = DistributorData::new(ConsumerTooSlowPolicy::DiscardOldestData, 0);
    let sut = ChunkDistributor::new(&data);

    sut.remove_all_queues();
    assert_that!(sut.number_of_stored_queues(), eq 0);
}

#[test]
fn deliver_reaches_every_registered_queue() {
    let memory = memory();
    let segment = TestSegment::create(64 * 1024);
    let allocator = segment.allocator();
    let first = evicting_queue(&allocator);
    let second = evicting_queue(&allocator);

    let data = DistributorData::new(ConsumerTooSlowPolicy::DiscardOldestData, 0);
    let sut = ChunkDistributor::new(&data);
    sut.try_add_queue(first, 0).unwrap();
    sut.try_add_queue(second, 0).unwrap();

    let number_of_deliveries = sut.deliver_to_all_stored_queues(acquire_with_payload(&memory, 77));
    assert_that!(number_of_deliveries, eq 2);

    for queue in [first, second] {
        let chunk = ChunkQueuePopper::new(queue).pop();
        assert_that!(chunk, is_some);
        assert_that!(payload_of(&chunk.unwrap()), eq 77);
    }

    assert_that!(used_chunks(&memory), eq 0);
}

#[test]
fn the_history_keeps_the_most_recent_chunks() {
    let memory = memory();

    let data = DistributorData::new(ConsumerTooSlowPolicy::DiscardOldestData, MAX_HISTORY as u64);
    let sut = ChunkDistributor::new(&data);

    for payload in 1..=5 {
        sut.deliver_to_all_stored_queues(acquire_with_payload(&memory, payload));
    }
    assert_that!(sut.history_size(), eq MAX_HISTORY as u64);
    // two chunks were evicted from the history and returned to the pool
    assert_that!(used_chunks(&memory), eq MAX_HISTORY as u32);

    sut.clear_history();
    assert_that!(sut.history_size(), eq 0);
    assert_that!(used_chunks(&memory), eq 0);
}

#[test]
fn a_late_joiner_receives_the_requested_history_oldest_first() {
    let memory = memory();
    let segment = TestSegment::create(64 * 1024);
    let allocator = segment.allocator();
    let queue = evicting_queue(&allocator);

    let data = DistributorData::new(ConsumerTooSlowPolicy::DiscardOldestData, MAX_HISTORY as u64);
    let sut = ChunkDistributor::new(&data);

    for payload in [10, 20, 30] {
        sut.deliver_to_all_stored_queues(acquire_with_payload(&memory, payload));
    }

    sut.try_add_queue(queue, 2).unwrap();

    let popper = ChunkQueuePopper::new(queue);
    assert_that!(payload_of(&popper.pop().unwrap()), eq 20);
    assert_that!(payload_of(&popper.pop().unwrap()), eq 30);
    assert_that!(popper.pop(), is_none);

    sut.clear_history();
}

#[test]
fn a_history_request_larger_than_the_history_replays_everything() {
    let memory = memory();
    let segment = TestSegment::create(64 * 1024);
    let allocator = segment.allocator();
    let queue = evicting_queue(&allocator);

    let data = DistributorData::new(ConsumerTooSlowPolicy::DiscardOldestData, MAX_HISTORY as u64);
    let sut = ChunkDistributor::new(&data);

    sut.deliver_to_all_stored_queues(acquire_with_payload(&memory, 42));
    sut.try_add_queue(queue, 100).unwrap();

    let popper = ChunkQueuePopper::new(queue);
    assert_that!(payload_of(&popper.pop().unwrap()), eq 42);
    assert_that!(popper.pop(), is_none);

    sut.clear_history();
}

#[test]
fn deliver_to_queue_does_not_touch_the_history() {
    let memory = memory();
    let segment = TestSegment::create(64 * 1024);
    let allocator = segment.allocator();
    let queue = evicting_queue(&allocator);

    let data = DistributorData::new(ConsumerTooSlowPolicy::DiscardOldestData, MAX_HISTORY as u64);
    let sut = ChunkDistributor::new(&data);

    assert_that!(sut.deliver_to_queue(queue, acquire_with_payload(&memory, 13)), eq true);
    assert_that!(sut.history_size(), eq 0);

    let popper = ChunkQueuePopper::new(queue);
    assert_that!(payload_of(&popper.pop().unwrap()), eq 13);
}

#[test]
fn add_to_history_without_delivery_skips_the_queues() {
    let memory = memory();
    let segment = TestSegment::create(64 * 1024);
    let allocator = segment.allocator();
    let queue = evicting_queue(&allocator);

    let data = DistributorData::new(ConsumerTooSlowPolicy::DiscardOldestData, MAX_HISTORY as u64);
    let sut = ChunkDistributor::new(&data);
    sut.try_add_queue(queue, 0).unwrap();

    sut.add_to_history_without_delivery(acquire_with_payload(&memory, 9));
    assert_that!(sut.history_size(), eq 1);
    assert_that!(ChunkQueuePopper::new(queue).pop(), is_none);

    sut.clear_history();
}

#[test]
fn a_blocked_delivery_finishes_once_the_consumer_pops() {
    let _watchdog = Watchdog::new();

    let memory = memory();
    let segment = TestSegment::create(64 * 1024);
    let allocator = segment.allocator();
    let queue = rejecting_queue(&allocator);
    ChunkQueuePopper::new(queue).set_capacity(1);

    let data = DistributorData::new(ConsumerTooSlowPolicy::WaitForConsumer, 0);
    let sut = ChunkDistributor::new(&data);
    sut.try_add_queue(queue, 0).unwrap();

    sut.deliver_to_all_stored_queues(acquire_with_payload(&memory, 1));

    std::thread::scope(|s| {
        s.spawn(|| {
            std::thread::sleep(Duration::from_millis(50));
            let popper = ChunkQueuePopper::new(queue);
            assert_that!(payload_of(&popper.pop().unwrap()), eq 1);
        });

        // blocks until the consumer made room
        let number_of_deliveries =
            sut.deliver_to_all_stored_queues(acquire_with_payload(&memory, 2));
        assert_that!(number_of_deliveries, eq 1);
    });

    assert_that!(payload_of(&ChunkQueuePopper::new(queue).pop().unwrap()), eq 2);
}

#[test]
fn signal_shutdown_releases_a_blocked_delivery() {
    let memory = memory();
    let segment = TestSegment::create(64 * 1024);
    let allocator = segment.allocator();
    let queue = rejecting_queue(&allocator);
    let popper = ChunkQueuePopper::new(queue);
    popper.set_capacity(1);

    let data = DistributorData::new(ConsumerTooSlowPolicy::WaitForConsumer, 0);
    let sut = ChunkDistributor::new(&data);
    sut.try_add_queue(queue, 0).unwrap();

    sut.deliver_to_all_stored_queues(acquire_with_payload(&memory, 1));
    sut.signal_shutdown();

    let number_of_deliveries = sut.deliver_to_all_stored_queues(acquire_with_payload(&memory, 2));
    assert_that!(number_of_deliveries, eq 0);
    assert_that!(popper.has_lost_chunks(), eq true);

    assert_that!(payload_of(&popper.pop().unwrap()), eq 1);
    assert_that!(popper.pop(), is_none);
}
