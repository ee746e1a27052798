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
use membrane::port::chunk_queue_pusher::ChunkQueuePusher;
use membrane::port::chunk_receiver::{ChunkReceiveError, ChunkReceiver, ChunkReceiverData};
use membrane::port::locking_policy::SingleThreadedPolicy;
use membrane::port::policy::QueueFullPolicy;
use membrane::testing::ManagedMemory;
use membrane_bb_container::variant_queue::VariantQueueKind;
use membrane_testing::assert_that;

const QUEUE_CAPACITY: usize = 8;
const MAX_CHUNKS_HELD: usize = 2;
// one slack slot on top of the held maximum
const MAX_CHUNKS_IN_USE: usize = MAX_CHUNKS_HELD + 1;

type ReceiverData = ChunkReceiverData<SingleThreadedPolicy, QUEUE_CAPACITY, MAX_CHUNKS_IN_USE>;

fn memory() -> ManagedMemory {
    ManagedMemory::new(&DataSegmentConfig {
        mempool: vec![MemPoolConfig {
            size: 128,
            chunk_count: 16,
        }],
    })
}

fn receiver_data() -> ReceiverData {
    ReceiverData::new(
        VariantQueueKind::FiFoEvictsOldestOnOverflow,
        QueueFullPolicy::DiscardOldestData,
    )
}

fn acquire_with_payload(memory: &ManagedMemory, payload: u64) -> SharedChunk {
    let chunk = memory
        .manager()
        .get_chunk(ChunkSettings::new_payload_only(8, 8).unwrap())
        .unwrap();
    unsafe { chunk.user_payload().unwrap().cast::<u64>().as_ptr().write(payload) };
    chunk
}

fn used_chunks(memory: &ManagedMemory) -> u32 {
    memory.manager().pool_info(0).unwrap().used_chunks
}

#[test]
fn try_get_on_an_empty_queue_returns_none() {
    let data = receiver_data();
    let sut = ChunkReceiver::new(&data);

    let result = sut.try_get();
    assert_that!(result, is_ok);
    assert_that!(result.unwrap(), is_none);
}

#[test]
fn try_get_hands_out_the_pushed_chunks_in_order() {
    let memory = memory();
    let data = receiver_data();
    let sut = ChunkReceiver::new(&data);
    let pusher = ChunkQueuePusher::new(data.queue_data());

    for payload in [11, 22] {
        assert_that!(pusher.push(acquire_with_payload(&memory, payload)), is_ok);
    }

    for payload in [11, 22] {
        let header = sut.try_get().unwrap().unwrap();
        assert_that!(
            unsafe { *header.as_ref().user_payload().cast::<u64>().as_ref() },
            eq payload
        );
        sut.release(header);
    }

    assert_that!(sut.try_get().unwrap(), is_none);
    assert_that!(used_chunks(&memory), eq 0);
}

#[test]
fn the_held_chunk_limit_is_enforced_with_one_slack_slot() {
    let memory = memory();
    let data = receiver_data();
    let sut = ChunkReceiver::new(&data);
    let pusher = ChunkQueuePusher::new(data.queue_data());

    for payload in 0..MAX_CHUNKS_IN_USE as u64 + 1 {
        assert_that!(pusher.push(acquire_with_payload(&memory, payload)), is_ok);
    }

    let mut headers = vec![];
    for _ in 0..MAX_CHUNKS_IN_USE {
        headers.push(sut.try_get().unwrap().unwrap());
    }

    let result = sut.try_get();
    assert_that!(result, is_err);
    assert_that!(
        result.err().unwrap(),
        eq ChunkReceiveError::TooManyChunksHeldInParallel
    );

    // one release recovers the overshoot
    sut.release(headers.pop().unwrap());
    assert_that!(sut.try_get(), is_ok);
}

#[test]
fn an_overflowing_receive_drops_the_popped_chunk() {
    let memory = memory();
    let data = receiver_data();
    let sut = ChunkReceiver::new(&data);
    let pusher = ChunkQueuePusher::new(data.queue_data());

    for payload in 0..MAX_CHUNKS_IN_USE as u64 + 1 {
        assert_that!(pusher.push(acquire_with_payload(&memory, payload)), is_ok);
    }

    for _ in 0..MAX_CHUNKS_IN_USE {
        let _ = sut.try_get().unwrap().unwrap();
    }
    assert_that!(sut.try_get(), is_err);

    // the chunk that could not be held went back to the pool
    assert_that!(used_chunks(&memory), eq MAX_CHUNKS_IN_USE as u32);
}

#[test]
fn release_all_drops_held_chunks_and_drains_the_queue() {
    let memory = memory();
    let data = receiver_data();
    let sut = ChunkReceiver::new(&data);
    let pusher = ChunkQueuePusher::new(data.queue_data());

    for payload in 0..4 {
        assert_that!(pusher.push(acquire_with_payload(&memory, payload)), is_ok);
    }
    let _held = sut.try_get().unwrap().unwrap();
    assert_that!(used_chunks(&memory), eq 4);

    sut.release_all();
    assert_that!(used_chunks(&memory), eq 0);
    assert_that!(sut.try_get().unwrap(), is_none);
}

#[test]
fn lost_chunks_are_reported_once() {
    let memory = memory();
    let data = receiver_data();
    let sut = ChunkReceiver::new(&data);
    let pusher = ChunkQueuePusher::new(data.queue_data());
    sut.popper().set_capacity(1);

    assert_that!(pusher.push(acquire_with_payload(&memory, 1)), is_ok);
    assert_that!(pusher.push(acquire_with_payload(&memory, 2)), is_ok);

    assert_that!(sut.has_lost_chunks(), eq true);
    assert_that!(sut.has_lost_chunks(), eq false);

    sut.release_all();
}

#[test]
#[should_panic]
fn releasing_a_foreign_chunk_is_fatal() {
    let memory = memory();
    let data = receiver_data();
    let sut = ChunkReceiver::new(&data);

    let foreign = memory.manager().get_chunk(ChunkSettings::new_payload_only(8, 8).unwrap());
    sut.release(foreign.unwrap().chunk_header().unwrap());
}
