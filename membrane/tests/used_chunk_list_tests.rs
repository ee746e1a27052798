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
use membrane::port::used_chunk_list::UsedChunkList;
use membrane::testing::ManagedMemory;
use membrane_testing::assert_that;

const CAPACITY: usize = 4;

fn memory() -> ManagedMemory {
    ManagedMemory::new(&DataSegmentConfig {
        mempool: vec![MemPoolConfig {
            size: 128,
            chunk_count: 8,
        }],
    })
}

fn acquire(memory: &ManagedMemory) -> SharedChunk {
    memory
        .manager()
        .get_chunk(ChunkSettings::new_payload_only(8, 8).unwrap())
        .unwrap()
}

fn used_chunks(memory: &ManagedMemory) -> u32 {
    memory.manager().pool_info(0).unwrap().used_chunks
}

#[test]
fn insert_works_until_the_list_is_full() {
    let memory = memory();
    let sut = UsedChunkList::<CAPACITY>::new();

    for i in 0..CAPACITY {
        assert_that!(sut.insert(acquire(&memory)), eq true);
        assert_that!(sut.len(), eq i + 1);
    }

    // the refused chunk is dropped normally and returns to the pool
    assert_that!(sut.insert(acquire(&memory)), eq false);
    assert_that!(sut.len(), eq CAPACITY);
    assert_that!(used_chunks(&memory), eq CAPACITY as u32);
}

#[test]
fn remove_returns_the_matching_chunk() {
    let memory = memory();
    let sut = UsedChunkList::<CAPACITY>::new();

    let first = acquire(&memory);
    let second = acquire(&memory);
    let first_header = first.chunk_header().unwrap();
    let second_header = second.chunk_header().unwrap();

    sut.insert(first);
    sut.insert(second);

    let removed = sut.remove(first_header);
    assert_that!(removed, is_some);
    assert_that!(removed.unwrap().chunk_header().unwrap(), eq first_header);
    assert_that!(sut.len(), eq 1);

    let removed = sut.remove(second_header);
    assert_that!(removed, is_some);
    assert_that!(sut, is_empty);
    assert_that!(used_chunks(&memory), eq 0);
}

#[test]
fn remove_of_an_unknown_header_returns_none() {
    let memory = memory();
    let sut = UsedChunkList::<CAPACITY>::new();

    sut.insert(acquire(&memory));

    let foreign = acquire(&memory);
    let foreign_header = foreign.chunk_header().unwrap();
    assert_that!(sut.remove(foreign_header), is_none);
    assert_that!(sut.len(), eq 1);
}

#[test]
fn a_removed_slot_can_be_reused() {
    let memory = memory();
    let sut = UsedChunkList::<CAPACITY>::new();

    let mut headers = vec![];
    for _ in 0..CAPACITY {
        let chunk = acquire(&memory);
        headers.push(chunk.chunk_header().unwrap());
        sut.insert(chunk);
    }
    assert_that!(sut.insert(acquire(&memory)), eq false);

    // removing one entry makes room for the next insert
    assert_that!(sut.remove(headers[2]), is_some);
    assert_that!(sut.insert(acquire(&memory)), eq true);
    assert_that!(sut.len(), eq CAPACITY);
}

#[test]
fn cleanup_drops_every_stored_chunk() {
    let memory = memory();
    let sut = UsedChunkList::<CAPACITY>::new();

    for _ in 0..CAPACITY {
        sut.insert(acquire(&memory));
    }
    assert_that!(used_chunks(&memory), eq CAPACITY as u32);

    sut.cleanup();
    assert_that!(sut, is_empty);
    assert_that!(used_chunks(&memory), eq 0);

    // the list is fully usable afterwards
    assert_that!(sut.insert(acquire(&memory)), eq true);
}
