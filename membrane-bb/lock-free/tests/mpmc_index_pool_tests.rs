// Copyright (c) 2024 Contributors to the membrane project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Barrier;

use membrane_bb_lock_free::mpmc::index_pool::FixedSizeIndexPool;
use membrane_testing::{assert_that, Watchdog};

#[test]
fn new_pool_hands_out_every_index_exactly_once() {
    const CAPACITY: usize = 128;
    let sut = FixedSizeIndexPool::<CAPACITY>::new();

    assert_that!(sut.capacity(), eq CAPACITY as u32);
    assert_that!(sut.in_use(), eq 0);

    let mut indices = HashSet::new();
    for _ in 0..CAPACITY {
        let index = sut.acquire();
        assert_that!(index, is_some);
        assert_that!(indices.insert(index.unwrap()), eq true);
    }

    assert_that!(sut.acquire(), is_none);
    assert_that!(sut.in_use(), eq CAPACITY);
}

#[test]
fn released_indices_can_be_acquired_again() {
    const CAPACITY: usize = 16;
    let sut = FixedSizeIndexPool::<CAPACITY>::new();

    let mut indices = vec![];
    for _ in 0..CAPACITY {
        indices.push(sut.acquire().unwrap());
    }
    assert_that!(sut.acquire(), is_none);

    for index in indices {
        sut.release(index);
    }
    assert_that!(sut.in_use(), eq 0);

    for _ in 0..CAPACITY {
        assert_that!(sut.acquire(), is_some);
    }
}

#[test]
fn in_use_tracks_the_difference_of_acquires_and_releases() {
    const CAPACITY: usize = 8;
    let sut = FixedSizeIndexPool::<CAPACITY>::new();

    let first = sut.acquire().unwrap();
    let _second = sut.acquire().unwrap();
    assert_that!(sut.in_use(), eq 2);

    sut.release(first);
    assert_that!(sut.in_use(), eq 1);
}

#[test]
fn concurrent_acquire_release_never_duplicates_an_index() {
    const CAPACITY: usize = 64;
    const THREADS: usize = 4;
    const ITERATIONS: usize = 10000;

    let _watchdog = Watchdog::new();
    let sut = FixedSizeIndexPool::<CAPACITY>::new();
    let in_use = core::array::from_fn::<_, CAPACITY, _>(|_| AtomicBool::new(false));
    let barrier = Barrier::new(THREADS);

    std::thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                barrier.wait();
                for _ in 0..ITERATIONS {
                    if let Some(index) = sut.acquire() {
                        let was_in_use =
                            in_use[index as usize].swap(true, Ordering::Relaxed);
                        assert_that!(was_in_use, eq false);

                        in_use[index as usize].store(false, Ordering::Relaxed);
                        sut.release(index);
                    }
                }
            });
        }
    });

    assert_that!(sut.in_use(), eq 0);
}
