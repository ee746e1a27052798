// Copyright (c) 2024 Contributors to the membrane project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use membrane_bb_lock_free::spsc::index_queue::FixedSizeIndexQueue;
use membrane_testing::{assert_that, Watchdog};

#[test]
fn push_works_until_full() {
    const CAPACITY: usize = 128;
    let sut = FixedSizeIndexQueue::<CAPACITY>::new();

    assert_that!(sut.capacity(), eq CAPACITY);
    assert_that!(sut, is_empty);
    assert_that!(sut.is_full(), eq false);

    for i in 0..CAPACITY {
        assert_that!(sut, len i);
        assert_that!(unsafe { sut.push(i as u64) }, eq true);
    }

    assert_that!(unsafe { sut.push(1234) }, eq false);
    assert_that!(sut, len CAPACITY);
    assert_that!(sut.is_full(), eq true);
}

#[test]
fn pop_works_until_empty_and_preserves_fifo_order() {
    const CAPACITY: usize = 128;
    let sut = FixedSizeIndexQueue::<CAPACITY>::new();

    for i in 0..CAPACITY {
        assert_that!(unsafe { sut.push(i as u64) }, eq true);
    }

    for i in 0..CAPACITY {
        let value = unsafe { sut.pop() };
        assert_that!(value, is_some);
        assert_that!(value.unwrap(), eq i as u64);
    }

    assert_that!(unsafe { sut.pop() }, is_none);
    assert_that!(sut, is_empty);
}

#[test]
fn rejected_values_are_not_stored() {
    const CAPACITY: usize = 2;
    let sut = FixedSizeIndexQueue::<CAPACITY>::new();

    assert_that!(unsafe { sut.push(1) }, eq true);
    assert_that!(unsafe { sut.push(2) }, eq true);
    assert_that!(unsafe { sut.push(3) }, eq false);

    assert_that!(unsafe { sut.pop() }, eq Some(1));
    assert_that!(unsafe { sut.pop() }, eq Some(2));
    assert_that!(unsafe { sut.pop() }, is_none);
}

#[test]
fn with_capacity_limits_the_working_capacity() {
    const CAPACITY: usize = 16;
    let sut = FixedSizeIndexQueue::<CAPACITY>::with_capacity(3).unwrap();

    assert_that!(sut.capacity(), eq 3);
    for i in 0..3 {
        assert_that!(unsafe { sut.push(i) }, eq true);
    }
    assert_that!(unsafe { sut.push(99) }, eq false);
}

#[test]
fn with_capacity_zero_fails() {
    assert_that!(FixedSizeIndexQueue::<16>::with_capacity(0), is_err);
}

#[test]
fn with_capacity_above_the_maximum_fails() {
    assert_that!(FixedSizeIndexQueue::<16>::with_capacity(17), is_err);
}

#[test]
fn set_capacity_on_an_empty_queue_takes_effect() {
    const CAPACITY: usize = 8;
    let sut = FixedSizeIndexQueue::<CAPACITY>::new();

    unsafe { sut.set_capacity(2) };
    assert_that!(sut.capacity(), eq 2);

    assert_that!(unsafe { sut.push(1) }, eq true);
    assert_that!(unsafe { sut.push(2) }, eq true);
    assert_that!(unsafe { sut.push(3) }, eq false);
}

#[test]
fn concurrent_producer_and_consumer_exchange_all_values_in_order() {
    const CAPACITY: usize = 8;
    const VALUES: u64 = 100000;

    let _watchdog = Watchdog::new();
    let sut = FixedSizeIndexQueue::<CAPACITY>::new();

    std::thread::scope(|s| {
        s.spawn(|| {
            for value in 0..VALUES {
                while !unsafe { sut.push(value) } {
                    std::hint::spin_loop();
                }
            }
        });

        s.spawn(|| {
            let mut expected = 0;
            while expected < VALUES {
                if let Some(value) = unsafe { sut.pop() } {
                    assert_that!(value, eq expected);
                    expected += 1;
                }
            }
        });
    });
}
