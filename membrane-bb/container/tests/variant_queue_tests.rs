// Copyright (c) 2024 Contributors to the membrane project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use membrane_bb_container::variant_queue::{PushResult, VariantQueue, VariantQueueKind};
use membrane_testing::assert_that;

pub trait QueueKind {
    const KIND: VariantQueueKind;
}

pub struct Rejecting;
impl QueueKind for Rejecting {
    const KIND: VariantQueueKind = VariantQueueKind::FiFoRejectsOnOverflow;
}

pub struct Evicting;
impl QueueKind for Evicting {
    const KIND: VariantQueueKind = VariantQueueKind::FiFoEvictsOldestOnOverflow;
}

#[generic_tests::define]
mod common {
    use super::*;

    const CAPACITY: usize = 8;

    #[test]
    fn new_queue_is_empty<K: QueueKind>() {
        let sut = VariantQueue::<CAPACITY>::new(K::KIND);

        assert_that!(sut.kind(), eq K::KIND);
        assert_that!(sut.is_empty(), eq true);
        assert_that!(sut.capacity(), eq CAPACITY);
        assert_that!(unsafe { sut.pop() }, is_none);
    }

    #[test]
    fn values_travel_in_fifo_order<K: QueueKind>() {
        let sut = VariantQueue::<CAPACITY>::new(K::KIND);

        for i in 0..CAPACITY as u64 {
            assert_that!(unsafe { sut.push(i) }, eq PushResult::Pushed);
        }

        for i in 0..CAPACITY as u64 {
            assert_that!(unsafe { sut.pop() }, eq Some(i));
        }
    }

    #[test]
    fn with_capacity_reduces_the_working_capacity<K: QueueKind>() {
        let sut = VariantQueue::<CAPACITY>::with_capacity(K::KIND, 2).unwrap();

        assert_that!(sut.capacity(), eq 2);
        assert_that!(unsafe { sut.push(1) }, eq PushResult::Pushed);
        assert_that!(unsafe { sut.push(2) }, eq PushResult::Pushed);
        assert_that!(sut.is_full(), eq true);
    }

    #[test]
    fn with_zero_capacity_construction_fails<K: QueueKind>() {
        assert_that!(VariantQueue::<CAPACITY>::with_capacity(K::KIND, 0), is_err);
    }

    #[instantiate_tests(<Rejecting>)]
    mod fifo {}

    #[instantiate_tests(<Evicting>)]
    mod sofi {}
}

#[test]
fn a_full_rejecting_queue_refuses_the_push() {
    let sut = VariantQueue::<2>::new(VariantQueueKind::FiFoRejectsOnOverflow);

    assert_that!(unsafe { sut.push(1) }, eq PushResult::Pushed);
    assert_that!(unsafe { sut.push(2) }, eq PushResult::Pushed);
    assert_that!(unsafe { sut.push(3) }, eq PushResult::Full);

    assert_that!(unsafe { sut.pop() }, eq Some(1));
}

#[test]
fn a_full_evicting_queue_hands_back_the_oldest_value() {
    let sut = VariantQueue::<2>::new(VariantQueueKind::FiFoEvictsOldestOnOverflow);

    assert_that!(unsafe { sut.push(1) }, eq PushResult::Pushed);
    assert_that!(unsafe { sut.push(2) }, eq PushResult::Pushed);
    assert_that!(unsafe { sut.push(3) }, eq PushResult::Evicted(1));

    assert_that!(unsafe { sut.pop() }, eq Some(2));
    assert_that!(unsafe { sut.pop() }, eq Some(3));
    assert_that!(unsafe { sut.pop() }, is_none);
}
