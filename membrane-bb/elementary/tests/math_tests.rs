// Copyright (c) 2024 Contributors to the membrane project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use membrane_bb_elementary::math::{align, align_to, unaligned_mem_size};
use membrane_testing::assert_that;

#[test]
fn align_returns_input_when_already_aligned() {
    assert_that!(align(0, 8), eq 0);
    assert_that!(align(64, 8), eq 64);
    assert_that!(align(64, 64), eq 64);
}

#[test]
fn align_rounds_up_to_next_multiple() {
    assert_that!(align(1, 8), eq 8);
    assert_that!(align(9, 8), eq 16);
    assert_that!(align(63, 64), eq 64);
    assert_that!(align(65, 64), eq 128);
}

#[test]
fn align_to_uses_type_alignment() {
    assert_that!(align_to::<u64>(1), eq 8);
    assert_that!(align_to::<u8>(13), eq 13);
}

#[test]
fn unaligned_mem_size_covers_worst_case_start_address() {
    assert_that!(unaligned_mem_size::<u64>(4), eq 4 * 8 + 7);
    assert_that!(unaligned_mem_size::<u8>(4), eq 4);
}
