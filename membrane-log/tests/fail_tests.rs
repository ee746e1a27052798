// Copyright (c) 2024 Contributors to the membrane project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use membrane_log::{fail, fatal_panic};

#[derive(Debug)]
struct Origin;

fn fails_unconditionally() -> Result<u64, u64> {
    fail!(from Origin, with 42, "it never works");
}

fn forwards_the_ok_value(result: Result<u64, u64>) -> Result<u64, u64> {
    let value = fail!(from Origin, when result, "the call failed");
    Ok(value + 1)
}

fn replaces_the_error(result: Result<u64, ()>) -> Result<u64, u64> {
    let value = fail!(from Origin, when result, with 1234, "the call failed");
    Ok(value)
}

#[test]
fn fail_with_returns_the_error_value() {
    assert_eq!(fails_unconditionally(), Err(42));
}

#[test]
fn fail_when_passes_the_ok_value_through() {
    assert_eq!(forwards_the_ok_value(Ok(10)), Ok(11));
}

#[test]
fn fail_when_forwards_the_error() {
    assert_eq!(forwards_the_ok_value(Err(7)), Err(7));
}

#[test]
fn fail_when_with_replaces_the_error() {
    assert_eq!(replaces_the_error(Ok(5)), Ok(5));
    assert_eq!(replaces_the_error(Err(())), Err(1234));
}

#[test]
#[should_panic]
fn fatal_panic_panics() {
    fatal_panic!(from Origin, "the world is on fire");
}

#[test]
#[should_panic]
fn fatal_panic_when_panics_on_error() {
    let result: Result<(), ()> = Err(());
    fatal_panic!(from Origin, when result, "the call failed fatally");
}
