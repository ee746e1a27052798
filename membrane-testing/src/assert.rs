// Copyright (c) 2024 Contributors to the membrane project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

/// Comparison style assertion macro used by every membrane test suite.
///
/// ```
/// use membrane_testing::assert_that;
///
/// let value = 5;
/// assert_that!(value, eq 5);
/// assert_that!(value, lt 10);
/// assert_that!(Some(value), is_some);
/// assert_that!(vec![1, 2, 3], len 3);
/// assert_that!(vec![1, 2, 3], contains 2);
/// ```
#[macro_export]
macro_rules! assert_that {
    ($lhs:expr, eq $rhs:expr) => {
        {
            let lval = &$lhs;
            let rval = &$rhs;
            if !(lval == rval) {
                $crate::assert_that!(@fail $lhs, $rhs, lval, rval, "==");
            }
        }
    };
    ($lhs:expr, ne $rhs:expr) => {
        {
            let lval = &$lhs;
            let rval = &$rhs;
            if !(lval != rval) {
                $crate::assert_that!(@fail $lhs, $rhs, lval, rval, "!=");
            }
        }
    };
    ($lhs:expr, lt $rhs:expr) => {
        {
            let lval = &$lhs;
            let rval = &$rhs;
            if !(lval < rval) {
                $crate::assert_that!(@fail $lhs, $rhs, lval, rval, "<");
            }
        }
    };
    ($lhs:expr, le $rhs:expr) => {
        {
            let lval = &$lhs;
            let rval = &$rhs;
            if !(lval <= rval) {
                $crate::assert_that!(@fail $lhs, $rhs, lval, rval, "<=");
            }
        }
    };
    ($lhs:expr, gt $rhs:expr) => {
        {
            let lval = &$lhs;
            let rval = &$rhs;
            if !(lval > rval) {
                $crate::assert_that!(@fail $lhs, $rhs, lval, rval, ">");
            }
        }
    };
    ($lhs:expr, ge $rhs:expr) => {
        {
            let lval = &$lhs;
            let rval = &$rhs;
            if !(lval >= rval) {
                $crate::assert_that!(@fail $lhs, $rhs, lval, rval, ">=");
            }
        }
    };
    ($lhs:expr, aligned_to $rhs:expr) => {
        {
            let lval = $lhs as usize;
            let rval = $rhs as usize;
            if lval % rval != 0 {
                $crate::assert_that!(@fail $lhs, $rhs, lval, rval, "aligned to");
            }
        }
    };
    ($lhs:expr, is_ok) => {
        if !$lhs.is_ok() {
            $crate::assert_that!(@fail_state $lhs, "is_ok()");
        }
    };
    ($lhs:expr, is_err) => {
        if !$lhs.is_err() {
            $crate::assert_that!(@fail_state $lhs, "is_err()");
        }
    };
    ($lhs:expr, is_some) => {
        if !$lhs.is_some() {
            $crate::assert_that!(@fail_state $lhs, "is_some()");
        }
    };
    ($lhs:expr, is_none) => {
        if !$lhs.is_none() {
            $crate::assert_that!(@fail_state $lhs, "is_none()");
        }
    };
    ($lhs:expr, is_empty) => {
        if !$lhs.is_empty() {
            $crate::assert_that!(@fail_state $lhs, "is_empty()");
        }
    };
    ($lhs:expr, is_not_empty) => {
        if $lhs.is_empty() {
            $crate::assert_that!(@fail_state $lhs, "is_empty() (not)");
        }
    };
    ($lhs:expr, len $rhs:expr) => {
        {
            let lval = $lhs.len();
            if lval != $rhs {
                ::core::panic!(
                    "assertion failed: expr: {}.len() == {};  value: {} == {}",
                    ::core::stringify!($lhs),
                    $rhs,
                    lval,
                    $rhs,
                );
            }
        }
    };
    ($lhs:expr, contains $rhs:expr) => {
        {
            let mut does_contain = false;
            for value in &$lhs {
                if *value == $rhs {
                    does_contain = true;
                    break;
                }
            }
            if !does_contain {
                ::core::panic!(
                    "assertion failed: expr: {} contains {} ({:?});  contents: {:?}",
                    ::core::stringify!($lhs),
                    ::core::stringify!($rhs),
                    $rhs,
                    $lhs,
                );
            }
        }
    };
    (@fail $lhs:expr, $rhs:expr, $lval:expr, $rval:expr, $symbol:expr) => {
        ::core::panic!(
            "assertion failed: expr: {} {} {};  value: {:?} {} {:?}",
            ::core::stringify!($lhs),
            $symbol,
            ::core::stringify!($rhs),
            $lval,
            $symbol,
            $rval,
        );
    };
    (@fail_state $lhs:expr, $state:expr) => {
        ::core::panic!(
            "assertion failed: {}.{}",
            ::core::stringify!($lhs),
            $state,
        );
    };
}
