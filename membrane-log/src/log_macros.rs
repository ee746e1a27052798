// Copyright (c) 2024 Contributors to the membrane project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The plain logging macros. Every macro has two forms: a bare one and one
//! with a `from <origin>` prefix where the origin is printed via [`Debug`].

#[macro_export]
macro_rules! trace {
    (from $origin:expr, $($message:expr),* $(,)?) => {
        $crate::__internal_log(
            $crate::LogLevel::Trace,
            ::core::format_args!("{:?}", $origin),
            ::core::format_args!($($message),*),
        )
    };
    ($($message:expr),* $(,)?) => {
        $crate::__internal_log(
            $crate::LogLevel::Trace,
            ::core::format_args!(""),
            ::core::format_args!($($message),*),
        )
    };
}

#[macro_export]
macro_rules! debug {
    (from $origin:expr, $($message:expr),* $(,)?) => {
        $crate::__internal_log(
            $crate::LogLevel::Debug,
            ::core::format_args!("{:?}", $origin),
            ::core::format_args!($($message),*),
        )
    };
    ($($message:expr),* $(,)?) => {
        $crate::__internal_log(
            $crate::LogLevel::Debug,
            ::core::format_args!(""),
            ::core::format_args!($($message),*),
        )
    };
}

#[macro_export]
macro_rules! info {
    (from $origin:expr, $($message:expr),* $(,)?) => {
        $crate::__internal_log(
            $crate::LogLevel::Info,
            ::core::format_args!("{:?}", $origin),
            ::core::format_args!($($message),*),
        )
    };
    ($($message:expr),* $(,)?) => {
        $crate::__internal_log(
            $crate::LogLevel::Info,
            ::core::format_args!(""),
            ::core::format_args!($($message),*),
        )
    };
}

#[macro_export]
macro_rules! warn {
    (from $origin:expr, $($message:expr),* $(,)?) => {
        $crate::__internal_log(
            $crate::LogLevel::Warn,
            ::core::format_args!("{:?}", $origin),
            ::core::format_args!($($message),*),
        )
    };
    ($($message:expr),* $(,)?) => {
        $crate::__internal_log(
            $crate::LogLevel::Warn,
            ::core::format_args!(""),
            ::core::format_args!($($message),*),
        )
    };
}

#[macro_export]
macro_rules! error {
    (from $origin:expr, $($message:expr),* $(,)?) => {
        $crate::__internal_log(
            $crate::LogLevel::Error,
            ::core::format_args!("{:?}", $origin),
            ::core::format_args!($($message),*),
        )
    };
    ($($message:expr),* $(,)?) => {
        $crate::__internal_log(
            $crate::LogLevel::Error,
            ::core::format_args!(""),
            ::core::format_args!($($message),*),
        )
    };
}
