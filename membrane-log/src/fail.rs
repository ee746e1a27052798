// Copyright (c) 2024 Contributors to the membrane project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Combines error handling with logging.

/// Logs a message with [`crate::LogLevel::Debug`] and returns the provided
/// error from the enclosing function. The `when` form unwraps the result of
/// a call and fails only when the call failed, converting the error with
/// [`From`] unless an explicit `with` error is given.
///
/// ```
/// use membrane_log::fail;
///
/// #[derive(Debug)]
/// struct Endpoint {
///     id: u64,
/// }
///
/// impl Endpoint {
///     fn check(&self) -> Result<(), ()> {
///         if self.id == 0 { Err(()) } else { Ok(()) }
///     }
///
///     fn check_with_details(&self) -> Result<(), u64> {
///         // fail when check() fails and return the error 1234
///         fail!(from self, when self.check(), with 1234, "endpoint check failed");
///         Ok(())
///     }
///
///     fn verify(&self) -> Result<(), u64> {
///         if self.id == 0 {
///             // without condition, return error 4567
///             fail!(from self, with 4567, "id is zero");
///         }
///         Ok(())
///     }
///
///     fn verify_all(&self) -> Result<(), u64> {
///         // forward the error when it is compatible or convertible
///         fail!(from self, when self.verify(), "verify failed");
///         Ok(())
///     }
/// }
/// ```
#[macro_export]
macro_rules! fail {
    (with $error_value:expr, $($message:expr),* $(,)?) => {
        {
            $crate::debug!($($message),*);
            return Err($error_value);
        }
    };
    (from $origin:expr, with $error_value:expr, $($message:expr),* $(,)?) => {
        {
            $crate::debug!(from $origin, $($message),*);
            return Err($error_value);
        }
    };
    (from $origin:expr, when $call:expr, with $error_value:expr, $($message:expr),* $(,)?) => {
        match $call {
            Ok(v) => v,
            Err(_) => {
                $crate::debug!(from $origin, $($message),*);
                return Err($error_value);
            }
        }
    };
    (when $call:expr, $($message:expr),* $(,)?) => {
        match $call {
            Ok(v) => v,
            Err(e) => {
                $crate::debug!($($message),*);
                return Err(e.into());
            }
        }
    };
    (from $origin:expr, when $call:expr, $($message:expr),* $(,)?) => {
        match $call {
            Ok(v) => v,
            Err(e) => {
                $crate::debug!(from $origin, $($message),*);
                return Err(e.into());
            }
        }
    };
}

/// Logs a message with [`crate::LogLevel::Fatal`] and panics. This is the
/// process-wide fatal path, reserved for corruption and misconfiguration
/// where continuing would damage shared state.
///
/// ```should_panic
/// use membrane_log::fatal_panic;
///
/// #[derive(Debug)]
/// struct Endpoint {
///     id: u64,
/// }
///
/// let endpoint = Endpoint { id: 0 };
/// fatal_panic!(from endpoint, "invalid id {}", endpoint.id);
/// ```
#[macro_export]
macro_rules! fatal_panic {
    (from $origin:expr, when $call:expr, $($message:expr),* $(,)?) => {
        match $call {
            Ok(v) => v,
            Err(_) => {
                $crate::fatal_panic!(from $origin, $($message),*);
            }
        }
    };
    (from $origin:expr, $($message:expr),* $(,)?) => {
        {
            $crate::__internal_log(
                $crate::LogLevel::Fatal,
                ::core::format_args!("{:?}", $origin),
                ::core::format_args!($($message),*),
            );
            ::core::panic!($($message),*);
        }
    };
    ($($message:expr),* $(,)?) => {
        {
            $crate::__internal_log(
                $crate::LogLevel::Fatal,
                ::core::format_args!(""),
                ::core::format_args!($($message),*),
            );
            ::core::panic!($($message),*);
        }
    };
}
