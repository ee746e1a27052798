// Copyright (c) 2024 Contributors to the membrane project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The logging facade of membrane. It provides six [`LogLevel`]s which can be
//! set via [`set_log_level()`] or the `MEMBRANE_LOG_LEVEL` environment
//! variable, and convenience macros which combine error handling with
//! logging: [`fail!`] logs and early-returns a typed error, [`fatal_panic!`]
//! logs and panics. The latter is the process-wide fatal path reserved for
//! corruption and misconfiguration.
//!
//! # Example
//!
//! ## Logging
//!
//! ```
//! use membrane_log::{debug, info, warn};
//!
//! #[derive(Debug)]
//! struct Endpoint {
//!     id: u64,
//! }
//!
//! impl Endpoint {
//!     fn log_stuff(&self) {
//!         debug!("hello {}", 123);
//!         debug!(from self, "hello {}", 123);
//!         info!(from "Custom::Origin", "world");
//!         warn!("something is fishy");
//!     }
//! }
//! ```
//!
//! ## Error Handling
//!
//! ```
//! use membrane_log::fail;
//!
//! #[derive(Debug)]
//! struct Endpoint {
//!     id: u64,
//! }
//!
//! impl Endpoint {
//!     fn connect(&self) -> Result<(), u64> {
//!         if self.id == 0 {
//!             fail!(from self, with 1234, "invalid id {}", self.id);
//!         }
//!         Ok(())
//!     }
//!
//!     fn establish(&self) -> Result<(), u64> {
//!         fail!(from self, when self.connect(), "unable to establish connection");
//!         Ok(())
//!     }
//! }
//! ```

use core::sync::atomic::{AtomicU8, Ordering};
use std::sync::OnceLock;

mod fail;
mod log_macros;

/// The severity of a log record, ascending.
#[derive(Debug, Clone, Copy, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Fatal = 5,
}

const DEFAULT_LOG_LEVEL: LogLevel = LogLevel::Info;

/// A sink for log records. Implementations must be threadsafe since every
/// thread of the process funnels its records through the one global logger.
pub trait Log: Send + Sync {
    fn log(&self, level: LogLevel, origin: core::fmt::Arguments, message: core::fmt::Arguments);
}

static LOGGER: OnceLock<&'static dyn Log> = OnceLock::new();
static LOG_LEVEL: AtomicU8 = AtomicU8::new(DEFAULT_LOG_LEVEL as u8);

/// Sets the current log level. Ignored when the `log` feature forwards to an
/// external framework, its own level filter applies there.
pub fn set_log_level(v: LogLevel) {
    LOG_LEVEL.store(v as u8, Ordering::Relaxed);
}

/// Returns the current log level.
pub fn get_log_level() -> u8 {
    LOG_LEVEL.load(Ordering::Relaxed)
}

/// Sets the log level from the `MEMBRANE_LOG_LEVEL` environment variable and
/// falls back to the provided level when the variable is unset or garbage.
pub fn set_log_level_from_env_or(v: LogLevel) {
    let level = std::env::var("MEMBRANE_LOG_LEVEL")
        .ok()
        .map(|s| match s.to_lowercase().as_str() {
            "trace" => LogLevel::Trace,
            "debug" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warn" => LogLevel::Warn,
            "error" => LogLevel::Error,
            "fatal" => LogLevel::Fatal,
            _ => {
                eprintln!(
                    "Invalid value {s:?} for 'MEMBRANE_LOG_LEVEL', \
                     allowed is one of: fatal, error, warn, info, debug, trace"
                );
                v
            }
        })
        .unwrap_or(v);
    set_log_level(level);
}

/// See [`set_log_level_from_env_or()`], with [`LogLevel::Info`] as fallback.
pub fn set_log_level_from_env_or_default() {
    set_log_level_from_env_or(DEFAULT_LOG_LEVEL);
}

/// Sets the global [`Log`]ger. Can only be called once at the beginning of
/// the program, before the first record is emitted. Returns false when a
/// logger was already installed, the logger is not updated in that case.
pub fn set_logger(logger: &'static dyn Log) -> bool {
    LOGGER.set(logger).is_ok()
}

fn logger() -> &'static dyn Log {
    *LOGGER.get_or_init(default_logger)
}

#[cfg(not(feature = "log"))]
fn default_logger() -> &'static dyn Log {
    static CONSOLE_LOGGER: ConsoleLogger = ConsoleLogger;
    &CONSOLE_LOGGER
}

#[cfg(feature = "log")]
fn default_logger() -> &'static dyn Log {
    static FORWARDING_LOGGER: LogCrateLogger = LogCrateLogger;
    &FORWARDING_LOGGER
}

/// The built-in logger. Writes every record to stderr.
pub struct ConsoleLogger;

impl Log for ConsoleLogger {
    fn log(&self, level: LogLevel, origin: core::fmt::Arguments, message: core::fmt::Arguments) {
        let level = match level {
            LogLevel::Trace => "T",
            LogLevel::Debug => "D",
            LogLevel::Info => "I",
            LogLevel::Warn => "W",
            LogLevel::Error => "E",
            LogLevel::Fatal => "F",
        };

        let origin = origin.to_string();
        if origin.is_empty() {
            eprintln!("[{level}] {message}");
        } else {
            eprintln!("[{level}] {origin} | {message}");
        }
    }
}

#[cfg(feature = "log")]
struct LogCrateLogger;

#[cfg(feature = "log")]
impl Log for LogCrateLogger {
    fn log(&self, level: LogLevel, origin: core::fmt::Arguments, message: core::fmt::Arguments) {
        let level = match level {
            LogLevel::Trace => log::Level::Trace,
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Info => log::Level::Info,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Error | LogLevel::Fatal => log::Level::Error,
        };

        let origin = origin.to_string();
        if origin.is_empty() {
            log::log!(level, "{message}");
        } else {
            log::log!(level, "{origin} | {message}");
        }
    }
}

#[doc(hidden)]
pub fn __internal_log(
    level: LogLevel,
    origin: core::fmt::Arguments,
    message: core::fmt::Arguments,
) {
    if get_log_level() <= level as u8 {
        logger().log(level, origin, message);
    }
}
