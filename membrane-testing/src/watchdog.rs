// Copyright (c) 2024 Contributors to the membrane project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::sync::mpsc::{channel, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Aborts the process when a test does not finish within its deadline.
/// Create one at the top of every test that spawns threads, a deadlocked
/// test then terminates the whole suite with a message instead of hanging.
pub struct Watchdog {
    disarm: Sender<()>,
    guard: Option<JoinHandle<()>>,
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new_with_timeout(DEFAULT_TIMEOUT)
    }
}

impl Watchdog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_with_timeout(timeout: Duration) -> Self {
        let (disarm, rearm) = channel();

        Self {
            disarm,
            guard: Some(std::thread::spawn(move || {
                match rearm.recv_timeout(timeout) {
                    Ok(_) | Err(RecvTimeoutError::Disconnected) => (),
                    Err(RecvTimeoutError::Timeout) => {
                        eprintln!("watchdog timeout after {timeout:?}, terminating process");
                        std::process::abort();
                    }
                }
            })),
        }
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.disarm.send(()).expect("watchdog thread is running");
        let _ = self.guard.take().unwrap().join();
    }
}
