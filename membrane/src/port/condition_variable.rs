// Copyright (c) 2024 Contributors to the membrane project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use core::sync::atomic::{AtomicU64, Ordering};

use membrane_log::fatal_panic;

use crate::constants::MAX_NOTIFICATION_INDEX;

/// The shared-memory record a waitset attaches to a queue. A successful
/// push marks the queue's notification index in the 64 bit mask and bumps
/// the wake counter, how the waiting side sleeps on it is outside the data
/// plane.
#[derive(Debug, Default)]
#[repr(C)]
pub struct ConditionVariableData {
    active_notifications: AtomicU64,
    wake_count: AtomicU64,
}

impl ConditionVariableData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify(&self, notification_index: u64) {
        if notification_index > MAX_NOTIFICATION_INDEX {
            fatal_panic!(from self,
                "The notification index {} exceeds the maximum supported index {}.",
                notification_index, MAX_NOTIFICATION_INDEX);
        }

        self.active_notifications
            .fetch_or(1 << notification_index, Ordering::Release);
        self.wake_count.fetch_add(1, Ordering::Release);
    }

    /// Consumes and returns the mask of notification indices set since the
    /// last call.
    pub fn take_notifications(&self) -> u64 {
        self.active_notifications.swap(0, Ordering::Acquire)
    }

    pub fn wake_count(&self) -> u64 {
        self.wake_count.load(Ordering::Acquire)
    }
}
