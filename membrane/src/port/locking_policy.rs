// Copyright (c) 2024 Contributors to the membrane project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compile-time selection of the locking discipline of a shared record.
//! Structures that are only ever touched from one thread instantiate
//! [`SingleThreadedPolicy`] and pay nothing, structures shared between a
//! user thread and the daemon instantiate [`ThreadSafePolicy`].

use core::fmt::Debug;
use core::hint::spin_loop;
use core::sync::atomic::{AtomicBool, Ordering};

/// A lock (or no-op) guarding the non-atomic parts of a shared record.
pub trait LockingPolicy: Debug + Default + Send + Sync {
    fn lock(&self);
    fn unlock(&self);

    fn guard(&self) -> LockGuard<'_, Self>
    where
        Self: Sized,
    {
        self.lock();
        LockGuard { policy: self }
    }
}

/// Releases the lock on drop.
pub struct LockGuard<'a, T: LockingPolicy> {
    policy: &'a T,
}

impl<T: LockingPolicy> Drop for LockGuard<'_, T> {
    fn drop(&mut self) {
        self.policy.unlock();
    }
}

/// A spin lock usable from multiple processes mapping the same memory.
/// Critical sections under it are a handful of loads and stores, so
/// spinning beats a syscall-based mutex here.
#[derive(Debug, Default)]
#[repr(C)]
pub struct ThreadSafePolicy {
    is_locked: AtomicBool,
}

impl LockingPolicy for ThreadSafePolicy {
    fn lock(&self) {
        loop {
            if self
                .is_locked
                .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return;
            }

            while self.is_locked.load(Ordering::Relaxed) {
                spin_loop();
            }
        }
    }

    fn unlock(&self) {
        self.is_locked.store(false, Ordering::Release);
    }
}

/// The no-op policy for records with a single mutating thread.
#[derive(Debug, Default)]
#[repr(C)]
pub struct SingleThreadedPolicy;

impl LockingPolicy for SingleThreadedPolicy {
    fn lock(&self) {}
    fn unlock(&self) {}
}
