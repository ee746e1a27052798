// Copyright (c) 2024 Contributors to the membrane project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Lock-free building blocks of the data plane. The
//! [`mpmc::index_pool::IndexPool`] is the free-list behind every chunk pool,
//! the [`spsc`] queues carry encoded chunk references from one publisher to
//! one subscriber.

pub mod mpmc {
    pub mod index_pool;
}

pub mod spsc {
    pub mod index_queue;
    pub mod overflowing_index_queue;
}
