// Copyright (c) 2024 Contributors to the membrane project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use serde::{Deserialize, Serialize};

/// What a full subscriber queue does with an incoming chunk. Chosen by the
/// subscriber.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum QueueFullPolicy {
    /// The queue evicts its oldest chunk, the subscriber loses data and is
    /// told via the lost-chunks flag.
    DiscardOldestData,
    /// The queue refuses the chunk, what happens next is the publisher's
    /// [`ConsumerTooSlowPolicy`].
    BlockPublisher,
}

/// What a publisher does when a subscriber with
/// [`QueueFullPolicy::BlockPublisher`] cannot keep up. Chosen by the
/// publisher.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ConsumerTooSlowPolicy {
    /// The chunk is dropped for that subscriber, delivery never blocks.
    DiscardOldestData,
    /// Delivery waits in a bounded, cancellable back-off loop until the
    /// subscriber made room.
    WaitForConsumer,
}
