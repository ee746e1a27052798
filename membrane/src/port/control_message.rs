// Copyright (c) 2024 Contributors to the membrane project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use membrane_bb_elementary::relative_pointer::RelativePointer;

use crate::port::subscriber_port::SubscriberChunkQueueData;
use crate::service::ServiceDescription;

/// The control-plane vocabulary between the ports and the daemon. Each
/// daemon-side poll of a port yields at most one outgoing message, each
/// dispatched message yields at most one response. How the messages travel
/// between the processes is the daemon's business.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    /// A publisher announces its topic together with the history depth it
    /// can replay to late joiners.
    Offer {
        service: ServiceDescription,
        history_capacity: u64,
    },
    /// A publisher withdraws its topic.
    StopOffer { service: ServiceDescription },
    /// A subscriber asks to be connected, carrying its queue and the
    /// number of history chunks it wants replayed.
    Subscribe {
        service: ServiceDescription,
        queue: RelativePointer<SubscriberChunkQueueData>,
        history_request: u64,
    },
    /// A subscriber asks to be disconnected.
    Unsubscribe {
        service: ServiceDescription,
        queue: RelativePointer<SubscriberChunkQueueData>,
    },
    /// A request was applied.
    Ack { service: ServiceDescription },
    /// A request was refused.
    Nack { service: ServiceDescription },
}

impl ControlMessage {
    pub fn service(&self) -> &ServiceDescription {
        match self {
            Self::Offer { service, .. }
            | Self::StopOffer { service }
            | Self::Subscribe { service, .. }
            | Self::Unsubscribe { service, .. }
            | Self::Ack { service }
            | Self::Nack { service } => service,
        }
    }
}
