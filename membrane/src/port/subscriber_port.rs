// Copyright (c) 2024 Contributors to the membrane project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The subscribing endpoint, the mirror of
//! [`crate::port::publisher_port`]. The user side toggles the subscribe
//! request, the daemon side turns the toggle into
//! [`ControlMessage::Subscribe`]/[`ControlMessage::Unsubscribe`] messages
//! and feeds the publisher's ACK/NACK responses back into the subscription
//! state.

use core::ptr::NonNull;
use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use membrane_bb_container::fixed_string::FixedString;
use membrane_bb_container::variant_queue::VariantQueueKind;
use membrane_bb_elementary::relative_pointer::RelativePointer;
use membrane_bb_elementary::unique_id::UniqueId;
use membrane_log::{fatal_panic, warn};

use crate::config::SubscriberOptions;
use crate::constants::{
    MAX_CHUNKS_IN_USE_PER_SUBSCRIBER, MAX_SUBSCRIBER_QUEUE_CAPACITY, NODE_NAME_CAPACITY,
};
use crate::memory::chunk_header::ChunkHeader;
use crate::port::chunk_queue_data::ChunkQueueData;
use crate::port::chunk_receiver::{ChunkReceiveError, ChunkReceiver, ChunkReceiverData};
use crate::port::condition_variable::ConditionVariableData;
use crate::port::control_message::ControlMessage;
use crate::port::locking_policy::ThreadSafePolicy;
use crate::port::policy::QueueFullPolicy;
use crate::service::ServiceDescription;

/// The concrete queue type of a subscriber port, the type every publisher
/// distributor in the system delivers into.
pub type SubscriberChunkQueueData = ChunkQueueData<ThreadSafePolicy, MAX_SUBSCRIBER_QUEUE_CAPACITY>;

/// The concrete receiver state of a subscriber port.
pub type SubscriberChunkReceiverData = ChunkReceiverData<
    ThreadSafePolicy,
    MAX_SUBSCRIBER_QUEUE_CAPACITY,
    MAX_CHUNKS_IN_USE_PER_SUBSCRIBER,
>;

/// Where a subscription stands from the daemon's point of view.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[repr(u8)]
pub enum SubscriptionState {
    NotSubscribed = 0,
    SubscribeRequested = 1,
    Subscribed = 2,
    UnsubscribeRequested = 3,
}

impl SubscriptionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::NotSubscribed,
            1 => Self::SubscribeRequested,
            2 => Self::Subscribed,
            3 => Self::UnsubscribeRequested,
            _ => unreachable!("the subscription state is only ever written from this enum"),
        }
    }
}

/// The shared-memory state of one subscriber port.
#[derive(Debug)]
#[repr(C)]
pub struct SubscriberPortData {
    service_description: ServiceDescription,
    node_name: FixedString<NODE_NAME_CAPACITY>,
    unique_id: UniqueId,
    receiver: SubscriberChunkReceiverData,
    history_request: u64,
    subscribe_requested: AtomicBool,
    subscription_state: AtomicU8,
}

impl SubscriberPortData {
    /// A node name that exceeds [`NODE_NAME_CAPACITY`] or a queue capacity
    /// outside `[1, MAX_SUBSCRIBER_QUEUE_CAPACITY]` is clamped or fatal as
    /// documented on the respective setter.
    pub fn new(service_description: ServiceDescription, options: &SubscriberOptions) -> Self {
        let node_name = match FixedString::from_str(&options.node_name) {
            Ok(node_name) => node_name,
            Err(_) => fatal_panic!(from "SubscriberPortData::new",
                "The node name \"{}\" exceeds the maximum supported length of {}.",
                options.node_name, NODE_NAME_CAPACITY),
        };

        let queue_kind = match options.queue_full_policy {
            QueueFullPolicy::DiscardOldestData => VariantQueueKind::FiFoEvictsOldestOnOverflow,
            QueueFullPolicy::BlockPublisher => VariantQueueKind::FiFoRejectsOnOverflow,
        };

        let new_self = Self {
            service_description,
            node_name,
            unique_id: UniqueId::new(),
            receiver: ChunkReceiverData::new(queue_kind, options.queue_full_policy),
            history_request: options.history_request,
            subscribe_requested: AtomicBool::new(options.subscribe_on_create),
            subscription_state: AtomicU8::new(SubscriptionState::NotSubscribed as u8),
        };

        ChunkReceiver::new(&new_self.receiver)
            .popper()
            .set_capacity(options.queue_capacity as usize);

        new_self
    }

    pub fn service_description(&self) -> &ServiceDescription {
        &self.service_description
    }

    pub fn node_name(&self) -> &FixedString<NODE_NAME_CAPACITY> {
        &self.node_name
    }

    pub fn unique_id(&self) -> UniqueId {
        self.unique_id
    }

    pub fn receiver_data(&self) -> &SubscriberChunkReceiverData {
        &self.receiver
    }
}

/// The application-side facade of a subscriber port.
#[derive(Debug)]
pub struct SubscriberPortUser<'a> {
    data: &'a SubscriberPortData,
}

impl<'a> SubscriberPortUser<'a> {
    pub fn new(data: &'a SubscriberPortData) -> Self {
        Self { data }
    }

    fn receiver(
        &self,
    ) -> ChunkReceiver<'a, ThreadSafePolicy, MAX_SUBSCRIBER_QUEUE_CAPACITY, MAX_CHUNKS_IN_USE_PER_SUBSCRIBER>
    {
        ChunkReceiver::new(&self.data.receiver)
    }

    /// Requests a subscription. Non-blocking, the daemon picks the request
    /// up on its next poll.
    pub fn subscribe(&self) {
        self.data.subscribe_requested.store(true, Ordering::Relaxed);
    }

    /// Requests the subscription to end. Non-blocking.
    pub fn unsubscribe(&self) {
        self.data
            .subscribe_requested
            .store(false, Ordering::Relaxed);
    }

    pub fn subscription_state(&self) -> SubscriptionState {
        SubscriptionState::from_u8(self.data.subscription_state.load(Ordering::Relaxed))
    }

    /// See [`ChunkReceiver::try_get()`].
    pub fn try_get(&self) -> Result<Option<NonNull<ChunkHeader>>, ChunkReceiveError> {
        self.receiver().try_get()
    }

    /// See [`ChunkReceiver::release()`].
    pub fn release(&self, header: NonNull<ChunkHeader>) {
        self.receiver().release(header)
    }

    /// See [`ChunkReceiver::release_all()`].
    pub fn release_all(&self) {
        self.receiver().release_all()
    }

    pub fn has_lost_chunks(&self) -> bool {
        self.receiver().has_lost_chunks()
    }

    /// See
    /// [`crate::port::chunk_queue_popper::ChunkQueuePopper::set_condition_variable()`].
    pub fn set_condition_variable(
        &self,
        condition_variable: &ConditionVariableData,
        notification_index: u64,
    ) -> bool {
        self.receiver()
            .popper()
            .set_condition_variable(condition_variable, notification_index)
    }

    pub fn unset_condition_variable(&self) {
        self.receiver().popper().unset_condition_variable()
    }
}

/// The daemon-side facade of a subscriber port.
#[derive(Debug)]
pub struct SubscriberPortDaemon<'a> {
    data: &'a SubscriberPortData,
}

impl<'a> SubscriberPortDaemon<'a> {
    pub fn new(data: &'a SubscriberPortData) -> Self {
        Self { data }
    }

    fn state(&self) -> SubscriptionState {
        SubscriptionState::from_u8(self.data.subscription_state.load(Ordering::Relaxed))
    }

    fn set_state(&self, state: SubscriptionState) {
        self.data
            .subscription_state
            .store(state as u8, Ordering::Relaxed);
    }

    /// Polls the subscription state machine. Returns at most one message:
    /// the pending [`ControlMessage::Subscribe`] or
    /// [`ControlMessage::Unsubscribe`], [`None`] when the observable state
    /// did not change since the last poll.
    pub fn try_get_control_message(&self) -> Option<ControlMessage> {
        let subscribe_requested = self.data.subscribe_requested.load(Ordering::Relaxed);

        match (subscribe_requested, self.state()) {
            (true, SubscriptionState::NotSubscribed) => {
                self.set_state(SubscriptionState::SubscribeRequested);
                let queue = NonNull::from(self.data.receiver.queue_data());
                let queue = match RelativePointer::from_ptr(queue) {
                    Some(pointer) => pointer,
                    None => fatal_panic!(from self.data,
                        "The subscriber port does not live in any registered segment."),
                };

                Some(ControlMessage::Subscribe {
                    service: self.data.service_description,
                    queue,
                    history_request: self.data.history_request,
                })
            }
            (false, SubscriptionState::Subscribed) => {
                self.set_state(SubscriptionState::UnsubscribeRequested);
                let queue = NonNull::from(self.data.receiver.queue_data());
                let queue = match RelativePointer::from_ptr(queue) {
                    Some(pointer) => pointer,
                    None => fatal_panic!(from self.data,
                        "The subscriber port does not live in any registered segment."),
                };

                Some(ControlMessage::Unsubscribe {
                    service: self.data.service_description,
                    queue,
                })
            }
            _ => None,
        }
    }

    /// Feeds the publisher's response back into the subscription state.
    /// Never yields a response of its own.
    pub fn dispatch_control_message(&self, message: ControlMessage) -> Option<ControlMessage> {
        match message {
            ControlMessage::Ack { .. } => match self.state() {
                SubscriptionState::SubscribeRequested => {
                    self.set_state(SubscriptionState::Subscribed)
                }
                SubscriptionState::UnsubscribeRequested => {
                    self.set_state(SubscriptionState::NotSubscribed)
                }
                state => warn!(from self.data,
                    "Received an unexpected ACK in the subscription state {:?}.", state),
            },
            ControlMessage::Nack { .. } => match self.state() {
                // both refusals leave the port disconnected, the daemon
                // retries the subscription once the publisher offers again
                SubscriptionState::SubscribeRequested
                | SubscriptionState::UnsubscribeRequested => {
                    self.set_state(SubscriptionState::NotSubscribed)
                }
                state => warn!(from self.data,
                    "Received an unexpected NACK in the subscription state {:?}.", state),
            },
            message => {
                warn!(from self.data,
                    "The subscriber port cannot process the control message {:?}.", message);
            }
        }

        None
    }

    /// Drops every held chunk and drains the queue. Called by the daemon
    /// when the subscriber process died.
    pub fn release_all_chunks(&self) {
        ChunkReceiver::new(&self.data.receiver).release_all();
    }
}
