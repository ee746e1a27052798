// Copyright (c) 2024 Contributors to the membrane project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The publishing endpoint. [`PublisherPortData`] lives in shared memory,
//! the two facades split its API by role: [`PublisherPortUser`] is what the
//! publishing application drives (offer, allocate, send),
//! [`PublisherPortDaemon`] is what the daemon drives (polling the offer
//! state machine, dispatching subscription requests).
//!
//! The offer lifecycle is a two-flag state machine
//!
//! ```text
//! NOT_OFFERED --user:offer()--> OFFER_REQUESTED
//! OFFER_REQUESTED --daemon:try_get_control_message()--> OFFERED, emits Offer
//! OFFERED --user:stop_offer()--> STOP_OFFER_REQUESTED
//! STOP_OFFER_REQUESTED --daemon:try_get_control_message()--> NOT_OFFERED, emits StopOffer
//! ```
//!
//! so that the user side never blocks and the daemon observes only the
//! effective state. An offer/stop_offer pair that the daemon never polled
//! in between collapses into no message at all.

use core::ptr::NonNull;
use core::sync::atomic::{AtomicBool, Ordering};

use membrane_bb_container::fixed_string::FixedString;
use membrane_bb_elementary::unique_id::UniqueId;
use membrane_log::{fatal_panic, warn};

use crate::config::PublisherOptions;
use crate::constants::{
    MAX_CHUNKS_ALLOCATED_PER_PUBLISHER_SIMULTANEOUSLY, MAX_PUBLISHER_HISTORY,
    MAX_SUBSCRIBERS_PER_PUBLISHER, MAX_SUBSCRIBER_QUEUE_CAPACITY, NODE_NAME_CAPACITY,
};
use crate::memory::chunk_header::ChunkHeader;
use crate::memory::chunk_settings::ChunkSettings;
use crate::memory::memory_manager::MemoryManager;
use crate::port::chunk_sender::{ChunkSender, ChunkSenderAllocateError, ChunkSenderData};
use crate::port::control_message::ControlMessage;
use crate::port::locking_policy::ThreadSafePolicy;
use crate::service::ServiceDescription;

/// The concrete sender state of a publisher port: thread-safe locking on
/// both distributor and queues since user thread and daemon thread mutate
/// them concurrently.
pub type PublisherChunkSenderData = ChunkSenderData<
    ThreadSafePolicy,
    ThreadSafePolicy,
    MAX_SUBSCRIBER_QUEUE_CAPACITY,
    MAX_SUBSCRIBERS_PER_PUBLISHER,
    MAX_PUBLISHER_HISTORY,
    MAX_CHUNKS_ALLOCATED_PER_PUBLISHER_SIMULTANEOUSLY,
>;

/// The shared-memory state of one publisher port.
#[derive(Debug)]
#[repr(C)]
pub struct PublisherPortData {
    service_description: ServiceDescription,
    node_name: FixedString<NODE_NAME_CAPACITY>,
    unique_id: UniqueId,
    sender: PublisherChunkSenderData,
    offering_requested: AtomicBool,
    offered: AtomicBool,
}

impl PublisherPortData {
    /// The memory manager must be placed in registered segment memory. A
    /// node name that exceeds [`NODE_NAME_CAPACITY`] is a fatal
    /// configuration error.
    pub fn new(
        service_description: ServiceDescription,
        memory_manager: &MemoryManager,
        options: &PublisherOptions,
    ) -> Self {
        let node_name = match FixedString::from_str(&options.node_name) {
            Ok(node_name) => node_name,
            Err(_) => fatal_panic!(from "PublisherPortData::new",
                "The node name \"{}\" exceeds the maximum supported length of {}.",
                options.node_name, NODE_NAME_CAPACITY),
        };

        Self {
            service_description,
            node_name,
            unique_id: UniqueId::new(),
            sender: ChunkSenderData::new(
                memory_manager,
                options.subscriber_too_slow_policy,
                options.history_capacity,
            ),
            offering_requested: AtomicBool::new(options.offer_on_create),
            offered: AtomicBool::new(false),
        }
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

    pub fn sender_data(&self) -> &PublisherChunkSenderData {
        &self.sender
    }
}

/// The application-side facade of a publisher port.
#[derive(Debug)]
pub struct PublisherPortUser<'a> {
    data: &'a PublisherPortData,
}

impl<'a> PublisherPortUser<'a> {
    pub fn new(data: &'a PublisherPortData) -> Self {
        Self { data }
    }

    fn sender(&self) -> ChunkSender<'a, ThreadSafePolicy, ThreadSafePolicy, MAX_SUBSCRIBER_QUEUE_CAPACITY, MAX_SUBSCRIBERS_PER_PUBLISHER, MAX_PUBLISHER_HISTORY, MAX_CHUNKS_ALLOCATED_PER_PUBLISHER_SIMULTANEOUSLY> {
        ChunkSender::new(&self.data.sender)
    }

    /// Requests the port to be offered. Non-blocking, the daemon picks the
    /// request up on its next poll.
    pub fn offer(&self) {
        self.data.offering_requested.store(true, Ordering::Relaxed);
    }

    /// Requests the port to stop being offered. Non-blocking.
    pub fn stop_offer(&self) {
        self.data.offering_requested.store(false, Ordering::Relaxed);
    }

    /// True once the daemon has processed the offer.
    pub fn is_offered(&self) -> bool {
        self.data.offered.load(Ordering::Relaxed)
    }

    pub fn has_subscribers(&self) -> bool {
        self.sender().number_of_stored_queues() > 0
    }

    /// See [`ChunkSender::try_allocate()`].
    pub fn try_allocate(
        &self,
        settings: ChunkSettings,
    ) -> Result<NonNull<ChunkHeader>, ChunkSenderAllocateError> {
        self.sender()
            .try_allocate(self.data.unique_id.value(), settings)
    }

    /// See [`ChunkSender::release()`].
    pub fn release(&self, header: NonNull<ChunkHeader>) {
        self.sender().release(header)
    }

    /// See [`ChunkSender::send()`].
    pub fn send(&self, header: NonNull<ChunkHeader>) -> u64 {
        self.sender().send(header)
    }

    /// See [`ChunkSender::push_to_history()`].
    pub fn push_to_history(&self, header: NonNull<ChunkHeader>) {
        self.sender().push_to_history(header)
    }

    /// See [`ChunkSender::try_get_previous_chunk()`].
    pub fn try_get_previous_chunk(&self) -> Option<NonNull<ChunkHeader>> {
        self.sender().try_get_previous_chunk()
    }

    /// Releases this publisher when it is blocked on a subscriber that
    /// stopped consuming.
    pub fn signal_shutdown(&self) {
        self.data.sender.distributor_data().signal_shutdown();
    }
}

/// The daemon-side facade of a publisher port.
#[derive(Debug)]
pub struct PublisherPortDaemon<'a> {
    data: &'a PublisherPortData,
}

impl<'a> PublisherPortDaemon<'a> {
    pub fn new(data: &'a PublisherPortData) -> Self {
        Self { data }
    }

    fn sender(&self) -> ChunkSender<'a, ThreadSafePolicy, ThreadSafePolicy, MAX_SUBSCRIBER_QUEUE_CAPACITY, MAX_SUBSCRIBERS_PER_PUBLISHER, MAX_PUBLISHER_HISTORY, MAX_CHUNKS_ALLOCATED_PER_PUBLISHER_SIMULTANEOUSLY> {
        ChunkSender::new(&self.data.sender)
    }

    /// Polls the offer state machine. Returns at most one message: the
    /// pending [`ControlMessage::Offer`] or
    /// [`ControlMessage::StopOffer`], [`None`] when the observable state
    /// did not change since the last poll.
    pub fn try_get_control_message(&self) -> Option<ControlMessage> {
        let offering_requested = self.data.offering_requested.load(Ordering::Relaxed);
        let offered = self.data.offered.load(Ordering::Relaxed);

        if offering_requested && !offered {
            self.data.offered.store(true, Ordering::Relaxed);
            return Some(ControlMessage::Offer {
                service: self.data.service_description,
                history_capacity: self.data.sender.distributor_data().history_capacity(),
            });
        }

        if !offering_requested && offered {
            self.data.offered.store(false, Ordering::Relaxed);
            // subscribers of a withdrawn topic must subscribe again after
            // the next offer
            self.sender().remove_all_queues();
            return Some(ControlMessage::StopOffer {
                service: self.data.service_description,
            });
        }

        None
    }

    /// Applies a subscription request and returns the response the daemon
    /// relays back: [`ControlMessage::Ack`] with the queue registered (and
    /// any requested history already delivered), otherwise
    /// [`ControlMessage::Nack`].
    pub fn dispatch_control_message(&self, message: ControlMessage) -> Option<ControlMessage> {
        let service = self.data.service_description;

        match message {
            ControlMessage::Subscribe {
                queue,
                history_request,
                ..
            } => {
                if !self.data.offered.load(Ordering::Relaxed) {
                    return Some(ControlMessage::Nack { service });
                }

                let queue = match queue.as_ptr() {
                    Some(queue) => queue,
                    None => fatal_panic!(from self.data,
                        "The segment holding the subscriber queue is no longer attached."),
                };

                match self
                    .sender()
                    .try_add_queue(unsafe { queue.as_ref() }, history_request)
                {
                    Ok(()) => Some(ControlMessage::Ack { service }),
                    Err(_) => Some(ControlMessage::Nack { service }),
                }
            }
            ControlMessage::Unsubscribe { queue, .. } => {
                if !self.data.offered.load(Ordering::Relaxed) {
                    return Some(ControlMessage::Nack { service });
                }

                let queue = match queue.as_ptr() {
                    Some(queue) => queue,
                    None => fatal_panic!(from self.data,
                        "The segment holding the subscriber queue is no longer attached."),
                };

                match self.sender().try_remove_queue(unsafe { queue.as_ref() }) {
                    Ok(()) => Some(ControlMessage::Ack { service }),
                    Err(_) => Some(ControlMessage::Nack { service }),
                }
            }
            message => {
                warn!(from self.data,
                    "The publisher port cannot process the control message {:?}.", message);
                None
            }
        }
    }

    /// Drops everything the publisher holds: loaned chunks, history and
    /// the reuse candidate. Called by the daemon when the publisher
    /// process died.
    pub fn release_all_chunks(&self) {
        self.sender().release_all();
    }
}
