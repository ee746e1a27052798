// Copyright (c) 2024 Contributors to the membrane project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The shared-memory data plane of membrane, a zero-copy publish/subscribe
//! middleware for co-located processes. Publishers hand out fixed-maximum
//! size chunks that live in a shared memory segment, subscribers receive a
//! small reference-counted descriptor and read the payload in place. No
//! payload copy, no allocation and no kernel call on the hot path.
//!
//! The crate is layered bottom up:
//!
//!  * [`memory`] owns the chunks: size-class pools over donated segment
//!    memory ([`memory::mem_pool`], [`memory::memory_manager`]) and the
//!    reference-counted handles ([`memory::shared_chunk`],
//!    [`memory::shm_safe_unmanaged_chunk`]).
//!  * [`port`] moves the chunks: per-subscriber queues, the per-publisher
//!    fan-out with history replay ([`port::chunk_distributor`]), the
//!    endpoint facades ([`port::chunk_sender`], [`port::chunk_receiver`])
//!    and the offer/subscribe state machines ([`port::publisher_port`],
//!    [`port::subscriber_port`]).
//!
//! The daemon that creates segments, carries control messages between ports
//! and reclaims resources of crashed endpoints is not part of this crate,
//! it interacts with the data plane only through the donated memory, the
//! [`port::control_message::ControlMessage`]s and the per-endpoint
//! [`port::used_chunk_list::UsedChunkList`]s.
//!
//! # Example
//!
//! ```
//! use membrane::config::{DataSegmentConfig, MemPoolConfig, PublisherOptions, SubscriberOptions};
//! use membrane::memory::chunk_settings::ChunkSettings;
//! use membrane::port::publisher_port::{PublisherPortDaemon, PublisherPortUser};
//! use membrane::port::subscriber_port::{SubscriberPortDaemon, SubscriberPortUser};
//! use membrane::service::ServiceDescription;
//! use membrane::testing::PortFactory;
//!
//! let config = DataSegmentConfig {
//!     mempool: vec![MemPoolConfig { size: 128, chunk_count: 16 }],
//! };
//! let factory = PortFactory::new(&config);
//!
//! let service = ServiceDescription::new("radar", "front-left", "objects")
//!     .expect("a valid service description");
//! let publisher = factory.publisher(service, &PublisherOptions::default());
//! let subscriber = factory.subscriber(service, &SubscriberOptions::default());
//!
//! PublisherPortUser::new(publisher).offer();
//! SubscriberPortUser::new(subscriber).subscribe();
//!
//! // the daemon shuttles the control messages between the ports
//! let offer = PublisherPortDaemon::new(publisher).try_get_control_message();
//! assert!(offer.is_some());
//! let subscription = SubscriberPortDaemon::new(subscriber)
//!     .try_get_control_message()
//!     .expect("a subscription request");
//! let response = PublisherPortDaemon::new(publisher).dispatch_control_message(subscription);
//! SubscriberPortDaemon::new(subscriber).dispatch_control_message(response.unwrap());
//!
//! // publish without copying: write into the chunk, then send the handle
//! let publisher = PublisherPortUser::new(publisher);
//! let settings = ChunkSettings::new_payload_only(8, 8).expect("valid chunk settings");
//! let header = publisher.try_allocate(settings).expect("a free chunk");
//! unsafe {
//!     header
//!         .as_ref()
//!         .user_payload()
//!         .cast::<u64>()
//!         .as_ptr()
//!         .write(1234)
//! };
//! publisher.send(header);
//!
//! let subscriber = SubscriberPortUser::new(subscriber);
//! let received = subscriber.try_get().expect("room to hold the chunk").expect("a chunk");
//! assert_eq!(
//!     unsafe { received.as_ref().user_payload().cast::<u64>().as_ref() },
//!     &1234
//! );
//! subscriber.release(received);
//! ```

pub mod config;
pub mod constants;
pub mod memory;
pub mod port;
pub mod service;
pub mod testing;
