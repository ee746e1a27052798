// Copyright (c) 2024 Contributors to the membrane project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The daemon-facing configuration surface: size-class tables for the data
//! segments and the per-port option structs. Config structs live on the
//! daemon's heap, only their validated contents reach shared memory.
//!
//! # Example
//!
//! ```no_run
//! use membrane::config::SegmentConfig;
//!
//! let config = SegmentConfig::from_file("config/membrane.toml").expect("a readable config");
//! ```

use serde::{Deserialize, Serialize};

use membrane_bb_elementary::enum_gen;
use membrane_log::fail;

use crate::constants::{MAX_SHM_SEGMENTS, MAX_SUBSCRIBER_QUEUE_CAPACITY};
use crate::port::policy::{ConsumerTooSlowPolicy, QueueFullPolicy};

enum_gen! {
    ConfigCreationError
  entry:
    FailedToReadConfigFileContents,
    UnableToDeserializeContents,
    ExceedsMaximumNumberOfSegments,
    InvalidMemPoolConfig
}

/// One size class: chunks able to carry `size` user payload bytes,
/// `chunk_count` of them.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub struct MemPoolConfig {
    pub size: u64,
    pub chunk_count: u32,
}

/// The size-class table of one data segment. Classes must be listed with
/// strictly increasing payload sizes,
/// [`crate::memory::memory_manager::MemoryManager::configure()`] treats a
/// violation as fatal.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct DataSegmentConfig {
    pub mempool: Vec<MemPoolConfig>,
}

impl Default for DataSegmentConfig {
    fn default() -> Self {
        Self {
            mempool: vec![
                MemPoolConfig {
                    size: 128,
                    chunk_count: 10000,
                },
                MemPoolConfig {
                    size: 1024,
                    chunk_count: 5000,
                },
                MemPoolConfig {
                    size: 16 * 1024,
                    chunk_count: 1000,
                },
                MemPoolConfig {
                    size: 128 * 1024,
                    chunk_count: 200,
                },
                MemPoolConfig {
                    size: 1024 * 1024,
                    chunk_count: 50,
                },
            ],
        }
    }
}

impl DataSegmentConfig {
    /// Cheap upfront validation of the rules
    /// [`crate::memory::memory_manager::MemoryManager::configure()`]
    /// enforces fatally: at least one class, non-zero chunk counts,
    /// strictly increasing sizes.
    pub fn validate(&self) -> Result<(), ConfigCreationError> {
        let origin = "DataSegmentConfig::validate";
        if self.mempool.is_empty() {
            fail!(from origin, with ConfigCreationError::InvalidMemPoolConfig,
                "The config does not contain a single mempool.");
        }

        let mut previous_size = 0;
        for entry in &self.mempool {
            if entry.chunk_count == 0 {
                fail!(from origin, with ConfigCreationError::InvalidMemPoolConfig,
                    "The mempool with a payload size of {} has a chunk count of zero.", entry.size);
            }

            if entry.size <= previous_size && previous_size != 0 {
                fail!(from origin, with ConfigCreationError::InvalidMemPoolConfig,
                    "The mempools must be ordered by strictly increasing payload size, \
                     {} follows {}.", entry.size, previous_size);
            }
            previous_size = entry.size;
        }

        Ok(())
    }
}

/// Access rights and size classes of one segment.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct SegmentEntry {
    pub reader_group: String,
    pub writer_group: String,
    #[serde(flatten)]
    pub data: DataSegmentConfig,
}

/// The whole segment table of a deployment, usually read from a TOML file.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct SegmentConfig {
    pub segment: Vec<SegmentEntry>,
}

impl SegmentConfig {
    pub fn from_file(path: &str) -> Result<Self, ConfigCreationError> {
        let origin = "SegmentConfig::from_file";
        let contents = fail!(from origin, when std::fs::read_to_string(path),
            with ConfigCreationError::FailedToReadConfigFileContents,
            "Unable to read the config file \"{}\".", path);

        let config = Self::from_toml_str(&contents)?;
        membrane_log::trace!(from origin, "Loaded segment config from \"{}\".", path);
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigCreationError> {
        let origin = "SegmentConfig::from_toml_str";
        let config: Self = fail!(from origin, when toml::from_str(contents),
            with ConfigCreationError::UnableToDeserializeContents,
            "Unable to deserialize the segment config.");

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigCreationError> {
        let origin = "SegmentConfig::validate";
        if self.segment.len() > MAX_SHM_SEGMENTS {
            fail!(from origin, with ConfigCreationError::ExceedsMaximumNumberOfSegments,
                "The config contains {} segments but at most {} are supported.",
                self.segment.len(), MAX_SHM_SEGMENTS);
        }

        for entry in &self.segment {
            entry.data.validate()?;
        }

        Ok(())
    }
}

/// Options a publisher port is created with.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct PublisherOptions {
    /// Number of most recent chunks kept for late joining subscribers, at
    /// most [`crate::constants::MAX_PUBLISHER_HISTORY`].
    pub history_capacity: u64,
    pub node_name: String,
    /// When true the port starts its life in the offer-requested state.
    pub offer_on_create: bool,
    /// What the publisher does when a subscriber with a blocking queue
    /// cannot keep up.
    pub subscriber_too_slow_policy: ConsumerTooSlowPolicy,
}

impl Default for PublisherOptions {
    fn default() -> Self {
        Self {
            history_capacity: 0,
            node_name: String::new(),
            offer_on_create: true,
            subscriber_too_slow_policy: ConsumerTooSlowPolicy::DiscardOldestData,
        }
    }
}

/// Options a subscriber port is created with.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct SubscriberOptions {
    /// Capacity of the subscriber queue, at most
    /// [`crate::constants::MAX_SUBSCRIBER_QUEUE_CAPACITY`].
    pub queue_capacity: u64,
    /// Number of history chunks requested on subscription.
    pub history_request: u64,
    pub node_name: String,
    /// When true the port starts its life in the subscribe-requested state.
    pub subscribe_on_create: bool,
    /// What happens to the publisher when this subscriber's queue is full.
    pub queue_full_policy: QueueFullPolicy,
}

impl Default for SubscriberOptions {
    fn default() -> Self {
        Self {
            queue_capacity: MAX_SUBSCRIBER_QUEUE_CAPACITY as u64,
            history_request: 0,
            node_name: String::new(),
            subscribe_on_create: true,
            queue_full_policy: QueueFullPolicy::DiscardOldestData,
        }
    }
}
